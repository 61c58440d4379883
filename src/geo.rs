use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Continent {
    Europe,
    #[serde(rename = "USA")]
    Usa,
    Asia,
    Other,
    Unknown,
}

struct GeoBox {
    continent: Continent,
    lat: (f64, f64),
    lon: (f64, f64),
}

impl GeoBox {
    fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.lat.0..=self.lat.1).contains(&lat) && (self.lon.0..=self.lon.1).contains(&lon)
    }
}

// First match wins.
const BOXES: [GeoBox; 3] = [
    GeoBox {
        continent: Continent::Europe,
        lat: (35.0, 72.0),
        lon: (-25.0, 45.0),
    },
    GeoBox {
        continent: Continent::Usa,
        lat: (24.0, 50.0),
        lon: (-125.0, -65.0),
    },
    GeoBox {
        continent: Continent::Asia,
        lat: (-10.0, 55.0),
        lon: (60.0, 150.0),
    },
];

/// Maps a `[longitude, latitude]` pair to a coarse continent. Inputs with
/// fewer than two components are `Unknown`; anything outside the boxes,
/// NaN included, is `Other`.
pub fn classify(geo: &[f64]) -> Continent {
    let [lon, lat, ..] = geo else {
        return Continent::Unknown;
    };
    BOXES
        .iter()
        .find(|b| b.contains(*lon, *lat))
        .map(|b| b.continent)
        .unwrap_or(Continent::Other)
}

impl Display for Continent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Europe => f.write_str("Europe"),
            Self::Usa => f.write_str("USA"),
            Self::Asia => f.write_str("Asia"),
            Self::Other => f.write_str("Other"),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown region '{0}', expected one of Europe, USA, Asia, Other, Unknown, World")]
pub struct UnknownRegion(String);

impl FromStr for Continent {
    type Err = UnknownRegion;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "europe" => Ok(Self::Europe),
            "usa" => Ok(Self::Usa),
            "asia" => Ok(Self::Asia),
            "other" => Ok(Self::Other),
            "unknown" => Ok(Self::Unknown),
            _ => Err(UnknownRegion(s.to_string())),
        }
    }
}

/// A region filter target. `World` keeps every relay and so blocks nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    World,
    Continent(Continent),
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::World => f.write_str("World"),
            Self::Continent(c) => c.fmt(f),
        }
    }
}

impl FromStr for Region {
    type Err = UnknownRegion;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("world") {
            Ok(Self::World)
        } else {
            s.parse().map(Self::Continent)
        }
    }
}

impl From<Continent> for Region {
    fn from(value: Continent) -> Self {
        Self::Continent(value)
    }
}

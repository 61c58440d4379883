use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Object fields whose children are keyed by data rather than by field name.
/// Their keys are kept verbatim when field names are folded to lowercase.
const KEYED_MAPS: [&str; 1] = ["pops"];

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayTopology {
    #[serde(deserialize_with = "null_as_default")]
    pub pops: IndexMap<String, PointOfPresence>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PointOfPresence {
    /// human readable location, e.g. "Frankfurt (Germany)"
    #[serde(deserialize_with = "null_as_default")]
    pub desc: String,
    /// `[longitude, latitude]`, may be short or empty
    #[serde(deserialize_with = "null_as_default")]
    pub geo: Vec<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub relays: Vec<Relay>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Relay {
    #[serde(deserialize_with = "null_as_default")]
    pub ipv4: String,
    #[serde(deserialize_with = "null_as_default")]
    pub port_range: Vec<i64>,
}

impl Relay {
    pub fn port_range(&self) -> Option<(i64, i64)> {
        match self.port_range.as_slice() {
            [start, end, ..] => Some((*start, *end)),
            _ => None,
        }
    }
}

impl RelayTopology {
    /// Parses a GetSDRConfig body. Field names match case-insensitively,
    /// unknown fields are ignored and missing ones take their zero value.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(body)?;
        serde_json::from_value(fold_field_names(value, false))
    }

    pub fn is_empty(&self) -> bool {
        self.pops.is_empty()
    }

    pub fn relay_count(&self) -> usize {
        self.pops.values().map(|pop| pop.relays.len()).sum()
    }

    pub fn iter_relays(&self) -> impl Iterator<Item = (&str, &PointOfPresence, &Relay)> {
        self.pops.iter().flat_map(|(key, pop)| {
            pop.relays
                .iter()
                .map(move |relay| (key.as_str(), pop, relay))
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn fold_field_names(value: Value, keep_keys: bool) -> Value {
    match value {
        Value::Object(object) => {
            let mut folded = Map::with_capacity(object.len());
            for (key, child) in object {
                if keep_keys {
                    folded.insert(key, fold_field_names(child, false));
                } else {
                    let key = key.to_lowercase();
                    let keyed = KEYED_MAPS.contains(&key.as_str());
                    folded.insert(key, fold_field_names(child, keyed));
                }
            }
            Value::Object(folded)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| fold_field_names(item, false))
                .collect(),
        ),
        other => other,
    }
}

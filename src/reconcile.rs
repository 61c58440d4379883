use std::collections::BTreeSet;
use std::fmt::Display;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{FirewallError, TopologyError};
use crate::firewall::{BlockedIpSet, FirewallRuleStore};
use crate::geo::{classify, Continent, Region};
use crate::sdr_api::{fetch_with_retry, RelayTopology};
use crate::App;

/// What the user asked to block. Exactly one mode is active at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// IPs explicitly picked by the user.
    Manual(BTreeSet<String>),
    /// Block every relay outside the region; `World` blocks nothing.
    Region(Region),
}

impl Selection {
    pub fn manual<I, S>(ips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Manual(
            ips.into_iter()
                .map(|ip| ip.as_ref().trim().to_string())
                .filter(|ip| !ip.is_empty())
                .collect(),
        )
    }
}

/// One row per relay. Rows carry no identity beyond their IP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayRow {
    pub blocked: bool,
    pub ip: String,
    pub continent: Continent,
    pub pop_key: String,
    pub pop_description: String,
    pub relay_count: usize,
}

impl RelayRow {
    pub fn region(&self) -> String {
        format!("{}: {}", self.pop_key, self.pop_description)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelayList {
    pub rows: Vec<RelayRow>,
    pub blocked: BlockedIpSet,
    pub continents: BTreeSet<Continent>,
    pub topology: RelayTopology,
}

impl RelayList {
    pub fn from_topology(topology: RelayTopology, blocked: BlockedIpSet) -> Self {
        let mut rows = Vec::with_capacity(topology.relay_count());
        let mut continents = BTreeSet::new();
        for (key, pop) in &topology.pops {
            let continent = classify(&pop.geo);
            continents.insert(continent);
            rows.extend(pop.relays.iter().map(|relay| RelayRow {
                blocked: blocked.contains(&relay.ipv4),
                ip: relay.ipv4.clone(),
                continent,
                pop_key: key.clone(),
                pop_description: pop.desc.clone(),
                relay_count: pop.relays.len(),
            }));
        }

        Self {
            rows,
            blocked,
            continents,
            topology,
        }
    }

    /// Rows whose IP is currently blocked.
    pub fn matched(&self) -> usize {
        self.rows.iter().filter(|row| row.blocked).count()
    }

    pub fn ips(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.ip.clone()).collect()
    }

    /// Regions offered for filtering: continents present, then `World`.
    pub fn region_choices(&self) -> Vec<Region> {
        self.continents
            .iter()
            .copied()
            .map(Region::Continent)
            .chain(std::iter::once(Region::World))
            .collect()
    }

    pub fn status(&self) -> String {
        format!(
            "Firewall: {} IPs blocked | Grid: {} matched",
            self.blocked.len(),
            self.matched()
        )
    }
}

/// The set of IPs that should end up blocked for `selection`.
pub fn compute_target_ips(selection: &Selection, topology: &RelayTopology) -> BTreeSet<String> {
    match selection {
        Selection::Region(Region::World) => BTreeSet::new(),
        Selection::Region(Region::Continent(keep)) => topology
            .pops
            .values()
            .filter(|pop| classify(&pop.geo) != *keep)
            .flat_map(|pop| pop.relays.iter())
            .map(|relay| relay.ipv4.clone())
            .filter(|ip| !ip.is_empty())
            .collect(),
        Selection::Manual(ips) => ips.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockPlan {
    /// Replace the rules so exactly this set is blocked (empty unblocks all).
    Converge(BTreeSet<String>),
    /// Every relay already sits in the chosen continent.
    NothingToBlock(Continent),
    NothingSelected,
}

pub fn plan(selection: &Selection, topology: &RelayTopology) -> BlockPlan {
    let target = compute_target_ips(selection, topology);
    match selection {
        Selection::Region(Region::Continent(keep)) if target.is_empty() => {
            BlockPlan::NothingToBlock(*keep)
        }
        Selection::Manual(_) if target.is_empty() => BlockPlan::NothingSelected,
        _ => BlockPlan::Converge(target),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyReport {
    Applied {
        selection: Selection,
        target: BTreeSet<String>,
        /// Rule state read back after converging.
        confirmed: BlockedIpSet,
    },
    NothingToBlock(Continent),
    NothingSelected,
}

impl ApplyReport {
    pub fn is_converged(&self) -> bool {
        match self {
            Self::Applied {
                target, confirmed, ..
            } => target == confirmed,
            Self::NothingToBlock(_) | Self::NothingSelected => true,
        }
    }
}

impl Display for ApplyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied {
                selection: Selection::Region(Region::World),
                ..
            } => f.write_str("Removed all relay block rules"),
            Self::Applied {
                selection,
                target,
                ..
            } => {
                write!(f, "Updated firewall rules with {} relay IPs", target.len())?;
                match selection {
                    Selection::Region(region) => write!(f, " (filtered: all except {region})"),
                    Selection::Manual(_) => f.write_str(" (manual selection)"),
                }
            }
            Self::NothingToBlock(continent) => {
                write!(f, "No IPs to block (all relays are in {continent})")
            }
            Self::NothingSelected => f.write_str("No IPs selected to block"),
        }
    }
}

/// Fetches the topology and the installed rules, and lays them out as rows.
#[instrument(skip(app))]
pub async fn refresh_cycle<F: FirewallRuleStore>(app: &App<F>) -> Result<RelayList, TopologyError> {
    // one external call at a time: rules first, then the topology
    let blocked = app.firewall.current_blocked_ips().await;
    let topology = fetch_with_retry(&app.sdr, app.config.fetch_attempts).await?;
    let list = RelayList::from_topology(topology, blocked);
    info!(
        msg = "Refreshed relay list",
        rows = list.rows.len(),
        blocked = list.blocked.len(),
        matched = list.matched()
    );
    Ok(list)
}

/// Converges the firewall towards `selection` and reads the rules back.
#[instrument(skip(app, topology))]
pub async fn apply_selection<F: FirewallRuleStore>(
    app: &App<F>,
    selection: &Selection,
    topology: &RelayTopology,
) -> Result<ApplyReport, FirewallError> {
    let target = match plan(selection, topology) {
        BlockPlan::Converge(target) => target,
        BlockPlan::NothingToBlock(continent) => {
            info!(msg = "Nothing to block", %continent);
            return Ok(ApplyReport::NothingToBlock(continent));
        }
        BlockPlan::NothingSelected => {
            info!("No IPs selected");
            return Ok(ApplyReport::NothingSelected);
        }
    };

    app.firewall.converge(&target).await?;
    let confirmed = app.firewall.current_blocked_ips().await;
    if confirmed != target {
        warn!(
            msg = "Firewall state differs from target after converging",
            target = target.len(),
            confirmed = confirmed.len()
        );
    }

    Ok(ApplyReport::Applied {
        selection: selection.clone(),
        target,
        confirmed,
    })
}

use std::collections::BTreeSet;

use crate::error::FirewallError;

/// Addresses named by the installed block rules.
pub type BlockedIpSet = BTreeSet<String>;

#[allow(async_fn_in_trait)]
pub trait FirewallRuleStore {
    /// Union of the remote addresses of every block rule present. Rules that
    /// are missing or cannot be read contribute nothing.
    async fn current_blocked_ips(&self) -> BlockedIpSet;

    /// Replaces all block rules so that exactly `target_ips` is blocked.
    /// An empty target removes every rule.
    async fn converge(&self, target_ips: &BTreeSet<String>) -> Result<(), FirewallError>;
}

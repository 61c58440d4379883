mod command;
#[cfg(test)]
pub(crate) mod fake_netsh;
mod interface;
mod netsh;
mod types;

pub use command::{CommandExecutor, CommandOutput, SystemExecutor};
pub use interface::{BlockedIpSet, FirewallRuleStore};
pub use netsh::NetshRuleStore;
pub use types::{Direction, InvalidPortRange, PortRange, Protocol, RuleSlot, DEFAULT_RELAY_PORTS, RULE_SLOTS};

pub const DEFAULT_RULE_BASE_NAME: &str = "SteamRelayBlock";

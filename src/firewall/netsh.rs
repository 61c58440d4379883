use std::collections::BTreeSet;

use tracing::{debug, info, instrument, warn};

use super::command::CommandExecutor;
use super::interface::{BlockedIpSet, FirewallRuleStore};
use super::types::{PortRange, RuleSlot, RULE_SLOTS};
use crate::error::FirewallError;

const NETSH: &str = "netsh";
const REMOTE_IP_FIELD: &str = "remoteip:";

/// Block rules managed through `netsh advfirewall`.
#[derive(Debug)]
pub struct NetshRuleStore<E> {
    executor: E,
    base_name: String,
    remote_ports: PortRange,
}

impl<E: CommandExecutor> NetshRuleStore<E> {
    pub fn new(executor: E, base_name: impl Into<String>, remote_ports: PortRange) -> Self {
        Self {
            executor,
            base_name: base_name.into(),
            remote_ports,
        }
    }

    pub fn rule_names(&self) -> impl Iterator<Item = String> + '_ {
        RULE_SLOTS
            .iter()
            .map(|slot| slot.rule_name(&self.base_name))
    }

    #[cfg(test)]
    pub(crate) fn executor(&self) -> &E {
        &self.executor
    }

    async fn delete_all(&self) {
        for rule in self.rule_names() {
            match self.executor.execute(NETSH, &delete_args(&rule)).await {
                Ok(output) if !output.success => {
                    debug!(msg = "Rule not deleted", rule, reason = output.error_message());
                }
                Ok(_) => debug!(msg = "Deleted rule", rule),
                Err(err) => warn!(msg = "Failed to run rule delete", rule, ?err),
            }
        }
    }

    async fn create(&self, slot: &RuleSlot, ip_list: &str) -> Result<(), FirewallError> {
        let rule = slot.rule_name(&self.base_name);
        let ports = slot.protocol.has_ports().then_some(self.remote_ports);
        let args = add_args(&rule, slot, ip_list, ports);

        let output = self
            .executor
            .execute(NETSH, &args)
            .await
            .map_err(|err| FirewallError::RuleCreate {
                rule: rule.clone(),
                message: err.to_string(),
            })?;
        if !output.success {
            return Err(FirewallError::RuleCreate {
                rule,
                message: output.error_message(),
            });
        }
        debug!(msg = "Created rule", rule);
        Ok(())
    }
}

impl<E: CommandExecutor> FirewallRuleStore for NetshRuleStore<E> {
    #[instrument(skip(self), fields(base = %self.base_name))]
    async fn current_blocked_ips(&self) -> BlockedIpSet {
        let mut blocked = BlockedIpSet::new();
        for rule in self.rule_names() {
            match self.executor.execute(NETSH, &show_args(&rule)).await {
                Ok(output) => {
                    if !output.success {
                        debug!(msg = "Rule not present", rule);
                    }
                    blocked.extend(parse_remote_ips(&output.stdout));
                }
                Err(err) => warn!(msg = "Failed to query rule, treating as absent", rule, ?err),
            }
        }
        info!(msg = "Loaded firewall rules", blocked = blocked.len());
        blocked
    }

    #[instrument(skip(self, target_ips), fields(base = %self.base_name, targets = target_ips.len()))]
    async fn converge(&self, target_ips: &BTreeSet<String>) -> Result<(), FirewallError> {
        self.delete_all().await;

        if target_ips.is_empty() {
            info!("Removed all block rules");
            return Ok(());
        }

        let ip_list = target_ips
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        for slot in &RULE_SLOTS {
            self.create(slot, &ip_list).await?;
        }
        info!(msg = "Installed block rules", rules = RULE_SLOTS.len(), ips = target_ips.len());
        Ok(())
    }
}

fn rule_args(verb: &str, rule: &str) -> Vec<String> {
    vec![
        String::from("advfirewall"),
        String::from("firewall"),
        String::from(verb),
        String::from("rule"),
        format!("name={rule}"),
    ]
}

pub(crate) fn show_args(rule: &str) -> Vec<String> {
    rule_args("show", rule)
}

pub(crate) fn delete_args(rule: &str) -> Vec<String> {
    rule_args("delete", rule)
}

pub(crate) fn add_args(
    rule: &str,
    slot: &RuleSlot,
    ip_list: &str,
    ports: Option<PortRange>,
) -> Vec<String> {
    let mut args = rule_args("add", rule);
    args.push(format!("dir={}", slot.direction.netsh_arg()));
    args.push(String::from("action=block"));
    args.push(format!("remoteip={ip_list}"));
    args.push(format!("protocol={}", slot.protocol.netsh_arg()));
    if let Some(ports) = ports {
        args.push(format!("remoteport={ports}"));
    }
    args
}

/// Extracts the addresses of the first `RemoteIP:` field in `show rule`
/// output, dropping any `/prefix` suffix.
pub(crate) fn parse_remote_ips(output: &str) -> Vec<String> {
    let Some(field) = output.lines().map(str::trim).find(|line| {
        line.get(..REMOTE_IP_FIELD.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(REMOTE_IP_FIELD))
    }) else {
        return Vec::new();
    };

    field[REMOTE_IP_FIELD.len()..]
        .split(',')
        .map(str::trim)
        .map(|entry| entry.split_once('/').map_or(entry, |(addr, _)| addr))
        .filter(|addr| !addr.is_empty() && !addr.eq_ignore_ascii_case("any"))
        .map(String::from)
        .collect()
}

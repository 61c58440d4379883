use std::net::Ipv4Addr;

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::SortKey;
use crate::firewall::BlockedIpSet;
use crate::geo::Continent;
use crate::probe::Latency;
use crate::reconcile::RelayRow;

#[derive(Debug, Tabled, Serialize)]
struct RelayView {
    #[tabled(rename = "Blocked?")]
    blocked: &'static str,
    #[tabled(rename = "IP Address")]
    ip: String,
    #[tabled(rename = "Ping (ms)")]
    ping: String,
    #[tabled(rename = "Continent")]
    continent: Continent,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Relays")]
    relays: usize,
}

impl RelayView {
    fn new(row: &RelayRow, latency: Latency) -> Self {
        Self {
            blocked: if row.blocked { "Yes" } else { "No" },
            ip: row.ip.clone(),
            ping: latency.to_string(),
            continent: row.continent,
            region: row.region(),
            relays: row.relay_count,
        }
    }
}

/// Dotted quads compare numerically, anything unparseable sorts after them.
fn ip_sort_key(ip: &str) -> (bool, Ipv4Addr, &str) {
    match ip.parse::<Ipv4Addr>() {
        Ok(addr) => (false, addr, ip),
        Err(_) => (true, Ipv4Addr::UNSPECIFIED, ip),
    }
}

/// Pairs rows with their latency (missing entries are pending) and sorts
/// them. The sort is stable, so ties keep document order.
pub fn sorted_rows<'a>(
    rows: &'a [RelayRow],
    latencies: &[Latency],
    sort: SortKey,
) -> Vec<(&'a RelayRow, Latency)> {
    let mut paired: Vec<(&RelayRow, Latency)> = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| (row, latencies.get(idx).copied().unwrap_or_default()))
        .collect();
    match sort {
        SortKey::Pop => {}
        SortKey::Ip => paired.sort_by(|a, b| ip_sort_key(&a.0.ip).cmp(&ip_sort_key(&b.0.ip))),
        SortKey::Latency => paired.sort_by_key(|(_, latency)| *latency),
        SortKey::Continent => paired.sort_by_key(|(row, _)| row.continent),
    }
    paired
}

pub fn relay_table(rows: &[RelayRow], latencies: &[Latency], sort: SortKey) -> String {
    let views = sorted_rows(rows, latencies, sort)
        .into_iter()
        .map(|(row, latency)| RelayView::new(row, latency));
    Table::new(views).with(Style::rounded()).to_string()
}

pub fn relay_json(
    rows: &[RelayRow],
    latencies: &[Latency],
    sort: SortKey,
) -> Result<String, serde_json::Error> {
    let views: Vec<RelayView> = sorted_rows(rows, latencies, sort)
        .into_iter()
        .map(|(row, latency)| RelayView::new(row, latency))
        .collect();
    serde_json::to_string_pretty(&views)
}

pub fn blocked_summary(blocked: &BlockedIpSet) -> String {
    let first: Vec<&str> = blocked.iter().take(3).map(String::as_str).collect();
    if first.is_empty() {
        String::from("Firewall rules loaded. IPs blocked: 0")
    } else {
        format!(
            "Firewall rules loaded. IPs blocked: {}\nFirst 3 IPs: {}",
            blocked.len(),
            first.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{blocked_summary, relay_json, relay_table, sorted_rows};
    use crate::cli::SortKey;
    use crate::firewall::BlockedIpSet;
    use crate::geo::Continent;
    use crate::probe::Latency;
    use crate::reconcile::RelayRow;

    fn row(ip: &str, continent: Continent) -> RelayRow {
        RelayRow {
            blocked: ip.ends_with(".3"),
            ip: ip.to_string(),
            continent,
            pop_key: String::from("fra"),
            pop_description: String::from("Frankfurt"),
            relay_count: 3,
        }
    }

    fn rows() -> Vec<RelayRow> {
        vec![
            row("10.0.0.20", Continent::Usa),
            row("10.0.0.3", Continent::Europe),
            row("garbage", Continent::Unknown),
            row("9.255.0.1", Continent::Asia),
        ]
    }

    #[test]
    fn sorts_ips_numerically() {
        let rows = rows();
        let ips: Vec<&str> = sorted_rows(&rows, &[], SortKey::Ip)
            .iter()
            .map(|(row, _)| row.ip.as_str())
            .collect();
        assert_eq!(ips, ["9.255.0.1", "10.0.0.3", "10.0.0.20", "garbage"]);
    }

    #[test]
    fn sorts_by_latency_with_pending_last() {
        let rows = rows();
        let latencies = [Latency::Timeout, Latency::Millis(30), Latency::Millis(5)];
        let ips: Vec<&str> = sorted_rows(&rows, &latencies, SortKey::Latency)
            .iter()
            .map(|(row, _)| row.ip.as_str())
            .collect();
        assert_eq!(ips, ["garbage", "10.0.0.3", "10.0.0.20", "9.255.0.1"]);
    }

    #[test]
    fn renders_table_columns() {
        let rows = rows();
        let table = relay_table(&rows[..2], &[Latency::Millis(12)], SortKey::Pop);
        for expected in ["Blocked?", "IP Address", "Ping (ms)", "fra: Frankfurt", "USA", "12", "Yes"] {
            assert!(table.contains(expected), "missing {expected} in\n{table}");
        }
    }

    #[test]
    fn renders_json() {
        let rows = rows();
        let json = relay_json(&rows[1..2], &[Latency::Unavailable], SortKey::Pop).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["ip"], "10.0.0.3");
        assert_eq!(value[0]["blocked"], "Yes");
        assert_eq!(value[0]["ping"], "N/A");
        assert_eq!(value[0]["continent"], "Europe");
    }

    #[test]
    fn summarises_blocked_ips() {
        assert_eq!(
            blocked_summary(&BlockedIpSet::new()),
            "Firewall rules loaded. IPs blocked: 0"
        );
        let blocked: BlockedIpSet = ["1.1.1.1", "2.2.2.2", "3.3.3.3", "4.4.4.4"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            blocked_summary(&blocked),
            "Firewall rules loaded. IPs blocked: 4\nFirst 3 IPs: 1.1.1.1, 2.2.2.2, 3.3.3.3"
        );
    }
}

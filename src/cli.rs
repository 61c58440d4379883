use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::Url;

use crate::firewall::{PortRange, DEFAULT_RULE_BASE_NAME};
use crate::geo::Region;
use crate::reconcile::Selection;
use crate::sdr_api::DEFAULT_SDR_CONFIG_URL;
use crate::Config;

#[derive(Parser, Debug)]
#[command(version, about = "Block Steam Datagram Relay servers outside a chosen region", long_about = None)]
pub struct Cli {
    #[arg(long, env = "SDR_CONFIG_URL", default_value = DEFAULT_SDR_CONFIG_URL)]
    pub sdr_config_url: Url,

    /// Prefix of the six firewall rule names.
    #[arg(long, env = "RULE_BASE_NAME", default_value = DEFAULT_RULE_BASE_NAME)]
    pub rule_base_name: String,

    /// Remote port range blocked by the UDP and TCP rules.
    #[arg(long, env = "RELAY_REMOTE_PORTS", default_value = "27015-27068")]
    pub remote_ports: PortRange,

    #[arg(long, env = "PROBE_TIMEOUT_MS", default_value_t = 1000)]
    pub probe_timeout_ms: u64,

    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10)]
    pub http_timeout_secs: u64,

    #[arg(long, env = "FETCH_ATTEMPTS", default_value_t = 3)]
    pub fetch_attempts: usize,

    /// Default log filter, overridden by RUST_LOG.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Do not try to relaunch with administrator rights. A relaunched copy
    /// prints into its own console window; this process waits for it and
    /// reports only whether it succeeded.
    #[arg(long)]
    pub no_elevate: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show every relay with its block state, continent and latency.
    List(ListArgs),
    /// Show the regions that can be used as a filter.
    Regions,
    /// Block relays outside a region, or a hand-picked set of IPs.
    Block(BlockArgs),
    /// Remove all relay block rules.
    Unblock,
    /// Show the IPs blocked by the installed rules.
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value_t = SortKey::Pop)]
    pub sort: SortKey,

    /// Skip latency probes.
    #[arg(long)]
    pub no_probe: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    /// Order of the relay configuration document.
    Pop,
    Ip,
    Latency,
    Continent,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct BlockArgs {
    /// Keep this region (Europe, USA, Asia, Other, Unknown) and block the rest.
    /// `World` blocks nothing.
    #[arg(long)]
    pub region: Option<Region>,

    /// Block exactly these IPs.
    #[arg(long = "ip", value_delimiter = ',', num_args = 1..)]
    pub ips: Vec<String>,
}

impl BlockArgs {
    pub fn selection(&self) -> Selection {
        match self.region {
            Some(region) => Selection::Region(region),
            None => Selection::manual(&self.ips),
        }
    }
}

impl Command {
    pub fn needs_elevation(&self) -> bool {
        matches!(self, Self::Block(_) | Self::Unblock)
    }
}

impl From<&Cli> for Config {
    fn from(args: &Cli) -> Self {
        Self {
            sdr_config_url: args.sdr_config_url.clone(),
            rule_base_name: args.rule_base_name.clone(),
            remote_ports: args.remote_ports,
            probe_timeout: Duration::from_millis(args.probe_timeout_ms),
            http_timeout: Duration::from_secs(args.http_timeout_secs),
            fetch_attempts: args.fetch_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command, SortKey};
    use crate::geo::{Continent, Region};
    use crate::reconcile::Selection;
    use crate::Config;

    #[test]
    fn parses_region_block() {
        let cli = Cli::try_parse_from(["blocker", "block", "--region", "europe"]).unwrap();
        let Command::Block(args) = &cli.command else {
            panic!("expected block");
        };
        assert_eq!(
            args.selection(),
            Selection::Region(Region::Continent(Continent::Europe))
        );
        assert!(cli.command.needs_elevation());
    }

    #[test]
    fn parses_manual_block() {
        let cli = Cli::try_parse_from(["blocker", "block", "--ip", "10.0.0.1,10.0.0.2", "--ip", "10.0.0.1"])
            .unwrap();
        let Command::Block(args) = &cli.command else {
            panic!("expected block");
        };
        assert_eq!(args.selection(), Selection::manual(["10.0.0.1", "10.0.0.2"]));
    }

    #[test]
    fn block_needs_exactly_one_mode() {
        assert!(Cli::try_parse_from(["blocker", "block"]).is_err());
        assert!(Cli::try_parse_from(["blocker", "block", "--region", "asia", "--ip", "1.1.1.1"]).is_err());
        assert!(Cli::try_parse_from(["blocker", "block", "--region", "mars"]).is_err());
    }

    #[test]
    fn defaults_match_config() {
        let cli = Cli::try_parse_from(["blocker", "list", "--sort", "latency"]).unwrap();
        let Command::List(args) = &cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.sort, SortKey::Latency);
        assert!(!cli.command.needs_elevation());

        let config = Config::from(&cli);
        let defaults = Config::default();
        assert_eq!(config.sdr_config_url, defaults.sdr_config_url);
        assert_eq!(config.rule_base_name, defaults.rule_base_name);
        assert_eq!(config.remote_ports, defaults.remote_ports);
        assert_eq!(config.probe_timeout, defaults.probe_timeout);
        assert_eq!(config.fetch_attempts, defaults.fetch_attempts);
    }
}

pub mod cli;
pub mod elevation;
pub mod error;
pub mod firewall;
pub mod geo;
pub mod output;
pub mod probe;
pub mod reconcile;
pub mod sdr_api;
pub mod tracing_setup;
pub mod utils;

use std::time::Duration;

use reqwest::Url;

use firewall::{NetshRuleStore, PortRange, SystemExecutor, DEFAULT_RULE_BASE_NAME};
use probe::DEFAULT_PROBE_TIMEOUT;
use sdr_api::{SdrClient, DEFAULT_SDR_CONFIG_URL};

pub(crate) const USER_AGENT: &str = "sdr-relay-blocker/v0.1.0";

pub struct App<F = NetshRuleStore<SystemExecutor>> {
    sdr: SdrClient,
    firewall: F,
    config: Config,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub sdr_config_url: Url,
    pub rule_base_name: String,
    pub remote_ports: PortRange,
    pub probe_timeout: Duration,
    pub http_timeout: Duration,
    pub fetch_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sdr_config_url: Url::parse(DEFAULT_SDR_CONFIG_URL).expect("default SDR config url"),
            rule_base_name: String::from(DEFAULT_RULE_BASE_NAME),
            remote_ports: PortRange::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            http_timeout: Duration::from_secs(10),
            fetch_attempts: 3,
        }
    }
}

impl App {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let sdr = SdrClient::new(config.sdr_config_url.clone(), config.http_timeout)?;
        let firewall = NetshRuleStore::new(
            SystemExecutor,
            config.rule_base_name.clone(),
            config.remote_ports,
        );
        Ok(Self::with_firewall(sdr, firewall, config))
    }
}

impl<F> App<F> {
    pub fn with_firewall(sdr: SdrClient, firewall: F, config: Config) -> Self {
        Self {
            sdr,
            firewall,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn firewall(&self) -> &F {
        &self.firewall
    }
}

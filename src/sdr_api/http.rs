use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{info, instrument};

use super::interface::RelayTopologySource;
use super::types::RelayTopology;
use crate::error::TopologyError;
use crate::USER_AGENT;

#[derive(Debug)]
pub struct SdrClient {
    client: Client,
    url: Url,
}

impl SdrClient {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, url })
    }
}

impl RelayTopologySource for SdrClient {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_topology(&self) -> Result<RelayTopology, TopologyError> {
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;

        let topology = RelayTopology::from_json(&body)?;
        info!(
            msg = "Retrieved relay topology",
            pops = topology.pops.len(),
            relays = topology.relay_count()
        );

        Ok(topology)
    }
}

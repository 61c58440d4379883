use super::types::RelayTopology;
use crate::error::TopologyError;

#[allow(async_fn_in_trait)]
pub trait RelayTopologySource {
    async fn fetch_topology(&self) -> Result<RelayTopology, TopologyError>;
}

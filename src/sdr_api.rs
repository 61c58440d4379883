mod http;
mod interface;
mod types;

use tracing::instrument;

pub use http::SdrClient;
pub use interface::RelayTopologySource;
pub use types::{PointOfPresence, Relay, RelayTopology};

use crate::error::TopologyError;
use crate::utils::{inspect_err, retry_op};

pub const DEFAULT_SDR_CONFIG_URL: &str =
    "https://api.steampowered.com/ISteamApps/GetSDRConfig/v1/?appid=730";

/// Fetches the topology, retrying transport and parse failures up to
/// `attempts` times before surfacing the last error.
#[instrument(skip(source))]
pub async fn fetch_with_retry<S: RelayTopologySource>(
    source: &S,
    attempts: usize,
) -> Result<RelayTopology, TopologyError> {
    retry_op(attempts, || source.fetch_topology())
        .await
        .map_err(|err| inspect_err("Failed to fetch relay topology", err))
}

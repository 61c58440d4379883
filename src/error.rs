use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("failed to fetch relay topology: {0}")]
    Network(#[from] reqwest::Error),
    #[error("failed to parse relay topology: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FirewallError {
    #[error("Failed to create firewall rule '{rule}': {message}")]
    RuleCreate { rule: String, message: String },
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Firewall(#[from] FirewallError),
}

pub mod http;

pub use http::HttpHost;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

// Environment keys recognized by the orchestration host when starting a
// node. Fork-flag keys are owned by the fork-rules crate.

/// Selected subject variant identifier.
pub const CLIENT_KEY: &str = "SIM_CLIENT";
/// Staged genesis descriptor path.
pub const INIT_GENESIS_KEY: &str = "SIM_INIT_GENESIS";
/// Staged block payload directory.
pub const INIT_BLOCKS_KEY: &str = "SIM_INIT_BLOCKS";
/// Pre-seeded default chain material; set to [`IGNORE_SEED`] so the host
/// does not spin up a seeding container the test never uses.
pub const INIT_CHAIN_KEY: &str = "SIM_INIT_CHAIN";
/// Pre-seeded default key material, same handling as [`INIT_CHAIN_KEY`].
pub const INIT_KEYS_KEY: &str = "SIM_INIT_KEYS";
pub const IGNORE_SEED: &str = "ignore";

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

/// An ephemeral subject instance produced by the host.
#[derive(Clone, Debug)]
pub struct StartedNode {
    pub node_id: String,
    /// Assumed reachable as soon as the host returns it; startup races are
    /// absorbed by the verification protocol's bounded retry.
    pub address: String,
}

/// One structured result record per (test, variant) unit.
#[derive(Clone, Debug)]
pub struct UnitReport {
    pub success: bool,
    /// Absent when the unit failed before a node was provisioned.
    pub node_id: Option<String>,
    /// Label combining fixture path and test name.
    pub name: String,
    pub error: String,
    pub duration: Duration,
}

/// The orchestration-host capability consumed by the executor.
///
/// Delivering a report is also the teardown trigger: the host reclaims the
/// node once its result lands, no separate kill call exists on the success
/// path. Implementations must tolerate concurrent calls from all workers.
#[async_trait]
pub trait SubjectLifecycle: Send + Sync {
    /// Subject variant identifiers, in the host's order.
    async fn list_variants(&self) -> Result<Vec<String>, HostError>;

    /// Provision a node configured through `env`. Synchronous from the
    /// caller's view and may block for seconds.
    async fn start_node(&self, env: &HashMap<String, String>)
        -> Result<StartedNode, HostError>;

    /// Deliver a unit result to the host's reporting sink.
    async fn report_result(&self, report: UnitReport) -> Result<(), HostError>;
}

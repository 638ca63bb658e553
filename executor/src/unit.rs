use std::collections::HashMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use corpus::TestCase;
use fork_rules::UnknownNetwork;
use host::{HostError, SubjectLifecycle, UnitReport};
use staging::{ArtifactStager, StagedArtifacts, StagingError};
use verification::{BlockSelector, Mismatch, QueryError, SubjectClient};

/// Progress of a unit through its lifecycle. A failure at any point skips
/// the remaining intermediate stages and goes straight to `Reported`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitStage {
    Staged,
    Provisioned,
    GenesisChecked,
    HeadChecked,
    Reported,
}

#[derive(Debug, Error)]
pub enum UnitError {
    #[error("staging failed: {0}")]
    Staging(#[from] StagingError),
    // Callers validate networks before scheduling; this arm is defense in
    // depth, not an expected path.
    #[error(transparent)]
    Rules(#[from] UnknownNetwork),
    #[error("provisioning failed: {0}")]
    Provisioning(#[source] HostError),
    #[error("query failed: {0}")]
    Query(#[from] QueryError),
    #[error(transparent)]
    Mismatch(#[from] Mismatch),
}

/// Outcome of one unit, also delivered to the host's reporting sink.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub success: bool,
    pub error: String,
    pub duration: Duration,
}

/// One (test case, subject variant) pair: the smallest independently staged,
/// provisioned, verified, and reported piece of work.
pub struct ExecutionUnit<'a, H> {
    host: &'a H,
    stager: &'a ArtifactStager,
    case: &'a TestCase,
    variant: String,
}

/// Stage bookkeeping for one unit: the assigned node (once provisioned) and
/// per-stage elapsed times, recorded for observability only.
struct Progress {
    node_id: Option<String>,
    stages: Vec<(UnitStage, Duration)>,
    mark: Instant,
}

impl Progress {
    fn new(started: Instant) -> Self {
        Self {
            node_id: None,
            stages: Vec::new(),
            mark: started,
        }
    }

    fn advance(&mut self, stage: UnitStage) {
        let now = Instant::now();
        self.stages.push((stage, now - self.mark));
        self.mark = now;
    }
}

impl<'a, H: SubjectLifecycle> ExecutionUnit<'a, H> {
    pub fn new(host: &'a H, stager: &'a ArtifactStager, case: &'a TestCase, variant: String) -> Self {
        Self {
            host,
            stager,
            case,
            variant,
        }
    }

    /// Run the unit to completion and deliver its result.
    ///
    /// Every exit of [`Self::drive`] — success, staging failure,
    /// provisioning failure, transport failure, verification mismatch —
    /// funnels through the single `report_result` call below, so no unit
    /// finishes without a recorded result.
    pub async fn run(self) -> ExecutionResult {
        info!(test = %self.case.name, file = %self.case.path.display(), variant = %self.variant, "starting unit");
        let started = Instant::now();
        let mut progress = Progress::new(started);

        let outcome = self.drive(&mut progress).await;
        let duration = started.elapsed();
        if let Err(err) = &outcome {
            warn!(test = %self.case.name, variant = %self.variant, %err, "unit failed");
        }

        let result = ExecutionResult {
            success: outcome.is_ok(),
            error: outcome.err().map(|err| err.to_string()).unwrap_or_default(),
            duration,
        };
        let report = UnitReport {
            success: result.success,
            node_id: progress.node_id.clone(),
            name: self.case.label(),
            error: result.error.clone(),
            duration,
        };
        if let Err(err) = self.host.report_result(report).await {
            warn!(test = %self.case.name, %err, "failed delivering result");
        }
        progress.advance(UnitStage::Reported);

        for (stage, elapsed) in &progress.stages {
            debug!(
                test = %self.case.name,
                variant = %self.variant,
                stage = ?stage,
                elapsed_ms = elapsed.as_millis() as u64,
                "stage done"
            );
        }
        result
    }

    async fn drive(&self, progress: &mut Progress) -> Result<(), UnitError> {
        let artifacts = self
            .stager
            .stage(&self.case.vector, &self.case.identity())?;
        progress.advance(UnitStage::Staged);

        let env = self.node_env(&artifacts)?;
        let node = self
            .host
            .start_node(&env)
            .await
            .map_err(UnitError::Provisioning)?;
        progress.node_id = Some(node.node_id);
        progress.advance(UnitStage::Provisioned);

        let client = SubjectClient::new(&node.address);
        let genesis = client.query_hash(BlockSelector::Number(0)).await?;
        verification::verify_genesis(&self.case.vector.genesis.hash, &genesis)?;
        progress.advance(UnitStage::GenesisChecked);

        let head = client.query_hash(BlockSelector::Head).await?;
        verification::verify_best_block(&self.case.vector.best_block, &head)?;
        progress.advance(UnitStage::HeadChecked);
        Ok(())
    }

    /// Node environment: variant selection, staged artifact paths, fork and
    /// engine flags, and the markers telling the host not to pre-seed
    /// default chain or key material.
    fn node_env(&self, artifacts: &StagedArtifacts) -> Result<HashMap<String, String>, UnitError> {
        let mut env = HashMap::new();
        env.insert(host::CLIENT_KEY.to_string(), self.variant.clone());
        env.insert(
            host::INIT_GENESIS_KEY.to_string(),
            artifacts.genesis_path.display().to_string(),
        );
        env.insert(
            host::INIT_BLOCKS_KEY.to_string(),
            artifacts.blocks_dir.display().to_string(),
        );
        env.insert(host::INIT_CHAIN_KEY.to_string(), host::IGNORE_SEED.to_string());
        env.insert(host::INIT_KEYS_KEY.to_string(), host::IGNORE_SEED.to_string());
        fork_rules::apply(
            &self.case.vector.network,
            &self.case.vector.seal_engine,
            &mut env,
        )?;
        Ok(env)
    }
}

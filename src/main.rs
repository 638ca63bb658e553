use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use corpus::deliver_tests;
use executor::ExecutionCoordinator;
use host::HttpHost;
use staging::ArtifactStager;

/// Fixed subdirectory of the test root holding the fixture corpus.
const CORPUS_SUBDIR: &str = "BlockchainTests";

#[derive(Parser, Debug)]
struct Args {
    /// Orchestration host base URI.
    #[arg(long, env = "SIM_HOST")]
    host: String,

    /// Filesystem root containing the fixture corpus.
    #[arg(long, env = "SIM_TEST_ROOT")]
    test_root: PathBuf,

    /// Worker pool size; defaults to available parallelism.
    #[arg(long, env = "SIM_WORKERS")]
    workers: Option<usize>,

    /// Directory receiving staged per-unit artifacts.
    #[arg(long, default_value = ".")]
    staging_root: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    info!(host = %args.host, "connecting to orchestration host");

    let host = Arc::new(HttpHost::new(args.host.as_str()));
    let cases = deliver_tests(args.test_root.join(CORPUS_SUBDIR));

    let mut coordinator =
        ExecutionCoordinator::new(host, ArtifactStager::new(&args.staging_root));
    if let Some(workers) = args.workers {
        coordinator = coordinator.with_workers(workers);
    }

    let summary = coordinator.run(cases).await?;
    info!(
        executed = summary.executed,
        passed = summary.passed,
        failed = summary.failed,
        "run complete"
    );
    Ok(())
}

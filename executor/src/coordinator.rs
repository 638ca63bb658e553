use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use corpus::TestCase;
use host::{HostError, SubjectLifecycle};
use staging::ArtifactStager;

use crate::unit::ExecutionUnit;

/// Aggregate tally over all executed units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub executed: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Fans the test corpus out against every subject variant.
///
/// A fixed pool of workers drains the shared case queue until the producer
/// closes it. Dequeueing transfers ownership of a case to one worker for its
/// whole lifetime; the queue receiver and the host capability are the only
/// shared resources. Completed units report in no particular order.
pub struct ExecutionCoordinator<H> {
    host: Arc<H>,
    stager: ArtifactStager,
    workers: usize,
}

impl<H: SubjectLifecycle + 'static> ExecutionCoordinator<H> {
    pub fn new(host: Arc<H>, stager: ArtifactStager) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|parallelism| parallelism.get())
            .unwrap_or(1);
        Self {
            host,
            stager,
            workers,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Drain `cases` to completion and return the aggregate tally.
    ///
    /// Returns early only if the host cannot enumerate its variants; every
    /// later failure is unit-scoped and lands in the tally instead.
    pub async fn run(&self, cases: mpsc::Receiver<TestCase>) -> Result<RunSummary, HostError> {
        let variants = self.host.list_variants().await?;
        info!(?variants, workers = self.workers, "starting execution");
        if variants.is_empty() {
            warn!("host offers no subject variants, nothing to execute");
            return Ok(RunSummary::default());
        }

        let cases = Arc::new(tokio::sync::Mutex::new(cases));
        let summary = Arc::new(Mutex::new(RunSummary::default()));

        let mut handles = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let host = self.host.clone();
            let stager = self.stager.clone();
            let variants = variants.clone();
            let cases = cases.clone();
            let summary = summary.clone();

            handles.push(tokio::spawn(async move {
                let mut executed = 0usize;
                loop {
                    // Hold the receiver lock only for the dequeue itself so
                    // the other workers keep draining while this one runs.
                    let case = { cases.lock().await.recv().await };
                    let Some(case) = case else { break };

                    for variant in &variants {
                        // The unit owns its variant value; handing workers
                        // the shared loop binding across an await would let
                        // them observe a racing, overwritten value.
                        let variant = variant.clone();
                        let result =
                            ExecutionUnit::new(host.as_ref(), &stager, &case, variant)
                                .run()
                                .await;

                        let mut tally = summary.lock();
                        tally.executed += 1;
                        if result.success {
                            tally.passed += 1;
                        } else {
                            tally.failed += 1;
                        }
                        executed += 1;
                    }
                }
                debug!(worker, num_executed = executed, "worker drained");
            }));
        }

        // Barrier: the run is over once the producer closed the queue and
        // every worker has drained it.
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(%err, "worker panicked");
            }
        }

        let summary = *summary.lock();
        info!(
            executed = summary.executed,
            passed = summary.passed,
            failed = summary.failed,
            "executor finished"
        );
        Ok(summary)
    }
}

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use prospector_common::{RunSummary, SearchTerm};
use prospector_store::LeadStore;

use crate::classifier::Classifier;
use crate::control::RunControl;
use crate::worker::{ListingSource, Worker, WorkerConfig, WorkerReport};

/// Spawns one worker per listing source, waits for all of them, and folds
/// their reports into a run summary. The shared stop signal means a fatal
/// worker takes the rest of the run down with it.
pub struct Orchestrator {
    classifier: Arc<Classifier>,
    store: Arc<dyn LeadStore>,
    control: RunControl,
    worker_config: WorkerConfig,
}

impl Orchestrator {
    pub fn new(
        classifier: Arc<Classifier>,
        store: Arc<dyn LeadStore>,
        control: RunControl,
        worker_config: WorkerConfig,
    ) -> Self {
        Self {
            classifier,
            store,
            control,
            worker_config,
        }
    }

    /// Run every worker to completion. `sources` and `assignments` are
    /// parallel: worker i consumes assignments[i] through sources[i].
    pub async fn run<S>(
        &self,
        sources: Vec<S>,
        assignments: Vec<Vec<SearchTerm>>,
    ) -> RunSummary
    where
        S: ListingSource + Send + Sync + 'static,
    {
        let started = Instant::now();
        let mut handles = Vec::with_capacity(sources.len());

        for (id, (source, terms)) in sources.into_iter().zip(assignments).enumerate() {
            info!(worker = id, terms = terms.len(), "starting worker");
            let worker = Worker::new(
                id,
                source,
                Arc::clone(&self.classifier),
                Arc::clone(&self.store),
                self.control.clone(),
                self.worker_config.clone(),
            );
            handles.push(tokio::spawn(worker.run(terms)));
        }

        let mut reports: Vec<WorkerReport> = Vec::with_capacity(handles.len());
        for (id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    warn!(worker = id, error = %err, "worker task panicked");
                    reports.push(WorkerReport {
                        id,
                        ..Default::default()
                    });
                }
            }
        }

        let final_db_count = match self.store.count().await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "failed to read final lead count");
                0
            }
        };

        RunSummary {
            total_added: reports.iter().map(|r| r.added).sum(),
            per_worker_added: reports.iter().map(|r| r.added).collect(),
            duration_secs: started.elapsed().as_secs(),
            final_db_count,
            stopped: self.control.is_stopped(),
            fatal_stop: self.control.is_fatal(),
        }
    }
}

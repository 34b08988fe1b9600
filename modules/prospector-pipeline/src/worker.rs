use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use tracing::{info, warn};

use prospector_common::{Config, Lead, LeadKeys, ProspectReason, ScrapedBusiness, SearchTerm};
use prospector_store::{InsertOutcome, LeadStore};

use crate::classifier::Classifier;
use crate::control::RunControl;

/// A worker gives up after this many listing failures in a row. Occasional
/// failures are normal; a run of them means the session is wedged.
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Politeness delay with up to 25% random jitter so workers drift apart
/// instead of hitting the target site in lockstep.
fn jittered(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let spread = (base.as_millis() as u64 / 4).max(1);
    base + Duration::from_millis(rand::rng().random_range(0..spread))
}

/// Where a worker's listings come from. Production drives a browser tab;
/// tests script the batches.
#[async_trait]
pub trait ListingSource: Send {
    /// Search for a term and return up to `cap` listing URLs.
    async fn listings(&mut self, term: &SearchTerm, cap: usize) -> Result<Vec<String>>;

    /// Open one listing and extract it. `Ok(None)` means the page loaded
    /// but no usable business could be read from it.
    async fn open(&mut self, url: &str) -> Result<Option<ScrapedBusiness>>;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_results: usize,
    pub min_rating: f64,
    pub listing_delay: Duration,
    pub search_delay: Duration,
}

impl WorkerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_results: config.max_results_per_search,
            min_rating: config.min_rating,
            listing_delay: Duration::from_millis(config.listing_delay_ms),
            search_delay: Duration::from_millis(config.search_delay_ms),
        }
    }
}

/// What one worker did with its share of the search matrix. Skip causes
/// are counted separately so a run report can say why listings were
/// passed over, not just how many.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub id: usize,
    pub added: u32,
    pub skipped_duplicates: u32,
    pub skipped_not_prospect: u32,
    pub skipped_low_rating: u32,
    pub errors: u32,
    /// True when the worker gave up on a failure streak instead of
    /// finishing its assigned terms.
    pub aborted: bool,
}

/// One worker: a listing source plus the shared classifier, store, and
/// stop signal. Consumes its assigned terms in order.
pub struct Worker<S: ListingSource> {
    id: usize,
    source: S,
    classifier: Arc<Classifier>,
    store: Arc<dyn LeadStore>,
    control: RunControl,
    config: WorkerConfig,
}

impl<S: ListingSource> Worker<S> {
    pub fn new(
        id: usize,
        source: S,
        classifier: Arc<Classifier>,
        store: Arc<dyn LeadStore>,
        control: RunControl,
        config: WorkerConfig,
    ) -> Self {
        Self {
            id,
            source,
            classifier,
            store,
            control,
            config,
        }
    }

    pub async fn run(mut self, terms: Vec<SearchTerm>) -> WorkerReport {
        let mut report = WorkerReport {
            id: self.id,
            ..Default::default()
        };
        let mut consecutive_errors = 0u32;

        'terms: for (i, term) in terms.iter().enumerate() {
            if self.control.is_stopped() {
                break;
            }
            if i > 0 {
                tokio::time::sleep(jittered(self.config.search_delay)).await;
            }

            info!(worker = self.id, query = %term.query(), "searching");
            let urls = match self.source.listings(term, self.config.max_results).await {
                Ok(urls) => urls,
                Err(err) => {
                    warn!(worker = self.id, query = %term.query(), error = %err, "search failed");
                    report.errors += 1;
                    continue;
                }
            };
            info!(worker = self.id, count = urls.len(), "listings found");

            for url in &urls {
                if self.control.is_stopped() {
                    break 'terms;
                }
                tokio::time::sleep(jittered(self.config.listing_delay)).await;

                match self.source.open(url).await {
                    Ok(Some(business)) => {
                        consecutive_errors = 0;
                        self.handle_business(business, term, &mut report).await;
                    }
                    Ok(None) => {
                        consecutive_errors = 0;
                        report.skipped_not_prospect += 1;
                    }
                    Err(err) => {
                        warn!(worker = self.id, url = %url, error = %err, "listing failed");
                        report.errors += 1;
                        consecutive_errors += 1;
                        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            warn!(
                                worker = self.id,
                                failures = consecutive_errors,
                                "too many consecutive failures, worker stopping"
                            );
                            report.aborted = true;
                            break 'terms;
                        }
                    }
                }
            }
        }

        info!(
            worker = self.id,
            added = report.added,
            duplicates = report.skipped_duplicates,
            not_prospects = report.skipped_not_prospect,
            low_rated = report.skipped_low_rating,
            errors = report.errors,
            aborted = report.aborted,
            "worker finished"
        );
        report
    }

    async fn handle_business(
        &self,
        business: ScrapedBusiness,
        term: &SearchTerm,
        report: &mut WorkerReport,
    ) {
        if let Some(rating) = business.rating {
            if rating < self.config.min_rating {
                report.skipped_low_rating += 1;
                return;
            }
        }

        // Dedup check up front so known businesses never cost a quality call.
        let keys = LeadKeys {
            name: business.name.clone(),
            location: term.location.clone(),
            source_url: business.source_url.clone(),
            primary_phone: business.phones.first().cloned(),
        };
        match self.store.exists(&keys).await {
            Ok(true) => {
                report.skipped_duplicates += 1;
                return;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(worker = self.id, name = %business.name, error = %err, "dedup check failed");
                report.errors += 1;
                return;
            }
        }

        let decision = self.classifier.classify(&business, &self.control).await;
        if decision.reason == ProspectReason::Stopped {
            // The run is halting; this listing was never judged.
            return;
        }
        if !decision.is_good {
            report.skipped_not_prospect += 1;
            return;
        }

        let lead = Lead::from_business(&business, term, &decision);
        match self.store.insert(&lead).await {
            Ok(InsertOutcome::Inserted) => {
                report.added += 1;
                self.control.lead_recorded();
                info!(
                    worker = self.id,
                    name = %lead.name,
                    reason = %lead.prospect_reason,
                    score = lead.lead_score,
                    "lead added"
                );
            }
            Ok(InsertOutcome::Duplicate) => {
                report.skipped_duplicates += 1;
            }
            Err(err) => {
                warn!(worker = self.id, name = %lead.name, error = %err, "insert failed");
                report.errors += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedAnalyzer, ListingOutcome, ScriptedSource};
    use prospector_store::MemoryLeadStore;

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            max_results: 25,
            min_rating: 3.0,
            listing_delay: Duration::ZERO,
            search_delay: Duration::ZERO,
        }
    }

    fn classifier() -> Arc<Classifier> {
        Arc::new(Classifier::new(Arc::new(FixedAnalyzer::scoring(20)), 60))
    }

    fn worker(
        source: ScriptedSource,
        store: Arc<dyn LeadStore>,
        control: RunControl,
    ) -> Worker<ScriptedSource> {
        Worker::new(0, source, classifier(), store, control, fast_config())
    }

    #[tokio::test]
    async fn good_businesses_become_leads() {
        let source = ScriptedSource::new(vec![vec![
            ListingOutcome::Business(ScriptedSource::business("Blue Door Cafe", 1)),
            ListingOutcome::Business(ScriptedSource::business("North End Bakery", 2)),
        ]]);
        let store = Arc::new(MemoryLeadStore::new());
        let control = RunControl::new(0);

        let report = worker(source, store.clone(), control.clone())
            .run(vec![SearchTerm::new("Minneapolis", "cafe")])
            .await;

        assert_eq!(report.added, 2);
        assert_eq!(report.errors, 0);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(control.leads_added(), 2);
    }

    #[tokio::test]
    async fn low_rated_businesses_are_skipped_without_classification() {
        let mut low = ScriptedSource::business("Dim Diner", 1);
        low.rating = Some(2.0);
        let source = ScriptedSource::new(vec![vec![ListingOutcome::Business(low)]]);
        let counters = source.counters();
        let store = Arc::new(MemoryLeadStore::new());

        let report = worker(source, store.clone(), RunControl::new(0))
            .run(vec![SearchTerm::new("Duluth", "diner")])
            .await;

        assert_eq!(report.added, 0);
        assert_eq!(report.skipped_low_rating, 1);
        assert_eq!(counters.opens(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn repeat_sightings_are_skipped() {
        let source = ScriptedSource::new(vec![vec![
            ListingOutcome::Business(ScriptedSource::business("Blue Door Cafe", 1)),
            ListingOutcome::Business(ScriptedSource::business("Blue Door Cafe", 1)),
        ]]);
        let store = Arc::new(MemoryLeadStore::new());

        let report = worker(source, store.clone(), RunControl::new(0))
            .run(vec![SearchTerm::new("Minneapolis", "cafe")])
            .await;

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped_duplicates, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn consecutive_failures_abort_the_worker() {
        let source = ScriptedSource::new(vec![vec![
            ListingOutcome::Error,
            ListingOutcome::Error,
            ListingOutcome::Error,
            ListingOutcome::Error,
            ListingOutcome::Error,
            ListingOutcome::Business(ScriptedSource::business("Never Reached", 1)),
        ]]);
        let counters = source.counters();
        let store = Arc::new(MemoryLeadStore::new());

        let report = worker(source, store.clone(), RunControl::new(0))
            .run(vec![SearchTerm::new("Minneapolis", "cafe")])
            .await;

        assert_eq!(report.errors, 5);
        assert_eq!(report.added, 0);
        assert!(report.aborted);
        assert_eq!(counters.opens(), 5);
    }

    #[tokio::test]
    async fn a_recovery_resets_the_failure_streak() {
        let source = ScriptedSource::new(vec![vec![
            ListingOutcome::Error,
            ListingOutcome::Error,
            ListingOutcome::Unusable,
            ListingOutcome::Error,
            ListingOutcome::Error,
            ListingOutcome::Business(ScriptedSource::business("Blue Door Cafe", 1)),
        ]]);
        let store = Arc::new(MemoryLeadStore::new());

        let report = worker(source, store.clone(), RunControl::new(0))
            .run(vec![SearchTerm::new("Minneapolis", "cafe")])
            .await;

        assert_eq!(report.errors, 4);
        assert_eq!(report.added, 1);
        assert_eq!(report.skipped_not_prospect, 1);
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn stop_signal_halts_mid_batch() {
        let source = ScriptedSource::new(vec![vec![
            ListingOutcome::Business(ScriptedSource::business("First", 1)),
            ListingOutcome::Business(ScriptedSource::business("Second", 2)),
            ListingOutcome::Business(ScriptedSource::business("Third", 3)),
        ]]);
        let counters = source.counters();
        let store = Arc::new(MemoryLeadStore::new());
        // Target of one lead: the first insert trips the stop flag.
        let control = RunControl::new(1);

        let report = worker(source, store.clone(), control.clone())
            .run(vec![SearchTerm::new("Minneapolis", "cafe")])
            .await;

        assert_eq!(report.added, 1);
        assert!(control.is_stopped());
        assert!(!control.is_fatal());
        assert_eq!(counters.opens(), 1);
    }

    #[tokio::test]
    async fn empty_search_moves_on_to_the_next_term() {
        let source = ScriptedSource::new(vec![
            vec![],
            vec![ListingOutcome::Business(ScriptedSource::business("Blue Door Cafe", 1))],
        ]);
        let counters = source.counters();
        let store = Arc::new(MemoryLeadStore::new());

        let report = worker(source, store.clone(), RunControl::new(0))
            .run(vec![
                SearchTerm::new("Minneapolis", "cafe"),
                SearchTerm::new("St Paul", "cafe"),
            ])
            .await;

        assert_eq!(counters.searches(), 2);
        assert_eq!(report.added, 1);
    }
}

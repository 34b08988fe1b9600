// Test mocks for the pipeline's three trait boundaries:
// - FakePage (DetailPage) — canned selector→text maps
// - FixedAnalyzer (QualityAnalyzer) — fixed score or scripted exhaustion
// - ScriptedSource (ListingSource) — scripted listing batches with shared
//   call counters so tests can assert what ran after a stop

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use prospector_common::{QualityResult, ScrapedBusiness, SearchTerm};

use crate::browse::DetailPage;
use crate::quality::{QualityAnalyzer, QualityError};
use crate::worker::ListingSource;

// ---------------------------------------------------------------------------
// FakePage
// ---------------------------------------------------------------------------

/// Canned detail page. Selectors registered with `.failing()` error on
/// every read, simulating an unstable DOM.
#[derive(Default)]
pub struct FakePage {
    url: String,
    headings: Vec<String>,
    texts: HashMap<String, Vec<String>>,
    attrs: HashMap<(String, String), String>,
    body: String,
    failing: HashSet<String>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn heading(mut self, text: &str) -> Self {
        self.headings.push(text.to_string());
        self
    }

    pub fn text(self, selector: &str, text: &str) -> Self {
        self.texts(selector, &[text])
    }

    pub fn texts(mut self, selector: &str, texts: &[&str]) -> Self {
        self.texts
            .insert(selector.to_string(), texts.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn attr(mut self, selector: &str, attr: &str, value: &str) -> Self {
        self.attrs
            .insert((selector.to_string(), attr.to_string()), value.to_string());
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn failing(mut self, selector: &str) -> Self {
        self.failing.insert(selector.to_string());
        self
    }

    fn check(&self, selector: &str) -> Result<()> {
        if self.failing.contains(selector) {
            bail!("selector {selector:?} is scripted to fail");
        }
        Ok(())
    }
}

#[async_trait]
impl DetailPage for FakePage {
    async fn current_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn headings(&self) -> Result<Vec<String>> {
        Ok(self.headings.clone())
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>> {
        self.check(selector)?;
        Ok(self
            .texts
            .get(selector)
            .and_then(|texts| texts.first())
            .cloned())
    }

    async fn read_all_text(&self, selector: &str, cap: usize) -> Result<Vec<String>> {
        self.check(selector)?;
        Ok(self
            .texts
            .get(selector)
            .map(|texts| texts.iter().take(cap).cloned().collect())
            .unwrap_or_default())
    }

    async fn read_attribute(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        self.check(selector)?;
        Ok(self
            .attrs
            .get(&(selector.to_string(), attr.to_string()))
            .cloned())
    }

    async fn body_text(&self, max_len: usize) -> Result<String> {
        Ok(self.body.chars().take(max_len).collect())
    }
}

// ---------------------------------------------------------------------------
// FixedAnalyzer
// ---------------------------------------------------------------------------

/// Quality analyzer returning one fixed outcome, counting calls.
pub struct FixedAnalyzer {
    outcome: Option<QualityResult>,
    calls: AtomicU32,
}

impl FixedAnalyzer {
    /// Always succeed with the given score.
    pub fn scoring(score: u8) -> Self {
        Self::returning(QualityResult {
            score,
            issues: Vec::new(),
            error: None,
        })
    }

    pub fn returning(result: QualityResult) -> Self {
        Self {
            outcome: Some(result),
            calls: AtomicU32::new(0),
        }
    }

    /// Always fail as if retries were exhausted.
    pub fn exhausted() -> Self {
        Self {
            outcome: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QualityAnalyzer for FixedAnalyzer {
    async fn analyze(&self, _url: &str) -> Result<QualityResult, QualityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Some(result) => Ok(result.clone()),
            None => Err(QualityError::Exhausted {
                attempts: 5,
                last: "scripted failure".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

// ---------------------------------------------------------------------------
// ScriptedSource
// ---------------------------------------------------------------------------

/// Per-listing script for a [`ScriptedSource`].
#[derive(Debug, Clone)]
pub enum ListingOutcome {
    Business(ScrapedBusiness),
    Unusable,
    Error,
}

/// Shared call counters, cloned out of the source before the worker
/// consumes it.
#[derive(Clone, Default)]
pub struct SourceCounters {
    pub searches: Arc<AtomicU32>,
    pub opens: Arc<AtomicU32>,
}

impl SourceCounters {
    pub fn searches(&self) -> u32 {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

/// Listing source that replays scripted batches, one per `listings` call.
pub struct ScriptedSource {
    batches: Mutex<VecDeque<Vec<ListingOutcome>>>,
    by_url: Mutex<HashMap<String, ListingOutcome>>,
    counters: SourceCounters,
    next_id: AtomicU32,
}

impl ScriptedSource {
    pub fn new(batches: Vec<Vec<ListingOutcome>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            by_url: Mutex::new(HashMap::new()),
            counters: SourceCounters::default(),
            next_id: AtomicU32::new(0),
        }
    }

    pub fn counters(&self) -> SourceCounters {
        self.counters.clone()
    }

    /// A minimal good-prospect business (no website) for scripts.
    pub fn business(name: &str, id: u32) -> ScrapedBusiness {
        ScrapedBusiness {
            name: name.to_string(),
            rating: Some(4.5),
            review_count: Some(40),
            source_url: format!("https://maps.example.com/place/{id}"),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ListingSource for ScriptedSource {
    async fn listings(&mut self, _term: &SearchTerm, cap: usize) -> Result<Vec<String>> {
        self.counters.searches.fetch_add(1, Ordering::SeqCst);
        let batch = self
            .batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();

        let mut urls = Vec::new();
        for outcome in batch.into_iter().take(cap) {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let url = format!("https://maps.example.com/listing/{id}");
            self.by_url.lock().unwrap().insert(url.clone(), outcome);
            urls.push(url);
        }
        Ok(urls)
    }

    async fn open(&mut self, url: &str) -> Result<Option<ScrapedBusiness>> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let outcome = self.by_url.lock().unwrap().get(url).cloned();
        match outcome {
            Some(ListingOutcome::Business(business)) => Ok(Some(business)),
            Some(ListingOutcome::Unusable) | None => Ok(None),
            Some(ListingOutcome::Error) => bail!("scripted listing failure"),
        }
    }
}

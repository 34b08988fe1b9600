//! Website quality scoring.
//!
//! Two interchangeable strategies behind [`QualityAnalyzer`]: a local
//! heuristic that fetches the page and applies a fixed penalty schedule,
//! and the external Pagespeed endpoint with bounded exponential backoff.
//! Exhausting the external retries is a fatal failure — the run halts
//! rather than producing leads with unverified quality judgments.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use prospector_common::QualityResult;

const PAGESPEED_BASE_URL: &str = "https://www.googleapis.com/pagespeedonline/v5";

#[derive(Debug, Error)]
pub enum QualityError {
    #[error("Quality scoring exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

#[async_trait]
pub trait QualityAnalyzer: Send + Sync {
    /// Score one website URL, 0–100. Lower = weaker presence.
    async fn analyze(&self, url: &str) -> Result<QualityResult, QualityError>;
    fn name(&self) -> &str;
}

/// Prefix bare domains with https. Businesses frequently list their site
/// without a protocol.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

// --- Local heuristic ---

pub struct HeuristicAnalyzer {
    client: reqwest::Client,
}

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

impl Default for HeuristicAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QualityAnalyzer for HeuristicAnalyzer {
    async fn analyze(&self, url: &str) -> Result<QualityResult, QualityError> {
        let target = normalize_url(url);

        let response = match self.client.get(&target).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                // A site answering with an error page is as weak a presence
                // as no site at all.
                return Ok(QualityResult {
                    score: 0,
                    issues: vec![format!("site returned status {}", r.status())],
                    error: None,
                });
            }
            Err(e) => {
                return Ok(QualityResult {
                    score: 0,
                    issues: vec!["site unreachable".to_string()],
                    error: Some(e.to_string()),
                });
            }
        };

        let html = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Ok(QualityResult {
                    score: 0,
                    issues: vec!["site body unreadable".to_string()],
                    error: Some(e.to_string()),
                });
            }
        };

        let result = score_html(&target, &html);
        info!(url = target.as_str(), score = result.score, "Heuristic quality score");
        Ok(result)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// Fixed penalty schedule over presence signals in the fetched page.
/// Starts at 100 and deducts per missing signal; floor 0.
pub fn score_html(url: &str, html: &str) -> QualityResult {
    let lower = html.to_lowercase();
    let mut score: i32 = 100;
    let mut issues = Vec::new();

    let mut deduct = |points: i32, issue: &str, issues: &mut Vec<String>| {
        score -= points;
        issues.push(issue.to_string());
    };

    if !url.starts_with("https://") {
        deduct(15, "no SSL", &mut issues);
    }
    if !lower.contains("name=\"viewport\"") && !lower.contains("name='viewport'") {
        deduct(20, "no mobile viewport", &mut issues);
    }
    let title_ok = title_of(&lower).is_some_and(|t| (10..=70).contains(&t.chars().count()));
    if !title_ok {
        deduct(10, "missing or weak title", &mut issues);
    }
    if !lower.contains("name=\"description\"") && !lower.contains("name='description'") {
        deduct(10, "no meta description", &mut issues);
    }
    if !lower.contains("<img") {
        deduct(5, "no images", &mut issues);
    }
    let has_contact = lower.contains("tel:")
        || lower.contains("mailto:")
        || email_regex().is_match(&lower)
        || phone_regex().is_match(&lower);
    if !has_contact {
        deduct(10, "no visible contact info", &mut issues);
    }
    let modern = ["flex", "grid", "bootstrap", "tailwind", "react", "webpack", "vite"]
        .iter()
        .any(|needle| lower.contains(needle));
    if !modern {
        deduct(15, "dated layout", &mut issues);
    }

    QualityResult {
        score: score.clamp(0, 100) as u8,
        issues,
        error: None,
    }
}

fn title_of(lower_html: &str) -> Option<&str> {
    let start = lower_html.find("<title")?;
    let open_end = lower_html[start..].find('>')? + start + 1;
    let close = lower_html[open_end..].find("</title>")? + open_end;
    Some(lower_html[open_end..close].trim())
}

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\(?\d[\d\s().\-]{6,}\d").expect("valid regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("valid regex")
});

pub(crate) fn phone_regex() -> &'static Regex {
    &PHONE_RE
}

pub(crate) fn email_regex() -> &'static Regex {
    &EMAIL_RE
}

// --- External scoring service ---

pub struct PagespeedAnalyzer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_attempts: u32,
    initial_backoff: Duration,
    attempt_timeout: Duration,
}

impl PagespeedAnalyzer {
    pub fn new(
        api_key: &str,
        max_attempts: u32,
        initial_backoff: Duration,
        attempt_timeout: Duration,
    ) -> Self {
        Self::with_base_url(api_key, PAGESPEED_BASE_URL, max_attempts, initial_backoff, attempt_timeout)
    }

    pub fn with_base_url(
        api_key: &str,
        base_url: &str,
        max_attempts: u32,
        initial_backoff: Duration,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(70))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_attempts: max_attempts.max(1),
            initial_backoff,
            attempt_timeout,
        }
    }

    async fn attempt(&self, target: &str) -> Result<PagespeedResponse, String> {
        let mut query: Vec<(&str, &str)> = vec![
            ("url", target),
            ("category", "performance"),
            ("category", "accessibility"),
            ("category", "best-practices"),
            ("category", "seo"),
        ];
        if !self.api_key.is_empty() {
            query.push(("key", self.api_key.as_str()));
        }

        let response = self
            .client
            .get(format!("{}/runPagespeed", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {status}"));
        }

        response
            .json::<PagespeedResponse>()
            .await
            .map_err(|e| format!("malformed body: {e}"))
    }
}

/// Backoff before the given 1-based attempt: the first attempt never waits,
/// the nth retry (n ≥ 2) waits `initial × 2^(n−2)`.
pub fn backoff_for(initial: Duration, attempt: u32) -> Duration {
    if attempt <= 1 {
        Duration::ZERO
    } else {
        // Saturate so an absurd attempt budget cannot overflow the wait.
        initial.saturating_mul(2u32.saturating_pow((attempt - 2).min(30)))
    }
}

#[async_trait]
impl QualityAnalyzer for PagespeedAnalyzer {
    async fn analyze(&self, url: &str) -> Result<QualityResult, QualityError> {
        let target = normalize_url(url);
        let mut last = String::from("no attempts made");

        for attempt in 1..=self.max_attempts {
            let wait = backoff_for(self.initial_backoff, attempt);
            if !wait.is_zero() {
                let jitter = Duration::from_millis(rand::rng().random_range(0..250));
                tokio::time::sleep(wait + jitter).await;
            }

            // An attempt that neither succeeds nor fails within the hard
            // timeout counts as a failed attempt.
            match tokio::time::timeout(self.attempt_timeout, self.attempt(&target)).await {
                Ok(Ok(body)) => match body.overall() {
                    Some(result) => {
                        info!(
                            url = target.as_str(),
                            score = result.score,
                            attempt,
                            "Pagespeed quality score"
                        );
                        return Ok(result);
                    }
                    None => {
                        last = "no category scores in response".to_string();
                        warn!(url = target.as_str(), attempt, "Pagespeed response had no scores");
                    }
                },
                Ok(Err(e)) => {
                    warn!(url = target.as_str(), attempt, error = %e, "Pagespeed attempt failed");
                    last = e;
                }
                Err(_) => {
                    last = format!("timed out after {}s", self.attempt_timeout.as_secs());
                    warn!(url = target.as_str(), attempt, "Pagespeed attempt timed out");
                }
            }
        }

        Err(QualityError::Exhausted {
            attempts: self.max_attempts,
            last,
        })
    }

    fn name(&self) -> &str {
        "pagespeed"
    }
}

#[derive(Debug, Deserialize)]
struct PagespeedResponse {
    #[serde(rename = "lighthouseResult")]
    lighthouse: Option<LighthouseResult>,
}

#[derive(Debug, Deserialize)]
struct LighthouseResult {
    categories: Categories,
}

#[derive(Debug, Default, Deserialize)]
struct Categories {
    performance: Option<Category>,
    accessibility: Option<Category>,
    #[serde(rename = "best-practices")]
    best_practices: Option<Category>,
    seo: Option<Category>,
}

#[derive(Debug, Deserialize)]
struct Category {
    score: Option<f64>,
}

impl PagespeedResponse {
    /// Average the category sub-scores (0–1) equally into a 0–100 score.
    fn overall(&self) -> Option<QualityResult> {
        let categories = &self.lighthouse.as_ref()?.categories;
        let named = [
            ("performance", &categories.performance),
            ("accessibility", &categories.accessibility),
            ("best practices", &categories.best_practices),
            ("seo", &categories.seo),
        ];

        let mut sum = 0.0;
        let mut count = 0u32;
        let mut issues = Vec::new();
        for (label, category) in named {
            if let Some(score) = category.as_ref().and_then(|c| c.score) {
                sum += score;
                count += 1;
                if score < 0.5 {
                    issues.push(format!("low {label} score"));
                }
            }
        }
        if count == 0 {
            return None;
        }

        Some(QualityResult {
            score: (sum / f64::from(count) * 100.0).round() as u8,
            issues,
            error: None,
        })
    }
}

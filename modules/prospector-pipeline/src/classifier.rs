//! Prospect classification.
//!
//! Cheap, explainable host rules run first; only a business with a real,
//! self-hosted site pays for a quality-analyzer call. Rules are an ordered
//! list evaluated first-match-wins, kept as data so deployments can extend
//! them without touching the decision logic.

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use prospector_common::{ProspectDecision, ProspectReason, ScrapedBusiness};

use crate::control::RunControl;
use crate::quality::{normalize_url, QualityAnalyzer, QualityError};

/// One ordered classification rule: a website whose host contains any of
/// the needles gets the outcome without an analyzer call.
#[derive(Debug, Clone)]
pub struct HostRule {
    pub reason: ProspectReason,
    pub needles: Vec<String>,
}

/// Default allow-lists: social/directory presences, then low-effort
/// site-builder platforms.
pub fn default_rules() -> Vec<HostRule> {
    let social = [
        "facebook.com",
        "instagram.com",
        "yelp.com",
        "tripadvisor.",
        "yellowpages.com",
        "linkedin.com",
        "linktr.ee",
        "foursquare.com",
        "nextdoor.com",
    ];
    let diy = [
        "wixsite.com",
        "wix.com",
        "squarespace.com",
        "weebly.com",
        "godaddysites.com",
        "webnode.",
        "site123.me",
        "jimdosite.com",
        "wordpress.com",
        "blogspot.com",
    ];

    vec![
        HostRule {
            reason: ProspectReason::SocialOrDirectory,
            needles: social.iter().map(|s| s.to_string()).collect(),
        },
        HostRule {
            reason: ProspectReason::DiyPlatform,
            needles: diy.iter().map(|s| s.to_string()).collect(),
        },
    ]
}

pub struct Classifier {
    analyzer: Arc<dyn QualityAnalyzer>,
    rules: Vec<HostRule>,
    threshold: u8,
}

impl Classifier {
    pub fn new(analyzer: Arc<dyn QualityAnalyzer>, threshold: u8) -> Self {
        Self {
            analyzer,
            rules: default_rules(),
            threshold,
        }
    }

    pub fn with_rules(mut self, rules: Vec<HostRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Decide whether a business is a good prospect. First match wins:
    /// no website, then the host rules in order, then the quality score
    /// against the threshold. Checks the stop signal before the expensive
    /// analyzer call; a fatal analyzer failure trips it for everyone.
    pub async fn classify(
        &self,
        business: &ScrapedBusiness,
        control: &RunControl,
    ) -> ProspectDecision {
        if control.is_stopped() {
            return ProspectDecision::stopped();
        }

        let website = business
            .website
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty());
        let Some(website) = website else {
            return ProspectDecision::good(ProspectReason::NoWebsite, None);
        };

        let Some(host) = host_of(website) else {
            // An unparseable website field is as good as no site.
            debug!(website, "Website URL did not parse, treating as absent");
            return ProspectDecision::good(ProspectReason::NoWebsite, None);
        };

        for rule in &self.rules {
            if rule.needles.iter().any(|needle| host.contains(needle.as_str())) {
                return ProspectDecision::good(rule.reason, None);
            }
        }

        match self.analyzer.analyze(website).await {
            Ok(quality) if quality.score < self.threshold => {
                ProspectDecision::good(ProspectReason::PoorQuality, Some(quality.score))
            }
            Ok(quality) => {
                ProspectDecision::not_good(ProspectReason::HasQualityWebsite, Some(quality.score))
            }
            Err(e @ QualityError::Exhausted { .. }) => {
                warn!(website, error = %e, "Quality scoring is down, halting the run");
                control.stop_fatal();
                ProspectDecision::stopped()
            }
        }
    }
}

fn host_of(website: &str) -> Option<String> {
    Url::parse(&normalize_url(website))
        .ok()?
        .host_str()
        .map(str::to_lowercase)
}

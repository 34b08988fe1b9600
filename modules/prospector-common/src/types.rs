use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Search input ---

/// One cell of the location × category matrix. Consumed once by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchTerm {
    pub location: String,
    pub category: String,
}

impl SearchTerm {
    pub fn new(location: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            category: category.into(),
        }
    }

    /// The query string typed into the map search box.
    pub fn query(&self) -> String {
        format!("{} in {}", self.category, self.location)
    }
}

// --- Extraction output ---

/// Raw extraction result for one listing. Built once by the extractor,
/// never mutated afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapedBusiness {
    pub name: String,
    pub address: Option<String>,
    /// Distinct phone numbers in discovery order.
    pub phones: Vec<String>,
    /// Distinct email addresses in discovery order.
    pub emails: Vec<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    pub category: Option<String>,
    /// Canonical listing URL.
    pub source_url: String,
}

impl ScrapedBusiness {
    /// Add a phone number unless an equal one (case-insensitively) is
    /// already recorded. Insertion order is preserved.
    pub fn add_phone(&mut self, phone: &str) {
        let phone = phone.trim();
        if phone.is_empty() {
            return;
        }
        if !self.phones.iter().any(|p| p.eq_ignore_ascii_case(phone)) {
            self.phones.push(phone.to_string());
        }
    }

    /// Add an email address unless an equal one (case-insensitively) is
    /// already recorded. Insertion order is preserved.
    pub fn add_email(&mut self, email: &str) {
        let email = email.trim();
        if email.is_empty() {
            return;
        }
        if !self.emails.iter().any(|e| e.eq_ignore_ascii_case(email)) {
            self.emails.push(email.to_string());
        }
    }
}

// --- Quality scoring ---

/// Outcome of scoring one website URL. Ephemeral: folded into the lead,
/// never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityResult {
    /// 0–100. Lower means a weaker web presence, i.e. a better prospect.
    pub score: u8,
    pub issues: Vec<String>,
    pub error: Option<String>,
}

// --- Classification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectReason {
    NoWebsite,
    SocialOrDirectory,
    DiyPlatform,
    PoorQuality,
    HasQualityWebsite,
    Stopped,
}

impl ProspectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProspectReason::NoWebsite => "no_website",
            ProspectReason::SocialOrDirectory => "social_or_directory",
            ProspectReason::DiyPlatform => "diy_platform",
            ProspectReason::PoorQuality => "poor_quality",
            ProspectReason::HasQualityWebsite => "has_quality_website",
            ProspectReason::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ProspectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived deterministically from a business's website field (plus one
/// quality score when needed). Gates whether a lead is created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProspectDecision {
    pub is_good: bool,
    pub reason: ProspectReason,
    pub quality_score: Option<u8>,
}

impl ProspectDecision {
    pub fn good(reason: ProspectReason, quality_score: Option<u8>) -> Self {
        Self {
            is_good: true,
            reason,
            quality_score,
        }
    }

    pub fn not_good(reason: ProspectReason, quality_score: Option<u8>) -> Self {
        Self {
            is_good: false,
            reason,
            quality_score,
        }
    }

    pub fn stopped() -> Self {
        Self::not_good(ProspectReason::Stopped, None)
    }
}

// --- Persisted lead ---

/// Candidate-key view of a lead. A lead already exists when any one of the
/// three keys matches: (name, location), source URL, (name, primary phone).
#[derive(Debug, Clone)]
pub struct LeadKeys {
    pub name: String,
    pub location: String,
    pub source_url: String,
    pub primary_phone: Option<String>,
}

/// A qualifying business, persisted once on first sighting. Subsequent
/// sightings are skipped, never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub category: Option<String>,
    pub primary_phone: Option<String>,
    pub primary_email: Option<String>,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    /// 0 = best prospect (no web presence), higher = stronger presence.
    pub website_quality_score: u8,
    pub lead_score: u8,
    pub prospect_reason: ProspectReason,
    pub source_url: String,
    pub discovered_at: DateTime<Utc>,
}

impl Lead {
    /// Build a lead from a classified business. The primary phone/email are
    /// the first elements of the discovery-ordered sets.
    pub fn from_business(
        business: &ScrapedBusiness,
        term: &SearchTerm,
        decision: &ProspectDecision,
    ) -> Self {
        let website_quality_score = decision.quality_score.unwrap_or(0);
        Self {
            id: Uuid::new_v4(),
            name: business.name.clone(),
            location: term.location.clone(),
            category: business.category.clone().or_else(|| Some(term.category.clone())),
            primary_phone: business.phones.first().cloned(),
            primary_email: business.emails.first().cloned(),
            phones: business.phones.clone(),
            emails: business.emails.clone(),
            website: business.website.clone(),
            rating: business.rating,
            review_count: business.review_count,
            website_quality_score,
            lead_score: lead_score(business.rating, business.review_count, website_quality_score),
            prospect_reason: decision.reason,
            source_url: business.source_url.clone(),
            discovered_at: Utc::now(),
        }
    }

    pub fn keys(&self) -> LeadKeys {
        LeadKeys {
            name: self.name.clone(),
            location: self.location.clone(),
            source_url: self.source_url.clone(),
            primary_phone: self.primary_phone.clone(),
        }
    }
}

/// Overall ranking score, 0–100. Weighting: 30 points for rating, 30 for
/// review volume (capped at 100 reviews), 40 for inverted website quality,
/// so a well-reviewed business with no web presence ranks highest.
pub fn lead_score(rating: Option<f64>, review_count: Option<u32>, quality: u8) -> u8 {
    let rating_part = rating.unwrap_or(0.0).clamp(0.0, 5.0) / 5.0 * 30.0;
    let review_part = (review_count.unwrap_or(0).min(100) as f64) / 100.0 * 30.0;
    let quality_part = (100.0 - f64::from(quality.min(100))) / 100.0 * 40.0;
    (rating_part + review_part + quality_part).round() as u8
}

// --- Run output ---

/// Summary emitted at run completion, partial failures included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_added: u32,
    pub per_worker_added: Vec<u32>,
    pub duration_secs: u64,
    pub final_db_count: u64,
    /// True when the run was halted early for any reason (lead target
    /// reached or fatal failure) rather than consuming every term.
    pub stopped: bool,
    /// True when the halt was a fatal scoring-service failure. Implies
    /// `stopped`.
    pub fatal_stop: bool,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Discovery Run Complete ===")?;
        writeln!(f, "Leads added:    {}", self.total_added)?;
        for (i, added) in self.per_worker_added.iter().enumerate() {
            writeln!(f, "  worker {i}:     {added}")?;
        }
        writeln!(f, "Duration:       {}s", self.duration_secs)?;
        writeln!(f, "Database total: {}", self.final_db_count)?;
        if self.fatal_stop {
            writeln!(f, "Run halted early: quality scoring unavailable")?;
        } else if self.stopped {
            writeln!(f, "Run halted early: lead target reached")?;
        }
        Ok(())
    }
}

//! Best-effort extraction of one business record from a listing detail page.
//!
//! The target DOM is unstable by definition, so every field is attempted
//! independently and a failed read degrades that field to absent. Only a
//! missing name makes the whole record unusable.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use prospector_common::ScrapedBusiness;

use crate::browse::DetailPage;
use crate::quality::{email_regex, phone_regex};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 100;

/// Heading texts that are navigation or boilerplate, never a business name.
const BOILERPLATE_HEADINGS: &[&str] = &[
    "results",
    "sponsored",
    "menu",
    "sign in",
    "directions",
    "reviews",
    "photos",
    "about",
    "overview",
    "people also search for",
];

const ADDRESS_SELECTORS: &[&str] = &[
    "[data-item-id='address']",
    "button[aria-label^='Address']",
];
const PHONE_SELECTORS: &[&str] = &[
    "[data-item-id^='phone']",
    "button[aria-label^='Phone']",
];
const WEBSITE_SELECTORS: &[&str] = &[
    "a[data-item-id='authority']",
    "a[aria-label^='Website']",
];
const RATING_SELECTORS: &[&str] = &[
    "[role='img'][aria-label*='star']",
    "span[aria-label*='star']",
];
const REVIEW_SELECTORS: &[&str] = &[
    "[aria-label*='review']",
    "button[aria-label*='review']",
];
const CATEGORY_SELECTORS: &[&str] = &["button[jsaction*='category']"];

/// Pull a structured record out of the page currently showing one listing.
/// Returns `None` only when no name can be derived from either a plausible
/// heading or the canonical URL slug; never errors on a well-formed page.
pub async fn extract(page: &dyn DetailPage) -> Option<ScrapedBusiness> {
    let source_url = page.current_url().await.unwrap_or_default();

    let name = match heading_name(page).await {
        Some(name) => name,
        None => match name_from_slug(&source_url) {
            Some(name) => name,
            None => {
                debug!(url = source_url.as_str(), "No name derivable, discarding listing");
                return None;
            }
        },
    };

    let mut business = ScrapedBusiness {
        name,
        source_url,
        ..Default::default()
    };

    business.address = first_text(page, ADDRESS_SELECTORS).await.map(strip_label);

    for text in all_text(page, PHONE_SELECTORS).await {
        if let Some(phone) = phone_regex().find(&text) {
            business.add_phone(phone.as_str());
        }
    }

    business.website = first_attribute(page, WEBSITE_SELECTORS, "href")
        .await
        .filter(|href| !href.is_empty());

    business.rating = first_attribute(page, RATING_SELECTORS, "aria-label")
        .await
        .and_then(|label| parse_rating(&label));

    business.review_count = first_text(page, REVIEW_SELECTORS)
        .await
        .and_then(|text| parse_review_count(&text));

    business.category = first_text(page, CATEGORY_SELECTORS).await;

    // Sweep the visible text for contacts the structured fields missed.
    if let Ok(body) = page.body_text(20_000).await {
        for m in phone_regex().find_iter(&body).take(5) {
            if digit_count(m.as_str()) >= 7 {
                business.add_phone(m.as_str());
            }
        }
        for m in email_regex().find_iter(&body).take(5) {
            business.add_email(m.as_str());
        }
    }

    Some(business)
}

async fn heading_name(page: &dyn DetailPage) -> Option<String> {
    let headings = page.headings().await.ok()?;
    headings.into_iter().find(|h| plausible_name(h))
}

/// A plausible business name: sensible length and not a boilerplate label.
fn plausible_name(text: &str) -> bool {
    let trimmed = text.trim();
    let chars = trimmed.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return false;
    }
    let lower = trimmed.to_lowercase();
    !BOILERPLATE_HEADINGS.contains(&lower.as_str())
}

/// Derive a name from the canonical URL's slug, e.g.
/// `/maps/place/Blue+Door+Cafe/@44.97,-93.26` → "Blue Door Cafe".
pub fn name_from_slug(source_url: &str) -> Option<String> {
    const ROUTE_SEGMENTS: &[&str] = &["maps", "place", "search", "data", "dir"];

    let parsed = Url::parse(source_url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .filter(|s| !s.starts_with('@') && !s.contains('='))
        .filter(|s| !ROUTE_SEGMENTS.contains(&s.to_lowercase().as_str()))
        .next_back()?;

    let decoded = percent_encoding::percent_decode_str(segment)
        .decode_utf8()
        .ok()?;
    let name = decoded
        .replace(['+', '-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    plausible_name(&name).then_some(name)
}

async fn first_text(page: &dyn DetailPage, selectors: &[&str]) -> Option<String> {
    for selector in selectors {
        if let Ok(Some(text)) = page.read_text(selector).await {
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

async fn all_text(page: &dyn DetailPage, selectors: &[&str]) -> Vec<String> {
    for selector in selectors {
        if let Ok(texts) = page.read_all_text(selector, 8).await {
            if !texts.is_empty() {
                return texts;
            }
        }
    }
    Vec::new()
}

async fn first_attribute(page: &dyn DetailPage, selectors: &[&str], attr: &str) -> Option<String> {
    for selector in selectors {
        if let Ok(Some(value)) = page.read_attribute(selector, attr).await {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Drop an "Address: " style prefix left in button text.
fn strip_label(text: String) -> String {
    match text.split_once(':') {
        Some((label, rest)) if label.len() <= 12 && !rest.trim().is_empty() => {
            rest.trim().to_string()
        }
        _ => text,
    }
}

static RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[.,]\d+|\d+)").expect("valid regex"));

static REVIEW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.,\s]+)").expect("valid regex"));

fn parse_rating(label: &str) -> Option<f64> {
    let raw = RATING_RE.find(label)?.as_str().replace(',', ".");
    let rating: f64 = raw.parse().ok()?;
    (0.0..=5.0).contains(&rating).then_some(rating)
}

fn parse_review_count(text: &str) -> Option<u32> {
    let raw: String = REVIEW_RE
        .find(text)?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    raw.parse().ok()
}

fn digit_count(text: &str) -> usize {
    text.chars().filter(char::is_ascii_digit).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;

    #[tokio::test]
    async fn full_listing_extracts_every_field() {
        let page = FakePage::new("https://maps.example.com/maps/place/Blue+Door+Cafe/@44.97,-93.26,17z")
            .heading("Blue Door Cafe")
            .text("[data-item-id='address']", "Address: 100 Main St, Minneapolis")
            .texts("[data-item-id^='phone']", &["Phone: +1 612 555 0100"])
            .attr("a[data-item-id='authority']", "href", "https://bluedoor.example")
            .attr("[role='img'][aria-label*='star']", "aria-label", "4.6 stars")
            .text("[aria-label*='review']", "1,234 reviews")
            .text("button[jsaction*='category']", "Cafe")
            .body("Call us at +1 612 555 0100 or email hello@bluedoor.example");

        let business = extract(&page).await.expect("record should extract");
        assert_eq!(business.name, "Blue Door Cafe");
        assert_eq!(business.address.as_deref(), Some("100 Main St, Minneapolis"));
        assert_eq!(business.phones, vec!["+1 612 555 0100"]);
        assert_eq!(business.emails, vec!["hello@bluedoor.example"]);
        assert_eq!(business.website.as_deref(), Some("https://bluedoor.example"));
        assert_eq!(business.rating, Some(4.6));
        assert_eq!(business.review_count, Some(1234));
        assert_eq!(business.category.as_deref(), Some("Cafe"));
    }

    #[tokio::test]
    async fn failed_fields_degrade_to_absent() {
        let page = FakePage::new("https://maps.example.com/maps/place/Blue+Door+Cafe")
            .heading("Blue Door Cafe")
            .failing("[data-item-id='address']")
            .failing("button[aria-label^='Address']");

        let business = extract(&page).await.expect("record should extract");
        assert_eq!(business.name, "Blue Door Cafe");
        assert!(business.address.is_none());
        assert!(business.phones.is_empty());
        assert!(business.rating.is_none());
    }

    #[tokio::test]
    async fn boilerplate_heading_falls_back_to_slug() {
        let page =
            FakePage::new("https://maps.example.com/maps/place/Blue+Door+Cafe/@44.97,-93.26,17z")
                .heading("Results");

        let business = extract(&page).await.expect("record should extract");
        assert_eq!(business.name, "Blue Door Cafe");
    }

    #[tokio::test]
    async fn no_derivable_name_discards_the_record() {
        let page = FakePage::new("https://maps.example.com/maps/search/");
        assert!(extract(&page).await.is_none());
    }

    #[tokio::test]
    async fn structured_and_body_phones_dedup_case_insensitively() {
        let page = FakePage::new("https://maps.example.com/maps/place/Acme+Plumbing")
            .heading("Acme Plumbing")
            .texts("[data-item-id^='phone']", &["+1 218 555 0100"])
            .body("Office: +1 218 555 0100, after hours +1 218 555 0199, SALES@ACME.EXAMPLE and sales@acme.example");

        let business = extract(&page).await.expect("record should extract");
        assert_eq!(business.phones, vec!["+1 218 555 0100", "+1 218 555 0199"]);
        assert_eq!(business.emails, vec!["SALES@ACME.EXAMPLE"]);
    }

    #[test]
    fn slug_names_are_cleaned_and_validated() {
        assert_eq!(
            name_from_slug("https://maps.example.com/maps/place/blue-door-cafe"),
            Some("blue door cafe".to_string())
        );
        assert_eq!(
            name_from_slug("https://maps.example.com/maps/place/Caf%C3%A9+Zupas/@44.9,-93.2"),
            Some("Café Zupas".to_string())
        );
        assert_eq!(name_from_slug("https://maps.example.com/maps/search/"), None);
        assert_eq!(name_from_slug("not a url"), None);
    }

    #[test]
    fn rating_and_review_parsing() {
        assert_eq!(parse_rating("4.6 stars"), Some(4.6));
        assert_eq!(parse_rating("4,6 Sterne"), Some(4.6));
        assert_eq!(parse_rating("48 stars"), None);
        assert_eq!(parse_review_count("1,234 reviews"), Some(1234));
        assert_eq!(parse_review_count("(87)"), Some(87));
        assert_eq!(parse_review_count("no reviews yet"), None);
    }
}

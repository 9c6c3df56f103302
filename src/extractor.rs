use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::{PromoError, Result};
use crate::result_store::{PromoStatus, UNKNOWN_ORGANIZATION};

/// Names longer than this are a sentence the pattern swallowed, not a name.
const MAX_NAME_LEN: usize = 80;

/// What a valid promo page says about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDetails {
    pub organization: String,
    pub status: PromoStatus,
    pub expiration_date: Option<String>,
}

pub struct Extractor {
    data_selector: Selector,
    // email domains and university names, tried in order
    affiliation_patterns: Vec<Regex>,
    // "X employees", "members who work at X", ...
    indicator_patterns: Vec<Regex>,
    expiration_regex: Regex,
    tag_regex: Regex,
    whitespace_regex: Regex,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        let data_selector = Selector::parse(r#"script[type="application/json"]"#)
            .map_err(|e| PromoError::Selector(e.to_string()))?;

        let affiliation_patterns = [
            r"@(\w+)\.edu",
            r"@(\w+)\.com",
            r"@(\w+)\.org",
            r"(university\s+of\s+\w+)",
            r"(\w+\s+university)",
        ]
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

        let indicator_patterns = [
            r"only.*?members who work at ([^,.]+)",
            r"([^,.]+) discover a quicker way",
            r"([^,.]+) employees",
            r"([^,.]+) staff",
        ]
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Extractor {
            data_selector,
            affiliation_patterns,
            indicator_patterns,
            expiration_regex: Regex::new(r"(?i)promotion ended.*?on\s+(\d{1,2}/\d{1,2}/\d{4})")?,
            tag_regex: Regex::new(r"<[^>]*>")?,
            whitespace_regex: Regex::new(r"\s+")?,
        })
    }

    /// Organization name for a promo page, or `UNKNOWN_ORGANIZATION`.
    pub fn extract_organization(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        let page_props = self.page_props(&document);
        self.organization_from(&document, &page_props)
    }

    /// Organization, status and expiration date in one parse. `now` decides
    /// whether an embedded end date is already past.
    pub fn inspect(&self, html: &str, now: DateTime<Utc>) -> PageDetails {
        let document = Html::parse_document(html);
        let page_props = self.page_props(&document);

        let organization = self.organization_from(&document, &page_props);
        let (status, expiration_date) = self.status_from(html, &page_props, now);

        PageDetails {
            organization,
            status,
            expiration_date,
        }
    }

    fn organization_from(&self, document: &Html, page_props: &[Value]) -> String {
        self.organization_from_data(page_props)
            .or_else(|| self.organization_from_text(&visible_text(document).to_lowercase()))
            .unwrap_or_else(|| UNKNOWN_ORGANIZATION.to_string())
    }

    /// `props.pageProps` of every embedded JSON blob that parses.
    fn page_props(&self, document: &Html) -> Vec<Value> {
        document
            .select(&self.data_selector)
            .filter_map(|script| {
                let raw: String = script.text().collect();
                serde_json::from_str::<Value>(&raw).ok()
            })
            .filter_map(|data| data.pointer("/props/pageProps").cloned())
            .collect()
    }

    fn organization_from_data(&self, page_props: &[Value]) -> Option<String> {
        for props in page_props {
            for pointer in ["/content/company_name", "/promo_data/company_name"] {
                let name = props
                    .pointer(pointer)
                    .and_then(Value::as_str)
                    .and_then(|raw| self.clean(raw));
                if name.is_some() {
                    return name;
                }
            }
        }
        None
    }

    fn organization_from_text(&self, text: &str) -> Option<String> {
        for pattern in &self.affiliation_patterns {
            if let Some(name) = self.first_capture(pattern, text) {
                return Some(title_case(&name));
            }
        }
        for pattern in &self.indicator_patterns {
            if let Some(name) = self.first_capture(pattern, text) {
                return Some(title_case(&name));
            }
        }
        None
    }

    fn first_capture(&self, pattern: &Regex, text: &str) -> Option<String> {
        let caps = pattern.captures(text)?;
        let name = self.clean(caps.get(1)?.as_str())?;
        if name.chars().count() > MAX_NAME_LEN {
            return None;
        }
        Some(name)
    }

    fn status_from(&self, html: &str, page_props: &[Value], now: DateTime<Utc>) -> (PromoStatus, Option<String>) {
        let mut status = PromoStatus::Active;
        let mut expiration = None;

        let lower = html.to_lowercase();
        if lower.contains("promotion ended") || lower.contains("expired") {
            status = PromoStatus::Expired;
            expiration = self
                .expiration_regex
                .captures(html)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());
        }

        for props in page_props {
            let end_date = props
                .pointer("/promo_data/end_date")
                .and_then(Value::as_str)
                .and_then(parse_end_date);
            if let Some(end) = end_date {
                if end < now {
                    status = PromoStatus::Expired;
                    if expiration.is_none() {
                        expiration = Some(end.format("%m/%d/%Y").to_string());
                    }
                }
            }
        }

        (status, expiration)
    }

    /// Strips markup, collapses whitespace and trims stray punctuation.
    fn clean(&self, raw: &str) -> Option<String> {
        let no_tags = self.tag_regex.replace_all(raw, " ");
        let collapsed = self.whitespace_regex.replace_all(&no_tags, " ");
        let trimmed = collapsed.trim_matches(|c: char| c.is_whitespace() || ".,:;-|".contains(c));
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Text a reader would see: every text node outside script, style and
/// noscript, space separated.
fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .map_or(false, |name| matches!(name, "script" | "style" | "noscript"));
        let text = text.trim();
        if !hidden && !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join(" ")
}

fn parse_end_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Capitalizes the first letter of every run of letters and lowercases the
/// rest: "university of washington" -> "University Of Washington".
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
        } else {
            out.push(ch);
        }
        prev_alpha = ch.is_alphabetic();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::new().unwrap()
    }

    fn next_data(page_props: &str) -> String {
        format!(
            r#"<html><head><title>Fast Track | Alaska Airlines</title></head><body>
            <h1>Fast track to status</h1>
            <script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{}}}}}</script>
            </body></html>"#,
            page_props
        )
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_company_name_from_page_content() {
        let html = next_data(r#"{"content":{"company_name":"  University of Washington "}}"#);
        assert_eq!(extractor().extract_organization(&html), "University of Washington");
    }

    #[test]
    fn test_company_name_from_promo_data() {
        let html = next_data(r#"{"content":{"company_name":""},"promo_data":{"company_name":"<b>Microsoft</b>"}}"#);
        assert_eq!(extractor().extract_organization(&html), "Microsoft");
    }

    #[test]
    fn test_email_domain_fallback() {
        let html = "<html><body><p>Verify with your work email ending in @Boeing.com to join.</p></body></html>";
        assert_eq!(extractor().extract_organization(html), "Boeing");
    }

    #[test]
    fn test_edu_domain_beats_com_domain() {
        let html = "<p>Contact help@alaskaair.com. Students sign up with @uw.edu addresses.</p>";
        assert_eq!(extractor().extract_organization(html), "Uw");
    }

    #[test]
    fn test_university_phrase() {
        let html = "<div>Faculty at the University of   Oregon can apply</div>";
        assert_eq!(extractor().extract_organization(html), "University Of Oregon");
    }

    #[test]
    fn test_indicator_phrases() {
        let html = "<p>Only Mileage Plan members who work at Costco Wholesale, can register.</p>";
        assert_eq!(extractor().extract_organization(html), "Costco Wholesale");

        let html = "<p>Hello. Starbucks employees get elite status faster</p>";
        assert_eq!(extractor().extract_organization(html), "Starbucks");
    }

    #[test]
    fn test_script_text_is_not_scanned() {
        let html = r#"<script>var support = "help@tracker.com";</script><p>Nothing here</p>"#;
        assert_eq!(extractor().extract_organization(html), UNKNOWN_ORGANIZATION);
    }

    #[test]
    fn test_overlong_match_is_rejected() {
        let filler = "word ".repeat(40);
        let html = format!("<p>{}staff</p>", filler);
        assert_eq!(extractor().extract_organization(&html), UNKNOWN_ORGANIZATION);
    }

    #[test]
    fn test_never_fails_on_junk() {
        let ex = extractor();
        let bytes: Vec<u8> = (0..2048u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
        let junk = String::from_utf8_lossy(&bytes).to_string();
        for input in ["", "<", "<<<>>>", "<script type=\"application/json\">{bad", "\u{0}\u{1}", junk.as_str()] {
            let details = ex.inspect(input, now());
            assert!(!details.organization.is_empty());
        }
        assert_eq!(ex.extract_organization(""), UNKNOWN_ORGANIZATION);
    }

    #[test]
    fn test_active_by_default() {
        let html = next_data(r#"{"content":{"company_name":"Acme"},"promo_data":{"end_date":"2030-01-01T00:00:00Z"}}"#);
        let details = extractor().inspect(&html, now());
        assert_eq!(details.status, PromoStatus::Active);
        assert_eq!(details.expiration_date, None);
        assert_eq!(details.organization, "Acme");
    }

    #[test]
    fn test_expired_from_message() {
        let html = "<p>Fast Track: This promotion ended for Acme employees on 3/15/2024.</p>";
        let details = extractor().inspect(html, now());
        assert_eq!(details.status, PromoStatus::Expired);
        assert_eq!(details.expiration_date.as_deref(), Some("3/15/2024"));
    }

    #[test]
    fn test_expired_from_end_date() {
        let html = next_data(r#"{"promo_data":{"company_name":"Acme","end_date":"2024-06-30T23:59:59Z"}}"#);
        let details = extractor().inspect(&html, now());
        assert_eq!(details.status, PromoStatus::Expired);
        assert_eq!(details.expiration_date.as_deref(), Some("06/30/2024"));

        let html = next_data(r#"{"promo_data":{"end_date":"2024-02-01"}}"#);
        assert_eq!(extractor().inspect(&html, now()).status, PromoStatus::Expired);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("university of washington"), "University Of Washington");
        assert_eq!(title_case("o'neil 3m corp"), "O'Neil 3M Corp");
        assert_eq!(title_case(""), "");
    }
}

use std::time::Duration;

use log::debug;
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use url::Url;

use crate::delay_manager::DelayManager;
use crate::error::{PromoError, Result};

pub const DEFAULT_URL_TEMPLATE: &str = "https://www.alaskaair.com/promo/{code}";
pub const DEFAULT_PAGE_MARKERS: [&str; 2] = ["fast track", "mileage plan"];
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const CODE_PLACEHOLDER: &str = "{code}";

const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Why a page does not count as a promo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    HttpStatus(u16),
    NotPromoPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Valid { url: String, body: String },
    Invalid { url: String, reason: InvalidReason },
    /// Transport failure: timeout, refused connection, DNS, broken body.
    Error { url: String, message: String },
}

impl FetchOutcome {
    pub fn url(&self) -> &str {
        match self {
            FetchOutcome::Valid { url, .. } | FetchOutcome::Invalid { url, .. } | FetchOutcome::Error { url, .. } => url,
        }
    }
}

/// One request per code. Implementations do their own pacing.
pub trait PageFetcher {
    fn fetch(&self, code: &str) -> FetchOutcome;
}

/// Absolute http(s) URL with a `{code}` slot. Without a slot the code is
/// appended as the last path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
}

impl UrlTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let template = template.trim();
        let template = if template.contains(CODE_PLACEHOLDER) {
            template.to_string()
        } else if template.ends_with('/') {
            format!("{}{}", template, CODE_PLACEHOLDER)
        } else {
            format!("{}/{}", template, CODE_PLACEHOLDER)
        };

        let probe = template.replace(CODE_PLACEHOLDER, "AS2300");
        let parsed = Url::parse(&probe)
            .map_err(|e| PromoError::invalid_argument(format!("URL template '{}' is not a valid URL: {}", template, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(PromoError::invalid_argument(format!(
                "URL template '{}' must use http or https",
                template
            )));
        }
        Ok(UrlTemplate { template })
    }

    pub fn render(&self, code: &str) -> String {
        self.template.replace(CODE_PLACEHOLDER, &urlencoding::encode(code))
    }
}

impl Default for UrlTemplate {
    fn default() -> Self {
        UrlTemplate {
            template: DEFAULT_URL_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub template: UrlTemplate,
    pub timeout: Duration,
    /// Lowercase phrases of which a 2xx body must contain at least one.
    /// Empty accepts any 2xx body.
    pub page_markers: Vec<String>,
    pub delay: DelayManager,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig {
            template: UrlTemplate::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_markers: DEFAULT_PAGE_MARKERS.iter().map(|m| m.to_string()).collect(),
            delay: DelayManager::new(Duration::from_secs(1), false),
        }
    }
}

/// Blocking HTTP fetcher that waits the configured delay after every
/// request, whatever the outcome.
pub struct HttpFetcher {
    client: Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .cookie_store(true)
            .build()?;

        Ok(HttpFetcher { client, config })
    }

    pub fn url_for(&self, code: &str) -> String {
        self.config.template.render(code)
    }

    fn random_user_agent(&self) -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }

    fn request(&self, code: &str) -> FetchOutcome {
        let url = self.url_for(code);

        let resp = match self.client.get(&url).header(USER_AGENT, self.random_user_agent()).send() {
            Ok(resp) => resp,
            Err(e) => {
                debug!("{} - request failed: {}", code, e);
                return FetchOutcome::Error {
                    url,
                    message: e.to_string(),
                };
            }
        };

        let status = resp.status();
        if !status.is_success() {
            debug!("{} - HTTP {}", code, status);
            return FetchOutcome::Invalid {
                url,
                reason: InvalidReason::HttpStatus(status.as_u16()),
            };
        }

        let body = match resp.text() {
            Ok(body) => body,
            Err(e) => {
                debug!("{} - failed to read body: {}", code, e);
                return FetchOutcome::Error {
                    url,
                    message: e.to_string(),
                };
            }
        };

        if !self.is_promo_page(&body) {
            debug!("{} - not a promo page", code);
            return FetchOutcome::Invalid {
                url,
                reason: InvalidReason::NotPromoPage,
            };
        }

        FetchOutcome::Valid { url, body }
    }

    fn is_promo_page(&self, body: &str) -> bool {
        if self.config.page_markers.is_empty() {
            return true;
        }
        let lower = body.to_lowercase();
        self.config.page_markers.iter().any(|m| lower.contains(m.as_str()))
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, code: &str) -> FetchOutcome {
        let outcome = self.request(code);
        self.config.delay.wait();
        outcome
    }
}

use std::fmt;

use chrono::Utc;
use clap::ValueEnum;
use log::{debug, info, warn};

use crate::code_generator::CodeGenerator;
use crate::error::Result;
use crate::extractor::Extractor;
use crate::fetcher::{FetchOutcome, PageFetcher};
use crate::result_store::{PromoRecord, PromoStatus, ResultStore, Upsert};

pub const DEFAULT_SAVE_EVERY: usize = 10;

/// What to do with codes that already have a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RescanPolicy {
    /// Leave known codes alone.
    #[default]
    Skip,
    /// Fetch them again and refresh status and organization.
    Recheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub rescan: RescanPolicy,
    /// Persist after this many fetched codes.
    pub save_every: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            rescan: RescanPolicy::Skip,
            save_every: DEFAULT_SAVE_EVERY,
        }
    }
}

/// Counts for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchSummary {
    pub checked: usize,
    pub valid: usize,
    pub new: usize,
    pub invalid: usize,
    pub errors: usize,
    pub skipped: usize,
}

impl fmt::Display for SearchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checked {} codes: {} valid ({} new), {} invalid, {} errors, {} skipped as already known",
            self.checked, self.valid, self.new, self.invalid, self.errors, self.skipped
        )
    }
}

/// Pulls codes from a generator through a fetcher and into the store.
pub struct SearchOrchestrator<'a, F: PageFetcher> {
    store: &'a mut ResultStore,
    fetcher: &'a F,
    extractor: &'a Extractor,
    options: SearchOptions,
}

impl<'a, F: PageFetcher> SearchOrchestrator<'a, F> {
    pub fn new(store: &'a mut ResultStore, fetcher: &'a F, extractor: &'a Extractor, options: SearchOptions) -> Self {
        SearchOrchestrator {
            store,
            fetcher,
            extractor,
            options,
        }
    }

    pub fn run(&mut self, codes: CodeGenerator) -> Result<SearchSummary> {
        let total = codes.len();
        let save_every = self.options.save_every.max(1);
        let mut summary = SearchSummary::default();

        info!("Searching {} promo codes...", total);

        for (i, code) in codes.enumerate() {
            if self.options.rescan == RescanPolicy::Skip && self.store.has(&code) {
                debug!("[{}/{}] {} already known, skipping", i + 1, total, code);
                summary.skipped += 1;
                continue;
            }

            info!("[{}/{}] Checking {}...", i + 1, total, code);
            summary.checked += 1;
            self.process(&code, &mut summary);

            if summary.checked % save_every == 0 && self.store.is_dirty() {
                self.store.save()?;
            }
        }

        self.store.save()?;
        info!("Search complete! {}", summary);
        Ok(summary)
    }

    fn process(&mut self, code: &str, summary: &mut SearchSummary) {
        let outcome = self.fetcher.fetch(code);
        debug!("{} -> {}", code, outcome.url());

        match outcome {
            FetchOutcome::Valid { url, body } => {
                let details = self.extractor.inspect(&body, Utc::now());
                let mut record = PromoRecord::new(details.organization, details.status, url);
                record.expiration_date = details.expiration_date;

                // A page that names nobody keeps the name found earlier.
                if !record.has_known_organization() {
                    if let Some(existing) = self.store.get(code).filter(|r| r.has_known_organization()) {
                        record.organization = existing.organization.clone();
                    }
                }

                if record.status == PromoStatus::Expired {
                    info!("Found: {} - {} (EXPIRED)", code, record.organization);
                } else {
                    info!("Found: {} - {}", code, record.organization);
                }

                summary.valid += 1;
                if self.store.upsert(code, record) == Upsert::Inserted {
                    summary.new += 1;
                }
            }
            FetchOutcome::Invalid { reason, .. } => {
                debug!("{} - not a valid promo ({:?})", code, reason);
                summary.invalid += 1;
                if self.store.mark_expired(code) {
                    info!("{} no longer resolves, marked expired", code);
                }
            }
            FetchOutcome::Error { message, .. } => {
                warn!("{} - skipped after error: {}", code, message);
                summary.errors += 1;
            }
        }
    }
}

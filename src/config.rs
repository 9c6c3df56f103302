use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::code_generator::{CodeSpace, DEFAULT_PREFIXES, DEFAULT_RANGE, DEFAULT_WIDTH};
use crate::delay_manager::DelayManager;
use crate::error::{PromoError, Result};
use crate::fetcher::{FetcherConfig, UrlTemplate, DEFAULT_PAGE_MARKERS, DEFAULT_TIMEOUT_SECS, DEFAULT_URL_TEMPLATE};
use crate::logger::DEFAULT_LOG_FILE;
use crate::orchestrator::{RescanPolicy, SearchOptions, DEFAULT_SAVE_EVERY};
use crate::result_store::DEFAULT_RESULTS_FILE;

#[derive(Parser, Debug, Clone)]
#[command(name = "promo-finder")]
#[command(about = "Find employer fast track promo pages and the organizations behind them")]
pub struct Cli {
    /// Scan the code space for promo pages
    #[arg(long)]
    pub search: bool,

    /// Show stored promos whose organization contains NAME
    #[arg(long, value_name = "NAME")]
    pub company: Option<String>,

    /// Show every stored promo
    #[arg(long)]
    pub list: bool,

    /// Stop after visiting this many codes
    #[arg(long, value_name = "N")]
    pub max_codes: Option<usize>,

    /// Resume the scan at this code
    #[arg(long, value_name = "CODE")]
    pub start_from: Option<String>,

    /// Seconds to wait after each request
    #[arg(long, value_name = "SECONDS", default_value_t = 1.0, allow_negative_numbers = true)]
    pub delay: f64,

    /// Spread each wait over 0.5x to 1.5x the delay
    #[arg(long)]
    pub jitter: bool,

    /// Code prefixes, in scan order
    #[arg(long = "prefix", value_name = "PREFIX", value_delimiter = ',')]
    pub prefixes: Vec<String>,

    /// First numeric suffix (inclusive)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_RANGE.start)]
    pub range_start: u32,

    /// Last numeric suffix (exclusive)
    #[arg(long, value_name = "N", default_value_t = DEFAULT_RANGE.end)]
    pub range_end: u32,

    /// Zero padding of the numeric suffix
    #[arg(long, value_name = "DIGITS", default_value_t = DEFAULT_WIDTH)]
    pub width: usize,

    /// What to do with codes already in the results file
    #[arg(long, value_enum, default_value_t = RescanPolicy::Skip)]
    pub rescan: RescanPolicy,

    /// Save progress after this many fetched codes
    #[arg(long, value_name = "N", default_value_t = DEFAULT_SAVE_EVERY)]
    pub save_every: usize,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Promo URL, with {code} where the code goes
    #[arg(long, value_name = "URL", default_value = DEFAULT_URL_TEMPLATE)]
    pub url_template: String,

    #[arg(long, value_name = "PATH", default_value = DEFAULT_RESULTS_FILE)]
    pub results_file: PathBuf,

    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Everything a search run needs, already validated.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub space: CodeSpace,
    pub start_from: Option<String>,
    pub max_codes: Option<usize>,
    pub fetcher: FetcherConfig,
    pub options: SearchOptions,
}

#[derive(Debug, Clone)]
pub enum Command {
    Search(SearchSettings),
    Company(String),
    List,
    Usage,
}

impl Cli {
    /// Checks flag combinations and values. Nothing here touches the
    /// network or the results file.
    pub fn resolve(&self) -> Result<Command> {
        let modes = [self.search, self.company.is_some(), self.list];
        if modes.iter().filter(|m| **m).count() > 1 {
            return Err(PromoError::invalid_argument(
                "choose only one of --search, --company, --list",
            ));
        }

        if !self.search {
            if self.max_codes.is_some() || self.start_from.is_some() {
                return Err(PromoError::invalid_argument(
                    "--max-codes and --start-from only apply to --search",
                ));
            }
            return match &self.company {
                Some(name) if name.trim().is_empty() => {
                    Err(PromoError::invalid_argument("--company needs a non-empty name"))
                }
                Some(name) => Ok(Command::Company(name.trim().to_string())),
                None if self.list => Ok(Command::List),
                None => Ok(Command::Usage),
            };
        }

        Ok(Command::Search(self.search_settings()?))
    }

    fn search_settings(&self) -> Result<SearchSettings> {
        let prefixes = if self.prefixes.is_empty() {
            DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect()
        } else {
            self.prefixes.iter().map(|p| p.trim().to_string()).collect()
        };
        let space = CodeSpace::new(prefixes, self.range_start..self.range_end, self.width)?;

        if let Some(code) = &self.start_from {
            space.validate_code(code)?;
        }
        if self.save_every == 0 {
            return Err(PromoError::invalid_argument("--save-every must be at least 1"));
        }
        if self.timeout == 0 {
            return Err(PromoError::invalid_argument("--timeout must be at least 1 second"));
        }

        let fetcher = FetcherConfig {
            template: UrlTemplate::parse(&self.url_template)?,
            timeout: Duration::from_secs(self.timeout),
            page_markers: DEFAULT_PAGE_MARKERS.iter().map(|m| m.to_string()).collect(),
            delay: DelayManager::from_secs_f64(self.delay, self.jitter)?,
        };

        Ok(SearchSettings {
            space,
            start_from: self.start_from.as_ref().map(|c| c.trim().to_string()),
            max_codes: self.max_codes,
            fetcher,
            options: SearchOptions {
                rescan: self.rescan,
                save_every: self.save_every,
            },
        })
    }
}

pub const USAGE_EXAMPLES: &str = "Usage examples:
  promo-finder --search
  promo-finder --search --max-codes 100
  promo-finder --search --start-from CS2344 --delay 2
  promo-finder --company 'Microsoft'
  promo-finder --list";

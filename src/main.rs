use std::io;

use clap::Parser;
use log::{error, info};

use promo_finder_lib::config::USAGE_EXAMPLES;
use promo_finder_lib::{logger, report};
use promo_finder_lib::{Cli, Command, Extractor, HttpFetcher, ResultStore, Result, SearchOrchestrator};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Validate before anything is opened or requested.
    let command = cli.resolve()?;

    match command {
        Command::Search(settings) => {
            logger::init(Some(&cli.log_file), cli.verbose)?;
            info!("Starting promo search over {} codes...", settings.space.total());

            let mut store = ResultStore::load(&cli.results_file)?;
            let codes = settings
                .space
                .generate(settings.start_from.as_deref(), settings.max_codes)?;
            if let Some(start) = &settings.start_from {
                info!("Starting from code: {}", start);
            }

            let fetcher = HttpFetcher::new(settings.fetcher)?;
            let extractor = Extractor::new()?;
            let summary = SearchOrchestrator::new(&mut store, &fetcher, &extractor, settings.options).run(codes)?;

            println!("\nSearch complete: {}", summary);
            println!("{} promos stored in {}", store.len(), store.path().display());
        }
        Command::Company(query) => {
            logger::init(None, cli.verbose)?;
            let store = ResultStore::load(&cli.results_file)?;
            report::write_company_matches(&mut io::stdout().lock(), &query, &store.find_by_organization(&query))?;
        }
        Command::List => {
            logger::init(None, cli.verbose)?;
            let store = ResultStore::load(&cli.results_file)?;
            report::write_listing(&mut io::stdout().lock(), &store.all())?;
        }
        Command::Usage => {
            println!("{}", USAGE_EXAMPLES);
        }
    }

    Ok(())
}

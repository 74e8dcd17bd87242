pub mod backhaul;
pub mod browser;
pub mod extract;
pub mod navigator;
pub mod scan;
pub mod worker;

use haulscout_core::{MarketplaceConfig, Result};

pub use backhaul::{backhaul_criteria, suggest_backhaul};
pub use browser::{BrowserLauncher, BrowserPage, BrowserSession, ChromeLauncher};
pub use extract::{
    BookedLoadExtractor, EmbeddedJsonExtractor, Extractor, FallbackExtractor, SearchResultExtractor,
};
pub use navigator::{NavigationOutcome, SearchNavigator};
pub use scan::{load_session, run_criteria_scan, ScanPipeline, ScanReport};
pub use worker::{JobOutcome, ScanContext, ScanJob, ScanWorker, ScanWorkerHandle};

/// Pages the scraper knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Load cards on the search results page
    SearchResults,
    /// The user's booked loads
    BookedLoads,
}

/// Factory for creating extractor instances
pub struct ExtractorFactory;

impl ExtractorFactory {
    /// Builds the extractor for `kind` from the configured selectors. Search
    /// results fall back to embedded JSON when a script selector is set.
    pub fn create(kind: ExtractorKind, config: &MarketplaceConfig) -> Result<Box<dyn Extractor>> {
        match kind {
            ExtractorKind::SearchResults => {
                let cards = Box::new(SearchResultExtractor::new(&config.results)?);
                match &config.results.embedded_json {
                    Some(script) => Ok(Box::new(FallbackExtractor::new(vec![
                        cards,
                        Box::new(EmbeddedJsonExtractor::new(script)?),
                    ]))),
                    None => Ok(cards),
                }
            }
            ExtractorKind::BookedLoads => Ok(Box::new(BookedLoadExtractor::new(&config.booked)?)),
        }
    }
}

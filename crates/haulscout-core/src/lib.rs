pub mod backhaul;
pub mod config;
pub mod credentials;
pub mod criteria;
pub mod crypto;
pub mod db;
mod display;
mod error;
mod export;
pub mod filter;
pub mod load;
pub mod text;

pub use backhaul::{BackhaulStatus, BackhaulSummary, SuggestedBackhaul};
pub use config::{
    AppConfig, BookedSelectors, BrowserConfig, FormSelectors, MarketplaceConfig, ResultSelectors,
    TimeoutConfig, WorkerConfig,
};
pub use credentials::{Credentials, SessionCredentials};
pub use criteria::{ScanStatus, SearchCriteria};
pub use crypto::Cipher;
pub use db::Database;
pub use display::{
    create_criteria_table, create_load_table, create_saved_load_table, format_backhaul,
    CriteriaTableRow, LoadTableRow,
};
pub use error::{HaulError, Result};
pub use export::write_loads_csv;
pub use filter::LoadFilter;
pub use load::{FoundLoad, RawLoad, SavedLoad, SavedLoadStatus, ScrapedLoad, UNKNOWN_EQUIPMENT};

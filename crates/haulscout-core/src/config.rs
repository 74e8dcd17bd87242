//! Runtime configuration: browser launch options and the marketplace's
//! front-end contract (URLs, cookie, selectors, timeouts).
//!
//! Everything has a default, so a config file only needs to list what a
//! deployment changes.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const CHROME_PATH_VAR: &str = "CHROME_PATH";
pub const REMOTE_BROWSER_VAR: &str = "HAULSCOUT_REMOTE_BROWSER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl AppConfig {
    /// Loads the TOML file if one is given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                toml::from_str(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };

        if let Ok(chrome) = std::env::var(CHROME_PATH_VAR) {
            if !chrome.is_empty() {
                config.browser.chrome_path = Some(PathBuf::from(chrome));
            }
        }
        if let Ok(remote) = std::env::var(REMOTE_BROWSER_VAR) {
            if !remote.is_empty() {
                config.browser.remote_url = Some(remote);
            }
        }

        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run Chrome headless (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome/Chromium executable. Looked up on PATH when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Remote DevTools endpoint (e.g. "http://localhost:9222"). When set, an
    /// existing browser is used instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// CDP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub chrome_args: Vec<String>,
}

fn default_headless() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_path: None,
            remote_url: None,
            request_timeout_secs: default_request_timeout(),
            chrome_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub base_url: Url,
    pub search_path: String,
    pub booked_path: String,
    /// Authenticated page used to verify the injected session.
    pub auth_check_path: String,
    /// Path the marketplace redirects to when a session is not valid.
    pub login_path: String,
    pub session_cookie_name: String,
    pub session_cookie_domain: String,
    /// Pickup radius the search form starts with, in miles.
    pub default_pickup_radius: i64,
    pub timeouts: TimeoutConfig,
    pub form: FormSelectors,
    pub results: ResultSelectors,
    pub booked: BookedSelectors,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://loadboard.example.com").expect("static URL is valid"),
            search_path: "/loads/search".to_string(),
            booked_path: "/loads/booked".to_string(),
            auth_check_path: "/loads/search".to_string(),
            login_path: "/login".to_string(),
            session_cookie_name: "session-token".to_string(),
            session_cookie_domain: ".loadboard.example.com".to_string(),
            default_pickup_radius: 50,
            timeouts: TimeoutConfig::default(),
            form: FormSelectors::default(),
            results: ResultSelectors::default(),
            booked: BookedSelectors::default(),
        }
    }
}

impl MarketplaceConfig {
    pub fn url_for(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// True when `url` points at the marketplace's login page.
    pub fn is_login_url(&self, url: &str) -> bool {
        let login = self.login_path.trim_end_matches('/');
        match Url::parse(url) {
            Ok(parsed) => {
                let path = parsed.path().trim_end_matches('/');
                path == login || path.starts_with(&format!("{}/", login))
            }
            Err(_) => url.contains(&self.login_path),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub navigation_secs: u64,
    /// Wait for a form control to appear.
    pub element_wait_ms: u64,
    /// Wait for the first autocomplete suggestion.
    pub autocomplete_wait_ms: u64,
    /// Hard wait for the results container.
    pub results_wait_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_secs: 30,
            element_wait_ms: 5_000,
            autocomplete_wait_ms: 3_000,
            results_wait_secs: 15,
        }
    }
}

impl TimeoutConfig {
    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_millis(self.element_wait_ms)
    }

    pub fn autocomplete_wait(&self) -> Duration {
        Duration::from_millis(self.autocomplete_wait_ms)
    }

    pub fn results_wait(&self) -> Duration {
        Duration::from_secs(self.results_wait_secs)
    }
}

/// Search form controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSelectors {
    pub origin_input: String,
    pub destination_input: String,
    pub autocomplete_option: String,
    pub radius_select: String,
    pub search_button: String,
}

impl Default for FormSelectors {
    fn default() -> Self {
        Self {
            origin_input: "input[name='origin']".to_string(),
            destination_input: "input[name='destination']".to_string(),
            autocomplete_option: ".autocomplete__option".to_string(),
            radius_select: "select[name='pickupRadius']".to_string(),
            search_button: "button[type='submit'].search__submit".to_string(),
        }
    }
}

/// Selectors for the search results page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultSelectors {
    pub container: String,
    pub card: String,
    /// Matches both location lines; the first is origin, the second destination.
    pub location: String,
    pub rate: String,
    pub rate_per_mile: String,
    /// `equipment | distance | weight` text.
    pub details: String,
    pub broker: String,
    pub pickup_date: String,
    /// Card attribute carrying the marketplace load ID, when present.
    pub id_attribute: String,
    /// Optional `<script>` holding the same loads as JSON.
    pub embedded_json: Option<String>,
}

impl Default for ResultSelectors {
    fn default() -> Self {
        Self {
            container: ".search-results".to_string(),
            card: ".load-card".to_string(),
            location: ".load-card__location".to_string(),
            rate: ".load-card__rate".to_string(),
            rate_per_mile: ".load-card__rpm".to_string(),
            details: ".load-card__details".to_string(),
            broker: ".load-card__broker".to_string(),
            pickup_date: ".load-card__pickup".to_string(),
            id_attribute: "data-load-id".to_string(),
            embedded_json: None,
        }
    }
}

/// Selectors for the booked loads page. The markup there uses generated
/// class names, so these match on class-name substrings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookedSelectors {
    pub container: String,
    pub card: String,
    pub origin: String,
    pub destination: String,
    pub rate: String,
    pub rate_per_mile: String,
    pub equipment: String,
    pub distance: String,
    pub weight: String,
    pub broker: String,
    pub pickup_date: String,
    pub status: String,
    pub id_attribute: String,
}

impl Default for BookedSelectors {
    fn default() -> Self {
        Self {
            container: "[class*='jobList']".to_string(),
            card: "[class*='jobCard']".to_string(),
            origin: "[class*='origin']".to_string(),
            destination: "[class*='destination']".to_string(),
            rate: "[class*='payout']".to_string(),
            rate_per_mile: "[class*='perMile']".to_string(),
            equipment: "[class*='equipment']".to_string(),
            distance: "[class*='distance']".to_string(),
            weight: "[class*='weight']".to_string(),
            broker: "[class*='broker']".to_string(),
            pickup_date: "[class*='pickup']".to_string(),
            status: "[class*='status']".to_string(),
            id_attribute: "data-job-id".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Scans allowed to run at once. Each holds its own browser.
    pub concurrency: usize,
    pub queue_capacity: usize,
    /// Loads kept on a backhaul suggestion.
    pub backhaul_top_n: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            queue_capacity: 32,
            backhaul_top_n: 5,
        }
    }
}

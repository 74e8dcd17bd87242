//! In-process stand-ins for the marketplace and the browser.
//!
//! `MockSite` serves fixed HTML by URL path. `MockLauncher` hands out
//! sessions whose pages read from that site and answer selector waits by
//! running the selector against the current HTML.

use async_trait::async_trait;
use haulscout_core::{Cipher, Credentials, Database, MarketplaceConfig, Result, SessionCredentials};
use haulscout_scrapers::{BrowserLauncher, BrowserPage, BrowserSession, ScanPipeline};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const USER: &str = "user-1";
pub const SECRET: &str = "integration-secret";
pub const COOKIE: &str = "session-cookie-value";

#[derive(Default)]
pub struct MockSite {
    pages: Mutex<HashMap<String, String>>,
    expired: AtomicBool,
}

impl MockSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, path: &str, html: impl Into<String>) {
        self.pages.lock().unwrap().insert(path.to_string(), html.into());
    }

    /// Makes every navigation land on the login page.
    pub fn expire_session(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }

    fn page(&self, path: &str) -> String {
        self.pages.lock().unwrap().get(path).cloned().unwrap_or_default()
    }
}

pub struct MockPage {
    site: Arc<MockSite>,
    config: MarketplaceConfig,
    current: Mutex<Option<Url>>,
    cookies: Mutex<Vec<(String, String)>>,
    actions: Arc<Mutex<Vec<String>>>,
}

impl MockPage {
    fn html(&self) -> String {
        match &*self.current.lock().unwrap() {
            Some(url) => self.site.page(url.path()),
            None => String::new(),
        }
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

fn selector_matches(html: &str, selector: &str) -> bool {
    let Ok(selector) = Selector::parse(selector) else {
        return false;
    };
    Html::parse_document(html).select(&selector).next().is_some()
}

#[async_trait]
impl BrowserPage for MockPage {
    async fn goto(&self, url: &str) -> Result<()> {
        let mut target = Url::parse(url)?;
        if self.site.expired.load(Ordering::SeqCst) {
            target = self.config.url_for(&self.config.login_path)?;
        }
        self.record(format!("goto {}", target.path()));
        *self.current.lock().unwrap() = Some(target);
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.current.lock().unwrap().as_ref().map(|u| u.to_string()))
    }

    async fn wait_for(&self, selector: &str, _: Duration) -> bool {
        selector_matches(&self.html(), selector)
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.record(format!("type {} {}", selector, text));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.record(format!("click {}", selector));
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        self.record(format!("select {} {}", selector, value));
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html())
    }

    async fn set_cookie(&self, name: &str, value: &str, _: &str) -> Result<()> {
        self.cookies.lock().unwrap().push((name.to_string(), value.to_string()));
        Ok(())
    }
}

pub struct MockSession {
    page: MockPage,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for MockSession {
    fn page(&self) -> &dyn BrowserPage {
        &self.page
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockLauncher {
    site: Arc<MockSite>,
    config: MarketplaceConfig,
    launches: AtomicUsize,
    closes: Arc<AtomicUsize>,
    actions: Arc<Mutex<Vec<String>>>,
}

impl MockLauncher {
    pub fn new(site: Arc<MockSite>, config: MarketplaceConfig) -> Arc<Self> {
        Arc::new(Self {
            site,
            config,
            launches: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            actions: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Page interactions across every session, in order.
    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            page: MockPage {
                site: self.site.clone(),
                config: self.config.clone(),
                current: Mutex::new(None),
                cookies: Mutex::new(Vec::new()),
                actions: self.actions.clone(),
            },
            closes: self.closes.clone(),
        }))
    }
}

/// A search page with every form control and the given cards. An empty
/// card list renders the page without a results container.
pub fn search_page(config: &MarketplaceConfig, cards: &[String]) -> String {
    let results = if cards.is_empty() {
        String::new()
    } else {
        format!(r#"<div class="search-results">{}</div>"#, cards.join(""))
    };
    format!(
        r#"<html><body>
            <form>
                <input name="origin"><input name="destination">
                <ul><li class="autocomplete__option">suggestion</li></ul>
                <select name="pickupRadius"><option value="{radius}">{radius}</option></select>
                <button type="submit" class="search__submit">Search</button>
            </form>
            {results}
        </body></html>"#,
        radius = config.default_pickup_radius,
        results = results,
    )
}

pub fn load_card(id: &str, origin: &str, destination: &str, rate: &str, details: &str) -> String {
    format!(
        r#"<div class="load-card" data-load-id="{id}">
            <span class="load-card__location">{origin}</span>
            <span class="load-card__location">{destination}</span>
            <span class="load-card__rate">{rate}</span>
            <span class="load-card__details">{details}</span>
            <span class="load-card__broker">Acme Logistics</span>
            <span class="load-card__pickup">Mon 10/21</span>
        </div>"#
    )
}

pub fn booked_page(cards: &[String]) -> String {
    format!(
        r#"<html><body><section class="jobList_k2">{}</section></body></html>"#,
        cards.join("")
    )
}

pub fn booked_card(id: &str, origin: &str, destination: &str, payout: &str, status: &str) -> String {
    format!(
        r#"<article class="jobCard_x9" data-job-id="{id}">
            <p class="originCity_a1">{origin}</p>
            <p class="destinationCity_b2">{destination}</p>
            <span class="payout_c3">{payout}</span>
            <span class="equipmentType_d4">Dry Van</span>
            <span class="statusBadge_e5">{status}</span>
        </article>"#
    )
}

pub fn cipher() -> Cipher {
    Cipher::new(SECRET).unwrap()
}

pub fn session() -> SessionCredentials {
    SessionCredentials {
        email: "driver@example.com".to_string(),
        cookie: COOKIE.to_string(),
        csrf_token: "csrf".to_string(),
    }
}

/// A fresh database with sealed credentials for [`USER`].
pub async fn connected_db() -> Database {
    let db = Database::in_memory().await.unwrap();
    let credentials = Credentials::seal(USER, &session(), &cipher()).unwrap();
    db.upsert_credentials(&credentials).await.unwrap();
    db
}

pub fn pipeline(launcher: Arc<MockLauncher>, config: MarketplaceConfig) -> ScanPipeline {
    ScanPipeline::new(launcher, config).unwrap()
}

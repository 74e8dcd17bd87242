use crate::browser::{close_quietly, open_authenticated, BrowserLauncher, BrowserPage};
use crate::extract::Extractor;
use crate::navigator::{NavigationOutcome, SearchNavigator};
use crate::{ExtractorFactory, ExtractorKind};
use chrono::Utc;
use haulscout_core::{
    Cipher, Database, HaulError, LoadFilter, MarketplaceConfig, Result, ScanStatus, ScrapedLoad,
    SearchCriteria, SessionCredentials,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Session, navigation, extraction and filtering for one scan.
///
/// Each call opens its own browser session and closes it before returning.
pub struct ScanPipeline {
    launcher: Arc<dyn BrowserLauncher>,
    config: MarketplaceConfig,
    search: Box<dyn Extractor>,
    booked: Box<dyn Extractor>,
}

impl ScanPipeline {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: MarketplaceConfig) -> Result<Self> {
        let search = ExtractorFactory::create(ExtractorKind::SearchResults, &config)?;
        let booked = ExtractorFactory::create(ExtractorKind::BookedLoads, &config)?;
        Ok(Self { launcher, config, search, booked })
    }

    pub fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    /// Runs a search for `criteria` and returns the loads that pass its
    /// filter. A search that renders no results returns an empty list.
    pub async fn scan(&self, credentials: &SessionCredentials, criteria: &SearchCriteria) -> Result<Vec<ScrapedLoad>> {
        let mut session = open_authenticated(self.launcher.as_ref(), &self.config, &credentials.cookie).await?;
        let result = self.search_in(session.page(), criteria).await;
        close_quietly(session.as_mut()).await;
        result
    }

    /// Reads the loads the user has already booked.
    pub async fn scan_booked(&self, credentials: &SessionCredentials) -> Result<Vec<ScrapedLoad>> {
        let mut session = open_authenticated(self.launcher.as_ref(), &self.config, &credentials.cookie).await?;
        let result = self.booked_in(session.page()).await;
        close_quietly(session.as_mut()).await;
        result
    }

    /// Checks that the marketplace still accepts the stored session.
    pub async fn verify_session(&self, credentials: &SessionCredentials) -> Result<()> {
        let mut session = open_authenticated(self.launcher.as_ref(), &self.config, &credentials.cookie).await?;
        close_quietly(session.as_mut()).await;
        Ok(())
    }

    async fn search_in(&self, page: &dyn BrowserPage, criteria: &SearchCriteria) -> Result<Vec<ScrapedLoad>> {
        let scanned_at = Utc::now();
        if SearchNavigator::new(&self.config).run(page, criteria).await? == NavigationOutcome::NoResults {
            return Ok(Vec::new());
        }

        let html = page.content().await?;
        let loads = self.search.extract(&html, scanned_at)?;
        let extracted = loads.len();
        let loads = LoadFilter::from_criteria(criteria).apply(loads);
        debug!("{} of {} extracted loads passed the filter", loads.len(), extracted);
        Ok(loads)
    }

    async fn booked_in(&self, page: &dyn BrowserPage) -> Result<Vec<ScrapedLoad>> {
        let scanned_at = Utc::now();
        let url = self.config.url_for(&self.config.booked_path)?;
        let timeouts = &self.config.timeouts;

        match tokio::time::timeout(timeouts.navigation(), page.goto(url.as_str())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Could not load booked loads page {}: {}", url, e);
                return Ok(Vec::new());
            }
            Err(_) => {
                warn!("Timed out loading booked loads page {}", url);
                return Ok(Vec::new());
            }
        }
        if !page.wait_for(&self.config.booked.container, timeouts.results_wait()).await {
            info!("No booked loads rendered");
            return Ok(Vec::new());
        }

        let html = page.content().await?;
        self.booked.extract(&html, scanned_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub criteria_id: i64,
    /// Loads returned by the scan after filtering.
    pub found: usize,
    /// Loads not seen by an earlier scan of the same criteria.
    pub inserted: usize,
}

/// Loads and decrypts the user's marketplace session. Credentials already
/// rejected by the marketplace count as expired.
pub async fn load_session(db: &Database, cipher: &Cipher, user_id: &str) -> Result<SessionCredentials> {
    let credentials = db
        .get_credentials(user_id)
        .await?
        .ok_or_else(|| HaulError::NotConnected(user_id.to_string()))?;
    if !credentials.is_valid {
        return Err(HaulError::SessionExpired);
    }
    credentials.open(cipher)
}

/// Flags stored credentials as rejected when the marketplace expired the
/// session.
pub(crate) async fn invalidate_on_expiry(db: &Database, user_id: &str, error: &HaulError) {
    if matches!(error, HaulError::SessionExpired) {
        if let Err(e) = db.mark_credentials_validity(user_id, false).await {
            warn!("Could not invalidate credentials for {}: {}", user_id, e);
        }
    }
}

/// Scans one stored criteria and persists the outcome.
///
/// The criteria's status moves to `scanning`, then to `success` with the
/// load count or to `error` with a user-facing message.
pub async fn run_criteria_scan(
    db: &Database,
    pipeline: &ScanPipeline,
    cipher: &Cipher,
    criteria_id: i64,
) -> Result<ScanReport> {
    let criteria = db
        .get_criteria(criteria_id)
        .await?
        .ok_or_else(|| HaulError::NotFound(format!("criteria {}", criteria_id)))?;
    if criteria.is_deleted() {
        return Err(HaulError::Invalid(format!("criteria {} is deleted", criteria_id)));
    }

    db.set_scan_status(criteria_id, ScanStatus::Scanning, None, None).await?;
    info!("Scanning criteria {} for user {}", criteria_id, criteria.user_id);

    let outcome = async {
        let session = load_session(db, cipher, &criteria.user_id).await?;
        let loads = pipeline.scan(&session, &criteria).await?;
        let inserted = db.insert_new_loads(criteria_id, &loads).await?;
        Ok::<_, HaulError>(ScanReport { criteria_id, found: loads.len(), inserted })
    }
    .await;

    match outcome {
        Ok(report) => {
            db.set_scan_status(criteria_id, ScanStatus::Success, None, Some(report.found as i64))
                .await?;
            info!(
                "Criteria {} scan found {} loads ({} new)",
                criteria_id, report.found, report.inserted
            );
            Ok(report)
        }
        Err(e) => {
            warn!("Criteria {} scan failed: {}", criteria_id, e);
            invalidate_on_expiry(db, &criteria.user_id, &e).await;
            db.set_scan_status(criteria_id, ScanStatus::Error, Some(&e.user_message()), None)
                .await?;
            Err(e)
        }
    }
}

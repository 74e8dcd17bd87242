use crate::browser::BrowserPage;
use haulscout_core::{MarketplaceConfig, Result, SearchCriteria};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The results container rendered.
    ResultsReady,
    /// Nothing rendered within the results timeout.
    NoResults,
}

/// Drives the marketplace search form.
///
/// Every step before the results wait is best effort: a control that does
/// not show up is logged and the search continues without it.
pub struct SearchNavigator<'a> {
    config: &'a MarketplaceConfig,
}

impl<'a> SearchNavigator<'a> {
    pub fn new(config: &'a MarketplaceConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, page: &dyn BrowserPage, criteria: &SearchCriteria) -> Result<NavigationOutcome> {
        let criteria = criteria.normalized();
        let url = self.config.url_for(&self.config.search_path)?;

        debug!("Opening search page {}", url);
        match tokio::time::timeout(self.config.timeouts.navigation(), page.goto(url.as_str())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Could not load search page {}: {}", url, e);
                return Ok(NavigationOutcome::NoResults);
            }
            Err(_) => {
                warn!("Timed out loading search page {}", url);
                return Ok(NavigationOutcome::NoResults);
            }
        }

        let form = &self.config.form;
        if let Some(origin) = criteria.origin_label() {
            self.fill_location(page, &form.origin_input, &origin).await;
        }
        if let Some(destination) = criteria.destination_label() {
            self.fill_location(page, &form.destination_input, &destination).await;
        }

        if let Some(radius) = criteria.pickup_distance {
            if radius != self.config.default_pickup_radius {
                self.select_radius(page, radius).await;
            }
        }

        if page.wait_for(&form.search_button, self.config.timeouts.element_wait()).await {
            if let Err(e) = page.click(&form.search_button).await {
                warn!("Could not click search button: {}", e);
            }
        } else {
            warn!("Search button {} not found, waiting for results anyway", form.search_button);
        }

        let container = &self.config.results.container;
        if page.wait_for(container, self.config.timeouts.results_wait()).await {
            info!("Search results ready for {}", describe(&criteria));
            Ok(NavigationOutcome::ResultsReady)
        } else {
            info!("No results rendered for {}", describe(&criteria));
            Ok(NavigationOutcome::NoResults)
        }
    }

    async fn fill_location(&self, page: &dyn BrowserPage, input: &str, location: &str) {
        let timeouts = &self.config.timeouts;
        if !page.wait_for(input, timeouts.element_wait()).await {
            warn!("Location input {} not found, skipping {}", input, location);
            return;
        }
        if let Err(e) = page.type_text(input, location).await {
            warn!("Could not type {} into {}: {}", location, input, e);
            return;
        }

        let option = &self.config.form.autocomplete_option;
        if !page.wait_for(option, timeouts.autocomplete_wait()).await {
            debug!("No autocomplete suggestion for {}", location);
            return;
        }
        if let Err(e) = page.click(option).await {
            warn!("Could not pick suggestion for {}: {}", location, e);
        }
    }

    async fn select_radius(&self, page: &dyn BrowserPage, radius: i64) {
        let select = &self.config.form.radius_select;
        if !page.wait_for(select, self.config.timeouts.element_wait()).await {
            debug!("Radius control {} not found, keeping default", select);
            return;
        }
        if let Err(e) = page.select_option(select, &radius.to_string()).await {
            warn!("Could not set pickup radius to {}: {}", radius, e);
        }
    }
}

fn describe(criteria: &SearchCriteria) -> String {
    format!(
        "{} -> {}",
        criteria.origin_label().unwrap_or_else(|| "anywhere".to_string()),
        criteria.destination_label().unwrap_or_else(|| "anywhere".to_string())
    )
}

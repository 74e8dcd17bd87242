//! Turns rendered marketplace HTML into `ScrapedLoad`s.
//!
//! Each extractor owns a selector strategy from the marketplace config, so
//! markup changes are handled by editing configuration. Extraction is best
//! effort: a missing field becomes `None` or an empty string, and a card
//! that cannot be read at all is logged and skipped.

use chrono::{DateTime, Utc};
use haulscout_core::load::{normalize_raw_load, synthetic_load_id, RawLoad};
use haulscout_core::text::normalize_whitespace;
use haulscout_core::{BookedSelectors, HaulError, ResultSelectors, Result, ScrapedLoad, UNKNOWN_EQUIPMENT};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

pub use haulscout_core::text::{parse_number, sanitize_id};

/// Reads loads out of one kind of page.
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, html: &str, scanned_at: DateTime<Utc>) -> Result<Vec<ScrapedLoad>>;
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| HaulError::Scraping(format!("bad selector {:?}: {}", selector, e)))
}

fn element_text(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn first_text(card: ElementRef, selector: &Selector) -> String {
    card.select(selector).next().map(element_text).unwrap_or_default()
}

fn card_id(card: ElementRef, attribute: &str) -> Option<String> {
    card.value()
        .attr(attribute)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Parses a currency display value such as `"$1,250.00"`.
pub fn parse_currency(text: &str) -> Option<f64> {
    parse_number(text)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailsBlob {
    pub equipment: String,
    pub distance: Option<f64>,
    pub weight: Option<f64>,
}

/// Splits an `equipment | distance | weight` blob. Each position is read on
/// its own, so a bad distance does not lose the weight.
pub fn parse_details_blob(text: &str) -> DetailsBlob {
    let mut parts = text.split('|').map(str::trim);
    let equipment = parts
        .next()
        .map(normalize_whitespace)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| UNKNOWN_EQUIPMENT.to_string());

    DetailsBlob {
        equipment,
        distance: parts.next().and_then(parse_number),
        weight: parts.next().and_then(parse_number),
    }
}

/// Cards on the search results page.
pub struct SearchResultExtractor {
    card: Selector,
    location: Selector,
    rate: Selector,
    rate_per_mile: Selector,
    details: Selector,
    broker: Selector,
    pickup_date: Selector,
    id_attribute: String,
}

impl SearchResultExtractor {
    pub fn new(selectors: &ResultSelectors) -> Result<Self> {
        Ok(Self {
            card: parse_selector(&selectors.card)?,
            location: parse_selector(&selectors.location)?,
            rate: parse_selector(&selectors.rate)?,
            rate_per_mile: parse_selector(&selectors.rate_per_mile)?,
            details: parse_selector(&selectors.details)?,
            broker: parse_selector(&selectors.broker)?,
            pickup_date: parse_selector(&selectors.pickup_date)?,
            id_attribute: selectors.id_attribute.clone(),
        })
    }

    /// Every field is read on its own; a missing one degrades to empty or
    /// unknown instead of dropping the card.
    fn extract_card(&self, card: ElementRef, scanned_at: DateTime<Utc>, index: usize) -> ScrapedLoad {
        let mut locations = card.select(&self.location).map(element_text);
        let origin = locations.next().unwrap_or_default();
        let destination = locations.next().unwrap_or_default();

        let rate = parse_currency(&first_text(card, &self.rate));
        let details = card
            .select(&self.details)
            .next()
            .map(|el| parse_details_blob(&element_text(el)))
            .unwrap_or_else(|| parse_details_blob(""));

        let (id, id_is_synthetic) = match card_id(card, &self.id_attribute) {
            Some(id) => (id, false),
            None => (synthetic_load_id(&origin, &destination, rate, scanned_at, index), true),
        };

        ScrapedLoad {
            id,
            origin,
            destination,
            rate,
            rate_per_mile: parse_currency(&first_text(card, &self.rate_per_mile)),
            equipment: details.equipment,
            distance: details.distance,
            weight: details.weight,
            broker: first_text(card, &self.broker),
            pickup_date: first_text(card, &self.pickup_date),
            status: None,
            id_is_synthetic,
        }
    }
}

impl Extractor for SearchResultExtractor {
    fn name(&self) -> &'static str {
        "search-results"
    }

    fn extract(&self, html: &str, scanned_at: DateTime<Utc>) -> Result<Vec<ScrapedLoad>> {
        let document = Html::parse_document(html);
        let loads: Vec<ScrapedLoad> = document
            .select(&self.card)
            .enumerate()
            .map(|(index, card)| self.extract_card(card, scanned_at, index))
            .collect();

        debug!("Extracted {} loads from search results", loads.len());
        Ok(loads)
    }
}

/// Cards on the booked loads page, matched on class-name substrings.
pub struct BookedLoadExtractor {
    card: Selector,
    origin: Selector,
    destination: Selector,
    rate: Selector,
    rate_per_mile: Selector,
    equipment: Selector,
    distance: Selector,
    weight: Selector,
    broker: Selector,
    pickup_date: Selector,
    status: Selector,
    id_attribute: String,
}

impl BookedLoadExtractor {
    pub fn new(selectors: &BookedSelectors) -> Result<Self> {
        Ok(Self {
            card: parse_selector(&selectors.card)?,
            origin: parse_selector(&selectors.origin)?,
            destination: parse_selector(&selectors.destination)?,
            rate: parse_selector(&selectors.rate)?,
            rate_per_mile: parse_selector(&selectors.rate_per_mile)?,
            equipment: parse_selector(&selectors.equipment)?,
            distance: parse_selector(&selectors.distance)?,
            weight: parse_selector(&selectors.weight)?,
            broker: parse_selector(&selectors.broker)?,
            pickup_date: parse_selector(&selectors.pickup_date)?,
            status: parse_selector(&selectors.status)?,
            id_attribute: selectors.id_attribute.clone(),
        })
    }

    fn extract_card(&self, card: ElementRef, scanned_at: DateTime<Utc>, index: usize) -> Option<ScrapedLoad> {
        let origin = first_text(card, &self.origin);
        let destination = first_text(card, &self.destination);
        if origin.is_empty() && destination.is_empty() {
            return None;
        }

        let rate = parse_currency(&first_text(card, &self.rate));
        let equipment = first_text(card, &self.equipment);
        let status = first_text(card, &self.status);
        let (id, id_is_synthetic) = match card_id(card, &self.id_attribute) {
            Some(id) => (id, false),
            None => (synthetic_load_id(&origin, &destination, rate, scanned_at, index), true),
        };

        Some(ScrapedLoad {
            id,
            origin,
            destination,
            rate,
            rate_per_mile: parse_currency(&first_text(card, &self.rate_per_mile)),
            equipment: if equipment.is_empty() { UNKNOWN_EQUIPMENT.to_string() } else { equipment },
            distance: parse_number(&first_text(card, &self.distance)),
            weight: parse_number(&first_text(card, &self.weight)),
            broker: first_text(card, &self.broker),
            pickup_date: first_text(card, &self.pickup_date),
            status: (!status.is_empty()).then_some(status),
            id_is_synthetic,
        })
    }
}

impl Extractor for BookedLoadExtractor {
    fn name(&self) -> &'static str {
        "booked-loads"
    }

    fn extract(&self, html: &str, scanned_at: DateTime<Utc>) -> Result<Vec<ScrapedLoad>> {
        let document = Html::parse_document(html);
        let mut loads = Vec::new();
        let mut dropped = 0;

        for (index, card) in document.select(&self.card).enumerate() {
            match self.extract_card(card, scanned_at, index) {
                Some(load) => loads.push(load),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!("Dropped {} booked cards without origin or destination", dropped);
        }
        Ok(loads)
    }
}

/// Loads embedded as JSON in a `<script>` tag, in any of the record shapes
/// `RawLoad` accepts. The script may hold an array or an object with a
/// `loads` array.
pub struct EmbeddedJsonExtractor {
    script: Selector,
}

impl EmbeddedJsonExtractor {
    pub fn new(script_selector: &str) -> Result<Self> {
        Ok(Self { script: parse_selector(script_selector)? })
    }
}

impl Extractor for EmbeddedJsonExtractor {
    fn name(&self) -> &'static str {
        "embedded-json"
    }

    fn extract(&self, html: &str, scanned_at: DateTime<Utc>) -> Result<Vec<ScrapedLoad>> {
        let document = Html::parse_document(html);
        let Some(script) = document.select(&self.script).next() else {
            return Ok(Vec::new());
        };

        let payload: serde_json::Value = serde_json::from_str(&script.text().collect::<String>())?;
        let records = match payload {
            serde_json::Value::Array(records) => records,
            serde_json::Value::Object(mut object) => match object.remove("loads") {
                Some(serde_json::Value::Array(records)) => records,
                _ => return Err(HaulError::Scraping("embedded JSON has no loads array".to_string())),
            },
            _ => return Err(HaulError::Scraping("embedded JSON is not a list of loads".to_string())),
        };

        let mut loads = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<RawLoad>(record) {
                Ok(raw) => loads.push(normalize_raw_load(raw, |origin, destination, rate| {
                    synthetic_load_id(origin, destination, rate, scanned_at, index)
                })),
                Err(e) => warn!("Skipping embedded load {}: {}", index, e),
            }
        }
        Ok(loads)
    }
}

/// Tries each extractor in turn and returns the first non-empty result.
/// Errors from one strategy are logged so the next one still runs.
pub struct FallbackExtractor {
    extractors: Vec<Box<dyn Extractor>>,
}

impl FallbackExtractor {
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }
}

impl Extractor for FallbackExtractor {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn extract(&self, html: &str, scanned_at: DateTime<Utc>) -> Result<Vec<ScrapedLoad>> {
        for extractor in &self.extractors {
            match extractor.extract(html, scanned_at) {
                Ok(loads) if !loads.is_empty() => return Ok(loads),
                Ok(_) => debug!("{} found no loads", extractor.name()),
                Err(e) => warn!("{} failed: {}", extractor.name(), e),
            }
        }
        Ok(Vec::new())
    }
}

use crate::text::{join_city_state, normalize_whitespace, parse_number, sanitize_id};
use crate::{HaulError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const UNKNOWN_EQUIPMENT: &str = "Unknown";

/// A load listing in normalized form.
///
/// Numeric fields are `None` when the listing did not carry a usable value,
/// which keeps a genuine zero apart from a failed extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedLoad {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub rate: Option<f64>,
    pub rate_per_mile: Option<f64>,
    pub equipment: String,
    pub distance: Option<f64>,
    pub weight: Option<f64>,
    pub broker: String,
    pub pickup_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub id_is_synthetic: bool,
}

impl ScrapedLoad {
    pub fn rate_or_zero(&self) -> f64 {
        self.rate.unwrap_or(0.0)
    }

    pub fn distance_or_zero(&self) -> f64 {
        self.distance.unwrap_or(0.0)
    }

    pub fn weight_or_zero(&self) -> f64 {
        self.weight.unwrap_or(0.0)
    }

    /// Rate per mile as listed, or computed from rate and distance.
    pub fn effective_rpm(&self) -> Option<f64> {
        self.rate_per_mile.or_else(|| match (self.rate, self.distance) {
            (Some(rate), Some(distance)) if distance > 0.0 => Some(rate / distance),
            _ => None,
        })
    }
}

/// Builds the fallback identifier used when a listing has no marketplace ID.
pub fn synthetic_load_id(
    origin: &str,
    destination: &str,
    rate: Option<f64>,
    scanned_at: DateTime<Utc>,
    index: usize,
) -> String {
    let rate = rate.map(|r| r.to_string()).unwrap_or_else(|| "0".to_string());
    sanitize_id(&format!(
        "{}-{}-{}-{}-{}",
        origin,
        destination,
        rate,
        scanned_at.timestamp_millis(),
        index
    ))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    // Integers come first so large numeric ids keep every digit.
    Integer(i64),
    Unsigned(u64),
    Number(f64),
    Text(String),
}

impl NumberOrText {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrText::Integer(n) => Some(*n as f64),
            NumberOrText::Unsigned(n) => Some(*n as f64),
            NumberOrText::Number(n) => Some(*n),
            NumberOrText::Text(t) => parse_number(t),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            NumberOrText::Integer(n) => n.to_string(),
            NumberOrText::Unsigned(n) => n.to_string(),
            NumberOrText::Number(n) => n.to_string(),
            NumberOrText::Text(t) => t.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EquipmentField {
    List(Vec<String>),
    Text(String),
}

/// A load record in any of the shapes the marketplace or older exports used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLoad {
    #[serde(alias = "loadId", alias = "load_id")]
    pub id: Option<NumberOrText>,
    pub origin: Option<String>,
    #[serde(alias = "origin_city")]
    pub origin_city: Option<String>,
    #[serde(alias = "origin_state")]
    pub origin_state: Option<String>,
    pub destination: Option<String>,
    #[serde(alias = "destination_city")]
    pub destination_city: Option<String>,
    #[serde(alias = "destination_state")]
    pub destination_state: Option<String>,
    #[serde(alias = "payout", alias = "totalPayout")]
    pub rate: Option<NumberOrText>,
    #[serde(alias = "rpm", alias = "rate_per_mile")]
    pub rate_per_mile: Option<NumberOrText>,
    #[serde(alias = "equipmentType", alias = "equipment_type")]
    pub equipment: Option<EquipmentField>,
    #[serde(alias = "miles", alias = "totalDistance")]
    pub distance: Option<NumberOrText>,
    pub weight: Option<NumberOrText>,
    #[serde(alias = "brokerName", alias = "broker_name")]
    pub broker: Option<String>,
    #[serde(alias = "pickup_date", alias = "pickup")]
    pub pickup_date: Option<String>,
    pub status: Option<String>,
}

/// Coerces a raw record into a `ScrapedLoad`, using `fallback_id` when the
/// record has no identifier of its own.
pub fn normalize_raw_load(raw: RawLoad, fallback_id: impl FnOnce(&str, &str, Option<f64>) -> String) -> ScrapedLoad {
    let text = |value: Option<String>| value.map(|v| normalize_whitespace(&v)).unwrap_or_default();

    let origin = raw
        .origin
        .map(|o| normalize_whitespace(&o))
        .filter(|o| !o.is_empty())
        .or_else(|| join_city_state(raw.origin_city.as_deref(), raw.origin_state.as_deref()))
        .unwrap_or_default();
    let destination = raw
        .destination
        .map(|d| normalize_whitespace(&d))
        .filter(|d| !d.is_empty())
        .or_else(|| join_city_state(raw.destination_city.as_deref(), raw.destination_state.as_deref()))
        .unwrap_or_default();

    let rate = raw.rate.as_ref().and_then(NumberOrText::as_f64);
    let equipment = match raw.equipment {
        Some(EquipmentField::List(items)) => items.join(", "),
        Some(EquipmentField::Text(text)) => normalize_whitespace(&text),
        None => String::new(),
    };
    let equipment = if equipment.is_empty() { UNKNOWN_EQUIPMENT.to_string() } else { equipment };

    let (id, id_is_synthetic) = match raw.id.map(|id| id.as_text()).filter(|id| !id.is_empty()) {
        Some(id) => (id, false),
        None => (fallback_id(&origin, &destination, rate), true),
    };

    ScrapedLoad {
        id,
        origin,
        destination,
        rate,
        rate_per_mile: raw.rate_per_mile.as_ref().and_then(NumberOrText::as_f64),
        equipment,
        distance: raw.distance.as_ref().and_then(NumberOrText::as_f64),
        weight: raw.weight.as_ref().and_then(NumberOrText::as_f64),
        broker: text(raw.broker),
        pickup_date: text(raw.pickup_date),
        status: raw.status.map(|s| normalize_whitespace(&s)).filter(|s| !s.is_empty()),
        id_is_synthetic,
    }
}

/// Reads a stored details blob, accepting both the current shape and older
/// raw shapes.
pub fn load_from_json(value: serde_json::Value, row_id: i64) -> Result<ScrapedLoad> {
    if let Ok(load) = serde_json::from_value::<ScrapedLoad>(value.clone()) {
        return Ok(load);
    }
    let raw: RawLoad = serde_json::from_value(value)?;
    Ok(normalize_raw_load(raw, |_, _, _| format!("row-{}", row_id)))
}

/// A load found by a scan and stored against its criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundLoad {
    pub id: Option<i64>,
    pub criteria_id: i64,
    pub load_id: String,
    pub details: ScrapedLoad,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavedLoadStatus {
    Interested,
    Trash,
}

impl SavedLoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SavedLoadStatus::Interested => "interested",
            SavedLoadStatus::Trash => "trash",
        }
    }
}

impl fmt::Display for SavedLoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SavedLoadStatus {
    type Err = HaulError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "interested" => Ok(SavedLoadStatus::Interested),
            "trash" => Ok(SavedLoadStatus::Trash),
            _ => Err(HaulError::Invalid(format!("saved load status: {}", s))),
        }
    }
}

/// A load the user flagged as interesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedLoad {
    pub id: Option<i64>,
    pub user_id: String,
    pub found_load_id: Option<i64>,
    pub load_id: String,
    pub details: ScrapedLoad,
    pub status: SavedLoadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedLoad {
    pub fn new(user_id: impl Into<String>, found_load_id: Option<i64>, details: ScrapedLoad) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            user_id: user_id.into(),
            found_load_id,
            load_id: details.id.clone(),
            details,
            status: SavedLoadStatus::Interested,
            created_at: now,
            updated_at: now,
        }
    }
}

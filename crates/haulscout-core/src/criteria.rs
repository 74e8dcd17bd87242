use crate::text::join_city_state;
use crate::{HaulError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Progress of the most recent scan for a criteria record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Scanning,
    Success,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Scanning => "scanning",
            ScanStatus::Success => "success",
            ScanStatus::Error => "error",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = HaulError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scanning" => Ok(ScanStatus::Scanning),
            "success" => Ok(ScanStatus::Success),
            "error" => Ok(ScanStatus::Error),
            _ => Err(HaulError::Invalid(format!("scan status: {}", s))),
        }
    }
}

/// A user's saved load search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub id: Option<i64>,
    pub user_id: String,
    pub origin_city: Option<String>,
    pub origin_state: Option<String>,
    pub destination_city: Option<String>,
    pub destination_state: Option<String>,
    /// Pickup radius in miles.
    pub pickup_distance: Option<i64>,
    pub equipment_type: Option<String>,
    pub min_rate: Option<f64>,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
    pub booking_type: Option<String>,
    pub backhaul: bool,
    pub scan_status: Option<ScanStatus>,
    pub scan_error: Option<String>,
    pub last_scan_count: Option<i64>,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SearchCriteria {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            user_id: user_id.into(),
            origin_city: None,
            origin_state: None,
            destination_city: None,
            destination_state: None,
            pickup_distance: None,
            equipment_type: None,
            min_rate: None,
            min_weight: None,
            max_weight: None,
            booking_type: None,
            backhaul: false,
            scan_status: None,
            scan_error: None,
            last_scan_count: None,
            last_scanned_at: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Trims text fields, drops blanks and upper-cases state codes.
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(String::from)
        }

        Self {
            origin_city: clean(&self.origin_city),
            origin_state: clean(&self.origin_state).map(|s| s.to_uppercase()),
            destination_city: clean(&self.destination_city),
            destination_state: clean(&self.destination_state).map(|s| s.to_uppercase()),
            equipment_type: clean(&self.equipment_type),
            booking_type: clean(&self.booking_type),
            pickup_distance: self.pickup_distance.filter(|d| *d > 0),
            ..self.clone()
        }
    }

    pub fn origin_label(&self) -> Option<String> {
        join_city_state(self.origin_city.as_deref(), self.origin_state.as_deref())
    }

    pub fn destination_label(&self) -> Option<String> {
        join_city_state(self.destination_city.as_deref(), self.destination_state.as_deref())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

use crate::{HaulError, Result, ScrapedLoad};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackhaulStatus {
    Pending,
    Searching,
    Found,
    NoResults,
    NoPreferences,
    Error,
}

impl BackhaulStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackhaulStatus::Pending => "pending",
            BackhaulStatus::Searching => "searching",
            BackhaulStatus::Found => "found",
            BackhaulStatus::NoResults => "no_results",
            BackhaulStatus::NoPreferences => "no_preferences",
            BackhaulStatus::Error => "error",
        }
    }
}

impl fmt::Display for BackhaulStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackhaulStatus {
    type Err = HaulError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(BackhaulStatus::Pending),
            "searching" => Ok(BackhaulStatus::Searching),
            "found" => Ok(BackhaulStatus::Found),
            "no_results" => Ok(BackhaulStatus::NoResults),
            "no_preferences" => Ok(BackhaulStatus::NoPreferences),
            "error" => Ok(BackhaulStatus::Error),
            _ => Err(HaulError::Invalid(format!("backhaul status: {}", s))),
        }
    }
}

/// Return-direction loads suggested for a saved load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedBackhaul {
    pub id: Option<i64>,
    pub saved_load_id: i64,
    pub status: BackhaulStatus,
    pub best_rate: Option<f64>,
    pub best_rpm: Option<f64>,
    pub result_count: i64,
    pub top_loads: Vec<ScrapedLoad>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SuggestedBackhaul {
    pub fn pending(saved_load_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            saved_load_id,
            status: BackhaulStatus::Pending,
            best_rate: None,
            best_rpm: None,
            result_count: 0,
            top_loads: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: BackhaulStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Records a finished search, choosing `found` or `no_results`.
    pub fn record_results(&mut self, loads: &[ScrapedLoad], top_n: usize) {
        let summary = BackhaulSummary::from_loads(loads, top_n);
        self.status = if loads.is_empty() { BackhaulStatus::NoResults } else { BackhaulStatus::Found };
        self.best_rate = summary.best_rate;
        self.best_rpm = summary.best_rpm;
        self.result_count = loads.len() as i64;
        self.top_loads = summary.top_loads;
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.status = BackhaulStatus::Error;
        self.error = Some(message.into());
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackhaulSummary {
    pub best_rate: Option<f64>,
    pub best_rpm: Option<f64>,
    pub top_loads: Vec<ScrapedLoad>,
}

fn desc_unknown_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl BackhaulSummary {
    /// Best rate, best RPM and the `top_n` loads ranked by RPM then rate.
    pub fn from_loads(loads: &[ScrapedLoad], top_n: usize) -> Self {
        let best_rate = loads.iter().filter_map(|l| l.rate).reduce(f64::max);
        let best_rpm = loads.iter().filter_map(|l| l.effective_rpm()).reduce(f64::max);

        let mut ranked = loads.to_vec();
        ranked.sort_by(|a, b| {
            desc_unknown_last(a.effective_rpm(), b.effective_rpm())
                .then_with(|| desc_unknown_last(a.rate, b.rate))
        });
        ranked.truncate(top_n);

        Self { best_rate, best_rpm, top_loads: ranked }
    }
}

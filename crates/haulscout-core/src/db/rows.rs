//! Row mapping for the stored models. Status columns are text and details
//! columns hold JSON, so these are written by hand.

use crate::backhaul::{BackhaulStatus, SuggestedBackhaul};
use crate::criteria::{ScanStatus, SearchCriteria};
use crate::load::{load_from_json, FoundLoad, SavedLoad, SavedLoadStatus, ScrapedLoad};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

fn decode_err(e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

fn details_from_row(row: &SqliteRow) -> Result<ScrapedLoad, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    let details: String = row.try_get("details")?;
    let value: serde_json::Value = serde_json::from_str(&details).map_err(decode_err)?;
    load_from_json(value, id).map_err(decode_err)
}

impl<'r> FromRow<'r, SqliteRow> for SearchCriteria {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let scan_status: Option<String> = row.try_get("scan_status")?;
        let scan_status = scan_status
            .map(|s| s.parse::<ScanStatus>())
            .transpose()
            .map_err(decode_err)?;

        Ok(SearchCriteria {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            origin_city: row.try_get("origin_city")?,
            origin_state: row.try_get("origin_state")?,
            destination_city: row.try_get("destination_city")?,
            destination_state: row.try_get("destination_state")?,
            pickup_distance: row.try_get("pickup_distance")?,
            equipment_type: row.try_get("equipment_type")?,
            min_rate: row.try_get("min_rate")?,
            min_weight: row.try_get("min_weight")?,
            max_weight: row.try_get("max_weight")?,
            booking_type: row.try_get("booking_type")?,
            backhaul: row.try_get("backhaul")?,
            scan_status,
            scan_error: row.try_get("scan_error")?,
            last_scan_count: row.try_get("last_scan_count")?,
            last_scanned_at: row.try_get("last_scanned_at")?,
            deleted_at: row.try_get("deleted_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for FoundLoad {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(FoundLoad {
            id: row.try_get("id")?,
            criteria_id: row.try_get("criteria_id")?,
            load_id: row.try_get("load_id")?,
            details: details_from_row(row)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for SavedLoad {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        Ok(SavedLoad {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            found_load_id: row.try_get("found_load_id")?,
            load_id: row.try_get("load_id")?,
            details: details_from_row(row)?,
            status: status.parse::<SavedLoadStatus>().map_err(decode_err)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for SuggestedBackhaul {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let top_loads: String = row.try_get("top_loads")?;
        Ok(SuggestedBackhaul {
            id: row.try_get("id")?,
            saved_load_id: row.try_get("saved_load_id")?,
            status: status.parse::<BackhaulStatus>().map_err(decode_err)?,
            best_rate: row.try_get("best_rate")?,
            best_rpm: row.try_get("best_rpm")?,
            result_count: row.try_get("result_count")?,
            top_loads: serde_json::from_str(&top_loads).map_err(decode_err)?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

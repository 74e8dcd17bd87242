use crate::scan::{invalidate_on_expiry, load_session, ScanPipeline};
use haulscout_core::text::split_city_state;
use haulscout_core::{
    BackhaulStatus, Cipher, Database, HaulError, Result, SavedLoad, SearchCriteria, SuggestedBackhaul,
};
use tracing::{info, warn};

/// Criteria for the return trip of `saved`: the load's destination becomes
/// the origin and vice versa. Filters come from the user's preference.
pub fn backhaul_criteria(saved: &SavedLoad, preference: &SearchCriteria) -> SearchCriteria {
    let (origin_city, origin_state) = split_city_state(&saved.details.destination);
    let (destination_city, destination_state) = split_city_state(&saved.details.origin);

    SearchCriteria {
        id: None,
        origin_city,
        origin_state,
        destination_city,
        destination_state,
        backhaul: true,
        scan_status: None,
        scan_error: None,
        last_scan_count: None,
        last_scanned_at: None,
        deleted_at: None,
        ..preference.clone()
    }
}

/// Searches for return loads after a saved load and stores the suggestion.
///
/// Scan failures are recorded on the suggestion rather than returned, so
/// the caller always gets the row's final state.
pub async fn suggest_backhaul(
    db: &Database,
    pipeline: &ScanPipeline,
    cipher: &Cipher,
    saved_load_id: i64,
    top_n: usize,
) -> Result<SuggestedBackhaul> {
    let saved = db
        .get_saved_load(saved_load_id)
        .await?
        .ok_or_else(|| HaulError::NotFound(format!("saved load {}", saved_load_id)))?;
    let mut backhaul = db.start_backhaul(saved_load_id).await?;

    let preferences = db.backhaul_preferences(&saved.user_id).await?;
    let Some(preference) = preferences.first() else {
        info!("User {} has no backhaul preferences", saved.user_id);
        backhaul.set_status(BackhaulStatus::NoPreferences);
        db.update_backhaul(&backhaul).await?;
        return Ok(backhaul);
    };

    let criteria = backhaul_criteria(&saved, preference);
    backhaul.set_status(BackhaulStatus::Searching);
    db.update_backhaul(&backhaul).await?;
    info!(
        "Searching backhaul for saved load {}: {} -> {}",
        saved_load_id, saved.details.destination, saved.details.origin
    );

    let outcome = async {
        let session = load_session(db, cipher, &saved.user_id).await?;
        pipeline.scan(&session, &criteria).await
    }
    .await;

    match outcome {
        Ok(loads) => backhaul.record_results(&loads, top_n),
        Err(e) => {
            warn!("Backhaul search for saved load {} failed: {}", saved_load_id, e);
            invalidate_on_expiry(db, &saved.user_id, &e).await;
            backhaul.record_error(e.user_message());
        }
    }

    db.update_backhaul(&backhaul).await?;
    Ok(backhaul)
}

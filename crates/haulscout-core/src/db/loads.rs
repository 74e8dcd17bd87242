use super::Database;
use crate::{
    BackhaulStatus, FoundLoad, HaulError, Result, SavedLoad, SavedLoadStatus, ScrapedLoad,
    SuggestedBackhaul,
};
use chrono::Utc;
use sqlx::FromRow;
use std::collections::HashSet;
use tracing::{debug, warn};

impl Database {
    pub async fn existing_load_ids(&self, criteria_id: i64) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT load_id FROM found_loads WHERE criteria_id = ?")
            .bind(criteria_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// Stores the loads whose marketplace ID has not been seen for this
    /// criteria and returns how many were inserted.
    ///
    /// The seen-ID check is a read followed by a write; two concurrent scans
    /// of the same criteria fall back on the unique constraint.
    pub async fn insert_new_loads(&self, criteria_id: i64, loads: &[ScrapedLoad]) -> Result<usize> {
        let mut seen = self.existing_load_ids(criteria_id).await?;
        let now = Utc::now();
        let mut inserted = 0;

        let mut tx = self.pool.begin().await?;
        for load in loads {
            if !seen.insert(load.id.clone()) {
                continue;
            }
            let details = serde_json::to_string(load)?;
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO found_loads (criteria_id, load_id, details, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(criteria_id)
            .bind(&load.id)
            .bind(details)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await?;

        debug!("Inserted {} of {} loads for criteria {}", inserted, loads.len(), criteria_id);
        Ok(inserted)
    }

    /// Found loads for a criteria, oldest first. Rows whose details cannot be
    /// read are logged and skipped.
    pub async fn list_found_loads(&self, criteria_id: i64) -> Result<Vec<FoundLoad>> {
        let rows = sqlx::query("SELECT * FROM found_loads WHERE criteria_id = ? ORDER BY id")
            .bind(criteria_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| match FoundLoad::from_row(row) {
                Ok(load) => Some(load),
                Err(e) => {
                    warn!("Skipping unreadable found load for criteria {}: {}", criteria_id, e);
                    None
                }
            })
            .collect())
    }

    pub async fn get_found_load(&self, id: i64) -> Result<Option<FoundLoad>> {
        let load = sqlx::query_as::<_, FoundLoad>("SELECT * FROM found_loads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(load)
    }

    /// Flags a load as interesting. Saving a load the user already has moves
    /// it back to `interested`.
    pub async fn save_load(&self, saved: &mut SavedLoad) -> Result<i64> {
        let now = Utc::now();
        saved.status = SavedLoadStatus::Interested;
        saved.updated_at = now;
        let details = serde_json::to_string(&saved.details)?;

        sqlx::query(
            r#"
            INSERT INTO saved_loads (user_id, found_load_id, load_id, details, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, load_id) DO UPDATE SET
                details = excluded.details,
                found_load_id = COALESCE(excluded.found_load_id, saved_loads.found_load_id),
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&saved.user_id)
        .bind(saved.found_load_id)
        .bind(&saved.load_id)
        .bind(details)
        .bind(saved.status.as_str())
        .bind(saved.created_at)
        .bind(saved.updated_at)
        .execute(&self.pool)
        .await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM saved_loads WHERE user_id = ? AND load_id = ?")
            .bind(&saved.user_id)
            .bind(&saved.load_id)
            .fetch_one(&self.pool)
            .await?;
        saved.id = Some(id);
        Ok(id)
    }

    /// Copies a found load into the user's saved loads. Loads found by
    /// another user's criteria are treated as missing.
    pub async fn save_found_load(&self, user_id: &str, found_load_id: i64) -> Result<SavedLoad> {
        let not_found = || HaulError::NotFound(format!("found load {}", found_load_id));
        let found = self.get_found_load(found_load_id).await?.ok_or_else(not_found)?;
        if self.get_user_criteria(user_id, found.criteria_id).await?.is_none() {
            return Err(not_found());
        }
        let mut saved = SavedLoad::new(user_id, found.id, found.details);
        self.save_load(&mut saved).await?;
        Ok(saved)
    }

    pub async fn get_saved_load(&self, id: i64) -> Result<Option<SavedLoad>> {
        let saved = sqlx::query_as::<_, SavedLoad>("SELECT * FROM saved_loads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(saved)
    }

    pub async fn list_saved_loads(&self, user_id: &str, status: SavedLoadStatus) -> Result<Vec<SavedLoad>> {
        let rows = sqlx::query("SELECT * FROM saved_loads WHERE user_id = ? AND status = ? ORDER BY updated_at DESC, id DESC")
            .bind(user_id)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| match SavedLoad::from_row(row) {
                Ok(saved) => Some(saved),
                Err(e) => {
                    warn!("Skipping unreadable saved load for user {}: {}", user_id, e);
                    None
                }
            })
            .collect())
    }

    pub async fn set_saved_load_status(&self, id: i64, status: SavedLoadStatus) -> Result<()> {
        let result = sqlx::query("UPDATE saved_loads SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(HaulError::NotFound(format!("saved load {}", id)));
        }
        Ok(())
    }

    /// Permanently removes a saved load and its backhaul suggestion.
    pub async fn remove_saved_load(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM suggested_backhauls WHERE saved_load_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM saved_loads WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(HaulError::NotFound(format!("saved load {}", id)));
        }
        Ok(())
    }

    /// Creates the suggestion row for a saved load, or resets an existing one
    /// to `pending`.
    pub async fn start_backhaul(&self, saved_load_id: i64) -> Result<SuggestedBackhaul> {
        let mut backhaul = SuggestedBackhaul::pending(saved_load_id);
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO suggested_backhauls (saved_load_id, status, result_count, top_loads, created_at, updated_at)
            VALUES (?, ?, 0, '[]', ?, ?)
            ON CONFLICT(saved_load_id) DO UPDATE SET
                status = excluded.status,
                best_rate = NULL,
                best_rpm = NULL,
                result_count = 0,
                top_loads = '[]',
                error = NULL,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(saved_load_id)
        .bind(BackhaulStatus::Pending.as_str())
        .bind(backhaul.created_at)
        .bind(backhaul.updated_at)
        .fetch_one(&self.pool)
        .await?;

        backhaul.id = Some(id);
        Ok(backhaul)
    }

    pub async fn update_backhaul(&self, backhaul: &SuggestedBackhaul) -> Result<()> {
        let top_loads = serde_json::to_string(&backhaul.top_loads)?;
        sqlx::query(
            r#"
            UPDATE suggested_backhauls SET
                status = ?,
                best_rate = ?,
                best_rpm = ?,
                result_count = ?,
                top_loads = ?,
                error = ?,
                updated_at = ?
            WHERE saved_load_id = ?
            "#,
        )
        .bind(backhaul.status.as_str())
        .bind(backhaul.best_rate)
        .bind(backhaul.best_rpm)
        .bind(backhaul.result_count)
        .bind(top_loads)
        .bind(&backhaul.error)
        .bind(backhaul.updated_at)
        .bind(backhaul.saved_load_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_backhaul(&self, saved_load_id: i64) -> Result<Option<SuggestedBackhaul>> {
        let backhaul = sqlx::query_as::<_, SuggestedBackhaul>(
            "SELECT * FROM suggested_backhauls WHERE saved_load_id = ?",
        )
        .bind(saved_load_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(backhaul)
    }
}

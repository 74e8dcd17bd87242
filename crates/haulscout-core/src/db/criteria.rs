use super::{CriteriaQueryBuilder, Database};
use crate::{HaulError, Result, ScanStatus, SearchCriteria};
use chrono::Utc;
use tracing::debug;

impl Database {
    /// Inserts new criteria and fills in its ID.
    pub async fn create_criteria(&self, criteria: &mut SearchCriteria) -> Result<i64> {
        let now = Utc::now();
        criteria.created_at = now;
        criteria.updated_at = now;

        let id = sqlx::query(
            r#"
            INSERT INTO search_criteria (
                user_id, origin_city, origin_state, destination_city, destination_state,
                pickup_distance, equipment_type, min_rate, min_weight, max_weight,
                booking_type, backhaul, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&criteria.user_id)
        .bind(&criteria.origin_city)
        .bind(&criteria.origin_state)
        .bind(&criteria.destination_city)
        .bind(&criteria.destination_state)
        .bind(criteria.pickup_distance)
        .bind(&criteria.equipment_type)
        .bind(criteria.min_rate)
        .bind(criteria.min_weight)
        .bind(criteria.max_weight)
        .bind(&criteria.booking_type)
        .bind(criteria.backhaul)
        .bind(criteria.created_at)
        .bind(criteria.updated_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        criteria.id = Some(id);
        debug!("Created criteria {} for user {}", id, criteria.user_id);
        Ok(id)
    }

    pub async fn get_criteria(&self, id: i64) -> Result<Option<SearchCriteria>> {
        let criteria = sqlx::query_as::<_, SearchCriteria>("SELECT * FROM search_criteria WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(criteria)
    }

    /// Looks up criteria only if it belongs to `user_id`.
    pub async fn get_user_criteria(&self, user_id: &str, id: i64) -> Result<Option<SearchCriteria>> {
        let criteria = sqlx::query_as::<_, SearchCriteria>("SELECT * FROM search_criteria WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(criteria)
    }

    pub async fn list_criteria(&self, user_id: Option<&str>, include_deleted: bool) -> Result<Vec<SearchCriteria>> {
        let mut query = CriteriaQueryBuilder::new();
        if let Some(user_id) = user_id {
            query = query.with_user(user_id);
        }
        if !include_deleted {
            query = query.active_only();
        }
        query.newest_first(None).execute(&self.pool).await
    }

    /// Active criteria flagged for backhaul, newest first.
    pub async fn backhaul_preferences(&self, user_id: &str) -> Result<Vec<SearchCriteria>> {
        CriteriaQueryBuilder::new()
            .with_user(user_id)
            .active_only()
            .backhaul_only()
            .newest_first(None)
            .execute(&self.pool)
            .await
    }

    /// Saves the user-editable fields. Scan status columns are left alone.
    pub async fn update_criteria(&self, criteria: &mut SearchCriteria) -> Result<()> {
        let id = criteria
            .id
            .ok_or_else(|| HaulError::Invalid("criteria has no id".to_string()))?;
        criteria.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE search_criteria SET
                origin_city = ?,
                origin_state = ?,
                destination_city = ?,
                destination_state = ?,
                pickup_distance = ?,
                equipment_type = ?,
                min_rate = ?,
                min_weight = ?,
                max_weight = ?,
                booking_type = ?,
                backhaul = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&criteria.origin_city)
        .bind(&criteria.origin_state)
        .bind(&criteria.destination_city)
        .bind(&criteria.destination_state)
        .bind(criteria.pickup_distance)
        .bind(&criteria.equipment_type)
        .bind(criteria.min_rate)
        .bind(criteria.min_weight)
        .bind(criteria.max_weight)
        .bind(&criteria.booking_type)
        .bind(criteria.backhaul)
        .bind(criteria.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HaulError::NotFound(format!("criteria {}", id)));
        }
        Ok(())
    }

    pub async fn soft_delete_criteria(&self, id: i64) -> Result<()> {
        self.set_deleted_at(id, Some(Utc::now())).await
    }

    pub async fn restore_criteria(&self, id: i64) -> Result<()> {
        self.set_deleted_at(id, None).await
    }

    async fn set_deleted_at(&self, id: i64, deleted_at: Option<chrono::DateTime<Utc>>) -> Result<()> {
        let result = sqlx::query("UPDATE search_criteria SET deleted_at = ?, updated_at = ? WHERE id = ?")
            .bind(deleted_at)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(HaulError::NotFound(format!("criteria {}", id)));
        }
        Ok(())
    }

    /// Removes the criteria and every load found for it.
    pub async fn delete_criteria(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM found_loads WHERE criteria_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM search_criteria WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(HaulError::NotFound(format!("criteria {}", id)));
        }
        Ok(())
    }

    /// Writes the scan side channel: status, optional message, and the load
    /// count of the last successful scan.
    pub async fn set_scan_status(
        &self,
        id: i64,
        status: ScanStatus,
        error: Option<&str>,
        count: Option<i64>,
    ) -> Result<()> {
        let now = Utc::now();
        let scanned_at = (status != ScanStatus::Scanning).then_some(now);

        sqlx::query(
            r#"
            UPDATE search_criteria SET
                scan_status = ?,
                scan_error = ?,
                last_scan_count = COALESCE(?, last_scan_count),
                last_scanned_at = COALESCE(?, last_scanned_at)
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(count)
        .bind(scanned_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

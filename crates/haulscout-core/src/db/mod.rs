pub mod migrations;
pub mod queries;

mod credentials;
mod criteria;
mod loads;
mod rows;

pub use migrations::{apply_migrations, get_applied_migrations, rollback_to, Migration, MIGRATIONS};
pub use queries::CriteriaQueryBuilder;

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database file and applies pending migrations.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// A private in-memory database on a single connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        debug!("Running database migrations");
        apply_migrations(&self.pool).await?;
        Ok(())
    }

    pub async fn rollback(&self, target_version: i32) -> Result<()> {
        rollback_to(&self.pool, target_version).await?;
        Ok(())
    }

    pub async fn get_applied_migrations(&self) -> Result<Vec<i32>> {
        Ok(get_applied_migrations(&self.pool)
            .await?
            .into_iter()
            .map(|m| m.version)
            .collect())
    }
}

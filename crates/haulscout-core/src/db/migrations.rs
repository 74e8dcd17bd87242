use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct Migration {
    pub version: i32,
    up: &'static str,
    down: &'static str,
}

impl Migration {
    pub const fn new(version: i32, up: &'static str, down: &'static str) -> Self {
        Self { version, up, down }
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Migration {}", self.version)
    }
}

pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        r#"
        CREATE TABLE IF NOT EXISTS credentials (
            user_id TEXT PRIMARY KEY,
            email_enc TEXT NOT NULL,
            session_cookie_enc TEXT NOT NULL,
            csrf_token_enc TEXT NOT NULL,
            is_valid INTEGER NOT NULL DEFAULT 1,
            last_validated_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        "DROP TABLE IF EXISTS credentials",
    ),
    Migration::new(
        2,
        r#"
        CREATE TABLE IF NOT EXISTS search_criteria (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            origin_city TEXT,
            origin_state TEXT,
            destination_city TEXT,
            destination_state TEXT,
            pickup_distance INTEGER,
            equipment_type TEXT,
            min_rate REAL,
            min_weight REAL,
            max_weight REAL,
            booking_type TEXT,
            backhaul INTEGER NOT NULL DEFAULT 0,
            scan_status TEXT CHECK(scan_status IN ('scanning', 'success', 'error')),
            scan_error TEXT,
            last_scan_count INTEGER,
            last_scanned_at TEXT,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_search_criteria_user ON search_criteria(user_id);
        "#,
        r#"
        DROP INDEX IF EXISTS idx_search_criteria_user;
        DROP TABLE IF EXISTS search_criteria;
        "#,
    ),
    Migration::new(
        3,
        r#"
        CREATE TABLE IF NOT EXISTS found_loads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            criteria_id INTEGER NOT NULL,
            load_id TEXT NOT NULL,
            details TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(criteria_id) REFERENCES search_criteria(id) ON DELETE CASCADE,
            UNIQUE(criteria_id, load_id)
        )
        "#,
        "DROP TABLE IF EXISTS found_loads",
    ),
    Migration::new(
        4,
        r#"
        CREATE TABLE IF NOT EXISTS saved_loads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            found_load_id INTEGER,
            load_id TEXT NOT NULL,
            details TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'interested' CHECK(status IN ('interested', 'trash')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(found_load_id) REFERENCES found_loads(id) ON DELETE SET NULL,
            UNIQUE(user_id, load_id)
        )
        "#,
        "DROP TABLE IF EXISTS saved_loads",
    ),
    Migration::new(
        5,
        r#"
        CREATE TABLE IF NOT EXISTS suggested_backhauls (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            saved_load_id INTEGER NOT NULL UNIQUE,
            status TEXT NOT NULL CHECK(status IN ('pending', 'searching', 'found', 'no_results', 'no_preferences', 'error')),
            best_rate REAL,
            best_rpm REAL,
            result_count INTEGER NOT NULL DEFAULT 0,
            top_loads TEXT NOT NULL DEFAULT '[]',
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(saved_load_id) REFERENCES saved_loads(id) ON DELETE CASCADE
        )
        "#,
        "DROP TABLE IF EXISTS suggested_backhauls",
    ),
];

const CREATE_LEDGER: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

async fn applied_versions(pool: &SqlitePool) -> Result<BTreeSet<i32>, sqlx::Error> {
    sqlx::query(CREATE_LEDGER).execute(pool).await?;
    let versions: Vec<i32> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await?;
    Ok(versions.into_iter().collect())
}

/// Runs one step and its ledger change in a single transaction, so a failed
/// step leaves neither its schema change nor its ledger row behind.
async fn run_step<'a>(
    pool: &SqlitePool,
    sql: &str,
    ledger: Query<'a, Sqlite, SqliteArguments<'a>>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query(sql).execute(&mut *tx).await?;
    ledger.execute(&mut *tx).await?;
    tx.commit().await
}

async fn apply_pending(pool: &SqlitePool, migrations: &[Migration]) -> Result<usize, sqlx::Error> {
    let applied = applied_versions(pool).await?;
    let mut count = 0;
    for migration in migrations.iter().filter(|m| !applied.contains(&m.version)) {
        debug!("Applying {}", migration);
        let record = sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
            .bind(migration.version)
            .bind(chrono::Utc::now());
        run_step(pool, migration.up, record).await?;
        count += 1;
    }
    Ok(count)
}

async fn roll_back(pool: &SqlitePool, migrations: &[Migration], target_version: i32) -> Result<usize, sqlx::Error> {
    let applied = applied_versions(pool).await?;
    let mut count = 0;
    for migration in migrations
        .iter()
        .rev()
        .filter(|m| m.version > target_version && applied.contains(&m.version))
    {
        debug!("Rolling back {}", migration);
        let forget = sqlx::query("DELETE FROM schema_migrations WHERE version = ?").bind(migration.version);
        run_step(pool, migration.down, forget).await?;
        count += 1;
    }
    Ok(count)
}

/// Applies every migration not yet recorded, oldest first.
pub async fn apply_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let count = apply_pending(pool, MIGRATIONS).await?;
    if count > 0 {
        debug!("Applied {} migrations", count);
    }
    Ok(())
}

/// Rolls back every applied migration newer than `target_version`, newest first.
pub async fn rollback_to(pool: &SqlitePool, target_version: i32) -> Result<(), sqlx::Error> {
    roll_back(pool, MIGRATIONS, target_version).await?;
    Ok(())
}

pub async fn get_applied_migrations(pool: &SqlitePool) -> Result<Vec<Migration>, sqlx::Error> {
    let applied = applied_versions(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| applied.contains(&m.version))
        .cloned()
        .collect())
}

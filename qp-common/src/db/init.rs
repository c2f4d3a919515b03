//! Working store initialization
//!
//! Creates the database on first run and the per-category question tables on
//! demand. The question tables carry the structural guarantees of the
//! lifecycle: content columns freeze once a row leaves `pending`, rows can
//! never be deleted, a rejection must carry notes, and a rejected row can be
//! referenced by at most one repair.

use super::models::{category_table, QUESTION_TABLE_PREFIX};
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Current working store schema version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Open (creating if needed) the working question store
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema_version_table(&pool).await?;

    Ok(pool)
}

/// Open an empty working store that lives only in memory
///
/// Used when a run must not leave anything on disk and no store exists yet.
/// Limited to a single connection, since every in-memory connection is its
/// own database.
pub async fn open_scratch_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    debug!("Opened in-memory scratch database");
    create_schema_version_table(&pool).await?;

    Ok(pool)
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(CURRENT_SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

/// Get the newest recorded schema version
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i64> {
    let version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;
    Ok(version.unwrap_or(0))
}

/// Check whether the question table for `category` exists
pub async fn category_table_exists(conn: &mut SqliteConnection, category: &str) -> Result<bool> {
    let table = category_table(category)?;
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
    )
    .bind(&table)
    .fetch_one(&mut *conn)
    .await?;
    Ok(exists)
}

/// Resolve the question table for `category`, failing if it was never created
pub async fn require_category_table(conn: &mut SqliteConnection, category: &str) -> Result<String> {
    if category_table_exists(conn, category).await? {
        category_table(category)
    } else {
        Err(Error::NotFound(format!("no questions stored for category '{}'", category)))
    }
}

/// Create the question table for `category` if it does not exist
///
/// Returns the table name. Runs on the caller's connection so that it takes
/// part in the caller's transaction.
pub async fn ensure_category_table(conn: &mut SqliteConnection, category: &str) -> Result<String> {
    let table = category_table(category)?;

    for statement in category_table_ddl(&table) {
        sqlx::query(&statement).execute(&mut *conn).await?;
    }

    debug!(category = category, table = %table, "Category table ready");
    Ok(table)
}

fn category_table_ddl(table: &str) -> Vec<String> {
    vec![
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                topic TEXT NOT NULL,
                part INTEGER,
                chapter INTEGER,
                question TEXT NOT NULL,
                options TEXT NOT NULL CHECK (json_valid(options)),
                correct_index INTEGER NOT NULL CHECK (correct_index BETWEEN 0 AND 3),
                explanation TEXT NOT NULL DEFAULT '',
                difficulty TEXT NOT NULL CHECK (difficulty IN ('easy', 'medium', 'hard')),
                review_status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (review_status IN ('pending', 'approved', 'rejected')),
                peer_reviewed INTEGER NOT NULL DEFAULT 0,
                quality_score REAL CHECK (quality_score IS NULL OR quality_score BETWEEN 0.0 AND 1.0),
                review_notes TEXT,
                reviewed_at TEXT,
                repair_of INTEGER REFERENCES {table}(id),
                created_at TEXT NOT NULL,
                CHECK (review_status != 'rejected'
                       OR (review_notes IS NOT NULL AND length(trim(review_notes)) > 0))
            )
            "#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_coordinate ON {table}(topic, part, chapter)"),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_status ON {table}(review_status)"),
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_repair_of ON {table}(repair_of) \
             WHERE repair_of IS NOT NULL"
        ),
        format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS {table}_freeze_content
            BEFORE UPDATE OF category, topic, part, chapter, question, options, correct_index,
                             explanation, difficulty, repair_of, created_at ON {table}
            WHEN OLD.review_status != 'pending'
            BEGIN
                SELECT RAISE(ABORT, 'question content is frozen once reviewed');
            END
            "#
        ),
        format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS {table}_no_delete
            BEFORE DELETE ON {table}
            BEGIN
                SELECT RAISE(ABORT, 'questions are never deleted');
            END
            "#
        ),
    ]
}

/// List all per-category question tables, alphabetically
pub async fn list_question_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let tables: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT name
        FROM sqlite_master
        WHERE type = 'table'
          AND substr(name, 1, ?) = ?
        ORDER BY name ASC
        "#,
    )
    .bind(QUESTION_TABLE_PREFIX.len() as i64)
    .bind(QUESTION_TABLE_PREFIX)
    .fetch_all(pool)
    .await?;
    Ok(tables)
}

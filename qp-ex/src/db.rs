//! Read-only access to the working question store

use crate::{ExportError, Result};
use qp_common::db::{list_question_tables, ReviewStatus};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Connect to the working store with `mode=ro`
///
/// The working store runs in WAL mode, so `immutable=1` is not used: it would
/// hide committed pages still sitting in the WAL.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(ExportError::StoreNotFound(format!(
            "{} (run qp-lc generate first)",
            db_path.display()
        )));
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=ro", db_path.display()))?
        .read_only(true);

    Ok(SqlitePool::connect_with(options).await?)
}

/// Row counts of one question table by review status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.approved + self.rejected
    }
}

/// Question tables in the working store, alphabetically
pub async fn question_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    Ok(list_question_tables(pool).await?)
}

pub async fn status_counts(pool: &SqlitePool, table: &str) -> Result<StatusCounts> {
    let rows = sqlx::query_as::<_, (String, i64)>(&format!(
        "SELECT review_status, COUNT(*) FROM {} GROUP BY review_status",
        table
    ))
    .fetch_all(pool)
    .await?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        match status.parse::<ReviewStatus>()? {
            ReviewStatus::Pending => counts.pending = count,
            ReviewStatus::Approved => counts.approved = count,
            ReviewStatus::Rejected => counts.rejected = count,
        }
    }
    Ok(counts)
}

/// Category name stored in `table`, falling back to the table suffix
pub async fn table_category(pool: &SqlitePool, table: &str) -> Result<String> {
    let category: Option<String> =
        sqlx::query_scalar(&format!("SELECT category FROM {} ORDER BY id LIMIT 1", table))
            .fetch_optional(pool)
            .await?;

    Ok(category.unwrap_or_else(|| {
        table
            .strip_prefix(qp_common::db::QUESTION_TABLE_PREFIX)
            .unwrap_or(table)
            .to_string()
    }))
}

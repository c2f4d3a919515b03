//! Production store writer
//!
//! The store is built in a sibling temp file and renamed over the target
//! only after the final commit, so readers see either the previous export or
//! the complete new one.

use crate::record::ProductionRecord;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Version of the production schema contract
pub const PRODUCTION_SCHEMA_VERSION: i64 = 1;

const PRODUCTION_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE questions (
        id INTEGER PRIMARY KEY,
        source_id INTEGER NOT NULL,
        category TEXT NOT NULL,
        topic TEXT NOT NULL,
        part INTEGER,
        chapter INTEGER,
        question TEXT NOT NULL,
        answers TEXT NOT NULL,
        correct_index INTEGER NOT NULL,
        explanation TEXT NOT NULL,
        difficulty INTEGER NOT NULL CHECK (difficulty IN (1, 2, 3)),
        tags TEXT NOT NULL,
        quality_score REAL,
        UNIQUE (category, source_id)
    )
    "#,
    "CREATE INDEX idx_questions_category ON questions(category, topic)",
    r#"
    CREATE TABLE export_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

/// Temp file the export is built in before the swap
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Replace the production store at `target` with `records`
pub async fn write_production_store(
    target: &Path,
    records: &[ProductionRecord],
    exported_at: &str,
) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp = temp_path(target);
    if temp.exists() {
        warn!("Removing stale temp export: {}", temp.display());
        std::fs::remove_file(&temp)?;
    }

    if let Err(e) = build(&temp, records, exported_at).await {
        if let Err(cleanup) = std::fs::remove_file(&temp) {
            debug!("Temp export cleanup failed: {}", cleanup);
        }
        return Err(e);
    }

    std::fs::rename(&temp, target)?;
    info!(
        "Production store written: {} ({} questions)",
        target.display(),
        records.len()
    );
    Ok(())
}

async fn build(path: &Path, records: &[ProductionRecord], exported_at: &str) -> Result<()> {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete)
        .connect()
        .await?;

    let result = populate(&mut conn, records, exported_at).await;
    conn.close().await?;
    result
}

async fn populate(
    conn: &mut SqliteConnection,
    records: &[ProductionRecord],
    exported_at: &str,
) -> Result<()> {
    let mut tx = conn.begin().await?;

    for statement in PRODUCTION_SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    for (position, record) in records.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO questions (
                id, source_id, category, topic, part, chapter, question, answers,
                correct_index, explanation, difficulty, tags, quality_score
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(position as i64 + 1)
        .bind(record.source_id)
        .bind(&record.category)
        .bind(&record.topic)
        .bind(record.part)
        .bind(record.chapter)
        .bind(&record.question)
        .bind(serde_json::to_string(&record.answers)?)
        .bind(record.correct_index)
        .bind(&record.explanation)
        .bind(record.difficulty)
        .bind(serde_json::to_string(&record.tags)?)
        .bind(record.quality_score)
        .execute(&mut *tx)
        .await?;
    }

    let meta = [
        ("schema_version", PRODUCTION_SCHEMA_VERSION.to_string()),
        ("question_count", records.len().to_string()),
        ("exported_at", exported_at.to_string()),
    ];
    for (key, value) in meta {
        sqlx::query("INSERT INTO export_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

//! Integration tests for the production exporter
//!
//! Working stores are populated through the lifecycle engine; the production
//! store is read back with a plain sqlx connection.

use qp_common::db::{init_database, ReviewStatus};
use qp_ex::{ExportError, ExportOptions, Exporter, PRODUCTION_SCHEMA_VERSION};
use qp_lc::{
    fetch_question, CorrectAnswer, LifecycleEngine, QuestionPayload, RepairSubmission,
    ReviewDecision, RunOptions, Scope,
};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    db_path: PathBuf,
    output: PathBuf,
    pool: SqlitePool,
    engine: LifecycleEngine,
}

async fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("quiz.db");
    let output = dir.path().join("production").join("quiz_production.db");
    let pool = init_database(&db_path).await.unwrap();
    let engine = LifecycleEngine::new(pool.clone());
    Fixture {
        _dir: dir,
        db_path,
        output,
        pool,
        engine,
    }
}

fn payload(n: usize, difficulty: &str) -> QuestionPayload {
    QuestionPayload {
        question: format!("Question {}?", n),
        options: (0..4).map(|o| format!("Option {}-{}", n, o)).collect(),
        correct_answer: CorrectAnswer::Index(1),
        difficulty: difficulty.to_string(),
        explanation: String::new(),
    }
}

fn decision(id: i64, status: &str, notes: Option<&str>) -> ReviewDecision {
    ReviewDecision {
        id,
        status: status.into(),
        quality_score: Some(0.5),
        review_notes: notes.map(str::to_string),
    }
}

async fn generate(f: &Fixture, scope: &Scope, difficulties: &[&str]) -> Vec<i64> {
    let batch: Vec<_> = difficulties
        .iter()
        .enumerate()
        .map(|(n, d)| payload(n, d))
        .collect();
    f.engine
        .generate(scope, &batch, RunOptions::default())
        .await
        .unwrap()
        .inserted_ids()
}

async fn production_rows(path: &Path) -> Vec<(i64, String, String, i64, String)> {
    let pool = SqlitePool::connect(&format!("sqlite://{}?mode=ro", path.display()))
        .await
        .unwrap();
    let rows = sqlx::query(
        "SELECT source_id, category, answers, difficulty, tags FROM questions ORDER BY id",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    let out: Vec<(i64, String, String, i64, String)> = rows
        .iter()
        .map(|r| {
            (
                r.get("source_id"),
                r.get("category"),
                r.get("answers"),
                r.get("difficulty"),
                r.get("tags"),
            )
        })
        .collect();
    pool.close().await;
    out
}

async fn export_meta(path: &Path, key: &str) -> String {
    let pool = SqlitePool::connect(&format!("sqlite://{}?mode=ro", path.display()))
        .await
        .unwrap();
    let value: String = sqlx::query_scalar("SELECT value FROM export_meta WHERE key = ?")
        .bind(key)
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;
    value
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let f = setup().await;
    let episode = Scope::at("tv-shows", "friends", Some(1), Some(1));
    let category = Scope::for_category("tv-shows");

    let ids = generate(&f, &episode, &["easy", "medium", "hard", "easy", "hard"]).await;
    assert_eq!(ids.len(), 5);

    let decisions = vec![
        decision(ids[0], "approved", None),
        decision(ids[1], "approved", None),
        decision(ids[2], "approved", None),
        decision(ids[3], "rejected", Some("two answers are correct")),
        decision(ids[4], "rejected", Some("wrong season")),
    ];
    f.engine
        .review(&category, &decisions, RunOptions::default())
        .await
        .unwrap();

    let mut conn = f.pool.acquire().await.unwrap();
    let rejected_before = vec![
        fetch_question(&mut *conn, "tv-shows", ids[3]).await.unwrap().unwrap(),
        fetch_question(&mut *conn, "tv-shows", ids[4]).await.unwrap().unwrap(),
    ];
    drop(conn);

    let repairs = vec![
        RepairSubmission {
            original_id: ids[3],
            content: payload(30, "medium"),
        },
        RepairSubmission {
            original_id: ids[4],
            content: payload(40, "medium"),
        },
    ];
    let report = f
        .engine
        .repair(&category, &repairs, RunOptions::default())
        .await
        .unwrap();
    assert_eq!(report.applied_count(), 2);

    let exporter = Exporter::open(&f.db_path, &f.output).await.unwrap();
    let export = exporter.run(&ExportOptions::default()).await.unwrap();
    assert_eq!(export.total, 3);
    assert_eq!(export.categories[0].exported, 3);
    assert_eq!(export.categories[0].skipped, 4);

    let rows = production_rows(&f.output).await;
    assert_eq!(rows.len(), 3);
    let source_ids: Vec<i64> = rows.iter().map(|r| r.0).collect();
    assert_eq!(source_ids, vec![ids[0], ids[1], ids[2]]);
    let difficulties: Vec<i64> = rows.iter().map(|r| r.3).collect();
    assert_eq!(difficulties, vec![1, 2, 3]);

    let answers: Vec<serde_json::Value> = serde_json::from_str(&rows[0].2).unwrap();
    assert_eq!(answers.len(), 4);
    assert_eq!(answers[2]["index"], 2);
    assert_eq!(answers[2]["text"], "Option 0-2");
    let tags: Vec<String> = serde_json::from_str(&rows[0].4).unwrap();
    assert_eq!(tags, vec!["tv-shows", "friends", "part:1", "chapter:1", "easy"]);

    assert_eq!(
        export_meta(&f.output, "schema_version").await,
        PRODUCTION_SCHEMA_VERSION.to_string()
    );
    assert_eq!(export_meta(&f.output, "question_count").await, "3");

    // Rejected originals are still present and untouched
    let mut conn = f.pool.acquire().await.unwrap();
    for before in rejected_before {
        let after = fetch_question(&mut *conn, "tv-shows", before.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.review_status, ReviewStatus::Rejected);
        assert_eq!(after, before);
    }
}

#[tokio::test]
async fn test_export_is_pure_apart_from_timestamp() {
    let f = setup().await;
    let scope = Scope::at("books", "dune", Some(1), None);
    let ids = generate(&f, &scope, &["hard", "medium"]).await;
    f.engine
        .review(
            &Scope::for_category("books"),
            &[decision(ids[0], "approved", None), decision(ids[1], "approved", None)],
            RunOptions::default(),
        )
        .await
        .unwrap();

    let exporter = Exporter::open(&f.db_path, &f.output).await.unwrap();
    let exported_at = "2024-06-01T12:00:00Z";
    exporter.run_at(&ExportOptions::default(), exported_at).await.unwrap();
    let first_rows = production_rows(&f.output).await;
    let first = std::fs::read(&f.output).unwrap();

    exporter.run_at(&ExportOptions::default(), exported_at).await.unwrap();
    let second = std::fs::read(&f.output).unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(first_rows.len(), 2);
    assert_eq!(export_meta(&f.output, "exported_at").await, exported_at);

    // A later export differs only in its timestamp
    exporter.run(&ExportOptions::default()).await.unwrap();
    assert_eq!(production_rows(&f.output).await, first_rows);
    assert_eq!(export_meta(&f.output, "question_count").await, "2");
}

#[tokio::test]
async fn test_export_orders_by_category_then_source_id() {
    let f = setup().await;
    let tv = generate(&f, &Scope::at("tv-shows", "friends", None, None), &["easy"]).await;
    let books = generate(&f, &Scope::at("books", "dune", None, None), &["easy", "hard"]).await;

    f.engine
        .review(&Scope::for_category("tv-shows"), &[decision(tv[0], "approved", None)], RunOptions::default())
        .await
        .unwrap();
    f.engine
        .review(
            &Scope::for_category("books"),
            &[decision(books[1], "approved", None), decision(books[0], "approved", None)],
            RunOptions::default(),
        )
        .await
        .unwrap();

    let exporter = Exporter::open(&f.db_path, &f.output).await.unwrap();
    exporter.run(&ExportOptions::default()).await.unwrap();

    let rows = production_rows(&f.output).await;
    let order: Vec<(String, i64)> = rows.iter().map(|r| (r.1.clone(), r.0)).collect();
    assert_eq!(
        order,
        vec![
            ("books".to_string(), books[0]),
            ("books".to_string(), books[1]),
            ("tv-shows".to_string(), tv[0]),
        ]
    );
}

#[tokio::test]
async fn test_malformed_approved_row_fails_whole_export() {
    let f = setup().await;
    let scope = Scope::at("tv-shows", "friends", Some(1), Some(1));
    let ids = generate(&f, &scope, &["easy"]).await;
    f.engine
        .review(&Scope::for_category("tv-shows"), &[decision(ids[0], "approved", None)], RunOptions::default())
        .await
        .unwrap();

    let exporter = Exporter::open(&f.db_path, &f.output).await.unwrap();
    exporter.run(&ExportOptions::default()).await.unwrap();
    assert_eq!(production_rows(&f.output).await.len(), 1);

    // A row that bypassed the lifecycle engine
    let bad_id = sqlx::query(
        r#"
        INSERT INTO questions_tv_shows (
            category, topic, part, chapter, question, options, correct_index,
            explanation, difficulty, review_status, peer_reviewed, created_at
        ) VALUES ('tv-shows', 'friends', 1, 1, 'Broken?', '["a","b","c"]', 0, '', 'easy',
                  'approved', 1, '2024-01-01T00:00:00Z')
        "#,
    )
    .execute(&f.pool)
    .await
    .unwrap()
    .last_insert_rowid();

    let err = exporter.run(&ExportOptions::default()).await.unwrap_err();
    match err {
        ExportError::Consistency { id, .. } => assert_eq!(id, bad_id),
        other => panic!("expected Consistency, got {:?}", other),
    }

    // Previous export survives, no temp file left behind
    assert_eq!(production_rows(&f.output).await.len(), 1);
    assert!(!qp_ex::writer::temp_path(&f.output).exists());
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let f = setup().await;
    let ids = generate(&f, &Scope::at("tv-shows", "friends", None, None), &["medium"]).await;
    f.engine
        .review(&Scope::for_category("tv-shows"), &[decision(ids[0], "approved", None)], RunOptions::default())
        .await
        .unwrap();

    let exporter = Exporter::open(&f.db_path, &f.output).await.unwrap();
    let options = ExportOptions {
        dry_run: true,
        category: Some("tv-shows".into()),
    };
    let report = exporter.run(&options).await.unwrap();
    assert_eq!(report.total, 1);
    assert!(report.output.is_none());
    assert!(!f.output.exists());
}

#[tokio::test]
async fn test_category_filter_requires_dry_run() {
    let f = setup().await;
    generate(&f, &Scope::at("tv-shows", "friends", None, None), &["easy"]).await;

    let exporter = Exporter::open(&f.db_path, &f.output).await.unwrap();
    let options = ExportOptions {
        dry_run: false,
        category: Some("tv-shows".into()),
    };
    let err = exporter.run(&options).await.unwrap_err();
    assert!(matches!(err, ExportError::InvalidInput(_)));
    assert!(!f.output.exists());
}

#[tokio::test]
async fn test_working_store_is_opened_read_only() {
    let f = setup().await;
    generate(&f, &Scope::at("tv-shows", "friends", None, None), &["easy"]).await;

    let pool = qp_ex::db::connect_readonly(&f.db_path).await.unwrap();
    let write = sqlx::query("CREATE TABLE should_fail (id INTEGER)")
        .execute(&pool)
        .await;
    assert!(write.is_err());

    let missing = qp_ex::db::connect_readonly(&f.db_path.with_file_name("absent.db")).await;
    assert!(matches!(missing, Err(ExportError::StoreNotFound(_))));
}

#[tokio::test]
async fn test_list_counts_per_category() {
    let f = setup().await;
    let ids = generate(&f, &Scope::at("tv-shows", "friends", None, None), &["easy", "hard"]).await;
    f.engine
        .review(
            &Scope::for_category("tv-shows"),
            &[decision(ids[0], "rejected", Some("dull"))],
            RunOptions::default(),
        )
        .await
        .unwrap();

    let exporter = Exporter::open(&f.db_path, &f.output).await.unwrap();
    let listing = exporter.list(None).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].0, "tv-shows");
    assert_eq!(listing[0].1.pending, 1);
    assert_eq!(listing[0].1.rejected, 1);
    assert_eq!(listing[0].1.approved, 0);
}

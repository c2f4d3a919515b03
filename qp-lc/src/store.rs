//! Storage adapter for the working question store
//!
//! The three write paths (`insert_candidate`, `transition_review`,
//! `insert_repair`) are crate-private and each re-checks its own
//! preconditions against the row state inside the caller's transaction.
//! Reads are public.

use crate::input::{ValidContent, ValidDecision};
use crate::{LifecycleError, Result};
use qp_common::db::{
    category_table, Question, QuestionCoordinate, ReviewStatus, MAX_REPAIR_ATTEMPTS,
    QUESTION_COLUMNS,
};
use sqlx::SqliteConnection;
use tracing::debug;

/// Result of applying one review decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Applied,
    /// The row already carries this decision
    Unchanged,
}

/// Insert a new pending row with no lineage
pub(crate) async fn insert_candidate(
    conn: &mut SqliteConnection,
    coordinate: &QuestionCoordinate,
    content: &ValidContent,
) -> Result<i64> {
    insert_row(conn, coordinate, content, None).await
}

/// Insert a pending row repairing the rejected row `original_id`
pub(crate) async fn insert_repair(
    conn: &mut SqliteConnection,
    category: &str,
    original_id: i64,
    content: &ValidContent,
) -> Result<i64> {
    let original = fetch_question(conn, category, original_id)
        .await?
        .ok_or_else(|| LifecycleError::Precondition(format!("question {} does not exist", original_id)))?;

    if original.review_status != ReviewStatus::Rejected {
        return Err(LifecycleError::Precondition(format!(
            "question {} is {}, only rejected questions can be repaired",
            original_id, original.review_status
        )));
    }

    let used = repair_attempts_used(conn, category, original_id).await?;
    if used >= MAX_REPAIR_ATTEMPTS {
        return Err(LifecycleError::Precondition(format!(
            "question {} has used {} of {} repair attempt(s)",
            original_id, used, MAX_REPAIR_ATTEMPTS
        )));
    }

    insert_row(conn, &original.coordinate(), content, Some(original_id)).await
}

async fn insert_row(
    conn: &mut SqliteConnection,
    coordinate: &QuestionCoordinate,
    content: &ValidContent,
    repair_of: Option<i64>,
) -> Result<i64> {
    let table = category_table(&coordinate.category)?;
    let options = serde_json::to_string(&content.options).map_err(qp_common::Error::from)?;

    let query = format!(
        r#"
        INSERT INTO {table} (
            category, topic, part, chapter, question, options, correct_index,
            explanation, difficulty, review_status, peer_reviewed, repair_of, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?, ?)
        "#
    );

    let result = sqlx::query(&query)
        .bind(&coordinate.category)
        .bind(&coordinate.topic)
        .bind(coordinate.part)
        .bind(coordinate.chapter)
        .bind(&content.question)
        .bind(&options)
        .bind(content.correct_index)
        .bind(&content.explanation)
        .bind(content.difficulty.as_str())
        .bind(repair_of)
        .bind(qp_common::time::now_for_storage())
        .execute(&mut *conn)
        .await?;

    let id = result.last_insert_rowid();
    debug!(table = %table, id = id, repair_of = ?repair_of, "Question inserted");
    Ok(id)
}

/// Record a review decision on row `id`
///
/// A pending row takes any decision. Without `force` a decided row takes the
/// same decision again as a no-op and refuses a different one. With `force`
/// the same decision rewrites score and notes, and a different one is applied
/// only while no repair chains to the row. Only review columns are written.
pub(crate) async fn transition_review(
    conn: &mut SqliteConnection,
    category: &str,
    id: i64,
    decision: &ValidDecision,
    force: bool,
) -> Result<Transition> {
    let current = fetch_question(conn, category, id)
        .await?
        .ok_or_else(|| LifecycleError::Precondition(format!("question {} does not exist", id)))?;

    if current.review_status.is_decided() {
        let same = current.review_status == decision.status;
        if !force {
            if same {
                return Ok(Transition::Unchanged);
            }
            return Err(LifecycleError::Precondition(format!(
                "question {} is already {}; use --force to re-review",
                id, current.review_status
            )));
        }
        if !same && repair_attempts_used(conn, category, id).await? > 0 {
            return Err(LifecycleError::Precondition(format!(
                "question {} has a repair chained to it and cannot be re-reviewed",
                id
            )));
        }
    }

    let table = category_table(category)?;
    let query = format!(
        r#"
        UPDATE {table}
        SET review_status = ?,
            quality_score = ?,
            review_notes = ?,
            peer_reviewed = 1,
            reviewed_at = ?
        WHERE id = ? AND review_status = ?
        "#
    );

    let result = sqlx::query(&query)
        .bind(decision.status.as_str())
        .bind(decision.quality_score)
        .bind(&decision.notes)
        .bind(qp_common::time::now_for_storage())
        .bind(id)
        .bind(current.review_status.as_str())
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() != 1 {
        return Err(LifecycleError::Precondition(format!(
            "question {} changed state during review",
            id
        )));
    }

    debug!(table = %table, id = id, status = %decision.status, "Review recorded");
    Ok(Transition::Applied)
}

/// Load one row by id
pub async fn fetch_question(
    conn: &mut SqliteConnection,
    category: &str,
    id: i64,
) -> Result<Option<Question>> {
    let table = category_table(category)?;
    let query = format!("SELECT {QUESTION_COLUMNS} FROM {table} WHERE id = ?");

    let row = sqlx::query(&query).bind(id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(Some(Question::from_row(&row)?)),
        None => Ok(None),
    }
}

/// Repair attempts charged to row `id`: rows whose `repair_of` points at it
pub async fn repair_attempts_used(conn: &mut SqliteConnection, category: &str, id: i64) -> Result<i64> {
    let table = category_table(category)?;
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE repair_of = ?"))
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Number of repair hops from row `id` back to its original generation
pub async fn lineage_depth(conn: &mut SqliteConnection, category: &str, id: i64) -> Result<i64> {
    let table = category_table(category)?;
    let query = format!("SELECT repair_of FROM {table} WHERE id = ?");

    let mut depth = 0;
    let mut current = id;
    // repair_of always points at an older row, so the walk terminates
    while let Some(Some(parent)) = sqlx::query_scalar::<_, Option<i64>>(&query)
        .bind(current)
        .fetch_optional(&mut *conn)
        .await?
    {
        depth += 1;
        current = parent;
    }
    Ok(depth)
}

/// Rows stored at exactly this coordinate
pub(crate) async fn count_at_coordinate(
    conn: &mut SqliteConnection,
    coordinate: &QuestionCoordinate,
) -> Result<i64> {
    let table = category_table(&coordinate.category)?;
    let query = format!(
        "SELECT COUNT(*) FROM {table} WHERE topic = ? AND part IS ? AND chapter IS ?"
    );

    let count: i64 = sqlx::query_scalar(&query)
        .bind(&coordinate.topic)
        .bind(coordinate.part)
        .bind(coordinate.chapter)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

/// Filter for read-only listings
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub topic: Option<String>,
    pub part: Option<i64>,
    pub chapter: Option<i64>,
    pub status: Option<ReviewStatus>,
    /// Only rejected rows that still have repair budget
    pub repairable_only: bool,
    pub limit: Option<usize>,
}

/// List rows of `category` matching `filter`, oldest first
pub async fn list_questions(
    conn: &mut SqliteConnection,
    category: &str,
    filter: &ListFilter,
) -> Result<Vec<Question>> {
    let table = category_table(category)?;
    let status = if filter.repairable_only {
        Some(ReviewStatus::Rejected)
    } else {
        filter.status
    };

    let query = format!(
        r#"
        SELECT {QUESTION_COLUMNS}
        FROM {table}
        WHERE (? IS NULL OR topic = ?)
          AND (? IS NULL OR part = ?)
          AND (? IS NULL OR chapter = ?)
          AND (? IS NULL OR review_status = ?)
        ORDER BY id ASC
        "#
    );

    let status = status.map(|s| s.as_str());
    let rows = sqlx::query(&query)
        .bind(&filter.topic)
        .bind(&filter.topic)
        .bind(filter.part)
        .bind(filter.part)
        .bind(filter.chapter)
        .bind(filter.chapter)
        .bind(status)
        .bind(status)
        .fetch_all(&mut *conn)
        .await?;

    let limit = filter.limit.unwrap_or(usize::MAX);
    let mut questions = Vec::new();
    for row in rows {
        if questions.len() >= limit {
            break;
        }
        let question = Question::from_row(&row)?;
        if filter.repairable_only
            && repair_attempts_used(conn, category, question.id).await? >= MAX_REPAIR_ATTEMPTS
        {
            continue;
        }
        questions.push(question);
    }
    Ok(questions)
}

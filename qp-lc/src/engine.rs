//! Lifecycle engine
//!
//! Each operation runs in one transaction. `generate` and `repair` report
//! per-item failures and keep going; `review` is all-or-nothing. A dry run
//! performs every check and write inside the transaction, then rolls back.

use crate::input::{BatchItem, Candidate, RepairSubmission, ReviewDecision};
use crate::report::{BatchReport, ItemOutcome, Stage};
use crate::store::{self, ListFilter, Transition};
use crate::{LifecycleError, Result};
use qp_common::db::{
    category_table_exists, ensure_category_table, init_database, open_scratch_database,
    require_category_table, validate_slug, Question, QuestionCoordinate, ReviewStatus,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Flags shared by every operation
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Append at an occupied coordinate / re-review a decided row
    pub force: bool,
    pub dry_run: bool,
    /// Process at most this many batch items
    pub limit: Option<usize>,
}

/// Coordinate filter given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub category: String,
    pub topic: Option<String>,
    pub part: Option<i64>,
    pub chapter: Option<i64>,
}

impl Scope {
    pub fn for_category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            topic: None,
            part: None,
            chapter: None,
        }
    }

    pub fn at(category: &str, topic: &str, part: Option<i64>, chapter: Option<i64>) -> Self {
        Self {
            category: category.to_string(),
            topic: Some(topic.to_string()),
            part,
            chapter,
        }
    }

    /// Whether `question` lies inside this scope
    pub fn contains(&self, question: &Question) -> bool {
        question.category == self.category
            && self.topic.as_ref().map_or(true, |t| &question.topic == t)
            && self.part.map_or(true, |p| question.part == Some(p))
            && self.chapter.map_or(true, |c| question.chapter == Some(c))
    }

    /// Exact placement for newly generated rows
    fn coordinate(&self) -> Result<QuestionCoordinate> {
        let topic = self
            .topic
            .as_ref()
            .ok_or_else(|| LifecycleError::InvalidInput("generate requires a topic".to_string()))?;
        validate_slug("topic", topic)?;
        Ok(QuestionCoordinate {
            category: self.category.clone(),
            topic: topic.clone(),
            part: self.part,
            chapter: self.chapter,
        })
    }

    fn filter(&self) -> ListFilter {
        ListFilter {
            topic: self.topic.clone(),
            part: self.part,
            chapter: self.chapter,
            ..ListFilter::default()
        }
    }
}

pub struct LifecycleEngine {
    pool: SqlitePool,
}

impl LifecycleEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the engine on the working store at `db_path`
    ///
    /// With `create` unset, a missing store is not created; the engine runs
    /// against an empty in-memory store instead and nothing reaches the disk.
    pub async fn open(db_path: &Path, create: bool) -> Result<Self> {
        let pool = if create || db_path.exists() {
            init_database(db_path).await?
        } else {
            info!(
                "No working store at {}; using an empty in-memory store",
                db_path.display()
            );
            open_scratch_database().await?
        };
        Ok(Self::new(pool))
    }

    /// Insert each valid candidate as a new pending row at the scope's coordinate
    pub async fn generate(
        &self,
        scope: &Scope,
        candidates: &[Candidate],
        options: RunOptions,
    ) -> Result<BatchReport> {
        let items: Vec<BatchItem<Candidate>> = candidates.iter().cloned().map(Ok).collect();
        self.generate_batch(scope, &items, options).await
    }

    /// [`LifecycleEngine::generate`] over parsed batch entries
    ///
    /// Entries that failed to decode are reported as failures in place.
    pub async fn generate_batch(
        &self,
        scope: &Scope,
        candidates: &[BatchItem<Candidate>],
        options: RunOptions,
    ) -> Result<BatchReport> {
        let coordinate = scope.coordinate()?;
        let mut report = BatchReport::new(Stage::Generate, options.dry_run);
        let (batch, truncated) = apply_limit(candidates, options.limit);
        report.truncated = truncated;

        let mut tx = self.pool.begin().await?;
        ensure_category_table(&mut *tx, &coordinate.category).await?;

        let existing = store::count_at_coordinate(&mut *tx, &coordinate).await?;
        if existing > 0 {
            if !options.force {
                return Err(LifecycleError::CoordinateOccupied {
                    coordinate: coordinate.to_string(),
                    count: existing,
                });
            }
            info!(
                coordinate = %coordinate,
                existing = existing,
                "Appending to occupied coordinate (--force)"
            );
        }

        for (index, candidate) in batch.iter().enumerate() {
            let validated = candidate.as_ref().map_err(Clone::clone).and_then(|c| c.validate());
            let content = match validated {
                Ok(content) => content,
                Err(reason) => {
                    warn!(index = index, reason = %reason, "Candidate rejected");
                    report.push(index, ItemOutcome::Failed { id: None, reason });
                    continue;
                }
            };
            match store::insert_candidate(&mut *tx, &coordinate, &content).await {
                Ok(id) => report.push(index, ItemOutcome::Inserted { id }),
                Err(LifecycleError::Precondition(reason)) => {
                    report.push(index, ItemOutcome::Failed { id: None, reason })
                }
                Err(e) => return Err(e),
            }
        }

        finish(tx, options.dry_run).await?;
        info!(
            coordinate = %coordinate,
            inserted = report.applied_count(),
            failed = report.failure_count(),
            dry_run = options.dry_run,
            "Generate complete"
        );
        Ok(report)
    }

    /// Apply review decisions, all or nothing
    ///
    /// Any violation rolls the whole batch back and returns
    /// [`LifecycleError::BatchRejected`] carrying the per-item report.
    pub async fn review(
        &self,
        scope: &Scope,
        decisions: &[ReviewDecision],
        options: RunOptions,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::new(Stage::Review, options.dry_run);
        let (batch, truncated) = apply_limit(decisions, options.limit);
        report.truncated = truncated;

        let mut tx = self.pool.begin().await?;
        require_category_table(&mut *tx, &scope.category).await?;

        let mut seen = HashSet::new();
        for (index, decision) in batch.iter().enumerate() {
            let id = decision.id;
            if !seen.insert(id) {
                report.push(
                    index,
                    ItemOutcome::Failed {
                        id: Some(id),
                        reason: "question appears more than once in this batch".to_string(),
                    },
                );
                continue;
            }

            let valid = match decision.validate() {
                Ok(valid) => valid,
                Err(reason) => {
                    report.push(index, ItemOutcome::Failed { id: Some(id), reason });
                    continue;
                }
            };

            if let Err(reason) = check_in_scope(&mut tx, scope, id).await? {
                report.push(index, ItemOutcome::Failed { id: Some(id), reason });
                continue;
            }

            match store::transition_review(&mut *tx, &scope.category, id, &valid, options.force).await {
                Ok(Transition::Applied) => report.push(
                    index,
                    ItemOutcome::Reviewed {
                        id,
                        status: valid.status,
                    },
                ),
                Ok(Transition::Unchanged) => report.push(
                    index,
                    ItemOutcome::Skipped {
                        id,
                        reason: format!(
                            "already {}; score and notes left as stored (use --force to overwrite)",
                            valid.status
                        ),
                    },
                ),
                Err(LifecycleError::Precondition(reason)) => {
                    report.push(index, ItemOutcome::Failed { id: Some(id), reason })
                }
                Err(e) => return Err(e),
            }
        }

        if report.has_failures() {
            tx.rollback().await?;
            report.rolled_back = true;
            warn!(
                category = %scope.category,
                violations = report.failure_count(),
                "Review batch rejected; nothing applied"
            );
            return Err(LifecycleError::BatchRejected(report));
        }

        finish(tx, options.dry_run).await?;
        info!(
            category = %scope.category,
            reviewed = report.applied_count(),
            dry_run = options.dry_run,
            "Review complete"
        );
        Ok(report)
    }

    /// Insert corrected rows for rejected questions, one per submission
    pub async fn repair(
        &self,
        scope: &Scope,
        submissions: &[RepairSubmission],
        options: RunOptions,
    ) -> Result<BatchReport> {
        let items: Vec<BatchItem<RepairSubmission>> = submissions.iter().cloned().map(Ok).collect();
        self.repair_batch(scope, &items, options).await
    }

    /// [`LifecycleEngine::repair`] over parsed batch entries
    pub async fn repair_batch(
        &self,
        scope: &Scope,
        submissions: &[BatchItem<RepairSubmission>],
        options: RunOptions,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::new(Stage::Repair, options.dry_run);
        let (batch, truncated) = apply_limit(submissions, options.limit);
        report.truncated = truncated;

        let mut tx = self.pool.begin().await?;
        require_category_table(&mut *tx, &scope.category).await?;

        for (index, submission) in batch.iter().enumerate() {
            let submission = match submission {
                Ok(submission) => submission,
                Err(reason) => {
                    warn!(index = index, reason = %reason, "Repair submission malformed");
                    report.push(
                        index,
                        ItemOutcome::Failed {
                            id: None,
                            reason: reason.clone(),
                        },
                    );
                    continue;
                }
            };
            let original_id = submission.original_id;
            let failed = |reason: String| ItemOutcome::Failed {
                id: Some(original_id),
                reason,
            };

            let content = match submission.content.validate() {
                Ok(content) => content,
                Err(reason) => {
                    report.push(index, failed(reason));
                    continue;
                }
            };

            if let Err(reason) = check_in_scope(&mut tx, scope, original_id).await? {
                report.push(index, failed(reason));
                continue;
            }

            match store::insert_repair(&mut *tx, &scope.category, original_id, &content).await {
                Ok(id) => report.push(index, ItemOutcome::Repaired { id, original_id }),
                Err(LifecycleError::Precondition(reason)) => {
                    warn!(original_id = original_id, reason = %reason, "Repair refused");
                    report.push(index, failed(reason));
                }
                Err(e) => return Err(e),
            }
        }

        finish(tx, options.dry_run).await?;
        info!(
            category = %scope.category,
            repaired = report.applied_count(),
            failed = report.failure_count(),
            dry_run = options.dry_run,
            "Repair complete"
        );
        Ok(report)
    }

    /// Read-only listing for `--list`
    ///
    /// generate: every row in scope; review: pending rows; repair: rejected
    /// rows with repair budget left.
    pub async fn list(&self, scope: &Scope, stage: Stage, limit: Option<usize>) -> Result<Vec<Question>> {
        let mut conn = self.pool.acquire().await?;
        if !category_table_exists(&mut *conn, &scope.category).await? {
            return Ok(Vec::new());
        }

        let mut filter = scope.filter();
        filter.limit = limit;
        match stage {
            Stage::Generate => {}
            Stage::Review => filter.status = Some(ReviewStatus::Pending),
            Stage::Repair => filter.repairable_only = true,
        }
        store::list_questions(&mut *conn, &scope.category, &filter).await
    }
}

fn apply_limit<T>(items: &[T], limit: Option<usize>) -> (&[T], usize) {
    match limit {
        Some(limit) if limit < items.len() => (&items[..limit], items.len() - limit),
        _ => (items, 0),
    }
}

/// `Ok(Err(reason))` when row `id` is missing or outside `scope`
async fn check_in_scope(
    tx: &mut Transaction<'_, Sqlite>,
    scope: &Scope,
    id: i64,
) -> Result<std::result::Result<(), String>> {
    match store::fetch_question(&mut **tx, &scope.category, id).await? {
        None => Ok(Err(format!("question {} does not exist", id))),
        Some(question) if !scope.contains(&question) => Ok(Err(format!(
            "question {} at {} is outside the requested scope",
            id,
            question.coordinate()
        ))),
        Some(_) => Ok(Ok(())),
    }
}

async fn finish(tx: Transaction<'_, Sqlite>, dry_run: bool) -> Result<()> {
    if dry_run {
        tx.rollback().await?;
    } else {
        tx.commit().await?;
    }
    Ok(())
}

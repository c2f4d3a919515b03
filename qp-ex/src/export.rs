//! Export run: read approved rows, project, validate, write

use crate::db::{self, StatusCounts};
use crate::record::ProductionRecord;
use crate::writer::write_production_store;
use crate::{ExportError, Result};
use qp_common::db::{category_table, Question, QUESTION_COLUMNS};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Read, project and validate everything, write nothing
    pub dry_run: bool,
    /// Restrict a dry run or listing to one category
    pub category: Option<String>,
}

/// Per-category outcome of an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub exported: i64,
    /// Rows left behind because they are not approved
    pub skipped: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    pub dry_run: bool,
    pub categories: Vec<CategoryCount>,
    pub total: usize,
    /// Written production store; `None` on a dry run
    pub output: Option<PathBuf>,
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        for c in &self.categories {
            writeln!(
                f,
                "{}{:<20} {:>6} exported {:>6} skipped",
                prefix, c.category, c.exported, c.skipped
            )?;
        }
        match &self.output {
            Some(path) => write!(f, "{} question(s) exported to {}", self.total, path.display()),
            None => write!(f, "{}{} question(s) would be exported", prefix, self.total),
        }
    }
}

pub struct Exporter {
    pool: SqlitePool,
    output: PathBuf,
}

impl Exporter {
    /// Open the working store read-only
    pub async fn open(working_db: &Path, output: impl Into<PathBuf>) -> Result<Self> {
        let pool = db::connect_readonly(working_db).await?;
        Ok(Self {
            pool,
            output: output.into(),
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Every approved row as a production record, category then source id
    ///
    /// Fails on the first approved row that cannot be projected.
    pub async fn collect(
        &self,
        category: Option<&str>,
    ) -> Result<(Vec<ProductionRecord>, Vec<CategoryCount>)> {
        let mut records = Vec::new();
        let mut counts = Vec::new();

        for table in self.tables(category).await? {
            let status = db::status_counts(&self.pool, &table).await?;
            let projected = self.project_table(&table).await?;
            counts.push(CategoryCount {
                category: db::table_category(&self.pool, &table).await?,
                exported: projected.len() as i64,
                skipped: status.total() - status.approved,
            });
            records.extend(projected);
        }

        records.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then(a.source_id.cmp(&b.source_id))
        });
        counts.sort_by(|a, b| a.category.cmp(&b.category));
        Ok((records, counts))
    }

    async fn tables(&self, category: Option<&str>) -> Result<Vec<String>> {
        let tables = db::question_tables(&self.pool).await?;
        match category {
            None => Ok(tables),
            Some(category) => {
                let wanted = category_table(category)?;
                if tables.contains(&wanted) {
                    Ok(vec![wanted])
                } else {
                    Err(ExportError::InvalidInput(format!(
                        "no questions stored for category '{}'",
                        category
                    )))
                }
            }
        }
    }

    async fn project_table(&self, table: &str) -> Result<Vec<ProductionRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE review_status = 'approved' ORDER BY id ASC",
            QUESTION_COLUMNS, table
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let consistency = |reason: String| ExportError::Consistency {
                table: table.to_string(),
                id,
                reason,
            };
            let question = Question::from_row(&row).map_err(|e| consistency(e.to_string()))?;
            records.push(ProductionRecord::from_question(&question).map_err(consistency)?);
        }
        Ok(records)
    }

    /// Approved/pending/rejected counts per category, for `--list`
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<(String, StatusCounts)>> {
        let mut listing = Vec::new();
        for table in self.tables(category).await? {
            let counts = db::status_counts(&self.pool, &table).await?;
            listing.push((db::table_category(&self.pool, &table).await?, counts));
        }
        listing.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(listing)
    }

    /// Run a full export, or a dry run
    ///
    /// A real export always covers every category.
    pub async fn run(&self, options: &ExportOptions) -> Result<ExportReport> {
        self.run_at(options, &qp_common::time::now_for_storage()).await
    }

    /// [`Exporter::run`] with an explicit export timestamp
    pub async fn run_at(&self, options: &ExportOptions, exported_at: &str) -> Result<ExportReport> {
        if options.category.is_some() && !options.dry_run {
            return Err(ExportError::InvalidInput(
                "a production export always covers every category; --category needs --dry-run"
                    .to_string(),
            ));
        }

        let (records, categories) = self.collect(options.category.as_deref()).await?;
        info!(
            questions = records.len(),
            categories = categories.len(),
            dry_run = options.dry_run,
            "Approved questions projected"
        );

        let output = if options.dry_run {
            None
        } else {
            write_production_store(&self.output, &records, exported_at).await?;
            Some(self.output.clone())
        };

        Ok(ExportReport {
            dry_run: options.dry_run,
            categories,
            total: records.len(),
            output,
        })
    }
}

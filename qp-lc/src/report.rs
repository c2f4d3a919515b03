//! Per-item batch reports printed by every stage

use qp_common::db::ReviewStatus;
use serde::Serialize;
use std::fmt;

/// Lifecycle operation a report belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Generate,
    Review,
    Repair,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Generate => "generate",
            Stage::Review => "review",
            Stage::Repair => "repair",
        })
    }
}

/// Result of one batch item
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Inserted { id: i64 },
    Repaired { id: i64, original_id: i64 },
    Reviewed { id: i64, status: ReviewStatus },
    Skipped { id: i64, reason: String },
    Failed { id: Option<i64>, reason: String },
}

impl ItemOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    /// Position of the item in the submitted batch
    pub index: usize,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub stage: Stage,
    pub dry_run: bool,
    /// Set when the batch was refused as a whole
    pub rolled_back: bool,
    pub items: Vec<ItemReport>,
    /// Items dropped by `--limit`
    pub truncated: usize,
}

impl BatchReport {
    pub fn new(stage: Stage, dry_run: bool) -> Self {
        Self {
            stage,
            dry_run,
            rolled_back: false,
            items: Vec::new(),
            truncated: 0,
        }
    }

    pub fn push(&mut self, index: usize, outcome: ItemOutcome) {
        self.items.push(ItemReport { index, outcome });
    }

    pub fn failure_count(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_failure()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Items that changed (or in dry-run would change) the store
    pub fn applied_count(&self) -> usize {
        if self.rolled_back {
            return 0;
        }
        self.items
            .iter()
            .filter(|i| {
                matches!(
                    i.outcome,
                    ItemOutcome::Inserted { .. }
                        | ItemOutcome::Repaired { .. }
                        | ItemOutcome::Reviewed { .. }
                )
            })
            .count()
    }

    /// Ids of rows inserted by this batch, in submission order
    pub fn inserted_ids(&self) -> Vec<i64> {
        self.items
            .iter()
            .filter_map(|i| match i.outcome {
                ItemOutcome::Inserted { id } | ItemOutcome::Repaired { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        for item in &self.items {
            write!(f, "{}#{:<4} ", prefix, item.index + 1)?;
            match &item.outcome {
                ItemOutcome::Inserted { id } => writeln!(f, "OK      inserted id {}", id)?,
                ItemOutcome::Repaired { id, original_id } => {
                    writeln!(f, "OK      repaired {} as id {}", original_id, id)?
                }
                ItemOutcome::Reviewed { id, status } => writeln!(f, "OK      id {} {}", id, status)?,
                ItemOutcome::Skipped { id, reason } => writeln!(f, "SKIP    id {}: {}", id, reason)?,
                ItemOutcome::Failed { id: Some(id), reason } => {
                    writeln!(f, "FAILED  id {}: {}", id, reason)?
                }
                ItemOutcome::Failed { id: None, reason } => writeln!(f, "FAILED  {}", reason)?,
            }
        }
        if self.truncated > 0 {
            writeln!(f, "{}{} item(s) beyond --limit not processed", prefix, self.truncated)?;
        }
        if self.rolled_back {
            write!(
                f,
                "{}{}: batch rejected, {} violation(s), nothing applied",
                prefix,
                self.stage,
                self.failure_count()
            )
        } else {
            let verb = if self.dry_run { "would apply" } else { "applied" };
            write!(
                f,
                "{}{}: {} {}, {} skipped, {} failed",
                prefix,
                self.stage,
                verb,
                self.applied_count(),
                self.items.len() - self.applied_count() - self.failure_count(),
                self.failure_count()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_summary() {
        let mut report = BatchReport::new(Stage::Generate, false);
        report.push(0, ItemOutcome::Inserted { id: 10 });
        report.push(1, ItemOutcome::Failed { id: None, reason: "bad options".into() });
        report.push(2, ItemOutcome::Inserted { id: 11 });

        assert_eq!(report.applied_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.inserted_ids(), vec![10, 11]);

        let text = report.to_string();
        assert!(text.contains("FAILED  bad options"));
        assert!(text.ends_with("generate: applied 2, 0 skipped, 1 failed"));
    }

    #[test]
    fn test_rolled_back_applies_nothing() {
        let mut report = BatchReport::new(Stage::Review, true);
        report.push(0, ItemOutcome::Reviewed { id: 1, status: ReviewStatus::Approved });
        report.push(1, ItemOutcome::Failed { id: Some(2), reason: "missing notes".into() });
        report.rolled_back = true;

        assert_eq!(report.applied_count(), 0);
        assert!(report.to_string().contains("[dry-run] review: batch rejected, 1 violation(s)"));
    }
}

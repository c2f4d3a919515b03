//! Working question store models

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Every question carries exactly this many options
pub const OPTION_COUNT: usize = 4;

/// At most this many repairs may ever chain back to one rejected question
pub const MAX_REPAIR_ATTEMPTS: i64 = 1;

/// Prefix of the per-category question tables
pub const QUESTION_TABLE_PREFIX: &str = "questions_";

/// Question difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(Error::InvalidInput(format!(
                "unknown difficulty '{}' (expected easy, medium or hard)",
                other
            ))),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Peer review state of a question row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    /// A decision has been recorded
    pub fn is_decided(&self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

impl FromStr for ReviewStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            other => Err(Error::InvalidInput(format!("unknown review status '{}'", other))),
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Placement of a question in the content hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCoordinate {
    pub category: String,
    pub topic: String,
    pub part: Option<i64>,
    pub chapter: Option<i64>,
}

impl fmt::Display for QuestionCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.topic)?;
        if let Some(part) = self.part {
            write!(f, "/part {}", part)?;
        }
        if let Some(chapter) = self.chapter {
            write!(f, "/chapter {}", chapter)?;
        }
        Ok(())
    }
}

/// One row of the working question store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub category: String,
    pub topic: String,
    pub part: Option<i64>,
    pub chapter: Option<i64>,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: i64,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub review_status: ReviewStatus,
    pub peer_reviewed: bool,
    pub quality_score: Option<f64>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<String>,
    /// Id of the rejected row this row repairs
    pub repair_of: Option<i64>,
    pub created_at: String,
}

/// Column list matching [`Question::from_row`]
pub const QUESTION_COLUMNS: &str = "id, category, topic, part, chapter, question, options, \
     correct_index, explanation, difficulty, review_status, peer_reviewed, quality_score, \
     review_notes, reviewed_at, repair_of, created_at";

impl Question {
    /// Decode a row selected with [`QUESTION_COLUMNS`]
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let options: String = row.try_get("options")?;
        let options: Vec<String> = serde_json::from_str(&options)?;
        let difficulty: String = row.try_get("difficulty")?;
        let review_status: String = row.try_get("review_status")?;

        Ok(Self {
            id: row.try_get("id")?,
            category: row.try_get("category")?,
            topic: row.try_get("topic")?,
            part: row.try_get("part")?,
            chapter: row.try_get("chapter")?,
            question: row.try_get("question")?,
            options,
            correct_index: row.try_get("correct_index")?,
            explanation: row.try_get("explanation")?,
            difficulty: difficulty.parse()?,
            review_status: review_status.parse()?,
            peer_reviewed: row.try_get("peer_reviewed")?,
            quality_score: row.try_get("quality_score")?,
            review_notes: row.try_get("review_notes")?,
            reviewed_at: row.try_get("reviewed_at")?,
            repair_of: row.try_get("repair_of")?,
            created_at: row.try_get("created_at")?,
        })
    }

    pub fn coordinate(&self) -> QuestionCoordinate {
        QuestionCoordinate {
            category: self.category.clone(),
            topic: self.topic.clone(),
            part: self.part,
            chapter: self.chapter,
        }
    }
}

/// Validate a path/identifier component (category, topic, series)
pub fn validate_slug(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && !value.starts_with('.')
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{} '{}' must be non-empty ASCII letters, digits, '-', '_' or '.'",
            kind, value
        )))
    }
}

/// Table holding the questions of one category
///
/// `tv-shows` maps to `questions_tv_shows`.
pub fn category_table(category: &str) -> Result<String> {
    let valid = !category.is_empty()
        && category
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_'));
    if !valid {
        return Err(Error::InvalidInput(format!(
            "category '{}' must be lowercase ASCII letters, digits, '-' or '_'",
            category
        )));
    }
    Ok(format!("{}{}", QUESTION_TABLE_PREFIX, category.replace('-', "_")))
}

//! Batch payloads accepted by the lifecycle operations
//!
//! A batch is first split into JSON values and each value is then decoded on
//! its own, so a malformed item (missing field, wrong type) becomes a failure
//! for that item only. Difficulty and status stay strings until validation.

use qp_common::db::{Difficulty, ReviewStatus, OPTION_COUNT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::{LifecycleError, Result};

/// Correct answer as an option index or as the text of one option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Index(i64),
    Text(String),
}

/// Question content produced by the generation collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: CorrectAnswer,
    pub difficulty: String,
    #[serde(default)]
    pub explanation: String,
}

/// A generated candidate question
pub type Candidate = QuestionPayload;

/// Corrected content for a rejected question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairSubmission {
    pub original_id: i64,
    #[serde(flatten)]
    pub content: QuestionPayload,
}

/// A peer review decision
///
/// Any content fields present in the caller's JSON are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default, alias = "notes")]
    pub review_notes: Option<String>,
}

/// Question content that passed validation
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidContent {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: i64,
    pub difficulty: Difficulty,
    pub explanation: String,
}

/// Review decision that passed validation
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidDecision {
    pub status: ReviewStatus,
    pub quality_score: Option<f64>,
    pub notes: Option<String>,
}

impl QuestionPayload {
    pub(crate) fn validate(&self) -> std::result::Result<ValidContent, String> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err("question text is empty".to_string());
        }

        if self.options.len() != OPTION_COUNT {
            return Err(format!(
                "expected exactly {} options, got {}",
                OPTION_COUNT,
                self.options.len()
            ));
        }
        let options: Vec<String> = self.options.iter().map(|o| o.trim().to_string()).collect();
        if options.iter().any(|o| o.is_empty()) {
            return Err("options must not be empty".to_string());
        }
        let distinct: HashSet<String> = options.iter().map(|o| o.to_lowercase()).collect();
        if distinct.len() != options.len() {
            return Err("options must be distinct".to_string());
        }

        let correct_index = match &self.correct_answer {
            CorrectAnswer::Index(index) if (0..OPTION_COUNT as i64).contains(index) => *index,
            CorrectAnswer::Index(index) => {
                return Err(format!("correct_answer index {} is outside 0..=3", index))
            }
            CorrectAnswer::Text(text) => options
                .iter()
                .position(|o| o == text.trim())
                .map(|p| p as i64)
                .ok_or_else(|| format!("correct_answer '{}' matches no option", text))?,
        };

        let difficulty = self
            .difficulty
            .parse::<Difficulty>()
            .map_err(|e| e.to_string())?;

        Ok(ValidContent {
            question: question.to_string(),
            options,
            correct_index,
            difficulty,
            explanation: self.explanation.trim().to_string(),
        })
    }
}

impl ReviewDecision {
    pub(crate) fn validate(&self) -> std::result::Result<ValidDecision, String> {
        let status = self.status.parse::<ReviewStatus>().map_err(|e| e.to_string())?;
        if status == ReviewStatus::Pending {
            return Err("a review decision must be approved or rejected".to_string());
        }

        if let Some(score) = self.quality_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(format!("quality_score {} is outside [0, 1]", score));
            }
        }

        let notes = self
            .review_notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if status == ReviewStatus::Rejected && notes.is_none() {
            return Err("rejection requires non-empty review_notes".to_string());
        }

        Ok(ValidDecision {
            status,
            quality_score: self.quality_score,
            notes,
        })
    }
}

/// One batch entry: the decoded item, or why it could not be decoded
pub type BatchItem<T> = std::result::Result<T, String>;

/// Parse a batch item by item: either a JSON array or a stream of JSON objects
///
/// Fails only when the input is not JSON at all. Items that are valid JSON
/// but do not match `T` come back as `Err` entries in their batch position.
pub fn parse_batch_items<T: DeserializeOwned>(input: &str) -> Result<Vec<BatchItem<T>>> {
    Ok(parse_values(input)?
        .into_iter()
        .map(|value| serde_json::from_value(value).map_err(|e| format!("malformed item: {}", e)))
        .collect())
}

/// Parse a batch, failing on the first malformed item
pub fn parse_batch<T: DeserializeOwned>(input: &str) -> Result<Vec<T>> {
    parse_batch_items(input)?
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            item.map_err(|reason| LifecycleError::InvalidInput(format!("item {}: {}", index, reason)))
        })
        .collect()
}

fn parse_values(input: &str) -> Result<Vec<Value>> {
    let trimmed = input.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| LifecycleError::InvalidInput(format!("malformed batch: {}", e)));
    }
    serde_json::Deserializer::from_str(trimmed)
        .into_iter::<Value>()
        .collect::<std::result::Result<Vec<Value>, _>>()
        .map_err(|e| LifecycleError::InvalidInput(format!("malformed batch: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(options: &[&str], correct: CorrectAnswer, difficulty: &str) -> QuestionPayload {
        QuestionPayload {
            question: "Which character owns a monkey named Marcel?".to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: correct,
            difficulty: difficulty.to_string(),
            explanation: "Ross adopts Marcel in season 1.".to_string(),
        }
    }

    #[test]
    fn test_valid_payload_by_index() {
        let content = payload(&["Ross", "Joey", "Chandler", "Monica"], CorrectAnswer::Index(0), "easy")
            .validate()
            .unwrap();
        assert_eq!(content.correct_index, 0);
        assert_eq!(content.difficulty, Difficulty::Easy);
    }

    #[test]
    fn test_correct_answer_by_text() {
        let content = payload(
            &["Ross", "Joey", "Chandler", "Monica"],
            CorrectAnswer::Text("Chandler".into()),
            "Medium",
        )
        .validate()
        .unwrap();
        assert_eq!(content.correct_index, 2);
        assert_eq!(content.difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_rejects_wrong_option_count() {
        let err = payload(&["Ross", "Joey", "Chandler"], CorrectAnswer::Index(0), "easy")
            .validate()
            .unwrap_err();
        assert!(err.contains("exactly 4"));
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        assert!(payload(&["a", "b", "c", "d"], CorrectAnswer::Index(4), "easy")
            .validate()
            .is_err());
        assert!(payload(&["a", "b", "c", "d"], CorrectAnswer::Index(-1), "easy")
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejects_duplicate_options() {
        assert!(payload(&["Ross", "ross", "Joey", "Monica"], CorrectAnswer::Index(0), "easy")
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejects_unknown_difficulty() {
        assert!(payload(&["a", "b", "c", "d"], CorrectAnswer::Index(1), "insane")
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejection_requires_notes() {
        let decision = ReviewDecision {
            id: 1,
            status: "rejected".into(),
            quality_score: Some(0.2),
            review_notes: Some("   ".into()),
        };
        assert!(decision.validate().is_err());
    }

    #[test]
    fn test_review_cannot_target_pending() {
        let decision = ReviewDecision {
            id: 1,
            status: "pending".into(),
            quality_score: None,
            review_notes: None,
        };
        assert!(decision.validate().is_err());
    }

    #[test]
    fn test_quality_score_bounds() {
        let decision = ReviewDecision {
            id: 1,
            status: "approved".into(),
            quality_score: Some(1.5),
            review_notes: None,
        };
        assert!(decision.validate().is_err());
    }

    #[test]
    fn test_parse_batch_array_and_stream() {
        let array = r#"[{"id": 1, "status": "approved"}, {"id": 2, "status": "rejected", "notes": "dup"}]"#;
        let stream = "{\"id\": 1, \"status\": \"approved\"}\n{\"id\": 2, \"status\": \"rejected\", \"notes\": \"dup\"}\n";

        let a: Vec<ReviewDecision> = parse_batch(array).unwrap();
        let b: Vec<ReviewDecision> = parse_batch(stream).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
        assert_eq!(b[1].review_notes.as_deref(), Some("dup"));
    }

    #[test]
    fn test_review_payload_ignores_content_fields() {
        let json = r#"{"id": 7, "status": "approved", "question": "changed?", "options": ["x"]}"#;
        let decisions: Vec<ReviewDecision> = parse_batch(json).unwrap();
        assert_eq!(decisions[0].id, 7);
    }

    #[test]
    fn test_repair_submission_flattens_content() {
        let json = r#"{"original_id": 4, "question": "Q?", "options": ["a","b","c","d"],
                       "correct_answer": 3, "difficulty": "hard", "explanation": "because"}"#;
        let subs: Vec<RepairSubmission> = parse_batch(json).unwrap();
        assert_eq!(subs[0].original_id, 4);
        assert_eq!(subs[0].content.correct_answer, CorrectAnswer::Index(3));
    }

    #[test]
    fn test_malformed_item_fails_alone() {
        let json = r#"[
            {"question": "Q1?", "options": ["a","b","c","d"], "correct_answer": 0, "difficulty": "easy"},
            {"question": "Q2?", "options": ["a","b","c","d"], "correct_answer": 1},
            {"question": "Q3?", "options": ["a","b","c","d"], "correct_answer": "c", "difficulty": "hard"}
        ]"#;
        let items: Vec<BatchItem<Candidate>> = parse_batch_items(json).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(items[1].as_ref().unwrap_err().contains("difficulty"));
        assert!(items[2].is_ok());

        let err = parse_batch::<Candidate>(json).unwrap_err();
        assert!(err.to_string().contains("item 1"));
    }

    #[test]
    fn test_non_json_input_fails_whole_batch() {
        assert!(parse_batch_items::<Candidate>("[{\"question\": ").is_err());
        assert!(parse_batch_items::<Candidate>("not json").is_err());
    }
}

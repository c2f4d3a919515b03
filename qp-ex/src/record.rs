//! Production record projection

use qp_common::db::{Difficulty, Question, ReviewStatus, OPTION_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One answer choice as stored in production
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub index: i64,
}

/// Denormalized question as read by the gameplay client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub source_id: i64,
    pub category: String,
    pub topic: String,
    pub part: Option<i64>,
    pub chapter: Option<i64>,
    pub question: String,
    pub answers: Vec<Answer>,
    pub correct_index: i64,
    pub explanation: String,
    /// 1 = easy, 2 = medium, 3 = hard
    pub difficulty: i64,
    pub tags: Vec<String>,
    pub quality_score: Option<f64>,
}

pub fn difficulty_level(difficulty: Difficulty) -> i64 {
    match difficulty {
        Difficulty::Easy => 1,
        Difficulty::Medium => 2,
        Difficulty::Hard => 3,
    }
}

impl ProductionRecord {
    /// Project an approved working row, refusing anything malformed
    pub fn from_question(q: &Question) -> std::result::Result<Self, String> {
        if q.review_status != ReviewStatus::Approved {
            return Err(format!("review status is {}", q.review_status));
        }
        if q.question.trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        if q.options.len() != OPTION_COUNT {
            return Err(format!("{} options instead of {}", q.options.len(), OPTION_COUNT));
        }
        if q.options.iter().any(|o| o.trim().is_empty()) {
            return Err("empty option text".to_string());
        }
        let distinct: HashSet<&str> = q.options.iter().map(String::as_str).collect();
        if distinct.len() != q.options.len() {
            return Err("duplicate options".to_string());
        }
        if !(0..OPTION_COUNT as i64).contains(&q.correct_index) {
            return Err(format!("correct_index {} out of range", q.correct_index));
        }

        let answers = q
            .options
            .iter()
            .enumerate()
            .map(|(index, text)| Answer {
                text: text.clone(),
                index: index as i64,
            })
            .collect();

        Ok(Self {
            source_id: q.id,
            category: q.category.clone(),
            topic: q.topic.clone(),
            part: q.part,
            chapter: q.chapter,
            question: q.question.clone(),
            answers,
            correct_index: q.correct_index,
            explanation: q.explanation.clone(),
            difficulty: difficulty_level(q.difficulty),
            tags: tags_for(q),
            quality_score: q.quality_score,
        })
    }
}

fn tags_for(q: &Question) -> Vec<String> {
    let mut tags = vec![q.category.clone(), q.topic.clone()];
    if let Some(part) = q.part {
        tags.push(format!("part:{}", part));
    }
    if let Some(chapter) = q.chapter {
        tags.push(format!("chapter:{}", chapter));
    }
    tags.push(q.difficulty.to_string());
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved(difficulty: Difficulty) -> Question {
        Question {
            id: 12,
            category: "tv-shows".into(),
            topic: "friends".into(),
            part: Some(1),
            chapter: Some(3),
            question: "Who says 'How you doin'?".into(),
            options: vec!["Joey".into(), "Ross".into(), "Chandler".into(), "Gunther".into()],
            correct_index: 0,
            explanation: "Joey's catchphrase.".into(),
            difficulty,
            review_status: ReviewStatus::Approved,
            peer_reviewed: true,
            quality_score: Some(0.95),
            review_notes: None,
            reviewed_at: Some("2024-03-01T10:00:00Z".into()),
            repair_of: None,
            created_at: "2024-03-01T09:00:00Z".into(),
        }
    }

    #[test]
    fn test_difficulty_mapping() {
        assert_eq!(difficulty_level(Difficulty::Easy), 1);
        assert_eq!(difficulty_level(Difficulty::Medium), 2);
        assert_eq!(difficulty_level(Difficulty::Hard), 3);
    }

    #[test]
    fn test_projection() {
        let record = ProductionRecord::from_question(&approved(Difficulty::Medium)).unwrap();
        assert_eq!(record.source_id, 12);
        assert_eq!(record.difficulty, 2);
        assert_eq!(record.answers[3], Answer { text: "Gunther".into(), index: 3 });
        assert_eq!(
            record.tags,
            vec!["tv-shows", "friends", "part:1", "chapter:3", "medium"]
        );
    }

    #[test]
    fn test_tags_without_part_or_chapter() {
        let mut q = approved(Difficulty::Hard);
        q.part = None;
        q.chapter = None;
        let record = ProductionRecord::from_question(&q).unwrap();
        assert_eq!(record.tags, vec!["tv-shows", "friends", "hard"]);
    }

    #[test]
    fn test_refuses_non_approved_and_malformed() {
        let mut pending = approved(Difficulty::Easy);
        pending.review_status = ReviewStatus::Pending;
        assert!(ProductionRecord::from_question(&pending).is_err());

        let mut three = approved(Difficulty::Easy);
        three.options.pop();
        assert!(ProductionRecord::from_question(&three).is_err());

        let mut dup = approved(Difficulty::Easy);
        dup.options[1] = "Joey".into();
        assert!(ProductionRecord::from_question(&dup).is_err());
    }
}

//! Manifest node documents

use crate::{Coordinate, ManifestError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress status of a manifest node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStatus {
    NotStarted,
    InProgress,
    Complete,
    Failed,
    Partial,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::NotStarted => "not-started",
            NodeStatus::InProgress => "in-progress",
            NodeStatus::Complete => "complete",
            NodeStatus::Failed => "failed",
            NodeStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count of child nodes by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub not_started: u32,
    pub in_progress: u32,
    pub complete: u32,
    pub failed: u32,
    pub partial: u32,
}

impl StatusCounts {
    pub fn add(&mut self, status: NodeStatus) {
        match status {
            NodeStatus::NotStarted => self.not_started += 1,
            NodeStatus::InProgress => self.in_progress += 1,
            NodeStatus::Complete => self.complete += 1,
            NodeStatus::Failed => self.failed += 1,
            NodeStatus::Partial => self.partial += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.not_started + self.in_progress + self.complete + self.failed + self.partial
    }
}

/// Scraped content of a leaf (transcript, chapter text, article)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Set when the content is unobtainable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Question generation progress of a leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub question_count: u32,
    pub generated_at: DateTime<Utc>,
}

/// One node of the manifest tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    pub coordinate: Coordinate,
    pub status: NodeStatus,
    /// Children the node should eventually have; absent ones count as not-started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_children: Option<u32>,
    #[serde(default)]
    pub children: StatusCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ManifestNode {
    pub fn new(coordinate: Coordinate, expected_children: Option<u32>) -> Self {
        let now = qp_common::time::now();
        Self {
            coordinate,
            status: NodeStatus::NotStarted,
            expected_children,
            children: StatusCounts::default(),
            content: None,
            generation: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn require_leaf(&self) -> Result<()> {
        if self.coordinate.is_leaf() {
            Ok(())
        } else {
            Err(ManifestError::NotALeaf(self.coordinate.to_string()))
        }
    }

    fn touch(&mut self) {
        self.updated_at = qp_common::time::now();
    }

    /// Scrape of this leaf has begun
    pub fn mark_in_progress(&mut self) -> Result<()> {
        self.require_leaf()?;
        self.status = NodeStatus::InProgress;
        self.touch();
        Ok(())
    }

    /// Content was obtained
    pub fn record_content(
        &mut self,
        source_url: Option<String>,
        word_count: u64,
        quality: Option<String>,
    ) -> Result<()> {
        self.require_leaf()?;
        self.content = Some(ContentRecord {
            present: true,
            source_url,
            word_count,
            quality,
            error: None,
            recorded_at: qp_common::time::now(),
        });
        self.status = NodeStatus::Complete;
        self.touch();
        Ok(())
    }

    /// Content is unobtainable; an attempted-and-failed leaf, not an absent one
    pub fn record_failure(&mut self, error: &str, source_url: Option<String>) -> Result<()> {
        self.require_leaf()?;
        if error.trim().is_empty() {
            return Err(ManifestError::Common(qp_common::Error::InvalidInput(
                "a failed leaf needs a diagnostic error string".to_string(),
            )));
        }
        self.content = Some(ContentRecord {
            present: false,
            source_url,
            word_count: 0,
            quality: None,
            error: Some(error.trim().to_string()),
            recorded_at: qp_common::time::now(),
        });
        self.status = NodeStatus::Failed;
        self.touch();
        Ok(())
    }

    /// Record how many questions were generated from this leaf
    pub fn record_generation(&mut self, question_count: u32) -> Result<()> {
        self.require_leaf()?;
        self.generation = Some(GenerationRecord {
            question_count,
            generated_at: qp_common::time::now(),
        });
        self.touch();
        Ok(())
    }
}

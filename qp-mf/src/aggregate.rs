//! Bottom-up status aggregation
//!
//! A parent's status is a pure function of its children's statuses. Expected
//! children that have no node yet count as `not-started`.

use crate::node::{NodeStatus, StatusCounts};

/// Count child statuses, padding with `not-started` up to `expected`
pub fn summarize(statuses: &[NodeStatus], expected: Option<u32>) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for status in statuses {
        counts.add(*status);
    }
    if let Some(expected) = expected {
        let present = statuses.len() as u32;
        if expected > present {
            counts.not_started += expected - present;
        }
    }
    counts
}

/// Derive a parent status from its children's counts
///
/// - no children: not-started
/// - all complete: complete
/// - all not-started: not-started
/// - all failed: failed
/// - any failed or partial: partial
/// - otherwise: in-progress
pub fn aggregate_status(counts: &StatusCounts) -> NodeStatus {
    let total = counts.total();
    if total == 0 || counts.not_started == total {
        NodeStatus::NotStarted
    } else if counts.complete == total {
        NodeStatus::Complete
    } else if counts.failed == total {
        NodeStatus::Failed
    } else if counts.failed > 0 || counts.partial > 0 {
        NodeStatus::Partial
    } else {
        NodeStatus::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NodeStatus::*;

    fn status_of(children: &[NodeStatus], expected: Option<u32>) -> NodeStatus {
        aggregate_status(&summarize(children, expected))
    }

    #[test]
    fn test_no_children_is_not_started() {
        assert_eq!(status_of(&[], None), NotStarted);
        assert_eq!(status_of(&[], Some(10)), NotStarted);
    }

    #[test]
    fn test_all_complete() {
        assert_eq!(status_of(&[Complete, Complete], None), Complete);
    }

    #[test]
    fn test_missing_expected_children_block_completion() {
        assert_eq!(status_of(&[Complete, Complete], Some(3)), InProgress);
    }

    #[test]
    fn test_one_failure_among_complete_is_partial() {
        let mut children = vec![Complete; 23];
        children.insert(2, Failed);
        assert_eq!(status_of(&children, Some(24)), Partial);
    }

    #[test]
    fn test_all_failed_is_failed() {
        assert_eq!(status_of(&[Failed, Failed], Some(2)), Failed);
    }

    #[test]
    fn test_failed_with_unattempted_siblings_is_partial() {
        assert_eq!(status_of(&[Failed], Some(4)), Partial);
    }

    #[test]
    fn test_partial_child_propagates() {
        assert_eq!(status_of(&[Partial, NotStarted, NotStarted], None), Partial);
        assert_eq!(status_of(&[Partial, Complete], None), Partial);
    }

    #[test]
    fn test_started_without_failures_is_in_progress() {
        assert_eq!(status_of(&[InProgress, NotStarted], None), InProgress);
        assert_eq!(status_of(&[Complete, NotStarted], None), InProgress);
    }

    #[test]
    fn test_summary_counts_padding() {
        let counts = summarize(&[Complete, Failed], Some(5));
        assert_eq!(counts.complete, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.not_started, 3);
        assert_eq!(counts.total(), 5);
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let a = summarize(&[Complete, Failed, InProgress], None);
        let b = summarize(&[InProgress, Complete, Failed], None);
        assert_eq!(a, b);
        assert_eq!(aggregate_status(&a), aggregate_status(&b));
    }
}

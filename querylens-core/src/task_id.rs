//! Hierarchical task identifiers (`queryId.stage.task[.subtask...]`).

use std::cmp::Ordering;

/// Everything after the first `.`, or the whole id when there is none.
pub fn task_id_suffix(id: &str) -> &str {
    match id.find('.') {
        Some(pos) => &id[pos + 1..],
        None => id,
    }
}

/// Stage number from a stage id such as `20230101_0.3`.
pub fn stage_number(stage_id: &str) -> Option<u64> {
    task_id_suffix(stage_id).parse().ok()
}

/// Task number (third segment) from a task id such as `20230101_0.3.7`.
pub fn task_number(task_id: &str) -> Option<u64> {
    let after_stage = task_id_suffix(task_id_suffix(task_id));
    after_stage.split('.').next()?.parse().ok()
}

/// A task id with the query-id prefix stripped, ordered for display.
///
/// Ids with fewer segments sort first; ids with the same number of segments
/// compare segment by segment, numerically. Segments that are not numbers
/// sort after numeric ones and compare as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskId {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Number(u64),
    Text(String),
}

impl TaskId {
    pub fn parse(id: &str) -> Self {
        let segments = task_id_suffix(id)
            .split('.')
            .map(|segment| match segment.parse::<u64>() {
                Ok(n) => Segment::Number(n),
                Err(_) => Segment::Text(segment.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl Ord for TaskId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments
            .len()
            .cmp(&other.segments.len())
            .then_with(|| self.segments.cmp(&other.segments))
    }
}

impl PartialOrd for TaskId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Display order of two raw task ids.
pub fn compare_task_ids(a: &str, b: &str) -> Ordering {
    TaskId::parse(a).cmp(&TaskId::parse(b))
}

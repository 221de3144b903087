//! Flattening of the stage tree into display order.
//!
//! Both traversals are depth-first pre-order: a stage comes before its
//! sub-stages, and sub-stages keep the order the coordinator sent them in.

use crate::types::{StageNode, TaskSnapshot};

/// Every stage reachable from `root`, root first.
pub fn flatten_stages(root: Option<&StageNode>) -> Vec<&StageNode> {
    let mut stages = Vec::new();
    if let Some(root) = root {
        collect_stages(root, &mut stages);
    }
    stages
}

fn collect_stages<'a>(stage: &'a StageNode, out: &mut Vec<&'a StageNode>) {
    out.push(stage);
    for child in &stage.sub_stages {
        collect_stages(child, out);
    }
}

/// Every task in the tree: a stage's own tasks, then its sub-stages' tasks.
pub fn flatten_tasks(root: Option<&StageNode>) -> Vec<&TaskSnapshot> {
    let mut tasks = Vec::new();
    if let Some(root) = root {
        collect_tasks(root, &mut tasks);
    }
    tasks
}

fn collect_tasks<'a>(stage: &'a StageNode, out: &mut Vec<&'a TaskSnapshot>) {
    out.extend(stage.tasks.iter());
    for child in &stage.sub_stages {
        collect_tasks(child, out);
    }
}

impl StageNode {
    /// Sum of the direct tasks' buffered output bytes.
    pub fn total_buffered_bytes(&self) -> f64 {
        self.tasks
            .iter()
            .map(|task| task.output_buffers.total_buffered_bytes)
            .sum()
    }

    /// Whether the coordinator has sent enough of this stage to display it.
    pub fn is_planned(&self) -> bool {
        self.plan.is_some()
    }
}

//! Per-stage summaries and the filtered task table.

use std::fmt;
use std::str::FromStr;

use crate::format::{compute_rate, format_duration};
use crate::histogram::SkewHistogram;
use crate::stage::flatten_tasks;
use crate::task_id::{compare_task_ids, stage_number, task_number};
use crate::types::{StageNode, TaskSnapshot, TaskState};

// ============================================
// Stage summary
// ============================================

/// Task counts, buffered output and timing skew for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub stage_id: String,
    pub stage_number: Option<u64>,
    pub state: Option<String>,

    pub pending_tasks: usize,
    pub running_tasks: usize,
    pub finished_tasks: usize,
    pub total_tasks: usize,

    pub buffered_bytes: f64,

    /// Per-task scheduled time in task-number order (ms)
    pub scheduled_times: Vec<f64>,
    /// Per-task CPU time in task-number order (ms)
    pub cpu_times: Vec<f64>,
    pub scheduled_histogram: SkewHistogram,
    pub cpu_histogram: SkewHistogram,
}

impl StageSummary {
    pub fn from_stage(stage: &StageNode) -> Self {
        let count = |pred: fn(TaskState) -> bool| {
            stage.tasks.iter().filter(|t| pred(t.state())).count()
        };

        let mut ordered: Vec<&TaskSnapshot> = stage.tasks.iter().collect();
        ordered.sort_by_key(|t| task_number(t.task_id()));

        let scheduled_times: Vec<f64> = ordered.iter().map(|t| t.scheduled_millis()).collect();
        let cpu_times: Vec<f64> = ordered.iter().map(|t| t.cpu_millis()).collect();

        Self {
            stage_id: stage.stage_id.clone(),
            stage_number: stage_number(&stage.stage_id),
            state: stage.state.clone(),
            pending_tasks: count(|s| s == TaskState::Planned),
            running_tasks: count(|s| s == TaskState::Running),
            finished_tasks: count(|s| s.is_done()),
            total_tasks: stage.tasks.len(),
            buffered_bytes: stage.total_buffered_bytes(),
            scheduled_histogram: SkewHistogram::compute(&scheduled_times, format_duration),
            cpu_histogram: SkewHistogram::compute(&cpu_times, format_duration),
            scheduled_times,
            cpu_times,
        }
    }
}

// ============================================
// Task filter
// ============================================

/// Which tasks the task table shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskFilter {
    /// Table hidden
    #[default]
    None,
    All,
    Planned,
    Running,
    Finished,
    /// Failed, aborted or canceled
    Failed,
}

impl TaskFilter {
    pub const VARIANTS: [TaskFilter; 6] = [
        TaskFilter::None,
        TaskFilter::All,
        TaskFilter::Planned,
        TaskFilter::Running,
        TaskFilter::Finished,
        TaskFilter::Failed,
    ];

    pub fn text(&self) -> &'static str {
        match self {
            TaskFilter::None => "None",
            TaskFilter::All => "All",
            TaskFilter::Planned => "Planned",
            TaskFilter::Running => "Running",
            TaskFilter::Finished => "Finished",
            TaskFilter::Failed => "Aborted/Canceled/Failed",
        }
    }

    pub fn matches(&self, state: TaskState) -> bool {
        match self {
            TaskFilter::None => false,
            TaskFilter::All => true,
            TaskFilter::Planned => state == TaskState::Planned,
            TaskFilter::Running => state == TaskState::Running,
            TaskFilter::Finished => state == TaskState::Finished,
            TaskFilter::Failed => matches!(
                state,
                TaskState::Failed | TaskState::Aborted | TaskState::Canceled
            ),
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(TaskFilter::None),
            "all" => Ok(TaskFilter::All),
            "planned" => Ok(TaskFilter::Planned),
            "running" => Ok(TaskFilter::Running),
            "finished" => Ok(TaskFilter::Finished),
            "failed" => Ok(TaskFilter::Failed),
            _ => Err(format!(
                "unknown task filter {:?} (expected none, all, planned, running, finished, failed)",
                s
            )),
        }
    }
}

// ============================================
// Task table
// ============================================

/// One display row of the task table.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub task_id: String,
    /// `host:port` of the worker running the task
    pub host: String,
    pub node_id: String,
    pub state: TaskState,

    pub output_rows: f64,
    pub input_rows: f64,
    pub input_rows_per_sec: f64,
    pub input_bytes: f64,
    pub input_bytes_per_sec: f64,

    pub pending_execs: u64,
    pub running_execs: u64,
    pub completed_execs: u64,

    pub buffered_bytes: f64,
    /// Milliseconds
    pub elapsed_time: f64,
    pub delivery_time: f64,
    pub process_time: f64,
    pub process_wall: f64,
    pub pull_data_time: f64,
}

impl TaskRow {
    pub fn from_task(task: &TaskSnapshot) -> Self {
        let status = &task.task_status;
        let (output_rows, input_rows, input_bytes, pending_execs, running_execs) =
            match &task.stats {
                Some(stats) => (
                    stats.output_positions,
                    stats.processed_input_positions,
                    stats.processed_input_data_size,
                    stats.queued_pipeline_execs,
                    stats.running_pipeline_execs,
                ),
                None => (0.0, 0.0, 0.0, 0, 0),
            };

        Self {
            task_id: status.task_id.clone(),
            host: host_and_port(&status.self_uri),
            node_id: status.node_id.clone(),
            state: status.state,
            output_rows,
            input_rows,
            input_rows_per_sec: compute_rate(input_rows, task.elapsed_time),
            input_bytes,
            input_bytes_per_sec: compute_rate(input_bytes, task.elapsed_time),
            pending_execs,
            running_execs,
            completed_execs: task.completed_pipeline_execs,
            buffered_bytes: task.output_buffers.total_buffered_bytes,
            elapsed_time: task.elapsed_time,
            delivery_time: task.delivery_time,
            process_time: task.process_time,
            process_wall: task.process_wall,
            pull_data_time: task.pull_data_time,
        }
    }
}

/// All tasks under `root` matching `filter`, in task-id order.
pub fn task_rows(root: Option<&StageNode>, filter: TaskFilter) -> Vec<TaskRow> {
    if filter == TaskFilter::None {
        return Vec::new();
    }

    let mut tasks: Vec<&TaskSnapshot> = flatten_tasks(root)
        .into_iter()
        .filter(|t| filter.matches(t.state()))
        .collect();
    tasks.sort_by(|a, b| compare_task_ids(a.task_id(), b.task_id()));
    tasks.into_iter().map(TaskRow::from_task).collect()
}

/// `host:port` from a task URI; the raw text when it does not parse.
fn host_and_port(uri: &str) -> String {
    let Ok(url) = reqwest::Url::parse(uri) else {
        return uri.to_string();
    };
    match (url.host_str(), url.port_or_known_default()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => uri.to_string(),
    }
}

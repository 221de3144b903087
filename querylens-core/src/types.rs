//! Snapshot types returned by the coordinator query API
//!
//! These mirror the JSON body of `GET /v1/query/{queryId}`. Every field the
//! monitor does not strictly need is defaulted, so partially-populated
//! snapshots (common while a query is starting up) still deserialize.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Snapshot** | One fetched, immutable view of query state at a point in time |
//! | **Stage** | A unit of distributed execution composed of parallel tasks |
//! | **Task** | One worker-level execution unit within a stage |
//! | **Skew histogram** | Distribution of a per-task timing metric across a stage |
//! | **Frozen snapshot** | A pinned view that stops following live updates |
//!
//! Durations and data sizes arrive as unit-suffixed strings (`"1.50s"`,
//! `"12MB"`) and are kept verbatim here; see [`crate::format`] for parsing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::format::{parse_data_size_or_zero, parse_duration_or_zero};

// ============================================
// Query
// ============================================

/// One poll's worth of query state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuerySnapshot {
    pub query_id: String,
    /// Coordinator query state (`QUEUED`, `RUNNING`, `FINISHED`, ...)
    pub state: String,
    /// Raw SQL text
    pub query: String,
    pub session: SessionInfo,
    pub query_stats: QueryStats,
    /// Set by the coordinator once the snapshot will no longer change
    pub final_query_info: bool,
    pub output_stage: Option<StageNode>,
    pub failure_info: Option<FailureInfo>,
    pub error_type: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub warnings: Vec<QueryWarning>,
}

impl QuerySnapshot {
    pub fn is_running(&self) -> bool {
        self.state == "RUNNING"
    }
}

/// Aggregate statistics for the whole query.
///
/// Times and sizes are cumulative; the monitor turns successive values into
/// rates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryStats {
    pub create_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    pub elapsed_time: String,
    pub queued_time: String,
    pub execution_time: String,
    pub total_planning_time: String,
    pub distributed_planning_time: String,

    pub total_scheduled_time: String,
    pub total_cpu_time: String,

    pub processed_input_positions: f64,
    pub processed_input_data_size: String,

    pub total_memory_reservation: String,
    pub peak_memory_reservation: String,
    /// Byte-milliseconds
    pub cumulative_memory: f64,
}

impl QueryStats {
    pub fn elapsed_millis(&self) -> f64 {
        parse_duration_or_zero(&self.elapsed_time)
    }

    pub fn scheduled_millis(&self) -> f64 {
        parse_duration_or_zero(&self.total_scheduled_time)
    }

    pub fn cpu_millis(&self) -> f64 {
        parse_duration_or_zero(&self.total_cpu_time)
    }

    pub fn input_bytes(&self) -> f64 {
        parse_data_size_or_zero(&self.processed_input_data_size)
    }

    pub fn reserved_memory_bytes(&self) -> f64 {
        parse_data_size_or_zero(&self.total_memory_reservation)
    }
}

/// Who ran the query and with which variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionInfo {
    pub user: String,
    pub schema: Option<String>,
    pub user_def_variables: BTreeMap<String, serde_json::Value>,
    pub server_variables: BTreeMap<String, serde_json::Value>,
}

/// `"key=value"` lines for a session variable map, in key order.
pub fn session_properties(variables: &BTreeMap<String, serde_json::Value>) -> Vec<String> {
    variables
        .iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => format!("{}={}", key, s),
            other => format!("{}={}", key, other),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorCode {
    pub name: String,
    pub code: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryWarning {
    pub warning_code: WarningCode,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WarningCode {
    pub name: String,
}

// ============================================
// Failures
// ============================================

/// A server-side exception, with its cause chain and suppressed exceptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FailureInfo {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
    pub stack: Vec<String>,
    pub cause: Option<Box<FailureInfo>>,
    pub suppressed: Vec<FailureInfo>,
}

// ============================================
// Stages
// ============================================

/// One execution stage; owns its sub-stages and tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageNode {
    /// `queryId.stageNumber`
    pub stage_id: String,
    pub state: Option<String>,
    /// Opaque plan fragment; absent when the stage has not been planned yet
    pub plan: Option<serde_json::Value>,
    pub stage_stats: StageStats,
    pub sub_stages: Vec<StageNode>,
    pub tasks: Vec<TaskSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageStats {
    pub total_scheduled_time: String,
    pub total_blocked_time: String,
    pub total_user_time: String,
    pub total_cpu_time: String,
    pub cumulative_memory: f64,
    pub total_memory_reservation: String,
    pub peak_memory_reservation: String,
}

// ============================================
// Tasks
// ============================================

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    #[default]
    Planned,
    Running,
    Finished,
    Canceled,
    Aborted,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Planned => "PLANNED",
            TaskState::Running => "RUNNING",
            TaskState::Finished => "FINISHED",
            TaskState::Canceled => "CANCELED",
            TaskState::Aborted => "ABORTED",
            TaskState::Failed => "FAILED",
        }
    }

    /// Whether the task has stopped, successfully or not.
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Canceled | TaskState::Aborted | TaskState::Failed
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLANNED" => Ok(TaskState::Planned),
            "RUNNING" => Ok(TaskState::Running),
            "FINISHED" => Ok(TaskState::Finished),
            "CANCELED" => Ok(TaskState::Canceled),
            "ABORTED" => Ok(TaskState::Aborted),
            "FAILED" => Ok(TaskState::Failed),
            _ => Err(format!("unknown task state: {}", s)),
        }
    }
}

/// One task within a stage.
///
/// Task-level times are reported as plain milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskSnapshot {
    pub task_status: TaskStatus,
    /// Absent until the task starts
    pub stats: Option<TaskStats>,
    pub output_buffers: OutputBuffers,
    pub completed_pipeline_execs: u64,
    pub elapsed_time: f64,
    pub delivery_time: f64,
    pub process_time: f64,
    pub process_wall: f64,
    pub pull_data_time: f64,
}

impl TaskSnapshot {
    pub fn task_id(&self) -> &str {
        &self.task_status.task_id
    }

    pub fn state(&self) -> TaskState {
        self.task_status.state
    }

    pub fn scheduled_millis(&self) -> f64 {
        self.stats
            .as_ref()
            .map(|s| parse_duration_or_zero(&s.total_scheduled_time))
            .unwrap_or(0.0)
    }

    pub fn cpu_millis(&self) -> f64 {
        self.stats
            .as_ref()
            .map(|s| parse_duration_or_zero(&s.total_cpu_time))
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskStatus {
    /// `queryId.stageNumber.taskNumber`
    pub task_id: String,
    pub state: TaskState,
    /// Task URI on its worker
    #[serde(rename = "self")]
    pub self_uri: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskStats {
    pub output_positions: f64,
    pub processed_input_positions: f64,
    /// Bytes
    pub processed_input_data_size: f64,
    pub queued_pipeline_execs: u64,
    pub running_pipeline_execs: u64,
    pub total_scheduled_time: String,
    pub total_cpu_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputBuffers {
    pub total_buffered_bytes: f64,
}

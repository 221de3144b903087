//! Plain-text rendering of the query dashboard.
//!
//! Everything here is a pure function of the monitor state so it can be
//! tested without a terminal.

use chrono::{DateTime, Utc};
use querylens_core::failure::{format_error_code, format_stack_trace};
use querylens_core::format::{
    format_count, format_data_size, format_duration, format_relative_time,
    format_short_date_time, precision_round,
};
use querylens_core::stage::flatten_stages;
use querylens_core::{
    session_properties, task_rows, LoadState, QueryMonitor, QuerySnapshot, RateHistory,
    SkewHistogram, StageSummary, TaskFilter, TaskRow,
};

const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Width of the truncated SQL preview
const QUERY_PREVIEW_CHARS: usize = 120;

/// Full dashboard for the current monitor state.
pub fn render_dashboard(monitor: &QueryMonitor, filter: TaskFilter, now: DateTime<Utc>) -> String {
    let snapshot = match (monitor.load_state(), monitor.current()) {
        (LoadState::Loading, _) => return format!("Loading {} ...\n", monitor.query_id()),
        (LoadState::NotFound, _) | (_, None) => {
            return format!(
                "Query {} not found (retrying every poll)\n",
                monitor.query_id()
            )
        }
        (LoadState::Loaded, Some(snapshot)) => snapshot,
    };

    let mut lines = overview(snapshot, now);
    lines.push(String::new());
    lines.extend(rates(monitor));

    if let Some(failure) = failure(snapshot) {
        lines.push(String::new());
        lines.extend(failure);
    }

    lines.push(String::new());
    lines.push(format!(
        "Stages{}",
        if monitor.stage_auto_refresh() { "" } else { " (frozen)" }
    ));
    for stage in flatten_stages(monitor.stage_root()) {
        if stage.is_planned() {
            lines.extend(stage_lines(&StageSummary::from_stage(stage)));
        }
    }

    if filter != TaskFilter::None {
        lines.push(String::new());
        lines.push(format!(
            "Tasks: {}{}",
            filter,
            if monitor.task_auto_refresh() { "" } else { " (frozen)" }
        ));
        lines.extend(task_table(&task_rows(monitor.task_root(), filter)));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Key help shown under the live dashboard.
pub fn render_footer(monitor: &QueryMonitor) -> String {
    let on_off = |following: bool| if following { "live" } else { "frozen" };
    format!(
        "[s] stages: {}  [t] tasks: {}  [r] refresh  [q] quit",
        on_off(monitor.stage_auto_refresh()),
        on_off(monitor.task_auto_refresh())
    )
}

fn overview(snapshot: &QuerySnapshot, now: DateTime<Utc>) -> Vec<String> {
    let stats = &snapshot.query_stats;
    let mut lines = vec![
        format!("Query {}  {}", snapshot.query_id, snapshot.state),
        format!(
            "User {}  Schema {}",
            snapshot.session.user,
            snapshot.session.schema.as_deref().unwrap_or("-")
        ),
    ];

    if let Some(created) = stats.create_time {
        lines.push(format!(
            "Submitted {} ({})",
            format_short_date_time(created),
            format_relative_time(created, now)
        ));
    }
    if let Some(ended) = stats.end_time {
        lines.push(format!("Completed {}", format_short_date_time(ended)));
    }

    lines.push(format!(
        "Elapsed {}  Queued {}  Execution {}  Planning {}",
        or_dash(&stats.elapsed_time),
        or_dash(&stats.queued_time),
        or_dash(&stats.execution_time),
        or_dash(&stats.total_planning_time)
    ));

    let variables: Vec<String> = session_properties(&snapshot.session.user_def_variables)
        .into_iter()
        .chain(session_properties(&snapshot.session.server_variables))
        .collect();
    if !variables.is_empty() {
        lines.push(format!("Session {}", variables.join(", ")));
    }

    for warning in &snapshot.warnings {
        lines.push(format!(
            "Warning {}: {}",
            warning.warning_code.name, warning.message
        ));
    }

    let sql: String = snapshot
        .query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if !sql.is_empty() {
        lines.push(truncate(&sql, QUERY_PREVIEW_CHARS));
    }
    lines
}

fn rates(monitor: &QueryMonitor) -> Vec<String> {
    let h = monitor.histories();
    vec![
        rate_line("Scheduled parallelism", &h.scheduled_time_rate, precision_round),
        rate_line("CPU parallelism", &h.cpu_time_rate, precision_round),
        rate_line("Input rows/s", &h.row_input_rate, format_count),
        rate_line("Input bytes/s", &h.byte_input_rate, format_data_size),
        rate_line("Reserved memory", &h.reserved_memory, format_data_size),
    ]
}

fn rate_line(label: &str, history: &RateHistory, fmt: fn(f64) -> String) -> String {
    let latest = history.latest().map(fmt).unwrap_or_else(|| "-".to_string());
    format!("{:<22} {:>10}  {}", label, latest, sparkline(&history.to_vec()))
}

fn failure(snapshot: &QuerySnapshot) -> Option<Vec<String>> {
    let info = snapshot.failure_info.as_ref()?;
    let mut lines = vec![format!(
        "Error {} {}",
        snapshot.error_type.as_deref().unwrap_or(""),
        format_error_code(snapshot.error_code.as_ref())
    )
    .trim_end()
    .to_string()];
    lines.extend(format_stack_trace(info).lines().map(str::to_string));
    Some(lines)
}

fn stage_lines(summary: &StageSummary) -> Vec<String> {
    vec![
        format!(
            "  Stage {:<4} {:<10} tasks {}/{}/{} of {}  buffered {}",
            summary
                .stage_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| summary.stage_id.clone()),
            summary.state.as_deref().unwrap_or("-"),
            summary.pending_tasks,
            summary.running_tasks,
            summary.finished_tasks,
            summary.total_tasks,
            format_data_size(summary.buffered_bytes)
        ),
        histogram_line("scheduled", &summary.scheduled_histogram),
        histogram_line("cpu", &summary.cpu_histogram),
    ]
}

fn histogram_line(label: &str, histogram: &SkewHistogram) -> String {
    let counts: Vec<f64> = histogram.counts.iter().map(|&c| c as f64).collect();
    let range = match (histogram.labels.first(), histogram.labels.last()) {
        (Some(first), Some(last)) => format!(
            "{} .. {}",
            first.split('-').next().unwrap_or(first),
            last.rsplit('-').next().unwrap_or(last)
        ),
        _ => String::new(),
    };
    format!("    {:<10} {}  {}", label, sparkline(&counts), range)
}

fn task_table(rows: &[TaskRow]) -> Vec<String> {
    let mut lines = vec![format!(
        "  {:<10} {:<22} {:<9} {:>8} {:>8} {:>9} {:>10} {:>5} {:>9}",
        "ID", "Host", "State", "Rows", "Rows/s", "Bytes", "Bytes/s", "Done", "Elapsed"
    )];
    lines.extend(rows.iter().map(|row| {
        format!(
            "  {:<10} {:<22} {:<9} {:>8} {:>8} {:>9} {:>10} {:>5} {:>9}",
            querylens_core::task_id::task_id_suffix(&row.task_id),
            truncate(&row.host, 22),
            row.state.as_str(),
            format_count(row.input_rows),
            format_count(row.input_rows_per_sec),
            format_data_size(row.input_bytes),
            format_data_size(row.input_bytes_per_sec),
            row.completed_execs,
            format_duration(row.elapsed_time)
        )
    }));
    if rows.is_empty() {
        lines.push("  (no tasks)".to_string());
    }
    lines
}

/// One bar per value, scaled between the series' min and max.
pub fn sparkline(values: &[f64]) -> String {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let span = max - min;

    values
        .iter()
        .map(|&v| {
            if !span.is_finite() || span <= 0.0 {
                return if v > 0.0 { SPARK_CHARS[3] } else { SPARK_CHARS[0] };
            }
            let level = ((v - min) / span * (SPARK_CHARS.len() - 1) as f64).round() as usize;
            SPARK_CHARS[level.min(SPARK_CHARS.len() - 1)]
        })
        .collect()
}

fn or_dash(text: &str) -> &str {
    if text.is_empty() {
        "-"
    } else {
        text
    }
}

fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let cut: String = input.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use querylens_core::config::MonitorConfig;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 5, 0).unwrap()
    }

    fn loaded_monitor() -> QueryMonitor {
        let snapshot: QuerySnapshot = serde_json::from_value(json!({
            "queryId": "20230101_0",
            "state": "FINISHED",
            "query": "SELECT 1\n  FROM dual",
            "finalQueryInfo": true,
            "session": {"user": "alice", "schema": "tpch"},
            "queryStats": {
                "createTime": "2023-01-01T00:00:00Z",
                "elapsedTime": "2.00s",
                "totalCpuTime": "1.00s"
            },
            "outputStage": {
                "stageId": "20230101_0.0",
                "state": "FINISHED",
                "plan": {},
                "tasks": [
                    {"taskStatus": {"taskId": "20230101_0.0.0", "state": "FINISHED"}, "elapsedTime": 1000}
                ]
            }
        }))
        .unwrap();

        let mut monitor = QueryMonitor::new("20230101_0", &MonitorConfig::default());
        monitor.record_snapshot(snapshot, now());
        monitor
    }

    #[test]
    fn test_sparkline() {
        assert_eq!(sparkline(&[]), "");
        assert_eq!(sparkline(&[0.0, 0.0]), "▁▁");
        assert_eq!(sparkline(&[2.0, 2.0]), "▄▄");
        assert_eq!(sparkline(&[0.0, 7.0]), "▁█");
        assert_eq!(sparkline(&[0.0, 1.0, 2.0]).chars().count(), 3);
    }

    #[test]
    fn test_loading_and_not_found() {
        let mut monitor = QueryMonitor::new("q1", &MonitorConfig::default());
        assert_eq!(
            render_dashboard(&monitor, TaskFilter::All, now()),
            "Loading q1 ...\n"
        );
        monitor.record_fetch_failure();
        assert!(render_dashboard(&monitor, TaskFilter::All, now()).contains("not found"));
    }

    #[test]
    fn test_dashboard_sections() {
        let monitor = loaded_monitor();
        let out = render_dashboard(&monitor, TaskFilter::All, now());

        assert!(out.starts_with("Query 20230101_0  FINISHED\n"));
        assert!(out.contains("User alice  Schema tpch"));
        assert!(out.contains("Submitted 2023-01-01 12:00am (5m ago)"));
        assert!(out.contains("SELECT 1 FROM dual"));
        assert!(out.contains("CPU parallelism"));
        assert!(out.contains("Stage 0"));
        assert!(out.contains("Tasks: All"));
        assert!(out.contains("0.0"));
    }

    #[test]
    fn test_task_table_hidden_with_none_filter() {
        let monitor = loaded_monitor();
        let out = render_dashboard(&monitor, TaskFilter::None, now());
        assert!(!out.contains("Tasks:"));
    }

    #[test]
    fn test_footer_reflects_freeze() {
        let mut monitor = loaded_monitor();
        assert!(render_footer(&monitor).contains("stages: live"));
        monitor.set_stage_auto_refresh(false);
        assert!(render_footer(&monitor).contains("stages: frozen"));
    }

    #[test]
    fn test_failure_headline_printed_once() {
        let snapshot: QuerySnapshot = serde_json::from_value(json!({
            "queryId": "20230101_1",
            "state": "FAILED",
            "finalQueryInfo": true,
            "errorType": "USER_ERROR",
            "errorCode": {"code": 1, "name": "SYNTAX_ERROR"},
            "failureInfo": {
                "type": "io.example.ParsingException",
                "message": "line 1:1: mismatched input",
                "stack": ["io.example.Parser.parse(Parser.java:10)"]
            },
            "queryStats": {"elapsedTime": "1.00s"}
        }))
        .unwrap();
        let mut monitor = QueryMonitor::new("20230101_1", &MonitorConfig::default());
        monitor.record_snapshot(snapshot, now());

        let out = render_dashboard(&monitor, TaskFilter::None, now());
        let headline = "io.example.ParsingException: line 1:1: mismatched input";
        assert_eq!(out.matches(headline).count(), 1, "{out}");
        assert!(out.contains("Error USER_ERROR SYNTAX_ERROR (1)"));
        assert!(out.contains("\tat io.example.Parser.parse(Parser.java:10)"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }
}

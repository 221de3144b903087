//! Rendering of server-side failure chains as conventional stack traces.

use crate::types::{ErrorCode, FailureInfo};

/// Render `info` and its suppressed/cause chain as a multi-line trace.
///
/// Frames a nested failure shares with its parent (a common suffix) are
/// collapsed into a single `... N more` line.
pub fn format_stack_trace(info: &FailureInfo) -> String {
    let mut out = String::new();
    write_failure(&mut out, info, &[], "", "");
    out
}

fn write_failure(
    out: &mut String,
    info: &FailureInfo,
    parent_stack: &[String],
    prefix: &str,
    line_prefix: &str,
) {
    out.push_str(line_prefix);
    out.push_str(prefix);
    out.push_str(&failure_headline(info));
    out.push('\n');

    let shared = count_shared_frames(&info.stack, parent_stack);
    for frame in &info.stack[..info.stack.len() - shared] {
        out.push_str(line_prefix);
        out.push_str("\tat ");
        out.push_str(frame);
        out.push('\n');
    }
    if shared != 0 {
        out.push_str(&format!("{}\t... {} more\n", line_prefix, shared));
    }

    let nested_prefix = format!("{}\t", line_prefix);
    for suppressed in &info.suppressed {
        write_failure(out, suppressed, &info.stack, "Suppressed: ", &nested_prefix);
    }

    if let Some(cause) = &info.cause {
        write_failure(out, cause, &info.stack, "Caused by: ", line_prefix);
    }
}

/// Length of the longest common suffix of two stacks.
fn count_shared_frames(stack: &[String], parent_stack: &[String]) -> usize {
    stack
        .iter()
        .rev()
        .zip(parent_stack.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
}

/// `"<type>: <message>"`, or just the type when there is no message.
pub fn failure_headline(info: &FailureInfo) -> String {
    match &info.message {
        Some(message) => format!("{}: {}", info.error_type, message),
        None => info.error_type.clone(),
    }
}

/// `"NAME (code)"`, or empty when the query has no error code.
pub fn format_error_code(code: Option<&ErrorCode>) -> String {
    match code {
        Some(code) => format!("{} ({})", code.name, code.code),
        None => String::new(),
    }
}

use chrono::{DateTime, FixedOffset, Local};
use crate::models::Task;

/// Calculates the urgency score for a given task at `now`.
///
/// The score is based on:
/// - **Due Date**: Closer deadlines yield higher scores. Overdue tasks get a significant boost.
/// - **Snoozes**: Each snooze nudges the task up so it stops slipping quietly.
///
/// # Returns
/// - `-1.0` if the task is completed or archived.
/// - `0.0` for open tasks without a due date.
/// - A positive float representing urgency (higher is more urgent).
pub fn compute_urgency_at(task: &Task, now: DateTime<FixedOffset>) -> f64 {
    if !task.is_open() {
        return -1.0;
    }
    let Some(due) = task.due_datetime else {
        return 0.0;
    };
    let hours_left = (due - now).num_minutes() as f64 / 60.0;
    let snoozes = f64::from(task.snooze_count);
    let base = if hours_left <= 0.0 {
        // overdue -> high urgency, growing per day late
        100.0 + (hours_left.abs() / 24.0) * 2.0 + snoozes
    } else {
        (24.0 / hours_left.max(1.0)) * 10.0 + snoozes
    };
    // clamp to a reasonable range
    if base.is_finite() { base } else { 0.0 }
}

/// [`compute_urgency_at`] using the local clock.
pub fn compute_urgency(task: &Task) -> f64 {
    compute_urgency_at(task, Local::now().fixed_offset())
}

/// Orders tasks most urgent first.
pub fn sort_by_urgency(tasks: &mut [Task]) {
    let now = Local::now().fixed_offset();
    tasks.sort_by(|a, b| compute_urgency_at(b, now).total_cmp(&compute_urgency_at(a, now)));
}

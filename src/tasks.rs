//! Task operations that involve recurrence: creation with an inline rule,
//! completion chaining, snoozing, archiving.

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{InlineRecurrence, NewTask, OwnerId, RecurrenceUnit, Task, TaskFilter, TaskId, TaskUpdate};
use crate::recurrence::advance;
use crate::storage::JsonStore;
use crate::templates::{dedup_labels, validate_title};

/// Result of [`update_task`]: the updated row and, when completing it
/// chained a new occurrence, the successor.
#[derive(Debug, Clone)]
pub struct TaskUpdateOutcome {
    pub task: Task,
    pub successor: Option<Task>,
}

/// Checks an inline rule and returns it with its weekday set sorted.
pub fn validate_inline_recurrence(rule: &InlineRecurrence) -> Result<InlineRecurrence> {
    if rule.interval == 0 {
        return Err(Error::Validation("recurrence interval must be at least 1".into()));
    }
    let weekdays = match rule.weekdays.as_deref().filter(|d| !d.is_empty()) {
        None => None,
        Some(_) if rule.unit != RecurrenceUnit::Weeks => {
            return Err(Error::Validation(format!(
                "weekdays are only allowed with weekly recurrence, not {}",
                rule.unit
            )));
        }
        Some(days) => {
            if let Some(bad) = days.iter().find(|&&d| d > 6) {
                return Err(Error::Validation(format!(
                    "weekday {bad} out of range (0 = Monday .. 6 = Sunday)"
                )));
            }
            let mut sorted = days.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            if sorted.len() != days.len() {
                return Err(Error::Validation("duplicate weekdays".into()));
            }
            Some(sorted)
        }
    };
    Ok(InlineRecurrence {
        interval: rule.interval,
        unit: rule.unit,
        weekdays,
    })
}

fn apply_recurrence(task: &mut Task, rule: Option<InlineRecurrence>) {
    match rule {
        Some(rule) => {
            task.recurrence_interval = Some(rule.interval);
            task.recurrence_unit = Some(rule.unit);
            task.recurrence_weekdays = rule.weekdays;
        }
        None => {
            task.recurrence_interval = None;
            task.recurrence_unit = None;
            task.recurrence_weekdays = None;
        }
    }
}

/// Builds an unsaved task row from creation fields. The id is assigned on insert.
pub(crate) fn task_row(owner: OwnerId, fields: NewTask, position: u32) -> Result<Task> {
    let title = validate_title(&fields.title)?;
    let rule = fields
        .recurrence
        .as_ref()
        .map(validate_inline_recurrence)
        .transpose()?;

    let now = Utc::now();
    let mut task = Task {
        id: 0,
        owner_id: owner,
        title,
        description: fields.description,
        project_id: fields.project_id,
        section_id: fields.section_id,
        priority_id: fields.priority_id,
        label_ids: dedup_labels(fields.label_ids),
        position,
        due_datetime: fields.due_datetime,
        recurring_task_id: fields.recurring_task_id,
        recurrence_interval: None,
        recurrence_unit: None,
        recurrence_weekdays: None,
        reminder_minutes: fields.reminder_minutes,
        duration_minutes: fields.duration_minutes,
        completed: false,
        archived: false,
        completed_at: None,
        archived_at: None,
        snooze_count: 0,
        created_at: now,
        updated_at: now,
    };
    apply_recurrence(&mut task, rule);
    Ok(task)
}

/// Creates a task at the end of its section.
pub fn create_task(store: &JsonStore, owner: OwnerId, fields: NewTask) -> Result<Task> {
    let mut tx = store.begin()?;
    let position = tx.next_position(owner, fields.section_id);
    let mut task = task_row(owner, fields, position)?;
    task.id = tx.insert_task(task.clone())?;
    tx.commit()?;
    info!("created task {} '{}'", task.id, task.title);
    Ok(task)
}

pub fn get_task(store: &JsonStore, owner: OwnerId, id: TaskId) -> Result<Task> {
    let db = store.load()?;
    db.tasks
        .into_iter()
        .find(|t| t.id == id && t.owner_id == owner)
        .ok_or_else(|| Error::task_not_found(id))
}

pub fn list_tasks(store: &JsonStore, owner: OwnerId, filter: &TaskFilter) -> Result<Vec<Task>> {
    let db = store.load()?;
    Ok(db
        .tasks
        .into_iter()
        .filter(|t| t.owner_id == owner)
        .filter(|t| filter.include_completed || !t.completed)
        .filter(|t| filter.include_archived || !t.archived)
        .filter(|t| filter.project_id.map_or(true, |p| t.project_id == p))
        .filter(|t| filter.recurring_task_id.map_or(true, |r| t.recurring_task_id == Some(r)))
        .collect())
}

/// Applies `changes` to a task.
///
/// Completing a task that carries an inline rule archives it and creates
/// the next occurrence, due one recurrence step after the archived task's
/// due date, in the same commit.
pub fn update_task(
    store: &JsonStore,
    owner: OwnerId,
    id: TaskId,
    changes: TaskUpdate,
) -> Result<TaskUpdateOutcome> {
    update_task_at(store, owner, id, changes, Local::now().fixed_offset())
}

/// [`update_task`] with an explicit current time.
pub fn update_task_at(
    store: &JsonStore,
    owner: OwnerId,
    id: TaskId,
    changes: TaskUpdate,
    now: DateTime<FixedOffset>,
) -> Result<TaskUpdateOutcome> {
    let mut tx = store.begin()?;
    let original = tx.task(owner, id)?.clone();
    let mut task = original.clone();

    if let Some(title) = &changes.title {
        task.title = validate_title(title)?;
    }
    if let Some(description) = changes.description {
        task.description = description;
    }
    if let Some(project_id) = changes.project_id {
        task.project_id = project_id;
    }
    if let Some(section_id) = changes.section_id {
        task.section_id = section_id;
    }
    if let Some(priority_id) = changes.priority_id {
        task.priority_id = priority_id;
    }
    if let Some(labels) = changes.label_ids {
        task.label_ids = dedup_labels(labels);
    }
    if let Some(due) = changes.due_datetime {
        task.due_datetime = due;
    }
    if let Some(rule) = changes.recurrence {
        let rule = rule.as_ref().map(validate_inline_recurrence).transpose()?;
        apply_recurrence(&mut task, rule);
    }
    if let Some(reminder) = changes.reminder_minutes {
        task.reminder_minutes = reminder;
    }
    if let Some(duration) = changes.duration_minutes {
        task.duration_minutes = duration;
    }

    let completing = changes.completed == Some(true) && !original.completed;
    match changes.completed {
        Some(true) if completing => {
            task.completed = true;
            task.completed_at = Some(now);
        }
        Some(false) if original.completed => {
            task.completed = false;
            task.completed_at = None;
        }
        _ => {}
    }

    let mut successor = None;
    // Archived rows are dismissed; completing one never revives its rule.
    if completing && !original.archived && original.has_inline_recurrence() {
        // Copy from the row as it was before this update touched it.
        let next_due = advance(
            original.due_datetime.unwrap_or(now),
            original.recurrence_interval,
            original.recurrence_unit,
            original.recurrence_weekdays.as_deref(),
        )?;

        task.archived = true;
        task.archived_at = Some(now);
        apply_recurrence(&mut task, None);

        let position = tx.next_position(owner, original.section_id);
        let mut next = Task {
            id: 0,
            position,
            due_datetime: Some(next_due),
            recurring_task_id: None,
            completed: false,
            archived: false,
            completed_at: None,
            archived_at: None,
            snooze_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..original.clone()
        };
        // The archived row keeps its position; the successor takes a fresh one.
        next.id = tx.insert_task(next.clone())?;
        successor = Some(next);
    }

    task.updated_at = Utc::now();
    *tx.task_mut(owner, id)? = task.clone();
    tx.commit()?;

    match &successor {
        Some(next) => info!(
            "completed task {id}; next occurrence {} due {}",
            next.id,
            next.due_datetime.map(|d| d.to_rfc3339()).unwrap_or_default()
        ),
        None => info!("updated task {id}"),
    }
    Ok(TaskUpdateOutcome { task, successor })
}

/// Marks a task completed, chaining its next occurrence if it recurs.
pub fn complete_task(store: &JsonStore, owner: OwnerId, id: TaskId) -> Result<TaskUpdateOutcome> {
    let changes = TaskUpdate {
        completed: Some(true),
        ..TaskUpdate::default()
    };
    update_task(store, owner, id, changes)
}

/// Moves a task's due date forward.
///
/// An overdue task is first moved to today at its original time of day.
/// The step is one recurrence step for tasks with an inline rule and one
/// day otherwise. Fails with [`Error::NoDueDate`] when there is no due date.
pub fn snooze_task(store: &JsonStore, owner: OwnerId, id: TaskId) -> Result<Task> {
    snooze_task_at(store, owner, id, Local::now().fixed_offset())
}

/// [`snooze_task`] with an explicit current time.
pub fn snooze_task_at(
    store: &JsonStore,
    owner: OwnerId,
    id: TaskId,
    now: DateTime<FixedOffset>,
) -> Result<Task> {
    let mut tx = store.begin()?;
    let task = tx.task_mut(owner, id)?;
    let due = task.due_datetime.ok_or(Error::NoDueDate(id))?;

    let base = if due < now { reanchor_to_today(due, now)? } else { due };
    let next = if task.has_inline_recurrence() {
        advance(
            base,
            task.recurrence_interval,
            task.recurrence_unit,
            task.recurrence_weekdays.as_deref(),
        )?
    } else {
        advance(base, None, None, None)?
    };

    task.due_datetime = Some(next);
    task.snooze_count = task.snooze_count.saturating_add(1);
    task.updated_at = Utc::now();
    let task = task.clone();
    tx.commit()?;
    info!("snoozed task {id} to {} (x{})", next.to_rfc3339(), task.snooze_count);
    Ok(task)
}

/// Today's date, seen from `due`'s offset, at `due`'s time of day.
fn reanchor_to_today(
    due: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> Result<DateTime<FixedOffset>> {
    let offset = due.timezone();
    let today = now.with_timezone(&offset).date_naive();
    offset
        .from_local_datetime(&today.and_time(due.time()))
        .single()
        .ok_or(Error::DateOutOfRange)
}

/// Archives a task without completing it. Its inline rule is dropped so the
/// archived row never chains another occurrence.
pub fn archive_task(store: &JsonStore, owner: OwnerId, id: TaskId) -> Result<Task> {
    let mut tx = store.begin()?;
    let task = tx.task_mut(owner, id)?;
    if !task.archived {
        task.archived = true;
        task.archived_at = Some(Local::now().fixed_offset());
        apply_recurrence(task, None);
        task.updated_at = Utc::now();
    }
    let task = task.clone();
    tx.commit()?;
    info!("archived task {id}");
    Ok(task)
}

pub fn delete_task(store: &JsonStore, owner: OwnerId, id: TaskId) -> Result<()> {
    let mut tx = store.begin()?;
    tx.remove_task(owner, id)?;
    tx.commit()?;
    info!("deleted task {id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(interval: u32, unit: RecurrenceUnit, weekdays: Option<Vec<u8>>) -> InlineRecurrence {
        InlineRecurrence { interval, unit, weekdays }
    }

    #[test]
    fn test_inline_rule_validation() {
        assert!(validate_inline_recurrence(&rule(0, RecurrenceUnit::Days, None)).is_err());
        assert!(validate_inline_recurrence(&rule(1, RecurrenceUnit::Months, Some(vec![1]))).is_err());
        assert!(validate_inline_recurrence(&rule(1, RecurrenceUnit::Weeks, Some(vec![9]))).is_err());
        assert!(validate_inline_recurrence(&rule(1, RecurrenceUnit::Weeks, Some(vec![2, 2]))).is_err());

        let ok = validate_inline_recurrence(&rule(2, RecurrenceUnit::Weeks, Some(vec![4, 0]))).unwrap();
        assert_eq!(ok.weekdays, Some(vec![0, 4]));

        let empty = validate_inline_recurrence(&rule(1, RecurrenceUnit::Days, Some(Vec::new()))).unwrap();
        assert_eq!(empty.weekdays, None);
    }

    #[test]
    fn test_reanchor_keeps_time_and_offset() {
        let due = DateTime::parse_from_rfc3339("2024-01-02T07:45:00+09:00").unwrap();
        let now = DateTime::parse_from_rfc3339("2024-03-10T20:00:00+00:00").unwrap();
        // 20:00 UTC on Mar 10 is already Mar 11 in +09:00
        let anchored = reanchor_to_today(due, now).unwrap();
        assert_eq!(anchored.to_rfc3339(), "2024-03-11T07:45:00+09:00");
    }
}

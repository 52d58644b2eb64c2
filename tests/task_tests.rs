use chrono::{DateTime, FixedOffset};
use taskcadence::models::{InlineRecurrence, NewTask, RecurrenceUnit, TaskFilter, TaskUpdate};
use taskcadence::storage::JsonStore;
use taskcadence::tasks::{
    archive_task, complete_task, create_task, delete_task, get_task, list_tasks, snooze_task,
    snooze_task_at, update_task, update_task_at,
};
use taskcadence::Error;
use tempfile::TempDir;

fn with_test_store<F>(f: F)
where
    F: FnOnce(&JsonStore),
{
    let dir = TempDir::new().unwrap();
    let store = JsonStore::in_dir(dir.path()).unwrap();
    f(&store);
}

fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn task(title: &str, due: Option<&str>, recurrence: Option<InlineRecurrence>) -> NewTask {
    NewTask {
        title: title.into(),
        project_id: 1,
        section_id: 1,
        due_datetime: due.map(at),
        recurrence,
        ..NewTask::default()
    }
}

fn every(interval: u32, unit: RecurrenceUnit, weekdays: Option<Vec<u8>>) -> Option<InlineRecurrence> {
    Some(InlineRecurrence { interval, unit, weekdays })
}

#[test]
fn test_add_and_list() {
    with_test_store(|store| {
        let first = create_task(store, 1, task("First", None, None)).unwrap();
        let second = create_task(store, 1, task("Second", None, None)).unwrap();
        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);

        let tasks = list_tasks(store, 1, &TaskFilter::default()).unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(list_tasks(store, 2, &TaskFilter::default()).unwrap().is_empty());
    });
}

#[test]
fn test_complete_plain_task() {
    with_test_store(|store| {
        let t = create_task(store, 1, task("Once", Some("2025-01-10T09:00:00+00:00"), None)).unwrap();
        let outcome = complete_task(store, 1, t.id).unwrap();
        assert!(outcome.successor.is_none());
        assert!(outcome.task.completed);
        assert!(outcome.task.completed_at.is_some());
        assert!(!outcome.task.archived);

        assert!(list_tasks(store, 1, &TaskFilter::default()).unwrap().is_empty());
    });
}

#[test]
fn test_completing_recurring_task_chains_successor() {
    with_test_store(|store| {
        let rule = every(1, RecurrenceUnit::Weeks, Some(vec![4, 2]));
        let t = create_task(store, 1, task("Standup notes", Some("2024-01-15T10:00:00+01:00"), rule)).unwrap();
        assert_eq!(t.recurrence_weekdays, Some(vec![2, 4]));

        let outcome = complete_task(store, 1, t.id).unwrap();
        let next = outcome.successor.unwrap();
        assert_eq!(next.due_datetime, Some(at("2024-01-17T10:00:00+01:00")));
        assert_eq!(next.title, "Standup notes");
        assert_eq!(next.recurrence_interval, Some(1));
        assert_eq!(next.recurrence_unit, Some(RecurrenceUnit::Weeks));
        assert_eq!(next.recurrence_weekdays, Some(vec![2, 4]));
        assert!(next.is_open());
        assert_ne!(next.id, t.id);

        let old = get_task(store, 1, t.id).unwrap();
        assert!(old.completed);
        assert!(old.archived);
        assert!(old.archived_at.is_some());
        assert!(!old.has_inline_recurrence());

        let open = list_tasks(store, 1, &TaskFilter::default()).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, next.id);
    });
}

#[test]
fn test_completing_twice_does_not_chain_again() {
    with_test_store(|store| {
        let rule = every(1, RecurrenceUnit::Months, None);
        let t = create_task(store, 1, task("Rent", Some("2024-01-31T08:00:00+00:00"), rule)).unwrap();
        let next = complete_task(store, 1, t.id).unwrap().successor.unwrap();
        assert_eq!(next.due_datetime, Some(at("2024-02-29T08:00:00+00:00")));

        let again = complete_task(store, 1, t.id).unwrap();
        assert!(again.successor.is_none());
        let all = TaskFilter {
            include_completed: true,
            include_archived: true,
            ..TaskFilter::default()
        };
        assert_eq!(list_tasks(store, 1, &all).unwrap().len(), 2);
    });
}

#[test]
fn test_recurring_task_without_due_date_starts_from_now() {
    with_test_store(|store| {
        let rule = every(2, RecurrenceUnit::Days, None);
        let t = create_task(store, 1, task("Water", None, rule)).unwrap();
        let now = at("2025-05-05T12:00:00+00:00");
        let changes = TaskUpdate {
            completed: Some(true),
            ..TaskUpdate::default()
        };
        let next = update_task_at(store, 1, t.id, changes, now).unwrap().successor.unwrap();
        assert_eq!(next.due_datetime, Some(at("2025-05-07T12:00:00+00:00")));
    });
}

#[test]
fn test_uncomplete_clears_timestamp() {
    with_test_store(|store| {
        let t = create_task(store, 1, task("Toggle", None, None)).unwrap();
        complete_task(store, 1, t.id).unwrap();
        let changes = TaskUpdate {
            completed: Some(false),
            ..TaskUpdate::default()
        };
        let reopened = update_task(store, 1, t.id, changes).unwrap().task;
        assert!(!reopened.completed);
        assert!(reopened.completed_at.is_none());
    });
}

#[test]
fn test_snooze_overdue_task_reanchors_to_today() {
    with_test_store(|store| {
        let t = create_task(store, 1, task("Call bank", Some("2025-03-01T14:30:00+00:00"), None)).unwrap();
        let now = at("2025-03-10T08:00:00+00:00");
        let snoozed = snooze_task_at(store, 1, t.id, now).unwrap();
        assert_eq!(snoozed.due_datetime, Some(at("2025-03-11T14:30:00+00:00")));
        assert_eq!(snoozed.snooze_count, 1);
    });
}

#[test]
fn test_snooze_future_task_adds_one_day() {
    with_test_store(|store| {
        let t = create_task(store, 1, task("Dentist", Some("2025-03-20T09:00:00+00:00"), None)).unwrap();
        let now = at("2025-03-10T08:00:00+00:00");
        let snoozed = snooze_task_at(store, 1, t.id, now).unwrap();
        assert_eq!(snoozed.due_datetime, Some(at("2025-03-21T09:00:00+00:00")));
    });
}

#[test]
fn test_snooze_uses_inline_rule() {
    with_test_store(|store| {
        let rule = every(1, RecurrenceUnit::Weeks, None);
        let t = create_task(store, 1, task("Review", Some("2025-03-20T09:00:00+00:00"), rule)).unwrap();
        let now = at("2025-03-10T08:00:00+00:00");
        snooze_task_at(store, 1, t.id, now).unwrap();
        let snoozed = snooze_task_at(store, 1, t.id, now).unwrap();
        assert_eq!(snoozed.due_datetime, Some(at("2025-04-03T09:00:00+00:00")));
        assert_eq!(snoozed.snooze_count, 2);
    });
}

#[test]
fn test_snooze_without_due_date_fails() {
    with_test_store(|store| {
        let t = create_task(store, 1, task("Someday", None, None)).unwrap();
        let err = snooze_task(store, 1, t.id).unwrap_err();
        assert!(matches!(err, Error::NoDueDate(id) if id == t.id));
        assert_eq!(get_task(store, 1, t.id).unwrap().snooze_count, 0);
    });
}

#[test]
fn test_invalid_recurrence_rejected() {
    with_test_store(|store| {
        let zero = every(0, RecurrenceUnit::Days, None);
        assert!(matches!(create_task(store, 1, task("Zero", None, zero)), Err(Error::Validation(_))));

        let monthly_days = every(1, RecurrenceUnit::Months, Some(vec![1]));
        assert!(matches!(
            create_task(store, 1, task("Monthly", None, monthly_days)),
            Err(Error::Validation(_))
        ));

        let out_of_range = every(1, RecurrenceUnit::Weeks, Some(vec![7]));
        assert!(matches!(
            create_task(store, 1, task("Week", None, out_of_range)),
            Err(Error::Validation(_))
        ));

        assert!(matches!(create_task(store, 1, task("   ", None, None)), Err(Error::Validation(_))));
        assert!(list_tasks(store, 1, &TaskFilter::default()).unwrap().is_empty());
    });
}

#[test]
fn test_other_owner_cannot_touch_task() {
    with_test_store(|store| {
        let t = create_task(store, 1, task("Private", Some("2025-03-20T09:00:00+00:00"), None)).unwrap();
        assert!(get_task(store, 2, t.id).unwrap_err().is_not_found());
        assert!(complete_task(store, 2, t.id).unwrap_err().is_not_found());
        assert!(snooze_task(store, 2, t.id).unwrap_err().is_not_found());
        assert!(delete_task(store, 2, t.id).unwrap_err().is_not_found());
        assert!(!get_task(store, 1, t.id).unwrap().completed);
    });
}

#[test]
fn test_archive_and_delete() {
    with_test_store(|store| {
        let t = create_task(store, 1, task("Old", None, None)).unwrap();
        let archived = archive_task(store, 1, t.id).unwrap();
        assert!(archived.archived);
        assert!(!archived.completed);
        assert!(list_tasks(store, 1, &TaskFilter::default()).unwrap().is_empty());

        delete_task(store, 1, t.id).unwrap();
        assert!(get_task(store, 1, t.id).unwrap_err().is_not_found());
    });
}

#[test]
fn test_completing_archived_recurring_task_does_not_chain() {
    with_test_store(|store| {
        let rule = every(1, RecurrenceUnit::Months, None);
        let t = create_task(store, 1, task("Rent", Some("2025-01-31T08:00:00+00:00"), rule)).unwrap();

        let archived = archive_task(store, 1, t.id).unwrap();
        assert!(!archived.has_inline_recurrence());
        assert!(archived.recurrence_weekdays.is_none());

        let outcome = complete_task(store, 1, t.id).unwrap();
        assert!(outcome.successor.is_none());
        assert!(outcome.task.completed);

        let all = TaskFilter {
            include_completed: true,
            include_archived: true,
            ..TaskFilter::default()
        };
        assert_eq!(list_tasks(store, 1, &all).unwrap().len(), 1);
    });
}

#[test]
fn test_archived_row_with_rule_left_in_store_does_not_chain() {
    with_test_store(|store| {
        let rule = every(1, RecurrenceUnit::Weeks, None);
        let t = create_task(store, 1, task("Review", Some("2025-01-06T08:00:00+00:00"), rule)).unwrap();

        // A row archived with its rule still set, as older files may hold.
        let mut db = store.load().unwrap();
        db.tasks[0].archived = true;
        std::fs::write(store.path(), serde_json::to_string(&db).unwrap()).unwrap();

        let outcome = complete_task(store, 1, t.id).unwrap();
        assert!(outcome.successor.is_none());
    });
}

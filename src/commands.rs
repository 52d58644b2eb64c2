use std::io::{self, Write};

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::error::Result;
use crate::generation::{generate_all, GenerationSettings};
use crate::models::{
    InlineRecurrence, NewTask, NewTemplate, OwnerId, RecurrenceUnit, RecurringTemplate, Task,
    TaskFilter, TaskId, TaskUpdate, TemplateId, TemplateUpdate,
};
use crate::recurrence::preview_occurrences;
use crate::storage::JsonStore;
use crate::tasks::{archive_task, complete_task, create_task, delete_task, list_tasks, snooze_task, update_task};
use crate::templates::{
    create_template, delete_template, get_template, list_templates, pause_template, resume_template,
    update_template,
};
use crate::urgency::{compute_urgency, sort_by_urgency};

const WEEKDAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Parses a due timestamp: RFC 3339, `YYYY-MM-DD HH:MM`, or `YYYY-MM-DD`
/// (midnight). Inputs without an offset use the local one.
pub fn parse_due(s: &str) -> std::result::Result<DateTime<FixedOffset>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(&format!("{s} 00:00"), "%Y-%m-%d %H:%M"))
        .map_err(|e| format!("invalid due date '{s}': {e}. Use YYYY-MM-DD [HH:MM]."))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| format!("'{s}' does not exist in the local time zone"))
}

pub fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{s}': {e}. Use YYYY-MM-DD."))
}

pub fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| format!("invalid time '{s}': {e}. Use HH:MM."))
}

/// Parses a comma separated weekday list, as numbers (0 = Monday) or
/// three-letter names. Duplicates are kept so validation can report them.
pub fn parse_days(s: &str) -> std::result::Result<Vec<u8>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let lower = p.to_lowercase();
            if let Some(idx) = WEEKDAY_NAMES.iter().position(|n| lower.starts_with(n)) {
                return Ok(idx as u8);
            }
            p.parse::<u8>().map_err(|_| format!("invalid weekday '{p}'"))
        })
        .collect()
}

/// Parses `+HH:MM` / `-HH:MM` into seconds east of UTC.
pub fn parse_offset(s: &str) -> std::result::Result<i32, String> {
    let dt = DateTime::parse_from_rfc3339(&format!("2000-01-01T00:00:00{s}"))
        .map_err(|_| format!("invalid UTC offset '{s}'. Use +HH:MM or -HH:MM."))?;
    Ok(dt.offset().local_minus_utc())
}

/// Seconds east of UTC of the local zone right now.
pub fn local_offset_secs() -> i32 {
    Local::now().offset().local_minus_utc()
}

/// Builds an inline rule from the CLI flags. `--unit` alone means every 1,
/// `--every` alone means days, `--on` alone means every 1 week.
pub fn inline_rule(
    every: Option<u32>,
    unit: Option<RecurrenceUnit>,
    on: Option<Vec<u8>>,
) -> Option<InlineRecurrence> {
    if every.is_none() && unit.is_none() && on.is_none() {
        return None;
    }
    let unit = unit.unwrap_or(if on.is_some() {
        RecurrenceUnit::Weeks
    } else {
        RecurrenceUnit::Days
    });
    Some(InlineRecurrence {
        interval: every.unwrap_or(1),
        unit,
        weekdays: on,
    })
}

pub(crate) fn format_due(due: Option<DateTime<FixedOffset>>) -> String {
    due.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

pub(crate) fn format_days(days: Option<&[u8]>) -> String {
    match days {
        Some(days) if !days.is_empty() => days
            .iter()
            .map(|&d| WEEKDAY_NAMES.get(usize::from(d)).copied().unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(","),
        _ => "-".into(),
    }
}

pub(crate) fn format_time_left(task: &Task) -> (String, bool) {
    let Some(due) = task.due_datetime else {
        return ("-".into(), false);
    };
    let today = Local::now().date_naive();
    let days_left = (due.date_naive() - today).num_days();
    if days_left < 0 {
        (format!("{}d overdue", days_left.abs()), true)
    } else if days_left == 0 {
        ("Today".to_string(), false)
    } else {
        (format!("{days_left}d"), false)
    }
}

/// Adds a new task.
pub fn cmd_add(store: &JsonStore, owner: OwnerId, fields: NewTask) -> Result<()> {
    let task = create_task(store, owner, fields)?;
    println!("Task added (id = {})", task.id);
    if let Some(rule) = task.recurrence_label() {
        println!("Repeats {rule}");
    }
    Ok(())
}

/// Lists tasks in a formatted table, sorted by urgency.
///
/// By default, hides completed and archived tasks unless `all` is true.
pub fn cmd_list(store: &JsonStore, owner: OwnerId, all: bool) -> Result<()> {
    let filter = TaskFilter {
        include_completed: all,
        include_archived: all,
        ..TaskFilter::default()
    };
    let mut tasks = list_tasks(store, owner, &filter)?;
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    sort_by_urgency(&mut tasks);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Title").add_attribute(Attribute::Bold),
            Cell::new("Project").add_attribute(Attribute::Bold),
            Cell::new("Due").add_attribute(Attribute::Bold),
            Cell::new("Time Left").add_attribute(Attribute::Bold),
            Cell::new("Repeats").add_attribute(Attribute::Bold),
            Cell::new("Snoozed").add_attribute(Attribute::Bold),
            Cell::new("Urg").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for t in tasks {
        let urgency = compute_urgency(&t);
        let (time_left, overdue) = format_time_left(&t);

        let urgency_color = if !t.is_open() {
            Color::Grey
        } else if urgency > 50.0 {
            Color::Red
        } else if urgency > 20.0 {
            Color::Yellow
        } else {
            Color::Green
        };

        let (status, status_color) = if t.archived {
            ("Archived", Color::Grey)
        } else if t.completed {
            ("Done", Color::Green)
        } else {
            ("Pending", Color::Yellow)
        };

        let repeats = match (t.recurrence_label(), t.recurring_task_id) {
            (Some(rule), _) => rule,
            (None, Some(template)) => format!("template {template}"),
            (None, None) => "-".into(),
        };

        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.title),
            Cell::new(t.project_id),
            Cell::new(format_due(t.due_datetime)),
            Cell::new(time_left).fg(if overdue && t.is_open() { Color::Red } else { Color::Reset }),
            Cell::new(repeats),
            Cell::new(t.snooze_count),
            Cell::new(format!("{urgency:.1}")).fg(urgency_color),
            Cell::new(status).fg(status_color),
        ]);
    }

    println!("{table}");
    Ok(())
}

/// Marks a task as complete by ID.
///
/// If the task repeats, the next occurrence is created.
pub fn cmd_complete(store: &JsonStore, owner: OwnerId, id: TaskId) -> Result<()> {
    let outcome = complete_task(store, owner, id)?;
    println!("Task {id} marked as complete.");
    if let Some(next) = outcome.successor {
        println!("Recurring task {} created due {}", next.id, format_due(next.due_datetime));
    }
    Ok(())
}

pub fn cmd_snooze(store: &JsonStore, owner: OwnerId, id: TaskId) -> Result<()> {
    let task = snooze_task(store, owner, id)?;
    println!(
        "Task {id} snoozed to {} (snoozed {} times).",
        format_due(task.due_datetime),
        task.snooze_count
    );
    Ok(())
}

pub fn cmd_archive(store: &JsonStore, owner: OwnerId, id: TaskId) -> Result<()> {
    archive_task(store, owner, id)?;
    println!("Task {id} archived.");
    Ok(())
}

/// Removes a task from the database by ID.
pub fn cmd_remove(store: &JsonStore, owner: OwnerId, id: TaskId) -> Result<()> {
    delete_task(store, owner, id)?;
    println!("Task {id} removed.");
    Ok(())
}

/// Edits an existing task's details.
pub fn cmd_edit(store: &JsonStore, owner: OwnerId, id: TaskId, changes: TaskUpdate) -> Result<()> {
    let outcome = update_task(store, owner, id, changes)?;
    println!("Task {id} updated.");
    if let Some(next) = outcome.successor {
        println!("Recurring task {} created due {}", next.id, format_due(next.due_datetime));
    }
    Ok(())
}

/// Adds a new recurring template.
pub fn cmd_template_add(store: &JsonStore, owner: OwnerId, fields: NewTemplate) -> Result<()> {
    let tmpl = create_template(store, owner, fields)?;
    println!("Template '{}' added (id = {}).", tmpl.title, tmpl.id);
    Ok(())
}

fn template_table(templates: &[RecurringTemplate]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "ID", "Title", "Project", "Pattern", "Days", "Time", "Window", "Last", "Active",
    ]);
    for t in templates {
        let window = match t.end_date {
            Some(end) => format!("{} .. {}", t.start_date, end),
            None => format!("{} ..", t.start_date),
        };
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.title),
            Cell::new(t.project_id),
            Cell::new(t.pattern),
            Cell::new(format_days(t.days_of_week.as_deref())),
            Cell::new(t.time_of_day.format("%H:%M")),
            Cell::new(window),
            Cell::new(t.last_generated_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())),
            Cell::new(if t.is_active { "yes" } else { "paused" })
                .fg(if t.is_active { Color::Green } else { Color::Grey }),
        ]);
    }
    table
}

/// Lists templates, paused ones included when `all` is set.
pub fn cmd_template_list(store: &JsonStore, owner: OwnerId, all: bool) -> Result<()> {
    let templates = list_templates(store, owner, all)?;
    if templates.is_empty() {
        println!("No templates found.");
        return Ok(());
    }
    println!("{}", template_table(&templates));
    Ok(())
}

pub fn cmd_template_show(store: &JsonStore, owner: OwnerId, id: TemplateId) -> Result<()> {
    let tmpl = get_template(store, owner, id)?;
    println!("{}", template_table(std::slice::from_ref(&tmpl)));
    if let Some(description) = &tmpl.description {
        println!("{description}");
    }
    Ok(())
}

pub fn cmd_template_edit(
    store: &JsonStore,
    owner: OwnerId,
    id: TemplateId,
    changes: TemplateUpdate,
) -> Result<()> {
    let tmpl = update_template(store, owner, id, changes)?;
    println!("Template '{}' updated.", tmpl.title);
    Ok(())
}

pub fn cmd_template_pause(store: &JsonStore, owner: OwnerId, id: TemplateId) -> Result<()> {
    let tmpl = pause_template(store, owner, id)?;
    println!("Template '{}' paused.", tmpl.title);
    Ok(())
}

pub fn cmd_template_resume(store: &JsonStore, owner: OwnerId, id: TemplateId) -> Result<()> {
    let tmpl = resume_template(store, owner, id)?;
    println!("Template '{}' resumed.", tmpl.title);
    Ok(())
}

/// Removes a template. Tasks generated from it are kept.
pub fn cmd_template_remove(store: &JsonStore, owner: OwnerId, id: TemplateId) -> Result<()> {
    delete_template(store, owner, id)?;
    println!("Template {id} removed.");
    Ok(())
}

/// Prints the next dates a template would fire on.
pub fn cmd_template_preview(
    store: &JsonStore,
    owner: OwnerId,
    id: TemplateId,
    count: usize,
) -> Result<()> {
    let tmpl = get_template(store, owner, id)?;
    let from = Local::now().date_naive().max(tmpl.start_date);
    let dates = preview_occurrences(&tmpl, from, count);
    if dates.is_empty() {
        println!("Template '{}' has no upcoming occurrences.", tmpl.title);
        return Ok(());
    }
    for d in dates {
        println!("{} {}", d.format("%a %Y-%m-%d"), tmpl.time_of_day.format("%H:%M"));
    }
    Ok(())
}

/// Runs the generation job once.
pub fn cmd_generate(
    store: &JsonStore,
    date: Option<NaiveDate>,
    settings: &GenerationSettings,
) -> Result<()> {
    let report = generate_all(store, date, settings)?;
    println!(
        "Generated {} task(s) for {} ({} in flight, {} failed).",
        report.generated,
        report.target_date,
        report.skipped_in_flight,
        report.failed_templates.len()
    );
    Ok(())
}

/// Resets the database by deleting all tasks and templates.
pub fn cmd_reset(store: &JsonStore, force: bool) -> Result<()> {
    if !force {
        print!("Are you sure you want to delete all tasks and templates? This cannot be undone. [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return Ok(());
        }
    }
    store.delete_all()?;
    println!("Database reset successfully.");
    Ok(())
}

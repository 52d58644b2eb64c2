//! Recurring template store: create, read, update, pause, resume, delete.
//!
//! Every operation is scoped to an owner. Ids belonging to someone else are
//! reported as [`Error::NotFound`], the same as ids that do not exist.

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{
    NewTemplate, OwnerId, RecurrencePattern, RecurringTemplate, TemplateId, TemplateUpdate,
};
use crate::storage::{JsonStore, MAX_TITLE_LEN};

const SECONDS_PER_DAY: i32 = 86_400;

/// Checks the weekday set against the pattern and returns it sorted.
///
/// Weekly templates need at least one day in 0-6 with no repeats; other
/// patterns must not carry days at all.
pub fn validate_recurrence_shape(
    pattern: RecurrencePattern,
    days: Option<&[u8]>,
) -> Result<Option<Vec<u8>>> {
    match pattern {
        RecurrencePattern::Weekly => {
            let days = days.filter(|d| !d.is_empty()).ok_or_else(|| {
                Error::Validation("weekly recurrence requires at least one day of week".into())
            })?;
            if let Some(bad) = days.iter().find(|&&d| d > 6) {
                return Err(Error::Validation(format!(
                    "day of week {bad} out of range (0 = Monday .. 6 = Sunday)"
                )));
            }
            let mut sorted = days.to_vec();
            sorted.sort_unstable();
            sorted.dedup();
            if sorted.len() != days.len() {
                return Err(Error::Validation("duplicate days of week".into()));
            }
            Ok(Some(sorted))
        }
        RecurrencePattern::Daily | RecurrencePattern::AlternateDays => {
            if days.is_some_and(|d| !d.is_empty()) {
                return Err(Error::Validation(format!(
                    "days of week are only allowed for weekly recurrence, not {pattern}"
                )));
            }
            Ok(None)
        }
    }
}

/// End date, when present, must fall strictly after the start date.
pub fn validate_date_range(start: NaiveDate, end: Option<NaiveDate>) -> Result<()> {
    match end {
        Some(end) if end <= start => Err(Error::Validation(format!(
            "end date {end} must be after start date {start}"
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::Validation(format!(
            "title longer than {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_offset(secs: i32) -> Result<()> {
    if secs.abs() >= SECONDS_PER_DAY {
        return Err(Error::Validation(format!("UTC offset {secs}s out of range")));
    }
    Ok(())
}

/// Drops repeated label ids, keeping first-seen order.
pub(crate) fn dedup_labels(labels: Vec<u64>) -> Vec<u64> {
    let mut seen = std::collections::HashSet::new();
    labels.into_iter().filter(|l| seen.insert(*l)).collect()
}

/// Creates an active template.
pub fn create_template(
    store: &JsonStore,
    owner: OwnerId,
    fields: NewTemplate,
) -> Result<RecurringTemplate> {
    let title = validate_title(&fields.title)?;
    let days = validate_recurrence_shape(fields.pattern, fields.days_of_week.as_deref())?;
    validate_date_range(fields.start_date, fields.end_date)?;
    validate_offset(fields.utc_offset_secs)?;

    let now = Utc::now();
    let mut template = RecurringTemplate {
        id: 0,
        owner_id: owner,
        title,
        description: fields.description,
        project_id: fields.project_id,
        section_id: fields.section_id,
        priority_id: fields.priority_id,
        label_ids: dedup_labels(fields.label_ids),
        pattern: fields.pattern,
        days_of_week: days,
        time_of_day: fields.time_of_day,
        utc_offset_secs: fields.utc_offset_secs,
        start_date: fields.start_date,
        end_date: fields.end_date,
        last_generated_date: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let mut tx = store.begin()?;
    template.id = tx.insert_template(template.clone());
    tx.commit()?;
    info!("created template {} '{}' ({})", template.id, template.title, template.pattern);
    Ok(template)
}

pub fn get_template(store: &JsonStore, owner: OwnerId, id: TemplateId) -> Result<RecurringTemplate> {
    let db = store.load()?;
    db.templates
        .into_iter()
        .find(|t| t.id == id && t.owner_id == owner)
        .ok_or_else(|| Error::template_not_found(id))
}

/// Lists the owner's templates, active ones only unless `include_inactive`.
pub fn list_templates(
    store: &JsonStore,
    owner: OwnerId,
    include_inactive: bool,
) -> Result<Vec<RecurringTemplate>> {
    let db = store.load()?;
    Ok(db
        .templates
        .into_iter()
        .filter(|t| t.owner_id == owner && (include_inactive || t.is_active))
        .collect())
}

pub fn list_templates_by_project(
    store: &JsonStore,
    owner: OwnerId,
    project_id: u64,
    include_inactive: bool,
) -> Result<Vec<RecurringTemplate>> {
    Ok(list_templates(store, owner, include_inactive)?
        .into_iter()
        .filter(|t| t.project_id == project_id)
        .collect())
}

/// Applies `changes` to a template. The recurrence shape is re-checked when
/// the pattern or days change, the date window when either date changes.
pub fn update_template(
    store: &JsonStore,
    owner: OwnerId,
    id: TemplateId,
    changes: TemplateUpdate,
) -> Result<RecurringTemplate> {
    let mut tx = store.begin()?;
    let mut merged = tx.template(owner, id)?.clone();

    if let Some(title) = &changes.title {
        merged.title = validate_title(title)?;
    }
    if let Some(description) = changes.description {
        merged.description = description;
    }
    if let Some(project_id) = changes.project_id {
        merged.project_id = project_id;
    }
    if let Some(section_id) = changes.section_id {
        merged.section_id = section_id;
    }
    if let Some(priority_id) = changes.priority_id {
        merged.priority_id = priority_id;
    }
    if let Some(labels) = changes.label_ids {
        merged.label_ids = dedup_labels(labels);
    }
    if let Some(time) = changes.time_of_day {
        merged.time_of_day = time;
    }
    if let Some(offset) = changes.utc_offset_secs {
        validate_offset(offset)?;
        merged.utc_offset_secs = offset;
    }
    if let Some(start) = changes.start_date {
        merged.start_date = start;
    }
    if let Some(end) = changes.end_date {
        merged.end_date = end;
    }

    let shape_touched = changes.pattern.is_some() || changes.days_of_week.is_some();
    if let Some(pattern) = changes.pattern {
        merged.pattern = pattern;
    }
    if let Some(days) = changes.days_of_week {
        merged.days_of_week = days;
    }
    if shape_touched {
        merged.days_of_week =
            validate_recurrence_shape(merged.pattern, merged.days_of_week.as_deref())?;
    }
    if changes.start_date.is_some() || changes.end_date.is_some() {
        validate_date_range(merged.start_date, merged.end_date)?;
    }

    merged.updated_at = Utc::now();
    *tx.template_mut(owner, id)? = merged.clone();
    tx.commit()?;
    info!("updated template {id}");
    Ok(merged)
}

/// Removes a template. Tasks already generated from it are left as they are.
pub fn delete_template(store: &JsonStore, owner: OwnerId, id: TemplateId) -> Result<()> {
    let mut tx = store.begin()?;
    let removed = tx.remove_template(owner, id)?;
    tx.commit()?;
    info!("deleted template {id} '{}'", removed.title);
    Ok(())
}

pub fn pause_template(store: &JsonStore, owner: OwnerId, id: TemplateId) -> Result<RecurringTemplate> {
    set_active(store, owner, id, false)
}

pub fn resume_template(store: &JsonStore, owner: OwnerId, id: TemplateId) -> Result<RecurringTemplate> {
    set_active(store, owner, id, true)
}

fn set_active(
    store: &JsonStore,
    owner: OwnerId,
    id: TemplateId,
    active: bool,
) -> Result<RecurringTemplate> {
    let mut tx = store.begin()?;
    let template = tx.template_mut(owner, id)?;
    template.is_active = active;
    template.updated_at = Utc::now();
    let template = template.clone();
    tx.commit()?;
    info!("template {id} {}", if active { "resumed" } else { "paused" });
    Ok(template)
}

//! Daily batch that turns due recurring templates into tasks.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::models::{OwnerId, RecurringTemplate, Task, TemplateId};
use crate::recurrence::{occurrence_due, should_generate_today};
use crate::storage::{JsonStore, Transaction};

/// Runs longer than this are logged as slow.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_secs(30);

/// Tuning for a generation run.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub slow_threshold: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
        }
    }
}

/// What a generation run did.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub target_date: NaiveDate,
    /// Active templates whose window covers the target date.
    pub candidates: usize,
    /// Tasks written.
    pub generated: usize,
    pub skipped_ineligible: usize,
    /// Templates skipped because a previous occurrence is still open.
    pub skipped_in_flight: usize,
    /// Templates that could not be staged or whose row was rejected.
    pub failed_templates: Vec<TemplateId>,
    pub elapsed: Duration,
}

/// Creates one task for every template due on `target_date` (today when
/// `None`) and records the date on each template that produced one.
///
/// Running it twice for the same date creates nothing the second time:
/// templates already marked for that date are ineligible, and a template
/// with an open occurrence is skipped until that task is finished.
///
/// All writes land in a single commit. If the commit fails nothing is
/// persisted and the error is returned.
pub fn generate_all(
    store: &JsonStore,
    target_date: Option<NaiveDate>,
    settings: &GenerationSettings,
) -> Result<GenerationReport> {
    let started = Instant::now();
    let target = target_date.unwrap_or_else(|| Local::now().date_naive());
    let mut tx = store.begin()?;

    let candidates: Vec<RecurringTemplate> = tx
        .templates()
        .iter()
        .filter(|t| covers(t, target))
        .cloned()
        .collect();

    let mut report = GenerationReport {
        target_date: target,
        candidates: candidates.len(),
        generated: 0,
        skipped_ineligible: 0,
        skipped_in_flight: 0,
        failed_templates: Vec::new(),
        elapsed: Duration::ZERO,
    };

    let mut positions: HashMap<(OwnerId, u64), u32> = HashMap::new();
    let mut rows: Vec<Task> = Vec::new();
    let mut sources: Vec<TemplateId> = Vec::new();

    for template in &candidates {
        if !should_generate_today(template, target) {
            report.skipped_ineligible += 1;
            continue;
        }
        if tx.has_unfinished_instance(template.owner_id, template.id) {
            debug!(
                "template {} '{}' still has an open occurrence, skipping",
                template.id, template.title
            );
            report.skipped_in_flight += 1;
            continue;
        }
        match stage_occurrence(&tx, template, target, &mut positions) {
            Ok(row) => {
                rows.push(row);
                sources.push(template.id);
            }
            Err(e) => {
                error!(
                    "cannot stage occurrence of template {} '{}': {e}",
                    template.id, template.title
                );
                report.failed_templates.push(template.id);
            }
        }
    }

    let inserted = tx.insert_tasks_with_fallback(&rows);
    report
        .failed_templates
        .extend(inserted.failed.iter().map(|(i, _)| sources[*i]));
    let generated: Vec<TemplateId> = inserted.inserted.iter().map(|(i, _)| sources[*i]).collect();
    tx.mark_generated(&generated, target);

    if let Err(e) = tx.commit() {
        error!("generation for {target} rolled back: {e}");
        return Err(e);
    }

    report.generated = generated.len();
    report.elapsed = started.elapsed();
    if report.elapsed > settings.slow_threshold {
        warn!(
            "generation for {target} took {:.1}s (threshold {:.1}s)",
            report.elapsed.as_secs_f64(),
            settings.slow_threshold.as_secs_f64()
        );
    }
    info!(
        "generated {} tasks for {target} ({} candidates, {} in flight, {} failed)",
        report.generated,
        report.candidates,
        report.skipped_in_flight,
        report.failed_templates.len()
    );
    Ok(report)
}

/// Active with a validity window containing `date`.
fn covers(template: &RecurringTemplate, date: NaiveDate) -> bool {
    template.is_active
        && template.start_date <= date
        && template.end_date.map_or(true, |end| end >= date)
}

/// Builds the task row for one occurrence. Row constraints are left to the
/// store so a bad row fails the insert rather than the staging.
fn stage_occurrence(
    tx: &Transaction<'_>,
    template: &RecurringTemplate,
    date: NaiveDate,
    positions: &mut HashMap<(OwnerId, u64), u32>,
) -> Result<Task> {
    let due = occurrence_due(template, date)?;

    let slot = positions
        .entry((template.owner_id, template.section_id))
        .or_insert_with(|| tx.next_position(template.owner_id, template.section_id));
    let position = *slot;
    *slot += 1;

    let now = Utc::now();
    Ok(Task {
        id: 0,
        owner_id: template.owner_id,
        title: template.title.clone(),
        description: template.description.clone(),
        project_id: template.project_id,
        section_id: template.section_id,
        priority_id: template.priority_id,
        label_ids: template.label_ids.clone(),
        position,
        due_datetime: Some(due),
        recurring_task_id: Some(template.id),
        recurrence_interval: None,
        recurrence_unit: None,
        recurrence_weekdays: None,
        reminder_minutes: None,
        duration_minutes: None,
        completed: false,
        archived: false,
        completed_at: None,
        archived_at: None,
        snooze_count: 0,
        created_at: now,
        updated_at: now,
    })
}

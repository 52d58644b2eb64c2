use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the user owning a task or template.
pub type OwnerId = u64;
/// Identifier of a task row.
pub type TaskId = u64;
/// Identifier of a recurring task template.
pub type TemplateId = u64;

/// How a recurring template decides which days it fires on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    /// Every day inside the validity window.
    Daily,
    /// On the weekdays listed in `days_of_week`.
    Weekly,
    /// Every other day, counted from the last generated date.
    AlternateDays,
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::AlternateDays => write!(f, "alternate_days"),
        }
    }
}

impl FromStr for RecurrencePattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "alternate_days" | "alternate" => Ok(Self::AlternateDays),
            other => Err(format!(
                "unknown recurrence pattern '{other}'. Supported: daily, weekly, alternate_days"
            )),
        }
    }
}

/// Calendar unit for inline task recurrence.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days => write!(f, "days"),
            Self::Weeks => write!(f, "weeks"),
            Self::Months => write!(f, "months"),
            Self::Years => write!(f, "years"),
        }
    }
}

impl FromStr for RecurrenceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "days" => Ok(Self::Days),
            "week" | "weeks" => Ok(Self::Weeks),
            "month" | "months" => Ok(Self::Months),
            "year" | "years" => Ok(Self::Years),
            other => Err(format!(
                "unknown recurrence unit '{other}'. Supported: days, weeks, months, years"
            )),
        }
    }
}

/// A complete inline recurrence rule as accepted on task create/update.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InlineRecurrence {
    /// Number of units between occurrences (at least 1).
    pub interval: u32,
    pub unit: RecurrenceUnit,
    /// Allowed weekdays (Monday=0), only for [`RecurrenceUnit::Weeks`].
    #[serde(default)]
    pub weekdays: Option<Vec<u8>>,
}

/// The durable recurrence configuration from which tasks are generated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecurringTemplate {
    pub id: TemplateId,
    pub owner_id: OwnerId,
    /// Title copied onto generated tasks.
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub project_id: u64,
    pub section_id: u64,
    #[serde(default)]
    pub priority_id: Option<u64>,
    #[serde(default)]
    pub label_ids: Vec<u64>,
    pub pattern: RecurrencePattern,
    /// Weekdays (Monday=0, sorted) for weekly templates; absent otherwise.
    #[serde(default)]
    pub days_of_week: Option<Vec<u8>>,
    /// Wall-clock time given to generated occurrences.
    pub time_of_day: NaiveTime,
    /// Offset east of UTC, in seconds, the time of day is expressed in.
    #[serde(default)]
    pub utc_offset_secs: i32,
    /// First date (inclusive) on which the template may fire.
    pub start_date: NaiveDate,
    /// Last date (inclusive) on which the template may fire.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Most recent date this template produced a task.
    #[serde(default)]
    pub last_generated_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single work item, either created by hand or generated from a template.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub owner_id: OwnerId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub project_id: u64,
    pub section_id: u64,
    #[serde(default)]
    pub priority_id: Option<u64>,
    #[serde(default)]
    pub label_ids: Vec<u64>,
    /// 1-based ordering inside the section.
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub due_datetime: Option<DateTime<FixedOffset>>,
    /// Template this task was generated from, set once at creation.
    #[serde(default)]
    pub recurring_task_id: Option<TemplateId>,
    #[serde(default)]
    pub recurrence_interval: Option<u32>,
    #[serde(default)]
    pub recurrence_unit: Option<RecurrenceUnit>,
    #[serde(default)]
    pub recurrence_weekdays: Option<Vec<u8>>,
    #[serde(default)]
    pub reminder_minutes: Option<u32>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub snooze_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Neither completed nor archived.
    pub fn is_open(&self) -> bool {
        !self.completed && !self.archived
    }

    /// Interval and unit are both set, so completion chains a successor.
    pub fn has_inline_recurrence(&self) -> bool {
        self.recurrence_interval.is_some() && self.recurrence_unit.is_some()
    }

    /// Short human form of the inline rule, e.g. `every 2 weeks on 0,4`.
    pub fn recurrence_label(&self) -> Option<String> {
        let (interval, unit) = (self.recurrence_interval?, self.recurrence_unit?);
        let mut label = format!("every {interval} {unit}");
        if let Some(days) = self.recurrence_weekdays.as_ref().filter(|d| !d.is_empty()) {
            let days: Vec<String> = days.iter().map(u8::to_string).collect();
            label.push_str(&format!(" on {}", days.join(",")));
        }
        Some(label)
    }
}

/// Fields for a new template.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub title: String,
    pub description: Option<String>,
    pub project_id: u64,
    pub section_id: u64,
    pub priority_id: Option<u64>,
    pub label_ids: Vec<u64>,
    pub pattern: RecurrencePattern,
    pub days_of_week: Option<Vec<u8>>,
    pub time_of_day: NaiveTime,
    pub utc_offset_secs: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Template fields a caller may change. `None` leaves a field untouched;
/// the nested options clear a field with `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub project_id: Option<u64>,
    pub section_id: Option<u64>,
    pub priority_id: Option<Option<u64>>,
    pub label_ids: Option<Vec<u64>>,
    pub pattern: Option<RecurrencePattern>,
    pub days_of_week: Option<Option<Vec<u8>>>,
    pub time_of_day: Option<NaiveTime>,
    pub utc_offset_secs: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
}

/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub project_id: u64,
    pub section_id: u64,
    pub priority_id: Option<u64>,
    pub label_ids: Vec<u64>,
    pub due_datetime: Option<DateTime<FixedOffset>>,
    pub recurrence: Option<InlineRecurrence>,
    pub reminder_minutes: Option<u32>,
    pub duration_minutes: Option<u32>,
    /// Template back-reference; only the generation job sets this.
    pub recurring_task_id: Option<TemplateId>,
}

/// Task fields a caller may change, same conventions as [`TemplateUpdate`].
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub project_id: Option<u64>,
    pub section_id: Option<u64>,
    pub priority_id: Option<Option<u64>>,
    pub label_ids: Option<Vec<u64>>,
    pub due_datetime: Option<Option<DateTime<FixedOffset>>>,
    pub recurrence: Option<Option<InlineRecurrence>>,
    pub reminder_minutes: Option<Option<u32>>,
    pub duration_minutes: Option<Option<u32>>,
    pub completed: Option<bool>,
}

/// Which tasks a listing returns.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub include_completed: bool,
    pub include_archived: bool,
    pub project_id: Option<u64>,
    pub recurring_task_id: Option<TemplateId>,
}

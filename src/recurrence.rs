//! Recurrence arithmetic and template eligibility.
//!
//! Everything here is pure: no storage access, no clock reads except the
//! "now" default of [`next_due_date`].

use chrono::{DateTime, Datelike, Days, FixedOffset, Local, NaiveDate, TimeZone};

use crate::error::{Error, Result};
use crate::models::{RecurrencePattern, RecurrenceUnit, RecurringTemplate};

/// Computes the next due timestamp after `current_due`, or after now when
/// there is no current due date.
///
/// - **Days / weeks**: shift by the interval, keeping the time of day.
/// - **Weeks with a weekday set**: the next allowed weekday later in the
///   same calendar week, or the first allowed weekday of the week that
///   starts `interval` weeks later once the set is exhausted.
/// - **Months**: keep the day of month, clamped to the target month's last day.
/// - **Years**: keep the date, with Feb 29 clamped to Feb 28 in common years.
///
/// A missing interval or unit advances by one day. Arithmetic happens in the
/// offset of the input timestamp.
pub fn next_due_date(
    current_due: Option<DateTime<FixedOffset>>,
    interval: Option<u32>,
    unit: Option<RecurrenceUnit>,
    weekdays: Option<&[u8]>,
) -> Result<DateTime<FixedOffset>> {
    let base = current_due.unwrap_or_else(|| Local::now().fixed_offset());
    advance(base, interval, unit, weekdays)
}

/// Same as [`next_due_date`] with an explicit base timestamp.
pub fn advance(
    base: DateTime<FixedOffset>,
    interval: Option<u32>,
    unit: Option<RecurrenceUnit>,
    weekdays: Option<&[u8]>,
) -> Result<DateTime<FixedOffset>> {
    let (Some(interval), Some(unit)) = (interval, unit) else {
        return shift_days(base, 1);
    };
    let interval = i64::from(interval);

    match unit {
        RecurrenceUnit::Days => shift_days(base, interval),
        RecurrenceUnit::Weeks => match weekdays.filter(|days| !days.is_empty()) {
            Some(days) => {
                let current = i64::from(base.weekday().num_days_from_monday());
                shift_days(base, days_until_allowed_weekday(current, interval, days))
            }
            None => shift_days(base, interval * 7),
        },
        RecurrenceUnit::Months => add_months(base, interval),
        RecurrenceUnit::Years => add_years(base, interval),
    }
}

/// Days from weekday `current` to the next weekday in `days`. The cadence
/// only applies when wrapping past the last allowed day of the week.
fn days_until_allowed_weekday(current: i64, interval: i64, days: &[u8]) -> i64 {
    // Validated rows are already sorted and unique; rows edited outside the
    // crate may not be.
    let mut sorted = days.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    if let Some(&later) = sorted.iter().find(|&&d| i64::from(d) > current) {
        return i64::from(later) - current;
    }
    let first = sorted.first().copied().map(i64::from).unwrap_or(current);
    (7 - current) + (interval - 1) * 7 + first
}

fn shift_days(base: DateTime<FixedOffset>, days: i64) -> Result<DateTime<FixedOffset>> {
    let shifted = if days >= 0 {
        base.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        base.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or(Error::DateOutOfRange)
}

fn add_months(base: DateTime<FixedOffset>, interval: i64) -> Result<DateTime<FixedOffset>> {
    let date = base.date_naive();
    let months = i64::from(date.year()) * 12 + i64::from(date.month0()) + interval;
    let year = i32::try_from(months.div_euclid(12)).map_err(|_| Error::DateOutOfRange)?;
    // rem_euclid(12) is always in 0..12
    let month = months.rem_euclid(12) as u32 + 1;
    let last_day = days_in_month(year, month).ok_or(Error::DateOutOfRange)?;
    let target = NaiveDate::from_ymd_opt(year, month, date.day().min(last_day));
    with_date(base, target)
}

fn add_years(base: DateTime<FixedOffset>, interval: i64) -> Result<DateTime<FixedOffset>> {
    let date = base.date_naive();
    let year = i32::try_from(i64::from(date.year()) + interval).map_err(|_| Error::DateOutOfRange)?;
    let day = if date.month() == 2 && date.day() == 29 && !is_leap_year(year) {
        28
    } else {
        date.day()
    };
    with_date(base, NaiveDate::from_ymd_opt(year, date.month(), day))
}

/// Moves `base` onto `date`, keeping its wall-clock time and offset.
fn with_date(base: DateTime<FixedOffset>, date: Option<NaiveDate>) -> Result<DateTime<FixedOffset>> {
    let date = date.ok_or(Error::DateOutOfRange)?;
    base.timezone()
        .from_local_datetime(&date.and_time(base.time()))
        .single()
        .ok_or(Error::DateOutOfRange)
}

/// Number of days in `month` (1-12) of `year`.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    Some(NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()?.day())
}

pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Decides whether `template` should produce a task on `today`.
///
/// Never mutates the template; recording `last_generated_date` is the
/// generation job's job once the task is written.
pub fn should_generate_today(template: &RecurringTemplate, today: NaiveDate) -> bool {
    if !template.is_active || today < template.start_date {
        return false;
    }
    if template.end_date.is_some_and(|end| today > end) {
        return false;
    }
    if template.last_generated_date == Some(today) {
        return false;
    }

    match template.pattern {
        RecurrencePattern::Daily => true,
        RecurrencePattern::Weekly => {
            let weekday = today.weekday().num_days_from_monday();
            template
                .days_of_week
                .as_deref()
                .is_some_and(|days| days.iter().any(|&d| u32::from(d) == weekday))
        }
        RecurrencePattern::AlternateDays => match template.last_generated_date {
            None => true,
            Some(last) => (today - last).num_days() >= 2,
        },
    }
}

/// Due timestamp of the occurrence generated on `date`: the template's time
/// of day at its stored offset.
pub fn occurrence_due(template: &RecurringTemplate, date: NaiveDate) -> Result<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(template.utc_offset_secs).ok_or_else(|| {
        Error::Validation(format!(
            "template {} has invalid UTC offset {}s",
            template.id, template.utc_offset_secs
        ))
    })?;
    offset
        .from_local_datetime(&date.and_time(template.time_of_day))
        .single()
        .ok_or(Error::DateOutOfRange)
}

/// Lists up to `limit` upcoming dates, starting at `from`, on which the
/// template would fire if every occurrence were finished before the next
/// daily run. Paused templates are previewed as if resumed.
pub fn preview_occurrences(
    template: &RecurringTemplate,
    from: NaiveDate,
    limit: usize,
) -> Vec<NaiveDate> {
    let mut sim = template.clone();
    sim.is_active = true;

    let mut dates = Vec::with_capacity(limit);
    let mut day = from;
    for _ in 0..366 * limit.max(1) {
        if dates.len() >= limit || sim.end_date.is_some_and(|end| day > end) {
            break;
        }
        if should_generate_today(&sim, day) {
            dates.push(day);
            sim.last_generated_date = Some(day);
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn template(pattern: RecurrencePattern, days: Option<Vec<u8>>) -> RecurringTemplate {
        RecurringTemplate {
            id: 1,
            owner_id: 1,
            title: "Water plants".into(),
            description: None,
            project_id: 1,
            section_id: 1,
            priority_id: None,
            label_ids: Vec::new(),
            pattern,
            days_of_week: days,
            time_of_day: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            utc_offset_secs: 0,
            start_date: date(2024, 1, 1),
            end_date: None,
            last_generated_date: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_weekday_wrap_uses_first_allowed_day() {
        // Friday (4) with {1, 3}: wrap to next Tuesday
        assert_eq!(days_until_allowed_weekday(4, 1, &[3, 1]), 4);
        // Sunday (6) with {0}, every 3 weeks
        assert_eq!(days_until_allowed_weekday(6, 3, &[0]), 15);
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(2023, 2), Some(28));
        assert_eq!(days_in_month(2023, 12), Some(31));
        assert_eq!(days_in_month(2023, 4), Some(30));
    }

    #[test]
    fn test_missing_unit_falls_back_to_one_day() {
        let base = DateTime::parse_from_rfc3339("2024-03-10T08:30:00+02:00").unwrap();
        let next = advance(base, Some(3), None, None).unwrap();
        assert_eq!(next, DateTime::parse_from_rfc3339("2024-03-11T08:30:00+02:00").unwrap());
    }

    #[test]
    fn test_offset_is_preserved() {
        let base = DateTime::parse_from_rfc3339("2024-01-31T23:30:00-05:00").unwrap();
        let next = advance(base, Some(1), Some(RecurrenceUnit::Months), None).unwrap();
        assert_eq!(next.to_rfc3339(), "2024-02-29T23:30:00-05:00");
    }

    #[test]
    fn test_weekly_with_empty_days_never_fires() {
        let tmpl = template(RecurrencePattern::Weekly, Some(Vec::new()));
        assert!(!should_generate_today(&tmpl, date(2024, 1, 15)));
    }

    #[test]
    fn test_window_guards() {
        let mut tmpl = template(RecurrencePattern::Daily, None);
        tmpl.start_date = date(2024, 2, 1);
        tmpl.end_date = Some(date(2024, 2, 10));
        assert!(!should_generate_today(&tmpl, date(2024, 1, 31)));
        assert!(should_generate_today(&tmpl, date(2024, 2, 1)));
        assert!(should_generate_today(&tmpl, date(2024, 2, 10)));
        assert!(!should_generate_today(&tmpl, date(2024, 2, 11)));

        tmpl.last_generated_date = Some(date(2024, 2, 5));
        assert!(!should_generate_today(&tmpl, date(2024, 2, 5)));

        tmpl.is_active = false;
        assert!(!should_generate_today(&tmpl, date(2024, 2, 6)));
    }

    #[test]
    fn test_occurrence_due_uses_template_offset() {
        let mut tmpl = template(RecurrencePattern::Daily, None);
        tmpl.utc_offset_secs = 3600;
        let due = occurrence_due(&tmpl, date(2025, 1, 13)).unwrap();
        assert_eq!(due.to_rfc3339(), "2025-01-13T09:00:00+01:00");

        tmpl.utc_offset_secs = 90_000;
        assert!(matches!(occurrence_due(&tmpl, date(2025, 1, 13)), Err(Error::Validation(_))));
    }

    #[test]
    fn test_preview_alternate_days() {
        let tmpl = template(RecurrencePattern::AlternateDays, None);
        let dates = preview_occurrences(&tmpl, date(2024, 1, 1), 3);
        assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 3), date(2024, 1, 5)]);
    }

    #[test]
    fn test_preview_stops_at_end_date() {
        let mut tmpl = template(RecurrencePattern::Weekly, Some(vec![0]));
        tmpl.end_date = Some(date(2024, 1, 20));
        let dates = preview_occurrences(&tmpl, date(2024, 1, 1), 10);
        assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)]);
    }
}

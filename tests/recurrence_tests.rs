use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use taskcadence::models::{RecurrencePattern, RecurrenceUnit, RecurringTemplate};
use taskcadence::recurrence::{advance, next_due_date, preview_occurrences, should_generate_today};

fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn weeks(base: &str, interval: u32, days: &[u8]) -> DateTime<FixedOffset> {
    advance(at(base), Some(interval), Some(RecurrenceUnit::Weeks), Some(days)).unwrap()
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
        label_ids: vec![],
        pattern,
        days_of_week: days,
        time_of_day: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        utc_offset_secs: 0,
        start_date: date("2024-01-01"),
        end_date: None,
        last_generated_date: None,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn test_weekday_set_from_monday() {
    // 2024-01-15 is a Monday
    assert_eq!(weeks("2024-01-15T10:30:00+00:00", 1, &[2]), at("2024-01-17T10:30:00+00:00"));
    assert_eq!(weeks("2024-01-15T10:30:00+00:00", 1, &[0]), at("2024-01-22T10:30:00+00:00"));
    assert_eq!(weeks("2024-01-15T10:30:00+00:00", 1, &[2, 4]), at("2024-01-17T10:30:00+00:00"));
}

#[test]
fn test_every_two_weeks_wraps_a_full_cycle() {
    assert_eq!(weeks("2024-01-15T08:00:00+00:00", 2, &[0]), at("2024-01-29T08:00:00+00:00"));
    assert_eq!(weeks("2024-01-15T08:00:00+00:00", 2, &[2]), at("2024-01-17T08:00:00+00:00"));
}

#[test]
fn test_weekday_wrap_to_earlier_day() {
    // Friday with {Mon, Wed}: first allowed day of the next cycle
    assert_eq!(weeks("2024-01-19T08:00:00+00:00", 1, &[0, 2]), at("2024-01-22T08:00:00+00:00"));
    assert_eq!(weeks("2024-01-19T08:00:00+00:00", 3, &[0, 2]), at("2024-02-05T08:00:00+00:00"));
}

#[test]
fn test_month_clamp_without_rollover() {
    let months = |base: &str, n| advance(at(base), Some(n), Some(RecurrenceUnit::Months), None).unwrap();
    assert_eq!(months("2024-01-31T12:00:00+00:00", 1), at("2024-02-29T12:00:00+00:00"));
    assert_eq!(months("2023-01-31T12:00:00+00:00", 1), at("2023-02-28T12:00:00+00:00"));
    assert_eq!(months("2024-01-31T12:00:00+00:00", 3), at("2024-04-30T12:00:00+00:00"));
    assert_eq!(months("2024-11-30T12:00:00+00:00", 3), at("2025-02-28T12:00:00+00:00"));
}

#[test]
fn test_year_feb_29_clamp() {
    let years = |n| {
        advance(at("2024-02-29T07:15:00+00:00"), Some(n), Some(RecurrenceUnit::Years), None).unwrap()
    };
    assert_eq!(years(1), at("2025-02-28T07:15:00+00:00"));
    assert_eq!(years(4), at("2028-02-29T07:15:00+00:00"));
}

#[test]
fn test_offset_is_preserved() {
    let next = advance(at("2024-03-30T23:30:00+05:30"), Some(1), Some(RecurrenceUnit::Days), None).unwrap();
    assert_eq!(next.to_rfc3339(), "2024-03-31T23:30:00+05:30");
}

#[test]
fn test_missing_rule_falls_back_to_one_day() {
    let next = next_due_date(Some(at("2024-12-31T09:00:00+00:00")), None, Some(RecurrenceUnit::Weeks), None)
        .unwrap();
    assert_eq!(next, at("2025-01-01T09:00:00+00:00"));
}

#[test]
fn test_no_current_due_starts_from_now() {
    let before = Utc::now();
    let next = next_due_date(None, Some(1), Some(RecurrenceUnit::Days), None).unwrap();
    assert!(next > before + chrono::Duration::hours(23));
}

#[test]
fn test_alternate_days_gap() {
    let today = date("2024-06-10");
    let mut tmpl = template(RecurrencePattern::AlternateDays, None);
    tmpl.last_generated_date = Some(date("2024-06-09"));
    assert!(!should_generate_today(&tmpl, today));
    tmpl.last_generated_date = Some(date("2024-06-08"));
    assert!(should_generate_today(&tmpl, today));
}

#[test]
fn test_weekly_template_eligibility() {
    let tmpl = template(RecurrencePattern::Weekly, Some(vec![0, 4]));
    assert!(should_generate_today(&tmpl, date("2025-01-13"))); // Monday
    assert!(!should_generate_today(&tmpl, date("2025-01-14")));
    assert!(should_generate_today(&tmpl, date("2025-01-17"))); // Friday
}

#[test]
fn test_window_and_pause() {
    let mut tmpl = template(RecurrencePattern::Daily, None);
    tmpl.start_date = date("2024-06-10");
    tmpl.end_date = Some(date("2024-06-12"));
    assert!(!should_generate_today(&tmpl, date("2024-06-09")));
    assert!(should_generate_today(&tmpl, date("2024-06-12")));
    assert!(!should_generate_today(&tmpl, date("2024-06-13")));

    tmpl.is_active = false;
    assert!(!should_generate_today(&tmpl, date("2024-06-11")));
}

#[test]
fn test_preview_alternate_days() {
    let tmpl = template(RecurrencePattern::AlternateDays, None);
    let dates = preview_occurrences(&tmpl, date("2024-06-10"), 3);
    assert_eq!(dates, vec![date("2024-06-10"), date("2024-06-12"), date("2024-06-14")]);
}

#[test]
fn test_unsorted_weekday_set_still_finds_nearest_day() {
    // Rows edited by hand may carry an unsorted set with repeats.
    assert_eq!(weeks("2024-01-15T08:00:00+00:00", 1, &[4, 2, 2]), at("2024-01-17T08:00:00+00:00"));
    assert_eq!(weeks("2024-01-19T08:00:00+00:00", 2, &[3, 1, 3]), at("2024-01-30T08:00:00+00:00"));
}

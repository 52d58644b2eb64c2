//! Daily trigger for the generation job.
//!
//! One loop, one fixed wall-clock time. Running two of these against the
//! same store is not serialized; deploy a single instance.

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use tracing::{debug, error, info};

use crate::config::ScheduleConfig;
use crate::error::{Error, Result};
use crate::generation::{generate_all, GenerationReport, GenerationSettings};
use crate::storage::JsonStore;

/// Fires once a day at `hour:minute` local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    pub hour: u8,
    pub minute: u8,
}

impl fmt::Display for DailyTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "daily at {:02}:{:02}", self.hour, self.minute)
    }
}

impl From<&ScheduleConfig> for DailyTrigger {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            hour: config.hour,
            minute: config.minute,
        }
    }
}

impl DailyTrigger {
    /// First firing instant strictly after `now`. Days where the time does
    /// not exist (DST gap) are skipped; ambiguous times fire on the earlier one.
    pub fn next_fire_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let time = NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)?;
        let tz = now.timezone();
        let mut day = now.date_naive();
        for _ in 0..3 {
            if let Some(at) = tz.from_local_datetime(&day.and_time(time)).earliest() {
                if at > *now {
                    return Some(at);
                }
            }
            day = day.succ_opt()?;
        }
        None
    }
}

/// Runs [`generate_all`] for today on a blocking thread. Failures are
/// logged here, since this is the last place that sees them.
pub async fn run_once(store: &JsonStore, settings: &GenerationSettings) -> Option<GenerationReport> {
    let store = store.clone();
    let settings = settings.clone();
    match tokio::task::spawn_blocking(move || generate_all(&store, None, &settings)).await {
        Ok(Ok(report)) => Some(report),
        Ok(Err(e)) => {
            error!("daily generation failed: {e}");
            None
        }
        Err(e) => {
            error!("daily generation task did not finish: {e}");
            None
        }
    }
}

/// Resolves when `signal` does. A signal source that fails to register
/// also resolves, after logging why the scheduler is stopping.
pub async fn wait_for_shutdown<F, E>(signal: F)
where
    F: Future<Output = std::result::Result<(), E>>,
    E: fmt::Display,
{
    if let Err(e) = signal.await {
        error!("cannot listen for shutdown signal, stopping scheduler: {e}");
    }
}

/// Sleeps until each firing time and runs the generation job, until
/// `shutdown` resolves.
pub async fn run_daily<F>(
    store: JsonStore,
    trigger: DailyTrigger,
    settings: GenerationSettings,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!("scheduler started, generating {trigger}");

    loop {
        let now = Local::now();
        let next = trigger.next_fire_after(&now).ok_or(Error::DateOutOfRange)?;
        let wait = (next - now).to_std().unwrap_or_default();
        debug!("next generation run at {}", next.to_rfc3339());

        tokio::select! {
            _ = &mut shutdown => {
                info!("scheduler stopping");
                return Ok(());
            }
            _ = tokio::time::sleep(wait) => {}
        }

        if let Some(report) = run_once(&store, &settings).await {
            debug!(
                "run for {} generated {} tasks in {:?}",
                report.target_date, report.generated, report.elapsed
            );
        }
    }
}

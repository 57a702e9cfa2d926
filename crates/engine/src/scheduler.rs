//! Scheduler: drives the pipeline on a cron cadence plus one run at startup.
//!
//! Cycles are serialized by a run-lock: a trigger that fires while a cycle is
//! still running is skipped rather than queued.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::Mutex;

use lootwatch_common::error::AppError;

use crate::pipeline::{CycleReport, NotificationPipeline};

/// Parse a cron expression.
///
/// Accepts the classic 5-field form (`MIN HOUR DOM MON DOW`), which is run at
/// second 0, as well as the 6/7-field form with seconds (and year).
///
/// The two forms number weekdays differently. Classic cron uses 0-7 with both
/// 0 and 7 meaning Sunday; the 6/7-field form uses 1-7 starting at Sunday.
/// Numeric days in a 5-field expression are translated accordingly.
pub fn parse_schedule(expression: &str) -> Result<Schedule, AppError> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let normalized = match fields.len() {
        5 => {
            let day_of_week = classic_day_of_week(fields[4]).map_err(|e| {
                AppError::Config(format!("Invalid cron expression '{}': {}", expression, e))
            })?;
            format!("0 {} {}", fields[..4].join(" "), day_of_week)
        }
        6 | 7 => fields.join(" "),
        _ => {
            return Err(AppError::Config(format!(
                "Invalid cron expression '{}': expected 5, 6 or 7 fields, got {}",
                expression,
                fields.len()
            )));
        }
    };

    Schedule::from_str(&normalized)
        .map_err(|e| AppError::Config(format!("Invalid cron expression '{}': {}", expression, e)))
}

/// Translate a classic day-of-week field (0-7, Sunday = 0 or 7) into the
/// 1-7 numbering (Sunday = 1). Named days and `*` pass through unchanged.
///
/// Ranges and steps are expanded into an explicit list, so `5-7` (Friday to
/// Sunday) stays correct even though it wraps in the target numbering.
fn classic_day_of_week(field: &str) -> Result<String, String> {
    let mut days: Vec<u8> = Vec::new();
    let mut passthrough: Vec<&str> = Vec::new();

    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u8 = step
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| format!("invalid day-of-week step in '{}'", item))?;
                (range, Some(step))
            }
            None => (item, None),
        };

        if range.chars().any(|c| c.is_ascii_alphabetic()) || (range == "*" && step.is_none()) {
            passthrough.push(item);
            continue;
        }

        let (start, end) = if range == "*" {
            (0, 6)
        } else if let Some((a, b)) = range.split_once('-') {
            (classic_day(a)?, classic_day(b)?)
        } else {
            let day = classic_day(range)?;
            // `n/step` runs from n to the end of the week
            (day, if step.is_some() { 6 } else { day })
        };

        if start > end {
            return Err(format!("day-of-week range '{}' is reversed", item));
        }

        let step = usize::from(step.unwrap_or(1));
        for day in (start..=end).step_by(step) {
            // 0 and 7 are both Sunday
            let mapped = if day == 7 { 1 } else { day + 1 };
            if !days.contains(&mapped) {
                days.push(mapped);
            }
        }
    }

    days.sort_unstable();
    let mut items: Vec<String> = days.iter().map(u8::to_string).collect();
    items.extend(passthrough.iter().map(|s| s.to_string()));
    Ok(items.join(","))
}

fn classic_day(value: &str) -> Result<u8, String> {
    value
        .parse::<u8>()
        .ok()
        .filter(|d| *d <= 7)
        .ok_or_else(|| format!("'{}' is not a day of week (0-7)", value))
}

/// Parse an IANA timezone name (e.g., "Europe/Rome").
pub fn parse_timezone(name: &str) -> Result<Tz, AppError> {
    name.parse()
        .map_err(|_| AppError::Config(format!("'{}' is not a valid IANA timezone", name)))
}

pub struct Scheduler {
    pipeline: Arc<NotificationPipeline>,
    schedule: Schedule,
    timezone: Tz,
    startup_delay: Duration,
    run_lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<NotificationPipeline>,
        schedule: Schedule,
        timezone: Tz,
        startup_delay: Duration,
    ) -> Self {
        Self {
            pipeline,
            schedule,
            timezone,
            startup_delay,
            run_lock: Mutex::new(()),
        }
    }

    /// Time to wait until the next scheduled fire, or `None` if the schedule
    /// has no future occurrence.
    pub fn until_next_fire(&self) -> Option<Duration> {
        let next = self.schedule.upcoming(self.timezone).next()?;
        let wait = next.with_timezone(&Utc) - Utc::now();
        Some(wait.to_std().unwrap_or(Duration::ZERO))
    }

    /// Run one cycle unless another is already in progress.
    pub async fn run_guarded(&self) -> Option<CycleReport> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            tracing::warn!("Previous cycle still running, skipping this trigger");
            return None;
        };

        Some(self.pipeline.run_cycle().await)
    }

    /// Start the scheduling loop. Runs until the task is cancelled or the
    /// schedule is exhausted.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            timezone = %self.timezone,
            startup_delay_secs = self.startup_delay.as_secs(),
            "Scheduler started"
        );

        let startup = Arc::clone(&self);
        tokio::spawn(async move {
            tokio::time::sleep(startup.startup_delay).await;
            tracing::info!("Running startup check");
            startup.run_guarded().await;
        });

        loop {
            let Some(wait) = self.until_next_fire() else {
                tracing::warn!("Schedule has no upcoming occurrences, scheduler stopping");
                return;
            };

            tracing::info!(
                next_in_secs = wait.as_secs(),
                "Waiting for next scheduled check"
            );
            tokio::time::sleep(wait).await;

            tracing::info!("Running scheduled check");
            self.run_guarded().await;
        }
    }
}

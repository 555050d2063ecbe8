// src/schedule/mod.rs
//! Daily recurrence in a fixed reference timezone, driven by a cooperative
//! poll loop.
//!
//! Phases: `Idle → Armed → Firing → Armed → … → Idle` (shutdown).
//! Only one job is ever in flight; the loop awaits it before polling again.

pub mod clock;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::ConfigError;
use clock::Clock;

/// Business timezone of the trigger time (Philippine Standard Time).
/// Policy constant: no DST, never inferred from the host.
pub const REFERENCE_UTC_OFFSET_HOURS: i32 = 8;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Countdown logging cadence.
const COUNTDOWN_LOG_EVERY_SECS: i64 = 3600;

/// Wall-clock `HH:MM` of the daily trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime {
    hour: u32,
    minute: u32,
}

impl DailyTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for DailyTime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::InvalidScheduleTime(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
        let two_digits = |p: &str| p.len() == 2 && p.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(h) || !two_digits(m) {
            return Err(bad());
        }
        let hour = h.parse().map_err(|_| bad())?;
        let minute = m.parse().map_err(|_| bad())?;
        DailyTime::new(hour, minute).ok_or_else(bad)
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The reference timezone and its conversion to execution time.
/// Swap this type if the region's offset rules ever change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone {
    offset: FixedOffset,
}

impl ReferenceZone {
    pub fn from_hours(hours: i32) -> Result<Self, ConfigError> {
        hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or(ConfigError::InvalidOffset(hours))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Execution instant → reference civil time.
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// Reference civil time → execution instant.
    pub fn to_execution(&self, t: DateTime<FixedOffset>) -> DateTime<Utc> {
        t.with_timezone(&Utc)
    }
}

impl Default for ReferenceZone {
    fn default() -> Self {
        Self::from_hours(REFERENCE_UTC_OFFSET_HOURS).expect("reference offset constant")
    }
}

/// Next trigger strictly after `now`, in `now`'s timezone. A trigger equal to
/// `now` has already fired and moves to the next day.
pub fn compute_next_run(trigger: DailyTime, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let tz = *now.offset();
    let local = now.date_naive().and_time(trigger.as_naive_time());
    let utc = local - ChronoDuration::seconds(i64::from(tz.local_minus_utc()));
    let today = DateTime::<FixedOffset>::from_naive_utc_and_offset(utc, tz);
    if today <= now {
        today + ChronoDuration::days(1)
    } else {
        today
    }
}

/// Human countdown like `13h 05m`.
pub fn format_remaining(d: ChronoDuration) -> String {
    let mins = d.num_minutes().max(0);
    format!("{}h {:02}m", mins / 60, mins % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Armed,
    Firing,
}

/// Everything the scheduler mutates. Owned by one `Scheduler`.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    pub trigger: DailyTime,
    pub phase: Phase,
    pub next_run: Option<DateTime<Utc>>,
    pub runs: u64,
    last_countdown_log: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Job: Send + Sync {
    async fn execute(&self);
}

#[derive(Debug, Clone)]
pub struct SchedulerCfg {
    pub trigger: DailyTime,
    pub zone: ReferenceZone,
    pub poll_interval: Duration,
    pub run_on_startup: bool,
}

impl SchedulerCfg {
    pub fn daily_at(trigger: DailyTime) -> Self {
        Self {
            trigger,
            zone: ReferenceZone::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            run_on_startup: true,
        }
    }
}

pub struct Scheduler<C: Clock> {
    cfg: SchedulerCfg,
    clock: C,
    state: ScheduleState,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(cfg: SchedulerCfg, clock: C) -> Self {
        let state = ScheduleState {
            trigger: cfg.trigger,
            phase: Phase::Idle,
            next_run: None,
            runs: 0,
            last_countdown_log: None,
        };
        Self { cfg, clock, state }
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    /// Compute and store the next trigger instant. `Idle|Firing → Armed`.
    pub fn arm(&mut self) -> DateTime<Utc> {
        let now_ref = self.cfg.zone.localize(self.clock.now());
        let next_ref = compute_next_run(self.cfg.trigger, now_ref);
        let next = self.cfg.zone.to_execution(next_ref);
        self.state.next_run = Some(next);
        self.state.phase = Phase::Armed;
        tracing::info!(
            target: "schedule",
            next_run_reference = %next_ref,
            next_run_utc = %next,
            "next run scheduled"
        );
        next
    }

    async fn fire(&mut self, job: &dyn Job) {
        self.state.phase = Phase::Firing;
        self.state.runs += 1;
        job.execute().await;
    }

    /// Run the job if it is due. Returns whether it ran.
    pub async fn run_pending(&mut self, job: &dyn Job) -> bool {
        let now = self.clock.now();
        match (self.state.phase, self.state.next_run) {
            (Phase::Armed, Some(due)) if now >= due => {
                tracing::info!(target: "schedule", due = %due, "scheduled run starting");
                self.fire(job).await;
                self.arm();
                true
            }
            _ => false,
        }
    }

    /// Log time-to-next-run, at most once per hour. Returns whether it logged.
    pub fn log_countdown(&mut self) -> bool {
        let now = self.clock.now();
        let Some(next) = self.state.next_run else {
            return false;
        };
        let due = match self.state.last_countdown_log {
            None => true,
            Some(last) => now - last >= ChronoDuration::seconds(COUNTDOWN_LOG_EVERY_SECS),
        };
        if due {
            tracing::info!(
                target: "schedule",
                remaining = %format_remaining(next - now),
                next_run_utc = %next,
                "waiting for next run"
            );
            self.state.last_countdown_log = Some(now);
        }
        due
    }

    /// Bootstrap run, then poll until `shutdown` turns true (or its sender
    /// goes away). Returns the final state.
    pub async fn run(mut self, job: &dyn Job, mut shutdown: watch::Receiver<bool>) -> ScheduleState {
        tracing::info!(
            target: "schedule",
            trigger = %self.cfg.trigger,
            utc_offset = %self.cfg.zone.offset(),
            poll_secs = self.cfg.poll_interval.as_secs(),
            "scheduler started"
        );

        // Armed before the bootstrap run, so a trigger passed during it
        // fires on the first poll.
        self.arm();
        if self.cfg.run_on_startup {
            tracing::info!(target: "schedule", "bootstrap run");
            self.fire(job).await;
            self.state.phase = Phase::Armed;
        }

        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }
            self.run_pending(job).await;
            self.log_countdown();

            tokio::select! {
                _ = tokio::time::sleep(self.cfg.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.state.phase = Phase::Idle;
        tracing::info!(target: "schedule", runs = self.state.runs, "scheduler stopped");
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::clock::ManualClock;
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pht() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
        pht().with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn eight() -> DailyTime {
        "08:00".parse().unwrap()
    }

    #[test]
    fn exact_match_defers_to_tomorrow() {
        let next = compute_next_run(eight(), at(2025, 9, 25, 8, 0, 0));
        assert_eq!(next, at(2025, 9, 26, 8, 0, 0));
    }

    #[test]
    fn one_second_before_is_today() {
        let next = compute_next_run(eight(), at(2025, 9, 25, 7, 59, 59));
        assert_eq!(next, at(2025, 9, 25, 8, 0, 0));
    }

    #[test]
    fn rolls_over_month_and_year_end() {
        assert_eq!(
            compute_next_run(eight(), at(2025, 9, 30, 9, 0, 0)),
            at(2025, 10, 1, 8, 0, 0)
        );
        assert_eq!(
            compute_next_run(eight(), at(2025, 12, 31, 23, 59, 0)),
            at(2026, 1, 1, 8, 0, 0)
        );
    }

    #[test]
    fn reference_conversion_is_explicit_utc_shift() {
        let zone = ReferenceZone::default();
        let utc = zone.to_execution(at(2025, 9, 25, 8, 0, 0));
        assert_eq!(utc, Utc.with_ymd_and_hms(2025, 9, 25, 0, 0, 0).unwrap());
        // 23:30 UTC is already the next civil day in the reference zone.
        let local = zone.localize(Utc.with_ymd_and_hms(2025, 9, 24, 23, 30, 0).unwrap());
        assert_eq!(local, at(2025, 9, 25, 7, 30, 0));
    }

    #[test]
    fn daily_time_parsing() {
        assert_eq!("08:00".parse::<DailyTime>().unwrap(), DailyTime::new(8, 0).unwrap());
        assert_eq!(" 23:59 ".parse::<DailyTime>().unwrap().to_string(), "23:59");
        for bad in ["24:00", "08:60", "8", "8:00", "+8:00", "08:+5", "08-00", "", "ab:cd"] {
            assert!(bad.parse::<DailyTime>().is_err(), "{bad}");
        }
    }

    #[test]
    fn offset_out_of_range_is_rejected() {
        assert!(ReferenceZone::from_hours(8).is_ok());
        assert!(matches!(
            ReferenceZone::from_hours(30),
            Err(ConfigError::InvalidOffset(30))
        ));
    }

    #[test]
    fn remaining_is_formatted_in_hours_and_minutes() {
        assert_eq!(format_remaining(ChronoDuration::minutes(785)), "13h 05m");
        assert_eq!(format_remaining(ChronoDuration::seconds(-5)), "0h 00m");
    }

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Job for CountingJob {
        async fn execute(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn scheduler(clock: ManualClock) -> Scheduler<ManualClock> {
        let mut cfg = SchedulerCfg::daily_at(eight());
        cfg.run_on_startup = false;
        Scheduler::new(cfg, clock)
    }

    #[tokio::test]
    async fn due_tick_fires_once_and_rearms() {
        let clock = ManualClock::new(at(2025, 9, 25, 7, 59, 0).with_timezone(&Utc));
        let mut s = scheduler(clock.clone());
        let job = CountingJob::default();

        assert_eq!(s.state().phase, Phase::Idle);
        let first = s.arm();
        assert_eq!(s.state().phase, Phase::Armed);
        assert!(!s.run_pending(&job).await);

        clock.set(first);
        assert!(s.run_pending(&job).await);
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert_eq!(
            s.state().next_run,
            Some(at(2025, 9, 26, 8, 0, 0).with_timezone(&Utc))
        );

        // Same instant polled again: no re-fire.
        assert!(!s.run_pending(&job).await);
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn countdown_logs_at_most_hourly() {
        let clock = ManualClock::new(at(2025, 9, 25, 1, 0, 0).with_timezone(&Utc));
        let mut s = scheduler(clock.clone());
        assert!(!s.log_countdown());
        s.arm();
        assert!(s.log_countdown());
        clock.advance(ChronoDuration::minutes(59));
        assert!(!s.log_countdown());
        clock.advance(ChronoDuration::minutes(1));
        assert!(s.log_countdown());
    }
}

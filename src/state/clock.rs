//! Wall-clock abstraction and the phase timer arithmetic built on top of it.
//!
//! The timer never runs in the background: every value is derived from the
//! persisted fields and the current time whenever someone asks.

use std::{
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::dao::models::{Phase, SessionDocument, TimerStatus};

/// Source of the current Unix time in whole seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_epoch(&self) -> i64;
}

/// Clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or_default()
    }
}

/// Manually driven clock for deterministic tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock(std::sync::atomic::AtomicI64);

#[cfg(test)]
impl ManualClock {
    pub fn at(epoch: i64) -> Self {
        Self(std::sync::atomic::AtomicI64::new(epoch))
    }

    pub fn set(&self, epoch: i64) {
        self.0.store(epoch, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.0.fetch_add(seconds, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_epoch(&self) -> i64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Timer operations over the timer fields of a [`SessionDocument`].
#[derive(Debug, Clone)]
pub struct PhaseClock {
    clock: Arc<dyn Clock>,
}

impl Default for PhaseClock {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl PhaseClock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Current Unix time according to the injected clock.
    pub fn now(&self) -> i64 {
        self.clock.now_epoch()
    }

    /// Start or resume the timer. Starting a running timer keeps its stretch.
    pub fn start(&self, doc: &mut SessionDocument) {
        if doc.timer.status == TimerStatus::Running {
            return;
        }
        doc.timer.status = TimerStatus::Running;
        doc.timer.start_epoch = Some(self.now());
    }

    /// Fold the running stretch into the accumulated seconds and pause.
    /// Only a running timer can be paused.
    pub fn pause(&self, doc: &mut SessionDocument) {
        if doc.timer.status != TimerStatus::Running {
            return;
        }
        doc.timer.elapsed_seconds = self.elapsed(doc);
        doc.timer.status = TimerStatus::Paused;
        doc.timer.start_epoch = None;
    }

    /// Stop the timer and forget all elapsed time.
    pub fn reset(&self, doc: &mut SessionDocument) {
        doc.timer.status = TimerStatus::Stopped;
        doc.timer.start_epoch = None;
        doc.timer.elapsed_seconds = 0;
    }

    /// Effective elapsed seconds in the current phase.
    ///
    /// A start epoch in the future (clock skew) counts as zero.
    pub fn elapsed(&self, doc: &SessionDocument) -> i64 {
        let accumulated = doc.timer.elapsed_seconds.max(0);
        match (doc.timer.status, doc.timer.start_epoch) {
            (TimerStatus::Running, Some(start)) => {
                accumulated + (self.now() - start).max(0)
            }
            _ => accumulated,
        }
    }

    /// Configured length of the current phase in seconds.
    pub fn duration_seconds(&self, doc: &SessionDocument) -> i64 {
        i64::from(doc.timer.minutes_for(doc.phase)) * 60
    }

    /// Seconds left in the current phase, never negative. Untimed phases have none.
    pub fn remaining(&self, doc: &SessionDocument) -> i64 {
        if doc.phase == Phase::Result {
            return 0;
        }
        (self.duration_seconds(doc) - self.elapsed(doc)).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_document;

    fn setup() -> (Arc<ManualClock>, PhaseClock, SessionDocument) {
        let manual = Arc::new(ManualClock::at(1_000));
        let clock = PhaseClock::new(manual.clone());
        let doc = sample_document("clock", 20);
        (manual, clock, doc)
    }

    #[test]
    fn stopped_timer_reports_full_duration() {
        let (manual, clock, doc) = setup();
        assert_eq!(clock.remaining(&doc), 600);
        manual.advance(120);
        assert_eq!(clock.remaining(&doc), 600);
    }

    #[test]
    fn remaining_decreases_while_running_and_bottoms_out() {
        let (manual, clock, mut doc) = setup();
        clock.start(&mut doc);

        let mut previous = clock.remaining(&doc);
        for _ in 0..15 {
            manual.advance(50);
            let now = clock.remaining(&doc);
            assert!(now <= previous);
            assert!(now >= 0);
            previous = now;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn paused_timer_is_frozen_and_resumes_where_it_stopped() {
        let (manual, clock, mut doc) = setup();
        clock.start(&mut doc);
        manual.advance(90);
        clock.pause(&mut doc);
        let frozen = clock.remaining(&doc);
        assert_eq!(frozen, 510);

        manual.advance(300);
        assert_eq!(clock.remaining(&doc), frozen);

        clock.start(&mut doc);
        assert_eq!(clock.remaining(&doc), frozen);
        manual.advance(10);
        assert_eq!(clock.remaining(&doc), frozen - 10);
    }

    #[test]
    fn pausing_an_idle_timer_changes_nothing() {
        let (manual, clock, mut doc) = setup();
        clock.pause(&mut doc);
        assert_eq!(doc.timer.status, TimerStatus::Stopped);
        assert_eq!(doc.timer.start_epoch, None);

        clock.start(&mut doc);
        manual.advance(40);
        clock.pause(&mut doc);
        manual.advance(40);
        clock.pause(&mut doc);
        assert_eq!(doc.timer.status, TimerStatus::Paused);
        assert_eq!(clock.elapsed(&doc), 40);
    }

    #[test]
    fn starting_twice_keeps_the_original_stretch() {
        let (manual, clock, mut doc) = setup();
        clock.start(&mut doc);
        manual.advance(30);
        clock.start(&mut doc);
        assert_eq!(clock.elapsed(&doc), 30);
    }

    #[test]
    fn reset_restores_full_duration() {
        let (manual, clock, mut doc) = setup();
        clock.start(&mut doc);
        manual.advance(200);
        clock.reset(&mut doc);
        assert_eq!(doc.timer.status, TimerStatus::Stopped);
        assert_eq!(clock.remaining(&doc), 600);
    }

    #[test]
    fn future_start_epoch_counts_as_zero() {
        let (manual, clock, mut doc) = setup();
        clock.start(&mut doc);
        manual.set(500);
        assert_eq!(clock.elapsed(&doc), 0);
        assert_eq!(clock.remaining(&doc), 600);
    }

    #[test]
    fn result_phase_has_no_time() {
        let (_manual, clock, mut doc) = setup();
        doc.phase = Phase::Result;
        assert_eq!(clock.remaining(&doc), 0);
    }

    #[test]
    fn phases_use_their_own_duration() {
        let (_manual, clock, mut doc) = setup();
        doc.timer.order_minutes = 12;
        doc.timer.diplomacy_minutes = 7;
        assert_eq!(clock.remaining(&doc), 720);
        doc.phase = Phase::Diplomacy;
        assert_eq!(clock.remaining(&doc), 420);
    }
}

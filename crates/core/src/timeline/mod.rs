use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

/// Millisecond time source shared by every timer in the engine.
pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since the clock was created.
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock for deterministic playback and tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// One-shot alarm: [`Alarm::alarm`] reports true once the armed interval has
/// elapsed, and is always true while unarmed.
#[derive(Clone)]
pub struct Alarm {
    clock: Arc<dyn Clock>,
    deadline_ms: Option<u64>,
}

impl Alarm {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            deadline_ms: None,
        }
    }

    pub fn set_alarm(&mut self, interval_ms: u64) {
        self.deadline_ms = Some(self.clock.now_ms().saturating_add(interval_ms));
    }

    pub fn alarm(&self) -> bool {
        self.deadline_ms
            .map(|deadline| self.clock.now_ms() >= deadline)
            .unwrap_or(true)
    }

    /// Milliseconds left before the alarm fires, zero once elapsed.
    pub fn remaining_ms(&self) -> u64 {
        self.deadline_ms
            .map(|deadline| deadline.saturating_sub(self.clock.now_ms()))
            .unwrap_or(0)
    }
}

impl fmt::Debug for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alarm")
            .field("deadline_ms", &self.deadline_ms)
            .finish()
    }
}

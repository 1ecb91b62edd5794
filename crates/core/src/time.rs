use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

//
// ─── ELAPSED TIME ──────────────────────────────────────────────────────────────
//

/// Accumulates wall-clock time across start/stop cycles.
///
/// `start` while running and `stop` while stopped are no-ops. Time read from a
/// clock that moved backwards counts as zero.
#[derive(Debug, Clone)]
pub struct ClockTracker {
    clock: Clock,
    accumulated: Duration,
    running_since: Option<DateTime<Utc>>,
}

impl ClockTracker {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self::with_elapsed(clock, Duration::zero())
    }

    /// A stopped tracker that already holds `elapsed`, e.g. from a resumed snapshot.
    #[must_use]
    pub fn with_elapsed(clock: Clock, elapsed: Duration) -> Self {
        Self {
            clock,
            accumulated: elapsed.max(Duration::zero()),
            running_since: None,
        }
    }

    pub fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(self.clock.now());
        }
    }

    pub fn stop(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += self.span_from(since);
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self.running_since {
            Some(since) => self.accumulated + self.span_from(since),
            None => self.accumulated,
        }
    }

    /// Whole elapsed seconds, as persisted in snapshots.
    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        u64::try_from(self.elapsed().num_seconds()).unwrap_or(0)
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Mutable access to the clock, so fixed clocks can be advanced in tests.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    fn span_from(&self, since: DateTime<Utc>) -> Duration {
        (self.clock.now() - since).max(Duration::zero())
    }
}

/// Render a duration as zero-padded `HH:MM:SS`.
///
/// Hours keep counting past 24; negative durations render as `00:00:00`.
#[must_use]
pub fn format_elapsed(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

//! Time sources for the wait engine.
//!
//! Waiting is the only place the core suspends, so every deadline goes
//! through a [`Clock`]. Production uses [`SystemClock`]; tests use
//! [`FakeClock`], whose `sleep` advances virtual time instantly so deadline
//! behaviour can be checked to the millisecond without real sleeping.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time plus a blocking sleep
pub trait Clock: std::fmt::Debug + Send + Sync {
    /// Time since the clock's origin
    fn now(&self) -> Duration;

    /// Block the current thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Thread-safe clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time with OS-level sleeping
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Shared handle to a new system clock
    #[must_use]
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock for deterministic tests
#[derive(Debug, Default)]
pub struct FakeClock {
    /// Virtual time in nanoseconds since origin
    now_ns: AtomicU64,
    /// Number of `sleep` calls
    sleeps: AtomicUsize,
}

impl FakeClock {
    /// Create a clock at time zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to a new fake clock
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Move virtual time forward without counting a sleep
    pub fn advance(&self, duration: Duration) {
        let _ = self
            .now_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Virtual time in milliseconds
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst) / 1_000_000
    }

    /// How many times `sleep` has been called
    #[must_use]
    pub fn sleep_count(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        let _ = self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
    }
}

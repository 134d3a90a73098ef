//! Wall-clock abstraction.
//!
//! Everything that compares a timestamp against "now" takes an
//! `Arc<dyn Clock>` so expiry behavior can be tested without sleeping.
//! Production code uses [`SystemClock`]; tests enable the `test-utils`
//! feature and drive a `ManualClock`.

use chrono::{DateTime, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-utils"))]
mod manual {
    use super::Clock;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    /// Clock that only moves when told to.
    ///
    /// Stores milliseconds since the epoch so it can be shared behind an
    /// `Arc` and advanced from a test while a service holds the other end.
    #[derive(Debug)]
    pub struct ManualClock {
        millis: AtomicI64,
    }

    impl ManualClock {
        /// Create a clock frozen at a Unix timestamp (seconds).
        #[must_use]
        pub fn at_unix(seconds: i64) -> Self {
            Self {
                millis: AtomicI64::new(seconds.saturating_mul(1000)),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
            self.millis.fetch_add(delta, Ordering::SeqCst);
        }

        /// Jump to an absolute instant.
        pub fn set(&self, to: DateTime<Utc>) {
            self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
                .single()
                .unwrap_or_default()
        }
    }
}

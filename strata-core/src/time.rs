//! Microsecond-resolution UTC time: wire conversions and a monotonic clock.
//!
//! Every instant in the store is a `DateTime<Utc>` truncated to microseconds.
//! The wire/storage representation is a signed 64-bit count of microseconds
//! since the Unix epoch.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Convert a UTC instant to microseconds since the Unix epoch.
/// Sub-microsecond precision is truncated.
pub fn datetime_to_microseconds(instant: &DateTime<Utc>) -> i64 {
    instant.timestamp_micros()
}

/// Convert microseconds since the Unix epoch back to a UTC instant.
/// Total for the timestamp range the store uses.
pub fn microseconds_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Truncate an instant to microsecond resolution.
pub fn truncate_to_micros(instant: DateTime<Utc>) -> DateTime<Utc> {
    microseconds_to_datetime(datetime_to_microseconds(&instant))
}

/// A clock yielding strictly increasing microsecond-truncated instants.
///
/// Two calls can land in the same microsecond under sub-microsecond
/// scheduling; the clock bumps the result to `previous + 1µs` so that
/// timestamps used for identity slots never collide.
pub struct MonotonicClock {
    state: Mutex<ClockState>,
}

struct ClockState {
    last_micros: i64,
    fixed: Option<i64>,
}

impl MonotonicClock {
    /// A clock backed by the system time.
    pub fn system() -> Self {
        Self {
            state: Mutex::new(ClockState {
                last_micros: i64::MIN,
                fixed: None,
            }),
        }
    }

    /// A deterministic clock starting at `start` and stepping 1µs per call.
    pub fn fixed(start: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ClockState {
                last_micros: i64::MIN,
                fixed: Some(datetime_to_microseconds(&start)),
            }),
        }
    }

    /// The next strictly-increasing instant.
    pub fn now(&self) -> DateTime<Utc> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let candidate = match state.fixed {
            Some(start) => {
                if state.last_micros == i64::MIN {
                    start
                } else {
                    state.last_micros + 1
                }
            }
            None => {
                let now = Utc::now().timestamp_micros();
                if now > state.last_micros {
                    now
                } else {
                    state.last_micros + 1
                }
            }
        };
        state.last_micros = candidate;
        microseconds_to_datetime(candidate)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for MonotonicClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MonotonicClock")
    }
}

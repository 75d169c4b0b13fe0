use chrono::{DateTime, Utc};
#[cfg(any(test, feature = "test-util"))]
use std::collections::VecDeque;
#[cfg(any(test, feature = "test-util"))]
use std::sync::Mutex;

/// Wall-clock source in float seconds since the Unix epoch.
///
/// Both sides of the protocol stamp events through this trait so tests can
/// pin exact timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        unix_seconds(Utc::now())
    }
}

pub fn unix_seconds(dt: DateTime<Utc>) -> f64 {
    dt.timestamp_micros() as f64 / 1_000_000.0
}

/// Difference between two second timestamps, in milliseconds.
pub fn elapsed_ms(from_ts: f64, to_ts: f64) -> f64 {
    (to_ts - from_ts) * 1000.0
}

/// Test double that replays a fixed sequence of readings, then repeats the
/// last one. Only built for tests and under the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct ManualClock {
    readings: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new(readings: impl IntoIterator<Item = f64>) -> Self {
        Self {
            readings: Mutex::new(readings.into_iter().collect()),
            last: Mutex::new(0.0),
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now(&self) -> f64 {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let mut readings = self.readings.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = readings.pop_front() {
            *last = next;
        }
        *last
    }
}

use latency_probe_common::clock::elapsed_ms;
use std::collections::VecDeque;

/// Decomposition of one ingest round trip, all in milliseconds.
///
/// The component values assume client and server clocks are synchronized;
/// skew shows up as negative or inflated upload/download and is not corrected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyBreakdown {
    pub upload_ms: f64,
    pub proc_ms: f64,
    pub download_ms: f64,
    pub rtt_ms: f64,
}

impl LatencyBreakdown {
    pub fn from_timestamps(
        sent_ts: f64,
        server_recv_ts: f64,
        server_send_ts: f64,
        recv_ts: f64,
    ) -> Self {
        Self {
            upload_ms: elapsed_ms(sent_ts, server_recv_ts),
            proc_ms: elapsed_ms(server_recv_ts, server_send_ts),
            download_ms: elapsed_ms(server_send_ts, recv_ts),
            rtt_ms: elapsed_ms(sent_ts, recv_ts),
        }
    }
}

/// Rolling window of the most recent RTT samples.
///
/// Oldest samples are evicted first once `capacity` is reached, so the average
/// reflects recent network conditions rather than the whole session.
#[derive(Debug, Clone)]
pub struct LatencyTracker {
    samples: VecDeque<f64>,
    capacity: usize,
}

pub const DEFAULT_CAPACITY: usize = 100;

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LatencyTracker {
    /// A zero capacity is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, rtt_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt_ms);
    }

    /// Mean of the held samples, `None` while empty.
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent sample.
    pub fn last(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Held samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn breakdown_matches_reference_exchange() {
        let b = LatencyBreakdown::from_timestamps(100.000, 100.010, 100.012, 100.025);
        assert!(approx(b.upload_ms, 10.0), "upload {}", b.upload_ms);
        assert!(approx(b.proc_ms, 2.0), "proc {}", b.proc_ms);
        assert!(approx(b.download_ms, 13.0), "download {}", b.download_ms);
        assert!(approx(b.rtt_ms, 25.0), "rtt {}", b.rtt_ms);
        assert!(approx(b.upload_ms + b.proc_ms + b.download_ms, b.rtt_ms));
    }

    #[test]
    fn skewed_server_clock_is_not_corrected() {
        // Server clock 50 ms behind the client.
        let b = LatencyBreakdown::from_timestamps(10.000, 9.960, 9.961, 10.020);
        assert!(b.upload_ms < 0.0);
        assert!(approx(b.rtt_ms, 20.0));
    }

    #[test]
    fn empty_tracker_has_no_average() {
        let tracker = LatencyTracker::default();
        assert!(tracker.is_empty());
        assert_eq!(tracker.average(), None);
        assert_eq!(tracker.capacity(), 100);
    }

    #[test]
    fn first_sample_is_its_own_average() {
        let mut tracker = LatencyTracker::new(4);
        tracker.record(12.5);
        assert_eq!(tracker.average(), Some(12.5));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn overflow_keeps_last_capacity_samples_in_order() {
        let capacity = 5;
        let mut tracker = LatencyTracker::new(capacity);
        for i in 1..=8 {
            tracker.record(i as f64);
        }
        assert_eq!(tracker.len(), capacity);
        assert_eq!(tracker.samples().collect::<Vec<_>>(), vec![4.0, 5.0, 6.0, 7.0, 8.0]);
        assert!(approx(tracker.average().unwrap(), 6.0));
    }

    #[test]
    fn default_window_evicts_after_one_hundred() {
        let mut tracker = LatencyTracker::default();
        for i in 0..130 {
            tracker.record(i as f64);
        }
        assert_eq!(tracker.len(), 100);
        assert_eq!(tracker.samples().next(), Some(30.0));
        // mean of 30..=129
        assert!(approx(tracker.average().unwrap(), 79.5));
    }

    #[test]
    fn last_tracks_newest_sample_across_eviction() {
        let mut tracker = LatencyTracker::new(2);
        assert_eq!(tracker.last(), None);
        for rtt in [5.0, 6.0, 7.0] {
            tracker.record(rtt);
        }
        assert_eq!(tracker.last(), Some(7.0));
        assert_eq!(tracker.samples().collect::<Vec<_>>(), vec![6.0, 7.0]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut tracker = LatencyTracker::new(0);
        tracker.record(1.0);
        tracker.record(2.0);
        assert_eq!(tracker.capacity(), 1);
        assert_eq!(tracker.samples().collect::<Vec<_>>(), vec![2.0]);
    }
}

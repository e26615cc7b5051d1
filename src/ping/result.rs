//! Component H for ping: immutable per-target result records.

use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;

use crate::ping::entry::{Elapsed, Entry};

#[derive(Debug, Clone, Serialize)]
pub struct PingResult {
    pub host: String,
    pub ip: IpAddr,
    pub packets: usize,
    pub received: usize,
    pub stddev: f64,
    /// One entry per attempt, in send order. `Elapsed::Unused` means a
    /// timeout (no reply), `Elapsed::Error` a local send failure, distinct
    /// from each other in both the public field here and `--json` output.
    pub times: Vec<Elapsed>,
}

impl PingResult {
    pub fn from_entry(entry: &Entry) -> Self {
        let times = entry.replies.iter().map(|r| r.elapsed).collect();
        Self {
            host: entry.host.clone(),
            ip: entry.ip,
            packets: entry.sent,
            received: entry.received,
            stddev: entry.stddev(),
            times,
        }
    }

    /// `(sent - recv) / sent * 100`, `0` when nothing was sent.
    pub fn loss(&self) -> f64 {
        if self.packets == 0 {
            0.0
        } else {
            ((self.packets - self.received) as f64 * 100.0) / self.packets as f64
        }
    }

    /// `(min, sum/count, max)` over replies with a value, `None` if none replied.
    /// §9 fixes the upstream `max/count` average bug: this computes `sum/count`.
    pub fn min_avg_max(&self) -> Option<(Duration, Duration, Duration)> {
        let values: Vec<Duration> = self
            .times
            .iter()
            .filter_map(|e| match e {
                Elapsed::Value(d) => Some(*d),
                Elapsed::Unused | Elapsed::Error => None,
            })
            .collect();
        if values.is_empty() {
            return None;
        }
        let min = *values.iter().min().unwrap();
        let max = *values.iter().max().unwrap();
        let sum: Duration = values.iter().sum();
        let avg = sum / values.len() as u32;
        Some((min, avg, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(times: Vec<Elapsed>, packets: usize, received: usize) -> PingResult {
        PingResult {
            host: "h".into(),
            ip: "127.0.0.1".parse().unwrap(),
            packets,
            received,
            stddev: 0.0,
            times,
        }
    }

    #[test]
    fn loss_formula_matches_spec() {
        let r = result_with(vec![], 4, 1);
        assert!((r.loss() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn loss_is_zero_when_nothing_sent() {
        let r = result_with(vec![], 0, 0);
        assert_eq!(r.loss(), 0.0);
    }

    #[test]
    fn average_is_sum_over_count_not_max_over_count() {
        // Regression test for the upstream bug noted in §9: avg must be
        // sum/count, which for these three samples differs from max/count.
        let times = vec![
            Elapsed::Value(Duration::from_millis(10)),
            Elapsed::Value(Duration::from_millis(20)),
            Elapsed::Value(Duration::from_millis(30)),
        ];
        let r = result_with(times, 3, 3);
        let (min, avg, max) = r.min_avg_max().unwrap();
        assert_eq!(min, Duration::from_millis(10));
        assert_eq!(max, Duration::from_millis(30));
        assert_eq!(avg, Duration::from_millis(20));
        assert_ne!(avg, max / 3); // sanity: the buggy max/count formula would give 10ms here
    }

    #[test]
    fn times_distinguishes_timeout_from_send_error() {
        let times = vec![Elapsed::Unused, Elapsed::Error, Elapsed::Value(Duration::from_millis(5))];
        let r = result_with(times, 3, 1);
        assert_eq!(r.times[0], Elapsed::Unused);
        assert_eq!(r.times[1], Elapsed::Error);
        assert_eq!(r.min_avg_max().unwrap().0, Duration::from_millis(5));
    }
}

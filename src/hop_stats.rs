//! Per-hop enrichment (§10.6): a richer set of statistics folded in as an
//! optional post-pass over a finished `MtrResult`. It consumes the engine's
//! immutable output and does not change engine semantics.

use std::time::Duration;

use crate::mtr::result::{MtrResult, TtlResultEntry};

/// Exponential smoothing factor for `ema_rtt`. Lower = smoother, less
/// sensitive to a single spike.
const EMA_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, Default)]
pub struct HopStats {
    pub hop: usize,
    pub sent: usize,
    pub received: usize,
    pub loss_percent: f64,
    pub last_rtt: Option<Duration>,
    pub best_rtt: Option<Duration>,
    pub worst_rtt: Option<Duration>,
    pub avg_rtt: Option<Duration>,
    pub ema_rtt: Option<Duration>,
    pub jitter_avg: Option<Duration>,
}

impl HopStats {
    fn from_entries(hop: usize, entries: &[TtlResultEntry]) -> Self {
        let mut stats = HopStats { hop, sent: entries.len(), ..Default::default() };

        let mut last_rtt: Option<Duration> = None;
        let mut jitters = Vec::new();
        let mut rtts = Vec::new();

        for entry in entries {
            let Some(rtt) = entry.elapsed else { continue };
            stats.received += 1;
            rtts.push(rtt);

            if let Some(prev) = last_rtt {
                let jitter = rtt.abs_diff(prev);
                jitters.push(jitter);
            }
            last_rtt = Some(rtt);
            stats.last_rtt = Some(rtt);

            stats.best_rtt = Some(stats.best_rtt.map_or(rtt, |b| b.min(rtt)));
            stats.worst_rtt = Some(stats.worst_rtt.map_or(rtt, |w| w.max(rtt)));

            stats.ema_rtt = Some(match stats.ema_rtt {
                None => rtt,
                Some(prev_ema) => {
                    let rtt_ms = rtt.as_secs_f64() * 1000.0;
                    let prev_ms = prev_ema.as_secs_f64() * 1000.0;
                    let new_ms = EMA_ALPHA * rtt_ms + (1.0 - EMA_ALPHA) * prev_ms;
                    Duration::from_secs_f64(new_ms / 1000.0)
                }
            });
        }

        if !rtts.is_empty() {
            let sum: Duration = rtts.iter().sum();
            stats.avg_rtt = Some(sum / rtts.len() as u32);
        }
        if !jitters.is_empty() {
            let sum: Duration = jitters.iter().sum();
            stats.jitter_avg = Some(sum / jitters.len() as u32);
        }
        stats.loss_percent = if stats.sent > 0 {
            ((stats.sent - stats.received) as f64 * 100.0) / stats.sent as f64
        } else {
            0.0
        };
        stats
    }
}

/// One `HopStats` per hop in `result.ttl`, in order (hop 1 first).
pub fn enrich(result: &MtrResult) -> Vec<HopStats> {
    result
        .ttl
        .iter()
        .enumerate()
        .map(|(i, tr)| HopStats::from_entries(i + 1, &tr.entries))
        .collect()
}

//! Per-target ping state and Component E's binary-heap realization of the
//! pending queue, grounded on the original `entry.go`/`entry_heap.go`.
//!
//! The original keeps two views of each target: a permanent `entries` slice
//! (for final result assembly) and a `container/heap` over the same pointers
//! (for scheduling). A Rust `Vec<Entry>` can't be reordered in place without
//! invalidating indices a correlation payload might hold, so this keeps the
//! same split: `EntryHeap::storage` is a stable, append-only slab (its index
//! is the target's permanent id) and `EntryHeap::heap` is a separate
//! min-heap of those ids ordered by `ev_time`.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::icmp::Mode;

/// Marks a send-local failure in a reply slot. `Duration` can't hold a
/// negative sentinel the way the original source's `time.Duration(-1)`
/// does, so the slot tracks this explicitly. Kept three-way (rather than
/// collapsed to `Option<Duration>`) all the way out to `PingResult::times`
/// so a JSON consumer can tell a timeout from a local send failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Elapsed {
    Unused,
    Error,
    Value(Duration),
}

/// One attempt's result slot: created at send time, filled in on reply.
#[derive(Debug)]
pub struct Reply {
    pub send_time: Instant,
    pub elapsed: Elapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvType {
    Ping,
    Timeout,
}

/// A target's permanent slab index, stable across heap reordering — what a
/// correlation-pool payload should hold to find its way back to the target.
pub type EntryId = usize;

/// One registered target.
pub struct Entry {
    pub host: String,
    pub ip: IpAddr,
    pub addr: SocketAddr,
    pub mode: Mode,

    pub data_size: usize,
    pub count: usize,
    pub timeout: Duration,
    pub interval: Duration,

    pub ev_time: Instant,
    pub ev_type: EvType,
    /// Position within the scheduling heap's index array, `None` once popped
    /// (the target finished or timed out).
    heap_pos: Option<usize>,

    pub sent: usize,
    pub received: usize,
    pub replies: Vec<Reply>,

    // Welford accumulators for RTT (ms), per §4.F.
    mean: f64,
    m2: f64,
}

impl Entry {
    pub fn new(host: String, ip: IpAddr, addr: SocketAddr, mode: Mode, options: &EntryOptions) -> Self {
        Self {
            host,
            ip,
            addr,
            mode,
            data_size: options.data_size,
            count: options.count,
            timeout: options.timeout,
            interval: options.interval,
            ev_time: Instant::now(),
            ev_type: EvType::Ping,
            heap_pos: None,
            sent: 0,
            received: 0,
            replies: Vec::new(),
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Folds one RTT sample (milliseconds) into the Welford accumulators.
    pub fn record_rtt_ms(&mut self, rtt_ms: f64) {
        if self.received == 0 {
            self.mean = rtt_ms;
        } else {
            let new_mean = self.mean + (rtt_ms - self.mean) / (self.received as f64 + 1.0);
            self.m2 += (rtt_ms - self.mean) * (rtt_ms - new_mean);
            self.mean = new_mean;
        }
        self.received += 1;
    }

    /// `sqrt(M2 / n)`, `0` when no replies have been received yet.
    pub fn stddev(&self) -> f64 {
        if self.received == 0 {
            0.0
        } else {
            (self.m2 / self.received as f64).sqrt()
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntryOptions {
    pub data_size: usize,
    pub count: usize,
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            data_size: crate::icmp::DEFAULT_DATA_SIZE,
            count: 1,
            timeout: crate::icmp::DEFAULT_TIMEOUT,
            interval: crate::icmp::DEFAULT_INTERVAL,
        }
    }
}

/// Component E for the ping engine: a stable slab of `Entry` plus a binary
/// min-heap of slab ids ordered by `ev_time`.
#[derive(Default)]
pub struct EntryHeap {
    storage: Vec<Entry>,
    heap: Vec<EntryId>,
}

impl EntryHeap {
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Adds a new target, enqueues it, and returns its permanent id.
    pub fn push_new(&mut self, entry: Entry) -> EntryId {
        let id = self.storage.len();
        self.storage.push(entry);
        self.enqueue(id);
        id
    }

    /// Re-enqueues an already-popped entry (its `ev_time`/`ev_type` having
    /// just been updated by the caller).
    pub fn enqueue(&mut self, id: EntryId) {
        let pos = self.heap.len();
        self.heap.push(id);
        self.storage[id].heap_pos = Some(pos);
        self.sift_up(pos);
    }

    pub fn peek_id(&self) -> Option<EntryId> {
        self.heap.first().copied()
    }

    pub fn get(&self, id: EntryId) -> &Entry {
        &self.storage[id]
    }

    pub fn get_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.storage[id]
    }

    /// Removes the head of the heap (the earliest deadline) and returns its id.
    pub fn pop(&mut self) -> Option<EntryId> {
        self.remove_at(0)
    }

    /// Removes `id` from the heap (it may be anywhere in it). No-op if it's
    /// already been popped.
    pub fn remove(&mut self, id: EntryId) {
        if let Some(pos) = self.storage[id].heap_pos {
            self.remove_at(pos);
        }
    }

    fn remove_at(&mut self, pos: usize) -> Option<EntryId> {
        if pos >= self.heap.len() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(pos, last);
        let removed_id = self.heap.pop()?;
        self.storage[removed_id].heap_pos = None;
        if pos < self.heap.len() {
            self.storage[self.heap[pos]].heap_pos = Some(pos);
            self.sift_down(pos);
            self.sift_up(pos);
        }
        Some(removed_id)
    }

    fn ev_time(&self, pos: usize) -> Instant {
        self.storage[self.heap[pos]].ev_time
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.ev_time(pos) < self.ev_time(parent) {
                self.swap_heap(pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            let right = 2 * pos + 2;
            let mut smallest = pos;
            if left < len && self.ev_time(left) < self.ev_time(smallest) {
                smallest = left;
            }
            if right < len && self.ev_time(right) < self.ev_time(smallest) {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.swap_heap(pos, smallest);
            pos = smallest;
        }
    }

    fn swap_heap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.storage[self.heap[a]].heap_pos = Some(a);
        self.storage[self.heap[b]].heap_pos = Some(b);
    }

    /// All registered targets, in `Add` order (for final result assembly).
    pub fn all(&self) -> &[Entry] {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn entry_at(ms_from_now: u64) -> Entry {
        let mut e = Entry::new(
            "h".into(),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            Mode::V4,
            &EntryOptions::default(),
        );
        e.ev_time = Instant::now() + Duration::from_millis(ms_from_now);
        e
    }

    #[test]
    fn peek_returns_earliest_after_mixed_insert_remove() {
        let mut heap = EntryHeap::default();
        let a = heap.push_new(entry_at(50));
        let _b = heap.push_new(entry_at(10));
        let c = heap.push_new(entry_at(30));

        assert_eq!(heap.get(heap.peek_id().unwrap()).ev_time, heap.all().iter().map(|e| e.ev_time).min().unwrap());

        heap.remove(a);
        let min = heap.all().iter().enumerate().filter(|(i, _)| *i != a).map(|(_, e)| e.ev_time).min().unwrap();
        assert_eq!(heap.get(heap.peek_id().unwrap()).ev_time, min);

        heap.remove(c);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn pop_returns_in_ascending_deadline_order() {
        let mut heap = EntryHeap::default();
        heap.push_new(entry_at(30));
        heap.push_new(entry_at(10));
        heap.push_new(entry_at(20));
        let mut prev = None;
        while let Some(id) = heap.pop() {
            let t = heap.get(id).ev_time;
            if let Some(p) = prev {
                assert!(t >= p);
            }
            prev = Some(t);
        }
    }

    #[test]
    fn identity_survives_heap_reordering() {
        // Regression test: a correlation payload holding an EntryId must
        // still resolve to the same target after arbitrary heap churn.
        let mut heap = EntryHeap::default();
        let a = heap.push_new(entry_at(5));
        let b = heap.push_new(entry_at(1));
        heap.get_mut(a).sent = 7;
        heap.get_mut(b).sent = 9;
        heap.pop(); // pops b (earlier deadline)
        assert_eq!(heap.get(a).sent, 7);
        assert_eq!(heap.get(b).sent, 9);
    }

    #[test]
    fn welford_matches_population_stddev() {
        let mut e = entry_at(0);
        let samples = [10.0, 12.0, 23.0, 23.0, 16.0, 23.0, 21.0, 16.0];
        for &s in &samples {
            e.record_rtt_ms(s);
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / samples.len() as f64;
        assert!((e.stddev() - variance.sqrt()).abs() < 1e-9);
    }
}

//! Component E for MTR: an intrusive doubly-linked list ordered by deadline,
//! grounded on the original `mtr.go`'s `evEnqueue`/`evRemove`. Node storage
//! is a stable slab (same rationale as `ping::entry::EntryHeap`) so a handle
//! captured by the correlation pool survives arbitrary list churn. Each node
//! carries a small payload (the sequence-pool key) so a timed-out node can
//! free its correlation entry without a second lookup structure.

use std::time::Instant;

pub type PendingId = usize;

struct Node<T> {
    deadline: Instant,
    payload: Option<T>,
    prev: Option<PendingId>,
    next: Option<PendingId>,
    linked: bool,
}

#[derive(Default)]
pub struct PendingQueue<T> {
    storage: Vec<Node<T>>,
    first: Option<PendingId>,
    last: Option<PendingId>,
}

impl<T> PendingQueue<T> {
    pub fn len(&self) -> usize {
        self.storage.iter().filter(|n| n.linked).count()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    pub fn peek_earliest(&self) -> Option<(PendingId, Instant)> {
        self.first.map(|id| (id, self.storage[id].deadline))
    }

    /// Inserts a new node with `deadline`, returning its stable id. Common
    /// case (deadline ≥ tail's) appends in O(1); otherwise scans backward
    /// from the tail (per §4.E — deadlines "arrive nearly sorted").
    pub fn insert(&mut self, deadline: Instant, payload: T) -> PendingId {
        let id = self.storage.len();
        self.storage.push(Node { deadline, payload: Some(payload), prev: None, next: None, linked: true });

        match self.last {
            None => {
                self.first = Some(id);
                self.last = Some(id);
            }
            Some(last) if deadline >= self.storage[last].deadline => {
                self.storage[id].prev = Some(last);
                self.storage[last].next = Some(id);
                self.last = Some(id);
            }
            Some(last) => {
                let mut cursor = last;
                loop {
                    match self.storage[cursor].prev {
                        Some(prev) if self.storage[prev].deadline > deadline => {
                            cursor = prev;
                        }
                        prev_of_cursor => {
                            self.storage[id].prev = prev_of_cursor;
                            self.storage[id].next = Some(cursor);
                            self.storage[cursor].prev = Some(id);
                            match prev_of_cursor {
                                Some(p) => self.storage[p].next = Some(id),
                                None => self.first = Some(id),
                            }
                            break;
                        }
                    }
                }
            }
        }
        id
    }

    /// O(1) removal given the handle, returning the payload. No-op (returns
    /// `None`) if already removed.
    pub fn remove(&mut self, id: PendingId) -> Option<T> {
        if !self.storage[id].linked {
            return None;
        }
        self.storage[id].linked = false;
        let (prev, next) = (self.storage[id].prev, self.storage[id].next);
        if self.first == Some(id) {
            self.first = next;
        }
        if self.last == Some(id) {
            self.last = prev;
        }
        if let Some(p) = prev {
            self.storage[p].next = next;
        }
        if let Some(n) = next {
            self.storage[n].prev = prev;
        }
        self.storage[id].prev = None;
        self.storage[id].next = None;
        self.storage[id].payload.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[test]
    fn peek_is_always_the_earliest_live_deadline() {
        let mut q: PendingQueue<()> = PendingQueue::default();
        let a = q.insert(at(50), ());
        let b = q.insert(at(10), ());
        let c = q.insert(at(30), ());
        assert_eq!(q.peek_earliest().unwrap().0, b);

        q.remove(b);
        assert_eq!(q.peek_earliest().unwrap().0, c);

        q.remove(c);
        assert_eq!(q.peek_earliest().unwrap().0, a);

        q.remove(a);
        assert!(q.peek_earliest().is_none());
    }

    #[test]
    fn monotonic_inserts_append_in_order() {
        let mut q: PendingQueue<()> = PendingQueue::default();
        let mut ids = Vec::new();
        for ms in [10, 20, 30, 40] {
            ids.push(q.insert(at(ms), ()));
        }
        let mut seen = Vec::new();
        while let Some((id, _)) = q.peek_earliest() {
            seen.push(id);
            q.remove(id);
        }
        assert_eq!(seen, ids);
    }

    #[test]
    fn double_remove_is_a_no_op() {
        let mut q: PendingQueue<()> = PendingQueue::default();
        let a = q.insert(at(1), ());
        q.remove(a);
        assert!(q.remove(a).is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn payload_is_returned_on_removal() {
        let mut q = PendingQueue::default();
        let a = q.insert(at(1), "hello");
        assert_eq!(q.remove(a), Some("hello"));
    }
}

use std::time::Duration;

/// Deferred work on a virtual clock.
///
/// The clock only moves when the embedder calls [`advance`](Self::advance),
/// so a session is fully deterministic. Tasks due at the same instant run in
/// the order they were scheduled. There is no cancellation: consumers drop
/// stale tasks themselves.
#[derive(Debug)]
pub struct TimerQueue<T> {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending<T>>,
}

#[derive(Debug)]
struct Pending<T> {
    due: Duration,
    seq: u64,
    task: T,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        TimerQueue {
            now: Duration::ZERO,
            next_seq: 0,
            pending: Vec::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Run `task` once `delay` has elapsed.
    pub fn schedule(&mut self, delay: Duration, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending {
            due: self.now + delay,
            seq,
            task,
        });
    }

    /// Move the clock forward.
    pub fn advance(&mut self, elapsed: Duration) {
        self.now += elapsed;
    }

    /// Remove and return the earliest task that is due, if any.
    pub fn pop_due(&mut self) -> Option<T> {
        let now = self.now;
        let pos = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= now)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;
        Some(self.pending.remove(pos).task)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

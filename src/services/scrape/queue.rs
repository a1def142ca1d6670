//! Append-only job queues.
//!
//! The queue keeps every job ever enqueued; a cursor separates drained
//! work from pending work. Queue length therefore reports the monotonic
//! ever-enqueued figure, which statistics and progress reporting rely
//! on, while `pending` reports what the next drain will pick up.

use std::sync::Mutex;

use super::types::Job;

#[derive(Debug, Default)]
struct QueueState {
    jobs: Vec<Job>,
    cursor: usize,
}

/// FIFO queue of extraction jobs with an ever-enqueued log.
#[derive(Debug, Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job. No dedup happens here; the extraction pipeline
    /// drops duplicates later.
    pub fn push(&self, job: Job) {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state.jobs.push(job);
    }

    /// Jobs ever enqueued. Never decreases.
    pub fn enqueued(&self) -> usize {
        self.state.lock().expect("queue lock poisoned").jobs.len()
    }

    /// Jobs not yet handed to a drain.
    pub fn pending(&self) -> usize {
        let state = self.state.lock().expect("queue lock poisoned");
        state.jobs.len() - state.cursor
    }

    /// Hand out everything pending right now and advance the cursor.
    /// Jobs enqueued after this call wait for the next drain.
    pub fn take_pending(&self) -> Vec<Job> {
        let mut state = self.state.lock().expect("queue lock poisoned");
        let pending = state.jobs[state.cursor..].to_vec();
        state.cursor = state.jobs.len();
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueued_is_monotonic() {
        let queue = JobQueue::new();
        queue.push(Job::brand("al-fakher"));
        queue.push(Job::brand("adalya"));
        assert_eq!(queue.enqueued(), 2);
        assert_eq!(queue.pending(), 2);

        let drained = queue.take_pending();
        assert_eq!(drained.len(), 2);
        assert_eq!(queue.enqueued(), 2);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_take_pending_snapshots_current_contents() {
        let queue = JobQueue::new();
        queue.push(Job::brand("a"));
        let first = queue.take_pending();
        assert_eq!(first.len(), 1);

        queue.push(Job::brand("b"));
        queue.push(Job::brand("c"));
        let second = queue.take_pending();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].identifier, "b");
        assert_eq!(queue.enqueued(), 3);
    }

    #[test]
    fn test_preserves_fifo_order() {
        let queue = JobQueue::new();
        for name in ["a", "b", "c", "d"] {
            queue.push(Job::product(name, "brand"));
        }
        let drained = queue.take_pending();
        let order: Vec<_> = drained.iter().map(|j| j.identifier.as_str()).collect();
        assert_eq!(order, ["a", "b", "c", "d"]);
    }
}

//! Queue of states scheduled by sub-flows.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::state::StateName;

/// States queued to run next, head first.
///
/// A newly scheduled batch always runs before anything queued earlier, so a
/// sub-flow started inside another sub-flow completes before its parent
/// resumes. Within a batch the given order is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduledQueue {
    states: VecDeque<StateName>,
}

impl ScheduledQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `batch` in front of the queue, keeping its order.
    ///
    /// Returns the number of states added.
    pub fn schedule<I>(&mut self, batch: I) -> usize
    where
        I: IntoIterator<Item = StateName>,
    {
        let batch: Vec<_> = batch.into_iter().collect();
        let added = batch.len();
        for state in batch.into_iter().rev() {
            self.states.push_front(state);
        }
        added
    }

    /// Remove and return the next state to run.
    pub fn dequeue(&mut self) -> Option<StateName> {
        self.states.pop_front()
    }

    /// The next state to run, without removing it.
    pub fn peek(&self) -> Option<&StateName> {
        self.states.front()
    }

    /// Queued states in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &StateName> {
        self.states.iter()
    }

    /// Number of queued states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> StateName {
        StateName::from(s)
    }

    fn names(queue: &ScheduledQueue) -> Vec<&str> {
        queue.iter().map(StateName::as_str).collect()
    }

    #[test]
    fn test_batches_are_prepended_in_order() {
        let mut queue = ScheduledQueue::new();
        assert_eq!(queue.schedule([n("a"), n("b")]), 2);
        assert_eq!(queue.schedule([n("c")]), 1);
        assert_eq!(names(&queue), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_dequeue_takes_head() {
        let mut queue = ScheduledQueue::new();
        queue.schedule([n("a"), n("b")]);
        queue.schedule([n("c")]);

        assert_eq!(queue.peek().map(StateName::as_str), Some("c"));
        assert_eq!(queue.dequeue(), Some(StateName::from("c")));
        assert_eq!(names(&queue), vec!["a", "b"]);
        assert_eq!(queue.dequeue(), Some(StateName::from("a")));
        assert_eq!(queue.dequeue(), Some(StateName::from("b")));
        assert_eq!(queue.dequeue(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut queue = ScheduledQueue::new();
        queue.schedule([n("a")]);
        assert_eq!(queue.schedule(Vec::new()), 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_serializes_as_string_array() {
        let mut queue = ScheduledQueue::new();
        queue.schedule([n("a"), n("b")]);
        assert_eq!(serde_json::to_string(&queue).unwrap(), r#"["a","b"]"#);

        let back: ScheduledQueue = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(back, queue);
        assert!(serde_json::from_str::<ScheduledQueue>("[1]").is_err());
    }
}

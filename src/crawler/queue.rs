//! Cursor queue for the conversation walk
//!
//! Pages are visited breadth-first: cursors are taken in the order they
//! were discovered. The walk starts from the first page, which has no
//! cursor.

use std::collections::VecDeque;

/// FIFO of pending page cursors; `None` stands for the first page
#[derive(Debug, Clone)]
pub struct CursorQueue {
    pending: VecDeque<Option<String>>,
    discovered: usize,
}

impl CursorQueue {
    /// Creates a queue holding only the first page
    pub fn new() -> Self {
        let mut pending = VecDeque::new();
        pending.push_back(None);
        Self {
            pending,
            discovered: 0,
        }
    }

    /// Enqueues a continuation cursor
    pub fn push(&mut self, cursor: String) {
        self.discovered += 1;
        self.pending.push_back(Some(cursor));
    }

    /// Takes the oldest pending cursor
    ///
    /// The outer `Option` is `None` once the queue is exhausted.
    pub fn pop(&mut self) -> Option<Option<String>> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of cursors enqueued so far
    pub fn discovered(&self) -> usize {
        self.discovered
    }
}

impl Default for CursorQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_first_page() {
        let mut queue = CursorQueue::new();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(None));
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = CursorQueue::new();
        queue.pop();
        queue.push("a".to_string());
        queue.push("b".to_string());
        assert_eq!(queue.pop(), Some(Some("a".to_string())));
        queue.push("c".to_string());
        assert_eq!(queue.pop(), Some(Some("b".to_string())));
        assert_eq!(queue.pop(), Some(Some("c".to_string())));
        assert_eq!(queue.discovered(), 3);
    }
}

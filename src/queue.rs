//! Operation Queue: single-slot FIFO scheduler.
//!
//! Unlike a typical `Mutex<VecDeque<_>>` queue, this one is owned outright
//! by the session's driver task (see `session.rs`) rather than shared
//! behind a lock — per-op completion is signalled with a
//! `tokio::sync::oneshot`, so there is no "waiter" to park and wake other
//! than that channel. This keeps "no facade method holds a lock across a
//! suspension point" true by construction: there is no lock to hold.

use std::collections::VecDeque;

use crate::operation::{Operation, OperationOutcome};

/// FIFO queue of pending operations plus the currently-active one, if any.
#[derive(Default)]
pub struct OperationQueue {
    pending: VecDeque<Operation>,
    active: Option<Operation>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            active: None,
        }
    }

    /// Appends an operation to the back of the queue.
    pub fn enqueue(&mut self, op: Operation) {
        self.pending.push_back(op);
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&Operation> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut Operation> {
        self.active.as_mut()
    }

    /// If the queue is empty, does nothing (processing flag is implicitly
    /// "not active" via `has_active() == false`); otherwise pops the head
    /// and makes it active. Returns the new active operation, if any.
    pub fn drain_next(&mut self) -> Option<&Operation> {
        debug_assert!(self.active.is_none(), "drain_next called while an op is active");
        self.active = self.pending.pop_front();
        self.active.as_ref()
    }

    /// Clears the active slot, e.g. once its state machine has produced a
    /// terminal result.
    pub fn complete_active(&mut self) -> Option<Operation> {
        self.active.take()
    }

    /// Empties the queue and resolves every pending and active waiter with
    /// the `None` sentinel — used by `switch_device` and forceful
    /// `disconnect`.
    pub fn cancel_all(&mut self) {
        if let Some(op) = self.active.take() {
            let _ = op.result.send(OperationOutcome::None);
        }
        while let Some(op) = self.pending.pop_front() {
            let _ = op.result.send(OperationOutcome::None);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.active.is_none()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;

    fn test_op(id: u64) -> (Operation, tokio::sync::oneshot::Receiver<OperationOutcome>) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        (
            Operation {
                id,
                kind: OperationKind::CheckStatus,
                request_line: String::new(),
                progress_files: Vec::new(),
                item_path: None,
                verbose: false,
                follow: None,
                result: tx,
            },
            rx,
        )
    }

    #[test]
    fn fifo_ordering() {
        let mut queue = OperationQueue::new();
        let (op1, _rx1) = test_op(1);
        let (op2, _rx2) = test_op(2);
        queue.enqueue(op1);
        queue.enqueue(op2);

        assert_eq!(queue.drain_next().unwrap().id, 1);
        queue.complete_active();
        assert_eq!(queue.drain_next().unwrap().id, 2);
    }

    #[tokio::test]
    async fn cancel_all_resolves_none() {
        let mut queue = OperationQueue::new();
        let (op1, rx1) = test_op(1);
        let (op2, rx2) = test_op(2);
        queue.enqueue(op1);
        queue.drain_next();
        queue.enqueue(op2);

        queue.cancel_all();

        assert_eq!(rx1.await.unwrap(), OperationOutcome::None);
        assert_eq!(rx2.await.unwrap(), OperationOutcome::None);
        assert!(queue.is_empty());
    }
}

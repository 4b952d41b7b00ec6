//! Transaction session: an ordered queue of deferred protocol operations,
//! drained atomically on client commit (§4.8), used by both workspace
//! protocols (`ext-workspace-v1`, `cosmic-workspace-unstable-v1`). Grounded
//! on the original's `transactions.h`; `wl_signal`'s explicit
//! connect/destroy-signal dance is replaced with a plain `FnOnce`
//! callback, since that is what a `wl_signal` with a single destroy
//! listener amounts to once there is no manual memory management.

use std::any::Any;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    CreateWorkspace,
    Activate,
    Deactivate,
    Assign,
    Remove,
}

/// A queued operation: an opcode, an opaque source identifier (the
/// protocol object the request originated on), a payload, and a callback
/// that frees the payload (and, typically, notifies whatever the payload
/// referenced that it has been consumed).
pub struct Operation {
    pub opcode: Opcode,
    pub source: u32,
    payload: Box<dyn Any>,
    on_destroy: Box<dyn FnOnce(Box<dyn Any>)>,
}

/// An ordered queue of operations. Adds preserve insertion order; `clear`
/// destroys every queued operation without emitting anything.
#[derive(Default)]
pub struct TransactionSession {
    queue: VecDeque<Operation>,
}

impl TransactionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        opcode: Opcode,
        source: u32,
        payload: Box<dyn Any>,
        on_destroy: impl FnOnce(Box<dyn Any>) + 'static,
    ) {
        self.queue.push_back(Operation {
            opcode,
            source,
            payload,
            on_destroy: Box::new(on_destroy),
        });
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Destroy every queued operation (running its destroy callback) and
    /// drop the queue, without emitting any request signal.
    pub fn clear(&mut self) {
        for op in self.queue.drain(..) {
            (op.on_destroy)(op.payload);
        }
    }

    /// Drain the queue in order, calling `emit` with each operation's
    /// opcode/source/payload before running its destroy callback.
    /// Mirrors the client `commit` handler in §4.8: after this returns,
    /// the caller is expected to schedule (coalescing) a single "done"
    /// broadcast via [`DoneScheduler`].
    pub fn commit(&mut self, mut emit: impl FnMut(Opcode, u32, &dyn Any)) {
        for op in self.queue.drain(..) {
            emit(op.opcode, op.source, op.payload.as_ref());
            (op.on_destroy)(op.payload);
        }
    }
}

/// Coalesces repeated "done" broadcast requests into a single pending
/// flag, so that N operations committed in the same dispatch produce one
/// idle task rather than N (§4.8 "Done coalescing"). The actual
/// scheduling of the idle callback belongs to the event loop; this type
/// just tracks whether one is already pending.
#[derive(Default)]
pub struct DoneScheduler {
    pending: bool,
}

impl DoneScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time this is called since the last
    /// `run`, meaning the caller should actually schedule an idle
    /// callback now; returns `false` on every subsequent call until the
    /// callback runs, meaning a schedule is already pending.
    pub fn schedule(&mut self) -> bool {
        if self.pending {
            false
        } else {
            self.pending = true;
            true
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Called by the idle callback itself, before it does its work.
    pub fn run(&mut self) {
        self.pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn operations_emit_in_insertion_order() {
        let mut session = TransactionSession::new();
        session.add(Opcode::CreateWorkspace, 1, Box::new(()), |_| {});
        session.add(Opcode::Activate, 2, Box::new(()), |_| {});
        session.add(Opcode::Remove, 1, Box::new(()), |_| {});

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = seen.clone();
        session.commit(move |opcode, source, _payload| {
            seen2.borrow_mut().push((opcode, source));
        });

        assert_eq!(
            *seen.borrow(),
            vec![
                (Opcode::CreateWorkspace, 1),
                (Opcode::Activate, 2),
                (Opcode::Remove, 1),
            ]
        );
        assert!(session.is_empty());
    }

    #[test]
    fn clear_destroys_without_emitting() {
        let mut session = TransactionSession::new();
        let destroyed = Rc::new(RefCell::new(false));
        let destroyed2 = destroyed.clone();
        session.add(Opcode::Assign, 1, Box::new(()), move |_| {
            *destroyed2.borrow_mut() = true;
        });

        session.clear();

        assert!(*destroyed.borrow());
        assert!(session.is_empty());
    }

    #[test]
    fn commit_runs_destroy_after_emit() {
        let mut session = TransactionSession::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let order2 = order.clone();
        session.add(Opcode::Deactivate, 1, Box::new(()), move |_| {
            order2.borrow_mut().push("destroy");
        });

        let order3 = order.clone();
        session.commit(move |_, _, _| order3.borrow_mut().push("emit"));

        assert_eq!(*order.borrow(), vec!["emit", "destroy"]);
    }

    #[test]
    fn done_scheduler_coalesces_repeated_schedule_calls() {
        let mut scheduler = DoneScheduler::new();
        assert!(scheduler.schedule());
        assert!(!scheduler.schedule());
        assert!(!scheduler.schedule());
        assert!(scheduler.is_pending());

        scheduler.run();
        assert!(!scheduler.is_pending());
        assert!(scheduler.schedule());
    }
}

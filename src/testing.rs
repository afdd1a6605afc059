// testing.rs - In-memory transport and scheduler fakes

//! Test doubles for the engines' external seams. Shipped as a regular
//! module so downstream crates can drive the protocols deterministically
//! in their own tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::acl_message::AclMessage;
use crate::transport::{Scheduler, Transport};

/// Transport that records every outbound message.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Rc<RefCell<Vec<AclMessage>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<AclMessage> {
        self.sent.borrow().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }

    /// Drain the record, leaving it empty for the next assertion.
    pub fn take_sent(&self) -> Vec<AclMessage> {
        std::mem::take(&mut self.sent.borrow_mut())
    }
}

impl Transport for RecordingTransport {
    fn send(&self, message: &AclMessage) {
        self.sent.borrow_mut().push(message.clone());
    }
}

struct ScheduledCall {
    due: u64,
    seq: u64,
    callback: Box<dyn FnOnce()>,
}

/// Scheduler driven by explicit [`advance`](ManualScheduler::advance)
/// calls instead of wall-clock time.
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<u64>,
    next_seq: Cell<u64>,
    queue: RefCell<Vec<ScheduledCall>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Move time forward and fire every callback that came due, in
    /// (due time, registration order). The clock is advanced first, so a
    /// callback scheduling follow-up work with delay 0 sees it fire in
    /// the same call.
    pub fn advance(&self, units: u64) {
        self.now.set(self.now.get() + units);
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                let due_index = queue
                    .iter()
                    .enumerate()
                    .filter(|(_, call)| call.due <= self.now.get())
                    .min_by_key(|(_, call)| (call.due, call.seq))
                    .map(|(index, _)| index);
                due_index.map(|index| queue.swap_remove(index))
            };
            // Borrow released before the callback runs: it may re-enter.
            match next {
                Some(call) => (call.callback)(),
                None => break,
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn call_later(&self, delay: u64, callback: Box<dyn FnOnce()>) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.queue.borrow_mut().push(ScheduledCall {
            due: self.now.get() + delay,
            seq,
            callback,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl_message::{AgentId, Performative};

    #[test]
    fn test_recording_transport_drains() {
        let transport = RecordingTransport::new();
        transport.send(&AclMessage::new(Performative::Inform, AgentId::new("a")));
        assert_eq!(transport.sent_count(), 1);
        assert_eq!(transport.take_sent().len(), 1);
        assert_eq!(transport.sent_count(), 0);
    }

    #[test]
    fn test_scheduler_fires_in_due_then_registration_order() {
        let scheduler = ManualScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (delay, tag) in [(10u64, "b"), (5, "a"), (10, "c")] {
            let order = Rc::clone(&order);
            scheduler.call_later(delay, Box::new(move || order.borrow_mut().push(tag)));
        }

        scheduler.advance(4);
        assert!(order.borrow().is_empty());
        scheduler.advance(6);
        assert_eq!(*order.borrow(), ["a", "b", "c"]);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_callback_may_schedule_within_window() {
        let scheduler = Rc::new(ManualScheduler::new());
        let order = Rc::new(RefCell::new(Vec::new()));

        let nested_scheduler = Rc::clone(&scheduler);
        let outer_order = Rc::clone(&order);
        scheduler.call_later(
            2,
            Box::new(move || {
                outer_order.borrow_mut().push("outer");
                let inner_order = Rc::clone(&outer_order);
                nested_scheduler.call_later(
                    1,
                    Box::new(move || inner_order.borrow_mut().push("inner")),
                );
            }),
        );

        scheduler.advance(2);
        assert_eq!(*order.borrow(), ["outer"]);
        scheduler.advance(1);
        assert_eq!(*order.borrow(), ["outer", "inner"]);
    }
}

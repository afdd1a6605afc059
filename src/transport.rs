// transport.rs - External collaborator seams

//! Interfaces the session engines consume but do not own.
//!
//! Message delivery, wire encoding, retry-until-routable sending and the
//! deferred-timer primitive all live behind these two traits. Engines are
//! handed `Rc` trait objects at construction; everything is expected to run
//! on one logical event-loop thread (see the crate docs), so neither trait
//! requires `Send`.

use crate::acl_message::AclMessage;

/// Outbound message dispatch.
///
/// `send` is best-effort delivery to every receiver listed on the message;
/// unreachable receivers are the transport's concern, never surfaced to a
/// session.
pub trait Transport {
    fn send(&self, message: &AclMessage);
}

/// Fire-once deferred invocation on the event-loop thread.
///
/// All session timeouts go through this seam, so tests can drive time
/// manually (see [`crate::testing::ManualScheduler`]).
pub trait Scheduler {
    fn call_later(&self, delay_secs: u64, callback: Box<dyn FnOnce()>);
}

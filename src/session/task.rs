// session/task.rs - Suspendable computations and their descriptors

use crate::acl_message::AclMessage;
use crate::session::events::SessionEvent;
use crate::session::runner::Session;

/// Terminal output of a finished task. Tasks that end without a result
/// produce `None`; a join collects one slot of this per child.
pub type TaskOutput = Option<AclMessage>;

/// A linear protocol computation, written as an explicit state machine.
///
/// `start` advances the computation to its first suspension point;
/// `resume` injects the value, event or signal that ends the current wait
/// and advances to the next one. Implementations keep their own phase
/// state between calls.
///
/// Convention for protocol completion: on
/// [`ControlSignal::ProtocolComplete`](crate::session::ControlSignal) a
/// task runs its finalization and returns [`Step::Done`] (or suspends on a
/// follow-up descriptor to chain another session). Resuming after `Done`
/// is tolerated and should return `Done` again.
pub trait SessionTask {
    fn start(&mut self) -> Step;
    fn resume(&mut self, event: SessionEvent) -> Step;
}

/// What a task does at each step.
pub enum Step {
    /// Suspend until the descriptor's engine resumes this task.
    Suspend(SessionDescriptor),
    /// Stay suspended on the current session and keep waiting.
    Pending,
    /// Suspend until every child task has finished; resumed once with
    /// [`SessionEvent::Gathered`]. An empty child list resumes immediately.
    Join(Vec<Box<dyn SessionTask>>),
    /// The computation is finished.
    Done(TaskOutput),
}

/// An engine a session can be parked in.
///
/// Implemented by every protocol engine that owns an open-session table.
/// Registration inserts the session keyed by the message's conversation
/// id, performs the protocol's first send if it has not happened yet, and
/// schedules the session's timeouts. Registering an already-open
/// conversation id is a silent no-op: nothing is inserted and nothing is
/// sent.
pub trait SessionEngine {
    fn register_session(&self, message: AclMessage, session: Session);
}

/// "Wait on this engine for the conversation opened by this message."
///
/// Produced by an engine's `send_*` entry point, yielded by a task via
/// [`Step::Suspend`], and consumed immediately by the runner. The message
/// keys the registration; whether registration also sends it is the
/// engine's call (the subscribe initiator, for one, sends up front).
pub struct SessionDescriptor {
    pub engine: Box<dyn SessionEngine>,
    pub message: AclMessage,
}

impl SessionDescriptor {
    pub fn new(engine: Box<dyn SessionEngine>, message: AclMessage) -> Self {
        Self { engine, message }
    }
}

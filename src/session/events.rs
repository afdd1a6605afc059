// session/events.rs - Values injected at suspension points

use crate::acl_message::AclMessage;
use crate::session::task::TaskOutput;

/// Control signals marking protocol boundaries.
///
/// These are not errors: a task that ignores them simply stops looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// The session reached its terminal event (final message or timeout)
    /// and its table entry is gone.
    ProtocolComplete,
    /// Contract-net only: every receiver answered the CFP, or the CFP
    /// timer fired. The session itself stays open.
    CfpComplete,
}

/// Unexpected-but-valid protocol outcomes, each carrying the triggering
/// message.
///
/// Raised by injection at the task's suspension point so the computation
/// can branch on, say, a refusal where it hoped for a proposal.
#[derive(Debug, Clone)]
pub enum MessageEvent {
    Agree(AclMessage),
    Refuse(AclMessage),
    Propose(AclMessage),
    Inform(AclMessage),
    Failure(AclMessage),
    RejectProposal(AclMessage),
    NotUnderstood(AclMessage),
}

impl MessageEvent {
    /// The message that raised this event.
    pub fn message(&self) -> &AclMessage {
        match self {
            MessageEvent::Agree(m)
            | MessageEvent::Refuse(m)
            | MessageEvent::Propose(m)
            | MessageEvent::Inform(m)
            | MessageEvent::Failure(m)
            | MessageEvent::RejectProposal(m)
            | MessageEvent::NotUnderstood(m) => m,
        }
    }

    pub fn into_message(self) -> AclMessage {
        match self {
            MessageEvent::Agree(m)
            | MessageEvent::Refuse(m)
            | MessageEvent::Propose(m)
            | MessageEvent::Inform(m)
            | MessageEvent::Failure(m)
            | MessageEvent::RejectProposal(m)
            | MessageEvent::NotUnderstood(m) => m,
        }
    }
}

/// What a suspended task is resumed with.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The expected reply for the current phase, as a plain value.
    Reply(AclMessage),
    /// A distinguishable message-class event (see [`MessageEvent`]).
    Event(MessageEvent),
    /// A control signal (see [`ControlSignal`]); carries no payload.
    Signal(ControlSignal),
    /// Ordered results of a completed join, one slot per child in the
    /// original input order.
    Gathered(Vec<TaskOutput>),
}

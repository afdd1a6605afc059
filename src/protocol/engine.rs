// protocol/engine.rs - Shared open-session machinery

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::acl_message::{AclMessage, AgentId, ConversationId, Performative, ProtocolType};
use crate::session::runner::{self, Session};
use crate::transport::Transport;

/// Default lifetime of an open session, in scheduler time units.
pub const DEFAULT_SESSION_TIMEOUT: u64 = 60;

/// Errors surfaced by engine entry points.
///
/// These mark API misuse by the caller. Inbound message handling never
/// produces them: mismatched or phase-invalid traffic is dropped silently
/// by design so a correct counterpart is never stalled by a stray message.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("session already open for conversation {0}")]
    SessionAlreadyOpen(ConversationId),

    #[error("exactly one receiver required, got {count}")]
    SingleReceiverRequired { count: usize },

    #[error("message carries no receivers")]
    EmptyReceiverSet,

    #[error("no open session for conversation {0}")]
    UnknownSession(ConversationId),

    #[error("receiver {0} is not part of the session")]
    UnknownReceiver(AgentId),
}

/// Open-session table, exclusively owned by one engine instance.
///
/// Keys are conversation ids; values are suspended sessions. All mutation
/// happens on the event-loop thread, and no borrow is ever held across a
/// task resumption (tasks may re-enter engine APIs).
#[derive(Clone, Default)]
pub struct SessionTable {
    inner: Rc<RefCell<HashMap<ConversationId, Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.inner.borrow().contains_key(id)
    }

    /// Insert a session. If the conversation id is already open this is a
    /// silent no-op: at most one entry per id.
    pub fn insert(&self, id: ConversationId, session: Session) -> bool {
        let mut table = self.inner.borrow_mut();
        if table.contains_key(&id) {
            debug!(conversation = %id, "session already open; registration skipped");
            return false;
        }
        table.insert(id, session);
        true
    }

    pub fn take(&self, id: &ConversationId) -> Option<Session> {
        self.inner.borrow_mut().remove(id)
    }

    /// Put a session back after an in-place resume.
    pub fn restore(&self, id: ConversationId, session: Session) {
        self.inner.borrow_mut().insert(id, session);
    }

    /// Destroy the entry and run the session's finalization. Idempotent.
    ///
    /// The stored task is resumed with the terminal protocol-complete
    /// signal; a follow-up descriptor it produces is re-registered at once
    /// (session chaining).
    pub fn delete(&self, id: &ConversationId) {
        if let Some(session) = self.take(id) {
            debug!(conversation = %id, "session closed");
            runner::complete(session);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

/// Stamp protocol and performative on an outbound message and hand it to
/// the transport.
pub(crate) fn send_stamped(
    transport: &dyn Transport,
    protocol: ProtocolType,
    performative: Performative,
    mut message: AclMessage,
) {
    message.set_protocol(protocol);
    message.set_performative(performative);
    transport.send(&message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::events::SessionEvent;
    use crate::session::task::{SessionTask, Step};

    struct Idle;

    impl SessionTask for Idle {
        fn start(&mut self) -> Step {
            Step::Pending
        }

        fn resume(&mut self, _event: SessionEvent) -> Step {
            Step::Pending
        }
    }

    #[test]
    fn test_second_insert_for_open_id_is_a_noop() {
        let table = SessionTable::new();
        let id = ConversationId::new("c1");
        assert!(table.insert(id.clone(), Session::new(Idle)));
        assert!(!table.insert(id.clone(), Session::new(Idle)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let table = SessionTable::new();
        let id = ConversationId::new("c1");
        table.insert(id.clone(), Session::new(Idle));
        table.delete(&id);
        table.delete(&id);
        assert!(table.is_empty());
    }
}

// protocol/request.rs - FIPA Request protocol engines

//! Request/response with an optional AGREE in between.
//!
//! The initiator opens one session per conversation id and resumes the
//! stored task on INFORM (value), AGREE (event, non-terminal) and
//! REFUSE/FAILURE (events, terminal). The participant is session-less: it
//! dispatches every inbound REQUEST to registered handlers and offers the
//! reply helpers.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::acl_message::{AclMessage, ConversationId, Performative, ProtocolType};
use crate::protocol::engine::{self, ProtocolError, SessionTable, DEFAULT_SESSION_TIMEOUT};
use crate::session::events::{MessageEvent, SessionEvent};
use crate::session::runner::{self, Resumption, Session};
use crate::session::task::{SessionDescriptor, SessionEngine};
use crate::transport::{Scheduler, Transport};

/// Request protocol, initiator role.
#[derive(Clone)]
pub struct RequestInitiator {
    sessions: SessionTable,
    transport: Rc<dyn Transport>,
    scheduler: Rc<dyn Scheduler>,
    session_timeout: u64,
}

impl RequestInitiator {
    pub fn new(transport: Rc<dyn Transport>, scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            sessions: SessionTable::new(),
            transport,
            scheduler,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }

    /// Override the session timeout (time units).
    pub fn with_session_timeout(mut self, secs: u64) -> Self {
        self.session_timeout = secs;
        self
    }

    /// Inbound entry point; called for every message addressed to the
    /// owning agent. Traffic for other protocols or unknown conversations
    /// is ignored, not an error.
    pub fn execute(&self, message: &AclMessage) {
        if message.protocol != Some(ProtocolType::Request) {
            return;
        }
        let sid = message.conversation_id.clone();
        let Some(session) = self.sessions.take(&sid) else {
            trace!(conversation = %sid, "no open request session; dropped");
            return;
        };

        let performative = message.performative;
        let event = match performative {
            Performative::Inform => SessionEvent::Reply(message.clone()),
            Performative::Agree => SessionEvent::Event(MessageEvent::Agree(message.clone())),
            Performative::Refuse => SessionEvent::Event(MessageEvent::Refuse(message.clone())),
            Performative::Failure => SessionEvent::Event(MessageEvent::Failure(message.clone())),
            other => {
                trace!(conversation = %sid, ?other, "performative not valid here; dropped");
                self.sessions.restore(sid, session);
                return;
            }
        };

        if let Resumption::Keep(session) = runner::resume(session, event) {
            self.sessions.restore(sid.clone(), session);
        }

        // Final message closes the session.
        if matches!(
            performative,
            Performative::Inform | Performative::Refuse | Performative::Failure
        ) {
            self.delete_session(&sid);
        }
    }

    /// Open a request session toward exactly one receiver.
    ///
    /// Nothing is sent or registered here; the send happens when the
    /// returned descriptor is registered by the runner. An already-open
    /// conversation id is refused so a session is never double-opened.
    pub fn send_request(&self, message: AclMessage) -> Result<SessionDescriptor, ProtocolError> {
        if message.receivers.len() != 1 {
            warn!(
                count = message.receivers.len(),
                "request messages are single-receiver"
            );
            return Err(ProtocolError::SingleReceiverRequired {
                count: message.receivers.len(),
            });
        }
        if self.sessions.contains(&message.conversation_id) {
            return Err(ProtocolError::SessionAlreadyOpen(
                message.conversation_id.clone(),
            ));
        }
        let mut message = message;
        message.set_protocol(ProtocolType::Request);
        message.set_performative(Performative::Request);
        Ok(SessionDescriptor::new(Box::new(self.clone()), message))
    }

    /// Force-close a session, resuming its task with the terminal signal.
    pub fn delete_session(&self, id: &ConversationId) {
        self.sessions.delete(id);
    }

    pub fn has_open_session(&self, id: &ConversationId) -> bool {
        self.sessions.contains(id)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl SessionEngine for RequestInitiator {
    fn register_session(&self, message: AclMessage, session: Session) {
        let sid = message.conversation_id.clone();
        if !self.sessions.insert(sid.clone(), session) {
            return;
        }
        self.transport.send(&message);

        let engine = self.clone();
        let expiring = sid.clone();
        self.scheduler.call_later(
            self.session_timeout,
            Box::new(move || engine.delete_session(&expiring)),
        );
        debug!(conversation = %sid, "request session opened");
    }
}

type MessageHandler = Rc<dyn Fn(&AclMessage)>;

/// Request protocol, participant role.
///
/// Stateless with respect to sessions: every inbound REQUEST goes to the
/// registered handlers, replies go out through the `send_*` helpers.
#[derive(Clone)]
pub struct RequestParticipant {
    transport: Rc<dyn Transport>,
    handlers: Rc<RefCell<Vec<MessageHandler>>>,
}

impl RequestParticipant {
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self {
            transport,
            handlers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Register a callback invoked for every inbound REQUEST.
    pub fn add_request_handler(&self, handler: impl Fn(&AclMessage) + 'static) {
        self.handlers.borrow_mut().push(Rc::new(handler));
    }

    pub fn execute(&self, message: &AclMessage) {
        if message.protocol != Some(ProtocolType::Request) {
            return;
        }
        if message.performative != Performative::Request {
            trace!(conversation = %message.conversation_id, "non-request performative; dropped");
            return;
        }
        // Handlers may re-enter the engine; call them with the borrow
        // released.
        let handlers: Vec<MessageHandler> = self.handlers.borrow().clone();
        for handler in handlers {
            handler(message);
        }
    }

    pub fn send_inform(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::Request,
            Performative::Inform,
            message,
        );
    }

    pub fn send_agree(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::Request,
            Performative::Agree,
            message,
        );
    }

    pub fn send_refuse(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::Request,
            Performative::Refuse,
            message,
        );
    }

    pub fn send_failure(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::Request,
            Performative::Failure,
            message,
        );
    }

    pub fn send_not_understood(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::Request,
            Performative::NotUnderstood,
            message,
        );
    }
}

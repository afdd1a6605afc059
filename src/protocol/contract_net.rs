// protocol/contract_net.rs - FIPA Contract Net protocol engines

//! Task allocation through two-phase bidding.
//!
//! The initiator broadcasts a CFP and tallies, per receiver, every
//! performative seen on the conversation. The CFP phase ends when each
//! receiver has answered PROPOSE or REFUSE, or when the CFP timer fires,
//! whichever comes first; the task is then resumed with the
//! CFP-phase-complete signal and typically answers the proposals through
//! the guarded accept/reject helpers. The result phase ends, and the
//! session with it, once every accepted receiver reported INFORM or
//! FAILURE, or when the session timer fires.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::acl_message::{AclMessage, AgentId, ConversationId, Performative, ProtocolType};
use crate::protocol::engine::{self, ProtocolError, SessionTable, DEFAULT_SESSION_TIMEOUT};
use crate::session::events::{ControlSignal, MessageEvent, SessionEvent};
use crate::session::runner::{self, Resumption, Session};
use crate::session::task::{SessionDescriptor, SessionEngine};
use crate::transport::{Scheduler, Transport};

/// Default length of the CFP phase, in scheduler time units. Must stay
/// strictly below the session timeout.
pub const DEFAULT_CFP_TIMEOUT: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Cfp,
    Result,
}

/// Per-session negotiation state on the initiator side.
struct Negotiation {
    phase: Phase,
    /// Performatives seen from (or sent to) each CFP receiver.
    receivers: HashMap<AgentId, HashSet<Performative>>,
}

impl Negotiation {
    fn new(receivers: &[AgentId]) -> Self {
        Self {
            phase: Phase::Cfp,
            receivers: receivers
                .iter()
                .cloned()
                .map(|r| (r, HashSet::new()))
                .collect(),
        }
    }

    fn cfp_answered(&self) -> bool {
        self.receivers.values().all(|seen| {
            seen.contains(&Performative::Propose) || seen.contains(&Performative::Refuse)
        })
    }

    /// Every receiver that was sent an ACCEPT_PROPOSAL has reported back.
    /// Receivers that were rejected, refused or never answered owe
    /// nothing.
    fn results_collected(&self) -> bool {
        self.receivers
            .values()
            .filter(|seen| seen.contains(&Performative::AcceptProposal))
            .all(|seen| {
                seen.contains(&Performative::Inform) || seen.contains(&Performative::Failure)
            })
    }
}

/// Contract Net protocol, initiator role.
#[derive(Clone)]
pub struct ContractNetInitiator {
    sessions: SessionTable,
    negotiations: Rc<RefCell<HashMap<ConversationId, Negotiation>>>,
    transport: Rc<dyn Transport>,
    scheduler: Rc<dyn Scheduler>,
    cfp_timeout: u64,
    session_timeout: u64,
}

impl ContractNetInitiator {
    pub fn new(transport: Rc<dyn Transport>, scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            sessions: SessionTable::new(),
            negotiations: Rc::new(RefCell::new(HashMap::new())),
            transport,
            scheduler,
            cfp_timeout: DEFAULT_CFP_TIMEOUT,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }

    /// Override the CFP-phase timeout (time units). Keep it strictly
    /// below the session timeout.
    pub fn with_cfp_timeout(mut self, secs: u64) -> Self {
        self.cfp_timeout = secs;
        self
    }

    /// Override the whole-session timeout (time units).
    pub fn with_session_timeout(mut self, secs: u64) -> Self {
        self.session_timeout = secs;
        self
    }

    pub fn execute(&self, message: &AclMessage) {
        if message.protocol != Some(ProtocolType::ContractNet) {
            return;
        }
        let sid = message.conversation_id.clone();
        let Some(phase) = self
            .negotiations
            .borrow()
            .get(&sid)
            .map(|negotiation| negotiation.phase)
        else {
            trace!(conversation = %sid, "no open negotiation; dropped");
            return;
        };
        let Some(session) = self.sessions.take(&sid) else {
            trace!(conversation = %sid, "no suspended task for negotiation; dropped");
            return;
        };

        let performative = message.performative;
        let event = match (phase, performative) {
            (Phase::Cfp, Performative::Propose) => SessionEvent::Reply(message.clone()),
            (Phase::Cfp, Performative::Refuse) => {
                SessionEvent::Event(MessageEvent::Refuse(message.clone()))
            }
            (Phase::Result, Performative::Inform) => SessionEvent::Reply(message.clone()),
            (Phase::Result, Performative::Failure) => {
                SessionEvent::Event(MessageEvent::Failure(message.clone()))
            }
            (phase, other) => {
                trace!(conversation = %sid, ?phase, ?other, "performative not valid in phase; dropped");
                self.sessions.restore(sid, session);
                return;
            }
        };

        if let Resumption::Keep(session) = runner::resume(session, event) {
            self.sessions.restore(sid.clone(), session);
        }

        // Tally the response and check the phase's completion condition.
        let (cfp_done, results_done) = {
            let mut negotiations = self.negotiations.borrow_mut();
            let Some(negotiation) = negotiations.get_mut(&sid) else {
                return;
            };
            match negotiation.receivers.get_mut(&message.sender) {
                Some(seen) => {
                    seen.insert(performative);
                }
                None => {
                    trace!(conversation = %sid, sender = %message.sender, "response from non-receiver; not tallied");
                }
            }
            match negotiation.phase {
                Phase::Cfp => (negotiation.cfp_answered(), false),
                Phase::Result => (false, negotiation.results_collected()),
            }
        };

        if cfp_done {
            self.end_cfp(&sid);
        } else if results_done {
            self.delete_session(&sid);
        }
    }

    /// Open a negotiation with the CFP's receiver set.
    pub fn send_cfp(&self, message: AclMessage) -> Result<SessionDescriptor, ProtocolError> {
        if message.receivers.is_empty() {
            return Err(ProtocolError::EmptyReceiverSet);
        }
        if self.sessions.contains(&message.conversation_id) {
            return Err(ProtocolError::SessionAlreadyOpen(
                message.conversation_id.clone(),
            ));
        }
        let mut message = message;
        message.set_protocol(ProtocolType::ContractNet);
        message.set_performative(Performative::Cfp);
        Ok(SessionDescriptor::new(Box::new(self.clone()), message))
    }

    /// Accept one proposal. Guarded: a receiver that was already answered
    /// with ACCEPT_PROPOSAL or REJECT_PROPOSAL is not answered twice.
    pub fn send_accept_proposal(&self, message: AclMessage) -> Result<(), ProtocolError> {
        self.answer_proposal(message, Performative::AcceptProposal)
    }

    /// Reject one proposal, with the same idempotency guard.
    pub fn send_reject_proposal(&self, message: AclMessage) -> Result<(), ProtocolError> {
        self.answer_proposal(message, Performative::RejectProposal)
    }

    fn answer_proposal(
        &self,
        message: AclMessage,
        performative: Performative,
    ) -> Result<(), ProtocolError> {
        let sid = message.conversation_id.clone();
        let receiver = message
            .receivers
            .first()
            .cloned()
            .ok_or(ProtocolError::EmptyReceiverSet)?;

        {
            let mut negotiations = self.negotiations.borrow_mut();
            let negotiation = negotiations
                .get_mut(&sid)
                .ok_or_else(|| ProtocolError::UnknownSession(sid.clone()))?;
            let seen = negotiation
                .receivers
                .get_mut(&receiver)
                .ok_or_else(|| ProtocolError::UnknownReceiver(receiver.clone()))?;
            if seen.contains(&Performative::AcceptProposal)
                || seen.contains(&Performative::RejectProposal)
            {
                debug!(conversation = %sid, receiver = %receiver, "proposal already answered; skipped");
                return Ok(());
            }
            seen.insert(performative);
        }

        engine::send_stamped(
            &*self.transport,
            ProtocolType::ContractNet,
            performative,
            message,
        );
        Ok(())
    }

    /// Terminate the CFP phase. Runs at most once per session: the tally
    /// completing and the CFP timer race for it.
    pub fn end_cfp(&self, id: &ConversationId) {
        {
            let mut negotiations = self.negotiations.borrow_mut();
            let Some(negotiation) = negotiations.get_mut(id) else {
                return;
            };
            if negotiation.phase != Phase::Cfp {
                return;
            }
            negotiation.phase = Phase::Result;
        }
        debug!(conversation = %id, "cfp phase complete");

        if let Some(session) = self.sessions.take(id) {
            let event = SessionEvent::Signal(ControlSignal::CfpComplete);
            if let Resumption::Keep(session) = runner::resume(session, event) {
                self.sessions.restore(id.clone(), session);
            }
        }
    }

    pub fn delete_session(&self, id: &ConversationId) {
        self.negotiations.borrow_mut().remove(id);
        self.sessions.delete(id);
    }

    pub fn has_open_session(&self, id: &ConversationId) -> bool {
        self.sessions.contains(id)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl SessionEngine for ContractNetInitiator {
    fn register_session(&self, message: AclMessage, session: Session) {
        let sid = message.conversation_id.clone();
        if !self.sessions.insert(sid.clone(), session) {
            return;
        }
        self.negotiations
            .borrow_mut()
            .insert(sid.clone(), Negotiation::new(&message.receivers));
        self.transport.send(&message);

        let engine = self.clone();
        let cfp_expiring = sid.clone();
        self.scheduler.call_later(
            self.cfp_timeout,
            Box::new(move || engine.end_cfp(&cfp_expiring)),
        );
        let engine = self.clone();
        let expiring = sid.clone();
        self.scheduler.call_later(
            self.session_timeout,
            Box::new(move || engine.delete_session(&expiring)),
        );
        debug!(conversation = %sid, receivers = message.receivers.len(), "negotiation opened");
    }
}

type MessageHandler = Rc<dyn Fn(&AclMessage)>;

/// Contract Net protocol, participant role.
///
/// CFP arrivals are not session-bound: they go straight to the registered
/// handler list whatever their conversation id. A session only opens once
/// the participant proposes, awaiting ACCEPT_PROPOSAL or REJECT_PROPOSAL.
#[derive(Clone)]
pub struct ContractNetParticipant {
    sessions: SessionTable,
    cfp_handlers: Rc<RefCell<Vec<MessageHandler>>>,
    transport: Rc<dyn Transport>,
    scheduler: Rc<dyn Scheduler>,
    session_timeout: u64,
}

impl ContractNetParticipant {
    pub fn new(transport: Rc<dyn Transport>, scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            sessions: SessionTable::new(),
            cfp_handlers: Rc::new(RefCell::new(Vec::new())),
            transport,
            scheduler,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }

    pub fn with_session_timeout(mut self, secs: u64) -> Self {
        self.session_timeout = secs;
        self
    }

    /// Register a callback invoked for every inbound CFP, solicited or
    /// not.
    pub fn add_cfp_handler(&self, handler: impl Fn(&AclMessage) + 'static) {
        self.cfp_handlers.borrow_mut().push(Rc::new(handler));
    }

    pub fn execute(&self, message: &AclMessage) {
        if message.protocol != Some(ProtocolType::ContractNet) {
            return;
        }
        if message.performative == Performative::Cfp {
            let handlers: Vec<MessageHandler> = self.cfp_handlers.borrow().clone();
            for handler in handlers {
                handler(message);
            }
            return;
        }

        let sid = message.conversation_id.clone();
        let Some(session) = self.sessions.take(&sid) else {
            trace!(conversation = %sid, "no open proposal; dropped");
            return;
        };
        let event = match message.performative {
            Performative::AcceptProposal => SessionEvent::Reply(message.clone()),
            Performative::RejectProposal => {
                SessionEvent::Event(MessageEvent::RejectProposal(message.clone()))
            }
            other => {
                trace!(conversation = %sid, ?other, "performative not valid here; dropped");
                self.sessions.restore(sid, session);
                return;
            }
        };

        if let Resumption::Keep(session) = runner::resume(session, event) {
            self.sessions.restore(sid.clone(), session);
        }
        // Both answers are terminal for the proposal session.
        self.delete_session(&sid);
    }

    /// Bid on a CFP; opens a session awaiting the initiator's verdict.
    pub fn send_propose(&self, message: AclMessage) -> Result<SessionDescriptor, ProtocolError> {
        if self.sessions.contains(&message.conversation_id) {
            return Err(ProtocolError::SessionAlreadyOpen(
                message.conversation_id.clone(),
            ));
        }
        let mut message = message;
        message.set_protocol(ProtocolType::ContractNet);
        message.set_performative(Performative::Propose);
        Ok(SessionDescriptor::new(Box::new(self.clone()), message))
    }

    pub fn send_refuse(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::ContractNet,
            Performative::Refuse,
            message,
        );
    }

    pub fn send_inform(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::ContractNet,
            Performative::Inform,
            message,
        );
    }

    pub fn send_failure(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::ContractNet,
            Performative::Failure,
            message,
        );
    }

    pub fn send_not_understood(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::ContractNet,
            Performative::NotUnderstood,
            message,
        );
    }

    pub fn delete_session(&self, id: &ConversationId) {
        self.sessions.delete(id);
    }

    pub fn has_open_session(&self, id: &ConversationId) -> bool {
        self.sessions.contains(id)
    }
}

impl SessionEngine for ContractNetParticipant {
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
        debug!(conversation = %sid, "proposal session opened");
    }
}

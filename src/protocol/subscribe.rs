// protocol/subscribe.rs - FIPA Subscribe protocol engines

//! Publish/subscribe over correlated conversations.
//!
//! The initiator's session has no timeout: an active subscription keeps
//! receiving INFORM indefinitely and only REFUSE/FAILURE are built-in
//! terminal events, so ending the wait is otherwise the caller's call.
//! The participant keeps a durable subscriber set; each stored subscribe
//! message doubles as the template for that subscriber's push-informs.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::acl_message::{AclMessage, AgentId, ConversationId, Performative, ProtocolType};
use crate::protocol::engine::{self, ProtocolError, SessionTable};
use crate::session::events::{MessageEvent, SessionEvent};
use crate::session::runner::{self, Resumption, Session};
use crate::session::task::{SessionDescriptor, SessionEngine};
use crate::transport::Transport;

/// Subscribe protocol, initiator role.
#[derive(Clone)]
pub struct SubscribeInitiator {
    sessions: SessionTable,
    transport: Rc<dyn Transport>,
}

impl SubscribeInitiator {
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self {
            sessions: SessionTable::new(),
            transport,
        }
    }

    pub fn execute(&self, message: &AclMessage) {
        if message.protocol != Some(ProtocolType::Subscribe) {
            return;
        }
        let sid = message.conversation_id.clone();
        let Some(session) = self.sessions.take(&sid) else {
            trace!(conversation = %sid, "no open subscription; dropped");
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

        // Only an outright rejection or failure ends a subscription; an
        // INFORM is the subscription working as intended.
        if matches!(performative, Performative::Refuse | Performative::Failure) {
            self.delete_session(&sid);
        }
    }

    /// Open a subscription. The stamped SUBSCRIBE goes out immediately;
    /// registering the returned descriptor only records the wait.
    pub fn send_subscribe(&self, message: AclMessage) -> Result<SessionDescriptor, ProtocolError> {
        if message.receivers.is_empty() {
            return Err(ProtocolError::EmptyReceiverSet);
        }
        if self.sessions.contains(&message.conversation_id) {
            return Err(ProtocolError::SessionAlreadyOpen(
                message.conversation_id.clone(),
            ));
        }
        let mut message = message;
        message.set_protocol(ProtocolType::Subscribe);
        message.set_performative(Performative::Subscribe);
        self.transport.send(&message);
        Ok(SessionDescriptor::new(Box::new(self.clone()), message))
    }

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

impl SessionEngine for SubscribeInitiator {
    fn register_session(&self, message: AclMessage, session: Session) {
        // The subscribe went out in send_subscribe and subscriptions never
        // expire on their own, so registration is insert-only.
        let sid = message.conversation_id.clone();
        if self.sessions.insert(sid.clone(), session) {
            debug!(conversation = %sid, "subscription opened");
        }
    }
}

type MessageHandler = Rc<dyn Fn(&AclMessage)>;

/// Subscribe protocol, participant role.
#[derive(Clone)]
pub struct SubscribeParticipant {
    transport: Rc<dyn Transport>,
    handlers: Rc<RefCell<Vec<MessageHandler>>>,
    /// Durable membership records; each entry is a subscriber's original
    /// subscribe message and the reply template for its informs.
    subscribers: Rc<RefCell<Vec<AclMessage>>>,
}

impl SubscribeParticipant {
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self {
            transport,
            handlers: Rc::new(RefCell::new(Vec::new())),
            subscribers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Register a callback invoked for every inbound SUBSCRIBE.
    pub fn add_subscribe_handler(&self, handler: impl Fn(&AclMessage) + 'static) {
        self.handlers.borrow_mut().push(Rc::new(handler));
    }

    pub fn execute(&self, message: &AclMessage) {
        if message.protocol != Some(ProtocolType::Subscribe) {
            return;
        }
        if message.performative != Performative::Subscribe {
            trace!(conversation = %message.conversation_id, "non-subscribe performative; dropped");
            return;
        }
        let handlers: Vec<MessageHandler> = self.handlers.borrow().clone();
        for handler in handlers {
            handler(message);
        }
    }

    /// Add a subscriber by recording its subscribe message.
    pub fn subscribe(&self, subscribe_message: AclMessage) {
        let mut subscribers = self.subscribers.borrow_mut();
        let duplicate = subscribers.iter().any(|existing| {
            existing.sender == subscribe_message.sender
                && existing.conversation_id == subscribe_message.conversation_id
        });
        if duplicate {
            debug!(subscriber = %subscribe_message.sender, "already subscribed");
            return;
        }
        debug!(subscriber = %subscribe_message.sender, "subscriber added");
        subscribers.push(subscribe_message);
    }

    /// Remove the first membership record of the given agent. Returns
    /// whether anything was removed.
    pub fn unsubscribe(&self, subscriber: &AgentId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        match subscribers.iter().position(|m| &m.sender == subscriber) {
            Some(index) => {
                subscribers.remove(index);
                debug!(subscriber = %subscriber, "subscriber removed");
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Push an INFORM to every current subscriber.
    ///
    /// Each outgoing message is templated from that subscriber's original
    /// subscribe message, so it echoes the subscriber's own conversation
    /// id and reversed addresses, while carrying the given message's
    /// content, language, ontology and encoding.
    pub fn send_inform(&self, message: &AclMessage) {
        let informs: Vec<AclMessage> = self
            .subscribers
            .borrow()
            .iter()
            .map(|subscribe_message| {
                let mut inform = subscribe_message.reply();
                inform.set_protocol(ProtocolType::Subscribe);
                inform.set_performative(Performative::Inform);
                inform.content = message.content.clone();
                inform.language = message.language.clone();
                inform.ontology = message.ontology.clone();
                inform.encoding = message.encoding.clone();
                inform
            })
            .collect();
        for inform in &informs {
            self.transport.send(inform);
        }
    }

    pub fn send_agree(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::Subscribe,
            Performative::Agree,
            message,
        );
    }

    pub fn send_refuse(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::Subscribe,
            Performative::Refuse,
            message,
        );
    }

    /// Report a publisher-side failure to every current subscriber.
    pub fn send_failure(&self, message: AclMessage) {
        let mut message = message;
        let extra: Vec<AgentId> = self
            .subscribers
            .borrow()
            .iter()
            .map(|m| m.sender.clone())
            .collect();
        message.receivers.extend(extra);
        engine::send_stamped(
            &*self.transport,
            ProtocolType::Subscribe,
            Performative::Failure,
            message,
        );
    }

    pub fn send_not_understood(&self, message: AclMessage) {
        engine::send_stamped(
            &*self.transport,
            ProtocolType::Subscribe,
            Performative::NotUnderstood,
            message,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::events::ControlSignal;
    use crate::session::task::{SessionTask, Step};
    use crate::testing::RecordingTransport;

    struct Listener {
        subscribe: SubscribeInitiator,
        message: AclMessage,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Listener {
        fn push(&self, entry: &str) {
            self.log.borrow_mut().push(entry.to_string());
        }
    }

    impl SessionTask for Listener {
        fn start(&mut self) -> Step {
            match self.subscribe.send_subscribe(self.message.clone()) {
                Ok(descriptor) => Step::Suspend(descriptor),
                Err(_) => Step::Done(None),
            }
        }

        fn resume(&mut self, event: SessionEvent) -> Step {
            match event {
                SessionEvent::Reply(m) => {
                    self.push(&format!("inform:{}", m.text_content().unwrap_or("")));
                    Step::Pending
                }
                SessionEvent::Event(MessageEvent::Agree(_)) => {
                    self.push("agree");
                    Step::Pending
                }
                SessionEvent::Event(MessageEvent::Refuse(_)) => {
                    self.push("refuse");
                    Step::Pending
                }
                SessionEvent::Signal(ControlSignal::ProtocolComplete) => {
                    self.push("complete");
                    Step::Done(None)
                }
                _ => Step::Pending,
            }
        }
    }

    fn subscribe_message(from: &str, conversation: &str) -> AclMessage {
        AclMessage::new(Performative::Subscribe, AgentId::new(from))
            .with_receiver(AgentId::new("publisher"))
            .with_conversation(ConversationId::new(conversation))
            .with_protocol(ProtocolType::Subscribe)
    }

    #[test]
    fn test_informs_keep_arriving_until_refused() {
        let transport = RecordingTransport::new();
        let initiator = SubscribeInitiator::new(Rc::new(transport.clone()));
        let log = Rc::new(RefCell::new(Vec::new()));

        runner::run(Listener {
            subscribe: initiator.clone(),
            message: subscribe_message("listener", "s1"),
            log: Rc::clone(&log),
        });

        let sent = transport.take_sent();
        assert_eq!(sent[0].performative, Performative::Subscribe);

        let mut inform = sent[0].reply();
        inform.set_performative(Performative::Inform);
        initiator.execute(&inform.clone().with_content("tick"));
        initiator.execute(&inform.clone().with_content("tock"));
        assert!(initiator.has_open_session(&ConversationId::new("s1")));

        let mut refuse = sent[0].reply();
        refuse.set_performative(Performative::Refuse);
        initiator.execute(&refuse);

        assert_eq!(
            *log.borrow(),
            ["inform:tick", "inform:tock", "refuse", "complete"]
        );
        assert_eq!(initiator.open_sessions(), 0);
    }

    #[test]
    fn test_broadcast_correlates_per_subscriber() {
        let transport = RecordingTransport::new();
        let participant = SubscribeParticipant::new(Rc::new(transport.clone()));

        participant.subscribe(subscribe_message("alice", "sub-a"));
        participant.subscribe(subscribe_message("bob", "sub-b"));

        let notice =
            AclMessage::new(Performative::Inform, AgentId::new("publisher")).with_content("42");
        participant.send_inform(&notice);

        let sent = transport.take_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].conversation_id, ConversationId::new("sub-a"));
        assert_eq!(sent[0].receivers, vec![AgentId::new("alice")]);
        assert_eq!(sent[1].conversation_id, ConversationId::new("sub-b"));
        assert_eq!(sent[1].receivers, vec![AgentId::new("bob")]);
        assert!(sent.iter().all(|m| m.text_content() == Some("42")));
    }

    #[test]
    fn test_unsubscribe_removes_exactly_the_matching_entry() {
        let transport = RecordingTransport::new();
        let participant = SubscribeParticipant::new(Rc::new(transport.clone()));

        participant.subscribe(subscribe_message("alice", "sub-a"));
        participant.subscribe(subscribe_message("bob", "sub-b"));

        assert!(participant.unsubscribe(&AgentId::new("alice")));
        assert!(!participant.unsubscribe(&AgentId::new("carol")));
        assert_eq!(participant.subscriber_count(), 1);

        participant.send_inform(
            &AclMessage::new(Performative::Inform, AgentId::new("publisher")).with_content("43"),
        );
        let sent = transport.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].receivers, vec![AgentId::new("bob")]);
    }

    #[test]
    fn test_subscribe_handler_runs_per_inbound_subscribe() {
        let transport = RecordingTransport::new();
        let participant = SubscribeParticipant::new(Rc::new(transport.clone()));

        let registrar = participant.clone();
        participant.add_subscribe_handler(move |message| {
            registrar.send_agree(message.reply());
            registrar.subscribe(message.clone());
        });

        participant.execute(&subscribe_message("alice", "sub-a"));

        assert_eq!(participant.subscriber_count(), 1);
        let sent = transport.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].performative, Performative::Agree);
        assert_eq!(sent[0].receivers, vec![AgentId::new("alice")]);
    }
}

// acl_message.rs
// Core FIPA ACL message structures

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Agent identifier with addressing information.
///
/// Opaque as far as the session engines are concerned: they only compare
/// and hash it. Addressing is the transport's business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("{name}")]
pub struct AgentId {
    pub name: String,
    pub addresses: Vec<String>,
}

impl AgentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addresses: Vec::new(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.addresses.push(address.into());
        self
    }
}

/// FIPA performative types used by the session protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Performative {
    AcceptProposal,
    Agree,
    Cfp,
    Failure,
    Inform,
    NotUnderstood,
    Propose,
    Refuse,
    RejectProposal,
    Request,
    Subscribe,
}

/// FIPA interaction protocol identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ProtocolType {
    #[display("FIPA-REQUEST")]
    Request,
    #[display("FIPA-SUBSCRIBE")]
    Subscribe,
    #[display("FIPA-CONTRACT-NET")]
    ContractNet,
}

/// Conversation identifier.
///
/// Caller-chosen correlation token scoping all messages of one interaction
/// instance. Must be unique among an engine's concurrently open sessions;
/// replies echo it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("{_0}")]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random conversation id.
    pub fn fresh() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Content language specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentLanguage {
    FipaSL,
    Xml,
    Rdf,
    Custom(String),
}

/// Content encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Utf8,
    Base64,
    Custom(String),
}

/// Ontology reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyRef(pub String);

/// Message content types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageContent {
    Text(String),
    Binary(Vec<u8>),
    Structured(serde_json::Value),
}

/// Complete ACL message.
///
/// The engines treat this record as immutable once sent; reply helpers
/// build new messages via [`AclMessage::reply`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclMessage {
    pub performative: Performative,
    pub sender: AgentId,
    /// Ordered, non-empty receiver list. The Request initiator additionally
    /// requires exactly one receiver.
    pub receivers: Vec<AgentId>,
    pub protocol: Option<ProtocolType>,
    pub conversation_id: ConversationId,
    pub content: Option<MessageContent>,
    pub language: Option<ContentLanguage>,
    pub encoding: Option<Encoding>,
    pub ontology: Option<OntologyRef>,
}

impl AclMessage {
    pub fn new(performative: Performative, sender: AgentId) -> Self {
        Self {
            performative,
            sender,
            receivers: Vec::new(),
            protocol: None,
            conversation_id: ConversationId::fresh(),
            content: None,
            language: Some(ContentLanguage::FipaSL),
            encoding: Some(Encoding::Utf8),
            ontology: None,
        }
    }

    pub fn with_receiver(mut self, receiver: AgentId) -> Self {
        self.receivers.push(receiver);
        self
    }

    pub fn with_receivers(mut self, receivers: impl IntoIterator<Item = AgentId>) -> Self {
        self.receivers.extend(receivers);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(MessageContent::Text(content.into()));
        self
    }

    pub fn with_structured_content(mut self, content: serde_json::Value) -> Self {
        self.content = Some(MessageContent::Structured(content));
        self
    }

    pub fn with_conversation(mut self, conversation_id: ConversationId) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolType) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn set_protocol(&mut self, protocol: ProtocolType) {
        self.protocol = Some(protocol);
    }

    pub fn set_performative(&mut self, performative: Performative) {
        self.performative = performative;
    }

    /// Text content, when the message carries any.
    pub fn text_content(&self) -> Option<&str> {
        match &self.content {
            Some(MessageContent::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Build a reply: echo the conversation id and protocol, swap
    /// sender/receivers, keep language/encoding/ontology.
    ///
    /// The reply's sender is the first listed receiver of the original,
    /// i.e. the agent that is answering.
    pub fn reply(&self) -> AclMessage {
        AclMessage {
            performative: self.performative,
            sender: self.receivers.first().cloned().unwrap_or_default(),
            receivers: vec![self.sender.clone()],
            protocol: self.protocol,
            conversation_id: self.conversation_id.clone(),
            content: None,
            language: self.language.clone(),
            encoding: self.encoding.clone(),
            ontology: self.ontology.clone(),
        }
    }
}

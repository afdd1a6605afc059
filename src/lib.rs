// lib.rs - FIPA Session Protocol Engines
//
// Suspendable session machinery for the FIPA Request, Subscribe and
// Contract Net interaction protocols, with a join combinator for
// fan-out/fan-in over concurrent sessions.

#![doc = include_str!("../README.md")]

pub mod acl_message;
pub mod protocol;
pub mod session;
pub mod testing;
pub mod transport;

// Re-export commonly used types
pub use acl_message::{
    AclMessage, AgentId, ContentLanguage, ConversationId, Encoding, MessageContent, OntologyRef,
    Performative, ProtocolType,
};

pub use protocol::{
    ContractNetInitiator, ContractNetParticipant, ProtocolError, RequestInitiator,
    RequestParticipant, SubscribeInitiator, SubscribeParticipant,
};

pub use session::{
    gather, ControlSignal, MessageEvent, SessionDescriptor, SessionEngine, SessionEvent,
    SessionTask, Step, TaskOutput,
};

pub use transport::{Scheduler, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::acl_message::{
        AclMessage, AgentId, ConversationId, MessageContent, Performative, ProtocolType,
    };
    pub use crate::protocol::{
        ContractNetInitiator, ContractNetParticipant, ProtocolError, RequestInitiator,
        RequestParticipant, SubscribeInitiator, SubscribeParticipant,
    };
    pub use crate::session::{
        gather, ControlSignal, MessageEvent, SessionEvent, SessionTask, Step, TaskOutput,
    };
    pub use crate::transport::{Scheduler, Transport};
}

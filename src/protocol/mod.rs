// protocol/mod.rs - FIPA Protocol Engines

//! Initiator and participant engines for the FIPA interaction protocols.
//!
//! - `RequestInitiator` / `RequestParticipant` - one-shot request-response
//! - `SubscribeInitiator` / `SubscribeParticipant` - continuous notifications
//! - `ContractNetInitiator` / `ContractNetParticipant` - task allocation
//!   through two-phase bidding
//!
//! Each engine owns an open-session table keyed by conversation id and
//! drives suspended [`SessionTask`](crate::session::SessionTask)
//! computations: inbound messages are correlated, mapped to session
//! events, and injected at the task's suspension point. Traffic that does
//! not match an open session, or is not valid in the session's current
//! phase, is dropped silently.
//!
//! # Example
//!
//! ```ignore
//! use fipa_sessions::protocol::RequestInitiator;
//!
//! let request = RequestInitiator::new(transport, scheduler);
//! agent.on_message(move |m| request.execute(m));
//!
//! // Inside a SessionTask:
//! //   Step::Suspend(request.send_request(message)?)
//! ```

mod contract_net;
mod engine;
mod request;
mod subscribe;

pub use contract_net::{ContractNetInitiator, ContractNetParticipant, DEFAULT_CFP_TIMEOUT};
pub use engine::{ProtocolError, SessionTable, DEFAULT_SESSION_TIMEOUT};
pub use request::{RequestInitiator, RequestParticipant};
pub use subscribe::{SubscribeInitiator, SubscribeParticipant};

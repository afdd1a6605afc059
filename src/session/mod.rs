// session/mod.rs - Suspend/resume session machinery

//! The session engine core.
//!
//! A protocol conversation spans several inbound and outbound messages, but
//! application code authors it as one linear computation: a [`SessionTask`]
//! state machine that suspends by yielding a [`SessionDescriptor`] (or a
//! join request) and is re-driven by the [`runner`] with the value, event
//! or control signal that ends the wait.
//!
//! - [`task`] - the task trait, step type and session descriptor
//! - [`events`] - values injected at suspension points
//! - [`runner`] - generic driver: `run`, `start`, `resume`, `complete`
//! - [`join`] - fan-out/fan-in combinator (`gather`)

pub mod events;
pub mod join;
pub mod runner;
pub mod task;

pub use events::{ControlSignal, MessageEvent, SessionEvent};
pub use join::gather;
pub use runner::{Resumption, Session};
pub use task::{SessionDescriptor, SessionEngine, SessionTask, Step, TaskOutput};

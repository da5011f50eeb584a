//! Application services.
//!
//! Services orchestrate domain types through ports. They depend on
//! `Arc<dyn Port>` and never on a concrete adapter.

pub mod session;

pub use session::{ControllerConfig, SessionController, TurnReply};

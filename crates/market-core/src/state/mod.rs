//! Order lifecycle rules.
//!
//! The role-gated transition table and the side effects each transition
//! carries live here, separate from storage and authorization concerns.

pub mod order;

pub use order::{allowed_transitions, is_allowed, OrderStateMachine, TransitionEffect};

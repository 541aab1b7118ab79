//! Core state machine types.
//!
//! This module contains the vocabulary the builder and the engine share:
//! - Events, event patterns and the type-erased event view
//! - State declarations and source-state patterns
//! - Signature polymorphism for actions, hooks and guards
//! - Guard predicates and their combinators
//! - Transition history

pub mod event;
mod guard;
mod history;
pub mod invoke;
mod pattern;
mod state;

pub use event::{event, AnyEvent, EventPattern, EventType};
pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use invoke::{Action, ActionOutcome, GuardFn, GuardOutcome};
pub use pattern::{StatePattern, StatePredicate, Target};
pub use state::{StateConf, StateId, StateRef};

pub(crate) use invoke::ErasedAction;
pub(crate) use state::Hooks;

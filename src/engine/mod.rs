//! The runtime: regions, composite states, the machine and its queue.
//!
//! Everything here is driven through [`Machine`]. User code reaches back
//! into a running machine only through the [`Scheduler`] it is handed,
//! which defers every request until the current operation has completed.

pub mod error;
pub mod machine;
pub mod path;
pub mod queue;
mod region;
mod scheduler;
pub(crate) mod submachine;
pub(crate) mod transition_hooks;

pub use error::MachineError;
pub use machine::Machine;
pub use path::{PathStep, RegionPath, RegionView, StateView};
pub use queue::SmallEventSize;
pub use scheduler::Scheduler;
pub use transition_hooks::StateChange;

//! Builder API for declaring transition tables and machines.
//!
//! Tables are plain ordered lists of rows. They are digested, validated and
//! resolved against their states when the machine is built, so a machine
//! that builds never fails for configuration reasons later on.

pub(crate) mod digest;
pub mod error;
pub mod machine;
pub(crate) mod resolve;
pub mod transition;
pub(crate) mod validation;

pub use error::{BuildError, ConfError};
pub use machine::{MachineBuilder, MachineOptions, SubmachineConf};
pub use transition::{Transition, TransitionBuilder, TransitionTable};

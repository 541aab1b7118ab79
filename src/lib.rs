//! Stratum: a hierarchical state machine engine
//!
//! A machine is declared as one or more transition tables, each an ordered
//! list of `source --event[guard]/action--> target` rows. Every table becomes
//! a region with exactly one active state. States can own regions of their
//! own, which makes them composite: regions run in parallel and nest to any
//! depth.
//!
//! # Core Concepts
//!
//! - **States**: declared with [`StateConf`], shared as [`StateRef`] handles
//! - **Events**: any `'static` value, matched by type or by [`EventPattern`]
//! - **Actions, guards and hooks**: closures taking only the arguments they
//!   need among scheduler, context and event
//! - **Run-to-completion**: operations requested from user code through the
//!   [`Scheduler`] run after the current one has completed
//! - **Exceptions as events**: a failing action is reinjected as an
//!   [`Exception`](events::Exception) event unless an `on_exception` hook is
//!   configured
//!
//! # Example
//!
//! ```rust
//! use stratum::builder::{MachineBuilder, TransitionBuilder, TransitionTable};
//! use stratum::core::{event, StateConf};
//! use stratum::events::Exception;
//!
//! struct Brew;
//! struct Empty;
//!
//! #[derive(Default)]
//! struct Kettle {
//!     water: u32,
//!     log: Vec<String>,
//! }
//!
//! let idle = StateConf::<Kettle>::new("idle").build();
//! let boiling = StateConf::<Kettle>::new("boiling")
//!     .on_entry(|k: &mut Kettle| -> anyhow::Result<()> {
//!         anyhow::ensure!(k.water > 0, "no water");
//!         k.water -= 1;
//!         Ok(())
//!     })
//!     .build();
//! let fault = StateConf::<Kettle>::new("fault")
//!     .on_entry(|k: &mut Kettle, e: &Exception| k.log.push(e.to_string()))
//!     .build();
//!
//! let table = TransitionTable::new()
//!     .add(&idle, event::<Brew>(), &boiling)
//!     .add(&boiling, event::<Empty>(), &idle)
//!     .add(&boiling, event::<Exception>(), &fault);
//!
//! let mut machine = MachineBuilder::new()
//!     .transition_table(table)
//!     .build(Kettle::default())
//!     .unwrap();
//!
//! machine.process_event(Brew).unwrap();
//! assert!(machine.is_active_state(&fault));
//! assert_eq!(machine.context().log, vec!["no water"]);
//! ```

pub mod builder;
pub mod core;
pub mod engine;
pub mod events;
pub mod snapshot;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder, MachineOptions, SubmachineConf, TransitionTable};
pub use core::{event, EventPattern, Guard, StateConf, StatePattern, StateRef, Target};
pub use engine::{Machine, MachineError, RegionPath, Scheduler, SmallEventSize, StateChange};
pub use snapshot::MachineSnapshot;

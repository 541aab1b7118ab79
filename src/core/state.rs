//! State declarations.
//!
//! A state is declared once with [`StateConf`] and frozen into a
//! [`StateRef`], a cheap shared handle used in transition tables. Every
//! region the state appears in gets its own instance of it, so the same
//! handle can be reused across regions and machines.

use super::event::{AnyEvent, EventPattern};
use super::invoke::{Action, ErasedAction};
use crate::builder::{SubmachineConf, TransitionTable};
use crate::engine::submachine::CompositeFactory;
use crate::engine::Scheduler;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a declared state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(u64);

impl StateId {
    fn next() -> Self {
        Self(NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct EventHook<C> {
    pattern: Option<EventPattern>,
    action: ErasedAction<C>,
}

impl<C> Clone for EventHook<C> {
    fn clone(&self) -> Self {
        Self {
            pattern: self.pattern.clone(),
            action: Arc::clone(&self.action),
        }
    }
}

/// Entry, event and exit hooks of a state, a submachine or a machine.
///
/// Each list is an overload set: for a given event the first applicable hook
/// in registration order runs and the others are skipped.
pub(crate) struct Hooks<C> {
    entry: Vec<ErasedAction<C>>,
    event: Vec<EventHook<C>>,
    exit: Vec<ErasedAction<C>>,
}

impl<C> Default for Hooks<C> {
    fn default() -> Self {
        Self {
            entry: Vec::new(),
            event: Vec::new(),
            exit: Vec::new(),
        }
    }
}

impl<C> Clone for Hooks<C> {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
            event: self.event.clone(),
            exit: self.exit.clone(),
        }
    }
}

impl<C: 'static> Hooks<C> {
    pub(crate) fn add_entry<M>(&mut self, action: impl Action<C, M>) {
        self.entry.push(action.into_erased());
    }

    pub(crate) fn add_event<M>(&mut self, pattern: Option<EventPattern>, action: impl Action<C, M>) {
        self.event.push(EventHook {
            pattern,
            action: action.into_erased(),
        });
    }

    pub(crate) fn add_exit<M>(&mut self, action: impl Action<C, M>) {
        self.exit.push(action.into_erased());
    }
}

impl<C> Hooks<C> {
    pub(crate) fn run_entry(
        &self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<bool> {
        run_first(&self.entry, sched, ctx, event)
    }

    pub(crate) fn run_event(
        &self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<bool> {
        for hook in &self.event {
            if let Some(pattern) = &hook.pattern {
                if !pattern.matches(event.value()) {
                    continue;
                }
            }
            if let Some(outcome) = (hook.action)(sched, ctx, event) {
                outcome?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn run_exit(
        &self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<bool> {
        run_first(&self.exit, sched, ctx, event)
    }
}

fn run_first<C>(
    hooks: &[ErasedAction<C>],
    sched: &mut Scheduler,
    ctx: &mut C,
    event: AnyEvent<'_>,
) -> anyhow::Result<bool> {
    for hook in hooks {
        if let Some(outcome) = hook(sched, ctx, event) {
            outcome?;
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) struct StateDef<C> {
    pub(crate) id: StateId,
    pub(crate) name: String,
    pub(crate) hooks: Hooks<C>,
    pub(crate) regions: Vec<TransitionTable<C>>,
    pub(crate) submachine: Option<Arc<dyn CompositeFactory<C>>>,
}

/// Shared handle to a declared state.
///
/// Two handles are equal when they come from the same [`StateConf::build`]
/// call, whatever their names.
pub struct StateRef<C>(Arc<StateDef<C>>);

impl<C> StateRef<C> {
    pub fn id(&self) -> StateId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Whether the state owns regions of its own.
    pub fn is_composite(&self) -> bool {
        !self.0.regions.is_empty() || self.0.submachine.is_some()
    }

    pub(crate) fn def(&self) -> &StateDef<C> {
        &self.0
    }
}

impl<C> Clone for StateRef<C> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<C> PartialEq for StateRef<C> {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl<C> Eq for StateRef<C> {}

impl<C> std::hash::Hash for StateRef<C> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl<C> fmt::Debug for StateRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRef")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .finish()
    }
}

/// Builder for a state.
///
/// `C` is the context type the state's hooks operate on. A state becomes
/// composite by adding regions ([`StateConf::region`], sharing `C` with the
/// enclosing machine) or a [`SubmachineConf`] with a context of its own.
///
/// # Example
///
/// ```rust
/// use stratum::core::StateConf;
///
/// #[derive(Default)]
/// struct Door {
///     log: Vec<&'static str>,
/// }
///
/// let open = StateConf::<Door>::new("open")
///     .on_entry(|door: &mut Door| door.log.push("opened"))
///     .on_exit(|door: &mut Door| door.log.push("closing"))
///     .build();
///
/// assert_eq!(open.name(), "open");
/// assert!(!open.is_composite());
/// ```
pub struct StateConf<C> {
    name: String,
    hooks: Hooks<C>,
    regions: Vec<TransitionTable<C>>,
    submachine: Option<Arc<dyn CompositeFactory<C>>>,
}

impl<C: 'static> StateConf<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Hooks::default(),
            regions: Vec::new(),
            submachine: None,
        }
    }

    /// Add an entry hook.
    pub fn on_entry<M>(mut self, action: impl Action<C, M>) -> Self {
        self.hooks.add_entry(action);
        self
    }

    /// Add an in-state event hook, run when no transition row fires.
    ///
    /// A hook typed on an event only runs for that event type.
    pub fn on_event<M>(mut self, action: impl Action<C, M>) -> Self {
        self.hooks.add_event(None, action);
        self
    }

    /// Add an in-state event hook restricted to events matching `pattern`.
    pub fn on_event_for<M>(mut self, pattern: EventPattern, action: impl Action<C, M>) -> Self {
        self.hooks.add_event(Some(pattern), action);
        self
    }

    /// Add an exit hook.
    pub fn on_exit<M>(mut self, action: impl Action<C, M>) -> Self {
        self.hooks.add_exit(action);
        self
    }

    /// Add an orthogonal region sharing the enclosing context.
    pub fn region(mut self, table: TransitionTable<C>) -> Self {
        self.regions.push(table);
        self
    }

    /// Turn the state into a submachine with its own context.
    pub fn submachine<D: 'static>(mut self, conf: SubmachineConf<C, D>) -> Self {
        self.submachine = Some(Arc::new(conf));
        self
    }

    pub fn build(self) -> StateRef<C> {
        StateRef(Arc::new(StateDef {
            id: StateId::next(),
            name: self.name,
            hooks: self.hooks,
            regions: self.regions,
            submachine: self.submachine,
        }))
    }
}

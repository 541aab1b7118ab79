//! Builders for machines and own-context submachines.

use crate::builder::error::BuildError;
use crate::builder::transition::TransitionTable;
use crate::core::{Action, ActionOutcome, ErasedAction, Hooks};
use crate::engine::machine::ExceptionHandler;
use crate::engine::submachine::Submachine;
use crate::engine::transition_hooks::TransitionHooks;
use crate::engine::{Machine, Scheduler, SmallEventSize, StateChange};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Machine-level options.
///
/// Every field has a default, so options can be loaded from a partial
/// document in any serde format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineOptions {
    /// Start the machine as part of [`MachineBuilder::build`].
    pub auto_start: bool,
    /// Defer operations requested while another one runs, and drain them
    /// before returning to the caller.
    pub run_to_completion: bool,
    /// Upper bound on chained anonymous transitions in one region.
    pub max_anonymous_transitions: usize,
    /// Keep a [`StateHistory`](crate::core::StateHistory) of every transition.
    pub record_history: bool,
    /// Inline buffer of the operation queue. Events requested through the
    /// [`Scheduler`] that fit are queued without allocating.
    pub small_event_size: SmallEventSize,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            auto_start: true,
            run_to_completion: true,
            max_anonymous_transitions: 1024,
            record_history: false,
            small_event_size: SmallEventSize::default(),
        }
    }
}

/// Builder for constructing state machines with a fluent API.
///
/// # Example
///
/// ```rust
/// use stratum::builder::{MachineBuilder, TransitionTable};
/// use stratum::core::{event, StateConf};
///
/// struct Press;
///
/// #[derive(Default)]
/// struct Lamp {
///     presses: u32,
/// }
///
/// let off = StateConf::<Lamp>::new("off").build();
/// let on = StateConf::<Lamp>::new("on")
///     .on_entry(|lamp: &mut Lamp| lamp.presses += 1)
///     .build();
///
/// let mut machine = MachineBuilder::new()
///     .transition_table(
///         TransitionTable::new()
///             .add(&off, event::<Press>(), &on)
///             .add(&on, event::<Press>(), &off),
///     )
///     .build(Lamp::default())
///     .unwrap();
///
/// machine.process_event(Press).unwrap();
/// assert!(machine.is_active_state(&on));
/// machine.process_event(Press).unwrap();
/// assert!(machine.is_active_state(&off));
/// assert_eq!(machine.context().presses, 1);
/// ```
pub struct MachineBuilder<C> {
    tables: Vec<TransitionTable<C>>,
    options: MachineOptions,
    hooks: Hooks<C>,
    transition_hooks: TransitionHooks<C>,
    on_exception: Option<ExceptionHandler<C>>,
    on_unprocessed: Option<ErasedAction<C>>,
}

impl<C: 'static> MachineBuilder<C> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            options: MachineOptions::default(),
            hooks: Hooks::default(),
            transition_hooks: TransitionHooks::default(),
            on_exception: None,
            on_unprocessed: None,
        }
    }

    /// Add a root region (at least one is required).
    pub fn transition_table(mut self, table: TransitionTable<C>) -> Self {
        self.tables.push(table);
        self
    }

    pub fn options(mut self, options: MachineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.options.auto_start = auto_start;
        self
    }

    pub fn run_to_completion(mut self, run_to_completion: bool) -> Self {
        self.options.run_to_completion = run_to_completion;
        self
    }

    pub fn max_anonymous_transitions(mut self, limit: usize) -> Self {
        self.options.max_anonymous_transitions = limit;
        self
    }

    pub fn record_history(mut self, record_history: bool) -> Self {
        self.options.record_history = record_history;
        self
    }

    pub fn small_event_size(mut self, size: SmallEventSize) -> Self {
        self.options.small_event_size = size;
        self
    }

    /// Add a machine entry hook, run before the root regions start.
    pub fn on_entry<M>(mut self, action: impl Action<C, M>) -> Self {
        self.hooks.add_entry(action);
        self
    }

    /// Add a machine event hook, run for every event before the root regions
    /// see it.
    pub fn on_event<M>(mut self, action: impl Action<C, M>) -> Self {
        self.hooks.add_event(None, action);
        self
    }

    /// Add a machine exit hook, run after the root regions stopped.
    pub fn on_exit<M>(mut self, action: impl Action<C, M>) -> Self {
        self.hooks.add_exit(action);
        self
    }

    /// Run `hook` before every state transition of a region sharing the
    /// machine context, before the source state is exited.
    ///
    /// Region starts (no source) and stops (no target) count as transitions;
    /// internal transitions do not. Regions of a [`SubmachineConf`] have
    /// their own hooks.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stratum::builder::{MachineBuilder, TransitionTable};
    /// use stratum::core::{event, StateConf};
    /// use stratum::engine::{Scheduler, StateChange};
    ///
    /// struct Press;
    ///
    /// let (off, on) = (
    ///     StateConf::<Vec<String>>::new("off").build(),
    ///     StateConf::<Vec<String>>::new("on").build(),
    /// );
    /// let mut machine = MachineBuilder::new()
    ///     .transition_table(TransitionTable::new().add(&off, event::<Press>(), &on))
    ///     .before_state_transition(
    ///         |_: &mut Scheduler, audit: &mut Vec<String>, change: &StateChange<'_>| {
    ///             audit.push(format!("{} {}", change.region, change.label()))
    ///         },
    ///     )
    ///     .build(Vec::new())
    ///     .unwrap();
    ///
    /// machine.process_event(Press).unwrap();
    /// assert_eq!(machine.context(), &vec!["root[0] null->off", "root[0] off->on"]);
    /// ```
    pub fn before_state_transition<F, R>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Scheduler, &mut C, &StateChange<'_>) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        self.transition_hooks.add_before(hook);
        self
    }

    /// Run `hook` after every state transition, once the target state has
    /// been entered. Same scope as
    /// [`before_state_transition`](MachineBuilder::before_state_transition).
    pub fn after_state_transition<F, R>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Scheduler, &mut C, &StateChange<'_>) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        self.transition_hooks.add_after(hook);
        self
    }

    /// Handle failures of user code here instead of reinjecting them as
    /// [`Exception`](crate::events::Exception) events.
    pub fn on_exception<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Scheduler, &mut C, anyhow::Error) + Send + Sync + 'static,
    {
        self.on_exception = Some(Arc::new(handler));
        self
    }

    /// Called with events that no hook and no region handled.
    pub fn on_unprocessed<M>(mut self, action: impl Action<C, M>) -> Self {
        self.on_unprocessed = Some(action.into_erased());
        self
    }

    /// Build the machine around `context`.
    ///
    /// Every table is validated and all problems are reported together.
    /// With `auto_start`, the machine is started before it is returned.
    pub fn build(self, context: C) -> Result<Machine<C>, BuildError> {
        if self.tables.is_empty() {
            return Err(BuildError::NoTransitionTables);
        }

        let root = Submachine::build(
            &self.tables,
            None,
            &context,
            &self.options,
            &self.transition_hooks,
        )
            .map_err(BuildError::InvalidConfiguration)?;

        let auto_start = self.options.auto_start;
        let mut machine = Machine::new(
            context,
            root,
            self.hooks,
            self.on_exception,
            self.on_unprocessed,
            self.options,
        );
        if auto_start {
            machine.start()?;
        }

        Ok(machine)
    }
}

impl<C: 'static> Default for MachineBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration of a submachine owning a context of its own.
///
/// The context is made from the parent's context when the enclosing region
/// is built, once per region instance. Its hooks and regions operate on `D`.
///
/// # Example
///
/// ```rust
/// use stratum::builder::{MachineBuilder, SubmachineConf, TransitionTable};
/// use stratum::core::{event, StateConf};
/// use stratum::engine::RegionPath;
///
/// struct Tick;
/// struct Reset;
///
/// struct Settings {
///     blink_rate: u32,
/// }
///
/// #[derive(Default)]
/// struct Blinker {
///     rate: u32,
///     ticks: u32,
/// }
///
/// let dark = StateConf::<Blinker>::new("dark").build();
/// let lit = StateConf::<Blinker>::new("lit")
///     .on_entry(|b: &mut Blinker| b.ticks += 1)
///     .build();
///
/// let blinking = StateConf::<Settings>::new("blinking")
///     .submachine(
///         SubmachineConf::new(|s: &Settings| Blinker { rate: s.blink_rate, ticks: 0 })
///             .region(
///                 TransitionTable::new()
///                     .add(&dark, event::<Tick>(), &lit)
///                     .add(&lit, event::<Tick>(), &dark),
///             ),
///     )
///     .build();
///
/// let mut machine = MachineBuilder::new()
///     .transition_table(TransitionTable::new().add(&blinking, event::<Reset>(), &blinking))
///     .build(Settings { blink_rate: 2 })
///     .unwrap();
///
/// machine.process_event(Tick).unwrap();
/// let view = machine.state(&RegionPath::root(), &blinking).unwrap();
/// let blinker = view.context::<Blinker>().unwrap();
/// assert_eq!(blinker.rate, 2);
/// assert_eq!(blinker.ticks, 1);
/// ```
pub struct SubmachineConf<P, D> {
    factory: Arc<dyn Fn(&P) -> D + Send + Sync>,
    tables: Vec<TransitionTable<D>>,
    hooks: Hooks<D>,
    transition_hooks: TransitionHooks<D>,
}

impl<P: 'static, D: 'static> SubmachineConf<P, D> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&P) -> D + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            tables: Vec::new(),
            hooks: Hooks::default(),
            transition_hooks: TransitionHooks::default(),
        }
    }

    /// Add an orthogonal region operating on `D`.
    pub fn region(mut self, table: TransitionTable<D>) -> Self {
        self.tables.push(table);
        self
    }

    pub fn on_entry<M>(mut self, action: impl Action<D, M>) -> Self {
        self.hooks.add_entry(action);
        self
    }

    pub fn on_event<M>(mut self, action: impl Action<D, M>) -> Self {
        self.hooks.add_event(None, action);
        self
    }

    pub fn on_exit<M>(mut self, action: impl Action<D, M>) -> Self {
        self.hooks.add_exit(action);
        self
    }

    /// Like [`MachineBuilder::before_state_transition`], for the regions of
    /// this submachine.
    pub fn before_state_transition<F, R>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Scheduler, &mut D, &StateChange<'_>) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        self.transition_hooks.add_before(hook);
        self
    }

    pub fn after_state_transition<F, R>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Scheduler, &mut D, &StateChange<'_>) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        self.transition_hooks.add_after(hook);
        self
    }
}

impl<P, D> SubmachineConf<P, D> {
    pub(crate) fn make_context(&self, parent: &P) -> D {
        (self.factory)(parent)
    }

    pub(crate) fn tables(&self) -> &[TransitionTable<D>] {
        &self.tables
    }

    pub(crate) fn hooks(&self) -> &Hooks<D> {
        &self.hooks
    }

    pub(crate) fn transition_hooks(&self) -> &TransitionHooks<D> {
        &self.transition_hooks
    }
}

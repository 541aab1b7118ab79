//! Regions: one transition table's worth of states and an active index.

use super::error::MachineError;
use super::path::{RegionPath, RegionView, StateView};
use super::scheduler::Scheduler;
use super::submachine::{instantiate, Composite};
use super::transition_hooks::{run_hooks, StateChange, TransitionHook, TransitionHooks};
use crate::builder::digest::TransitionDigest;
use crate::builder::resolve::ResolvedTable;
use crate::builder::validation::{into_errors, validate_table};
use crate::builder::{ConfError, MachineOptions, TransitionTable};
use crate::core::{AnyEvent, ErasedAction, StateId, StateRef, StateTransition};
use crate::events::Null;
use chrono::Utc;
use tracing::{debug, error, trace};

/// Active index of a stopped region.
const STOPPED: usize = usize::MAX;

/// A state as instantiated in one region.
pub(crate) struct StateInstance<C> {
    state: StateRef<C>,
    composite: Option<Box<dyn Composite<C>>>,
}

impl<C> StateInstance<C> {
    fn enter(&mut self, sched: &mut Scheduler, ctx: &mut C, event: AnyEvent<'_>) -> anyhow::Result<()> {
        self.state.def().hooks.run_entry(sched, ctx, event)?;
        if let Some(composite) = &mut self.composite {
            composite.enter(sched, ctx, event)?;
        }
        Ok(())
    }

    fn handle(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<bool> {
        let handled = self.state.def().hooks.run_event(sched, ctx, event)?;
        let nested = match &mut self.composite {
            Some(composite) => composite.handle(sched, ctx, event)?,
            None => false,
        };
        Ok(handled || nested)
    }

    fn exit(&mut self, sched: &mut Scheduler, ctx: &mut C, event: AnyEvent<'_>) -> anyhow::Result<()> {
        if let Some(composite) = &mut self.composite {
            composite.exit(sched, ctx, event)?;
        }
        self.state.def().hooks.run_exit(sched, ctx, event)?;
        Ok(())
    }

    fn name(&self) -> &str {
        self.state.name()
    }

    fn regions(&self) -> Vec<&dyn RegionView> {
        self.composite
            .as_ref()
            .map(|composite| composite.regions())
            .unwrap_or_default()
    }
}

/// An independent sequential sub-machine.
///
/// Exactly one state is active while the region runs. Events are matched
/// against the rows whose source is the active state, in table order; the
/// first row whose guard holds fires and scanning stops.
pub(crate) struct Region<C> {
    path: RegionPath,
    states: Vec<StateInstance<C>>,
    table: ResolvedTable<C>,
    initial: usize,
    has_null_events: bool,
    active: usize,
    max_anonymous_transitions: usize,
    transition_hooks: TransitionHooks<C>,
}

impl<C: 'static> Region<C> {
    /// Digest, validate and resolve `table`, then instantiate its states.
    ///
    /// Every configuration error found, nested regions included, is returned.
    pub(crate) fn build(
        path: RegionPath,
        table: &TransitionTable<C>,
        ctx: &C,
        options: &MachineOptions,
        transition_hooks: &TransitionHooks<C>,
    ) -> Result<Self, Vec<ConfError>> {
        let digest = TransitionDigest::new(table);
        let mut errors = into_errors(validate_table(&path, table, &digest));

        let mut states = Vec::with_capacity(digest.states.len());
        for state in &digest.states {
            match instantiate(state, &path, ctx, options, transition_hooks) {
                Ok(composite) => states.push(StateInstance {
                    state: state.clone(),
                    composite,
                }),
                Err(nested) => errors.extend(nested),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        let Some(initial) = digest.initial else {
            return Err(vec![ConfError::NoInitialState {
                region: path.to_string(),
            }]);
        };

        let table = ResolvedTable::resolve(table, &digest.states);
        trace!(region = %path, states = states.len(), rows = table.len(), "region built");

        Ok(Self {
            table,
            has_null_events: digest.has_null_events,
            path,
            states,
            initial,
            active: STOPPED,
            max_anonymous_transitions: options.max_anonymous_transitions,
            transition_hooks: transition_hooks.clone(),
        })
    }
}

impl<C> Region<C> {
    pub(crate) fn start(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<()> {
        if self.is_running() {
            trace!(region = %self.path, "region already running");
            return Ok(());
        }

        let initial = self.initial;
        self.observe(self.transition_hooks.before(), sched, ctx, None, Some(initial), event)?;
        self.active = initial;
        debug!(
            region = %self.path,
            state = self.states[initial].name(),
            "region started"
        );
        self.states[initial].enter(sched, ctx, event)?;
        self.observe(self.transition_hooks.after(), sched, ctx, None, Some(initial), event)?;
        self.run_anonymous_transitions(sched, ctx)
    }

    pub(crate) fn stop(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<()> {
        if !self.is_running() {
            trace!(region = %self.path, "region already stopped");
            return Ok(());
        }

        let source = self.active;
        let result = self
            .observe(self.transition_hooks.before(), sched, ctx, Some(source), None, event)
            .and_then(|()| self.states[source].exit(sched, ctx, event));
        debug!(
            region = %self.path,
            state = self.states[source].name(),
            "region stopped"
        );
        self.active = STOPPED;
        result?;
        self.observe(self.transition_hooks.after(), sched, ctx, Some(source), None, event)
    }

    /// Returns whether a transition fired or a hook handled the event.
    pub(crate) fn process_event(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<bool> {
        if !self.is_running() {
            trace!(region = %self.path, event = event.type_name(), "region stopped, event ignored");
            return Ok(false);
        }

        if self.try_transition(sched, ctx, event)? {
            self.run_anonymous_transitions(sched, ctx)?;
            return Ok(true);
        }
        self.states[self.active].handle(sched, ctx, event)
    }

    fn try_transition(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<bool> {
        match self.select_row(sched, ctx, event)? {
            Some(row) => {
                self.fire(row, sched, ctx, event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn select_row(
        &self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<Option<usize>> {
        for &index in self.table.candidates(self.active) {
            let row = self.table.row(index);
            if !row.event.matches(event.value()) {
                continue;
            }
            let allowed = match &row.guard {
                Some(guard) => guard.evaluate(sched, ctx, event)?,
                None => true,
            };
            if allowed {
                return Ok(Some(index));
            }
            trace!(region = %self.path, row = index, "guard rejected transition");
        }
        Ok(None)
    }

    /// Exit source, run action, switch the active index, enter target,
    /// framed by the transition hooks.
    fn fire(
        &mut self,
        index: usize,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<()> {
        let row = self.table.row(index);
        let target = row.target;
        let action = row.action.clone();

        let Some(target) = target else {
            trace!(
                region = %self.path,
                state = self.states[self.active].name(),
                event = event.type_name(),
                "internal transition"
            );
            return run_action(action.as_ref(), sched, ctx, event);
        };

        let source = self.active;
        self.observe(self.transition_hooks.before(), sched, ctx, Some(source), Some(target), event)?;
        self.states[source].exit(sched, ctx, event)?;
        run_action(action.as_ref(), sched, ctx, event)?;
        self.active = target;

        let (from, to) = (self.states[source].name(), self.states[target].name());
        debug!(region = %self.path, from, to, event = event.type_name(), "state transition");
        sched.record(|| StateTransition {
            region: self.path.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            event: event.type_name().to_string(),
            timestamp: Utc::now(),
        });

        self.states[target].enter(sched, ctx, event)?;
        self.observe(self.transition_hooks.after(), sched, ctx, Some(source), Some(target), event)
    }

    /// Run transition hooks for a change from `source` to `target`.
    fn observe(
        &self,
        hooks: &[TransitionHook<C>],
        sched: &mut Scheduler,
        ctx: &mut C,
        source: Option<usize>,
        target: Option<usize>,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<()> {
        if hooks.is_empty() {
            return Ok(());
        }
        let change = StateChange {
            region: &self.path,
            source: source.map(|index| self.states[index].name()),
            event,
            target: target.map(|index| self.states[index].name()),
        };
        run_hooks(hooks, sched, ctx, &change)
    }

    fn run_anonymous_transitions(&mut self, sched: &mut Scheduler, ctx: &mut C) -> anyhow::Result<()> {
        if !self.has_null_events {
            return Ok(());
        }

        let null = Null;
        let event = AnyEvent::of(&null);
        let mut steps = 0;
        while self.try_transition(sched, ctx, event)? {
            steps += 1;
            if steps > self.max_anonymous_transitions {
                error!(
                    region = %self.path,
                    limit = self.max_anonymous_transitions,
                    "anonymous transitions did not settle"
                );
                return Err(MachineError::AnonymousTransitionLimit {
                    region: self.path.to_string(),
                    limit: self.max_anonymous_transitions,
                }
                .into());
            }
        }
        Ok(())
    }

    fn instance(&self, name: &str) -> Option<&StateInstance<C>> {
        self.states.iter().find(|instance| instance.name() == name)
    }
}

fn run_action<C>(
    action: Option<&ErasedAction<C>>,
    sched: &mut Scheduler,
    ctx: &mut C,
    event: AnyEvent<'_>,
) -> anyhow::Result<()> {
    action
        .and_then(|action| action(sched, ctx, event))
        .unwrap_or(Ok(()))
}

impl<C> RegionView for Region<C> {
    fn path(&self) -> &RegionPath {
        &self.path
    }

    fn is_running(&self) -> bool {
        self.active != STOPPED
    }

    fn active_state(&self) -> Option<StateId> {
        self.states.get(self.active).map(|instance| instance.state.id())
    }

    fn active_state_name(&self) -> Option<&str> {
        self.states.get(self.active).map(StateInstance::name)
    }

    fn active_state_index(&self) -> Option<usize> {
        self.is_running().then_some(self.active)
    }

    fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(StateInstance::name).collect()
    }

    fn child_region(&self, state: &str, index: usize) -> Option<&dyn RegionView> {
        self.instance(state)?.regions().get(index).copied()
    }

    fn children(&self) -> Vec<&dyn RegionView> {
        self.states.iter().flat_map(StateInstance::regions).collect()
    }

    fn state(&self, id: StateId) -> Option<StateView<'_>> {
        let (index, instance) = self
            .states
            .iter()
            .enumerate()
            .find(|(_, instance)| instance.state.id() == id)?;
        Some(StateView {
            id,
            name: instance.name(),
            active: index == self.active,
            regions: instance.regions(),
            context: instance
                .composite
                .as_ref()
                .and_then(|composite| composite.context()),
        })
    }
}

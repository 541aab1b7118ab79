//! Hooks observing every external state transition.

use super::path::RegionPath;
use super::scheduler::Scheduler;
use crate::core::{ActionOutcome, AnyEvent};
use std::sync::Arc;

/// A state transition about to happen, or that just happened, in one region.
///
/// Starting a region is a transition from no state to its initial state;
/// stopping it is a transition from its active state to no state. Internal
/// transitions leave the active state alone and are not reported.
#[derive(Clone, Copy, Debug)]
pub struct StateChange<'a> {
    pub region: &'a RegionPath,
    /// `None` when the region is starting.
    pub source: Option<&'a str>,
    pub event: AnyEvent<'a>,
    /// `None` when the region is stopping.
    pub target: Option<&'a str>,
}

impl StateChange<'_> {
    /// `source->target`, with `null` for a missing side.
    pub fn label(&self) -> String {
        format!(
            "{}->{}",
            self.source.unwrap_or("null"),
            self.target.unwrap_or("null")
        )
    }
}

pub(crate) type TransitionHook<C> = Arc<
    dyn Fn(&mut Scheduler, &mut C, &StateChange<'_>) -> anyhow::Result<()> + Send + Sync,
>;

/// Hooks run before and after the transitions of every region sharing a
/// context.
pub(crate) struct TransitionHooks<C> {
    before: Vec<TransitionHook<C>>,
    after: Vec<TransitionHook<C>>,
}

impl<C> Default for TransitionHooks<C> {
    fn default() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
        }
    }
}

impl<C> Clone for TransitionHooks<C> {
    fn clone(&self) -> Self {
        Self {
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

impl<C: 'static> TransitionHooks<C> {
    pub(crate) fn add_before<F, R>(&mut self, hook: F)
    where
        F: Fn(&mut Scheduler, &mut C, &StateChange<'_>) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        self.before.push(erase(hook));
    }

    pub(crate) fn add_after<F, R>(&mut self, hook: F)
    where
        F: Fn(&mut Scheduler, &mut C, &StateChange<'_>) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        self.after.push(erase(hook));
    }
}

impl<C> TransitionHooks<C> {
    pub(crate) fn before(&self) -> &[TransitionHook<C>] {
        &self.before
    }

    pub(crate) fn after(&self) -> &[TransitionHook<C>] {
        &self.after
    }
}

fn erase<C: 'static, F, R>(hook: F) -> TransitionHook<C>
where
    F: Fn(&mut Scheduler, &mut C, &StateChange<'_>) -> R + Send + Sync + 'static,
    R: ActionOutcome,
{
    Arc::new(
        move |sched: &mut Scheduler, ctx: &mut C, change: &StateChange<'_>| {
            hook(sched, ctx, change).into_result()
        },
    )
}

/// Run every hook of `hooks` in registration order, stopping at the first
/// error.
pub(crate) fn run_hooks<C>(
    hooks: &[TransitionHook<C>],
    sched: &mut Scheduler,
    ctx: &mut C,
    change: &StateChange<'_>,
) -> anyhow::Result<()> {
    hooks.iter().try_for_each(|hook| hook(sched, ctx, change))
}

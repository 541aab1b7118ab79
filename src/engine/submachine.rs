//! Composite states: states owning orthogonal regions.
//!
//! A composite either shares the enclosing context ([`Submachine`], built
//! from `StateConf::region`) or owns a context of its own ([`Isolated`],
//! built from a `SubmachineConf`). Both forward entry, events and exit to
//! their regions. Children always start after and stop before their parent's
//! own hooks run.

use super::path::{RegionPath, RegionView};
use super::region::Region;
use super::scheduler::Scheduler;
use super::transition_hooks::TransitionHooks;
use crate::builder::{ConfError, MachineOptions, SubmachineConf, TransitionTable};
use crate::core::{AnyEvent, Hooks, StateRef};
use std::any::Any;
use std::marker::PhantomData;
use tracing::warn;

/// Runtime behavior of a composite state, seen from its parent region.
pub(crate) trait Composite<C> {
    fn enter(&mut self, sched: &mut Scheduler, ctx: &mut C, event: AnyEvent<'_>) -> anyhow::Result<()>;

    fn handle(&mut self, sched: &mut Scheduler, ctx: &mut C, event: AnyEvent<'_>)
        -> anyhow::Result<bool>;

    fn exit(&mut self, sched: &mut Scheduler, ctx: &mut C, event: AnyEvent<'_>) -> anyhow::Result<()>;

    fn regions(&self) -> Vec<&dyn RegionView>;

    /// Own context, for composites that have one.
    fn context(&self) -> Option<&dyn Any> {
        None
    }
}

/// Builds the runtime composite of a state, once per region instance.
pub(crate) trait CompositeFactory<C>: Send + Sync {
    fn instantiate(
        &self,
        state: &str,
        path: &RegionPath,
        parent: &C,
        options: &MachineOptions,
    ) -> Result<Box<dyn Composite<C>>, Vec<ConfError>>;
}

/// Build the composite part of `state`, if it has one.
pub(crate) fn instantiate<C: 'static>(
    state: &StateRef<C>,
    path: &RegionPath,
    ctx: &C,
    options: &MachineOptions,
    transition_hooks: &TransitionHooks<C>,
) -> Result<Option<Box<dyn Composite<C>>>, Vec<ConfError>> {
    let def = state.def();
    if let Some(factory) = &def.submachine {
        return factory
            .instantiate(state.name(), path, ctx, options)
            .map(Some);
    }
    if def.regions.is_empty() {
        return Ok(None);
    }
    let submachine = Submachine::build(
        &def.regions,
        Some((path, state.name())),
        ctx,
        options,
        transition_hooks,
    )?;
    Ok(Some(Box::new(submachine)))
}

/// Orthogonal regions sharing one context.
///
/// An error in one region is logged and raised to the machine; the other
/// regions still see the event, and the failed region counts as having
/// processed it.
pub(crate) struct Submachine<C> {
    regions: Vec<Region<C>>,
}

impl<C: 'static> Submachine<C> {
    /// Build one region per table. `parent` is the enclosing region and the
    /// name of the composite state, `None` for the machine's root regions.
    pub(crate) fn build(
        tables: &[TransitionTable<C>],
        parent: Option<(&RegionPath, &str)>,
        ctx: &C,
        options: &MachineOptions,
        transition_hooks: &TransitionHooks<C>,
    ) -> Result<Self, Vec<ConfError>> {
        let mut regions = Vec::with_capacity(tables.len());
        let mut errors = Vec::new();

        for (index, table) in tables.iter().enumerate() {
            let path = match parent {
                Some((path, state)) => path.then_named(state, index),
                None => RegionPath::region(index),
            };
            match Region::build(path, table, ctx, options, transition_hooks) {
                Ok(region) => regions.push(region),
                Err(region_errors) => errors.extend(region_errors),
            }
        }

        if errors.is_empty() {
            Ok(Self { regions })
        } else {
            Err(errors)
        }
    }
}

impl<C> Submachine<C> {
    pub(crate) fn is_running(&self) -> bool {
        self.regions.iter().any(|region| region.is_running())
    }

    pub(crate) fn region_views(&self) -> Vec<&dyn RegionView> {
        self.regions
            .iter()
            .map(|region| region as &dyn RegionView)
            .collect()
    }
}

fn contain<T>(
    sched: &mut Scheduler,
    path: &RegionPath,
    result: anyhow::Result<T>,
    on_error: T,
) -> T {
    result.unwrap_or_else(|error| {
        warn!(region = %path, error = %error, "region failed");
        sched.raise(error);
        on_error
    })
}

impl<C> Composite<C> for Submachine<C> {
    fn enter(&mut self, sched: &mut Scheduler, ctx: &mut C, event: AnyEvent<'_>) -> anyhow::Result<()> {
        for region in &mut self.regions {
            let result = region.start(sched, ctx, event);
            contain(sched, region.path(), result, ());
        }
        Ok(())
    }

    fn handle(
        &mut self,
        sched: &mut Scheduler,
        ctx: &mut C,
        event: AnyEvent<'_>,
    ) -> anyhow::Result<bool> {
        let mut processed = false;
        for region in &mut self.regions {
            let result = region.process_event(sched, ctx, event);
            processed |= contain(sched, region.path(), result, true);
        }
        Ok(processed)
    }

    fn exit(&mut self, sched: &mut Scheduler, ctx: &mut C, event: AnyEvent<'_>) -> anyhow::Result<()> {
        for region in &mut self.regions {
            let result = region.stop(sched, ctx, event);
            contain(sched, region.path(), result, ());
        }
        Ok(())
    }

    fn regions(&self) -> Vec<&dyn RegionView> {
        self.region_views()
    }
}

/// A submachine with its own context `D`, nested in a machine whose
/// context is `P`.
pub(crate) struct Isolated<P, D> {
    context: D,
    hooks: Hooks<D>,
    inner: Submachine<D>,
    parent: PhantomData<fn(&mut P)>,
}

impl<P, D: 'static> Composite<P> for Isolated<P, D> {
    fn enter(&mut self, sched: &mut Scheduler, _: &mut P, event: AnyEvent<'_>) -> anyhow::Result<()> {
        self.hooks.run_entry(sched, &mut self.context, event)?;
        self.inner.enter(sched, &mut self.context, event)
    }

    fn handle(&mut self, sched: &mut Scheduler, _: &mut P, event: AnyEvent<'_>) -> anyhow::Result<bool> {
        let handled = self.hooks.run_event(sched, &mut self.context, event)?;
        let nested = self.inner.handle(sched, &mut self.context, event)?;
        Ok(handled || nested)
    }

    fn exit(&mut self, sched: &mut Scheduler, _: &mut P, event: AnyEvent<'_>) -> anyhow::Result<()> {
        self.inner.exit(sched, &mut self.context, event)?;
        self.hooks.run_exit(sched, &mut self.context, event)?;
        Ok(())
    }

    fn regions(&self) -> Vec<&dyn RegionView> {
        self.inner.region_views()
    }

    fn context(&self) -> Option<&dyn Any> {
        Some(&self.context)
    }
}

impl<P: 'static, D: 'static> CompositeFactory<P> for SubmachineConf<P, D> {
    fn instantiate(
        &self,
        state: &str,
        path: &RegionPath,
        parent: &P,
        options: &MachineOptions,
    ) -> Result<Box<dyn Composite<P>>, Vec<ConfError>> {
        let context = self.make_context(parent);
        let inner = Submachine::build(
            self.tables(),
            Some((path, state)),
            &context,
            options,
            self.transition_hooks(),
        )?;
        Ok(Box::new(Isolated {
            context,
            hooks: self.hooks().clone(),
            inner,
            parent: PhantomData,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TransitionBuilder;
    use crate::core::{event, StateConf};

    #[derive(Default)]
    struct Ctx {
        log: Vec<String>,
    }

    struct Press;

    fn logged(name: &'static str) -> StateRef<Ctx> {
        StateConf::new(name)
            .on_entry(move |ctx: &mut Ctx| ctx.log.push(format!("{name}::on_entry")))
            .on_exit(move |ctx: &mut Ctx| ctx.log.push(format!("{name}::on_exit")))
            .build()
    }

    fn build(tables: &[TransitionTable<Ctx>]) -> Submachine<Ctx> {
        Submachine::build(
            tables,
            None,
            &Ctx::default(),
            &MachineOptions::default(),
            &TransitionHooks::default(),
        )
        .unwrap()
    }

    #[test]
    fn regions_start_and_stop_in_declared_order() {
        let (a, b) = (logged("a"), logged("b"));
        let mut submachine = build(&[
            TransitionTable::new().add(&a, event::<Press>(), &a),
            TransitionTable::new().add(&b, event::<Press>(), &b),
        ]);
        let (mut sched, mut ctx) = (Scheduler::default(), Ctx::default());

        submachine.enter(&mut sched, &mut ctx, AnyEvent::of(&Press)).unwrap();
        assert!(submachine.is_running());
        submachine.exit(&mut sched, &mut ctx, AnyEvent::of(&Press)).unwrap();

        assert!(!submachine.is_running());
        assert_eq!(
            ctx.log,
            vec!["a::on_entry", "b::on_entry", "a::on_exit", "b::on_exit"]
        );
    }

    #[test]
    fn failing_region_does_not_block_siblings() {
        let (idle, done) = (logged("idle"), logged("done"));
        let failing = TransitionTable::new()
            .transition(
                TransitionBuilder::new()
                    .from(&idle)
                    .on::<Press>()
                    .to(&done)
                    .action(|| -> anyhow::Result<()> { anyhow::bail!("jammed") }),
            )
            .unwrap();
        let (off, on) = (logged("off"), logged("on"));
        let healthy = TransitionTable::new().add(&off, event::<Press>(), &on);

        let mut submachine = build(&[failing, healthy]);
        let (mut sched, mut ctx) = (Scheduler::default(), Ctx::default());
        submachine.enter(&mut sched, &mut ctx, AnyEvent::of(&Press)).unwrap();

        let processed = submachine
            .handle(&mut sched, &mut ctx, AnyEvent::of(&Press))
            .unwrap();

        assert!(processed);
        let raised = sched.take_raised();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].to_string(), "jammed");
        let views = submachine.regions();
        assert_eq!(views[0].active_state_name(), Some("idle"));
        assert_eq!(views[1].active_state_name(), Some("on"));
    }

    #[test]
    fn nested_regions_are_addressed_through_parent() {
        let (red, green) = (logged("red"), logged("green"));
        let inner = TransitionTable::new().add(&red, event::<Press>(), &green);
        let parent = StateConf::<Ctx>::new("lamp").region(inner).build();
        let outer = TransitionTable::new().add(&parent, event::<Press>(), &parent);

        let submachine = build(&[outer]);
        let root = submachine.regions()[0];
        let child = root.child_region("lamp", 0).unwrap();

        assert_eq!(child.path().to_string(), "root[0]/lamp[0]");
        assert_eq!(child.state_names(), vec!["red", "green"]);
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn configuration_errors_of_all_regions_are_collected() {
        let result = Submachine::<Ctx>::build(
            &[TransitionTable::new(), TransitionTable::new()],
            None,
            &Ctx::default(),
            &MachineOptions::default(),
            &TransitionHooks::default(),
        );

        let errors = result.err().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ConfError::EmptyTransitionTable { .. })));
    }
}

//! The root of a state machine.

use super::error::MachineError;
use super::path::{RegionPath, RegionView, StateView};
use super::scheduler::{Operation, OperationTarget, Scheduler};
use super::submachine::{Composite, Submachine};
use crate::builder::MachineOptions;
use crate::core::{AnyEvent, ErasedAction, Hooks, StateHistory, StateRef};
use crate::events::{Exception, Start, Stop};
use crate::snapshot::MachineSnapshot;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, error, trace, warn};
use uuid::Uuid;

pub(crate) type ExceptionHandler<C> =
    Arc<dyn Fn(&mut Scheduler, &mut C, anyhow::Error) + Send + Sync>;

/// A running hierarchical state machine.
///
/// The machine owns its context, its root regions and the queue of deferred
/// operations. Every public operation runs to completion: operations
/// requested by user code through the [`Scheduler`] are executed after the
/// one in progress, in request order, before the call returns.
///
/// Failures of user code go through the exception policy: the
/// `on_exception` hook when one is configured, otherwise the error is
/// reinjected as an [`Exception`] event. Only errors that policy cannot
/// absorb are returned.
pub struct Machine<C> {
    id: Uuid,
    context: C,
    hooks: Hooks<C>,
    root: Submachine<C>,
    scheduler: Scheduler,
    options: MachineOptions,
    on_exception: Option<ExceptionHandler<C>>,
    on_unprocessed: Option<ErasedAction<C>>,
}

impl<C: 'static> Machine<C> {
    pub(crate) fn new(
        context: C,
        root: Submachine<C>,
        hooks: Hooks<C>,
        on_exception: Option<ExceptionHandler<C>>,
        on_unprocessed: Option<ErasedAction<C>>,
        options: MachineOptions,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!(machine = %id, regions = root.region_views().len(), "machine built");
        Self {
            id,
            context,
            hooks,
            root,
            scheduler: Scheduler::new(&options),
            options,
            on_exception,
            on_unprocessed,
        }
    }

    /// Start the machine with the [`Start`] event.
    pub fn start(&mut self) -> Result<(), MachineError> {
        self.start_with(Start)
    }

    /// Start the machine, passing `event` to the entry hooks.
    pub fn start_with<E: Any>(&mut self, event: E) -> Result<(), MachineError> {
        self.submit(Operation::Start, event)
    }

    /// Stop the machine with the [`Stop`] event.
    pub fn stop(&mut self) -> Result<(), MachineError> {
        self.stop_with(Stop)
    }

    pub fn stop_with<E: Any>(&mut self, event: E) -> Result<(), MachineError> {
        self.submit(Operation::Stop, event)
    }

    /// Process `event`.
    ///
    /// Events still waiting in the queue are processed first.
    pub fn process_event<E: Any>(&mut self, event: E) -> Result<(), MachineError> {
        self.submit(Operation::ProcessEvent, event)
    }

    /// Process `event` right away, ahead of anything still queued.
    pub fn process_event_now<E: Any>(&mut self, event: E) -> Result<(), MachineError> {
        self.execute_one_operation(Operation::ProcessEvent, AnyEvent::of(&event))?;
        if self.options.run_to_completion {
            self.process_enqueued_events()?;
        }
        Ok(())
    }

    /// Queue `event` without processing it.
    pub fn enqueue_event<E: Any>(&mut self, event: E) {
        self.scheduler.process_event(event);
    }

    /// Run queued operations until the queue is empty.
    ///
    /// Stops at the first error the exception policy cannot absorb; the
    /// operations behind it stay queued.
    pub fn process_enqueued_events(&mut self) -> Result<(), MachineError> {
        while let Some(call) = self.scheduler.queue.pop() {
            call.invoke(self)?;
        }
        Ok(())
    }

    fn submit<E: Any>(&mut self, operation: Operation, event: E) -> Result<(), MachineError> {
        if !self.options.run_to_completion {
            return self.execute_one_operation(operation, AnyEvent::of(&event));
        }
        if self.scheduler.pending_operations() == 0 {
            self.execute_one_operation(operation, AnyEvent::of(&event))?;
        } else {
            self.scheduler.enqueue(operation, event);
        }
        self.process_enqueued_events()
    }

    /// Serializable view of every region's active state.
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot::capture(self.id, self.is_running(), &self.root.region_views())
    }
}

impl<C> Machine<C> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &MachineOptions {
        &self.options
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Whether any root region is running.
    pub fn is_running(&self) -> bool {
        self.root.is_running()
    }

    pub fn is_running_in(&self, path: &RegionPath) -> bool {
        self.region(path).is_some_and(|region| region.is_running())
    }

    /// Whether `state` is active in one of the root regions.
    pub fn is_active_state<S>(&self, state: &StateRef<S>) -> bool {
        self.root
            .region_views()
            .iter()
            .any(|region| region.active_state() == Some(state.id()))
    }

    pub fn is_active_state_in<S>(&self, path: &RegionPath, state: &StateRef<S>) -> bool {
        self.region(path)
            .is_some_and(|region| region.active_state() == Some(state.id()))
    }

    /// The region at `path`, if there is one.
    pub fn region(&self, path: &RegionPath) -> Option<&dyn RegionView> {
        let mut region = *self.root.region_views().get(path.root_index())?;
        for step in path.steps() {
            region = region.child_region(&step.state, step.region)?;
        }
        Some(region)
    }

    /// The instance of `state` in the region at `path`.
    pub fn state<S>(&self, path: &RegionPath, state: &StateRef<S>) -> Option<StateView<'_>> {
        self.region(path)?.state(state.id())
    }

    /// Recorded transitions, when `record_history` is enabled.
    pub fn history(&self) -> Option<&StateHistory> {
        self.scheduler.history()
    }

    fn run_start(&mut self, event: AnyEvent<'_>) -> anyhow::Result<()> {
        if self.is_running() {
            trace!("machine already running");
            return Ok(());
        }
        self.hooks.run_entry(&mut self.scheduler, &mut self.context, event)?;
        self.root.enter(&mut self.scheduler, &mut self.context, event)?;
        debug!("machine started");
        Ok(())
    }

    fn run_stop(&mut self, event: AnyEvent<'_>) -> anyhow::Result<()> {
        if !self.is_running() {
            trace!("machine already stopped");
            return Ok(());
        }
        self.root.exit(&mut self.scheduler, &mut self.context, event)?;
        self.hooks.run_exit(&mut self.scheduler, &mut self.context, event)?;
        debug!("machine stopped");
        Ok(())
    }

    fn run_process_event(&mut self, event: AnyEvent<'_>) -> anyhow::Result<()> {
        if !self.is_running() {
            trace!("machine stopped, event ignored");
            return Ok(());
        }
        let handled = self.hooks.run_event(&mut self.scheduler, &mut self.context, event)?;
        let processed = self.root.handle(&mut self.scheduler, &mut self.context, event)?;
        if handled || processed {
            return Ok(());
        }

        trace!("event not processed");
        if let Some(hook) = &self.on_unprocessed {
            if let Some(outcome) = hook(&mut self.scheduler, &mut self.context, event) {
                outcome?;
            }
        }
        Ok(())
    }

    /// Apply the exception policy to a failure that happened while `event`
    /// was being handled.
    fn process_exception(
        &mut self,
        error: anyhow::Error,
        event: AnyEvent<'_>,
    ) -> Result<(), MachineError> {
        let error = match error.downcast::<MachineError>() {
            Ok(fatal) => {
                error!(error = %fatal, "machine operation failed");
                return Err(fatal);
            }
            Err(error) => error,
        };

        warn!(error = %error, "user code failed");
        if let Some(handler) = &self.on_exception {
            handler(&mut self.scheduler, &mut self.context, error);
            return Ok(());
        }
        if event.is::<Exception>() {
            error!(error = %error, "exception handling failed");
            return Err(MachineError::UnhandledException(error));
        }

        if self.options.run_to_completion {
            self.scheduler
                .enqueue(Operation::ProcessEvent, Exception::new(error));
            Ok(())
        } else {
            let exception = Exception::new(error);
            self.execute_one_operation(Operation::ProcessEvent, AnyEvent::of(&exception))
        }
    }
}

impl<C> OperationTarget for Machine<C> {
    fn execute_one_operation(
        &mut self,
        operation: Operation,
        event: AnyEvent<'_>,
    ) -> Result<(), MachineError> {
        let span = debug_span!(
            "operation",
            machine = %self.id,
            ?operation,
            event = event.type_name()
        );
        let _entered = span.enter();

        let result = match operation {
            Operation::Start => self.run_start(event),
            Operation::Stop => self.run_stop(event),
            Operation::ProcessEvent => self.run_process_event(event),
        };

        let mut failures = self.scheduler.take_raised();
        failures.extend(result.err());
        for failure in failures {
            self.process_exception(failure, event)?;
        }
        Ok(())
    }
}

impl<C: fmt::Debug> fmt::Debug for Machine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active: Vec<_> = self
            .root
            .region_views()
            .iter()
            .map(|region| region.active_state_name().unwrap_or("-").to_string())
            .collect();
        f.debug_struct("Machine")
            .field("id", &self.id)
            .field("context", &self.context)
            .field("active", &active)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, TransitionBuilder, TransitionTable};
    use crate::core::{event, StateConf};
    use crate::engine::SmallEventSize;

    #[derive(Default, Debug)]
    struct Ctx {
        log: Vec<String>,
    }

    struct Press;
    struct Fail;

    fn logged(name: &'static str) -> StateRef<Ctx> {
        StateConf::new(name)
            .on_entry(move |ctx: &mut Ctx| ctx.log.push(format!("{name}::on_entry")))
            .on_exit(move |ctx: &mut Ctx| ctx.log.push(format!("{name}::on_exit")))
            .build()
    }

    fn on_off() -> (StateRef<Ctx>, StateRef<Ctx>, TransitionTable<Ctx>) {
        let (off, on) = (logged("off"), logged("on"));
        let table = TransitionTable::new()
            .add(&off, event::<Press>(), &on)
            .add(&on, event::<Press>(), &off);
        (off, on, table)
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (_, _, table) = on_off();
        let mut machine = MachineBuilder::new()
            .transition_table(table)
            .on_entry(|ctx: &mut Ctx| ctx.log.push("machine::on_entry".into()))
            .on_exit(|ctx: &mut Ctx| ctx.log.push("machine::on_exit".into()))
            .build(Ctx::default())
            .unwrap();

        machine.start().unwrap();
        machine.stop().unwrap();
        machine.stop().unwrap();

        assert!(!machine.is_running());
        assert_eq!(
            machine.context().log,
            vec![
                "machine::on_entry",
                "off::on_entry",
                "off::on_exit",
                "machine::on_exit"
            ]
        );
    }

    #[test]
    fn stopped_machine_ignores_events() {
        let (off, _, table) = on_off();
        let mut machine = MachineBuilder::new()
            .transition_table(table)
            .auto_start(false)
            .build(Ctx::default())
            .unwrap();

        machine.process_event(Press).unwrap();

        assert!(!machine.is_active_state(&off));
        assert!(machine.context().log.is_empty());
    }

    #[test]
    fn unprocessed_events_reach_hook() {
        let (_, _, table) = on_off();
        let mut machine = MachineBuilder::new()
            .transition_table(table)
            .on_unprocessed(|ctx: &mut Ctx, _: &Fail| ctx.log.push("unprocessed".into()))
            .build(Ctx::default())
            .unwrap();

        machine.process_event(Fail).unwrap();
        machine.process_event(Press).unwrap();

        assert_eq!(
            machine.context().log,
            vec!["off::on_entry", "unprocessed", "off::on_exit", "on::on_entry"]
        );
    }

    #[test]
    fn exception_hook_receives_failure() {
        let (off, on) = (logged("off"), logged("on"));
        let table = TransitionTable::new()
            .transition(
                TransitionBuilder::new()
                    .from(&off)
                    .on::<Press>()
                    .to(&on)
                    .action(|| -> anyhow::Result<()> { anyhow::bail!("wiring fault") }),
            )
            .unwrap();
        let mut machine = MachineBuilder::new()
            .transition_table(table)
            .on_exception(|_: &mut Scheduler, ctx: &mut Ctx, error: anyhow::Error| {
                ctx.log.push(format!("caught: {error}"))
            })
            .build(Ctx::default())
            .unwrap();

        machine.process_event(Press).unwrap();

        assert!(machine.context().log.contains(&"caught: wiring fault".to_string()));
    }

    #[test]
    fn failure_while_handling_exception_is_returned() {
        let idle = logged("idle");
        let table = TransitionTable::new()
            .transition(
                TransitionBuilder::new()
                    .from(&idle)
                    .on::<Press>()
                    .internal()
                    .action(|| -> anyhow::Result<()> { anyhow::bail!("first") }),
            )
            .unwrap()
            .transition(
                TransitionBuilder::new()
                    .from(&idle)
                    .on::<Exception>()
                    .internal()
                    .action(|| -> anyhow::Result<()> { anyhow::bail!("second") }),
            )
            .unwrap();
        let mut machine = MachineBuilder::new()
            .transition_table(table)
            .build(Ctx::default())
            .unwrap();

        let error = machine.process_event(Press).unwrap_err();

        assert!(matches!(error, MachineError::UnhandledException(_)));
        assert_eq!(error.to_string(), "Unhandled exception: second");
    }

    #[test]
    fn requests_from_hooks_are_deferred() {
        let off = logged("off");
        let on = StateConf::new("on")
            .on_entry(|sched: &mut Scheduler, ctx: &mut Ctx, _: &Press| {
                ctx.log.push("on::on_entry".into());
                sched.process_event(Press);
            })
            .on_exit(|ctx: &mut Ctx| ctx.log.push("on::on_exit".into()))
            .build();
        let table = TransitionTable::new()
            .add(&off, event::<Press>(), &on)
            .add(&on, event::<Press>(), &off);
        let mut machine = MachineBuilder::new()
            .transition_table(table)
            .build(Ctx::default())
            .unwrap();

        machine.process_event(Press).unwrap();

        assert!(machine.is_active_state(&off));
        assert_eq!(
            machine.context().log,
            vec![
                "off::on_entry",
                "off::on_exit",
                "on::on_entry",
                "on::on_exit",
                "off::on_entry"
            ]
        );
    }

    #[test]
    fn without_run_to_completion_requests_wait_for_explicit_drain() {
        let (off, on, table) = on_off();
        let mut machine = MachineBuilder::new()
            .transition_table(table)
            .run_to_completion(false)
            .build(Ctx::default())
            .unwrap();

        machine.enqueue_event(Press);
        assert!(machine.is_active_state(&off));

        machine.process_enqueued_events().unwrap();
        assert!(machine.is_active_state(&on));
    }

    #[test]
    fn process_event_now_skips_the_queue() {
        let (off, on, table) = on_off();
        let mut machine = MachineBuilder::new()
            .transition_table(table)
            .run_to_completion(false)
            .build(Ctx::default())
            .unwrap();

        machine.enqueue_event(Press);
        machine.process_event_now(Press).unwrap();
        assert!(machine.is_active_state(&on));

        machine.process_enqueued_events().unwrap();
        assert!(machine.is_active_state(&off));
    }

    #[test]
    fn region_lookup_follows_path() {
        let (_, _, table) = on_off();
        let machine = MachineBuilder::new()
            .transition_table(table)
            .build(Ctx::default())
            .unwrap();

        assert!(machine.region(&RegionPath::root()).is_some());
        assert!(machine.region(&RegionPath::region(1)).is_none());
        assert!(machine.region(&RegionPath::root().then_named("off", 0)).is_none());
        assert!(machine.is_running_in(&RegionPath::root()));
    }

    #[test]
    fn queued_events_use_configured_inline_buffer() {
        struct Reading([usize; 4]);

        let (_, _, table) = on_off();
        let mut roomy = MachineBuilder::new()
            .transition_table(table)
            .small_event_size(SmallEventSize::Words4)
            .build(Ctx::default())
            .unwrap();
        let (_, _, table) = on_off();
        let mut tight = MachineBuilder::new()
            .transition_table(table)
            .build(Ctx::default())
            .unwrap();

        roomy.enqueue_event(Reading([1; 4]));
        tight.enqueue_event(Reading([1; 4]));

        assert!(roomy.scheduler.queue.pop().unwrap().is_inline());
        assert!(!tight.scheduler.queue.pop().unwrap().is_inline());
    }
}

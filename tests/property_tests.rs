//! Property-based tests for the machine engine.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use chrono::Utc;
use proptest::prelude::*;
use stratum::builder::{MachineBuilder, TransitionBuilder, TransitionTable};
use stratum::core::{event, Guard, StateConf, StateHistory, StateRef, StateTransition};
use stratum::engine::{Machine, RegionPath, Scheduler};

#[derive(Clone, Copy, Debug)]
enum Input {
    A,
    B,
    C,
}

struct A;
struct B;
struct C;

#[derive(Default, Debug)]
struct Trace {
    log: Vec<String>,
    evaluated: Vec<usize>,
}

prop_compose! {
    fn arbitrary_input()(variant in 0..3u8) -> Input {
        match variant {
            0 => Input::A,
            1 => Input::B,
            _ => Input::C,
        }
    }
}

fn send(machine: &mut Machine<Trace>, input: Input) {
    let result = match input {
        Input::A => machine.process_event(A),
        Input::B => machine.process_event(B),
        Input::C => machine.process_event(C),
    };
    result.unwrap();
}

fn traced(name: &'static str) -> StateRef<Trace> {
    StateConf::new(name)
        .on_entry(move |t: &mut Trace| t.log.push(format!("{name}::on_entry")))
        .on_exit(move |t: &mut Trace| t.log.push(format!("{name}::on_exit")))
        .build()
}

/// Three states wired so that every input is meaningful somewhere.
fn triangle() -> (Vec<StateRef<Trace>>, Machine<Trace>) {
    let states = vec![traced("s0"), traced("s1"), traced("s2")];
    let table = TransitionTable::new()
        .add(&states[0], event::<A>(), &states[1])
        .add(&states[1], event::<A>(), &states[2])
        .add(&states[2], event::<B>(), &states[0])
        .add(&states[1], event::<C>(), &states[0]);
    let machine = MachineBuilder::new()
        .transition_table(table)
        .build(Trace::default())
        .unwrap();
    (states, machine)
}

proptest! {
    #[test]
    fn exactly_one_state_is_active(inputs in prop::collection::vec(arbitrary_input(), 0..40)) {
        let (states, mut machine) = triangle();

        for input in inputs {
            send(&mut machine, input);

            let active = states
                .iter()
                .filter(|state| machine.is_active_state(*state))
                .count();
            prop_assert_eq!(active, 1);
            let region = machine.region(&RegionPath::root()).unwrap();
            prop_assert!(region.active_state_index().is_some());
        }
    }

    #[test]
    fn entries_and_exits_alternate(inputs in prop::collection::vec(arbitrary_input(), 0..40)) {
        let (_, mut machine) = triangle();

        for input in inputs {
            send(&mut machine, input);
        }

        let log = &machine.context().log;
        for (i, line) in log.iter().enumerate() {
            let expected = if i % 2 == 0 { "on_entry" } else { "on_exit" };
            prop_assert!(line.ends_with(expected), "{} at {}", line, i);
        }
    }

    #[test]
    fn first_passing_guard_wins(guards in prop::collection::vec(any::<bool>(), 1..6)) {
        let idle = traced("idle");
        let targets: Vec<_> = (0..guards.len())
            .map(|i| StateConf::<Trace>::new(format!("t{i}")).build())
            .collect();

        let mut table = TransitionTable::new();
        for (i, (&allow, target)) in guards.iter().zip(&targets).enumerate() {
            table = table
                .transition(
                    TransitionBuilder::new()
                        .from(&idle)
                        .on::<A>()
                        .to(target)
                        .guard(Guard::new(move |t: &mut Trace| {
                            t.evaluated.push(i);
                            allow
                        })),
                )
                .unwrap();
        }
        let mut machine = MachineBuilder::new()
            .transition_table(table)
            .build(Trace::default())
            .unwrap();

        machine.process_event(A).unwrap();

        match guards.iter().position(|&allow| allow) {
            Some(winner) => {
                prop_assert!(machine.is_active_state(&targets[winner]));
                let expected: Vec<usize> = (0..=winner).collect();
                prop_assert_eq!(&machine.context().evaluated, &expected);
            }
            None => {
                prop_assert!(machine.is_active_state(&idle));
                prop_assert_eq!(machine.context().evaluated.len(), guards.len());
            }
        }
    }

    #[test]
    fn deferred_events_run_in_request_order(count in 1usize..8) {
        let idle = traced("idle");
        let table = TransitionTable::new()
            .transition(
                TransitionBuilder::new()
                    .from(&idle)
                    .on::<A>()
                    .internal()
                    .action(move |sched: &mut Scheduler, t: &mut Trace, _: &A| {
                        for n in 0..count {
                            sched.process_event(n);
                        }
                        t.log.push("outer done".to_string());
                    }),
            )
            .unwrap()
            .transition(
                TransitionBuilder::new()
                    .from(&idle)
                    .on::<usize>()
                    .internal()
                    .action(|t: &mut Trace, n: &usize| t.log.push(format!("inner {n}"))),
            )
            .unwrap();
        let mut machine = MachineBuilder::new()
            .transition_table(table)
            .build(Trace::default())
            .unwrap();

        machine.process_event(A).unwrap();

        let mut expected = vec!["idle::on_entry".to_string(), "outer done".to_string()];
        expected.extend((0..count).map(|n| format!("inner {n}")));
        prop_assert_eq!(&machine.context().log, &expected);
    }

    #[test]
    fn repeated_stop_runs_exit_hooks_once(stops in 1usize..5) {
        let (_, mut machine) = triangle();

        for _ in 0..stops {
            machine.stop().unwrap();
        }

        prop_assert!(!machine.is_running());
        prop_assert_eq!(
            &machine.context().log,
            &vec!["s0::on_entry".to_string(), "s0::on_exit".to_string()]
        );
    }

    #[test]
    fn guard_is_deterministic(threshold in 0u32..100, value in 0u32..100) {
        let guard = Guard::new(move |n: &mut u32| *n >= threshold);
        let mut context = value;
        let result1 = guard.check(&mut context, &A);
        let result2 = guard.check(&mut context, &A);
        prop_assert_eq!(result1, result2);
        prop_assert_eq!(result1, value >= threshold);
    }

    #[test]
    fn history_preserves_order(names in prop::collection::vec("[a-z]{1,8}", 1..10)) {
        let mut history = StateHistory::new();
        let mut from = "initial".to_string();

        for to in &names {
            history.push(StateTransition {
                region: "root[0]".to_string(),
                from: from.clone(),
                to: to.clone(),
                event: "A".to_string(),
                timestamp: Utc::now(),
            });
            from = to.clone();
        }

        let path = history.get_path();
        prop_assert_eq!(path.len(), names.len() + 1);
        prop_assert_eq!(path[0], "initial");
        for (i, name) in names.iter().enumerate() {
            prop_assert_eq!(path[i + 1], name.as_str());
        }
    }

    #[test]
    fn history_record_is_pure(from in "[a-z]{1,8}", to in "[a-z]{1,8}") {
        let history = StateHistory::new();

        let transition = StateTransition {
            region: "root[0]".to_string(),
            from,
            to,
            event: "A".to_string(),
            timestamp: Utc::now(),
        };

        let new_history = history.record(transition);

        prop_assert_eq!(history.transitions().len(), 0);
        prop_assert_eq!(new_history.transitions().len(), 1);
    }
}

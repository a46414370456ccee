use proptest::prelude::*;
use spark_sim::{
    inputs, server_fn, test_server, Result, ServerBuilder, ServerReturn, SessionOptions, SimulationSession,
};

#[derive(Debug, Clone)]
enum Step {
    Set(&'static str, i64),
    SetBoth(i64, i64),
    Elapse(u64),
}

fn dashboard(server: &mut ServerBuilder, _: &()) -> Result<ServerReturn> {
    let sum = server.reactive("sum", |cx| Ok(cx.input::<i64>("a")? + cx.input::<i64>("b")?))?;
    let ticks = server.timer("ticks", 100, |cx| Ok(cx.previous::<u32>().map_or(0, |n| n + 1)))?;
    server.output("out", move |cx| Ok(format!("{} @ {}", cx.get(&sum)?, cx.get(&ticks)?)))?;
    server.reactive("unused", |cx| cx.input::<i64>("a"))?;
    Ok(ServerReturn::reactive(&sum))
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (prop_oneof![Just("a"), Just("b")], -50i64..50).prop_map(|(name, v)| Step::Set(name, v)),
        (-50i64..50, -50i64..50).prop_map(|(a, b)| Step::SetBoth(a, b)),
        (0u64..400).prop_map(Step::Elapse),
    ]
}

/// Replay `steps` in a fresh session, recording what a test would observe.
fn replay(steps: &[Step]) -> Vec<String> {
    test_server(dashboard, (), |session| {
        let mut observed = Vec::with_capacity(steps.len());
        for step in steps {
            let outcome = match step {
                Step::Set(name, v) => session.set_input(name, *v).map(|r| r.recomputed),
                Step::SetBoth(a, b) => session.set_inputs(inputs! { "a" => *a, "b" => *b }).map(|r| r.recomputed),
                Step::Elapse(ms) => session.elapse(*ms).map(|r| r.fired.len() as u64),
            };
            observed.push(format!("{outcome:?} {:?} t={:?}", session.output::<String>("out"), session.now()));
        }
        Ok(observed)
    })
    .unwrap_or_default()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_same_steps_same_observations(steps in prop::collection::vec(step_strategy(), 0..24)) {
        prop_assert_eq!(replay(&steps), replay(&steps));
    }

    #[test]
    fn test_batch_recomputes_shared_reader_once(a in -1000i64..1000, b in -1000i64..1000) {
        let counts = test_server(dashboard, (), |session| {
            let report = session.set_inputs(inputs! { "a" => a, "b" => b })?;
            Ok((report.pass, session.compute_count("sum")?, session.get_returned::<i64>()?))
        })
        .unwrap();

        prop_assert_eq!(counts, (1, 1, a + b));
    }

    #[test]
    fn test_unread_reactive_stays_unevaluated(steps in prop::collection::vec(step_strategy(), 0..24)) {
        let count = test_server(dashboard, (), |session| {
            for step in &steps {
                let _ = match step {
                    Step::Set(name, v) => session.set_input(name, *v).map(|_| ()),
                    Step::SetBoth(a, b) => session.set_inputs(inputs! { "a" => *a, "b" => *b }).map(|_| ()),
                    Step::Elapse(ms) => session.elapse(*ms).map(|_| ()),
                };
            }
            session.compute_count("unused")
        })
        .unwrap();

        prop_assert_eq!(count, 0);
    }

    #[test]
    fn test_any_elapse_fires_a_due_timer_once(interval in 1u64..500, multiple in 1u64..6, extra in 0u64..500) {
        let elapsed = interval * multiple + extra % interval;
        let ticking = server_fn(|server, interval: &u64| {
            server.timer("ticks", *interval, |cx| Ok(cx.previous::<u32>().map_or(0, |n| n + 1)))?;
            Ok(ServerReturn::nothing())
        });
        let options = SessionOptions::new().flush_on_start(true);
        let ticks = SimulationSession::start_with(options, ticking, interval, |session| {
            let report = session.elapse(elapsed)?;
            assert_eq!(report.fired.len(), 1);
            session.get::<u32>("ticks")
        })
        .unwrap();

        prop_assert_eq!(ticks, 1);
    }
}

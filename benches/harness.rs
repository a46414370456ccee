//! Benchmarks for spark-sim
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use spark_sim::{
    inputs, server_fn, test_server, Reactive, Result, ServerBuilder, ServerReturn, SimulationSession,
};

/// Linear chain of `depth` reactives over input `x`, rendered by one output.
fn chain(server: &mut ServerBuilder, depth: &usize) -> Result<ServerReturn> {
    let mut tail: Reactive<i64> = server.reactive("r0", |cx| cx.input::<i64>("x"))?;
    for i in 1..*depth {
        let prev = tail;
        tail = server.reactive(&format!("r{i}"), move |cx| Ok(cx.get(&prev)? + 1))?;
    }
    server.output("out", move |cx| cx.get(&tail))?;
    Ok(ServerReturn::nothing())
}

/// `width` outputs each reading both `a` and `b`.
fn fan_out(server: &mut ServerBuilder, width: &usize) -> Result<ServerReturn> {
    for i in 0..*width {
        server.output(&format!("o{i}"), |cx| Ok(cx.input::<i64>("a")? * cx.input::<i64>("b")?))?;
    }
    Ok(ServerReturn::nothing())
}

// =============================================================================
// FLUSH BENCHMARKS
// =============================================================================

fn bench_chain_set_input(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_set_input");
    for depth in [10usize, 50, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            test_server(chain, depth, |session| {
                let mut x = 0i64;
                b.iter(|| {
                    x += 1;
                    black_box(session.set_input("x", x))
                });
                Ok(())
            })
            .ok();
        });
    }
    group.finish();
}

fn bench_fan_out_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_batch");
    for width in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            test_server(fan_out, width, |session| {
                let mut n = 0i64;
                b.iter(|| {
                    n += 1;
                    black_box(session.set_inputs(inputs! { "a" => n, "b" => n + 1 }))
                });
                Ok(())
            })
            .ok();
        });
    }
    group.finish();
}

fn bench_idle_flush(c: &mut Criterion) {
    c.bench_function("idle_flush_1000", |b| {
        test_server(fan_out, 1000usize, |session| {
            session.set_inputs(inputs! { "a" => 1i64, "b" => 2i64 })?;
            b.iter(|| black_box(session.flush()));
            Ok(())
        })
        .ok();
    });
}

// =============================================================================
// SESSION BENCHMARKS
// =============================================================================

fn bench_session_start(c: &mut Criterion) {
    c.bench_function("session_start_chain_100", |b| {
        b.iter(|| black_box(test_server(chain, 100usize, |session| session.node_names().map(|n| n.len()))))
    });
}

fn bench_timer_elapse(c: &mut Criterion) {
    let ticking = server_fn(|server, _: &()| {
        let ticks = server.timer("ticks", 100, |cx| Ok(cx.previous::<u64>().map_or(0, |n| n + 1)))?;
        server.output("shown", move |cx| Ok(cx.get(&ticks)?.to_string()))?;
        Ok(ServerReturn::nothing())
    });
    c.bench_function("timer_elapse", |b| {
        SimulationSession::start(&ticking, (), |session| {
            b.iter(|| black_box(session.elapse(100)));
            Ok(())
        })
        .ok();
    });
}

criterion_group!(flush_benches, bench_chain_set_input, bench_fan_out_batch, bench_idle_flush);
criterion_group!(session_benches, bench_session_start, bench_timer_elapse);
criterion_main!(flush_benches, session_benches);

//! # Steering Control Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use steer_lib::{
    pid_ctrl::{Gains, PidController},
    steer_ctrl::{InputData, Params, SteerCtrl},
};
use util::module::State;

fn steer_ctrl_benchmark(c: &mut Criterion) {
    // ---- Build a controller with short trials ----

    let mut params = Params::default();
    params.initial_gains = Gains::new(0.2, 0.004, 3.0);
    params.twiddle.initial_probe_sizes = vec![0.1, 0.001, 1.0];
    params.trial.grace_ticks = 10;
    params.trial.ignore_ticks = 20;
    params.trial.window_ticks = 50;

    let mut steer_ctrl = match SteerCtrl::new(params) {
        Ok(s) => s,
        Err(e) => panic!("Could not create SteerCtrl: {}", e),
    };

    // Slowly oscillating cross track error at a steady speed
    let inputs: Vec<InputData> = (0..1000)
        .map(|i| InputData {
            cte: 0.5 * (i as f64 * 0.05).sin(),
            speed: 20.0,
        })
        .collect();

    // ---- Benchmarks ----

    c.bench_function("pid_compute", |b| {
        let mut pid = PidController::new(Gains::new(0.2, 0.004, 3.0));
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % inputs.len();
            pid.compute(black_box(inputs[i].cte))
        })
    });

    c.bench_function("steer_ctrl_proc", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % inputs.len();
            steer_ctrl.proc(black_box(&inputs[i])).ok()
        })
    });
}

criterion_group!(benches, steer_ctrl_benchmark);
criterion_main!(benches);

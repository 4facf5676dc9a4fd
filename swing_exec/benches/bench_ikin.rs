//! # Inverse Kinematics and Strike Planning Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use comms_if::eqpt::ball::BallState;
use nalgebra::{DVector, Vector3};
use swing_lib::{
    chain::{KinematicChain, TaskSpace},
    ikin::IkSolver,
    resolver::Resolver,
    swing_ctrl::{PlanRequest, Planner, SwingCtrlParams},
    traj_gen::TrajStart,
};

const PARAMS_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../params/swing_ctrl.toml");

fn ikin_benchmark(c: &mut Criterion) {
    let params: SwingCtrlParams = util::params::load_from_path(PARAMS_PATH).unwrap();

    // ---- Exact pose solve ----

    let chain = KinematicChain::new(&params.chain).unwrap();
    let resolver = Resolver::new(params.resolver.clone());
    let style = params.resolver.default_style.clone();
    let solver = IkSolver::new(&chain, &resolver, &params.ikin);

    // Target taken from a configuration away from the seed so the solve has
    // some work to do
    let seed = chain.rest_config().clone();
    let (offset, _) = chain
        .config(seed.as_vector() + DVector::from_element(chain.num_joints(), 0.15))
        .unwrap();
    let target = chain.forward_kinematics(&offset);

    c.bench_function("IkSolver::solve::position_normal", |b| {
        b.iter(|| {
            solver
                .solve(TaskSpace::PositionNormal, &target, &seed, &style)
                .unwrap()
        })
    });
    c.bench_function("IkSolver::solve::full", |b| {
        b.iter(|| solver.solve(TaskSpace::Full, &target, &seed, &style).unwrap())
    });

    // ---- Full strike plan ----

    let planner = Planner::new(&params).unwrap();
    let req = PlanRequest {
        id: 0,
        ball: BallState {
            position_m: [0.0, 3.0, 1.0],
            velocity_ms: [0.0, -4.0, 3.0],
            timestamp_s: 0.0,
        },
        start: TrajStart {
            time_s: 0.05,
            q: seed.clone(),
            qd: DVector::zeros(chain.num_joints()),
        },
        goal_m: Vector3::from(params.hit_planner.default_goal_m),
        style: style.clone(),
    };

    c.bench_function("Planner::plan_strike", |b| {
        b.iter(|| planner.plan_strike(&req))
    });
}

criterion_group!(benches, ikin_benchmark);
criterion_main!(benches);

//! End-to-end tests of the interior-point driver on the reference model.

use sand_core::ipm::merit::exact_merit;
use sand_core::ipm::step::{fraction_to_boundary, max_feasible_step_sizes};
use sand_core::{
    optimize, BlockState, DriverStats, KktSystem, Segment, SolveStatus, SolverError,
    SolverSettings, SpringChain,
};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[test]
fn test_spring_chain_converges_to_solid_design() {
    let mut chain = SpringChain::new(4, 0.5);
    let settings = SolverSettings::default();

    let result = optimize(&mut chain, &settings).expect("solve failed");

    println!("status = {}", result.status);
    println!("objective = {:.6}", result.objective);
    println!("iterations = {}", result.info.iterations);
    println!("density = {:?}", result.state.block(Segment::Density));

    assert_eq!(result.status, SolveStatus::Optimal);
    assert!(result.info.iterations < settings.max_iter);
    assert_eq!(result.info.barrier_size, settings.barrier_min);

    // More material means a stiffer chain: the bounds drive the density to
    // the solid limit.
    for &rho in result.state.block(Segment::Density) {
        assert!(rho > 0.9 && rho < 1.0 + 1e-6, "density {rho} not near solid");
    }

    // Interior-point feasibility held to the end.
    for seg in Segment::SLACKS.iter().chain(&Segment::SLACK_MULTIPLIERS) {
        assert!(
            result.state.block_is_strictly_positive(*seg),
            "{seg:?} lost positivity"
        );
    }

    // The elasticity constraint is satisfied at the solution: k(ρ) u = f.
    let density = result.state.block(Segment::Density);
    let displacement = result.state.block(Segment::Displacement);
    for (&rho, &u) in density.iter().zip(displacement) {
        let stiffness = 0.2 + 0.8 * rho;
        assert!((stiffness * u - 1.0).abs() < 1e-3, "elasticity violated");
    }
}

#[test]
fn test_runs_are_deterministic() {
    let settings = SolverSettings::default();

    let mut first = SpringChain::new(3, 0.4);
    let a = optimize(&mut first, &settings).expect("first solve failed");

    let mut second = SpringChain::new(3, 0.4);
    let b = optimize(&mut second, &settings).expect("second solve failed");

    assert_eq!(a.status, b.status);
    assert_eq!(a.objective, b.objective);
    assert_eq!(a.info.iterations, b.info.iterations);
    assert_eq!(
        a.state.block(Segment::Density),
        b.state.block(Segment::Density)
    );
}

#[test]
fn test_merit_is_pure() {
    let mut chain = SpringChain::new(4, 0.5);
    let state = chain.initial_state();
    let mut stats = DriverStats::default();

    let first = exact_merit(&mut chain, &state, 25.0, 1.0, &mut stats).unwrap();
    let second = exact_merit(&mut chain, &state, 25.0, 1.0, &mut stats).unwrap();
    assert_eq!(first, second);

    // A higher penalty weighs constraint violation more, never less.
    let heavier = exact_merit(&mut chain, &state, 25.0, 10.0, &mut stats).unwrap();
    assert!(heavier >= first);
}

#[test]
fn test_infeasible_start_is_rejected() {
    // A zero volume fraction puts the lower slack on the boundary.
    let mut chain = SpringChain::new(3, 0.0);
    let settings = SolverSettings::default();
    match optimize(&mut chain, &settings) {
        Err(SolverError::InfeasibleStart(_)) => {}
        other => panic!("expected InfeasibleStart, got {other:?}"),
    }
}

#[test]
fn test_invalid_settings_are_rejected() {
    let mut chain = SpringChain::new(3, 0.5);
    let settings = SolverSettings {
        tol_kkt: 0.0,
        ..Default::default()
    };
    match optimize(&mut chain, &settings) {
        Err(SolverError::InvalidSettings(_)) => {}
        other => panic!("expected InvalidSettings, got {other:?}"),
    }
}

#[test]
fn test_step_sizes_keep_reference_state_interior() {
    // Random interior states and random steps on the reference problem's
    // shape: the selected lengths always preserve non-negativity after the
    // fraction-to-boundary contraction.
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    for _ in 0..50 {
        let mut state = BlockState::zeros(6, 6);
        let mut step = BlockState::zeros(6, 6);
        for seg in Segment::ALL {
            for x in state.block_mut(seg) {
                *x = rng.gen_range(-1.0..1.0);
            }
            for d in step.block_mut(seg) {
                *d = rng.gen_range(-1.0..1.0);
            }
        }
        for &seg in Segment::SLACKS.iter().chain(&Segment::SLACK_MULTIPLIERS) {
            for x in state.block_mut(seg) {
                *x = rng.gen_range(0.05..1.5);
            }
        }

        let barrier_size = rng.gen_range(1e-3..25.0);
        let tau = fraction_to_boundary(barrier_size);
        let (alpha_s, alpha_z) = max_feasible_step_sizes(&state, &step, barrier_size);

        assert!((0.0..=1.0).contains(&alpha_s));
        assert!((0.0..=1.0).contains(&alpha_z));

        let combined = BlockState::linear_combination(tau, &state, alpha_s, &step);
        for &seg in &Segment::SLACKS {
            assert!(combined.block_is_non_negative(seg));
        }
        let combined = BlockState::linear_combination(tau, &state, alpha_z, &step);
        for &seg in &Segment::SLACK_MULTIPLIERS {
            assert!(combined.block_is_non_negative(seg));
        }
    }
}

#[test]
fn test_checkpoint_hook_sees_every_accepted_cycle() {
    // Wrap the reference system to count checkpoint invocations and verify
    // the iteration numbers are strictly increasing.
    struct Watched {
        inner: SpringChain,
        iterations_seen: Vec<usize>,
    }

    impl KktSystem for Watched {
        type Matrix = <SpringChain as KktSystem>::Matrix;

        fn initial_state(&self) -> BlockState {
            self.inner.initial_state()
        }

        fn assemble(
            &mut self,
            state: &BlockState,
            barrier_size: f64,
        ) -> Result<(Self::Matrix, BlockState), sand_core::SystemError> {
            self.inner.assemble(state, barrier_size)
        }

        fn residual(
            &mut self,
            state: &BlockState,
            barrier_size: f64,
        ) -> Result<BlockState, sand_core::SystemError> {
            self.inner.residual(state, barrier_size)
        }

        fn solve(
            &mut self,
            matrix: &Self::Matrix,
            rhs: &BlockState,
        ) -> Result<BlockState, sand_core::SystemError> {
            self.inner.solve(matrix, rhs)
        }

        fn objective(&mut self, state: &BlockState) -> Result<f64, sand_core::SystemError> {
            self.inner.objective(state)
        }

        fn checkpoint(&mut self, _state: &BlockState, iteration: usize) {
            self.iterations_seen.push(iteration);
        }
    }

    let mut watched = Watched {
        inner: SpringChain::new(3, 0.5),
        iterations_seen: Vec::new(),
    };
    let settings = SolverSettings::default();
    let result = optimize(&mut watched, &settings).expect("solve failed");

    assert_eq!(result.status, SolveStatus::Optimal);
    assert!(!watched.iterations_seen.is_empty());
    assert!(watched
        .iterations_seen
        .windows(2)
        .all(|pair| pair[0] < pair[1]));
    assert_eq!(*watched.iterations_seen.last().unwrap(), result.info.iterations);
}

//! Quadrotor Demonstration
//!
//! Drives a quadrotor's altitude to zero over a short horizon. The
//! altitude carries a weight of 1e10 while the lateral offset is only
//! lightly penalized, so the optimizer spends its effort on z alone.

use nalgebra::{DMatrix, DVector};

use ilqr_core::dynamics::Quadrotor;
use ilqr_core::Dynamics;
use ilqr_mpc::{LqrError, Mpc, MpcConfig, QuadCost};

fn main() -> Result<(), LqrError> {
    env_logger::init();

    println!("=== Quadrotor iLQR ===\n");

    let quad = Quadrotor::default();
    let dt = quad.params.dt;
    let n_tau = quad.state_dim() + quad.input_dim();
    let config = MpcConfig {
        horizon: 30,
        max_iterations: 3,
        ..MpcConfig::default()
    };

    // Angles 0.1, vz 1000, z 1e10, thrust 0.01, moments 0.05, rest 1
    let mut weights = DVector::from_element(n_tau, 1.0);
    weights.rows_mut(Quadrotor::ROLL, 3).fill(0.1);
    weights[Quadrotor::VELOCITY + 2] = 1000.0;
    weights[Quadrotor::Z] = 1e10;
    weights[quad.state_dim() + Quadrotor::THRUST] = 0.01;
    weights.rows_mut(quad.state_dim() + Quadrotor::MOMENT, 3).fill(0.05);
    let cost = QuadCost::tiled(DMatrix::from_diagonal(&weights), DVector::zeros(n_tau), 1, config.horizon)?;

    let mut x0 = DVector::zeros(quad.state_dim());
    x0[Quadrotor::Y] = -0.5;
    x0[Quadrotor::Z] = 2.0;
    let current_u = vec![vec![DVector::from_vec(vec![9.8, 0.0, 0.0, 0.0]); config.horizon]];

    println!("Initial position: [{:.3}, {:.3}, {:.3}]", x0[Quadrotor::X], x0[Quadrotor::Y], x0[Quadrotor::Z]);

    let mpc = Mpc::from_config(quad, &config);
    let result = mpc.solve(&cost, &[x0], dt, Some(&current_u))?;

    for record in &result.history {
        println!("iter {}: cost {:.6e}{}", record.iteration, record.cost, if record.accepted { " *" } else { "" });
    }

    let trajectory = &result.trajectories()[0];
    println!("\n=== Trajectory ===\n");
    for (t, state) in trajectory.states.iter().enumerate().step_by(5) {
        println!(
            "t={:.3}s pos: [{:+.4}, {:+.4}, {:+.4}] vz={:+.4}",
            t as f64 * dt,
            state[Quadrotor::X],
            state[Quadrotor::Y],
            state[Quadrotor::Z],
            state[Quadrotor::VELOCITY + 2]
        );
    }

    let last = trajectory.final_state();
    println!("\nFinal position: [{:+.6}, {:+.6}, {:+.6}]", last[Quadrotor::X], last[Quadrotor::Y], last[Quadrotor::Z]);
    println!("Final cost: {:.6e}", trajectory.cost);

    Ok(())
}

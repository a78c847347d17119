//! Cart-Pole Demonstration
//!
//! Runs the iLQR driver on a cart-pole hanging at θ = π, starting from a
//! sinusoidal nominal force, and prints the optimized trajectory.
//!
//! Run with `RUST_LOG=debug` to see the per-iteration costs.

use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};

use ilqr_core::dynamics::CartPole;
use ilqr_mpc::{LqrError, Mpc, QuadCost};

fn main() -> Result<(), LqrError> {
    env_logger::init();

    println!("=== Cart-Pole iLQR ===\n");

    let system = CartPole::default();
    let dt = system.params.dt;
    let horizon = 5;
    let n_tau = 5;

    println!("Pole length: {} m", system.params.length);
    println!("Cart mass: {} kg, pole mass: {} kg", system.params.cart_mass, system.params.pole_mass);

    let cost = QuadCost::tiled(DMatrix::identity(n_tau, n_tau), DVector::zeros(n_tau), 1, horizon)?;
    let x_init = vec![DVector::from_vec(vec![0.0, 0.0, PI, 0.0])];
    let current_u = vec![(0..horizon)
        .map(|t| DVector::from_vec(vec![(t as f64 * dt).sin()]))
        .collect::<Vec<_>>()];

    let mpc = Mpc::new(system, horizon, 15, 1e-4);
    let result = mpc.solve(&cost, &x_init, dt, Some(&current_u))?;

    println!("\n=== Iterations ===\n");
    for record in result.history_of(0) {
        println!(
            "iter {:2}: cost {:.6} best {:.6}{}",
            record.iteration,
            record.cost,
            record.best_cost,
            if record.accepted { " *" } else { "" }
        );
    }

    let trajectory = &result.trajectories()[0];
    println!("\n=== Trajectory ===\n");
    for (t, state) in trajectory.states.iter().enumerate() {
        let input = trajectory.inputs.get(t).map_or(String::from("-"), |u| format!("{:+.6}", u[0]));
        println!(
            "t={:.2}s x={:+.6} ẋ={:+.6} θ={:.6} θ̇={:+.6} F={}",
            t as f64 * dt,
            state[0],
            state[1],
            state[2],
            state[3],
            input
        );
    }
    println!("\nFinal cost: {:.6}", trajectory.cost);

    Ok(())
}

//! Spring-chain demo for the SAND interior-point solver.
//!
//! Optimizes the material distribution of a chain of grounded springs under
//! a center-heavy load and prints the resulting density field.

use sand_core::{optimize, Segment, SolverSettings, SpringChain};

fn main() {
    let n = 16;

    // Load concentrated toward the middle of the chain.
    let load: Vec<f64> = (0..n)
        .map(|i| {
            let x = (i as f64 + 0.5) / n as f64;
            0.25 + 1.5 * (-(x - 0.5) * (x - 0.5) / 0.02).exp()
        })
        .collect();

    let mut chain = SpringChain::with_load(n, 0.5, load);
    let settings = SolverSettings {
        verbose: true,
        ..Default::default()
    };

    match optimize(&mut chain, &settings) {
        Ok(result) => {
            println!();
            println!("status     : {}", result.status);
            println!("compliance : {:.6}", result.objective);
            println!("iterations : {}", result.info.iterations);
            println!("time       : {} ms", result.info.solve_time_ms);
            println!();
            println!("density distribution:");
            for (i, &rho) in result.state.block(Segment::Density).iter().enumerate() {
                let bar = "#".repeat((rho * 40.0).round() as usize);
                println!("{i:>3} {rho:>7.4} {bar}");
            }
        }
        Err(err) => {
            eprintln!("solve failed: {err}");
            std::process::exit(1);
        }
    }
}

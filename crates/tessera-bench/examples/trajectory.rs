//! End-to-end trajectory example.
//!
//! Demonstrates: build a profile → advance in sampling windows → read
//! populations → checkpoint → keep running → restore → replay.

use tessera_bench::reference_profile;
use tessera_core::CompId;

fn main() {
    println!("=== Tessera Trajectory Example ===\n");

    let mut solver = reference_profile(42);
    let a = solver.statedef().spec_by_name("A").unwrap();
    let b = solver.statedef().spec_by_name("B").unwrap();

    // --- Sampled run ---
    println!("Sampling every 5 ms to t = 50 ms");
    for window in 1..=10 {
        let t = f64::from(window) * 5.0e-3;
        solver.run(t).unwrap();
        println!(
            "  t={:>6.1} ms: A={:>6}, B={:>6}, events={:>8}",
            solver.time() * 1.0e3,
            solver.comp_count(CompId(0), a).unwrap(),
            solver.comp_count(CompId(0), b).unwrap(),
            solver.steps(),
        );
    }

    // --- Checkpoint, run on, restore, replay ---
    let mut image = Vec::new();
    solver.checkpoint(&mut image).unwrap();
    println!("\nCheckpoint at t=50 ms: {} bytes", image.len());

    solver.run(0.1).unwrap();
    let (first_a, first_b) = (
        solver.comp_count(CompId(0), a).unwrap(),
        solver.comp_count(CompId(0), b).unwrap(),
    );
    println!("Continued to t=100 ms: A={first_a}, B={first_b}");

    solver.restore(&mut image.as_slice()).unwrap();
    println!("Restored to t={:.1} ms", solver.time() * 1.0e3);
    solver.run(0.1).unwrap();
    let (second_a, second_b) = (
        solver.comp_count(CompId(0), a).unwrap(),
        solver.comp_count(CompId(0), b).unwrap(),
    );
    println!("Replayed to t=100 ms: A={second_a}, B={second_b}");

    assert_eq!((first_a, first_b), (second_a, second_b));
    println!("\nReplay matched the original run event for event.");
    println!("Done.");
}

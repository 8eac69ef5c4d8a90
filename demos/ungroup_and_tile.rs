//! Example: Splitting a grouped axis and tiling a new one
//!
//! `(ab)c->bac` splits the first axis into two factors given the size of
//! one of them. `ij->ijk` broadcasts along a new trailing axis.
//!
//! Run with: cargo run --example ungroup_and_tile

use shape_equation::{compile, compile_with_config, DenseTensor, PlannerConfig};

fn main() {
    println!("=== Ungroup and Tile Example ===\n");

    // Example 1: the size of `a` is supplied, `b` is 12 / 4 = 3
    println!("Example 1: (ab)c->bac on [12, 5] with a=4");
    let plan = compile("(ab)c->bac", vec![12, 5], &[("a", 4)]).unwrap();
    println!("{}", plan);

    // Example 2: the same equation without simplification shows every step
    println!("Example 2: (ab)->(ba) on [6] with a=2, unsimplified");
    let plan = compile_with_config("(ab)->(ba)", vec![6], &[("a", 2)], &PlannerConfig::unsimplified())
        .unwrap();
    println!("{}", plan);

    // Example 3: tiling
    println!("Example 3: ij->ijk on [2, 3] with k=4");
    let x = DenseTensor::iota(vec![2, 3]);
    let y = x.einshape("ij->ijk", &[("k", 4)]).unwrap();
    println!("Result shape: {:?}", y.shape());
    println!("Result data: {:?}\n", y.data());

    // Example 4: a size that does not divide the grouped axis
    println!("Example 4: (ab)->ab on [12] with a=5");
    match compile("(ab)->ab", vec![12], &[("a", 5)]) {
        Ok(plan) => println!("Unexpected plan: {}", plan),
        Err(e) => println!("Rejected: {}", e),
    }
}

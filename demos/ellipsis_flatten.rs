//! Example: Ellipsis equations
//!
//! Shows one equation applied across inputs of different ranks, and what
//! can be compiled from a rank alone.
//!
//! Run with: cargo run --example ellipsis_flatten

use shape_equation::{compile, InputShape};

fn main() {
    println!("=== Ellipsis Example ===\n");

    for shape in [vec![2], vec![2, 3], vec![2, 3, 4], vec![2, 3, 4, 5]] {
        let plan = compile("n...->n(...)", shape.clone(), &[]).unwrap();
        println!(
            "n...->n(...) on {:?}: {} op(s), output {:?}",
            shape,
            plan.len(),
            plan.output_shape
        );
    }
    println!();

    // Swap the outer axes, keeping everything in between
    let plan = compile("a...b->b...a", vec![2, 3, 4, 5, 6], &[]).unwrap();
    println!("{}", plan);

    // From a rank alone, sizes are left for the runtime to infer
    let plan = compile("ij...->ji...", InputShape::Rank(4), &[]).unwrap();
    println!("{}", plan);

    // Flattening needs at least one of the two remaining axes to be known
    match compile("n...->n(...)", InputShape::Rank(3), &[]) {
        Ok(plan) => println!("{}", plan),
        Err(e) => println!("n...->n(...) from rank 3: {}", e),
    }
}

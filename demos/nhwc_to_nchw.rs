//! Example: NHWC to NCHW
//!
//! Compiles a layout change between channels-last and channels-first
//! images, runs it on a small tensor, and checks that the reverse
//! equation restores the input.
//!
//! Run with: cargo run --example nhwc_to_nchw

use shape_equation::{compile, DenseBackend, DenseTensor};

fn main() {
    println!("=== NHWC -> NCHW Example ===\n");

    let shape = vec![2, 3, 4, 5];
    let plan = compile("nhwc->nchw", shape.clone(), &[]).unwrap();
    println!("{}", plan);

    let images = DenseTensor::iota(shape);
    let transposed = plan.execute(&DenseBackend, images.clone()).unwrap();
    println!("Transposed shape: {:?}", transposed.shape());

    // Pixel (n=1, h=2, w=3, c=4) now lives at (n=1, c=4, h=2, w=3).
    assert_eq!(transposed.get(&[1, 4, 2, 3]), images.get(&[1, 2, 3, 4]));

    let back = transposed.einshape("nchw->nhwc", &[]).unwrap();
    assert_eq!(back, images);
    println!("Round trip through nchw->nhwc restores the input");

    println!("\nPlan as JSON:\n{}", plan.to_json().unwrap());
}

//! Property-based tests for shape equation plans
//!
//! These tests use proptest to check that plans are deterministic, that
//! permutation equations invert each other, and that elements land where
//! the equation says.

use proptest::prelude::*;
use shape_equation::{compile, DenseBackend, DenseTensor};

const LETTERS: &[char] = &['a', 'b', 'c', 'd', 'e'];

// ============================================================================
// Test Utilities
// ============================================================================

/// Strategy for small input shapes of rank 1 to 5
fn dims_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..4, 1..=LETTERS.len())
}

/// Strategy for a shape together with a permutation of its axes
fn permuted_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    dims_strategy().prop_flat_map(|dims| {
        let perm = Just((0..dims.len()).collect::<Vec<_>>()).prop_shuffle();
        (Just(dims), perm)
    })
}

fn letters(axes: impl IntoIterator<Item = usize>) -> String {
    axes.into_iter().map(|axis| LETTERS[axis]).collect()
}

/// `abc->cab` style equation moving input axis `perm[i]` to output axis `i`
fn permutation_equation(perm: &[usize]) -> String {
    format!("{}->{}", letters(0..perm.len()), letters(perm.iter().copied()))
}

fn inverse(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (i, &axis) in perm.iter().enumerate() {
        inverse[axis] = i;
    }
    inverse
}

fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for axis in (0..shape.len()).rev() {
        index[axis] = flat % shape[axis];
        flat /= shape[axis];
    }
    index
}

// ============================================================================
// Plan Properties
// ============================================================================

proptest! {
    /// Property: the same inputs always give the same plan
    #[test]
    fn prop_deterministic((dims, perm) in permuted_strategy()) {
        let equation = permutation_equation(&perm);
        let first = compile(&equation, dims.clone(), &[]).unwrap();
        let second = compile(&equation, dims, &[]).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Property: an equation with identical sides compiles to an empty plan
    #[test]
    fn prop_identity_is_noop(dims in dims_strategy(), grouped in any::<bool>()) {
        let side = if grouped && dims.len() >= 2 {
            format!("({}){}", letters(0..2), letters(2..dims.len()))
        } else {
            letters(0..dims.len())
        };
        let input = if grouped && dims.len() >= 2 {
            let mut merged = vec![dims[0] * dims[1]];
            merged.extend_from_slice(&dims[2..]);
            merged
        } else {
            dims.clone()
        };
        let sizes = [("a", dims[0])];
        let plan = compile(&format!("{}->{}", side, side), input, &sizes).unwrap();
        prop_assert!(plan.is_noop(), "{} produced {:?}", side, plan.ops);
    }

    /// Property: a permutation followed by its inverse restores the input
    #[test]
    fn prop_inverse_pair((dims, perm) in permuted_strategy()) {
        let x = DenseTensor::iota(dims);
        let forward = x.einshape(&permutation_equation(&perm), &[]).unwrap();
        let back = forward.einshape(&permutation_equation(&inverse(&perm)), &[]).unwrap();
        prop_assert_eq!(back, x);
    }

    /// Property: output element at index `i` comes from the input index
    /// with the permuted coordinates
    #[test]
    fn prop_transpose_places_elements((dims, perm) in permuted_strategy()) {
        let x = DenseTensor::iota(dims);
        let y = x.einshape(&permutation_equation(&perm), &[]).unwrap();

        for flat in 0..y.data().len() {
            let out = unravel(flat, y.shape());
            let mut source = vec![0; out.len()];
            for (i, &axis) in perm.iter().enumerate() {
                source[axis] = out[i];
            }
            prop_assert_eq!(y.get(&out), x.get(&source));
        }
    }

    /// Property: without tiling the element count is conserved; each tiling
    /// index multiplies it by its size
    #[test]
    fn prop_element_count(
        (dims, perm) in permuted_strategy(),
        merge in any::<bool>(),
        tile in 1usize..4,
    ) {
        let total: usize = dims.iter().product();
        let right = letters(perm.iter().copied());
        let right = if merge && right.len() >= 2 {
            format!("({}){}", &right[..2], &right[2..])
        } else {
            right
        };

        let equation = format!("{}->{}", letters(0..dims.len()), right);
        let plan = compile(&equation, dims.clone(), &[]).unwrap();
        let y = plan.execute(&DenseBackend, DenseTensor::iota(dims.clone())).unwrap();
        prop_assert_eq!(y.data().len(), total);

        let tiled = format!("{}->z{}", letters(0..dims.len()), right);
        let plan = compile(&tiled, dims.clone(), &[("z", tile)]).unwrap();
        let y = plan.execute(&DenseBackend, DenseTensor::iota(dims)).unwrap();
        prop_assert_eq!(y.data().len(), total * tile);
        prop_assert_eq!(y.shape()[0], tile);
    }
}

//! Primitive shape operations and compiled plans
//!
//! A [`Plan`] is an ordered list of [`ShapeOp`]s. It owns no reference to the
//! array it will act on; a [`Backend`] interprets each op against its own
//! tensor type.

use serde::{Deserialize, Serialize};

use crate::backend::Backend;

/// One entry of a reshape target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "WireDim", try_from = "WireDim")]
pub enum ReshapeDim {
    Fixed(usize),
    /// Whatever size makes the element count match; at most one per reshape.
    Infer,
}

/// JSON form of a [`ReshapeDim`]: a non-negative size, or `-1` for `Infer`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum WireDim {
    Size(u64),
    Sentinel(i64),
}

impl From<ReshapeDim> for WireDim {
    fn from(dim: ReshapeDim) -> Self {
        match dim {
            // usize is at most 64 bits wide on every supported target.
            ReshapeDim::Fixed(size) => WireDim::Size(size as u64),
            ReshapeDim::Infer => WireDim::Sentinel(-1),
        }
    }
}

impl TryFrom<WireDim> for ReshapeDim {
    type Error = String;

    fn try_from(value: WireDim) -> Result<Self, Self::Error> {
        match value {
            WireDim::Size(size) => usize::try_from(size)
                .map(ReshapeDim::Fixed)
                .map_err(|_| format!("reshape size {} does not fit in usize", size)),
            WireDim::Sentinel(-1) => Ok(ReshapeDim::Infer),
            WireDim::Sentinel(other) => Err(format!("invalid reshape size {}", other)),
        }
    }
}

impl std::fmt::Display for ReshapeDim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReshapeDim::Fixed(size) => write!(f, "{}", size),
            ReshapeDim::Infer => write!(f, "-1"),
        }
    }
}

/// A framework-neutral shape operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ShapeOp {
    /// Reorder axes: output axis `i` is input axis `perm[i]`
    Transpose { perm: Vec<usize> },
    /// Reinterpret the row-major element order under a new shape
    Reshape { shape: Vec<ReshapeDim> },
    /// Repeat the array `multiples[i]` times along axis `i`
    Tile { multiples: Vec<usize> },
}

impl ShapeOp {
    /// Output shape given the input shape; `None` marks sizes only known at
    /// run time, or too large for `usize`.
    pub fn transform_shape(&self, input: &[Option<usize>]) -> Vec<Option<usize>> {
        match self {
            ShapeOp::Transpose { perm } => perm
                .iter()
                .map(|&axis| input.get(axis).copied().flatten())
                .collect(),
            ShapeOp::Tile { multiples } => input
                .iter()
                .zip(multiples)
                .map(|(size, &m)| size.and_then(|s| s.checked_mul(m)))
                .collect(),
            ShapeOp::Reshape { shape } => {
                let total = checked_product(input.iter().copied());
                let fixed = checked_product(shape.iter().map(|dim| match dim {
                    ReshapeDim::Fixed(size) => Some(*size),
                    ReshapeDim::Infer => Some(1),
                }));
                shape
                    .iter()
                    .map(|dim| match dim {
                        ReshapeDim::Fixed(size) => Some(*size),
                        ReshapeDim::Infer => match (total, fixed) {
                            (Some(total), Some(fixed)) if fixed > 0 => Some(total / fixed),
                            _ => None,
                        },
                    })
                    .collect()
            }
        }
    }

    /// Evaluate this op on a concrete tensor
    pub fn execute<T, B: Backend<T> + ?Sized>(&self, backend: &B, x: T) -> Result<T, B::Error> {
        match self {
            ShapeOp::Transpose { perm } => backend.transpose(x, perm),
            ShapeOp::Reshape { shape } => backend.reshape(x, shape),
            ShapeOp::Tile { multiples } => backend.tile(x, multiples),
        }
    }
}

impl std::fmt::Display for ShapeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeOp::Transpose { perm } => write!(f, "transpose{:?}", perm),
            ShapeOp::Reshape { shape } => write!(f, "reshape{}", format_dims(shape)),
            ShapeOp::Tile { multiples } => write!(f, "tile{:?}", multiples),
        }
    }
}

/// Product of `sizes`; `None` if any is unknown or the product overflows
pub fn checked_product(sizes: impl IntoIterator<Item = Option<usize>>) -> Option<usize> {
    sizes
        .into_iter()
        .try_fold(1usize, |acc, size| size.and_then(|size| acc.checked_mul(size)))
}

fn format_dims(dims: &[ReshapeDim]) -> String {
    let inner: Vec<String> = dims.iter().map(ToString::to_string).collect();
    format!("[{}]", inner.join(", "))
}

/// Formats a shape, writing `?` for sizes only known at run time
pub fn format_shape(shape: &[Option<usize>]) -> String {
    let inner: Vec<String> = shape
        .iter()
        .map(|size| match size {
            Some(size) => size.to_string(),
            None => "?".to_string(),
        })
        .collect();
    format!("[{}]", inner.join(", "))
}

/// A compiled equation: the ops realizing it and the shapes around them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Source equation
    pub equation: String,
    /// Input shape the plan was compiled for
    pub input_shape: Vec<Option<usize>>,
    /// Shape produced by the last op
    pub output_shape: Vec<Option<usize>>,
    /// Ops to apply, in order
    pub ops: Vec<ShapeOp>,
}

impl Plan {
    /// True if executing the plan returns its input unchanged
    pub fn is_noop(&self) -> bool {
        self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Shape after each op, starting with the input shape
    pub fn shapes(&self) -> Vec<Vec<Option<usize>>> {
        let mut shapes = vec![self.input_shape.clone()];
        for op in &self.ops {
            let next = op.transform_shape(shapes.last().map(Vec::as_slice).unwrap_or(&[]));
            shapes.push(next);
        }
        shapes
    }

    /// Apply every op to `value` in order
    pub fn execute<T, B: Backend<T> + ?Sized>(&self, backend: &B, value: T) -> Result<T, B::Error> {
        self.ops
            .iter()
            .try_fold(value, |value, op| op.execute(backend, value))
    }

    /// Export to JSON format
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Plan for {}", self.equation)?;
        writeln!(f, "Input shape: {}", format_shape(&self.input_shape))?;
        writeln!(f, "Output shape: {}", format_shape(&self.output_shape))?;
        if self.ops.is_empty() {
            writeln!(f, "(no-op)")?;
        }
        for (i, (op, shape)) in self.ops.iter().zip(self.shapes().iter().skip(1)).enumerate() {
            writeln!(f, "  {}: {} -> {}", i, op, format_shape(shape))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reshape_transform() {
        let op = ShapeOp::Reshape {
            shape: vec![ReshapeDim::Fixed(1), ReshapeDim::Fixed(2), ReshapeDim::Fixed(3)],
        };
        assert_eq!(
            op.transform_shape(&[Some(3), Some(2)]),
            vec![Some(1), Some(2), Some(3)]
        );
    }

    #[test]
    fn test_reshape_infers_one_entry() {
        let op = ShapeOp::Reshape {
            shape: vec![ReshapeDim::Infer, ReshapeDim::Fixed(4)],
        };
        assert_eq!(op.transform_shape(&[Some(6), Some(2)]), vec![Some(3), Some(4)]);
        assert_eq!(op.transform_shape(&[None, Some(2)]), vec![None, Some(4)]);
    }

    #[test]
    fn test_transpose_transform() {
        let op = ShapeOp::Transpose {
            perm: vec![1, 0, 2],
        };
        assert_eq!(
            op.transform_shape(&[Some(4), Some(5), Some(6)]),
            vec![Some(5), Some(4), Some(6)]
        );
    }

    #[test]
    fn test_tile_transform() {
        let op = ShapeOp::Tile {
            multiples: vec![1, 5, 1],
        };
        assert_eq!(
            op.transform_shape(&[Some(2), Some(1), None]),
            vec![Some(2), Some(5), None]
        );
    }

    #[test]
    fn test_json_export() {
        let plan = Plan {
            equation: "(ij)->ji".to_string(),
            input_shape: vec![Some(6)],
            output_shape: vec![Some(3), Some(2)],
            ops: vec![
                ShapeOp::Reshape {
                    shape: vec![ReshapeDim::Infer, ReshapeDim::Fixed(3)],
                },
                ShapeOp::Transpose { perm: vec![1, 0] },
            ],
        };
        let json = plan.to_json().unwrap();
        assert!(json.contains("\"op\": \"reshape\""));
        assert!(json.contains("-1"));

        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn test_transform_overflow_is_unknown() {
        let op = ShapeOp::Tile {
            multiples: vec![usize::MAX, 1],
        };
        assert_eq!(op.transform_shape(&[Some(2), Some(3)]), vec![None, Some(3)]);

        let op = ShapeOp::Reshape {
            shape: vec![ReshapeDim::Infer],
        };
        assert_eq!(op.transform_shape(&[Some(usize::MAX), Some(2)]), vec![None]);
    }

    #[test]
    fn test_large_size_survives_json() {
        let op = ShapeOp::Reshape {
            shape: vec![ReshapeDim::Fixed(usize::MAX), ReshapeDim::Infer],
        };
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, format!(r#"{{"op":"reshape","shape":[{},-1]}}"#, usize::MAX));

        let back: ShapeOp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_negative_sizes_are_rejected() {
        assert!(serde_json::from_str::<ReshapeDim>("-2").is_err());
        assert_eq!(serde_json::from_str::<ReshapeDim>("7").unwrap(), ReshapeDim::Fixed(7));
    }

    #[test]
    fn test_shapes_track_each_op() {
        let plan = Plan {
            equation: "j->jk".to_string(),
            input_shape: vec![Some(3)],
            output_shape: vec![Some(3), Some(2)],
            ops: vec![
                ShapeOp::Reshape {
                    shape: vec![ReshapeDim::Fixed(3), ReshapeDim::Fixed(1)],
                },
                ShapeOp::Tile {
                    multiples: vec![1, 2],
                },
            ],
        };
        assert_eq!(
            plan.shapes(),
            vec![
                vec![Some(3)],
                vec![Some(3), Some(1)],
                vec![Some(3), Some(2)],
            ]
        );
        assert_eq!(plan.len(), 2);
        assert!(!plan.is_noop());
    }
}

//! Shape Equation Compiler
//!
//! This library compiles shape equations such as `nhwc->nchw`, `(ab)->ab` or
//! `n...->n(...)` into a short plan of framework-neutral transpose, reshape
//! and tile operations.
//!
//! # Example
//!
//! ```rust
//! use shape_equation::{compile, ReshapeDim, ShapeOp};
//!
//! let plan = compile("(ab)c->bac", vec![12, 5], &[("a", 4)]).unwrap();
//! assert_eq!(
//!     plan.ops[0],
//!     ShapeOp::Reshape {
//!         shape: vec![ReshapeDim::Fixed(4), ReshapeDim::Fixed(3), ReshapeDim::Fixed(5)]
//!     }
//! );
//! assert_eq!(plan.output_shape, vec![Some(3), Some(4), Some(5)]);
//! println!("{}", plan);
//! ```

pub mod ast;
pub mod backend;
pub mod config;
pub mod error;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod solver;

pub use ast::{Atom, Element, Equation, Side};
pub use backend::{Backend, DenseBackend, DenseTensor, TensorError};
pub use config::{ConfigError, PlannerConfig};
pub use error::{CompileError, CompileResult};
pub use ops::{Plan, ReshapeDim, ShapeOp};
pub use parser::Parser;
pub use planner::PlanSynthesizer;
pub use resolver::{IndexResolver, ResolvedEquation};
pub use solver::{IndexSizes, InputShape, ShapeSolver, SizeAssignment};

/// Main compilation function: equation, input rank or shape, and sizes for
/// tiling indices and group factors
pub fn compile(
    equation: &str,
    input: impl Into<InputShape>,
    sizes: &[(&str, usize)],
) -> CompileResult<Plan> {
    compile_with_config(equation, input, sizes, &PlannerConfig::default())
}

/// Compile with explicit planner options
pub fn compile_with_config(
    equation: &str,
    input: impl Into<InputShape>,
    sizes: &[(&str, usize)],
    config: &PlannerConfig,
) -> CompileResult<Plan> {
    // Parse the equation
    let parsed = Parser::new(equation).parse_equation()?;

    // Cross-check both sides
    let resolved = IndexResolver::resolve(parsed)?;

    // Assign a size to every index
    let sizes = IndexSizes::from_pairs(sizes)?;
    let assignment = ShapeSolver::new(&sizes).solve(&resolved, &input.into())?;

    // Emit the operations
    PlanSynthesizer::new(*config).synthesize(&resolved, &assignment)
}

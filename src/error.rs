//! Error types for the shape equation compiler

use thiserror::Error;

use crate::ast::Side;

/// Result type for compilation operations
pub type CompileResult<T> = Result<T, CompileError>;

/// Compilation errors, in pipeline order: tokenizer, resolver, solver, planner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Malformed equation '{equation}': expected exactly one '->', found {arrows}")]
    MalformedEquation { equation: String, arrows: usize },

    #[error("Invalid character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("Index '{index}' appears more than once on the {side} side")]
    DuplicateIndex { index: char, side: Side },

    #[error("Ellipsis '...' appears more than once on the {side} side")]
    MultipleEllipsis { side: Side },

    #[error("Nested group at position {position}: groups cannot contain groups")]
    NestedGroup { position: usize },

    #[error("Unmatched parenthesis at position {position}")]
    UnmatchedParen { position: usize },

    #[error("Empty group at position {position}")]
    EmptyGroup { position: usize },

    #[error("Index '{index}' appears on the left-hand side but not on the right-hand side")]
    UnbalancedIndex { index: char },

    #[error("Ellipsis '...' appears only on the {side} side")]
    UnbalancedEllipsis { side: Side },

    #[error("Input has rank {actual}, but the left-hand side expects {}{expected}", at_least(.ellipsis))]
    RankMismatch {
        expected: usize,
        actual: usize,
        ellipsis: bool,
    },

    #[error("Size of index '{index}' must be specified: it has no source axis")]
    MissingSize { index: char },

    #[error("Group ({group}) spans an axis of size {size}, which is not divisible by its known factors' product {known}")]
    NonIntegerFactor {
        group: String,
        size: usize,
        known: usize,
    },

    #[error("Group ({group}) has more than one factor of unknown size")]
    AmbiguousGroup { group: String },

    #[error("Size of '{name}' is {derived} from the input, but {supplied} was supplied")]
    ConflictingSize {
        name: String,
        derived: usize,
        supplied: usize,
    },

    #[error("Axis {axis} is matched by '1' but has size {size}")]
    NonUnitAxis { axis: usize, size: usize },

    #[error("Size of {name} must be positive")]
    InvalidSize { name: String },

    #[error("Size of {name} does not fit in a machine word")]
    SizeOverflow { name: String },

    #[error("A concrete input shape is required: reshape to {target} has more than one unknown size")]
    ShapeRequired { target: String },

    #[error("Plan produces shape {actual} but the right-hand side requires {expected}")]
    UnreachableShape { expected: String, actual: String },
}

fn at_least(ellipsis: &bool) -> &'static str {
    if *ellipsis {
        "at least "
    } else {
        ""
    }
}

impl CompileError {
    pub fn conflicting(name: impl Into<String>, derived: usize, supplied: usize) -> Self {
        CompileError::ConflictingSize {
            name: name.into(),
            derived,
            supplied,
        }
    }

    pub fn invalid_size(name: impl Into<String>) -> Self {
        CompileError::InvalidSize { name: name.into() }
    }

    pub fn overflow(name: impl Into<String>) -> Self {
        CompileError::SizeOverflow { name: name.into() }
    }

    pub fn ambiguous(group: impl Into<String>) -> Self {
        CompileError::AmbiguousGroup {
            group: group.into(),
        }
    }

    /// True for failures caused by the caller's input rather than a planner bug.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, CompileError::UnreachableShape { .. })
    }
}

//! Index resolution across the two sides of an equation
//!
//! Every index on the left must reappear on the right. Indices that only
//! appear on the right have no source axis; they become tiling axes whose
//! size must be supplied by the caller.

use std::collections::BTreeSet;

use crate::ast::{Equation, Side};
use crate::error::{CompileError, CompileResult};

/// An equation whose two sides have been cross-checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEquation {
    equation: Equation,
    tiled: BTreeSet<char>,
    has_ellipsis: bool,
}

impl ResolvedEquation {
    pub fn equation(&self) -> &Equation {
        &self.equation
    }

    /// Right-only indices, broadcast along new axes.
    pub fn tiled(&self) -> &BTreeSet<char> {
        &self.tiled
    }

    pub fn is_tiled(&self, index: char) -> bool {
        self.tiled.contains(&index)
    }

    pub fn has_ellipsis(&self) -> bool {
        self.has_ellipsis
    }

    /// All index names of the equation, both sides.
    pub fn indices(&self) -> BTreeSet<char> {
        let mut all = self.equation.index_set(Side::Left);
        all.extend(self.tiled.iter().copied());
        all
    }
}

/// Cross-checks the index names and ellipsis of both sides
pub struct IndexResolver;

impl IndexResolver {
    pub fn resolve(equation: Equation) -> CompileResult<ResolvedEquation> {
        let right = equation.index_set(Side::Right);
        if let Some(index) = equation
            .indices(Side::Left)
            .into_iter()
            .find(|index| !right.contains(index))
        {
            return Err(CompileError::UnbalancedIndex { index });
        }

        let left_ellipsis = equation.has_ellipsis(Side::Left);
        let right_ellipsis = equation.has_ellipsis(Side::Right);
        match (left_ellipsis, right_ellipsis) {
            (true, false) => return Err(CompileError::UnbalancedEllipsis { side: Side::Left }),
            (false, true) => return Err(CompileError::UnbalancedEllipsis { side: Side::Right }),
            _ => {}
        }

        let left = equation.index_set(Side::Left);
        let tiled: BTreeSet<char> = right.difference(&left).copied().collect();

        tracing::debug!(
            tiled = ?tiled,
            ellipsis = left_ellipsis,
            "resolved equation indices"
        );

        Ok(ResolvedEquation {
            equation,
            tiled,
            has_ellipsis: left_ellipsis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn resolve(source: &str) -> CompileResult<ResolvedEquation> {
        IndexResolver::resolve(Parser::new(source).parse_equation().unwrap())
    }

    #[test]
    fn test_dropped_index_is_rejected() {
        assert_eq!(
            resolve("ab->a"),
            Err(CompileError::UnbalancedIndex { index: 'b' })
        );
        assert_eq!(
            resolve("(ij)k->(kj)"),
            Err(CompileError::UnbalancedIndex { index: 'i' })
        );
    }

    #[test]
    fn test_right_only_index_is_tiled() {
        let resolved = resolve("a->ba").unwrap();
        assert!(resolved.is_tiled('b'));
        assert!(!resolved.is_tiled('a'));
        assert_eq!(resolved.indices().into_iter().collect::<String>(), "ab");
    }

    #[test]
    fn test_ellipsis_balance() {
        assert_eq!(
            resolve("a...->a"),
            Err(CompileError::UnbalancedEllipsis { side: Side::Left })
        );
        assert_eq!(
            resolve("a->(...a)"),
            Err(CompileError::UnbalancedEllipsis { side: Side::Right })
        );
        assert!(resolve("n...->n(...)").unwrap().has_ellipsis());
    }

    #[test]
    fn test_resolution_leaves_equation_unchanged() {
        let equation = Parser::new("i(jk)->k(ji)").parse_equation().unwrap();
        let resolved = IndexResolver::resolve(equation.clone()).unwrap();
        assert_eq!(resolved.equation(), &equation);
        assert!(resolved.tiled().is_empty());
    }
}

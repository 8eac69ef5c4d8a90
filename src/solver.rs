//! Shape solving: assigns a size to every index name and ellipsis axis
//!
//! Sizes come from the input shape for left-side axes, from caller-supplied
//! keyword sizes for tiling axes and group factors, and from exact integer
//! division for the single unknown factor a group may have. When only the
//! input rank is known, sizes that would come from the input stay unknown
//! (`None`) and are left for the runtime to infer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::{group_label, Atom, Element};
use crate::error::{CompileError, CompileResult};
use crate::resolver::ResolvedEquation;

/// What is known about the input array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputShape {
    /// Only the number of axes is known
    Rank(usize),
    /// Every axis size is known
    Dims(Vec<usize>),
}

impl InputShape {
    pub fn rank(&self) -> usize {
        match self {
            InputShape::Rank(rank) => *rank,
            InputShape::Dims(dims) => dims.len(),
        }
    }

    /// Size of `axis`, if known
    pub fn dim(&self, axis: usize) -> Option<usize> {
        match self {
            InputShape::Rank(_) => None,
            InputShape::Dims(dims) => dims.get(axis).copied(),
        }
    }

    fn validate(&self) -> CompileResult<()> {
        if let InputShape::Dims(dims) = self {
            if let Some(axis) = dims.iter().position(|&d| d == 0) {
                return Err(CompileError::invalid_size(format!("input axis {}", axis)));
            }
        }
        Ok(())
    }
}

impl From<usize> for InputShape {
    fn from(rank: usize) -> Self {
        InputShape::Rank(rank)
    }
}

impl From<Vec<usize>> for InputShape {
    fn from(dims: Vec<usize>) -> Self {
        InputShape::Dims(dims)
    }
}

impl From<&[usize]> for InputShape {
    fn from(dims: &[usize]) -> Self {
        InputShape::Dims(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for InputShape {
    fn from(dims: [usize; N]) -> Self {
        InputShape::Dims(dims.to_vec())
    }
}

/// Caller-supplied sizes, keyed by index name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSizes {
    sizes: BTreeMap<char, usize>,
}

impl IndexSizes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, size)` pairs. Names that are not a single
    /// lowercase letter cannot refer to an index and are skipped.
    pub fn from_pairs<K: AsRef<str>>(pairs: &[(K, usize)]) -> CompileResult<Self> {
        let mut sizes = Self::new();
        for (key, size) in pairs {
            let key = key.as_ref();
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(index), None) if index.is_ascii_lowercase() => sizes.insert(index, *size)?,
                _ => tracing::warn!(key, "ignoring size for a name that is not an index"),
            }
        }
        Ok(sizes)
    }

    pub fn insert(&mut self, index: char, size: usize) -> CompileResult<()> {
        if size == 0 {
            return Err(CompileError::invalid_size(format!("index '{}'", index)));
        }
        match self.sizes.insert(index, size) {
            Some(previous) if previous != size => {
                Err(CompileError::conflicting(index.to_string(), previous, size))
            }
            _ => Ok(()),
        }
    }

    pub fn get(&self, index: char) -> Option<usize> {
        self.sizes.get(&index).copied()
    }

    pub fn indices(&self) -> impl Iterator<Item = char> + '_ {
        self.sizes.keys().copied()
    }
}

/// Resolved size of every index name and of each axis under the ellipsis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeAssignment {
    indices: BTreeMap<char, Option<usize>>,
    ellipsis: Vec<Option<usize>>,
}

impl SizeAssignment {
    /// Size of `index`; `None` when only known at run time.
    pub fn index(&self, index: char) -> Option<usize> {
        self.indices.get(&index).copied().flatten()
    }

    /// Sizes of the axes absorbed by the ellipsis, in order.
    pub fn ellipsis(&self) -> &[Option<usize>] {
        &self.ellipsis
    }

    pub fn is_fully_known(&self) -> bool {
        self.indices.values().all(Option::is_some) && self.ellipsis.iter().all(Option::is_some)
    }
}

/// Assigns sizes to the indices of a resolved equation
pub struct ShapeSolver<'a> {
    sizes: &'a IndexSizes,
}

impl<'a> ShapeSolver<'a> {
    pub fn new(sizes: &'a IndexSizes) -> Self {
        Self { sizes }
    }

    pub fn solve(
        &self,
        resolved: &ResolvedEquation,
        input: &InputShape,
    ) -> CompileResult<SizeAssignment> {
        input.validate()?;

        let left = &resolved.equation().left;
        let has_ellipsis = left.contains(&Element::Ellipsis);
        let explicit = left.iter().filter(|e| **e != Element::Ellipsis).count();
        let rank = input.rank();
        if rank < explicit || (!has_ellipsis && rank != explicit) {
            return Err(CompileError::RankMismatch {
                expected: explicit,
                actual: rank,
                ellipsis: has_ellipsis,
            });
        }
        let span = rank - explicit;

        let mut indices = BTreeMap::new();
        let mut ellipsis = Vec::new();
        let mut axis = 0;
        for element in left {
            match element {
                Element::Ellipsis => {
                    ellipsis.extend((axis..axis + span).map(|a| input.dim(a)));
                    axis += span;
                    continue;
                }
                Element::Index(index) => {
                    let size = self.source_size(*index, input.dim(axis))?;
                    indices.insert(*index, size);
                }
                Element::Unit => {
                    if let Some(size) = input.dim(axis).filter(|&size| size != 1) {
                        return Err(CompileError::NonUnitAxis { axis, size });
                    }
                }
                Element::Group(atoms) => {
                    self.solve_group(atoms, input.dim(axis), &mut indices)?;
                }
            }
            axis += 1;
        }

        for &index in resolved.tiled() {
            let size = self
                .sizes
                .get(index)
                .ok_or(CompileError::MissingSize { index })?;
            indices.insert(index, Some(size));
        }

        let known = resolved.indices();
        for index in self.sizes.indices().filter(|index| !known.contains(index)) {
            tracing::warn!(%index, "ignoring size for an index the equation does not use");
        }

        tracing::debug!(sizes = ?indices, ellipsis = ?ellipsis, "solved index sizes");
        Ok(SizeAssignment { indices, ellipsis })
    }

    /// Size of a top-level left index: the input axis wins, and a supplied
    /// size must agree with it.
    fn source_size(&self, index: char, dim: Option<usize>) -> CompileResult<Option<usize>> {
        match (dim, self.sizes.get(index)) {
            (Some(derived), Some(supplied)) if derived != supplied => Err(
                CompileError::conflicting(index.to_string(), derived, supplied),
            ),
            (Some(derived), _) => Ok(Some(derived)),
            (None, supplied) => Ok(supplied),
        }
    }

    /// Split one input axis into the factors of a left group. At most one
    /// factor may lack a supplied size; it takes the exact quotient.
    fn solve_group(
        &self,
        atoms: &[Atom],
        dim: Option<usize>,
        indices: &mut BTreeMap<char, Option<usize>>,
    ) -> CompileResult<()> {
        let label = group_label(atoms);
        let mut known: usize = 1;
        let mut unknown = None;
        for atom in atoms {
            let index = match atom {
                Atom::Index(index) => *index,
                // The ellipsis span cannot be recovered from a single axis.
                Atom::Ellipsis => return Err(CompileError::ambiguous(label)),
            };
            match self.sizes.get(index) {
                Some(size) => {
                    known = known
                        .checked_mul(size)
                        .ok_or_else(|| CompileError::overflow(format!("({})", label)))?;
                    indices.insert(index, Some(size));
                }
                None => {
                    if unknown.replace(index).is_some() {
                        return Err(CompileError::ambiguous(label));
                    }
                }
            }
        }

        match (unknown, dim) {
            (Some(_), Some(size)) if size % known != 0 => Err(CompileError::NonIntegerFactor {
                group: label,
                size,
                known,
            }),
            (Some(index), dim) => {
                indices.insert(index, dim.map(|size| size / known));
                Ok(())
            }
            (None, Some(size)) if size != known => {
                Err(CompileError::conflicting(format!("({})", label), size, known))
            }
            (None, _) => Ok(()),
        }
    }
}

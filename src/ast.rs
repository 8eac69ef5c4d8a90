//! Abstract syntax for shape equations

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which side of `->` an element sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left-hand"),
            Side::Right => write!(f, "right-hand"),
        }
    }
}

/// A member of a parenthesized group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Atom {
    Index(char),
    Ellipsis,
}

/// One top-level element of an equation side
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    /// Single-letter axis name: `a`
    Index(char),
    /// Zero or more unnamed axes: `...`
    Ellipsis,
    /// One physical axis factored into several logical ones: `(ab)`
    Group(Vec<Atom>),
    /// Literal axis of size 1: `1`
    Unit,
}

impl Element {
    /// Index names of this element, in declaration order.
    pub fn indices(&self) -> Vec<char> {
        match self {
            Element::Index(c) => vec![*c],
            Element::Group(atoms) => atoms
                .iter()
                .filter_map(|atom| match atom {
                    Atom::Index(c) => Some(*c),
                    Atom::Ellipsis => None,
                })
                .collect(),
            Element::Ellipsis | Element::Unit => Vec::new(),
        }
    }

    pub fn has_ellipsis(&self) -> bool {
        match self {
            Element::Ellipsis => true,
            Element::Group(atoms) => atoms.contains(&Atom::Ellipsis),
            Element::Index(_) | Element::Unit => false,
        }
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Atom::Index(c) => write!(f, "{}", c),
            Atom::Ellipsis => write!(f, "..."),
        }
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Element::Index(c) => write!(f, "{}", c),
            Element::Ellipsis => write!(f, "..."),
            Element::Unit => write!(f, "1"),
            Element::Group(atoms) => {
                write!(f, "(")?;
                for atom in atoms {
                    write!(f, "{}", atom)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Writes the members of a group without the surrounding parentheses.
pub fn group_label(atoms: &[Atom]) -> String {
    atoms.iter().map(ToString::to_string).collect()
}

/// A parsed `lhs->rhs` equation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equation {
    pub left: Vec<Element>,
    pub right: Vec<Element>,
}

impl Equation {
    pub fn new(left: Vec<Element>, right: Vec<Element>) -> Self {
        Self { left, right }
    }

    pub fn side(&self, side: Side) -> &[Element] {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    /// Index names of one side, flattened through groups, in order.
    pub fn indices(&self, side: Side) -> Vec<char> {
        self.side(side).iter().flat_map(Element::indices).collect()
    }

    pub fn index_set(&self, side: Side) -> BTreeSet<char> {
        self.indices(side).into_iter().collect()
    }

    pub fn has_ellipsis(&self, side: Side) -> bool {
        self.side(side).iter().any(Element::has_ellipsis)
    }
}

impl std::fmt::Display for Equation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for element in &self.left {
            write!(f, "{}", element)?;
        }
        write!(f, "->")?;
        for element in &self.right {
            write!(f, "{}", element)?;
        }
        Ok(())
    }
}

//! Parser for shape equations
//!
//! Parses equations like:
//! - `ij->ji`
//! - `(ab)c->bac`
//! - `n...->n(...)`
//! - `j1k->jk`
//!
//! Each side is scanned by a two-state machine (`Normal`, `InGroup`); any
//! transition not listed in [`SideParser::parse`] is rejected.

use std::collections::HashSet;

use crate::ast::{Atom, Element, Equation, Side};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{Lexer, Token};

const ARROW: &str = "->";

/// Parser for a complete `lhs->rhs` equation
pub struct Parser<'source> {
    source: &'source str,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> Self {
        Self { source }
    }

    /// Parse the equation into its two element lists
    pub fn parse_equation(&self) -> CompileResult<Equation> {
        let arrows = self.source.matches(ARROW).count();
        let (lhs, rhs) = match self.source.split_once(ARROW) {
            Some(sides) if arrows == 1 => sides,
            _ => {
                return Err(CompileError::MalformedEquation {
                    equation: self.source.to_string(),
                    arrows,
                })
            }
        };

        let left = SideParser::new(lhs, 0, Side::Left).parse()?;
        let right = SideParser::new(rhs, lhs.len() + ARROW.len(), Side::Right).parse()?;

        let equation = Equation::new(left, right);
        tracing::debug!(equation = %equation, "parsed shape equation");
        Ok(equation)
    }
}

/// Scanner state for one side
enum State {
    Normal,
    InGroup { start: usize, atoms: Vec<Atom> },
}

/// Parser for the elements of one side of the equation
struct SideParser<'source> {
    lexer: Lexer<'source>,
    side: Side,
    seen: HashSet<char>,
    ellipsis: bool,
}

impl<'source> SideParser<'source> {
    fn new(source: &'source str, offset: usize, side: Side) -> Self {
        Self {
            lexer: Lexer::new(source, offset),
            side,
            seen: HashSet::new(),
            ellipsis: false,
        }
    }

    /// Record an index name, rejecting repeats on this side
    fn claim_index(&mut self, index: char) -> CompileResult<()> {
        if !self.seen.insert(index) {
            return Err(CompileError::DuplicateIndex {
                index,
                side: self.side,
            });
        }
        Ok(())
    }

    /// Record the ellipsis, rejecting a second one on this side
    fn claim_ellipsis(&mut self) -> CompileResult<()> {
        if std::mem::replace(&mut self.ellipsis, true) {
            return Err(CompileError::MultipleEllipsis { side: self.side });
        }
        Ok(())
    }

    fn parse(mut self) -> CompileResult<Vec<Element>> {
        let mut elements = Vec::new();
        let mut state = State::Normal;

        while let Some((position, token)) = self.lexer.next() {
            let token =
                token.map_err(|character| CompileError::InvalidCharacter { character, position })?;

            state = match (state, token) {
                (State::Normal, Token::Index(c)) => {
                    self.claim_index(c)?;
                    elements.push(Element::Index(c));
                    State::Normal
                }
                (State::Normal, Token::Unit) => {
                    elements.push(Element::Unit);
                    State::Normal
                }
                (State::Normal, Token::Ellipsis) => {
                    self.claim_ellipsis()?;
                    elements.push(Element::Ellipsis);
                    State::Normal
                }
                (State::Normal, Token::LParen) => State::InGroup {
                    start: position,
                    atoms: Vec::new(),
                },
                (State::Normal, Token::RParen) => {
                    return Err(CompileError::UnmatchedParen { position });
                }

                (State::InGroup { start, mut atoms }, Token::Index(c)) => {
                    self.claim_index(c)?;
                    atoms.push(Atom::Index(c));
                    State::InGroup { start, atoms }
                }
                (State::InGroup { start, mut atoms }, Token::Ellipsis) => {
                    self.claim_ellipsis()?;
                    atoms.push(Atom::Ellipsis);
                    State::InGroup { start, atoms }
                }
                (State::InGroup { .. }, Token::LParen) => {
                    return Err(CompileError::NestedGroup { position });
                }
                (State::InGroup { .. }, Token::Unit) => {
                    return Err(CompileError::InvalidCharacter {
                        character: '1',
                        position,
                    });
                }
                (State::InGroup { start, atoms }, Token::RParen) => {
                    if atoms.is_empty() {
                        return Err(CompileError::EmptyGroup { position: start });
                    }
                    elements.push(Element::Group(atoms));
                    State::Normal
                }
            };
        }

        match state {
            State::Normal => Ok(elements),
            State::InGroup { start, .. } => Err(CompileError::UnmatchedParen { position: start }),
        }
    }
}

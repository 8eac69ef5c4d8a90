//! Lexer for one side of a shape equation using logos
//!
//! Supports tokens like:
//! - Index names: a single lowercase letter `a`..`z`
//! - Unit axis: `1`
//! - Ellipsis: `...`
//! - Grouping: `(`, `)`
//!
//! Whitespace is not skipped; any other character is a lexing error.

use logos::Logos;

/// Token types for one side of a shape equation
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    #[regex(r"[a-z]", |lex| lex.slice().chars().next())]
    Index(char),

    #[token("1")]
    Unit,

    #[token("...")]
    Ellipsis,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,
}

/// A token, or the offending character, tagged with its byte offset in the
/// full equation.
pub type Spanned = (usize, Result<Token, char>);

/// Lexer wrapper that provides a stream of positioned tokens
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    source: &'source str,
    offset: usize,
}

impl<'source> Lexer<'source> {
    /// Lex `source`, reporting positions shifted by `offset`.
    pub fn new(source: &'source str, offset: usize) -> Self {
        Self {
            inner: Token::lexer(source),
            source,
            offset,
        }
    }
}

impl<'source> Iterator for Lexer<'source> {
    type Item = Spanned;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.inner.next()?;
        let start = self.inner.span().start;
        let item = token.map_err(|()| {
            self.source[start..]
                .chars()
                .next()
                .unwrap_or(char::REPLACEMENT_CHARACTER)
        });
        Some((self.offset + start, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source, 0).filter_map(|(_, t)| t.ok()).collect()
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            tokens("ab1"),
            vec![Token::Index('a'), Token::Index('b'), Token::Unit]
        );
    }

    #[test]
    fn test_group_and_ellipsis() {
        assert_eq!(
            tokens("(ab)...c"),
            vec![
                Token::LParen,
                Token::Index('a'),
                Token::Index('b'),
                Token::RParen,
                Token::Ellipsis,
                Token::Index('c'),
            ]
        );
    }

    #[test]
    fn test_invalid_character_position() {
        let items: Vec<_> = Lexer::new("aB", 4).collect();
        assert_eq!(items[0], (4, Ok(Token::Index('a'))));
        assert_eq!(items[1], (5, Err('B')));
    }

    #[test]
    fn test_partial_ellipsis_is_error() {
        let first = Lexer::new("..a", 0).next();
        assert!(matches!(first, Some((0, Err('.')))));
    }
}

// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for rule expressions.
//!
//! Rule conditions and actions are host-language expressions with bound
//! aliases sprinkled in. The transpiler only needs to find identifiers and
//! know what precedes them, so the lexer is lossless: whitespace and
//! punctuation are tokens too, and concatenating every token slice
//! reproduces the input exactly.
//!
//! # Examples
//!
//! ```
//! # use simforge_rules::lexer::*;
//! # use logos::Logos;
//! let kinds: Vec<_> = Token::lexer("vel->y * 0.5f").filter_map(Result::ok).collect();
//! assert_eq!(kinds[0], Token::Ident);
//! assert_eq!(kinds[1], Token::Arrow);
//! ```

use logos::Logos;

/// Rule expression token.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Identifier (`velocity`, `sqrt`, `true`)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    /// Numeric literal with optional C suffix (`3`, `0.5f`, `2e-3`, `0xFF00FF`)
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?[fFuUlL]*")]
    #[regex(r"0[xX][0-9a-fA-F]+[uUlL]*")]
    Number,

    /// String literal, quotes included
    #[regex(r#""([^"\\]|\\.)*""#)]
    Str,

    /// Member access `.`
    #[token(".")]
    Dot,

    /// Pointer member access `->`
    #[token("->")]
    Arrow,

    /// Operator `-`
    #[token("-")]
    Minus,

    /// Run of whitespace
    #[regex(r"[ \t\r\n]+")]
    Space,

    /// Any other single character (operators, parentheses, commas)
    #[regex(r#"[^a-zA-Z0-9_ \t\r\n."\-]"#)]
    Punct,
}

impl Token {
    /// Whether an identifier after this token is a member name.
    pub fn starts_member(self) -> bool {
        matches!(self, Token::Dot | Token::Arrow)
    }
}

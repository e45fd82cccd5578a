//! Rule expression transpiler.
//!
//! Rewrites bound aliases inside a host expression: an array binding becomes
//! `alias[i]`, a scalar binding becomes `(*alias)`. Everything else (numbers,
//! strings, operators, calls into host built-ins, member names after `.` or
//! `->`) is copied through untouched.

use crate::ast::Binding;
use crate::lexer::Token;
use indexmap::IndexMap;
use logos::Logos;
use simforge_model::{CompileError, CompileResult, ErrorKind, Span};

/// Identifiers that are never treated as aliases.
pub const KEYWORDS: &[&str] = &[
    "sin", "cos", "tan", "sqrt", "pow", "fabs", "fmin", "fmax", "floor", "ceil", "clamp", "lerp",
    "abs", "true", "false", "NULL", "if", "else", "return", "i", "start", "end", "w",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Access form of a binding inside generated code.
pub fn access(binding: &Binding) -> String {
    if binding.is_array {
        format!("{}[i]", binding.alias)
    } else {
        format!("(*{})", binding.alias)
    }
}

pub struct Transpiler<'a> {
    bindings: &'a IndexMap<String, Binding>,
}

impl<'a> Transpiler<'a> {
    pub fn new(bindings: &'a IndexMap<String, Binding>) -> Self {
        Self { bindings }
    }

    /// Transpile one expression.
    ///
    /// # Errors
    ///
    /// Fails on characters the lexer cannot classify, such as an
    /// unterminated string literal.
    pub fn expr(&self, source: &str, span: Span) -> CompileResult<String> {
        let mut out = String::with_capacity(source.len() + 8);
        let mut lexer = Token::lexer(source);
        let mut previous: Option<Token> = None;

        while let Some(token) = lexer.next() {
            let slice = lexer.slice();
            let Ok(token) = token else {
                return Err(CompileError::new(
                    ErrorKind::Syntax,
                    span,
                    format!("unexpected '{}' in expression '{}'", slice, source),
                ));
            };

            let member = previous.is_some_and(Token::starts_member);
            match (token, self.bindings.get(slice)) {
                (Token::Ident, Some(binding)) if !member && !is_keyword(slice) => {
                    out.push_str(&access(binding));
                }
                _ => out.push_str(slice),
            }

            if token != Token::Space {
                previous = Some(token);
            }
        }

        Ok(out)
    }
}

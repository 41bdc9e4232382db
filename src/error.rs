//! Error type shared by every stage of the compiler.
//!
//! A compile either yields a complete plan or exactly one [`ParseError`];
//! there is no partial result.

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected {found} at position {position}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        position: usize,
    },

    #[error("unexpected end of input, expected {0}")]
    UnexpectedEof(String),

    #[error("unterminated quoted string starting at position {0}")]
    UnterminatedString(usize),

    #[error("unterminated comment starting at position {0}")]
    UnterminatedComment(usize),

    #[error("unbalanced parenthesis at position {0}")]
    UnbalancedParen(usize),

    #[error("empty pipe segment at position {0}")]
    EmptySegment(usize),

    #[error("invalid literal {literal:?}: {reason}")]
    InvalidLiteral { literal: String, reason: String },

    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("operator {op} needs a numeric value, got {value:?}")]
    NonNumericOrdering { op: String, value: String },

    #[error("unknown function {0}()")]
    UnknownFunction(String),

    #[error("{function}() takes {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("expected {expected} expression, got {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("{command}: {reason}")]
    Command { command: String, reason: String },

    #[error("invalid time modifier {modifier:?}: {reason}")]
    TimeModifier { modifier: String, reason: String },

    #[error("unsupported time unit {0:?}")]
    UnsupportedTimeUnit(String),
}

impl ParseError {
    pub(crate) fn command(command: &str, reason: impl Display) -> Self {
        ParseError::Command {
            command: command.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn literal(literal: &str, reason: impl Display) -> Self {
        ParseError::InvalidLiteral {
            literal: literal.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn time_modifier(modifier: &str, reason: impl Display) -> Self {
        ParseError::TimeModifier {
            modifier: modifier.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn mismatch(expected: &str, found: impl Display) -> Self {
        ParseError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

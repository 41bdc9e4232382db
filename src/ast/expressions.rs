use std::fmt;

use crate::ast::BinOp;

/// Untyped syntax tree of an eval/where expression.
///
/// The parser builds this tree first; the typing pass then turns it into a
/// [`ValueExpr`](crate::ast::ValueExpr), deciding which family every node
/// belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Numeric literal, kept as written
    ///
    /// # Example
    /// ```text
    /// 42
    /// 0.5
    /// ```
    Number(String),

    /// Double-quoted string literal
    ///
    /// # Example
    /// ```text
    /// "hello"
    /// ```
    String(String),

    /// `true` / `false`
    Boolean(bool),

    /// Field reference, bare (`status`) or single-quoted (`'resp time'`)
    Field(String),

    // Operations
    /// Binary operation
    ///
    /// # Examples
    /// ```text
    /// bytes / 1024
    /// first . " " . last
    /// code >= 500 AND host = "web"
    /// ```
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Logical negation (`NOT x`)
    Not(Box<Expr>),

    /// Function call
    ///
    /// # Examples
    /// ```text
    /// round(avg, 2)
    /// if(code >= 500, "error", "ok")
    /// now()
    /// ```
    Call { name: String, args: Vec<Expr> },

    /// Membership test
    ///
    /// # Example
    /// ```text
    /// status IN ("200", "204")
    /// ```
    In { value: Box<Expr>, list: Vec<Expr> },
}

impl Expr {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Expr::Number(n) => format!("number {}", n),
            Expr::String(s) => format!("string {:?}", s),
            Expr::Boolean(b) => format!("boolean {}", b),
            Expr::Field(f) => format!("field {}", f),
            Expr::BinaryOp { op, .. } => format!("'{}' expression", op),
            Expr::Not(_) => "NOT expression".to_string(),
            Expr::Call { name, .. } => format!("{}()", name),
            Expr::In { .. } => "IN expression".to_string(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

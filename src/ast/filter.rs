use std::fmt;

use serde::Serialize;

use crate::value::{CompiledRegex, Number};

/// Boolean filter tree produced by the search grammar.
///
/// There is no NOT node: negations are pushed into the comparisons while
/// parsing, so every leaf is a plain [`Comparison`].
///
/// # Examples
/// ```text
/// A=1 B=2 C=3      And(And(A=1, B=2), C=3)
/// A=1 OR B=2 C=3   And(Or(A=1, B=2), C=3)
/// NOT (A=1 OR B=2) And(A!=1, B!=2)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNode {
    Terminal(Comparison),
    And(Box<FilterNode>, Box<FilterNode>),
    Or(Box<FilterNode>, Box<FilterNode>),
}

impl FilterNode {
    pub fn and(left: FilterNode, right: FilterNode) -> Self {
        FilterNode::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: FilterNode, right: FilterNode) -> Self {
        FilterNode::Or(Box::new(left), Box::new(right))
    }

    pub fn terminal(field: &str, op: CompareOp, value: FilterValue) -> Self {
        FilterNode::Terminal(Comparison {
            field: field.to_string(),
            op,
            value,
        })
    }

    /// A lone `*` term, which matches every record.
    pub fn is_match_all(&self) -> bool {
        match self {
            FilterNode::Terminal(c) => c.is_match_all(),
            _ => false,
        }
    }

    /// Leaves in left-to-right order.
    pub fn terminals(&self) -> Vec<&Comparison> {
        match self {
            FilterNode::Terminal(c) => vec![c],
            FilterNode::And(l, r) | FilterNode::Or(l, r) => {
                let mut out = l.terminals();
                out.extend(r.terminals());
                out
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// `*` when the term names no field.
    pub field: String,
    pub op: CompareOp,
    pub value: FilterValue,
}

impl Comparison {
    pub fn value_is_regex(&self) -> bool {
        matches!(self.value, FilterValue::Regex(_))
    }

    pub fn is_match_all(&self) -> bool {
        self.field == "*"
            && self.op == CompareOp::Eq
            && matches!(&self.value, FilterValue::String(s) if s == "*")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
}

impl CompareOp {
    /// The operator that holds exactly when `self` does not.
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::NotEq,
            CompareOp::NotEq => CompareOp::Eq,
            CompareOp::Lt => CompareOp::GtEq,
            CompareOp::GtEq => CompareOp::Lt,
            CompareOp::Gt => CompareOp::LtEq,
            CompareOp::LtEq => CompareOp::Gt,
        }
    }

    pub fn is_ordering(self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::NotEq)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    /// Unquoted text; may contain `*` wildcards.
    String(String),
    /// Text that was written in double quotes, stored without them.
    QuotedString(String),
    Number(Number),
    Boolean(bool),
    Regex(CompiledRegex),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::String(s) => f.write_str(s),
            FilterValue::QuotedString(s) => write!(f, "\"{}\"", s),
            FilterValue::Number(n) => write!(f, "{}", n),
            FilterValue::Boolean(b) => write!(f, "{}", b),
            FilterValue::Regex(r) => write!(f, "/{}/", r.source()),
        }
    }
}

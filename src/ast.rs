//! # SPL - Abstract Syntax Tree
//!
//! This module defines every tree the compiler produces for a Splunk-style
//! search pipeline.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[filter]** - Boolean filter tree of the leading search (`FilterNode`)
//! - **[criteria]** - Translated search tree handed to the executor (`AstNode`)
//! - **[expressions]** - Untyped eval/where syntax tree
//! - **[operators]** - Binary operators of the expression language
//! - **[value_expr]** - Typed value expressions (numeric, string, boolean,
//!   conditional, multivalue)
//! - **[commands]** - Pipe stages and their payloads
//! - **[query]** - The complete compiled query
//!
//! ## Quick Start
//!
//! ```text
//! index=web status>=500 NOT host=canary* | stats count BY host
//! ```
//!
//! compiles to a filter
//!
//! ```text
//! And(And(index=web, status>=500), host!=canary*)
//! ```
//!
//! and a single `GroupBy` stage counting `*` per `host`.
//!
//! ## Core Concepts
//!
//! ### Search Precedence
//!
//! From loosest to tightest: implicit AND (juxtaposition), `OR`, `AND`,
//! `NOT`, parentheses. Chains are left-deep:
//!
//! ```text
//! A=1 B=2 C=3            And(And(A=1, B=2), C=3)
//! A=1 AND B=2 OR C=3     Or(And(A=1, B=2), C=3)
//! A=1 OR B=2 AND C=3     Or(A=1, And(B=2, C=3))
//! ```
//!
//! ### NOT Elimination
//!
//! `NOT` never reaches the filter tree. Comparisons flip (`=`/`!=`,
//! `<`/`>=`, `>`/`<=`) and De Morgan's law pushes negation through `AND`
//! and `OR`; a double negation cancels.
//!
//! ### Pipe Folding
//!
//! `| search X` and a bare `| X` join the leading filter as
//! `And(previous, X)`, so these compile to the same tree:
//!
//! ```text
//! A=1 | search B=2
//! A=1 AND B=2
//! ```
//!
//! ### Value Expressions
//!
//! eval, where and the aggregation commands share one expression
//! language. Unlike the search filter, its boolean trees keep `NOT`:
//!
//! ```text
//! | eval level=if(code >= 500, "error", "ok")
//! | where NOT like(uri, "/health%")
//! ```
pub mod commands;
pub mod criteria;
pub mod expressions;
pub mod filter;
pub mod operators;
pub mod query;
pub mod tokens;
pub mod value_expr;

pub use commands::*;
pub use criteria::{
    AstNode, Condition, ExpressionFilter, FilterCriteria, LogicalOperator, MatchFilter, MatchType,
};
pub use expressions::Expr;
pub use filter::{CompareOp, Comparison, FilterNode, FilterValue};
pub use operators::BinOp;
pub use query::{Query, TimeRange};
pub use tokens::Token;
pub use value_expr::*;

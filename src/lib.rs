pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod time;
pub mod translate;
pub mod value;

pub use ast::{
    AstNode, BinOp, BoolExpr, CompareOp, Expr, FilterNode, FilterValue, PipeStage, Query,
    TimeRange, Token, ValueExpr,
};
pub use config::ParseOptions;
pub use error::{ParseError, Result};
pub use lexer::{Lexer, split_pipeline, strip_comments};
pub use parser::{parse, parse_bool_expr, parse_value_expr, parse_with_options};
pub use time::{TimeModifier, calculate_relative_time, parse_time_modifier};
pub use translate::{translate, translate_query};
pub use value::{ColumnValue, Number};

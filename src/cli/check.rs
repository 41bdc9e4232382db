//! Compile spl queries and render the plan

use chrono::DateTime;

use super::CliError;
use crate::{AstNode, ParseOptions, Query, parse_with_options, translate_query};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The query to compile
    pub query: String,
    /// Fixed `now` in epoch milliseconds; wall clock when absent
    pub now: Option<i64>,
    /// Pretty-print the output
    pub pretty: bool,
    /// Emit the translated search tree instead of the full plan
    pub ast: bool,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Compiled query: filter, pipeline and time range
    Plan(Query),
    /// Executor search tree for the query's filter
    Ast(AstNode),
}

impl CheckResult {
    pub fn to_json(&self, pretty: bool) -> Result<String, CliError> {
        let json = match (self, pretty) {
            (CheckResult::Plan(query), true) => serde_json::to_string_pretty(query),
            (CheckResult::Plan(query), false) => serde_json::to_string(query),
            (CheckResult::Ast(node), true) => serde_json::to_string_pretty(node),
            (CheckResult::Ast(node), false) => serde_json::to_string(node),
        };
        Ok(json?)
    }
}

/// Execute a check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    if options.query.trim().is_empty() {
        return Err(CliError::NoInput);
    }

    let mut parse_options = ParseOptions::default();
    if let Some(ms) = options.now {
        let now = DateTime::from_timestamp_millis(ms).ok_or(CliError::BadNow(ms))?;
        parse_options = parse_options.with_now(now.fixed_offset());
    }

    let query = parse_with_options(&options.query, &parse_options)?;
    if options.ast {
        return Ok(CheckResult::Ast(translate_query(&query)?));
    }
    Ok(CheckResult::Plan(query))
}

use serde::Serialize;

use super::filter::CompareOp;
use super::query::TimeRange;
use crate::value::ColumnValue;

/// Internal search tree handed to the executor.
///
/// A node carries an AND condition or an OR condition (or, at the root,
/// neither when the query has no filter). Each condition lists flat
/// criteria and further nested nodes.
///
/// # Examples
/// ```text
/// A=1 AND B=2 AND C=3
///
/// and: [C=3]
///   nested and: [A=1, B=2]
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AstNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub and_filter_condition: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub or_filter_condition: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Condition {
    pub filter_criteria: Vec<FilterCriteria>,
    pub nested_nodes: Vec<AstNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCriteria {
    Expression(ExpressionFilter),
    Match(MatchFilter),
}

/// `column op value`, with `*` standing for any column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionFilter {
    pub column_name: String,
    pub filter_operator: CompareOp,
    pub column_value: ColumnValue,
}

/// Free-text match against every column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchFilter {
    pub match_column: String,
    pub match_words: Vec<String>,
    pub match_operator: LogicalOperator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_phrase: Option<String>,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Words,
    Phrase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
}

//! Lowers the search [`FilterNode`] into the executor's [`AstNode`] shape.
//!
//! Every compound node becomes one condition: `And` fills the AND slot,
//! `Or` the OR slot. Children are visited left to right; terminals turn into
//! flat criteria and compound children nest. For the left-deep chains the
//! parser builds, the newest term sits at the top and older terms nest
//! below it.

use crate::ast::{
    AstNode, CompareOp, Comparison, Condition, ExpressionFilter, FilterCriteria, FilterNode,
    FilterValue, LogicalOperator, MatchFilter, MatchType, Query,
};
use crate::error::{ParseError, Result};
use crate::value::ColumnValue;

/// Translates one filter tree.
pub fn translate(node: &FilterNode) -> Result<AstNode> {
    match node {
        FilterNode::Terminal(comparison) => Ok(AstNode {
            and_filter_condition: Some(Condition {
                filter_criteria: vec![criteria(comparison)?],
                nested_nodes: Vec::new(),
            }),
            ..Default::default()
        }),
        FilterNode::And(left, right) => Ok(AstNode {
            and_filter_condition: Some(condition(left, right)?),
            ..Default::default()
        }),
        FilterNode::Or(left, right) => Ok(AstNode {
            or_filter_condition: Some(condition(left, right)?),
            ..Default::default()
        }),
    }
}

/// Translates a whole query; with no filter the root matches everything.
/// The resolved time range rides on the root node.
pub fn translate_query(query: &Query) -> Result<AstNode> {
    let mut root = match &query.filter {
        Some(filter) => translate(filter)?,
        None => translate(&match_all())?,
    };
    root.time_range = query.time_range;
    Ok(root)
}

fn match_all() -> FilterNode {
    FilterNode::terminal("*", CompareOp::Eq, FilterValue::String("*".to_string()))
}

fn condition(left: &FilterNode, right: &FilterNode) -> Result<Condition> {
    let mut condition = Condition::default();
    for child in [left, right] {
        match child {
            FilterNode::Terminal(comparison) => condition.filter_criteria.push(criteria(comparison)?),
            compound => condition.nested_nodes.push(translate(compound)?),
        }
    }
    Ok(condition)
}

fn criteria(comparison: &Comparison) -> Result<FilterCriteria> {
    if comparison.field != "*" || comparison.op != CompareOp::Eq {
        return Ok(expression(comparison));
    }

    match &comparison.value {
        FilterValue::Regex(_) | FilterValue::Number(_) => Ok(expression(comparison)),
        FilterValue::String(text) if text.contains('*') => Ok(expression(comparison)),
        FilterValue::QuotedString(phrase) => {
            let words = split_words(phrase)?;
            Ok(FilterCriteria::Match(MatchFilter {
                match_column: "*".to_string(),
                match_words: words,
                match_operator: LogicalOperator::And,
                match_phrase: Some(phrase.clone()),
                match_type: MatchType::Phrase,
            }))
        }
        value => Ok(FilterCriteria::Match(MatchFilter {
            match_column: "*".to_string(),
            match_words: split_words(&value.to_string())?,
            match_operator: LogicalOperator::And,
            match_phrase: None,
            match_type: MatchType::Words,
        })),
    }
}

fn expression(comparison: &Comparison) -> FilterCriteria {
    FilterCriteria::Expression(ExpressionFilter {
        column_name: comparison.field.clone(),
        filter_operator: comparison.op,
        column_value: column_value(&comparison.value),
    })
}

fn column_value(value: &FilterValue) -> ColumnValue {
    match value {
        FilterValue::String(s) | FilterValue::QuotedString(s) => ColumnValue::String(s.clone()),
        FilterValue::Number(n) => ColumnValue::Number(n.clone()),
        FilterValue::Boolean(b) => ColumnValue::Boolean(*b),
        FilterValue::Regex(r) => ColumnValue::Regex(r.clone()),
    }
}

fn split_words(text: &str) -> Result<Vec<String>> {
    let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    if words.is_empty() {
        return Err(ParseError::literal(text, "empty search term"));
    }
    Ok(words)
}

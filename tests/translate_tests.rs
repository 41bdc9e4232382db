// tests/translate_tests.rs

use chrono::{DateTime, FixedOffset, TimeZone};
use spl_lang::ast::{
    AstNode, CompareOp, Condition, ExpressionFilter, FilterCriteria, LogicalOperator, MatchFilter,
    MatchType,
};
use spl_lang::value::{ColumnValue, Number};
use spl_lang::{ParseOptions, parse_with_options, translate_query};

fn now() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 5, 15, 12, 0, 0)
        .unwrap()
}

fn lower(query: &str) -> AstNode {
    let query = parse_with_options(query, &ParseOptions::default().with_now(now())).unwrap();
    translate_query(&query).unwrap()
}

fn and(node: &AstNode) -> &Condition {
    node.and_filter_condition.as_ref().expect("expected an AND condition")
}

fn or(node: &AstNode) -> &Condition {
    node.or_filter_condition.as_ref().expect("expected an OR condition")
}

fn expr(column: &str, op: CompareOp, value: ColumnValue) -> FilterCriteria {
    FilterCriteria::Expression(ExpressionFilter {
        column_name: column.to_string(),
        filter_operator: op,
        column_value: value,
    })
}

fn num(text: &str) -> ColumnValue {
    ColumnValue::Number(Number::parse(text).unwrap())
}

// ============================================================================
// Field comparisons
// ============================================================================

#[test]
fn test_single_comparison() {
    let node = lower("search status=\"ok\"");
    assert!(node.or_filter_condition.is_none());
    assert_eq!(
        and(&node).filter_criteria,
        vec![expr("status", CompareOp::Eq, ColumnValue::String("ok".into()))]
    );
    assert!(and(&node).nested_nodes.is_empty());
}

#[test]
fn test_operators_and_values_carry_over() {
    let test_cases = vec![
        ("bytes>1024", expr("bytes", CompareOp::Gt, num("1024"))),
        ("bytes<=0.5", expr("bytes", CompareOp::LtEq, num("0.5"))),
        ("host!=web01", expr("host", CompareOp::NotEq, ColumnValue::String("web01".into()))),
        ("host=web*", expr("host", CompareOp::Eq, ColumnValue::String("web*".into()))),
        ("enabled=false", expr("enabled", CompareOp::Eq, ColumnValue::Boolean(false))),
        ("NOT code=200", expr("code", CompareOp::NotEq, num("200"))),
    ];

    for (input, expected) in test_cases {
        let node = lower(input);
        assert_eq!(and(&node).filter_criteria, vec![expected], "Failed for input: {}", input);
    }
}

// ============================================================================
// Nesting
// ============================================================================

#[test]
fn test_implicit_and_chain_nests_older_terms() {
    let node = lower("A=1 B=2 C=3");
    let top = and(&node);
    assert_eq!(top.filter_criteria, vec![expr("C", CompareOp::Eq, num("3"))]);
    assert_eq!(top.nested_nodes.len(), 1);

    let nested = and(&top.nested_nodes[0]);
    assert_eq!(
        nested.filter_criteria,
        vec![expr("A", CompareOp::Eq, num("1")), expr("B", CompareOp::Eq, num("2"))]
    );
    assert!(nested.nested_nodes.is_empty());
}

#[test]
fn test_or_chain_uses_or_slot() {
    let node = lower("A=1 OR B=2 OR C=3");
    assert!(node.and_filter_condition.is_none());
    let top = or(&node);
    assert_eq!(top.filter_criteria, vec![expr("C", CompareOp::Eq, num("3"))]);
    assert_eq!(or(&top.nested_nodes[0]).filter_criteria.len(), 2);
}

#[test]
fn test_mixed_nesting() {
    let node = lower("A=1 AND (B=2 OR C=3)");
    let top = and(&node);
    assert_eq!(top.filter_criteria, vec![expr("A", CompareOp::Eq, num("1"))]);
    assert_eq!(top.nested_nodes.len(), 1);
    assert_eq!(
        or(&top.nested_nodes[0]).filter_criteria,
        vec![expr("B", CompareOp::Eq, num("2")), expr("C", CompareOp::Eq, num("3"))]
    );
}

#[test]
fn test_two_compound_children_both_nest() {
    let node = lower("(A=1 OR B=2) (C=3 OR D=4)");
    let top = and(&node);
    assert!(top.filter_criteria.is_empty());
    assert_eq!(top.nested_nodes.len(), 2);
    assert!(top.nested_nodes.iter().all(|n| n.or_filter_condition.is_some()));
}

#[test]
fn test_de_morgan_reaches_the_tree() {
    let node = lower("NOT (A=1 AND B=2)");
    assert_eq!(
        or(&node).filter_criteria,
        vec![expr("A", CompareOp::NotEq, num("1")), expr("B", CompareOp::NotEq, num("2"))]
    );
}

// ============================================================================
// Free text
// ============================================================================

#[test]
fn test_free_text_words_and_phrases() {
    let node = lower("error \"disk full\"");
    assert_eq!(
        and(&node).filter_criteria,
        vec![
            FilterCriteria::Match(MatchFilter {
                match_column: "*".into(),
                match_words: vec!["error".into()],
                match_operator: LogicalOperator::And,
                match_phrase: None,
                match_type: MatchType::Words,
            }),
            FilterCriteria::Match(MatchFilter {
                match_column: "*".into(),
                match_words: vec!["disk".into(), "full".into()],
                match_operator: LogicalOperator::And,
                match_phrase: Some("disk full".into()),
                match_type: MatchType::Phrase,
            }),
        ]
    );
}

#[test]
fn test_free_text_number_stays_expression() {
    let node = lower("404");
    assert_eq!(and(&node).filter_criteria, vec![expr("*", CompareOp::Eq, num("404"))]);

    let node = lower("error 500");
    assert!(matches!(&and(&node).filter_criteria[0], FilterCriteria::Match(_)));
    assert_eq!(and(&node).filter_criteria[1], expr("*", CompareOp::Eq, num("500")));
}

#[test]
fn test_free_text_wildcard_and_negation_stay_expressions() {
    let node = lower("err*");
    assert_eq!(
        and(&node).filter_criteria,
        vec![expr("*", CompareOp::Eq, ColumnValue::String("err*".into()))]
    );

    let node = lower("NOT error");
    assert_eq!(
        and(&node).filter_criteria,
        vec![expr("*", CompareOp::NotEq, ColumnValue::String("error".into()))]
    );
}

#[test]
fn test_regex_term() {
    let node = lower(r#"* | regex "fail(ed|ure)""#);
    let FilterCriteria::Expression(filter) = &and(&node).filter_criteria[0] else {
        panic!("expected expression filter");
    };
    assert_eq!(filter.column_name, "_raw");
    assert!(matches!(&filter.column_value, ColumnValue::Regex(r) if r.source() == "fail(ed|ure)"));
}

// ============================================================================
// Query root
// ============================================================================

#[test]
fn test_missing_filter_matches_all() {
    for input in ["| eventcount", "*", "earliest=-1d"] {
        let node = lower(input);
        assert_eq!(
            and(&node).filter_criteria,
            vec![expr("*", CompareOp::Eq, ColumnValue::String("*".into()))],
            "Failed for input: {}",
            input
        );
    }
}

#[test]
fn test_time_range_rides_on_root() {
    let node = lower("error earliest=-1h");
    let range = node.time_range.unwrap();
    assert_eq!(range.end_epoch_ms, now().timestamp_millis());
    assert_eq!(range.start_epoch_ms, now().timestamp_millis() - 3_600_000);

    // Nested nodes never carry one.
    let node = lower("A=1 B=2 C=3 earliest=-1h");
    assert!(node.time_range.is_some());
    assert!(and(&node).nested_nodes[0].time_range.is_none());
}

#[test]
fn test_piped_searches_translate_like_one_search() {
    assert_eq!(lower("A=1 | search B=2 | C=3"), lower("A=1 B=2 C=3"));
}

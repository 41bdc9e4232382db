// tests/expression_tests.rs

use spl_lang::ast::{
    ArithOp, BoolExpr, BoolOp, ClusterMatch, CompareOp, ConcatAtom, ConditionExpr, MultiValueExpr,
    NumericExpr, NumericFunc, Predicate, SpathPath, StringExpr, TextExpr, TrimSide, ValueExpr,
};
use spl_lang::error::ParseError;
use spl_lang::value::Number;
use spl_lang::{parse_bool_expr, parse_value_expr};

fn num(text: &str) -> NumericExpr {
    NumericExpr::Number(Number::parse(text).unwrap())
}

fn field(name: &str) -> NumericExpr {
    NumericExpr::Field(name.to_string())
}

fn binary(op: ArithOp, left: NumericExpr, right: NumericExpr) -> NumericExpr {
    NumericExpr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn numeric(text: &str) -> NumericExpr {
    match parse_value_expr(text).unwrap() {
        ValueExpr::Numeric(n) => n,
        other => panic!("expected numeric, got {:?}", other),
    }
}

fn text(input: &str) -> TextExpr {
    match parse_value_expr(input).unwrap() {
        ValueExpr::String(StringExpr::Text(text)) => *text,
        other => panic!("expected text call, got {:?}", other),
    }
}

// ============================================================================
// Numeric
// ============================================================================

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(
        numeric("a + b * 2"),
        binary(ArithOp::Add, field("a"), binary(ArithOp::Multiply, field("b"), num("2")))
    );
    assert_eq!(
        numeric("(a + b) * 2"),
        binary(ArithOp::Multiply, binary(ArithOp::Add, field("a"), field("b")), num("2"))
    );
}

#[test]
fn test_arithmetic_is_left_associative() {
    assert_eq!(
        numeric("a - b - c"),
        binary(ArithOp::Subtract, binary(ArithOp::Subtract, field("a"), field("b")), field("c"))
    );
    assert_eq!(
        numeric("a / b % c"),
        binary(ArithOp::Modulo, binary(ArithOp::Divide, field("a"), field("b")), field("c"))
    );
}

#[test]
fn test_unary_minus_is_zero_minus() {
    assert_eq!(numeric("-x"), binary(ArithOp::Subtract, num("0"), field("x")));
    assert_eq!(
        numeric("2 * -x"),
        binary(ArithOp::Multiply, num("2"), binary(ArithOp::Subtract, num("0"), field("x")))
    );
}

#[test]
fn test_number_literals_keep_text() {
    let NumericExpr::Number(n) = numeric("007") else {
        panic!("expected number");
    };
    assert_eq!(n.as_str(), "007");
}

#[test]
fn test_numeric_functions() {
    let NumericExpr::Call { func, args } = numeric("round(avg, 2)") else {
        panic!("expected call");
    };
    assert_eq!(func, NumericFunc::Round);
    assert_eq!(args, vec![field("avg"), num("2")]);

    assert!(matches!(numeric("PI()"), NumericExpr::Call { func: NumericFunc::Pi, .. }));
    assert!(matches!(numeric("ceiling(x)"), NumericExpr::Call { func: NumericFunc::Ceil, .. }));
    assert!(numeric("now()").is_terminal());
}

#[test]
fn test_len_and_tonumber() {
    assert!(matches!(numeric("len(name)"), NumericExpr::Len(_)));
    let NumericExpr::ToNumber { base, .. } = numeric("tonumber(hex, 16)") else {
        panic!("expected tonumber");
    };
    assert_eq!(base.map(|b| *b), Some(num("16")));
}

#[test]
fn test_numeric_fields() {
    assert_eq!(numeric("a * b + a").fields(), vec!["a", "b"]);
}

// ============================================================================
// String
// ============================================================================

#[test]
fn test_concat_binds_looser_than_addition() {
    let ValueExpr::String(StringExpr::Concat(atoms)) = parse_value_expr("a + 1 . \"x\"").unwrap() else {
        panic!("expected concat");
    };
    assert_eq!(atoms.len(), 2);
    assert!(matches!(&atoms[0], ConcatAtom::Nested(v) if matches!(**v, ValueExpr::Numeric(_))));
    assert_eq!(atoms[1], ConcatAtom::Literal("x".into()));
}

#[test]
fn test_concat_with_call() {
    let ValueExpr::String(StringExpr::Concat(atoms)) = parse_value_expr("host . \":\" . lower(port)").unwrap() else {
        panic!("expected concat");
    };
    assert_eq!(atoms[0], ConcatAtom::Field("host".into()));
    assert_eq!(atoms[1], ConcatAtom::Literal(":".into()));
    assert!(matches!(atoms[2], ConcatAtom::Nested(_)));
}

#[test]
fn test_string_literal() {
    assert_eq!(parse_value_expr("\"hello\"").unwrap(), ValueExpr::String(StringExpr::Raw("hello".into())));
}

#[test]
fn test_trim_family() {
    assert_eq!(
        text("ltrim(name, \" .\")"),
        TextExpr::Trim {
            side: TrimSide::Left,
            value: StringExpr::Field("name".into()),
            chars: Some(" .".into()),
        }
    );
    assert!(matches!(text("trim(name)"), TextExpr::Trim { side: TrimSide::Both, chars: None, .. }));
}

#[test]
fn test_substr_and_spath() {
    assert!(matches!(text("substr(uri, 1, 4)"), TextExpr::Substr { length: Some(_), .. }));
    assert!(matches!(
        text("spath(_raw, \"a.b\")"),
        TextExpr::Spath {
            path: SpathPath::Literal(_),
            ..
        }
    ));
    assert!(matches!(
        text("spath(_raw, which)"),
        TextExpr::Spath {
            path: SpathPath::Field(_),
            ..
        }
    ));
}

#[test]
fn test_object_to_array_defaults() {
    assert_eq!(
        text("object_to_array(attrs)"),
        TextExpr::ObjectToArray {
            field: "attrs".into(),
            key_label: "key".into(),
            value_label: "value".into(),
        }
    );
}

#[test]
fn test_cluster_options() {
    let TextExpr::Cluster {
        threshold,
        match_type,
        ..
    } = text("cluster(_raw)")
    else {
        panic!("expected cluster");
    };
    assert_eq!(threshold, 0.8);
    assert_eq!(match_type, ClusterMatch::Termlist);

    assert!(matches!(
        text("cluster(_raw, 0.5, \"ngramset\")"),
        TextExpr::Cluster {
            match_type: ClusterMatch::Ngramset,
            ..
        }
    ));
    assert!(parse_value_expr("cluster(_raw, 0.5, \"bogus\")").is_err());
}

#[test]
fn test_printf_and_tostring() {
    let TextExpr::Printf { format, args } = text("printf(\"%s-%d\", host, code)") else {
        panic!("expected printf");
    };
    assert_eq!(format, "%s-%d");
    assert_eq!(args.len(), 2);
    assert!(matches!(text("tostring(bytes, \"commas\")"), TextExpr::ToString { format: Some(_), .. }));
}

#[test]
fn test_mv_text_calls() {
    assert!(matches!(text("mvjoin(tags, \";\")"), TextExpr::MvJoin { .. }));
    assert!(matches!(text("mvcount(tags)"), TextExpr::MvCount(_)));
    assert!(matches!(text("mvfind(tags, \"^err\")"), TextExpr::MvFind { .. }));
    assert_eq!(text("getfields()"), TextExpr::GetFields(None));
}

// ============================================================================
// Boolean
// ============================================================================

#[test]
fn test_logical_precedence() {
    let BoolExpr::Binary { op, left, right } = parse_bool_expr("a > 1 OR b > 2 AND c > 3").unwrap() else {
        panic!("expected binary");
    };
    assert_eq!(op, BoolOp::Or);
    assert!(matches!(*left, BoolExpr::Compare { .. }));
    assert!(matches!(*right, BoolExpr::Binary { op: BoolOp::And, .. }));
}

#[test]
fn test_xor() {
    assert!(matches!(
        parse_bool_expr("a > 1 XOR b > 2").unwrap(),
        BoolExpr::Binary { op: BoolOp::Xor, .. }
    ));
}

#[test]
fn test_not_is_kept() {
    let BoolExpr::Not(inner) = parse_bool_expr("NOT (a = 1 AND b = 2)").unwrap() else {
        panic!("expected NOT");
    };
    assert!(matches!(*inner, BoolExpr::Binary { op: BoolOp::And, .. }));
}

#[test]
fn test_comparison_operators() {
    let test_cases = vec![
        ("a = 1", CompareOp::Eq),
        ("a == 1", CompareOp::Eq),
        ("a != 1", CompareOp::NotEq),
        ("a < 1", CompareOp::Lt),
        ("a <= 1", CompareOp::LtEq),
        ("a > 1", CompareOp::Gt),
        ("a >= 1", CompareOp::GtEq),
    ];

    for (input, expected) in test_cases {
        let BoolExpr::Compare { op, .. } = parse_bool_expr(input).unwrap() else {
            panic!("expected comparison for {}", input);
        };
        assert_eq!(op, expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_in_forms() {
    let BoolExpr::In { value, list } = parse_bool_expr("status IN (\"200\", \"204\")").unwrap() else {
        panic!("expected IN");
    };
    assert_eq!(*value, ValueExpr::String(StringExpr::Field("status".into())));
    assert_eq!(list.len(), 2);

    assert!(matches!(parse_bool_expr("in(code, 200, 204)").unwrap(), BoolExpr::In { .. }));
    assert!(parse_bool_expr("code IN ()").is_err());
}

#[test]
fn test_predicates() {
    let test_cases = vec![
        ("isstr(x)", Predicate::IsStr),
        ("isnum(x)", Predicate::IsNum),
        ("isint(x)", Predicate::IsInt),
        ("isbool(x)", Predicate::IsBool),
        ("isnull(x)", Predicate::IsNull),
        ("isnotnull(x)", Predicate::IsNotNull),
    ];

    for (input, expected) in test_cases {
        let BoolExpr::Predicate { kind, .. } = parse_bool_expr(input).unwrap() else {
            panic!("expected predicate for {}", input);
        };
        assert_eq!(kind, expected);
    }
}

#[test]
fn test_match_and_cidrmatch() {
    let BoolExpr::Match { regex, .. } = parse_bool_expr("match(uri, \"^/api/(?<v>v\\d)\")").unwrap() else {
        panic!("expected match");
    };
    assert_eq!(regex.capture_names(), vec!["v"]);
    assert!(matches!(
        parse_bool_expr("cidrmatch(\"10.0.0.0/8\", clientip)").unwrap(),
        BoolExpr::CidrMatch { .. }
    ));
}

#[test]
fn test_boolean_literals() {
    assert_eq!(parse_bool_expr("true()").unwrap(), BoolExpr::Literal(true));
    assert_eq!(parse_bool_expr("FALSE").unwrap(), BoolExpr::Literal(false));
}

#[test]
fn test_searchmatch_fields() {
    let condition = parse_bool_expr("searchmatch(\"host=web* status=500 timeout\")").unwrap();
    assert_eq!(condition.fields(), vec!["host", "status", "*"]);
}

#[test]
fn test_bool_fields() {
    let condition = parse_bool_expr("a > 1 AND like(b, \"x%\") OR isnull(a)").unwrap();
    assert_eq!(condition.fields(), vec!["a", "b"]);
}

// ============================================================================
// Conditional / multivalue
// ============================================================================

#[test]
fn test_if() {
    let ValueExpr::Condition(ConditionExpr::If { condition, then, otherwise }) =
        parse_value_expr("if(code >= 500, \"error\", \"ok\")").unwrap()
    else {
        panic!("expected if");
    };
    assert!(matches!(*condition, BoolExpr::Compare { op: CompareOp::GtEq, .. }));
    assert_eq!(*then, ValueExpr::String(StringExpr::Raw("error".into())));
    assert_eq!(*otherwise, ValueExpr::String(StringExpr::Raw("ok".into())));
}

#[test]
fn test_validate_nullif_null() {
    assert!(matches!(
        parse_value_expr("validate(isnum(a), \"a not numeric\")").unwrap(),
        ValueExpr::Condition(ConditionExpr::Validate(_))
    ));
    assert!(matches!(
        parse_value_expr("nullif(a, b)").unwrap(),
        ValueExpr::Condition(ConditionExpr::NullIf { .. })
    ));
    assert_eq!(parse_value_expr("null()").unwrap(), ValueExpr::Condition(ConditionExpr::Null));
}

#[test]
fn test_conditionals_read_as_numbers() {
    let NumericExpr::Call { func, args } = numeric("round(if(a > 1, a, 0), 2)") else {
        panic!("expected call");
    };
    assert_eq!(func, NumericFunc::Round);
    assert!(matches!(&args[0], NumericExpr::Conditional(cond) if matches!(**cond, ConditionExpr::If { .. })));
    assert_eq!(args[1], num("2"));

    let sum = numeric("coalesce(a, 0) + 1");
    let NumericExpr::Binary { op, left, right } = &sum else {
        panic!("expected binary");
    };
    assert_eq!(*op, ArithOp::Add);
    assert!(matches!(**left, NumericExpr::Conditional(_)));
    assert_eq!(**right, num("1"));
    assert_eq!(sum.fields(), vec!["a"]);

    // Only the numeric reading is widened.
    assert!(matches!(parse_value_expr("round(lower(x))"), Err(ParseError::TypeMismatch { .. })));
}

#[test]
fn test_multivalue_calls() {
    let cases = vec![
        "mvdedup(tags)",
        "mvsort(tags)",
        "mvfilter(tags != \"x\")",
        "mvmap(tags, tags . \"!\")",
        "mvrange(1, 10, 2)",
        "mvzip(a, b, \"=\")",
        "mv_to_json_array(tags, true)",
        "split(csv, \",\")",
    ];
    for input in cases {
        assert!(
            matches!(parse_value_expr(input), Ok(ValueExpr::MultiValue(_))),
            "Failed for input: {}",
            input
        );
    }
}

#[test]
fn test_mvindex_range_is_not_scalar() {
    let ValueExpr::MultiValue(mv) = parse_value_expr("mvindex(tags, 0, 2)").unwrap() else {
        panic!("expected multivalue");
    };
    assert!(!mv.returns_scalar());
    assert!(matches!(mv, MultiValueExpr::Index { end: Some(_), .. }));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_type_errors() {
    assert!(matches!(parse_value_expr("lower(x) * 2"), Err(ParseError::TypeMismatch { .. })));
    assert!(matches!(parse_bool_expr("a + 1"), Err(ParseError::TypeMismatch { .. })));
    assert!(matches!(parse_value_expr("mvjoin(tags, sep)"), Err(ParseError::TypeMismatch { .. })));
    assert!(matches!(
        parse_value_expr("relative_time(now(), mod)"),
        Err(ParseError::TypeMismatch { .. })
    ));
}

#[test]
fn test_arity_errors() {
    let test_cases = vec!["abs()", "abs(1, 2)", "substr(x)", "nullif(a)", "null(a)", "mvindex(a)", "split(a)"];
    for input in test_cases {
        assert!(
            matches!(parse_value_expr(input), Err(ParseError::Arity { .. })),
            "Failed for input: {}",
            input
        );
    }
}

#[test]
fn test_syntax_errors() {
    assert!(matches!(parse_value_expr("(a + 1"), Err(ParseError::UnexpectedEof(_))));
    assert!(matches!(parse_value_expr("a +"), Err(ParseError::UnexpectedEof(_))));
    assert!(matches!(parse_value_expr("a b"), Err(ParseError::UnexpectedToken { .. })));
    assert_eq!(parse_value_expr("nosuch(1)"), Err(ParseError::UnknownFunction("nosuch".into())));
}

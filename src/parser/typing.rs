//! Typing pass: untyped [`Expr`] trees become [`ValueExpr`] families.
//!
//! Literals type as themselves, a bare field reads as a number unless it is
//! compared with a string, `.` (and `+` next to a string) concatenates, and
//! every call is resolved against the function catalog below. Arity and
//! literal-only arguments are checked here, so a bad call fails the compile.

use tracing::trace;

use crate::ast::{
    ArithOp, BinOp, BoolExpr, BoolOp, ClusterMatch, CompareOp, ConcatAtom, ConditionExpr,
    ConditionalValue, Expr, MultiValueExpr, MvParam, NumericExpr, NumericFunc, Predicate, SpathPath,
    StringExpr, TextExpr, TrimSide, ValueExpr,
};
use crate::error::{ParseError, Result};
use crate::time::parse_time_modifier;
use crate::value::{CompiledRegex, Number, like_to_regex};

use super::Parser;

/// Calls whose result is a string, for deciding what `+` means.
const STRING_FUNCTIONS: &[&str] = &[
    "lower",
    "upper",
    "trim",
    "ltrim",
    "rtrim",
    "replace",
    "substr",
    "spath",
    "strftime",
    "strptime",
    "urldecode",
    "ipmask",
    "object_to_array",
    "printf",
    "tojson",
    "typeof",
    "mvjoin",
    "getfields",
    "cluster",
    "tostring",
];

const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.8;

impl Parser<'_> {
    pub(crate) fn type_value(&self, expr: Expr) -> Result<ValueExpr> {
        match expr {
            Expr::Number(text) => Ok(ValueExpr::Numeric(NumericExpr::Number(number(&text)?))),
            Expr::String(s) => Ok(ValueExpr::String(StringExpr::Raw(s))),
            Expr::Boolean(b) => Ok(ValueExpr::Boolean(BoolExpr::Literal(b))),
            Expr::Field(name) => Ok(ValueExpr::Numeric(NumericExpr::Field(name))),
            Expr::BinaryOp { op, .. } if op.is_comparison() || op.is_logical() => {
                self.type_bool(expr).map(ValueExpr::Boolean)
            }
            expr @ (Expr::Not(_) | Expr::In { .. }) => self.type_bool(expr).map(ValueExpr::Boolean),
            Expr::Call { name, args } => self.type_call(&name, args),
            expr if is_stringy(&expr) => self.type_string(expr).map(ValueExpr::String),
            expr @ Expr::BinaryOp { .. } => self.type_numeric(expr).map(ValueExpr::Numeric),
        }
    }

    pub(crate) fn type_bool(&self, expr: Expr) -> Result<BoolExpr> {
        match expr {
            Expr::Boolean(b) => Ok(BoolExpr::Literal(b)),
            Expr::BinaryOp { op, left, right } if op.is_comparison() => {
                let (left, right) = (*left, *right);
                let left_as_text = is_stringy(&right);
                let right_as_text = is_stringy(&left);
                Ok(BoolExpr::Compare {
                    op: compare_op(op),
                    left: Box::new(self.type_operand(left, left_as_text)?),
                    right: Box::new(self.type_operand(right, right_as_text)?),
                })
            }
            Expr::BinaryOp { op, left, right } if op.is_logical() => {
                let op = match op {
                    BinOp::And => BoolOp::And,
                    BinOp::Or => BoolOp::Or,
                    _ => BoolOp::Xor,
                };
                Ok(BoolExpr::Binary {
                    op,
                    left: Box::new(self.type_bool(*left)?),
                    right: Box::new(self.type_bool(*right)?),
                })
            }
            Expr::Not(inner) => Ok(BoolExpr::Not(Box::new(self.type_bool(*inner)?))),
            Expr::In { value, list } => self.type_in(*value, list),
            Expr::Call { name, args } => match self.type_call(&name, args)? {
                ValueExpr::Boolean(b) => Ok(b),
                other => Err(ParseError::mismatch("boolean", format!("{}()", name)).with_family(&other)),
            },
            other => Err(ParseError::mismatch("boolean", other)),
        }
    }

    fn type_numeric(&self, expr: Expr) -> Result<NumericExpr> {
        match expr {
            Expr::Number(text) => Ok(NumericExpr::Number(number(&text)?)),
            Expr::Field(name) => Ok(NumericExpr::Field(name)),
            Expr::BinaryOp { op, left, right } if op.is_arithmetic() => {
                if op == BinOp::Add && (is_stringy(&left) || is_stringy(&right)) {
                    return Err(ParseError::mismatch("numeric", "string concatenation"));
                }
                Ok(NumericExpr::Binary {
                    op: arith_op(op),
                    left: Box::new(self.type_numeric(*left)?),
                    right: Box::new(self.type_numeric(*right)?),
                })
            }
            Expr::Call { name, args } => match self.type_call(&name, args)? {
                ValueExpr::Numeric(n) => Ok(n),
                ValueExpr::Condition(cond) => Ok(NumericExpr::Conditional(Box::new(cond))),
                other => Err(ParseError::mismatch("numeric", format!("{}()", name)).with_family(&other)),
            },
            other => Err(ParseError::mismatch("numeric", other)),
        }
    }

    fn type_string(&self, expr: Expr) -> Result<StringExpr> {
        match expr {
            Expr::String(s) => Ok(StringExpr::Raw(s)),
            Expr::Number(n) => Ok(StringExpr::Raw(n)),
            Expr::Field(name) => Ok(StringExpr::Field(name)),
            expr @ Expr::BinaryOp {
                op: BinOp::Concat | BinOp::Add,
                ..
            } if is_stringy(&expr) => {
                let mut atoms = Vec::new();
                self.flatten_concat(expr, &mut atoms)?;
                Ok(StringExpr::Concat(atoms))
            }
            other => match self.type_value(other)? {
                ValueExpr::String(s) => Ok(s),
                // Non-string values read in string context keep their own type.
                value => Ok(StringExpr::Concat(vec![ConcatAtom::Nested(Box::new(value))])),
            },
        }
    }

    fn type_multivalue(&self, expr: Expr) -> Result<MultiValueExpr> {
        match expr {
            Expr::Field(name) => Ok(MultiValueExpr::Field(name)),
            Expr::Call { name, args } => match self.type_call(&name, args)? {
                ValueExpr::MultiValue(mv) => Ok(mv),
                other => Err(ParseError::mismatch("multivalue", format!("{}()", name)).with_family(&other)),
            },
            other => Err(ParseError::mismatch("multivalue", other)),
        }
    }

    /// A comparison operand; a field compared with a string reads as text.
    fn type_operand(&self, expr: Expr, as_string: bool) -> Result<ValueExpr> {
        match expr {
            Expr::Field(name) if as_string => Ok(ValueExpr::String(StringExpr::Field(name))),
            other => self.type_value(other),
        }
    }

    fn flatten_concat(&self, expr: Expr, atoms: &mut Vec<ConcatAtom>) -> Result<()> {
        match expr {
            Expr::String(s) => atoms.push(ConcatAtom::Literal(s)),
            Expr::Number(n) => atoms.push(ConcatAtom::Literal(n)),
            Expr::Field(name) => atoms.push(ConcatAtom::Field(name)),
            Expr::BinaryOp {
                op: BinOp::Concat,
                left,
                right,
            } => {
                self.flatten_concat(*left, atoms)?;
                self.flatten_concat(*right, atoms)?;
            }
            Expr::BinaryOp {
                op: BinOp::Add,
                left,
                right,
            } if is_stringy(&left) || is_stringy(&right) => {
                self.flatten_concat(*left, atoms)?;
                self.flatten_concat(*right, atoms)?;
            }
            other => atoms.push(ConcatAtom::Nested(Box::new(self.type_value(other)?))),
        }
        Ok(())
    }

    fn type_in(&self, value: Expr, list: Vec<Expr>) -> Result<BoolExpr> {
        if list.is_empty() {
            return Err(ParseError::mismatch("non-empty IN list", "()"));
        }
        let as_string = list.iter().any(is_stringy);
        Ok(BoolExpr::In {
            value: Box::new(self.type_operand(value, as_string)?),
            list: list
                .into_iter()
                .map(|item| self.type_value(item))
                .collect::<Result<_>>()?,
        })
    }

    fn type_call(&self, name: &str, args: Vec<Expr>) -> Result<ValueExpr> {
        trace!(function = name, args = args.len(), "typing call");

        if let Some((func, min, max)) = NumericFunc::lookup(name) {
            check_arity(name, &args, min, Some(max))?;
            let args = args
                .into_iter()
                .map(|arg| self.type_numeric(arg))
                .collect::<Result<_>>()?;
            return Ok(ValueExpr::Numeric(NumericExpr::Call { func, args }));
        }

        if let Some(kind) = Predicate::lookup(name) {
            check_arity(name, &args, 1, Some(1))?;
            let mut args = args.into_iter();
            let value = self.type_value(next_arg(&mut args)?)?;
            return Ok(ValueExpr::Boolean(BoolExpr::Predicate {
                kind,
                value: Box::new(value),
            }));
        }

        match name {
            "len" | "tonumber" | "relative_time" => self.type_numeric_call(name, args).map(ValueExpr::Numeric),
            name if STRING_FUNCTIONS.contains(&name) || matches!(name, "mvcount" | "mvfind") => self
                .type_text_call(name, args)
                .map(|text| ValueExpr::String(StringExpr::Text(Box::new(text)))),
            "like" | "match" | "cidrmatch" | "searchmatch" | "true" | "false" | "in" => {
                self.type_bool_call(name, args).map(ValueExpr::Boolean)
            }
            "if" | "case" | "validate" | "coalesce" | "nullif" | "null" => {
                self.type_condition_call(name, args).map(ValueExpr::Condition)
            }
            "mvappend" | "mvdedup" | "mvfilter" | "mvindex" | "mvmap" | "mvrange" | "mvsort" | "mvzip"
            | "mv_to_json_array" | "split" => self.type_mv_call(name, args).map(ValueExpr::MultiValue),
            _ => Err(ParseError::UnknownFunction(name.to_string())),
        }
    }

    fn type_numeric_call(&self, name: &str, args: Vec<Expr>) -> Result<NumericExpr> {
        let mut it = args.into_iter();
        match name {
            "len" => {
                check_arity(name, it.as_slice(), 1, Some(1))?;
                Ok(NumericExpr::Len(Box::new(self.type_string(next_arg(&mut it)?)?)))
            }
            "tonumber" => {
                check_arity(name, it.as_slice(), 1, Some(2))?;
                let value = self.type_string(next_arg(&mut it)?)?;
                let base = it.next().map(|b| self.type_numeric(b)).transpose()?;
                Ok(NumericExpr::ToNumber {
                    value: Box::new(value),
                    base: base.map(Box::new),
                })
            }
            _ => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let time = self.type_numeric(next_arg(&mut it)?)?;
                let modifier = parse_time_modifier(&literal(name, next_arg(&mut it)?)?)?;
                Ok(NumericExpr::RelativeTime {
                    time: Box::new(time),
                    modifier,
                })
            }
        }
    }

    fn type_text_call(&self, name: &str, args: Vec<Expr>) -> Result<TextExpr> {
        let mut it = args.into_iter();
        let text = match name {
            "lower" | "upper" | "urldecode" => {
                check_arity(name, it.as_slice(), 1, Some(1))?;
                let value = self.type_string(next_arg(&mut it)?)?;
                match name {
                    "lower" => TextExpr::Lower(value),
                    "upper" => TextExpr::Upper(value),
                    _ => TextExpr::UrlDecode(value),
                }
            }
            "trim" | "ltrim" | "rtrim" => {
                check_arity(name, it.as_slice(), 1, Some(2))?;
                let value = self.type_string(next_arg(&mut it)?)?;
                let chars = it.next().map(|c| literal(name, c)).transpose()?;
                let side = match name {
                    "ltrim" => TrimSide::Left,
                    "rtrim" => TrimSide::Right,
                    _ => TrimSide::Both,
                };
                TextExpr::Trim { side, value, chars }
            }
            "replace" => {
                check_arity(name, it.as_slice(), 3, Some(3))?;
                let value = self.type_string(next_arg(&mut it)?)?;
                let regex = CompiledRegex::new(&literal(name, next_arg(&mut it)?)?)?;
                let replacement = literal(name, next_arg(&mut it)?)?;
                TextExpr::Replace {
                    value,
                    regex,
                    replacement,
                }
            }
            "substr" => {
                check_arity(name, it.as_slice(), 2, Some(3))?;
                let value = self.type_string(next_arg(&mut it)?)?;
                let start = self.type_numeric(next_arg(&mut it)?)?;
                let length = it.next().map(|l| self.type_numeric(l)).transpose()?;
                TextExpr::Substr { value, start, length }
            }
            "spath" => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let input = self.type_string(next_arg(&mut it)?)?;
                let path = match next_arg(&mut it)? {
                    Expr::String(s) => SpathPath::Literal(s),
                    Expr::Field(f) => SpathPath::Field(f),
                    other => return Err(ParseError::mismatch("spath path", other)),
                };
                TextExpr::Spath { input, path }
            }
            "strftime" => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let time = self.type_numeric(next_arg(&mut it)?)?;
                let format = literal(name, next_arg(&mut it)?)?;
                TextExpr::Strftime { time, format }
            }
            "strptime" => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let value = self.type_string(next_arg(&mut it)?)?;
                let format = literal(name, next_arg(&mut it)?)?;
                TextExpr::Strptime { value, format }
            }
            "ipmask" => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let mask = literal(name, next_arg(&mut it)?)?;
                let ip = self.type_string(next_arg(&mut it)?)?;
                TextExpr::IpMask { mask, ip }
            }
            "object_to_array" => {
                check_arity(name, it.as_slice(), 1, Some(3))?;
                let field = match next_arg(&mut it)? {
                    Expr::Field(f) | Expr::String(f) => f,
                    other => return Err(ParseError::mismatch("field name", other)),
                };
                let key_label = it.next().map(|k| literal(name, k)).transpose()?;
                let value_label = it.next().map(|v| literal(name, v)).transpose()?;
                TextExpr::ObjectToArray {
                    field,
                    key_label: key_label.unwrap_or_else(|| "key".to_string()),
                    value_label: value_label.unwrap_or_else(|| "value".to_string()),
                }
            }
            "printf" => {
                check_arity(name, it.as_slice(), 1, None)?;
                let format = literal(name, next_arg(&mut it)?)?;
                let args = it.map(|a| self.type_value(a)).collect::<Result<_>>()?;
                TextExpr::Printf { format, args }
            }
            "tojson" => TextExpr::ToJson(it.map(|a| self.type_value(a)).collect::<Result<_>>()?),
            "typeof" => {
                check_arity(name, it.as_slice(), 1, Some(1))?;
                TextExpr::TypeOf(Box::new(self.type_value(next_arg(&mut it)?)?))
            }
            "mvjoin" => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let mv = self.type_multivalue(next_arg(&mut it)?)?;
                let delimiter = literal(name, next_arg(&mut it)?)?;
                TextExpr::MvJoin {
                    mv: Box::new(mv),
                    delimiter,
                }
            }
            "mvcount" => {
                check_arity(name, it.as_slice(), 1, Some(1))?;
                TextExpr::MvCount(Box::new(self.type_multivalue(next_arg(&mut it)?)?))
            }
            "mvfind" => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let mv = self.type_multivalue(next_arg(&mut it)?)?;
                let regex = CompiledRegex::new(&literal(name, next_arg(&mut it)?)?)?;
                TextExpr::MvFind {
                    mv: Box::new(mv),
                    regex,
                }
            }
            "getfields" => {
                check_arity(name, it.as_slice(), 0, Some(1))?;
                TextExpr::GetFields(it.next().map(|f| literal(name, f)).transpose()?)
            }
            "cluster" => {
                check_arity(name, it.as_slice(), 1, Some(4))?;
                let field = self.type_string(next_arg(&mut it)?)?;
                let threshold = match it.next() {
                    Some(Expr::Number(n)) => number(&n)?
                        .to_f64()
                        .ok_or_else(|| ParseError::literal(&n, "not a threshold"))?,
                    Some(other) => return Err(ParseError::mismatch("numeric literal", other)),
                    None => DEFAULT_CLUSTER_THRESHOLD,
                };
                let match_type = match it.next().map(|m| literal(name, m)).transpose()?.as_deref() {
                    None | Some("termlist") => ClusterMatch::Termlist,
                    Some("termset") => ClusterMatch::Termset,
                    Some("ngramset") => ClusterMatch::Ngramset,
                    Some(other) => return Err(ParseError::literal(other, "unknown cluster match type")),
                };
                let delims = it.next().map(|d| literal(name, d)).transpose()?;
                TextExpr::Cluster {
                    field,
                    threshold,
                    match_type,
                    delims,
                }
            }
            _ => {
                check_arity(name, it.as_slice(), 1, Some(2))?;
                let value = self.type_value(next_arg(&mut it)?)?;
                let format = it.next().map(|f| literal(name, f)).transpose()?;
                TextExpr::ToString {
                    value: Box::new(value),
                    format,
                }
            }
        };
        Ok(text)
    }

    fn type_bool_call(&self, name: &str, args: Vec<Expr>) -> Result<BoolExpr> {
        let mut it = args.into_iter();
        match name {
            "true" | "false" => {
                check_arity(name, it.as_slice(), 0, Some(0))?;
                Ok(BoolExpr::Literal(name == "true"))
            }
            "like" => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let value = self.type_operand(next_arg(&mut it)?, true)?;
                let pattern = literal(name, next_arg(&mut it)?)?;
                let regex = CompiledRegex::new(&like_to_regex(&pattern))?;
                Ok(BoolExpr::Like {
                    value: Box::new(value),
                    pattern,
                    regex,
                })
            }
            "match" => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let value = self.type_operand(next_arg(&mut it)?, true)?;
                let regex = CompiledRegex::new(&literal(name, next_arg(&mut it)?)?)?;
                Ok(BoolExpr::Match {
                    value: Box::new(value),
                    regex,
                })
            }
            "cidrmatch" => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let cidr = self.type_operand(next_arg(&mut it)?, true)?;
                let ip = self.type_operand(next_arg(&mut it)?, true)?;
                Ok(BoolExpr::CidrMatch {
                    cidr: Box::new(cidr),
                    ip: Box::new(ip),
                })
            }
            "searchmatch" => {
                check_arity(name, it.as_slice(), 1, Some(1))?;
                self.type_searchmatch(literal(name, next_arg(&mut it)?)?)
            }
            _ => {
                check_arity(name, it.as_slice(), 2, None)?;
                let value = next_arg(&mut it)?;
                self.type_in(value, it.collect())
            }
        }
    }

    /// Compiles the snippet with the search grammar.
    fn type_searchmatch(&self, source: String) -> Result<BoolExpr> {
        if source.trim().is_empty() {
            return Err(ParseError::literal(&source, "searchmatch needs a search"));
        }
        let mut parser = Parser::new(&source, self.options);
        let filter = parser
            .parse_filter_only()?
            .ok_or_else(|| ParseError::literal(&source, "searchmatch needs a search"))?;

        let mut fields: Vec<String> = Vec::new();
        for comparison in filter.terminals() {
            if !fields.contains(&comparison.field) {
                fields.push(comparison.field.clone());
            }
        }
        Ok(BoolExpr::SearchMatch { source, filter, fields })
    }

    fn type_condition_call(&self, name: &str, args: Vec<Expr>) -> Result<ConditionExpr> {
        match name {
            "if" => {
                check_arity(name, &args, 3, Some(3))?;
                let mut it = args.into_iter();
                let condition = self.type_bool(next_arg(&mut it)?)?;
                let then = self.type_value(next_arg(&mut it)?)?;
                let otherwise = self.type_value(next_arg(&mut it)?)?;
                Ok(ConditionExpr::If {
                    condition: Box::new(condition),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                })
            }
            "case" | "validate" => {
                if args.is_empty() || args.len() % 2 != 0 {
                    return Err(ParseError::Arity {
                        function: name.to_string(),
                        expected: "an even number of".to_string(),
                        found: args.len(),
                    });
                }
                let mut pairs = Vec::with_capacity(args.len() / 2);
                let mut it = args.into_iter();
                while let (Some(condition), Some(value)) = (it.next(), it.next()) {
                    pairs.push(ConditionalValue {
                        condition: self.type_bool(condition)?,
                        value: self.type_value(value)?,
                    });
                }
                Ok(if name == "case" {
                    ConditionExpr::Case(pairs)
                } else {
                    ConditionExpr::Validate(pairs)
                })
            }
            "coalesce" => {
                check_arity(name, &args, 1, None)?;
                let values = args.into_iter().map(|a| self.type_value(a)).collect::<Result<_>>()?;
                Ok(ConditionExpr::Coalesce(values))
            }
            "nullif" => {
                check_arity(name, &args, 2, Some(2))?;
                let mut it = args.into_iter();
                let left = self.type_value(next_arg(&mut it)?)?;
                let right = self.type_value(next_arg(&mut it)?)?;
                Ok(ConditionExpr::NullIf {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            _ => {
                check_arity(name, &args, 0, Some(0))?;
                Ok(ConditionExpr::Null)
            }
        }
    }

    fn type_mv_call(&self, name: &str, args: Vec<Expr>) -> Result<MultiValueExpr> {
        let mut it = args.into_iter();
        let mv = match name {
            "mvappend" => {
                check_arity(name, it.as_slice(), 1, None)?;
                let params = it
                    .map(|arg| match arg {
                        Expr::Field(f) => Ok(MvParam::Field(f)),
                        Expr::String(s) | Expr::Number(s) => Ok(MvParam::Literal(s)),
                        other => self.type_value(other).map(|v| MvParam::Expr(Box::new(v))),
                    })
                    .collect::<Result<_>>()?;
                MultiValueExpr::Append(params)
            }
            "mvdedup" | "mvsort" => {
                check_arity(name, it.as_slice(), 1, Some(1))?;
                let mv = Box::new(self.type_multivalue(next_arg(&mut it)?)?);
                if name == "mvdedup" {
                    MultiValueExpr::Dedup(mv)
                } else {
                    MultiValueExpr::Sort(mv)
                }
            }
            "mvfilter" => {
                check_arity(name, it.as_slice(), 1, Some(1))?;
                MultiValueExpr::Filter(Box::new(self.type_bool(next_arg(&mut it)?)?))
            }
            "mvindex" => {
                check_arity(name, it.as_slice(), 2, Some(3))?;
                let mv = self.type_multivalue(next_arg(&mut it)?)?;
                let start = self.type_numeric(next_arg(&mut it)?)?;
                let end = it.next().map(|e| self.type_numeric(e)).transpose()?;
                MultiValueExpr::Index {
                    mv: Box::new(mv),
                    start,
                    end,
                }
            }
            "mvmap" => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let mv = self.type_multivalue(next_arg(&mut it)?)?;
                let mapping = self.type_value(next_arg(&mut it)?)?;
                MultiValueExpr::Map {
                    mv: Box::new(mv),
                    mapping: Box::new(mapping),
                }
            }
            "mvrange" => {
                check_arity(name, it.as_slice(), 2, Some(3))?;
                let start = self.type_numeric(next_arg(&mut it)?)?;
                let end = self.type_numeric(next_arg(&mut it)?)?;
                let step = it.next().map(|s| self.type_numeric(s)).transpose()?;
                MultiValueExpr::Range { start, end, step }
            }
            "mvzip" => {
                check_arity(name, it.as_slice(), 2, Some(3))?;
                let left = self.type_multivalue(next_arg(&mut it)?)?;
                let right = self.type_multivalue(next_arg(&mut it)?)?;
                let delimiter = it.next().map(|d| literal(name, d)).transpose()?;
                MultiValueExpr::Zip {
                    left: Box::new(left),
                    right: Box::new(right),
                    delimiter,
                }
            }
            "mv_to_json_array" => {
                check_arity(name, it.as_slice(), 1, Some(2))?;
                let mv = self.type_multivalue(next_arg(&mut it)?)?;
                let infer_types = match it.next() {
                    None => false,
                    Some(Expr::Boolean(b)) => b,
                    Some(other) => return Err(ParseError::mismatch("boolean literal", other)),
                };
                MultiValueExpr::ToJsonArray {
                    mv: Box::new(mv),
                    infer_types,
                }
            }
            _ => {
                check_arity(name, it.as_slice(), 2, Some(2))?;
                let value = self.type_string(next_arg(&mut it)?)?;
                let delimiter = literal(name, next_arg(&mut it)?)?;
                MultiValueExpr::Split { value, delimiter }
            }
        };
        Ok(mv)
    }
}

impl ParseError {
    fn with_family(self, value: &ValueExpr) -> Self {
        match self {
            ParseError::TypeMismatch { expected, found } => ParseError::TypeMismatch {
                expected,
                found: format!("{} ({})", found, value.family()),
            },
            other => other,
        }
    }
}

fn is_stringy(expr: &Expr) -> bool {
    match expr {
        Expr::String(_) => true,
        Expr::BinaryOp {
            op: BinOp::Concat, ..
        } => true,
        Expr::BinaryOp {
            op: BinOp::Add,
            left,
            right,
        } => is_stringy(left) || is_stringy(right),
        Expr::Call { name, .. } => STRING_FUNCTIONS.contains(&name.as_str()),
        _ => false,
    }
}

fn check_arity(name: &str, args: &[Expr], min: usize, max: Option<usize>) -> Result<()> {
    let fits = args.len() >= min && max.is_none_or(|max| args.len() <= max);
    if fits {
        return Ok(());
    }
    let expected = match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    };
    Err(ParseError::Arity {
        function: name.to_string(),
        expected,
        found: args.len(),
    })
}

fn next_arg(args: &mut impl Iterator<Item = Expr>) -> Result<Expr> {
    args.next()
        .ok_or_else(|| ParseError::UnexpectedEof("a function argument".to_string()))
}

/// Arguments that must be written as a string literal (patterns, formats,
/// delimiters).
fn literal(function: &str, expr: Expr) -> Result<String> {
    match expr {
        Expr::String(s) => Ok(s),
        other => Err(ParseError::mismatch(
            "string literal",
            format!("{} in {}()", other, function),
        )),
    }
}

fn number(text: &str) -> Result<Number> {
    Number::parse(text).ok_or_else(|| ParseError::literal(text, "not a number"))
}

fn compare_op(op: BinOp) -> CompareOp {
    match op {
        BinOp::NotEqual => CompareOp::NotEq,
        BinOp::LessThan => CompareOp::Lt,
        BinOp::LessEqual => CompareOp::LtEq,
        BinOp::GreaterThan => CompareOp::Gt,
        BinOp::GreaterEqual => CompareOp::GtEq,
        _ => CompareOp::Eq,
    }
}

fn arith_op(op: BinOp) -> ArithOp {
    match op {
        BinOp::Subtract => ArithOp::Subtract,
        BinOp::Multiply => ArithOp::Multiply,
        BinOp::Divide => ArithOp::Divide,
        BinOp::Modulo => ArithOp::Modulo,
        _ => ArithOp::Add,
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::error::ParseError;
    use crate::parser::{parse_bool_expr, parse_value_expr};

    #[test]
    fn test_field_arithmetic_is_numeric() {
        let value = parse_value_expr("bytes / 1024").unwrap();
        assert!(matches!(
            value,
            ValueExpr::Numeric(NumericExpr::Binary {
                op: ArithOp::Divide,
                ..
            })
        ));
        assert_eq!(value.fields(), vec!["bytes"]);
    }

    #[test]
    fn test_concat_flattens_into_atoms() {
        let value = parse_value_expr("first . \" \" . last + \"!\"").unwrap();
        let ValueExpr::String(StringExpr::Concat(atoms)) = value else {
            panic!("expected concat, got {:?}", value);
        };
        assert_eq!(
            atoms,
            vec![
                ConcatAtom::Field("first".into()),
                ConcatAtom::Literal(" ".into()),
                ConcatAtom::Field("last".into()),
                ConcatAtom::Literal("!".into()),
            ]
        );
    }

    #[test]
    fn test_string_plus_is_concat() {
        assert!(matches!(
            parse_value_expr("\"id-\" + id").unwrap(),
            ValueExpr::String(StringExpr::Concat(_))
        ));
    }

    #[test]
    fn test_field_compared_with_string_reads_text() {
        let cond = parse_bool_expr("status = \"ok\"").unwrap();
        let BoolExpr::Compare { left, .. } = cond else {
            panic!("expected comparison");
        };
        assert_eq!(*left, ValueExpr::String(StringExpr::Field("status".into())));
    }

    #[test]
    fn test_not_is_retained() {
        assert!(matches!(parse_bool_expr("NOT a > 1").unwrap(), BoolExpr::Not(_)));
    }

    #[test]
    fn test_arity_and_unknown_function() {
        assert!(matches!(parse_value_expr("pow(2)"), Err(ParseError::Arity { .. })));
        assert!(matches!(parse_value_expr("if(a, b)"), Err(ParseError::Arity { .. })));
        assert!(matches!(parse_value_expr("case(a>1)"), Err(ParseError::Arity { .. })));
        assert_eq!(
            parse_value_expr("frob(x)"),
            Err(ParseError::UnknownFunction("frob".into()))
        );
    }

    #[test]
    fn test_regex_arguments_compile_once() {
        let value = parse_value_expr("replace(uri, \"(?<id>\\d+)\", \"N\")").unwrap();
        let ValueExpr::String(StringExpr::Text(text)) = value else {
            panic!("expected text call");
        };
        let TextExpr::Replace { regex, .. } = *text else {
            panic!("expected replace");
        };
        assert_eq!(regex.capture_names(), vec!["id"]);
        assert!(matches!(
            parse_value_expr("replace(uri, \"(\", \"N\")"),
            Err(ParseError::InvalidRegex { .. })
        ));
        assert!(matches!(
            parse_value_expr("replace(uri, pattern, \"N\")"),
            Err(ParseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_like_compiles_sql_pattern() {
        let BoolExpr::Like { regex, pattern, value } = parse_bool_expr("like(uri, \"/api/%\")").unwrap() else {
            panic!("expected like");
        };
        assert_eq!(pattern, "/api/%");
        assert!(regex.regex().is_match("/api/users"));
        assert!(!regex.regex().is_match("/web/api/"));
        assert_eq!(value.fields(), vec!["uri"]);
    }

    #[test]
    fn test_searchmatch() {
        let BoolExpr::SearchMatch { filter, fields, .. } =
            parse_bool_expr("searchmatch(\"host=web* error\")").unwrap()
        else {
            panic!("expected searchmatch");
        };
        assert_eq!(fields, vec!["host", "*"]);
        assert_eq!(filter.terminals().len(), 2);

        assert!(parse_bool_expr("searchmatch(\"  \")").is_err());
        assert!(parse_bool_expr("searchmatch(x)").is_err());
        assert!(parse_bool_expr("searchmatch(\"earliest=-1d\")").is_err());
    }

    #[test]
    fn test_conditionals() {
        let value = parse_value_expr("case(code >= 500, \"error\", code >= 400, \"warn\")").unwrap();
        let ValueExpr::Condition(ConditionExpr::Case(pairs)) = value else {
            panic!("expected case");
        };
        assert_eq!(pairs.len(), 2);

        assert!(matches!(
            parse_value_expr("coalesce(a, b, \"none\")").unwrap(),
            ValueExpr::Condition(ConditionExpr::Coalesce(_))
        ));
    }

    #[test]
    fn test_multivalue() {
        let value = parse_value_expr("mvindex(split(tags, \",\"), 0)").unwrap();
        let ValueExpr::MultiValue(mv) = value else {
            panic!("expected multivalue");
        };
        assert!(mv.returns_scalar());

        let ValueExpr::MultiValue(MultiValueExpr::Append(params)) =
            parse_value_expr("mvappend(a, \"x\", 1 + 2)").unwrap()
        else {
            panic!("expected mvappend");
        };
        assert!(matches!(params[0], MvParam::Field(_)));
        assert!(matches!(params[1], MvParam::Literal(_)));
        assert!(matches!(params[2], MvParam::Expr(_)));
    }

    #[test]
    fn test_relative_time() {
        assert!(matches!(
            parse_value_expr("relative_time(now(), \"-1d@d\")").unwrap(),
            ValueExpr::Numeric(NumericExpr::RelativeTime { .. })
        ));
    }
}

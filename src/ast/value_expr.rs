//! Typed value expressions used by eval, where and the aggregation commands.
//!
//! Every node is tagged with the family it evaluates to. Families nest
//! freely (a string can contain a numeric call, a condition can return a
//! multivalue), but each node owns its children and terminals own nothing.

use serde::Serialize;

use super::filter::{CompareOp, FilterNode};
use crate::time::TimeModifier;
use crate::value::{CompiledRegex, Number};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueExpr {
    Numeric(NumericExpr),
    String(StringExpr),
    Boolean(BoolExpr),
    Condition(ConditionExpr),
    MultiValue(MultiValueExpr),
}

impl ValueExpr {
    /// Fields read by the expression, in first-use order.
    pub fn fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    pub(crate) fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            ValueExpr::Numeric(e) => e.collect_fields(out),
            ValueExpr::String(e) => e.collect_fields(out),
            ValueExpr::Boolean(e) => e.collect_fields(out),
            ValueExpr::Condition(e) => e.collect_fields(out),
            ValueExpr::MultiValue(e) => e.collect_fields(out),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            ValueExpr::Numeric(_) => "numeric",
            ValueExpr::String(_) => "string",
            ValueExpr::Boolean(_) => "boolean",
            ValueExpr::Condition(_) => "conditional",
            ValueExpr::MultiValue(_) => "multivalue",
        }
    }
}

fn push_field(out: &mut Vec<String>, name: &str) {
    if !out.iter().any(|f| f == name) {
        out.push(name.to_string());
    }
}

// ============================================================================
// Numeric
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericExpr {
    Number(Number),
    /// A field whose value is read as a number
    Field(String),
    Binary {
        op: ArithOp,
        left: Box<NumericExpr>,
        right: Box<NumericExpr>,
    },
    Call {
        func: NumericFunc,
        args: Vec<NumericExpr>,
    },
    Len(Box<StringExpr>),
    ToNumber {
        value: Box<StringExpr>,
        base: Option<Box<NumericExpr>>,
    },
    RelativeTime {
        time: Box<NumericExpr>,
        modifier: TimeModifier,
    },
    /// `if`, `case` and friends whose result is read as a number
    Conditional(Box<ConditionExpr>),
}

impl NumericExpr {
    pub fn is_terminal(&self) -> bool {
        match self {
            NumericExpr::Number(_) | NumericExpr::Field(_) => true,
            NumericExpr::Call { args, .. } => args.is_empty(),
            _ => false,
        }
    }

    pub fn fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    pub(crate) fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            NumericExpr::Number(_) => {}
            NumericExpr::Field(name) => push_field(out, name),
            NumericExpr::Binary { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            NumericExpr::Call { args, .. } => args.iter().for_each(|a| a.collect_fields(out)),
            NumericExpr::Len(value) => value.collect_fields(out),
            NumericExpr::ToNumber { value, base } => {
                value.collect_fields(out);
                if let Some(base) = base {
                    base.collect_fields(out);
                }
            }
            NumericExpr::RelativeTime { time, .. } => time.collect_fields(out),
            NumericExpr::Conditional(cond) => cond.collect_fields(out),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArithOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "%")]
    Modulo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericFunc {
    Abs,
    Ceil,
    Floor,
    Round,
    Sqrt,
    Ln,
    Log,
    Pow,
    Exp,
    Sigfig,
    Exact,
    Random,
    Pi,
    Acos,
    Acosh,
    Asin,
    Asinh,
    Atan,
    Atan2,
    Atanh,
    Cos,
    Cosh,
    Sin,
    Sinh,
    Tan,
    Tanh,
    Hypot,
    Now,
    Time,
}

impl NumericFunc {
    /// Function and its accepted argument counts.
    pub fn lookup(name: &str) -> Option<(NumericFunc, usize, usize)> {
        use NumericFunc::*;
        let entry = match name {
            "abs" => (Abs, 1, 1),
            "ceil" | "ceiling" => (Ceil, 1, 1),
            "floor" => (Floor, 1, 1),
            "round" => (Round, 1, 2),
            "sqrt" => (Sqrt, 1, 1),
            "ln" => (Ln, 1, 1),
            "log" => (Log, 1, 2),
            "pow" => (Pow, 2, 2),
            "exp" => (Exp, 1, 1),
            "sigfig" => (Sigfig, 1, 1),
            "exact" => (Exact, 1, 1),
            "random" => (Random, 0, 0),
            "pi" => (Pi, 0, 0),
            "acos" => (Acos, 1, 1),
            "acosh" => (Acosh, 1, 1),
            "asin" => (Asin, 1, 1),
            "asinh" => (Asinh, 1, 1),
            "atan" => (Atan, 1, 1),
            "atan2" => (Atan2, 2, 2),
            "atanh" => (Atanh, 1, 1),
            "cos" => (Cos, 1, 1),
            "cosh" => (Cosh, 1, 1),
            "sin" => (Sin, 1, 1),
            "sinh" => (Sinh, 1, 1),
            "tan" => (Tan, 1, 1),
            "tanh" => (Tanh, 1, 1),
            "hypot" => (Hypot, 2, 2),
            "now" => (Now, 0, 0),
            "time" => (Time, 0, 0),
            _ => return None,
        };
        Some(entry)
    }
}

// ============================================================================
// String
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StringExpr {
    Raw(String),
    Field(String),
    Concat(Vec<ConcatAtom>),
    Text(Box<TextExpr>),
}

impl StringExpr {
    pub fn fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    pub(crate) fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            StringExpr::Raw(_) => {}
            StringExpr::Field(name) => push_field(out, name),
            StringExpr::Concat(atoms) => {
                for atom in atoms {
                    match atom {
                        ConcatAtom::Literal(_) => {}
                        ConcatAtom::Field(name) => push_field(out, name),
                        ConcatAtom::Nested(expr) => expr.collect_fields(out),
                    }
                }
            }
            StringExpr::Text(text) => text.collect_fields(out),
        }
    }
}

/// One piece of a `.` concatenation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcatAtom {
    Literal(String),
    Field(String),
    Nested(Box<ValueExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimSide {
    Both,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpathPath {
    Literal(String),
    Field(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMatch {
    Termlist,
    Termset,
    Ngramset,
}

/// String-valued function calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextExpr {
    Lower(StringExpr),
    Upper(StringExpr),
    Trim {
        side: TrimSide,
        value: StringExpr,
        chars: Option<String>,
    },
    Replace {
        value: StringExpr,
        regex: CompiledRegex,
        replacement: String,
    },
    Substr {
        value: StringExpr,
        start: NumericExpr,
        length: Option<NumericExpr>,
    },
    Spath {
        input: StringExpr,
        path: SpathPath,
    },
    Strftime {
        time: NumericExpr,
        format: String,
    },
    Strptime {
        value: StringExpr,
        format: String,
    },
    UrlDecode(StringExpr),
    IpMask {
        mask: String,
        ip: StringExpr,
    },
    ObjectToArray {
        field: String,
        key_label: String,
        value_label: String,
    },
    Printf {
        format: String,
        args: Vec<ValueExpr>,
    },
    ToJson(Vec<ValueExpr>),
    TypeOf(Box<ValueExpr>),
    MvJoin {
        mv: Box<MultiValueExpr>,
        delimiter: String,
    },
    MvCount(Box<MultiValueExpr>),
    MvFind {
        mv: Box<MultiValueExpr>,
        regex: CompiledRegex,
    },
    GetFields(Option<String>),
    Cluster {
        field: StringExpr,
        threshold: f64,
        match_type: ClusterMatch,
        delims: Option<String>,
    },
    ToString {
        value: Box<ValueExpr>,
        format: Option<String>,
    },
}

impl TextExpr {
    pub(crate) fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            TextExpr::Lower(v) | TextExpr::Upper(v) | TextExpr::UrlDecode(v) => v.collect_fields(out),
            TextExpr::Trim { value, .. }
            | TextExpr::Replace { value, .. }
            | TextExpr::Strptime { value, .. } => value.collect_fields(out),
            TextExpr::Substr { value, start, length } => {
                value.collect_fields(out);
                start.collect_fields(out);
                if let Some(length) = length {
                    length.collect_fields(out);
                }
            }
            TextExpr::Spath { input, path } => {
                input.collect_fields(out);
                if let SpathPath::Field(name) = path {
                    push_field(out, name);
                }
            }
            TextExpr::Strftime { time, .. } => time.collect_fields(out),
            TextExpr::IpMask { ip, .. } => ip.collect_fields(out),
            TextExpr::ObjectToArray { field, .. } => push_field(out, field),
            TextExpr::Printf { args, .. } | TextExpr::ToJson(args) => {
                args.iter().for_each(|a| a.collect_fields(out))
            }
            TextExpr::TypeOf(value) | TextExpr::ToString { value, .. } => value.collect_fields(out),
            TextExpr::MvJoin { mv, .. } | TextExpr::MvCount(mv) | TextExpr::MvFind { mv, .. } => {
                mv.collect_fields(out)
            }
            TextExpr::GetFields(_) => {}
            TextExpr::Cluster { field, .. } => field.collect_fields(out),
        }
    }
}

// ============================================================================
// Boolean
// ============================================================================

/// Boolean expression. Unlike the search filter, NOT stays an explicit node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolExpr {
    Literal(bool),
    Compare {
        op: CompareOp,
        left: Box<ValueExpr>,
        right: Box<ValueExpr>,
    },
    In {
        value: Box<ValueExpr>,
        list: Vec<ValueExpr>,
    },
    Predicate {
        kind: Predicate,
        value: Box<ValueExpr>,
    },
    Like {
        value: Box<ValueExpr>,
        pattern: String,
        regex: CompiledRegex,
    },
    Match {
        value: Box<ValueExpr>,
        regex: CompiledRegex,
    },
    CidrMatch {
        cidr: Box<ValueExpr>,
        ip: Box<ValueExpr>,
    },
    /// `searchmatch("...")`, compiled with the search grammar
    SearchMatch {
        source: String,
        filter: FilterNode,
        fields: Vec<String>,
    },
    Not(Box<BoolExpr>),
    Binary {
        op: BoolOp,
        left: Box<BoolExpr>,
        right: Box<BoolExpr>,
    },
}

impl BoolExpr {
    pub fn fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    pub(crate) fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            BoolExpr::Literal(_) => {}
            BoolExpr::Compare { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            BoolExpr::In { value, list } => {
                value.collect_fields(out);
                list.iter().for_each(|v| v.collect_fields(out));
            }
            BoolExpr::Predicate { value, .. }
            | BoolExpr::Like { value, .. }
            | BoolExpr::Match { value, .. } => value.collect_fields(out),
            BoolExpr::CidrMatch { cidr, ip } => {
                cidr.collect_fields(out);
                ip.collect_fields(out);
            }
            BoolExpr::SearchMatch { fields, .. } => fields.iter().for_each(|f| push_field(out, f)),
            BoolExpr::Not(inner) => inner.collect_fields(out),
            BoolExpr::Binary { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    IsStr,
    IsNum,
    IsInt,
    IsBool,
    IsNull,
    IsNotNull,
}

impl Predicate {
    pub fn lookup(name: &str) -> Option<Predicate> {
        let predicate = match name {
            "isstr" => Predicate::IsStr,
            "isnum" => Predicate::IsNum,
            "isint" => Predicate::IsInt,
            "isbool" => Predicate::IsBool,
            "isnull" => Predicate::IsNull,
            "isnotnull" => Predicate::IsNotNull,
            _ => return None,
        };
        Some(predicate)
    }
}

// ============================================================================
// Conditional
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalValue {
    pub condition: BoolExpr,
    pub value: ValueExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionExpr {
    If {
        condition: Box<BoolExpr>,
        then: Box<ValueExpr>,
        otherwise: Box<ValueExpr>,
    },
    /// First value whose condition holds
    Case(Vec<ConditionalValue>),
    /// First value whose condition fails
    Validate(Vec<ConditionalValue>),
    Coalesce(Vec<ValueExpr>),
    NullIf {
        left: Box<ValueExpr>,
        right: Box<ValueExpr>,
    },
    Null,
}

impl ConditionExpr {
    pub(crate) fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            ConditionExpr::If {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_fields(out);
                then.collect_fields(out);
                otherwise.collect_fields(out);
            }
            ConditionExpr::Case(pairs) | ConditionExpr::Validate(pairs) => {
                for pair in pairs {
                    pair.condition.collect_fields(out);
                    pair.value.collect_fields(out);
                }
            }
            ConditionExpr::Coalesce(values) => values.iter().for_each(|v| v.collect_fields(out)),
            ConditionExpr::NullIf { left, right } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            ConditionExpr::Null => {}
        }
    }
}

// ============================================================================
// Multivalue
// ============================================================================

/// Argument of `mvappend`, which mixes fields, literals and expressions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MvParam {
    Field(String),
    Literal(String),
    Expr(Box<ValueExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiValueExpr {
    /// A multivalue field read as is
    Field(String),
    Append(Vec<MvParam>),
    Dedup(Box<MultiValueExpr>),
    Filter(Box<BoolExpr>),
    Index {
        mv: Box<MultiValueExpr>,
        start: NumericExpr,
        end: Option<NumericExpr>,
    },
    Map {
        mv: Box<MultiValueExpr>,
        mapping: Box<ValueExpr>,
    },
    Range {
        start: NumericExpr,
        end: NumericExpr,
        step: Option<NumericExpr>,
    },
    Sort(Box<MultiValueExpr>),
    Zip {
        left: Box<MultiValueExpr>,
        right: Box<MultiValueExpr>,
        delimiter: Option<String>,
    },
    ToJsonArray {
        mv: Box<MultiValueExpr>,
        infer_types: bool,
    },
    Split {
        value: StringExpr,
        delimiter: String,
    },
}

impl MultiValueExpr {
    /// `mvindex(mv, i)` yields a single value rather than a list.
    pub fn returns_scalar(&self) -> bool {
        matches!(self, MultiValueExpr::Index { end: None, .. })
    }

    pub(crate) fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            MultiValueExpr::Field(name) => push_field(out, name),
            MultiValueExpr::Append(params) => {
                for param in params {
                    match param {
                        MvParam::Field(name) => push_field(out, name),
                        MvParam::Literal(_) => {}
                        MvParam::Expr(expr) => expr.collect_fields(out),
                    }
                }
            }
            MultiValueExpr::Dedup(mv) | MultiValueExpr::Sort(mv) => mv.collect_fields(out),
            MultiValueExpr::Filter(cond) => cond.collect_fields(out),
            MultiValueExpr::Index { mv, start, end } => {
                mv.collect_fields(out);
                start.collect_fields(out);
                if let Some(end) = end {
                    end.collect_fields(out);
                }
            }
            MultiValueExpr::Map { mv, mapping } => {
                mv.collect_fields(out);
                mapping.collect_fields(out);
            }
            MultiValueExpr::Range { start, end, step } => {
                start.collect_fields(out);
                end.collect_fields(out);
                if let Some(step) = step {
                    step.collect_fields(out);
                }
            }
            MultiValueExpr::Zip { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            MultiValueExpr::ToJsonArray { mv, .. } => mv.collect_fields(out),
            MultiValueExpr::Split { value, .. } => value.collect_fields(out),
        }
    }
}

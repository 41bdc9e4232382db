use serde::Serialize;

use super::filter::FilterNode;
use super::value_expr::{BoolExpr, ValueExpr};
use crate::time::TimeUnit;
use crate::value::{CompiledRegex, Number};

/// Kind of work a pipe stage asks the executor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeCommandType {
    OutputTransform,
    MeasureAggs,
    GroupBy,
    Transaction,
    StreamStats,
    GenerateEvent,
}

/// One step of the compiled pipeline.
///
/// A single command can expand into several stages: `stats avg(x) AS a`
/// is a measure stage followed by a rename.
///
/// # Examples
/// ```text
/// | eval kb=bytes/1024        OutputTransform(Let)
/// | stats count BY host       GroupBy
/// | transaction session_id    Transaction
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeStage {
    OutputTransform(OutputTransforms),
    MeasureAggs(Vec<MeasureAggregator>),
    GroupBy(GroupByRequest),
    Transaction(TransactionArguments),
    StreamStats(StreamStatsOptions),
    GenerateEvent(GenerateEvent),
}

impl PipeStage {
    pub fn command_type(&self) -> PipeCommandType {
        match self {
            PipeStage::OutputTransform(_) => PipeCommandType::OutputTransform,
            PipeStage::MeasureAggs(_) => PipeCommandType::MeasureAggs,
            PipeStage::GroupBy(_) => PipeCommandType::GroupBy,
            PipeStage::Transaction(_) => PipeCommandType::Transaction,
            PipeStage::StreamStats(_) => PipeCommandType::StreamStats,
            PipeStage::GenerateEvent(_) => PipeCommandType::GenerateEvent,
        }
    }

    pub(crate) fn let_column(new_col_name: impl Into<String>, request: LetRequest) -> Self {
        PipeStage::OutputTransform(OutputTransforms::Let(LetColumnsRequest {
            new_col_name: new_col_name.into(),
            request,
        }))
    }
}

// ============================================================================
// Output transforms
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTransforms {
    Columns(ColumnsRequest),
    Let(LetColumnsRequest),
    /// `where`: drop rows failing the condition
    FilterRows(BoolExpr),
    Head(HeadExpr),
    Tail(TailExpr),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ColumnsRequest {
    pub include_columns: Vec<String>,
    pub exclude_columns: Vec<String>,
    pub rename_columns: Vec<(String, String)>,
    pub rename_aggregation_columns: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LetColumnsRequest {
    pub new_col_name: String,
    pub request: LetRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LetRequest {
    Value(ValueExpr),
    Rex(RexExpr),
    Rename(RenameExpr),
    Dedup(DedupExpr),
    Sort(SortExpr),
    Statistic(StatisticExpr),
    Bin(BinOptions),
    MultiValue(MultiValueColRequest),
    Spath(SpathExpr),
    Format(FormatResultsRequest),
    FillNull(FillNullExpr),
    MvExpand(MvExpandExpr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadExpr {
    /// `None` when only a stop predicate was given.
    pub max_rows: Option<u64>,
    pub keep_last: bool,
    pub null: bool,
    pub predicate: Option<BoolExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TailExpr {
    pub max_rows: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RexExpr {
    pub pattern: CompiledRegex,
    pub field_name: String,
    pub rex_col_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameMode {
    /// New name was quoted
    Phrase,
    /// Either side contains `*`
    Wildcard,
    /// Plain rename, replacing any field of the new name
    Override,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenameExpr {
    pub mode: RenameMode,
    pub original_pattern: String,
    pub new_pattern: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOp {
    Auto,
    Str,
    Num,
    Ip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortElement {
    pub field: String,
    pub ascending: bool,
    pub op: Option<SortOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupExpr {
    pub limit: u64,
    pub fields: Vec<String>,
    pub keep_events: bool,
    pub keep_empty: bool,
    pub consecutive: bool,
    pub sort_by: Vec<SortElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortExpr {
    pub elements: Vec<SortElement>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticFunction {
    Top,
    Rare,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticOptions {
    pub count_field: String,
    pub percent_field: String,
    pub show_count: bool,
    pub show_perc: bool,
    pub use_other: bool,
    pub other_str: String,
}

impl Default for StatisticOptions {
    fn default() -> Self {
        StatisticOptions {
            count_field: "count".to_string(),
            percent_field: "percent".to_string(),
            show_count: true,
            show_perc: true,
            use_other: false,
            other_str: "other".to_string(),
        }
    }
}

/// Ranking step of `top` / `rare`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticExpr {
    pub function: StatisticFunction,
    pub limit: u64,
    pub options: StatisticOptions,
    pub field_list: Vec<String>,
    pub by_clause: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinSpanLength {
    pub num: f64,
    pub time_scale: TimeUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSpan {
    pub coefficient: f64,
    pub base: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinSpan {
    Numeric(Number),
    Time(BinSpanLength),
    Log(LogSpan),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinOptions {
    pub field: String,
    pub new_field_name: Option<String>,
    pub span: Option<BinSpan>,
    pub min_span: Option<BinSpanLength>,
    pub max_bins: u64,
    pub start: Option<Number>,
    pub end: Option<Number>,
    /// Resolved epoch milliseconds
    pub align_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MakeMvSplit {
    Delimiter(String),
    Tokenizer(CompiledRegex),
}

/// `makemv`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiValueColRequest {
    pub col_name: String,
    pub split: MakeMvSplit,
    pub allow_empty: bool,
    pub setsv: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpathExpr {
    pub input_col: String,
    pub output_col: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowColumnOptions {
    pub row_prefix: String,
    pub column_prefix: String,
    pub column_separator: String,
    pub column_end: String,
    pub row_separator: String,
    pub row_end: String,
}

impl Default for RowColumnOptions {
    fn default() -> Self {
        RowColumnOptions {
            row_prefix: "(".to_string(),
            column_prefix: "(".to_string(),
            column_separator: "AND".to_string(),
            column_end: ")".to_string(),
            row_separator: "OR".to_string(),
            row_end: ")".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatResultsRequest {
    pub mv_separator: String,
    pub max_results: u64,
    pub empty_string: String,
    pub row_column_options: RowColumnOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillNullExpr {
    pub value: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MvExpandExpr {
    pub field: String,
    pub limit: Option<u64>,
}

// ============================================================================
// Aggregations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    Cardinality,
    EstdcCardinality,
    Avg,
    Min,
    Max,
    Sum,
    Sumsq,
    Range,
    Values,
    List,
    Median,
    Mode,
    Stdev,
    Stdevp,
    Var,
    Varp,
    Percentile(f64),
    Earliest,
    Latest,
    First,
    Last,
}

impl AggregateFunction {
    pub fn lookup(name: &str) -> Option<AggregateFunction> {
        use AggregateFunction::*;
        let lower = name.to_ascii_lowercase();
        let func = match lower.as_str() {
            "count" | "c" => Count,
            "dc" | "distinct_count" | "cardinality" => Cardinality,
            "estdc" => EstdcCardinality,
            "avg" | "mean" => Avg,
            "min" => Min,
            "max" => Max,
            "sum" => Sum,
            "sumsq" => Sumsq,
            "range" => Range,
            "values" => Values,
            "list" => List,
            "median" => Median,
            "mode" => Mode,
            "stdev" => Stdev,
            "stdevp" => Stdevp,
            "var" => Var,
            "varp" => Varp,
            "earliest" => Earliest,
            "latest" => Latest,
            "first" => First,
            "last" => Last,
            other => {
                let digits = ["exactperc", "upperperc", "perc", "p"]
                    .iter()
                    .find_map(|prefix| other.strip_prefix(prefix))?;
                let pct: f64 = digits.parse().ok()?;
                if digits.is_empty() || !(0.0..=100.0).contains(&pct) {
                    return None;
                }
                Percentile(pct)
            }
        };
        Some(func)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureAggregator {
    pub measure_col: String,
    pub measure_func: AggregateFunction,
    /// Output column name, as written (`avg(bytes)`)
    pub name: String,
    /// Set for `func(eval(...))`
    pub value_col_request: Option<ValueExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitOrder {
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitExpr {
    pub order: LimitOrder,
    pub num: u64,
}

/// `timechart` bucketing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub span: BinSpanLength,
    pub by_field: Option<String>,
    pub limit: Option<LimitExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupByRequest {
    pub measure_operations: Vec<MeasureAggregator>,
    pub group_by_columns: Vec<String>,
    pub bucket_limit: Option<u64>,
    pub time_histogram: Option<TimeBucket>,
}

// ============================================================================
// Transaction / streamstats
// ============================================================================

/// Boundary condition of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStringExpr {
    StringValue(String),
    EvalBoolExpr(BoolExpr),
    SearchNode(FilterNode),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionArguments {
    pub fields: Vec<String>,
    pub starts_with: Option<FilterStringExpr>,
    pub ends_with: Option<FilterStringExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamStatsOptions {
    pub all_num: bool,
    pub current: bool,
    pub global: bool,
    pub reset_on_change: bool,
    /// 0 means unbounded
    pub window: u64,
    pub time_window: Option<BinSpanLength>,
    pub reset_before: Option<BoolExpr>,
    pub reset_after: Option<BoolExpr>,
    pub measure_operations: Vec<MeasureAggregator>,
    pub group_by_columns: Vec<String>,
}

// ============================================================================
// Generating commands
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerateEvent {
    GenTimes(GenTimes),
    InputLookup(InputLookup),
    EventCount(EventCount),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenTimesInterval {
    pub num: u64,
    pub unit: TimeUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenTimes {
    pub start_time: i64,
    pub end_time: i64,
    pub interval: GenTimesInterval,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputLookup {
    pub filename: String,
    pub append: bool,
    pub strict: bool,
    pub start: u64,
    pub max: u64,
    pub where_clause: Option<BoolExpr>,
    pub has_prev_results: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventCount {
    pub indices: Vec<String>,
    pub summarize: bool,
    pub report_size: bool,
    pub list_vix: bool,
}

//! Aggregating commands: `stats`, `timechart`, `streamstats`, `top`, `rare`.
//!
//! All of them share the `func(col) [AS alias]` list and the `BY` clause.
//! Aliases never live on the aggregator itself; they become a rename stage
//! after the aggregation.

use crate::ast::{
    AggregateFunction, BinSpanLength, BoolExpr, ColumnsRequest, Expr, GroupByRequest, LetRequest,
    LimitExpr, LimitOrder, MeasureAggregator, OutputTransforms, PipeStage, StatisticExpr,
    StatisticFunction, StatisticOptions, StreamStatsOptions, TimeBucket, Token,
};
use crate::error::{ParseError, Result};
use crate::lexer::LexMode;
use crate::time::TimeUnit;

use super::Parser;
use super::commands::{parse_bool, parse_span_length, parse_u64};

const MODE: LexMode = LexMode::Command;

const MAX_STREAMSTATS_WINDOW: u64 = 10_000;
const DEFAULT_TOP_LIMIT: u64 = 10;

/// Column every `timechart` groups on first.
const TIMESTAMP_COLUMN: &str = "timestamp";

struct AggregationList {
    measures: Vec<MeasureAggregator>,
    renames: Vec<(String, String)>,
}

impl AggregationList {
    /// The rename stage that applies `AS` aliases, if any were given.
    fn rename_stage(&self) -> Option<PipeStage> {
        if self.renames.is_empty() {
            return None;
        }
        Some(PipeStage::OutputTransform(OutputTransforms::Columns(ColumnsRequest {
            rename_aggregation_columns: self.renames.clone(),
            ..Default::default()
        })))
    }
}

impl Parser<'_> {
    pub(super) fn parse_stats(&mut self) -> Result<Vec<PipeStage>> {
        let list = self.parse_aggregation_list("stats")?;
        let group_by_columns = self.parse_by_clause("stats")?;
        self.expect_end(MODE)?;

        let rename = list.rename_stage();
        let mut stages = vec![if group_by_columns.is_empty() {
            PipeStage::MeasureAggs(list.measures)
        } else {
            PipeStage::GroupBy(GroupByRequest {
                measure_operations: list.measures,
                group_by_columns,
                bucket_limit: None,
                time_histogram: None,
            })
        }];
        stages.extend(rename);
        Ok(stages)
    }

    pub(super) fn parse_timechart(&mut self) -> Result<Vec<PipeStage>> {
        let mut span = None;
        let mut limit = None;

        self.parse_timechart_options(&mut span, &mut limit)?;
        let list = self.parse_aggregation_list("timechart")?;
        let by_field = match self.parse_by_clause("timechart")?.as_slice() {
            [] => None,
            [field] => Some(field.clone()),
            _ => return Err(ParseError::command("timechart", "BY takes a single field")),
        };
        self.parse_timechart_options(&mut span, &mut limit)?;
        self.expect_end(MODE)?;

        let span = span.ok_or_else(|| ParseError::command("timechart", "span= is required"))?;
        let mut group_by_columns = vec![TIMESTAMP_COLUMN.to_string()];
        group_by_columns.extend(by_field.clone());

        let rename = list.rename_stage();
        let mut stages = vec![PipeStage::GroupBy(GroupByRequest {
            measure_operations: list.measures,
            group_by_columns,
            bucket_limit: None,
            time_histogram: Some(TimeBucket { span, by_field, limit }),
        })];
        stages.extend(rename);
        Ok(stages)
    }

    fn parse_timechart_options(
        &mut self,
        span: &mut Option<BinSpanLength>,
        limit: &mut Option<LimitExpr>,
    ) -> Result<()> {
        while let Some((key, value)) = self.read_option()? {
            match key.as_str() {
                "span" => {
                    let length = parse_span_length("timechart", &value)?;
                    if length.time_scale == TimeUnit::Year {
                        return Err(ParseError::command("timechart", "year spans are not supported"));
                    }
                    *span = Some(length);
                }
                "limit" => *limit = Some(parse_limit(&value)?),
                _ => return Err(ParseError::command("timechart", format!("unknown option {}", key))),
            }
        }
        Ok(())
    }

    pub(super) fn parse_streamstats(&mut self) -> Result<Vec<PipeStage>> {
        let mut options = StreamStatsOptions {
            all_num: true,
            current: true,
            global: true,
            reset_on_change: false,
            window: 0,
            time_window: None,
            reset_before: None,
            reset_after: None,
            measure_operations: Vec::new(),
            group_by_columns: Vec::new(),
        };

        while let Some(key) = self.peek_option_key()? {
            if key == "reset_before" || key == "reset_after" {
                self.next(MODE)?;
                self.expect(MODE, Token::Eq)?;
                let condition = Some(self.parse_reset_condition()?);
                if key == "reset_before" {
                    options.reset_before = condition;
                } else {
                    options.reset_after = condition;
                }
                continue;
            }

            let value = self.option_value()?;
            match key.as_str() {
                "allnum" => options.all_num = parse_bool("streamstats", &key, &value)?,
                "current" => options.current = parse_bool("streamstats", &key, &value)?,
                "global" => options.global = parse_bool("streamstats", &key, &value)?,
                "reset_on_change" => options.reset_on_change = parse_bool("streamstats", &key, &value)?,
                "window" => {
                    let window = parse_u64("streamstats", &key, &value)?;
                    if window > MAX_STREAMSTATS_WINDOW {
                        return Err(ParseError::command(
                            "streamstats",
                            format!("window must be between 0 and {}, got {}", MAX_STREAMSTATS_WINDOW, window),
                        ));
                    }
                    options.window = window;
                }
                "time_window" => {
                    let length = parse_span_length("streamstats", &value)?;
                    if length.time_scale.is_subsecond() {
                        return Err(ParseError::UnsupportedTimeUnit(length.time_scale.to_string()));
                    }
                    options.time_window = Some(length);
                }
                _ => return Err(ParseError::command("streamstats", format!("unknown option {}", key))),
            }
        }

        let list = self.parse_aggregation_list("streamstats")?;
        let rename = list.rename_stage();
        options.measure_operations = list.measures;
        options.group_by_columns = self.parse_by_clause("streamstats")?;
        self.expect_end(MODE)?;

        let mut stages = vec![PipeStage::StreamStats(options)];
        stages.extend(rename);
        Ok(stages)
    }

    /// `(expr)` or `"expr"`.
    fn parse_reset_condition(&mut self) -> Result<BoolExpr> {
        match self.peek(MODE)? {
            Token::LParen => {
                let expr = self.parse_expression()?;
                self.type_bool(expr)
            }
            Token::Quoted(text) => {
                self.next(MODE)?;
                let mut inner = Parser::new(&text, self.options);
                inner.parse_bool_until_end()
            }
            _ => {
                let found = self.next(MODE)?;
                Err(self.unexpected(found, "a (condition) or \"condition\""))
            }
        }
    }

    /// `top` / `rare`: a count per value, a ranking step and a rename of the
    /// count column.
    pub(super) fn parse_top_rare(&mut self, command: &str) -> Result<Vec<PipeStage>> {
        let mut limit = None;
        let mut options = StatisticOptions::default();
        let mut field_list = Vec::new();

        loop {
            if let Some((key, value)) = self.read_option()? {
                match key.as_str() {
                    "limit" => limit = Some(parse_u64(command, &key, &value)?),
                    "countfield" => options.count_field = value,
                    "percentfield" => options.percent_field = value,
                    "showcount" => options.show_count = parse_bool(command, &key, &value)?,
                    "showperc" => options.show_perc = parse_bool(command, &key, &value)?,
                    "useother" => options.use_other = parse_bool(command, &key, &value)?,
                    "otherstr" => options.other_str = value,
                    _ => return Err(ParseError::command(command, format!("unknown option {}", key))),
                }
                continue;
            }
            match self.peek(MODE)? {
                Token::Word(w) if field_list.is_empty() && limit.is_none() && w.chars().all(|c| c.is_ascii_digit()) => {
                    self.next(MODE)?;
                    limit = Some(parse_u64(command, "limit", &w)?);
                }
                _ => {
                    let fields = self.parse_field_list(&["by"])?;
                    if fields.is_empty() {
                        break;
                    }
                    field_list.extend(fields);
                }
            }
        }
        let by_clause = self.parse_by_clause(command)?;
        self.expect_end(MODE)?;

        if field_list.is_empty() {
            return Err(ParseError::command(command, "expected at least one field"));
        }

        let function = if command == "top" {
            StatisticFunction::Top
        } else {
            StatisticFunction::Rare
        };
        let mut group_by_columns = field_list.clone();
        group_by_columns.extend(by_clause.iter().cloned());
        let count_field = options.count_field.clone();

        Ok(vec![
            PipeStage::GroupBy(GroupByRequest {
                measure_operations: vec![count_of_all("count")],
                group_by_columns,
                bucket_limit: None,
                time_histogram: None,
            }),
            PipeStage::let_column(
                "",
                LetRequest::Statistic(StatisticExpr {
                    function,
                    limit: limit.unwrap_or(DEFAULT_TOP_LIMIT),
                    options,
                    field_list,
                    by_clause,
                }),
            ),
            PipeStage::OutputTransform(OutputTransforms::Columns(ColumnsRequest {
                rename_columns: vec![("count".to_string(), count_field)],
                ..Default::default()
            })),
        ])
    }

    /// `func(col) [AS alias]` entries separated by spaces or commas, up to
    /// `BY` or the end of the segment.
    fn parse_aggregation_list(&mut self, command: &str) -> Result<AggregationList> {
        let mut list = AggregationList {
            measures: Vec::new(),
            renames: Vec::new(),
        };

        loop {
            match self.peek(MODE)? {
                Token::Comma => {
                    self.next(MODE)?;
                    continue;
                }
                Token::Word(w) if !w.eq_ignore_ascii_case("by") => {}
                _ => break,
            }
            if self.peek_option_key()?.is_some() {
                break;
            }

            let measure = self.parse_aggregator()?;
            if self.peek(MODE)?.is_word("as") {
                self.next(MODE)?;
                let alias = self.expect_name("an alias")?;
                list.renames.push((measure.name.clone(), alias));
            }
            list.measures.push(measure);
        }

        if list.measures.is_empty() {
            return Err(ParseError::command(command, "expected at least one aggregation"));
        }
        Ok(list)
    }

    fn parse_aggregator(&mut self) -> Result<MeasureAggregator> {
        let func_name = self.expect_name("an aggregation")?;
        let start = self.lexer.token_start();
        let func = AggregateFunction::lookup(&func_name)
            .ok_or_else(|| ParseError::UnknownFunction(func_name.clone()))?;

        if !self.check(MODE, &Token::LParen)? {
            // Only a bare `count` may omit its column.
            if func != AggregateFunction::Count {
                return Err(ParseError::command(
                    "stats",
                    format!("{} needs a column, as in {}(field)", func_name, func_name),
                ));
            }
            return Ok(count_of_all(&func_name));
        }
        self.next(MODE)?;

        if self.peek(MODE)?.is_word("eval") {
            let expr = self.parse_expression()?;
            let Expr::Call { mut args, .. } = expr else {
                return Err(ParseError::command("stats", "expected eval(<expression>)"));
            };
            if args.len() != 1 {
                return Err(ParseError::Arity {
                    function: "eval".to_string(),
                    expected: "1".to_string(),
                    found: args.len(),
                });
            }
            let value = self.type_value(args.remove(0))?;
            self.expect(MODE, Token::RParen)?;
            let name = self.lexer.slice(start, self.lexer.position());
            return Ok(MeasureAggregator {
                measure_col: name.clone(),
                measure_func: func,
                name,
                value_col_request: Some(value),
            });
        }

        let column = self.expect_name("a column")?;
        self.expect(MODE, Token::RParen)?;
        Ok(MeasureAggregator {
            name: format!("{}({})", func_name, column),
            measure_col: column,
            measure_func: func,
            value_col_request: None,
        })
    }

    /// Optional `BY f1, f2`; wildcards are rejected.
    fn parse_by_clause(&mut self, command: &str) -> Result<Vec<String>> {
        if !self.peek(MODE)?.is_word("by") {
            return Ok(Vec::new());
        }
        self.next(MODE)?;

        let fields = self.parse_field_list(&[])?;
        if fields.is_empty() {
            return Err(ParseError::command(command, "BY needs at least one field"));
        }
        if let Some(field) = fields.iter().find(|f| f.contains('*')) {
            return Err(ParseError::command(
                command,
                format!("wildcards are not allowed in BY, got {:?}", field),
            ));
        }
        Ok(fields)
    }
}

fn count_of_all(name: &str) -> MeasureAggregator {
    MeasureAggregator {
        measure_col: "*".to_string(),
        measure_func: AggregateFunction::Count,
        name: name.to_string(),
        value_col_request: None,
    }
}

/// `top5`, `bottom3` or a bare `5` (top).
fn parse_limit(text: &str) -> Result<LimitExpr> {
    let lower = text.to_ascii_lowercase();
    let (order, digits) = if let Some(rest) = lower.strip_prefix("top") {
        (LimitOrder::Top, rest)
    } else if let Some(rest) = lower.strip_prefix("bottom") {
        (LimitOrder::Bottom, rest)
    } else {
        (LimitOrder::Top, lower.as_str())
    };
    let num = parse_u64("timechart", "limit", digits)?;
    Ok(LimitExpr { order, num })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit() {
        assert_eq!(
            parse_limit("top5").unwrap(),
            LimitExpr {
                order: LimitOrder::Top,
                num: 5
            }
        );
        assert_eq!(
            parse_limit("Bottom3").unwrap(),
            LimitExpr {
                order: LimitOrder::Bottom,
                num: 3
            }
        );
        assert_eq!(parse_limit("7").unwrap().order, LimitOrder::Top);
        assert!(parse_limit("top").is_err());
    }

    #[test]
    fn test_count_of_all() {
        let count = count_of_all("count");
        assert_eq!(count.measure_col, "*");
        assert_eq!(count.measure_func, AggregateFunction::Count);
    }
}

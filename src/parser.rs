use std::mem;

use tracing::{debug, instrument, trace};

use crate::ast::{BoolExpr, FilterNode, PipeStage, Query, TimeRange, Token, ValueExpr};
use crate::config::ParseOptions;
use crate::error::{ParseError, Result};
use crate::lexer::{LexMode, Lexer, split_pipeline, strip_comments};
use crate::time::{TimeModifier, calculate_relative_time};

mod aggregation;
mod commands;
mod expr;
mod filter;
mod typing;

pub(crate) use filter::SearchClause;

/// Compiles a query with default options (wall-clock `now`).
pub fn parse(query: &str) -> Result<Query> {
    parse_with_options(query, &ParseOptions::default())
}

/// Compiles a query: comments are stripped, the text is split at top-level
/// pipes, the first segment becomes the filter and each later segment
/// either folds into it or appends pipe stages.
#[instrument(level = "debug", skip(options), err)]
pub fn parse_with_options(query: &str, options: &ParseOptions) -> Result<Query> {
    let stripped = strip_comments(query)?;
    let segments = split_pipeline(&stripped)?;
    let mut builder = QueryBuilder::default();
    let mut leading_search = false;

    for (index, segment) in segments.iter().enumerate() {
        let text = segment.text.trim();

        if index == 0 {
            // `| inputlookup ...` leaves the first segment empty.
            if text.is_empty() {
                continue;
            }
            leading_search = true;
            let mut parser = Parser::new(text, options);
            parser.skip_search_keyword()?;
            let clause = parser.parse_search_body()?;
            debug!(segment = text, "compiled leading search");
            builder.fold_search(clause);
            continue;
        }

        if text.is_empty() {
            return Err(ParseError::EmptySegment(segment.offset));
        }

        let context = StageContext {
            has_prev_results: leading_search || !builder.pipeline.is_empty(),
        };
        let mut parser = Parser::new(text, options);
        match parser.parse_segment(&context)? {
            SegmentKind::Search(clause) => {
                debug!(segment = text, "folded search segment");
                builder.fold_search(clause);
            }
            SegmentKind::Stages(stages) => {
                debug!(segment = text, stages = stages.len(), "compiled pipe command");
                builder.pipeline.extend(stages);
            }
        }
    }

    builder.finish(options)
}

/// Parses an eval-style expression into the typed family.
pub fn parse_value_expr(text: &str) -> Result<ValueExpr> {
    let options = ParseOptions::default();
    let mut parser = Parser::new(text, &options);
    let expr = parser.parse_expression()?;
    parser.expect_end(LexMode::Expression)?;
    parser.type_value(expr)
}

/// Parses a where-style boolean expression.
pub fn parse_bool_expr(text: &str) -> Result<BoolExpr> {
    let options = ParseOptions::default();
    let mut parser = Parser::new(text, &options);
    parser.parse_bool_until_end()
}

/// Facts about the pipeline so far that some commands need.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StageContext {
    pub has_prev_results: bool,
}

pub(crate) enum SegmentKind {
    Search(SearchClause),
    Stages(Vec<PipeStage>),
}

#[derive(Default)]
struct QueryBuilder {
    filter: Option<FilterNode>,
    pipeline: Vec<PipeStage>,
    earliest: Option<TimeModifier>,
    latest: Option<TimeModifier>,
}

impl QueryBuilder {
    fn fold_search(&mut self, clause: SearchClause) {
        if let Some(filter) = clause.filter {
            self.filter = Some(match self.filter.take() {
                None => filter,
                Some(previous) => fold_and(previous, filter),
            });
        }
        if clause.earliest.is_some() {
            self.earliest = clause.earliest;
        }
        if clause.latest.is_some() {
            self.latest = clause.latest;
        }
    }

    fn finish(self, options: &ParseOptions) -> Result<Query> {
        let time_range = if self.earliest.is_none() && self.latest.is_none() {
            None
        } else {
            let start_epoch_ms = match &self.earliest {
                Some(modifier) => calculate_relative_time(modifier, &options.now)?,
                None => 0,
            };
            let end_epoch_ms = match &self.latest {
                Some(modifier) => calculate_relative_time(modifier, &options.now)?,
                None => options.now.timestamp_millis(),
            };
            debug!(start_epoch_ms, end_epoch_ms, "resolved time range");
            Some(TimeRange {
                start_epoch_ms,
                end_epoch_ms,
            })
        };

        Ok(Query {
            filter: self.filter,
            pipeline: self.pipeline,
            time_range,
        })
    }
}

/// Joins two filters with AND, treating a lone `*` on either side as no
/// filter at all.
pub(crate) fn fold_and(previous: FilterNode, next: FilterNode) -> FilterNode {
    if next.is_match_all() {
        trace!("dropping match-all term");
        previous
    } else if previous.is_match_all() {
        trace!("replacing match-all filter");
        next
    } else {
        FilterNode::and(previous, next)
    }
}

/// Recursive-descent parser over one pipe segment.
///
/// The token grammar changes with context, so every read names the
/// [`LexMode`] it wants.
pub(crate) struct Parser<'a> {
    lexer: Lexer,
    options: &'a ParseOptions,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(input: &str, options: &'a ParseOptions) -> Self {
        Parser {
            lexer: Lexer::new(input),
            options,
        }
    }

    fn next(&mut self, mode: LexMode) -> Result<Token> {
        self.lexer.next_token(mode)
    }

    fn peek(&mut self, mode: LexMode) -> Result<Token> {
        self.lexer.peek_token(mode)
    }

    fn check(&mut self, mode: LexMode, token: &Token) -> Result<bool> {
        Ok(mem::discriminant(&self.peek(mode)?) == mem::discriminant(token))
    }

    fn expect(&mut self, mode: LexMode, expected: Token) -> Result<()> {
        let token = self.next(mode)?;
        if mem::discriminant(&token) != mem::discriminant(&expected) {
            return Err(self.unexpected(token, &expected.to_string()));
        }
        Ok(())
    }

    fn expect_end(&mut self, mode: LexMode) -> Result<()> {
        match self.next(mode)? {
            Token::Eof => Ok(()),
            token => Err(self.unexpected(token, "end of segment")),
        }
    }

    fn unexpected(&self, found: Token, expected: &str) -> ParseError {
        match found {
            Token::Eof => ParseError::UnexpectedEof(expected.to_string()),
            token => ParseError::UnexpectedToken {
                found: token.to_string(),
                expected: expected.to_string(),
                position: self.lexer.token_start(),
            },
        }
    }

    /// Drops a leading `search` keyword; `search=x` is a field term.
    fn skip_search_keyword(&mut self) -> Result<()> {
        let start = self.lexer.position();
        if self.next(LexMode::Search)?.is_word("search") && !self.peek(LexMode::Search)?.is_comparison() {
            return Ok(());
        }
        self.lexer.set_position(start);
        Ok(())
    }

    fn parse_bool_until_end(&mut self) -> Result<BoolExpr> {
        let expr = self.parse_expression()?;
        self.expect_end(LexMode::Expression)?;
        self.type_bool(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOp, FilterValue};

    #[test]
    fn test_fold_and_drops_match_all() {
        let all = FilterNode::terminal("*", CompareOp::Eq, FilterValue::String("*".into()));
        let a = FilterNode::terminal("a", CompareOp::Eq, FilterValue::String("x".into()));
        assert_eq!(fold_and(all.clone(), a.clone()), a);
        assert_eq!(fold_and(a.clone(), all), a);
    }

    #[test]
    fn test_empty_middle_segment() {
        assert_eq!(parse("a | | stats count"), Err(ParseError::EmptySegment(3)));
    }

    #[test]
    fn test_empty_query_has_no_filter() {
        let query = parse("").unwrap();
        assert!(query.filter.is_none());
        assert!(query.pipeline.is_empty());
        assert!(query.time_range.is_none());
    }
}

use tracing::trace;

use crate::ast::{
    BinOptions, BinSpan, BinSpanLength, ColumnsRequest, CompareOp, DedupExpr, EventCount, Expr,
    FillNullExpr, FilterNode, FilterStringExpr, FilterValue, FormatResultsRequest, GenTimes,
    GenTimesInterval, GenerateEvent, HeadExpr, InputLookup, LetRequest, LogSpan, MakeMvSplit,
    MultiValueColRequest, MvExpandExpr, OutputTransforms, PipeStage, RenameExpr, RenameMode,
    RexExpr, RowColumnOptions, SortElement, SortExpr, SortOp, SpathExpr, TailExpr, Token,
    TransactionArguments,
};
use crate::error::{ParseError, Result};
use crate::lexer::LexMode;
use crate::time::{
    AbsoluteTime, RelativeStep, Snap, TimeModifier, TimeUnit, calculate_relative_time,
    parse_absolute_date, parse_time_modifier,
};
use crate::value::{CompiledRegex, Number};

use super::{Parser, SearchClause, SegmentKind, StageContext};

const MODE: LexMode = LexMode::Command;

const COMMANDS: &[&str] = &[
    "search",
    "regex",
    "eval",
    "where",
    "fields",
    "table",
    "head",
    "tail",
    "dedup",
    "sort",
    "rex",
    "rename",
    "makemv",
    "spath",
    "format",
    "eventcount",
    "gentimes",
    "inputlookup",
    "fillnull",
    "mvexpand",
    "bin",
    "bucket",
    "transaction",
    "stats",
    "timechart",
    "streamstats",
    "top",
    "rare",
];

const DEFAULT_ROW_LIMIT: u64 = 10;
const DEFAULT_LOOKUP_MAX: u64 = 1_000_000_000;

impl Parser<'_> {
    /// Compiles one pipe segment after the first.
    ///
    /// A segment whose first word names a command (and is not itself
    /// compared, as in `sort=asc`) is a command; anything else is a bare
    /// search that folds into the filter.
    pub(crate) fn parse_segment(&mut self, context: &StageContext) -> Result<SegmentKind> {
        let start = self.lexer.position();
        let name = match self.next(MODE)? {
            Token::Word(w) => w.to_ascii_lowercase(),
            _ => String::new(),
        };

        if COMMANDS.contains(&name.as_str()) && !self.peek(LexMode::Search)?.is_comparison() {
            trace!(command = name.as_str(), "dispatching pipe command");
            return match name.as_str() {
                "search" => self.parse_search_body().map(SegmentKind::Search),
                "regex" => self.parse_regex_command().map(SegmentKind::Search),
                _ => self.parse_pipe_stage(&name, context).map(SegmentKind::Stages),
            };
        }

        self.lexer.set_position(start);
        self.parse_search_body().map(SegmentKind::Search)
    }

    /// Compiles the arguments of command `name`; the cursor sits just
    /// after the command word.
    fn parse_pipe_stage(&mut self, name: &str, context: &StageContext) -> Result<Vec<PipeStage>> {
        let stages = match name {
            "eval" => self.parse_eval()?,
            "where" => {
                let condition = self.parse_bool_until_end()?;
                vec![PipeStage::OutputTransform(OutputTransforms::FilterRows(condition))]
            }
            "fields" => vec![self.parse_fields()?],
            "table" => {
                let include_columns = self.parse_required_fields(name)?;
                vec![columns(ColumnsRequest {
                    include_columns,
                    ..Default::default()
                })]
            }
            "head" => vec![self.parse_head()?],
            "tail" => vec![self.parse_tail()?],
            "dedup" => vec![self.parse_dedup()?],
            "sort" => vec![self.parse_sort()?],
            "rex" => vec![self.parse_rex()?],
            "rename" => self.parse_rename()?,
            "makemv" => vec![self.parse_makemv()?],
            "spath" => vec![self.parse_spath()?],
            "format" => vec![self.parse_format()?],
            "eventcount" => vec![self.parse_eventcount()?],
            "gentimes" => vec![self.parse_gentimes()?],
            "inputlookup" => vec![self.parse_inputlookup(context)?],
            "fillnull" => vec![self.parse_fillnull()?],
            "mvexpand" => vec![self.parse_mvexpand()?],
            "bin" | "bucket" => vec![self.parse_bin(name)?],
            "transaction" => vec![self.parse_transaction()?],
            "stats" => self.parse_stats()?,
            "timechart" => self.parse_timechart()?,
            "streamstats" => self.parse_streamstats()?,
            "top" | "rare" => self.parse_top_rare(name)?,
            other => return Err(ParseError::command(other, "unknown command")),
        };
        Ok(stages)
    }

    // ========================================================================
    // Option helpers
    // ========================================================================

    /// Lowercased key when the cursor is at `key=`; consumes nothing.
    pub(super) fn peek_option_key(&mut self) -> Result<Option<String>> {
        let start = self.lexer.position();
        let key = match self.next(MODE)? {
            Token::Word(w) if self.check(MODE, &Token::Eq)? => Some(w.to_ascii_lowercase()),
            _ => None,
        };
        self.lexer.set_position(start);
        Ok(key)
    }

    /// Consumes `key=` and returns the raw value.
    pub(super) fn option_value(&mut self) -> Result<String> {
        self.next(MODE)?;
        self.expect(MODE, Token::Eq)?;
        match self.next(MODE)? {
            Token::Word(w) | Token::Quoted(w) => Ok(w),
            other => Err(self.unexpected(other, "an option value")),
        }
    }

    pub(super) fn read_option(&mut self) -> Result<Option<(String, String)>> {
        match self.peek_option_key()? {
            Some(key) => Ok(Some((key, self.option_value()?))),
            None => Ok(None),
        }
    }

    /// A bare or quoted name.
    pub(super) fn expect_name(&mut self, what: &str) -> Result<String> {
        match self.next(MODE)? {
            Token::Word(w) | Token::Quoted(w) => Ok(w),
            other => Err(self.unexpected(other, what)),
        }
    }

    /// Names separated by spaces or commas, up to the end of the segment,
    /// an option, or one of the `stop` keywords.
    pub(super) fn parse_field_list(&mut self, stop: &[&str]) -> Result<Vec<String>> {
        let mut fields = Vec::new();
        loop {
            if self.peek_option_key()?.is_some() {
                break;
            }
            match self.peek(MODE)? {
                Token::Comma => {
                    self.next(MODE)?;
                }
                Token::Word(w) if stop.iter().any(|s| w.eq_ignore_ascii_case(s)) => break,
                Token::Word(w) | Token::Quoted(w) => {
                    self.next(MODE)?;
                    fields.push(w);
                }
                _ => break,
            }
        }
        Ok(fields)
    }

    fn parse_required_fields(&mut self, command: &str) -> Result<Vec<String>> {
        let fields = self.parse_field_list(&[])?;
        self.expect_end(MODE)?;
        if fields.is_empty() {
            return Err(ParseError::command(command, "expected at least one field"));
        }
        Ok(fields)
    }

    /// A leading bare count such as `head 20`.
    fn parse_leading_count(&mut self) -> Result<Option<u64>> {
        match self.peek(MODE)? {
            Token::Word(w) if w.chars().all(|c| c.is_ascii_digit()) => {
                self.next(MODE)?;
                w.parse()
                    .map(Some)
                    .map_err(|e| ParseError::literal(&w, e))
            }
            _ => Ok(None),
        }
    }

    // ========================================================================
    // Search-like commands
    // ========================================================================

    fn parse_regex_command(&mut self) -> Result<SearchClause> {
        let (field, op, pattern) = match self.next(MODE)? {
            Token::Quoted(pattern) => ("_raw".to_string(), CompareOp::Eq, pattern),
            Token::Word(field) => {
                let op = match self.next(MODE)? {
                    Token::Eq => CompareOp::Eq,
                    Token::NotEq => CompareOp::NotEq,
                    other => return Err(self.unexpected(other, "'=' or '!='")),
                };
                let pattern = self.expect_name("a regular expression")?;
                (field, op, pattern)
            }
            other => return Err(self.unexpected(other, "a regular expression")),
        };
        self.expect_end(MODE)?;

        let regex = CompiledRegex::new(&pattern)?;
        Ok(SearchClause {
            filter: Some(FilterNode::terminal(&field, op, FilterValue::Regex(regex))),
            ..Default::default()
        })
    }

    // ========================================================================
    // Output transforms
    // ========================================================================

    fn parse_eval(&mut self) -> Result<Vec<PipeStage>> {
        let mut stages = Vec::new();
        loop {
            let target = self.expect_name("a field name")?;
            self.expect(MODE, Token::Eq)?;
            let expr = self.parse_expression()?;
            let value = self.type_value(expr)?;
            stages.push(PipeStage::let_column(target, LetRequest::Value(value)));

            match self.next(LexMode::Expression)? {
                Token::Comma => continue,
                Token::Eof => return Ok(stages),
                other => return Err(self.unexpected(other, "',' or end of segment")),
            }
        }
    }

    fn parse_fields(&mut self) -> Result<PipeStage> {
        let exclude = match self.peek(MODE)? {
            Token::Word(w) if w == "-" || w == "+" => {
                self.next(MODE)?;
                w == "-"
            }
            _ => false,
        };
        let fields = self.parse_required_fields("fields")?;
        let request = if exclude {
            ColumnsRequest {
                exclude_columns: fields,
                ..Default::default()
            }
        } else {
            ColumnsRequest {
                include_columns: fields,
                ..Default::default()
            }
        };
        Ok(columns(request))
    }

    fn parse_head(&mut self) -> Result<PipeStage> {
        let mut max_rows = None;
        let mut keep_last = false;
        let mut null = false;
        let mut predicate = None;

        loop {
            if let Some((key, value)) = self.read_option()? {
                match key.as_str() {
                    "limit" => max_rows = Some(set_limit("head", max_rows, parse_u64("head", &key, &value)?)?),
                    "keeplast" => keep_last = parse_bool("head", &key, &value)?,
                    "null" => null = parse_bool("head", &key, &value)?,
                    _ => return Err(ParseError::command("head", format!("unknown option {}", key))),
                }
                continue;
            }
            if let Some(count) = self.parse_leading_count()? {
                max_rows = Some(set_limit("head", max_rows, count)?);
                continue;
            }
            match self.peek(MODE)? {
                Token::LParen if predicate.is_none() => {
                    let expr = self.parse_expression()?;
                    predicate = Some(self.type_bool(expr)?);
                }
                Token::Eof => break,
                _ => {
                    let found = self.next(MODE)?;
                    return Err(self.unexpected(found, "a row count or a (condition)"));
                }
            }
        }

        if max_rows.is_none() && predicate.is_none() {
            max_rows = Some(DEFAULT_ROW_LIMIT);
        }
        Ok(PipeStage::OutputTransform(OutputTransforms::Head(HeadExpr {
            max_rows,
            keep_last,
            null,
            predicate,
        })))
    }

    fn parse_tail(&mut self) -> Result<PipeStage> {
        let max_rows = self.parse_leading_count()?.unwrap_or(DEFAULT_ROW_LIMIT);
        self.expect_end(MODE)?;
        Ok(PipeStage::OutputTransform(OutputTransforms::Tail(TailExpr { max_rows })))
    }

    fn parse_dedup(&mut self) -> Result<PipeStage> {
        let mut dedup = DedupExpr {
            limit: self.parse_leading_count()?.unwrap_or(1),
            fields: Vec::new(),
            keep_events: false,
            keep_empty: false,
            consecutive: false,
            sort_by: Vec::new(),
        };

        loop {
            if let Some((key, value)) = self.read_option()? {
                let flag = parse_bool("dedup", &key, &value)?;
                match key.as_str() {
                    "keepevents" => dedup.keep_events = flag,
                    "keepempty" => dedup.keep_empty = flag,
                    "consecutive" => dedup.consecutive = flag,
                    _ => return Err(ParseError::command("dedup", format!("unknown option {}", key))),
                }
                continue;
            }
            if self.peek(MODE)?.is_word("sortby") {
                self.next(MODE)?;
                dedup.sort_by = self.parse_sort_elements()?;
                if dedup.sort_by.is_empty() {
                    return Err(ParseError::command("dedup", "sortby needs at least one field"));
                }
                continue;
            }
            let fields = self.parse_field_list(&["sortby"])?;
            if fields.is_empty() {
                break;
            }
            dedup.fields.extend(fields);
        }
        self.expect_end(MODE)?;

        if dedup.fields.is_empty() {
            return Err(ParseError::command("dedup", "expected at least one field"));
        }
        Ok(PipeStage::let_column("", LetRequest::Dedup(dedup)))
    }

    fn parse_sort(&mut self) -> Result<PipeStage> {
        let mut limit = self.parse_leading_count()?;
        if let Some((key, value)) = self.read_option()? {
            if key != "limit" {
                return Err(ParseError::command("sort", format!("unknown option {}", key)));
            }
            limit = Some(parse_u64("sort", &key, &value)?);
        }
        let elements = self.parse_sort_elements()?;
        self.expect_end(MODE)?;
        if elements.is_empty() {
            return Err(ParseError::command("sort", "expected at least one field"));
        }
        Ok(PipeStage::let_column("", LetRequest::Sort(SortExpr { elements, limit })))
    }

    /// `[+|-]field` or `[+|-]num(field)`, separated by spaces or commas.
    fn parse_sort_elements(&mut self) -> Result<Vec<SortElement>> {
        let mut elements = Vec::new();
        let mut pending_sign = None;

        loop {
            let word = match self.peek(MODE)? {
                Token::Comma => {
                    self.next(MODE)?;
                    continue;
                }
                Token::Word(w) => w,
                _ => break,
            };
            self.next(MODE)?;

            if word == "+" || word == "-" {
                pending_sign = Some(word == "+");
                continue;
            }
            let (ascending, name) = match word.strip_prefix('-') {
                Some(rest) => (false, rest.to_string()),
                None => (
                    pending_sign.unwrap_or(true),
                    word.strip_prefix('+').unwrap_or(&word).to_string(),
                ),
            };
            pending_sign = None;

            let element = match sort_op(&name) {
                Some(op) if self.check(MODE, &Token::LParen)? => {
                    self.next(MODE)?;
                    let field = self.expect_name("a field name")?;
                    self.expect(MODE, Token::RParen)?;
                    SortElement {
                        field,
                        ascending,
                        op: Some(op),
                    }
                }
                _ => SortElement {
                    field: name,
                    ascending,
                    op: None,
                },
            };
            elements.push(element);
        }

        if pending_sign.is_some() {
            return Err(ParseError::UnexpectedEof("a field after the sort sign".to_string()));
        }
        Ok(elements)
    }

    fn parse_rex(&mut self) -> Result<PipeStage> {
        let mut field_name = "_raw".to_string();
        let mut pattern = None;

        loop {
            if let Some((key, value)) = self.read_option()? {
                match key.as_str() {
                    "field" => field_name = value,
                    _ => return Err(ParseError::command("rex", format!("unsupported option {}", key))),
                }
                continue;
            }
            match self.next(MODE)? {
                Token::Quoted(p) if pattern.is_none() => pattern = Some(p),
                Token::Eof => break,
                other => return Err(self.unexpected(other, "a quoted regular expression")),
            }
        }

        let source = pattern.ok_or_else(|| ParseError::command("rex", "missing regular expression"))?;
        let regex = CompiledRegex::new(&source)?;
        let rex_col_names = regex.capture_names();
        if rex_col_names.is_empty() {
            return Err(ParseError::command("rex", "the expression needs at least one named group"));
        }
        Ok(PipeStage::let_column(
            field_name.clone(),
            LetRequest::Rex(RexExpr {
                pattern: regex,
                field_name,
                rex_col_names,
            }),
        ))
    }

    fn parse_rename(&mut self) -> Result<Vec<PipeStage>> {
        let mut stages = Vec::new();
        loop {
            let original_pattern = self.expect_name("a field name")?;
            match self.next(MODE)? {
                token if token.is_word("as") => {}
                other => return Err(self.unexpected(other, "AS")),
            }
            let (new_pattern, quoted) = match self.next(MODE)? {
                Token::Word(w) => (w, false),
                Token::Quoted(q) => (q, true),
                other => return Err(self.unexpected(other, "a new field name")),
            };

            let mode = if original_pattern.contains('*') || new_pattern.contains('*') {
                RenameMode::Wildcard
            } else if quoted {
                RenameMode::Phrase
            } else {
                RenameMode::Override
            };
            stages.push(PipeStage::let_column(
                new_pattern.clone(),
                LetRequest::Rename(RenameExpr {
                    mode,
                    original_pattern,
                    new_pattern,
                }),
            ));

            match self.next(MODE)? {
                Token::Comma => continue,
                Token::Eof => return Ok(stages),
                other => return Err(self.unexpected(other, "',' or end of segment")),
            }
        }
    }

    fn parse_makemv(&mut self) -> Result<PipeStage> {
        let mut delimiter = None;
        let mut tokenizer = None;
        let mut allow_empty = false;
        let mut setsv = false;

        while let Some((key, value)) = self.read_option()? {
            match key.as_str() {
                "delim" => delimiter = Some(value),
                "tokenizer" => tokenizer = Some(CompiledRegex::new(&value)?),
                "allowempty" => allow_empty = parse_bool("makemv", &key, &value)?,
                "setsv" => setsv = parse_bool("makemv", &key, &value)?,
                _ => return Err(ParseError::command("makemv", format!("unknown option {}", key))),
            }
        }
        let col_name = self.expect_name("a field name")?;
        self.expect_end(MODE)?;

        let split = match (delimiter, tokenizer) {
            (Some(_), Some(_)) => {
                return Err(ParseError::command("makemv", "delim and tokenizer cannot be combined"));
            }
            (_, Some(regex)) => MakeMvSplit::Tokenizer(regex),
            (delimiter, None) => MakeMvSplit::Delimiter(delimiter.unwrap_or_else(|| " ".to_string())),
        };
        Ok(PipeStage::let_column(
            col_name.clone(),
            LetRequest::MultiValue(MultiValueColRequest {
                col_name,
                split,
                allow_empty,
                setsv,
            }),
        ))
    }

    fn parse_spath(&mut self) -> Result<PipeStage> {
        let mut input_col = "_raw".to_string();
        let mut output_col = None;
        let mut path = None;

        loop {
            if let Some((key, value)) = self.read_option()? {
                match key.as_str() {
                    "input" => input_col = value,
                    "output" => output_col = Some(value),
                    "path" => path = Some(value),
                    _ => return Err(ParseError::command("spath", format!("unknown option {}", key))),
                }
                continue;
            }
            match self.next(MODE)? {
                Token::Word(p) | Token::Quoted(p) if path.is_none() => path = Some(p),
                Token::Eof => break,
                other => return Err(self.unexpected(other, "an spath option")),
            }
        }

        let output_col = output_col.or_else(|| path.as_deref().map(default_spath_output));
        Ok(PipeStage::let_column(
            output_col.clone().unwrap_or_default(),
            LetRequest::Spath(SpathExpr {
                input_col,
                output_col,
                path,
            }),
        ))
    }

    fn parse_format(&mut self) -> Result<PipeStage> {
        let mut request = FormatResultsRequest {
            mv_separator: "OR".to_string(),
            max_results: 0,
            empty_string: "NOT()".to_string(),
            row_column_options: RowColumnOptions::default(),
        };
        let mut positional = Vec::new();

        loop {
            if let Some((key, value)) = self.read_option()? {
                match key.as_str() {
                    "mvsep" => request.mv_separator = value,
                    "maxresults" => request.max_results = parse_u64("format", &key, &value)?,
                    "emptystr" => request.empty_string = value,
                    _ => return Err(ParseError::command("format", format!("unknown option {}", key))),
                }
                continue;
            }
            match self.next(MODE)? {
                Token::Word(w) | Token::Quoted(w) => positional.push(w),
                Token::LParen => positional.push("(".to_string()),
                Token::RParen => positional.push(")".to_string()),
                Token::Eof => break,
                other => return Err(self.unexpected(other, "a format delimiter")),
            }
        }

        match <[String; 6]>::try_from(positional) {
            Ok([row_prefix, column_prefix, column_separator, column_end, row_separator, row_end]) => {
                request.row_column_options = RowColumnOptions {
                    row_prefix,
                    column_prefix,
                    column_separator,
                    column_end,
                    row_separator,
                    row_end,
                };
            }
            Err(positional) if positional.is_empty() => {}
            Err(positional) => {
                return Err(ParseError::command(
                    "format",
                    format!("expected 0 or 6 delimiters, got {}", positional.len()),
                ));
            }
        }
        Ok(PipeStage::let_column("search", LetRequest::Format(request)))
    }

    fn parse_fillnull(&mut self) -> Result<PipeStage> {
        let mut value = "0".to_string();
        if let Some((key, v)) = self.read_option()? {
            if key != "value" {
                return Err(ParseError::command("fillnull", format!("unknown option {}", key)));
            }
            value = v;
        }
        let fields = self.parse_field_list(&[])?;
        self.expect_end(MODE)?;
        Ok(PipeStage::let_column("", LetRequest::FillNull(FillNullExpr { value, fields })))
    }

    fn parse_mvexpand(&mut self) -> Result<PipeStage> {
        let mut field = None;
        let mut limit = None;
        loop {
            if let Some((key, value)) = self.read_option()? {
                if key != "limit" {
                    return Err(ParseError::command("mvexpand", format!("unknown option {}", key)));
                }
                limit = Some(parse_u64("mvexpand", &key, &value)?);
                continue;
            }
            match self.next(MODE)? {
                Token::Word(f) | Token::Quoted(f) if field.is_none() => field = Some(f),
                Token::Eof => break,
                other => return Err(self.unexpected(other, "a field name")),
            }
        }
        let field = field.ok_or_else(|| ParseError::command("mvexpand", "expected a field"))?;
        Ok(PipeStage::let_column(
            field.clone(),
            LetRequest::MvExpand(MvExpandExpr { field, limit }),
        ))
    }

    fn parse_bin(&mut self, command: &str) -> Result<PipeStage> {
        let mut options = BinOptions {
            field: String::new(),
            new_field_name: None,
            span: None,
            min_span: None,
            max_bins: self.options.max_bins,
            start: None,
            end: None,
            align_time: None,
        };

        loop {
            if let Some((key, value)) = self.read_option()? {
                match key.as_str() {
                    "span" => options.span = Some(parse_bin_span(command, &value)?),
                    "minspan" => options.min_span = Some(parse_span_length(command, &value)?),
                    "bins" => options.max_bins = parse_u64(command, &key, &value)?,
                    "start" => options.start = Some(parse_number(&value)?),
                    "end" => options.end = Some(parse_number(&value)?),
                    "aligntime" => {
                        let modifier = parse_time_modifier(&value)?;
                        options.align_time = Some(calculate_relative_time(&modifier, &self.options.now)?);
                    }
                    _ => return Err(ParseError::command(command, format!("unknown option {}", key))),
                }
                continue;
            }
            if self.check(MODE, &Token::Eof)? {
                break;
            }
            if !options.field.is_empty() {
                let found = self.next(MODE)?;
                return Err(self.unexpected(found, "end of segment"));
            }
            options.field = self.expect_name("a field name")?;
            if self.peek(MODE)?.is_word("as") {
                self.next(MODE)?;
                options.new_field_name = Some(self.expect_name("a new field name")?);
            }
        }

        if options.field.is_empty() {
            return Err(ParseError::command(command, "expected a field"));
        }
        let target = options.new_field_name.clone().unwrap_or_else(|| options.field.clone());
        Ok(PipeStage::let_column(target, LetRequest::Bin(options)))
    }

    // ========================================================================
    // Transaction
    // ========================================================================

    fn parse_transaction(&mut self) -> Result<PipeStage> {
        let mut arguments = TransactionArguments {
            fields: Vec::new(),
            starts_with: None,
            ends_with: None,
        };

        loop {
            match self.peek_option_key()?.as_deref() {
                Some(key @ ("startswith" | "endswith")) => {
                    let starts = key == "startswith";
                    self.next(MODE)?;
                    self.expect(MODE, Token::Eq)?;
                    let condition = self.parse_transaction_condition()?;
                    if starts {
                        arguments.starts_with = Some(condition);
                    } else {
                        arguments.ends_with = Some(condition);
                    }
                    continue;
                }
                Some(key) => {
                    return Err(ParseError::command("transaction", format!("unsupported option {}", key)));
                }
                None => {}
            }
            let fields = self.parse_field_list(&[])?;
            if fields.is_empty() {
                break;
            }
            arguments.fields.extend(fields);
        }
        self.expect_end(MODE)?;
        Ok(PipeStage::Transaction(arguments))
    }

    /// `"term"`, `eval(<condition>)` or `( <search> )`.
    fn parse_transaction_condition(&mut self) -> Result<FilterStringExpr> {
        match self.peek(MODE)? {
            Token::LParen => self.parse_filter_group().map(FilterStringExpr::SearchNode),
            Token::Word(w) if w.eq_ignore_ascii_case("eval") => {
                let Expr::Call { mut args, .. } = self.parse_expression()? else {
                    return Err(ParseError::command("transaction", "expected eval(<condition>)"));
                };
                if args.len() != 1 {
                    return Err(ParseError::Arity {
                        function: "eval".to_string(),
                        expected: "1".to_string(),
                        found: args.len(),
                    });
                }
                let condition = self.type_bool(args.remove(0))?;
                Ok(FilterStringExpr::EvalBoolExpr(condition))
            }
            Token::Word(_) | Token::Quoted(_) => Ok(FilterStringExpr::StringValue(self.expect_name("a term")?)),
            _ => {
                let found = self.next(MODE)?;
                Err(self.unexpected(found, "a transaction boundary"))
            }
        }
    }

    // ========================================================================
    // Generating commands
    // ========================================================================

    fn parse_eventcount(&mut self) -> Result<PipeStage> {
        let mut count = EventCount {
            indices: Vec::new(),
            summarize: true,
            report_size: false,
            list_vix: true,
        };
        while let Some((key, value)) = self.read_option()? {
            match key.as_str() {
                "index" => count.indices.push(value),
                "summarize" => count.summarize = parse_bool("eventcount", &key, &value)?,
                "report_size" => count.report_size = parse_bool("eventcount", &key, &value)?,
                "list_vix" => count.list_vix = parse_bool("eventcount", &key, &value)?,
                _ => return Err(ParseError::command("eventcount", format!("unknown option {}", key))),
            }
        }
        self.expect_end(MODE)?;
        if count.indices.is_empty() {
            count.indices.push("*".to_string());
        }
        Ok(PipeStage::GenerateEvent(GenerateEvent::EventCount(count)))
    }

    fn parse_gentimes(&mut self) -> Result<PipeStage> {
        let mut start_time = None;
        let mut end_time = None;
        let mut interval = GenTimesInterval {
            num: 1,
            unit: TimeUnit::Day,
        };

        while let Some((key, value)) = self.read_option()? {
            match key.as_str() {
                "start" => start_time = Some(self.gentimes_time(&value)?),
                "end" => end_time = Some(self.gentimes_time(&value)?),
                "increment" => interval = parse_increment(&value)?,
                _ => return Err(ParseError::command("gentimes", format!("unknown option {}", key))),
            }
        }
        self.expect_end(MODE)?;

        let start_time = start_time.ok_or_else(|| ParseError::command("gentimes", "start= is required"))?;
        let end_time = match end_time {
            Some(end) => end,
            None => {
                let today = TimeModifier::Relative(vec![RelativeStep::Snap(Snap::Unit(TimeUnit::Day))]);
                calculate_relative_time(&today, &self.options.now)?
            }
        };
        if end_time < start_time {
            return Err(ParseError::command("gentimes", "end precedes start"));
        }
        Ok(PipeStage::GenerateEvent(GenerateEvent::GenTimes(GenTimes {
            start_time,
            end_time,
            interval,
        })))
    }

    /// Day offset from today (`-3`) or an absolute date.
    fn gentimes_time(&self, text: &str) -> Result<i64> {
        let modifier = if let Ok(days) = text.parse::<i64>() {
            TimeModifier::Relative(vec![
                RelativeStep::Snap(Snap::Unit(TimeUnit::Day)),
                RelativeStep::Offset {
                    amount: days,
                    unit: TimeUnit::Day,
                },
            ])
        } else {
            let date = parse_absolute_date(text)
                .ok_or_else(|| ParseError::time_modifier(text, "expected MM/DD/YYYY[:HH:MM:SS] or a day offset"))?;
            TimeModifier::Absolute(AbsoluteTime::Date(date))
        };
        calculate_relative_time(&modifier, &self.options.now)
    }

    fn parse_inputlookup(&mut self, context: &StageContext) -> Result<PipeStage> {
        let mut lookup = InputLookup {
            filename: String::new(),
            append: false,
            strict: false,
            start: 0,
            max: DEFAULT_LOOKUP_MAX,
            where_clause: None,
            has_prev_results: context.has_prev_results,
        };

        while let Some((key, value)) = self.read_option()? {
            match key.as_str() {
                "append" => lookup.append = parse_bool("inputlookup", &key, &value)?,
                "strict" => lookup.strict = parse_bool("inputlookup", &key, &value)?,
                "start" => lookup.start = parse_u64("inputlookup", &key, &value)?,
                "max" => lookup.max = parse_u64("inputlookup", &key, &value)?,
                _ => return Err(ParseError::command("inputlookup", format!("unknown option {}", key))),
            }
        }
        lookup.filename = self.expect_name("a lookup file name")?;

        if self.peek(MODE)?.is_word("where") {
            self.next(MODE)?;
            lookup.where_clause = Some(self.parse_bool_until_end()?);
        } else {
            self.expect_end(MODE)?;
        }
        Ok(PipeStage::GenerateEvent(GenerateEvent::InputLookup(lookup)))
    }
}

fn columns(request: ColumnsRequest) -> PipeStage {
    PipeStage::OutputTransform(OutputTransforms::Columns(request))
}

fn set_limit(command: &str, current: Option<u64>, limit: u64) -> Result<u64> {
    match current {
        Some(_) => Err(ParseError::command(command, "a row count and limit= cannot be combined")),
        None => Ok(limit),
    }
}

fn sort_op(name: &str) -> Option<SortOp> {
    match name.to_ascii_lowercase().as_str() {
        "auto" => Some(SortOp::Auto),
        "str" => Some(SortOp::Str),
        "num" => Some(SortOp::Num),
        "ip" => Some(SortOp::Ip),
        _ => None,
    }
}

/// `a.b{}.c{1}` names its output `c`.
fn default_spath_output(path: &str) -> String {
    let last = path.rsplit('.').next().unwrap_or(path);
    match last.find('{') {
        Some(brace) => last[..brace].to_string(),
        None => last.to_string(),
    }
}

pub(super) fn parse_bool(command: &str, key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Ok(true),
        "false" | "f" | "0" => Ok(false),
        _ => Err(ParseError::command(command, format!("{} expects a boolean, got {:?}", key, value))),
    }
}

pub(super) fn parse_u64(command: &str, key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| ParseError::command(command, format!("{} expects a non-negative integer, got {:?}", key, value)))
}

fn parse_number(text: &str) -> Result<Number> {
    Number::parse(text).ok_or_else(|| ParseError::literal(text, "not a number"))
}

/// Splits `30m` into `30` and `m`.
fn split_span(text: &str) -> (&str, &str) {
    let digits = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    text.split_at(digits)
}

/// A `<n><unit>` span such as `1h` or `30s`.
pub(super) fn parse_span_length(command: &str, text: &str) -> Result<BinSpanLength> {
    let (number, unit) = split_span(text);
    let num: f64 = number
        .parse()
        .map_err(|_| ParseError::command(command, format!("invalid span {:?}", text)))?;
    let time_scale = TimeUnit::parse(unit).ok_or_else(|| ParseError::UnsupportedTimeUnit(unit.to_string()))?;
    if num <= 0.0 {
        return Err(ParseError::command(command, format!("span must be positive, got {:?}", text)));
    }
    if num.fract() != 0.0 && time_scale.is_sub_day() {
        return Err(ParseError::command(
            command,
            format!("fractional spans are only allowed for units of a day or more, got {:?}", text),
        ));
    }
    Ok(BinSpanLength { num, time_scale })
}

/// `10`, `1h` or `<coefficient>log<base>`.
fn parse_bin_span(command: &str, text: &str) -> Result<BinSpan> {
    if let Some(at) = text.find("log") {
        let (coefficient, base) = (&text[..at], &text[at + 3..]);
        let parse_part = |part: &str, default: f64| -> Result<f64> {
            if part.is_empty() {
                return Ok(default);
            }
            part.parse()
                .map_err(|_| ParseError::command(command, format!("invalid log span {:?}", text)))
        };
        let span = LogSpan {
            coefficient: parse_part(coefficient, 1.0)?,
            base: parse_part(base, 10.0)?,
        };
        if span.base <= 1.0 || span.coefficient < 1.0 || span.coefficient >= span.base {
            return Err(ParseError::command(command, format!("invalid log span {:?}", text)));
        }
        return Ok(BinSpan::Log(span));
    }

    if let Some(number) = Number::parse(text) {
        return Ok(BinSpan::Numeric(number));
    }
    parse_span_length(command, text).map(BinSpan::Time)
}

/// `increment=<n>[s|m|h|d]`.
fn parse_increment(text: &str) -> Result<GenTimesInterval> {
    let (number, unit) = split_span(text);
    let num = number
        .parse()
        .map_err(|_| ParseError::command("gentimes", format!("invalid increment {:?}", text)))?;
    let unit = match unit {
        "" | "s" => TimeUnit::Second,
        "m" => TimeUnit::Minute,
        "h" => TimeUnit::Hour,
        "d" => TimeUnit::Day,
        other => return Err(ParseError::UnsupportedTimeUnit(other.to_string())),
    };
    Ok(GenTimesInterval { num, unit })
}

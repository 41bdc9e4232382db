use crate::ast::{CompareOp, FilterNode, FilterValue, Token};
use crate::error::{ParseError, Result};
use crate::lexer::LexMode;
use crate::normalize::negate;
use crate::time::{TimeModifier, parse_search_time_modifier};
use crate::value::Number;

use super::{Parser, fold_and};

/// Characters an unquoted term may not begin or end with.
const BREAKERS: &[char] = &['<', '>', '[', ']', '{', '}', '(', ')', '!', '?', ';', ',', '\'', '&'];

/// Result of compiling one search segment: the filter plus any
/// `earliest`/`latest` terms lifted out of it.
#[derive(Debug, Default)]
pub(crate) struct SearchClause {
    pub filter: Option<FilterNode>,
    pub earliest: Option<TimeModifier>,
    pub latest: Option<TimeModifier>,
}

enum Term {
    Filter(FilterNode),
    Time {
        latest: bool,
        text: String,
        modifier: TimeModifier,
    },
}

impl Term {
    fn into_filter(self, context: &str) -> Result<FilterNode> {
        match self {
            Term::Filter(node) => Ok(node),
            Term::Time { text, .. } => Err(ParseError::time_modifier(
                &text,
                format!("time terms cannot be used with {}", context),
            )),
        }
    }
}

impl Parser<'_> {
    /// Parses a whole search segment.
    pub(crate) fn parse_search_body(&mut self) -> Result<SearchClause> {
        let clause = self.parse_implicit_and(true)?;
        self.expect_end(LexMode::Search)?;
        Ok(clause)
    }

    /// Parses a whole segment as a filter with no time terms
    /// (`searchmatch` snippets).
    pub(crate) fn parse_filter_only(&mut self) -> Result<Option<FilterNode>> {
        let clause = self.parse_implicit_and(false)?;
        self.expect_end(LexMode::Search)?;
        Ok(clause.filter)
    }

    /// Parses a parenthesized filter starting at the cursor.
    pub(crate) fn parse_filter_group(&mut self) -> Result<FilterNode> {
        self.expect(LexMode::Search, Token::LParen)?;
        if self.check(LexMode::Search, &Token::RParen)? {
            let found = self.next(LexMode::Search)?;
            return Err(self.unexpected(found, "a search term"));
        }
        let clause = self.parse_implicit_and(false)?;
        self.expect(LexMode::Search, Token::RParen)?;
        clause
            .filter
            .ok_or_else(|| ParseError::UnexpectedEof("a search term".to_string()))
    }

    /// Juxtaposed terms, the loosest level of the grammar.
    fn parse_implicit_and(&mut self, allow_time: bool) -> Result<SearchClause> {
        let mut clause = SearchClause::default();

        while !matches!(self.peek(LexMode::Search)?, Token::Eof | Token::RParen) {
            match self.parse_search_or()? {
                Term::Filter(node) => {
                    clause.filter = Some(match clause.filter.take() {
                        None => node,
                        Some(previous) => fold_and(previous, node),
                    });
                }
                Term::Time { text, .. } if !allow_time => {
                    return Err(ParseError::time_modifier(&text, "time terms are not allowed here"));
                }
                Term::Time {
                    latest: true,
                    modifier,
                    ..
                } => clause.latest = Some(modifier),
                Term::Time { modifier, .. } => clause.earliest = Some(modifier),
            }
        }

        Ok(clause)
    }

    fn parse_search_or(&mut self) -> Result<Term> {
        let mut left = self.parse_search_and()?;

        while self.check(LexMode::Search, &Token::Or)? {
            self.next(LexMode::Search)?;
            let right = self.parse_search_and()?.into_filter("OR")?;
            left = Term::Filter(FilterNode::or(left.into_filter("OR")?, right));
        }
        Ok(left)
    }

    fn parse_search_and(&mut self) -> Result<Term> {
        let mut left = self.parse_search_not()?;

        while self.check(LexMode::Search, &Token::And)? {
            self.next(LexMode::Search)?;
            let right = self.parse_search_not()?.into_filter("AND")?;
            left = Term::Filter(FilterNode::and(left.into_filter("AND")?, right));
        }
        Ok(left)
    }

    fn parse_search_not(&mut self) -> Result<Term> {
        if self.check(LexMode::Search, &Token::Not)? {
            self.next(LexMode::Search)?;
            let inner = self.parse_search_not()?.into_filter("NOT")?;
            return Ok(Term::Filter(negate(inner)));
        }
        self.parse_search_primary()
    }

    fn parse_search_primary(&mut self) -> Result<Term> {
        match self.peek(LexMode::Search)? {
            Token::LParen => self.parse_filter_group().map(Term::Filter),
            Token::Word(_) | Token::Quoted(_) => self.parse_term(),
            _ => {
                let found = self.next(LexMode::Search)?;
                Err(self.unexpected(found, "a search term"))
            }
        }
    }

    fn parse_term(&mut self) -> Result<Term> {
        match self.next(LexMode::Search)? {
            Token::Word(word) => {
                if let Some(op) = self.peek_compare_op()? {
                    self.next(LexMode::Search)?;
                    return self.parse_field_comparison(word, op);
                }
                check_breakers(&word)?;
                Ok(Term::Filter(FilterNode::terminal("*", CompareOp::Eq, classify_unquoted(&word))))
            }
            Token::Quoted(text) => Ok(Term::Filter(FilterNode::terminal(
                "*",
                CompareOp::Eq,
                FilterValue::QuotedString(text),
            ))),
            other => Err(self.unexpected(other, "a search term")),
        }
    }

    fn peek_compare_op(&mut self) -> Result<Option<CompareOp>> {
        let op = match self.peek(LexMode::Search)? {
            Token::Eq => CompareOp::Eq,
            Token::NotEq => CompareOp::NotEq,
            Token::Lt => CompareOp::Lt,
            Token::LtEq => CompareOp::LtEq,
            Token::Gt => CompareOp::Gt,
            Token::GtEq => CompareOp::GtEq,
            _ => return Ok(None),
        };
        Ok(Some(op))
    }

    fn parse_field_comparison(&mut self, field: String, op: CompareOp) -> Result<Term> {
        let is_time = field.eq_ignore_ascii_case("earliest") || field.eq_ignore_ascii_case("latest");
        if is_time && op == CompareOp::Eq {
            let text = match self.next(LexMode::Search)? {
                Token::Word(w) | Token::Quoted(w) => w,
                other => return Err(self.unexpected(other, "a time modifier")),
            };
            let modifier = parse_search_time_modifier(&text)?;
            return Ok(Term::Time {
                latest: field.eq_ignore_ascii_case("latest"),
                text,
                modifier,
            });
        }

        check_breakers(&field)?;
        let value = match self.next(LexMode::Search)? {
            Token::Word(word) => {
                check_breakers(&word)?;
                classify_unquoted(&word)
            }
            Token::Quoted(text) => FilterValue::QuotedString(text),
            other => return Err(self.unexpected(other, "a value")),
        };

        if op.is_ordering() && !matches!(value, FilterValue::Number(_)) {
            return Err(ParseError::NonNumericOrdering {
                op: op.to_string(),
                value: value.to_string(),
            });
        }

        Ok(Term::Filter(FilterNode::terminal(&field, op, value)))
    }
}

fn classify_unquoted(word: &str) -> FilterValue {
    match word {
        "true" => FilterValue::Boolean(true),
        "false" => FilterValue::Boolean(false),
        _ => match Number::parse(word) {
            Some(number) => FilterValue::Number(number),
            None => FilterValue::String(word.to_string()),
        },
    }
}

fn check_breakers(word: &str) -> Result<()> {
    let edges = [word.chars().next(), word.chars().last()];
    match edges.into_iter().flatten().find(|c| BREAKERS.contains(c)) {
        Some(c) => Err(ParseError::literal(word, format!("cannot start or end with '{}'", c))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseOptions;

    fn search(text: &str) -> Result<SearchClause> {
        let options = ParseOptions::default();
        Parser::new(text, &options).parse_search_body()
    }

    fn eq(field: &str, value: FilterValue) -> FilterNode {
        FilterNode::terminal(field, CompareOp::Eq, value)
    }

    fn num(text: &str) -> FilterValue {
        FilterValue::Number(Number::parse(text).unwrap())
    }

    #[test]
    fn test_implicit_and_is_left_deep() {
        let filter = search("A=1 B=2 C=3").unwrap().filter.unwrap();
        assert_eq!(
            filter,
            FilterNode::and(FilterNode::and(eq("A", num("1")), eq("B", num("2"))), eq("C", num("3")))
        );
    }

    #[test]
    fn test_lone_literal_matches_any_field() {
        let filter = search("error").unwrap().filter.unwrap();
        assert_eq!(filter, eq("*", FilterValue::String("error".into())));
    }

    #[test]
    fn test_time_terms_are_lifted() {
        let clause = search("earliest=-1d host=a latest=now").unwrap();
        assert_eq!(clause.filter, Some(eq("host", FilterValue::String("a".into()))));
        assert!(clause.earliest.is_some());
        assert_eq!(clause.latest, Some(TimeModifier::Now));
    }

    #[test]
    fn test_time_term_under_or_is_rejected() {
        assert!(matches!(
            search("a=1 OR earliest=-1d"),
            Err(ParseError::TimeModifier { .. })
        ));
        assert!(matches!(search("NOT latest=-1h"), Err(ParseError::TimeModifier { .. })));
        assert!(matches!(search("(earliest=-1h)"), Err(ParseError::TimeModifier { .. })));
    }

    #[test]
    fn test_breakers() {
        assert!(matches!(search("&abcDEF"), Err(ParseError::InvalidLiteral { .. })));
        assert!(matches!(search("a=b;"), Err(ParseError::InvalidLiteral { .. })));
        assert!(search("a=\"b;\"").is_ok());
        assert!(search("web-01*").is_ok());
    }

    #[test]
    fn test_ordering_needs_number() {
        assert!(matches!(search("a>b"), Err(ParseError::NonNumericOrdering { .. })));
        assert!(search("a>=.5").is_ok());
    }

    #[test]
    fn test_empty_group_is_rejected() {
        assert!(matches!(search("()"), Err(ParseError::UnexpectedToken { .. })));
        assert!(matches!(search("(a=1"), Err(ParseError::UnexpectedEof(_))));
    }
}

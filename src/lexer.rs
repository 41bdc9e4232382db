use crate::ast::Token;
use crate::error::{ParseError, Result};

/// Which token grammar to apply at the cursor.
///
/// The same segment is often lexed in more than one mode: `stats
/// count(eval(x>5)) BY host` reads its skeleton in [`LexMode::Command`]
/// and the `x>5` part in [`LexMode::Expression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexMode {
    /// Search terms. Commas inside a word belong to the word.
    Search,
    /// Command options and field lists. Commas always separate.
    Command,
    /// eval/where expressions.
    Expression,
}

/// A pipe segment together with its character offset in the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub offset: usize,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    token_start: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            token_start: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position.min(self.input.len());
    }

    /// Start of the most recently read token.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    /// Whether only whitespace remains.
    pub fn at_end(&self) -> bool {
        self.input[self.position..].iter().all(|c| c.is_whitespace())
    }

    /// Remaining raw text, trimmed.
    pub fn rest(&self) -> String {
        self.input[self.position..]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Raw source text between two positions.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.input.len());
        self.input[start.min(end)..end].iter().collect()
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Reads a token without consuming it.
    pub fn peek_token(&mut self, mode: LexMode) -> Result<Token> {
        let (position, token_start) = (self.position, self.token_start);
        let token = self.next_token(mode);
        self.position = position;
        self.token_start = token_start;
        token
    }

    pub fn next_token(&mut self, mode: LexMode) -> Result<Token> {
        self.skip_whitespace();
        self.token_start = self.position;

        let Some(ch) = self.current_char() else {
            return Ok(Token::Eof);
        };

        match ch {
            '(' => {
                self.advance();
                Ok(Token::LParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RParen)
            }
            '"' => self.read_quoted('"').map(Token::Quoted),
            '=' => {
                self.advance();
                if mode == LexMode::Expression && self.current_char() == Some('=') {
                    self.advance();
                    return Ok(Token::EqEq);
                }
                Ok(Token::Eq)
            }
            '<' | '>' => {
                self.advance();
                let or_equal = self.current_char() == Some('=');
                if or_equal {
                    self.advance();
                }
                Ok(match (ch, or_equal) {
                    ('<', false) => Token::Lt,
                    ('<', true) => Token::LtEq,
                    ('>', false) => Token::Gt,
                    _ => Token::GtEq,
                })
            }
            '!' if self.peek_char(1) == Some('=') => {
                self.advance();
                self.advance();
                Ok(Token::NotEq)
            }
            ',' if mode != LexMode::Search || self.comma_stands_alone() => {
                self.advance();
                Ok(Token::Comma)
            }
            _ if mode == LexMode::Expression => self.next_expression_token(ch),
            _ => Ok(self.read_word(mode)),
        }
    }

    /// In search text a comma is its own token only when nothing word-like
    /// follows it.
    fn comma_stands_alone(&self) -> bool {
        match self.peek_char(1) {
            None => true,
            Some(c) => c.is_whitespace() || matches!(c, '(' | ')' | '"' | ','),
        }
    }

    fn read_word(&mut self, mode: LexMode) -> Token {
        let mut word = String::new();
        while let Some(ch) = self.current_char() {
            let ends_word = ch.is_whitespace()
                || matches!(ch, '(' | ')' | '"' | '=' | '<' | '>')
                || (ch == '!' && self.peek_char(1) == Some('='))
                || (ch == ',' && (mode == LexMode::Command || self.comma_stands_alone()));
            if ends_word {
                break;
            }
            word.push(ch);
            self.advance();
        }

        match word.as_str() {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            _ => Token::Word(word),
        }
    }

    fn read_quoted(&mut self, quote: char) -> Result<String> {
        let start = self.position;
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some(c) if c == quote || c == '\\' => result.push(c),
                        // Unknown escapes stay verbatim so regex classes survive.
                        Some(c) => {
                            result.push('\\');
                            result.push(c);
                        }
                        None => return Err(ParseError::UnterminatedString(start)),
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(ParseError::UnterminatedString(start))
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_number(&mut self) -> String {
        let mut number = String::new();
        let mut seen_dot = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.' && !seen_dot && self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) {
                seen_dot = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Exponent, only when digits follow.
        if matches!(self.current_char(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_char(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_char(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    if let Some(c) = self.current_char() {
                        number.push(c);
                    }
                    self.advance();
                }
                while let Some(c) = self.current_char().filter(|c| c.is_ascii_digit()) {
                    number.push(c);
                    self.advance();
                }
            }
        }

        number
    }

    /// Whether the last non-space character before the cursor ends an operand,
    /// which makes a following `.` a concatenation rather than a decimal point.
    fn follows_operand(&self) -> bool {
        self.input[..self.position]
            .iter()
            .rev()
            .find(|c| !c.is_whitespace())
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | ')' | '"' | '\''))
    }

    fn next_expression_token(&mut self, ch: char) -> Result<Token> {
        let single = |lexer: &mut Lexer, token: Token| -> Result<Token> {
            lexer.advance();
            Ok(token)
        };

        match ch {
            '+' => single(self, Token::Plus),
            '-' => single(self, Token::Minus),
            '*' => single(self, Token::Star),
            '/' => single(self, Token::Slash),
            '%' => single(self, Token::Percent),
            '.' if self.peek_char(1).is_some_and(|c| c.is_ascii_digit()) && !self.follows_operand() => {
                Ok(Token::Number(self.read_number()))
            }
            '.' => single(self, Token::Dot),
            '\'' => self.read_quoted('\'').map(Token::FieldRef),
            c if c.is_ascii_digit() => Ok(Token::Number(self.read_number())),
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.read_identifier();
                Ok(match ident.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "XOR" => Token::Xor,
                    _ => Token::Word(ident),
                })
            }
            other => Err(ParseError::UnexpectedToken {
                found: format!("{:?}", other),
                expected: "an expression".to_string(),
                position: self.position,
            }),
        }
    }
}

/// Removes every ```` ```...``` ```` comment. Quoted strings and quoted field
/// names suppress comment recognition; inside a comment nothing but the
/// closing backticks matters.
pub fn strip_comments(query: &str) -> Result<String> {
    let chars: Vec<char> = query.chars().collect();
    let mut out = String::with_capacity(query.len());
    let mut in_quote = false;
    let mut i = 0;

    let is_fence = |at: usize| chars.get(at..at + 3).is_some_and(|w| w.iter().all(|&c| c == '`'));

    while i < chars.len() {
        let ch = chars[i];
        if in_quote {
            out.push(ch);
            if ch == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
                continue;
            }
            if ch == '"' {
                in_quote = false;
            }
            i += 1;
            continue;
        }

        if ch == '\'' {
            if let Some(close) = single_quote_span(&chars, i) {
                out.extend(&chars[i..=close]);
                i = close + 1;
                continue;
            }
        }

        if is_fence(i) {
            let start = i;
            let mut j = i + 3;
            while j < chars.len() && !is_fence(j) {
                j += 1;
            }
            if j >= chars.len() {
                return Err(ParseError::UnterminatedComment(start));
            }
            i = j + 3;
            continue;
        }

        if ch == '"' {
            in_quote = true;
        }
        out.push(ch);
        i += 1;
    }

    Ok(out)
}

/// Splits a query at top-level `|`, ignoring pipes inside quoted strings,
/// quoted field names and parentheses.
pub fn split_pipeline(query: &str) -> Result<Vec<Segment>> {
    let chars: Vec<char> = query.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut offset = 0;
    let mut depth: usize = 0;
    let mut in_quote = false;
    let mut escaped = false;
    let mut quote_start = 0;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        i += 1;

        if in_quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_quote = false;
            }
            continue;
        }

        match ch {
            '"' => {
                in_quote = true;
                quote_start = i - 1;
            }
            '\'' => {
                if let Some(close) = single_quote_span(&chars, i - 1) {
                    current.extend(&chars[i - 1..=close]);
                    i = close + 1;
                    continue;
                }
            }
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or(ParseError::UnbalancedParen(i - 1))?;
            }
            '|' if depth == 0 => {
                segments.push(Segment {
                    text: std::mem::take(&mut current),
                    offset,
                });
                offset = i;
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    if in_quote {
        return Err(ParseError::UnterminatedString(quote_start));
    }

    segments.push(Segment {
        text: current,
        offset,
    });
    Ok(segments)
}

/// Index of the quote closing a single-quoted field name that opens at `at`.
///
/// A `'` only opens one where a token can start and when it is closed later
/// on; anywhere else it is an ordinary character, such as the apostrophe in
/// `don't`.
fn single_quote_span(chars: &[char], at: usize) -> Option<usize> {
    let inside_word = at
        .checked_sub(1)
        .and_then(|prev| chars.get(prev))
        .is_some_and(|c| c.is_alphanumeric() || *c == '_');
    if inside_word {
        return None;
    }

    let mut i = at + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\'' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

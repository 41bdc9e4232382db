use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    /// Bare run of characters
    ///
    /// In search text a word is anything up to whitespace, a parenthesis,
    /// a quote or a comparison operator. In expressions it is an
    /// identifier (`[A-Za-z_][A-Za-z0-9_]*`).
    ///
    /// # Examples
    /// ```text
    /// error
    /// host=web-01*
    /// earliest=-1d@d
    /// ```
    Word(String),

    /// Double-quoted string with `\"` and `\\` resolved
    ///
    /// # Examples
    /// ```text
    /// "connection refused"
    /// "^\d{3}$"
    /// ```
    Quoted(String),

    /// Single-quoted field name (expressions only)
    ///
    /// # Examples
    /// ```text
    /// 'response time'
    /// 'user.name'
    /// ```
    FieldRef(String),

    /// Numeric literal, kept as written (expressions only)
    Number(String),

    // Boolean keywords
    /// `AND` (uppercase in search text, any case in expressions)
    And,

    /// `OR`
    Or,

    /// `NOT`
    Not,

    /// `XOR` (expressions only)
    Xor,

    // Comparison
    /// `=`
    Eq,

    /// `==`
    EqEq,

    /// `!=`
    NotEq,

    /// `<`
    Lt,

    /// `<=`
    LtEq,

    /// `>`
    Gt,

    /// `>=`
    GtEq,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    /// String concatenation
    ///
    /// # Examples
    /// ```text
    /// eval full=first . " " . last
    /// ```
    Dot,

    // Delimiters
    LParen,
    RParen,
    Comma,

    Eof,
}

impl Token {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Token::Eq | Token::EqEq | Token::NotEq | Token::Lt | Token::LtEq | Token::Gt | Token::GtEq
        )
    }

    /// Case-insensitive keyword test for bare words such as `BY` or `AS`.
    pub fn is_word(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{}'", w),
            Token::Quoted(s) => write!(f, "\"{}\"", s),
            Token::FieldRef(s) => write!(f, "field '{}'", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::And => f.write_str("AND"),
            Token::Or => f.write_str("OR"),
            Token::Not => f.write_str("NOT"),
            Token::Xor => f.write_str("XOR"),
            Token::Eq => f.write_str("'='"),
            Token::EqEq => f.write_str("'=='"),
            Token::NotEq => f.write_str("'!='"),
            Token::Lt => f.write_str("'<'"),
            Token::LtEq => f.write_str("'<='"),
            Token::Gt => f.write_str("'>'"),
            Token::GtEq => f.write_str("'>='"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Percent => f.write_str("'%'"),
            Token::Dot => f.write_str("'.'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Serialize, Serializer};

use crate::error::{ParseError, Result};

/// A numeric literal that keeps its exact source text.
///
/// Search terms compare against numbers the way they were written, so
/// `007`, `+5` and `.5` must survive compilation untouched. The decimal
/// view is only computed on demand.
///
/// # Examples
///
/// ```
/// use spl_lang::Number;
///
/// let n = Number::parse("007").unwrap();
/// assert_eq!(n.as_str(), "007");
/// assert_eq!(n.as_i64(), Some(7));
/// assert!(Number::parse("7a").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Number {
    text: String,
}

impl Number {
    /// Accepts `[+-]digits[.digits][e[+-]digits]`, `[+-].digits[...]` and
    /// `[+-]digits.`; anything else is not a number.
    pub fn parse(text: &str) -> Option<Number> {
        let bytes = text.as_bytes();
        let mut i = 0;
        if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
            i += 1;
        }

        let int_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let int_digits = i - int_start;

        let mut frac_digits = 0;
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            let frac_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            frac_digits = i - frac_start;
        }

        if int_digits == 0 && frac_digits == 0 {
            return None;
        }

        if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
            i += 1;
            if matches!(bytes.get(i), Some(b'+') | Some(b'-')) {
                i += 1;
            }
            let exp_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i == exp_start {
                return None;
            }
        }

        if i != bytes.len() {
            return None;
        }

        Some(Number {
            text: text.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Exact decimal value, `None` when the literal overflows a `Decimal`.
    pub fn to_decimal(&self) -> Option<Decimal> {
        let mut normalized = self.text.trim_start_matches('+').to_string();
        if normalized.starts_with('.') {
            normalized.insert(0, '0');
        } else if normalized.starts_with("-.") {
            normalized.insert(1, '0');
        }
        if normalized.contains(['e', 'E']) {
            return Decimal::from_scientific(&normalized).ok();
        }
        let normalized = normalized.trim_end_matches('.');
        Decimal::from_str(normalized).ok()
    }

    pub fn to_f64(&self) -> Option<f64> {
        self.text.trim_start_matches('+').parse().ok()
    }

    /// Integer value when the literal has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        let decimal = self.to_decimal()?;
        if decimal.fract().is_zero() {
            decimal.to_i64()
        } else {
            None
        }
    }

    pub fn is_integer(&self) -> bool {
        self.as_i64().is_some()
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A regular expression compiled once at parse time.
///
/// The source text is kept as written; `(?<name>...)` groups are rewritten
/// to `(?P<name>...)` before compiling.
#[derive(Debug, Clone)]
pub struct CompiledRegex {
    source: String,
    regex: Regex,
}

impl CompiledRegex {
    pub fn new(source: &str) -> Result<Self> {
        let rewritten = rewrite_named_groups(source);
        let regex = Regex::new(&rewritten).map_err(|e| ParseError::InvalidRegex {
            pattern: source.to_string(),
            reason: e.to_string(),
        })?;
        Ok(CompiledRegex {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Names of the named capture groups, in pattern order.
    pub fn capture_names(&self) -> Vec<String> {
        self.regex
            .capture_names()
            .flatten()
            .map(str::to_string)
            .collect()
    }
}

impl PartialEq for CompiledRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Serialize for CompiledRegex {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// The value side of a translated filter criterion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ColumnValue {
    String(String),
    Number(Number),
    Boolean(bool),
    Regex(CompiledRegex),
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::String(s) => write!(f, "{:?}", s),
            ColumnValue::Number(n) => write!(f, "{}", n),
            ColumnValue::Boolean(b) => write!(f, "{}", b),
            ColumnValue::Regex(r) => write!(f, "/{}/", r.source()),
        }
    }
}

/// Rewrites `(?<name>` to `(?P<name>`, leaving lookbehinds alone.
pub fn rewrite_named_groups(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' {
            out.push(chars[i]);
            if let Some(&next) = chars.get(i + 1) {
                out.push(next);
            }
            i += 2;
            continue;
        }
        if chars[i] == '('
            && chars.get(i + 1) == Some(&'?')
            && chars.get(i + 2) == Some(&'<')
            && !matches!(chars.get(i + 3), Some('=') | Some('!'))
        {
            out.push_str("(?P<");
            i += 3;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Translates a SQL `LIKE` pattern into an anchored regex: `%` matches any
/// run of characters, `_` exactly one.
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_keeps_text() {
        for text in ["007", "+5", ".5", "-3.25", "1e6", "5."] {
            let n = Number::parse(text).unwrap();
            assert_eq!(n.as_str(), text);
        }
    }

    #[test]
    fn test_number_rejects_words() {
        for text in ["", "+", ".", "abc", "1.2.3", "12ab", "1e", "--1"] {
            assert!(Number::parse(text).is_none(), "{text} parsed as number");
        }
    }

    #[test]
    fn test_number_decimal_view() {
        assert_eq!(Number::parse(".5").unwrap().to_decimal(), Decimal::from_str("0.5").ok());
        assert_eq!(Number::parse("+12").unwrap().as_i64(), Some(12));
        assert_eq!(Number::parse("1.5").unwrap().as_i64(), None);
        assert!(Number::parse("2.0").unwrap().is_integer());
    }

    #[test]
    fn test_named_group_rewrite() {
        assert_eq!(rewrite_named_groups("(?<user>\\w+)"), "(?P<user>\\w+)");
        assert_eq!(rewrite_named_groups("(?<=a)b"), "(?<=a)b");
        assert_eq!(rewrite_named_groups("\\(?<x>"), "\\(?<x>");
    }

    #[test]
    fn test_compiled_regex_names() {
        let re = CompiledRegex::new("(?<a>\\d+)-(?<b>\\w+)").unwrap();
        assert_eq!(re.source(), "(?<a>\\d+)-(?<b>\\w+)");
        assert_eq!(re.capture_names(), vec!["a", "b"]);
        assert!(CompiledRegex::new("(").is_err());
    }

    #[test]
    fn test_like_pattern() {
        let re = Regex::new(&like_to_regex("ab%c_")).unwrap();
        assert!(re.is_match("abXXcY"));
        assert!(!re.is_match("abcYZ"));
        assert!(Regex::new(&like_to_regex("a.b")).unwrap().is_match("a.b"));
    }
}

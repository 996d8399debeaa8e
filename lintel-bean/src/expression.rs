// Property expression parsing and the shared expression cache

use crate::error::ParseError;
use crate::value::Value;
use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

static REGEX_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").unwrap());
static REGEX_DOUBLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+\.[0-9]+$").unwrap());
static REGEX_LONG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(-?[0-9]+)[lL]$").unwrap());
static REGEX_FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-?[0-9]+\.?[0-9]+)[fF]$").unwrap());
static REGEX_BOOLEAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(true|false)$").unwrap());

const TERMINATOR_CHARS: &str = ".[]";

/// The typed reading of a path segment, fixed at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Char(char),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
}

impl Literal {
    /// Detect the literal type of `text`. Tried in order: integer, double,
    /// long, float, boolean; anything else is a string.
    pub fn detect(text: &str) -> Literal {
        if REGEX_INTEGER.is_match(text) {
            if let Ok(i) = text.parse() {
                return Literal::Integer(i);
            }
        } else if REGEX_DOUBLE.is_match(text) {
            if let Ok(d) = text.parse() {
                return Literal::Double(d);
            }
        } else if let Some(captures) = REGEX_LONG.captures(text) {
            if let Ok(l) = captures[1].parse() {
                return Literal::Long(l);
            }
        } else if let Some(captures) = REGEX_FLOAT.captures(text) {
            if let Ok(f) = captures[1].parse() {
                return Literal::Float(f);
            }
        } else if REGEX_BOOLEAN.is_match(text) {
            return Literal::Boolean(text.eq_ignore_ascii_case("true"));
        }
        Literal::String(text.to_string())
    }

    /// Class name of the literal's value type.
    pub fn class_name(&self) -> &'static str {
        match self {
            Literal::String(_) => "String",
            Literal::Char(_) => "Character",
            Literal::Integer(_) => "Integer",
            Literal::Long(_) => "Long",
            Literal::Float(_) => "Float",
            Literal::Double(_) => "Double",
            Literal::Boolean(_) => "Boolean",
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Char(c) => Value::Char(*c),
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Long(l) => Value::Long(*l),
            Literal::Float(f) => Value::Float(*f),
            Literal::Double(d) => Value::Double(*d),
            Literal::Boolean(b) => Value::Boolean(*b),
        }
    }
}

/// One segment of a property path.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    string_value: String,
    typed_value: Literal,
}

impl Node {
    fn new(string_value: String, quote: Option<char>) -> Self {
        let typed_value = match Literal::detect(&string_value) {
            // A lone character in single quotes is a char unless it reads as a number.
            Literal::String(_) if quote == Some('\'') && string_value.chars().count() == 1 => {
                string_value
                    .chars()
                    .next()
                    .map(Literal::Char)
                    .unwrap_or_else(|| Literal::String(string_value.clone()))
            }
            literal => literal,
        };
        Self {
            string_value,
            typed_value,
        }
    }

    /// The segment text with quotes and escapes removed.
    pub fn string_value(&self) -> &str {
        &self.string_value
    }

    pub fn typed_value(&self) -> &Literal {
        &self.typed_value
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string_value)
    }
}

/// A parsed property path such as `person.addresses[0].lines['home']`.
///
/// Expressions are immutable. Use [`PropertyExpression::get_expression`] to
/// share parsed instances through the process-wide cache.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyExpression {
    source: String,
    nodes: Vec<Node>,
}

impl PropertyExpression {
    /// Parse without consulting the cache.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let nodes = Parser::new(source).run()?;
        if nodes.is_empty() {
            return Err(ParseError::new(source, "Expression contains no property names."));
        }
        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    /// Fetch a cached expression, parsing and caching it on first use.
    pub fn get_expression(source: &str) -> Result<Arc<Self>, ParseError> {
        EXPRESSION_CACHE.get_or_parse(source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root_node(&self) -> &Node {
        // Parsing rejects expressions without nodes.
        &self.nodes[0]
    }

    pub fn leaf_node(&self) -> &Node {
        &self.nodes[self.nodes.len() - 1]
    }
}

impl fmt::Display for PropertyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct Parser<'a> {
    source: &'a str,
    nodes: Vec<Node>,
    buffer: String,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            nodes: Vec::new(),
            buffer: String::new(),
        }
    }

    fn flush(&mut self, quote: Option<char>) {
        let value = std::mem::take(&mut self.buffer);
        self.nodes.push(Node::new(value, quote));
    }

    fn run(mut self) -> Result<Vec<Node>, ParseError> {
        let chars: Vec<char> = self.source.chars().collect();
        let mut quote: Option<char> = None;
        let mut in_brackets = false;
        let mut quoted_key = false;
        let mut escaped = false;

        for (i, &ch) in chars.iter().enumerate() {
            if escaped {
                self.buffer.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if let Some(open) = quote {
                if ch == open {
                    quote = None;
                    if let Some(&next) = chars.get(i + 1) {
                        if !TERMINATOR_CHARS.contains(next) {
                            return Err(ParseError::new(
                                self.source,
                                "A quoted String must be terminated by a matching quote \
                                 followed by either the end of the expression, a period or a \
                                 square bracket character.",
                            ));
                        }
                    }
                    self.flush(Some(open));
                    quoted_key = in_brackets;
                } else {
                    self.buffer.push(ch);
                }
            } else if ch == '\'' || ch == '"' {
                quote = Some(ch);
            } else if in_brackets {
                if ch == ']' {
                    in_brackets = false;
                    if !self.buffer.is_empty() {
                        self.flush(None);
                    }
                    let trailing = chars.get(i + 1).filter(|next| **next != '.' && **next != '[');
                    if trailing.is_some() {
                        let message = if quoted_key {
                            "A quoted String must be terminated by a matching quote followed by \
                             either the end of the expression, a period or a square bracket \
                             character."
                        } else {
                            "A square bracketed sub-expression must be followed by either the \
                             end of the expression, a period or another square bracket."
                        };
                        return Err(ParseError::new(self.source, message));
                    }
                    quoted_key = false;
                } else {
                    // Periods inside brackets belong to the key (`[1.5]`).
                    self.buffer.push(ch);
                }
            } else if ch == '[' {
                if !self.buffer.is_empty() {
                    self.flush(None);
                }
                in_brackets = true;
            } else if ch == '.' {
                // Zero-length segments (`a..b`) are skipped.
                if !self.buffer.is_empty() {
                    self.flush(None);
                }
            } else {
                self.buffer.push(ch);
            }
        }

        if let Some(open) = quote {
            let kind = if open == '\'' { "single" } else { "double" };
            return Err(ParseError::new(
                self.source,
                format!("Expression appears to terminate inside of {} quoted string.", kind),
            ));
        }
        if in_brackets {
            return Err(ParseError::new(
                self.source,
                "Expression appears to terminate inside of square bracketed sub-expression.",
            ));
        }
        if escaped {
            return Err(ParseError::new(
                self.source,
                "Expression ends with an unused escape character.",
            ));
        }
        if !self.buffer.is_empty() {
            self.flush(None);
        }

        Ok(self.nodes)
    }
}

// ============================================================================
// Expression Cache
// ============================================================================

/// Default number of parsed expressions kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

static EXPRESSION_CACHE: Lazy<ExpressionCache> =
    Lazy::new(|| ExpressionCache::new(DEFAULT_CACHE_CAPACITY));

/// Bounded, least-recently-used cache of parsed expressions.
pub struct ExpressionCache {
    entries: Mutex<LruCache<String, Arc<PropertyExpression>>>,
}

fn capacity(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN)
}

impl ExpressionCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity(max_entries))),
        }
    }

    /// The cache behind [`PropertyExpression::get_expression`].
    pub fn global() -> &'static ExpressionCache {
        &EXPRESSION_CACHE
    }

    /// Resize the process-wide cache, evicting the oldest entries if it shrinks.
    ///
    /// Every caller shares the one cache, so the last call wins. Building a
    /// `Configuration` calls this with its `binding.expression_cache_capacity`.
    pub fn configure(max_entries: usize) {
        Self::global().resize(max_entries);
    }

    pub fn resize(&self, max_entries: usize) {
        self.entries.lock().resize(capacity(max_entries));
    }

    pub fn get_or_parse(&self, source: &str) -> Result<Arc<PropertyExpression>, ParseError> {
        if let Some(found) = self.entries.lock().get(source) {
            return Ok(found.clone());
        }

        let parsed = Arc::new(PropertyExpression::parse(source)?);

        // Another caller may have parsed the same source meanwhile; keep theirs.
        let mut entries = self.entries.lock();
        if let Some(found) = entries.get(source) {
            return Ok(found.clone());
        }
        entries.put(source.to_string(), parsed.clone());
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, source: &str) -> bool {
        self.entries.lock().contains(source)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(expression: &str) -> Vec<String> {
        PropertyExpression::parse(expression)
            .unwrap()
            .nodes()
            .iter()
            .map(|n| n.string_value().to_string())
            .collect()
    }

    fn literal(expression: &str, index: usize) -> Literal {
        PropertyExpression::parse(expression).unwrap().nodes()[index]
            .typed_value()
            .clone()
    }

    #[test]
    fn test_dotted_and_indexed_segments() {
        assert_eq!(strings("a.b['c'].d[3]"), vec!["a", "b", "c", "d", "3"]);
        assert_eq!(strings("a[1][2]"), vec!["a", "1", "2"]);
        assert_eq!(strings("person.name"), vec!["person", "name"]);
    }

    #[test]
    fn test_zero_length_segments_are_skipped() {
        assert_eq!(strings("a..b"), strings("a.b"));
        assert_eq!(strings(".a."), vec!["a"]);
    }

    #[test]
    fn test_literal_detection() {
        assert_eq!(literal("a[80]", 1), Literal::Integer(80));
        assert_eq!(literal("a[-3]", 1), Literal::Integer(-3));
        assert_eq!(literal("a[1.5]", 1), Literal::Double(1.5));
        assert_eq!(literal("a[12L]", 1), Literal::Long(12));
        assert_eq!(literal("a[2.5f]", 1), Literal::Float(2.5));
        assert_eq!(literal("a[25F]", 1), Literal::Float(25.0));
        assert_eq!(literal("a[TRUE]", 1), Literal::Boolean(true));
        assert_eq!(literal("a[red]", 1), Literal::String("red".into()));
    }

    #[test]
    fn test_integer_overflow_stays_a_string() {
        assert_eq!(
            literal("a[99999999999]", 1),
            Literal::String("99999999999".into())
        );
        assert_eq!(literal("a[99999999999L]", 1), Literal::Long(99_999_999_999));
    }

    #[test]
    fn test_quoted_keys_match_bare_literals() {
        assert_eq!(literal("a[80]", 1), literal("a['80']", 1));
        assert_eq!(literal("a['red']", 1), literal("a[\"red\"]", 1));
        assert_eq!(literal("a['red']", 1), Literal::String("red".into()));
        assert_eq!(literal("a['r']", 1), Literal::Char('r'));
        assert_eq!(literal("a[\"r\"]", 1), Literal::String("r".into()));
    }

    #[test]
    fn test_quoted_keys_keep_terminators() {
        assert_eq!(strings("map['a.b[c]']"), vec!["map", "a.b[c]"]);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(strings(r"map['it\'s']"), vec!["map", "it's"]);
        assert_eq!(strings(r"a\.b"), vec!["a.b"]);
    }

    #[test]
    fn test_garbage_after_quote_fails() {
        let err = PropertyExpression::parse("map['a']x").unwrap_err();
        assert_eq!(err.expression, "map['a']x");
        assert!(err.message.contains("quoted String must be terminated"));
        assert!(PropertyExpression::parse("'a'b").is_err());
        assert!(PropertyExpression::parse("map[\"a\"]junk.more").is_err());
    }

    #[test]
    fn test_garbage_after_bracket_fails() {
        let err = PropertyExpression::parse("list[3]x").unwrap_err();
        assert_eq!(err.expression, "list[3]x");
        assert!(err.message.contains("square bracketed sub-expression must be followed"));
        assert_eq!(strings("list[3].name"), vec!["list", "3", "name"]);
        assert_eq!(strings("grid[1][2]"), vec!["grid", "1", "2"]);
    }

    #[test]
    fn test_unterminated_constructs() {
        let single = PropertyExpression::parse("map['abc").unwrap_err();
        assert!(single.message.contains("single quoted"));
        let double = PropertyExpression::parse("map[\"abc").unwrap_err();
        assert!(double.message.contains("double quoted"));
        let bracket = PropertyExpression::parse("list[3").unwrap_err();
        assert!(bracket.message.contains("square bracketed"));
        assert!(PropertyExpression::parse("a\\").is_err());
    }

    #[test]
    fn test_empty_expression_fails() {
        assert!(PropertyExpression::parse("").is_err());
        assert!(PropertyExpression::parse("..").is_err());
    }

    #[test]
    fn test_cache_returns_same_instance() {
        let first = PropertyExpression::get_expression("cache.test[7].value").unwrap();
        let second = PropertyExpression::get_expression("cache.test[7].value").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, PropertyExpression::parse("cache.test[7].value").unwrap());
    }

    #[test]
    fn test_cache_is_bounded() {
        let cache = ExpressionCache::new(2);
        let a = cache.get_or_parse("a").unwrap();
        cache.get_or_parse("b").unwrap();
        cache.get_or_parse("a").unwrap();
        cache.get_or_parse("c").unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(Arc::ptr_eq(&a, &cache.get_or_parse("a").unwrap()));

        cache.resize(1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let cache = ExpressionCache::new(4);
        assert!(cache.get_or_parse("bad['").is_err());
        assert!(cache.is_empty());
    }
}

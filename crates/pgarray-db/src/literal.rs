//! PostgreSQL array literal codec.
//!
//! Converts between the external text form of a PostgreSQL array
//! (`{1,2,3}`, `{{"a b",NULL},{c,d}}`, `[0:1]={x,y}`) and [`Value::List`]
//! trees. Element conversion is delegated to caller-supplied functions so the
//! same codec serves every element type.
//!
//! ```
//! use pgarray_db::literal::{format_array_literal, parse_array_literal};
//! use pgarray_db::value::Value;
//! use pgarray_db::PgArrayResult;
//!
//! let parse = |s: &str| -> PgArrayResult<Value> { Ok(Value::String(s.to_string())) };
//! let value = parse_array_literal(r#"{"a,b",c}"#, &parse, Some(1)).unwrap();
//! assert_eq!(value, Value::from(vec!["a,b", "c"]));
//!
//! let format = |v: &Value| -> PgArrayResult<String> { Ok(v.to_string()) };
//! assert_eq!(format_array_literal(&value, &format).unwrap(), r#"{"a,b",c}"#);
//! ```

use pgarray_core::{PgArrayError, PgArrayResult};

use crate::value::Value;

/// PostgreSQL refuses arrays with more dimensions than this.
pub const MAX_DIMENSIONS: usize = 6;

/// Converts the text of one (unquoted, unescaped) element to a value.
pub type ElementParser<'a> = &'a dyn Fn(&str) -> PgArrayResult<Value>;

/// Converts one non-NULL element to its text form.
pub type ElementFormatter<'a> = &'a dyn Fn(&Value) -> PgArrayResult<String>;

/// Intermediate parse tree before element conversion.
#[derive(Debug)]
enum Node {
    /// `None` is an unquoted NULL.
    Leaf(Option<String>),
    Array(Vec<Node>),
}

/// Parses an array literal into a [`Value::List`] tree.
///
/// Unquoted `NULL` (any case) becomes [`Value::Null`] without calling
/// `element_parser`. When `dimension` is `Some(n)` a non-empty array must be
/// nested exactly `n` deep. Optional `[lo:hi]` bounds are checked against
/// the parsed shape and then dropped.
///
/// # Errors
///
/// Returns [`PgArrayError::ArrayLiteral`] for malformed text, ragged
/// sub-arrays or a dimension mismatch, and whatever `element_parser` returns
/// for a bad element.
pub fn parse_array_literal(
    text: &str,
    element_parser: ElementParser<'_>,
    dimension: Option<usize>,
) -> PgArrayResult<Value> {
    tracing::trace!(literal = text, ?dimension, "parsing array literal");

    let mut parser = LiteralParser::new(text);
    parser.skip_whitespace();
    let bounds = if parser.peek() == Some('[') {
        parser.parse_bounds()?
    } else {
        Vec::new()
    };

    parser.skip_whitespace();
    parser.expect('{')?;
    let nodes = parser.parse_items(1)?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(parser.error("junk after closing right brace"));
    }

    let shape = rectangular_shape(&nodes, &node_children)
        .map_err(|message| PgArrayError::literal(text, message))?;
    let is_empty = shape.contains(&0);

    if !bounds.is_empty() {
        if is_empty {
            return Err(PgArrayError::literal(
                text,
                "dimension bounds given for an empty array",
            ));
        }
        if bounds.len() != shape.len() {
            return Err(PgArrayError::literal(
                text,
                format!(
                    "{} dimension bounds given for a {}-dimensional array",
                    bounds.len(),
                    shape.len()
                ),
            ));
        }
        for (axis, ((lo, hi), len)) in bounds.iter().zip(&shape).enumerate() {
            let declared = hi.checked_sub(*lo).and_then(|d| d.checked_add(1));
            if declared.and_then(|d| usize::try_from(d).ok()) != Some(*len) {
                return Err(PgArrayError::literal(
                    text,
                    format!(
                        "bounds [{lo}:{hi}] of dimension {} do not match {len} elements",
                        axis + 1
                    ),
                ));
            }
        }
    }

    if let Some(expected) = dimension {
        if !is_empty && shape.len() != expected {
            return Err(PgArrayError::literal(
                text,
                format!(
                    "expected a {expected}-dimensional array, found {} dimensions",
                    shape.len()
                ),
            ));
        }
    }

    build_value(nodes, element_parser)
}

/// Formats a [`Value::List`] tree as an array literal.
///
/// `Null` leaves print as `NULL`. Element text is double-quoted when it would
/// otherwise be misread (see [`quote_element`]).
///
/// # Errors
///
/// Returns [`PgArrayError::ArrayLiteral`] when `value` is not a list or is
/// ragged, and whatever `element_formatter` returns for a bad element.
pub fn format_array_literal(
    value: &Value,
    element_formatter: ElementFormatter<'_>,
) -> PgArrayResult<String> {
    let Value::List(items) = value else {
        return Err(PgArrayError::literal(
            value.to_string(),
            "only lists can be formatted as arrays",
        ));
    };
    let shape = array_shape(value)?;
    if shape.len() > MAX_DIMENSIONS {
        return Err(PgArrayError::literal(
            value.to_string(),
            format!("number of array dimensions exceeds the maximum allowed ({MAX_DIMENSIONS})"),
        ));
    }

    let mut out = String::new();
    write_items(items, element_formatter, &mut out)?;
    tracing::trace!(literal = %out, "formatted array literal");
    Ok(out)
}

/// Returns the length of each axis of a list value, outermost first.
///
/// A scalar has an empty shape and `[]` has shape `[0]`.
///
/// # Errors
///
/// Returns [`PgArrayError::ArrayLiteral`] when sibling sub-lists differ in
/// shape or a level mixes scalars and sub-lists.
pub fn array_shape(value: &Value) -> PgArrayResult<Vec<usize>> {
    match value {
        Value::List(items) => rectangular_shape(items, &Value::as_list)
            .map_err(|message| PgArrayError::literal(value.to_string(), message)),
        _ => Ok(Vec::new()),
    }
}

/// Whitespace as PostgreSQL's array input and output see it. Other Unicode
/// spaces are ordinary element characters.
const fn is_array_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C')
}

/// Shape of a nested sequence whose sub-sequences are found by `children`.
fn rectangular_shape<T>(
    items: &[T],
    children: &impl Fn(&T) -> Option<&[T]>,
) -> Result<Vec<usize>, String> {
    let subs: Vec<&[T]> = items.iter().filter_map(children).collect();
    if subs.is_empty() {
        return Ok(vec![items.len()]);
    }
    if subs.len() != items.len() {
        return Err("cannot mix scalars and sub-arrays at one level".to_string());
    }
    let mut inner: Option<Vec<usize>> = None;
    for sub in subs {
        let sub_shape = rectangular_shape(sub, children)?;
        match &inner {
            Some(expected) if *expected != sub_shape => {
                return Err(
                    "multidimensional arrays must have sub-arrays with matching dimensions"
                        .to_string(),
                );
            }
            Some(_) => {}
            None => inner = Some(sub_shape),
        }
    }
    let mut shape = vec![items.len()];
    shape.extend(inner.unwrap_or_default());
    Ok(shape)
}

/// Returns `text` ready to be placed inside an array literal, double-quoted
/// and escaped when PostgreSQL would otherwise misread it.
///
/// ```
/// use pgarray_db::literal::quote_element;
///
/// assert_eq!(quote_element("abc"), "abc");
/// assert_eq!(quote_element("a b"), "\"a b\"");
/// assert_eq!(quote_element("NULL"), "\"NULL\"");
/// assert_eq!(quote_element(r#"say "hi""#), r#""say \"hi\"""#);
/// ```
pub fn quote_element(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.eq_ignore_ascii_case("NULL")
        || text
            .chars()
            .any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || is_array_whitespace(c));
    if !needs_quotes {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn write_items(
    items: &[Value],
    element_formatter: ElementFormatter<'_>,
    out: &mut String,
) -> PgArrayResult<()> {
    out.push('{');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item {
            Value::List(sub) => write_items(sub, element_formatter, out)?,
            Value::Null => out.push_str("NULL"),
            other => out.push_str(&quote_element(&element_formatter(other)?)),
        }
    }
    out.push('}');
    Ok(())
}

fn node_children(node: &Node) -> Option<&[Node]> {
    match node {
        Node::Array(sub) => Some(sub.as_slice()),
        Node::Leaf(_) => None,
    }
}

fn build_value(nodes: Vec<Node>, element_parser: ElementParser<'_>) -> PgArrayResult<Value> {
    let items = nodes
        .into_iter()
        .map(|node| match node {
            Node::Leaf(None) => Ok(Value::Null),
            Node::Leaf(Some(text)) => element_parser(&text),
            Node::Array(sub) => build_value(sub, element_parser),
        })
        .collect::<PgArrayResult<Vec<_>>>()?;
    Ok(Value::List(items))
}

/// A character cursor over one literal.
struct LiteralParser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> PgArrayError {
        PgArrayError::literal(self.input, message)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(is_array_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> PgArrayResult<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error(format!("expected '{expected}', found end of input"))),
        }
    }

    /// Parses `[lo:hi][lo:hi]...=`.
    fn parse_bounds(&mut self) -> PgArrayResult<Vec<(i64, i64)>> {
        let mut bounds = Vec::new();
        while self.peek() == Some('[') {
            self.bump();
            let lo = self.parse_bound()?;
            self.expect(':')?;
            let hi = self.parse_bound()?;
            self.expect(']')?;
            if hi < lo {
                return Err(self.error(format!(
                    "upper bound {hi} cannot be less than lower bound {lo}"
                )));
            }
            bounds.push((lo, hi));
            self.skip_whitespace();
        }
        self.expect('=')?;
        Ok(bounds)
    }

    fn parse_bound(&mut self) -> PgArrayResult<i64> {
        self.skip_whitespace();
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.pos += 1;
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        self.skip_whitespace();
        digits
            .parse()
            .map_err(|_| self.error(format!("invalid dimension bound {digits:?}")))
    }

    /// Parses the items of an array whose opening brace was just consumed,
    /// up to and including the closing brace.
    fn parse_items(&mut self, depth: usize) -> PgArrayResult<Vec<Node>> {
        if depth > MAX_DIMENSIONS {
            return Err(self.error(format!(
                "number of array dimensions exceeds the maximum allowed ({MAX_DIMENSIONS})"
            )));
        }

        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some('}') {
            self.bump();
            return Ok(items);
        }

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('{') => {
                    self.bump();
                    items.push(Node::Array(self.parse_items(depth + 1)?));
                }
                Some('"') => {
                    self.bump();
                    items.push(Node::Leaf(Some(self.parse_quoted()?)));
                }
                Some(_) => items.push(self.parse_unquoted()?),
                None => return Err(self.error("unexpected end of input")),
            }

            self.skip_whitespace();
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(items),
                Some(c) => return Err(self.error(format!("unexpected character '{c}'"))),
                None => return Err(self.error("unexpected end of input")),
            }
        }
    }

    fn parse_quoted(&mut self) -> PgArrayResult<String> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(text),
                Some('\\') => match self.bump() {
                    Some(c) => text.push(c),
                    None => return Err(self.error("unterminated quoted element")),
                },
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated quoted element")),
            }
        }
    }

    fn parse_unquoted(&mut self) -> PgArrayResult<Node> {
        let mut text = String::new();
        // Escaped characters are never trimmed and disable NULL detection.
        let mut protected_len = 0;
        let mut escaped = false;

        while let Some(c) = self.peek() {
            match c {
                ',' | '}' => break,
                '{' | '"' => return Err(self.error(format!("unexpected '{c}' in unquoted element"))),
                '\\' => {
                    self.bump();
                    let Some(next) = self.bump() else {
                        return Err(self.error("unexpected end of input after backslash"));
                    };
                    text.push(next);
                    protected_len = text.len();
                    escaped = true;
                }
                _ => {
                    self.bump();
                    text.push(c);
                }
            }
        }

        let trimmed_len = text
            .trim_end_matches(is_array_whitespace)
            .len()
            .max(protected_len);
        text.truncate(trimmed_len);

        if text.is_empty() {
            return Err(self.error("empty unquoted element"));
        }
        if !escaped && text.eq_ignore_ascii_case("NULL") {
            return Ok(Node::Leaf(None));
        }
        Ok(Node::Leaf(Some(text)))
    }
}

//! PostgreSQL text-array literals, as produced for `text[]` and arrays of composite types.
//!
//! ```text
//! {coding,debug,"with space"}
//! {"(\"v1\",v2)","(\"v3\",v4)"}
//! ```
//!
//! Array elements use `\"` and `\\` escapes. Composite (tuple) elements are themselves quoted
//! and their fields additionally use `""` for an embedded quote.

use crate::{
	error::{Error, Result},
	value::Value,
};
use core::{iter::Peekable, str::CharIndices};

#[derive(Debug, Clone, PartialEq)]
pub enum PgElement {
	/// An unquoted `NULL`.
	Null,
	Text(String),
	Tuple(Vec<String>),
}

impl PgElement {
	#[must_use]
	pub fn into_value(self) -> Value {
		match self {
			PgElement::Null => Value::Null,
			PgElement::Text(text) => Value::String(text),
			PgElement::Tuple(fields) => Value::array(fields),
		}
	}
}

fn fail<T>(position: usize, reason: &'static str) -> Result<T> {
	Err(Error::PgArray { position, reason })
}

/// Parses a one-dimensional array literal.
pub fn parse_pg_str_array(input: &str) -> Result<Vec<PgElement>> {
	let trimmed_start = input.len() - input.trim_start().len();
	let s = input.trim();
	if !s.starts_with('{') {
		return fail(trimmed_start, "expected `{`");
	}
	if !s.ends_with('}') || s.len() < 2 {
		return fail(trimmed_start + s.len(), "expected `}`");
	}
	let offset = trimmed_start + 1;
	let inner = &s[1..s.len() - 1];
	if inner.trim().is_empty() {
		return Ok(Vec::new());
	}

	let mut elements = Vec::new();
	let mut chars = inner.char_indices().peekable();
	loop {
		skip_whitespace(&mut chars);
		let element = match chars.peek() {
			None => return fail(offset + inner.len(), "expected an element"),
			Some(&(_, '"')) => {
				chars.next();
				let text = read_quoted(&mut chars, offset)?;
				if text.starts_with('(') && text.ends_with(')') {
					PgElement::Tuple(parse_record(&text))
				} else {
					PgElement::Text(text)
				}
			}
			Some(&(i, '{')) => return fail(offset + i, "nested arrays are not supported"),
			Some(_) => {
				let mut text = String::new();
				while let Some(&(_, c)) = chars.peek() {
					if c == ',' {
						break;
					}
					text.push(c);
					chars.next();
				}
				let text = text.trim_end();
				if text.eq_ignore_ascii_case("NULL") {
					PgElement::Null
				} else {
					PgElement::Text(text.to_owned())
				}
			}
		};
		elements.push(element);

		skip_whitespace(&mut chars);
		match chars.next() {
			None => break,
			Some((_, ',')) => continue,
			Some((i, _)) => return fail(offset + i, "expected `,` or `}`"),
		}
	}
	Ok(elements)
}

/// [`parse_pg_str_array`], converted to a [`Value::Array`].
pub fn parse_pg_array_value(input: &str) -> Result<Value> {
	Ok(Value::array(parse_pg_str_array(input)?.into_iter().map(PgElement::into_value)))
}

/// Formats plain strings as an array literal, quoting where necessary.
pub fn to_pg_literal<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> String {
	let mut literal = String::from("{");
	for (i, item) in items.into_iter().enumerate() {
		if i > 0 {
			literal.push(',');
		}
		let item = item.as_ref();
		let needs_quotes = item.is_empty()
			|| item.eq_ignore_ascii_case("NULL")
			|| item.chars().any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || c.is_whitespace());
		if needs_quotes {
			literal.push('"');
			for c in item.chars() {
				if c == '"' || c == '\\' {
					literal.push('\\');
				}
				literal.push(c);
			}
			literal.push('"');
		} else {
			literal.push_str(item);
		}
	}
	literal.push('}');
	literal
}

fn skip_whitespace(chars: &mut Peekable<CharIndices<'_>>) {
	while chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}
}

fn read_quoted(chars: &mut Peekable<CharIndices<'_>>, offset: usize) -> Result<String> {
	let mut text = String::new();
	let mut last = 0;
	while let Some((i, c)) = chars.next() {
		last = i;
		match c {
			'"' => return Ok(text),
			'\\' => match chars.next() {
				Some((_, escaped)) => text.push(escaped),
				None => return fail(offset + i, "dangling escape"),
			},
			c => text.push(c),
		}
	}
	fail(offset + last, "unterminated quoted element")
}

/// Splits a composite value `(a,"b ""c""",d)` into its fields.
fn parse_record(text: &str) -> Vec<String> {
	let inner = &text[1..text.len() - 1];
	if inner.is_empty() {
		return Vec::new();
	}

	let mut fields = Vec::new();
	let mut field = String::new();
	let mut quoted = false;
	let mut chars = inner.chars().peekable();
	while let Some(c) = chars.next() {
		match c {
			'"' if quoted && chars.peek() == Some(&'"') => {
				chars.next();
				field.push('"');
			}
			'"' => quoted = !quoted,
			'\\' => {
				if let Some(escaped) = chars.next() {
					field.push(escaped);
				}
			}
			',' if !quoted => fields.push(core::mem::take(&mut field)),
			c => field.push(c),
		}
	}
	fields.push(field);
	fields
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn texts(items: &[&str]) -> Vec<PgElement> {
		items.iter().map(|&s| PgElement::Text(s.to_owned())).collect()
	}

	#[test]
	fn simple() {
		assert_eq!(parse_pg_str_array("{coding,debug,ai,git}").unwrap(), texts(&["coding", "debug", "ai", "git"]));
	}

	#[test]
	fn empty() {
		assert_eq!(parse_pg_str_array("{}").unwrap(), vec![]);
		assert_eq!(parse_pg_str_array("  { } ").unwrap(), vec![]);
	}

	#[test]
	fn quoted_elements() {
		assert_eq!(
			parse_pg_str_array(r#"{"with space","a,b","say \"hi\"","back\\slash",NULL}"#).unwrap(),
			vec![
				PgElement::Text("with space".to_owned()),
				PgElement::Text("a,b".to_owned()),
				PgElement::Text("say \"hi\"".to_owned()),
				PgElement::Text("back\\slash".to_owned()),
				PgElement::Null,
			]
		);
	}

	#[test]
	fn tuples() {
		assert_eq!(
			parse_pg_str_array(r#"{"(\"v1\",v2)","(\"v3\",v4)"}"#).unwrap(),
			vec![
				PgElement::Tuple(vec!["v1".to_owned(), "v2".to_owned()]),
				PgElement::Tuple(vec!["v3".to_owned(), "v4".to_owned()]),
			]
		);
	}

	#[test]
	fn special_symbols() {
		// Record fields `say "hi"` and `back\slash`, record-escaped, then array-escaped.
		let literal = r#"{"(\"say \"\"hi\"\"\",\"back\\\\slash\")"}"#;
		assert_eq!(
			parse_pg_str_array(literal).unwrap(),
			vec![PgElement::Tuple(vec!["say \"hi\"".to_owned(), "back\\slash".to_owned()])]
		);
	}

	#[test]
	fn round_trip() {
		let items = ["coding", "with space", "comma,inside", "quote\"d", "", "{braces}"];
		let parsed = parse_pg_str_array(&to_pg_literal(items)).unwrap();
		assert_eq!(parsed, texts(&items));
	}

	#[test]
	fn malformed() {
		assert!(matches!(parse_pg_str_array("coding,debug"), Err(Error::PgArray { position: 0, .. })));
		assert!(parse_pg_str_array(r#"{"open}"#).is_err());
		assert!(parse_pg_str_array("{{1,2},{3,4}}").is_err());
		assert!(parse_pg_str_array(r#"{"a" b}"#).is_err());
	}
}

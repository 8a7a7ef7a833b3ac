//! The small expression language of `sg-css`, `sg-attributes`, `sg-value` and `sg-item-variables`.
//!
//! ```text
//! expr    := or ('?' expr ':' expr)?
//! or      := and ('||' and)*
//! and     := compare ('&&' compare)*
//! compare := sum (('==' | '===' | '!=' | '!==' | '<' | '<=' | '>' | '>=') sum)?
//! sum     := unary (('+' | '-') unary)*
//! unary   := ('!' | '-') unary | primary
//! primary := number | string | 'true' | 'false' | 'null'
//!          | path | ident '(' (expr (',' expr)*)? ')' | '(' expr ')' | object
//! path    := ('this' '.')? ident ('.' ident)*
//! object  := '{' (key ':' expr (',' key ':' expr)* ','?)? '}'
//! key     := string | name (letters, digits, `_`, `-` and `$`)
//! ```
//!
//! Expressions are parsed into an AST and checked against the instance's declared properties and
//! registered methods before they are ever evaluated.

use crate::{
	error::{Error, Result},
	model::Model,
	utils::parse_locale_number,
	value::Value,
};
use core::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Literal(Value),
	/// A property, optionally followed by field accesses. If the root names the instance's class, a static value.
	Path(Vec<String>),
	Call(String, Vec<Expr>),
	Not(Box<Expr>),
	Negate(Box<Expr>),
	Binary(Box<Expr>, BinaryOp, Box<Expr>),
	Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
	Object(Vec<(String, Expr)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
	Or,
	And,
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	Add,
	Sub,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
	Number(f64),
	String(String),
	Name(String),
	Punct(&'static str),
}

const PUNCTUATION: [&str; 20] = [
	"===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "+", "-", "?", ":", ",", ".", "(", ")", "{",
];

struct Lexer<'a> {
	source: &'a str,
	position: usize,
}

impl<'a> Lexer<'a> {
	fn error(&self, position: usize, reason: impl Into<String>) -> Error {
		Error::Expression {
			source_text: self.source.to_owned(),
			position,
			reason: reason.into(),
		}
	}

	fn tokens(mut self) -> Result<Vec<(usize, Token)>> {
		let mut tokens = Vec::new();
		loop {
			let rest = &self.source[self.position..];
			let trimmed = rest.trim_start();
			self.position += rest.len() - trimmed.len();
			let start = self.position;
			let c = match trimmed.chars().next() {
				Some(c) => c,
				None => return Ok(tokens),
			};

			let token = if c.is_ascii_digit() || (c == '.' && trimmed[1..].starts_with(|c: char| c.is_ascii_digit())) {
				let len = trimmed.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(trimmed.len());
				let number = trimmed[..len].parse::<f64>().map_err(|_| self.error(start, "malformed number"))?;
				self.position += len;
				Token::Number(number)
			} else if c == '\'' || c == '"' {
				Token::String(self.string(c)?)
			} else if c.is_alphabetic() || c == '_' || c == '$' {
				// `-` continues a name only between letters, so `a-b` is one name but `count-1` is a subtraction.
				let mut len = 0;
				let mut chars = trimmed.char_indices().peekable();
				while let Some((i, c)) = chars.next() {
					let continues = c.is_alphanumeric()
						|| c == '_' || c == '$'
						|| (c == '-' && i > 0 && chars.peek().map_or(false, |&(_, next)| next.is_alphabetic()));
					if !continues {
						break;
					}
					len = i + c.len_utf8();
				}
				self.position += len;
				Token::Name(trimmed[..len].to_owned())
			} else if c == '}' {
				self.position += 1;
				Token::Punct("}")
			} else {
				let punct = PUNCTUATION
					.iter()
					.find(|punct| trimmed.starts_with(**punct))
					.ok_or_else(|| self.error(start, format!("unexpected {:?}", c)))?;
				self.position += punct.len();
				Token::Punct(*punct)
			};
			tokens.push((start, token));
		}
	}

	fn string(&mut self, quote: char) -> Result<String> {
		let start = self.position;
		self.position += 1;
		let mut text = String::new();
		let mut chars = self.source[self.position..].char_indices();
		while let Some((i, c)) = chars.next() {
			match c {
				'\\' => match chars.next() {
					Some((_, escaped)) => text.push(escaped),
					None => break,
				},
				c if c == quote => {
					self.position += i + 1;
					return Ok(text);
				}
				c => text.push(c),
			}
		}
		Err(self.error(start, "unterminated string"))
	}
}

struct Parser<'a> {
	source: &'a str,
	tokens: Vec<(usize, Token)>,
	next: usize,
}

impl<'a> Parser<'a> {
	fn error(&self, reason: impl Into<String>) -> Error {
		Error::Expression {
			source_text: self.source.to_owned(),
			position: self.tokens.get(self.next).map_or(self.source.len(), |(position, _)| *position),
			reason: reason.into(),
		}
	}

	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.next).map(|(_, token)| token)
	}

	fn eat(&mut self, punct: &str) -> bool {
		if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
			self.next += 1;
			true
		} else {
			false
		}
	}

	fn expect(&mut self, punct: &str) -> Result<()> {
		if self.eat(punct) {
			Ok(())
		} else {
			Err(self.error(format!("expected `{}`", punct)))
		}
	}

	fn name(&mut self) -> Result<String> {
		match self.peek().cloned() {
			Some(Token::Name(name)) => {
				self.next += 1;
				Ok(name)
			}
			_ => Err(self.error("expected a name")),
		}
	}

	fn expr(&mut self) -> Result<Expr> {
		let condition = self.binary(0)?;
		if self.eat("?") {
			let then = self.expr()?;
			self.expect(":")?;
			let otherwise = self.expr()?;
			return Ok(Expr::Ternary(Box::new(condition), Box::new(then), Box::new(otherwise)));
		}
		Ok(condition)
	}

	/// Precedence climbing over `||`, `&&`, comparisons and sums, loosest first.
	fn binary(&mut self, level: usize) -> Result<Expr> {
		const LEVELS: [&[(&str, BinaryOp)]; 4] = [
			&[("||", BinaryOp::Or)],
			&[("&&", BinaryOp::And)],
			&[
				("===", BinaryOp::Eq),
				("!==", BinaryOp::Ne),
				("==", BinaryOp::Eq),
				("!=", BinaryOp::Ne),
				("<=", BinaryOp::Le),
				(">=", BinaryOp::Ge),
				("<", BinaryOp::Lt),
				(">", BinaryOp::Gt),
			],
			&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
		];
		let operators = match LEVELS.get(level) {
			Some(operators) => *operators,
			None => return self.unary(),
		};
		let mut left = self.binary(level + 1)?;
		loop {
			let op = operators.iter().find(|(punct, _)| self.eat(punct)).map(|&(_, op)| op);
			match op {
				Some(op) => {
					let right = self.binary(level + 1)?;
					left = Expr::Binary(Box::new(left), op, Box::new(right));
					// Comparisons don't chain.
					if LEVELS[level][0].1 == BinaryOp::Eq {
						return Ok(left);
					}
				}
				None => return Ok(left),
			}
		}
	}

	fn unary(&mut self) -> Result<Expr> {
		if self.eat("!") {
			return Ok(Expr::Not(Box::new(self.unary()?)));
		}
		if self.eat("-") {
			return Ok(match self.unary()? {
				Expr::Literal(Value::Number(n)) => Expr::Literal(Value::Number(-n)),
				other => Expr::Negate(Box::new(other)),
			});
		}
		self.primary()
	}

	fn primary(&mut self) -> Result<Expr> {
		let token = self.peek().cloned().ok_or_else(|| self.error("unexpected end of expression"))?;
		match token {
			Token::Number(n) => {
				self.next += 1;
				Ok(Expr::Literal(Value::Number(n)))
			}
			Token::String(s) => {
				self.next += 1;
				Ok(Expr::Literal(Value::String(s)))
			}
			Token::Punct("(") => {
				self.next += 1;
				let inner = self.expr()?;
				self.expect(")")?;
				Ok(inner)
			}
			Token::Punct("{") => self.object(),
			Token::Name(name) => {
				self.next += 1;
				match name.as_str() {
					"true" => return Ok(Expr::Literal(Value::Boolean(true))),
					"false" => return Ok(Expr::Literal(Value::Boolean(false))),
					"null" | "undefined" => return Ok(Expr::Literal(Value::Null)),
					_ => {}
				}
				if self.eat("(") {
					let mut args = Vec::new();
					if !self.eat(")") {
						loop {
							args.push(self.expr()?);
							if self.eat(")") {
								break;
							}
							self.expect(",")?;
						}
					}
					return Ok(Expr::Call(name, args));
				}
				let mut path = vec![name];
				while self.eat(".") {
					path.push(self.name()?);
				}
				if path[0] == "this" {
					path.remove(0);
					if path.is_empty() {
						return Err(self.error("`this` must be followed by a property"));
					}
					// `this.method(...)`
					if path.len() == 1 && matches!(self.peek(), Some(Token::Punct("("))) {
						self.next -= 1;
						return self.primary();
					}
				}
				Ok(Expr::Path(path))
			}
			Token::Punct(punct) => Err(self.error(format!("unexpected `{}`", punct))),
		}
	}

	fn object(&mut self) -> Result<Expr> {
		self.expect("{")?;
		let mut entries = Vec::new();
		while !self.eat("}") {
			let key = match self.peek().cloned() {
				Some(Token::Name(name)) => name,
				Some(Token::String(s)) => s,
				_ => return Err(self.error("expected a key")),
			};
			self.next += 1;
			self.expect(":")?;
			entries.push((key, self.expr()?));
			if !self.eat(",") {
				self.expect("}")?;
				break;
			}
		}
		Ok(Expr::Object(entries))
	}
}

/// Parses an expression. Names aren't resolved yet, see [`Expr::check`].
///
/// # Errors
///
/// [`Error::Expression`] with the byte position of the problem.
pub fn parse(source: &str) -> Result<Expr> {
	let tokens = Lexer { source, position: 0 }.tokens()?;
	let mut parser = Parser { source, tokens, next: 0 };
	let expr = parser.expr()?;
	if parser.next < parser.tokens.len() {
		return Err(parser.error("unexpected trailing input"));
	}
	Ok(expr)
}

fn loose_number(value: &Value) -> Option<f64> {
	match value {
		&Value::Number(n) => Some(n),
		&Value::Boolean(b) => Some(if b { 1.0 } else { 0.0 }),
		Value::String(s) if s.trim().is_empty() => Some(0.0),
		Value::String(s) => parse_locale_number(s),
		Value::Null => Some(0.0),
		_ => None,
	}
}

fn loose_eq(left: &Value, right: &Value) -> bool {
	match (left, right) {
		(Value::Null, other) | (other, Value::Null) => other.is_null(),
		(Value::String(_), Value::Number(_) | Value::Boolean(_)) | (Value::Number(_) | Value::Boolean(_), Value::String(_)) => {
			match (loose_number(left), loose_number(right)) {
				(Some(a), Some(b)) => a == b,
				_ => false,
			}
		}
		_ => left == right,
	}
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
	match (left, right) {
		(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
		_ => loose_number(left)?.partial_cmp(&loose_number(right)?),
	}
}

impl Expr {
	/// Property names the expression reads, in order of first appearance.
	///
	/// Methods may read anything, so an expression calling one depends on every property.
	#[must_use]
	pub fn dependencies(&self, model: &Model) -> Vec<String> {
		let mut names = Vec::new();
		let mut calls = false;
		self.visit(&mut |expr| match expr {
			Expr::Path(path) if path[0] != model.class_name() && !names.contains(&path[0]) => names.push(path[0].clone()),
			Expr::Call(..) => calls = true,
			_ => {}
		});
		if calls {
			return model.keys();
		}
		names
	}

	fn visit(&self, f: &mut impl FnMut(&Expr)) {
		f(self);
		match self {
			Expr::Literal(_) | Expr::Path(_) => {}
			Expr::Call(_, args) => {
				for arg in args {
					arg.visit(f);
				}
			}
			Expr::Not(inner) | Expr::Negate(inner) => inner.visit(f),
			Expr::Binary(left, _, right) => {
				left.visit(f);
				right.visit(f);
			}
			Expr::Ternary(condition, then, otherwise) => {
				condition.visit(f);
				then.visit(f);
				otherwise.visit(f);
			}
			Expr::Object(entries) => {
				for (_, value) in entries {
					value.visit(f);
				}
			}
		}
	}

	/// Rejects names that are neither declared properties, registered methods nor the class's statics.
	///
	/// # Errors
	///
	/// [`Error::Expression`] naming the first unknown identifier.
	pub fn check(&self, model: &Model, source: &str) -> Result<()> {
		let mut unknown = None;
		self.visit(&mut |expr| {
			if unknown.is_some() {
				return;
			}
			match expr {
				Expr::Path(path) if path[0] == model.class_name() => {
					if path.len() != 2 || model.class().static_value(&path[1]).is_none() {
						unknown = Some(path.join("."));
					}
				}
				Expr::Path(path) if model.declared_type(&path[0]).is_none() => unknown = Some(path[0].clone()),
				Expr::Call(name, _) if model.class().method(name).is_none() => unknown = Some(format!("{}()", name)),
				_ => {}
			}
		});
		match unknown {
			Some(name) => Err(Error::Expression {
				source_text: source.to_owned(),
				position: source.find(name.trim_end_matches("()")).unwrap_or(0),
				reason: format!("unknown identifier `{}`", name),
			}),
			None => Ok(()),
		}
	}

	/// Evaluates against the instance's current state. Unknown names evaluate to `null`.
	#[must_use]
	pub fn eval(&self, model: &Model) -> Value {
		match self {
			Expr::Literal(value) => value.clone(),
			Expr::Path(path) => {
				let (root, fields) = match path.split_first() {
					Some(split) => split,
					None => return Value::Null,
				};
				let mut value = if root == model.class_name() {
					match fields.split_first() {
						Some((name, rest)) => {
							let value = model.class().static_value(name).cloned().unwrap_or_default();
							return rest.iter().fold(value, |value, field| value.field(field).unwrap_or_default());
						}
						None => Value::Null,
					}
				} else {
					model.get(root).unwrap_or_default()
				};
				for field in fields {
					value = value.field(field).unwrap_or_default();
				}
				value
			}
			Expr::Call(name, args) => {
				let args: Vec<Value> = args.iter().map(|arg| arg.eval(model)).collect();
				model.call(name, &args).unwrap_or_default()
			}
			Expr::Not(inner) => Value::Boolean(!inner.eval(model).is_truthy()),
			Expr::Negate(inner) => Value::Number(-loose_number(&inner.eval(model)).unwrap_or(f64::NAN)),
			Expr::Binary(left, op, right) => {
				let left = left.eval(model);
				match op {
					BinaryOp::Or if left.is_truthy() => left,
					BinaryOp::And if !left.is_truthy() => left,
					BinaryOp::Or | BinaryOp::And => right.eval(model),
					op => {
						let right = right.eval(model);
						match op {
							BinaryOp::Eq => Value::Boolean(loose_eq(&left, &right)),
							BinaryOp::Ne => Value::Boolean(!loose_eq(&left, &right)),
							BinaryOp::Lt => Value::Boolean(compare(&left, &right) == Some(Ordering::Less)),
							BinaryOp::Le => Value::Boolean(matches!(compare(&left, &right), Some(Ordering::Less | Ordering::Equal))),
							BinaryOp::Gt => Value::Boolean(compare(&left, &right) == Some(Ordering::Greater)),
							BinaryOp::Ge => Value::Boolean(matches!(compare(&left, &right), Some(Ordering::Greater | Ordering::Equal))),
							BinaryOp::Add => match (&left, &right) {
								(Value::String(_), _) | (_, Value::String(_)) => {
									Value::String(format!("{}{}", left.to_display_string(), right.to_display_string()))
								}
								_ => Value::Number(loose_number(&left).unwrap_or(f64::NAN) + loose_number(&right).unwrap_or(f64::NAN)),
							},
							_ => Value::Number(loose_number(&left).unwrap_or(f64::NAN) - loose_number(&right).unwrap_or(f64::NAN)),
						}
					}
				}
			}
			Expr::Ternary(condition, then, otherwise) => {
				if condition.eval(model).is_truthy() {
					then.eval(model)
				} else {
					otherwise.eval(model)
				}
			}
			Expr::Object(entries) => Value::object(entries.iter().map(|(key, value)| (key.clone(), value.eval(model)))),
		}
	}
}

/// Parses `{ key: expr, ... }` into its entries, for `sg-attributes` and `sg-item-variables`.
///
/// # Errors
///
/// [`Error::Expression`] if `source` isn't an object literal.
pub fn parse_object(source: &str) -> Result<Vec<(String, Expr)>> {
	match parse(source)? {
		Expr::Object(entries) => Ok(entries),
		_ => Err(Error::Expression {
			source_text: source.to_owned(),
			position: 0,
			reason: "expected an object literal".to_owned(),
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{model::ModelClass, registry::Registry};
	use pretty_assertions::assert_eq;

	fn model() -> Model {
		let class = ModelClass::builder("Card")
			.default("count", 3)
			.default("title", "hello")
			.default("active", true)
			.static_value("LABEL", "Card label")
			.method("double", |model, _| Value::from(model.get("count").ok().and_then(|n| n.as_number()).unwrap_or(0.0) * 2.0))
			.method("suffix", |_, args| Value::from(format!("{}-x", args.first().map(Value::to_display_string).unwrap_or_default())))
			.build();
		Model::builder(&class).registry(Registry::new()).build().unwrap()
	}

	#[test]
	fn precedence() {
		let m = model();
		assert_eq!(parse("1 + 2 - 4 < 0 && !false").unwrap().eval(&m), Value::Boolean(true));
		assert_eq!(parse("count > 2 ? 'big' : 'small'").unwrap().eval(&m), Value::from("big"));
		assert!(parse("(count - 5) * 1").is_err());
		assert_eq!(parse("count-1").unwrap().eval(&m), Value::from(2.0));
		assert_eq!(parse("-count + 1").unwrap().eval(&m), Value::from(-2.0));
	}

	#[test]
	fn properties_methods_and_statics() {
		let m = model();
		assert_eq!(parse("this.count == '3'").unwrap().eval(&m), Value::Boolean(true));
		assert_eq!(parse("double()").unwrap().eval(&m), Value::from(6.0));
		assert_eq!(parse("this.suffix(title)").unwrap().eval(&m), Value::from("hello-x"));
		assert_eq!(parse("Card.LABEL").unwrap().eval(&m), Value::from("Card label"));
	}

	#[test]
	fn object_literals() {
		let m = model();
		let entries = parse_object("{ 'is-big': count >= 3, small-print: !active, $x: -123.45, }").unwrap();
		let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
		assert_eq!(keys, vec!["is-big", "small-print", "$x"]);
		assert_eq!(entries[0].1.eval(&m), Value::Boolean(true));
		assert_eq!(entries[1].1.eval(&m), Value::Boolean(false));
		assert_eq!(entries[2].1.eval(&m), Value::from(-123.45));
		assert!(parse_object("count").is_err());
	}

	#[test]
	fn unknown_identifiers_are_rejected() {
		let m = model();
		for source in ["window.location", "constructor", "eval('1')", "Card.nothing", "active && document"] {
			let expr = parse(source).unwrap();
			assert!(expr.check(&m, source).is_err(), "{}", source);
		}
		let source = "active && count > 1 || double() == 6";
		let expr = parse(source).unwrap();
		expr.check(&m, source).unwrap();
		assert_eq!(expr.dependencies(&m), vec!["count", "title", "active"]);
		assert_eq!(parse("active && count > 1").unwrap().dependencies(&m), vec!["active", "count"]);
	}

	#[test]
	fn syntax_errors_carry_positions() {
		match parse("count > ") {
			Err(Error::Expression { position, .. }) => assert_eq!(position, 8),
			other => panic!("{:?}", other),
		}
		assert!(parse("'open").is_err());
		assert!(parse("a ; b").is_err());
	}
}

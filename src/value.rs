//! Dynamic property values.
//!
//! Container variants are shared handles: assigning a new shape to a container-typed property patches the
//! existing container in place, so every handle captured earlier observes the update.
//! Treat a handle like an index into an arena slot, not like a snapshot.

use crate::{model::Model, utils::coerce::number_to_string};
use num_traits::ToPrimitive;
use core::{
	cell::RefCell,
	fmt::{self, Debug, Display, Formatter},
};
use serde::{
	ser::{SerializeMap, SerializeSeq},
	Serialize, Serializer,
};
use std::{collections::BTreeMap, rc::Rc};

pub type Shared<T> = Rc<RefCell<T>>;
pub type Object = BTreeMap<String, Value>;

#[must_use]
pub fn shared<T>(value: T) -> Shared<T> {
	Rc::new(RefCell::new(value))
}

/// A coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Xy {
	pub x: f64,
	pub y: f64,
}

/// An opaque callable stored in a `FUNCTION`-typed property.
#[derive(Clone)]
pub struct Function(Rc<dyn Fn(&[Value]) -> Value>);
impl Function {
	pub fn new(f: impl 'static + Fn(&[Value]) -> Value) -> Self {
		Self(Rc::new(f))
	}

	pub fn call(&self, args: &[Value]) -> Value {
		(self.0)(args)
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Debug for Function {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Function({:p})", Rc::as_ptr(&self.0))
	}
}

#[derive(Clone)]
pub enum Value {
	/// Both `null` and "no value yet".
	Null,
	Number(f64),
	String(String),
	Boolean(bool),
	Function(Function),
	Xy(Shared<Xy>),
	Object(Shared<Object>),
	Array(Shared<Vec<Value>>),
	/// Insertion-ordered, unique by [`Value::same`].
	Set(Shared<Vec<Value>>),
	/// Insertion-ordered, keys unique by [`Value::same`].
	Map(Shared<Vec<(Value, Value)>>),
	Model(Model),
}

impl Value {
	#[must_use]
	pub fn xy(x: f64, y: f64) -> Self {
		Self::Xy(shared(Xy { x, y }))
	}

	pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
		Self::Array(shared(items.into_iter().map(Into::into).collect()))
	}

	pub fn object<K: Into<String>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
		Self::Object(shared(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect()))
	}

	pub fn set<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
		let mut unique: Vec<Value> = Vec::new();
		for item in items {
			let item = item.into();
			if !unique.iter().any(|existing| existing.same(&item)) {
				unique.push(item);
			}
		}
		Self::Set(shared(unique))
	}

	pub fn map<K: Into<Value>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
		let mut unique: Vec<(Value, Value)> = Vec::new();
		for (key, value) in entries {
			let (key, value) = (key.into(), value.into());
			match unique.iter_mut().find(|(k, _)| k.same(&key)) {
				Some(slot) => slot.1 = value,
				None => unique.push((key, value)),
			}
		}
		Self::Map(shared(unique))
	}

	/// A short, value-free description of the variant, suitable for error messages.
	#[must_use]
	pub fn kind_name(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Number(_) => "a number",
			Value::String(_) => "a string",
			Value::Boolean(_) => "a boolean",
			Value::Function(_) => "a function",
			Value::Xy(_) => "an xy pair",
			Value::Object(_) => "an object",
			Value::Array(_) => "an array",
			Value::Set(_) => "a set",
			Value::Map(_) => "a map",
			Value::Model(_) => "a model",
		}
	}

	#[must_use]
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	#[must_use]
	pub fn as_number(&self) -> Option<f64> {
		match *self {
			Value::Number(n) => Some(n),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match *self {
			Value::Boolean(b) => Some(b),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_model(&self) -> Option<&Model> {
		match self {
			Value::Model(model) => Some(model),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_array(&self) -> Option<&Shared<Vec<Value>>> {
		match self {
			Value::Array(array) => Some(array),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_object(&self) -> Option<&Shared<Object>> {
		match self {
			Value::Object(object) => Some(object),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_set(&self) -> Option<&Shared<Vec<Value>>> {
		match self {
			Value::Set(set) => Some(set),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_map(&self) -> Option<&Shared<Vec<(Value, Value)>>> {
		match self {
			Value::Map(map) => Some(map),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_xy(&self) -> Option<Xy> {
		match self {
			Value::Xy(xy) => Some(*xy.borrow()),
			_ => None,
		}
	}

	/// Strict identity: scalars compare by value (`NaN` equals itself), containers, models and functions by handle.
	#[must_use]
	pub fn same(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Boolean(a), Value::Boolean(b)) => a == b,
			(Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
			(Value::Xy(a), Value::Xy(b)) => Rc::ptr_eq(a, b),
			(Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
			(Value::Array(a), Value::Array(b)) | (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
			(Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
			(Value::Model(a), Value::Model(b)) => a.ptr_eq(b),
			_ => false,
		}
	}

	#[must_use]
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			&Value::Number(n) => n != 0.0 && !n.is_nan(),
			Value::String(s) => !s.is_empty(),
			&Value::Boolean(b) => b,
			_ => true,
		}
	}

	/// Reads a named field of an object, model or xy pair.
	#[must_use]
	pub fn field(&self, name: &str) -> Option<Value> {
		match self {
			Value::Object(object) => object.borrow().get(name).cloned(),
			Value::Model(model) => model.get(name).ok(),
			Value::Xy(xy) => match name {
				"x" => Some(Value::Number(xy.borrow().x)),
				"y" => Some(Value::Number(xy.borrow().y)),
				_ => None,
			},
			_ => None,
		}
	}

	/// Renders the value for display in the DOM. `null` renders as nothing.
	#[must_use]
	pub fn to_display_string(&self) -> String {
		match self {
			Value::Null => String::new(),
			other => other.to_string(),
		}
	}

	#[must_use]
	pub fn to_json(&self) -> serde_json::Value {
		serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
	}

	/// Converts parsed JSON into fresh (unshared) values.
	#[must_use]
	pub fn from_json(json: &serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Value::Null,
			&serde_json::Value::Bool(b) => Value::Boolean(b),
			serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
			serde_json::Value::String(s) => Value::String(s.clone()),
			serde_json::Value::Array(items) => Value::array(items.iter().map(Value::from_json)),
			serde_json::Value::Object(entries) => Value::object(entries.iter().map(|(k, v)| (k.clone(), Value::from_json(v)))),
		}
	}
}

impl Default for Value {
	fn default() -> Self {
		Value::Null
	}
}

/// Structural equality. Containers are compared by content, which does not terminate for cyclic values.
impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		if self.same(other) {
			return true;
		}
		match (self, other) {
			(Value::Xy(a), Value::Xy(b)) => *a.borrow() == *b.borrow(),
			(Value::Object(a), Value::Object(b)) => *a.borrow() == *b.borrow(),
			(Value::Array(a), Value::Array(b)) | (Value::Set(a), Value::Set(b)) => *a.borrow() == *b.borrow(),
			(Value::Map(a), Value::Map(b)) => *a.borrow() == *b.borrow(),
			_ => false,
		}
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("Null"),
			Value::Number(n) => write!(f, "Number({})", n),
			Value::String(s) => write!(f, "String({:?})", s),
			Value::Boolean(b) => write!(f, "Boolean({})", b),
			Value::Function(function) => function.fmt(f),
			Value::Xy(xy) => write!(f, "Xy({:?})", xy.borrow()),
			Value::Object(object) => f.debug_map().entries(object.borrow().iter()).finish(),
			Value::Array(array) => f.debug_list().entries(array.borrow().iter()).finish(),
			Value::Set(set) => f.debug_set().entries(set.borrow().iter()).finish(),
			Value::Map(map) => f.debug_map().entries(map.borrow().iter().map(|(k, v)| (k, v))).finish(),
			Value::Model(model) => model.fmt(f),
		}
	}
}

/// Mirrors ECMAScript `String(value)`.
impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("null"),
			&Value::Number(n) => f.write_str(&number_to_string(n)),
			Value::String(s) => f.write_str(s),
			Value::Boolean(b) => write!(f, "{}", b),
			Value::Function(_) => f.write_str("function"),
			Value::Xy(_) | Value::Object(_) => f.write_str("[object Object]"),
			Value::Array(array) => {
				for (i, item) in array.borrow().iter().enumerate() {
					if i > 0 {
						f.write_str(",")?;
					}
					f.write_str(&item.to_display_string())?;
				}
				Ok(())
			}
			Value::Set(_) => f.write_str("[object Set]"),
			Value::Map(_) => f.write_str("[object Map]"),
			Value::Model(model) => write!(f, "[object {}]", model.class_name()),
		}
	}
}

/// Sets serialize as arrays, maps as arrays of `[key, value]` pairs and models as their data.
impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Value::Null | Value::Function(_) => serializer.serialize_unit(),
			&Value::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => match n.to_i64() {
				Some(n) => serializer.serialize_i64(n),
				None => serializer.serialize_f64(n),
			},
			&Value::Number(n) => serializer.serialize_f64(n),
			Value::String(s) => serializer.serialize_str(s),
			&Value::Boolean(b) => serializer.serialize_bool(b),
			Value::Xy(xy) => xy.borrow().serialize(serializer),
			Value::Object(object) => {
				let object = object.borrow();
				let mut map = serializer.serialize_map(Some(object.len()))?;
				for (k, v) in object.iter() {
					map.serialize_entry(k, v)?;
				}
				map.end()
			}
			Value::Array(items) | Value::Set(items) => {
				let items = items.borrow();
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items.iter() {
					seq.serialize_element(item)?;
				}
				seq.end()
			}
			Value::Map(entries) => {
				let entries = entries.borrow();
				let mut seq = serializer.serialize_seq(Some(entries.len()))?;
				for (k, v) in entries.iter() {
					seq.serialize_element(&(k, v))?;
				}
				seq.end()
			}
			Value::Model(model) => model.get_data().serialize(serializer),
		}
	}
}

impl From<f64> for Value {
	fn from(n: f64) -> Self {
		Value::Number(n)
	}
}
impl From<i32> for Value {
	fn from(n: i32) -> Self {
		Value::Number(n.into())
	}
}
impl From<u32> for Value {
	fn from(n: u32) -> Self {
		Value::Number(n.into())
	}
}
impl From<usize> for Value {
	fn from(n: usize) -> Self {
		Value::Number(n.to_f64().unwrap_or(f64::NAN))
	}
}
impl From<i64> for Value {
	fn from(n: i64) -> Self {
		Value::Number(n.to_f64().unwrap_or(f64::NAN))
	}
}
impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Boolean(b)
	}
}
impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_owned())
	}
}
impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s)
	}
}
impl From<Vec<Value>> for Value {
	fn from(items: Vec<Value>) -> Self {
		Value::Array(shared(items))
	}
}
impl From<Xy> for Value {
	fn from(xy: Xy) -> Self {
		Value::Xy(shared(xy))
	}
}
impl From<Model> for Value {
	fn from(model: Model) -> Self {
		Value::Model(model)
	}
}
impl From<Function> for Value {
	fn from(function: Function) -> Self {
		Value::Function(function)
	}
}
impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Value::Null, Into::into)
	}
}

//! Property type tags.

use crate::{error::Error, value::Value};
use core::{
	fmt::{self, Display, Formatter},
	str::FromStr,
};

/// The declared type of a model property.
///
/// Complex types are updated through an in-place structural diff, so handles to the container stay valid.
/// Simple types are replaced whenever the new value isn't [the same](`Value::same`) as the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
	Any,
	Number,
	String,
	Boolean,
	Function,
	Xy,
	Object,
	Array,
	ArrayNumbers,
	Set,
	Map,
	Model,
	ArrayModel,
}

impl TypeTag {
	pub const ALL: [TypeTag; 13] = [
		TypeTag::Any,
		TypeTag::Number,
		TypeTag::String,
		TypeTag::Boolean,
		TypeTag::Function,
		TypeTag::Xy,
		TypeTag::Object,
		TypeTag::Array,
		TypeTag::ArrayNumbers,
		TypeTag::Set,
		TypeTag::Map,
		TypeTag::Model,
		TypeTag::ArrayModel,
	];

	#[must_use]
	pub fn is_complex(self) -> bool {
		matches!(
			self,
			TypeTag::Xy | TypeTag::Object | TypeTag::Array | TypeTag::ArrayNumbers | TypeTag::Set | TypeTag::Map | TypeTag::ArrayModel
		)
	}

	/// Whether [`Model::add_to`](`crate::Model::add_to`) and [`Model::remove_from`](`crate::Model::remove_from`) apply.
	#[must_use]
	pub fn is_collection(self) -> bool {
		self.is_complex() && self != TypeTag::Xy
	}

	/// Whether values of this type hold nested instances that the property owns.
	#[must_use]
	pub fn owns_models(self) -> bool {
		matches!(self, TypeTag::Model | TypeTag::ArrayModel)
	}

	/// A fresh zero value. Containers are newly allocated on each call.
	#[must_use]
	pub fn default_value(self) -> Value {
		match self {
			TypeTag::Any | TypeTag::Function | TypeTag::Model => Value::Null,
			TypeTag::Number => Value::Number(0.0),
			TypeTag::String => Value::String(String::new()),
			TypeTag::Boolean => Value::Boolean(false),
			TypeTag::Xy => Value::xy(0.0, 0.0),
			TypeTag::Object => Value::object::<String, Value>([]),
			TypeTag::Array | TypeTag::ArrayNumbers | TypeTag::ArrayModel => Value::array::<Value>([]),
			TypeTag::Set => Value::set::<Value>([]),
			TypeTag::Map => Value::map::<Value, Value>([]),
		}
	}

	/// Picks the best-matching tag for a raw value.
	#[must_use]
	pub fn infer(value: &Value) -> Self {
		match value {
			Value::Null => TypeTag::Any,
			Value::Number(_) => TypeTag::Number,
			Value::String(_) => TypeTag::String,
			Value::Boolean(_) => TypeTag::Boolean,
			Value::Function(_) => TypeTag::Function,
			Value::Model(_) => TypeTag::Model,
			Value::Xy(_) => TypeTag::Xy,
			Value::Array(items) => match items.borrow().first() {
				Some(Value::Model(_)) => TypeTag::ArrayModel,
				_ => TypeTag::Array,
			},
			Value::Set(_) => TypeTag::Set,
			Value::Map(_) => TypeTag::Map,
			Value::Object(object) => {
				let object = object.borrow();
				if object.len() == 2 && object.contains_key("x") && object.contains_key("y") {
					TypeTag::Xy
				} else {
					TypeTag::Object
				}
			}
		}
	}

	#[must_use]
	pub fn name(self) -> &'static str {
		match self {
			TypeTag::Any => "any",
			TypeTag::Number => "number",
			TypeTag::String => "string",
			TypeTag::Boolean => "boolean",
			TypeTag::Function => "function",
			TypeTag::Xy => "xy",
			TypeTag::Object => "object",
			TypeTag::Array => "array",
			TypeTag::ArrayNumbers => "array_numbers",
			TypeTag::Set => "set",
			TypeTag::Map => "map",
			TypeTag::Model => "model",
			TypeTag::ArrayModel => "array_model",
		}
	}
}

impl Display for TypeTag {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.name().to_ascii_uppercase())
	}
}

impl FromStr for TypeTag {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
		TypeTag::ALL
			.iter()
			.copied()
			.find(|tag| tag.name() == normalized)
			.ok_or_else(|| Error::UnknownType(s.to_owned()))
	}
}

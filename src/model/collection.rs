use super::{validate::coerce_number, Model};
use crate::{
	error::{Error, Result},
	flags::Flags,
	types::TypeTag,
	utils::number_to_string,
	value::Value,
};
use core::fmt::{self, Display, Formatter};
use num_traits::ToPrimitive;
use tracing::trace_span;

/// Addresses one entry of a collection property.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKey {
	/// A position in an array.
	Index(usize),
	/// Matches the `id` field of array elements.
	Id(i64),
	/// Matches the `uuid`, `code` or `hash` field of array elements, in that order, or an object key.
	Text(String),
	/// A set member or map key.
	Value(Value),
}

impl From<usize> for ItemKey {
	fn from(index: usize) -> Self {
		Self::Index(index)
	}
}
impl From<i64> for ItemKey {
	fn from(id: i64) -> Self {
		Self::Id(id)
	}
}
impl From<&str> for ItemKey {
	fn from(text: &str) -> Self {
		Self::Text(text.to_owned())
	}
}
impl From<String> for ItemKey {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}
impl From<Value> for ItemKey {
	fn from(value: Value) -> Self {
		Self::Value(value)
	}
}

impl Display for ItemKey {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			ItemKey::Index(index) => write!(f, "index {}", index),
			ItemKey::Id(id) => write!(f, "id {}", id),
			ItemKey::Text(text) => write!(f, "{:?}", text),
			ItemKey::Value(value) => write!(f, "{:?}", value),
		}
	}
}

impl ItemKey {
	/// As an object key.
	fn to_field_name(&self) -> String {
		match self {
			ItemKey::Index(index) => index.to_string(),
			ItemKey::Id(id) => id.to_string(),
			ItemKey::Text(text) => text.clone(),
			ItemKey::Value(Value::Number(n)) => number_to_string(*n),
			ItemKey::Value(value) => value.to_display_string(),
		}
	}

	/// As a set member or map key.
	fn to_value(&self) -> Value {
		match self {
			&ItemKey::Index(index) => Value::from(index),
			&ItemKey::Id(id) => Value::from(id),
			ItemKey::Text(text) => Value::String(text.clone()),
			ItemKey::Value(value) => value.clone(),
		}
	}
}

/// The fields a [`ItemKey::Text`] is matched against, by priority.
pub(crate) const TEXT_KEY_FIELDS: [&str; 3] = ["uuid", "code", "hash"];

fn position_of(items: &[Value], key: &ItemKey) -> Option<usize> {
	match key {
		&ItemKey::Index(index) => (index < items.len()).then(|| index),
		&ItemKey::Id(id) => items
			.iter()
			.position(|item| item.field("id").and_then(|id| id.as_number()) == id.to_f64()),
		ItemKey::Text(text) => TEXT_KEY_FIELDS.iter().find_map(|field| {
			items
				.iter()
				.position(|item| item.field(field).map_or(false, |value| value.as_str() == Some(text.as_str())))
		}),
		ItemKey::Value(value) => items.iter().position(|item| item.same(value)),
	}
}

fn is_record(value: &Value) -> bool {
	matches!(value, Value::Object(_) | Value::Model(_))
}

impl Model {
	fn collection(&self, name: &str) -> Result<(TypeTag, Value)> {
		let ty = self.resolve_type(name, None)?;
		if !ty.is_collection() {
			return Err(Error::NotACollection { name: name.to_owned(), ty });
		}
		let current = self.get(name)?;
		if !current.is_null() {
			return Ok((ty, current));
		}
		// Adding to a collection that was never set creates it.
		let fresh = ty.default_value();
		self.state_mut()?.data.insert(name.to_owned(), fresh.clone());
		Ok((ty, fresh))
	}

	fn key_mismatch(name: &str, key: &ItemKey) -> Error {
		Error::KeyMismatch {
			name: name.to_owned(),
			key: key.to_string(),
		}
	}

	/// Inserts into a collection property in place.
	///
	/// - arrays append, or insert at [`ItemKey::Index`],
	/// - objects assign by key, which is required,
	/// - sets add unless already present,
	/// - maps upsert by key, which is required.
	///
	/// Returns whether the collection changed.
	///
	/// # Errors
	///
	/// [`Error::NotACollection`], [`Error::KeyMismatch`], element validation errors, and the errors of [`set`](`Model::set`).
	pub fn add_to(&self, name: &str, value: impl Into<Value>, key: Option<ItemKey>, flags: Flags) -> Result<bool> {
		let value = value.into();
		let span = trace_span!("add_to", class = self.class_name(), property = name);
		let _enter = span.enter();

		let (ty, collection) = self.collection(name)?;
		let changed = match (&collection, ty) {
			(Value::Array(items), TypeTag::Array | TypeTag::ArrayNumbers | TypeTag::ArrayModel) => {
				let value = match ty {
					TypeTag::ArrayNumbers => coerce_number(name, ty, value)?,
					TypeTag::ArrayModel if !matches!(value, Value::Model(_)) => {
						return Err(Error::TypeMismatch {
							name: name.to_owned(),
							ty,
							found: value.kind_name(),
						})
					}
					_ => value,
				};
				let mut items = items.borrow_mut();
				match key {
					None => items.push(value),
					Some(ItemKey::Index(index)) => {
						let index = index.min(items.len());
						items.insert(index, value);
					}
					Some(key) => return Err(Self::key_mismatch(name, &key)),
				}
				true
			}
			(Value::Object(object), TypeTag::Object) => {
				let key = key.ok_or_else(|| Self::key_mismatch(name, &ItemKey::Value(Value::Null)))?;
				let mut object = object.borrow_mut();
				let field = key.to_field_name();
				match object.get(&field) {
					Some(existing) if existing.same(&value) => false,
					_ => {
						object.insert(field, value);
						true
					}
				}
			}
			(Value::Set(members), TypeTag::Set) => {
				let mut members = members.borrow_mut();
				if members.iter().any(|member| member.same(&value)) {
					false
				} else {
					members.push(value);
					true
				}
			}
			(Value::Map(entries), TypeTag::Map) => {
				let key = key.ok_or_else(|| Self::key_mismatch(name, &ItemKey::Value(Value::Null)))?.to_value();
				let mut entries = entries.borrow_mut();
				match entries.iter_mut().find(|(k, _)| k.same(&key)) {
					Some(slot) if slot.1.same(&value) => false,
					Some(slot) => {
						slot.1 = value;
						true
					}
					None => {
						entries.push((key, value));
						true
					}
				}
			}
			_ => return Err(Error::NotACollection { name: name.to_owned(), ty }),
		};

		self.mark_changed(&mut *self.state_mut()?, name, changed);
		self.changed_and_callbacks(name, &collection, Some(&collection), changed, flags)
	}

	/// Removes an entry from a collection property in place.
	///
	/// Arrays accept an index, an [`ItemKey::Id`] or an [`ItemKey::Text`] (the latter two only if the elements are
	/// objects or instances) or the element itself. Removed instances of `ARRAY_MODEL` properties are destroyed
	/// unless [`Flags::NO_DESTROY`] is set.
	///
	/// Returns whether anything was removed.
	///
	/// # Errors
	///
	/// [`Error::NotACollection`], [`Error::KeyMismatch`], and the errors of [`set`](`Model::set`).
	pub fn remove_from(&self, name: &str, key: impl Into<ItemKey>, flags: Flags) -> Result<bool> {
		let key = key.into();
		let span = trace_span!("remove_from", class = self.class_name(), property = name);
		let _enter = span.enter();

		let (ty, collection) = self.collection(name)?;
		let mut released = None;
		let changed = match &collection {
			Value::Array(items) => {
				let mut items = items.borrow_mut();
				if matches!(key, ItemKey::Id(_) | ItemKey::Text(_)) && items.first().map_or(false, |first| !is_record(first)) {
					return Err(Self::key_mismatch(name, &key));
				}
				match position_of(&items, &key) {
					Some(position) => {
						let removed = items.remove(position);
						if ty == TypeTag::ArrayModel {
							released = removed.as_model().cloned();
						}
						true
					}
					None => false,
				}
			}
			Value::Object(object) => match key {
				ItemKey::Text(_) | ItemKey::Index(_) | ItemKey::Id(_) => object.borrow_mut().remove(&key.to_field_name()).is_some(),
				ItemKey::Value(_) => return Err(Self::key_mismatch(name, &key)),
			},
			Value::Set(members) => {
				if let ItemKey::Index(_) = key {
					return Err(Self::key_mismatch(name, &key));
				}
				let key = key.to_value();
				let mut members = members.borrow_mut();
				let before = members.len();
				members.retain(|member| !member.same(&key));
				before != members.len()
			}
			Value::Map(entries) => {
				let key = key.to_value();
				let mut entries = entries.borrow_mut();
				let before = entries.len();
				entries.retain(|(k, _)| !k.same(&key));
				before != entries.len()
			}
			_ => return Err(Error::NotACollection { name: name.to_owned(), ty }),
		};

		self.mark_changed(&mut *self.state_mut()?, name, changed);
		if let (Some(model), false) = (released, flags.contains(Flags::NO_DESTROY)) {
			model.destroy();
		}
		self.changed_and_callbacks(name, &collection, Some(&collection), changed, flags)
	}

	/// How many entries a collection property holds. `null` counts as empty.
	///
	/// # Errors
	///
	/// [`Error::NotACollection`], [`Error::UndeclaredProperty`], [`Error::Destroyed`].
	pub fn size(&self, name: &str) -> Result<usize> {
		match self.get(name)? {
			Value::Null => Ok(0),
			Value::Array(items) | Value::Set(items) => Ok(items.borrow().len()),
			Value::Object(object) => Ok(object.borrow().len()),
			Value::Map(entries) => Ok(entries.borrow().len()),
			_ => Err(Error::NotACollection {
				name: name.to_owned(),
				ty: self.declared_type(name).unwrap_or(TypeTag::Any),
			}),
		}
	}

	/// Visits a snapshot of a collection property's entries as `(key, value)`.
	///
	/// Array keys are indices, set keys are the members themselves.
	///
	/// # Errors
	///
	/// See [`size`](`Model::size`).
	pub fn for_each(&self, name: &str, mut f: impl FnMut(&Value, &Value)) -> Result<()> {
		let entries: Vec<(Value, Value)> = match self.get(name)? {
			Value::Null => Vec::new(),
			Value::Array(items) => items.borrow().iter().enumerate().map(|(i, item)| (Value::from(i), item.clone())).collect(),
			Value::Set(members) => members.borrow().iter().map(|member| (member.clone(), member.clone())).collect(),
			Value::Object(object) => object.borrow().iter().map(|(k, v)| (Value::String(k.clone()), v.clone())).collect(),
			Value::Map(entries) => entries.borrow().clone(),
			_ => {
				return Err(Error::NotACollection {
					name: name.to_owned(),
					ty: self.declared_type(name).unwrap_or(TypeTag::Any),
				})
			}
		};
		for (key, value) in &entries {
			f(key, value);
		}
		Ok(())
	}
}

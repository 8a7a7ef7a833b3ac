//! Per-type coercion and in-place structural diffing.

use crate::{
	error::{Error, Result},
	flags::Flags,
	model::Model,
	types::TypeTag,
	utils::{deep_clone, number_to_string, parse_locale_number, parse_pg_array_value, parse_pg_str_array, to_boolean, PgElement},
	value::{shared, Object, Value, Xy},
};
use core::mem;

/// The outcome of [`validate_property`].
#[derive(Debug)]
pub struct Validated {
	/// What the store should hold now. For complex types this is usually the previous container, patched.
	pub value: Value,
	/// The previous value: a live handle, or a deep copy with [`Flags::CLONE_PREVIOUS`].
	pub previous: Value,
	pub changed: bool,
	/// Nested instances the property let go of. The caller destroys them unless [`Flags::NO_DESTROY`] is set.
	pub released: Vec<Model>,
}

/// Validates and coerces `next` for a property of type `ty`.
///
/// This doesn't touch any store, but complex types are patched into `previous` in place, so that
/// existing handles to the container observe the update.
///
/// # Errors
///
/// If `next` can't be coerced to `ty`.
pub fn validate_property(name: &str, next: Value, previous: Option<&Value>, ty: TypeTag, flags: Flags) -> Result<Validated> {
	let previous = previous.filter(|previous| !previous.is_null());
	let reported_previous = match previous {
		Some(previous) if flags.contains(Flags::CLONE_PREVIOUS) => deep_clone(previous),
		Some(previous) => previous.clone(),
		None => Value::Null,
	};

	let mismatch = |found: &Value| Error::TypeMismatch {
		name: name.to_owned(),
		ty,
		found: found.kind_name(),
	};

	let mut released = Vec::new();
	let (value, changed) = match ty {
		TypeTag::Any => replace(next, previous),
		TypeTag::Number => replace(coerce_number(name, ty, next)?, previous),
		TypeTag::String => replace(coerce_string(next), previous),
		TypeTag::Boolean => replace(to_boolean(&next).map_or(Value::Null, Value::Boolean), previous),
		TypeTag::Function => match next {
			Value::Null | Value::Function(_) => replace(next, previous),
			other => return Err(mismatch(&other)),
		},
		TypeTag::Model => match next {
			Value::Null | Value::Model(_) => {
				let (value, changed) = replace(next, previous);
				if changed {
					if let Some(Value::Model(previous)) = previous {
						released.push(previous.clone());
					}
				}
				(value, changed)
			}
			other => return Err(mismatch(&other)),
		},
		TypeTag::Xy => match next {
			Value::Null => replace(next, previous),
			next => {
				let xy = coerce_xy(name, ty, &next)?;
				match (previous, &next) {
					(Some(Value::Xy(previous)), Value::Xy(next)) if std::rc::Rc::ptr_eq(previous, next) => (Value::Xy(previous.clone()), false),
					(Some(Value::Xy(previous)), _) => {
						let mut slot = previous.borrow_mut();
						let changed = *slot != xy;
						*slot = xy;
						drop(slot);
						(Value::Xy(previous.clone()), changed)
					}
					_ => (Value::Xy(shared(xy)), true),
				}
			}
		},
		TypeTag::Array | TypeTag::ArrayNumbers | TypeTag::ArrayModel => match next {
			Value::Null => {
				if let Some(Value::Array(previous)) = previous {
					if ty == TypeTag::ArrayModel {
						released.extend(previous.borrow().iter().filter_map(|item| item.as_model().cloned()));
					}
				}
				replace(Value::Null, previous)
			}
			next => {
				if let (Some(Value::Array(previous)), Value::Array(next)) = (previous, &next) {
					if std::rc::Rc::ptr_eq(previous, next) {
						return Ok(Validated {
							value: Value::Array(previous.clone()),
							previous: reported_previous,
							changed: false,
							released,
						});
					}
				}
				let items = array_items(name, ty, next)?;
				match previous {
					Some(Value::Array(previous)) => {
						let mut slot = previous.borrow_mut();
						if ty == TypeTag::ArrayModel {
							released.extend(
								slot.iter()
									.filter_map(Value::as_model)
									.filter(|model| !items.iter().any(|item| item.as_model().map_or(false, |m| m.ptr_eq(model))))
									.cloned(),
							);
						}
						let changed = patch_vec(&mut slot, items);
						drop(slot);
						(Value::Array(previous.clone()), changed)
					}
					_ => (Value::Array(shared(items)), true),
				}
			}
		},
		TypeTag::Object => match next {
			Value::Null => replace(next, previous),
			next => {
				if let (Some(Value::Object(previous)), Value::Object(next)) = (previous, &next) {
					if std::rc::Rc::ptr_eq(previous, next) {
						return Ok(Validated {
							value: Value::Object(previous.clone()),
							previous: reported_previous,
							changed: false,
							released,
						});
					}
				}
				let entries = object_entries(name, ty, next)?;
				match previous {
					Some(Value::Object(previous)) => {
						let changed = patch_object(&mut previous.borrow_mut(), entries);
						(Value::Object(previous.clone()), changed)
					}
					_ => (Value::Object(shared(entries)), true),
				}
			}
		},
		TypeTag::Set => match next {
			Value::Null => replace(next, previous),
			next => {
				if let (Some(Value::Set(previous)), Value::Set(next)) = (previous, &next) {
					if std::rc::Rc::ptr_eq(previous, next) {
						return Ok(Validated {
							value: Value::Set(previous.clone()),
							previous: reported_previous,
							changed: false,
							released,
						});
					}
				}
				let members = set_members(name, ty, next)?;
				match previous {
					Some(Value::Set(previous)) => {
						let changed = patch_set(&mut previous.borrow_mut(), members);
						(Value::Set(previous.clone()), changed)
					}
					_ => (Value::Set(shared(members)), true),
				}
			}
		},
		TypeTag::Map => match next {
			Value::Null => replace(next, previous),
			next => {
				if let (Some(Value::Map(previous)), Value::Map(next)) = (previous, &next) {
					if std::rc::Rc::ptr_eq(previous, next) {
						return Ok(Validated {
							value: Value::Map(previous.clone()),
							previous: reported_previous,
							changed: false,
							released,
						});
					}
				}
				let entries = map_entries(name, ty, next)?;
				match previous {
					Some(Value::Map(previous)) => {
						let changed = patch_map(&mut previous.borrow_mut(), entries);
						(Value::Map(previous.clone()), changed)
					}
					_ => (Value::Map(shared(entries)), true),
				}
			}
		},
	};

	Ok(Validated {
		value,
		previous: reported_previous,
		changed,
		released,
	})
}

fn replace(next: Value, previous: Option<&Value>) -> (Value, bool) {
	let changed = match previous {
		Some(previous) => !previous.same(&next),
		None => !next.is_null(),
	};
	(next, changed)
}

pub(crate) fn coerce_number(name: &str, ty: TypeTag, value: Value) -> Result<Value> {
	match value {
		Value::Null | Value::Number(_) => Ok(value),
		Value::Boolean(b) => Ok(Value::Number(if b { 1.0 } else { 0.0 })),
		Value::String(text) => {
			if text.trim().is_empty() {
				return Ok(Value::Null);
			}
			parse_locale_number(&text).map(Value::Number).ok_or(Error::Unparsable {
				name: name.to_owned(),
				ty,
				input: text,
			})
		}
		other => Err(Error::TypeMismatch {
			name: name.to_owned(),
			ty,
			found: other.kind_name(),
		}),
	}
}

fn coerce_string(value: Value) -> Value {
	match value {
		Value::Null | Value::String(_) => value,
		Value::Number(n) => Value::String(number_to_string(n)),
		other => Value::String(other.to_string()),
	}
}

fn coerce_xy(name: &str, ty: TypeTag, value: &Value) -> Result<Xy> {
	let coordinate = |v: Option<Value>| -> Result<f64> {
		match coerce_number(name, ty, v.unwrap_or(Value::Null))? {
			Value::Number(n) => Ok(n),
			_ => Err(Error::TypeMismatch {
				name: name.to_owned(),
				ty,
				found: "an object without numeric `x` and `y`",
			}),
		}
	};
	match value {
		Value::Xy(xy) => Ok(*xy.borrow()),
		Value::Object(_) => Ok(Xy {
			x: coordinate(value.field("x"))?,
			y: coordinate(value.field("y"))?,
		}),
		Value::Number(_) | Value::String(_) => {
			let n = coordinate(Some(value.clone()))?;
			Ok(Xy { x: n, y: n })
		}
		other => Err(Error::TypeMismatch {
			name: name.to_owned(),
			ty,
			found: other.kind_name(),
		}),
	}
}

fn array_items(name: &str, ty: TypeTag, value: Value) -> Result<Vec<Value>> {
	let items: Vec<Value> = match value {
		Value::Array(items) | Value::Set(items) => items.borrow().clone(),
		Value::String(text) => match parse_pg_array_value(&text)? {
			Value::Array(items) => mem::take(&mut *items.borrow_mut()),
			_ => Vec::new(),
		},
		other => {
			return Err(Error::TypeMismatch {
				name: name.to_owned(),
				ty,
				found: other.kind_name(),
			})
		}
	};
	match ty {
		TypeTag::ArrayNumbers => items.into_iter().map(|item| coerce_number(name, ty, item)).collect(),
		TypeTag::ArrayModel => {
			if let Some(stray) = items.iter().find(|item| !matches!(item, Value::Model(_))) {
				return Err(Error::TypeMismatch {
					name: name.to_owned(),
					ty,
					found: stray.kind_name(),
				});
			}
			Ok(items)
		}
		_ => Ok(items),
	}
}

fn object_entries(name: &str, ty: TypeTag, value: Value) -> Result<Object> {
	match value {
		Value::Object(object) => Ok(object.borrow().clone()),
		Value::Xy(xy) => {
			let xy = *xy.borrow();
			Ok([("x".to_owned(), Value::Number(xy.x)), ("y".to_owned(), Value::Number(xy.y))].into_iter().collect())
		}
		Value::String(text) => match serde_json::from_str::<serde_json::Value>(&text) {
			Ok(json @ serde_json::Value::Object(_)) => match Value::from_json(&json) {
				Value::Object(object) => Ok(mem::take(&mut *object.borrow_mut())),
				_ => Ok(Object::new()),
			},
			_ => Err(Error::Unparsable {
				name: name.to_owned(),
				ty,
				input: text,
			}),
		},
		other => Err(Error::TypeMismatch {
			name: name.to_owned(),
			ty,
			found: other.kind_name(),
		}),
	}
}

fn set_members(name: &str, ty: TypeTag, value: Value) -> Result<Vec<Value>> {
	let candidates = match value {
		Value::Set(items) | Value::Array(items) => items.borrow().clone(),
		Value::String(text) => parse_pg_str_array(&text)?.into_iter().map(PgElement::into_value).collect(),
		other => {
			return Err(Error::TypeMismatch {
				name: name.to_owned(),
				ty,
				found: other.kind_name(),
			})
		}
	};
	let mut members: Vec<Value> = Vec::with_capacity(candidates.len());
	for candidate in candidates {
		if !members.iter().any(|member| member.same(&candidate)) {
			members.push(candidate);
		}
	}
	Ok(members)
}

fn map_entries(name: &str, ty: TypeTag, value: Value) -> Result<Vec<(Value, Value)>> {
	let mismatch = |found| Error::TypeMismatch {
		name: name.to_owned(),
		ty,
		found,
	};
	let pairs: Vec<(Value, Value)> = match value {
		Value::Map(entries) => entries.borrow().clone(),
		Value::Object(object) => object.borrow().iter().map(|(k, v)| (Value::String(k.clone()), v.clone())).collect(),
		Value::Array(items) => items
			.borrow()
			.iter()
			.map(|item| match item.as_array().map(|pair| pair.borrow().clone()).as_deref() {
				Some([key, value]) => Ok((key.clone(), value.clone())),
				_ => Err(mismatch("an array that isn't made of `[key, value]` pairs")),
			})
			.collect::<Result<_>>()?,
		Value::String(text) => parse_pg_str_array(&text)?
			.into_iter()
			.map(|element| match element {
				PgElement::Tuple(fields) if fields.len() == 2 => {
					let mut fields = fields.into_iter();
					Ok((Value::from(fields.next().unwrap_or_default()), Value::from(fields.next().unwrap_or_default())))
				}
				_ => Err(mismatch("a literal that isn't made of `(key,value)` tuples")),
			})
			.collect::<Result<_>>()?,
		other => return Err(mismatch(other.kind_name())),
	};
	let mut entries: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
	for (key, value) in pairs {
		match entries.iter_mut().find(|(k, _)| k.same(&key)) {
			Some(slot) => slot.1 = value,
			None => entries.push((key, value)),
		}
	}
	Ok(entries)
}

/// Length first, then elementwise compare-and-assign.
fn patch_vec(slot: &mut Vec<Value>, items: Vec<Value>) -> bool {
	let mut changed = slot.len() != items.len();
	slot.truncate(items.len());
	for (i, item) in items.into_iter().enumerate() {
		match slot.get_mut(i) {
			Some(existing) => {
				if !existing.same(&item) {
					*existing = item;
					changed = true;
				}
			}
			None => slot.push(item),
		}
	}
	changed
}

fn patch_object(slot: &mut Object, entries: Object) -> bool {
	let before = slot.len();
	slot.retain(|key, _| entries.contains_key(key));
	let mut changed = slot.len() != before;
	for (key, value) in entries {
		match slot.get_mut(&key) {
			Some(existing) if existing.same(&value) => {}
			Some(existing) => {
				*existing = value;
				changed = true;
			}
			None => {
				slot.insert(key, value);
				changed = true;
			}
		}
	}
	changed
}

fn patch_set(slot: &mut Vec<Value>, members: Vec<Value>) -> bool {
	let before = slot.len();
	slot.retain(|existing| members.iter().any(|member| member.same(existing)));
	let mut changed = slot.len() != before;
	for member in members {
		if !slot.iter().any(|existing| existing.same(&member)) {
			slot.push(member);
			changed = true;
		}
	}
	changed
}

fn patch_map(slot: &mut Vec<(Value, Value)>, entries: Vec<(Value, Value)>) -> bool {
	let before = slot.len();
	slot.retain(|(key, _)| entries.iter().any(|(k, _)| k.same(key)));
	let mut changed = slot.len() != before;
	for (key, value) in entries {
		match slot.iter_mut().find(|(k, _)| k.same(&key)) {
			Some((_, existing)) if existing.same(&value) => {}
			Some((_, existing)) => {
				*existing = value;
				changed = true;
			}
			None => {
				slot.push((key, value));
				changed = true;
			}
		}
	}
	changed
}

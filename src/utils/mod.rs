//! Stateless helpers shared by the model and view layers.

pub mod coerce;
pub mod hash;
pub mod pg_array;

pub use self::{
	coerce::{number_to_string, parse_locale_number, to_boolean},
	hash::{sha256, sha256_trim_l},
	pg_array::{parse_pg_array_value, parse_pg_str_array, to_pg_literal, PgElement},
};

use crate::{
	error::{Error, Result},
	value::{shared, Value},
};
use hashbrown::HashMap;
use std::rc::Rc;

/// A random (version 4) UUID in its canonical hyphenated form.
pub fn uuid_v4() -> Result<String> {
	let mut bytes = [0_u8; 16];
	getrandom::fill(&mut bytes).map_err(|error| Error::Entropy(error.to_string()))?;
	bytes[6] = (bytes[6] & 0x0f) | 0x40;
	bytes[8] = (bytes[8] & 0x3f) | 0x80;

	let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
	Ok(format!("{}-{}-{}-{}-{}", &hex[..8], &hex[8..12], &hex[12..16], &hex[16..20], &hex[20..]))
}

/// Deep-copies containers. Shared and cyclic structure is reproduced in the copy.
///
/// Nested models and functions are handles to live objects and are shared, not copied.
#[must_use]
pub fn deep_clone(value: &Value) -> Value {
	deep_clone_seen(value, &mut HashMap::new())
}

fn deep_clone_seen(value: &Value, seen: &mut HashMap<*const (), Value>) -> Value {
	macro_rules! container {
		($variant:ident, $rc:expr, $empty:expr, |$copy:ident, $original:ident| $fill:block) => {{
			let key = Rc::as_ptr($rc).cast::<()>();
			if let Some(copy) = seen.get(&key) {
				return copy.clone();
			}
			let copy = shared($empty);
			seen.insert(key, Value::$variant(copy.clone()));
			{
				let $original = $rc.borrow();
				let $copy = &copy;
				$fill
			}
			Value::$variant(copy)
		}};
	}

	match value {
		Value::Xy(xy) => Value::Xy(shared(*xy.borrow())),
		Value::Object(object) => container!(Object, object, Default::default(), |copy, original| {
			for (k, v) in original.iter() {
				let v = deep_clone_seen(v, seen);
				copy.borrow_mut().insert(k.clone(), v);
			}
		}),
		Value::Array(items) => container!(Array, items, Vec::new(), |copy, original| {
			for item in original.iter() {
				let item = deep_clone_seen(item, seen);
				copy.borrow_mut().push(item);
			}
		}),
		Value::Set(items) => container!(Set, items, Vec::new(), |copy, original| {
			for item in original.iter() {
				let item = deep_clone_seen(item, seen);
				copy.borrow_mut().push(item);
			}
		}),
		Value::Map(entries) => container!(Map, entries, Vec::new(), |copy, original| {
			for (k, v) in original.iter() {
				let entry = (deep_clone_seen(k, seen), deep_clone_seen(v, seen));
				copy.borrow_mut().push(entry);
			}
		}),
		other => other.clone(),
	}
}

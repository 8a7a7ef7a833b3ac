//! `sg-for` list rendering.
//!
//! Items are stamped from a template by textual `$name` substitution. They are not bound themselves,
//! apart from `sg-click` handlers. Each clone root carries the item's hash, which re-derives to the same
//! string for the same logical item across renders.

use super::{binder, expr::Expr, View};
use crate::{
	dom::{escape_html, Element, ListenerGuard},
	error::Result,
	model::Model,
	utils::sha256_trim_l,
	value::Value,
};
use core::cell::RefCell;
use hashbrown::HashMap;
use tracing::{trace, trace_span, warn};

/// Identity fields of record items, by priority. Items without any are keyed by index.
const IDENTITY_FIELDS: [&str; 4] = ["id", "uuid", "code", "hash"];

/// A collection entry resolved from a rendered element.
#[derive(Debug, Clone, PartialEq)]
pub struct ForItem {
	pub property: String,
	pub index: usize,
	/// The array index, object key or map key.
	pub key: Value,
	pub value: Value,
	pub hash: String,
}

fn is_record(item: &Value) -> bool {
	matches!(item, Value::Object(_) | Value::Model(_))
}

/// `(kind, value)` of an item's identity.
fn identity(item: &Value, index: usize) -> (&'static str, String) {
	if is_record(item) {
		for field in IDENTITY_FIELDS {
			match item.field(field) {
				Some(Value::Null) | None => {}
				Some(value) => return (field, value.to_display_string()),
			}
		}
	}
	("index", index.to_string())
}

/// `"<kind>:<value>:<prefix of sha256(uuid:property:kind:value)>"`.
#[must_use]
pub fn item_hash(uuid: &str, property: &str, item: &Value, index: usize) -> String {
	let (kind, value) = identity(item, index);
	let digest = sha256_trim_l(&format!("{}:{}:{}:{}", uuid, property, kind, value), 16);
	format!("{}:{}:{}", kind, value, digest)
}

/// `(key, item)` pairs in iteration order.
pub(crate) fn entries(collection: &Value) -> Vec<(Value, Value)> {
	match collection {
		Value::Array(items) | Value::Set(items) => items.borrow().iter().enumerate().map(|(i, item)| (Value::from(i), item.clone())).collect(),
		Value::Object(object) => object.borrow().iter().map(|(k, v)| (Value::String(k.clone()), v.clone())).collect(),
		Value::Map(entries) => entries.borrow().clone(),
		_ => Vec::new(),
	}
}

/// Replaces `$name` tokens that have a variable. Values are escaped, unknown tokens are kept.
pub(crate) fn substitute(template: &str, variables: &HashMap<String, String>) -> String {
	let mut output = String::with_capacity(template.len());
	let mut rest = template;
	while let Some(start) = rest.find('$') {
		output.push_str(&rest[..start]);
		let after = &rest[start + 1..];
		let len = after.find(|c: char| !(c.is_alphanumeric() || c == '_')).unwrap_or(after.len());
		let token = &rest[start..start + 1 + len];
		match variables.get(token) {
			Some(value) if len > 0 => output.push_str(&escape_html(value)),
			_ => output.push_str(token),
		}
		rest = &rest[start + 1 + len..];
	}
	output.push_str(rest);
	output
}

fn item_fields(item: &Value) -> Vec<(String, Value)> {
	match item {
		Value::Object(object) => object.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
		Value::Model(model) => {
			let mut fields = Vec::new();
			let _ = model.for_each_property(|name, value| fields.push((name.to_owned(), value.clone())));
			fields
		}
		Value::Xy(xy) => {
			let xy = *xy.borrow();
			vec![("x".to_owned(), Value::from(xy.x)), ("y".to_owned(), Value::from(xy.y))]
		}
		_ => Vec::new(),
	}
}

fn variable_name(key: &str) -> String {
	if key.starts_with('$') {
		key.to_owned()
	} else {
		format!("${}", key)
	}
}

/// Evaluates `sg-item-variables` once per render.
fn evaluate_variables(model: &Model, variables: &[(String, Expr)]) -> HashMap<String, String> {
	variables
		.iter()
		.map(|(key, expr)| (variable_name(key), expr.eval(model).to_display_string()))
		.collect()
}

/// Re-renders an `sg-for` host from scratch.
pub(crate) fn render<E: Element>(
	view: &View<E>,
	property: &str,
	host: &E,
	template: &Result<String>,
	variables: &[(String, Expr)],
	clones: &RefCell<Vec<ListenerGuard>>,
) {
	let model = view.model();
	let span = trace_span!("render_list", property);
	let _enter = span.enter();

	host.clear_children();
	clones.borrow_mut().clear();
	let template = match template {
		Ok(template) => template,
		Err(error) => {
			binder::show_error(view, host, error);
			return;
		}
	};

	let collection = match model.get(property) {
		Ok(collection) => collection,
		Err(error) => {
			warn!("Can't render list: {}", error);
			return;
		}
	};
	let base = evaluate_variables(model, variables);
	let item_attribute = view.attribute("item");
	let click_attribute = view.attribute("click");
	let mut guards = Vec::new();

	let entries = entries(&collection);
	for (index, (key, item)) in entries.iter().enumerate() {
		let hash = item_hash(model.uuid(), property, item, index);
		let mut variables = base.clone();
		for (name, value) in item_fields(item) {
			variables.entry(variable_name(&name)).or_insert_with(|| value.to_display_string());
		}
		variables.insert("$index".to_owned(), index.to_string());
		variables.insert("$key".to_owned(), key.to_display_string());
		variables.insert("$value".to_owned(), if is_record(item) { String::new() } else { item.to_display_string() });
		variables.insert("$hash".to_owned(), hash.clone());

		for root in host.append_html(&substitute(template, &variables)) {
			root.set_attribute(&item_attribute, &hash);
			for element in core::iter::once(root.clone()).chain(root.descendants()) {
				if let Some(handler) = element.get_attribute(&click_attribute) {
					guards.extend(binder::click_listener(view, &element, handler.trim()));
				}
			}
		}
	}
	trace!(count = entries.len(), "Rendered list.");
	*clones.borrow_mut() = guards;
}

/// Resolves the collection entry an element was rendered for.
pub(crate) fn find_item<E: Element>(view: &View<E>, element: &E) -> Option<ForItem> {
	let item_attribute = view.attribute("item");
	let for_attribute = view.attribute("for");
	let item = element.closest(&item_attribute)?;
	let hash = item.get_attribute(&item_attribute)?;
	let host = item.parent()?.closest(&for_attribute)?;
	let property = host.get_attribute(&for_attribute)?.trim().to_owned();

	let model = view.model();
	let collection = model.get(&property).ok()?;
	entries(&collection)
		.into_iter()
		.enumerate()
		.find(|(index, (_, value))| item_hash(model.uuid(), &property, value, *index) == hash)
		.map(|(index, (key, value))| ForItem {
			property: property.clone(),
			index,
			key,
			value,
			hash: hash.clone(),
		})
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn hash_kinds_follow_priority() {
		let by_id = Value::object([("id", Value::from(7)), ("uuid", Value::from("u")), ("code", Value::from("c"))]);
		let by_code = Value::object([("code", Value::from("c")), ("hash", Value::from("h"))]);
		let plain = Value::from("text");
		assert!(item_hash("uuid", "rows", &by_id, 3).starts_with("id:7:"));
		assert!(item_hash("uuid", "rows", &by_code, 3).starts_with("code:c:"));
		assert!(item_hash("uuid", "rows", &plain, 3).starts_with("index:3:"));

		let hash = item_hash("uuid", "rows", &by_id, 0);
		assert_eq!(hash, format!("id:7:{}", sha256_trim_l("uuid:rows:id:7", 16)));
		// Position doesn't matter for keyed items.
		assert_eq!(hash, item_hash("uuid", "rows", &by_id, 5));
		assert_ne!(hash, item_hash("other", "rows", &by_id, 0));
	}

	#[test]
	fn substitution() {
		let variables: HashMap<String, String> = [("$name", "<Ann>"), ("$n", "1")]
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect();
		assert_eq!(
			substitute(r#"<b title="$name">$name $n $nope $ 5$</b>"#, &variables),
			r#"<b title="&lt;Ann&gt;">&lt;Ann&gt; 1 $nope $ 5$</b>"#
		);
	}
}

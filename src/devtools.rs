//! Diagnostics: finding the instance behind an element and describing instances.

use crate::{dom::Element, model::Model, registry::Registry, view::DEFAULT_PREFIX};
use serde_json::{json, Map, Value as Json};
use tracing::info;

/// The instance whose view contains `element`, found through the nearest `sg-uuid` marker.
///
/// Requires views with debug markers.
pub fn inspect<E: Element>(element: &E, registry: &Registry) -> Option<Model> {
	inspect_with_prefix(element, registry, DEFAULT_PREFIX)
}

pub fn inspect_with_prefix<E: Element>(element: &E, registry: &Registry, prefix: &str) -> Option<Model> {
	let marker = format!("{}uuid", prefix);
	let uuid = element.closest(&marker)?.get_attribute(&marker)?;
	registry.lookup(&uuid)
}

/// Class metadata, declarations and data of an instance as JSON.
#[must_use]
pub fn describe(model: &Model) -> Json {
	let class = model.class();
	let declarations: Map<String, Json> = model
		.keys()
		.into_iter()
		.filter_map(|name| model.declared_type(&name).map(|ty| (name, Json::from(ty.name()))))
		.collect();
	json!({
		"class": class.name(),
		"version": class.version(),
		"uuid": model.uuid(),
		"uid": model.uid(),
		"singleton": class.is_singleton(),
		"initialized": model.is_initialized(),
		"destroyed": model.is_destroyed(),
		"changed": model.has_changed(),
		"init_error": model.init_error().map(|error| error.to_string()),
		"declarations": declarations,
		"data": model.get_data(),
	})
}

/// [`describe`] pretty-printed.
#[must_use]
pub fn describe_pretty(model: &Model) -> String {
	serde_json::to_string_pretty(&describe(model)).unwrap_or_default()
}

/// Logs every live instance of `registry`, ordered by instance number.
pub fn dump(registry: &Registry) {
	let mut models = registry.all();
	models.sort_by_key(Model::uid);
	info!(count = models.len(), "Live instances:");
	for model in &models {
		info!(class = model.class_name(), uuid = model.uuid(), uid = model.uid(), "{}", loggable(model));
	}
}

/// [`describe`] without property data, unless `"dangerous-logging"` is enabled.
fn loggable(model: &Model) -> Json {
	let mut description = describe(model);
	if !cfg!(feature = "dangerous-logging") {
		if let Json::Object(fields) = &mut description {
			fields.remove("data");
		}
	}
	description
}

use super::{Model, StorageConfig};
use crate::{
	error::{Error, Result},
	storage::KeyValueStore,
	types::TypeTag,
};
use serde_json::{Map, Value as Json};
use tracing::{debug, warn};

/// `"<key>"` for singletons, `"<key>:<uuid>"` otherwise.
pub(crate) fn storage_key(config: &StorageConfig, singleton: bool, uuid: &str) -> String {
	if singleton {
		config.key.clone()
	} else {
		format!("{}:{}", config.key, uuid)
	}
}

/// Reads a persisted payload. Anything that isn't a JSON object is ignored with a warning.
pub(crate) fn load(store: &dyn KeyValueStore, key: &str) -> Vec<(String, Json)> {
	let text = match store.get_item(key) {
		Some(text) => text,
		None => return Vec::new(),
	};
	match serde_json::from_str::<Json>(&text) {
		Ok(Json::Object(entries)) => {
			debug!(key, count = entries.len(), "Loaded persisted properties.");
			entries.into_iter().collect()
		}
		Ok(_) => {
			warn!(key, "Persisted payload is not an object.");
			Vec::new()
		}
		Err(error) => {
			warn!(key, "Persisted payload is not valid JSON: {}", error);
			Vec::new()
		}
	}
}

impl Model {
	/// The current values of all declared properties. Nested instances are serialized as their own data.
	///
	/// A destroyed instance yields an empty object.
	#[must_use]
	pub fn get_data(&self) -> Json {
		let mut data = Map::new();
		let _ = self.for_each_property(|name, value| {
			data.insert(name.to_owned(), value.to_json());
		});
		Json::Object(data)
	}

	/// [`get_data`](`Model::get_data`), optionally with `__class`, `__version` and `__uuid` for debugging.
	#[must_use]
	pub fn to_json(&self, include_meta: bool) -> Json {
		let mut json = self.get_data();
		if let (true, Json::Object(data)) = (include_meta, &mut json) {
			data.insert("__class".to_owned(), Json::from(self.class_name()));
			data.insert("__version".to_owned(), self.0.class.version().map_or(Json::Null, Json::from));
			data.insert("__uuid".to_owned(), Json::from(self.uuid()));
		}
		json
	}

	/// The subset of [`get_data`](`Model::get_data`) that is persisted.
	///
	/// Nested instances and functions can't be restored from JSON, so those properties are left out.
	#[must_use]
	pub fn savable_data(&self) -> Json {
		let config = self.0.class.storage();
		match self.get_data() {
			Json::Object(data) => Json::Object(
				data.into_iter()
					.filter(|(name, _)| config.map_or(!name.starts_with('_'), |config| config.is_storable(name)))
					.filter(|(name, _)| {
						self.declared_type(name)
							.map_or(true, |ty| !ty.owns_models() && ty != TypeTag::Function)
					})
					.collect(),
			),
			other => other,
		}
	}

	/// The key this instance persists under, if its class is configured for storage.
	#[must_use]
	pub fn storage_key(&self) -> Option<String> {
		self.0
			.class
			.storage()
			.map(|config| storage_key(config, self.0.class.is_singleton(), self.uuid()))
	}

	/// Writes [`savable_data`](`Model::savable_data`) to the instance's store.
	///
	/// # Errors
	///
	/// [`Error::NoStorage`] if the class has no storage key or the instance no store,
	/// [`Error::Destroyed`], and backend errors.
	pub fn save(&self) -> Result<()> {
		self.state()?;
		let no_storage = || Error::NoStorage {
			class: self.class_name().to_owned(),
		};
		let key = self.storage_key().ok_or_else(no_storage)?;
		let store = self.0.storage.as_ref().ok_or_else(no_storage)?;
		let payload = serde_json::to_string(&self.savable_data())?;
		store.set_item(&key, &payload)?;
		debug!(key = key.as_str(), "Saved instance.");
		Ok(())
	}
}

//! Key-value persistence backends.

use crate::error::Result;
use core::cell::RefCell;
use hashbrown::HashMap;

/// A string key-value store with `localStorage` semantics.
pub trait KeyValueStore {
	fn get_item(&self, key: &str) -> Option<String>;

	/// # Errors
	///
	/// Backend-specific, for example when a quota is exceeded.
	fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// Keeps everything in memory. Useful for headless hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryStore(RefCell<HashMap<String, String>>);

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.borrow().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.borrow().is_empty()
	}
}

impl KeyValueStore for MemoryStore {
	fn get_item(&self, key: &str) -> Option<String> {
		self.0.borrow().get(key).cloned()
	}

	fn set_item(&self, key: &str, value: &str) -> Result<()> {
		self.0.borrow_mut().insert(key.to_owned(), value.to_owned());
		Ok(())
	}
}

/// The window's `localStorage`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct LocalStorage(web_sys::Storage);

#[cfg(target_arch = "wasm32")]
use crate::error::Error;

#[cfg(target_arch = "wasm32")]
impl LocalStorage {
	/// # Errors
	///
	/// [`Error::Storage`] if there is no window or storage access is denied.
	pub fn new() -> Result<Self> {
		let window = web_sys::window().ok_or_else(|| Error::Storage("no window".to_owned()))?;
		match window.local_storage() {
			Ok(Some(storage)) => Ok(Self(storage)),
			Ok(None) => Err(Error::Storage("localStorage is unavailable".to_owned())),
			Err(error) => Err(Error::Storage(format!("{:?}", error))),
		}
	}
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStore for LocalStorage {
	fn get_item(&self, key: &str) -> Option<String> {
		self.0.get_item(key).ok().flatten()
	}

	fn set_item(&self, key: &str, value: &str) -> Result<()> {
		self.0.set_item(key, value).map_err(|error| Error::Storage(format!("{:?}", error)))
	}
}

//! Instance bookkeeping.
//!
//! Instances are registered during construction and unregistered by [`Model::destroy`], which are the only
//! mutation paths. A [`Registry`] keeps its instances alive until they are destroyed.

use crate::{
	error::{Error, Result},
	model::{Model, ModelClass},
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::trace;

thread_local! {
	static GLOBAL: Registry = Registry::new();
}

#[derive(Default)]
struct RegistryState {
	by_uuid: HashMap<String, Model>,
	by_class: HashMap<String, HashMap<String, Model>>,
	classes: HashMap<String, Rc<ModelClass>>,
	next_uid: u64,
}

/// Maps UUIDs and class names to live instances. Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct Registry(Rc<RefCell<RegistryState>>);

impl Registry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// The thread's default registry, used by instances constructed without an explicit one.
	#[must_use]
	pub fn global() -> Self {
		GLOBAL.with(Clone::clone)
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// Hands out monotonically increasing instance numbers.
	pub fn next_uid(&self) -> u64 {
		let mut state = self.0.borrow_mut();
		state.next_uid += 1;
		state.next_uid
	}

	/// # Errors
	///
	/// [`Error::DuplicateUuid`] if another instance already uses `model`'s UUID.
	pub fn register(&self, model: &Model) -> Result<()> {
		let mut state = self.0.borrow_mut();
		let uuid = model.uuid().to_owned();
		if state.by_uuid.contains_key(&uuid) {
			return Err(Error::DuplicateUuid { uuid });
		}
		let class = model.class();
		state.classes.entry(class.name().to_owned()).or_insert_with(|| Rc::clone(class));
		state
			.by_class
			.entry(class.name().to_owned())
			.or_default()
			.insert(uuid.clone(), model.clone());
		state.by_uuid.insert(uuid, model.clone());
		trace!(class = class.name(), uuid = model.uuid(), "Registered instance.");
		Ok(())
	}

	/// Returns whether `model` was registered.
	pub fn unregister(&self, model: &Model) -> bool {
		let mut state = self.0.borrow_mut();
		let removed = state.by_uuid.remove(model.uuid()).is_some();
		if let Some(instances) = state.by_class.get_mut(model.class_name()) {
			instances.remove(model.uuid());
			if instances.is_empty() {
				state.by_class.remove(model.class_name());
			}
		}
		if removed {
			trace!(class = model.class_name(), uuid = model.uuid(), "Unregistered instance.");
		}
		removed
	}

	#[must_use]
	pub fn lookup(&self, uuid: &str) -> Option<Model> {
		self.0.borrow().by_uuid.get(uuid).cloned()
	}

	/// Live instances of `class`, in construction order.
	#[must_use]
	pub fn instances_of(&self, class: &str) -> Vec<Model> {
		let mut instances: Vec<Model> = self
			.0
			.borrow()
			.by_class
			.get(class)
			.map(|instances| instances.values().cloned().collect())
			.unwrap_or_default();
		instances.sort_by_key(Model::uid);
		instances
	}

	/// The oldest live instance of `class`, which for singleton classes is the only one.
	#[must_use]
	pub fn singleton(&self, class: &str) -> Option<Model> {
		self.instances_of(class).into_iter().next()
	}

	/// A class that had at least one instance registered here, for static lookups.
	#[must_use]
	pub fn class(&self, name: &str) -> Option<Rc<ModelClass>> {
		self.0.borrow().classes.get(name).cloned()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.borrow().by_uuid.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// All live instances in construction order.
	#[must_use]
	pub fn all(&self) -> Vec<Model> {
		let mut instances: Vec<Model> = self.0.borrow().by_uuid.values().cloned().collect();
		instances.sort_by_key(Model::uid);
		instances
	}
}

impl Debug for Registry {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let state = self.0.borrow();
		f.debug_struct("Registry")
			.field("instances", &state.by_uuid.len())
			.field("classes", &state.by_class.len())
			.field("next_uid", &state.next_uid)
			.finish()
	}
}

//! The reactive property store.
//!
//! A [`Model`] is a handle to one instance of a [`ModelClass`]. Writes go through
//! [`validate_property`], which coerces scalars and patches containers in place, and then notify
//! subscribers synchronously.
//!
//! # Reentrancy
//!
//! No internal borrow is held while callbacks, initializers or destroy hooks run, so they may freely
//! read from and write to the instance that notified them.

mod class;
mod collection;
mod persist;
mod subscription;
mod validate;

pub use self::{
	class::{Declaration, Initializer, Method, ModelClass, ModelClassBuilder, StorageConfig},
	collection::ItemKey,
	subscription::{callback, Callback, IntoNames, Notification, OnOptions},
	validate::{validate_property, Validated},
};

use self::subscription::Subscription;
use crate::{
	error::{Error, Result},
	flags::Flags,
	registry::Registry,
	scheduler,
	storage::KeyValueStore,
	types::TypeTag,
	utils::{deep_clone, uuid_v4},
	value::Value,
};
use core::{
	cell::{Ref, RefCell, RefMut},
	fmt::{self, Debug, Formatter},
};
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, error, instrument, trace, trace_span, warn};

type DestroyHook = Box<dyn FnOnce(&Model)>;

struct Inner {
	class: Rc<ModelClass>,
	uuid: String,
	uid: u64,
	registry: Registry,
	storage: Option<Rc<dyn KeyValueStore>>,
	state: RefCell<State>,
	destroy_hooks: RefCell<Vec<DestroyHook>>,
}

#[derive(Default)]
struct State {
	declarations: HashMap<String, Declaration>,
	/// Declaration order.
	keys: Vec<String>,
	data: HashMap<String, Value>,
	subscriptions: HashMap<String, Vec<Subscription>>,
	/// Properties written before the instance settled.
	deferred: HashSet<String>,
	changed: bool,
	initialized: bool,
	init_ran: bool,
	binding_pending: bool,
	destroyed: bool,
	init_error: Option<Error>,
}

impl State {
	fn settled(&self) -> bool {
		self.init_ran && !self.binding_pending
	}

	fn declare(&mut self, name: &str, declaration: Declaration) {
		if self.declarations.insert(name.to_owned(), declaration).is_none() {
			self.keys.push(name.to_owned());
		}
	}
}

/// A handle to a reactive instance. Clones refer to the same instance.
#[derive(Clone)]
pub struct Model(Rc<Inner>);

/// Builds a [`Model`]. See [`Model::builder`].
#[must_use = "call `.build()` to construct the instance"]
pub struct ModelBuilder {
	class: Rc<ModelClass>,
	uuid: Option<String>,
	properties: Vec<(String, Value, Option<TypeTag>)>,
	registry: Option<Registry>,
	storage: Option<Rc<dyn KeyValueStore>>,
}

impl ModelBuilder {
	pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
		self.uuid = Some(uuid.into());
		self
	}

	/// A constructor property. Overrides both the declared default and persisted data.
	pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.properties.push((name.into(), value.into(), None));
		self
	}

	/// A constructor property with an explicit type, which also declares it if necessary.
	pub fn typed_property(mut self, name: impl Into<String>, value: impl Into<Value>, ty: TypeTag) -> Self {
		self.properties.push((name.into(), value.into(), Some(ty)));
		self
	}

	pub fn registry(mut self, registry: Registry) -> Self {
		self.registry = Some(registry);
		self
	}

	pub fn storage(mut self, storage: Rc<dyn KeyValueStore>) -> Self {
		self.storage = Some(storage);
		self
	}

	/// Builds the store synchronously and defers the class's initializer.
	///
	/// Values are merged as declared defaults, then persisted data, then constructor properties,
	/// and each result is validated against its declared type.
	///
	/// # Errors
	///
	/// - [`Error::DuplicateSingleton`] and [`Error::DuplicateUuid`],
	/// - [`Error::MissingShape`] for a complex constructor property without value or declaration,
	/// - any validation error.
	#[instrument(skip(self), fields(class = self.class.name()))]
	pub fn build(self) -> Result<Model> {
		let ModelBuilder {
			class,
			uuid,
			properties,
			registry,
			storage,
		} = self;
		let registry = registry.unwrap_or_else(Registry::global);
		let storage = match storage {
			None if class.storage().is_some() => default_storage(),
			storage => storage,
		};

		if class.is_singleton() && registry.singleton(class.name()).is_some() {
			return Err(Error::DuplicateSingleton { class: class.name().to_owned() });
		}
		let uuid = match uuid {
			Some(uuid) => uuid,
			None => uuid_v4()?,
		};
		if registry.lookup(&uuid).is_some() {
			return Err(Error::DuplicateUuid { uuid });
		}

		let mut state = State::default();
		let mut merged: Vec<(String, Value)> = Vec::new();
		for (name, declaration) in class.declarations() {
			state.declare(name, declaration.clone());
			// Class defaults are shared by all instances, so each one gets its own containers.
			merged.push((name.clone(), deep_clone(&declaration.value)));
		}

		if let (Some(config), Some(store)) = (class.storage(), storage.as_deref()) {
			let key = persist::storage_key(config, class.is_singleton(), &uuid);
			for (name, json) in persist::load(store, &key) {
				if !state.declarations.contains_key(&name) {
					if class.implicit_properties() {
						let value = Value::from_json(&json);
						state.declare(&name, Declaration::new(Value::Null, TypeTag::infer(&value)));
						merged.push((name, value));
					} else {
						warn!(key = key.as_str(), property = name.as_str(), "Ignoring persisted value of undeclared property.");
					}
					continue;
				}
				let ty = state.declarations[&name].ty;
				match validate_property(&name, Value::from_json(&json), None, ty, Flags::empty()) {
					Ok(validated) => set_merged(&mut merged, name, validated.value),
					Err(error) => warn!(key = key.as_str(), property = name.as_str(), "Ignoring persisted value: {}", error),
				}
			}
		}

		for (name, value, ty) in properties {
			match (state.declarations.get_mut(&name), ty) {
				(Some(declaration), Some(ty)) => declaration.ty = ty,
				(Some(_), None) => {}
				(None, ty) => {
					let ty = ty.unwrap_or_else(|| TypeTag::infer(&value));
					if ty.is_complex() && value.is_null() {
						return Err(Error::MissingShape { name, ty });
					}
					state.declare(&name, Declaration::new(Value::Null, ty));
				}
			}
			set_merged(&mut merged, name, value);
		}

		for (name, value) in merged {
			let ty = state.declarations[&name].ty;
			let validated = validate_property(&name, value, None, ty, Flags::empty())?;
			state.data.insert(name, validated.value);
		}

		let model = Model(Rc::new(Inner {
			uid: registry.next_uid(),
			class,
			uuid,
			registry: registry.clone(),
			storage,
			state: RefCell::new(state),
			destroy_hooks: RefCell::new(Vec::new()),
		}));
		registry.register(&model)?;
		debug!(uuid = model.uuid(), uid = model.uid(), "Constructed instance.");

		let deferred = model.clone();
		scheduler::defer(move || deferred.run_initialize());
		Ok(model)
	}
}

#[cfg(target_arch = "wasm32")]
fn default_storage() -> Option<Rc<dyn KeyValueStore>> {
	match crate::storage::LocalStorage::new() {
		Ok(storage) => Some(Rc::new(storage)),
		Err(error) => {
			warn!("Falling back to no persistence: {}", error);
			None
		}
	}
}

#[cfg(not(target_arch = "wasm32"))]
fn default_storage() -> Option<Rc<dyn KeyValueStore>> {
	None
}

fn set_merged(merged: &mut Vec<(String, Value)>, name: String, value: Value) {
	match merged.iter_mut().find(|(existing, _)| *existing == name) {
		Some(slot) => slot.1 = value,
		None => merged.push((name, value)),
	}
}

impl Model {
	pub fn builder(class: &Rc<ModelClass>) -> ModelBuilder {
		ModelBuilder {
			class: Rc::clone(class),
			uuid: None,
			properties: Vec::new(),
			registry: None,
			storage: None,
		}
	}

	/// An instance with only declared defaults, in the global registry.
	///
	/// # Errors
	///
	/// See [`ModelBuilder::build`].
	pub fn new(class: &Rc<ModelClass>) -> Result<Self> {
		Self::builder(class).build()
	}

	#[must_use]
	pub fn uuid(&self) -> &str {
		&self.0.uuid
	}

	#[must_use]
	pub fn uid(&self) -> u64 {
		self.0.uid
	}

	#[must_use]
	pub fn class(&self) -> &Rc<ModelClass> {
		&self.0.class
	}

	#[must_use]
	pub fn class_name(&self) -> &str {
		self.0.class.name()
	}

	#[must_use]
	pub fn registry(&self) -> &Registry {
		&self.0.registry
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	#[must_use]
	pub fn is_initialized(&self) -> bool {
		self.0.state.borrow().initialized
	}

	#[must_use]
	pub fn is_destroyed(&self) -> bool {
		self.0.state.borrow().destroyed
	}

	/// Why the initializer failed, if it did.
	#[must_use]
	pub fn init_error(&self) -> Option<Error> {
		self.0.state.borrow().init_error.clone()
	}

	/// Whether anything changed since construction or the last [`reset_changed`](`Model::reset_changed`).
	#[must_use]
	pub fn has_changed(&self) -> bool {
		self.0.state.borrow().changed
	}

	pub fn reset_changed(&self) {
		self.0.state.borrow_mut().changed = false;
	}

	/// Declared property names, in declaration order.
	#[must_use]
	pub fn keys(&self) -> Vec<String> {
		self.0.state.borrow().keys.clone()
	}

	#[must_use]
	pub fn declared_type(&self, name: &str) -> Option<TypeTag> {
		self.0.state.borrow().declarations.get(name).map(|declaration| declaration.ty)
	}

	fn state(&self) -> Result<Ref<'_, State>> {
		let state = self.0.state.borrow();
		if state.destroyed {
			return Err(self.destroyed_error());
		}
		Ok(state)
	}

	fn state_mut(&self) -> Result<RefMut<'_, State>> {
		let state = self.0.state.borrow_mut();
		if state.destroyed {
			return Err(self.destroyed_error());
		}
		Ok(state)
	}

	fn destroyed_error(&self) -> Error {
		Error::Destroyed {
			class: self.class_name().to_owned(),
			uuid: self.uuid().to_owned(),
		}
	}

	fn undeclared(&self, name: &str) -> Error {
		Error::UndeclaredProperty {
			class: self.class_name().to_owned(),
			name: name.to_owned(),
		}
	}

	/// Resolves a property's type, declaring it from `hint` if the class allows implicit properties.
	fn resolve_type(&self, name: &str, hint: Option<&Value>) -> Result<TypeTag> {
		let mut state = self.state_mut()?;
		if let Some(declaration) = state.declarations.get(name) {
			return Ok(declaration.ty);
		}
		if !self.0.class.implicit_properties() {
			return Err(self.undeclared(name));
		}
		let ty = hint.map_or(TypeTag::Any, TypeTag::infer);
		trace!(property = name, %ty, "Implicitly declared property.");
		state.declare(name, Declaration::new(Value::Null, ty));
		Ok(ty)
	}

	/// The current value. Containers are returned as live handles.
	///
	/// # Errors
	///
	/// [`Error::UndeclaredProperty`] unless the class allows implicit properties, [`Error::Destroyed`].
	pub fn get(&self, name: &str) -> Result<Value> {
		let state = self.state()?;
		match state.data.get(name) {
			Some(value) => Ok(value.clone()),
			None if state.declarations.contains_key(name) || self.0.class.implicit_properties() => Ok(Value::Null),
			None => Err(self.undeclared(name)),
		}
	}

	/// Runs [`validate_property`] against the current value without storing anything.
	///
	/// Note that complex values are still patched in place.
	///
	/// # Errors
	///
	/// See [`validate_property`].
	pub fn validate_property(&self, name: &str, value: Value, flags: Flags) -> Result<Validated> {
		let ty = self.resolve_type(name, Some(&value))?;
		let previous = self.state()?.data.get(name).cloned();
		validate_property(name, value, previous.as_ref(), ty, flags)
	}

	/// Equivalent to [`set_with`](`Model::set_with`) without flags.
	///
	/// # Errors
	///
	/// See [`set_with`](`Model::set_with`).
	pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<bool> {
		self.set_with(name, value, Flags::empty())
	}

	/// Validates and stores `value`, then notifies subscribers if it changed.
	///
	/// Returns whether the value changed.
	///
	/// # Errors
	///
	/// Validation errors, [`Error::UndeclaredProperty`], [`Error::Destroyed`], and storage errors from auto-save.
	pub fn set_with(&self, name: &str, value: impl Into<Value>, flags: Flags) -> Result<bool> {
		let value = value.into();
		let span = trace_span!("set", class = self.class_name(), property = name);
		let _enter = span.enter();
		#[cfg(feature = "dangerous-logging")]
		trace!(?value);

		let Validated {
			value,
			previous,
			changed,
			released,
		} = self.validate_property(name, value, flags)?;
		{
			let mut state = self.state_mut()?;
			state.data.insert(name.to_owned(), value.clone());
			self.mark_changed(&mut state, name, changed);
		}
		if !flags.contains(Flags::NO_DESTROY) {
			for model in released {
				model.destroy();
			}
		}
		self.changed_and_callbacks(name, &value, Some(&previous), changed, flags)
	}

	fn mark_changed(&self, state: &mut State, name: &str, changed: bool) {
		if !changed {
			return;
		}
		state.changed = true;
		if !state.settled() {
			trace!(property = name, "Deferred property.");
			state.deferred.insert(name.to_owned());
		}
	}

	fn changed_and_callbacks(&self, name: &str, value: &Value, previous: Option<&Value>, changed: bool, flags: Flags) -> Result<bool> {
		if !flags.contains(Flags::NO_CALLBACKS) && (changed || flags.contains(Flags::FORCE_CALLBACKS)) {
			self.notify(name, value, previous);
		}
		if changed && !flags.contains(Flags::NO_SAVE) && self.0.class.storage().map_or(false, |config| config.auto_save) {
			self.save()?;
		}
		Ok(changed)
	}

	fn notify(&self, name: &str, value: &Value, previous: Option<&Value>) {
		let subscriptions = match self.0.state.borrow().subscriptions.get(name) {
			Some(subscriptions) => subscriptions.clone(),
			None => return,
		};
		trace!(property = name, count = subscriptions.len(), "Running callbacks.");
		for subscription in &subscriptions {
			Self::invoke(self, name, value, previous, subscription);
		}
	}

	fn invoke(model: &Model, name: &str, value: &Value, previous: Option<&Value>, subscription: &Subscription) {
		(subscription.callback)(
			model,
			&Notification {
				name,
				value: subscription.aux.as_ref().unwrap_or(value),
				current: value,
				previous,
				context: subscription.context.as_ref(),
			},
		);
	}

	/// Visits every declared property in declaration order.
	///
	/// # Errors
	///
	/// [`Error::Destroyed`].
	pub fn for_each_property(&self, mut f: impl FnMut(&str, &Value)) -> Result<()> {
		let entries: Vec<(String, Value)> = {
			let state = self.state()?;
			state
				.keys
				.iter()
				.map(|key| (key.clone(), state.data.get(key).cloned().unwrap_or_default()))
				.collect()
		};
		for (name, value) in &entries {
			f(name, value);
		}
		Ok(())
	}

	/// Removes a property's value and subscribers. The declaration stays, so it can be set again.
	///
	/// Nested instances held by `MODEL`/`ARRAY_MODEL` properties are destroyed unless [`Flags::NO_DESTROY`] is set.
	/// Returns whether there was a value.
	///
	/// # Errors
	///
	/// [`Error::UndeclaredProperty`], [`Error::Destroyed`].
	pub fn delete(&self, name: &str, flags: Flags) -> Result<bool> {
		let (removed, ty) = {
			let mut state = self.state_mut()?;
			let ty = match state.declarations.get(name) {
				Some(declaration) => declaration.ty,
				None => return Err(self.undeclared(name)),
			};
			state.subscriptions.remove(name);
			state.deferred.remove(name);
			let removed = state.data.remove(name);
			if removed.is_some() {
				state.changed = true;
			}
			(removed, ty)
		};
		let existed = removed.as_ref().map_or(false, |value| !value.is_null());
		if let (Some(value), false) = (removed, flags.contains(Flags::NO_DESTROY)) {
			if ty.owns_models() {
				for model in owned_models(&value) {
					model.destroy();
				}
			}
		}
		Ok(existed)
	}

	/// Resets a property to a fresh zero value of its declared type, through [`set_with`](`Model::set_with`).
	///
	/// # Errors
	///
	/// See [`set_with`](`Model::set_with`).
	pub fn clear_property(&self, name: &str) -> Result<bool> {
		self.clear_property_with(name, Flags::empty())
	}

	/// # Errors
	///
	/// See [`set_with`](`Model::set_with`).
	pub fn clear_property_with(&self, name: &str, flags: Flags) -> Result<bool> {
		let ty = self.resolve_type(name, None)?;
		self.set_with(name, ty.default_value(), flags)
	}

	/// [`clear_property`](`Model::clear_property`) for every declared property. Returns whether anything changed.
	///
	/// # Errors
	///
	/// See [`set_with`](`Model::set_with`).
	pub fn clear(&self, flags: Flags) -> Result<bool> {
		let keys = self.state()?.keys.clone();
		let mut changed = false;
		for name in keys {
			changed |= self.clear_property_with(&name, flags)?;
		}
		Ok(changed)
	}

	/// Subscribes `callback` to one or several properties.
	///
	/// # Errors
	///
	/// See [`on_with`](`Model::on_with`).
	pub fn on(&self, names: impl IntoNames, callback: Callback) -> Result<()> {
		self.on_with(names, callback, OnOptions::default())
	}

	/// Subscribes with per-name contexts and auxiliary data.
	///
	/// The callback runs once right away if [`Flags::IMMEDIATELY`] is set, or if the property was
	/// written before the instance settled, so that late subscribers catch up.
	///
	/// # Errors
	///
	/// [`Error::UndeclaredProperty`] unless the class allows implicit properties, [`Error::Destroyed`].
	pub fn on_with(&self, names: impl IntoNames, callback: Callback, options: OnOptions) -> Result<()> {
		let OnOptions { contexts, aux, flags } = options;
		for (i, name) in names.into_names().into_iter().enumerate() {
			self.resolve_type(&name, None)?;
			let subscription = Subscription {
				callback: Rc::clone(&callback),
				context: contexts.get(i).cloned().flatten(),
				aux: aux.get(i).cloned().flatten(),
			};
			let (immediately, value) = {
				let mut state = self.state_mut()?;
				state.subscriptions.entry(name.clone()).or_default().push(subscription.clone());
				let catch_up = state.deferred.contains(&name);
				if catch_up {
					trace!(property = name.as_str(), "Catching up deferred property.");
				}
				(
					flags.contains(Flags::IMMEDIATELY) || catch_up,
					state.data.get(&name).cloned().unwrap_or_default(),
				)
			};
			if immediately {
				Self::invoke(self, &name, &value, None, &subscription);
			}
		}
		Ok(())
	}

	/// Unsubscribes: everything, everything for `name`, or matching `callback`s for `name`.
	///
	/// Returns how many subscriptions were removed.
	pub fn off(&self, name: Option<&str>, callback: Option<&Callback>) -> usize {
		let mut state = self.0.state.borrow_mut();
		match (name, callback) {
			(None, None) => state.subscriptions.drain().map(|(_, subscriptions)| subscriptions.len()).sum(),
			(None, Some(callback)) => state
				.subscriptions
				.values_mut()
				.map(|subscriptions| {
					let before = subscriptions.len();
					subscriptions.retain(|s| !s.matches(callback));
					before - subscriptions.len()
				})
				.sum(),
			(Some(name), None) => state.subscriptions.remove(name).map_or(0, |subscriptions| subscriptions.len()),
			(Some(name), Some(callback)) => match state.subscriptions.get_mut(name) {
				Some(subscriptions) => {
					let before = subscriptions.len();
					subscriptions.retain(|s| !s.matches(callback));
					before - subscriptions.len()
				}
				None => 0,
			},
		}
	}

	/// Runs `name`'s callbacks with the current value, whether or not it changed.
	///
	/// # Errors
	///
	/// [`Error::UndeclaredProperty`], [`Error::Destroyed`].
	pub fn trigger(&self, name: &str) -> Result<()> {
		let value = self.get(name)?;
		self.notify(name, &value, None);
		Ok(())
	}

	/// Calls a method registered on the class.
	///
	/// # Errors
	///
	/// [`Error::UnknownMethod`], [`Error::Destroyed`].
	pub fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
		self.state()?;
		let method = self.0.class.method(method).cloned().ok_or_else(|| Error::UnknownMethod {
			class: self.class_name().to_owned(),
			name: method.to_owned(),
		})?;
		Ok(method(self, args))
	}

	/// Runs `hook` when the instance is destroyed. Views use this to detach their DOM.
	pub fn on_destroy(&self, hook: impl 'static + FnOnce(&Model)) {
		if self.is_destroyed() {
			return hook(self);
		}
		self.0.destroy_hooks.borrow_mut().push(Box::new(hook));
	}

	/// Unsubscribes everything, destroys owned nested instances, runs destroy hooks and unregisters.
	///
	/// Destroying twice is a no-op.
	#[instrument(skip(self), fields(class = self.class_name(), uuid = self.uuid()))]
	pub fn destroy(&self) {
		let owned = {
			let mut state = self.0.state.borrow_mut();
			if state.destroyed {
				trace!("Already destroyed.");
				return;
			}
			state.destroyed = true;
			state.subscriptions.clear();
			state.deferred.clear();
			let state = &mut *state;
			let mut owned = Vec::new();
			for (name, value) in state.data.drain() {
				if state.declarations.get(&name).map_or(false, |declaration| declaration.ty.owns_models()) {
					owned.extend(owned_models(&value));
				}
			}
			owned
		};
		for model in owned {
			model.destroy();
		}
		let hooks = core::mem::take(&mut *self.0.destroy_hooks.borrow_mut());
		for hook in hooks {
			hook(self);
		}
		self.0.registry.unregister(self);
		debug!("Destroyed instance.");
	}

	/// Runs the class initializer. Scheduled by the constructor.
	fn run_initialize(&self) {
		if self.is_destroyed() {
			return;
		}
		let span = trace_span!("initialize", class = self.class_name(), uuid = self.uuid());
		let _enter = span.enter();

		let result = match self.0.class.initializer() {
			Some(initializer) => initializer(self),
			None => Ok(()),
		};
		let mut state = self.0.state.borrow_mut();
		state.init_ran = true;
		match result {
			Ok(()) => state.initialized = true,
			Err(error) => {
				error!("Initialization failed: {}", error);
				state.init_error = Some(error);
			}
		}
		if state.settled() {
			state.deferred.clear();
		}
	}

	/// Marks that a view will bind this instance. Writes stay deferred until [`finish_binding`](`Model::finish_binding`).
	pub(crate) fn begin_binding(&self) {
		self.0.state.borrow_mut().binding_pending = true;
	}

	/// Ends the binding phase and returns the deferred properties in declaration order.
	pub(crate) fn finish_binding(&self) -> Vec<String> {
		let mut state = self.0.state.borrow_mut();
		state.binding_pending = false;
		let deferred = core::mem::take(&mut state.deferred);
		let mut names: Vec<String> = state.keys.iter().filter(|key| deferred.contains(*key)).cloned().collect();
		names.extend(deferred.iter().filter(|name| !state.keys.contains(name)).cloned());
		if !state.settled() {
			// The initializer hasn't run yet and its subscriptions still need to catch up.
			state.deferred = deferred;
		}
		names
	}

	/// Deferred properties, in no particular order.
	#[must_use]
	pub fn deferred_properties(&self) -> Vec<String> {
		self.0.state.borrow().deferred.iter().cloned().collect()
	}
}

fn owned_models(value: &Value) -> Vec<Model> {
	match value {
		Value::Model(model) => vec![model.clone()],
		Value::Array(items) => items.borrow().iter().filter_map(Value::as_model).cloned().collect(),
		_ => Vec::new(),
	}
}

impl Debug for Model {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Model")
			.field("class", &self.class_name())
			.field("uuid", &self.uuid())
			.field("uid", &self.uid())
			.finish_non_exhaustive()
	}
}

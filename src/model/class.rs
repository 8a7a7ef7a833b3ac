use super::Model;
use crate::{
	error::Result,
	types::TypeTag,
	value::Value,
};
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::rc::Rc;

/// A named method that views can call from `sg-format`, `sg-css`, `sg-attributes`, `sg-value` and `sg-click`.
pub type Method = Rc<dyn Fn(&Model, &[Value]) -> Value>;

/// Runs once, deferred, after an instance was constructed.
pub type Initializer = Rc<dyn Fn(&Model) -> Result<()>>;

/// A declared property: its default value and type.
#[derive(Debug, Clone)]
pub struct Declaration {
	pub value: Value,
	pub ty: TypeTag,
}

impl Declaration {
	pub fn new(value: impl Into<Value>, ty: TypeTag) -> Self {
		Self { value: value.into(), ty }
	}

	/// Infers the type from the default value.
	pub fn inferred(value: impl Into<Value>) -> Self {
		let value = value.into();
		Self { ty: TypeTag::infer(&value), value }
	}
}

/// Where and what an instance persists.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
	pub key: String,
	/// If set, only these properties are saved. Otherwise everything not starting with `_` is.
	pub storable: Option<Vec<String>>,
	/// Save after every change.
	pub auto_save: bool,
}

impl StorageConfig {
	#[must_use]
	pub fn is_storable(&self, name: &str) -> bool {
		match &self.storable {
			Some(storable) => storable.iter().any(|s| s == name),
			None => !name.starts_with('_'),
		}
	}
}

/// The static side of a model: what would be a subclass with `static defaults` elsewhere.
pub struct ModelClass {
	name: String,
	version: Option<String>,
	declarations: Vec<(String, Declaration)>,
	singleton: bool,
	implicit_properties: bool,
	storage: Option<StorageConfig>,
	methods: HashMap<String, Method>,
	statics: HashMap<String, Value>,
	initializer: Option<Initializer>,
}

impl ModelClass {
	pub fn builder(name: impl Into<String>) -> ModelClassBuilder {
		ModelClassBuilder(ModelClass {
			name: name.into(),
			version: None,
			declarations: Vec::new(),
			singleton: false,
			implicit_properties: false,
			storage: None,
			methods: HashMap::new(),
			statics: HashMap::new(),
			initializer: None,
		})
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn version(&self) -> Option<&str> {
		self.version.as_deref()
	}

	/// In declaration order.
	#[must_use]
	pub fn declarations(&self) -> &[(String, Declaration)] {
		&self.declarations
	}

	#[must_use]
	pub fn is_singleton(&self) -> bool {
		self.singleton
	}

	/// Whether accessing an undeclared property declares it instead of failing.
	#[must_use]
	pub fn implicit_properties(&self) -> bool {
		self.implicit_properties
	}

	#[must_use]
	pub fn storage(&self) -> Option<&StorageConfig> {
		self.storage.as_ref()
	}

	#[must_use]
	pub fn method(&self, name: &str) -> Option<&Method> {
		self.methods.get(name)
	}

	#[must_use]
	pub fn static_value(&self, name: &str) -> Option<&Value> {
		self.statics.get(name)
	}

	pub(crate) fn initializer(&self) -> Option<&Initializer> {
		self.initializer.as_ref()
	}
}

impl Debug for ModelClass {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ModelClass")
			.field("name", &self.name)
			.field("version", &self.version)
			.field("declarations", &self.declarations.iter().map(|(name, d)| (name, d.ty)).collect::<Vec<_>>())
			.field("singleton", &self.singleton)
			.field("storage", &self.storage)
			.field("methods", &self.methods.keys().collect::<Vec<_>>())
			.finish()
	}
}

#[must_use = "call `.build()` to finish the class"]
pub struct ModelClassBuilder(ModelClass);

impl ModelClassBuilder {
	fn declare(mut self, name: impl Into<String>, declaration: Declaration) -> Self {
		let name = name.into();
		match self.0.declarations.iter_mut().find(|(existing, _)| *existing == name) {
			Some(slot) => slot.1 = declaration,
			None => self.0.declarations.push((name, declaration)),
		}
		self
	}

	/// Declares a property whose type is inferred from its default value.
	pub fn default(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.declare(name, Declaration::inferred(value))
	}

	/// Declares a property with an explicit type.
	pub fn typed(self, name: impl Into<String>, value: impl Into<Value>, ty: TypeTag) -> Self {
		self.declare(name, Declaration::new(value, ty))
	}

	pub fn version(mut self, version: impl Into<String>) -> Self {
		self.0.version = Some(version.into());
		self
	}

	/// At most one live instance, reachable through [`Registry::singleton`](`crate::Registry::singleton`).
	pub fn singleton(mut self) -> Self {
		self.0.singleton = true;
		self
	}

	pub fn implicit_properties(mut self) -> Self {
		self.0.implicit_properties = true;
		self
	}

	pub fn local_storage(mut self, key: impl Into<String>) -> Self {
		self.0.storage.get_or_insert_with(StorageConfig::default).key = key.into();
		self
	}

	pub fn storable<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
		self.0.storage.get_or_insert_with(StorageConfig::default).storable = Some(names.into_iter().map(Into::into).collect());
		self
	}

	pub fn auto_save(mut self) -> Self {
		self.0.storage.get_or_insert_with(StorageConfig::default).auto_save = true;
		self
	}

	pub fn method(mut self, name: impl Into<String>, method: impl 'static + Fn(&Model, &[Value]) -> Value) -> Self {
		self.0.methods.insert(name.into(), Rc::new(method));
		self
	}

	pub fn static_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.0.statics.insert(name.into(), value.into());
		self
	}

	pub fn initialize(mut self, initializer: impl 'static + Fn(&Model) -> Result<()>) -> Self {
		self.0.initializer = Some(Rc::new(initializer));
		self
	}

	#[must_use]
	pub fn build(self) -> Rc<ModelClass> {
		Rc::new(self.0)
	}
}

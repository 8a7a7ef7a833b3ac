use super::Model;
use crate::{flags::Flags, value::Value};
use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
};
use std::rc::Rc;

/// What a callback receives.
pub struct Notification<'a> {
	pub name: &'a str,
	/// The subscription's auxiliary data if it has any, otherwise the live value.
	pub value: &'a Value,
	/// Always the live value.
	pub current: &'a Value,
	/// The previous value if this notification stems from a write.
	pub previous: Option<&'a Value>,
	pub context: Option<&'a Rc<dyn Any>>,
}

impl Debug for Notification<'_> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Notification")
			.field("name", &self.name)
			.field("has_context", &self.context.is_some())
			.finish_non_exhaustive()
	}
}

pub type Callback = Rc<dyn Fn(&Model, &Notification<'_>)>;

/// Wraps a closure as [`Callback`]. Keep the returned handle around to [`off`](`Model::off`) it later.
pub fn callback(f: impl 'static + Fn(&Model, &Notification<'_>)) -> Callback {
	Rc::new(f)
}

#[derive(Clone)]
pub(crate) struct Subscription {
	pub callback: Callback,
	pub context: Option<Rc<dyn Any>>,
	pub aux: Option<Value>,
}

impl Subscription {
	pub fn matches(&self, callback: &Callback) -> bool {
		// Compare data pointers only, vtables may be duplicated across codegen units.
		Rc::as_ptr(&self.callback).cast::<()>() == Rc::as_ptr(callback).cast::<()>()
	}
}

/// Extra parameters for [`Model::on_with`]. `contexts` and `aux` run parallel to the subscribed names.
#[derive(Default, Clone)]
pub struct OnOptions {
	pub contexts: Vec<Option<Rc<dyn Any>>>,
	pub aux: Vec<Option<Value>>,
	pub flags: Flags,
}

impl OnOptions {
	#[must_use]
	pub fn immediately() -> Self {
		Self {
			flags: Flags::IMMEDIATELY,
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_context(mut self, context: Rc<dyn Any>) -> Self {
		self.contexts.push(Some(context));
		self
	}

	#[must_use]
	pub fn with_aux(mut self, aux: impl Into<Value>) -> Self {
		self.aux.push(Some(aux.into()));
		self
	}
}

impl Debug for OnOptions {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("OnOptions")
			.field("contexts", &self.contexts.len())
			.field("aux", &self.aux)
			.field("flags", &self.flags)
			.finish()
	}
}

/// One or several property names.
pub trait IntoNames {
	fn into_names(self) -> Vec<String>;
}
impl IntoNames for &str {
	fn into_names(self) -> Vec<String> {
		vec![self.to_owned()]
	}
}
impl IntoNames for String {
	fn into_names(self) -> Vec<String> {
		vec![self]
	}
}
impl IntoNames for &[&str] {
	fn into_names(self) -> Vec<String> {
		self.iter().map(|&name| name.to_owned()).collect()
	}
}
impl<const N: usize> IntoNames for [&str; N] {
	fn into_names(self) -> Vec<String> {
		self.iter().map(|&name| name.to_owned()).collect()
	}
}
impl IntoNames for Vec<String> {
	fn into_names(self) -> Vec<String> {
		self
	}
}

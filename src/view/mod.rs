//! Binds an instance to the DOM through `sg-*` attributes.
//!
//! A [`View`] takes its place in the attach queue when it's constructed, loads its template through the
//! shared per-class cache and, once every earlier view attached, renders and binds:
//!
//! | attribute | effect |
//! |---|---|
//! | `sg-property` | two-way binds value, `checked` or content |
//! | `sg-type="dropdown"` | custom dropdown of `sg-option` items with an `sg-dropdown` display |
//! | `sg-format` | method formatting the displayed value |
//! | `sg-attributes` | `{ attr: expr }`, rendered once |
//! | `sg-value` | content from an expression, rendered once |
//! | `sg-css` | method name or expression yielding classes, kept up to date |
//! | `sg-click` | view handler or method run on click |
//! | `sg-options` | `<option>`s of a `<select>` from a collection |
//! | `sg-for`, `sg-template`, `sg-item-variables` | list rendering |
//! | `sg-model` | marks where views of a class attach |
//! | `sg-uuid` | written on the view root |
//!
//! The `sg-` prefix is configurable through [`ViewConfig::prefix`].

mod binder;
pub mod expr;
mod list;
pub mod order;
pub mod template;

pub use self::{
	binder::DisplayType,
	list::{item_hash, ForItem},
};

use self::{
	binder::{Bindings, Link},
	template::TemplateSource,
};
use crate::{
	dom::{Element, Event},
	error::{Error, Result},
	model::{callback, Model},
	scheduler,
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, error, instrument, trace, trace_span};

pub const DEFAULT_PREFIX: &str = "sg-";

/// Named `sg-click` handler with access to the view, for example to resolve list items.
pub type ClickHandler<E> = Rc<dyn Fn(&View<E>, &Event<E>)>;

/// How and where a view renders.
pub struct ViewConfig<E: Element> {
	prefix: String,
	container: Option<E>,
	root: Option<E>,
	template: Option<String>,
	handlers: HashMap<String, ClickHandler<E>>,
	debug_markers: bool,
	on_attached: Option<Rc<dyn Fn(&View<E>)>>,
}

impl<E: Element> Default for ViewConfig<E> {
	fn default() -> Self {
		Self {
			prefix: DEFAULT_PREFIX.to_owned(),
			container: None,
			root: None,
			template: None,
			handlers: HashMap::new(),
			debug_markers: cfg!(debug_assertions),
			on_attached: None,
		}
	}
}

impl<E: Element> ViewConfig<E> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = prefix.into();
		self
	}

	/// Renders into (or, without a template, binds) this element.
	#[must_use]
	pub fn container(mut self, container: E) -> Self {
		self.container = Some(container);
		self
	}

	/// Without an explicit container, the view attaches under the first `sg-model="<class>"` element below `root`.
	/// List templates are also looked up here.
	#[must_use]
	pub fn root(mut self, root: E) -> Self {
		self.root = Some(root);
		self
	}

	/// Renders a copy of this template into the container. Without one, the container's existing markup is bound.
	#[must_use]
	pub fn template(mut self, name: impl Into<String>) -> Self {
		self.template = Some(name.into());
		self
	}

	#[must_use]
	pub fn handler(mut self, name: impl Into<String>, handler: impl 'static + Fn(&View<E>, &Event<E>)) -> Self {
		self.handlers.insert(name.into(), Rc::new(handler));
		self
	}

	/// Whether to write `sg-uuid` on the view root. On by default in debug builds.
	#[must_use]
	pub fn debug_markers(mut self, enabled: bool) -> Self {
		self.debug_markers = enabled;
		self
	}

	#[must_use]
	pub fn on_attached(mut self, callback: impl 'static + Fn(&View<E>)) -> Self {
		self.on_attached = Some(Rc::new(callback));
		self
	}
}

impl<E: Element + Debug> Debug for ViewConfig<E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ViewConfig")
			.field("prefix", &self.prefix)
			.field("container", &self.container)
			.field("template", &self.template)
			.field("handlers", &self.handlers.keys().collect::<Vec<_>>())
			.field("debug_markers", &self.debug_markers)
			.finish_non_exhaustive()
	}
}

struct ViewState<E: Element> {
	attached: bool,
	detached: bool,
	container: Option<E>,
	/// Elements rendered from the template. Empty when the container was bound in place.
	roots: Vec<E>,
	bindings: Option<Bindings<E>>,
	error: Option<Error>,
}

struct ViewInner<E: Element> {
	model: Model,
	config: ViewConfig<E>,
	state: RefCell<ViewState<E>>,
}

/// A bound instance. Clones refer to the same view.
pub struct View<E: Element>(Rc<ViewInner<E>>);

impl<E: Element> Clone for View<E> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

pub(crate) struct WeakView<E: Element>(Weak<ViewInner<E>>);

impl<E: Element> Clone for WeakView<E> {
	fn clone(&self) -> Self {
		Self(Weak::clone(&self.0))
	}
}

impl<E: Element> WeakView<E> {
	pub fn upgrade(&self) -> Option<View<E>> {
		self.0.upgrade().map(View)
	}
}

impl<E: Element> View<E> {
	/// Creates a view of `model`. It attaches once its template is available, every view constructed
	/// before it attached, and the instance's initializer ran.
	///
	/// Writes to `model` stay deferred until then, so that late subscribers catch up.
	#[instrument(skip_all, fields(class = model.class_name(), uuid = model.uuid()))]
	pub fn new(model: &Model, config: ViewConfig<E>, templates: &dyn TemplateSource) -> Self {
		model.begin_binding();
		let view = Self(Rc::new(ViewInner {
			model: model.clone(),
			state: RefCell::new(ViewState {
				attached: false,
				detached: false,
				container: None,
				roots: Vec::new(),
				bindings: None,
				error: None,
			}),
			config,
		}));

		let weak = view.downgrade();
		model.on_destroy(move |_| {
			if let Some(view) = weak.upgrade() {
				view.detach();
			}
		});

		let ticket = order::enqueue();
		let weak = view.downgrade();
		let attach = move |template: Result<Option<String>>| {
			// Deferred, so that the instance's initializer runs first.
			scheduler::defer(move || {
				order::ready(ticket, move || {
					if let Some(view) = weak.upgrade() {
						view.attach(template);
					}
				});
			});
		};
		match &view.0.config.template {
			Some(name) => template::load_shared(model.class_name(), name, templates, Box::new(move |result| attach(result.map(Some)))),
			None => attach(Ok(None)),
		}
		view
	}

	#[must_use]
	pub fn model(&self) -> &Model {
		&self.0.model
	}

	#[must_use]
	pub fn prefix(&self) -> &str {
		&self.0.config.prefix
	}

	/// The prefixed attribute name, for example `sg-property` for `"property"`.
	#[must_use]
	pub fn attribute(&self, name: &str) -> String {
		format!("{}{}", self.0.config.prefix, name)
	}

	#[must_use]
	pub fn is_attached(&self) -> bool {
		self.0.state.borrow().attached
	}

	#[must_use]
	pub fn container(&self) -> Option<E> {
		self.0.state.borrow().container.clone()
	}

	/// Elements rendered from the template.
	#[must_use]
	pub fn roots(&self) -> Vec<E> {
		self.0.state.borrow().roots.clone()
	}

	/// Why attaching failed, if it did.
	#[must_use]
	pub fn error(&self) -> Option<Error> {
		self.0.state.borrow().error.clone()
	}

	pub(crate) fn downgrade(&self) -> WeakView<E> {
		WeakView(Rc::downgrade(&self.0))
	}

	pub(crate) fn handler(&self, name: &str) -> Option<ClickHandler<E>> {
		self.0.config.handlers.get(name).cloned()
	}

	pub(crate) fn value_links_on(&self, element: &E) -> Vec<Rc<Link<E>>> {
		self.0
			.state
			.borrow()
			.bindings
			.as_ref()
			.map(|bindings| bindings.value_links_on(element))
			.unwrap_or_default()
	}

	fn find_container(&self) -> Result<E> {
		if let Some(container) = &self.0.config.container {
			return Ok(container.clone());
		}
		let marker = self.attribute("model");
		self.0
			.config
			.root
			.as_ref()
			.and_then(|root| {
				if root.get_attribute(&marker).as_deref() == Some(self.model().class_name()) {
					Some(root.clone())
				} else {
					root.find_by_attribute(&marker, self.model().class_name())
				}
			})
			.ok_or_else(|| Error::MissingContainer(format!("{}=\"{}\" element", marker, self.model().class_name())))
	}

	/// Finds `<template id="name">` near `element`: in the view's configured root, or in `element`'s document.
	pub(crate) fn find_template(&self, element: &E, name: &str) -> Result<String> {
		let mut top = element.clone();
		while let Some(parent) = top.parent() {
			top = parent;
		}
		core::iter::once(top)
			.chain(self.0.config.root.clone())
			.find_map(|root| root.find_by_attribute("id", name).and_then(|template| template.template_html()))
			.ok_or_else(|| Error::MissingTemplate(name.to_owned()))
	}

	/// Renders (if there is a template), binds, and refreshes deferred properties once.
	fn attach(&self, template: Result<Option<String>>) {
		let model = self.model().clone();
		if model.is_destroyed() || self.0.state.borrow().detached {
			return;
		}
		let span = trace_span!("attach", class = model.class_name(), uuid = model.uuid());
		let _enter = span.enter();

		let container = match self.find_container() {
			Ok(container) => container,
			Err(error) => {
				error!("Nowhere to attach: {}", error);
				self.0.state.borrow_mut().error = Some(error);
				model.finish_binding();
				return;
			}
		};
		self.0.state.borrow_mut().container = Some(container.clone());

		let roots = match template {
			Ok(Some(html)) => container.append_html(&html),
			Ok(None) => Vec::new(),
			Err(error) => {
				binder::show_error(self, &container, &error);
				self.0.state.borrow_mut().error = Some(error);
				model.finish_binding();
				return;
			}
		};
		let scopes = if roots.is_empty() { vec![container] } else { roots.clone() };
		if self.0.config.debug_markers {
			let marker = self.attribute("uuid");
			for scope in &scopes {
				scope.set_attribute(&marker, model.uuid());
			}
		}
		self.0.state.borrow_mut().roots = roots;

		self.bind(&scopes);
		let deferred = model.finish_binding();
		trace!(?deferred, "Refreshing deferred properties.");
		for name in &deferred {
			self.refresh(name);
		}

		self.0.state.borrow_mut().attached = true;
		debug!("Attached view.");
		if let Some(on_attached) = self.0.config.on_attached.clone() {
			on_attached(self);
		}
	}

	fn bind(&self, scopes: &[E]) {
		let bindings = binder::bind(self, scopes);
		let names = bindings.order().to_vec();
		let constant = bindings.constant().to_vec();
		self.0.state.borrow_mut().bindings = Some(bindings);

		// Initial render, in link order.
		for name in &names {
			self.refresh(name);
		}
		for link in &constant {
			binder::refresh_element(self, link);
		}

		let weak = self.downgrade();
		let callback = callback(move |_, notification| {
			if let Some(view) = weak.upgrade() {
				view.refresh(notification.name);
			}
		});
		// Subscribing can call back right away for deferred properties, so no borrow may be held.
		if let Err(error) = self.model().on(names, Rc::clone(&callback)) {
			error!("Failed to subscribe: {}", error);
		}
		if let Some(bindings) = &mut self.0.state.borrow_mut().bindings {
			bindings.callback = Some(callback);
		}
	}

	/// Re-renders every element linked to `name`.
	pub fn refresh(&self, name: &str) {
		let links = match &self.0.state.borrow().bindings {
			Some(bindings) => bindings.links_of(name),
			None => return,
		};
		for link in &links {
			binder::refresh_element(self, link);
		}
	}

	fn teardown(&self) {
		let bindings = self.0.state.borrow_mut().bindings.take();
		if let Some(bindings) = bindings {
			bindings.teardown(self.model());
		}
	}

	/// Tears down all listeners, links and subscriptions and binds the same elements again.
	pub fn rebind(&self) {
		if !self.is_attached() {
			return;
		}
		self.teardown();
		let scopes = {
			let state = self.0.state.borrow();
			if state.roots.is_empty() {
				state.container.clone().into_iter().collect()
			} else {
				state.roots.clone()
			}
		};
		self.bind(&scopes);
	}

	/// Unbinds and removes rendered elements. Runs automatically when the instance is destroyed.
	pub fn detach(&self) {
		self.teardown();
		let (roots, container) = {
			let mut state = self.0.state.borrow_mut();
			state.detached = true;
			state.attached = false;
			(core::mem::take(&mut state.roots), state.container.clone())
		};
		if roots.is_empty() {
			if let Some(container) = container {
				container.remove_attribute(&self.attribute("uuid"));
			}
		}
		for root in roots {
			root.remove();
		}
		debug!(uuid = self.model().uuid(), "Detached view.");
	}

	/// Resolves the list item an element (usually an event target) belongs to.
	#[must_use]
	pub fn get_for_item(&self, element: &E) -> Option<ForItem> {
		list::find_item(self, element)
	}
}

impl<E: Element> Debug for View<E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let state = self.0.state.borrow();
		f.debug_struct("View")
			.field("model", &self.0.model)
			.field("attached", &state.attached)
			.field("roots", &state.roots.len())
			.field("links", &state.bindings.as_ref().map(Bindings::link_count))
			.finish()
	}
}

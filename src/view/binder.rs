//! Attribute scanning and the links between properties and elements.

use super::{
	expr::{self, Expr},
	list, View, WeakView,
};
use crate::{
	dom::{escape_html, Element, Event, Handler, ListenerGuard},
	error::{Error, Result},
	model::{Callback, Model},
	value::Value,
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{error, trace, trace_span, warn};

/// How a `sg-property` element displays its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayType {
	Checkbox,
	Range,
	Number,
	Date,
	Select,
	Textarea,
	Text,
	/// A custom widget: `sg-option` items and an `sg-dropdown` display element.
	Dropdown,
	/// Anything that isn't a form control shows the value as its content.
	Html,
}

impl DisplayType {
	fn of<E: Element>(element: &E, type_attribute: Option<&str>) -> Self {
		if type_attribute == Some("dropdown") {
			return DisplayType::Dropdown;
		}
		match element.tag_name().as_str() {
			"select" => DisplayType::Select,
			"textarea" => DisplayType::Textarea,
			"input" => match element.get_attribute("type").unwrap_or_default().to_ascii_lowercase().as_str() {
				"checkbox" => DisplayType::Checkbox,
				"range" => DisplayType::Range,
				"number" => DisplayType::Number,
				"date" => DisplayType::Date,
				_ => DisplayType::Text,
			},
			_ => DisplayType::Html,
		}
	}
}

pub(crate) enum LinkKind {
	Value {
		display: DisplayType,
		format: Option<String>,
	},
	Css {
		expr: Expr,
		/// Classes the element had when it was bound.
		static_classes: Vec<String>,
	},
	For {
		template: Result<String>,
		variables: Vec<(String, Expr)>,
		clones: RefCell<Vec<ListenerGuard>>,
	},
	Options,
}

pub(crate) struct Link<E: Element> {
	pub element: E,
	/// The property the link was declared for. Css links are listed under each of their dependencies.
	pub property: String,
	pub kind: LinkKind,
}

impl<E: Element> Debug for Link<E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let kind = match &self.kind {
			LinkKind::Value { display, .. } => format!("Value({:?})", display),
			LinkKind::Css { .. } => "Css".to_owned(),
			LinkKind::For { .. } => "For".to_owned(),
			LinkKind::Options => "Options".to_owned(),
		};
		f.debug_struct("Link").field("property", &self.property).field("kind", &kind).finish()
	}
}

/// Everything one bind pass set up. Dropping it removes the DOM listeners, [`Bindings::teardown`] also unsubscribes.
pub(crate) struct Bindings<E: Element> {
	links: HashMap<String, Vec<Rc<Link<E>>>>,
	/// Linked properties in the order they were first linked.
	order: Vec<String>,
	/// Links without any property dependency, refreshed once.
	constant: Vec<Rc<Link<E>>>,
	listeners: Vec<ListenerGuard>,
	pub callback: Option<Callback>,
}

impl<E: Element> Bindings<E> {
	fn new() -> Self {
		Self {
			links: HashMap::new(),
			order: Vec::new(),
			constant: Vec::new(),
			listeners: Vec::new(),
			callback: None,
		}
	}

	fn link(&mut self, names: &[String], link: Link<E>) {
		let link = Rc::new(link);
		if names.is_empty() {
			self.constant.push(link);
			return;
		}
		for name in names {
			if !self.links.contains_key(name) {
				self.order.push(name.clone());
			}
			self.links.entry(name.clone()).or_default().push(Rc::clone(&link));
		}
	}

	pub fn links_of(&self, name: &str) -> Vec<Rc<Link<E>>> {
		self.links.get(name).cloned().unwrap_or_default()
	}

	pub fn order(&self) -> &[String] {
		&self.order
	}

	pub fn constant(&self) -> &[Rc<Link<E>>] {
		&self.constant
	}

	/// Value links on `element`.
	pub fn value_links_on(&self, element: &E) -> Vec<Rc<Link<E>>> {
		self.order
			.iter()
			.flat_map(|name| self.links[name].iter())
			.filter(|link| link.element.same_node(element) && matches!(link.kind, LinkKind::Value { .. }))
			.cloned()
			.collect()
	}

	pub fn link_count(&self) -> usize {
		self.links.values().map(Vec::len).sum::<usize>() + self.constant.len()
	}

	pub fn teardown(self, model: &Model) {
		if let Some(callback) = &self.callback {
			model.off(None, Some(callback));
		}
		trace!(listeners = self.listeners.len(), "Tearing down bindings.");
	}
}

/// Writes an inline error message into `element`.
pub(crate) fn show_error<E: Element>(view: &View<E>, element: &E, error: &Error) {
	error!("{}", error);
	element.set_inner_html(&format!(r#"<div class="{}error">{}</div>"#, view.prefix(), escape_html(&error.to_string())));
}

/// Wires `sg-click`: a view handler if one has the name, otherwise a class method.
///
/// Inside a rendered list item, methods receive the item's value and index.
pub(crate) fn click_listener<E: Element>(view: &View<E>, element: &E, name: &str) -> Option<ListenerGuard> {
	let weak = view.downgrade();
	let name = name.to_owned();
	if let Some(handler) = view.handler(&name) {
		return Some(element.add_event_listener(
			"click",
			Rc::new(move |event: &Event<E>| {
				if let Some(view) = weak.upgrade() {
					handler(&view, event);
				}
			}),
		));
	}
	if view.model().class().method(&name).is_none() {
		warn!(handler = name.as_str(), "Unknown click handler.");
		return None;
	}
	Some(element.add_event_listener(
		"click",
		Rc::new(move |event: &Event<E>| {
			if let Some(view) = weak.upgrade() {
				let args = match view.get_for_item(&event.target) {
					Some(item) => vec![item.value, Value::from(item.index)],
					None => Vec::new(),
				};
				if let Err(error) = view.model().call(&name, &args) {
					warn!("Click handler failed: {}", error);
				}
			}
		}),
	))
}

fn set_from_dom(weak: &WeakView<impl Element>, property: &str, value: Value) {
	if let Some(view) = weak.upgrade() {
		if let Err(error) = view.model().set(property, value) {
			warn!(property, "Rejected input: {}", error);
		}
	}
}

struct Scanner<'a, E: Element> {
	view: &'a View<E>,
	bindings: Bindings<E>,
}

impl<'a, E: Element> Scanner<'a, E> {
	fn attribute(&self, element: &E, name: &str) -> Option<String> {
		element
			.get_attribute(&self.view.attribute(name))
			.map(|value| value.trim().to_owned())
			.filter(|value| !value.is_empty())
	}

	fn model(&self) -> &Model {
		self.view.model()
	}

	fn scan(&mut self, element: &E) {
		if element.tag_name() == "template" {
			return;
		}
		self.bind_element(element);
		if self.attribute(element, "for").is_some() {
			return;
		}
		for child in element.children() {
			self.scan(&child);
		}
	}

	fn parse_checked(&self, source: &str) -> Result<Expr> {
		let expr = expr::parse(source)?;
		expr.check(self.model(), source)?;
		Ok(expr)
	}

	fn bind_element(&mut self, element: &E) {
		if let Some(source) = self.attribute(element, "attributes") {
			self.static_attributes(element, &source);
		}
		if let Some(source) = self.attribute(element, "value") {
			match self.parse_checked(&source) {
				Ok(expr) => element.set_inner_html(&expr.eval(self.model()).to_display_string()),
				Err(error) => warn!("Skipping sg-value: {}", error),
			}
		}
		if let Some(property) = self.attribute(element, "property") {
			self.property(element, property);
		}
		if let Some(property) = self.attribute(element, "options") {
			if self.known(&property) {
				self.bindings.link(
					&[property.clone()],
					Link {
						element: element.clone(),
						property,
						kind: LinkKind::Options,
					},
				);
			}
		}
		if let Some(source) = self.attribute(element, "css") {
			self.css(element, &source);
		}
		if let Some(name) = self.attribute(element, "click") {
			self.bindings.listeners.extend(click_listener(self.view, element, &name));
		}
		if let Some(property) = self.attribute(element, "for") {
			self.list(element, property);
		}
	}

	fn known(&self, property: &str) -> bool {
		let known = self.model().declared_type(property).is_some() || self.model().class().implicit_properties();
		if !known {
			warn!(property, "Skipping binding to an undeclared property.");
		}
		known
	}

	fn static_attributes(&self, element: &E, source: &str) {
		let entries = match expr::parse_object(source) {
			Ok(entries) => entries,
			Err(error) => return warn!("Skipping sg-attributes: {}", error),
		};
		for (name, expr) in entries {
			if let Err(error) = expr.check(self.model(), source) {
				warn!(attribute = name.as_str(), "Skipping computed attribute: {}", error);
				continue;
			}
			match expr.eval(self.model()) {
				Value::Null | Value::Boolean(false) => element.remove_attribute(&name),
				Value::Boolean(true) => element.set_attribute(&name, ""),
				value => element.set_attribute(&name, &value.to_display_string()),
			}
		}
	}

	fn property(&mut self, element: &E, property: String) {
		if !self.known(&property) {
			return;
		}
		let display = DisplayType::of(element, self.attribute(element, "type").as_deref());
		let format = self.attribute(element, "format").filter(|format| {
			let exists = self.model().class().method(format).is_some();
			if !exists {
				warn!(format = format.as_str(), "Ignoring unknown formatter.");
			}
			exists
		});

		let weak = self.view.downgrade();
		match display {
			DisplayType::Html => {}
			DisplayType::Dropdown => {
				let option_attribute = self.view.attribute("option");
				for option in element.descendants().into_iter().filter(|option| option.has_attribute(&option_attribute)) {
					let value = option.get_attribute(&option_attribute).unwrap_or_default();
					let weak = weak.clone();
					let property = property.clone();
					let handler: Handler<E> = Rc::new(move |_: &Event<E>| set_from_dom(&weak, &property, Value::from(value.as_str())));
					self.bindings.listeners.push(option.add_event_listener("click", handler));
				}
			}
			_ => {
				let kind = if display == DisplayType::Range { "input" } else { "change" };
				let source = element.clone();
				let name = property.clone();
				let handler: Handler<E> = Rc::new(move |_: &Event<E>| {
					let value = if display == DisplayType::Checkbox {
						Value::Boolean(source.checked())
					} else {
						Value::String(source.value())
					};
					set_from_dom(&weak, &name, value);
				});
				self.bindings.listeners.push(element.add_event_listener(kind, handler));
			}
		}

		self.bindings.link(
			&[property.clone()],
			Link {
				element: element.clone(),
				property,
				kind: LinkKind::Value { display, format },
			},
		);
	}

	fn css(&mut self, element: &E, source: &str) {
		let model = self.model().clone();
		// A bare method name is called without arguments and may read anything.
		let (expr, dependencies) = if model.class().method(source).is_some() {
			(Expr::Call(source.to_owned(), Vec::new()), model.keys())
		} else {
			match self.parse_checked(source) {
				Ok(expr) => {
					let dependencies = expr.dependencies(&model);
					(expr, dependencies)
				}
				Err(error) => return warn!("Skipping sg-css: {}", error),
			}
		};
		// Classes rendered by an earlier binding must not become static on rebind.
		let marker = self.view.attribute("static-class");
		let static_classes = match element.get_attribute(&marker) {
			Some(recorded) => recorded.split_whitespace().map(ToOwned::to_owned).collect(),
			None => {
				let classes = element.class_names();
				element.set_attribute(&marker, &classes.join(" "));
				classes
			}
		};
		self.bindings.link(
			&dependencies,
			Link {
				element: element.clone(),
				property: dependencies.first().cloned().unwrap_or_default(),
				kind: LinkKind::Css { expr, static_classes },
			},
		);
	}

	fn list(&mut self, host: &E, property: String) {
		if !self.known(&property) {
			return;
		}
		let template = match self.attribute(host, "template") {
			Some(name) => self.view.find_template(host, &name),
			None => Err(Error::MissingTemplate(format!("{}template on the {} list", self.view.prefix(), property))),
		};
		let mut dependencies = vec![property.clone()];
		let variables = match self.attribute(host, "item-variables") {
			Some(source) => match expr::parse_object(&source) {
				Ok(entries) => entries
					.into_iter()
					.filter(|(name, expr)| match expr.check(self.model(), &source) {
						Ok(()) => true,
						Err(error) => {
							warn!(variable = name.as_str(), "Skipping item variable: {}", error);
							false
						}
					})
					.collect(),
				Err(error) => {
					warn!("Skipping sg-item-variables: {}", error);
					Vec::new()
				}
			},
			None => Vec::new(),
		};
		// Variables reading properties make the list re-render when those change.
		for (_, expr) in &variables {
			for dependency in expr.dependencies(self.model()) {
				if !dependencies.contains(&dependency) {
					dependencies.push(dependency);
				}
			}
		}
		self.bindings.link(
			&dependencies,
			Link {
				element: host.clone(),
				property,
				kind: LinkKind::For {
					template,
					variables,
					clones: RefCell::new(Vec::new()),
				},
			},
		);
	}
}

/// Scans `scopes` depth-first and links every recognized attribute. Nothing is rendered yet.
pub(crate) fn bind<E: Element>(view: &View<E>, scopes: &[E]) -> Bindings<E> {
	let span = trace_span!("bind", class = view.model().class_name(), uuid = view.model().uuid());
	let _enter = span.enter();

	let mut scanner = Scanner {
		view,
		bindings: Bindings::new(),
	};
	for scope in scopes {
		scanner.scan(scope);
	}
	trace!(
		links = scanner.bindings.link_count(),
		listeners = scanner.bindings.listeners.len(),
		"Bound."
	);
	scanner.bindings
}

fn format_value(model: &Model, format: Option<&str>, value: &Value) -> String {
	match format {
		Some(format) => match model.call(format, &[value.clone()]) {
			Ok(formatted) => formatted.to_display_string(),
			Err(error) => {
				warn!("Formatter failed: {}", error);
				value.to_display_string()
			}
		},
		None => value.to_display_string(),
	}
}

fn class_names(value: &Value) -> Vec<String> {
	match value {
		Value::String(classes) => classes.split_whitespace().map(ToOwned::to_owned).collect(),
		Value::Array(items) | Value::Set(items) => items.borrow().iter().flat_map(|item| class_names(item)).collect(),
		Value::Object(object) => object
			.borrow()
			.iter()
			.filter(|(_, enabled)| enabled.is_truthy())
			.map(|(name, _)| name.clone())
			.collect(),
		Value::Function(function) => class_names(&function.call(&[])),
		_ => Vec::new(),
	}
}

fn option_markup(item: &Value) -> String {
	let (value, label) = match item {
		Value::Object(_) | Value::Model(_) => {
			let value = item.field("value").or_else(|| item.field("id")).unwrap_or_default();
			let label = ["label", "text", "name"]
				.iter()
				.find_map(|field| item.field(field).filter(|label| !label.is_null()))
				.unwrap_or_else(|| value.clone());
			(value.to_display_string(), label.to_display_string())
		}
		_ => (item.to_display_string(), item.to_display_string()),
	};
	format!(r#"<option value="{}">{}</option>"#, escape_html(&value), escape_html(&label))
}

/// Renders the current state of `link.property` (or, for css links, of the whole expression) into the element.
pub(crate) fn refresh_element<E: Element>(view: &View<E>, link: &Link<E>) {
	let model = view.model();
	let element = &link.element;
	match &link.kind {
		LinkKind::Value { display, format } => {
			let value = match model.get(&link.property) {
				Ok(value) => value,
				Err(error) => return warn!("Can't refresh: {}", error),
			};
			#[cfg(feature = "dangerous-logging")]
			trace!(property = link.property.as_str(), ?value, "Refreshing element.");
			let text = format_value(model, format.as_deref(), &value);
			match display {
				DisplayType::Checkbox => element.set_checked(value.is_truthy()),
				DisplayType::Html => element.set_inner_html(&text),
				DisplayType::Dropdown => {
					let option_attribute = view.attribute("option");
					let raw = value.to_display_string();
					let mut label = None;
					for option in element.descendants().into_iter().filter(|option| option.has_attribute(&option_attribute)) {
						let selected = option.get_attribute(&option_attribute).as_deref() == Some(raw.as_str());
						let mut classes = option.class_names();
						classes.retain(|class| class != "selected");
						if selected {
							classes.push("selected".to_owned());
							label = Some(option.inner_html());
						}
						option.set_class_names(&classes);
					}
					let display_attribute = view.attribute("dropdown");
					let target = element
						.descendants()
						.into_iter()
						.find(|candidate| candidate.has_attribute(&display_attribute))
						.unwrap_or_else(|| element.clone());
					target.set_inner_html(&label.unwrap_or_else(|| escape_html(&text)));
				}
				_ => {
					if element.value() != text {
						element.set_value(&text);
					}
				}
			}
		}
		LinkKind::Css { expr, static_classes } => {
			let mut classes = static_classes.clone();
			for class in class_names(&expr.eval(model)) {
				if !classes.contains(&class) {
					classes.push(class);
				}
			}
			element.set_class_names(&classes);
		}
		LinkKind::Options => {
			let items = model.get(&link.property).unwrap_or_default();
			element.clear_children();
			let markup: String = list::entries(&items).iter().map(|(_, item)| option_markup(item)).collect();
			element.append_html(&markup);
			// Options replace the selection, so the select's own value binding renders again.
			for value_link in view.value_links_on(element) {
				refresh_element(view, &value_link);
			}
		}
		LinkKind::For { template, variables, clones } => list::render(view, &link.property, element, template, variables, clones),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn class_values() {
		assert_eq!(class_names(&Value::from(" a  b ")), vec!["a", "b"]);
		assert_eq!(class_names(&Value::array(["a", "b c"])), vec!["a", "b", "c"]);
		assert_eq!(
			class_names(&Value::object([("on", Value::from(true)), ("off", Value::from(0)), ("x", Value::from("y"))])),
			vec!["on", "x"]
		);
		assert!(class_names(&Value::Null).is_empty());
	}

	#[test]
	fn options() {
		assert_eq!(option_markup(&Value::from("a<b")), r#"<option value="a&lt;b">a&lt;b</option>"#);
		assert_eq!(
			option_markup(&Value::object([("id", Value::from(2)), ("name", Value::from("Two"))])),
			r#"<option value="2">Two</option>"#
		);
	}
}

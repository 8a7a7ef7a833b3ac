//! An in-memory element tree on top of html5ever's reference DOM.
//!
//! Form state lives in attributes: `value`, `checked` and, for `<option>`s, `selected`.
//! Listeners are kept in a side table shared by all elements parsed together.

use super::{Element, Event, Handler, ListenerGuard};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashMap;
use html5ever::{
	parse_fragment,
	serialize::{serialize, SerializeOpts, TraversalScope},
	tendril::{StrTendril, TendrilSink},
	Attribute, LocalName, Namespace, ParseOpts, QualName,
};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::rc::{Rc, Weak};
use tracing::{trace, trace_span, warn};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

struct Listener {
	id: u64,
	kind: String,
	handler: Handler<MemoryElement>,
}

#[derive(Default)]
struct Listeners {
	by_node: RefCell<HashMap<*const Node, Vec<Listener>>>,
	next_id: Cell<u64>,
}

/// An element of a headless tree.
#[derive(Clone)]
pub struct MemoryElement {
	node: Handle,
	listeners: Rc<Listeners>,
}

impl MemoryElement {
	/// Parses `html` into the children of a new detached `<body>` element.
	#[must_use]
	pub fn parse(html: &str) -> Self {
		let root = Self {
			node: Node::new(NodeData::Element {
				name: html_name("body"),
				attrs: RefCell::new(Vec::new()),
				template_contents: RefCell::new(None),
				mathml_annotation_xml_integration_point: false,
			}),
			listeners: Rc::default(),
		};
		root.append_html(html);
		root
	}

	/// The element's text, including that of all descendants.
	#[must_use]
	pub fn text_content(&self) -> String {
		let mut text = String::new();
		collect_text(&self.node, &mut text);
		text
	}

	/// Markup including the element itself.
	#[must_use]
	pub fn outer_html(&self) -> String {
		serialize_node(&self.node, TraversalScope::IncludeNode)
	}

	/// Dispatches an event on this element and bubbles it up through its ancestors.
	///
	/// Returns how many listeners ran.
	pub fn dispatch(&self, kind: &str) -> usize {
		let span = trace_span!("dispatch", kind);
		let _enter = span.enter();

		let event = Event {
			kind: kind.to_owned(),
			target: self.clone(),
		};
		let mut count = 0;
		let mut current = Some(self.node.clone());
		while let Some(node) = current {
			// Collected first, so that handlers may add or remove listeners.
			let handlers: Vec<Handler<Self>> = self
				.listeners
				.by_node
				.borrow()
				.get(&Rc::as_ptr(&node))
				.map(|listeners| {
					listeners
						.iter()
						.filter(|listener| listener.kind == kind)
						.map(|listener| Rc::clone(&listener.handler))
						.collect()
				})
				.unwrap_or_default();
			for handler in handlers {
				handler(&event);
				count += 1;
			}
			current = parent_of(&node);
		}
		trace!(count, "Dispatched event.");
		count
	}

	/// Sets the form value like user input would and dispatches the matching events.
	pub fn input(&self, value: &str) {
		self.set_value(value);
		self.dispatch("input");
		self.dispatch("change");
	}

	/// Toggles a checkbox like a click would and dispatches `change`.
	pub fn toggle(&self) {
		self.set_checked(!self.checked());
		self.dispatch("click");
		self.dispatch("change");
	}

	fn wrap(&self, node: Handle) -> Self {
		Self {
			node,
			listeners: Rc::clone(&self.listeners),
		}
	}

	fn attrs(&self) -> Option<&RefCell<Vec<Attribute>>> {
		match &self.node.data {
			NodeData::Element { attrs, .. } => Some(attrs),
			_ => None,
		}
	}

	fn replace_text(&self, text: &str) {
		self.clear_children();
		append(
			&self.node,
			Node::new(NodeData::Text {
				contents: RefCell::new(StrTendril::from_slice(text)),
			}),
		);
	}

	fn options(&self) -> Vec<Self> {
		self.descendants().into_iter().filter(|element| element.tag_name() == "option").collect()
	}

	fn option_value(&self) -> String {
		self.get_attribute("value").unwrap_or_else(|| self.text_content())
	}
}

impl Debug for MemoryElement {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("MemoryElement").field(&self.tag_name()).finish()
	}
}

fn html_name(local: &str) -> QualName {
	QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(local))
}

fn parent_of(node: &Handle) -> Option<Handle> {
	let weak = node.parent.take();
	let parent = weak.as_ref().and_then(Weak::upgrade);
	node.parent.set(weak);
	parent
}

fn append(parent: &Handle, child: Handle) {
	child.parent.set(Some(Rc::downgrade(parent)));
	parent.children.borrow_mut().push(child);
}

fn detach(node: &Handle) {
	if let Some(parent) = parent_of(node) {
		parent.children.borrow_mut().retain(|child| !Rc::ptr_eq(child, node));
	}
	node.parent.set(None);
}

fn collect_text(node: &Handle, text: &mut String) {
	match &node.data {
		NodeData::Text { contents } => text.push_str(&contents.borrow()),
		_ => {
			for child in node.children.borrow().iter() {
				collect_text(child, text);
			}
		}
	}
}

fn serialize_node(node: &Handle, traversal_scope: TraversalScope) -> String {
	let mut bytes = Vec::new();
	let handle: SerializableHandle = node.clone().into();
	let opts = SerializeOpts {
		traversal_scope,
		..SerializeOpts::default()
	};
	if let Err(error) = serialize(&mut bytes, &handle, opts) {
		warn!("Failed to serialize: {}", error);
	}
	String::from_utf8_lossy(&bytes).into_owned()
}

/// Parses `html` as it would be inside a `context` element.
fn load_child_nodes(html: &str, context: &str) -> Vec<Handle> {
	let dom: RcDom = parse_fragment(RcDom::default(), ParseOpts::default(), html_name(context), Vec::new()).one(html);
	let document = &dom.document;
	// Fragments are parsed into a synthetic `<html>` element.
	let root = document.children.borrow().first().cloned();
	match root {
		Some(root) => {
			let nodes = root.children.take();
			for node in &nodes {
				node.parent.set(None);
			}
			nodes
		}
		None => Vec::new(),
	}
}

fn is_element(node: &Handle) -> bool {
	matches!(node.data, NodeData::Element { .. })
}

impl Element for MemoryElement {
	fn tag_name(&self) -> String {
		match &self.node.data {
			NodeData::Element { name, .. } => name.local.to_ascii_lowercase().to_string(),
			_ => String::new(),
		}
	}

	fn get_attribute(&self, name: &str) -> Option<String> {
		self.attrs()?
			.borrow()
			.iter()
			.find(|attribute| &*attribute.name.local == name)
			.map(|attribute| attribute.value.to_string())
	}

	fn set_attribute(&self, name: &str, value: &str) {
		let attrs = match self.attrs() {
			Some(attrs) => attrs,
			None => return,
		};
		let mut attrs = attrs.borrow_mut();
		let value = StrTendril::from_slice(value);
		match attrs.iter_mut().find(|attribute| &*attribute.name.local == name) {
			Some(attribute) => attribute.value = value,
			None => attrs.push(Attribute {
				name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
				value,
			}),
		}
	}

	fn remove_attribute(&self, name: &str) {
		if let Some(attrs) = self.attrs() {
			attrs.borrow_mut().retain(|attribute| &*attribute.name.local != name);
		}
	}

	fn attribute_names(&self) -> Vec<String> {
		self.attrs()
			.map(|attrs| attrs.borrow().iter().map(|attribute| attribute.name.local.to_string()).collect())
			.unwrap_or_default()
	}

	fn children(&self) -> Vec<Self> {
		self.node
			.children
			.borrow()
			.iter()
			.filter(|child| is_element(child))
			.map(|child| self.wrap(child.clone()))
			.collect()
	}

	fn parent(&self) -> Option<Self> {
		parent_of(&self.node).filter(is_element).map(|parent| self.wrap(parent))
	}

	fn same_node(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.node, &other.node)
	}

	fn remove(&self) {
		detach(&self.node);
	}

	fn clear_children(&self) {
		let children = self.node.children.take();
		for child in &children {
			child.parent.set(None);
		}
	}

	fn inner_html(&self) -> String {
		serialize_node(&self.node, TraversalScope::ChildrenOnly(None))
	}

	fn set_inner_html(&self, html: &str) {
		self.clear_children();
		self.append_html(html);
	}

	fn append_html(&self, html: &str) -> Vec<Self> {
		let mut appended = Vec::new();
		for node in load_child_nodes(html, &self.tag_name()) {
			if is_element(&node) {
				appended.push(self.wrap(node.clone()));
			}
			append(&self.node, node);
		}
		appended
	}

	fn template_html(&self) -> Option<String> {
		match &self.node.data {
			NodeData::Element { template_contents, .. } => template_contents
				.borrow()
				.as_ref()
				.map(|contents| serialize_node(contents, TraversalScope::ChildrenOnly(None))),
			_ => None,
		}
	}

	fn value(&self) -> String {
		match self.tag_name().as_str() {
			"textarea" => self.text_content(),
			"select" => {
				let options = self.options();
				options
					.iter()
					.find(|option| option.has_attribute("selected"))
					.or_else(|| options.first())
					.map(Self::option_value)
					.unwrap_or_default()
			}
			_ => self.get_attribute("value").unwrap_or_default(),
		}
	}

	fn set_value(&self, value: &str) {
		match self.tag_name().as_str() {
			"textarea" => self.replace_text(value),
			"select" => {
				for option in self.options() {
					if option.option_value() == value {
						option.set_attribute("selected", "");
					} else {
						option.remove_attribute("selected");
					}
				}
			}
			_ => self.set_attribute("value", value),
		}
	}

	fn checked(&self) -> bool {
		self.has_attribute("checked")
	}

	fn set_checked(&self, checked: bool) {
		if checked {
			self.set_attribute("checked", "");
		} else {
			self.remove_attribute("checked");
		}
	}

	fn add_event_listener(&self, kind: &str, handler: Handler<Self>) -> ListenerGuard {
		let id = self.listeners.next_id.get();
		self.listeners.next_id.set(id + 1);
		let key = Rc::as_ptr(&self.node);
		self.listeners.by_node.borrow_mut().entry(key).or_default().push(Listener {
			id,
			kind: kind.to_owned(),
			handler,
		});

		// The guard keeps the node alive so that its address can't be reused while listed.
		let node = self.node.clone();
		let listeners = Rc::downgrade(&self.listeners);
		ListenerGuard::new(move || {
			if let Some(listeners) = listeners.upgrade() {
				let mut by_node = listeners.by_node.borrow_mut();
				if let Some(list) = by_node.get_mut(&Rc::as_ptr(&node)) {
					list.retain(|listener| listener.id != id);
					if list.is_empty() {
						by_node.remove(&Rc::as_ptr(&node));
					}
				}
			}
		})
	}
}

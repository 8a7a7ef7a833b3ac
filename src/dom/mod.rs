//! The platform interface the view layer binds against.
//!
//! [`Element`] is implemented for an html5ever-backed in-memory tree ([`MemoryElement`]), which runs
//! anywhere, and for the browser DOM ([`WebElement`], `wasm32` only).

mod memory;
#[cfg(target_arch = "wasm32")]
mod web;

pub use memory::MemoryElement;
#[cfg(target_arch = "wasm32")]
pub use web::WebElement;

use core::fmt::{self, Debug, Formatter};
use std::rc::Rc;

/// What a listener receives.
#[derive(Debug, Clone)]
pub struct Event<E> {
	pub kind: String,
	/// The element the event was dispatched on, which may be a descendant of the one listened on.
	pub target: E,
}

pub type Handler<E> = Rc<dyn Fn(&Event<E>)>;

/// Removes its event listener when dropped.
#[must_use = "the listener is removed as soon as the guard is dropped"]
pub struct ListenerGuard(Option<Box<dyn FnOnce()>>);

impl ListenerGuard {
	pub fn new(remove: impl 'static + FnOnce()) -> Self {
		Self(Some(Box::new(remove)))
	}
}

impl Drop for ListenerGuard {
	fn drop(&mut self) {
		if let Some(remove) = self.0.take() {
			remove();
		}
	}
}

impl Debug for ListenerGuard {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ListenerGuard").field(&self.0.is_some()).finish()
	}
}

/// A handle to an element. Clones refer to the same node.
///
/// Only element children are visible through this interface. Text is reached through the HTML accessors.
pub trait Element: Clone + 'static {
	/// Lowercase.
	fn tag_name(&self) -> String;

	fn get_attribute(&self, name: &str) -> Option<String>;
	fn set_attribute(&self, name: &str, value: &str);
	fn remove_attribute(&self, name: &str);
	fn attribute_names(&self) -> Vec<String>;

	fn children(&self) -> Vec<Self>;
	fn parent(&self) -> Option<Self>;
	fn same_node(&self, other: &Self) -> bool;

	/// Detaches the element from its parent.
	fn remove(&self);
	fn clear_children(&self);

	fn inner_html(&self) -> String;
	fn set_inner_html(&self, html: &str);

	/// Parses `html` in this element's context, appends the result and returns the new element children.
	fn append_html(&self, html: &str) -> Vec<Self>;

	/// For `<template>` elements, the markup of the template's content.
	fn template_html(&self) -> Option<String>;

	/// The form value of `input`, `select` and `textarea` elements.
	fn value(&self) -> String;
	fn set_value(&self, value: &str);
	fn checked(&self) -> bool;
	fn set_checked(&self, checked: bool);

	fn add_event_listener(&self, kind: &str, handler: Handler<Self>) -> ListenerGuard;

	fn has_attribute(&self, name: &str) -> bool {
		self.get_attribute(name).is_some()
	}

	/// All descendants in document order, excluding `self`.
	fn descendants(&self) -> Vec<Self> {
		let mut found = Vec::new();
		let mut stack: Vec<Self> = self.children().into_iter().rev().collect();
		while let Some(element) = stack.pop() {
			stack.extend(element.children().into_iter().rev());
			found.push(element);
		}
		found
	}

	/// `self` or its nearest ancestor carrying `attribute`.
	fn closest(&self, attribute: &str) -> Option<Self> {
		let mut current = Some(self.clone());
		while let Some(element) = current {
			if element.has_attribute(attribute) {
				return Some(element);
			}
			current = element.parent();
		}
		None
	}

	/// The first descendant whose `attribute` equals `value`.
	fn find_by_attribute(&self, attribute: &str, value: &str) -> Option<Self> {
		self.descendants()
			.into_iter()
			.find(|element| element.get_attribute(attribute).as_deref() == Some(value))
	}

	fn class_names(&self) -> Vec<String> {
		self.get_attribute("class")
			.map(|classes| classes.split_whitespace().map(ToOwned::to_owned).collect())
			.unwrap_or_default()
	}

	fn set_class_names(&self, classes: &[String]) {
		if classes.is_empty() {
			self.remove_attribute("class");
		} else {
			self.set_attribute("class", &classes.join(" "));
		}
	}
}

/// Escapes text for inclusion in markup, including attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			c => escaped.push(c),
		}
	}
	escaped
}

use super::{Element, Event, Handler, ListenerGuard};
use tracing::error;
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{HtmlInputElement, HtmlSelectElement, HtmlTemplateElement, HtmlTextAreaElement};

/// A browser element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebElement(pub web_sys::Element);

impl WebElement {
	/// The document's `<body>`.
	#[must_use]
	pub fn body() -> Option<Self> {
		let body = web_sys::window()?.document()?.body()?;
		Some(Self(body.into()))
	}
}

impl From<web_sys::Element> for WebElement {
	fn from(element: web_sys::Element) -> Self {
		Self(element)
	}
}

fn collect(collection: &web_sys::HtmlCollection) -> Vec<WebElement> {
	(0..collection.length()).filter_map(|i| collection.item(i)).map(WebElement).collect()
}

impl Element for WebElement {
	fn tag_name(&self) -> String {
		self.0.tag_name().to_ascii_lowercase()
	}

	fn get_attribute(&self, name: &str) -> Option<String> {
		self.0.get_attribute(name)
	}

	fn set_attribute(&self, name: &str, value: &str) {
		if let Err(error) = self.0.set_attribute(name, value) {
			error!("Failed to set attribute {:?}: {:?}", name, error);
		}
	}

	fn remove_attribute(&self, name: &str) {
		if let Err(error) = self.0.remove_attribute(name) {
			error!("Failed to remove attribute {:?}: {:?}", name, error);
		}
	}

	fn attribute_names(&self) -> Vec<String> {
		self.0.get_attribute_names().iter().filter_map(|name| name.as_string()).collect()
	}

	fn children(&self) -> Vec<Self> {
		collect(&self.0.children())
	}

	fn parent(&self) -> Option<Self> {
		self.0.parent_element().map(Self)
	}

	fn same_node(&self, other: &Self) -> bool {
		self.0 == other.0
	}

	fn remove(&self) {
		self.0.remove();
	}

	fn clear_children(&self) {
		self.0.set_inner_html("");
	}

	fn inner_html(&self) -> String {
		self.0.inner_html()
	}

	fn set_inner_html(&self, html: &str) {
		self.0.set_inner_html(html);
	}

	fn append_html(&self, html: &str) -> Vec<Self> {
		let before = self.0.child_element_count();
		if let Err(error) = self.0.insert_adjacent_html("beforeend", html) {
			error!("Failed to insert markup: {:?}", error);
			return Vec::new();
		}
		let children = self.0.children();
		(before..children.length()).filter_map(|i| children.item(i)).map(Self).collect()
	}

	fn template_html(&self) -> Option<String> {
		// A template's `innerHTML` serializes its content fragment.
		self.0.dyn_ref::<HtmlTemplateElement>().map(|template| template.inner_html())
	}

	fn value(&self) -> String {
		if let Some(input) = self.0.dyn_ref::<HtmlInputElement>() {
			input.value()
		} else if let Some(select) = self.0.dyn_ref::<HtmlSelectElement>() {
			select.value()
		} else if let Some(textarea) = self.0.dyn_ref::<HtmlTextAreaElement>() {
			textarea.value()
		} else {
			self.0.get_attribute("value").unwrap_or_default()
		}
	}

	fn set_value(&self, value: &str) {
		if let Some(input) = self.0.dyn_ref::<HtmlInputElement>() {
			input.set_value(value);
		} else if let Some(select) = self.0.dyn_ref::<HtmlSelectElement>() {
			select.set_value(value);
		} else if let Some(textarea) = self.0.dyn_ref::<HtmlTextAreaElement>() {
			textarea.set_value(value);
		} else {
			self.set_attribute("value", value);
		}
	}

	fn checked(&self) -> bool {
		self.0.dyn_ref::<HtmlInputElement>().map_or(false, HtmlInputElement::checked)
	}

	fn set_checked(&self, checked: bool) {
		if let Some(input) = self.0.dyn_ref::<HtmlInputElement>() {
			input.set_checked(checked);
		}
	}

	fn add_event_listener(&self, kind: &str, handler: Handler<Self>) -> ListenerGuard {
		let fallback = self.clone();
		let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
			let target = event
				.target()
				.and_then(|target| target.dyn_into::<web_sys::Element>().ok())
				.map_or_else(|| fallback.clone(), WebElement);
			handler(&Event { kind: event.type_(), target });
		}) as Box<dyn Fn(web_sys::Event)>);

		if let Err(error) = self.0.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref()) {
			error!("Failed to add {:?} listener: {:?}", kind, error);
		}

		let element = self.0.clone();
		let kind = kind.to_owned();
		ListenerGuard::new(move || {
			if let Err(error) = element.remove_event_listener_with_callback(&kind, closure.as_ref().unchecked_ref()) {
				error!("Failed to remove {:?} listener: {:?}", kind, error);
			}
			drop(closure);
		})
	}
}

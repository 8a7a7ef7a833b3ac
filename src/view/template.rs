//! Template loading, shared per class.
//!
//! However many instances of a view class are constructed, their template is requested from the
//! [`TemplateSource`] once. Waiters that arrive while the load is in flight are queued and resolved
//! together.

use crate::{
	dom::Element,
	error::{Error, Result},
};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Called with a template's markup.
pub type Done = Box<dyn FnOnce(Result<String>)>;

/// Where templates come from.
pub trait TemplateSource {
	/// Loads the markup of `name`. `done` may be called synchronously or later.
	fn load(&self, name: &str, done: Done);
}

/// Looks up `<template id="...">` elements below a root element.
#[derive(Clone)]
pub struct InlineTemplates<E: Element> {
	root: E,
}

impl<E: Element> InlineTemplates<E> {
	pub fn new(root: E) -> Self {
		Self { root }
	}

	/// The markup of the template with id `name`.
	///
	/// # Errors
	///
	/// [`Error::MissingTemplate`] if there is none.
	pub fn find(&self, name: &str) -> Result<String> {
		self.root
			.find_by_attribute("id", name)
			.and_then(|template| template.template_html())
			.ok_or_else(|| Error::MissingTemplate(name.to_owned()))
	}
}

impl<E: Element> TemplateSource for InlineTemplates<E> {
	fn load(&self, name: &str, done: Done) {
		done(self.find(name));
	}
}

impl<E: Element + Debug> Debug for InlineTemplates<E> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("InlineTemplates").field("root", &self.root).finish()
	}
}

enum Entry {
	Loading(Vec<Done>),
	Loaded(Result<String>),
}

thread_local! {
	static CACHE: RefCell<HashMap<String, Entry>> = RefCell::new(HashMap::new());
}

/// Requests `name` for `class` through the shared cache.
pub fn load_shared(class: &str, name: &str, source: &dyn TemplateSource, done: Done) {
	let key = format!("{}/{}", class, name);
	let start = CACHE.with(|cache| {
		let mut cache = cache.borrow_mut();
		match cache.get_mut(&key) {
			Some(Entry::Loaded(result)) => {
				let result = result.clone();
				drop(cache);
				trace!(key = key.as_str(), "Template cache hit.");
				done(result);
				false
			}
			Some(Entry::Loading(waiters)) => {
				waiters.push(done);
				false
			}
			None => {
				cache.insert(key.clone(), Entry::Loading(vec![done]));
				true
			}
		}
	});
	if !start {
		return;
	}

	debug!(key = key.as_str(), "Loading template.");
	source.load(
		name,
		Box::new(move |result| {
			if let Err(error) = &result {
				warn!(key = key.as_str(), "Template failed to load: {}", error);
			}
			let waiters = CACHE.with(|cache| {
				match cache.borrow_mut().insert(key, Entry::Loaded(result.clone())) {
					Some(Entry::Loading(waiters)) => waiters,
					_ => Vec::new(),
				}
			});
			for done in waiters {
				done(result.clone());
			}
		}),
	);
}

/// Forgets all cached templates, for example after they changed on the server.
pub fn clear_cache() {
	CACHE.with(|cache| cache.borrow_mut().retain(|_, entry| matches!(entry, Entry::Loading(_))));
}

/// Fetches `<base><name>.html`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct FetchTemplates {
	base: String,
}

#[cfg(target_arch = "wasm32")]
impl FetchTemplates {
	pub fn new(base: impl Into<String>) -> Self {
		Self { base: base.into() }
	}

	async fn fetch(url: String) -> Result<String> {
		use wasm_bindgen::JsCast;
		use wasm_bindgen_futures::JsFuture;

		let failed = |error: wasm_bindgen::JsValue| Error::MissingTemplate(format!("{} ({:?})", url, error));
		let window = web_sys::window().ok_or_else(|| Error::MissingTemplate(format!("{} (no window)", url)))?;
		let response = JsFuture::from(window.fetch_with_str(&url)).await.map_err(failed)?;
		let response: web_sys::Response = response.dyn_into().map_err(failed)?;
		if !response.ok() {
			return Err(Error::MissingTemplate(url.clone()));
		}
		let text = JsFuture::from(response.text().map_err(failed)?).await.map_err(failed)?;
		text.as_string().ok_or_else(|| Error::MissingTemplate(url.clone()))
	}
}

#[cfg(target_arch = "wasm32")]
impl TemplateSource for FetchTemplates {
	fn load(&self, name: &str, done: Done) {
		let url = format!("{}{}.html", self.base, name);
		wasm_bindgen_futures::spawn_local(async move { done(Self::fetch(url).await) });
	}
}

/// Tries sources in order until one has the template.
pub struct Fallback(pub Vec<Rc<dyn TemplateSource>>);

impl TemplateSource for Fallback {
	fn load(&self, name: &str, done: Done) {
		fn attempt(sources: Rc<[Rc<dyn TemplateSource>]>, index: usize, name: String, done: Done) {
			let source = match sources.get(index) {
				Some(source) => Rc::clone(source),
				None => return done(Err(Error::MissingTemplate(name))),
			};
			let next = Rc::clone(&sources);
			let retry_name = name.clone();
			source.load(
				&name,
				Box::new(move |result| match result {
					Ok(html) => done(Ok(html)),
					Err(_) => attempt(next, index + 1, retry_name, done),
				}),
			);
		}
		attempt(self.0.clone().into(), 0, name.to_owned(), done);
	}
}

impl Debug for Fallback {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Fallback").field(&self.0.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dom::MemoryElement;
	use core::cell::Cell;

	struct Counting {
		inner: InlineTemplates<MemoryElement>,
		loads: Rc<Cell<usize>>,
		pending: RefCell<Vec<(String, Done)>>,
	}

	impl TemplateSource for Counting {
		fn load(&self, name: &str, done: Done) {
			self.loads.set(self.loads.get() + 1);
			self.pending.borrow_mut().push((name.to_owned(), done));
		}
	}

	impl Counting {
		fn resolve(&self) {
			for (name, done) in self.pending.take() {
				done(self.inner.find(&name));
			}
		}
	}

	#[test]
	fn one_load_per_class() {
		let root = MemoryElement::parse(r#"<template id="card"><b>$title</b></template>"#);
		let source = Counting {
			inner: InlineTemplates::new(root),
			loads: Rc::default(),
			pending: RefCell::default(),
		};
		let results = Rc::new(RefCell::new(Vec::new()));
		for _ in 0..3 {
			let results = Rc::clone(&results);
			load_shared("SharedCard", "card", &source, Box::new(move |result| results.borrow_mut().push(result)));
		}
		assert!(results.borrow().is_empty());
		source.resolve();
		{
			let results = Rc::clone(&results);
			load_shared("SharedCard", "card", &source, Box::new(move |result| results.borrow_mut().push(result)));
		}
		assert_eq!(source.loads.get(), 1);
		assert_eq!(results.borrow().len(), 4);
		assert!(results.borrow().iter().all(|result| result.as_deref() == Ok("<b>$title</b>")));
	}

	#[test]
	fn missing_templates_fall_through() {
		let first: Rc<dyn TemplateSource> = Rc::new(InlineTemplates::new(MemoryElement::parse("")));
		let second: Rc<dyn TemplateSource> = Rc::new(InlineTemplates::new(MemoryElement::parse(r#"<template id="x">ok</template>"#)));
		let result = Rc::new(RefCell::new(None));
		{
			let result = Rc::clone(&result);
			Fallback(vec![first, second]).load("x", Box::new(move |r| *result.borrow_mut() = Some(r)));
		}
		assert_eq!(result.borrow().clone(), Some(Ok("ok".to_owned())));

		let result = Rc::new(RefCell::new(None));
		{
			let result = Rc::clone(&result);
			InlineTemplates::new(MemoryElement::parse("")).load("y", Box::new(move |r| *result.borrow_mut() = Some(r)));
		}
		assert_eq!(result.borrow().clone(), Some(Err(Error::MissingTemplate("y".to_owned()))));
	}
}

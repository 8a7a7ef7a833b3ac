//! Typed reactive models with declarative `sg-*` DOM bindings.
//!
//! A [`Model`] is an instance of a [`ModelClass`]: a set of declared, typed properties with change
//! subscriptions. A [`View`] attaches a model to a DOM subtree, keeping annotated elements and the
//! model's properties in sync in both directions.
//!
//! The DOM is abstracted behind [`Element`]. [`MemoryElement`] is an html5ever-backed implementation
//! that works natively, and `WebElement` binds the browser DOM on `wasm32`.
//!
//! Everything here is single-threaded. Work that must happen "after construction" is queued on the
//! [`scheduler`], which is drained by a microtask in the browser and by [`scheduler::flush`] elsewhere.
//!
//! # Logging
//!
//! All diagnostics go through [`tracing`]. Property values and page content only appear in log
//! messages with the `"dangerous-logging"` feature enabled.

#![doc(html_root_url = "https://docs.rs/sg-mvvm/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod devtools;
pub mod dom;
mod error;
mod flags;
pub mod model;
mod registry;
pub mod scheduler;
pub mod storage;
mod types;
pub mod utils;
mod value;
pub mod view;

pub use crate::{
	dom::{Element, Event, ListenerGuard, MemoryElement},
	error::{Error, Result},
	flags::Flags,
	model::{callback, Callback, ItemKey, Model, ModelBuilder, ModelClass, Notification, OnOptions},
	registry::Registry,
	storage::{KeyValueStore, MemoryStore},
	types::TypeTag,
	value::{Function, Object, Shared, Value, Xy},
	view::{
		template::{InlineTemplates, TemplateSource},
		DisplayType, ForItem, View, ViewConfig,
	},
};

#[cfg(target_arch = "wasm32")]
pub use crate::{dom::WebElement, storage::LocalStorage, view::template::FetchTemplates};

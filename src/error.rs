//! The crate-wide [`Error`] type.
//!
//! Validation and configuration failures are returned synchronously to the caller of
//! [`Model::set`](`crate::Model::set`) and friends. Binding problems that concern a single
//! attribute are logged instead, so that the rest of a subtree still binds.

use crate::types::TypeTag;
use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
	/// A singleton class was instantiated while a live instance exists.
	#[error("`{class}` is a singleton and already has a live instance")]
	DuplicateSingleton { class: String },

	#[error("an instance with UUID {uuid} is already registered")]
	DuplicateUuid { uuid: String },

	#[error("`{class}` has no declared property `{name}`")]
	UndeclaredProperty { class: String, name: String },

	/// A complex type was declared through constructor properties without any value to infer its shape from.
	#[error("property `{name}` declares {ty} but has neither a value nor a default")]
	MissingShape { name: String, ty: TypeTag },

	#[error("property `{name}` ({ty}) can't accept {found}")]
	TypeMismatch { name: String, ty: TypeTag, found: &'static str },

	#[error("property `{name}` ({ty}) can't parse {input:?}")]
	Unparsable { name: String, ty: TypeTag, input: String },

	#[error("unknown type tag {0:?}")]
	UnknownType(String),

	#[error("invalid PostgreSQL array literal at byte {position}: {reason}")]
	PgArray { position: usize, reason: &'static str },

	#[error("property `{name}` ({ty}) is not a collection")]
	NotACollection { name: String, ty: TypeTag },

	/// The key handed to [`Model::remove_from`](`crate::Model::remove_from`) doesn't fit the collection's element shape.
	#[error("key {key} doesn't match the elements of `{name}`")]
	KeyMismatch { name: String, key: String },

	#[error("`{class}` has no registered method `{name}`")]
	UnknownMethod { class: String, name: String },

	#[error("invalid expression {source_text:?} at byte {position}: {reason}")]
	Expression { source_text: String, position: usize, reason: String },

	#[error("template {0:?} not found")]
	MissingTemplate(String),

	/// A view had neither an explicit container nor a matching `sg-model` element.
	#[error("no {0} to attach to")]
	MissingContainer(String),

	#[error("`{class}` has no storage configured")]
	NoStorage { class: String },

	#[error("storage failure: {0}")]
	Storage(String),

	#[error("could not generate a UUID: {0}")]
	Entropy(String),

	/// Any operation apart from `destroy` on an instance that was already destroyed.
	#[error("{class} {uuid} was used after being destroyed")]
	Destroyed { class: String, uuid: String },
}

impl From<serde_json::Error> for Error {
	fn from(error: serde_json::Error) -> Self {
		Self::Storage(error.to_string())
	}
}

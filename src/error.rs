use crate::{
	body::{FragmentId, TemplateId},
	op::OpKind,
};
use thiserror::Error;

/// Errors surfaced by [`Engine`](`crate::engine::Engine`), [`DataView`](`crate::view::DataView`) and [`Socket`](`crate::socket::Socket`).
#[derive(Debug, Error)]
pub enum Error {
	/// A recognised operation kind without defined behaviour, currently only [`OpKind::PatchFragment`].
	#[error("unimplemented operation: {0:?}")]
	Unimplemented(OpKind),

	/// An operation tag outside of `0..=5`.
	#[error("unimplemented operation kind {0}")]
	UnknownOpKind(u64),

	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// The view was rejected by the server and can't be rejoined.
	#[error("view is terminal")]
	Terminal,

	/// [`RejoinPolicy::Once`](`crate::config::RejoinPolicy::Once`) was already used up.
	#[error("rejoin policy exhausted after {0} rejoin(s)")]
	RejoinExhausted(u32),

	#[error("invalid view options: {0}")]
	Options(#[from] serde_json::Error),

	#[error("id counter saturated")]
	CounterSaturated,

	/// Reported by a transport adapter, for example when the underlying socket failed to construct.
	#[error("transport error: {0}")]
	Transport(String),
}

/// Failures while decoding wire data into [`Op`](`crate::op::Op`)s and [`Body`](`crate::body::Body`) nodes, or while expanding them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
	#[error("expected {expected}, found {found}")]
	Malformed { expected: &'static str, found: String },

	#[error("missing field {field} in {context}")]
	MissingField { context: &'static str, field: &'static str },

	#[error("{0} not found")]
	MissingFragment(FragmentId),

	#[error("{0} not found")]
	MissingTemplate(TemplateId),

	#[error("slot {index} out of range (template has {len} slot value(s))")]
	SlotOutOfRange { index: usize, len: usize },

	#[error("cyclic reference through {0}")]
	Cycle(String),
}

impl DecodeError {
	pub(crate) fn malformed(expected: &'static str, found: &serde_json::Value) -> Self {
		Self::Malformed {
			expected,
			found: shape_of(found).to_owned(),
		}
	}
}

/// Names the JSON type of `value` without revealing its contents.
pub(crate) fn shape_of(value: &serde_json::Value) -> &'static str {
	use serde_json::Value;
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

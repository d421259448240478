//! The recursive value grammar stored for fragments and templates.
//!
//! On the wire a body is plain JSON in which some arrays carry a string tag in their first position:
//!
//! | Wire form                    | Variant                                       |
//! |------------------------------|-----------------------------------------------|
//! | `["$r", fragment_id]`        | [`Body::Fragment`]                            |
//! | `["$t", template_id, args…]` | [`Body::Template`]                            |
//! | `["$s", index]`              | [`Body::Slot`]                                |
//! | `["$e", value]`              | [`Body::Escaped`]                             |
//! | any other array              | [`Body::Sequence`]                            |
//! | object                       | [`Body::Mapping`]                             |
//! | `null`, boolean, number, string | [`Body::Null`], [`Body::Bool`], [`Body::Number`], [`Body::String`] |
//!
//! Elements trailing the fields a tag needs are ignored.

use crate::error::DecodeError;
use core::{convert::TryFrom, fmt};
use hashbrown::HashMap;
use serde_json::{Number, Value};

pub(crate) mod tags {
	pub const FRAGMENT: &str = "$r";
	pub const TEMPLATE: &str = "$t";
	pub const SLOT: &str = "$s";
	pub const ESCAPED: &str = "$e";
}

/// Server-assigned fragment address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentId(pub u64);

/// Server-assigned template address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(pub u64);

impl fmt::Display for FragmentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "fragment {}", self.0)
	}
}

impl fmt::Display for TemplateId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "template {}", self.0)
	}
}

/// A decoded fragment or template body.
///
/// See the [module documentation](`self`) for the wire mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
	Null,
	/// Substitutes the fully rendered value of another fragment, which is expanded without slot values.
	Fragment(FragmentId),
	/// Renders `args` against the current slot values, then expands the template with the results as its slots.
	Template { id: TemplateId, args: Vec<Body> },
	/// Positional slot value of the template currently being expanded.
	Slot(usize),
	/// Substituted verbatim, without further interpretation.
	Escaped(Value),
	Sequence(Vec<Body>),
	Mapping(HashMap<String, Body>),
	Bool(bool),
	Number(Number),
	String(String),
}

impl Body {
	/// Decodes `value` recursively.
	///
	/// # Errors
	///
	/// Iff a tagged node is malformed, i.e. lacks its id, index or escaped value, or has a non-integer id or index.
	pub fn decode(value: &Value) -> Result<Self, DecodeError> {
		Ok(match value {
			Value::Null => Self::Null,
			Value::Bool(b) => Self::Bool(*b),
			Value::Number(n) => Self::Number(n.clone()),
			Value::String(s) => Self::String(s.clone()),
			Value::Array(items) => match items.first().and_then(Value::as_str) {
				Some(tags::FRAGMENT) => Self::Fragment(FragmentId(integer_at(items, 1, "fragment reference", "fragment id")?)),
				Some(tags::TEMPLATE) => {
					let id = TemplateId(integer_at(items, 1, "template instantiation", "template id")?);
					Self::Template {
						id,
						args: decode_all(&items[2..])?,
					}
				}
				Some(tags::SLOT) => {
					let index = integer_at(items, 1, "slot reference", "slot index")?;
					Self::Slot(usize::try_from(index).map_err(|_| DecodeError::malformed("a slot index", &items[1]))?)
				}
				Some(tags::ESCAPED) => Self::Escaped(
					items
						.get(1)
						.cloned()
						.ok_or(DecodeError::MissingField { context: "escaped literal", field: "value" })?,
				),
				_ => Self::Sequence(decode_all(items)?),
			},
			Value::Object(entries) => Self::Mapping(
				entries
					.iter()
					.map(|(key, value)| Ok((key.clone(), Self::decode(value)?)))
					.collect::<Result<_, DecodeError>>()?,
			),
		})
	}

	/// The body a [`SetFragmentRootTemplate`](`crate::op::Op::SetFragmentRootTemplate`) stores:
	/// an instantiation of `id` with `args` as its slot values.
	#[must_use]
	pub fn template_root(id: TemplateId, args: Vec<Body>) -> Self {
		Self::Template { id, args }
	}
}

impl TryFrom<&Value> for Body {
	type Error = DecodeError;

	fn try_from(value: &Value) -> Result<Self, Self::Error> {
		Self::decode(value)
	}
}

pub(crate) fn decode_all(values: &[Value]) -> Result<Vec<Body>, DecodeError> {
	values.iter().map(Body::decode).collect()
}

pub(crate) fn integer_at(items: &[Value], i: usize, context: &'static str, field: &'static str) -> Result<u64, DecodeError> {
	let value = items.get(i).ok_or(DecodeError::MissingField { context, field })?;
	value.as_u64().ok_or_else(|| DecodeError::malformed("a non-negative integer", value))
}

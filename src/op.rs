//! Operations as pushed by the server in `"o"` events.
//!
//! Each operation is a positional JSON array whose first element is the [`OpKind`] tag:
//!
//! ```text
//! [0, fragment_id]                               Render
//! [1, fragment_id, body]                         SetFragment
//! [2, fragment_id, template_id, slot_values…]    SetFragmentRootTemplate
//! [3, …]                                         PatchFragment
//! [4, template_id, body]                         SetTemplate
//! [5]                                            Reset
//! ```

use crate::{
	body::{decode_all, integer_at, Body, FragmentId, TemplateId},
	error::{DecodeError, Error},
};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
	Render = 0,
	SetFragment = 1,
	SetFragmentRootTemplate = 2,
	PatchFragment = 3,
	SetTemplate = 4,
	Reset = 5,
}

impl OpKind {
	#[must_use]
	pub fn from_tag(tag: u64) -> Option<Self> {
		Some(match tag {
			0 => Self::Render,
			1 => Self::SetFragment,
			2 => Self::SetFragmentRootTemplate,
			3 => Self::PatchFragment,
			4 => Self::SetTemplate,
			5 => Self::Reset,
			_ => return None,
		})
	}

	#[must_use]
	pub fn tag(self) -> u64 {
		self as u64
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
	/// Expands the fragment and publishes the result as the current output.
	Render(FragmentId),
	SetFragment(FragmentId, Body),
	/// Shorthand for storing [`Body::Template`] as the fragment's body.
	SetFragmentRootTemplate {
		fragment: FragmentId,
		template: TemplateId,
		slots: Vec<Body>,
	},
	/// Reserved. Carries the raw operation fields, since their layout is not defined yet.
	PatchFragment(Vec<Value>),
	SetTemplate(TemplateId, Body),
	/// Reserved. Has no effect.
	Reset,
}

impl Op {
	#[must_use]
	pub fn kind(&self) -> OpKind {
		match self {
			Self::Render(_) => OpKind::Render,
			Self::SetFragment(..) => OpKind::SetFragment,
			Self::SetFragmentRootTemplate { .. } => OpKind::SetFragmentRootTemplate,
			Self::PatchFragment(_) => OpKind::PatchFragment,
			Self::SetTemplate(..) => OpKind::SetTemplate,
			Self::Reset => OpKind::Reset,
		}
	}

	/// Decodes a single positional operation.
	///
	/// # Errors
	///
	/// [`Error::UnknownOpKind`] for tags outside of `0..=5`, [`Error::Decode`] for malformed operations or bodies.
	pub fn decode(value: &Value) -> Result<Self, Error> {
		let fields = value.as_array().ok_or_else(|| DecodeError::malformed("an operation array", value))?;
		let tag = integer_at(fields, 0, "operation", "kind")?;
		let kind = OpKind::from_tag(tag).ok_or(Error::UnknownOpKind(tag))?;
		Ok(match kind {
			OpKind::Render => Self::Render(FragmentId(integer_at(fields, 1, "Render", "fragment id")?)),
			OpKind::SetFragment => Self::SetFragment(
				FragmentId(integer_at(fields, 1, "SetFragment", "fragment id")?),
				Body::decode(field(fields, 2, "SetFragment", "body")?)?,
			),
			OpKind::SetFragmentRootTemplate => Self::SetFragmentRootTemplate {
				fragment: FragmentId(integer_at(fields, 1, "SetFragmentRootTemplate", "fragment id")?),
				template: TemplateId(integer_at(fields, 2, "SetFragmentRootTemplate", "template id")?),
				slots: decode_all(&fields[3..])?,
			},
			OpKind::PatchFragment => Self::PatchFragment(fields[1..].to_vec()),
			OpKind::SetTemplate => Self::SetTemplate(
				TemplateId(integer_at(fields, 1, "SetTemplate", "template id")?),
				Body::decode(field(fields, 2, "SetTemplate", "body")?)?,
			),
			OpKind::Reset => Self::Reset,
		})
	}
}

fn field<'a>(fields: &'a [Value], i: usize, context: &'static str, field: &'static str) -> Result<&'a Value, DecodeError> {
	fields.get(i).ok_or(DecodeError::MissingField { context, field })
}

/// Extracts the operation list from an `"o"` event payload, `{"o": [op…]}`.
///
/// # Errors
///
/// Iff `payload` isn't an object with an `"o"` array.
pub fn batch_ops(payload: &Value) -> Result<&[Value], DecodeError> {
	let ops = payload.get("o").ok_or(DecodeError::MissingField {
		context: "operation batch",
		field: "o",
	})?;
	ops.as_array()
		.map(Vec::as_slice)
		.ok_or_else(|| DecodeError::malformed("an operation list", ops))
}

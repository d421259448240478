use crate::{
	body::{Body, FragmentId, TemplateId},
	error::{DecodeError, Error},
	op::{Op, OpKind},
};
use core::fmt;
use hashbrown::HashMap;
use serde_json::Value;
use tracing::{debug, instrument, trace};

/// Stores fragments and templates as they arrive and expands them into concrete values on [`Op::Render`].
///
/// Stores only ever grow: entries are replaced when the server resends an id, but never removed.
///
/// # Errors
///
/// Expansion fails instead of substituting placeholders. A failing operation stops its batch,
/// but operations applied before it in the same batch are **not** rolled back.
#[derive(Debug, Default)]
pub struct Engine {
	fragments: HashMap<FragmentId, Body>,
	templates: HashMap<TemplateId, Body>,
	out: Value,
}

/// A fragment or template currently being expanded, for cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
	Fragment(FragmentId),
	Template(TemplateId),
}

impl fmt::Display for Frame {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Frame::Fragment(id) => fmt::Display::fmt(id, f),
			Frame::Template(id) => fmt::Display::fmt(id, f),
		}
	}
}

impl Engine {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// The value produced by the latest [`Op::Render`], or [`Value::Null`] before the first one.
	#[must_use]
	pub fn output(&self) -> &Value {
		&self.out
	}

	#[must_use]
	pub fn fragment(&self, id: FragmentId) -> Option<&Body> {
		self.fragments.get(&id)
	}

	#[must_use]
	pub fn template(&self, id: TemplateId) -> Option<&Body> {
		self.templates.get(&id)
	}

	#[must_use]
	pub fn fragment_count(&self) -> usize {
		self.fragments.len()
	}

	#[must_use]
	pub fn template_count(&self) -> usize {
		self.templates.len()
	}

	/// Decodes and applies the wire operations in `ops` in order, each right before it is applied.
	///
	/// Returns whether at least one [`Op::Render`] ran.
	///
	/// Bodies are decoded when they are stored, so a malformed body fails its `SetFragment` or `SetTemplate`
	/// operation even if it is never rendered.
	///
	/// # Errors
	///
	/// At the first operation that fails to decode or apply. Earlier operations remain applied.
	#[instrument(skip(self, ops), fields(ops = ops.len()))]
	pub fn apply_batch(&mut self, ops: &[Value]) -> Result<bool, Error> {
		let mut rendered = false;
		for op in ops {
			rendered |= self.apply_op(Op::decode(op)?)?;
		}
		self.log_capacity();
		Ok(rendered)
	}

	/// Applies already decoded operations in order.
	///
	/// Returns whether at least one [`Op::Render`] ran.
	///
	/// # Errors
	///
	/// At the first operation that fails. Earlier operations remain applied.
	pub fn apply(&mut self, ops: impl IntoIterator<Item = Op>) -> Result<bool, Error> {
		let mut rendered = false;
		for op in ops {
			rendered |= self.apply_op(op)?;
		}
		self.log_capacity();
		Ok(rendered)
	}

	fn apply_op(&mut self, op: Op) -> Result<bool, Error> {
		trace!(kind = ?op.kind(), "Applying operation.");
		match op {
			Op::Render(id) => {
				self.out = self.render_fragment(id)?;
				if cfg!(feature = "dangerous-logging") {
					trace!(output = %self.out, "Rendered {}.", id);
				} else {
					debug!("Rendered {}.", id);
				}
				return Ok(true);
			}
			Op::SetFragment(id, body) => {
				self.fragments.insert(id, body);
			}
			Op::SetFragmentRootTemplate { fragment, template, slots } => {
				self.fragments.insert(fragment, Body::template_root(template, slots));
			}
			Op::PatchFragment(_) => return Err(Error::Unimplemented(OpKind::PatchFragment)),
			Op::SetTemplate(id, body) => {
				self.templates.insert(id, body);
			}
			Op::Reset => trace!("Reset has no effect."),
		}
		Ok(false)
	}

	fn log_capacity(&self) {
		debug!(
			fragments = self.fragments.len(),
			templates = self.templates.len(),
			"Store sizes after batch."
		);
	}

	/// Expands a stored fragment without touching [`Engine::output`].
	///
	/// # Errors
	///
	/// Iff the fragment or anything it references is missing, a slot is out of range or references are cyclic.
	pub fn render_fragment(&self, id: FragmentId) -> Result<Value, DecodeError> {
		self.expand_fragment(id, &mut Vec::new())
	}

	/// Expands a stored template with `slots` as its slot values.
	///
	/// # Errors
	///
	/// See [`Engine::render_fragment`].
	pub fn render_template(&self, id: TemplateId, slots: &[Value]) -> Result<Value, DecodeError> {
		self.expand_template(id, slots, &mut Vec::new())
	}

	/// Expands `body` against the current stores, with `slots` as the active slot values.
	///
	/// # Errors
	///
	/// See [`Engine::render_fragment`].
	pub fn render_body(&self, body: &Body, slots: &[Value]) -> Result<Value, DecodeError> {
		self.expand(body, slots, &mut Vec::new())
	}

	fn expand_fragment(&self, id: FragmentId, stack: &mut Vec<Frame>) -> Result<Value, DecodeError> {
		let body = self.fragments.get(&id).ok_or(DecodeError::MissingFragment(id))?;
		enter(stack, Frame::Fragment(id))?;
		// Slot values never cross a fragment reference.
		let value = self.expand(body, &[], stack);
		stack.pop();
		value
	}

	fn expand_template(&self, id: TemplateId, slots: &[Value], stack: &mut Vec<Frame>) -> Result<Value, DecodeError> {
		let body = self.templates.get(&id).ok_or(DecodeError::MissingTemplate(id))?;
		enter(stack, Frame::Template(id))?;
		let value = self.expand(body, slots, stack);
		stack.pop();
		value
	}

	fn expand(&self, body: &Body, slots: &[Value], stack: &mut Vec<Frame>) -> Result<Value, DecodeError> {
		Ok(match body {
			Body::Null => Value::Null,
			Body::Fragment(id) => self.expand_fragment(*id, stack)?,
			Body::Template { id, args } => {
				// Arguments belong to the caller, so they see the caller's slots.
				let inner_slots = args.iter().map(|arg| self.expand(arg, slots, stack)).collect::<Result<Vec<_>, _>>()?;
				self.expand_template(*id, &inner_slots, stack)?
			}
			Body::Slot(index) => slots.get(*index).cloned().ok_or(DecodeError::SlotOutOfRange {
				index: *index,
				len: slots.len(),
			})?,
			Body::Escaped(value) => value.clone(),
			Body::Sequence(items) => Value::Array(items.iter().map(|item| self.expand(item, slots, stack)).collect::<Result<_, _>>()?),
			Body::Mapping(entries) => Value::Object(
				entries
					.iter()
					.map(|(key, value)| Ok((key.clone(), self.expand(value, slots, stack)?)))
					.collect::<Result<_, DecodeError>>()?,
			),
			Body::Bool(b) => Value::Bool(*b),
			Body::Number(n) => Value::Number(n.clone()),
			Body::String(s) => Value::String(s.clone()),
		})
	}
}

fn enter(stack: &mut Vec<Frame>, frame: Frame) -> Result<(), DecodeError> {
	if stack.contains(&frame) {
		let path = stack
			.iter()
			.skip_while(|f| **f != frame)
			.chain(Some(&frame))
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join(" -> ");
		return Err(DecodeError::Cycle(path));
	}
	stack.push(frame);
	Ok(())
}

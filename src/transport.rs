//! The realtime channel capability [`DataView`](`crate::view::DataView`)s are driven by.
//!
//! This mirrors the shape of the Phoenix JavaScript client: a [`Transport`] opens [`Channel`]s by topic,
//! channels are joined and pushed to, and both return [`Push`] handles that report the server's reply.
//!
//! Everything here is single-threaded. Callbacks are `'static` and are only ever called from the thread
//! that registered them.

use crate::error::Error;
use serde_json::Value;

/// Handler for named server-pushed events.
///
/// Errors are propagated back into the transport, which decides how to surface them
/// (the Phoenix adapter throws them into JavaScript).
pub type EventCallback = Box<dyn FnMut(Value) -> Result<(), Error>>;

/// Handler for push replies and channel lifecycle notifications.
pub type ReplyCallback = Box<dyn FnMut(Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushStatus {
	Ok,
	Error,
	Timeout,
}

impl PushStatus {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ok => "ok",
			Self::Error => "error",
			Self::Timeout => "timeout",
		}
	}
}

/// An outstanding message, such as a join request or an application event.
pub trait Push {
	/// Registers `callback` for the reply with `status`. For [`PushStatus::Timeout`], it receives [`Value::Null`].
	fn receive(&self, status: PushStatus, callback: ReplyCallback);
}

pub trait Channel: 'static {
	type Push: Push;

	/// # Errors
	///
	/// Iff the transport refuses the join, for example because the channel was already joined.
	fn join(&self) -> Result<Self::Push, Error>;

	fn leave(&self);

	fn on(&self, event: &str, callback: EventCallback);

	/// # Errors
	///
	/// Iff the transport can't send on this channel (yet).
	fn push(&self, event: &str, payload: Value) -> Result<Self::Push, Error>;

	fn on_error(&self, callback: ReplyCallback);

	fn on_close(&self, callback: ReplyCallback);
}

/// A connection that channels can be opened on. Clones must refer to the same connection.
pub trait Transport: Clone + 'static {
	type Channel: Channel;

	/// Opens (but doesn't join) a channel on `topic`, with `params` as join payload.
	///
	/// # Errors
	///
	/// Iff the transport can't create the channel.
	fn channel(&self, topic: &str, params: Value) -> Result<Self::Channel, Error>;

	/// # Errors
	///
	/// Iff the connection can't be initiated.
	fn connect(&self) -> Result<(), Error>;
}

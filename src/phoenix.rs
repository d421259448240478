//! [`Transport`] implementation on top of the [Phoenix JavaScript client](https://hexdocs.pm/phoenix/js/).
//!
//! The socket class is passed in by the caller rather than imported, so that this crate doesn't depend on how
//! the page loads Phoenix:
//!
//! ```ignore
//! let transport = PhoenixTransport::new("/socket", &phoenix_socket_class, &JsValue::UNDEFINED)?;
//! let socket = Socket::new(transport);
//! socket.connect()?;
//! let view = socket.data_view("dashboard", serde_json::json!({}), ViewOptions::default())?;
//! ```
//!
//! JSON crosses the boundary through `JSON.stringify`/`JSON.parse`.
//!
//! # Closures
//!
//! Callbacks handed to JavaScript are retained by the [`PhoenixTransport`], grouped by the channel or push they belong to:
//!
//! - A channel's closures, including those of its join push, are released once Phoenix answers its `leave`.
//! - Any other push needs three closures, one per reply status. They are released on its first reply.
//!
//! [`PhoenixTransport::retained_closures`] counts what is currently held.

use crate::{
	counter::Counter,
	error::Error,
	transport::{Channel, EventCallback, Push, PushStatus, ReplyCallback, Transport},
};
use core::cell::RefCell;
use hashbrown::HashMap;
use js_sys::{Array, Function, Reflect, JSON};
use serde_json::Value;
use std::{
	rc::{Rc, Weak},
	sync::Once,
};
use tracing::{error, trace, warn, Level};
use wasm_bindgen::{closure::Closure, prelude::*, JsCast};

#[wasm_bindgen]
extern "C" {
	#[derive(Debug, Clone)]
	type PhxSocket;
	#[wasm_bindgen(method, catch)]
	fn connect(this: &PhxSocket) -> Result<(), JsValue>;
	#[wasm_bindgen(method, catch)]
	fn channel(this: &PhxSocket, topic: &str, params: &JsValue) -> Result<PhxChannel, JsValue>;

	#[derive(Debug, Clone)]
	type PhxChannel;
	#[wasm_bindgen(method, catch)]
	fn join(this: &PhxChannel) -> Result<PhxPush, JsValue>;
	#[wasm_bindgen(method)]
	fn leave(this: &PhxChannel) -> PhxPush;
	#[wasm_bindgen(method)]
	fn on(this: &PhxChannel, event: &str, callback: &Function) -> JsValue;
	#[wasm_bindgen(method, catch)]
	fn push(this: &PhxChannel, event: &str, payload: &JsValue) -> Result<PhxPush, JsValue>;
	#[wasm_bindgen(method, js_name = onError)]
	fn on_error(this: &PhxChannel, callback: &Function);
	#[wasm_bindgen(method, js_name = onClose)]
	fn on_close(this: &PhxChannel, callback: &Function);

	#[derive(Debug, Clone)]
	type PhxPush;
	#[wasm_bindgen(method)]
	fn receive(this: &PhxPush, status: &str, callback: &Function) -> PhxPush;
}

type JsCallback = Closure<dyn FnMut(JsValue) -> Result<(), JsValue>>;

/// A Phoenix `Socket` instance. Clones share the socket.
#[derive(Clone)]
pub struct PhoenixTransport {
	inner: Rc<Inner>,
}

struct Inner {
	socket: PhxSocket,
	owners: RefCell<Counter<u64>>,
	closures: RefCell<HashMap<u64, Vec<JsCallback>>>,
}

impl core::fmt::Debug for PhoenixTransport {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("PhoenixTransport")
			.field("socket", &self.inner.socket)
			.field("closures", &self.retained_closures())
			.finish()
	}
}

impl PhoenixTransport {
	/// Calls `new constructor(url, opts)`.
	///
	/// # Errors
	///
	/// Iff the constructor throws.
	pub fn new(url: &str, constructor: &Function, opts: &JsValue) -> Result<Self, Error> {
		let socket = Reflect::construct(constructor, &Array::of2(&JsValue::from_str(url), opts)).map_err(js_error)?;
		Ok(Self {
			inner: Rc::new(Inner {
				socket: socket.unchecked_into(),
				owners: RefCell::default(),
				closures: RefCell::default(),
			}),
		})
	}

	/// How many closures handed to JavaScript are currently kept alive.
	#[must_use]
	pub fn retained_closures(&self) -> usize {
		self.inner.closures.borrow().values().map(Vec::len).sum()
	}

	fn owner(&self) -> Result<u64, Error> {
		self.inner.owners.borrow_mut().next()
	}

	fn retain(&self, owner: u64, callback: impl FnMut(JsValue) -> Result<(), JsValue> + 'static) -> Function {
		let closure: JsCallback = Closure::wrap(Box::new(callback) as Box<dyn FnMut(JsValue) -> Result<(), JsValue>>);
		let function = closure.as_ref().unchecked_ref::<Function>().clone();
		self.inner.closures.borrow_mut().entry(owner).or_default().push(closure);
		trace!(owner, "Retained closure.");
		function
	}

	fn retain_reply(&self, owner: u64, mut callback: ReplyCallback) -> Function {
		self.retain(owner, move |reply| {
			callback(reply_value(&reply));
			Ok(())
		})
	}

	/// Registers one closure per reply status on `push`, dispatching to the [`ReplyCallback`]s in the returned [`Replies`].
	fn watch(&self, owner: u64, push: &PhxPush, release_on_reply: bool) -> Rc<Replies> {
		let replies = Rc::new(Replies::default());
		for &status in &[PushStatus::Ok, PushStatus::Error, PushStatus::Timeout] {
			let replies = Rc::clone(&replies);
			let inner = Rc::downgrade(&self.inner);
			push.receive(
				status.as_str(),
				&self.retain(owner, move |reply| {
					replies.dispatch(status, &reply_value(&reply));
					if release_on_reply {
						release(&inner, owner)
					}
					Ok(())
				}),
			);
		}
		replies
	}
}

/// Drops the closures retained for `owner`.
///
/// Safe to call from within one of them: wasm-bindgen defers destroying a closure that is running until it returns.
fn release(inner: &Weak<Inner>, owner: u64) {
	if let Some(inner) = inner.upgrade() {
		let released = inner.closures.borrow_mut().remove(&owner);
		if let Some(released) = released {
			trace!(owner, count = released.len(), "Released closures.");
		}
	}
}

fn reply_value(reply: &JsValue) -> Value {
	from_js(reply).unwrap_or_else(|error| {
		warn!(%error, "Unreadable reply payload.");
		Value::Null
	})
}

impl Transport for PhoenixTransport {
	type Channel = PhoenixChannel;

	fn channel(&self, topic: &str, params: Value) -> Result<Self::Channel, Error> {
		let channel = self.inner.socket.channel(topic, &to_js(&params)?).map_err(js_error)?;
		Ok(PhoenixChannel {
			channel,
			owner: self.owner()?,
			transport: self.clone(),
		})
	}

	fn connect(&self) -> Result<(), Error> {
		self.inner.socket.connect().map_err(js_error)
	}
}

#[derive(Debug)]
pub struct PhoenixChannel {
	channel: PhxChannel,
	/// Groups the closures of this channel and its join push.
	owner: u64,
	transport: PhoenixTransport,
}

impl Channel for PhoenixChannel {
	type Push = PhoenixPush;

	fn join(&self) -> Result<Self::Push, Error> {
		let push = self.channel.join().map_err(js_error)?;
		// Phoenix re-sends the join push on its own, so its closures live as long as the channel's.
		let replies = self.transport.watch(self.owner, &push, false);
		Ok(PhoenixPush { push, replies })
	}

	fn leave(&self) {
		let leave = self.channel.leave();
		let inner = Rc::downgrade(&self.transport.inner);
		let owner = self.owner;
		// Phoenix triggers the channel's close callbacks before this one.
		let release_all = self.transport.retain(owner, move |_| {
			release(&inner, owner);
			Ok(())
		});
		leave.receive(PushStatus::Ok.as_str(), &release_all).receive(PushStatus::Timeout.as_str(), &release_all);
	}

	fn on(&self, event: &str, mut callback: EventCallback) {
		let event_name = event.to_owned();
		let function = self.transport.retain(self.owner, move |payload| {
			let payload = from_js(&payload).map_err(to_js_error)?;
			callback(payload).map_err(|error| {
				error!(event = %event_name, %error, "Event handler failed.");
				to_js_error(error)
			})
		});
		self.channel.on(event, &function);
	}

	fn push(&self, event: &str, payload: Value) -> Result<Self::Push, Error> {
		let push = self.channel.push(event, &to_js(&payload)?).map_err(js_error)?;
		let replies = self.transport.watch(self.transport.owner()?, &push, true);
		Ok(PhoenixPush { push, replies })
	}

	fn on_error(&self, callback: ReplyCallback) {
		self.channel.on_error(&self.transport.retain_reply(self.owner, callback));
	}

	fn on_close(&self, callback: ReplyCallback) {
		self.channel.on_close(&self.transport.retain_reply(self.owner, callback));
	}
}

/// [`ReplyCallback`]s of one push, called from the closures [`PhoenixTransport::watch`] registered.
#[derive(Default)]
struct Replies {
	callbacks: RefCell<Vec<(PushStatus, ReplyCallback)>>,
	last: RefCell<Option<(PushStatus, Value)>>,
}

impl Replies {
	fn dispatch(&self, status: PushStatus, reply: &Value) {
		*self.last.borrow_mut() = Some((status, reply.clone()));
		let mut callbacks = self.callbacks.take();
		for (expected, callback) in &mut callbacks {
			if *expected == status {
				callback(reply.clone())
			}
		}
		// Keep callbacks added while dispatching, after the existing ones.
		let mut current = self.callbacks.borrow_mut();
		callbacks.append(&mut current);
		*current = callbacks;
	}

	/// Like Phoenix, calls `callback` right away if `status` was already received.
	fn add(&self, status: PushStatus, mut callback: ReplyCallback) {
		let received = match &*self.last.borrow() {
			Some((last, reply)) if *last == status => Some(reply.clone()),
			_ => None,
		};
		if let Some(reply) = received {
			callback(reply)
		}
		self.callbacks.borrow_mut().push((status, callback));
	}
}

/// A Phoenix `Push`. Replies are converted to JSON before they reach the [`ReplyCallback`].
pub struct PhoenixPush {
	push: PhxPush,
	replies: Rc<Replies>,
}

impl core::fmt::Debug for PhoenixPush {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("PhoenixPush")
			.field("push", &self.push)
			.field("callbacks", &self.replies.callbacks.borrow().len())
			.finish()
	}
}

impl PhoenixPush {
	/// The underlying Phoenix `Push`, for callers that want to chain on it in JavaScript.
	#[must_use]
	pub fn as_js(&self) -> &JsValue {
		&self.push
	}
}

impl Push for PhoenixPush {
	fn receive(&self, status: PushStatus, callback: ReplyCallback) {
		self.replies.add(status, callback)
	}
}

/// Converts through `JSON.parse`.
///
/// # Errors
///
/// Iff JavaScript rejects the JSON, which shouldn't happen.
pub fn to_js(value: &Value) -> Result<JsValue, Error> {
	let json = serde_json::to_string(value).map_err(|error| Error::Transport(error.to_string()))?;
	JSON::parse(&json).map_err(js_error)
}

/// Converts through `JSON.stringify`. `undefined` (and other values without JSON form, like functions) become [`Value::Null`].
///
/// # Errors
///
/// Iff `JSON.stringify` throws, for example on cyclic objects.
pub fn from_js(value: &JsValue) -> Result<Value, Error> {
	if value.is_undefined() {
		return Ok(Value::Null);
	}
	match JSON::stringify(value).map_err(js_error)?.as_string() {
		Some(json) => serde_json::from_str(&json).map_err(|error| Error::Transport(error.to_string())),
		None => Ok(Value::Null),
	}
}

fn js_error(error: JsValue) -> Error {
	Error::Transport(format!("{:?}", error))
}

fn to_js_error(error: Error) -> JsValue {
	js_sys::Error::new(&error.to_string()).into()
}

/// Installs [`tracing_wasm`] as global default subscriber, logging to the browser console up to `max_level`.
///
/// Only the first call has an effect.
pub fn init_logging(max_level: Level) {
	static INIT: Once = Once::new();
	INIT.call_once(|| {
		tracing_wasm::set_as_global_default_with_config(tracing_wasm::WASMLayerConfigBuilder::new().set_max_level(max_level).build());
	});
}

use crate::{
	bus::{EventBus, Subscription},
	config::{RejoinPolicy, ViewOptions},
	engine::Engine,
	error::{shape_of, Error},
	op::batch_ops,
	socket::Socket,
	transport::{Channel, Push, PushStatus, Transport},
};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Display, Formatter},
};
use serde_json::{json, Value};
use std::{
	collections::VecDeque,
	rc::{Rc, Weak},
};
use tracing::{debug, info, instrument, warn};

/// Server-pushed operation batches, `{"o": [op…]}`.
pub const OPS_EVENT: &str = "o";
/// Application events pushed to the server, `{"d": data}`.
pub const APP_EVENT: &str = "e";

/// Lifecycle of a [`DataView`].
///
/// ```text
/// ChannelJoining ──first "o" batch──▶ Active
///       │
///       └──────join rejected───────▶ Terminal
/// ```
///
/// A successful join reply and a join timeout both re-assign [`ViewState::ChannelJoining`].
/// [`DataView::last_join_status`] tells them apart.
/// The first operation batch is what actually activates a view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
	ChannelJoining,
	/// Reserved. No transition enters this state.
	Joining,
	Active,
	/// The server rejected the join with `reason`. Absorbing.
	Terminal { reason: Value },
}

impl ViewState {
	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::ChannelJoining => "channel_joining",
			Self::Joining => "joining",
			Self::Active => "active",
			Self::Terminal { .. } => "terminal",
		}
	}

	#[must_use]
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Terminal { .. })
	}
}

impl Display for ViewState {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One subscription to a server-side route.
///
/// Owns its channel and leaves it when dropped.
pub struct DataView<T: Transport> {
	shared: Rc<Shared<T>>,
}

struct Shared<T: Transport> {
	transport: T,
	topic: String,
	join_payload: Value,
	options: ViewOptions,
	channel: RefCell<Option<T::Channel>>,
	/// Incremented per opened channel, so that callbacks of a superseded channel can be told apart.
	generation: Cell<u64>,
	rejoins: Cell<u32>,
	/// Reply to the current channel's join, [`None`] while it is outstanding.
	join_status: Cell<Option<PushStatus>>,
	state: RefCell<ViewState>,
	/// State assignments not yet delivered to `on_state`.
	pending: RefCell<VecDeque<ViewState>>,
	notifying: Cell<bool>,
	engine: RefCell<Engine>,
	on_state: EventBus<ViewState>,
	on_data: EventBus<Value>,
}

impl<T: Transport> fmt::Debug for DataView<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("DataView")
			.field("topic", &self.shared.topic)
			.field("state", &*self.shared.state.borrow())
			.field("rejoins", &self.shared.rejoins.get())
			.finish()
	}
}

impl<T: Transport> DataView<T> {
	/// Opens a channel for `route` on a fresh topic of `socket` and starts joining it.
	///
	/// The join payload is `{"r": [route, initial_params]}`.
	///
	/// # Errors
	///
	/// Iff the socket ran out of topics or the transport fails to open or join the channel.
	#[instrument(skip(initial_params, socket))]
	pub fn new(route: &str, initial_params: Value, options: ViewOptions, socket: &Socket<T>) -> Result<Self, Error> {
		let topic = socket.next_topic()?;
		let shared = Rc::new(Shared {
			transport: socket.transport().clone(),
			join_payload: json!({ "r": [route, initial_params] }),
			topic,
			options,
			channel: RefCell::new(None),
			generation: Cell::new(0),
			rejoins: Cell::new(0),
			join_status: Cell::new(None),
			state: RefCell::new(ViewState::ChannelJoining),
			pending: RefCell::default(),
			notifying: Cell::new(false),
			engine: RefCell::default(),
			on_state: EventBus::new(),
			on_data: EventBus::new(),
		});
		Shared::open_channel(&shared)?;
		info!(topic = %shared.topic, "Joining data view.");
		Ok(Self { shared })
	}

	#[must_use]
	pub fn topic(&self) -> &str {
		&self.shared.topic
	}

	#[must_use]
	pub fn rejoin_policy(&self) -> RejoinPolicy {
		self.shared.options.rejoin_policy
	}

	#[must_use]
	pub fn state(&self) -> ViewState {
		self.shared.state.borrow().clone()
	}

	/// The reply to the current channel's join so far, or [`None`] while it is outstanding.
	///
	/// Distinguishes why [`ViewState::ChannelJoining`] was assigned, so that a state listener can
	/// [`rejoin`](`DataView::rejoin`) after [`PushStatus::Timeout`] only.
	#[must_use]
	pub fn last_join_status(&self) -> Option<PushStatus> {
		self.shared.join_status.get()
	}

	/// The most recently rendered value, or [`Value::Null`] before the first render.
	#[must_use]
	pub fn data(&self) -> Value {
		self.shared.engine.borrow().output().clone()
	}

	/// `listener` is called on every state assignment, including ones that don't change the state.
	///
	/// Assignments made while listeners are being called, for example by a listener that rejoins,
	/// are delivered in order once the current listener returns.
	///
	/// # Errors
	///
	/// Iff the subscription ids ran out.
	pub fn on_state(&self, listener: impl Fn(&ViewState) + 'static) -> Result<Subscription<ViewState>, Error> {
		self.shared.on_state.add(listener)
	}

	pub fn off_state(&self, subscription: Subscription<ViewState>) -> bool {
		self.shared.on_state.remove(subscription)
	}

	/// `listener` is called with the new output after each operation batch that rendered.
	///
	/// # Errors
	///
	/// Iff the subscription ids ran out.
	pub fn on_data(&self, listener: impl Fn(&Value) + 'static) -> Result<Subscription<Value>, Error> {
		self.shared.on_data.add(listener)
	}

	pub fn off_data(&self, subscription: Subscription<Value>) -> bool {
		self.shared.on_data.remove(subscription)
	}

	/// Pushes `data` to the server as `{"d": data}`.
	///
	/// The reply isn't interpreted here; use the returned handle to observe it.
	///
	/// # Errors
	///
	/// Iff the transport refuses the push.
	#[instrument(skip(self, data), fields(topic = %self.shared.topic))]
	pub fn push_event(&self, data: Value) -> Result<<T::Channel as Channel>::Push, Error> {
		if cfg!(feature = "dangerous-logging") {
			debug!(%data, "Pushing application event.");
		} else {
			debug!(shape = shape_of(&data), "Pushing application event.");
		}
		let channel = self.shared.channel.borrow();
		let channel = channel.as_ref().ok_or_else(|| Error::Transport("channel closed".to_owned()))?;
		channel.push(APP_EVENT, json!({ "d": data }))
	}

	/// Leaves the current channel and joins a new one on the same topic with the original join payload.
	///
	/// The state is re-assigned to [`ViewState::ChannelJoining`], and replies or events from the previous channel are ignored from now on.
	/// [`DataView::last_join_status`] is [`None`] again until the new join is answered.
	///
	/// May be called from a state listener. The resulting notification then reaches listeners after that listener returns.
	///
	/// # Errors
	///
	/// - [`Error::Terminal`] iff the server has rejected this view,
	/// - [`Error::RejoinExhausted`] iff the [`RejoinPolicy`] doesn't allow another attempt,
	/// - otherwise iff the transport fails to open or join the channel.
	#[instrument(skip(self), fields(topic = %self.shared.topic))]
	pub fn rejoin(&self) -> Result<(), Error> {
		let shared = &self.shared;
		if shared.state.borrow().is_terminal() {
			return Err(Error::Terminal);
		}
		let rejoins = shared.rejoins.get();
		if !shared.options.rejoin_policy.allows(rejoins) {
			warn!(rejoins, policy = ?shared.options.rejoin_policy, "Rejoin refused.");
			return Err(Error::RejoinExhausted(rejoins));
		}
		shared.rejoins.set(rejoins + 1);

		shared.leave();
		shared.join_status.set(None);
		shared.set_state(ViewState::ChannelJoining);
		Shared::open_channel(shared)
	}
}

impl<T: Transport> Drop for DataView<T> {
	fn drop(&mut self) {
		debug!(topic = %self.shared.topic, "Dropping data view.");
		self.shared.leave();
	}
}

impl<T: Transport> Shared<T> {
	fn open_channel(this: &Rc<Self>) -> Result<(), Error> {
		let generation = this.generation.get() + 1;
		this.generation.set(generation);
		this.join_status.set(None);

		let channel = this.transport.channel(&this.topic, this.join_payload.clone())?;

		let topic = this.topic.clone();
		channel.on_error(Box::new(move |reason| warn!(%topic, reason = shape_of(&reason), "Channel error.")));
		let topic = this.topic.clone();
		channel.on_close(Box::new(move |_| debug!(%topic, "Channel closed.")));

		let weak = Rc::downgrade(this);
		channel.on(
			OPS_EVENT,
			Box::new(move |payload| match Self::current(&weak, generation) {
				Some(shared) => shared.handle_ops(&payload),
				None => Ok(()),
			}),
		);

		let join_push = match channel.join() {
			Ok(push) => push,
			Err(error) => {
				warn!(topic = %this.topic, %error, "Join failed; leaving channel.");
				channel.leave();
				return Err(error);
			}
		};
		*this.channel.borrow_mut() = Some(channel);

		let weak = Rc::downgrade(this);
		join_push.receive(
			PushStatus::Ok,
			Box::new(move |_| {
				if let Some(shared) = Self::current(&weak, generation) {
					debug!(topic = %shared.topic, "Join acknowledged.");
					shared.join_replied(PushStatus::Ok, ViewState::ChannelJoining)
				}
			}),
		);
		let weak = Rc::downgrade(this);
		join_push.receive(
			PushStatus::Error,
			Box::new(move |reply| {
				if let Some(shared) = Self::current(&weak, generation) {
					let reason = reply.get("reason").cloned().unwrap_or(Value::Null);
					if cfg!(feature = "dangerous-logging") {
						warn!(topic = %shared.topic, %reason, "Join rejected.");
					} else {
						warn!(topic = %shared.topic, "Join rejected.");
					}
					shared.join_replied(PushStatus::Error, ViewState::Terminal { reason })
				}
			}),
		);
		let weak = Rc::downgrade(this);
		join_push.receive(
			PushStatus::Timeout,
			Box::new(move |_| {
				if let Some(shared) = Self::current(&weak, generation) {
					warn!(topic = %shared.topic, "Join timed out.");
					shared.join_replied(PushStatus::Timeout, ViewState::ChannelJoining)
				}
			}),
		);
		Ok(())
	}

	/// Upgrades `weak` iff the view is still alive and `generation` is its current channel.
	fn current(weak: &Weak<Self>, generation: u64) -> Option<Rc<Self>> {
		let shared = weak.upgrade()?;
		if shared.generation.get() == generation {
			Some(shared)
		} else {
			debug!(topic = %shared.topic, generation, "Ignoring callback of a superseded channel.");
			None
		}
	}

	fn leave(&self) {
		let channel = self.channel.borrow_mut().take();
		if let Some(channel) = channel {
			channel.leave()
		}
	}

	fn set_state(&self, state: ViewState) {
		{
			let mut current = self.state.borrow_mut();
			if current.is_terminal() {
				warn!(topic = %self.topic, ignored = %state, "View is terminal; ignoring state change.");
				return;
			}
			*current = state.clone();
		}
		info!(topic = %self.topic, %state, "State assigned.");

		self.pending.borrow_mut().push_back(state);
		if self.notifying.replace(true) {
			// The dispatch further up the stack delivers it.
			return;
		}
		loop {
			let next = self.pending.borrow_mut().pop_front();
			match next {
				Some(state) => self.on_state.call(&state),
				None => break,
			}
		}
		self.notifying.set(false);
	}

	fn join_replied(&self, status: PushStatus, state: ViewState) {
		if !self.state.borrow().is_terminal() {
			self.join_status.set(Some(status));
		}
		self.set_state(state)
	}

	#[instrument(skip(self, payload), fields(topic = %self.topic))]
	fn handle_ops(&self, payload: &Value) -> Result<(), Error> {
		if self.state.borrow().is_terminal() {
			warn!("View is terminal; ignoring operation batch.");
			return Ok(());
		}

		let rendered = self.engine.borrow_mut().apply_batch(batch_ops(payload)?)?;

		let joining = matches!(*self.state.borrow(), ViewState::ChannelJoining);
		if joining {
			self.set_state(ViewState::Active);
		}

		if rendered {
			let data = self.engine.borrow().output().clone();
			self.on_data.call(&data);
		}
		Ok(())
	}
}

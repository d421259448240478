//! Minimal single-threaded broadcast with cancellation handles.

use crate::{counter::Counter, error::Error};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Formatter},
	marker::PhantomData,
};
use std::rc::Rc;
use tracing::trace;

type Listener<T> = Rc<dyn Fn(&T)>;

/// Opaque handle returned by [`EventBus::add`], used to [`EventBus::remove`] the listener again.
///
/// Typed by the bus's event so that handles of different buses can't be mixed up.
pub struct Subscription<T> {
	id: u64,
	_event: PhantomData<fn(&T)>,
}

impl<T> Clone for Subscription<T> {
	fn clone(&self) -> Self {
		*self
	}
}
impl<T> Copy for Subscription<T> {}
impl<T> PartialEq for Subscription<T> {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}
impl<T> Eq for Subscription<T> {}
impl<T> Debug for Subscription<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Subscription").field(&self.id).finish()
	}
}

/// A list of listeners that are all called with each event.
///
/// Listeners are called in insertion order, but shouldn't rely on that.
/// They may add or remove listeners (including themselves) while being called,
/// which takes effect from the next event on.
pub struct EventBus<T> {
	ids: RefCell<Counter<u64>>,
	listeners: RefCell<Vec<(u64, Listener<T>)>>,
}

impl<T> Default for EventBus<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Debug for EventBus<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventBus").field("listeners", &self.len()).finish()
	}
}

impl<T> EventBus<T> {
	#[must_use]
	pub fn new() -> Self {
		Self {
			ids: RefCell::default(),
			listeners: RefCell::default(),
		}
	}

	/// # Errors
	///
	/// Iff this bus ran out of subscription ids.
	pub fn add(&self, listener: impl Fn(&T) + 'static) -> Result<Subscription<T>, Error> {
		let id = self.ids.borrow_mut().next()?;
		self.listeners.borrow_mut().push((id, Rc::new(listener)));
		trace!(id, "Added listener.");
		Ok(Subscription { id, _event: PhantomData })
	}

	/// Returns whether the listener was still registered.
	pub fn remove(&self, subscription: Subscription<T>) -> bool {
		let mut listeners = self.listeners.borrow_mut();
		let len = listeners.len();
		listeners.retain(|(id, _)| *id != subscription.id);
		let removed = listeners.len() != len;
		trace!(id = subscription.id, removed, "Removed listener.");
		removed
	}

	pub fn call(&self, event: &T) {
		let snapshot: Vec<_> = self.listeners.borrow().iter().map(|(_, listener)| Rc::clone(listener)).collect();
		for listener in snapshot {
			listener(event)
		}
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.listeners.borrow().len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

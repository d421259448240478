use crate::{config::ViewOptions, counter::Counter, error::Error, transport::Transport, view::DataView};
use core::cell::RefCell;
use serde_json::Value;
use tracing::{debug, instrument};

/// Prefix of every data view topic. The suffix is a per-socket counter starting at 1.
pub const TOPIC_PREFIX: &str = "dv:c:";

/// Wraps one transport connection and mints topics for the [`DataView`]s opened on it.
#[derive(Debug)]
pub struct Socket<T: Transport> {
	transport: T,
	views: RefCell<Counter<u64>>,
}

impl<T: Transport> Socket<T> {
	#[must_use]
	pub fn new(transport: T) -> Self {
		Self {
			transport,
			views: RefCell::default(),
		}
	}

	#[must_use]
	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// # Errors
	///
	/// Iff the transport fails to initiate the connection.
	#[instrument(skip(self))]
	pub fn connect(&self) -> Result<(), Error> {
		self.transport.connect()
	}

	/// Opens and starts joining a view of `route`. See [`DataView::new`].
	///
	/// # Errors
	///
	/// See [`DataView::new`].
	pub fn data_view(&self, route: &str, initial_params: Value, options: ViewOptions) -> Result<DataView<T>, Error> {
		DataView::new(route, initial_params, options, self)
	}

	/// Allocates the next view topic, `dv:c:1`, `dv:c:2` and so on.
	///
	/// # Errors
	///
	/// Iff the counter is exhausted.
	pub fn next_topic(&self) -> Result<String, Error> {
		let n = self.views.borrow_mut().next()?;
		let topic = format!("{}{}", TOPIC_PREFIX, n);
		debug!(%topic, "Allocated topic.");
		Ok(topic)
	}
}

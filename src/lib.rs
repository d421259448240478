//! Client side of server-driven data views.
//!
//! A [`Socket`](`socket::Socket`) wraps one realtime connection ([`transport::Transport`]) and opens
//! [`DataView`](`view::DataView`)s on it, one channel each. The server pushes batches of fragment and template
//! operations, which each view's [`Engine`](`engine::Engine`) expands into a plain [`serde_json::Value`].
//!
//! On `wasm32`, [`phoenix`] provides a transport backed by the Phoenix JavaScript client.

#![doc(html_root_url = "https://docs.rs/dataview-client/0.0.1")]
#![warn(clippy::pedantic)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod body;
pub mod bus;
pub mod config;
pub mod counter;
pub mod engine;
pub mod error;
pub mod op;
pub mod socket;
pub mod transport;
pub mod view;

#[cfg(target_arch = "wasm32")]
pub mod phoenix;

pub use error::{DecodeError, Error};
pub use serde_json;

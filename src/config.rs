use crate::error::Error;
use core::convert::TryFrom;
use serde::Deserialize;
use serde_json::Value;

/// How often [`DataView::rejoin`](`crate::view::DataView::rejoin`) may resubscribe with the original join payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RejoinPolicyRepr")]
pub enum RejoinPolicy {
	/// At most one rejoin over the view's lifetime.
	Once,
	/// Any number of rejoins.
	Persist,
}

impl Default for RejoinPolicy {
	fn default() -> Self {
		Self::Persist
	}
}

impl RejoinPolicy {
	/// Whether another rejoin is allowed after `rejoins` earlier ones.
	#[must_use]
	pub fn allows(self, rejoins: u32) -> bool {
		match self {
			Self::Once => rejoins == 0,
			Self::Persist => true,
		}
	}
}

/// Accepts both the enum's ordinal (as JavaScript callers pass it) and its name.
#[derive(Deserialize)]
#[serde(untagged)]
enum RejoinPolicyRepr {
	Ordinal(u8),
	Name(String),
}

impl TryFrom<RejoinPolicyRepr> for RejoinPolicy {
	type Error = String;

	fn try_from(repr: RejoinPolicyRepr) -> Result<Self, Self::Error> {
		match repr {
			RejoinPolicyRepr::Ordinal(0) => Ok(Self::Once),
			RejoinPolicyRepr::Ordinal(1) => Ok(Self::Persist),
			RejoinPolicyRepr::Name(name) if name.eq_ignore_ascii_case("once") => Ok(Self::Once),
			RejoinPolicyRepr::Name(name) if name.eq_ignore_ascii_case("persist") => Ok(Self::Persist),
			RejoinPolicyRepr::Ordinal(ordinal) => Err(format!("unknown rejoin policy {}", ordinal)),
			RejoinPolicyRepr::Name(name) => Err(format!("unknown rejoin policy {:?}", name)),
		}
	}
}

/// Per-view options, deserialisable from the `opts` object JavaScript callers pass.
///
/// ```
/// use dataview_client::config::{RejoinPolicy, ViewOptions};
///
/// let options = ViewOptions::from_value(&serde_json::json!({ "rejoinPolicy": "once" })).unwrap();
/// assert_eq!(options.rejoin_policy, RejoinPolicy::Once);
/// assert_eq!(ViewOptions::default().rejoin_policy, RejoinPolicy::Persist);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewOptions {
	pub rejoin_policy: RejoinPolicy,
}

impl ViewOptions {
	/// `null` yields the defaults. Unknown keys are ignored.
	///
	/// # Errors
	///
	/// Iff a recognised option has an invalid value.
	pub fn from_value(value: &Value) -> Result<Self, Error> {
		if value.is_null() {
			return Ok(Self::default());
		}
		Ok(Self::deserialize(value)?)
	}
}

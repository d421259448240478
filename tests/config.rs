use dataview_client::{
	config::{RejoinPolicy, ViewOptions},
	Error,
};
use serde_json::{json, Value};

#[test]
fn defaults_to_persist() {
	assert_eq!(ViewOptions::default().rejoin_policy, RejoinPolicy::Persist);
	assert_eq!(ViewOptions::from_value(&Value::Null).unwrap(), ViewOptions::default());
	assert_eq!(ViewOptions::from_value(&json!({})).unwrap(), ViewOptions::default());
	assert_eq!(ViewOptions::from_value(&json!({ "unrelated": 1 })).unwrap(), ViewOptions::default());
}

#[test]
fn accepts_names_and_ordinals() {
	for (value, policy) in vec![
		(json!("once"), RejoinPolicy::Once),
		(json!("Persist"), RejoinPolicy::Persist),
		(json!(0), RejoinPolicy::Once),
		(json!(1), RejoinPolicy::Persist),
	] {
		let options = ViewOptions::from_value(&json!({ "rejoinPolicy": value })).unwrap();
		assert_eq!(options.rejoin_policy, policy);
	}
}

#[test]
fn rejects_unknown_policies() {
	for value in vec![json!("forever"), json!(2), json!(true)] {
		assert!(matches!(ViewOptions::from_value(&json!({ "rejoinPolicy": value })), Err(Error::Options(_))));
	}
}

#[test]
fn policy_budget() {
	assert!(RejoinPolicy::Once.allows(0));
	assert!(!RejoinPolicy::Once.allows(1));
	assert!(RejoinPolicy::Persist.allows(u32::MAX));
}

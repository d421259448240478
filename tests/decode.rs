use dataview_client::{
	body::{Body, FragmentId, TemplateId},
	op::{batch_ops, Op, OpKind},
	DecodeError, Error,
};
use serde_json::json;

#[test]
fn tagged_nodes() {
	assert_eq!(Body::decode(&json!(["$r", 3])).unwrap(), Body::Fragment(FragmentId(3)));
	assert_eq!(Body::decode(&json!(["$s", 2])).unwrap(), Body::Slot(2));
	assert_eq!(Body::decode(&json!(["$e", [1, 2]])).unwrap(), Body::Escaped(json!([1, 2])));
	assert_eq!(
		Body::decode(&json!(["$t", 4, "a", ["$s", 0]])).unwrap(),
		Body::Template {
			id: TemplateId(4),
			args: vec![Body::String("a".to_owned()), Body::Slot(0)],
		}
	);
}

#[test]
fn untagged_arrays_are_sequences() {
	assert_eq!(
		Body::decode(&json!(["$x", 1, null])).unwrap(),
		Body::Sequence(vec![Body::String("$x".to_owned()), Body::Number(1.into()), Body::Null])
	);
	assert_eq!(Body::decode(&json!([])).unwrap(), Body::Sequence(vec![]));
}

#[test]
fn trailing_fields_are_ignored() {
	assert_eq!(Body::decode(&json!(["$r", 3, "extra"])).unwrap(), Body::Fragment(FragmentId(3)));
	assert_eq!(Body::decode(&json!(["$e", 1, 2])).unwrap(), Body::Escaped(json!(1)));
}

#[test]
fn malformed_tagged_nodes() {
	assert_eq!(
		Body::decode(&json!(["$r"])),
		Err(DecodeError::MissingField {
			context: "fragment reference",
			field: "fragment id",
		})
	);
	assert_eq!(
		Body::decode(&json!(["$s", -1])),
		Err(DecodeError::Malformed {
			expected: "a non-negative integer",
			found: "number".to_owned(),
		})
	);
	assert!(Body::decode(&json!(["$t", "7"])).is_err());
	assert!(Body::decode(&json!(["$e"])).is_err());
	assert!(Body::decode(&json!({ "nested": [["$r", null]] })).is_err());
}

#[test]
fn operations() {
	assert_eq!(Op::decode(&json!([0, 1])).unwrap(), Op::Render(FragmentId(1)));
	assert_eq!(Op::decode(&json!([1, 2, null])).unwrap(), Op::SetFragment(FragmentId(2), Body::Null));
	assert_eq!(
		Op::decode(&json!([2, 3, 4, "x", ["$s", 0]])).unwrap(),
		Op::SetFragmentRootTemplate {
			fragment: FragmentId(3),
			template: TemplateId(4),
			slots: vec![Body::String("x".to_owned()), Body::Slot(0)],
		}
	);
	assert_eq!(Op::decode(&json!([3, 1, "p"])).unwrap(), Op::PatchFragment(vec![json!(1), json!("p")]));
	assert_eq!(Op::decode(&json!([4, 5, true])).unwrap(), Op::SetTemplate(TemplateId(5), Body::Bool(true)));
	assert_eq!(Op::decode(&json!([5])).unwrap(), Op::Reset);
	assert_eq!(Op::decode(&json!([2, 3, 4])).unwrap().kind(), OpKind::SetFragmentRootTemplate);
}

#[test]
fn operation_kinds_round_trip_their_tags() {
	for tag in 0..=5 {
		assert_eq!(OpKind::from_tag(tag).unwrap().tag(), tag);
	}
	assert_eq!(OpKind::from_tag(6), None);
}

#[test]
fn malformed_operations() {
	assert!(matches!(Op::decode(&json!({ "kind": 0 })), Err(Error::Decode(DecodeError::Malformed { .. }))));
	assert!(matches!(Op::decode(&json!([])), Err(Error::Decode(DecodeError::MissingField { .. }))));
	assert!(matches!(Op::decode(&json!([1, 2])), Err(Error::Decode(DecodeError::MissingField { field: "body", .. }))));
	assert!(matches!(Op::decode(&json!([99])), Err(Error::UnknownOpKind(99))));
}

#[test]
fn batch_payloads() {
	let payload = json!({ "o": [[0, 1], [5]] });
	assert_eq!(batch_ops(&payload).unwrap().len(), 2);
	assert!(matches!(batch_ops(&json!({})), Err(DecodeError::MissingField { field: "o", .. })));
	assert!(matches!(batch_ops(&json!({ "o": {} })), Err(DecodeError::Malformed { .. })));
	assert!(batch_ops(&json!([[0, 1]])).is_err());
}

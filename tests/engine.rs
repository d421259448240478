use dataview_client::{
	body::{Body, FragmentId, TemplateId},
	engine::Engine,
	op::{Op, OpKind},
	DecodeError, Error,
};
use serde_json::{json, Value};

fn engine_with(ops: &[Value]) -> Engine {
	let mut engine = Engine::new();
	engine.apply_batch(ops).unwrap();
	engine
}

#[test]
fn output_starts_null() {
	assert_eq!(Engine::new().output(), &Value::Null);
}

#[test]
fn rerender_is_idempotent() {
	let mut engine = engine_with(&[
		json!([4, 7, ["$s", 0]]),
		json!([1, 1, { "title": "hello", "items": [1, 2, ["$t", 7, ["$e", { "deep": true }]]] }]),
	]);

	assert!(engine.apply_batch(&[json!([0, 1])]).unwrap());
	let first = engine.output().clone();
	assert!(engine.apply_batch(&[json!([0, 1])]).unwrap());
	assert_eq!(engine.output(), &first);
	assert_eq!(first, json!({ "title": "hello", "items": [1, 2, { "deep": true }] }));
}

#[test]
fn fragment_reference_indirection() {
	let engine = engine_with(&[json!([1, 1, ["$r", 2]]), json!([1, 2, "X"]), json!([0, 1])]);
	assert_eq!(engine.output(), &json!("X"));
}

#[test]
fn template_slot_substitution() {
	let engine = engine_with(&[json!([4, 3, ["$s", 0]]), json!([1, 1, ["$t", 3, ["$e", 42]]]), json!([0, 1])]);
	assert_eq!(engine.output(), &json!(42));
}

#[test]
fn template_arguments_see_caller_slots() {
	// Template 1 forwards its second slot into template 2's first.
	let engine = engine_with(&[
		json!([4, 2, ["inner", ["$s", 0]]]),
		json!([4, 1, ["$t", 2, ["$s", 1]]]),
		json!([2, 1, 1, "a", "b"]),
		json!([0, 1]),
	]);
	assert_eq!(engine.output(), &json!(["inner", "b"]));
}

#[test]
fn slot_context_does_not_cross_fragment_references() {
	let mut engine = engine_with(&[
		json!([4, 1, ["$r", 9]]),
		json!([4, 5, ["$t", 1, ["$s", 0]]]),
		json!([2, 1, 5, "outer"]),
		json!([1, 9, ["$s", 0]]),
	]);

	match engine.apply_batch(&[json!([0, 1])]) {
		Err(Error::Decode(DecodeError::SlotOutOfRange { index: 0, len: 0 })) => (),
		other => panic!("Expected slot 0 to be out of range, got {:?}", other),
	}
	assert_eq!(engine.output(), &Value::Null);
}

#[test]
fn plain_structure_passes_through() {
	let body = json!({ "a": 1, "b": [true, "s"], "c": null, "d": 2.5 });
	let engine = engine_with(&[json!([1, 1, body.clone()]), json!([0, 1])]);
	assert_eq!(engine.output(), &body);
}

#[test]
fn escaped_literal_is_not_interpreted() {
	let engine = engine_with(&[json!([1, 1, ["$e", ["$s", 0]]]), json!([0, 1])]);
	assert_eq!(engine.output(), &json!(["$s", 0]));

	let engine = engine_with(&[json!([1, 1, ["$e", { "x": ["$r", 5] }]]), json!([0, 1])]);
	assert_eq!(engine.output(), &json!({ "x": ["$r", 5] }));
}

#[test]
fn patch_fragment_fails_after_earlier_operations() {
	let mut engine = Engine::new();
	let result = engine.apply_batch(&[json!([1, 1, "kept"]), json!([4, 2, "also kept"]), json!([3, 1, []]), json!([1, 3, "never stored"])]);

	assert!(matches!(result, Err(Error::Unimplemented(OpKind::PatchFragment))));
	assert_eq!(engine.fragment(FragmentId(1)), Some(&Body::String("kept".to_owned())));
	assert_eq!(engine.template(TemplateId(2)), Some(&Body::String("also kept".to_owned())));
	assert_eq!(engine.fragment(FragmentId(3)), None);
}

#[test]
fn malformed_body_fails_when_stored() {
	let mut engine = Engine::new();
	let result = engine.apply_batch(&[json!([1, 1, "kept"]), json!([1, 2, { "bad": ["$r"] }]), json!([1, 3, "never stored"])]);

	assert!(matches!(
		result,
		Err(Error::Decode(DecodeError::MissingField { field: "fragment id", .. }))
	));
	assert_eq!(engine.fragment_count(), 1);
	assert_eq!(engine.fragment(FragmentId(2)), None);
	assert_eq!(engine.output(), &Value::Null);
}

#[test]
fn unknown_operation_kind_fails() {
	let mut engine = Engine::new();
	let result = engine.apply_batch(&[json!([1, 1, "kept"]), json!([6, 1])]);
	assert!(matches!(result, Err(Error::UnknownOpKind(6))));
	assert_eq!(engine.fragment_count(), 1);
}

#[test]
fn reset_has_no_effect() {
	let mut engine = engine_with(&[json!([1, 1, "x"]), json!([0, 1])]);
	assert!(!engine.apply_batch(&[json!([5])]).unwrap());
	assert_eq!(engine.fragment_count(), 1);
	assert_eq!(engine.output(), &json!("x"));
}

#[test]
fn render_reports_whether_it_ran() {
	let mut engine = Engine::new();
	assert!(!engine.apply_batch(&[json!([1, 1, "x"]), json!([4, 1, "y"])]).unwrap());
	assert!(engine.apply_batch(&[json!([0, 1])]).unwrap());
	assert!(!engine.apply_batch(&[]).unwrap());
}

#[test]
fn later_render_overwrites_output() {
	let engine = engine_with(&[json!([1, 1, "first"]), json!([1, 2, "second"]), json!([0, 1]), json!([0, 2])]);
	assert_eq!(engine.output(), &json!("second"));
}

#[test]
fn resent_fragment_replaces_body() {
	let mut engine = engine_with(&[json!([1, 1, ["$r", 2]]), json!([1, 2, "old"]), json!([0, 1])]);
	engine.apply_batch(&[json!([1, 2, "new"]), json!([0, 1])]).unwrap();
	assert_eq!(engine.output(), &json!("new"));
	assert_eq!(engine.fragment_count(), 2);
}

#[test]
fn missing_fragment_is_an_error() {
	let mut engine = Engine::new();
	assert!(matches!(
		engine.apply_batch(&[json!([0, 4])]),
		Err(Error::Decode(DecodeError::MissingFragment(FragmentId(4))))
	));

	let mut engine = engine_with(&[json!([1, 1, { "child": ["$r", 2] }])]);
	assert!(matches!(
		engine.apply_batch(&[json!([0, 1])]),
		Err(Error::Decode(DecodeError::MissingFragment(FragmentId(2))))
	));
}

#[test]
fn missing_template_is_an_error() {
	let mut engine = engine_with(&[json!([2, 1, 8])]);
	assert!(matches!(
		engine.apply_batch(&[json!([0, 1])]),
		Err(Error::Decode(DecodeError::MissingTemplate(TemplateId(8))))
	));
}

#[test]
fn cycles_are_detected() {
	let mut engine = engine_with(&[json!([1, 1, ["$r", 2]]), json!([1, 2, [["$r", 1]]])]);
	match engine.apply_batch(&[json!([0, 1])]) {
		Err(Error::Decode(DecodeError::Cycle(path))) => assert_eq!(path, "fragment 1 -> fragment 2 -> fragment 1"),
		other => panic!("Expected a cycle, got {:?}", other),
	}

	let mut engine = engine_with(&[json!([4, 1, ["$t", 1]]), json!([2, 1, 1])]);
	assert!(matches!(engine.apply_batch(&[json!([0, 1])]), Err(Error::Decode(DecodeError::Cycle(_)))));
}

#[test]
fn shared_fragments_are_not_cycles() {
	let engine = engine_with(&[json!([1, 1, [["$r", 2], ["$r", 2]]]), json!([1, 2, "twice"]), json!([0, 1])]);
	assert_eq!(engine.output(), &json!(["twice", "twice"]));
}

#[test]
fn typed_operations_apply_like_wire_ones() {
	let mut engine = Engine::new();
	let rendered = engine
		.apply(vec![
			Op::SetTemplate(TemplateId(1), Body::Sequence(vec![Body::Slot(1), Body::Slot(0)])),
			Op::SetFragmentRootTemplate {
				fragment: FragmentId(1),
				template: TemplateId(1),
				slots: vec![Body::Bool(false), Body::Null],
			},
			Op::Render(FragmentId(1)),
		])
		.unwrap();
	assert!(rendered);
	assert_eq!(engine.output(), &json!([null, false]));
}

#[test]
fn render_template_directly() {
	let engine = engine_with(&[json!([4, 1, { "name": ["$s", 0] }])]);
	assert_eq!(engine.render_template(TemplateId(1), &[json!("x")]).unwrap(), json!({ "name": "x" }));
	assert_eq!(
		engine.render_template(TemplateId(1), &[]),
		Err(DecodeError::SlotOutOfRange { index: 0, len: 0 })
	);
	assert_eq!(engine.output(), &Value::Null);
}

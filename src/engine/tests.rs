use assert_call::{call, CallRecorder};
use serde_json::json;
use sigmut::core::Runtime;

use crate::{
    validators, CheckboxValueType, ControlKind, FieldDef, FormBuilder, SelectOption, Validator,
};

fn failing(message: &'static str) -> Validator {
    Validator::new(move |_, _, _| Some(message.to_string()))
}

fn recording(name: &'static str) -> Validator {
    Validator::new(move |_, _, _| {
        call!("{}", name);
        None
    })
}

#[test]
fn first_failing_validator_wins() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let form = FormBuilder::new(json!({"name": ""}))
        .field(
            FieldDef::new("name")
                .validator(failing("first"))
                .validator(recording("second")),
        )
        .build();

    assert!(!form.validate(rt.ac()));
    cr.verify(());
    let field = form.field("name");
    assert_eq!(field.error().get(&mut rt.sc()).as_deref(), Some("first"));
    assert!(field.touched().get(&mut rt.sc()));
}

#[test]
fn validate_clears_stale_error() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"name": ""}))
        .field(FieldDef::new("name").validator(validators::required()))
        .build();

    assert!(!form.validate(rt.ac()));
    form.field("name").value().set(json!("x"), rt.ac());
    assert!(form.validate(rt.ac()));
    assert_eq!(form.field("name").error().get(&mut rt.sc()), None);
}

#[test]
fn every_field_is_validated_even_after_a_failure() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"a": "", "b": ""}))
        .field(FieldDef::new("a").validator(validators::required()))
        .field(FieldDef::new("b").validator(validators::required()))
        .build();

    assert!(!form.validate(rt.ac()));
    assert!(form.field("a").error().get(&mut rt.sc()).is_some());
    assert!(form.field("b").error().get(&mut rt.sc()).is_some());
}

#[test]
fn nested_group_failure_propagates() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"address": {"postcode": "12"}}))
        .field(FieldDef::group(
            "address",
            vec![FieldDef::new("postcode").validator(validators::min_length(5))],
        ))
        .build();

    assert!(!form.validate(rt.ac()));
    let errors = form.errors(&mut rt.sc());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "address.postcode");
    assert_eq!(errors[0].name, "postcode");
}

#[test]
fn repeatable_group_validates_every_child() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"contacts": [{"email": "a@b.se"}, {"email": ""}]}))
        .field(FieldDef::repeatable(
            "contacts",
            vec![FieldDef::new("email").validator(validators::required())],
        ))
        .build();

    assert!(!form.validate(rt.ac()));
    let children = form.field("contacts").repeatable_forms(&mut rt.sc());
    assert!(children[0].field("email").touched().get(&mut rt.sc()));
    assert!(children[1].field("email").touched().get(&mut rt.sc()));
    let errors = form.errors(&mut rt.sc());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "contacts[1].email");
}

#[test]
fn reset_restores_values_and_flags() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"name": "ada"}))
        .field(FieldDef::new("name").validator(validators::min_length(10)))
        .build();
    let field = form.field("name").clone();

    field.value().set(json!("short"), rt.ac());
    assert!(!form.validate(rt.ac()));
    field.focus().set(true, rt.ac());
    field.dirty().set(true, rt.ac());

    form.reset(rt.ac());
    assert_eq!(field.value().get(&mut rt.sc()), json!("ada"));
    assert!(!field.touched().get(&mut rt.sc()));
    assert!(!field.dirty().get(&mut rt.sc()));
    assert!(!field.focus().get(&mut rt.sc()));
    assert_eq!(field.error().get(&mut rt.sc()), None);
}

#[test]
fn reset_rebuilds_repeatable_children() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"tags": [{"label": "one"}]}))
        .field(FieldDef::repeatable("tags", vec![FieldDef::new("label")]))
        .build();
    let field = form.field("tags").clone();

    field.add_item(json!({"label": "two"}), rt.ac());
    assert_eq!(field.repeatable_forms(&mut rt.sc()).len(), 2);

    form.reset(rt.ac());
    let children = field.repeatable_forms(&mut rt.sc());
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].value(&mut rt.sc()), json!({"label": "one"}));
    assert!(!field.touched().get(&mut rt.sc()));
    assert!(!field.dirty().get(&mut rt.sc()));
}

#[test]
fn patch_skips_absent_keys() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"a": 1, "b": 2}))
        .field(FieldDef::new("a"))
        .field(FieldDef::new("b"))
        .build();

    form.patch_value(&json!({"a": 10}), rt.ac());
    assert_eq!(form.field("a").value().get(&mut rt.sc()), json!(10));
    assert!(form.field("a").dirty().get(&mut rt.sc()));
    assert!(!form.field("a").touched().get(&mut rt.sc()));
    assert_eq!(form.field("b").value().get(&mut rt.sc()), json!(2));
    assert!(!form.field("b").dirty().get(&mut rt.sc()));
}

#[test]
fn patch_applies_explicit_null() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"a": 1}))
        .field(FieldDef::new("a"))
        .build();

    form.patch_value(&json!({"a": null}), rt.ac());
    assert_eq!(form.field("a").value().get(&mut rt.sc()), json!(null));
    assert!(form.field("a").dirty().get(&mut rt.sc()));
}

#[test]
fn patch_delegates_to_nested_form() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"address": {"line1": "a", "line2": "b"}}))
        .field(FieldDef::group(
            "address",
            vec![FieldDef::new("line1"), FieldDef::new("line2")],
        ))
        .build();

    form.patch_value(&json!({"address": {"line2": "c"}}), rt.ac());
    let child = form.field("address").nested_form().unwrap();
    assert_eq!(child.field("line1").value().get(&mut rt.sc()), json!("a"));
    assert_eq!(child.field("line2").value().get(&mut rt.sc()), json!("c"));
}

#[test]
fn set_value_overwrites_every_field() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"a": 1, "b": 2}))
        .field(FieldDef::new("a"))
        .field(FieldDef::new("b"))
        .build();

    form.set_value(&json!({"a": 10, "b": 20}), rt.ac());
    assert_eq!(form.field("a").value().get(&mut rt.sc()), json!(10));
    assert_eq!(form.field("b").value().get(&mut rt.sc()), json!(20));
    assert!(form.field("a").dirty().get(&mut rt.sc()));
    assert!(form.field("b").dirty().get(&mut rt.sc()));

    form.set_value(&json!({"a": 1}), rt.ac());
    assert_eq!(form.field("b").value().get(&mut rt.sc()), json!(null));
}

#[test]
fn disabled_fields_are_absent_from_output() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"visible": 1, "locked": 2}))
        .field(FieldDef::new("visible"))
        .field(FieldDef::new("locked").disabled(true))
        .build();

    assert_eq!(form.value(&mut rt.sc()), json!({"visible": 1}));
    assert_eq!(form.raw_value(&mut rt.sc()), json!({"visible": 1, "locked": 2}));
}

#[test]
fn disabled_predicate_tracks_form_state() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"kind": "personal", "org": "acme"}))
        .field(FieldDef::new("kind"))
        .field(FieldDef::new("org").disabled_when(|form, sc| {
            form.field("kind").value().get(sc) == json!("personal")
        }))
        .build();

    assert_eq!(form.value(&mut rt.sc()), json!({"kind": "personal"}));
    form.field("kind").value().set(json!("company"), rt.ac());
    assert_eq!(
        form.value(&mut rt.sc()),
        json!({"kind": "company", "org": "acme"})
    );
}

#[test]
fn checkbox_group_array_output() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({}))
        .field(
            FieldDef::new("toppings")
                .control(ControlKind::CheckboxGroup)
                .options(vec![
                    SelectOption::new("A", json!("a")),
                    SelectOption::new("B", json!("b")),
                ]),
        )
        .build();
    let field = form.field("toppings").clone();

    assert_eq!(form.value(&mut rt.sc()), json!({"toppings": []}));
    field.value().set(json!({"b": true}), rt.ac());
    assert_eq!(form.value(&mut rt.sc()), json!({"toppings": ["b"]}));
    field.value().set(json!({"b": false}), rt.ac());
    assert_eq!(form.value(&mut rt.sc()), json!({"toppings": []}));
}

#[test]
fn checkbox_group_map_output_has_every_key() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"toppings": {"a": true}}))
        .field(
            FieldDef::new("toppings")
                .control(ControlKind::CheckboxGroup)
                .value_type(CheckboxValueType::Map)
                .options(vec![
                    SelectOption::new("A", json!("a")),
                    SelectOption::new("B", json!("b")),
                ]),
        )
        .build();

    assert_eq!(
        form.value(&mut rt.sc()),
        json!({"toppings": {"a": true, "b": false}})
    );
}

#[test]
fn raw_value_mirrors_child_forms() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({
        "address": {"line1": "x"},
        "contacts": [{"email": "a@b.se"}],
    }))
    .field(FieldDef::group("address", vec![FieldDef::new("line1")]))
    .field(FieldDef::repeatable(
        "contacts",
        vec![FieldDef::new("email")],
    ))
    .build();

    assert_eq!(
        form.raw_value(&mut rt.sc()),
        json!({"address": {"line1": "x"}, "contacts": [{"email": "a@b.se"}]})
    );
}

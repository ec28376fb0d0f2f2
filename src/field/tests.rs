use assert_call::{call, CallRecorder};
use serde_json::json;
use sigmut::core::Runtime;

use crate::{validators, ControlKind, FieldDef, FormBuilder, SelectOption};

#[test]
fn control_kind_renders_kebab_case() {
    assert_eq!(ControlKind::CheckboxGroup.to_string(), "checkbox-group");
    assert_eq!(ControlKind::MultiSelect.to_string(), "multi-select");
    assert_eq!(ControlKind::Text.to_string(), "text");
}

#[test]
fn missing_model_values_get_control_defaults() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({}))
        .field(FieldDef::new("note"))
        .field(FieldDef::new("subscribed").control(ControlKind::Checkbox))
        .field(FieldDef::new("tags").control(ControlKind::MultiSelect))
        .build();

    assert_eq!(form.field("note").value().get(&mut rt.sc()), json!(null));
    assert_eq!(form.field("subscribed").value().get(&mut rt.sc()), json!(false));
    assert_eq!(form.field("tags").value().get(&mut rt.sc()), json!([]));
}

#[test]
fn required_marker_is_exposed_without_running_validators() {
    let form = FormBuilder::new(json!({}))
        .field(FieldDef::new("a").validator(validators::required()))
        .field(FieldDef::new("b").validator(validators::min_length(2)))
        .build();

    assert!(form.field("a").is_required());
    assert!(!form.field("b").is_required());
}

#[test]
fn paths_are_absolute_from_the_root() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({
        "address": {"line1": ""},
        "contacts": [{"email": ""}],
    }))
    .field(FieldDef::group("address", vec![FieldDef::new("line1")]))
    .field(FieldDef::repeatable("contacts", vec![FieldDef::new("email")]))
    .build();

    let address = form.field("address");
    assert_eq!(address.path(), "address");
    assert_eq!(address.fields()[0].path(), "address.line1");
    let children = form.field("contacts").repeatable_forms(&mut rt.sc());
    assert_eq!(children[0].field("email").path(), "contacts[0].email");
}

#[test]
fn add_item_appends_a_seeded_child() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"contacts": [{"id": 1, "title": "x"}]}))
        .field(FieldDef::repeatable(
            "contacts",
            vec![FieldDef::new("id"), FieldDef::new("title")],
        ))
        .build();
    let field = form.field("contacts").clone();

    let child = field.add_item(json!({"id": 2, "title": "y"}), rt.ac());
    assert_eq!(child.value(&mut rt.sc()), json!({"id": 2, "title": "y"}));
    assert_eq!(field.repeatable_forms(&mut rt.sc()).len(), 2);
    assert!(field.touched().get(&mut rt.sc()));
    assert!(field.dirty().get(&mut rt.sc()));
    assert_eq!(
        form.value(&mut rt.sc())["contacts"],
        json!([{"id": 1, "title": "x"}, {"id": 2, "title": "y"}])
    );
}

#[test]
fn add_item_defaults_to_an_empty_object() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"rows": []}))
        .field(FieldDef::repeatable("rows", vec![FieldDef::new("v")]))
        .build();

    let child = form.field("rows").add_item(json!(null), rt.ac());
    assert_eq!(child.value(&mut rt.sc()), json!({"v": null}));
}

#[test]
fn remove_item_drops_exactly_one_child() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"rows": [{"v": 1}, {"v": 2}, {"v": 3}]}))
        .field(FieldDef::repeatable("rows", vec![FieldDef::new("v")]))
        .build();
    let field = form.field("rows").clone();

    field.remove_item(1, rt.ac());
    let children = field.repeatable_forms(&mut rt.sc());
    let values: Vec<_> = children
        .iter()
        .map(|child| child.value(&mut rt.sc()))
        .collect();
    assert_eq!(values, vec![json!({"v": 1}), json!({"v": 3})]);
    assert!(field.touched().get(&mut rt.sc()));

    // Out of range is a silent no-op.
    field.remove_item(10, rt.ac());
    assert_eq!(field.repeatable_forms(&mut rt.sc()).len(), 2);
}

#[test]
#[should_panic(expected = "not a repeatable group")]
fn add_item_panics_on_plain_fields() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"name": ""}))
        .field(FieldDef::new("name"))
        .build();
    form.field("name").add_item(json!({}), rt.ac());
}

#[test]
fn malformed_repeatable_model_becomes_empty() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"rows": "not an array"}))
        .field(FieldDef::repeatable("rows", vec![FieldDef::new("v")]))
        .build();
    assert!(form.field("rows").repeatable_forms(&mut rt.sc()).is_empty());
    assert_eq!(form.value(&mut rt.sc()), json!({"rows": []}));
}

#[test]
fn static_options_are_returned_as_declared() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({}))
        .field(
            FieldDef::new("country")
                .control(ControlKind::Select)
                .options(vec![
                    SelectOption::new("Norway", json!("no")).with_icon("flag-no"),
                    SelectOption::new("Sweden", json!("se")),
                ]),
        )
        .build();

    let options = form.field("country").options(&mut rt.sc());
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].label, "Norway");
    assert_eq!(options[0].icon.as_deref(), Some("flag-no"));
}

#[test]
fn computed_options_follow_their_source() {
    let mut rt = Runtime::new();
    let form = FormBuilder::new(json!({"country": "", "city": ""}))
        .field(FieldDef::new("country").control(ControlKind::Select).options(vec![
            SelectOption::new("Norway", json!("no")),
            SelectOption::new("Sweden", json!("se")),
        ]))
        .field(
            FieldDef::new("city")
                .control(ControlKind::Select)
                .computed_options(
                    |form, sc| form.field("country").value().get(sc),
                    |country, _, _| match country.as_str() {
                        Some("no") => vec![SelectOption::new("Oslo", json!("oslo"))],
                        Some("se") => vec![
                            SelectOption::new("Stockholm", json!("sthlm")),
                            SelectOption::new("Malmö", json!("malmo")),
                        ],
                        _ => Vec::new(),
                    },
                ),
        )
        .build();
    let city = form.field("city").clone();

    assert!(city.options(&mut rt.sc()).is_empty());
    form.field("country").value().set(json!("se"), rt.ac());
    assert_eq!(city.options(&mut rt.sc()).len(), 2);
    form.field("country").value().set(json!("no"), rt.ac());
    assert_eq!(city.options(&mut rt.sc())[0].label, "Oslo");
}

#[test]
fn value_observer_fires_on_change() {
    let mut rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let form = FormBuilder::new(json!({"name": "a"}))
        .field(FieldDef::new("name"))
        .build();

    let _s = form
        .field("name")
        .on_value_change(|value| call!("{}", value.as_str().unwrap_or("?")));
    rt.update();
    cr.verify("a");

    form.field("name").value().set(json!("b"), rt.ac());
    rt.update();
    cr.verify("b");

    drop(_s);
    form.field("name").value().set(json!("c"), rt.ac());
    rt.update();
    cr.verify(());
}

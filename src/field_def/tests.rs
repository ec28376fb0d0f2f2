use std::time::Duration;

use crate::{
    validation::ValidationTrigger, CheckboxValueType, ControlKind, FieldDef, ValidationOverrides,
};

#[test]
fn defaults() {
    let def = FieldDef::new("name");
    assert_eq!(def.name(), "name");
    assert_eq!(def.control, ControlKind::Text);
    assert_eq!(def.value_type, CheckboxValueType::Array);
    assert!(!def.repeatable);
    assert!(def.fields.is_none());
    assert!(def.validators.is_empty());
}

#[test]
fn group_and_repeatable_constructors() {
    let group = FieldDef::group("address", vec![FieldDef::new("line1")]);
    assert!(!group.repeatable);
    assert_eq!(group.fields.as_ref().unwrap().len(), 1);

    let repeatable = FieldDef::repeatable("contacts", vec![FieldDef::new("email")]);
    assert!(repeatable.repeatable);
    assert!(repeatable.fields.is_some());
}

#[test]
fn builder_accumulates() {
    let def = FieldDef::new("plan")
        .control(ControlKind::Select)
        .label("Plan")
        .placeholder("Pick one")
        .disabled(true)
        .validation(
            ValidationOverrides::default()
                .trigger(ValidationTrigger::Blur)
                .debounce(Duration::from_millis(50)),
        );
    assert_eq!(def.label.as_deref(), Some("Plan"));
    assert_eq!(def.placeholder.as_deref(), Some("Pick one"));
    assert_eq!(def.validation.trigger, Some(ValidationTrigger::Blur));
    assert_eq!(def.validation.debounce, Some(Duration::from_millis(50)));
}

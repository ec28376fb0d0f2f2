//! The stateless algorithms behind every form operation.
//!
//! Each function walks a borrowed field array in declaration order, recursing
//! into nested and repeatable child forms depth-first. Nothing here holds
//! state; the owning [`Form`] is threaded through explicitly so validators
//! and disabled-predicates can read sibling fields (for a stepped form this
//! is the virtual union form, not the step the field was declared in).

use std::{rc::Rc, time::Duration};

use serde_json::Value;
use sigmut::{core::spawn_action_async, ActionContext, SignalContext};

use crate::{
    factory,
    field::{Field, FieldVariant},
    field_def::CheckboxValueType,
    form::{FieldError, Form, SaveStatus},
    utils::timer,
    ControlKind,
};

#[cfg(test)]
mod tests;

/// How long a form stays in [`SaveStatus::Success`] before falling back to
/// idle.
pub(crate) const SUCCESS_RESET_DELAY: Duration = Duration::from_millis(100);

/// Runs synchronous validation over every field, in array order.
///
/// Group fields delegate to their child forms and do not run validators of
/// their own; every other field is marked touched and validated with
/// first-error-wins semantics. Every field is visited even after a failure.
pub(crate) fn validate_fields(fields: &[Rc<Field>], form: &Form, ac: &mut ActionContext) -> bool {
    let mut valid = true;
    for field in fields {
        match field.variant() {
            FieldVariant::NestedGroup(child) => {
                valid &= child.validate(ac);
            }
            FieldVariant::RepeatableGroup(group) => {
                let children = group.forms(&mut ac.sc());
                for child in children {
                    valid &= child.validate(ac);
                }
            }
            _ => {
                field.touched().set(true, ac);
                valid &= run_sync_validators(field, form, ac);
            }
        }
    }
    valid
}

/// Runs a field's validator list against its current value, storing the
/// first failure (or clearing the error). Returns whether the field is valid.
pub(crate) fn run_sync_validators(field: &Field, form: &Form, ac: &mut ActionContext) -> bool {
    let value = field.value().get(&mut ac.sc());
    for validator in field.validators() {
        let message = validator.run(&value, form, &mut ac.sc());
        if let Some(message) = message {
            field.error().set(Some(message), ac);
            return false;
        }
    }
    field.error().set(None, ac);
    true
}

/// Like [`validate_fields`], but pure: no touched flags, no stored errors.
pub(crate) fn check_fields(fields: &[Rc<Field>], form: &Form, sc: &mut SignalContext) -> bool {
    for field in fields {
        let ok = match field.variant() {
            FieldVariant::NestedGroup(child) => check_fields(child.fields(), child, sc),
            FieldVariant::RepeatableGroup(group) => group
                .forms(sc)
                .iter()
                .all(|child| check_fields(child.fields(), child, sc)),
            _ => {
                let value = field.value().get(sc);
                field
                    .validators()
                    .iter()
                    .all(|v| v.run(&value, form, sc).is_none())
            }
        };
        if !ok {
            return false;
        }
    }
    true
}

/// Restores every field to its construction-time value and clears the
/// touched/dirty/error/focus flags. Nested groups reset their own form;
/// repeatable groups rebuild their child list from the initial model array.
pub(crate) fn reset_fields(fields: &[Rc<Field>], initial: &Value, ac: &mut ActionContext) {
    for field in fields {
        match field.variant() {
            FieldVariant::NestedGroup(child) => child.reset(ac),
            FieldVariant::RepeatableGroup(_) => {
                let items = initial.get(field.name()).cloned().unwrap_or(Value::Null);
                let children = factory::build_group_children(field, &items);
                field.set_repeatable_forms(children, ac);
                clear_field_flags(field, ac);
            }
            _ => {
                field.value().set(field.initial_value().clone(), ac);
                clear_field_flags(field, ac);
            }
        }
    }
}

fn clear_field_flags(field: &Field, ac: &mut ActionContext) {
    field.touched().set(false, ac);
    field.dirty().set(false, ac);
    field.error().set(None, ac);
    field.focus().set(false, ac);
}

/// Applies a partial model: keys absent from `patch` are skipped entirely,
/// present keys update the field and mark it dirty (never touched).
pub(crate) fn patch_fields(fields: &[Rc<Field>], patch: &Value, ac: &mut ActionContext) {
    for field in fields {
        let Some(value) = patch.get(field.name()) else {
            continue;
        };
        match field.variant() {
            FieldVariant::NestedGroup(child) => child.patch_value(value, ac),
            FieldVariant::RepeatableGroup(_) => {
                if value.is_array() {
                    let children = factory::build_group_children(field, value);
                    field.set_repeatable_forms(children, ac);
                    field.dirty().set(true, ac);
                }
            }
            _ => {
                field.value().set(value.clone(), ac);
                field.dirty().set(true, ac);
            }
        }
    }
}

/// Applies a full model: every field is set unconditionally (absent keys set
/// `null`) and marked dirty.
pub(crate) fn set_fields_value(fields: &[Rc<Field>], model: &Value, ac: &mut ActionContext) {
    for field in fields {
        let value = model.get(field.name()).cloned().unwrap_or(Value::Null);
        match field.variant() {
            FieldVariant::NestedGroup(child) => child.set_value(&value, ac),
            FieldVariant::RepeatableGroup(_) => {
                let children = factory::build_group_children(field, &value);
                field.set_repeatable_forms(children, ac);
                field.dirty().set(true, ac);
            }
            _ => {
                field.value().set(value, ac);
                field.dirty().set(true, ac);
            }
        }
    }
}

/// Depth-first, order-preserving error collection. Paths are the fields'
/// construction paths, so repeatable children come out index-qualified.
pub(crate) fn collect_errors(
    fields: &[Rc<Field>],
    sc: &mut SignalContext,
    out: &mut Vec<FieldError>,
) {
    for field in fields {
        match field.variant() {
            FieldVariant::NestedGroup(child) => collect_errors(child.fields(), sc, out),
            FieldVariant::RepeatableGroup(group) => {
                for child in group.forms(sc) {
                    collect_errors(child.fields(), sc, out);
                }
            }
            _ => {
                if let Some(message) = field.error().get(sc) {
                    out.push(FieldError {
                        name: field.name().to_string(),
                        path: field.path().to_string(),
                        message,
                        field: field.clone(),
                    });
                }
            }
        }
    }
}

/// The output model: enabled fields only, each transformed by
/// [`field_output_value`]. Disabled fields are omitted, not nulled.
pub(crate) fn output_value(fields: &[Rc<Field>], form: &Form, sc: &mut SignalContext) -> Value {
    let mut map = serde_json::Map::new();
    for field in fields {
        if field.is_disabled_in(form, sc) {
            continue;
        }
        map.insert(field.name().to_string(), field_output_value(field, sc));
    }
    Value::Object(map)
}

/// A single field's contribution to the output model.
pub(crate) fn field_output_value(field: &Rc<Field>, sc: &mut SignalContext) -> Value {
    match field.variant() {
        FieldVariant::RepeatableGroup(group) => {
            Value::Array(group.forms(sc).iter().map(|child| child.value(sc)).collect())
        }
        FieldVariant::NestedGroup(child) => child.value(sc),
        _ if field.control() == ControlKind::CheckboxGroup => {
            let raw = field.value().get(sc);
            match field.checkbox_value_type() {
                CheckboxValueType::Map => raw,
                CheckboxValueType::Array => match raw {
                    Value::Object(record) => Value::Array(
                        record
                            .iter()
                            .filter(|(_, checked)| checked.as_bool() == Some(true))
                            .map(|(key, _)| Value::String(key.clone()))
                            .collect(),
                    ),
                    other => other,
                },
            }
        }
        _ => field.value().get(sc),
    }
}

/// Every field's stored value verbatim: no disabled filtering, no output
/// transforms. Child forms contribute their own raw value.
pub(crate) fn raw_value(fields: &[Rc<Field>], sc: &mut SignalContext) -> Value {
    let mut map = serde_json::Map::new();
    for field in fields {
        let value = match field.variant() {
            FieldVariant::NestedGroup(child) => child.raw_value(sc),
            FieldVariant::RepeatableGroup(group) => Value::Array(
                group
                    .forms(sc)
                    .iter()
                    .map(|child| child.raw_value(sc))
                    .collect(),
            ),
            _ => field.value().get(sc),
        };
        map.insert(field.name().to_string(), value);
    }
    Value::Object(map)
}

/// The save pipeline.
///
/// Validation failure or a failed save handler ends in
/// [`SaveStatus::Error`]; success clears the touched/dirty flags (child
/// forms save recursively) and, unless the form is configured to disable its
/// fields upon completion, falls back to idle after a short delay.
pub(crate) fn run_save(form: &Form, ac: &mut ActionContext) {
    let status = form.status().clone();
    if !validate_fields(form.fields(), form, ac) {
        log::debug!("save rejected by validation");
        status.set(SaveStatus::Error, ac);
        return;
    }
    status.set(SaveStatus::Submitting, ac);
    let value = output_value(form.fields(), form, &mut ac.sc());
    if let Some(handler) = form.save_handler() {
        if let Err(error) = handler(&value, ac) {
            log::debug!("save handler failed: {error}");
            status.set(SaveStatus::Error, ac);
            return;
        }
    }
    status.set(SaveStatus::Success, ac);
    clear_saved_flags(form.fields(), ac);
    if form.config().disable_on_complete {
        for field in form.fields() {
            if !matches!(field.variant(), FieldVariant::NestedGroup(_)) {
                field.force_disable(ac);
            }
        }
    } else {
        spawn_action_async(move |aac| async move {
            timer::sleep(SUCCESS_RESET_DELAY).await;
            aac.call(|ac| {
                if status.get(&mut ac.sc()) == SaveStatus::Success {
                    status.set(SaveStatus::Idle, ac);
                }
            });
        });
    }
}

fn clear_saved_flags(fields: &[Rc<Field>], ac: &mut ActionContext) {
    for field in fields {
        match field.variant() {
            FieldVariant::NestedGroup(child) => child.save(ac),
            FieldVariant::RepeatableGroup(group) => {
                let children = group.forms(&mut ac.sc());
                for child in children {
                    child.save(ac);
                }
                field.touched().set(false, ac);
                field.dirty().set(false, ac);
            }
            _ => {
                field.touched().set(false, ac);
                field.dirty().set(false, ac);
            }
        }
    }
}

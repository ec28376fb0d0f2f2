use std::{cell::RefCell, rc::Rc};

use serde_json::Value;
use sigmut::{Signal, State};

use crate::{
    field::{Field, FieldOptions, FieldVariant, RepeatableGroup},
    field_def::{CheckboxValueType, FieldDef},
    form::{Form, FormBuilder},
    ControlKind,
};

/// Materializes one field node from its definition, the parent model value
/// and the owning form.
///
/// Dispatch order: repeatable marker first, then a nested field list, then a
/// plain field (augmented with options when the control carries them). The
/// definition itself is never mutated; templates for repeatable children are
/// cloned out of it.
pub(crate) fn build_field(
    def: &FieldDef,
    model: &Value,
    form: &Form,
    parent_path: &str,
) -> Rc<Field> {
    let path = join_path(parent_path, &def.name);
    let model_value = model.get(&def.name);

    let (variant, value, initial) = if def.repeatable {
        let template = Rc::new(def.fields.clone().unwrap_or_default());
        let items = model_value.and_then(Value::as_array).cloned().unwrap_or_default();
        let children = items
            .iter()
            .enumerate()
            .map(|(i, item)| build_child_form(&template, item, form, format!("{path}[{i}]")))
            .collect();
        let group = RepeatableGroup {
            forms: State::new(children),
            template,
        };
        (
            FieldVariant::RepeatableGroup(group),
            State::new(Value::Null),
            Value::Null,
        )
    } else if let Some(fields) = &def.fields {
        let child_model = model_value.cloned().unwrap_or(Value::Null);
        let child = FormBuilder::new(child_model)
            .fields(fields.iter().cloned())
            .config(form.config().clone())
            .parent(form.clone())
            .parent_path(path.clone())
            .build();
        (
            FieldVariant::NestedGroup(child),
            State::new(Value::Null),
            Value::Null,
        )
    } else {
        let initial = initial_value(def, model_value);
        let value = State::new(initial.clone());
        let variant = if def.control.has_options()
            && (!def.options.is_empty() || def.computed_options.is_some())
        {
            FieldVariant::WithOptions(build_options(def, form, &value))
        } else {
            FieldVariant::Plain
        };
        (variant, value, initial)
    };

    log::trace!("built field `{path}` ({})", def.control);
    Rc::new(Field {
        name: def.name.clone(),
        path,
        control: def.control,
        label: def.label.clone(),
        placeholder: def.placeholder.clone(),
        initial,
        value,
        error: State::new(None),
        async_error: State::new(None),
        validating: State::new(false),
        touched: State::new(false),
        dirty: State::new(false),
        focus: State::new(false),
        disabled: def.disabled.clone(),
        hidden: def.hidden.clone(),
        disabled_override: State::new(false),
        validators: def.validators.clone(),
        async_validators: def.async_validators.clone(),
        validation: def.validation,
        value_type: def.value_type,
        variant,
        form: RefCell::new(Rc::downgrade(&form.0)),
    })
}

/// Builds one child form of a repeatable group from the group's template.
pub(crate) fn build_child_form(
    template: &Rc<Vec<FieldDef>>,
    initial: &Value,
    parent: &Form,
    path: String,
) -> Form {
    FormBuilder::new(initial.clone())
        .fields(template.iter().cloned())
        .config(parent.config().clone())
        .parent(parent.clone())
        .parent_path(path)
        .build()
}

/// Rebuilds the child-form list of a repeatable group field from an array
/// value; anything that is not an array yields an empty list.
pub(crate) fn build_group_children(field: &Field, items: &Value) -> Vec<Form> {
    let FieldVariant::RepeatableGroup(group) = field.variant() else {
        return Vec::new();
    };
    let parent = field.form();
    let items = items.as_array().cloned().unwrap_or_default();
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            build_child_form(&group.template, item, &parent, format!("{}[{}]", field.path(), i))
        })
        .collect()
}

fn build_options(def: &FieldDef, form: &Form, value: &State<Value>) -> FieldOptions {
    let computed = def.computed_options.as_ref().map(|computed| {
        let weak = Rc::downgrade(&form.0);
        let statics = def.options.clone();
        let source = computed.source.clone();
        let filter = computed.filter.clone();
        let value = value.clone();
        Signal::new(move |sc| {
            let Some(form) = weak.upgrade().map(Form) else {
                return statics.clone();
            };
            let source_value = source(&form, sc);
            let current = value.get(sc);
            filter(&source_value, &statics, &current)
        })
    });
    FieldOptions {
        static_options: def.options.clone(),
        computed,
    }
}

fn initial_value(def: &FieldDef, model_value: Option<&Value>) -> Value {
    if def.control == ControlKind::CheckboxGroup {
        return checkbox_group_initial(def, model_value);
    }
    match model_value {
        Some(value) => value.clone(),
        None => def.control.default_value(),
    }
}

/// Checkbox groups store their raw value as a record. The `Map` value type
/// requires every known option key to be present as an explicit boolean;
/// the `Array` value type keeps whatever shape the model supplied.
fn checkbox_group_initial(def: &FieldDef, model_value: Option<&Value>) -> Value {
    match def.value_type {
        CheckboxValueType::Map => {
            let mut record = serde_json::Map::new();
            for option in &def.options {
                if let Some(key) = option.value.as_str() {
                    let checked = model_value
                        .and_then(|v| v.get(key))
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    record.insert(key.to_string(), Value::Bool(checked));
                }
            }
            Value::Object(record)
        }
        CheckboxValueType::Array => match model_value {
            Some(value) => value.clone(),
            None => Value::Object(Default::default()),
        },
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

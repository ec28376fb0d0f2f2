use std::rc::Rc;

use serde_json::Value;
use sigmut::SignalContext;

use crate::{
    field::{Condition, ControlKind, SelectOption},
    validation::ValidationOverrides,
    AsyncValidator, Form, Validator,
};

#[cfg(test)]
mod tests;

/// How a checkbox-group field reports its value.
///
/// `Array` yields the list of checked option keys; `Map` yields the full
/// record of option keys to booleans.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CheckboxValueType {
    #[default]
    Array,
    Map,
}

/// Derives an option list from other form state.
///
/// `filter` reruns with the current `source` output, the statically declared
/// options and the field's current value whenever a dependency of `source`
/// changes.
#[derive(Clone)]
pub struct ComputedOptions {
    pub(crate) source: Rc<dyn Fn(&Form, &mut SignalContext) -> Value>,
    pub(crate) filter: Rc<dyn Fn(&Value, &[SelectOption], &Value) -> Vec<SelectOption>>,
}

/// Declarative description of one field, consumed by the form builder.
///
/// Construction follows the builder idiom:
///
/// ```
/// use sigform::{validators, ControlKind, FieldDef, SelectOption};
/// use serde_json::json;
///
/// let def = FieldDef::new("country")
///     .control(ControlKind::Select)
///     .label("Country")
///     .validator(validators::required())
///     .options(vec![
///         SelectOption::new("Norway", json!("no")),
///         SelectOption::new("Sweden", json!("se")),
///     ]);
/// # let _ = def;
/// ```
#[derive(Clone)]
pub struct FieldDef {
    pub(crate) name: String,
    pub(crate) control: ControlKind,
    pub(crate) label: Option<String>,
    pub(crate) placeholder: Option<String>,
    pub(crate) validators: Vec<Validator>,
    pub(crate) async_validators: Vec<AsyncValidator>,
    pub(crate) disabled: Condition,
    pub(crate) hidden: Condition,
    pub(crate) options: Vec<SelectOption>,
    pub(crate) computed_options: Option<ComputedOptions>,
    pub(crate) fields: Option<Vec<FieldDef>>,
    pub(crate) repeatable: bool,
    pub(crate) value_type: CheckboxValueType,
    pub(crate) validation: ValidationOverrides,
}

impl FieldDef {
    /// A plain field keyed by `name` in the parent model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            control: ControlKind::Text,
            label: None,
            placeholder: None,
            validators: Vec::new(),
            async_validators: Vec::new(),
            disabled: Condition::Static(false),
            hidden: Condition::Static(false),
            options: Vec::new(),
            computed_options: None,
            fields: None,
            repeatable: false,
            value_type: CheckboxValueType::default(),
            validation: ValidationOverrides::default(),
        }
    }

    /// A nested group: the model value under `name` is an object described by
    /// its own field list, materialized as an independent child form.
    pub fn group(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            fields: Some(fields),
            ..Self::new(name)
        }
    }

    /// A repeatable group: the model value under `name` is an array of
    /// objects, each materialized as its own child form.
    pub fn repeatable(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            fields: Some(fields),
            repeatable: true,
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn control(mut self, control: ControlKind) -> Self {
        self.control = control;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn async_validator(mut self, validator: AsyncValidator) -> Self {
        self.async_validators.push(validator);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Condition::Static(disabled);
        self
    }

    /// Disables the field whenever the predicate evaluates true against the
    /// owning form. Tracked reads make the state recompute automatically.
    pub fn disabled_when(
        mut self,
        predicate: impl Fn(&Form, &mut SignalContext) -> bool + 'static,
    ) -> Self {
        self.disabled = Condition::Computed(Rc::new(predicate));
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Condition::Static(hidden);
        self
    }

    pub fn hidden_when(
        mut self,
        predicate: impl Fn(&Form, &mut SignalContext) -> bool + 'static,
    ) -> Self {
        self.hidden = Condition::Computed(Rc::new(predicate));
        self
    }

    pub fn options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = options;
        self
    }

    pub fn computed_options(
        mut self,
        source: impl Fn(&Form, &mut SignalContext) -> Value + 'static,
        filter: impl Fn(&Value, &[SelectOption], &Value) -> Vec<SelectOption> + 'static,
    ) -> Self {
        self.computed_options = Some(ComputedOptions {
            source: Rc::new(source),
            filter: Rc::new(filter),
        });
        self
    }

    pub fn value_type(mut self, value_type: CheckboxValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn validation(mut self, validation: ValidationOverrides) -> Self {
        self.validation = validation;
        self
    }
}

impl std::fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("control", &self.control)
            .field("repeatable", &self.repeatable)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use parse_display::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sigmut::{effect, ActionContext, Signal, SignalContext, State, Subscription};

use crate::{
    factory,
    field_def::{CheckboxValueType, FieldDef},
    form::{Form, FormNode},
    validation::ValidationOverrides,
    AsyncValidator, Validator,
};

#[cfg(test)]
mod tests;

/// The input control a field renders as.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[display(style = "kebab-case")]
pub enum ControlKind {
    Text,
    TextArea,
    Number,
    Password,
    Date,
    Checkbox,
    CheckboxGroup,
    Select,
    MultiSelect,
    Radio,
    ChipList,
}

impl ControlKind {
    /// Whether this control renders an option list.
    pub fn has_options(self) -> bool {
        matches!(
            self,
            Self::Select
                | Self::Radio
                | Self::Checkbox
                | Self::CheckboxGroup
                | Self::MultiSelect
                | Self::ChipList
        )
    }

    pub(crate) fn default_value(self) -> Value {
        match self {
            Self::Checkbox => Value::Bool(false),
            Self::CheckboxGroup => Value::Object(Default::default()),
            Self::MultiSelect | Self::ChipList => Value::Array(Vec::new()),
            _ => Value::Null,
        }
    }
}

/// One selectable entry of an option-bearing field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// A boolean that is either fixed or derived from form state.
#[derive(Clone)]
pub enum Condition {
    Static(bool),
    Computed(Rc<dyn Fn(&Form, &mut SignalContext) -> bool>),
}

impl Condition {
    pub(crate) fn eval(&self, form: &Form, sc: &mut SignalContext) -> bool {
        match self {
            Self::Static(value) => *value,
            Self::Computed(f) => f(form, sc),
        }
    }
}

impl From<bool> for Condition {
    fn from(value: bool) -> Self {
        Self::Static(value)
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Option state of a [`FieldVariant::WithOptions`] field.
pub struct FieldOptions {
    pub(crate) static_options: Vec<SelectOption>,
    pub(crate) computed: Option<Signal<Vec<SelectOption>>>,
}

impl FieldOptions {
    pub fn get(&self, sc: &mut SignalContext) -> Vec<SelectOption> {
        match &self.computed {
            Some(signal) => signal.get(sc),
            None => self.static_options.clone(),
        }
    }
}

/// Child-form state of a [`FieldVariant::RepeatableGroup`] field.
pub struct RepeatableGroup {
    pub(crate) forms: State<Vec<Form>>,
    pub(crate) template: Rc<Vec<FieldDef>>,
}

impl RepeatableGroup {
    pub fn forms(&self, sc: &mut SignalContext) -> Vec<Form> {
        self.forms.get(sc)
    }

    pub fn len(&self, sc: &mut SignalContext) -> usize {
        self.forms.borrow(sc).len()
    }

    pub fn is_empty(&self, sc: &mut SignalContext) -> bool {
        self.len(sc) == 0
    }
}

/// The field kind, resolved once at construction time.
pub enum FieldVariant {
    Plain,
    WithOptions(FieldOptions),
    NestedGroup(Form),
    RepeatableGroup(RepeatableGroup),
}

/// One reactive unit of form state: a single input, a nested sub-form, or a
/// repeated group of sub-forms.
///
/// Fields are created by the form builder and owned by their form container;
/// [`form`](Self::form) is the non-owning back-reference used for validator
/// context and path resolution.
pub struct Field {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) control: ControlKind,
    pub(crate) label: Option<String>,
    pub(crate) placeholder: Option<String>,
    pub(crate) initial: Value,
    pub(crate) value: State<Value>,
    pub(crate) error: State<Option<String>>,
    pub(crate) async_error: State<Option<String>>,
    pub(crate) validating: State<bool>,
    pub(crate) touched: State<bool>,
    pub(crate) dirty: State<bool>,
    pub(crate) focus: State<bool>,
    pub(crate) disabled: Condition,
    pub(crate) hidden: Condition,
    pub(crate) disabled_override: State<bool>,
    pub(crate) validators: Vec<Validator>,
    pub(crate) async_validators: Vec<AsyncValidator>,
    pub(crate) validation: ValidationOverrides,
    pub(crate) value_type: CheckboxValueType,
    pub(crate) variant: FieldVariant,
    pub(crate) form: RefCell<Weak<FormNode>>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path of this field from the form-tree root, e.g.
    /// `address.line1` or `contacts[2].email`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn control(&self) -> ControlKind {
        self.control
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    pub fn value(&self) -> &State<Value> {
        &self.value
    }

    pub fn error(&self) -> &State<Option<String>> {
        &self.error
    }

    pub fn async_error(&self) -> &State<Option<String>> {
        &self.async_error
    }

    pub fn validating(&self) -> &State<bool> {
        &self.validating
    }

    pub fn touched(&self) -> &State<bool> {
        &self.touched
    }

    pub fn dirty(&self) -> &State<bool> {
        &self.dirty
    }

    pub fn focus(&self) -> &State<bool> {
        &self.focus
    }

    pub fn variant(&self) -> &FieldVariant {
        &self.variant
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn async_validators(&self) -> &[AsyncValidator] {
        &self.async_validators
    }

    pub(crate) fn validation_overrides(&self) -> ValidationOverrides {
        self.validation
    }

    pub(crate) fn checkbox_value_type(&self) -> CheckboxValueType {
        self.value_type
    }

    pub(crate) fn initial_value(&self) -> &Value {
        &self.initial
    }

    /// Whether any validator carries the required marker.
    pub fn is_required(&self) -> bool {
        self.validators.iter().any(Validator::marks_required)
    }

    /// The owning form container.
    ///
    /// # Panics
    ///
    /// Panics if the field has been detached from its form (the form was
    /// dropped while the field was kept alive).
    pub fn form(&self) -> Form {
        self.form
            .borrow()
            .upgrade()
            .map(Form)
            .unwrap_or_else(|| panic!("field `{}` is not attached to a form", self.path))
    }

    pub fn is_disabled(&self, sc: &mut SignalContext) -> bool {
        let form = self.form();
        self.is_disabled_in(&form, sc)
    }

    pub(crate) fn is_disabled_in(&self, form: &Form, sc: &mut SignalContext) -> bool {
        self.disabled_override.get(sc) || self.disabled.eval(form, sc)
    }

    pub fn is_hidden(&self, sc: &mut SignalContext) -> bool {
        let form = self.form();
        self.hidden.eval(&form, sc)
    }

    pub(crate) fn force_disable(&self, ac: &mut ActionContext) {
        self.disabled_override.set(true, ac);
    }

    /// The current option list; empty for fields without options.
    pub fn options(&self, sc: &mut SignalContext) -> Vec<SelectOption> {
        match &self.variant {
            FieldVariant::WithOptions(options) => options.get(sc),
            _ => Vec::new(),
        }
    }

    /// The child form of a nested group, if this field is one.
    pub fn nested_form(&self) -> Option<&Form> {
        match &self.variant {
            FieldVariant::NestedGroup(form) => Some(form),
            _ => None,
        }
    }

    /// Passthrough to the nested child form's fields; empty for other kinds.
    pub fn fields(&self) -> &[Rc<Field>] {
        match &self.variant {
            FieldVariant::NestedGroup(form) => form.fields(),
            _ => &[],
        }
    }

    /// The child forms of a repeatable group; empty for other kinds.
    pub fn repeatable_forms(&self, sc: &mut SignalContext) -> Vec<Form> {
        match &self.variant {
            FieldVariant::RepeatableGroup(group) => group.forms(sc),
            _ => Vec::new(),
        }
    }

    /// Appends a child form to a repeatable group, seeded with `initial`
    /// (`null` defaults to an empty object), and marks the group touched and
    /// dirty.
    ///
    /// # Panics
    ///
    /// Panics if the field is not a repeatable group.
    pub fn add_item(&self, initial: Value, ac: &mut ActionContext) -> Form {
        let group = self.expect_repeatable("add_item");
        let initial = match initial {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let index = group.forms.borrow(&mut ac.sc()).len();
        let child = factory::build_child_form(
            &group.template,
            &initial,
            &self.form(),
            format!("{}[{}]", self.path, index),
        );
        log::trace!("adding item {} to `{}`", index, self.path);
        {
            let mut forms = group.forms.borrow_mut(ac);
            forms.push(child.clone());
        }
        self.touched.set(true, ac);
        self.dirty.set(true, ac);
        child
    }

    /// Removes the child form at `index` from a repeatable group and marks
    /// the group touched and dirty. Out-of-range indices are ignored.
    ///
    /// # Panics
    ///
    /// Panics if the field is not a repeatable group.
    pub fn remove_item(&self, index: usize, ac: &mut ActionContext) {
        let group = self.expect_repeatable("remove_item");
        let removed = {
            let mut forms = group.forms.borrow_mut(ac);
            if index < forms.len() {
                forms.remove(index);
                true
            } else {
                false
            }
        };
        if removed {
            log::trace!("removed item {} from `{}`", index, self.path);
            self.touched.set(true, ac);
            self.dirty.set(true, ac);
        }
    }

    pub(crate) fn set_repeatable_forms(&self, forms: Vec<Form>, ac: &mut ActionContext) {
        let group = self.expect_repeatable("set_repeatable_forms");
        group.forms.set(forms, ac);
    }

    fn expect_repeatable(&self, op: &str) -> &RepeatableGroup {
        match &self.variant {
            FieldVariant::RepeatableGroup(group) => group,
            _ => panic!("`{}` called on `{}`, which is not a repeatable group", op, self.path),
        }
    }

    /// Invokes `f` with the current value and again whenever it changes, for
    /// as long as the returned [`Subscription`] is held.
    pub fn on_value_change(&self, mut f: impl FnMut(&Value) + 'static) -> Subscription {
        let value = self.value.clone();
        effect(move |sc| f(&value.borrow(sc)))
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("control", &self.control)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

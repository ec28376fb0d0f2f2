use std::{
    cell::OnceCell,
    error::Error,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;
use parse_display::Display;
use serde_json::Value;
use sigmut::{ActionContext, Signal, SignalContext, State};

use crate::{
    engine, factory,
    field::Field,
    field_def::FieldDef,
    path::find_field_by_path,
    validation::ValidationOverrides,
};


/// Where a form is in its save lifecycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[display(style = "lowercase")]
pub enum SaveStatus {
    Idle,
    Submitting,
    Success,
    Error,
}

/// Invoked with the aggregate output value when a valid form is saved.
/// An `Err` puts the form into [`SaveStatus::Error`]; it is never rethrown.
pub type SaveHandler = Rc<dyn Fn(&Value, &mut ActionContext) -> Result<(), Box<dyn Error>>>;

/// Layout and behavior hints for a form container.
#[derive(Clone, Debug)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct FormConfig {
    /// Column count hint for rendering.
    pub columns: u8,
    /// Keep the form in [`SaveStatus::Success`] after saving and disable
    /// every field, instead of falling back to idle.
    pub disable_on_complete: bool,
    /// Validation defaults for every field in this form.
    pub validation: ValidationOverrides,
}

impl FormConfig {
    pub fn new() -> Self {
        Self {
            columns: 1,
            disable_on_complete: false,
            validation: ValidationOverrides::default(),
        }
    }
}

pub(crate) struct FormNode {
    title: Option<String>,
    path: String,
    fields: OnceCell<Vec<Rc<Field>>>,
    status: State<SaveStatus>,
    config: FormConfig,
    parent: Weak<FormNode>,
    initial: Value,
    on_save: Option<SaveHandler>,
}

/// The aggregate over a field array: derived validity and dirtiness plus the
/// save/reset/patch operations. Cheap to clone; clones share state.
///
/// Forms are built once from a field-definition tree and an initial model:
///
/// ```
/// use serde_json::json;
/// use sigform::{validators, FieldDef, FormBuilder};
///
/// let mut rt = sigmut::core::Runtime::new();
/// let form = FormBuilder::new(json!({"name": "", "age": 34}))
///     .field(FieldDef::new("name").validator(validators::required()))
///     .field(FieldDef::new("age"))
///     .build();
///
/// assert!(!form.validate(rt.ac()));
/// assert_eq!(
///     form.field("name").error().get(&mut rt.sc()).as_deref(),
///     Some("This field is required"),
/// );
/// ```
#[derive(Clone)]
pub struct Form(pub(crate) Rc<FormNode>);

impl Form {
    /// The field nodes, in declaration (render) order.
    pub fn fields(&self) -> &[Rc<Field>] {
        self.0.fields.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Looks up a direct field by name.
    ///
    /// # Panics
    ///
    /// Panics if no field with that name exists; use
    /// [`try_field`](Self::try_field) for possibly-absent names.
    pub fn field(&self, name: &str) -> &Rc<Field> {
        self.try_field(name)
            .unwrap_or_else(|| panic!("field `{name}` not found in form"))
    }

    pub fn try_field(&self, name: &str) -> Option<&Rc<Field>> {
        self.fields().iter().find(|field| field.name() == name)
    }

    /// Looks up a field anywhere in the form tree by a dotted/indexed path
    /// such as `address.line1` or `contacts[2].email`. Unknown names,
    /// malformed paths and out-of-range indices yield `None`.
    pub fn field_by_path(&self, path: &str, sc: &mut SignalContext) -> Option<Rc<Field>> {
        find_field_by_path(self, path, sc)
    }

    pub fn status(&self) -> &State<SaveStatus> {
        &self.0.status
    }

    pub fn status_signal(&self) -> Signal<SaveStatus> {
        self.0.status.to_signal()
    }

    pub fn title(&self) -> Option<&str> {
        self.0.title.as_deref()
    }

    pub fn config(&self) -> &FormConfig {
        &self.0.config
    }

    /// This form's path from the form-tree root; empty at the root.
    pub fn path(&self) -> &str {
        &self.0.path
    }

    /// The parent form for nested and repeatable children, `None` at the
    /// tree root.
    pub fn parent(&self) -> Option<Form> {
        self.0.parent.upgrade().map(Form)
    }

    pub(crate) fn save_handler(&self) -> Option<&SaveHandler> {
        self.0.on_save.as_ref()
    }

    /// True if any field here or in a descendant form has been touched.
    pub fn any_touched(&self, sc: &mut SignalContext) -> bool {
        for field in self.fields() {
            if field.touched().get(sc) {
                return true;
            }
            if let Some(child) = field.nested_form() {
                if child.any_touched(sc) {
                    return true;
                }
            }
            for child in field.repeatable_forms(sc) {
                if child.any_touched(sc) {
                    return true;
                }
            }
        }
        false
    }

    /// True if any field here or in a descendant form is dirty.
    pub fn any_dirty(&self, sc: &mut SignalContext) -> bool {
        for field in self.fields() {
            if field.dirty().get(sc) {
                return true;
            }
            if let Some(child) = field.nested_form() {
                if child.any_dirty(sc) {
                    return true;
                }
            }
            for child in field.repeatable_forms(sc) {
                if child.any_dirty(sc) {
                    return true;
                }
            }
        }
        false
    }

    /// True right after a successful save, until the user edits again.
    pub fn has_saved(&self, sc: &mut SignalContext) -> bool {
        !self.any_touched(sc) && !self.any_dirty(sc) && self.0.status.get(sc) == SaveStatus::Success
    }

    /// The output model: enabled fields only, with per-kind output
    /// transforms applied.
    pub fn value(&self, sc: &mut SignalContext) -> Value {
        engine::output_value(self.fields(), self, sc)
    }

    /// Every field's stored value verbatim, disabled or not.
    pub fn raw_value(&self, sc: &mut SignalContext) -> Value {
        engine::raw_value(self.fields(), sc)
    }

    /// The output model as a derived signal, for UI wiring.
    pub fn value_signal(&self) -> Signal<Value> {
        let this = self.clone();
        Signal::new(move |sc| this.value(sc))
    }

    /// All current sync validation errors, depth-first in field order.
    pub fn errors(&self, sc: &mut SignalContext) -> Vec<FieldError> {
        let mut out = Vec::new();
        engine::collect_errors(self.fields(), sc, &mut out);
        out
    }

    /// Runs synchronous validation over the whole tree; returns validity.
    pub fn validate(&self, ac: &mut ActionContext) -> bool {
        engine::validate_fields(self.fields(), self, ac)
    }

    /// Restores construction-time values and clears field flags.
    pub fn reset(&self, ac: &mut ActionContext) {
        engine::reset_fields(self.fields(), &self.0.initial, ac);
    }

    /// Applies a partial model; keys absent from `patch` are left alone.
    pub fn patch_value(&self, patch: &Value, ac: &mut ActionContext) {
        engine::patch_fields(self.fields(), patch, ac);
    }

    /// Applies a full model; every field is overwritten and marked dirty.
    pub fn set_value(&self, model: &Value, ac: &mut ActionContext) {
        engine::set_fields_value(self.fields(), model, ac);
    }

    /// Validates and, if valid, saves: computes the output value, invokes
    /// the save handler, and drives [`SaveStatus`] through the submit
    /// lifecycle.
    pub fn save(&self, ac: &mut ActionContext) {
        engine::run_save(self, ac);
    }
}

impl std::fmt::Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.fields().iter().map(|field| field.name()).collect();
        f.debug_struct("Form")
            .field("path", &self.0.path)
            .field("fields", &names)
            .field("status", &self.0.status)
            .finish()
    }
}

/// One collected validation error, carrying enough context for an error
/// summary UI to render the message and focus the offending field.
#[derive(Clone, Debug)]
pub struct FieldError {
    pub name: String,
    pub message: String,
    pub path: String,
    pub field: Rc<Field>,
}

impl FieldError {
    /// Raises the field's focus flag so the rendering component can scroll
    /// to and focus it.
    pub fn focus(&self, ac: &mut ActionContext) {
        self.field.focus().set(true, ac);
    }
}

/// Builds a [`Form`] from an initial model and field definitions.
pub struct FormBuilder {
    model: Value,
    defs: Vec<FieldDef>,
    title: Option<String>,
    config: FormConfig,
    on_save: Option<SaveHandler>,
    parent: Option<Form>,
    parent_path: String,
}

impl FormBuilder {
    pub fn new(model: Value) -> Self {
        Self {
            model,
            defs: Vec::new(),
            title: None,
            config: FormConfig::default(),
            on_save: None,
            parent: None,
            parent_path: String::new(),
        }
    }

    pub fn field(mut self, def: FieldDef) -> Self {
        self.defs.push(def);
        self
    }

    pub fn fields(mut self, defs: impl IntoIterator<Item = FieldDef>) -> Self {
        self.defs.extend(defs);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn config(mut self, config: FormConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_save(
        mut self,
        f: impl Fn(&Value, &mut ActionContext) -> Result<(), Box<dyn Error>> + 'static,
    ) -> Self {
        self.on_save = Some(Rc::new(f));
        self
    }

    /// Links the built form under a parent container. Used by the field
    /// factory for nested and repeatable children; rarely called directly.
    pub fn parent(mut self, parent: Form) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Prefixes every field path with `path`. Set together with
    /// [`parent`](Self::parent) when building sub-forms.
    pub fn parent_path(mut self, path: impl Into<String>) -> Self {
        self.parent_path = path.into();
        self
    }

    pub fn build(self) -> Form {
        let form = Form(Rc::new(FormNode {
            title: self.title,
            path: self.parent_path.clone(),
            fields: OnceCell::new(),
            status: State::new(SaveStatus::Idle),
            config: self.config,
            parent: self
                .parent
                .as_ref()
                .map(|p| Rc::downgrade(&p.0))
                .unwrap_or_default(),
            initial: self.model.clone(),
            on_save: self.on_save,
        }));
        let fields: Vec<Rc<Field>> = self
            .defs
            .iter()
            .map(|def| factory::build_field(def, &self.model, &form, &self.parent_path))
            .collect();
        form.0
            .fields
            .set(fields)
            .expect("form fields already initialized");
        form
    }
}

/// Assembles a form around an existing field list without rebuilding the
/// fields. The fields keep their original owning forms; this container only
/// aggregates them (used for the stepped form's virtual union form).
pub(crate) fn form_from_fields(
    fields: Vec<Rc<Field>>,
    initial: Value,
    config: FormConfig,
    on_save: Option<SaveHandler>,
) -> Form {
    let form = Form(Rc::new(FormNode {
        title: None,
        path: String::new(),
        fields: OnceCell::new(),
        status: State::new(SaveStatus::Idle),
        config,
        parent: Weak::new(),
        initial,
        on_save,
    }));
    form.0
        .fields
        .set(fields)
        .expect("form fields already initialized");
    form
}

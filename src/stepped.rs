use std::{error::Error, rc::Rc};

use serde_json::Value;
use sigmut::{ActionContext, SignalContext, State};

use crate::{
    engine,
    field_def::FieldDef,
    form::{form_from_fields, FieldError, Form, FormBuilder, FormConfig, SaveHandler, SaveStatus},
};


/// Declarative description of one step of a stepped form.
#[derive(Clone, Debug)]
pub struct StepDef {
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) config: Option<FormConfig>,
}

impl StepDef {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self {
            fields,
            title: None,
            description: None,
            config: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn config(mut self, config: FormConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// One materialized step: its form plus presentation metadata.
pub struct Step {
    form: Form,
    description: Option<String>,
}

impl Step {
    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn title(&self) -> Option<&str> {
        self.form.title()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

struct SteppedNode {
    steps: Vec<Step>,
    current: State<usize>,
    virtual_form: Form,
}

/// An ordered sequence of forms sharing one model and one save handler.
///
/// Aggregates (`value`, `any_touched`, `errors`, the save status) are
/// computed over a virtual form holding the union of every step's fields, so
/// cross-step validators can read sibling-step values during save.
#[derive(Clone)]
pub struct SteppedForm(Rc<SteppedNode>);

impl SteppedForm {
    pub fn steps(&self) -> &[Step] {
        &self.0.steps
    }

    pub fn step(&self, index: usize) -> &Step {
        &self.0.steps[index]
    }

    /// The active step index cell.
    pub fn current_step(&self) -> &State<usize> {
        &self.0.current
    }

    /// Moves to `index`, clamped to the valid step range.
    pub fn go_to_step(&self, index: usize, ac: &mut ActionContext) {
        let max = self.0.steps.len().saturating_sub(1);
        self.0.current.set_dedup(index.min(max), ac);
    }

    pub fn next_step(&self, ac: &mut ActionContext) {
        let current = self.0.current.get(&mut ac.sc());
        self.go_to_step(current + 1, ac);
    }

    pub fn previous_step(&self, ac: &mut ActionContext) {
        let current = self.0.current.get(&mut ac.sc());
        self.go_to_step(current.saturating_sub(1), ac);
    }

    /// Validates one step's fields (against the virtual form, so cross-step
    /// validators see every field).
    pub fn validate_step(&self, index: usize, ac: &mut ActionContext) -> bool {
        engine::validate_fields(self.0.steps[index].form.fields(), self.form(), ac)
    }

    /// Validates every step; all steps run even after a failure.
    pub fn validate_all(&self, ac: &mut ActionContext) -> bool {
        let mut valid = true;
        for index in 0..self.0.steps.len() {
            valid &= self.validate_step(index, ac);
        }
        valid
    }

    /// A pure validity check for one step: no touched flags, no stored
    /// errors. Useful for gating step navigation.
    pub fn is_valid_step(&self, index: usize, sc: &mut SignalContext) -> bool {
        engine::check_fields(self.0.steps[index].form.fields(), self.form(), sc)
    }

    /// The virtual union form backing aggregates and the shared save
    /// handler.
    pub fn form(&self) -> &Form {
        &self.0.virtual_form
    }

    pub fn status(&self) -> &State<SaveStatus> {
        self.0.virtual_form.status()
    }

    /// The merged output model across all steps.
    pub fn value(&self, sc: &mut SignalContext) -> Value {
        self.0.virtual_form.value(sc)
    }

    pub fn raw_value(&self, sc: &mut SignalContext) -> Value {
        self.0.virtual_form.raw_value(sc)
    }

    pub fn any_touched(&self, sc: &mut SignalContext) -> bool {
        self.0.virtual_form.any_touched(sc)
    }

    pub fn any_dirty(&self, sc: &mut SignalContext) -> bool {
        self.0.virtual_form.any_dirty(sc)
    }

    pub fn errors(&self, sc: &mut SignalContext) -> Vec<FieldError> {
        self.0.virtual_form.errors(sc)
    }

    /// Validates every field across all steps and runs the shared save
    /// pipeline.
    pub fn save(&self, ac: &mut ActionContext) {
        self.0.virtual_form.save(ac);
    }

    /// Resets every field across all steps and returns to the first step.
    pub fn reset(&self, ac: &mut ActionContext) {
        self.0.virtual_form.reset(ac);
        self.0.current.set_dedup(0, ac);
    }
}

impl std::fmt::Debug for SteppedForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SteppedForm")
            .field("steps", &self.0.steps.len())
            .field("current", &self.0.current)
            .finish()
    }
}

/// Builds a [`SteppedForm`] from an initial model and step definitions.
pub struct SteppedFormBuilder {
    model: Value,
    steps: Vec<StepDef>,
    config: FormConfig,
    on_save: Option<SaveHandler>,
}

impl SteppedFormBuilder {
    pub fn new(model: Value) -> Self {
        Self {
            model,
            steps: Vec::new(),
            config: FormConfig::default(),
            on_save: None,
        }
    }

    pub fn step(mut self, step: StepDef) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = StepDef>) -> Self {
        self.steps.extend(steps);
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

    pub fn build(self) -> SteppedForm {
        let steps: Vec<Step> = self
            .steps
            .into_iter()
            .map(|def| {
                let mut builder = FormBuilder::new(self.model.clone())
                    .fields(def.fields)
                    .config(def.config.unwrap_or_else(|| self.config.clone()));
                if let Some(title) = def.title {
                    builder = builder.title(title);
                }
                Step {
                    form: builder.build(),
                    description: def.description,
                }
            })
            .collect();
        let all_fields = steps
            .iter()
            .flat_map(|step| step.form.fields().iter().cloned())
            .collect();
        let virtual_form =
            form_from_fields(all_fields, self.model, self.config, self.on_save);
        SteppedForm(Rc::new(SteppedNode {
            steps,
            current: State::new(0),
            virtual_form,
        }))
    }
}

//! # sigform
//!
//! `sigform` is a reactive form engine built on top of [`sigmut`]: a
//! declarative field-definition tree plus an initial model produce a live
//! form object whose fields expose observable value / touched / dirty /
//! error / validating state.
//!
//! - [`FormBuilder`] / [`SteppedFormBuilder`] materialize [`Form`]s from
//!   [`FieldDef`] trees, including nested groups (independent child forms)
//!   and repeatable groups (child forms addable and removable at runtime).
//! - [`Form`] aggregates its fields: `value` (enabled fields, output-shaped),
//!   `raw_value`, `any_touched` / `any_dirty`, error collection, and the
//!   `save` / `reset` / `patch_value` / `set_value` operations.
//! - [`ValidationService`] schedules sync and async validation per field on
//!   `change`, `blur` or `submit` triggers, with debounce and single-flight
//!   async runs.
//!
//! State lives in `sigmut` cells, so everything composes with the host
//! application's signals, effects and runtime:
//!
//! ```
//! use serde_json::json;
//! use sigform::{validators, FieldDef, FormBuilder};
//!
//! let mut rt = sigmut::core::Runtime::new();
//!
//! let form = FormBuilder::new(json!({"name": "", "email": ""}))
//!     .field(FieldDef::new("name").label("Name").validator(validators::required()))
//!     .field(FieldDef::new("email").label("Email").validator(validators::email()))
//!     .build();
//!
//! form.field("name").value().set(json!("Ada"), rt.ac());
//! assert!(form.validate(rt.ac()));
//! assert_eq!(form.value(&mut rt.sc()), json!({"name": "Ada", "email": ""}));
//! ```

mod engine;
mod factory;
mod field;
mod field_def;
mod form;
mod path;
mod stepped;
mod utils;
mod validation;
mod validator;

pub use field::{
    Condition, ControlKind, Field, FieldOptions, FieldVariant, RepeatableGroup, SelectOption,
};
pub use field_def::{CheckboxValueType, ComputedOptions, FieldDef};
pub use form::{FieldError, Form, FormBuilder, FormConfig, SaveHandler, SaveStatus};
pub use path::find_field_by_path;
pub use stepped::{Step, StepDef, SteppedForm, SteppedFormBuilder};
pub use validation::{
    ValidationOverrides, ValidationService, ValidationSettings, ValidationTrigger,
    ASYNC_FAILURE_MESSAGE,
};
pub use validator::{validators, AsyncValidator, Validator};

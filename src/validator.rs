use std::{error::Error, future::Future, rc::Rc};

use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use sigmut::SignalContext;

use crate::Form;


type SyncFn = dyn Fn(&Value, &Form, &mut SignalContext) -> Option<String>;
type AsyncFn = dyn Fn(Value, Form) -> LocalBoxFuture<'static, Result<Option<String>, Box<dyn Error>>>;

/// A synchronous field validator.
///
/// Returns `Some(message)` when the value is invalid, `None` otherwise. The
/// owning form is passed alongside the value so cross-field rules can read
/// sibling state; reads made through the [`SignalContext`] are tracked like
/// any other signal read.
#[derive(Clone)]
pub struct Validator {
    f: Rc<SyncFn>,
    marks_required: bool,
}

impl Validator {
    pub fn new(f: impl Fn(&Value, &Form, &mut SignalContext) -> Option<String> + 'static) -> Self {
        Self {
            f: Rc::new(f),
            marks_required: false,
        }
    }

    /// Like [`new`](Self::new), but tags the validator as a required-marker
    /// so UIs can render a required indicator without running it.
    pub fn marking_required(
        f: impl Fn(&Value, &Form, &mut SignalContext) -> Option<String> + 'static,
    ) -> Self {
        Self {
            f: Rc::new(f),
            marks_required: true,
        }
    }

    pub fn run(&self, value: &Value, form: &Form, sc: &mut SignalContext) -> Option<String> {
        (self.f)(value, form, sc)
    }

    pub fn marks_required(&self) -> bool {
        self.marks_required
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("marks_required", &self.marks_required)
            .finish_non_exhaustive()
    }
}

/// An asynchronous field validator.
///
/// The returned future resolves to `Ok(Some(message))` for an invalid value,
/// `Ok(None)` for a valid one. An `Err` is reported as a generic validation
/// failure by the validation service.
#[derive(Clone)]
pub struct AsyncValidator {
    f: Rc<AsyncFn>,
}

impl AsyncValidator {
    pub fn new<Fut>(f: impl Fn(Value, Form) -> Fut + 'static) -> Self
    where
        Fut: Future<Output = Option<String>> + 'static,
    {
        Self {
            f: Rc::new(move |value, form| f(value, form).map(Ok).boxed_local()),
        }
    }

    /// A fallible variant for validators that can themselves fail (e.g. a
    /// lookup against a backend).
    pub fn try_new<Fut>(f: impl Fn(Value, Form) -> Fut + 'static) -> Self
    where
        Fut: Future<Output = Result<Option<String>, Box<dyn Error>>> + 'static,
    {
        Self {
            f: Rc::new(move |value, form| f(value, form).boxed_local()),
        }
    }

    pub fn run(
        &self,
        value: Value,
        form: Form,
    ) -> LocalBoxFuture<'static, Result<Option<String>, Box<dyn Error>>> {
        (self.f)(value, form)
    }
}

impl std::fmt::Debug for AsyncValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncValidator").finish_non_exhaustive()
    }
}

/// Ready-made validators for common rules.
pub mod validators {
    use serde_json::Value;

    use super::Validator;

    fn is_blank(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Fails on `null`, empty strings, and empty collections.
    pub fn required() -> Validator {
        Validator::marking_required(|value, _, _| {
            is_blank(value).then(|| "This field is required".to_string())
        })
    }

    /// Fails unless the value is boolean `true`. Meant for consent-style
    /// checkboxes, where `false` is present but not acceptable.
    pub fn required_true() -> Validator {
        Validator::marking_required(|value, _, _| {
            (value.as_bool() != Some(true)).then(|| "This field is required".to_string())
        })
    }

    pub fn min_length(min: usize) -> Validator {
        Validator::new(move |value, _, _| {
            let len = match value {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                _ => return None,
            };
            (len < min).then(|| format!("Must be at least {min} characters"))
        })
    }

    pub fn max_length(max: usize) -> Validator {
        Validator::new(move |value, _, _| {
            let len = match value {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                _ => return None,
            };
            (len > max).then(|| format!("Must be at most {max} characters"))
        })
    }

    pub fn min(min: f64) -> Validator {
        Validator::new(move |value, _, _| {
            let n = value.as_f64()?;
            (n < min).then(|| format!("Must be {min} or more"))
        })
    }

    pub fn max(max: f64) -> Validator {
        Validator::new(move |value, _, _| {
            let n = value.as_f64()?;
            (n > max).then(|| format!("Must be {max} or less"))
        })
    }

    /// A deliberately small shape check: something before and after an `@`,
    /// and a dot in the domain part.
    pub fn email() -> Validator {
        Validator::new(|value, _, _| {
            let s = match value {
                Value::String(s) if !s.is_empty() => s,
                _ => return None,
            };
            let valid = match s.split_once('@') {
                Some((local, domain)) => {
                    !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
                }
                None => false,
            };
            (!valid).then(|| "Enter a valid email address".to_string())
        })
    }

    /// Fails when the value is present but not one of `allowed`.
    pub fn one_of(allowed: Vec<Value>) -> Validator {
        Validator::new(move |value, _, _| {
            if is_blank(value) || allowed.contains(value) {
                None
            } else {
                Some("Must be one of the allowed values".to_string())
            }
        })
    }
}

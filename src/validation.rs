use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::{Rc, Weak},
    time::Duration,
};

use derive_ex::derive_ex;
use parse_display::Display;
use serde_json::Value;
use sigmut::{
    core::{spawn_action, spawn_action_async},
    effect, ActionContext, SignalContext, State, Subscription,
};

use crate::{
    engine,
    field::{Field, FieldVariant},
    form::Form,
};


/// The async error reported when an async validator itself fails.
pub const ASYNC_FAILURE_MESSAGE: &str = "Validation failed";

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// The event class that causes a field's validators to run.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[display(style = "lowercase")]
pub enum ValidationTrigger {
    Change,
    Blur,
    Submit,
}

/// Effective validation behavior of one field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct ValidationSettings {
    pub trigger: ValidationTrigger,
    pub debounce: Duration,
    pub validate_async_on_init: bool,
}

impl ValidationSettings {
    pub fn new() -> Self {
        Self {
            trigger: ValidationTrigger::Change,
            debounce: DEFAULT_DEBOUNCE,
            validate_async_on_init: false,
        }
    }
}

/// Partial validation config, merged field-over-form-over-defaults.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ValidationOverrides {
    pub trigger: Option<ValidationTrigger>,
    pub debounce: Option<Duration>,
    pub validate_async_on_init: Option<bool>,
}

impl ValidationOverrides {
    pub fn trigger(mut self, trigger: ValidationTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    pub fn validate_async_on_init(mut self, value: bool) -> Self {
        self.validate_async_on_init = Some(value);
        self
    }

    pub(crate) fn or(self, fallback: Self) -> Self {
        Self {
            trigger: self.trigger.or(fallback.trigger),
            debounce: self.debounce.or(fallback.debounce),
            validate_async_on_init: self.validate_async_on_init.or(fallback.validate_async_on_init),
        }
    }

    pub(crate) fn resolve(self) -> ValidationSettings {
        let defaults = ValidationSettings::new();
        ValidationSettings {
            trigger: self.trigger.unwrap_or(defaults.trigger),
            debounce: self.debounce.unwrap_or(defaults.debounce),
            validate_async_on_init: self
                .validate_async_on_init
                .unwrap_or(defaults.validate_async_on_init),
        }
    }
}

struct Registration {
    field: Rc<Field>,
    form: Form,
    settings: ValidationSettings,
    last_value: RefCell<Option<Value>>,
    run_id: Cell<u64>,
}

struct ServiceNode {
    fields: RefCell<HashMap<String, Registration>>,
    epoch: State<u64>,
    blur: State<Option<String>>,
    _effects: RefCell<Vec<Subscription>>,
}

/// Schedules when validation runs, decoupled from the field tree.
///
/// Fields register by path (idempotently); two effects then observe the
/// registry. One tracks every change-triggered field's value and runs sync
/// validation immediately and async validation after the configured
/// debounce; the other watches a blur signal and validates blur-triggered
/// fields without debounce. Registrations pin their field and form alive, so
/// callers owning a service across form lifetimes should
/// [`unregister`](Self::unregister) paths they no longer render.
///
/// The service is an ordinary value meant to be passed around (or placed in
/// whatever context mechanism the host application uses); dropping it drops
/// its effects.
#[derive(Clone)]
pub struct ValidationService(Rc<ServiceNode>);

impl ValidationService {
    pub fn new() -> Self {
        let node = Rc::new(ServiceNode {
            fields: RefCell::new(HashMap::new()),
            epoch: State::new(0),
            blur: State::new(None),
            _effects: RefCell::new(Vec::new()),
        });
        let effects = vec![Self::change_effect(&node), Self::blur_effect(&node)];
        *node._effects.borrow_mut() = effects;
        Self(node)
    }

    fn change_effect(node: &Rc<ServiceNode>) -> Subscription {
        let weak = Rc::downgrade(node);
        effect(move |sc| {
            let Some(node) = weak.upgrade() else {
                return;
            };
            node.epoch.get(sc);
            let mut changed = Vec::new();
            for reg in node.fields.borrow().values() {
                if reg.settings.trigger != ValidationTrigger::Change {
                    continue;
                }
                let value = reg.field.value().get(sc);
                let mut last = reg.last_value.borrow_mut();
                match &*last {
                    Some(previous) if *previous == value => {}
                    _ => {
                        *last = Some(value);
                        changed.push((reg.field.clone(), reg.form.clone(), reg.settings.debounce));
                    }
                }
            }
            if changed.is_empty() {
                return;
            }
            let weak = weak.clone();
            spawn_action(move |ac| {
                let Some(node) = weak.upgrade() else {
                    return;
                };
                for (field, form, debounce) in changed {
                    engine::run_sync_validators(&field, &form, ac);
                    if !field.async_validators().is_empty() {
                        Self::schedule_async(&node, field, form, debounce);
                    }
                }
            });
        })
    }

    fn blur_effect(node: &Rc<ServiceNode>) -> Subscription {
        let weak = Rc::downgrade(node);
        effect(move |sc| {
            let Some(node) = weak.upgrade() else {
                return;
            };
            let Some(path) = node.blur.get(sc) else {
                return;
            };
            let entry = node
                .fields
                .borrow()
                .get(&path)
                .map(|reg| (reg.field.clone(), reg.form.clone(), reg.settings));
            let weak = weak.clone();
            spawn_action(move |ac| {
                let Some(node) = weak.upgrade() else {
                    return;
                };
                // Clear first so another blur on the same path re-triggers.
                node.blur.set(None, ac);
                let Some((field, form, settings)) = entry else {
                    return;
                };
                if settings.trigger != ValidationTrigger::Blur {
                    return;
                }
                field.touched().set(true, ac);
                engine::run_sync_validators(&field, &form, ac);
                if !field.async_validators().is_empty() {
                    Self::schedule_async(&node, field, form, Duration::ZERO);
                }
            });
        })
    }

    /// Registers a field for trigger-driven validation. Registering an
    /// already-registered path is a no-op.
    pub fn setup_field_validation(&self, field: &Rc<Field>, form: &Form, ac: &mut ActionContext) {
        let path = field.path().to_string();
        let settings = {
            let mut fields = self.0.fields.borrow_mut();
            if fields.contains_key(&path) {
                return;
            }
            let settings = field
                .validation_overrides()
                .or(form.config().validation)
                .resolve();
            log::debug!("registering `{path}` for {} validation", settings.trigger);
            fields.insert(
                path,
                Registration {
                    field: field.clone(),
                    form: form.clone(),
                    settings,
                    last_value: RefCell::new(Some(field.value().get(&mut ac.sc()))),
                    run_id: Cell::new(0),
                },
            );
            settings
        };
        if settings.validate_async_on_init && !field.async_validators().is_empty() {
            Self::schedule_async(&self.0, field.clone(), form.clone(), Duration::ZERO);
        }
        *self.0.epoch.borrow_mut(ac) += 1;
    }

    /// Drops the registration for `path`, if any.
    pub fn unregister(&self, path: &str, ac: &mut ActionContext) {
        if self.0.fields.borrow_mut().remove(path).is_some() {
            *self.0.epoch.borrow_mut(ac) += 1;
        }
    }

    /// Drops every registration.
    pub fn clear(&self, ac: &mut ActionContext) {
        let mut fields = self.0.fields.borrow_mut();
        if !fields.is_empty() {
            fields.clear();
            drop(fields);
            *self.0.epoch.borrow_mut(ac) += 1;
        }
    }

    pub fn is_registered(&self, path: &str) -> bool {
        self.0.fields.borrow().contains_key(path)
    }

    /// Reports a blur event for the field at `path`. Blur-triggered fields
    /// validate in response; the signal clears itself afterwards.
    pub fn notify_blur(&self, path: impl Into<String>, ac: &mut ActionContext) {
        self.0.blur.set(Some(path.into()), ac);
    }

    /// Runs validation for one field right now: sync always, async (without
    /// debounce) when the field has async validators. Passing
    /// [`ValidationTrigger::Blur`] also marks the field touched.
    pub fn trigger_validation(
        &self,
        field: &Rc<Field>,
        trigger: Option<ValidationTrigger>,
        ac: &mut ActionContext,
    ) {
        let form = field.form();
        if trigger == Some(ValidationTrigger::Blur) {
            field.touched().set(true, ac);
        }
        engine::run_sync_validators(field, &form, ac);
        if !field.async_validators().is_empty() {
            Self::schedule_async(&self.0, field.clone(), form, Duration::ZERO);
        }
    }

    /// The user-facing error of a field: the sync error wins over the async
    /// one when both are present.
    pub fn get_combined_error(&self, field: &Field, sc: &mut SignalContext) -> Option<String> {
        field
            .error()
            .get(sc)
            .or_else(|| field.async_error().get(sc))
    }

    /// Whether the field should render as invalid: touched with an error.
    pub fn is_field_invalid(&self, field: &Field, sc: &mut SignalContext) -> bool {
        field.touched().get(sc) && self.get_combined_error(field, sc).is_some()
    }

    /// The submit-wide sync pass: touches every field, recursing through
    /// nested and repeatable groups exactly like the form's own validation.
    pub fn validate_form_for_submit(&self, form: &Form, ac: &mut ActionContext) -> bool {
        let mut valid = true;
        for field in form.fields() {
            match field.variant() {
                FieldVariant::NestedGroup(child) => {
                    valid &= self.validate_form_for_submit(child, ac);
                }
                FieldVariant::RepeatableGroup(group) => {
                    let children = group.forms(&mut ac.sc());
                    for child in children {
                        valid &= self.validate_form_for_submit(&child, ac);
                    }
                }
                _ => {
                    field.touched().set(true, ac);
                    valid &= engine::run_sync_validators(field, form, ac);
                }
            }
        }
        valid
    }

    /// Starts one async validation run. The run takes a per-registration
    /// token; a token that goes stale during the debounce sleep aborts the
    /// run, and a completed run only writes its result while its token is
    /// still current, so only the run for the most recent change lands.
    fn schedule_async(node: &Rc<ServiceNode>, field: Rc<Field>, form: Form, debounce: Duration) {
        let path = field.path().to_string();
        let token = node.fields.borrow().get(&path).map(|reg| {
            let next = reg.run_id.get() + 1;
            reg.run_id.set(next);
            next
        });
        let weak = Rc::downgrade(node);
        spawn_action_async(move |aac| async move {
            if !debounce.is_zero() {
                crate::utils::timer::sleep(debounce).await;
            }
            if let Some(token) = token {
                let current = weak
                    .upgrade()
                    .and_then(|node| node.fields.borrow().get(&path).map(|reg| reg.run_id.get()));
                if current != Some(token) {
                    log::trace!("async validation for `{path}` superseded before start");
                    return;
                }
            }
            let runs = aac.call(|ac| {
                field.validating().set(true, ac);
                field.async_error().set(None, ac);
                let value = field.value().get(&mut ac.sc());
                field
                    .async_validators()
                    .iter()
                    .map(|validator| validator.run(value.clone(), form.clone()))
                    .collect::<Vec<_>>()
            });
            let results = futures::future::join_all(runs).await;
            let mut message = None;
            for result in results {
                match result {
                    Ok(Some(found)) => {
                        message = Some(found);
                        break;
                    }
                    Ok(None) => {}
                    Err(error) => {
                        log::debug!("async validator for `{path}` failed: {error}");
                        message = Some(ASYNC_FAILURE_MESSAGE.to_string());
                        break;
                    }
                }
            }
            aac.call(|ac| {
                let still_current = match token {
                    None => true,
                    Some(token) => weak.upgrade().is_some_and(|node| {
                        node.fields.borrow().get(&path).map(|reg| reg.run_id.get())
                            == Some(token)
                    }),
                };
                if still_current {
                    field.async_error().set(message, ac);
                    field.validating().set(false, ac);
                } else {
                    log::trace!("async validation result for `{path}` discarded");
                }
            });
        });
    }
}

impl Default for ValidationService {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ValidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationService")
            .field("registered", &self.0.fields.borrow().len())
            .finish()
    }
}

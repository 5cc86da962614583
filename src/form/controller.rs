use std::borrow::{Borrow, Cow};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::errors::{ErrorSurface, FieldErrors};
use super::schema::Schema;
use super::validation::{FieldLens, FormModel};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

/// Name of a form field. Static names cost nothing; names parsed from a
/// server payload are owned.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(Cow<'static, str>);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    pub fn owned(value: impl Into<String>) -> Self {
        Self(Cow::Owned(value.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for FieldKey {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FieldKey {
    fn from(value: String) -> Self {
        Self::owned(value)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

impl SubmitState {
    /// Any state may go back to `Idle`; a finished submit may start over.
    fn can_move_to(self, next: Self) -> bool {
        match (self, next) {
            (_, Self::Idle)
            | (Self::Idle | Self::Succeeded | Self::Failed, Self::Validating)
            | (Self::Validating, Self::Submitting | Self::Failed)
            | (Self::Submitting, Self::Succeeded | Self::Failed) => true,
            (current, next) => current == next,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RevalidateMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_mode: ValidationMode,
    pub revalidate_mode: RevalidateMode,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_mode: ValidationMode::OnSubmit,
            revalidate_mode: RevalidateMode::OnSubmit,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FieldMeta {
    pub dirty: bool,
    pub touched: bool,
}

#[derive(Clone, Debug)]
pub struct FormSnapshot<T> {
    pub model: T,
    pub submit_state: SubmitState,
    pub submit_count: u32,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub field_meta: BTreeMap<FieldKey, FieldMeta>,
    pub errors: FieldErrors,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("invalid submit state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: SubmitState, to: SubmitState },
    #[error("form submit is already in progress")]
    AlreadySubmitting,
    #[error("form has no text field named {0:?}")]
    UnknownField(String),
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) type SyncFieldValidatorFn<T> = Arc<dyn Fn(&T) -> Result<(), String> + Send + Sync>;
pub(super) type SyncFormValidatorFn<T> = Arc<dyn Fn(&T) -> Vec<(FieldKey, String)> + Send + Sync>;

pub(super) struct FormState<T> {
    pub(super) id: FormId,
    pub(super) initial_model: T,
    pub(super) model: T,
    pub(super) submit_state: SubmitState,
    pub(super) submit_count: u32,
    pub(super) dirty_fields: BTreeSet<FieldKey>,
    pub(super) field_meta: BTreeMap<FieldKey, FieldMeta>,
}

impl<T> FormState<T> {
    pub(super) fn ensure_meta(&mut self, key: FieldKey) -> &mut FieldMeta {
        self.field_meta.entry(key).or_default()
    }
}

/// Owns one form's values, validation rules and error surface.
///
/// Clones are handles onto the same form, so a clone can be moved into every
/// input callback of the view layer.
#[derive(Clone)]
pub struct FormController<T>
where
    T: FormModel,
{
    pub(super) options: FormOptions,
    pub(super) schema: Option<Arc<Schema>>,
    pub(super) state: Arc<RwLock<FormState<T>>>,
    pub(super) errors: ErrorSurface,
    pub(super) sync_field_validators: Arc<RwLock<BTreeMap<FieldKey, Vec<SyncFieldValidatorFn<T>>>>>,
    pub(super) form_validators: Arc<RwLock<Vec<SyncFormValidatorFn<T>>>>,
    pub(super) dependencies: Arc<RwLock<BTreeMap<FieldKey, BTreeSet<FieldKey>>>>,
    pub(super) required_fields: Arc<RwLock<BTreeSet<FieldKey>>>,
}

impl<T> FormController<T>
where
    T: FormModel,
{
    pub fn new(initial: T, options: FormOptions) -> Self {
        Self {
            options,
            schema: None,
            state: Arc::new(RwLock::new(FormState {
                id: FormId::next(),
                initial_model: initial.clone(),
                model: initial,
                submit_state: SubmitState::Idle,
                submit_count: 0,
                dirty_fields: BTreeSet::new(),
                field_meta: BTreeMap::new(),
            })),
            errors: ErrorSurface::default(),
            sync_field_validators: Arc::new(RwLock::new(BTreeMap::new())),
            form_validators: Arc::new(RwLock::new(Vec::new())),
            dependencies: Arc::new(RwLock::new(BTreeMap::new())),
            required_fields: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<Arc<Schema>>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_deref()
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    /// Handle onto this form's error surface, for collaborators that report
    /// server-side errors (see [`crate::mutation::Mutation::with_error_surface`]).
    pub fn error_surface(&self) -> ErrorSurface {
        self.errors.clone()
    }

    pub fn register_required_field<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let mut required = write_lock(&self.required_fields, "registering required field")?;
        required.insert(lens.key());
        Ok(())
    }

    pub fn unregister_required_field<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let mut required = write_lock(&self.required_fields, "unregistering required field")?;
        required.remove(lens.key().as_str());
        Ok(())
    }

    /// Validates the current model and runs `on_valid` only when it passes.
    ///
    /// Returns whether validation passed. Local errors are replaced by the
    /// result either way, so a passing validation clears them; server errors
    /// are left untouched.
    pub fn submit(&self, on_valid: impl FnOnce(&T)) -> FormResult<bool> {
        let Some(model) = self.begin_submit()? else {
            return Ok(false);
        };
        on_valid(&model);
        self.finish_submit(true)?;
        Ok(true)
    }

    /// Like [`submit`](Self::submit), awaiting an async continuation whose
    /// output decides between `Succeeded` and `Failed`.
    pub async fn submit_async<F, Fut>(&self, f: F) -> FormResult<bool>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = bool>,
    {
        let Some(model) = self.begin_submit()? else {
            return Ok(false);
        };
        let succeeded = f(model).await;
        self.finish_submit(succeeded)?;
        Ok(true)
    }

    /// Moves to `Validating`, validates, and hands back the model to submit,
    /// or `None` after recording the validation failure.
    pub(crate) fn begin_submit(&self) -> FormResult<Option<T>> {
        {
            let mut state = write_lock(&self.state, "preparing submit")?;
            if state.submit_state == SubmitState::Submitting {
                return Err(FormError::AlreadySubmitting);
            }
            transition_submit_state(&mut state, SubmitState::Validating)?;
            state.submit_count = state.submit_count.saturating_add(1);
        }

        let is_valid = self.validate_form()?;
        let mut state = write_lock(&self.state, "moving submit state after validation")?;
        if !is_valid {
            transition_submit_state(&mut state, SubmitState::Failed)?;
            debug!(
                form = state.id.0,
                attempt = state.submit_count,
                "submit blocked by validation errors"
            );
            return Ok(None);
        }
        transition_submit_state(&mut state, SubmitState::Submitting)?;
        debug!(form = state.id.0, attempt = state.submit_count, "submitting form");
        Ok(Some(state.model.clone()))
    }

    pub(crate) fn finish_submit(&self, succeeded: bool) -> FormResult<()> {
        let mut state = write_lock(&self.state, "completing submit")?;
        let next = if succeeded {
            SubmitState::Succeeded
        } else {
            SubmitState::Failed
        };
        transition_submit_state(&mut state, next)
    }

    /// Returns the submit state to `Idle` without touching values or errors.
    pub fn reset_submit_state(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting submit state")?;
        transition_submit_state(&mut state, SubmitState::Idle)
    }

    pub fn reset_to_initial(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "resetting form")?;
            state.model = state.initial_model.clone();
            state.submit_state = SubmitState::Idle;
            state.submit_count = 0;
            state.dirty_fields.clear();
            for meta in state.field_meta.values_mut() {
                *meta = FieldMeta::default();
            }
        }
        self.errors.clear()
    }

    pub fn reset_field<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        {
            let mut state = write_lock(&self.state, "resetting field")?;
            let initial_value = lens.get(&state.initial_model).clone();
            lens.set(&mut state.model, initial_value);
            state.dirty_fields.remove(key.as_str());
            *state.ensure_meta(key.clone()) = FieldMeta::default();
        }
        self.errors.clear_field(key.as_str())
    }

    /// Clears local and server errors along with the form-level message.
    pub fn clear_errors(&self) -> FormResult<()> {
        self.errors.clear()
    }

    pub fn clear_field_errors(&self, field: &str) -> FormResult<()> {
        self.errors.clear_field(field)
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot<T>> {
        let errors = self.errors.read()?;
        let state = read_lock(&self.state, "creating form snapshot")?;
        Ok(FormSnapshot {
            model: state.model.clone(),
            submit_state: state.submit_state,
            submit_count: state.submit_count,
            is_dirty: !state.dirty_fields.is_empty(),
            is_valid: errors.is_empty(),
            field_meta: state.field_meta.clone(),
            errors,
        })
    }

    pub fn model(&self) -> FormResult<T> {
        Ok(read_lock(&self.state, "reading form model")?.model.clone())
    }

    pub fn submit_state(&self) -> FormResult<SubmitState> {
        Ok(read_lock(&self.state, "reading submit state")?.submit_state)
    }

    pub fn field_meta(&self, field: &str) -> FormResult<Option<FieldMeta>> {
        Ok(read_lock(&self.state, "reading field meta")?
            .field_meta
            .get(field)
            .copied())
    }

    /// True when `field` names an input of this form: the schema declares it
    /// or the model has a text field by that name.
    pub fn has_input(&self, field: &str) -> FormResult<bool> {
        if self
            .schema
            .as_deref()
            .is_some_and(|schema| schema.rules(field).is_some())
        {
            return Ok(true);
        }
        Ok(read_lock(&self.state, "looking up input name")?
            .model
            .field_value(field)
            .is_some())
    }

    /// True when the schema marks the field `required` or it was registered
    /// with [`register_required_field`](Self::register_required_field).
    pub fn is_required(&self, field: &str) -> FormResult<bool> {
        if self
            .schema
            .as_deref()
            .is_some_and(|schema| schema.is_required(field))
        {
            return Ok(true);
        }
        Ok(read_lock(&self.required_fields, "reading required fields")?.contains(field))
    }
}

pub(super) fn transition_submit_state<T>(
    state: &mut FormState<T>,
    next: SubmitState,
) -> FormResult<()> {
    if !state.submit_state.can_move_to(next) {
        return Err(FormError::InvalidStateTransition {
            from: state.submit_state,
            to: next,
        });
    }
    state.submit_state = next;
    Ok(())
}

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}

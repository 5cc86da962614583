use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::trace;

use super::controller::{
    FieldKey, FormController, FormError, FormResult, RevalidateMode, SyncFieldValidatorFn,
    SyncFormValidatorFn, ValidationMode, read_lock, write_lock,
};

/// Anything that can be shown as a field error message.
pub trait ValidationError: Send + Sync + 'static {
    fn message(&self) -> String;
}

impl ValidationError for String {
    fn message(&self) -> String {
        self.clone()
    }
}

impl ValidationError for &'static str {
    fn message(&self) -> String {
        (*self).to_string()
    }
}

pub trait FieldLens<T>: Copy + Send + Sync + 'static {
    type Value: Clone + PartialEq + Send + Sync + 'static;

    fn key(self) -> FieldKey;
    fn get<'a>(self, model: &'a T) -> &'a Self::Value;
    fn set(self, model: &mut T, value: Self::Value);
}

/// A form's value model.
///
/// Name-based access covers the text fields a schema validates and the view
/// layer edits by name; typed access goes through [`FieldLens`].
pub trait FormModel: Clone + Send + Sync + 'static {
    type Fields;

    fn fields() -> Self::Fields;

    /// Current text of `key`, or `None` when the model has no such text field.
    fn field_value(&self, key: &str) -> Option<&str>;

    /// Overwrites the text of `key`; returns `false` when there is no such
    /// text field.
    fn set_field_value(&mut self, key: &str, value: String) -> bool;
}

pub trait FieldValidator<T, L, E>: Send + Sync
where
    L: FieldLens<T>,
    E: ValidationError,
{
    fn validate(&self, model: &T, value: &L::Value) -> Result<(), E>;
}

impl<T, L, E, F> FieldValidator<T, L, E> for F
where
    L: FieldLens<T>,
    E: ValidationError,
    F: for<'a> Fn(&'a T, &'a L::Value) -> Result<(), E> + Send + Sync,
{
    fn validate(&self, model: &T, value: &L::Value) -> Result<(), E> {
        (self)(model, value)
    }
}

pub trait FormValidator<T, E>: Send + Sync
where
    E: ValidationError,
{
    fn validate(&self, model: &T) -> Vec<(FieldKey, E)>;
}

impl<T, E, F> FormValidator<T, E> for F
where
    E: ValidationError,
    F: Fn(&T) -> Vec<(FieldKey, E)> + Send + Sync,
{
    fn validate(&self, model: &T) -> Vec<(FieldKey, E)> {
        (self)(model)
    }
}

impl<T> FormController<T>
where
    T: FormModel,
{
    /// Adds a typed validator for one field. It runs after the schema rules
    /// of that field and only reports when they all passed.
    pub fn register_field_validator<L, V, E>(&self, lens: L, validator: V) -> FormResult<()>
    where
        L: FieldLens<T>,
        V: FieldValidator<T, L, E> + 'static,
        E: ValidationError,
    {
        let key = lens.key();
        let validator = Arc::new(validator);
        let wrapped: SyncFieldValidatorFn<T> = Arc::new(move |model: &T| {
            validator
                .validate(model, lens.get(model))
                .map_err(|error| error.message())
        });
        let mut validators =
            write_lock(&self.sync_field_validators, "registering field validator")?;
        validators.entry(key).or_default().push(wrapped);
        Ok(())
    }

    /// Adds a whole-model validator that may report on any field.
    pub fn register_form_validator<V, E>(&self, validator: V) -> FormResult<()>
    where
        V: FormValidator<T, E> + 'static,
        E: ValidationError,
    {
        let validator = Arc::new(validator);
        let wrapped: SyncFormValidatorFn<T> = Arc::new(move |model: &T| {
            validator
                .validate(model)
                .into_iter()
                .map(|(key, error)| (key, error.message()))
                .collect()
        });
        let mut validators = write_lock(&self.form_validators, "registering form validator")?;
        validators.push(wrapped);
        Ok(())
    }

    /// Links `dependent` to `source`: edits of `source` revalidate `dependent`
    /// according to [`RevalidateMode`].
    pub fn register_dependency(
        &self,
        source: impl Into<FieldKey>,
        dependent: impl Into<FieldKey>,
    ) -> FormResult<()> {
        let mut dependencies = write_lock(&self.dependencies, "registering dependency")?;
        dependencies
            .entry(source.into())
            .or_default()
            .insert(dependent.into());
        Ok(())
    }

    pub fn set<L>(&self, lens: L, value: L::Value) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        {
            let mut state = write_lock(&self.state, "writing form model")?;
            lens.set(&mut state.model, value);
            let is_dirty = lens.get(&state.model) != lens.get(&state.initial_model);
            mark_dirty(&mut *state, key.clone(), is_dirty);
        }
        self.after_change(key)
    }

    /// Overwrites a text field by name. Does not validate under
    /// [`ValidationMode::OnSubmit`].
    pub fn set_field(&self, field: &str, value: impl Into<String>) -> FormResult<()> {
        let key = {
            let mut state = write_lock(&self.state, "writing form field")?;
            if !state.model.set_field_value(field, value.into()) {
                return Err(FormError::UnknownField(field.to_string()));
            }
            let is_dirty =
                state.model.field_value(field) != state.initial_model.field_value(field);
            let key = FieldKey::owned(field);
            mark_dirty(&mut *state, key.clone(), is_dirty);
            key
        };
        self.after_change(key)
    }

    pub fn touch(&self, field: &str) -> FormResult<()> {
        let key = FieldKey::owned(field);
        {
            let mut state = write_lock(&self.state, "touching field")?;
            state.ensure_meta(key.clone()).touched = true;
        }

        if self.options.validate_mode == ValidationMode::OnBlur {
            let _ = self.validate_field_by_key(&key)?;
        }
        if self.options.revalidate_mode == RevalidateMode::OnBlur {
            self.revalidate_dependents(&key)?;
        }
        Ok(())
    }

    /// Validates one field and stores (or clears) its local error.
    pub fn validate_field(&self, field: &str) -> FormResult<bool> {
        self.validate_field_by_key(&FieldKey::owned(field))
    }

    /// Validates the whole model and replaces every local error with the
    /// result. Returns whether the form is free of local errors.
    pub fn validate_form(&self) -> FormResult<bool> {
        let model = read_lock(&self.state, "reading model for form validation")?
            .model
            .clone();
        let errors = self.collect_errors(&model, None)?;
        let is_valid = errors.is_empty();
        self.errors.update(|surface| surface.replace_local(errors))?;
        Ok(is_valid)
    }

    pub(super) fn validate_field_by_key(&self, key: &FieldKey) -> FormResult<bool> {
        let model = read_lock(&self.state, "reading model for field validation")?
            .model
            .clone();
        let message = self.collect_errors(&model, Some(key))?.remove(key.as_str());
        let is_valid = message.is_none();
        self.errors
            .update(|surface| surface.set_local(key.clone(), message))?;
        Ok(is_valid)
    }

    /// Schema rules first, then typed field validators, then form validators.
    /// The first message recorded for a field wins.
    fn collect_errors(
        &self,
        model: &T,
        only: Option<&FieldKey>,
    ) -> FormResult<BTreeMap<FieldKey, String>> {
        let mut errors = BTreeMap::<FieldKey, String>::new();

        if let Some(schema) = self.schema.as_deref() {
            match only {
                Some(key) => {
                    if let Some(message) = schema.validate_field(key.as_str(), model) {
                        errors.insert(key.clone(), message);
                    }
                }
                None => {
                    for violation in schema.validate(model) {
                        errors.entry(violation.field).or_insert(violation.message);
                    }
                }
            }
        }

        let field_validators = read_lock(
            &self.sync_field_validators,
            "reading field validators for validation",
        )?
        .clone();
        for (key, validators) in field_validators {
            if only.is_some_and(|only| *only != key) || errors.contains_key(key.as_str()) {
                continue;
            }
            if let Some(message) = validators
                .iter()
                .find_map(|validator| validator(model).err())
            {
                errors.insert(key, message);
            }
        }

        let form_validators =
            read_lock(&self.form_validators, "reading form validators for validation")?.clone();
        for validator in form_validators {
            for (key, message) in validator(model) {
                if only.is_some_and(|only| *only != key) {
                    continue;
                }
                errors.entry(key).or_insert(message);
            }
        }

        Ok(errors)
    }

    fn after_change(&self, key: FieldKey) -> FormResult<()> {
        trace!(field = %key, "field changed");
        if self.options.validate_mode == ValidationMode::OnChange {
            let _ = self.validate_field_by_key(&key)?;
        }
        if self.options.revalidate_mode == RevalidateMode::OnChange {
            self.revalidate_dependents(&key)?;
        }
        Ok(())
    }

    pub(super) fn revalidate_dependents(&self, source: &FieldKey) -> FormResult<()> {
        let dependents = read_lock(&self.dependencies, "reading field dependencies")?
            .get(source.as_str())
            .cloned()
            .unwrap_or_default();
        for dependent in dependents {
            let _ = self.validate_field_by_key(&dependent)?;
        }
        Ok(())
    }

    /// Fields linked to `field` through [`register_dependency`](Self::register_dependency),
    /// in either direction.
    pub fn linked_fields(&self, field: &str) -> FormResult<BTreeSet<FieldKey>> {
        let dependencies = read_lock(&self.dependencies, "reading linked fields")?;
        let mut linked = dependencies.get(field).cloned().unwrap_or_default();
        linked.extend(
            dependencies
                .iter()
                .filter(|(_, dependents)| dependents.contains(field))
                .map(|(source, _)| source.clone()),
        );
        Ok(linked)
    }
}

fn mark_dirty<T>(state: &mut super::controller::FormState<T>, key: FieldKey, is_dirty: bool) {
    if is_dirty {
        state.dirty_fields.insert(key.clone());
    } else {
        state.dirty_fields.remove(key.as_str());
    }
    state.ensure_meta(key).dirty = is_dirty;
}

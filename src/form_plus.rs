//! One mounted form: a [`FormController`] wired to the [`Mutation`] that
//! submits it.

use std::sync::Arc;

use tracing::debug;

use crate::form::{FieldErrors, FormController, FormModel, FormOptions, FormResult, Schema};
use crate::mutation::{Mutation, MutationCallbacks, MutationOutcome};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitOutcome<R> {
    /// Local validation failed; nothing was sent.
    Invalid,
    Sent(MutationOutcome<R>),
}

impl<R> SubmitOutcome<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Sent(outcome) if outcome.is_success())
    }
}

/// Validate-then-send flow for one form.
///
/// The mutation receives the current model as its input and reports server
/// field errors onto the controller's error surface, so `error_message`
/// answers for both sources.
pub struct FormPlus<T, R>
where
    T: FormModel,
{
    form: FormController<T>,
    mutation: Mutation<T, R>,
}

impl<T, R> Clone for FormPlus<T, R>
where
    T: FormModel,
{
    fn clone(&self) -> Self {
        Self {
            form: self.form.clone(),
            mutation: self.mutation.clone(),
        }
    }
}

impl<T, R> FormPlus<T, R>
where
    T: FormModel,
    R: Send + 'static,
{
    pub fn new(defaults: T, schema: impl Into<Arc<Schema>>, mutation: Mutation<T, R>) -> Self {
        Self::with_options(defaults, FormOptions::default(), schema, mutation)
    }

    pub fn with_options(
        defaults: T,
        options: FormOptions,
        schema: impl Into<Arc<Schema>>,
        mutation: Mutation<T, R>,
    ) -> Self {
        let schema = schema.into();
        let form = FormController::new(defaults, options).with_schema(schema.clone());
        let inputs = form.clone();
        let mutation = mutation
            .with_error_surface(form.error_surface())
            .with_i18n(schema.i18n().clone())
            .with_input_filter(move |field: &str| inputs.has_input(field).unwrap_or(true));
        Self { form, mutation }
    }

    pub fn form(&self) -> &FormController<T> {
        &self.form
    }

    pub fn mutation(&self) -> &Mutation<T, R> {
        &self.mutation
    }

    /// Validates locally and, when the form is valid, sends the current model.
    ///
    /// A submit blocked by local errors drops the form-level message of the
    /// previous run, which no longer describes the form.
    pub async fn submit(&self, callbacks: MutationCallbacks<R>) -> FormResult<SubmitOutcome<R>> {
        let Some(model) = self.form.begin_submit()? else {
            self.form.error_surface().set_form_error(None)?;
            return Ok(SubmitOutcome::Invalid);
        };
        let outcome = match self.mutation.run(model, callbacks).await {
            Ok(outcome) => outcome,
            Err(error) => {
                self.form.finish_submit(false)?;
                return Err(error);
            }
        };
        match &outcome {
            MutationOutcome::Succeeded(_) => self.form.finish_submit(true)?,
            MutationOutcome::Failed(_) => self.form.finish_submit(false)?,
            MutationOutcome::Superseded | MutationOutcome::Cancelled => {
                self.form.reset_submit_state()?
            }
        }
        Ok(SubmitOutcome::Sent(outcome))
    }

    pub fn set_field(&self, field: &str, value: impl Into<String>) -> FormResult<()> {
        self.form.set_field(field, value)
    }

    pub fn touch(&self, field: &str) -> FormResult<()> {
        self.form.touch(field)
    }

    pub fn is_field_invalid(&self, field: &str, linked: Option<&str>) -> FormResult<bool> {
        self.form.is_field_invalid(field, linked)
    }

    pub fn field_has_error(&self, field: &str) -> FormResult<bool> {
        self.form.field_has_error(field)
    }

    pub fn error_message(&self, field: &str) -> FormResult<Option<String>> {
        self.form.error_message(field)
    }

    pub fn form_error(&self) -> FormResult<Option<String>> {
        self.form.form_error()
    }

    pub fn errors(&self) -> FormResult<FieldErrors> {
        self.form.errors()
    }

    pub fn is_pending(&self) -> FormResult<bool> {
        self.mutation.is_pending()
    }

    /// Ends the session: the in-flight request is cancelled so a response
    /// arriving afterwards changes nothing.
    pub fn unmount(&self) -> FormResult<()> {
        let cancelled = self.mutation.cancel()?;
        self.form.reset_submit_state()?;
        debug!(cancelled, "form unmounted");
        Ok(())
    }
}

use super::controller::{FormController, FormResult, read_lock};
use super::errors::FieldErrors;
use super::validation::FormModel;

impl<T> FormController<T>
where
    T: FormModel,
{
    /// True when `field` has a local or server error, or when `linked` is
    /// given and that field has one. Mismatched confirmation fields use this
    /// to mark both inputs invalid.
    pub fn is_field_invalid(&self, field: &str, linked: Option<&str>) -> FormResult<bool> {
        self.errors.with(|errors| {
            errors.has_error(field) || linked.is_some_and(|linked| errors.has_error(linked))
        })
    }

    pub fn field_has_error(&self, field: &str) -> FormResult<bool> {
        self.errors.with(|errors| errors.has_error(field))
    }

    /// Local message if present, else the server message.
    pub fn error_message(&self, field: &str) -> FormResult<Option<String>> {
        self.errors
            .with(|errors| errors.message(field).map(str::to_string))
    }

    /// Message for a failure that names no field, such as a network outage.
    pub fn form_error(&self) -> FormResult<Option<String>> {
        self.errors
            .with(|errors| errors.form_error().map(str::to_string))
    }

    pub fn errors(&self) -> FormResult<FieldErrors> {
        self.errors.read()
    }

    /// The message to render next to the input: hidden until the field was
    /// touched or a submit was attempted, so a pristine form shows no errors.
    pub fn field_error_for_display(&self, field: &str) -> FormResult<Option<String>> {
        {
            let state = read_lock(&self.state, "reading display error visibility")?;
            let touched = state
                .field_meta
                .get(field)
                .is_some_and(|meta| meta.touched);
            if !touched && state.submit_count == 0 {
                return Ok(None);
            }
        }
        self.error_message(field)
    }
}

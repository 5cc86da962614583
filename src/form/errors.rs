use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use super::controller::{FieldKey, FormResult, read_lock, write_lock};

/// Display messages of one form, keyed by field.
///
/// Local (schema and validator) errors and server errors are stored apart and
/// merged on lookup; the local message wins when a field has both. The
/// form-level message carries failures that name no field.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldErrors {
    local: BTreeMap<FieldKey, String>,
    server: BTreeMap<FieldKey, String>,
    form: Option<String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every local error; nothing from a previous run survives.
    pub fn replace_local(&mut self, errors: impl IntoIterator<Item = (FieldKey, String)>) {
        self.local = errors.into_iter().collect();
    }

    pub fn set_local(&mut self, key: FieldKey, message: Option<String>) {
        match message {
            Some(message) => {
                self.local.insert(key, message);
            }
            None => {
                self.local.remove(key.as_str());
            }
        }
    }

    /// Replaces every server error.
    pub fn replace_server(&mut self, errors: impl IntoIterator<Item = (FieldKey, String)>) {
        self.server = errors.into_iter().collect();
    }

    pub fn set_form_error(&mut self, message: Option<String>) {
        self.form = message;
    }

    /// Drops server errors and the form-level message, keeping local ones.
    pub fn clear_server(&mut self) {
        self.server.clear();
        self.form = None;
    }

    pub fn clear_field(&mut self, field: &str) {
        self.local.remove(field);
        self.server.remove(field);
    }

    pub fn clear(&mut self) {
        self.local.clear();
        self.server.clear();
        self.form = None;
    }

    pub fn local(&self, field: &str) -> Option<&str> {
        self.local.get(field).map(String::as_str)
    }

    pub fn server(&self, field: &str) -> Option<&str> {
        self.server.get(field).map(String::as_str)
    }

    pub fn message(&self, field: &str) -> Option<&str> {
        self.local(field).or_else(|| self.server(field))
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.local.contains_key(field) || self.server.contains_key(field)
    }

    pub fn form_error(&self) -> Option<&str> {
        self.form.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.server.is_empty() && self.form.is_none()
    }

    /// Every field carrying an error from either source, in key order.
    pub fn fields(&self) -> BTreeSet<&FieldKey> {
        self.local.keys().chain(self.server.keys()).collect()
    }

    /// Merged `field -> message` view, local messages taking precedence.
    pub fn merged(&self) -> BTreeMap<FieldKey, String> {
        let mut merged = self.server.clone();
        merged.extend(
            self.local
                .iter()
                .map(|(key, message)| (key.clone(), message.clone())),
        );
        merged
    }
}

/// Shared handle onto a form's [`FieldErrors`].
#[derive(Clone, Debug, Default)]
pub struct ErrorSurface {
    inner: Arc<RwLock<FieldErrors>>,
}

impl ErrorSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> FormResult<FieldErrors> {
        Ok(read_lock(&self.inner, "reading field errors")?.clone())
    }

    pub fn with<R>(&self, f: impl FnOnce(&FieldErrors) -> R) -> FormResult<R> {
        Ok(f(&*read_lock(&self.inner, "reading field errors")?))
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut FieldErrors) -> R) -> FormResult<R> {
        Ok(f(&mut *write_lock(&self.inner, "writing field errors")?))
    }

    pub fn replace_server(
        &self,
        errors: impl IntoIterator<Item = (FieldKey, String)>,
    ) -> FormResult<()> {
        self.update(|surface| surface.replace_server(errors))
    }

    pub fn set_form_error(&self, message: Option<String>) -> FormResult<()> {
        self.update(|surface| surface.set_form_error(message))
    }

    pub fn clear_server(&self) -> FormResult<()> {
        self.update(FieldErrors::clear_server)
    }

    pub fn clear_field(&self, field: &str) -> FormResult<()> {
        self.update(|surface| surface.clear_field(field))
    }

    pub fn clear(&self) -> FormResult<()> {
        self.update(FieldErrors::clear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_message_takes_precedence_over_server() {
        let mut errors = FieldErrors::new();
        errors.replace_server([(FieldKey::new("email"), "já está em uso".to_string())]);
        assert_eq!(errors.message("email"), Some("já está em uso"));

        errors.set_local(FieldKey::new("email"), Some("Informe um e-mail válido".to_string()));
        assert_eq!(errors.message("email"), Some("Informe um e-mail válido"));
        assert_eq!(errors.server("email"), Some("já está em uso"));
        assert_eq!(
            errors.merged().get("email").map(String::as_str),
            Some("Informe um e-mail válido")
        );

        errors.set_local(FieldKey::new("email"), None);
        assert_eq!(errors.message("email"), Some("já está em uso"));
    }

    #[test]
    fn clear_server_keeps_local_errors() {
        let mut errors = FieldErrors::new();
        errors.replace_local([(FieldKey::new("name"), "required".to_string())]);
        errors.replace_server([(FieldKey::owned("email"), "taken".to_string())]);
        errors.set_form_error(Some("offline".to_string()));

        errors.clear_server();
        assert!(errors.has_error("name"));
        assert!(!errors.has_error("email"));
        assert_eq!(errors.form_error(), None);
        assert_eq!(
            errors.fields().into_iter().map(FieldKey::as_str).collect::<Vec<_>>(),
            vec!["name"]
        );
    }

    #[test]
    fn surface_clones_share_state() {
        let surface = ErrorSurface::new();
        let other = surface.clone();
        other
            .replace_server([(FieldKey::new("email"), "taken".to_string())])
            .expect("write server errors");
        assert!(
            surface
                .with(|errors| errors.has_error("email"))
                .expect("read errors")
        );
        surface.clear().expect("clear");
        assert!(other.read().expect("read").is_empty());
    }
}

pub mod form;
pub mod form_plus;
pub mod i18n;
pub mod mutation;
pub mod prelude;

pub use form_plus::{FormPlus, SubmitOutcome};
pub use i18n::{I18nManager, Locale};

#[cfg(test)]
mod test_public_api;

pub use crate::form::{
    FieldErrors, FieldKey, FieldLens, FormController, FormError, FormModel, FormOptions,
    FormResult, FormValues, RevalidateMode, Schema, SubmitState, ValidationMode,
};
pub use crate::form_plus::{FormPlus, SubmitOutcome};
pub use crate::i18n::{I18nManager, Locale};
pub use crate::mutation::{
    Mutation, MutationCallbacks, MutationError, MutationOptions, MutationOutcome, MutationStatus,
    ServerFieldErrors,
};

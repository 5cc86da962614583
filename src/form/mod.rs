mod controller;
mod errors;
mod schema;
mod surface;
mod validation;
mod values;


pub use controller::{
    FieldKey, FieldMeta, FormController, FormError, FormId, FormOptions, FormResult, FormSnapshot,
    RevalidateMode, SubmitState, ValidationMode,
};
pub use errors::{ErrorSurface, FieldErrors};
pub use formplus_derive::FormModel;
pub use schema::{
    Constraint, CustomPredicate, FieldRules, Rule, Schema, SchemaBuilder, SchemaError, Violation,
    parse_decimal,
};
pub use validation::{FieldLens, FieldValidator, FormModel, FormValidator, ValidationError};
pub use values::FormValues;

pub(crate) use controller::{read_lock, write_lock};

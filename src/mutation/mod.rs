//! Single-request executor with pending/succeeded/failed state.
//!
//! The request closure reports failure with a [`MutationError`], so callers
//! always decide between a field-shaped rejection and an unstructured failure
//! instead of guessing the payload shape.

mod error;
mod executor;


pub use error::{FORM_LEVEL_KEYS, MutationError, SERVER_MESSAGE_SEPARATOR, ServerFieldErrors};
pub use executor::{
    BoxedRequestFuture, Mutation, MutationCallbacks, MutationOptions, MutationOutcome,
    MutationStatus, MutationTicket,
};

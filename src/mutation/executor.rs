use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::{AbortHandle, Abortable, BoxFuture, Either, select};
use futures_timer::Delay;
use tracing::{debug, warn};

use super::error::MutationError;
use crate::form::{ErrorSurface, FormResult, read_lock, write_lock};
use crate::i18n::I18nManager;

pub type BoxedRequestFuture<R> = BoxFuture<'static, Result<R, MutationError>>;

type RequestFn<I, R> = Arc<dyn Fn(I) -> BoxedRequestFuture<R> + Send + Sync>;
type InputFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MutationOptions {
    /// Deadline for one request. `None` waits as long as the request does.
    pub timeout: Option<Duration>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MutationTicket(pub u64);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MutationOutcome<R> {
    Succeeded(R),
    Failed(MutationError),
    /// A newer run started before this one resolved; its result was dropped.
    Superseded,
    /// The run was cancelled while in flight.
    Cancelled,
}

impl<R> MutationOutcome<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn response(&self) -> Option<&R> {
        match self {
            Self::Succeeded(response) => Some(response),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&MutationError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

type SuccessCallback<R> = Box<dyn FnOnce(&R) + Send>;
type ErrorCallback = Box<dyn FnOnce(&MutationError) + Send>;

/// Continuations for one run. `on_error` runs after the error was published
/// to the error surface.
pub struct MutationCallbacks<R> {
    on_success: Option<SuccessCallback<R>>,
    on_error: Option<ErrorCallback>,
}

impl<R> Default for MutationCallbacks<R> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }
}

impl<R> MutationCallbacks<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce(&R) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&MutationError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

struct MutationState {
    status: MutationStatus,
    ticket: MutationTicket,
    abort: Option<AbortHandle>,
    last_error: Option<MutationError>,
}

/// One request/response exchange with the backend.
///
/// Runs are neither queued nor de-duplicated: every call to [`run`](Self::run)
/// sends its request, and only the most recent run publishes a result. Callers
/// that must not send twice check [`is_pending`](Self::is_pending) first.
pub struct Mutation<I, R> {
    request: RequestFn<I, R>,
    options: MutationOptions,
    i18n: I18nManager,
    errors: Option<ErrorSurface>,
    inputs: Option<InputFilter>,
    state: Arc<RwLock<MutationState>>,
}

impl<I, R> Clone for Mutation<I, R> {
    fn clone(&self) -> Self {
        Self {
            request: self.request.clone(),
            options: self.options,
            i18n: self.i18n.clone(),
            errors: self.errors.clone(),
            inputs: self.inputs.clone(),
            state: self.state.clone(),
        }
    }
}

impl<I, R> Mutation<I, R>
where
    I: Send + 'static,
    R: Send + 'static,
{
    pub fn new<F, Fut>(send: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, MutationError>> + Send + 'static,
    {
        let request: RequestFn<I, R> =
            Arc::new(move |input: I| -> BoxedRequestFuture<R> { Box::pin(send(input)) });
        Self {
            request,
            options: MutationOptions::default(),
            i18n: I18nManager::default(),
            errors: None,
            inputs: None,
            state: Arc::new(RwLock::new(MutationState {
                status: MutationStatus::Idle,
                ticket: MutationTicket(0),
                abort: None,
                last_error: None,
            })),
        }
    }

    pub fn with_options(mut self, options: MutationOptions) -> Self {
        self.options = options;
        self
    }

    /// Publishes server field errors and form-level messages to `errors`.
    pub fn with_error_surface(mut self, errors: ErrorSurface) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Names the server keys that map onto a rendered input. Rejections for
    /// any other key are shown as the form-level message. Without a filter
    /// every key except [`FORM_LEVEL_KEYS`](super::FORM_LEVEL_KEYS) counts as
    /// an input.
    pub fn with_input_filter(
        mut self,
        is_input: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.inputs = Some(Arc::new(is_input));
        self
    }

    pub fn with_i18n(mut self, i18n: I18nManager) -> Self {
        self.i18n = i18n;
        self
    }

    pub fn options(&self) -> MutationOptions {
        self.options
    }

    /// Sends `input` and waits for the response.
    ///
    /// Server errors and the form-level message from the previous run are
    /// cleared when the request starts. A field-shaped rejection is joined per
    /// field into the error surface; any other failure becomes the form-level
    /// message.
    pub async fn run(
        &self,
        input: I,
        callbacks: MutationCallbacks<R>,
    ) -> FormResult<MutationOutcome<R>> {
        let (ticket, registration) = {
            let mut state = write_lock(&self.state, "starting mutation")?;
            let (handle, registration) = AbortHandle::new_pair();
            state.ticket = MutationTicket(state.ticket.0.saturating_add(1));
            state.abort = Some(handle);
            state.status = MutationStatus::Pending;
            state.last_error = None;
            (state.ticket, registration)
        };
        if let Some(errors) = &self.errors {
            errors.clear_server()?;
        }
        debug!(ticket = ticket.0, "mutation started");

        let request = Abortable::new((self.request)(input), registration);
        let result = match self.options.timeout {
            Some(timeout) => match select(request, Delay::new(timeout)).await {
                Either::Left((result, _)) => result,
                Either::Right(((), _)) => Ok(Err(MutationError::TimedOut(timeout))),
            },
            None => request.await,
        };

        let Ok(result) = result else {
            debug!(ticket = ticket.0, "mutation cancelled");
            return Ok(MutationOutcome::Cancelled);
        };

        {
            let mut state = write_lock(&self.state, "finishing mutation")?;
            if state.ticket != ticket {
                debug!(
                    ticket = ticket.0,
                    latest = state.ticket.0,
                    "mutation superseded by a newer run"
                );
                return Ok(MutationOutcome::Superseded);
            }
            state.abort = None;
            state.status = if result.is_ok() {
                MutationStatus::Succeeded
            } else {
                MutationStatus::Failed
            };
            state.last_error = result.as_ref().err().cloned();
        }

        match result {
            Ok(response) => {
                debug!(ticket = ticket.0, "mutation succeeded");
                if let Some(on_success) = callbacks.on_success {
                    on_success(&response);
                }
                Ok(MutationOutcome::Succeeded(response))
            }
            Err(error) => {
                self.publish_error(ticket, &error)?;
                if let Some(on_error) = callbacks.on_error {
                    on_error(&error);
                }
                Ok(MutationOutcome::Failed(error))
            }
        }
    }

    fn publish_error(&self, ticket: MutationTicket, error: &MutationError) -> FormResult<()> {
        match error.field_errors() {
            Some(fields) => {
                debug!(
                    ticket = ticket.0,
                    fields = fields.len(),
                    "mutation rejected with field errors"
                );
            }
            None => warn!(ticket = ticket.0, %error, "mutation failed without field errors"),
        }

        let Some(surface) = &self.errors else {
            return Ok(());
        };
        match error.field_errors() {
            Some(fields) => {
                let (inputs, banner) = fields.partition(|field| {
                    self.inputs
                        .as_ref()
                        .is_none_or(|is_input| is_input(field))
                });
                surface.update(|errors| {
                    errors.replace_server(inputs);
                    errors.set_form_error(banner);
                })
            }
            None => surface.set_form_error(error.banner(&self.i18n)),
        }
    }

    /// Aborts the in-flight request. Its late response, if any, is dropped and
    /// no callback of that run is invoked. Returns whether a request was
    /// in flight.
    pub fn cancel(&self) -> FormResult<bool> {
        let mut state = write_lock(&self.state, "cancelling mutation")?;
        let Some(handle) = state.abort.take() else {
            return Ok(false);
        };
        handle.abort();
        state.ticket = MutationTicket(state.ticket.0.saturating_add(1));
        state.status = MutationStatus::Idle;
        debug!(ticket = state.ticket.0, "mutation cancelled by caller");
        Ok(true)
    }

    /// Back to idle, forgetting the last error; an in-flight request is
    /// cancelled.
    pub fn reset(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting mutation")?;
        if let Some(handle) = state.abort.take() {
            handle.abort();
        }
        state.ticket = MutationTicket(state.ticket.0.saturating_add(1));
        state.status = MutationStatus::Idle;
        state.last_error = None;
        Ok(())
    }

    pub fn is_pending(&self) -> FormResult<bool> {
        Ok(self.status()? == MutationStatus::Pending)
    }

    pub fn status(&self) -> FormResult<MutationStatus> {
        Ok(read_lock(&self.state, "reading mutation status")?.status)
    }

    pub fn last_error(&self) -> FormResult<Option<MutationError>> {
        Ok(read_lock(&self.state, "reading last mutation error")?
            .last_error
            .clone())
    }

    pub fn ticket(&self) -> FormResult<MutationTicket> {
        Ok(read_lock(&self.state, "reading mutation ticket")?.ticket)
    }
}

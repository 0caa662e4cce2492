use super::BatchFailure;
use std::fmt;
use std::num::NonZeroUsize;

/// Error raised by a caller-supplied error handler. It is returned to the
/// caller of `upload` untouched, so it can be downcast to the original type.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Callback invoked once per failing batch. Returning `Err` aborts the upload.
pub type ErrorHandler = Box<dyn FnMut(BatchFailure) -> Result<(), HandlerError> + Send>;

/// Per-call upload options.
pub struct UploadOptions {
    max_concurrency: NonZeroUsize,
    error_handler: Option<ErrorHandler>,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self {
            max_concurrency: NonZeroUsize::MIN,
            error_handler: None,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: NonZeroUsize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Installs a handler that takes over failure reporting.
    ///
    /// With a handler installed the upload no longer returns an aggregate
    /// error. A handler that returns `Err` stops dispatch of further batches
    /// and its error becomes the result of the upload.
    pub fn with_error_handler<F, E>(mut self, mut handler: F) -> Self
    where
        F: FnMut(BatchFailure) -> Result<(), E> + Send + 'static,
        E: Into<HandlerError>,
    {
        self.error_handler = Some(Box::new(move |failure| handler(failure).map_err(Into::into)));
        self
    }

    pub fn max_concurrency(&self) -> NonZeroUsize {
        self.max_concurrency
    }

    pub fn has_error_handler(&self) -> bool {
        self.error_handler.is_some()
    }

    pub(crate) fn into_parts(self) -> (NonZeroUsize, Option<ErrorHandler>) {
        (self.max_concurrency, self.error_handler)
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("max_concurrency", &self.max_concurrency)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

//! Unified error type, structured HTTP errors and the centralized error handler.
//!
//! Two families of failure flow through [`Error`]:
//!
//! - **Configuration errors** ([`Error::UnknownHandler`], [`Error::InvalidRoute`], …) are
//!   returned by registration calls on [`Application`](crate::Application). They never
//!   reach request time.
//! - **Execution errors** are whatever a handler or middleware returns. The dispatcher hands
//!   them, exactly once per request, to the application's [`ErrorHandler`].

use std::sync::Arc;

use http::StatusCode;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::context::Context;

/// The error type returned by handlers, middleware and flock's fallible setup operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A structured error carrying an explicit status and message.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A value passed as a handler matched none of the accepted shapes.
    #[error("unknown handler shape `{type_name}`")]
    UnknownHandler { type_name: &'static str },

    /// A value passed as middleware matched none of the accepted shapes.
    #[error("unknown middleware shape `{type_name}`")]
    UnknownMiddleware { type_name: &'static str },

    #[error("invalid route `{path}`: {source}")]
    InvalidRoute {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("invalid route method `{0}`")]
    InvalidMethod(String),

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A handler panicked; the payload message is kept for debug output.
    #[error("handler panicked: {0}")]
    Panic(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// An opaque error with a plain message. Rendered as a 500.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wraps any foreign error. Rendered as a 500.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }

    /// Shortcut for an [`HttpError`] with the standard reason phrase.
    pub fn http(code: StatusCode) -> Self {
        Self::Http(HttpError::new(code))
    }

    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(he) => Some(he),
            _ => None,
        }
    }
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// An error that tells the error handler which status to send.
///
/// ```rust
/// use flock::{Error, HttpError};
/// use http::StatusCode;
///
/// let he = HttpError::new(StatusCode::NOT_FOUND);
/// assert_eq!(he.message(), "Not Found");
///
/// let err: Error = HttpError::new(StatusCode::FORBIDDEN).with_message("members only").into();
/// assert_eq!(err.to_string(), "members only");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HttpError {
    code: StatusCode,
    message: String,
}

impl HttpError {
    /// Creates an error whose message is the standard reason phrase for `code`.
    pub fn new(code: StatusCode) -> Self {
        Self { code, message: reason_phrase(code).to_owned() }
    }

    /// Validates a raw integer status before building the error.
    pub fn from_u16(code: u16) -> Result<Self, Error> {
        StatusCode::from_u16(code)
            .map(Self::new)
            .map_err(|_| Error::InvalidStatus(code))
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn set_code(&mut self, code: StatusCode) {
        self.code = code;
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub(crate) fn reason_phrase(code: StatusCode) -> &'static str {
    code.canonical_reason().unwrap_or("")
}

// ── Error handler ─────────────────────────────────────────────────────────────

/// Centralized translation of an execution error into a response.
///
/// Invoked by the dispatcher at most once per request. It is the only component
/// allowed to write a response on the error path.
pub type ErrorHandler = Arc<dyn Fn(&Error, &mut Context) + Send + Sync + 'static>;

/// The default error policy.
///
/// - [`Error::Http`] keeps its status and message.
/// - Every other error becomes `500 Internal Server Error` with the reason phrase as body.
/// - When the owning application runs in debug mode the body is the error's full text.
///
/// Output buffered by the failing handler is discarded first, so the client sees exactly
/// one response.
pub fn default_error_handler(err: &Error, ctx: &mut Context) {
    let (code, mut message) = match err {
        Error::Http(he) => (he.code(), he.message().to_owned()),
        _ => {
            let code = StatusCode::INTERNAL_SERVER_ERROR;
            (code, reason_phrase(code).to_owned())
        }
    };

    if ctx.app().is_some_and(|app| app.debug()) {
        message = err.to_string();
    }

    if code.is_server_error() {
        error!(status = code.as_u16(), path = ctx.req().path(), "handler error: {err}");
    } else {
        debug!(status = code.as_u16(), path = ctx.req().path(), "handler error: {err}");
    }

    if ctx.resp().written() {
        warn!(
            status = ctx.resp().status().as_u16(),
            size = ctx.resp().size(),
            "discarding partial response written before the error"
        );
    }
    ctx.resp_mut().reset();
    ctx.text(code, message);
}

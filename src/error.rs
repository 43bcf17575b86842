//! Error types for mdchat.
//!
//! Every fallible operation in the crate returns [`Error`].  The variants fall into two camps:
//! errors talking to the inference endpoint, which end a single chat turn, and errors touching
//! local state (settings, transcripts, the terminal), which end the program.  See
//! [`Error::is_recoverable`].

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// The main error type for mdchat.
#[derive(Clone, Debug)]
pub enum Error {
    /// The endpoint answered with an error status or an in-band error event.
    Api {
        status_code: u16,
        /// The `error.type` field of the body, when there was one.
        error_type: Option<String>,
        message: String,
    },
    /// The key was missing or rejected (401).
    Authentication { message: String },
    /// The key may not use this model (403).
    Permission { message: String },
    /// Usually an unknown model or a wrong base URL (404).
    NotFound { message: String },
    RateLimit {
        message: String,
        /// Seconds from the `retry-after` header.
        retry_after: Option<u64>,
    },
    BadRequest {
        message: String,
        /// The offending request field, as named by the endpoint.
        param: Option<String>,
    },
    Timeout { message: String },
    Connection {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
    InternalServer { message: String },
    /// 502, 503 or 504.
    ServiceUnavailable {
        message: String,
        retry_after: Option<u64>,
    },
    /// JSON that could not be read or written.
    Serialization {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
    /// Settings, transcripts or the terminal could not be read or written.
    Io {
        message: String,
        source: Arc<io::Error>,
    },
    /// reqwest failed before a response arrived.
    HttpClient {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
    /// A value typed into the settings menu, or a title, was rejected.
    Validation {
        message: String,
        /// Name of the setting.
        param: Option<String>,
    },
    Url {
        message: String,
        source: Option<url::ParseError>,
    },
    /// The reply stream broke off or carried something unreadable.
    Streaming {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
    /// The settings file exists but cannot be used.
    Config {
        message: String,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
}

type BoxedSource = Box<dyn error::Error + Send + Sync>;

impl Error {
    pub fn api(status_code: u16, error_type: Option<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            error_type,
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    pub fn bad_request(message: impl Into<String>, param: Option<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
            param,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Error::Timeout {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn internal_server(message: impl Into<String>) -> Self {
        Error::InternalServer {
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::ServiceUnavailable {
            message: message.into(),
            retry_after,
        }
    }

    pub fn serialization(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    pub fn http_client(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    pub fn streaming(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn config(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Error::Config {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true when the error only spoils the current chat turn.
    ///
    /// Recoverable errors are reported to the user, after which the shell returns to the
    /// dashboard.  Everything else concerns local state the program cannot continue without
    /// and is propagated out of the shell.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::Io { .. } | Error::Config { .. } | Error::Serialization { .. }
        )
    }

    /// The HTTP status behind this error, if it came from one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            Error::BadRequest { .. } => Some(400),
            Error::Authentication { .. } => Some(401),
            Error::Permission { .. } => Some(403),
            Error::NotFound { .. } => Some(404),
            Error::RateLimit { .. } => Some(429),
            Error::InternalServer { .. } => Some(500),
            _ => None,
        }
    }
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    retry_after
        .map(|secs| format!(" (retry after {secs} seconds)"))
        .unwrap_or_default()
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                message,
                error_type: Some(error_type),
                ..
            } => write!(f, "{error_type}: {message}"),
            Error::Api { message, .. } => write!(f, "API error: {message}"),
            Error::Authentication { message } => write!(f, "Authentication error: {message}"),
            Error::Permission { message } => write!(f, "Permission denied: {message}"),
            Error::NotFound { message } => write!(f, "Not found: {message}"),
            Error::RateLimit {
                message,
                retry_after,
            } => write!(f, "Rate limit exceeded: {message}{}", retry_hint(retry_after)),
            Error::BadRequest {
                message,
                param: Some(param),
            } => write!(f, "Bad request: {message} (parameter: {param})"),
            Error::BadRequest { message, .. } => write!(f, "Bad request: {message}"),
            Error::Timeout { message } => write!(f, "Timed out: {message}"),
            Error::Connection { message, .. } => write!(f, "Connection error: {message}"),
            Error::InternalServer { message } => write!(f, "Server error: {message}"),
            Error::ServiceUnavailable {
                message,
                retry_after,
            } => write!(f, "Service unavailable: {message}{}", retry_hint(retry_after)),
            Error::Serialization { message, .. } => write!(f, "JSON error: {message}"),
            Error::Io { message, .. } => write!(f, "I/O error: {message}"),
            Error::HttpClient { message, .. } => write!(f, "HTTP client error: {message}"),
            Error::Validation {
                message,
                param: Some(param),
            } => write!(f, "Invalid {param}: {message}"),
            Error::Validation { message, .. } => write!(f, "Invalid value: {message}"),
            Error::Url { message, .. } => write!(f, "URL error: {message}"),
            Error::Streaming { message, .. } => write!(f, "Stream error: {message}"),
            Error::Config { message, .. } => write!(f, "Configuration error: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::Serialization { source, .. }
            | Error::HttpClient { source, .. }
            | Error::Streaming { source, .. }
            | Error::Config { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(err.to_string(), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(err.to_string(), Some(err))
    }
}

/// A specialized Result type for mdchat operations.
pub type Result<T> = std::result::Result<T, Error>;

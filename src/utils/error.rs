use std::{fmt, path::PathBuf};

/// Broad classification of an [`Error`], used by the dispatcher to pick a
/// response status and error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Http,
    Routing,
    Authorization,
}

/// Which part of a request a required field was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Header,
    Param,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Header => f.write_str("header"),
            FieldKind::Param => f.write_str("parameter"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The network call itself failed (DNS, connect, timeout, TLS).
    #[error("{message}")]
    Transport { message: String, code: Option<i32> },

    #[error("Missing required {kind} `{field}`")]
    MissingField { kind: FieldKind, field: String },

    #[error("{0}")]
    Http(String),

    #[error("File cannot be read: {}", .0.display())]
    FileUnreadable(PathBuf),

    #[error("Invalid URL `{0}`")]
    InvalidUrl(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input for action `{action}`: {message}")]
    InvalidInput { action: String, message: String },

    #[error("{0}")]
    Routing(String),

    #[error("invalid token")]
    Authorization,
}

impl Error {
    pub fn transport<T: fmt::Display>(message: T, code: Option<i32>) -> Self {
        Error::Transport { message: message.to_string(), code }
    }

    pub fn missing_header<T: Into<String>>(field: T) -> Self {
        Error::MissingField { kind: FieldKind::Header, field: field.into() }
    }

    pub fn missing_param<T: Into<String>>(field: T) -> Self {
        Error::MissingField { kind: FieldKind::Param, field: field.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Routing(_) => ErrorKind::Routing,
            Error::Authorization => ErrorKind::Authorization,
            Error::MissingField { .. }
            | Error::Http(_)
            | Error::FileUnreadable(_)
            | Error::InvalidUrl(_)
            | Error::PayloadTooLarge(_)
            | Error::Json(_)
            | Error::InvalidInput { .. } => ErrorKind::Http,
        }
    }

    /// Stable code reported in the `errorcode` field of JSON error bodies.
    pub fn errorcode(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Transport => "transport_exception",
            ErrorKind::Http => "http_exception",
            ErrorKind::Routing => "routing_exception",
            ErrorKind::Authorization => "not_authorized",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = err.raw_os_error();
        Error::transport(err, code)
    }
}

#[cfg(feature = "http")]
impl From<hyper::Error> for Error {
    fn from(err: hyper::Error) -> Self {
        Error::transport(err, None)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_fields_are_http_kind() {
        let err = Error::missing_header("Authorization");
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.to_string(), "Missing required header `Authorization`");

        let err = Error::missing_param("action");
        assert_eq!(err.errorcode(), "http_exception");
        assert_eq!(err.to_string(), "Missing required parameter `action`");
    }

    #[test]
    fn io_errors_become_transport_errors() {
        let err = Error::from(std::io::Error::from_raw_os_error(111));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(matches!(err, Error::Transport { code: Some(111), .. }));
    }

    #[test]
    fn oversized_body_is_http_kind() {
        let err = Error::PayloadTooLarge(16);
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.to_string(), "Request body exceeds 16 bytes");
    }

    #[test]
    fn authorization_message_is_stable() {
        assert_eq!(Error::Authorization.to_string(), "invalid token");
        assert_eq!(Error::Authorization.errorcode(), "not_authorized");
    }
}

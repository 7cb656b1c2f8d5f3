use http::StatusCode;
use std::collections::TryReserveError;
use std::io;
use thiserror::Error;

/// The error outcomes of parsing, routing and handling.
///
/// Each one is answered with the matching canned error page and the
/// connection is closed afterwards.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("bad request")]
    BadRequest,

    /// Produced by the router only, never by the parser.
    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("internal server error")]
    InternalError,

    #[error("http version not supported")]
    VersionNotSupported,
}

impl HttpError {
    pub fn status_code(self) -> StatusCode {
        match self {
            HttpError::BadRequest => StatusCode::BAD_REQUEST,
            HttpError::NotFound => StatusCode::NOT_FOUND,
            HttpError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HttpError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::VersionNotSupported => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("previous chunk is still in flight")]
    Busy,

    #[error("no outbound buffer attached")]
    NoBuffer,

    #[error("transport refused {len} bytes")]
    Refused { len: usize },

    #[error("unable to allocate {len} bytes")]
    OutOfMemory {
        len: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn refused(len: usize) -> Self {
        Self::Refused { len }
    }

    pub fn out_of_memory(len: usize, source: TryReserveError) -> Self {
        Self::OutOfMemory { len, source }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(HttpError::BadRequest.status_code().as_u16(), 400);
        assert_eq!(HttpError::NotFound.status_code().as_u16(), 404);
        assert_eq!(HttpError::MethodNotAllowed.status_code().as_u16(), 405);
        assert_eq!(HttpError::InternalError.status_code().as_u16(), 500);
        assert_eq!(HttpError::VersionNotSupported.status_code().as_u16(), 505);
    }

    #[test]
    fn send_error_messages() {
        assert_eq!(SendError::refused(12).to_string(), "transport refused 12 bytes");
        let source = Vec::<u8>::new().try_reserve(usize::MAX).unwrap_err();
        assert_eq!(SendError::out_of_memory(7, source).to_string(), "unable to allocate 7 bytes");
        let err = SendError::io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(err.to_string().starts_with("io error"));
    }
}

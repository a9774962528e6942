//! Outward-facing call status shared by the RPC transport and the HTTP gateway.
//!
//! Internal failure detail (which credential check failed, whether a library
//! is absent or owned by someone else, which SQL statement broke) never
//! reaches a `Status`. Callers only see the collapsed [`Code`] and a fixed
//! message; the detail goes to the log at the point the status is built.

use std::fmt;

/// Status codes, numbered like gRPC status codes so the RPC transport can
/// carry them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Ok,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    Unimplemented,
    Internal,
    Unauthenticated,
}

impl Code {
    pub fn as_i32(self) -> i32 {
        match self {
            Code::Ok => 0,
            Code::InvalidArgument => 3,
            Code::DeadlineExceeded => 4,
            Code::NotFound => 5,
            Code::AlreadyExists => 6,
            Code::Unimplemented => 12,
            Code::Internal => 13,
            Code::Unauthenticated => 16,
        }
    }

    /// Unknown numeric codes decode as `Internal`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Code::Ok,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            12 => Code::Unimplemented,
            16 => Code::Unauthenticated,
            _ => Code::Internal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Code::Ok => "ok",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unauthenticated => "unauthenticated",
        }
    }

    /// HTTP status used by the gateway for this code.
    pub fn http_status(self) -> u16 {
        match self {
            Code::Ok => 200,
            Code::InvalidArgument => 400,
            Code::Unauthenticated => 401,
            Code::NotFound => 404,
            Code::AlreadyExists => 409,
            Code::Internal => 500,
            Code::Unimplemented => 501,
            Code::DeadlineExceeded => 504,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal call outcome other than success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Status {
    code: Code,
    message: String,
}

/// The only message an auth gate rejection ever carries.
pub const UNAUTHENTICATED_MESSAGE: &str = "unauthenticated";

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthenticated() -> Self {
        Self::new(Code::Unauthenticated, UNAUTHENTICATED_MESSAGE)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    pub fn unimplemented(method: &str) -> Self {
        Self::new(Code::Unimplemented, format!("unknown method {method}"))
    }

    pub fn deadline_exceeded() -> Self {
        Self::new(Code::DeadlineExceeded, "deadline exceeded")
    }

    /// Generic internal failure; the cause must already have been logged.
    pub fn internal() -> Self {
        Self::new(Code::Internal, "internal error")
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<crate::store::StoreError> for Status {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::Conflict(what) => Status::already_exists(what),
            other => {
                tracing::error!(error = %other, "record store failure");
                Status::internal()
            }
        }
    }
}

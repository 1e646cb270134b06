//! Error types for the client-core library

use thiserror::Error;

use crate::call::CallState;

/// Result type for client-core operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client control layer
#[derive(Debug, Error)]
pub enum ClientError {
    /// A call with the same engine handle is already registered
    #[error("duplicate call handle: {handle}")]
    DuplicateHandle { handle: String },

    /// No registered call matches the given handle
    #[error("call not found: {handle}")]
    CallNotFound { handle: String },

    /// A synchronous engine command returned a non-zero result code.
    /// The code is engine-specific and is never retried here.
    #[error("engine command '{command}' failed with code {code}")]
    EngineCommandFailed { command: &'static str, code: i32 },

    /// A call state transition that the lifecycle table does not permit
    #[error("invalid call state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: CallState, to: CallState },

    /// Video direction change requested while video is not allowed on the call
    #[error("video is not allowed on call {handle}")]
    VideoNotAllowed { handle: String },

    /// Listen address setting is not a valid `ip:port` pair
    #[error("invalid listen address: {address}")]
    InvalidListenAddress { address: String },

    /// DNS server list setting contains an entry that is not a valid address
    #[error("invalid dns server list: {servers}")]
    InvalidDnsServers { servers: String },

    /// Server certificate verification was enabled without a CA file
    #[error("server certificate verification requires a CA file")]
    VerifyServerWithoutCa,

    /// Configuration file IO error
    #[error("config io error: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ClientError {
    /// Create a duplicate handle error
    pub fn duplicate_handle(handle: impl Into<String>) -> Self {
        Self::DuplicateHandle {
            handle: handle.into(),
        }
    }

    /// Create a call not found error
    pub fn call_not_found(handle: impl Into<String>) -> Self {
        Self::CallNotFound {
            handle: handle.into(),
        }
    }

    /// Create an engine command failure from a non-zero result code
    pub fn engine_failed(command: &'static str, code: i32) -> Self {
        Self::EngineCommandFailed { command, code }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

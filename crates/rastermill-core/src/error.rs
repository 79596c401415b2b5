//! Error types for Rastermill.

use thiserror::Error;

/// Main error type for compositor operations.
///
/// Kernel-level numeric edge cases (divide by zero, degenerate kernels) are
/// not errors; they recover locally with a documented fallback value. These
/// variants cover graph construction and dispatch.
#[derive(Error, Debug)]
pub enum Error {
    #[error("socket type mismatch: {0}")]
    SocketMismatch(String),

    #[error("operation graph contains a cycle")]
    GraphCycle,

    #[error("unconnected input socket: {0}")]
    DanglingInput(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for compositor operations.
pub type Result<T> = std::result::Result<T, Error>;

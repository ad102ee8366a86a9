//! Error types for the primitive stack API

use crate::api::LuaType;

/// Result type for primitive API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures reported by a runtime's primitive API
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Error raised by script code or a native function, carried verbatim
    #[error("{0}")]
    Runtime(String),

    /// The value stack cannot grow any further
    #[error("stack overflow")]
    StackOverflow,

    /// Too many nested native calls
    #[error("C stack overflow")]
    CallDepth,

    /// A table key that cannot be stored (nil or NaN)
    #[error("table index is {0}")]
    InvalidKey(&'static str),

    /// A key handed to `next` that is not present in the table
    #[error("invalid key to 'next'")]
    InvalidNextKey,

    /// A table operation was applied to a non-table value
    #[error("attempt to index a {0} value")]
    NotATable(LuaType),

    /// A call was applied to a non-function value
    #[error("attempt to call a {0} value")]
    NotCallable(LuaType),
}

impl From<String> for ApiError {
    fn from(s: String) -> Self {
        ApiError::Runtime(s)
    }
}

impl From<&str> for ApiError {
    fn from(s: &str) -> Self {
        ApiError::Runtime(s.to_string())
    }
}

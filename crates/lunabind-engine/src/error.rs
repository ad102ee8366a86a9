//! Error types for marshaling and the function bridge
//!
//! Errors reaching a script are flattened to their `Display` text, so the
//! messages here are part of the observable behaviour.

use std::fmt::Display;

use lunabind_sdk::{ApiError, Kind, LuaType};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures while reading a runtime value into tokens
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// The runtime value cannot represent the target type
    #[error("type mismatch, expecting {expected}")]
    TypeMismatch {
        /// Display name of the target type
        expected: String,
    },

    /// Functions never cross into the host as values
    #[error("function type not supported")]
    FunctionNotSupported,

    /// Userdata, threads and anything the runtime adds later
    #[error("unexpected runtime type: {0}")]
    UnexpectedType(LuaType),

    /// Strict field policy met a key the struct does not declare
    #[error("no {field} in {structure}")]
    FieldNotFound {
        /// Key found in the table
        field: String,
        /// Struct name
        structure: String,
    },

    /// Checked integer conversion: value does not fit the target width
    #[error("integer out of range, expecting {expected}")]
    IntegerOutOfRange {
        /// Display name of the target type
        expected: String,
    },

    /// Checked integer conversion: number has a fractional part
    #[error("number has no integer representation, expecting {expected}")]
    NotAnInteger {
        /// Display name of the target type
        expected: String,
    },

    /// A string decoded to a text target is not UTF-8
    #[error("invalid UTF-8 in string value")]
    InvalidUtf8,

    /// The runtime stack cannot hold a table traversal
    #[error("stack overflow")]
    StackOverflow,

    /// Building a typed host value nested deeper than the deserializer allows
    #[error("recursion limit exceeded")]
    RecursionLimit,

    /// Primitive API failure
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Failures while writing tokens onto the runtime stack
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// The token stream ended before a complete value
    #[error("expecting value")]
    ExpectingValue,

    /// A token that cannot start or close a value here
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Object keys must be strings
    #[error("invalid value: object key must be a string, got {0}")]
    ObjectKey(Kind),

    /// One encoder writes exactly one value
    #[error("invalid value: unexpected {0} after a complete value")]
    TrailingToken(Kind),

    /// The runtime stack cannot hold the nesting
    #[error("stack overflow")]
    StackOverflow,

    /// A typed host value nested deeper than the serializer allows
    #[error("recursion limit exceeded")]
    RecursionLimit,

    /// Primitive API failure
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Top-level engine error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Runtime value to tokens
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Tokens to runtime value
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Raised by a serde `Serialize`/`Deserialize` implementation
    #[error("{0}")]
    Message(String),

    /// Variadic host functions cannot be registered
    #[error("cannot register variadic function: {0}")]
    VariadicFunction(String),

    /// Empty name or empty dotted segment
    #[error("invalid function name: {0:?}")]
    InvalidName(String),

    /// The first namespace segment names a global that is not a table
    #[error("global {0} is not a table")]
    GlobalNotTable(String),

    /// A nested namespace segment names a field that is not a table
    #[error("namespace {0} is not a table")]
    NamespaceNotTable(String),

    /// Runtime argument count differs from the declared arity
    #[error("arguments not match: {name} expects {expected}, got {got}")]
    ArgumentsNotMatch {
        /// Registered name
        name: String,
        /// Declared arity
        expected: usize,
        /// Runtime argument count
        got: usize,
    },

    /// A host function pushed a different number of values than declared
    #[error("return values not match: {name} declares {expected}, pushed {got}")]
    ReturnsNotMatch {
        /// Registered name
        name: String,
        /// Declared return arity
        expected: usize,
        /// Values actually pushed
        got: usize,
    },

    /// A trampoline carried a handle the registry does not know
    #[error("unknown function handle: {0}")]
    UnknownFunction(u64),

    /// A host function returned `Err`
    #[error("{0}")]
    Host(String),

    /// Error raised inside the runtime, carried verbatim
    #[error("{0}")]
    Script(String),

    /// Primitive API failure outside a decode or encode
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    /// Build a [`Error::Host`] from any displayable error
    pub fn host(err: impl Display) -> Self {
        Error::Host(err.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}

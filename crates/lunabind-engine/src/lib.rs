//! Lunabind engine - value marshaling and function bridging for stack-based
//! scripting runtimes
//!
//! Values cross the boundary as a stream of [`Token`]s:
//!
//! ```text
//! runtime stack --Decoder--> tokens --de::Deserializer--> host value
//! host value    --ser::Serializer--> tokens --Encoder--> runtime stack
//! ```
//!
//! - [`decode`] / [`encode`]: iterative engines over [`LuaApi`]
//! - [`de`] / [`ser`]: serde adapters on either side of the token stream
//! - [`descriptor`] / [`cache`]: type descriptors and the struct layout cache
//! - [`function`] / [`registry`] / [`bridge`]: host functions callable from
//!   scripts, and script functions callable from the host
//!
//! # Example
//!
//! ```ignore
//! use lunabind_engine::{Bridge, Describe};
//! use lunabind_vm::State;
//! use serde::Deserialize;
//!
//! #[derive(Describe, Deserialize)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let mut bridge = Bridge::new(State::new());
//! bridge.register_function("geometry.norm1", |p: Point| p.x.abs() + p.y.abs())?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Lets `#[derive(Describe)]` output in unit tests name this crate by path.
#[cfg(test)]
extern crate self as lunabind_engine;

pub mod bridge;
pub mod cache;
pub mod de;
pub mod decode;
pub mod descriptor;
pub mod encode;
pub mod error;
pub mod function;
pub mod options;
pub mod registry;
pub mod ser;
pub mod value;

pub use bridge::Bridge;
pub use de::{from_tokens, Deserializer, TokenSource, Tokens};
pub use decode::{decode_tokens, decode_value, decode_value_as, Decoder};
pub use descriptor::{Bytes, Describe, FieldDescriptor, StructType, TypeDescriptor, Variadic};
pub use encode::{encode_tokens, encode_value, Encoder};
pub use error::{DecodeError, EncodeError, Error, Result};
pub use function::{
    FromReturns, HostFunction, IntoArguments, IntoHostFunction, IntoReturns, Invocation,
};
pub use options::{BridgeOptions, DecodeOptions, FieldPolicy, IntegerConversion};
pub use registry::{FunctionDescriptor, FunctionHandle, FunctionPath, FunctionRegistry};
pub use ser::{to_tokens, Serializer, TokenSink};
pub use value::Value;

pub use lunabind_derive::Describe;
pub use lunabind_sdk::{Kind, LuaApi, LuaType, Pointer, Token};

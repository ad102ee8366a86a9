//! Lunabind SDK - the contract between a scripting runtime and the marshaling engine
//!
//! This crate provides the minimal types needed on both sides of the bridge
//! without depending on the engine:
//!
//! - [`LuaApi`]: the stack-based primitive API a runtime exposes
//! - [`Token`] / [`Kind`]: the token vocabulary both marshaling directions speak
//! - [`Pointer`]: opaque light-userdata addresses
//! - [`ApiError`]: failures reported by the primitive API
//!
//! # Example
//!
//! ```ignore
//! use lunabind_sdk::{LuaApi, LuaType};
//!
//! fn sum_pair(state: &mut dyn LuaApi) -> Result<usize, String> {
//!     let a = state.to_integer(1);
//!     let b = state.to_integer(2);
//!     state.push_integer(a + b);
//!     Ok(1)
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod error;
pub mod token;

pub use api::{native_function, LuaApi, LuaType, NativeFunction, NativeResult, MULTRET};
pub use error::{ApiError, ApiResult};
pub use token::{Kind, Pointer, Token, POINTER_NAME};

//! Lunabind VM - an in-process runtime speaking the lunabind stack API
//!
//! This crate provides a small, pure-Rust implementation of [`LuaApi`] for
//! tests, benchmarks and embedders that do not link a C runtime:
//! - Value stack with per-call frames and stack limits
//! - Insertion-ordered tables with tombstone-safe traversal
//! - Globals and native closures
//! - Protected calls with call-depth limits
//!
//! There is no parser or bytecode; scripts are simulated by calling values
//! through [`State::call_value`] and [`State::call_path`].
//!
//! [`LuaApi`]: lunabind_sdk::LuaApi

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod state;
pub mod table;
pub mod value;

pub use state::{State, StateOptions, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_STACK};
pub use table::Table;
pub use value::{TableRef, Value};

//! Marshaling configuration
//!
//! Plain option structs with defaults matching the observed behaviour of
//! existing embeddings; every struct can be loaded from a config file via
//! serde.

use serde::{Deserialize, Serialize};

/// What to do with table keys a struct does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Fail with "no <field> in <Struct>"
    #[default]
    Strict,
    /// Skip the entry
    Lenient,
}

/// How runtime numbers become fixed-width integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegerConversion {
    /// Coerce through the runtime's 64-bit integer and truncate to the
    /// target width without range checks
    #[default]
    Truncate,
    /// Reject fractional numbers and values outside the target range
    Checked,
}

/// Decoding configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Unknown struct field handling
    pub unknown_fields: FieldPolicy,
    /// Number to integer conversion
    pub integers: IntegerConversion,
}

impl DecodeOptions {
    /// Defaults: strict fields, truncating integers
    pub fn strict() -> Self {
        Self::default()
    }

    /// Skip unknown struct fields
    pub fn lenient() -> Self {
        Self {
            unknown_fields: FieldPolicy::Lenient,
            ..Self::default()
        }
    }

    /// Replace the integer conversion mode
    pub fn with_integers(mut self, integers: IntegerConversion) -> Self {
        self.integers = integers;
        self
    }
}

/// Function bridge configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Options used to decode arguments and call results
    pub decode: DecodeOptions,
}

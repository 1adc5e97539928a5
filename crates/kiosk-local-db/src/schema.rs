//! Database schema definitions and constants.

/// Highest migration this build knows how to apply
pub const SCHEMA_VERSION: u32 = 1;

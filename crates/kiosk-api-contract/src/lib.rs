//! Kiosk screen store contract types and validation
//!
//! This crate defines the row, payload and event types exchanged with the
//! screen store. They are shared between the REST client, the in-memory
//! mock store and the device-side protocol in `kiosk-core`.

pub mod error;
pub mod types;
pub mod validation;

pub use error::*;
pub use types::*;
pub use validation::*;

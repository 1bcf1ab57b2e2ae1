//! Common types for eskube: CRDs, naming, versions, errors and telemetry

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod names;
pub mod telemetry;
pub mod version;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default port of the validating admission webhook
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;

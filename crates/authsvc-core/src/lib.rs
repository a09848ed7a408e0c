//! # authsvc-core
//!
//! Configuration model shared by the authsvc crates.
//!
//! The host application is responsible for reading configuration from disk,
//! environment or any other source. This crate only defines the shape of that
//! configuration (deserializable with `serde`) and the checks it must pass
//! before the protocol engine is built from it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod error;

pub use config::{Config, IdentityProviderEntry, ServiceProviderConfig};
pub use error::{ConfigError, ConfigResult};

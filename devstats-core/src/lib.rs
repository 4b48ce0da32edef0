//! devstats core library for environment-driven configuration and the
//! projects manifest.
//!
//! - [`env`]: [`EnvReader`] lookup abstraction over the environment
//! - [`coerce`]: raw string → typed value parsers
//! - [`config`]: [`Configuration`] and its resolver
//! - [`types`]: manifest domain types
//! - [`registry`]: manifest loading and project selection
//! - [`error`]: [`ManifestError`]

pub mod coerce;
pub mod config;
pub mod env;
pub mod error;
pub mod registry;
pub mod types;

pub use config::{Configuration, Pattern};
pub use env::{EnvReader, ProcessEnv};
pub use error::ManifestError;
pub use registry::ScheduledProject;
pub use types::{Manifest, ProjectDescriptor, ProjectName};

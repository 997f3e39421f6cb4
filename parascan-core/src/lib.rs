//! parascan-core: orchestration engine for running external security scanners in parallel

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod jobs;
pub mod reports;
pub mod tools;

pub use error::{Error, Result};

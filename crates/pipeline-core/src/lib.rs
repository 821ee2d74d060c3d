//! # pipeline-core
//!
//! Core crate for the pipeline workspace. Contains the shared traits
//! (cache providers, entities, entity stores, token validation, services),
//! configuration schemas, query/filter/ordering types, pagination helpers,
//! and the unified error system.
//!
//! This crate has **no** internal dependencies on other pipeline crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;

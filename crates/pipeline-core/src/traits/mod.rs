//! Core traits defined in `pipeline-core` and implemented by other crates.

pub mod cache;
pub mod entity;
pub mod service;
pub mod store;
pub mod token;

pub use cache::CacheProvider;
pub use entity::{Entity, HasOwner};
pub use service::Service;
pub use store::{EntityStore, Upserted, WriteOp, WriteOutcome};
pub use token::{TokenValidation, TokenValidator};

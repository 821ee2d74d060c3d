//! # pipeline-entity
//!
//! Entity models handled by the generic managers and services. Each entity
//! implements [`pipeline_core::traits::Entity`]; owned entities also
//! implement [`pipeline_core::traits::HasOwner`].

pub mod person;
pub mod tag;

pub use person::Person;
pub use tag::Tag;

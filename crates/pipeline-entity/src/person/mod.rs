//! Person profiles.

pub mod model;

pub use model::Person;

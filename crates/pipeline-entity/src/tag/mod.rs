//! Content tags.

pub mod model;

pub use model::Tag;

//! Tower/Axum middleware layers.

pub mod cors;
pub mod flash;
pub mod logging;

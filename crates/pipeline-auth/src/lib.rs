//! # pipeline-auth
//!
//! Action-scoped access tokens for the pipeline workspace.
//!
//! ## Modules
//!
//! - `jwt`: claims, signing and verification of HS256 tokens
//! - `service`: the [`TokenService`] that issues, validates and revokes
//!   tokens and plugs into token-aware managers as a
//!   [`TokenValidator`](pipeline_core::traits::TokenValidator)

pub mod jwt;
pub mod service;

pub use jwt::{TokenClaims, TokenDecoder, TokenEncoder};
pub use service::{IssuedToken, RevokedToken, TokenService};

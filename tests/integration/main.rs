//! Integration tests over the full router with in-memory backends.

mod health;
mod helpers;
mod notifications;
mod pagination;
mod services;
mod tokens;

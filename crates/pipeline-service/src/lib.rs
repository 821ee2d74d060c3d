//! # pipeline-service
//!
//! The manager and service layers.
//!
//! Managers wrap an [`EntityStore`](pipeline_core::traits::EntityStore)
//! with lookup helpers, read-through caching and token checks. Services
//! expose managers as named operations over keyword maps and are looked up
//! through an injected [`ServiceRegistry`].
//!
//! Everything is constructor-injected; nothing here is global.

pub mod crud;
pub mod manager;
pub mod registry;
pub mod search;
pub mod token_protected;

mod args;

pub use crud::{
    BatchCrudService, BatchOperation, BatchSummary, CrudService, ModelService, OperationOutcome,
};
pub use manager::{BaseManager, CachedManager, TokenAwareManager, TokenCachedManager, TokenScope};
pub use registry::ServiceRegistry;
pub use search::{SearchParams, SearchResults, SearchService};
pub use token_protected::TokenProtectedService;

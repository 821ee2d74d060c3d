//! Core type definitions used across the pipeline workspace.

pub mod filter;
pub mod pagination;
pub mod pk;
pub mod query;
pub mod record;
pub mod response;
pub mod sorting;

pub use filter::{FilterField, FilterOp};
pub use pagination::{OffsetPage, PageRangeItem, PageWindow, Paginator, page_range};
pub use pk::{PK_ALIASES, PkInfo, PkKind};
pub use query::Query;
pub use record::Record;
pub use response::ApiErrorResponse;
pub use sorting::{SortDirection, SortField};

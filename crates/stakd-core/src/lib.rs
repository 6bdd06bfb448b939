#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Stakd Core Library
//!
//! Entity records, the `{success, data | error}` API envelope, pagination,
//! list filters, change-event records and the shared error type used by the
//! Stakd client and sync crates.

pub mod api;
pub mod entity;
pub mod error;
pub mod event;
pub mod filter;
pub mod models;
pub mod pagination;

// Re-exports for convenience
pub use api::{ApiError, ApiResponse};
pub use entity::{Crud, EntityKind, Resource, Validate};
pub use error::{Error, Result};
pub use event::{ChangeEvent, EventFilter};
pub use filter::{DateRange, FilterParams, ListParams, Searchable, ToQuery};
pub use pagination::{PageInfo, PaginatedResponse};

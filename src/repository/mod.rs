//! Repository Layer
//!
//! Data access abstractions and implementations.

mod traits;
mod db;
mod sqlite_store;
mod rest_store;
mod auth;
mod blob_store;
pub mod backend;

#[cfg(test)]
pub(crate) mod recording;


pub use traits::{AuthProvider, BlobStore, Filter, Query, RowStore, UploadOptions};
pub use db::{init_db, init_memory_db};
pub use sqlite_store::SqliteRowStore;
pub use rest_store::SupabaseClient;
pub use auth::{LocalAuth, SupabaseAuth};
pub use blob_store::FsBlobStore;
pub use backend::{connect, Backend};

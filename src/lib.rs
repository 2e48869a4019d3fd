//! Kanban Board Core
//!
//! Layered architecture:
//! - domain: Core entities and business rules
//! - repository: Row store, auth and blob store backends
//! - commands: Persistence gateway over the row store
//! - store: Normalized board state with refetch-after-write
//! - reorder: Drag-and-drop position updates

pub mod domain;
pub mod repository;
pub mod commands;
pub mod store;
pub mod reorder;
pub mod context;
pub mod config;

pub use repository::backend;

pub use config::{BackendConfig, KanbanConfig};
pub use context::SessionContext;
pub use domain::{DomainError, DomainResult};
pub use reorder::{on_drag_end, ReorderPolicy};
pub use store::{AppState, BoardStore, StoreOptions};

use std::sync::Arc;

pub const APP_NAME: &str = "kanban";

/// Install the file logger when a log directory is configured.
/// Returns whether logging was installed by this call.
pub fn init_logging(config: &KanbanConfig) -> DomainResult<bool> {
    let Some(dir) = &config.log_dir else {
        return Ok(false);
    };
    if rolling_logger::is_initialized() {
        return Ok(false);
    }
    rolling_logger::init_logger(dir, APP_NAME).map_err(DomainError::Internal)?;
    log::info!("Logging to {}", dir.display());
    Ok(true)
}

/// Connect the configured backend and build a session context around a fresh store
pub fn open(config: &KanbanConfig) -> DomainResult<SessionContext> {
    config.validate()?;
    let backend = backend::connect(config)?;
    let store = Arc::new(BoardStore::from_config(&backend, config));
    Ok(SessionContext::new(backend.auth.clone(), store))
}

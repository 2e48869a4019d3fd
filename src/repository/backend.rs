//! Backend wiring
//!
//! Builds the row store, auth provider and blob store for the configured backend.

use std::path::Path;
use std::sync::Arc;

use super::auth::{LocalAuth, SupabaseAuth};
use super::blob_store::FsBlobStore;
use super::rest_store::SupabaseClient;
use super::sqlite_store::SqliteRowStore;
use super::traits::{AuthProvider, BlobStore, RowStore};
use crate::config::{BackendConfig, KanbanConfig};
use crate::domain::DomainResult;

/// The three collaborators every board operation goes through
#[derive(Clone)]
pub struct Backend {
    pub rows: Arc<dyn RowStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backend {
    pub fn new(rows: Arc<dyn RowStore>, auth: Arc<dyn AuthProvider>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { rows, auth, blobs }
    }

    /// Hosted backend sharing one client (and so one session) across all three roles
    pub fn hosted(client: SupabaseClient) -> Self {
        Self {
            rows: Arc::new(client.clone()),
            auth: Arc::new(SupabaseAuth::new(client.clone())),
            blobs: Arc::new(client),
        }
    }

    /// Embedded backend over an open SQLite store
    pub fn embedded(rows: SqliteRowStore, blob_root: &Path) -> Self {
        Self {
            rows: Arc::new(rows),
            auth: Arc::new(LocalAuth::new()),
            blobs: Arc::new(FsBlobStore::new(blob_root)),
        }
    }

    /// Throwaway embedded backend; blobs go under `blob_root`
    pub fn in_memory(blob_root: &Path) -> DomainResult<Self> {
        Ok(Self::embedded(SqliteRowStore::open_in_memory()?, blob_root))
    }
}

/// Connect to the backend named by `config`
pub fn connect(config: &KanbanConfig) -> DomainResult<Backend> {
    match &config.backend {
        BackendConfig::Supabase { url, anon_key } => {
            let client = SupabaseClient::new(url, anon_key)?;
            log::info!("Using hosted backend at {}", client.base_url());
            Ok(Backend::hosted(client))
        }
        BackendConfig::Sqlite { path } => {
            let blob_root = blob_root_for(path);
            let rows = if path.as_os_str() == ":memory:" {
                SqliteRowStore::open_in_memory()?
            } else {
                SqliteRowStore::open(path)?
            };
            log::info!(
                "Using embedded backend at {} (blobs in {})",
                path.display(),
                blob_root.display()
            );
            Ok(Backend::embedded(rows, &blob_root))
        }
    }
}

/// `blobs/` next to the database file
fn blob_root_for(db_path: &Path) -> std::path::PathBuf {
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join("blobs"),
        _ => std::path::PathBuf::from("blobs"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Table;
    use crate::repository::Query;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_connect_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = KanbanConfig::default();
        config.backend = BackendConfig::Sqlite {
            path: dir.path().join("board.db"),
        };
        let backend = connect(&config).unwrap();
        let rows = backend.rows.select(Table::Boards, &Query::new()).await.unwrap();
        assert!(rows.is_empty());
        assert!(backend.auth.current_session().is_none());
    }

    #[test]
    fn test_connect_rejects_bad_hosted_url() {
        let mut config = KanbanConfig::default();
        config.backend = BackendConfig::Supabase {
            url: "not a url".into(),
            anon_key: "k".into(),
        };
        assert!(connect(&config).is_err());
    }

    #[test]
    fn test_blob_root_next_to_db() {
        assert_eq!(blob_root_for(Path::new("/data/kanban.db")), PathBuf::from("/data/blobs"));
        assert_eq!(blob_root_for(Path::new("kanban.db")), PathBuf::from("blobs"));
    }
}

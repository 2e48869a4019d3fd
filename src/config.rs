//! Kanban configuration
//!
//! JSON file with environment overrides for the hosted-backend credentials
//! and the log directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::validation::DEFAULT_MAX_TITLE_LEN;
use crate::domain::{DomainError, DomainResult};
use crate::reorder::ReorderPolicy;

pub const ENV_SUPABASE_URL: &str = "KANBAN_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "KANBAN_SUPABASE_ANON_KEY";
pub const ENV_LOG_DIR: &str = "KANBAN_LOG_DIR";

pub const DEFAULT_AVATAR_BUCKET: &str = "avatars";

/// Which backend the board talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Hosted service: REST row store, object storage and auth
    Supabase { url: String, anon_key: String },
    /// Embedded SQLite file; `:memory:` for a throwaway database
    Sqlite { path: PathBuf },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Sqlite {
            path: PathBuf::from("kanban.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KanbanConfig {
    pub backend: BackendConfig,
    pub max_title_len: usize,
    pub card_reorder: ReorderPolicy,
    pub avatar_bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for KanbanConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            max_title_len: DEFAULT_MAX_TITLE_LEN,
            card_reorder: ReorderPolicy::default(),
            avatar_bucket: DEFAULT_AVATAR_BUCKET.to_string(),
            log_dir: None,
        }
    }
}

impl KanbanConfig {
    /// Load a config file and apply environment overrides
    pub fn load(path: &Path) -> DomainResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Internal(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Load from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> DomainResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let mut config = Self::default();
            config.apply_env();
            Ok(config)
        }
    }

    pub fn parse(content: &str) -> DomainResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| DomainError::InvalidInput(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> DomainResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            DomainError::Internal(format!("Failed to write config file {}: {}", path.display(), e))
        })
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.max_title_len == 0 {
            return Err(DomainError::InvalidInput("max_title_len must be positive".into()));
        }
        if self.avatar_bucket.trim().is_empty() {
            return Err(DomainError::InvalidInput("avatar_bucket must not be empty".into()));
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`.
    /// Either hosted credential switches the backend to the hosted service.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let url = lookup(ENV_SUPABASE_URL).filter(|v| !v.is_empty());
        let key = lookup(ENV_SUPABASE_ANON_KEY).filter(|v| !v.is_empty());
        if url.is_some() || key.is_some() {
            let (old_url, old_key) = match &self.backend {
                BackendConfig::Supabase { url, anon_key } => (url.clone(), anon_key.clone()),
                BackendConfig::Sqlite { .. } => (String::new(), String::new()),
            };
            self.backend = BackendConfig::Supabase {
                url: url.unwrap_or(old_url),
                anon_key: key.unwrap_or(old_key),
            };
        }
        if let Some(dir) = lookup(ENV_LOG_DIR).filter(|v| !v.is_empty()) {
            self.log_dir = Some(PathBuf::from(dir));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = KanbanConfig::default();
        assert_eq!(config.max_title_len, 255);
        assert_eq!(config.card_reorder, ReorderPolicy::MovedOnly);
        assert_eq!(config.avatar_bucket, "avatars");
        assert!(matches!(config.backend, BackendConfig::Sqlite { .. }));
    }

    #[test]
    fn test_parse_partial_file() {
        let config = KanbanConfig::parse(
            r#"{"backend": {"kind": "supabase", "url": "https://x.supabase.co", "anon_key": "k"},
                "card_reorder": "renumber"}"#,
        )
        .unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Supabase {
                url: "https://x.supabase.co".into(),
                anon_key: "k".into()
            }
        );
        assert_eq!(config.card_reorder, ReorderPolicy::Renumber);
        assert_eq!(config.max_title_len, 255);
    }

    #[test]
    fn test_parse_rejects_zero_title_len() {
        assert!(KanbanConfig::parse(r#"{"max_title_len": 0}"#).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kanban.json");
        let mut config = KanbanConfig::default();
        config.log_dir = Some(dir.path().join("logs"));
        config.save(&path).unwrap();

        let loaded = KanbanConfig::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = KanbanConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.max_title_len, KanbanConfig::default().max_title_len);
    }

    #[test]
    fn test_overrides_switch_backend() {
        let env: HashMap<&str, &str> = [
            (ENV_SUPABASE_URL, "https://y.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "anon"),
            (ENV_LOG_DIR, "/tmp/kanban-logs"),
        ]
        .into_iter()
        .collect();
        let mut config = KanbanConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(
            config.backend,
            BackendConfig::Supabase {
                url: "https://y.supabase.co".into(),
                anon_key: "anon".into()
            }
        );
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/kanban-logs")));
    }

    #[test]
    fn test_no_overrides_keeps_backend() {
        let mut config = KanbanConfig::default();
        config.apply_overrides(|_| None);
        assert_eq!(config, KanbanConfig::default());
    }
}

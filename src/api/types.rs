//! Shared types for the API layer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::db::sqlite::open_database;

/// Shared context for all API routes.
///
/// Holds no connection: every request opens its own against `db_path`.
#[derive(Debug, Clone)]
pub struct ApiContext {
    pub db_path: Arc<PathBuf>,
    /// User recorded as creator/updater of rows written through the API.
    pub actor: Option<i64>,
}

impl ApiContext {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Arc::new(db_path.into()),
            actor: None,
        }
    }

    pub fn with_actor(mut self, user_id: i64) -> Self {
        self.actor = Some(user_id);
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn open_db(&self) -> Result<Connection, ApiError> {
        open_database(&self.db_path).map_err(ApiError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_db_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ApiContext::new(tmp.path().join("nested").join("rx.db"));
        let conn = ctx.open_db().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);
        assert!(ctx.db_path().exists());
    }

    #[test]
    fn actor_defaults_to_none() {
        let ctx = ApiContext::new("rx.db");
        assert_eq!(ctx.actor, None);
        assert_eq!(ctx.with_actor(4).actor, Some(4));
    }
}

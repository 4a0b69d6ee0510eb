//! Quill Storage Layer
//!
//! Implements the [`Database`] and [`Coordinator`] ports on top of SQLite.
//!
//! # Architecture
//!
//! - `projects`, `clients`, `documents` hold the tenant data housekeeping sweeps over
//! - `housekeeping_locks` holds named leases, so every replica that opens the
//!   same database file shares one lock namespace
//!
//! # Examples
//!
//! ```no_run
//! use quill_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for housekeeping
//! ```

#![warn(missing_docs)]

mod lease;

pub use lease::LeaseOptions;

use async_trait::async_trait;
use quill_domain::traits::Database;
use quill_domain::{
    now_secs, ClientId, ClientInfo, ClientRefKey, ClientStatus, DocInfo, DocRefKey, DocumentId,
    ProjectId, ProjectInfo,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Lock is held elsewhere and the acquire timeout ran out
    #[error("Timed out acquiring lock: {0}")]
    LockTimeout(String),

    /// Lease expired and was taken over, or was already released
    #[error("Lease lost for lock: {0}")]
    LeaseLost(String),

    /// Connection mutex was poisoned by a panicking thread
    #[error("Connection poisoned")]
    Poisoned,
}

/// SQLite-based implementation of the storage and lock ports
///
/// The connection sits behind a mutex; every statement runs synchronously and
/// the guard is never held across an await point.
///
/// # Blocking
///
/// The async [`Database`] and [`quill_domain::traits::Coordinator`] methods
/// run their statements inline on the calling runtime worker rather than on
/// a blocking pool. Statements are short and indexed, so this is accepted.
/// A write that contends with another replica can block the worker for up to
/// the 5s busy timeout. That also delays the lease heartbeat sharing the
/// task, so the lease ttl should stay well above three busy timeouts (the
/// 60s default leaves a 20s heartbeat).
pub struct SqliteStore {
    conn: Mutex<Connection>,
    holder: String,
    lease_options: LeaseOptions,
}

const PROJECT_COLUMNS: &str = "id, name, client_deactivate_threshold_secs, created_at";
const CLIENT_COLUMNS: &str = "id, project_id, client_key, status, created_at, updated_at";
const DOCUMENT_COLUMNS: &str = "id, project_id, doc_key, created_at, removed_at";

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // Replicas sharing a file contend on writes; wait instead of failing with SQLITE_BUSY
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
            holder: uuid::Uuid::now_v7().to_string(),
            lease_options: LeaseOptions::default(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Replace the lease timing used by the [`quill_domain::traits::Coordinator`] impl
    pub fn with_lease_options(mut self, options: LeaseOptions) -> Self {
        self.lease_options = options;
        self
    }

    /// Identity written into lease rows held by this store instance
    pub fn holder(&self) -> &str {
        &self.holder
    }

    fn initialize_schema(&self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn()?.execute_batch(schema)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert a project
    pub fn insert_project(&self, project: &ProjectInfo) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO projects (id, name, client_deactivate_threshold_secs, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &project.id.to_bytes()[..],
                &project.name,
                project.client_deactivate_threshold_secs as i64,
                project.created_at as i64,
            ],
        )?;
        Ok(())
    }

    /// List every project in id order
    pub fn list_projects(&self) -> Result<Vec<ProjectInfo>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id"
        ))?;
        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    /// Activate a client, creating it on first use
    ///
    /// Re-activating an existing key refreshes its `updated_at`.
    pub fn activate_client(
        &self,
        project_id: ProjectId,
        key: &str,
        now: u64,
    ) -> Result<ClientInfo, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO clients (id, project_id, client_key, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(project_id, client_key) DO UPDATE SET
             status = excluded.status, updated_at = excluded.updated_at",
            params![
                &ClientId::new().to_bytes()[..],
                &project_id.to_bytes()[..],
                key,
                ClientStatus::Activated.as_str(),
                now as i64,
            ],
        )?;

        let client = conn.query_row(
            &format!(
                "SELECT {CLIENT_COLUMNS} FROM clients WHERE project_id = ?1 AND client_key = ?2"
            ),
            params![&project_id.to_bytes()[..], key],
            client_from_row,
        )?;
        Ok(client)
    }

    /// Look up a client
    pub fn find_client(&self, ref_key: ClientRefKey) -> Result<Option<ClientInfo>, StoreError> {
        let client = self
            .conn()?
            .query_row(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1 AND project_id = ?2"),
                params![
                    &ref_key.client_id.to_bytes()[..],
                    &ref_key.project_id.to_bytes()[..]
                ],
                client_from_row,
            )
            .optional()?;
        Ok(client)
    }

    /// Create a live document
    pub fn create_document(
        &self,
        project_id: ProjectId,
        key: &str,
        now: u64,
    ) -> Result<DocInfo, StoreError> {
        let doc = DocInfo {
            id: DocumentId::new(),
            project_id,
            key: key.to_string(),
            created_at: now,
            removed_at: None,
        };
        self.conn()?.execute(
            "INSERT INTO documents (id, project_id, doc_key, created_at, removed_at)
             VALUES (?1, ?2, ?3, ?4, NULL)",
            params![
                &doc.id.to_bytes()[..],
                &project_id.to_bytes()[..],
                &doc.key,
                now as i64,
            ],
        )?;
        Ok(doc)
    }

    /// Soft-delete a document at `removed_at`
    pub fn remove_document(&self, ref_key: DocRefKey, removed_at: u64) -> Result<(), StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE documents SET removed_at = ?1 WHERE id = ?2 AND project_id = ?3",
            params![
                removed_at as i64,
                &ref_key.doc_id.to_bytes()[..],
                &ref_key.project_id.to_bytes()[..],
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(ref_key.to_string()));
        }
        Ok(())
    }

    /// Look up a document, including soft-deleted ones
    pub fn find_document(&self, ref_key: DocRefKey) -> Result<Option<DocInfo>, StoreError> {
        let doc = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1 AND project_id = ?2"
                ),
                params![
                    &ref_key.doc_id.to_bytes()[..],
                    &ref_key.project_id.to_bytes()[..]
                ],
                document_from_row,
            )
            .optional()?;
        Ok(doc)
    }
}

fn id_from_row<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&[u8]) -> Result<T, String>,
) -> rusqlite::Result<T> {
    let bytes: Vec<u8> = row.get(idx)?;
    parse(&bytes).map_err(|e| {
        let source = Box::new(StoreError::InvalidData(e));
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, source)
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectInfo> {
    Ok(ProjectInfo {
        id: id_from_row(row, 0, ProjectId::from_bytes)?,
        name: row.get(1)?,
        client_deactivate_threshold_secs: row.get::<_, i64>(2)? as u64,
        created_at: row.get::<_, i64>(3)? as u64,
    })
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<ClientInfo> {
    let status: String = row.get(3)?;
    let status = ClientStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            Box::new(StoreError::InvalidData(format!("Unknown client status: {}", status))),
        )
    })?;

    Ok(ClientInfo {
        id: id_from_row(row, 0, ClientId::from_bytes)?,
        project_id: id_from_row(row, 1, ProjectId::from_bytes)?,
        key: row.get(2)?,
        status,
        created_at: row.get::<_, i64>(4)? as u64,
        updated_at: row.get::<_, i64>(5)? as u64,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocInfo> {
    let removed_at: Option<i64> = row.get(4)?;
    Ok(DocInfo {
        id: id_from_row(row, 0, DocumentId::from_bytes)?,
        project_id: id_from_row(row, 1, ProjectId::from_bytes)?,
        key: row.get(2)?,
        created_at: row.get::<_, i64>(3)? as u64,
        removed_at: removed_at.map(|t| t as u64),
    })
}

#[async_trait]
impl Database for SqliteStore {
    type Error = StoreError;

    async fn find_next_n_cycling_project_infos(
        &self,
        page_size: usize,
        last_project_id: ProjectId,
    ) -> Result<Vec<ProjectInfo>, Self::Error> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id > ?1 ORDER BY id LIMIT ?2"
        ))?;
        let projects = stmt
            .query_map(
                params![&last_project_id.to_bytes()[..], page_size as i64],
                project_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    async fn find_deactivate_candidates_per_project(
        &self,
        project: &ProjectInfo,
        limit: usize,
    ) -> Result<Vec<ClientInfo>, Self::Error> {
        let threshold = now_secs().saturating_sub(project.client_deactivate_threshold_secs);

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients
             WHERE project_id = ?1 AND status = ?2 AND updated_at <= ?3
             ORDER BY updated_at, id LIMIT ?4"
        ))?;
        let clients = stmt
            .query_map(
                params![
                    &project.id.to_bytes()[..],
                    ClientStatus::Activated.as_str(),
                    threshold as i64,
                    limit as i64,
                ],
                client_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(clients)
    }

    async fn find_document_hard_deletion_candidates_per_project(
        &self,
        project: &ProjectInfo,
        limit: usize,
        grace_period: Duration,
    ) -> Result<Vec<DocInfo>, Self::Error> {
        let removed_before = now_secs().saturating_sub(grace_period.as_secs());

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE project_id = ?1 AND removed_at IS NOT NULL AND removed_at <= ?2
             ORDER BY removed_at, id LIMIT ?3"
        ))?;
        let docs = stmt
            .query_map(
                params![&project.id.to_bytes()[..], removed_before as i64, limit as i64],
                document_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    async fn deactivate_client(&self, ref_key: ClientRefKey) -> Result<ClientInfo, Self::Error> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE clients SET status = ?1, updated_at = ?2 WHERE id = ?3 AND project_id = ?4",
            params![
                ClientStatus::Deactivated.as_str(),
                now_secs() as i64,
                &ref_key.client_id.to_bytes()[..],
                &ref_key.project_id.to_bytes()[..],
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(ref_key.to_string()));
        }

        let client = conn.query_row(
            &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1 AND project_id = ?2"),
            params![
                &ref_key.client_id.to_bytes()[..],
                &ref_key.project_id.to_bytes()[..]
            ],
            client_from_row,
        )?;
        Ok(client)
    }

    async fn delete_documents(&self, candidates: &[DocInfo]) -> Result<usize, Self::Error> {
        if candidates.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare(
                "DELETE FROM documents
                 WHERE id = ?1 AND project_id = ?2 AND removed_at IS NOT NULL",
            )?;
            for doc in candidates {
                deleted += stmt.execute(params![
                    &doc.id.to_bytes()[..],
                    &doc.project_id.to_bytes()[..]
                ])?;
            }
        }
        tx.commit()?;

        Ok(deleted)
    }
}

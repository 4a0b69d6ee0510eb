//! In-memory doubles for the store and lock ports, used by unit tests

use async_trait::async_trait;
use quill_domain::traits::{Coordinator, Database};
use quill_domain::{
    now_secs, ClientId, ClientInfo, ClientRefKey, ClientStatus, DocInfo, DocumentId, Lease,
    LockKey, ProjectId, ProjectInfo,
};
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct State {
    projects: Vec<ProjectInfo>,
    clients: Vec<ClientInfo>,
    documents: Vec<DocInfo>,
    listing_cursors: Vec<ProjectId>,
    failing_listings: usize,
    failing_clients: HashSet<ClientId>,
    restored_on_delete: HashSet<DocumentId>,
    deactivated: Vec<ClientRefKey>,
    deleted: Vec<DocumentId>,
}

/// Store double with sequential project ids and failure injection
#[derive(Default)]
pub struct MockDatabase {
    state: Mutex<State>,
    listing_delay: Option<Duration>,
    listings_in_flight: AtomicUsize,
    max_listings_in_flight: AtomicUsize,
}

impl MockDatabase {
    /// Projects with ids 1..=n
    pub fn with_projects(n: usize) -> Self {
        let db = Self::default();
        {
            let mut state = db.state.lock().unwrap();
            for i in 1..=n {
                let mut project = ProjectInfo::new(format!("project-{}", i), 0);
                project.id = ProjectId::from_value(i as u128);
                state.projects.push(project);
            }
        }
        db
    }

    /// Make every project listing take `delay`
    pub fn with_listing_delay(mut self, delay: Duration) -> Self {
        self.listing_delay = Some(delay);
        self
    }

    pub fn project_ids(&self) -> Vec<ProjectId> {
        let state = self.state.lock().unwrap();
        state.projects.iter().map(|p| p.id).collect()
    }

    /// Add `n` activated clients last seen at the epoch
    pub fn add_idle_clients(&self, project_id: ProjectId, n: usize) -> Vec<ClientInfo> {
        let mut state = self.state.lock().unwrap();
        let added: Vec<ClientInfo> = (0..n)
            .map(|i| ClientInfo {
                id: ClientId::new(),
                project_id,
                key: format!("client-{}", i),
                status: ClientStatus::Activated,
                created_at: 0,
                updated_at: 0,
            })
            .collect();
        state.clients.extend(added.iter().cloned());
        added
    }

    pub fn add_removed_document(&self, project_id: ProjectId, removed_at: u64) -> DocInfo {
        let mut state = self.state.lock().unwrap();
        let doc = DocInfo {
            id: DocumentId::new(),
            project_id,
            key: format!("doc-{}", state.documents.len()),
            created_at: 0,
            removed_at: Some(removed_at),
        };
        state.documents.push(doc.clone());
        doc
    }

    /// Fail the next `n` project listings
    pub fn fail_next_listings(&self, n: usize) {
        self.state.lock().unwrap().failing_listings = n;
    }

    pub fn fail_deactivation_of(&self, client_id: ClientId) {
        self.state.lock().unwrap().failing_clients.insert(client_id);
    }

    /// Simulate the document being restored between lookup and deletion
    pub fn restore_on_delete(&self, doc_id: DocumentId) {
        self.state.lock().unwrap().restored_on_delete.insert(doc_id);
    }

    /// `last_project_id` of every listing, in call order
    pub fn listing_cursors(&self) -> Vec<ProjectId> {
        self.state.lock().unwrap().listing_cursors.clone()
    }

    pub fn deactivated(&self) -> Vec<ClientRefKey> {
        self.state.lock().unwrap().deactivated.clone()
    }

    pub fn deleted_documents(&self) -> Vec<DocumentId> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn max_concurrent_listings(&self) -> usize {
        self.max_listings_in_flight.load(Ordering::SeqCst)
    }

    fn list_projects(
        &self,
        page_size: usize,
        last_project_id: ProjectId,
    ) -> Result<Vec<ProjectInfo>, String> {
        let mut state = self.state.lock().unwrap();
        state.listing_cursors.push(last_project_id);
        if state.failing_listings > 0 {
            state.failing_listings -= 1;
            return Err("project listing failed".to_string());
        }
        Ok(state
            .projects
            .iter()
            .filter(|p| p.id > last_project_id)
            .take(page_size)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Database for MockDatabase {
    type Error = String;

    async fn find_next_n_cycling_project_infos(
        &self,
        page_size: usize,
        last_project_id: ProjectId,
    ) -> Result<Vec<ProjectInfo>, String> {
        let in_flight = self.listings_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_listings_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(delay) = self.listing_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.list_projects(page_size, last_project_id);

        self.listings_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn find_deactivate_candidates_per_project(
        &self,
        project: &ProjectInfo,
        limit: usize,
    ) -> Result<Vec<ClientInfo>, String> {
        let threshold = now_secs().saturating_sub(project.client_deactivate_threshold_secs);
        let state = self.state.lock().unwrap();
        Ok(state
            .clients
            .iter()
            .filter(|c| c.project_id == project.id && c.is_active() && c.updated_at <= threshold)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_document_hard_deletion_candidates_per_project(
        &self,
        project: &ProjectInfo,
        limit: usize,
        grace_period: Duration,
    ) -> Result<Vec<DocInfo>, String> {
        let now = now_secs();
        let state = self.state.lock().unwrap();
        Ok(state
            .documents
            .iter()
            .filter(|d| d.project_id == project.id && d.is_past_grace_period(grace_period, now))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn deactivate_client(&self, ref_key: ClientRefKey) -> Result<ClientInfo, String> {
        let mut state = self.state.lock().unwrap();
        if state.failing_clients.contains(&ref_key.client_id) {
            return Err(format!("deactivation of {} failed", ref_key));
        }
        let client = state
            .clients
            .iter_mut()
            .find(|c| c.ref_key() == ref_key)
            .ok_or_else(|| format!("{} not found", ref_key))?;
        client.status = ClientStatus::Deactivated;
        client.updated_at = now_secs();
        let updated = client.clone();
        state.deactivated.push(ref_key);
        Ok(updated)
    }

    async fn delete_documents(&self, candidates: &[DocInfo]) -> Result<usize, String> {
        let mut state = self.state.lock().unwrap();
        let mut deleted = 0;
        for doc in candidates {
            if state.restored_on_delete.contains(&doc.id) {
                continue;
            }
            let before = state.documents.len();
            state.documents.retain(|d| d.id != doc.id);
            if state.documents.len() < before {
                state.deleted.push(doc.id);
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Coordinator double that grants every lease unless told to fail
#[derive(Default)]
pub struct FlakyCoordinator {
    fail_acquire: bool,
    fail_release: bool,
    /// Leases expire on this period and every renewal fails
    failing_renew_every: Option<Duration>,
    acquires: AtomicUsize,
    renewals: AtomicUsize,
    releases: AtomicUsize,
}

impl FlakyCoordinator {
    pub fn failing_acquire() -> Self {
        Self {
            fail_acquire: true,
            ..Default::default()
        }
    }

    pub fn failing_release() -> Self {
        Self {
            fail_release: true,
            ..Default::default()
        }
    }

    pub fn failing_renew(every: Duration) -> Self {
        Self {
            failing_renew_every: Some(every),
            ..Default::default()
        }
    }

    pub fn acquire_attempts(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn renew_attempts(&self) -> usize {
        self.renewals.load(Ordering::SeqCst)
    }

    pub fn release_attempts(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Coordinator for FlakyCoordinator {
    type Error = String;

    async fn acquire(&self, key: &LockKey) -> Result<Lease, String> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self.fail_acquire {
            return Err("lock service unavailable".to_string());
        }
        Ok(Lease::new(key.clone(), now_secs()))
    }

    async fn renew(&self, _lease: &Lease) -> Result<(), String> {
        self.renewals.fetch_add(1, Ordering::SeqCst);
        if self.failing_renew_every.is_some() {
            return Err("lease taken over".to_string());
        }
        Ok(())
    }

    async fn release(&self, _lease: Lease) -> Result<(), String> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail_release {
            return Err("lease expired".to_string());
        }
        Ok(())
    }

    fn renew_interval(&self) -> Option<Duration> {
        self.failing_renew_every
    }
}

/// Collects formatted log output of a scoped subscriber
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let logs = self.clone();
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || logs.clone())
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

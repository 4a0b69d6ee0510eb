//! Integration tests for quill-housekeeping
//!
//! Sweeps run against a real SQLite store. Multi-replica scenarios open the
//! same database file twice and use the store's own leases for locking.

use async_trait::async_trait;
use quill_domain::traits::{Coordinator, Database};
use quill_domain::{
    now_secs, ClientInfo, ClientRefKey, ClientStatus, DocInfo, ProjectId, ProjectInfo,
};
use quill_housekeeping::{
    ClientDeactivation, Cursor, Housekeeping, HousekeepingConfig, HousekeepingError,
    SweepExecutor, SweepKind,
};
use quill_store::{LeaseOptions, SqliteStore};
use quill_sync::MemoryCoordinator;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const HOUR: u64 = 3600;

fn test_config() -> HousekeepingConfig {
    HousekeepingConfig {
        interval_deactivate_candidates_secs: 3600,
        interval_delete_documents_secs: 3600,
        document_hard_deletion_grace_period_secs: 24 * HOUR,
        project_fetch_size: 2,
        ..Default::default()
    }
}

fn open_store(dir: &TempDir) -> Arc<SqliteStore> {
    Arc::new(
        SqliteStore::new(dir.path().join("quill.db"))
            .unwrap()
            .with_lease_options(LeaseOptions {
                ttl: Duration::from_secs(60),
                acquire_timeout: Duration::from_secs(5),
                poll_interval: Duration::from_millis(10),
            }),
    )
}

/// Insert projects with ids 1..=n so listing order is predictable
fn seed_projects(store: &SqliteStore, n: u128) -> Vec<ProjectInfo> {
    (1..=n)
        .map(|i| {
            let mut project = ProjectInfo::new(format!("project-{}", i), 0);
            project.id = ProjectId::from_value(i);
            store.insert_project(&project).unwrap();
            project
        })
        .collect()
}

/// Store wrapper whose project listing is slow, counting overlapping listings
/// across every wrapper that shares the same counters
struct SlowListing {
    store: Arc<SqliteStore>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

#[async_trait]
impl Database for SlowListing {
    type Error = quill_store::StoreError;

    async fn find_next_n_cycling_project_infos(
        &self,
        page_size: usize,
        last_project_id: ProjectId,
    ) -> Result<Vec<ProjectInfo>, Self::Error> {
        let listings = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(listings, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self
            .store
            .find_next_n_cycling_project_infos(page_size, last_project_id)
            .await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn find_deactivate_candidates_per_project(
        &self,
        project: &ProjectInfo,
        limit: usize,
    ) -> Result<Vec<ClientInfo>, Self::Error> {
        self.store.find_deactivate_candidates_per_project(project, limit).await
    }

    async fn find_document_hard_deletion_candidates_per_project(
        &self,
        project: &ProjectInfo,
        limit: usize,
        grace_period: Duration,
    ) -> Result<Vec<DocInfo>, Self::Error> {
        self.store
            .find_document_hard_deletion_candidates_per_project(project, limit, grace_period)
            .await
    }

    async fn deactivate_client(&self, ref_key: ClientRefKey) -> Result<ClientInfo, Self::Error> {
        self.store.deactivate_client(ref_key).await
    }

    async fn delete_documents(&self, candidates: &[DocInfo]) -> Result<usize, Self::Error> {
        self.store.delete_documents(candidates).await
    }
}

#[tokio::test]
async fn test_hard_deletion_respects_grace_period() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let project = &seed_projects(&store, 1)[0];
    let now = now_secs();

    let expired = store.create_document(project.id, "expired", now - 48 * HOUR).unwrap();
    store.remove_document(expired.ref_key(), now - 25 * HOUR).unwrap();
    let recent = store.create_document(project.id, "recent", now - 48 * HOUR).unwrap();
    store.remove_document(recent.ref_key(), now - 23 * HOUR).unwrap();
    let live = store.create_document(project.id, "live", now).unwrap();

    let housekeeping =
        Housekeeping::new(test_config(), Arc::clone(&store), Arc::new(MemoryCoordinator::default()))
            .unwrap();
    let outcomes = housekeeping.run_once().await.unwrap();

    let deletion = &outcomes[1];
    assert_eq!(deletion.kind, SweepKind::DocumentHardDeletion);
    assert_eq!(deletion.candidates, 1);
    assert_eq!(deletion.affected, 1);

    assert!(store.find_document(expired.ref_key()).unwrap().is_none());
    assert!(store.find_document(recent.ref_key()).unwrap().is_some());
    assert!(store.find_document(live.ref_key()).unwrap().is_some());
}

#[tokio::test]
async fn test_idle_clients_are_deactivated() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let project = &seed_projects(&store, 1)[0];
    let now = now_secs();

    let idle = store.activate_client(project.id, "idle", now - 2 * 24 * HOUR).unwrap();
    let fresh = store.activate_client(project.id, "fresh", now).unwrap();

    let housekeeping =
        Housekeeping::new(test_config(), Arc::clone(&store), Arc::new(MemoryCoordinator::default()))
            .unwrap();
    let outcomes = housekeeping.run_once().await.unwrap();
    assert_eq!(outcomes[0].affected, 1);

    let idle = store.find_client(idle.ref_key()).unwrap().unwrap();
    assert_eq!(idle.status, ClientStatus::Deactivated);
    let fresh = store.find_client(fresh.ref_key()).unwrap().unwrap();
    assert_eq!(fresh.status, ClientStatus::Activated);
}

#[tokio::test]
async fn test_per_project_threshold() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let strict = ProjectInfo::new("strict", 0).with_client_deactivate_threshold_secs(HOUR);
    store.insert_project(&strict).unwrap();
    let now = now_secs();

    let client = store.activate_client(strict.id, "sdk", now - 2 * HOUR).unwrap();

    let housekeeping =
        Housekeeping::new(test_config(), Arc::clone(&store), Arc::new(MemoryCoordinator::default()))
            .unwrap();
    housekeeping.run_once().await.unwrap();

    let client = store.find_client(client.ref_key()).unwrap().unwrap();
    assert!(!client.is_active());
}

#[tokio::test]
async fn test_sweeps_walk_projects_round_robin() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let projects = seed_projects(&store, 5);
    let idle_since = now_secs() - 2 * 24 * HOUR;
    for project in &projects {
        store.activate_client(project.id, "sdk", idle_since).unwrap();
    }

    let executor = SweepExecutor::new(
        Arc::clone(&store),
        Arc::new(MemoryCoordinator::default()),
        ClientDeactivation::new(10),
        2,
    );

    let first = executor.run(Cursor::start()).await.unwrap();
    assert_eq!(first.affected, 2);
    assert_eq!(first.next_cursor, Cursor::after_project(projects[1].id));

    let second = executor.run(first.next_cursor).await.unwrap();
    assert_eq!(second.affected, 2);
    assert_eq!(second.next_cursor, Cursor::after_project(projects[3].id));

    let third = executor.run(second.next_cursor).await.unwrap();
    assert_eq!(third.affected, 1);
    assert!(third.next_cursor.is_start());

    // Everything is deactivated, so the next cycle finds nothing
    let fourth = executor.run(third.next_cursor).await.unwrap();
    assert_eq!(fourth.candidates, 0);
    assert_eq!(fourth.next_cursor, Cursor::after_project(projects[1].id));
}

#[tokio::test]
async fn test_lock_held_elsewhere_fails_sweep() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    seed_projects(&store, 1);
    let coordinator = Arc::new(MemoryCoordinator::new(Duration::from_millis(50)));

    let lease = coordinator
        .acquire(&SweepKind::DeactivateCandidates.lock_key())
        .await
        .unwrap();

    let housekeeping =
        Housekeeping::new(test_config(), Arc::clone(&store), Arc::clone(&coordinator)).unwrap();
    let result = housekeeping.run_once().await;
    assert!(matches!(result, Err(HousekeepingError::Lock { .. })));

    coordinator.release(lease).await.unwrap();
    assert!(housekeeping.run_once().await.is_ok());
}

#[tokio::test]
async fn test_replicas_share_work_through_store_leases() {
    let dir = TempDir::new().unwrap();
    let replica_a = open_store(&dir);
    let replica_b = open_store(&dir);
    let projects = seed_projects(&replica_a, 2);
    let idle_since = now_secs() - 2 * 24 * HOUR;
    for project in &projects {
        for key in ["a", "b", "c"] {
            replica_a.activate_client(project.id, key, idle_since).unwrap();
        }
    }

    let a = Housekeeping::new(test_config(), Arc::clone(&replica_a), Arc::clone(&replica_a))
        .unwrap();
    let b = Housekeeping::new(test_config(), Arc::clone(&replica_b), Arc::clone(&replica_b))
        .unwrap();

    let (ra, rb) = tokio::join!(a.run_once(), b.run_once());
    let deactivated = ra.unwrap()[0].affected + rb.unwrap()[0].affected;

    // Whichever replica swept second found nothing left to do
    assert_eq!(deactivated, 6);
}

#[tokio::test]
async fn test_background_loops_start_and_stop() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let project = &seed_projects(&store, 1)[0];
    let now = now_secs();
    let idle = store.activate_client(project.id, "idle", now - 2 * 24 * HOUR).unwrap();
    let doc = store.create_document(project.id, "doc", now - 48 * HOUR).unwrap();
    store.remove_document(doc.ref_key(), now - 30 * HOUR).unwrap();

    let mut housekeeping =
        Housekeeping::new(test_config(), Arc::clone(&store), Arc::new(MemoryCoordinator::default()))
            .unwrap();
    housekeeping.start().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    housekeeping.stop();
    let metrics = housekeeping.metrics();
    tokio::time::timeout(Duration::from_secs(2), housekeeping.join())
        .await
        .expect("loops should stop without waiting out the interval")
        .unwrap();

    assert_eq!(metrics.get(SweepKind::DeactivateCandidates).sweeps, 1);
    assert_eq!(metrics.get(SweepKind::DocumentHardDeletion).affected, 1);
    assert!(!store.find_client(idle.ref_key()).unwrap().unwrap().is_active());
    assert!(store.find_document(doc.ref_key()).unwrap().is_none());
}

#[tokio::test]
async fn test_sweep_outliving_lease_ttl_stays_exclusive() {
    let dir = TempDir::new().unwrap();
    let open = || {
        Arc::new(
            SqliteStore::new(dir.path().join("quill.db"))
                .unwrap()
                .with_lease_options(LeaseOptions {
                    ttl: Duration::from_secs(1),
                    acquire_timeout: Duration::from_secs(10),
                    poll_interval: Duration::from_millis(10),
                }),
        )
    };
    let replica_a = open();
    let replica_b = open();
    let project = &seed_projects(&replica_a, 1)[0];
    for key in ["a", "b", "c"] {
        replica_a.activate_client(project.id, key, now_secs() - 2 * 24 * HOUR).unwrap();
    }

    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let executor = |store: &Arc<SqliteStore>| {
        let slow = SlowListing {
            store: Arc::clone(store),
            delay: Duration::from_millis(1500),
            in_flight: Arc::clone(&in_flight),
            max_in_flight: Arc::clone(&max_in_flight),
        };
        SweepExecutor::new(Arc::new(slow), Arc::clone(store), ClientDeactivation::new(10), 10)
    };
    let executor_a = executor(&replica_a);
    let executor_b = executor(&replica_b);

    let first = tokio::spawn(async move { executor_a.run(Cursor::start()).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = tokio::spawn(async move { executor_b.run(Cursor::start()).await });

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(first.affected, 3);
    assert_eq!(second.candidates, 0);
}

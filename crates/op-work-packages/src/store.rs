//! Persistence seam of the scheduling engine
//!
//! The engine only reads work packages and relations and writes back
//! rescheduled dates with optimistic locking. `op-db` provides the
//! PostgreSQL implementation; [`MemoryStore`] serves development and tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use op_core::{Id, Lockable, OpError, OpResult};
use op_models::{Relation, WorkPackage};
use tokio::sync::RwLock;

use crate::calendar::Calendar;
use crate::graph::ScheduleGraph;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn load(&self, id: Id) -> OpResult<WorkPackage>;

    /// Direct children, lowest id first
    async fn load_children(&self, id: Id) -> OpResult<Vec<WorkPackage>>;

    /// Follows/precedes relations in which `id` takes part on either side
    async fn load_relations(&self, id: Id) -> OpResult<Vec<Relation>>;

    /// Work packages with a start or due date that count working days
    async fn find_scheduling_candidates(&self) -> OpResult<Vec<WorkPackage>>;

    /// Write the scheduling attributes of `work_package`.
    ///
    /// `work_package.lock_version` is the version after the write; the
    /// stored version has to be the one before it, otherwise the write is
    /// rejected with [`OpError::Conflict`]. Returns the stored lock version.
    async fn save_if_changed(&self, work_package: &WorkPackage) -> OpResult<i32>;
}

/// Where the working days calendar is kept between passes
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn load_calendar(&self) -> OpResult<Calendar>;
}

/// A calendar shared in memory, edited directly by its owner
#[async_trait]
impl CalendarSource for parking_lot::RwLock<Calendar> {
    async fn load_calendar(&self) -> OpResult<Calendar> {
        Ok(self.read().clone())
    }
}

/// Load everything connected to `seeds` through parents, children and
/// scheduling relations.
pub async fn load_graph<S>(store: &S, seeds: impl IntoIterator<Item = Id>) -> OpResult<ScheduleGraph>
where
    S: SchedulingStore + ?Sized,
{
    let mut graph = ScheduleGraph::new();
    let mut visited = BTreeSet::new();
    let mut queue: VecDeque<Id> = seeds.into_iter().collect();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }

        if !graph.contains(id) {
            match store.load(id).await {
                Ok(work_package) => graph.insert(work_package),
                Err(OpError::NotFound { .. }) => {
                    tracing::debug!(work_package_id = id, "Skipping missing work package");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(parent_id) = graph.parent_of(id) {
            queue.push_back(parent_id);
        }
        for child in store.load_children(id).await? {
            queue.push_back(child.id);
            if !graph.contains(child.id) {
                graph.insert(child);
            }
        }
        for relation in store.load_relations(id).await? {
            queue.push_back(relation.predecessor_id);
            queue.push_back(relation.follower_id);
            graph.add_relation(relation);
        }
    }

    tracing::debug!(work_packages = graph.len(), "Loaded scheduling graph");
    Ok(graph)
}

/// In-memory store for development/testing
pub struct MemoryStore {
    work_packages: RwLock<HashMap<Id, WorkPackage>>,
    relations: RwLock<Vec<Relation>>,
    saves: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            work_packages: RwLock::new(HashMap::new()),
            relations: RwLock::new(Vec::new()),
            saves: AtomicU64::new(0),
        }
    }

    pub fn with_data(work_packages: Vec<WorkPackage>, relations: Vec<Relation>) -> Self {
        Self {
            work_packages: RwLock::new(work_packages.into_iter().map(|wp| (wp.id, wp)).collect()),
            relations: RwLock::new(relations),
            saves: AtomicU64::new(0),
        }
    }

    /// Insert or overwrite without any version check
    pub async fn insert(&self, work_package: WorkPackage) {
        let mut work_packages = self.work_packages.write().await;
        work_packages.insert(work_package.id, work_package);
    }

    pub async fn add_relation(&self, relation: Relation) {
        let mut relations = self.relations.write().await;
        relations.push(relation);
    }

    /// Change the parent the way a hierarchy edit would
    pub async fn set_parent(&self, id: Id, parent_id: Option<Id>) -> OpResult<()> {
        let mut work_packages = self.work_packages.write().await;
        let work_package = work_packages
            .get_mut(&id)
            .ok_or_else(|| OpError::work_package_not_found(id))?;
        work_package.parent_id = parent_id;
        Ok(())
    }

    pub async fn get(&self, id: Id) -> Option<WorkPackage> {
        let work_packages = self.work_packages.read().await;
        work_packages.get(&id).cloned()
    }

    /// All work packages, ordered by id
    pub async fn all(&self) -> Vec<WorkPackage> {
        let work_packages = self.work_packages.read().await;
        let mut all: Vec<WorkPackage> = work_packages.values().cloned().collect();
        all.sort_by_key(|wp| wp.id);
        all
    }

    /// Number of successful writes
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchedulingStore for MemoryStore {
    async fn load(&self, id: Id) -> OpResult<WorkPackage> {
        self.get(id)
            .await
            .ok_or_else(|| OpError::work_package_not_found(id))
    }

    async fn load_children(&self, id: Id) -> OpResult<Vec<WorkPackage>> {
        let work_packages = self.work_packages.read().await;
        let mut children: Vec<WorkPackage> = work_packages
            .values()
            .filter(|wp| wp.parent_id == Some(id))
            .cloned()
            .collect();
        children.sort_by_key(|wp| wp.id);
        Ok(children)
    }

    async fn load_relations(&self, id: Id) -> OpResult<Vec<Relation>> {
        let relations = self.relations.read().await;
        Ok(relations
            .iter()
            .filter(|r| r.predecessor_id == id || r.follower_id == id)
            .cloned()
            .collect())
    }

    async fn find_scheduling_candidates(&self) -> OpResult<Vec<WorkPackage>> {
        let work_packages = self.work_packages.read().await;
        let mut candidates: Vec<WorkPackage> = work_packages
            .values()
            .filter(|wp| wp.has_dates() && !wp.ignore_non_working_days)
            .cloned()
            .collect();
        candidates.sort_by_key(|wp| wp.id);
        Ok(candidates)
    }

    async fn save_if_changed(&self, work_package: &WorkPackage) -> OpResult<i32> {
        let mut work_packages = self.work_packages.write().await;
        let stored = work_packages
            .get_mut(&work_package.id)
            .ok_or_else(|| OpError::work_package_not_found(work_package.id))?;

        if stored.same_schedule(work_package) {
            return Ok(stored.lock_version);
        }
        if stored.lock_version != work_package.expected_stored_version() {
            return Err(OpError::Conflict {
                entity: "WorkPackage",
                id: work_package.id,
                message: format!(
                    "stored lock version {} does not match {}",
                    stored.lock_version,
                    work_package.expected_stored_version()
                ),
            });
        }

        stored.start_date = work_package.start_date;
        stored.due_date = work_package.due_date;
        stored.duration = work_package.duration;
        stored.lock_version = work_package.lock_version;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(stored.lock_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 6, day).unwrap()
    }

    #[tokio::test]
    async fn test_save_if_changed_bumps_version() {
        let store = MemoryStore::with_data(
            vec![WorkPackage::new(1, "wp").with_dates(date(20), date(21))],
            vec![],
        );

        let mut wp = store.load(1).await.unwrap();
        wp.due_date = Some(date(22));
        wp.lock_version += 1;

        assert_eq!(store.save_if_changed(&wp).await.unwrap(), 1);
        assert_eq!(store.get(1).await.unwrap().due_date, Some(date(22)));
        assert_eq!(store.save_count(), 1);

        // nothing left to write
        assert_eq!(store.save_if_changed(&wp).await.unwrap(), 1);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_save_if_changed_detects_stale_version() {
        let store = MemoryStore::with_data(vec![WorkPackage::new(1, "wp").with_start_date(date(20))], vec![]);

        let mut stale = store.load(1).await.unwrap();
        stale.start_date = Some(date(21));
        stale.lock_version += 1;

        let mut concurrent = stale.clone();
        concurrent.start_date = Some(date(23));
        store.save_if_changed(&concurrent).await.unwrap();

        let err = store.save_if_changed(&stale).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.get(1).await.unwrap().start_date, Some(date(23)));
    }

    #[tokio::test]
    async fn test_candidates_count_working_days_and_have_dates() {
        let store = MemoryStore::with_data(
            vec![
                WorkPackage::new(1, "dated").with_start_date(date(20)),
                WorkPackage::new(2, "ignoring").with_start_date(date(20)).ignoring_non_working_days(),
                WorkPackage::new(3, "duration only").with_duration(3),
                WorkPackage::new(4, "due only").with_due_date(date(22)),
            ],
            vec![],
        );
        let ids: Vec<Id> = store
            .find_scheduling_candidates()
            .await
            .unwrap()
            .into_iter()
            .map(|wp| wp.id)
            .collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[tokio::test]
    async fn test_load_graph_walks_the_connected_component() {
        let store = MemoryStore::with_data(
            vec![
                WorkPackage::new(1, "root"),
                WorkPackage::new(2, "child").with_parent(1),
                WorkPackage::new(3, "sibling").with_parent(1),
                WorkPackage::new(4, "follower of sibling"),
                WorkPackage::new(5, "child of follower").with_parent(4),
                WorkPackage::new(6, "unrelated"),
            ],
            vec![Relation::new(10, 3, 4), Relation::new(11, 3, 99)],
        );

        let graph = load_graph(&store, [2]).await.unwrap();
        let ids: Vec<Id> = graph.ids().collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(graph.followers_of(3).collect::<Vec<_>>(), vec![4, 99]);
    }

    #[tokio::test]
    async fn test_load_graph_propagates_store_failures() {
        let mut store = MockSchedulingStore::new();
        store
            .expect_load()
            .returning(|id| Ok(WorkPackage::new(id, "wp")));
        store
            .expect_load_children()
            .returning(|_| Err(OpError::Database("connection reset".to_string())));

        let err = load_graph(&store, [1]).await.unwrap_err();
        assert_eq!(err.error_code(), "database_error");
    }
}

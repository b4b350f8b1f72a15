//! PostgreSQL backed [`SchedulingStore`]

use async_trait::async_trait;
use op_core::{Id, OpResult};
use op_models::{Relation, WorkPackage};
use op_work_packages::SchedulingStore;
use sqlx::PgPool;

use crate::relations::RelationRepository;
use crate::repository::RepositoryError;
use crate::work_packages::WorkPackageRepository;

#[derive(Clone)]
pub struct PgSchedulingStore {
    work_packages: WorkPackageRepository,
    relations: RelationRepository,
}

impl PgSchedulingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            work_packages: WorkPackageRepository::new(pool.clone()),
            relations: RelationRepository::new(pool),
        }
    }
}

#[async_trait]
impl SchedulingStore for PgSchedulingStore {
    async fn load(&self, id: Id) -> OpResult<WorkPackage> {
        let work_package = self
            .work_packages
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::work_package_not_found(id))?;
        Ok(work_package)
    }

    async fn load_children(&self, id: Id) -> OpResult<Vec<WorkPackage>> {
        Ok(self.work_packages.find_children(id).await?)
    }

    async fn load_relations(&self, id: Id) -> OpResult<Vec<Relation>> {
        Ok(self.relations.find_scheduling_relations(id).await?)
    }

    async fn find_scheduling_candidates(&self) -> OpResult<Vec<WorkPackage>> {
        Ok(self.work_packages.find_scheduling_candidates().await?)
    }

    async fn save_if_changed(&self, work_package: &WorkPackage) -> OpResult<i32> {
        let lock_version = self.work_packages.update_schedule(work_package).await?;
        tracing::debug!(
            work_package_id = work_package.id,
            lock_version,
            "Saved work package schedule"
        );
        Ok(lock_version)
    }
}

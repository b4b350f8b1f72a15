//! Work Package repository
//!
//! Reads and writes the scheduling columns of `work_packages`.
//!
//! Mirrors: app/models/work_package.rb

use chrono::NaiveDate;
use op_core::traits::Id;
use op_models::WorkPackage;
use sqlx::{FromRow, PgPool};

use crate::repository::{RepositoryError, RepositoryResult};

const SCHEDULING_COLUMNS: &str = "id, subject, parent_id, start_date, due_date, duration, \
     ignore_non_working_days, COALESCE(schedule_manually, FALSE) AS schedule_manually, lock_version";

/// Scheduling columns of a work package
#[derive(Debug, Clone, FromRow)]
pub struct WorkPackageRow {
    pub id: i64,
    pub subject: String,
    pub parent_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub duration: Option<i32>,
    pub ignore_non_working_days: bool,
    pub schedule_manually: bool,
    pub lock_version: i32,
}

impl TryFrom<WorkPackageRow> for WorkPackage {
    type Error = RepositoryError;

    fn try_from(row: WorkPackageRow) -> Result<Self, Self::Error> {
        let duration = row
            .duration
            .map(|d| {
                u32::try_from(d).map_err(|_| {
                    RepositoryError::InvalidRow(format!(
                        "work package {} has a negative duration {}",
                        row.id, d
                    ))
                })
            })
            .transpose()?;

        Ok(WorkPackage {
            id: row.id,
            subject: row.subject,
            parent_id: row.parent_id,
            start_date: row.start_date,
            due_date: row.due_date,
            duration,
            ignore_non_working_days: row.ignore_non_working_days,
            schedule_manually: row.schedule_manually,
            lock_version: row.lock_version,
        })
    }
}

fn into_models(rows: Vec<WorkPackageRow>) -> RepositoryResult<Vec<WorkPackage>> {
    rows.into_iter().map(WorkPackage::try_from).collect()
}

/// Work package repository implementation
#[derive(Clone)]
pub struct WorkPackageRepository {
    pool: PgPool,
}

impl WorkPackageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Id) -> RepositoryResult<Option<WorkPackage>> {
        let row = sqlx::query_as::<_, WorkPackageRow>(&format!(
            "SELECT {} FROM work_packages WHERE id = $1",
            SCHEDULING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(WorkPackage::try_from).transpose()
    }

    /// Direct children ordered by id
    pub async fn find_children(&self, parent_id: Id) -> RepositoryResult<Vec<WorkPackage>> {
        let rows = sqlx::query_as::<_, WorkPackageRow>(&format!(
            "SELECT {} FROM work_packages WHERE parent_id = $1 ORDER BY id",
            SCHEDULING_COLUMNS
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        into_models(rows)
    }

    /// Dated work packages that respect non-working days
    pub async fn find_scheduling_candidates(&self) -> RepositoryResult<Vec<WorkPackage>> {
        let rows = sqlx::query_as::<_, WorkPackageRow>(&format!(
            r#"
            SELECT {} FROM work_packages
            WHERE ignore_non_working_days = FALSE
              AND (start_date IS NOT NULL OR due_date IS NOT NULL)
            ORDER BY id
            "#,
            SCHEDULING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        into_models(rows)
    }

    /// Write dates and duration of `work_package` with optimistic locking.
    ///
    /// The stored row must carry `lock_version - 1`. Rows whose schedule
    /// already matches are left alone. Returns the stored lock version.
    pub async fn update_schedule(&self, work_package: &WorkPackage) -> RepositoryResult<i32> {
        let duration = work_package.duration.map(|d| d as i32);
        let updated = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE work_packages SET
                start_date = $2,
                due_date = $3,
                duration = $4,
                lock_version = $5,
                updated_at = NOW()
            WHERE id = $1
              AND lock_version = $6
              AND (start_date, due_date, duration) IS DISTINCT FROM ($2, $3, $4)
            RETURNING lock_version
            "#,
        )
        .bind(work_package.id)
        .bind(work_package.start_date)
        .bind(work_package.due_date)
        .bind(duration)
        .bind(work_package.lock_version)
        .bind(work_package.lock_version - 1)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(lock_version) = updated {
            return Ok(lock_version);
        }

        let stored = self
            .find_by_id(work_package.id)
            .await?
            .ok_or_else(|| RepositoryError::work_package_not_found(work_package.id))?;

        if stored.same_schedule(work_package) {
            return Ok(stored.lock_version);
        }

        Err(RepositoryError::Conflict {
            entity: "WorkPackage",
            id: work_package.id,
            message: format!(
                "stored lock version {} does not match {}",
                stored.lock_version,
                work_package.lock_version - 1
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> WorkPackageRow {
        WorkPackageRow {
            id: 12,
            subject: "Foundation".to_string(),
            parent_id: Some(3),
            start_date: NaiveDate::from_ymd_opt(2022, 6, 20),
            due_date: NaiveDate::from_ymd_opt(2022, 6, 23),
            duration: Some(4),
            ignore_non_working_days: false,
            schedule_manually: true,
            lock_version: 5,
        }
    }

    #[test]
    fn test_row_converts_to_work_package() {
        let wp = WorkPackage::try_from(row()).unwrap();
        assert_eq!(wp.id, 12);
        assert_eq!(wp.parent_id, Some(3));
        assert_eq!(wp.duration, Some(4));
        assert!(wp.schedule_manually);
        assert_eq!(wp.lock_version, 5);
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let mut row = row();
        row.duration = Some(-1);
        let err = WorkPackage::try_from(row).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidRow(_)));
    }

    #[test]
    fn test_missing_duration_stays_missing() {
        let mut row = row();
        row.duration = None;
        assert_eq!(WorkPackage::try_from(row).unwrap().duration, None);
    }
}

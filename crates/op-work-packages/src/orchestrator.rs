//! Scheduling service
//!
//! Mirrors: app/workers/work_packages/apply_working_days_change_job.rb and
//! app/services/work_packages/update_ancestors_service.rb
//!
//! Entry point for calendar and hierarchy edits. Every trigger runs one pass:
//! freeze a calendar snapshot, seed, load the connected work packages,
//! propagate, then persist what changed. Passes never overlap.

use std::sync::Arc;

use op_core::config::SchedulingConfig;
use op_core::{Id, Lockable, OpError};
use op_models::WorkPackage;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::ancestors::AncestorLoader;
use crate::calendar::{Calendar, CalendarChange, CalendarEdit};
use crate::error::{SchedulingError, SchedulingResult};
use crate::propagator::{DateShiftPropagator, SeedReason};
use crate::store::{load_graph, CalendarSource, SchedulingStore};

/// Result of one scheduling pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Persisted work packages with their new lock version
    pub updated: Vec<(Id, i32)>,
    /// Work packages skipped because of a cycle
    pub unprocessed: Vec<Id>,
}

impl PassReport {
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }

    pub fn updated_ids(&self) -> Vec<Id> {
        self.updated.iter().map(|(id, _)| *id).collect()
    }

    /// Record a write, replacing an earlier one of the same work package
    fn record(&mut self, id: Id, lock_version: i32) {
        match self.updated.iter_mut().find(|(updated, _)| *updated == id) {
            Some(entry) => entry.1 = lock_version,
            None => self.updated.push((id, lock_version)),
        }
    }

    /// Turn a partial pass into [`SchedulingError::CycleDetected`]
    pub fn into_result(self) -> SchedulingResult<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(SchedulingError::CycleDetected {
                ids: self.unprocessed,
            })
        }
    }
}

enum Trigger<'a> {
    Calendar(&'a CalendarChange),
    Hierarchy {
        work_package_id: Id,
        former_parent_id: Option<Id>,
        parent_id: Option<Id>,
    },
}

pub struct SchedulingService<S: SchedulingStore + ?Sized> {
    store: Arc<S>,
    calendar: RwLock<Calendar>,
    calendar_source: Option<Arc<dyn CalendarSource>>,
    pass_lock: Mutex<()>,
    max_conflict_retries: u32,
}

impl<S: SchedulingStore + ?Sized> SchedulingService<S> {
    pub fn new(store: Arc<S>, calendar: Calendar) -> Self {
        Self {
            store,
            calendar: RwLock::new(calendar),
            calendar_source: None,
            pass_lock: Mutex::new(()),
            max_conflict_retries: SchedulingConfig::default().max_conflict_retries,
        }
    }

    pub fn with_config(store: Arc<S>, calendar: Calendar, config: &SchedulingConfig) -> Self {
        Self::new(store, calendar).with_max_conflict_retries(config.max_conflict_retries)
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Reload the calendar from `source` before every pass, so edits
    /// committed elsewhere are picked up by a long running service.
    pub fn with_calendar_source(mut self, source: Arc<dyn CalendarSource>) -> Self {
        self.calendar_source = Some(source);
        self
    }

    /// Copy of the calendar passes currently run with
    pub fn calendar(&self) -> Calendar {
        self.calendar.read().clone()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Reschedule the work packages covering days whose working status
    /// changed. Without a calendar source the service calendar must already
    /// reflect the change.
    pub async fn on_calendar_change(&self, change: &CalendarChange) -> SchedulingResult<PassReport> {
        let _pass = self.pass_lock.lock().await;
        self.refresh_calendar().await?;
        self.run(&Trigger::Calendar(change)).await
    }

    /// Commit `edit` to the service calendar and reschedule accordingly.
    ///
    /// An edit arriving during a pass waits for it to finish and then runs
    /// its own pass. With a calendar source the edit lasts until the next
    /// reload, so it has to be committed to the source as well.
    pub async fn apply_calendar_edit(&self, edit: CalendarEdit) -> SchedulingResult<PassReport> {
        let _pass = self.pass_lock.lock().await;
        self.refresh_calendar().await?;
        let change = self.calendar.write().apply(&edit);
        tracing::info!(
            weekdays = ?change.weekdays,
            dates = ?change.dates,
            "Working days changed"
        );
        if change.is_empty() {
            return Ok(PassReport::default());
        }
        self.run(&Trigger::Calendar(&change)).await
    }

    /// Reschedule after `work_package_id` moved from `former_parent_id` to
    /// `parent_id`. The store must already hold the new parent.
    pub async fn on_hierarchy_change(
        &self,
        work_package_id: Id,
        former_parent_id: Option<Id>,
        parent_id: Option<Id>,
    ) -> SchedulingResult<PassReport> {
        let _pass = self.pass_lock.lock().await;
        self.refresh_calendar().await?;
        self.run(&Trigger::Hierarchy {
            work_package_id,
            former_parent_id,
            parent_id,
        })
        .await
    }

    async fn refresh_calendar(&self) -> SchedulingResult<()> {
        let Some(source) = &self.calendar_source else {
            return Ok(());
        };
        let loaded = source.load_calendar().await?;
        let mut calendar = self.calendar.write();
        let change = calendar.diff(&loaded);
        if !change.is_empty() {
            tracing::info!(
                weekdays = ?change.weekdays,
                dates = ?change.dates,
                "Reloaded working days"
            );
        }
        *calendar = loaded;
        Ok(())
    }

    /// Run passes until one completes without a conflict. Writes of earlier
    /// attempts stay in the report, and the work packages they touched seed
    /// the next attempt so their followers are checked against the stored
    /// dates.
    async fn run(&self, trigger: &Trigger<'_>) -> SchedulingResult<PassReport> {
        let mut report = PassReport::default();
        let mut attempt = 0;
        loop {
            match self.pass(trigger, &mut report).await {
                Err(SchedulingError::ConcurrentModification { id, expected })
                    if attempt < self.max_conflict_retries =>
                {
                    attempt += 1;
                    tracing::warn!(
                        work_package_id = id,
                        expected_lock_version = expected,
                        attempt,
                        "Concurrent modification, re-running scheduling pass"
                    );
                }
                Err(err) => return Err(err),
                Ok(()) => return Ok(report),
            }
        }
    }

    async fn pass(&self, trigger: &Trigger<'_>, report: &mut PassReport) -> SchedulingResult<()> {
        let calendar = self.calendar.read().clone();
        calendar.ensure_usable()?;

        report.unprocessed.clear();
        let rescheduled = report.updated_ids();
        let rescheduled_seeds = rescheduled.iter().map(|id| (*id, SeedReason::Rescheduled));

        let (mut graph, seeds) = match trigger {
            Trigger::Calendar(change) => {
                let touched: Vec<Id> = self
                    .store
                    .find_scheduling_candidates()
                    .await?
                    .iter()
                    .filter(|wp| change.touches(wp))
                    .map(|wp| wp.id)
                    .collect();
                if touched.is_empty() && rescheduled.is_empty() {
                    tracing::debug!("No work package covers a changed day");
                    return Ok(());
                }
                let graph = load_graph(
                    self.store.as_ref(),
                    touched.iter().chain(&rescheduled).copied(),
                )
                .await?;
                let seeds: Vec<(Id, SeedReason)> = touched
                    .into_iter()
                    .map(|id| (id, SeedReason::WorkingDaysChanged))
                    .chain(rescheduled_seeds)
                    .collect();
                (graph, seeds)
            }
            Trigger::Hierarchy {
                work_package_id,
                former_parent_id,
                parent_id,
            } => {
                let entry_points = std::iter::once(*work_package_id)
                    .chain(*former_parent_id)
                    .chain(*parent_id)
                    .chain(rescheduled.iter().copied());
                let mut graph = load_graph(self.store.as_ref(), entry_points).await?;
                if !graph.set_parent(*work_package_id, *parent_id) {
                    return Err(OpError::work_package_not_found(*work_package_id).into());
                }
                let ancestors = AncestorLoader::new(&graph).select(*work_package_id, *former_parent_id, true);
                tracing::debug!(
                    work_package_id,
                    ancestors = ?ancestors.as_slice(),
                    "Ancestors affected by hierarchy change"
                );
                let seeds: Vec<(Id, SeedReason)> = std::iter::once((*work_package_id, SeedReason::Moved))
                    .chain(ancestors.into_iter().map(|id| (id, SeedReason::AncestorAffected)))
                    .chain(rescheduled_seeds)
                    .collect();
                (graph, seeds)
            }
        };

        let outcome = DateShiftPropagator::new(&calendar).propagate(&mut graph, seeds)?;

        report.unprocessed = outcome.unprocessed;
        for id in outcome.changed {
            let Some(work_package) = graph.get(id) else {
                continue;
            };
            let lock_version = self.save(work_package).await?;
            report.record(id, lock_version);
        }

        tracing::info!(
            updated = report.updated.len(),
            unprocessed = report.unprocessed.len(),
            "Scheduling pass finished"
        );
        Ok(())
    }

    async fn save(&self, work_package: &WorkPackage) -> SchedulingResult<i32> {
        match self.store.save_if_changed(work_package).await {
            Ok(lock_version) => Ok(lock_version),
            Err(err) if err.is_conflict() => Err(SchedulingError::ConcurrentModification {
                id: work_package.id,
                expected: work_package.expected_stored_version(),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

//! Date shift propagation
//!
//! Mirrors: app/workers/work_packages/apply_working_days_change_job.rb and
//! app/services/work_packages/set_schedule_service.rb
//!
//! A pass starts from a set of seeds, widens it to everything whose dates
//! may follow from theirs, and visits that set in dependency order:
//! predecessors before followers, children before parents. The order is
//! produced with Kahn's algorithm over an explicit work queue so malformed
//! data with cycles is reported instead of overflowing the stack.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::NaiveDate;
use op_core::Id;
use op_models::WorkPackage;

use crate::aggregator::HierarchyDateAggregator;
use crate::calendar::Calendar;
use crate::days::Days;
use crate::error::SchedulingResult;
use crate::graph::ScheduleGraph;

/// Why a work package takes part in a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeedReason {
    /// Its dates cover a day whose working status changed
    WorkingDaysChanged,
    /// It, or one of its ancestors, got a new parent
    Moved,
    /// Its descendants changed through a hierarchy move
    AncestorAffected,
    /// Already written for the same trigger before a conflict forced a
    /// rerun; its followers are checked again
    Rescheduled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationOutcome {
    /// Rescheduled work packages, in the order they were finalized
    pub changed: Vec<Id>,
    /// Work packages caught in, or downstream of, a cycle
    pub unprocessed: Vec<Id>,
}

pub struct DateShiftPropagator<'c> {
    calendar: &'c Calendar,
}

impl<'c> DateShiftPropagator<'c> {
    pub fn new(calendar: &'c Calendar) -> Self {
        Self { calendar }
    }

    /// Reschedule the work packages affected by `seeds`.
    ///
    /// Each rescheduled work package gets its `lock_version` bumped once.
    pub fn propagate(
        &self,
        graph: &mut ScheduleGraph,
        seeds: impl IntoIterator<Item = (Id, SeedReason)>,
    ) -> SchedulingResult<PropagationOutcome> {
        let reasons = self.seed_reasons(graph, seeds);
        let affected = expand(graph, reasons.keys().copied());
        let (order, unprocessed) = dependency_order(graph, &affected);

        if !unprocessed.is_empty() {
            tracing::warn!(
                work_package_ids = ?unprocessed,
                "Cycle in scheduling relations or hierarchy, skipping work packages"
            );
        }

        let mut outcome = PropagationOutcome {
            changed: Vec::new(),
            unprocessed,
        };
        // end date shift in days, `None` when the end was set or cleared
        let mut shifted: BTreeMap<Id, Option<i64>> = BTreeMap::new();

        for id in order {
            let Some(before) = graph.get(id).cloned() else {
                continue;
            };
            if before.schedule_manually {
                tracing::debug!(work_package_id = id, "Manually scheduled, keeping dates");
                continue;
            }

            let no_reasons = BTreeSet::new();
            let item_reasons = reasons.get(&id).unwrap_or(&no_reasons);
            let after = if graph.has_children(id) {
                self.aggregated(graph, &before)
            } else {
                self.rescheduled(graph, &before, item_reasons, &shifted)?
            };

            if after.same_schedule(&before) {
                continue;
            }

            tracing::debug!(
                work_package_id = id,
                start_date = ?after.start_date,
                due_date = ?after.due_date,
                duration = ?after.duration,
                "Rescheduled work package"
            );

            if let Some(shift) = end_shift(&before, &after) {
                shifted.insert(id, shift);
            }
            if let Some(work_package) = graph.get_mut(id) {
                work_package.start_date = after.start_date;
                work_package.due_date = after.due_date;
                work_package.duration = after.duration;
                work_package.lock_version = before.lock_version + 1;
            }
            outcome.changed.push(id);
        }

        Ok(outcome)
    }

    fn seed_reasons(
        &self,
        graph: &ScheduleGraph,
        seeds: impl IntoIterator<Item = (Id, SeedReason)>,
    ) -> BTreeMap<Id, BTreeSet<SeedReason>> {
        let mut reasons: BTreeMap<Id, BTreeSet<SeedReason>> = BTreeMap::new();
        for (id, reason) in seeds {
            if !graph.contains(id) {
                continue;
            }
            // descendants move along with a moved work package
            if reason == SeedReason::Moved {
                for descendant in graph.descendants_of(id) {
                    reasons.entry(descendant).or_default().insert(SeedReason::Moved);
                }
            }
            reasons.entry(id).or_default().insert(reason);
        }
        reasons
    }

    fn aggregated(&self, graph: &ScheduleGraph, parent: &WorkPackage) -> WorkPackage {
        let mut after = parent.clone();
        if let Some(dates) = HierarchyDateAggregator::new(self.calendar).aggregate(graph, parent.id) {
            after.start_date = dates.start_date;
            after.due_date = dates.due_date;
            after.duration = dates.duration;
        }
        after
    }

    fn rescheduled(
        &self,
        graph: &ScheduleGraph,
        before: &WorkPackage,
        reasons: &BTreeSet<SeedReason>,
        shifted: &BTreeMap<Id, Option<i64>>,
    ) -> SchedulingResult<WorkPackage> {
        let days = Days::for_work_package(self.calendar, before);
        let mut after = before.clone();

        if let (Some(start), Some(due), None) = (after.start_date, after.due_date, after.duration) {
            after.duration = Some(days.duration_between(start, due));
        }

        if reasons.contains(&SeedReason::WorkingDaysChanged) {
            match (after.start_date, after.due_date) {
                (Some(start), Some(_)) => {
                    let start = days.soonest_working_day(start)?;
                    after.start_date = Some(start);
                    after.due_date = Some(days.finish_date(start, after.duration.unwrap_or(1))?);
                }
                (Some(start), None) => after.start_date = Some(days.soonest_working_day(start)?),
                (None, Some(due)) => after.due_date = Some(days.soonest_working_day(due)?),
                (None, None) => {}
            }
        }

        let predecessors = graph.effective_predecessors(before.id);
        let shift = predecessors
            .keys()
            .filter_map(|predecessor| shifted.get(predecessor))
            .fold(None, |largest: Option<i64>, shift| {
                Some(largest.unwrap_or(i64::MIN).max(shift.unwrap_or(0)))
            });
        let soonest_start = self.soonest_start(graph, &days, &predecessors)?;

        if let Some(shift) = shift {
            // follow the predecessors by as much as the one moving most
            if let Some(start) = before.start_date {
                let start = days
                    .soonest_working_day(shift_date(start, shift))?
                    .max(soonest_start.unwrap_or(NaiveDate::MIN));
                self.start_at(&days, &mut after, start)?;
            } else if let Some(due) = before.due_date {
                let due = days
                    .soonest_working_day(shift_date(due, shift))?
                    .max(soonest_start.unwrap_or(NaiveDate::MIN));
                after.due_date = Some(due);
            }
        }

        // never earlier than the predecessors allow, moving forward only
        if let Some(soonest_start) = soonest_start {
            match (after.start_date, after.due_date) {
                (Some(start), _) if start < soonest_start => {
                    self.start_at(&days, &mut after, soonest_start)?;
                }
                (None, Some(due)) if due < soonest_start => after.due_date = Some(soonest_start),
                _ => {}
            }
        }

        Ok(after)
    }

    /// Earliest start allowed by all predecessors that have dates
    fn soonest_start(
        &self,
        graph: &ScheduleGraph,
        days: &Days<'_>,
        predecessors: &BTreeMap<Id, i32>,
    ) -> SchedulingResult<Option<NaiveDate>> {
        let mut soonest: Option<NaiveDate> = None;
        for (predecessor, lag) in predecessors {
            let Some(end) = graph.get(*predecessor).and_then(WorkPackage::end_date) else {
                continue;
            };
            let start = days.soonest_start_after(end, *lag)?;
            soonest = Some(soonest.map_or(start, |current| current.max(start)));
        }
        Ok(soonest)
    }

    fn start_at(
        &self,
        days: &Days<'_>,
        work_package: &mut WorkPackage,
        start: NaiveDate,
    ) -> SchedulingResult<()> {
        work_package.start_date = Some(start);
        if work_package.due_date.is_some() {
            let duration = work_package.duration.unwrap_or(1);
            work_package.due_date = Some(days.finish_date(start, duration)?);
        }
        Ok(())
    }
}

fn shift_date(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(chrono::Duration::days(days)).unwrap_or(date)
}

fn end_shift(before: &WorkPackage, after: &WorkPackage) -> Option<Option<i64>> {
    match (before.end_date(), after.end_date()) {
        (Some(old), Some(new)) if old != new => Some(Some((new - old).num_days())),
        (old, new) if old != new => Some(None),
        _ => None,
    }
}

/// Seeds plus everything that may have to follow them: parents for
/// aggregation, followers, and the descendants of followers.
fn expand(graph: &ScheduleGraph, seeds: impl IntoIterator<Item = Id>) -> BTreeSet<Id> {
    let mut affected = BTreeSet::new();
    let mut queue: VecDeque<Id> = seeds.into_iter().collect();

    while let Some(id) = queue.pop_front() {
        if !graph.contains(id) || !affected.insert(id) {
            continue;
        }
        if let Some(parent) = graph.parent_of(id) {
            queue.push_back(parent);
        }
        for follower in graph.followers_of(id) {
            queue.push_back(follower);
            queue.extend(graph.descendants_of(follower));
        }
    }
    affected
}

/// Visit order for `affected`, and the ids that could not be ordered.
fn dependency_order(graph: &ScheduleGraph, affected: &BTreeSet<Id>) -> (Vec<Id>, Vec<Id>) {
    let mut pending: BTreeMap<Id, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<Id, Vec<Id>> = BTreeMap::new();

    for &id in affected {
        let dependencies: BTreeSet<Id> = graph
            .effective_predecessors(id)
            .into_keys()
            .chain(graph.children_of(id))
            .filter(|dependency| *dependency != id && affected.contains(dependency))
            .collect();
        for dependency in &dependencies {
            dependents.entry(*dependency).or_default().push(id);
        }
        pending.insert(id, dependencies.len());
    }

    let mut ready: BTreeSet<Id> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(affected.len());

    while let Some(id) = ready.pop_first() {
        order.push(id);
        for dependent in dependents.get(&id).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    let unprocessed = pending
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(id, _)| id)
        .collect();
    (order, unprocessed)
}

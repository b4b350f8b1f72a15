//! Hierarchy date aggregation
//!
//! Mirrors: app/services/work_packages/update_ancestors_service.rb
//! (`derive_attributes` for start_date, due_date and duration)

use chrono::NaiveDate;
use op_core::Id;

use crate::calendar::Calendar;
use crate::days::Days;
use crate::graph::ScheduleGraph;

/// Dates a parent derives from its children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatedDates {
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub duration: Option<u32>,
}

pub struct HierarchyDateAggregator<'c> {
    calendar: &'c Calendar,
}

impl<'c> HierarchyDateAggregator<'c> {
    pub fn new(calendar: &'c Calendar) -> Self {
        Self { calendar }
    }

    /// Range covered by the children of `parent_id`.
    ///
    /// Returns `None` when the parent is unknown or has no loaded children.
    /// Children without any date are ignored; when none has a date, all
    /// derived attributes are empty.
    pub fn aggregate(&self, graph: &ScheduleGraph, parent_id: Id) -> Option<AggregatedDates> {
        let parent = graph.get(parent_id)?;
        if !graph.has_children(parent_id) {
            return None;
        }

        let children = graph.children_of(parent_id).filter_map(|id| graph.get(id));
        let (start_date, due_date) = children.fold((None, None), |(start, due), child| {
            (
                min_date(start, child.begin_date()),
                max_date(due, child.end_date()),
            )
        });

        let duration = match (start_date, due_date) {
            (Some(start), Some(due)) => {
                Some(Days::for_work_package(self.calendar, parent).duration_between(start, due))
            }
            _ => None,
        };

        Some(AggregatedDates {
            start_date,
            due_date,
            duration,
        })
    }
}

fn min_date(current: Option<NaiveDate>, candidate: Option<NaiveDate>) -> Option<NaiveDate> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_date(current: Option<NaiveDate>, candidate: Option<NaiveDate>) -> Option<NaiveDate> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use op_models::WorkPackage;

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 6, 20).unwrap() + chrono::Days::new(offset)
    }

    #[test]
    fn test_parent_spans_its_children() {
        let graph = ScheduleGraph::from_parts(
            vec![
                WorkPackage::new(1, "parent"),
                WorkPackage::new(2, "child").with_parent(1).with_dates(day(1), day(3)),
                WorkPackage::new(3, "child").with_parent(1).with_start_date(day(7)),
                WorkPackage::new(4, "child").with_parent(1).with_due_date(day(0)),
                WorkPackage::new(5, "no dates").with_parent(1),
            ],
            vec![],
        );
        let calendar = Calendar::default();

        let dates = HierarchyDateAggregator::new(&calendar).aggregate(&graph, 1).unwrap();
        assert_eq!(dates.start_date, Some(day(0)));
        assert_eq!(dates.due_date, Some(day(7)));
        // Mon to the next Mon
        assert_eq!(dates.duration, Some(6));
    }

    #[test]
    fn test_duration_uses_the_parents_days() {
        let graph = ScheduleGraph::from_parts(
            vec![
                WorkPackage::new(1, "parent").ignoring_non_working_days(),
                WorkPackage::new(2, "child").with_parent(1).with_dates(day(4), day(7)),
            ],
            vec![],
        );
        let calendar = Calendar::default();

        let dates = HierarchyDateAggregator::new(&calendar).aggregate(&graph, 1).unwrap();
        assert_eq!(dates.duration, Some(4));
    }

    #[test]
    fn test_children_without_dates_clear_the_parent() {
        let graph = ScheduleGraph::from_parts(
            vec![
                WorkPackage::new(1, "parent").with_dates(day(0), day(2)).with_duration(3),
                WorkPackage::new(2, "child").with_parent(1).with_duration(2),
            ],
            vec![],
        );
        let calendar = Calendar::default();

        let dates = HierarchyDateAggregator::new(&calendar).aggregate(&graph, 1).unwrap();
        assert_eq!(
            dates,
            AggregatedDates {
                start_date: None,
                due_date: None,
                duration: None
            }
        );
        assert!(HierarchyDateAggregator::new(&calendar).aggregate(&graph, 2).is_none());
    }
}

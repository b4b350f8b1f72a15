//! # op-work-packages
//!
//! Work package scheduling for OpenProject RS.
//!
//! Recomputes start dates, due dates and durations when the working days
//! calendar changes or a work package moves in the hierarchy, following
//! precedes/follows relations and aggregating parent ranges from their
//! children. Every affected work package is written at most once per pass.
//!
//! Mirrors: app/services/work_packages/ and app/workers/work_packages/

pub mod aggregator;
pub mod ancestors;
pub mod calendar;
pub mod days;
pub mod error;
pub mod graph;
pub mod jobs;
pub mod orchestrator;
pub mod propagator;
pub mod store;

#[cfg(test)]
mod test_support;

pub use aggregator::{AggregatedDates, HierarchyDateAggregator};
pub use ancestors::{AncestorLoader, Ancestors};
pub use calendar::{Calendar, CalendarChange, CalendarEdit};
pub use days::Days;
pub use error::{SchedulingError, SchedulingResult};
pub use graph::ScheduleGraph;
pub use jobs::{ApplyWorkingDaysChangeJob, JobError, JobHandler, JobRegistry, JobResult, UpdateAncestorsJob};
pub use orchestrator::{PassReport, SchedulingService};
pub use propagator::{DateShiftPropagator, PropagationOutcome, SeedReason};
pub use store::{load_graph, CalendarSource, MemoryStore, SchedulingStore};

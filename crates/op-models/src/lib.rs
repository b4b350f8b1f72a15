//! # op-models
//!
//! Domain models for OpenProject RS.
//!
//! This crate contains the entity structs the scheduling engine reads and
//! rewrites. Each model implements the core traits from `op-core`.

pub use op_core::traits::{Id, Lockable};

pub mod work_package;
pub mod week_day;

// Re-exports for convenience
pub use work_package::model::WorkPackage;
pub use work_package::relations::{Relation, RelationType, MAX_LAG, MIN_LAG};
pub use week_day::{DayOverride, WeekDay};

//! Work Package model

use chrono::NaiveDate;
use op_core::traits::{Id, Lockable};
use serde::{Deserialize, Serialize};

/// Work Package entity, restricted to its scheduling attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkPackage {
    pub id: Id,
    pub subject: String,
    pub parent_id: Option<Id>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    /// Number of working days between start and due date, both inclusive
    pub duration: Option<u32>,
    /// Count every calendar day as a working day for this work package
    #[serde(default)]
    pub ignore_non_working_days: bool,
    /// Dates are set by hand and never moved by automatic scheduling
    #[serde(default)]
    pub schedule_manually: bool,
    #[serde(default)]
    pub lock_version: i32,
}

impl WorkPackage {
    pub fn new(id: Id, subject: impl Into<String>) -> Self {
        Self {
            id,
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_parent(mut self, parent_id: Id) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_dates(mut self, start_date: NaiveDate, due_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self.due_date = Some(due_date);
        self
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn ignoring_non_working_days(mut self) -> Self {
        self.ignore_non_working_days = true;
        self
    }

    pub fn manually_scheduled(mut self) -> Self {
        self.schedule_manually = true;
        self
    }

    /// Whether a start or a due date is set
    pub fn has_dates(&self) -> bool {
        self.start_date.is_some() || self.due_date.is_some()
    }

    /// First day covered: the start date, or the due date for due-only work packages
    pub fn begin_date(&self) -> Option<NaiveDate> {
        self.start_date.or(self.due_date)
    }

    /// Last day covered: the due date, or the start date for start-only work packages
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.due_date.or(self.start_date)
    }

    /// Compare the attributes written by scheduling
    pub fn same_schedule(&self, other: &WorkPackage) -> bool {
        self.start_date == other.start_date
            && self.due_date == other.due_date
            && self.duration == other.duration
    }
}

impl Lockable for WorkPackage {
    fn lock_version(&self) -> i32 {
        self.lock_version
    }
}

//! Duration and date arithmetic
//!
//! Mirrors: app/services/work_packages/shared/working_days.rb and
//! app/services/work_packages/shared/all_days.rb
//!
//! A work package either counts working days according to the calendar or,
//! when it ignores non-working days, every calendar day. [`Days`] hides that
//! choice from the scheduling code.

use chrono::NaiveDate;
use op_models::WorkPackage;

use crate::calendar::{out_of_range, Calendar};
use crate::error::SchedulingResult;

#[derive(Debug, Clone, Copy)]
pub enum Days<'a> {
    /// Skip the calendar's non-working days
    Working(&'a Calendar),
    /// Every date counts
    All,
}

impl<'a> Days<'a> {
    pub fn for_work_package(calendar: &'a Calendar, work_package: &WorkPackage) -> Self {
        if work_package.ignore_non_working_days {
            Days::All
        } else {
            Days::Working(calendar)
        }
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        match self {
            Days::Working(calendar) => calendar.is_working_day(date),
            Days::All => true,
        }
    }

    /// First working day on or after `date`
    pub fn soonest_working_day(&self, date: NaiveDate) -> SchedulingResult<NaiveDate> {
        match self {
            Days::Working(calendar) => calendar.add_working_days(date, 0, false),
            Days::All => Ok(date),
        }
    }

    /// Last day of `duration` working days starting at `start`.
    ///
    /// A non-working `start` is moved to the next working day first. A
    /// duration of 0 is a milestone and ends on that day as well.
    pub fn finish_date(&self, start: NaiveDate, duration: u32) -> SchedulingResult<NaiveDate> {
        let units = duration.saturating_sub(1);
        match self {
            Days::Working(calendar) => calendar.add_working_days(start, units, false),
            Days::All => start
                .checked_add_days(chrono::Days::new(u64::from(units)))
                .ok_or_else(|| out_of_range(start)),
        }
    }

    /// Working days from `start` to `finish`, both inclusive
    pub fn duration_between(&self, start: NaiveDate, finish: NaiveDate) -> u32 {
        match self {
            Days::Working(calendar) => calendar.count_working_days(start, finish, false),
            Days::All => {
                if finish < start {
                    0
                } else {
                    ((finish - start).num_days() + 1) as u32
                }
            }
        }
    }

    /// Earliest start for a follower of a predecessor ending on
    /// `predecessor_end`.
    ///
    /// A lag of 0 means the next working day, a lag of `n` leaves `n` working
    /// days in between. Negative lags overlap with the predecessor: -1 allows
    /// starting on its last working day.
    pub fn soonest_start_after(
        &self,
        predecessor_end: NaiveDate,
        lag: i32,
    ) -> SchedulingResult<NaiveDate> {
        match self {
            Days::Working(calendar) if lag >= 0 => {
                let day_after = predecessor_end.succ_opt().ok_or_else(|| out_of_range(predecessor_end))?;
                calendar.add_working_days(day_after, lag.unsigned_abs(), false)
            }
            Days::Working(calendar) => {
                calendar.subtract_working_days(predecessor_end, lag.unsigned_abs() - 1, false)
            }
            Days::All if lag >= 0 => predecessor_end
                .checked_add_days(chrono::Days::new(u64::from(lag.unsigned_abs()) + 1))
                .ok_or_else(|| out_of_range(predecessor_end)),
            Days::All => predecessor_end
                .checked_sub_days(chrono::Days::new(u64::from(lag.unsigned_abs()) - 1))
                .ok_or_else(|| out_of_range(predecessor_end)),
        }
    }
}

//! Working days calendar
//!
//! Mirrors: app/models/week_day.rb, app/models/non_working_day.rb and the
//! `Day` lookups used by `WorkPackages::Shared::WorkingDays`.
//!
//! A [`Calendar`] answers whether a date is a working day. Date-specific
//! overrides take precedence over the weekday defaults. During a scheduling
//! pass a calendar is only ever read; edits go through [`Calendar::apply`],
//! which reports the resulting [`CalendarChange`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Weekday};
use op_core::config::SchedulingConfig;
use op_models::{DayOverride, WeekDay, WorkPackage};
use serde::{Deserialize, Serialize};

use crate::error::{SchedulingError, SchedulingResult};

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// ISO day number (1 = Monday .. 7 = Sunday)
pub fn iso_day(weekday: Weekday) -> u8 {
    weekday.number_from_monday() as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    working_weekdays: [bool; 7],
    overrides: BTreeMap<NaiveDate, bool>,
}

impl Default for Calendar {
    /// Monday to Friday, no overrides
    fn default() -> Self {
        Self::new([
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ])
    }
}

impl Calendar {
    pub fn new(working: impl IntoIterator<Item = Weekday>) -> Self {
        let mut working_weekdays = [false; 7];
        for weekday in working {
            working_weekdays[weekday.num_days_from_monday() as usize] = true;
        }
        Self {
            working_weekdays,
            overrides: BTreeMap::new(),
        }
    }

    /// Build from the `week_days` and `day_overrides` tables.
    ///
    /// Weekdays without a row are non-working; an empty table means the
    /// default Monday to Friday week.
    pub fn from_models(week_days: &[WeekDay], overrides: &[DayOverride]) -> Self {
        let mut calendar = if week_days.is_empty() {
            Self::default()
        } else {
            Self::new(
                week_days
                    .iter()
                    .filter(|day| day.working)
                    .filter_map(WeekDay::weekday),
            )
        };
        for day_override in overrides {
            calendar.set_override(day_override.date, day_override.working);
        }
        calendar
    }

    pub fn from_config(config: &SchedulingConfig) -> Self {
        let week_days: Vec<WeekDay> = config
            .working_days
            .iter()
            .map(|day| WeekDay::new(*day, true))
            .collect();
        let mut calendar = Self::new(week_days.iter().filter_map(WeekDay::weekday));
        for date in &config.non_working_dates {
            calendar.set_override(*date, false);
        }
        calendar
    }

    pub fn set_weekday(&mut self, weekday: Weekday, working: bool) {
        self.working_weekdays[weekday.num_days_from_monday() as usize] = working;
    }

    pub fn set_override(&mut self, date: NaiveDate, working: bool) {
        self.overrides.insert(date, working);
    }

    /// Returns whether an override existed
    pub fn clear_override(&mut self, date: NaiveDate) -> bool {
        self.overrides.remove(&date).is_some()
    }

    pub fn is_working_weekday(&self, weekday: Weekday) -> bool {
        self.working_weekdays[weekday.num_days_from_monday() as usize]
    }

    pub fn working_weekdays(&self) -> Vec<Weekday> {
        WEEKDAYS
            .into_iter()
            .filter(|weekday| self.is_working_weekday(*weekday))
            .collect()
    }

    pub fn has_working_weekday(&self) -> bool {
        self.working_weekdays.iter().any(|working| *working)
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        match self.overrides.get(&date) {
            Some(working) => *working,
            None => self.is_working_weekday(date.weekday()),
        }
    }

    /// Fails when skipping non-working days could never terminate.
    pub fn ensure_usable(&self) -> SchedulingResult<()> {
        if self.has_working_weekday() {
            Ok(())
        } else {
            Err(SchedulingError::configuration(
                "no weekday is configured as a working day",
            ))
        }
    }

    /// Advance `start` by `n` working days.
    ///
    /// `n == 0` yields the first working day on or after `start`.
    pub fn add_working_days(
        &self,
        start: NaiveDate,
        n: u32,
        ignore_non_working_days: bool,
    ) -> SchedulingResult<NaiveDate> {
        if ignore_non_working_days {
            return start
                .checked_add_days(chrono::Days::new(u64::from(n)))
                .ok_or_else(|| out_of_range(start));
        }
        self.ensure_usable()?;

        let mut date = start;
        while !self.is_working_day(date) {
            date = next_day(date)?;
        }
        let mut remaining = n;
        while remaining > 0 {
            date = next_day(date)?;
            if self.is_working_day(date) {
                remaining -= 1;
            }
        }
        Ok(date)
    }

    /// Move back from `start` by `n` working days.
    ///
    /// `n == 0` yields the last working day on or before `start`.
    pub fn subtract_working_days(
        &self,
        start: NaiveDate,
        n: u32,
        ignore_non_working_days: bool,
    ) -> SchedulingResult<NaiveDate> {
        if ignore_non_working_days {
            return start
                .checked_sub_days(chrono::Days::new(u64::from(n)))
                .ok_or_else(|| out_of_range(start));
        }
        self.ensure_usable()?;

        let mut date = start;
        while !self.is_working_day(date) {
            date = previous_day(date)?;
        }
        let mut remaining = n;
        while remaining > 0 {
            date = previous_day(date)?;
            if self.is_working_day(date) {
                remaining -= 1;
            }
        }
        Ok(date)
    }

    /// Working days between `start` and `end`, both inclusive
    pub fn count_working_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        ignore_non_working_days: bool,
    ) -> u32 {
        if end < start {
            return 0;
        }
        if ignore_non_working_days {
            return ((end - start).num_days() + 1) as u32;
        }
        start
            .iter_days()
            .take_while(|date| *date <= end)
            .filter(|date| self.is_working_day(*date))
            .count() as u32
    }

    /// The days whose working status differs between `self` and `other`
    pub fn diff(&self, other: &Calendar) -> CalendarChange {
        let weekdays = WEEKDAYS
            .into_iter()
            .filter(|weekday| self.is_working_weekday(*weekday) != other.is_working_weekday(*weekday))
            .map(iso_day)
            .collect();

        let dates = self
            .overrides
            .keys()
            .chain(other.overrides.keys())
            .filter(|date| self.is_working_day(**date) != other.is_working_day(**date))
            .copied()
            .collect();

        CalendarChange { weekdays, dates }
    }

    /// Apply an edit and report which days changed their working status
    pub fn apply(&mut self, edit: &CalendarEdit) -> CalendarChange {
        let before = self.clone();
        for week_day in &edit.week_days {
            if let Some(weekday) = week_day.weekday() {
                self.set_weekday(weekday, week_day.working);
            }
        }
        for date in &edit.removed_overrides {
            self.clear_override(*date);
        }
        for day_override in &edit.overrides {
            self.set_override(day_override.date, day_override.working);
        }
        before.diff(self)
    }
}

fn next_day(date: NaiveDate) -> SchedulingResult<NaiveDate> {
    date.succ_opt().ok_or_else(|| out_of_range(date))
}

fn previous_day(date: NaiveDate) -> SchedulingResult<NaiveDate> {
    date.pred_opt().ok_or_else(|| out_of_range(date))
}

pub(crate) fn out_of_range(date: NaiveDate) -> SchedulingError {
    SchedulingError::configuration(format!("date arithmetic left the supported range at {}", date))
}

/// An edit of the working days configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarEdit {
    pub week_days: Vec<WeekDay>,
    pub overrides: Vec<DayOverride>,
    pub removed_overrides: Vec<NaiveDate>,
}

/// Days whose working status changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarChange {
    /// ISO weekdays (1 = Monday .. 7 = Sunday)
    pub weekdays: BTreeSet<u8>,
    pub dates: BTreeSet<NaiveDate>,
}

impl CalendarChange {
    pub fn weekdays(weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        Self {
            weekdays: weekdays.into_iter().map(iso_day).collect(),
            dates: BTreeSet::new(),
        }
    }

    pub fn dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            weekdays: BTreeSet::new(),
            dates: dates.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.weekdays.is_empty() && self.dates.is_empty()
    }

    /// Whether the work package's own date arithmetic is affected: it counts
    /// working days and covers a changed day.
    pub fn touches(&self, work_package: &WorkPackage) -> bool {
        if work_package.ignore_non_working_days {
            return false;
        }
        let (Some(begin), Some(end)) = (work_package.begin_date(), work_package.end_date()) else {
            return false;
        };
        let (first, last) = if begin <= end { (begin, end) } else { (end, begin) };

        if self.dates.range(first..=last).next().is_some() {
            return true;
        }
        if self.weekdays.is_empty() {
            return false;
        }
        // a week or more covers every weekday
        if (last - first).num_days() >= 6 {
            return true;
        }
        first
            .iter_days()
            .take_while(|date| *date <= last)
            .any(|date| self.weekdays.contains(&iso_day(date.weekday())))
    }
}

//! Working days configuration
//!
//! Mirrors: app/models/week_day.rb and app/models/non_working_day.rb
//! Tables: week_days, day_overrides

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Working flag of one ISO weekday
///
/// # Ruby equivalent
/// ```ruby
/// class WeekDay < ApplicationRecord
///   validates :day, inclusion: { in: 1..7 }
/// end
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct WeekDay {
    /// ISO day number, 1 = Monday .. 7 = Sunday
    #[validate(range(min = 1, max = 7))]
    pub day: u8,
    pub working: bool,
}

impl WeekDay {
    pub fn new(day: u8, working: bool) -> Self {
        Self { day, working }
    }

    pub fn from_weekday(weekday: Weekday, working: bool) -> Self {
        Self {
            day: weekday.number_from_monday() as u8,
            working,
        }
    }

    /// The chrono weekday, `None` when `day` is out of range
    pub fn weekday(&self) -> Option<Weekday> {
        match self.day {
            1 => Some(Weekday::Mon),
            2 => Some(Weekday::Tue),
            3 => Some(Weekday::Wed),
            4 => Some(Weekday::Thu),
            5 => Some(Weekday::Fri),
            6 => Some(Weekday::Sat),
            7 => Some(Weekday::Sun),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.day {
            1 => "Monday",
            2 => "Tuesday",
            3 => "Wednesday",
            4 => "Thursday",
            5 => "Friday",
            6 => "Saturday",
            7 => "Sunday",
            _ => "Unknown",
        }
    }
}

/// A specific date whose working flag differs from its weekday's
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayOverride {
    pub date: NaiveDate,
    pub working: bool,
    pub name: Option<String>,
}

impl DayOverride {
    pub fn non_working(date: NaiveDate, name: impl Into<String>) -> Self {
        Self {
            date,
            working: false,
            name: Some(name.into()),
        }
    }

    pub fn working(date: NaiveDate) -> Self {
        Self {
            date,
            working: true,
            name: None,
        }
    }
}

//! Working days repository
//!
//! Mirrors: app/models/week_day.rb and app/models/non_working_day.rb

use async_trait::async_trait;
use chrono::NaiveDate;
use op_core::OpResult;
use op_models::{DayOverride, WeekDay};
use op_work_packages::{Calendar, CalendarSource};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::repository::{RepositoryError, RepositoryResult};

#[derive(Debug, Clone, FromRow)]
pub struct WeekDayRow {
    pub day: i32,
    pub working: bool,
}

impl TryFrom<WeekDayRow> for WeekDay {
    type Error = RepositoryError;

    fn try_from(row: WeekDayRow) -> Result<Self, Self::Error> {
        let invalid = || RepositoryError::InvalidRow(format!("invalid week day {}", row.day));
        let week_day = WeekDay::new(u8::try_from(row.day).map_err(|_| invalid())?, row.working);
        week_day.validate().map_err(|_| invalid())?;
        Ok(week_day)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DayOverrideRow {
    pub date: NaiveDate,
    pub working: bool,
    pub name: Option<String>,
}

impl From<DayOverrideRow> for DayOverride {
    fn from(row: DayOverrideRow) -> Self {
        DayOverride {
            date: row.date,
            working: row.working,
            name: row.name,
        }
    }
}

/// Reads the working days calendar
#[derive(Clone)]
pub struct CalendarRepository {
    pool: PgPool,
}

impl CalendarRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn week_days(&self) -> RepositoryResult<Vec<WeekDay>> {
        let rows = sqlx::query_as::<_, WeekDayRow>("SELECT day, working FROM week_days ORDER BY day")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(WeekDay::try_from).collect()
    }

    pub async fn day_overrides(&self) -> RepositoryResult<Vec<DayOverride>> {
        let rows = sqlx::query_as::<_, DayOverrideRow>(
            "SELECT date, working, name FROM day_overrides ORDER BY date",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DayOverride::from).collect())
    }

    /// The stored calendar; an empty `week_days` table means Monday to Friday
    pub async fn load(&self) -> RepositoryResult<Calendar> {
        let week_days = self.week_days().await?;
        let overrides = self.day_overrides().await?;

        tracing::debug!(
            week_days = week_days.len(),
            overrides = overrides.len(),
            "Loaded working days calendar"
        );

        Ok(Calendar::from_models(&week_days, &overrides))
    }
}

#[async_trait]
impl CalendarSource for CalendarRepository {
    async fn load_calendar(&self) -> OpResult<Calendar> {
        Ok(self.load().await?)
    }
}

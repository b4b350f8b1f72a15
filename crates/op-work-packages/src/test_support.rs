//! Schedule charts for tests
//!
//! ```text
//! days        | MTWTFSS |
//! predecessor |  XX     | working days work week
//! follower    |    XXX  | working days include weekends, follows predecessor
//! ```
//!
//! The header names the weekdays; the first upper case `M` is Monday
//! 2022-06-20. `X` marks a day covered by the work package, `.` a skipped
//! non-working day, `[` a start date without due date and `]` a due date
//! without start date.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use op_core::Id;
use op_models::{Relation, WorkPackage};

use crate::calendar::Calendar;
use crate::days::Days;
use crate::store::MemoryStore;

pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 6, 20).unwrap()
}

/// Monday 2022-06-20 shifted by `offset` days
pub fn day(offset: i64) -> NaiveDate {
    monday() + chrono::Duration::days(offset)
}

struct Row {
    name: String,
    start_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    properties: Vec<String>,
}

fn parse_rows(chart: &str) -> Vec<Row> {
    let mut lines = chart.lines().map(str::trim).filter(|line| !line.is_empty());
    let header = lines.next().expect("chart needs a header");
    let header_cells = cells(header);
    let anchor = header_cells
        .find('M')
        .expect("chart header needs an upper case M for Monday") as i64;

    lines
        .map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            let name = parts[0].trim().to_string();
            let mut start_date = None;
            let mut due_date = None;
            for (column, symbol) in cells(line).chars().enumerate() {
                let date = day(column as i64 - anchor);
                match symbol {
                    'X' => {
                        start_date = start_date.or(Some(date));
                        due_date = Some(date);
                    }
                    '[' => start_date = Some(date),
                    ']' => due_date = Some(date),
                    _ => {}
                }
            }
            let properties = parts
                .get(2)
                .map(|props| {
                    props
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Row {
                name,
                start_date,
                due_date,
                properties,
            }
        })
        .collect()
}

fn cells(line: &str) -> &str {
    let cells = line.split('|').nth(1).expect("chart line needs a cells column");
    cells.strip_prefix(' ').unwrap_or(cells)
}

pub struct ScheduleChart {
    pub work_packages: Vec<WorkPackage>,
    pub relations: Vec<Relation>,
    ids: BTreeMap<String, Id>,
}

impl ScheduleChart {
    /// Build work packages from a chart, deriving durations with `calendar`.
    ///
    /// Ids follow the row order starting at 1.
    pub fn parse(chart: &str, calendar: &Calendar) -> Self {
        let rows = parse_rows(chart);
        let ids: BTreeMap<String, Id> = rows
            .iter()
            .enumerate()
            .map(|(ix, row)| (row.name.clone(), ix as Id + 1))
            .collect();
        let id_of = |name: &str| *ids.get(name).unwrap_or_else(|| panic!("unknown work package {}", name));

        let mut work_packages = Vec::new();
        let mut relations = Vec::new();
        for row in &rows {
            let mut wp = WorkPackage::new(id_of(&row.name), row.name.clone());
            wp.start_date = row.start_date;
            wp.due_date = row.due_date;

            for property in &row.properties {
                if property == "working days include weekends" {
                    wp.ignore_non_working_days = true;
                } else if property == "working days work week" {
                    wp.ignore_non_working_days = false;
                } else if property == "manually scheduled" {
                    wp.schedule_manually = true;
                } else if let Some(rest) = property.strip_prefix("follows ") {
                    let (predecessor, lag) = match rest.split_once(" with lag ") {
                        Some((name, lag)) => (name, lag.parse().unwrap()),
                        None => (rest, 0),
                    };
                    relations.push(
                        Relation::new(1000 + relations.len() as Id, id_of(predecessor), wp.id).with_lag(lag),
                    );
                } else if let Some(parent) = property.strip_prefix("child of ") {
                    wp.parent_id = Some(id_of(parent));
                } else if let Some(duration) = property
                    .strip_prefix("duration ")
                    .and_then(|d| d.strip_suffix(" days").or_else(|| d.strip_suffix(" day")))
                {
                    wp.duration = Some(duration.parse().unwrap());
                } else {
                    panic!("unknown chart property '{}'", property);
                }
            }

            if wp.duration.is_none() {
                if let (Some(start), Some(due)) = (wp.start_date, wp.due_date) {
                    wp.duration = Some(Days::for_work_package(calendar, &wp).duration_between(start, due));
                }
            }
            work_packages.push(wp);
        }

        Self {
            work_packages,
            relations,
            ids,
        }
    }

    pub fn id(&self, name: &str) -> Id {
        *self
            .ids
            .get(name)
            .unwrap_or_else(|| panic!("unknown work package {}", name))
    }

    pub fn store(&self) -> MemoryStore {
        MemoryStore::with_data(self.work_packages.clone(), self.relations.clone())
    }

    /// Assert that `actual` matches the dates drawn in `chart`
    pub fn assert_schedule(&self, actual: &[WorkPackage], chart: &str) {
        for row in parse_rows(chart) {
            let id = self.id(&row.name);
            let wp = actual
                .iter()
                .find(|wp| wp.id == id)
                .unwrap_or_else(|| panic!("work package {} is missing", row.name));
            assert_eq!(
                (wp.start_date, wp.due_date),
                (row.start_date, row.due_date),
                "dates of {} (start, due)",
                row.name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_parsing() {
        let chart = ScheduleChart::parse(
            r#"
            days         | fssMTWTFSS |
            main         | X..XX      |
            start only   |       [    | manually scheduled
            due only     |        ]   | follows main with lag 2
            no dates     |            | duration 3 days, child of main
            "#,
            &Calendar::default(),
        );

        let main = &chart.work_packages[0];
        assert_eq!((main.start_date, main.due_date), (Some(day(-3)), Some(day(1))));
        assert_eq!(main.duration, Some(3));

        let start_only = &chart.work_packages[1];
        assert_eq!((start_only.start_date, start_only.due_date), (Some(day(3)), None));
        assert!(start_only.schedule_manually);

        assert_eq!(chart.work_packages[2].due_date, Some(day(4)));
        assert_eq!(chart.relations, vec![Relation::new(1000, 1, 3).with_lag(2)]);

        let no_dates = &chart.work_packages[3];
        assert_eq!(no_dates.duration, Some(3));
        assert_eq!(no_dates.parent_id, Some(chart.id("main")));
    }
}

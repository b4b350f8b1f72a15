//! Subcommand execution

use std::sync::Arc;

use anyhow::Context;
use op_core::config::AppConfig;
use op_db::{CalendarRepository, Database, PgSchedulingStore};
use op_work_packages::{Calendar, CalendarChange, JobRegistry, PassReport, SchedulingService, SchedulingStore};

use crate::{CalendarSource, Cli, Command};

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let db = Database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    tracing::debug!(pool = ?db.stats(), "Connected to database");

    let calendar = match cli.calendar {
        CalendarSource::Database => CalendarRepository::new(db.pool().clone())
            .load()
            .await
            .context("Failed to load working days")?,
        CalendarSource::Config => Calendar::from_config(&config.scheduling),
    };

    let store = Arc::new(PgSchedulingStore::new(db.pool().clone()));
    let mut service = SchedulingService::with_config(store, calendar, &config.scheduling);
    if cli.calendar == CalendarSource::Database {
        service = service.with_calendar_source(Arc::new(CalendarRepository::new(db.pool().clone())));
    }
    let service = Arc::new(service);

    let result = execute(cli.command, service).await;
    db.close().await;
    result
}

async fn execute(command: Command, service: Arc<SchedulingService<PgSchedulingStore>>) -> anyhow::Result<()> {
    match command {
        Command::ApplyWorkingDaysChange { weekdays, dates } => {
            let change = CalendarChange {
                weekdays: weekdays.into_iter().collect(),
                dates: dates.into_iter().collect(),
            };
            if change.is_empty() {
                anyhow::bail!("Pass at least one --weekday or --date");
            }
            let report = service.on_calendar_change(&change).await?;
            summarize(report)
        }
        Command::UpdateAncestors {
            work_package_id,
            former_parent_id,
            parent_id,
            no_parent,
        } => {
            let parent_id = resolve_parent(service.store().as_ref(), work_package_id, parent_id, no_parent).await?;
            let report = service
                .on_hierarchy_change(work_package_id, former_parent_id, parent_id)
                .await?;
            summarize(report)
        }
        Command::RunJob { name, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("Job arguments are not valid JSON")?;
            JobRegistry::for_service(service).dispatch(&name, args).await?;
            println!("{} finished", name);
            Ok(())
        }
    }
}

/// The parent to schedule against: the flag if given, otherwise the
/// parent currently stored for the work package.
async fn resolve_parent<S: SchedulingStore + ?Sized>(
    store: &S,
    work_package_id: i64,
    parent_id: Option<i64>,
    no_parent: bool,
) -> anyhow::Result<Option<i64>> {
    if parent_id.is_some() || no_parent {
        return Ok(parent_id);
    }
    let work_package = store
        .load(work_package_id)
        .await
        .with_context(|| format!("Failed to load work package {}", work_package_id))?;
    Ok(work_package.parent_id)
}

fn summarize(report: PassReport) -> anyhow::Result<()> {
    for (id, lock_version) in &report.updated {
        println!("#{} rescheduled (lock version {})", id, lock_version);
    }
    println!("{} work package(s) rescheduled", report.updated.len());

    report.into_result()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use op_models::WorkPackage;
    use op_work_packages::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::with_data(
            vec![WorkPackage::new(1, "parent"), WorkPackage::new(2, "child").with_parent(1)],
            vec![],
        )
    }

    #[tokio::test]
    async fn test_stored_parent_is_used_without_flags() {
        assert_eq!(resolve_parent(&store(), 2, None, false).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_flags_override_the_stored_parent() {
        assert_eq!(resolve_parent(&store(), 2, Some(5), false).await.unwrap(), Some(5));
        assert_eq!(resolve_parent(&store(), 2, None, true).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_work_package_fails() {
        assert!(resolve_parent(&store(), 99, None, false).await.is_err());
    }
}

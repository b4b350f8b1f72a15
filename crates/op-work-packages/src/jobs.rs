//! Scheduling jobs
//!
//! Mirrors: app/workers/work_packages/apply_working_days_change_job.rb and
//! app/workers/work_packages/update_ancestors_job.rb
//!
//! Job arguments arrive as JSON from whatever queue triggers them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use op_core::Id;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::CalendarChange;
use crate::error::SchedulingError;
use crate::orchestrator::SchedulingService;
use crate::store::SchedulingStore;

/// Job errors
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Unknown job type: {0}")]
    UnknownJob(String),
    #[error("Invalid job arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

pub type JobResult<T> = Result<T, JobError>;

/// Handler for a specific job type
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, args: serde_json::Value) -> JobResult<()>;
}

fn parse_args<T: serde::de::DeserializeOwned>(args: serde_json::Value) -> JobResult<T> {
    serde_json::from_value(args).map_err(|e| JobError::InvalidArguments(e.to_string()))
}

/// Reschedules after the working days changed; arguments are a
/// serialized [`CalendarChange`].
pub struct ApplyWorkingDaysChangeJob<S: SchedulingStore + ?Sized> {
    service: Arc<SchedulingService<S>>,
}

impl<S: SchedulingStore + ?Sized> ApplyWorkingDaysChangeJob<S> {
    pub const NAME: &'static str = "WorkPackages::ApplyWorkingDaysChangeJob";

    pub fn new(service: Arc<SchedulingService<S>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S: SchedulingStore + ?Sized + 'static> JobHandler for ApplyWorkingDaysChangeJob<S> {
    async fn handle(&self, args: serde_json::Value) -> JobResult<()> {
        let change: CalendarChange = parse_args(args)?;
        let report = self.service.on_calendar_change(&change).await?.into_result()?;
        tracing::info!(
            updated = report.updated.len(),
            "Applied working days change"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAncestorsArgs {
    pub work_package_id: Id,
    #[serde(default)]
    pub former_parent_id: Option<Id>,
    #[serde(default)]
    pub parent_id: Option<Id>,
}

/// Reschedules the ancestors of a work package after a parent change
pub struct UpdateAncestorsJob<S: SchedulingStore + ?Sized> {
    service: Arc<SchedulingService<S>>,
}

impl<S: SchedulingStore + ?Sized> UpdateAncestorsJob<S> {
    pub const NAME: &'static str = "WorkPackages::UpdateAncestorsJob";

    pub fn new(service: Arc<SchedulingService<S>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S: SchedulingStore + ?Sized + 'static> JobHandler for UpdateAncestorsJob<S> {
    async fn handle(&self, args: serde_json::Value) -> JobResult<()> {
        let args: UpdateAncestorsArgs = parse_args(args)?;
        let report = self
            .service
            .on_hierarchy_change(args.work_package_id, args.former_parent_id, args.parent_id)
            .await?
            .into_result()?;
        tracing::info!(
            work_package_id = args.work_package_id,
            updated = report.updated.len(),
            "Updated ancestors"
        );
        Ok(())
    }
}

/// Dispatches jobs to their handler by job type
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<String, Box<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both scheduling jobs, backed by `service`
    pub fn for_service<S: SchedulingStore + ?Sized + 'static>(service: Arc<SchedulingService<S>>) -> Self {
        let mut registry = Self::new();
        registry.register(
            ApplyWorkingDaysChangeJob::<S>::NAME,
            ApplyWorkingDaysChangeJob::new(service.clone()),
        );
        registry.register(UpdateAncestorsJob::<S>::NAME, UpdateAncestorsJob::new(service));
        registry
    }

    /// Register a handler for a job type
    pub fn register<H: JobHandler + 'static>(&mut self, job_type: impl Into<String>, handler: H) {
        self.handlers.insert(job_type.into(), Box::new(handler));
    }

    pub async fn dispatch(&self, job_type: &str, args: serde_json::Value) -> JobResult<()> {
        let handler = self
            .handlers
            .get(job_type)
            .ok_or_else(|| JobError::UnknownJob(job_type.to_string()))?;

        let result = handler.handle(args).await;
        if let Err(e) = &result {
            tracing::error!(job_type, "Job failed: {}", e);
        }
        result
    }
}

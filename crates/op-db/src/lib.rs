//! # op-db
//!
//! PostgreSQL persistence for OpenProject RS scheduling.
//!
//! This crate provides database access using SQLx:
//!
//! - Connection pool management
//! - Work package and relation repositories for the scheduling columns
//! - The working days calendar (`week_days`, `day_overrides`)
//! - [`PgSchedulingStore`], the store the scheduling engine runs against
//!
//! ## Example
//!
//! ```ignore
//! use op_core::config::AppConfig;
//! use op_db::{CalendarRepository, Database, PgSchedulingStore};
//!
//! let config = AppConfig::from_env()?;
//! let db = Database::connect(&config.database).await?;
//!
//! let calendar = CalendarRepository::new(db.pool().clone()).load().await?;
//! let store = PgSchedulingStore::new(db.pool().clone());
//! ```

pub mod pool;
pub mod relations;
pub mod repository;
pub mod scheduling_store;
pub mod week_days;
pub mod work_packages;

// Re-exports
pub use pool::{Database, PoolStats};
pub use relations::{RelationRepository, RelationRow};
pub use repository::{RepositoryError, RepositoryResult};
pub use scheduling_store::PgSchedulingStore;
pub use week_days::{CalendarRepository, DayOverrideRow, WeekDayRow};
pub use work_packages::{WorkPackageRepository, WorkPackageRow};

//! Relations repository
//!
//! Only `precedes` and `follows` take part in scheduling. Both are read
//! and normalized into predecessor/follower edges.
//!
//! Mirrors: app/models/relation.rb

use op_core::traits::Id;
use op_models::{Relation, RelationType, MAX_LAG, MIN_LAG};
use sqlx::{FromRow, PgPool};

use crate::repository::RepositoryResult;

/// Relation row from database
#[derive(Debug, Clone, FromRow)]
pub struct RelationRow {
    pub id: i64,
    pub from_id: i64,
    pub to_id: i64,
    pub relation_type: String,
    pub lag: Option<i32>,
}

impl RelationRow {
    /// The scheduling edge of this row, `None` for other relation types.
    ///
    /// A missing lag counts as zero; stored lags outside the accepted range
    /// are clamped into it. Self references are dropped.
    pub fn into_relation(self) -> Option<Relation> {
        let relation_type = RelationType::parse(&self.relation_type)?;
        let lag = self.lag.unwrap_or(0).clamp(MIN_LAG, MAX_LAG);
        let relation = Relation::from_typed(self.id, self.from_id, self.to_id, relation_type, lag);

        if let Err(errors) = relation.validate() {
            tracing::warn!(relation_id = relation.id, "Skipping invalid relation: {}", errors);
            return None;
        }
        Some(relation)
    }
}

/// Relation repository implementation
#[derive(Clone)]
pub struct RelationRepository {
    pool: PgPool,
}

impl RelationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Scheduling relations touching `work_package_id` on either side
    pub async fn find_scheduling_relations(&self, work_package_id: Id) -> RepositoryResult<Vec<Relation>> {
        let rows = sqlx::query_as::<_, RelationRow>(
            r#"
            SELECT id, from_id, to_id, relation_type, lag
            FROM relations
            WHERE (from_id = $1 OR to_id = $1)
              AND relation_type IN ('precedes', 'follows')
            ORDER BY id
            "#,
        )
        .bind(work_package_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(RelationRow::into_relation).collect())
    }
}

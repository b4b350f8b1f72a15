//! Scheduling relations between work packages
//!
//! Mirrors: app/models/relation.rb (follows/precedes only)

use op_core::traits::Id;
use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors};

/// Maximum lag value
pub const MAX_LAG: i32 = 2000;
/// Minimum lag value
pub const MIN_LAG: i32 = -2000;

/// Relation types that take part in scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// `from` precedes `to`
    Precedes,
    /// `from` follows `to`
    Follows,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Precedes => "precedes",
            RelationType::Follows => "follows",
        }
    }

    /// Parse a stored relation type; non-scheduling types yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "precedes" => Some(RelationType::Precedes),
            "follows" => Some(RelationType::Follows),
            _ => None,
        }
    }
}

/// A directed scheduling edge: the follower starts after the predecessor ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: Id,
    pub predecessor_id: Id,
    pub follower_id: Id,
    /// Working days to leave between the predecessor's end and the follower's start
    #[serde(default)]
    pub lag: i32,
}

impl Relation {
    pub fn new(id: Id, predecessor_id: Id, follower_id: Id) -> Self {
        Self {
            id,
            predecessor_id,
            follower_id,
            lag: 0,
        }
    }

    /// Build the canonical edge from a stored `from`/`to` pair
    pub fn from_typed(id: Id, from_id: Id, to_id: Id, relation_type: RelationType, lag: i32) -> Self {
        let (predecessor_id, follower_id) = match relation_type {
            RelationType::Precedes => (from_id, to_id),
            RelationType::Follows => (to_id, from_id),
        };
        Self {
            id,
            predecessor_id,
            follower_id,
            lag,
        }
    }

    pub fn with_lag(mut self, lag: i32) -> Self {
        self.lag = lag;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !(MIN_LAG..=MAX_LAG).contains(&self.lag) {
            errors.add("lag", ValidationError::new("range"));
        }
        if self.is_self_referencing() {
            errors.add("follower_id", ValidationError::new("self_reference"));
        }
        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Whether the relation links the work package to itself
    pub fn is_self_referencing(&self) -> bool {
        self.predecessor_id == self.follower_id
    }
}

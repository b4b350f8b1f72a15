//! Work Package model and related types
//!
//! Mirrors: app/models/work_package.rb and app/models/relation.rb
//!
//! Only the attributes that take part in scheduling are modelled here:
//! dates, duration, hierarchy and follows/precedes relations.

pub mod model;
pub mod relations;

pub use model::*;

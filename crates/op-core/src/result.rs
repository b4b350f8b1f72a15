//! Result type aliases

use crate::error::OpError;

/// Standard Result type for OpenProject operations
pub type OpResult<T> = Result<T, OpError>;

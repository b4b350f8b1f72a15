//! Core traits that mirror OpenProject's Ruby patterns

/// Primary key type (mirrors Rails' ID)
pub type Id = i64;

/// Trait for lockable entities (optimistic locking)
pub trait Lockable {
    fn lock_version(&self) -> i32;

    /// The version a store must currently hold for a write carrying
    /// `lock_version()` to be accepted.
    fn expected_stored_version(&self) -> i32 {
        self.lock_version() - 1
    }
}

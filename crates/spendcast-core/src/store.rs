//! Repository abstraction over expense persistence
//!
//! Handlers and the forecast planner talk to this trait rather than to SQL.
//! `Database` is the SQLite implementation.

use crate::error::Result;
use crate::models::{Expense, ExpenseUpdate, NewExpense};

/// Owner-scoped expense storage
///
/// Every operation takes the owner explicitly. An expense that exists but
/// belongs to someone else is reported as `Error::NotFound`, exactly like a
/// missing one.
pub trait ExpenseStore {
    /// All expenses of `owner`, oldest first
    fn list_expenses(&self, owner: &str) -> Result<Vec<Expense>>;

    /// Validate and store a new expense
    fn create_expense(&self, owner: &str, new: &NewExpense) -> Result<Expense>;

    /// Apply a partial update and return the updated expense
    fn update_expense(&self, owner: &str, id: i64, changes: &ExpenseUpdate) -> Result<Expense>;

    fn delete_expense(&self, owner: &str, id: i64) -> Result<()>;
}

//! Expense and category operations

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::expense_filter::ExpenseFilter;
use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Category, Expense, ExpenseField, ExpenseUpdate, NewExpense};
use crate::series::check_date;
use crate::store::ExpenseStore;

const EXPENSE_COLUMNS: &str =
    "e.id, e.owner, e.date, e.amount, c.name, e.description, e.created_at";

fn row_to_expense(row: &Row) -> rusqlite::Result<Expense> {
    let date_str: String = row.get(2)?;
    let created_at_str: String = row.get(6)?;
    Ok(Expense {
        id: row.get(0)?,
        owner: row.get(1)?,
        date: chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        amount: row.get(3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        created_at: parse_datetime(&created_at_str),
    })
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidData(
            "Amount must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Trim a description, mapping blank text to `None`
fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

impl Database {
    // ========== Categories ==========

    /// List all categories, alphabetically
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Look up a category by exact name
    pub fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name FROM categories WHERE name = ?",
                params![name],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    fn require_category(&self, name: &str) -> Result<Category> {
        self.get_category_by_name(name)?
            .ok_or_else(|| Error::InvalidData(format!("Category '{}' not found", name)))
    }

    // ========== Expenses ==========

    /// Insert a new expense for `owner` and return its ID
    pub fn insert_expense(&self, owner: &str, new: &NewExpense) -> Result<i64> {
        validate_amount(new.amount)?;
        check_date(new.date)?;
        let category = self.require_category(&new.category)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO expenses (owner, date, amount, category_id, description)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                owner,
                new.date.to_string(),
                new.amount,
                category.id,
                normalize_description(new.description.as_deref()),
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(id, owner, amount = new.amount, category = %category.name, "Inserted expense");
        Ok(id)
    }

    /// Get a single expense owned by `owner`
    pub fn get_expense(&self, owner: &str, id: i64) -> Result<Option<Expense>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM expenses e JOIN categories c ON e.category_id = c.id \
             WHERE e.id = ? AND e.owner = ?",
            EXPENSE_COLUMNS
        );
        let expense = conn
            .query_row(&sql, params![id, owner], row_to_expense)
            .optional()?;
        Ok(expense)
    }

    fn require_expense(&self, owner: &str, id: i64) -> Result<Expense> {
        self.get_expense(owner, id)?
            .ok_or_else(|| Error::NotFound(format!("Expense {}", id)))
    }

    /// List expenses matching a filter, newest first
    pub fn list_expenses_filtered(
        &self,
        filter: ExpenseFilter<'_>,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<Expense>> {
        let conn = self.conn()?;
        let filter = filter.build();

        let sql = format!(
            "SELECT {} FROM expenses e JOIN categories c ON e.category_id = c.id {} {} LIMIT ? OFFSET ?",
            EXPENSE_COLUMNS, filter.where_clause, filter.order_clause
        );

        let mut params = filter.into_params();
        // SQLite treats a negative LIMIT as unbounded
        params.push(Box::new(limit.unwrap_or(-1)));
        params.push(Box::new(offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let expenses = stmt
            .query_map(param_refs.as_slice(), row_to_expense)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(expenses)
    }

    /// Count expenses matching a filter
    pub fn count_expenses_filtered(&self, filter: ExpenseFilter<'_>) -> Result<i64> {
        let conn = self.conn()?;
        let filter = filter.build();
        let count = conn.query_row(
            &filter.build_count_query(),
            filter.params_refs().as_slice(),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Apply a partial update, validating date, amount and category
    ///
    /// Returns the updated expense and the fields that were part of the update.
    /// Nothing is written if any field fails validation.
    pub fn edit_expense(
        &self,
        owner: &str,
        id: i64,
        changes: &ExpenseUpdate,
    ) -> Result<(Expense, Vec<ExpenseField>)> {
        let current = self.require_expense(owner, id)?;

        if changes.is_empty() {
            return Err(Error::InvalidData("No changes were made".to_string()));
        }

        let mut updated = Vec::new();

        let date = match changes.date {
            Some(date) => {
                check_date(date)?;
                updated.push(ExpenseField::Date);
                date
            }
            None => current.date,
        };

        let category = match &changes.category {
            Some(name) => {
                updated.push(ExpenseField::Category);
                self.require_category(name)?.name
            }
            None => current.category.clone(),
        };

        let amount = match changes.amount {
            Some(amount) => {
                validate_amount(amount)?;
                updated.push(ExpenseField::Amount);
                amount
            }
            None => current.amount,
        };

        let description = match &changes.description {
            Some(text) => {
                updated.push(ExpenseField::Description);
                normalize_description(Some(text))
            }
            None => current.description.clone(),
        };

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE expenses
            SET date = ?, amount = ?, description = ?,
                category_id = (SELECT id FROM categories WHERE name = ?)
            WHERE id = ? AND owner = ?
            "#,
            params![date.to_string(), amount, description, category, id, owner],
        )?;
        drop(conn);

        let fields: Vec<&str> = updated.iter().map(|f| f.as_str()).collect();
        debug!(id, owner, fields = %fields.join(","), "Updated expense");

        Ok((self.require_expense(owner, id)?, updated))
    }

    /// Delete an expense owned by `owner`
    pub fn remove_expense(&self, owner: &str, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM expenses WHERE id = ? AND owner = ?",
            params![id, owner],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Expense {}", id)));
        }
        Ok(())
    }

    /// Delete several expenses owned by `owner`
    ///
    /// IDs that don't exist or belong to another user are skipped.
    /// Returns the number of rows deleted.
    pub fn bulk_delete_expenses(&self, owner: &str, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM expenses WHERE id = ? AND owner = ?")?;
            for id in ids {
                deleted += stmt.execute(params![id, owner])?;
            }
        }
        tx.commit()?;

        debug!(owner, requested = ids.len(), deleted, "Bulk deleted expenses");
        Ok(deleted)
    }
}

impl ExpenseStore for Database {
    fn list_expenses(&self, owner: &str) -> Result<Vec<Expense>> {
        let mut expenses = self.list_expenses_filtered(ExpenseFilter::new(owner), None, 0)?;
        expenses.reverse();
        Ok(expenses)
    }

    fn create_expense(&self, owner: &str, new: &NewExpense) -> Result<Expense> {
        let id = self.insert_expense(owner, new)?;
        self.require_expense(owner, id)
    }

    fn update_expense(&self, owner: &str, id: i64, changes: &ExpenseUpdate) -> Result<Expense> {
        self.edit_expense(owner, id, changes).map(|(expense, _)| expense)
    }

    fn delete_expense(&self, owner: &str, id: i64) -> Result<()> {
        self.remove_expense(owner, id)
    }
}

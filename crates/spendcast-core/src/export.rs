//! CSV export of expenses
//!
//! Columns: `Date,Category,Amount,Description`. Rows follow the filter's
//! ordering (newest first).

use std::io::Write;

use crate::db::{Database, ExpenseFilter};
use crate::error::Result;
use crate::models::Expense;

pub const CSV_HEADER: [&str; 4] = ["Date", "Category", "Amount", "Description"];

/// Write expenses as CSV to any writer
pub fn write_expenses_csv<W: Write>(expenses: &[Expense], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for expense in expenses {
        wtr.write_record([
            expense.date.format("%Y-%m-%d").to_string(),
            expense.category.clone(),
            format!("{:.2}", expense.amount),
            expense.description.clone().unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

impl Database {
    /// Export every expense matching `filter` as a CSV string
    pub fn export_expenses_csv(&self, filter: ExpenseFilter<'_>) -> Result<String> {
        let expenses = self.list_expenses_filtered(filter, None, 0)?;
        let mut buffer = Vec::new();
        write_expenses_csv(&expenses, &mut buffer)?;
        // csv only ever writes the UTF-8 we hand it
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewExpense;
    use chrono::NaiveDate;

    fn add(db: &Database, owner: &str, date: &str, amount: f64, category: &str, desc: Option<&str>) {
        db.insert_expense(
            owner,
            &NewExpense {
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                amount,
                category: category.to_string(),
                description: desc.map(str::to_string),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_export_header_and_rows() {
        let db = Database::in_memory().unwrap();
        add(&db, "alice", "2024-01-05", 12.5, "Groceries", Some("weekly shop"));
        add(&db, "alice", "2024-02-01", 800.0, "Rent", None);

        let csv = db.export_expenses_csv(ExpenseFilter::new("alice")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Date,Category,Amount,Description");
        assert_eq!(lines[1], "2024-02-01,Rent,800.00,");
        assert_eq!(lines[2], "2024-01-05,Groceries,12.50,weekly shop");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_export_quotes_commas() {
        let db = Database::in_memory().unwrap();
        add(&db, "alice", "2024-01-05", 3.0, "Groceries", Some("milk, eggs"));

        let csv = db.export_expenses_csv(ExpenseFilter::new("alice")).unwrap();
        assert!(csv.contains("\"milk, eggs\""));
    }

    #[test]
    fn test_export_is_owner_scoped_and_filtered() {
        let db = Database::in_memory().unwrap();
        add(&db, "alice", "2024-01-05", 3.0, "Groceries", None);
        add(&db, "alice", "2024-03-05", 4.0, "Groceries", None);
        add(&db, "bob", "2024-01-06", 9.0, "Groceries", None);

        let range = Some((
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        ));
        let csv = db
            .export_expenses_csv(ExpenseFilter::new("alice").date_range(range))
            .unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("2024-01-05"));
        assert!(!csv.contains("9.00"));
    }

    #[test]
    fn test_export_empty_has_header_only() {
        let db = Database::in_memory().unwrap();
        let csv = db.export_expenses_csv(ExpenseFilter::new("nobody")).unwrap();
        assert_eq!(csv.trim_end(), "Date,Category,Amount,Description");
    }
}

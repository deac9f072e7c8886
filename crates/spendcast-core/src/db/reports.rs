//! Spending statistics for the dashboard and yearly reports

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::params;

use super::Database;
use crate::error::Result;
use crate::models::*;

impl Database {
    /// Yearly total, per-expense average and the highest/lowest spending months
    ///
    /// Only months with at least one expense take part in the max/min search.
    pub fn get_yearly_stats(&self, owner: &str, year: i32) -> Result<YearlyStats> {
        let conn = self.conn()?;
        let year_str = year.to_string();

        let (total_amount, average_amount): (f64, f64) = conn.query_row(
            r#"
            SELECT COALESCE(SUM(amount), 0), COALESCE(AVG(amount), 0)
            FROM expenses
            WHERE owner = ? AND strftime('%Y', date) = ?
            "#,
            params![owner, year_str],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
            r#"
            SELECT CAST(strftime('%m', date) AS INTEGER) AS month, SUM(amount) AS total
            FROM expenses
            WHERE owner = ? AND strftime('%Y', date) = ?
            GROUP BY month
            ORDER BY total DESC, month ASC
            "#,
        )?;
        let monthly: Vec<(u32, f64)> = stmt
            .query_map(params![owner, year_str], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let max = monthly.first().copied();
        let min = monthly.last().copied();

        Ok(YearlyStats {
            year,
            total_amount,
            average_amount,
            max_month: max.map(|(m, _)| m),
            max_amount: max.map(|(_, a)| a),
            min_month: min.map(|(m, _)| m),
            min_amount: min.map(|(_, a)| a),
        })
    }

    /// Per-category spending for a year, largest first
    pub fn get_category_breakdown(&self, owner: &str, year: i32) -> Result<Vec<CategoryBreakdown>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.name, SUM(e.amount) AS total, COUNT(*), AVG(e.amount)
            FROM expenses e
            JOIN categories c ON e.category_id = c.id
            WHERE e.owner = ? AND strftime('%Y', e.date) = ?
            GROUP BY c.id
            ORDER BY total DESC, c.name ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![owner, year.to_string()], |row| {
                Ok(CategoryBreakdown {
                    category: row.get(0)?,
                    amount: row.get(1)?,
                    transaction_count: row.get(2)?,
                    average: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Spending per (month, category) for a year, ordered by month then category
    pub fn get_monthly_category_totals(
        &self,
        owner: &str,
        year: i32,
    ) -> Result<Vec<MonthlyCategoryTotal>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT CAST(strftime('%m', e.date) AS INTEGER) AS month, c.name, SUM(e.amount)
            FROM expenses e
            JOIN categories c ON e.category_id = c.id
            WHERE e.owner = ? AND strftime('%Y', e.date) = ?
            GROUP BY month, c.id
            ORDER BY month ASC, c.name ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![owner, year.to_string()], |row| {
                Ok(MonthlyCategoryTotal {
                    month: row.get(0)?,
                    category: row.get(1)?,
                    amount: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Dashboard numbers relative to `today`
    pub fn get_dashboard_stats(&self, owner: &str, today: NaiveDate) -> Result<DashboardStats> {
        let conn = self.conn()?;

        let total_expenses: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM expenses WHERE owner = ?",
            params![owner],
            |row| row.get(0),
        )?;

        let this_month: f64 = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM expenses WHERE owner = ? AND strftime('%Y-%m', date) = ?",
            params![owner, format!("{:04}-{:02}", today.year(), today.month())],
            |row| row.get(0),
        )?;

        let categories_used: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT category_id) FROM expenses WHERE owner = ?",
            params![owner],
            |row| row.get(0),
        )?;

        let window_start = today - Duration::days(30);
        let average_daily: f64 = conn.query_row(
            r#"
            SELECT COALESCE(AVG(daily_total), 0) FROM (
                SELECT SUM(amount) AS daily_total
                FROM expenses
                WHERE owner = ? AND date >= ?
                GROUP BY date
            )
            "#,
            params![owner, window_start.to_string()],
            |row| row.get(0),
        )?;

        Ok(DashboardStats {
            total_expenses,
            this_month,
            categories_used,
            average_daily,
        })
    }

    /// Count and sum of expenses dated `today`
    pub fn get_today_stats(&self, owner: &str, today: NaiveDate) -> Result<TodayStats> {
        let conn = self.conn()?;
        let (count, amount) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM expenses WHERE owner = ? AND date = ?",
            params![owner, today.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(TodayStats { count, amount })
    }

    /// Years that have at least one expense, most recent first
    pub fn get_available_years(&self, owner: &str) -> Result<Vec<i32>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT CAST(strftime('%Y', date) AS INTEGER) AS year
            FROM expenses
            WHERE owner = ?
            ORDER BY year DESC
            "#,
        )?;
        let years = stmt
            .query_map(params![owner], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i32>, _>>()?;
        Ok(years)
    }
}

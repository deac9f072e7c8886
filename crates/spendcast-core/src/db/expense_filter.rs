//! Expense filter builder for constructing dynamic SQL queries
//!
//! Shared by `list_expenses_filtered`, `count_expenses_filtered` and the CSV
//! export so the WHERE clause is only written once.

use chrono::NaiveDate;

/// Builder for constructing expense query filters
///
/// The owner is mandatory: every expense query is scoped to one user.
pub struct ExpenseFilter<'query> {
    pub owner: &'query str,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub categories: Option<&'query [String]>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub search: Option<&'query str>,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: &'static str,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> ExpenseFilter<'query> {
    /// Create a filter matching every expense of `owner`
    pub fn new(owner: &'query str) -> Self {
        Self {
            owner,
            date_range: None,
            categories: None,
            min_amount: None,
            max_amount: None,
            search: None,
        }
    }

    /// Set inclusive date range filter
    pub fn date_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.date_range = range;
        self
    }

    /// Restrict to the named categories (empty slice means no restriction)
    pub fn categories(mut self, names: Option<&'query [String]>) -> Self {
        self.categories = names;
        self
    }

    /// Set inclusive lower bound on amount
    pub fn min_amount(mut self, amount: Option<f64>) -> Self {
        self.min_amount = amount;
        self
    }

    /// Set inclusive upper bound on amount
    pub fn max_amount(mut self, amount: Option<f64>) -> Self {
        self.max_amount = amount;
        self
    }

    /// Set search query (matches description)
    pub fn search(mut self, query: Option<&'query str>) -> Self {
        self.search = query;
        self
    }

    /// Build the filter components
    pub fn build(self) -> FilterResult {
        let mut conditions = vec!["e.owner = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(self.owner.to_string())];

        if let Some((from_date, to_date)) = self.date_range {
            conditions.push("e.date >= ? AND e.date <= ?".to_string());
            params.push(Box::new(from_date.to_string()));
            params.push(Box::new(to_date.to_string()));
        }

        if let Some(names) = self.categories {
            if !names.is_empty() {
                let placeholders: Vec<&str> = names.iter().map(|_| "?").collect();
                conditions.push(format!("c.name IN ({})", placeholders.join(", ")));
                for name in names {
                    params.push(Box::new(name.clone()));
                }
            }
        }

        if let Some(min) = self.min_amount {
            conditions.push("e.amount >= ?".to_string());
            params.push(Box::new(min));
        }

        if let Some(max) = self.max_amount {
            conditions.push("e.amount <= ?".to_string());
            params.push(Box::new(max));
        }

        if let Some(q) = self.search {
            if !q.trim().is_empty() {
                conditions.push("e.description LIKE ? COLLATE NOCASE".to_string());
                params.push(Box::new(format!("%{}%", q.trim())));
            }
        }

        FilterResult {
            where_clause: format!("WHERE {}", conditions.join(" AND ")),
            order_clause: "ORDER BY e.date DESC, e.id DESC",
            params,
        }
    }
}

impl FilterResult {
    /// Build a COUNT query
    pub fn build_count_query(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM expenses e JOIN categories c ON e.category_id = c.id {}",
            self.where_clause
        )
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }

    /// Take the parameter vector to append pagination params
    pub fn into_params(self) -> Vec<Box<dyn rusqlite::ToSql>> {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_only_filter() {
        let result = ExpenseFilter::new("alice").build();
        assert_eq!(result.where_clause, "WHERE e.owner = ?");
        assert_eq!(result.params.len(), 1);
    }

    #[test]
    fn test_combined_filters() {
        let cats = vec!["Food".to_string(), "Rent".to_string()];
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let result = ExpenseFilter::new("alice")
            .date_range(Some((from, to)))
            .categories(Some(&cats))
            .min_amount(Some(5.0))
            .max_amount(Some(100.0))
            .build();

        assert!(result.where_clause.contains("c.name IN (?, ?)"));
        assert!(result.where_clause.contains("e.amount >= ?"));
        assert!(result.where_clause.contains("e.amount <= ?"));
        // owner + 2 dates + 2 categories + 2 amounts
        assert_eq!(result.params.len(), 7);
    }

    #[test]
    fn test_empty_categories_ignored() {
        let cats: Vec<String> = vec![];
        let result = ExpenseFilter::new("alice").categories(Some(&cats)).build();
        assert!(!result.where_clause.contains("IN"));
    }
}

//! Domain models for Spendcast

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single expense owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    /// Identifier of the user that created this expense
    pub owner: String,
    pub date: NaiveDate,
    /// Always positive; expenses are stored as spend, not signed ledger amounts
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Data for creating a new expense
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub amount: f64,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update of an expense. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpenseUpdate {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ExpenseUpdate {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.description.is_none()
    }
}

/// Which fields an update actually changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseField {
    Date,
    Amount,
    Category,
    Description,
}

impl ExpenseField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Amount => "amount",
            Self::Category => "category",
            Self::Description => "description",
        }
    }
}

/// An expense category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

// ========== Report Models ==========

/// Time-series bucketing granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    /// ISO weeks starting on Monday
    Weekly,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            _ => Err(format!(
                "Unknown granularity: {} (valid: daily, weekly, monthly)",
                s
            )),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Yearly totals with the highest and lowest spending months
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyStats {
    pub year: i32,
    pub total_amount: f64,
    /// Average amount per expense
    pub average_amount: f64,
    pub max_month: Option<u32>,
    pub max_amount: Option<f64>,
    pub min_month: Option<u32>,
    pub min_amount: Option<f64>,
}

/// Spending in a single category over a year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub amount: f64,
    pub transaction_count: i64,
    pub average: f64,
}

/// Spending in one category during one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCategoryTotal {
    pub month: u32,
    pub category: String,
    pub amount: f64,
}

/// Summary numbers for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_expenses: f64,
    pub this_month: f64,
    pub categories_used: i64,
    /// Mean of daily totals over the last 30 days (days with spending only)
    pub average_daily: f64,
}

/// Today's spending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayStats {
    pub count: i64,
    pub amount: f64,
}

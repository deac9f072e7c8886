//! Expense handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::parse_date;
use crate::{AppError, AppState, RequestContext, SuccessResponse, MAX_PAGE_LIMIT};
use spendcast_core::db::ExpenseFilter;
use spendcast_core::models::{Expense, ExpenseField, ExpenseUpdate, NewExpense};
use spendcast_core::ExpenseStore;

/// Query parameters for listing (and exporting) expenses
#[derive(Debug, Deserialize)]
pub struct ExpenseQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// Custom start date (YYYY-MM-DD)
    pub from: Option<String>,
    /// Custom end date (YYYY-MM-DD)
    pub to: Option<String>,
    /// Category names (comma-separated)
    pub categories: Option<String>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Search text (matches the description)
    pub search: Option<String>,
}

fn default_limit() -> i64 {
    50
}

/// Filter values parsed from an `ExpenseQuery`
pub(crate) struct ParsedFilter {
    date_range: Option<(NaiveDate, NaiveDate)>,
    categories: Option<Vec<String>>,
    min_amount: Option<f64>,
    max_amount: Option<f64>,
    search: Option<String>,
}

impl ParsedFilter {
    pub(crate) fn from_query(params: &ExpenseQuery) -> Result<Self, AppError> {
        let from = parse_date(params.from.as_deref(), "from")?;
        let to = parse_date(params.to.as_deref(), "to")?;

        // Open-ended ranges are bounded by the widest dates SQLite will compare
        let date_range = match (from, to) {
            (None, None) => None,
            (from, to) => match (
                from.or(NaiveDate::from_ymd_opt(1, 1, 1)),
                to.or(NaiveDate::from_ymd_opt(9999, 12, 31)),
            ) {
                (Some(from), Some(to)) if from <= to => Some((from, to)),
                _ => return Err(AppError::bad_request("'from' must not be after 'to'")),
            },
        };

        let categories = params.categories.as_ref().map(|s| {
            s.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
        });

        Ok(Self {
            date_range,
            categories,
            min_amount: params.min_amount,
            max_amount: params.max_amount,
            search: params.search.clone(),
        })
    }

    pub(crate) fn filter<'a>(&'a self, owner: &'a str) -> ExpenseFilter<'a> {
        ExpenseFilter::new(owner)
            .date_range(self.date_range)
            .categories(self.categories.as_deref())
            .min_amount(self.min_amount)
            .max_amount(self.max_amount)
            .search(self.search.as_deref())
    }
}

#[derive(Serialize)]
pub struct ExpenseListResponse {
    pub expenses: Vec<Expense>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// GET /api/expenses - List the caller's expenses, newest first
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Query(params): Query<ExpenseQuery>,
) -> Result<Json<ExpenseListResponse>, AppError> {
    // Input validation: clamp pagination parameters
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let offset = params.offset.max(0);

    let parsed = ParsedFilter::from_query(&params)?;
    let expenses = state
        .db
        .list_expenses_filtered(parsed.filter(&ctx.user), Some(limit), offset)?;
    let total = state.db.count_expenses_filtered(parsed.filter(&ctx.user))?;

    // Audit log - read access
    state.db.log_audit(
        &ctx.user,
        "list",
        Some("expense"),
        None,
        Some(&format!(
            "limit={}, offset={}, from={:?}, to={:?}, categories={:?}, search={:?}, returned={}",
            limit,
            offset,
            params.from,
            params.to,
            params.categories,
            params.search,
            expenses.len()
        )),
    )?;

    Ok(Json(ExpenseListResponse {
        expenses,
        total,
        limit,
        offset,
    }))
}

/// POST /api/expenses - Record a new expense
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(new): Json<NewExpense>,
) -> Result<Json<Expense>, AppError> {
    let expense = state.db.create_expense(&ctx.user, &new)?;

    state.db.log_audit(
        &ctx.user,
        "create",
        Some("expense"),
        Some(expense.id),
        Some(&format!(
            "date={}, amount={:.2}, category={}",
            expense.date, expense.amount, expense.category
        )),
    )?;

    info!(user = %ctx.user, id = expense.id, "Expense recorded");
    Ok(Json(expense))
}

/// GET /api/expenses/:id - Get a single expense
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<Expense>, AppError> {
    let expense = state
        .db
        .get_expense(&ctx.user, id)?
        .ok_or_else(|| AppError::not_found(&format!("Expense {} not found", id)))?;

    state
        .db
        .log_audit(&ctx.user, "view", Some("expense"), Some(id), None)?;

    Ok(Json(expense))
}

#[derive(Serialize)]
pub struct UpdateExpenseResponse {
    pub expense: Expense,
    /// Fields that were part of the update
    pub updated: Vec<ExpenseField>,
}

/// PATCH /api/expenses/:id - Partially update an expense
pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<i64>,
    Json(changes): Json<ExpenseUpdate>,
) -> Result<Json<UpdateExpenseResponse>, AppError> {
    let (expense, updated) = state.db.edit_expense(&ctx.user, id, &changes)?;

    let fields: Vec<&str> = updated.iter().map(|f| f.as_str()).collect();
    state.db.log_audit(
        &ctx.user,
        "update",
        Some("expense"),
        Some(id),
        Some(&format!("fields={}", fields.join(","))),
    )?;

    Ok(Json(UpdateExpenseResponse { expense, updated }))
}

/// DELETE /api/expenses/:id - Delete an expense
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_expense(&ctx.user, id)?;

    state
        .db
        .log_audit(&ctx.user, "delete", Some("expense"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i64>,
}

#[derive(Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
}

/// POST /api/expenses/bulk-delete - Delete several expenses at once
pub async fn bulk_delete_expenses(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>, AppError> {
    if req.ids.len() > MAX_PAGE_LIMIT as usize {
        return Err(AppError::bad_request(&format!(
            "Cannot delete more than {} expenses at once",
            MAX_PAGE_LIMIT
        )));
    }

    let deleted = state.db.bulk_delete_expenses(&ctx.user, &req.ids)?;

    state.db.log_audit(
        &ctx.user,
        "bulk_delete",
        Some("expense"),
        None,
        Some(&format!("requested={}, deleted={}", req.ids.len(), deleted)),
    )?;

    Ok(Json(BulkDeleteResponse { deleted }))
}

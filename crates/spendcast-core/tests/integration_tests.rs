//! Integration tests for spendcast-core
//!
//! These tests exercise the full record → aggregate → forecast → chart workflow.

use chrono::{Datelike, NaiveDate};
use spendcast_core::{
    chart::{self, ChartKind},
    db::{Database, ExpenseFilter},
    forecast::{ForecastPlanner, ForecastRequest},
    models::{ExpenseUpdate, Granularity, NewExpense},
    series, Error, ExpenseStore,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Two years of household spending, January 2023 through December 2024.
/// Rent is flat; groceries and utilities move with the season.
fn seed_two_years(db: &Database, owner: &str) {
    for i in 0..24u32 {
        let year = 2023 + (i / 12) as i32;
        let month = i % 12 + 1;
        let season = ((i as f64) * std::f64::consts::PI / 6.0).sin();

        let entries = [
            (1, 900.0, "Rent"),
            (8, 280.0 + 40.0 * season + (i % 3) as f64 * 7.5, "Groceries"),
            (19, 95.0 - 25.0 * season, "Utilities"),
            (24, 60.0 + (i % 5) as f64 * 4.0, "Restaurants"),
        ];
        for (day, amount, category) in entries {
            db.create_expense(
                owner,
                &NewExpense {
                    date: date(year, month, day),
                    amount,
                    category: category.to_string(),
                    description: None,
                },
            )
            .expect("Failed to create expense");
        }
    }
}

// =============================================================================
// Store + aggregation
// =============================================================================

#[test]
fn test_monthly_series_from_store() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    seed_two_years(&db, "alice");

    let expenses = db.list_expenses("alice").unwrap();
    assert_eq!(expenses.len(), 96);
    assert!(expenses.windows(2).all(|w| w[0].date <= w[1].date));

    let monthly = series::aggregate(
        expenses.iter().map(|e| (e.date, e.amount)),
        Granularity::Monthly,
   )
    .unwrap();
    assert_eq!(monthly.len(), 24);
    assert_eq!(monthly.points[0].label, "2023-01");
    assert_eq!(monthly.points[12].label, "2024-01");

    let total: f64 = expenses.iter().map(|e| e.amount).sum();
    let aggregated: f64 = monthly.values().iter().sum();
    assert!((total - aggregated).abs() < 1e-6);
}

#[test]
fn test_weekly_series_fills_gaps() {
    let db = Database::in_memory().unwrap();
    for (d, amount) in [(date(2024, 1, 1), 10.0), (date(2024, 1, 24), 30.0)] {
        db.create_expense(
            "alice",
            &NewExpense {
                date: d,
                amount,
                category: "Groceries".to_string(),
                description: None,
            },
        )
        .unwrap();
    }

    let expenses = db.list_expenses("alice").unwrap();
    let weekly = series::aggregate(
        expenses.iter().map(|e| (e.date, e.amount)),
        Granularity::Weekly,
   )
    .unwrap();
    assert_eq!(
        weekly.labels(),
        vec!["2024-W01", "2024-W02", "2024-W03", "2024-W04"]
    );
    assert_eq!(weekly.values(), vec![10.0, 0.0, 0.0, 30.0]);
}

// =============================================================================
// Forecast workflow
// =============================================================================

#[test]
fn test_forecast_next_three_months() {
    let db = Database::in_memory().unwrap();
    seed_two_years(&db, "alice");

    let planner = ForecastPlanner::default();
    let summary = planner
        .plan(&db, "alice", ForecastRequest::Months(3), date(2025, 1, 10))
        .expect("Forecast should succeed");

    assert_eq!(summary.predictions.len(), 3);
    assert_eq!(summary.predictions[0].label, "2025-01");
    assert_eq!(summary.predictions[2].label, "2025-03");
    for p in &summary.predictions {
        assert!(p.value >= 0.0 && p.value.is_finite());
        assert!(p.lower <= p.value && p.value <= p.upper);
    }
    assert!(summary.year_to_date.is_none());
    assert!(summary.total > 0.0);
}

#[test]
fn test_forecast_current_year_includes_year_to_date() {
    let db = Database::in_memory().unwrap();
    seed_two_years(&db, "alice");

    let today = date(2024, 12, 20);
    let summary = ForecastPlanner::default()
        .plan(&db, "alice", ForecastRequest::Year(2024), today)
        .unwrap();

    // December is forecast; January to November count as spent
    assert_eq!(summary.predictions.len(), 1);
    assert_eq!(summary.predictions[0].label, "2024-12");
    let ytd = summary.year_to_date.expect("Current year has year-to-date");
    let expected: f64 = db
        .list_expenses("alice")
        .unwrap()
        .iter()
        .filter(|e| e.date.year() == 2024 && e.date.month() < today.month())
        .map(|e| e.amount)
        .sum();
    assert!((ytd - expected).abs() < 1e-6);
}

#[test]
fn test_forecast_is_owner_scoped() {
    let db = Database::in_memory().unwrap();
    seed_two_years(&db, "alice");

    let result =
        ForecastPlanner::default().plan(&db, "bob", ForecastRequest::Months(3), date(2025, 1, 10));
    assert!(matches!(
        result,
        Err(Error::InsufficientData { actual: 0, .. })
    ));
}

#[test]
fn test_forecast_rejects_stale_history() {
    let db = Database::in_memory().unwrap();
    seed_two_years(&db, "alice");

    let result = ForecastPlanner::default().plan(
        &db,
        "alice",
        ForecastRequest::Months(3),
        date(2025, 6, 1),
    );
    assert!(matches!(result, Err(Error::StaleData { days }) if days > 60));
}

// =============================================================================
// Charts + export
// =============================================================================

#[test]
fn test_forecast_chart_from_summary() {
    let db = Database::in_memory().unwrap();
    seed_two_years(&db, "alice");

    let summary = ForecastPlanner::default()
        .plan(&db, "alice", ForecastRequest::Months(2), date(2025, 1, 10))
        .unwrap();
    let figure = chart::forecast_chart(&summary).unwrap();

    assert_eq!(figure.data.len(), 4);
    assert_eq!(figure.data[0].len(), summary.history.len());
    assert_eq!(figure.data[1].len(), 2);
    assert_eq!(figure.data[1].line.as_ref().unwrap().dash, "dash");

    let json = figure.to_json().unwrap();
    assert!(json.contains("\"Forecast\""));
}

#[test]
fn test_report_charts() {
    let db = Database::in_memory().unwrap();
    seed_two_years(&db, "alice");

    let breakdown = db.get_category_breakdown("alice", 2024).unwrap();
    let pie = chart::category_pie(&breakdown, 2024).unwrap();
    assert_eq!(pie.data[0].trace_type, "pie");
    assert_eq!(pie.data[0].len(), 4);
    assert_eq!(pie.data[0].points()[0].0, "Rent");

    let totals = db.get_monthly_category_totals("alice", 2024).unwrap();
    let bars = chart::monthly_category_bar(&totals, 2024).unwrap();
    assert_eq!(bars.data.len(), 4);
    assert!(bars.data.iter().all(|t| t.len() == 12));

    assert!(matches!(
        chart::category_pie(&db.get_category_breakdown("alice", 2019).unwrap(), 2019),
        Err(Error::EmptySeries)
    ));
}

#[test]
fn test_series_chart_round_trip() {
    let monthly = series::aggregate(
        [(date(2024, 1, 3), 100.0), (date(2024, 2, 9), 150.0)],
        Granularity::Monthly,
   )
    .unwrap();
    let figure = chart::render(&monthly.to_pairs(), ChartKind::Line).unwrap();
    assert_eq!(
        figure.data[0].points(),
        vec![("2024-01".to_string(), 100.0), ("2024-02".to_string(), 150.0)]
    );
}

#[test]
fn test_edit_then_export() {
    let db = Database::in_memory().unwrap();
    let created = db
        .create_expense(
            "alice",
            &NewExpense {
                date: date(2024, 3, 2),
                amount: 42.0,
                category: "Groceries".to_string(),
                description: Some("market".to_string()),
            },
        )
        .unwrap();

    let updated = db
        .update_expense(
            "alice",
            created.id,
            &ExpenseUpdate {
                amount: Some(45.5),
                category: Some("Restaurants".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.amount, 45.5);

    // Another user can neither edit nor delete it
    assert!(matches!(
        db.update_expense("bob", created.id, &ExpenseUpdate {
            amount: Some(1.0),
            ..Default::default()
        }),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        db.delete_expense("bob", created.id),
        Err(Error::NotFound(_))
    ));

    let csv = db.export_expenses_csv(ExpenseFilter::new("alice")).unwrap();
    assert!(csv.contains("2024-03-02,Restaurants,45.50,market"));
}

//! Chart descriptions for a browser-side plotting library
//!
//! Output is a Plotly figure (`{"data": [...], "layout": {...}}`). The
//! renderer only arranges values; it never aggregates, scales or sorts them.
//! Points keep their input order.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::forecast::{ForecastSummary, MonthlyForecast};
use crate::models::{CategoryBreakdown, MonthlyCategoryTotal};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Chart type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Pie => "pie",
        }
    }

    /// Plotly trace type
    fn trace_type(&self) -> &'static str {
        match self {
            Self::Line => "scatter",
            Self::Bar => "bar",
            Self::Pie => "pie",
        }
    }
}

impl std::str::FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "line" => Ok(Self::Line),
            "bar" => Ok(Self::Bar),
            "pie" => Ok(Self::Pie),
            _ => Err(format!("Unknown chart kind: {} (valid: line, bar, pie)", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub dash: String,
}

/// One Plotly trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub trace_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<LineStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textinfo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textposition: Option<String>,
}

impl Trace {
    /// Number of plotted points
    pub fn len(&self) -> usize {
        self.y
            .as_ref()
            .or(self.values.as_ref())
            .map_or(0, |v| v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (label, value) pairs in plotted order
    pub fn points(&self) -> Vec<(String, f64)> {
        let labels = self.x.as_ref().or(self.labels.as_ref());
        let values = self.y.as_ref().or(self.values.as_ref());
        match (labels, values) {
            (Some(l), Some(v)) => l.iter().cloned().zip(v.iter().copied()).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub title: Title,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barmode: Option<String>,
    pub showlegend: bool,
}

/// A complete figure, serializable straight to Plotly JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDescription {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

impl ChartDescription {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.layout.title = Some(Title { text: title.into() });
        self
    }

    /// Set axis titles (ignored by pie charts)
    pub fn with_axis_titles(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.layout.xaxis = Some(Axis {
            title: Title { text: x.into() },
        });
        self.layout.yaxis = Some(Axis {
            title: Title { text: y.into() },
        });
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// How a trace is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// A named set of points for `render_series`
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSeries {
    pub name: String,
    pub points: Vec<(String, f64)>,
    pub style: TraceStyle,
}

impl NamedSeries {
    pub fn new(name: impl Into<String>, points: Vec<(String, f64)>) -> Self {
        Self {
            name: name.into(),
            points,
            style: TraceStyle::Solid,
        }
    }

    pub fn styled(mut self, style: TraceStyle) -> Self {
        self.style = style;
        self
    }
}

fn build_trace(name: Option<&str>, points: &[(String, f64)], kind: ChartKind, style: TraceStyle) -> Trace {
    let labels: Vec<String> = points.iter().map(|(l, _)| l.clone()).collect();
    let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();

    let mut trace = Trace {
        trace_type: kind.trace_type().to_string(),
        name: name.map(str::to_string),
        x: None,
        y: None,
        labels: None,
        values: None,
        mode: None,
        line: None,
        textinfo: None,
        textposition: None,
    };

    match kind {
        ChartKind::Pie => {
            trace.labels = Some(labels);
            trace.values = Some(values);
            trace.textinfo = Some("percent+label".to_string());
            trace.textposition = Some("inside".to_string());
        }
        ChartKind::Line => {
            trace.x = Some(labels);
            trace.y = Some(values);
            trace.mode = Some("lines+markers".to_string());
            trace.line = match style {
                TraceStyle::Solid => None,
                TraceStyle::Dashed => Some(LineStyle {
                    dash: "dash".to_string(),
                }),
                TraceStyle::Dotted => Some(LineStyle {
                    dash: "dot".to_string(),
                }),
            };
        }
        ChartKind::Bar => {
            trace.x = Some(labels);
            trace.y = Some(values);
        }
    }

    trace
}

/// Render a single series
pub fn render(points: &[(String, f64)], kind: ChartKind) -> Result<ChartDescription> {
    if points.is_empty() {
        return Err(Error::EmptySeries);
    }
    Ok(ChartDescription {
        data: vec![build_trace(None, points, kind, TraceStyle::Solid)],
        layout: Layout::default(),
    })
}

/// Render several named series on one chart
///
/// Bar charts with more than one series are grouped. Pie charts take exactly
/// one series. Empty series are skipped; if nothing is left to draw the
/// result is `Error::EmptySeries`.
pub fn render_series(series: &[NamedSeries], kind: ChartKind) -> Result<ChartDescription> {
    let non_empty: Vec<&NamedSeries> = series.iter().filter(|s| !s.points.is_empty()).collect();
    if non_empty.is_empty() {
        return Err(Error::EmptySeries);
    }
    if kind == ChartKind::Pie && non_empty.len() > 1 {
        return Err(Error::InvalidData(
            "A pie chart shows exactly one series".to_string(),
        ));
    }

    let data: Vec<Trace> = non_empty
        .iter()
        .map(|s| build_trace(Some(&s.name), &s.points, kind, s.style))
        .collect();

    let layout = Layout {
        barmode: (kind == ChartKind::Bar && data.len() > 1).then(|| "group".to_string()),
        showlegend: data.len() > 1,
        ..Default::default()
    };

    Ok(ChartDescription { data, layout })
}

fn forecast_points(
    summary: &ForecastSummary,
    value: impl Fn(&MonthlyForecast) -> f64,
) -> Vec<(String, f64)> {
    summary
        .predictions
        .iter()
        .map(|p| (p.label.clone(), value(p)))
        .collect()
}

/// History as a solid line, predictions dashed, interval bounds dotted
pub fn forecast_chart(summary: &ForecastSummary) -> Result<ChartDescription> {
    let series = vec![
        NamedSeries::new("Historical", summary.history.to_pairs()),
        NamedSeries::new("Forecast", forecast_points(summary, |p| p.value))
            .styled(TraceStyle::Dashed),
        NamedSeries::new("Lower bound", forecast_points(summary, |p| p.lower))
            .styled(TraceStyle::Dotted),
        NamedSeries::new("Upper bound", forecast_points(summary, |p| p.upper))
            .styled(TraceStyle::Dotted),
    ];

    Ok(render_series(&series, ChartKind::Line)?
        .with_title(format!("Expense forecast ({})", summary.order))
        .with_axis_titles("Month", "Amount"))
}

/// Share of spending per category
pub fn category_pie(breakdown: &[CategoryBreakdown], year: i32) -> Result<ChartDescription> {
    let points: Vec<(String, f64)> = breakdown
        .iter()
        .map(|b| (b.category.clone(), b.amount))
        .collect();
    Ok(render(&points, ChartKind::Pie)?.with_title(format!("Amount in Category ({})", year)))
}

/// Grouped bar chart: one bar group per month, one trace per category
pub fn monthly_category_bar(totals: &[MonthlyCategoryTotal], year: i32) -> Result<ChartDescription> {
    let mut series: Vec<NamedSeries> = Vec::new();
    for total in totals {
        let label = MONTH_NAMES
            .get((total.month as usize).wrapping_sub(1))
            .map(|m| m.to_string())
            .unwrap_or_else(|| total.month.to_string());
        match series.iter_mut().find(|s| s.name == total.category) {
            Some(existing) => existing.points.push((label, total.amount)),
            None => series.push(NamedSeries::new(
                total.category.clone(),
                vec![(label, total.amount)],
            )),
        }
    }

    let mut chart = render_series(&series, ChartKind::Bar)?
        .with_title(format!("Monthly Spending by Category ({})", year))
        .with_axis_titles("Month", "Amount");
    chart.layout.barmode = Some("group".to_string());
    chart.layout.showlegend = true;
    Ok(chart)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(items: &[(&str, f64)]) -> Vec<(String, f64)> {
        items.iter().map(|(l, v)| (l.to_string(), *v)).collect()
    }

    #[test]
    fn test_render_line_keeps_order() {
        let chart = render(&pts(&[("Jan", 100.0), ("Feb", 150.0)]), ChartKind::Line).unwrap();
        assert_eq!(chart.data.len(), 1);
        assert_eq!(chart.data[0].len(), 2);
        assert_eq!(
            chart.data[0].points(),
            pts(&[("Jan", 100.0), ("Feb", 150.0)])
        );
        assert_eq!(chart.data[0].trace_type, "scatter");
    }

    #[test]
    fn test_render_empty_fails() {
        assert!(matches!(
            render(&[], ChartKind::Bar),
            Err(Error::EmptySeries)
        ));
        assert!(matches!(
            render_series(&[NamedSeries::new("a", vec![])], ChartKind::Line),
            Err(Error::EmptySeries)
        ));
    }

    #[test]
    fn test_render_does_not_sort_or_transform() {
        let input = pts(&[("c", 3.0), ("a", -1.5), ("b", 0.0)]);
        let chart = render(&input, ChartKind::Bar).unwrap();
        assert_eq!(chart.data[0].points(), input);
    }

    #[test]
    fn test_json_shape() {
        let chart = render(&pts(&[("Jan", 100.0), ("Feb", 150.0)]), ChartKind::Line).unwrap();
        let json: serde_json::Value = serde_json::from_str(&chart.to_json().unwrap()).unwrap();
        assert_eq!(json["data"][0]["type"], "scatter");
        assert_eq!(json["data"][0]["x"], serde_json::json!(["Jan", "Feb"]));
        assert_eq!(json["data"][0]["y"], serde_json::json!([100.0, 150.0]));
        assert!(json["data"][0].get("labels").is_none());
        assert!(json["layout"].is_object());
    }

    #[test]
    fn test_pie_uses_labels_and_values() {
        let chart = render(&pts(&[("Food", 30.0), ("Rent", 70.0)]), ChartKind::Pie).unwrap();
        let trace = &chart.data[0];
        assert_eq!(trace.trace_type, "pie");
        assert!(trace.x.is_none());
        assert_eq!(trace.labels.as_ref().unwrap(), &vec!["Food", "Rent"]);
        assert_eq!(trace.values.as_ref().unwrap(), &vec![30.0, 70.0]);
    }

    #[test]
    fn test_render_series_grouped_bar() {
        let chart = render_series(
            &[
                NamedSeries::new("Food", pts(&[("Jan", 1.0)])),
                NamedSeries::new("Rent", pts(&[("Jan", 2.0)])),
            ],
            ChartKind::Bar,
        )
        .unwrap();
        assert_eq!(chart.data.len(), 2);
        assert_eq!(chart.layout.barmode.as_deref(), Some("group"));
        assert!(chart.layout.showlegend);
    }

    #[test]
    fn test_pie_rejects_multiple_series() {
        let result = render_series(
            &[
                NamedSeries::new("a", pts(&[("x", 1.0)])),
                NamedSeries::new("b", pts(&[("y", 1.0)])),
            ],
            ChartKind::Pie,
        );
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_dashed_style() {
        let chart = render_series(
            &[NamedSeries::new("f", pts(&[("x", 1.0)])).styled(TraceStyle::Dashed)],
            ChartKind::Line,
        )
        .unwrap();
        assert_eq!(chart.data[0].line.as_ref().unwrap().dash, "dash");
    }

    #[test]
    fn test_monthly_category_bar() {
        let totals = vec![
            MonthlyCategoryTotal {
                month: 1,
                category: "Food".to_string(),
                amount: 20.0,
            },
            MonthlyCategoryTotal {
                month: 1,
                category: "Rent".to_string(),
                amount: 100.0,
            },
            MonthlyCategoryTotal {
                month: 2,
                category: "Food".to_string(),
                amount: 40.0,
            },
        ];
        let chart = monthly_category_bar(&totals, 2024).unwrap();
        assert_eq!(chart.data.len(), 2);
        assert_eq!(chart.data[0].name.as_deref(), Some("Food"));
        assert_eq!(chart.data[0].points(), pts(&[("Jan", 20.0), ("Feb", 40.0)]));
        assert_eq!(chart.layout.barmode.as_deref(), Some("group"));
    }

    #[test]
    fn test_category_pie_empty_year() {
        assert!(matches!(category_pie(&[], 2024), Err(Error::EmptySeries)));
    }

    #[test]
    fn test_chart_kind_from_str() {
        assert_eq!("LINE".parse::<ChartKind>().unwrap(), ChartKind::Line);
        assert!("donut".parse::<ChartKind>().is_err());
    }
}

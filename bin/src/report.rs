//! Console rendering of the run's tables and model reports.

use bourse::ml::{Metric, ParamMap};
use bourse::{AggregateReport, ClassifierReport, RegressorReport};
use polars::prelude::DataFrame;

const BOX_WIDTH: usize = 62;

fn banner(title: &str) -> String {
    let rule = "═".repeat(BOX_WIDTH);
    format!("╔{rule}╗\n║{title:^BOX_WIDTH$}║\n╚{rule}╝")
}

fn section(title: &str) {
    println!("\n{}\n", banner(title));
}

/// The first `show_rows` rows of `df` as aligned text, header first.
fn render(df: &DataFrame, show_rows: usize) -> String {
    let head = df.head(Some(show_rows));
    let columns = head.get_columns();

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(head.height() + 1);
    cells.push(columns.iter().map(|c| c.name().to_string()).collect());
    for row in 0..head.height() {
        cells.push(
            columns
                .iter()
                .map(|c| {
                    c.as_materialized_series()
                        .get(row)
                        .map(|v| v.str_value().into_owned())
                        .unwrap_or_default()
                })
                .collect(),
        );
    }

    let widths: Vec<usize> = (0..columns.len())
        .map(|j| cells.iter().map(|r| r[j].chars().count()).max().unwrap_or(0))
        .collect();
    let line = |row: &[String]| {
        row.iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:>w$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut out = Vec::with_capacity(cells.len() + 1);
    out.push(line(&cells[0]));
    out.push(
        widths
            .iter()
            .map(|&w| "─".repeat(w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    out.extend(cells[1..].iter().map(|r| line(r)));
    out.join("\n")
}

fn table(title: &str, df: &DataFrame, show_rows: usize) {
    println!("{} ({} rows)", title, df.height());
    println!("{}\n", render(df, show_rows));
}

fn candidates(metric: Metric, rows: &[(ParamMap, f64)], best: &ParamMap) {
    println!("Validation {}:", metric.name());
    for (params, score) in rows {
        let marker = if params == best { "*" } else { " " };
        println!("  {} {:<42} {:>10.4}", marker, params.to_string(), score);
    }
    println!();
}

pub(crate) fn aggregates(report: &AggregateReport, show_rows: usize) {
    section("Daily Returns");
    table("Records by date", &report.detail, show_rows);
    table("Average return by ticker", &report.ticker_returns, show_rows);
    table("Average return by date", &report.date_returns, show_rows);
    table("Traded value by ticker", &report.traded_value, show_rows);
    table("Volatility by ticker", &report.volatility, show_rows);
}

pub(crate) fn classifier(report: &ClassifierReport, show_rows: usize) {
    section("Direction Classifier");
    println!("Train rows:      {:>10}", report.train_rows);
    println!("Test rows:       {:>10}", report.test_rows);
    println!("Best params:     {}", report.best_params);
    println!();
    candidates(Metric::Accuracy, &report.candidates, &report.best_params);
    table("Test predictions", &report.predictions, show_rows);
    println!("Test accuracy:   {:>10.4}", report.accuracy);
}

pub(crate) fn regressor(report: &RegressorReport, show_rows: usize) {
    section("Close Regressor");
    println!("Train rows:      {:>10}", report.train_rows);
    println!("Test rows:       {:>10}", report.test_rows);
    println!("Best params:     {}", report.best_params);
    println!();
    candidates(Metric::Rmse, &report.candidates, &report.best_params);
    table("Test predictions", &report.predictions, show_rows);
    println!("MAE:             {:>10.4}", report.metrics.mae);
    println!("RMSE:            {:>10.4}", report.metrics.rmse);
    println!("R2:              {:>10.4}", report.metrics.r2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_render_caps_rows() {
        let ids: Vec<i64> = (0..25).collect();
        let names: Vec<String> = ids.iter().map(|i| format!("T{i}")).collect();
        let df = df! { "id" => ids, "ticker" => names }.unwrap();

        let text = render(&df, 20);
        let lines: Vec<&str> = text.lines().collect();
        // Header, rule, then twenty rows.
        assert_eq!(lines.len(), 22);
        assert!(lines[0].contains("id") && lines[0].contains("ticker"));
        assert!(lines[21].ends_with("T19"));
        assert!(!text.contains("T20"));
        assert!(!text.contains('"'));
    }

    #[test]
    fn test_render_short_frame() {
        let df = df! { "x" => &[1.5, 2.25] }.unwrap();
        let lines: Vec<String> = render(&df, 20).lines().map(str::to_string).collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].trim(), "x");
        assert_eq!(lines[3].trim(), "2.25");
    }

    #[test]
    fn test_banner_is_aligned() {
        let banner = banner("Close Regressor");
        let widths: Vec<usize> = banner.lines().map(|l| l.chars().count()).collect();
        assert_eq!(widths, vec![BOX_WIDTH + 2; 3]);
        assert!(banner.contains("Close Regressor"));
    }
}

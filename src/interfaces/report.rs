//! Plain-text rendering of simulation results and CSV export of the
//! extended series.

use crate::application::ml::evaluation::EvaluationReport;
use crate::domain::simulation::{ForecastOutcome, SimulationReport, SimulationResult};
use crate::domain::trading::session::TradingSession;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct ForecastRow {
    date: NaiveDate,
    close: f64,
    synthetic: bool,
}

/// One result block. Failures are rendered inline with their error kind.
pub fn render_result(result: &SimulationResult, target_date: NaiveDate) -> String {
    let body = match &result.result {
        Ok(forecast) => {
            let mut block = format!(
                "Initial Price: ${:.2}\n\
                 Predicted Price on {}: ${:.2}\n\
                 Initial Investment: ${}\n\
                 Net Return: ${:.2}\n\
                 Percent Return: {:.2}%\n",
                forecast.initial_price,
                target_date,
                forecast.final_price,
                result.invested_amount,
                forecast.returns.net_return,
                forecast.returns.percent_return
            );
            if forecast.outcome == ForecastOutcome::Exhausted {
                block.push_str(&format!(
                    "Note: history exhausted after {} forecast days\n",
                    forecast.predictions.len()
                ));
            }
            block
        }
        Err(e) => format!(
            "Initial Investment: ${}\nSkipped ({}): {}\n",
            result.invested_amount,
            e.kind(),
            e
        ),
    };
    format!("Stock: {}\n{}", result.ticker, body)
}

pub fn render_report(report: &SimulationReport) -> String {
    if report.results.is_empty() {
        return "Portfolio is empty. Buy a stock first.\n".to_string();
    }

    let mut out: String = report
        .results
        .iter()
        .map(|result| render_result(result, report.target_date) + "\n")
        .collect();

    let failed = report.failed().count();
    out.push_str(&format!(
        "Simulated {} of {} holdings to {}: total net return ${:.2}\n",
        report.results.len() - failed,
        report.results.len(),
        report.target_date,
        report.total_net_return()
    ));
    out
}

pub fn render_portfolio(session: &TradingSession) -> String {
    let mut out = if session.portfolio().is_empty() {
        "No holdings.\n".to_string()
    } else {
        session
            .portfolio()
            .iter()
            .map(|(ticker, amount)| format!("{:<8} ${:.2}\n", ticker, amount))
            .collect()
    };
    out.push_str(&format!("Balance: ${:.2}\n", session.balance()));
    out
}

pub fn render_evaluation(
    ticker: &str,
    report: &EvaluationReport,
    benchmark: Option<(&str, f64)>,
) -> String {
    let mut out = format!(
        "Stock: {} ({} test days)\n\
         Mean Absolute Percentage Error (MAPE): {:.2}%\n\
         Directional Accuracy: {:.2}%\n",
        ticker, report.samples, report.mape, report.directional_accuracy
    );
    if let Some((name, pct)) = benchmark {
        out.push_str(&format!("{} Percent Return: {:.2}%\n", name, pct));
    }
    out
}

/// Writes `<dir>/<TICKER>_forecast.csv` for every successful result.
pub fn export_forecasts(report: &SimulationReport, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create export directory {:?}", dir))?;

    let mut written = Vec::new();
    for (result, forecast) in report.succeeded() {
        let path = dir.join(format!("{}_forecast.csv", result.ticker));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {:?}", path))?;
        for (i, record) in forecast.series.records().enumerate() {
            writer
                .serialize(ForecastRow {
                    date: record.date,
                    close: record.close,
                    synthetic: forecast.series.is_synthetic(i),
                })
                .context("Failed to write forecast row")?;
        }
        writer.flush().context("Failed to flush forecast CSV")?;
        info!("Exported {} rows to {:?}", forecast.series.len(), path);
        written.push(path);
    }
    Ok(written)
}

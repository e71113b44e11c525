//! Forecast, anomaly and usage summary for the monitored host

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{Anomaly, ApiClient, Insights, MetricForecast, MetricSummary};
use crate::output::{
    color_level, color_status, color_trend, color_verdict, format_percent, format_timestamp,
    print_heading, print_info, print_json, print_table, OutputFormat,
};

/// Row for the forecast table
#[derive(Tabled)]
struct ForecastRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Forecast")]
    forecast: String,
    #[tabled(rename = "Trend")]
    trend: String,
    #[tabled(rename = "R²")]
    r_squared: String,
}

/// Row for the usage summary table
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Direction")]
    direction: String,
}

/// Show the latest insights snapshot
pub async fn show_insights(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let insights: Insights = client.get("api/v1/insights").await?;

    match format {
        OutputFormat::Json => print_json(&insights)?,
        OutputFormat::Table => render(&insights),
    }

    Ok(())
}

fn render(insights: &Insights) {
    print_heading("Host Insights");
    println!("Status:    {}", color_status(&insights.status));
    println!("Updated:   {}", format_timestamp(&insights.updated_at));
    println!(
        "Samples:   {} buffered, {} collected",
        insights.samples, insights.total_samples
    );
    if let Some(latest) = &insights.latest {
        println!(
            "Latest:    CPU {}, MEM {}, DISK {}",
            format_percent(latest.cpu_percent),
            format_percent(latest.memory_percent),
            format_percent(latest.disk_percent)
        );
    }
    println!();

    if insights.status == "collecting" {
        print_info(&format!(
            "Collecting data: {}/{} samples needed for predictions",
            insights.samples, insights.required_samples
        ));
        return;
    }

    if let Some(prediction) = &insights.prediction {
        println!("{} ({})", "Forecast".bold(), prediction.method);
        let rows: Vec<ForecastRow> = [&prediction.cpu, &prediction.memory, &prediction.disk]
            .into_iter()
            .map(forecast_row)
            .collect();
        print_table(rows, "No forecast available");
        println!();
    }

    println!("{}", "Anomaly Detection".bold());
    match &insights.anomaly {
        Some(anomaly) => render_anomaly(anomaly),
        None if !insights.detector_trained => print_info("Detector is still training"),
        None => print_info("No anomaly verdict yet"),
    }
    println!();

    if let Some(summary) = &insights.summary {
        println!("{}", "Usage Summary".bold());
        let rows: Vec<SummaryRow> = [
            ("CPU", &summary.cpu),
            ("MEM", &summary.memory),
            ("DISK", &summary.disk),
        ]
        .into_iter()
        .map(|(label, s)| summary_row(label, s))
        .collect();
        print_table(rows, "No summary available");
    }
}

fn forecast_row(forecast: &MetricForecast) -> ForecastRow {
    let horizons = forecast
        .horizons
        .iter()
        .map(|h| format!("+{}: {:.1}%", h.ticks, h.value))
        .collect::<Vec<_>>()
        .join(", ");

    ForecastRow {
        metric: forecast.metric.to_uppercase(),
        current: format_percent(Some(forecast.current)),
        forecast: if forecast.fallback {
            format!("{} (fallback)", horizons)
        } else {
            horizons
        },
        trend: color_trend(&forecast.trend),
        r_squared: format!("{:.2}", forecast.r_squared),
    }
}

fn summary_row(label: &str, summary: &MetricSummary) -> SummaryRow {
    SummaryRow {
        metric: label.to_string(),
        mean: format_percent(Some(summary.mean)),
        level: color_level(&summary.level),
        direction: color_trend(&summary.direction),
    }
}

fn render_anomaly(anomaly: &Anomaly) {
    println!("Verdict:   {}", color_verdict(anomaly.is_anomaly));
    match anomaly.score {
        Some(score) => println!("Score:     {:.2} (threshold {:.2})", score, anomaly.threshold),
        None => println!("Score:     - (threshold {:.2})", anomaly.threshold),
    }
    if let Some(metric) = &anomaly.dominant_metric {
        println!("Driver:    {}", metric.to_uppercase());
    }
    if let Some(diagnostic) = &anomaly.diagnostic {
        println!("Note:      {}", diagnostic.replace('_', " ").yellow());
    }
    println!("Checked:   {}", anomaly.detection_time);
}

//! Alert log

use anyhow::Result;
use tabled::Tabled;

use crate::client::{AlertList, ApiClient};
use crate::output::{
    color_verdict, format_percent, format_timestamp, print_heading, print_json, print_table,
    OutputFormat,
};

/// Row for the alerts table
#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Row for the recent anomalies table
#[derive(Tabled)]
struct AnomalyRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "MEM")]
    memory: String,
    #[tabled(rename = "DISK")]
    disk: String,
    #[tabled(rename = "Score")]
    score: String,
}

/// Show the newest `limit` alerts and the recent anomalies
pub async fn show_alerts(client: &ApiClient, limit: usize, format: OutputFormat) -> Result<()> {
    let path = format!("api/v1/alerts?limit={}", limit);
    let list: AlertList = client.get(&path).await?;

    match format {
        OutputFormat::Json => print_json(&list)?,
        OutputFormat::Table => render(&list),
    }

    Ok(())
}

fn render(list: &AlertList) {
    print_heading("Alerts");

    let rows: Vec<AlertRow> = list
        .alerts
        .iter()
        .map(|a| AlertRow {
            time: format_timestamp(&a.timestamp),
            kind: a.kind.clone(),
            metric: a.metric.as_deref().unwrap_or("-").to_uppercase(),
            value: format_percent(a.value),
            message: a.message.clone(),
        })
        .collect();
    print_table(rows, "No alerts raised");
    println!(
        "\nShowing {} of {} alerts",
        list.alerts.len(),
        list.total_alerts
    );

    println!();
    print_heading("Recent Anomalies");
    let rows: Vec<AnomalyRow> = list
        .recent_anomalies
        .iter()
        .map(|a| AnomalyRow {
            time: a.detection_time.clone(),
            verdict: color_verdict(a.is_anomaly),
            cpu: format_percent(a.cpu),
            memory: format_percent(a.memory),
            disk: format_percent(a.disk),
            score: a
                .score
                .map(|s| format!("{:.2}", s))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    print_table(rows, "No anomalies detected");
}

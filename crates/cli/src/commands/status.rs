//! Agent health and readiness

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, Health, Readiness};
use crate::output::{
    color_status, print_heading, print_json, print_success, print_table, print_warning,
    OutputFormat,
};

/// Row for the component table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Serialize)]
struct StatusReport {
    health: Health,
    readiness: Readiness,
}

/// Show agent health and readiness
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: Health = client.get_probe("healthz").await?;
    let readiness: Readiness = client.get_probe("readyz").await?;

    match format {
        OutputFormat::Json => print_json(&StatusReport { health, readiness })?,
        OutputFormat::Table => {
            print_heading("Agent Status");
            println!("Health: {}", color_status(&health.status));
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, c)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&c.status),
                    message: c.message.clone().unwrap_or_default(),
                })
                .collect();
            print_table(rows, "No components registered");
            println!();

            if readiness.ready {
                print_success("Agent is ready");
            } else {
                print_warning(&format!(
                    "Agent is not ready: {}",
                    readiness.reason.as_deref().unwrap_or("unknown reason")
                ));
            }
        }
    }

    Ok(())
}

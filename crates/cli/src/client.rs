//! API client for communicating with the hostwatch agent

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the hostwatch agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request, failing on any non-success status
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(path).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// GET a probe endpoint, whose 503 responses still carry a report
    pub async fn get_probe<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(path).await?;
        let status = response.status();

        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    async fn send(&self, path: &str) -> Result<reqwest::Response> {
        let url = self.base_url.join(path).context("Invalid path")?;

        self.client
            .get(url)
            .send()
            .await
            .context("Failed to reach hostwatch agent")
    }
}

// API response types
//
// Readings may be null when the agent saw a malformed sample.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insights {
    pub status: String,
    pub updated_at: String,
    pub samples: usize,
    pub total_samples: usize,
    pub required_samples: usize,
    #[serde(default)]
    pub latest: Option<SampleReading>,
    #[serde(default)]
    pub prediction: Option<Prediction>,
    #[serde(default)]
    pub anomaly: Option<Anomaly>,
    #[serde(default)]
    pub summary: Option<UsageSummary>,
    pub detector_trained: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleReading {
    pub timestamp: String,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub method: String,
    pub cpu: MetricForecast,
    pub memory: MetricForecast,
    pub disk: MetricForecast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricForecast {
    pub metric: String,
    pub current: f64,
    pub horizons: Vec<HorizonForecast>,
    pub slope: f64,
    pub r_squared: f64,
    pub trend: String,
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HorizonForecast {
    pub ticks: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub is_anomaly: bool,
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub disk: Option<f64>,
    pub detection_time: String,
    #[serde(default)]
    pub score: Option<f64>,
    pub threshold: f64,
    #[serde(default)]
    pub dominant_metric: Option<String>,
    #[serde(default)]
    pub diagnostic: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSummary {
    pub cpu: MetricSummary,
    pub memory: MetricSummary,
    pub disk: MetricSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub level: String,
    pub direction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertList {
    pub alerts: Vec<Alert>,
    pub recent_anomalies: Vec<Anomaly>,
    pub total_alerts: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: String,
    pub kind: String,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    pub message: String,
    pub notify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

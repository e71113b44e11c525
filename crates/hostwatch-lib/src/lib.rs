//! Analytics core for host resource monitoring
//!
//! This crate provides the core functionality for:
//! - Sampling CPU, memory and disk usage from procfs
//! - Short-horizon usage forecasting
//! - Anomaly detection over joint usage samples
//! - Threshold and anomaly alerting
//! - Health checks and observability

pub mod anomaly;
pub mod collector;
pub mod engine;
pub mod error;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod predictor;

pub use engine::{AnalyticsEngine, EngineConfig, InsightsSnapshot, InsightsStatus, TickOutcome};
pub use error::{AnalyticsError, AnalyticsResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use history::{AlignedHistory, SampleBuffer};
pub use models::*;
pub use observability::{HostwatchMetrics, StructuredLogger};

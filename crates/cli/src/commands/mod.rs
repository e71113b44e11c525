//! CLI command implementations

pub mod alerts;
pub mod insights;
pub mod status;

use crate::error::{Result, RevenueError};
use crate::schema::AllocationPolicy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const NON_BILLABLE_BASIS_ID: i64 = 4;
pub const HOURLY_BASIS_ID: i64 = 2;
pub const FALLBACK_HOURLY_RATE: f64 = 100.0;

/// Tunables of the revenue engine and the ingestion adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    #[schemars(description = "Invoice basis id of non-billable hours. Such hours never produce revenue.")]
    pub non_billable_basis_id: i64,

    #[schemars(
        description = "Invoice basis id of hours billed by the hour inside a fixed-price project. Such hours bypass every budget."
    )]
    pub hourly_basis_id: i64,

    #[schemars(
        description = "Rate used when neither the project line, the project average nor the external lookup yields one."
    )]
    pub fallback_hourly_rate: f64,

    #[schemars(description = "View shown by default for fixed-price projects.")]
    pub default_policy: AllocationPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            non_billable_basis_id: NON_BILLABLE_BASIS_ID,
            hourly_basis_id: HOURLY_BASIS_ID,
            fallback_hourly_rate: FALLBACK_HOURLY_RATE,
            default_policy: AllocationPolicy::ProjectMax,
        }
    }
}

impl EngineSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: EngineSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.fallback_hourly_rate.is_finite() || self.fallback_hourly_rate < 0.0 {
            return Err(RevenueError::InvalidSettings(format!(
                "fallbackHourlyRate must be a non-negative number, got {}",
                self.fallback_hourly_rate
            )));
        }

        if self.non_billable_basis_id == self.hourly_basis_id {
            return Err(RevenueError::InvalidSettings(format!(
                "nonBillableBasisId and hourlyBasisId must differ (both {})",
                self.hourly_basis_id
            )));
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EngineSettings)
    }
}

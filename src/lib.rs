//! # IRIS Revenue
//!
//! Revenue recognition for projects synchronized from Gripp, as shown on the
//! IRIS dashboard.
//!
//! ## Core Concepts
//!
//! - **Project types**: only fixed-price ("Vaste Prijs") projects are limited
//!   by a budget; time-and-materials, contract and quote projects recognize
//!   every billable hour; internal projects never produce revenue.
//! - **Project-Max**: a fixed-price budget is one pool, drawn chronologically
//!   month by month. The entry that exhausts it is clipped to what remains.
//! - **Line-Max**: every quote line first caps the hours booked on it, then
//!   the project pool applies.
//! - **Carry-forward**: budget consumed in a previous year shrinks the pool
//!   of the current one.
//! - **Degrade, don't crash**: malformed numbers count as zero, so one bad
//!   record never breaks a report.
//!
//! ## Example
//!
//! ```rust,ignore
//! use iris_revenue::*;
//! use chrono::NaiveDate;
//!
//! let project = Project::new(1, "Webshop", ProjectType::FixedPrice)
//!     .with_budget(1000.0, 0.0)
//!     .with_hours(vec![HourEntry::new(
//!         NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//!         30.0,
//!         50.0,
//!     )]);
//!
//! let result = calculate_project_max_revenue(&project, project.available_budget());
//! assert_eq!(result.monthly_revenue[0], 1000.0);
//! assert!(result.is_over_budget);
//! ```

pub mod classification;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod overrides;
pub mod rates;
pub mod report;
pub mod schema;
pub mod sync;
pub mod utils;

pub use classification::{Classification, ClassificationSource, ProjectTag, TagId, TagTable};
pub use config::EngineSettings;
pub use engine::{
    calculate_line_max_revenue, calculate_project_max_revenue, EntryTreatment, ProjectRevenue,
    RevenueEngine,
};
pub use error::{Result, RevenueError};
pub use ingestion::*;
pub use overrides::*;
pub use rates::{RateResolver, RateSource, ResolvedRate};
pub use report::{HoursBreakdown, ProjectRevenueRow, RevenueReport};
pub use schema::*;
pub use sync::{SyncKind, SyncPermit, SyncRegistry};
pub use utils::*;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one sync run stored for a report year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub year: i32,
    #[serde(default)]
    pub projects: Vec<RawProject>,
    #[serde(default)]
    pub hours: Vec<RawHourRecord>,
    /// Hourly rate per project id from outside the quote lines.
    #[serde(default)]
    pub external_rates: BTreeMap<i64, f64>,
    #[serde(default)]
    pub overrides: ProjectOverrides,
}

impl SyncSnapshot {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub struct RevenueProcessor {
    engine: RevenueEngine,
    tags: TagTable,
}

impl RevenueProcessor {
    pub fn new(settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            engine: RevenueEngine::new(settings),
            tags: TagTable::with_default_names(),
        })
    }

    pub fn with_tag_table(mut self, tags: TagTable) -> Self {
        self.tags = tags;
        self
    }

    pub fn engine(&self) -> &RevenueEngine {
        &self.engine
    }

    /// Computes the report of canonical projects.
    pub fn process(&self, year: i32, projects: &[Project]) -> Result<RevenueReport> {
        validate_report_year(year)?;
        Ok(RevenueReport::build(year, projects, &self.engine))
    }

    /// Runs ingestion, overrides and revenue recognition over a stored snapshot.
    pub fn process_snapshot(&self, snapshot: &SyncSnapshot) -> Result<RevenueReport> {
        validate_report_year(snapshot.year)?;

        info!(
            "Processing revenue for {}: {} projects, {} hour records",
            snapshot.year,
            snapshot.projects.len(),
            snapshot.hours.len()
        );

        let rates = RateResolver::new(self.engine.settings().fallback_hourly_rate)
            .with_external_rates(snapshot.external_rates.clone());

        let projects = assemble_projects(
            &snapshot.projects,
            &snapshot.hours,
            snapshot.year,
            &self.tags,
            &rates,
        );

        let projects = if snapshot.overrides.is_empty() {
            projects
        } else {
            debug!(
                "Applying {} project overrides",
                snapshot.overrides.modifications.len()
            );
            snapshot.overrides.apply(&projects)
        };

        self.process(snapshot.year, &projects)
    }
}

pub fn process_snapshot(snapshot: &SyncSnapshot, settings: &EngineSettings) -> Result<RevenueReport> {
    RevenueProcessor::new(settings.clone())?.process_snapshot(snapshot)
}

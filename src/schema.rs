use crate::error::RevenueError;
use crate::utils::{finite_non_negative, month_index, MONTHS_PER_YEAR};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
pub enum ProjectType {
    #[schemars(description = "Internal work. Never produces revenue.")]
    Intern,

    #[schemars(description = "Recurring contract work, billed by the hour without a budget cap.")]
    Contract,

    #[serde(rename = "Vaste Prijs")]
    #[schemars(
        description = "Fixed-price project. Revenue is capped by the agreed budget and allocated chronologically."
    )]
    FixedPrice,

    #[serde(rename = "Nacalculatie")]
    #[schemars(description = "Time-and-materials project. Revenue is hours times rate, uncapped.")]
    TimeAndMaterials,

    #[serde(rename = "Offerte")]
    #[schemars(description = "Quote stage project. Hours are recognized uncapped.")]
    Quote,

    #[serde(rename = "Verkeerde tag")]
    #[schemars(description = "No tag, override or name heuristic resolved the project type.")]
    Unclassified,
}

impl ProjectType {
    pub const ALL: [ProjectType; 6] = [
        ProjectType::Intern,
        ProjectType::Contract,
        ProjectType::FixedPrice,
        ProjectType::TimeAndMaterials,
        ProjectType::Quote,
        ProjectType::Unclassified,
    ];

    /// The label the dashboard shows for this type.
    pub fn label(&self) -> &'static str {
        match self {
            ProjectType::Intern => "Intern",
            ProjectType::Contract => "Contract",
            ProjectType::FixedPrice => "Vaste Prijs",
            ProjectType::TimeAndMaterials => "Nacalculatie",
            ProjectType::Quote => "Offerte",
            ProjectType::Unclassified => "Verkeerde tag",
        }
    }

    pub fn is_budget_capped(&self) -> bool {
        matches!(self, ProjectType::FixedPrice)
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProjectType {
    type Err = RevenueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "intern" | "internal" => Ok(ProjectType::Intern),
            "contract" => Ok(ProjectType::Contract),
            "vaste prijs" | "vasteprijs" | "fixed price" => Ok(ProjectType::FixedPrice),
            "nacalculatie" | "time and materials" => Ok(ProjectType::TimeAndMaterials),
            "offerte" | "quote" => Ok(ProjectType::Quote),
            "verkeerde tag" | "unclassified" => Ok(ProjectType::Unclassified),
            _ => Err(RevenueError::UnknownProjectType(s.to_string())),
        }
    }
}

/// Which allocation view a fixed-price project is reported with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum AllocationPolicy {
    #[default]
    #[schemars(description = "One shared budget pool for the whole project.")]
    ProjectMax,

    #[schemars(
        description = "Every project line has its own pool; the project pool is applied afterwards."
    )]
    LineMax,
}

/// One posted time registration attributed to a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HourEntry {
    #[serde(default)]
    #[schemars(description = "Identifier of the time registration in the source system.")]
    pub id: Option<i64>,

    #[schemars(description = "Work date. The revenue month is derived from it.")]
    pub date: NaiveDate,

    #[schemars(description = "Registered hours. Negative or non-numeric values count as zero.")]
    pub hours: f64,

    #[schemars(description = "Resolved selling rate per hour.")]
    pub hourly_rate: f64,

    #[serde(default)]
    #[schemars(
        description = "Invoice basis of the registration. 4 is non-billable, 2 is billed by the hour inside a fixed-price project."
    )]
    pub invoice_basis_id: i64,

    #[serde(default)]
    #[schemars(description = "Budget line the hours were booked on, if known.")]
    pub project_line_id: Option<i64>,

    #[serde(default)]
    pub employee_id: Option<i64>,
}

impl HourEntry {
    pub fn new(date: NaiveDate, hours: f64, hourly_rate: f64) -> Self {
        Self {
            id: None,
            date,
            hours,
            hourly_rate,
            invoice_basis_id: 0,
            project_line_id: None,
            employee_id: None,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_invoice_basis(mut self, invoice_basis_id: i64) -> Self {
        self.invoice_basis_id = invoice_basis_id;
        self
    }

    pub fn with_line(mut self, project_line_id: i64) -> Self {
        self.project_line_id = Some(project_line_id);
        self
    }

    /// Calendar month, 1 = January.
    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn month_index(&self) -> usize {
        month_index(self.date)
    }

    pub fn usable_hours(&self) -> f64 {
        finite_non_negative(self.hours)
    }

    pub fn usable_rate(&self) -> f64 {
        finite_non_negative(self.hourly_rate)
    }

    /// Hours times rate with malformed parts counted as zero.
    pub fn nominal_revenue(&self) -> f64 {
        finite_non_negative(self.usable_hours() * self.usable_rate())
    }
}

/// One budget line of a fixed-price quote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectLine {
    pub id: i64,

    #[schemars(description = "Quantity of the line, usually hours.")]
    pub amount: f64,

    #[schemars(description = "Selling price per unit of the line.")]
    pub selling_price: f64,
}

impl ProjectLine {
    pub fn new(id: i64, amount: f64, selling_price: f64) -> Self {
        Self {
            id,
            amount,
            selling_price,
        }
    }

    /// Nominal line budget, `amount * sellingPrice`, zero when malformed.
    pub fn budget(&self) -> f64 {
        finite_non_negative(
            finite_non_negative(self.amount) * finite_non_negative(self.selling_price),
        )
    }
}

/// Canonical project shape the revenue engine works on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,

    pub name: String,

    pub project_type: ProjectType,

    #[serde(default)]
    #[schemars(description = "Contractually available budget for the current period.")]
    pub total_budget: f64,

    #[serde(default)]
    #[schemars(description = "Budget already consumed in a previous period.")]
    pub previous_year_budget_used: f64,

    #[serde(default)]
    pub hour_details: Vec<HourEntry>,

    #[serde(default)]
    pub project_lines: Vec<ProjectLine>,
}

impl Project {
    pub fn new(id: i64, name: impl Into<String>, project_type: ProjectType) -> Self {
        Self {
            id,
            name: name.into(),
            project_type,
            total_budget: 0.0,
            previous_year_budget_used: 0.0,
            hour_details: Vec::new(),
            project_lines: Vec::new(),
        }
    }

    pub fn with_budget(mut self, total_budget: f64, previous_year_budget_used: f64) -> Self {
        self.total_budget = total_budget;
        self.previous_year_budget_used = previous_year_budget_used;
        self
    }

    pub fn with_hours(mut self, hour_details: Vec<HourEntry>) -> Self {
        self.hour_details = hour_details;
        self
    }

    pub fn with_lines(mut self, project_lines: Vec<ProjectLine>) -> Self {
        self.project_lines = project_lines;
        self
    }

    /// `max(0, totalBudget - previousYearBudgetUsed)`.
    pub fn available_budget(&self) -> f64 {
        let total = finite_non_negative(self.total_budget);
        let used = finite_non_negative(self.previous_year_budget_used);
        (total - used).max(0.0)
    }

    /// Budget consumed once `result` is booked, i.e. the next period's
    /// `previousYearBudgetUsed`.
    pub fn budget_used_after(&self, result: &MonthlyRevenueResult) -> f64 {
        finite_non_negative(self.previous_year_budget_used) + result.capped_revenue
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Project)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// Monthly revenue schedule produced by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenueResult {
    #[schemars(description = "Revenue per calendar month, index 0 = January.")]
    pub monthly_revenue: [f64; MONTHS_PER_YEAR],

    #[schemars(description = "True for every month in or after which the budget ran out.")]
    pub monthly_over_budget: [bool; MONTHS_PER_YEAR],

    pub total_revenue: f64,

    pub is_over_budget: bool,

    #[schemars(description = "Budget left after this period, never negative.")]
    pub remaining_budget: f64,

    #[schemars(description = "Part of the total drawn from the budget.")]
    pub capped_revenue: f64,

    #[schemars(description = "Part of the total recognized without touching the budget.")]
    pub uncapped_revenue: f64,
}

impl MonthlyRevenueResult {
    /// A result with no revenue that leaves the whole budget available.
    pub fn empty(available_budget: f64) -> Self {
        Self {
            remaining_budget: finite_non_negative(available_budget),
            ..Self::default()
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MonthlyRevenueResult)
    }
}

use crate::engine::{ProjectRevenue, RevenueEngine};
use crate::schema::{HourEntry, Project, ProjectType};
use crate::utils::{finite_non_negative, month_label, MONTHS_PER_YEAR};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNKNOWN_LINE: &str = "unknown";

/// Registered hours of a project, split per month and per budget line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HoursBreakdown {
    pub by_month: [f64; MONTHS_PER_YEAR],
    /// Keyed by project line id, `"unknown"` for hours without a line.
    pub by_line: BTreeMap<String, f64>,
    pub billable_hours: f64,
    pub non_billable_hours: f64,
}

impl HoursBreakdown {
    pub fn from_entries(entries: &[HourEntry], non_billable_basis_id: i64) -> Self {
        let mut breakdown = Self::default();

        for entry in entries {
            let hours = entry.usable_hours();
            breakdown.by_month[entry.month_index()] += hours;

            let line_key = entry
                .project_line_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| UNKNOWN_LINE.to_string());
            *breakdown.by_line.entry(line_key).or_insert(0.0) += hours;

            if entry.invoice_basis_id == non_billable_basis_id {
                breakdown.non_billable_hours += hours;
            } else {
                breakdown.billable_hours += hours;
            }
        }

        breakdown
    }

    pub fn total_hours(&self) -> f64 {
        self.billable_hours + self.non_billable_hours
    }
}

/// One project as served by the per-project revenue view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRevenueRow {
    pub project_id: i64,
    pub project_name: String,
    pub project_type: ProjectType,
    pub total_budget: f64,
    pub previous_year_budget_used: f64,
    /// Share of the total budget consumed after this period, `None` without a budget.
    pub budget_utilization: Option<f64>,
    pub hours: HoursBreakdown,
    pub revenue: ProjectRevenue,
}

impl ProjectRevenueRow {
    pub fn build(project: &Project, engine: &RevenueEngine) -> Self {
        let revenue = engine.calculate(project);
        let total_budget = finite_non_negative(project.total_budget);

        let budget_utilization = if total_budget > 0.0 {
            Some(project.budget_used_after(revenue.shown()) / total_budget)
        } else {
            None
        };

        Self {
            project_id: project.id,
            project_name: project.name.clone(),
            project_type: project.project_type,
            total_budget,
            previous_year_budget_used: finite_non_negative(project.previous_year_budget_used),
            budget_utilization,
            hours: HoursBreakdown::from_entries(
                &project.hour_details,
                engine.settings().non_billable_basis_id,
            ),
            revenue,
        }
    }
}

/// Revenue of all projects of one year, the combined dashboard view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevenueReport {
    pub year: i32,
    pub projects: Vec<ProjectRevenueRow>,
    pub monthly_totals: [f64; MONTHS_PER_YEAR],
    pub total_revenue: f64,
    pub totals_by_type: BTreeMap<ProjectType, f64>,
    pub over_budget_projects: usize,
}

impl RevenueReport {
    pub fn build(year: i32, projects: &[Project], engine: &RevenueEngine) -> Self {
        let rows: Vec<ProjectRevenueRow> = projects
            .iter()
            .map(|p| ProjectRevenueRow::build(p, engine))
            .collect();

        let mut monthly_totals = [0.0; MONTHS_PER_YEAR];
        let mut totals_by_type: BTreeMap<ProjectType, f64> = BTreeMap::new();
        let mut over_budget_projects = 0;

        for row in &rows {
            let shown = row.revenue.shown();
            for (total, value) in monthly_totals.iter_mut().zip(shown.monthly_revenue.iter()) {
                *total += value;
            }
            *totals_by_type.entry(row.project_type).or_insert(0.0) += shown.total_revenue;
            if shown.is_over_budget {
                over_budget_projects += 1;
            }
        }

        let total_revenue: f64 = monthly_totals.iter().sum();

        info!(
            "Revenue report {}: {} projects, total {:.2}, {} over budget",
            year,
            rows.len(),
            total_revenue,
            over_budget_projects
        );

        Self {
            year,
            projects: rows,
            monthly_totals,
            total_revenue,
            totals_by_type,
            over_budget_projects,
        }
    }

    pub fn project(&self, project_id: i64) -> Option<&ProjectRevenueRow> {
        self.projects.iter().find(|r| r.project_id == project_id)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One line per project with the default view's monthly revenue.
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Project ID,Project,Type");
        for month in 0..MONTHS_PER_YEAR {
            output.push(',');
            output.push_str(month_label(month));
        }
        output.push_str(",Total,Over Budget,Remaining Budget\n");

        for row in &self.projects {
            let shown = row.revenue.shown();
            output.push_str(&format!(
                "{},{},{}",
                row.project_id,
                csv_field(&row.project_name),
                csv_field(row.project_type.label())
            ));
            for value in &shown.monthly_revenue {
                output.push_str(&format!(",{:.2}", value));
            }
            output.push_str(&format!(
                ",{:.2},{},{:.2}\n",
                shown.total_revenue, shown.is_over_budget, shown.remaining_budget
            ));
        }

        output
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RevenueReport)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

use crate::config::EngineSettings;
use crate::schema::{
    AllocationPolicy, HourEntry, MonthlyRevenueResult, Project, ProjectLine, ProjectType,
};
use crate::utils::{finite_non_negative, month_label, MONTHS_PER_YEAR};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a single hour entry takes part in revenue recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryTreatment {
    /// Contributes nothing (non-billable hours, internal projects).
    Excluded,
    /// Hours times rate, recognized in full without touching any budget.
    Uncapped,
    /// Drawn from the fixed-price budget.
    Budgeted,
}

/// Revenue of one project with both allocation views where they apply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRevenue {
    pub project_type: ProjectType,
    pub available_budget: f64,
    pub default_policy: AllocationPolicy,
    pub project_max: MonthlyRevenueResult,
    /// Only present for fixed-price projects.
    pub line_max: Option<MonthlyRevenueResult>,
}

impl ProjectRevenue {
    /// The view the dashboard shows by default.
    pub fn shown(&self) -> &MonthlyRevenueResult {
        match (self.default_policy, &self.line_max) {
            (AllocationPolicy::LineMax, Some(line_max)) => line_max,
            _ => &self.project_max,
        }
    }
}

enum Draw {
    Full(f64),
    Clipped(f64),
    Empty,
}

/// A shrinking budget. Tracks what was consumed rather than what is left so
/// the capped total can be reconciled against the exact starting amount.
struct BudgetPool {
    available: f64,
    consumed: f64,
}

impl BudgetPool {
    fn new(available: f64) -> Self {
        Self {
            available: finite_non_negative(available),
            consumed: 0.0,
        }
    }

    fn remaining(&self) -> f64 {
        (self.available - self.consumed).max(0.0)
    }

    fn draw(&mut self, amount: f64) -> Draw {
        let remaining = self.remaining();
        if remaining <= 0.0 {
            return Draw::Empty;
        }

        if amount <= remaining {
            self.consumed += amount;
            Draw::Full(amount)
        } else {
            self.consumed = self.available;
            Draw::Clipped(remaining)
        }
    }
}

// Per-month accumulators of a single computation
struct MonthlyLedger {
    capped: [f64; MONTHS_PER_YEAR],
    uncapped: [f64; MONTHS_PER_YEAR],
    over_budget: [bool; MONTHS_PER_YEAR],
    exhausted_from: Option<usize>,
}

impl MonthlyLedger {
    fn new() -> Self {
        Self {
            capped: [0.0; MONTHS_PER_YEAR],
            uncapped: [0.0; MONTHS_PER_YEAR],
            over_budget: [false; MONTHS_PER_YEAR],
            exhausted_from: None,
        }
    }

    fn book_uncapped(&mut self, month: usize, amount: f64) {
        self.uncapped[month] += amount;
    }

    fn flag(&mut self, month: usize) {
        self.over_budget[month] = true;
    }

    fn book_draw(&mut self, month: usize, requested: f64, draw: Draw) {
        match draw {
            Draw::Full(amount) => self.capped[month] += amount,
            Draw::Clipped(amount) => {
                debug!(
                    "Budget exhausted in {}: recognized {:.2} of {:.2}",
                    month_label(month),
                    amount,
                    requested
                );
                self.capped[month] += amount;
                self.mark_exhausted(month);
            }
            Draw::Empty => self.mark_exhausted(month),
        }
    }

    fn mark_exhausted(&mut self, month: usize) {
        self.flag(month);
        if self.exhausted_from.is_none() {
            self.exhausted_from = Some(month);
        }
    }

    fn finish(mut self, available: f64) -> MonthlyRevenueResult {
        if let Some(first) = self.exhausted_from {
            for flag in self.over_budget.iter_mut().skip(first) {
                *flag = true;
            }
        }

        self.reconcile_cap(available);

        let mut monthly_revenue = [0.0; MONTHS_PER_YEAR];
        for (month, value) in monthly_revenue.iter_mut().enumerate() {
            *value = self.capped[month] + self.uncapped[month];
        }

        let capped_revenue: f64 = self.capped.iter().sum();
        let uncapped_revenue: f64 = self.uncapped.iter().sum();
        let total_revenue: f64 = monthly_revenue.iter().sum();

        MonthlyRevenueResult {
            monthly_revenue,
            monthly_over_budget: self.over_budget,
            total_revenue,
            is_over_budget: self.over_budget.iter().any(|&f| f),
            remaining_budget: (available - capped_revenue).max(0.0),
            capped_revenue,
            uncapped_revenue,
        }
    }

    /// Summing per month regroups the per-entry draws, which can push the
    /// capped total a few ulps past the budget. Take the excess off the last
    /// month that drew from the pool.
    fn reconcile_cap(&mut self, available: f64) {
        for _ in 0..8 {
            let total: f64 = self.capped.iter().sum();
            if total <= available {
                return;
            }

            let Some(last) = self.capped.iter().rposition(|&v| v > 0.0) else {
                return;
            };
            let excess = total - available;
            self.capped[last] = (self.capped[last] - excess).max(0.0);
        }
    }
}

/// Returns the entries in stable chronological order, grouped per month.
fn group_by_month(entries: &[HourEntry]) -> [Vec<&HourEntry>; MONTHS_PER_YEAR] {
    let mut ordered: Vec<&HourEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.date);

    let mut months: [Vec<&HourEntry>; MONTHS_PER_YEAR] = std::array::from_fn(|_| Vec::new());
    for entry in ordered {
        months[entry.month_index()].push(entry);
    }
    months
}

pub struct RevenueEngine {
    settings: EngineSettings,
}

impl Default for RevenueEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl RevenueEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Decides whether an entry produces revenue at all, independent of budget.
    pub fn treatment(&self, project_type: ProjectType, entry: &HourEntry) -> EntryTreatment {
        if entry.invoice_basis_id == self.settings.non_billable_basis_id {
            return EntryTreatment::Excluded;
        }

        match project_type {
            ProjectType::Intern => EntryTreatment::Excluded,
            ProjectType::FixedPrice if entry.invoice_basis_id == self.settings.hourly_basis_id => {
                EntryTreatment::Uncapped
            }
            ProjectType::FixedPrice => EntryTreatment::Budgeted,
            ProjectType::Contract
            | ProjectType::TimeAndMaterials
            | ProjectType::Quote
            | ProjectType::Unclassified => EntryTreatment::Uncapped,
        }
    }

    /// Revenue of a project under its type's rules. Fixed-price projects get
    /// both allocation views.
    pub fn calculate(&self, project: &Project) -> ProjectRevenue {
        let available = project.available_budget();

        let (project_max, line_max) = if project.project_type.is_budget_capped() {
            let project_max = self.project_max(&project.hour_details, available);
            let line_max =
                self.line_max(&project.hour_details, &project.project_lines, available);
            (project_max, Some(line_max))
        } else {
            (
                self.uncapped(project.project_type, &project.hour_details, available),
                None,
            )
        };

        debug!(
            "Project {} ({}): {} entries, available {:.2}, recognized {:.2}{}",
            project.id,
            project.project_type,
            project.hour_details.len(),
            available,
            project_max.total_revenue,
            if project_max.is_over_budget {
                ", over budget"
            } else {
                ""
            }
        );

        ProjectRevenue {
            project_type: project.project_type,
            available_budget: available,
            default_policy: self.settings.default_policy,
            project_max,
            line_max,
        }
    }

    /// Allocates fixed-price revenue against one project-wide pool.
    pub fn project_max(
        &self,
        entries: &[HourEntry],
        available_budget: f64,
    ) -> MonthlyRevenueResult {
        let mut pool = BudgetPool::new(available_budget);
        let mut ledger = MonthlyLedger::new();

        for (month, month_entries) in group_by_month(entries).iter().enumerate() {
            for entry in month_entries {
                let revenue = entry.nominal_revenue();
                match self.treatment(ProjectType::FixedPrice, entry) {
                    EntryTreatment::Excluded => {}
                    EntryTreatment::Uncapped => ledger.book_uncapped(month, revenue),
                    EntryTreatment::Budgeted => {
                        let draw = pool.draw(revenue);
                        ledger.book_draw(month, revenue, draw);
                    }
                }
            }
        }

        ledger.finish(pool.available)
    }

    /// Allocates fixed-price revenue line by line, then against the project pool.
    ///
    /// A line can afford `line budget / entry rate` hours. The limit is
    /// recomputed with every entry's own rate, so mixed rates on one line
    /// shift which hours fit. Entries without a known line contribute nothing.
    pub fn line_max(
        &self,
        entries: &[HourEntry],
        lines: &[ProjectLine],
        available_budget: f64,
    ) -> MonthlyRevenueResult {
        let mut line_budgets: BTreeMap<i64, f64> = BTreeMap::new();
        for line in lines {
            line_budgets.entry(line.id).or_insert_with(|| line.budget());
        }

        let mut line_hours_used: BTreeMap<i64, f64> = BTreeMap::new();
        let mut pool = BudgetPool::new(available_budget);
        let mut ledger = MonthlyLedger::new();

        for (month, month_entries) in group_by_month(entries).iter().enumerate() {
            for entry in month_entries {
                let hours = entry.usable_hours();
                match self.treatment(ProjectType::FixedPrice, entry) {
                    EntryTreatment::Excluded => {}
                    EntryTreatment::Uncapped => {
                        ledger.book_uncapped(month, entry.nominal_revenue())
                    }
                    EntryTreatment::Budgeted => {
                        let Some((line_id, line_budget)) = entry
                            .project_line_id
                            .and_then(|id| line_budgets.get(&id).map(|b| (id, *b)))
                        else {
                            debug!(
                                "Skipping {:.2}h in {} without a resolvable project line",
                                hours,
                                month_label(month)
                            );
                            continue;
                        };

                        // Nothing to fit on the line, but an empty pool still flags.
                        if hours <= 0.0 {
                            let draw = pool.draw(0.0);
                            ledger.book_draw(month, 0.0, draw);
                            continue;
                        }

                        let rate = entry.usable_rate();
                        let line_hours_limit = if rate > 0.0 {
                            line_budget / rate
                        } else {
                            0.0
                        };

                        let used = line_hours_used.entry(line_id).or_insert(0.0);
                        let available_line_hours = (line_hours_limit - *used).max(0.0);

                        if available_line_hours <= 0.0 {
                            ledger.flag(month);
                            continue;
                        }

                        let usable_hours = hours.min(available_line_hours);
                        if usable_hours < hours {
                            debug!(
                                "Line {} exhausted in {}: {:.2}h of {:.2}h fit",
                                line_id,
                                month_label(month),
                                usable_hours,
                                hours
                            );
                            ledger.flag(month);
                        }
                        *used += usable_hours;

                        let line_revenue = finite_non_negative(usable_hours * rate);
                        let draw = pool.draw(line_revenue);
                        ledger.book_draw(month, line_revenue, draw);
                    }
                }
            }
        }

        ledger.finish(pool.available)
    }

    /// Recognizes every entry in full, for project types without a budget cap.
    pub fn uncapped(
        &self,
        project_type: ProjectType,
        entries: &[HourEntry],
        available_budget: f64,
    ) -> MonthlyRevenueResult {
        let available = finite_non_negative(available_budget);
        if project_type == ProjectType::Intern {
            return MonthlyRevenueResult::empty(available);
        }

        let mut ledger = MonthlyLedger::new();

        for entry in entries {
            if self.treatment(project_type, entry) == EntryTreatment::Excluded {
                continue;
            }
            ledger.book_uncapped(entry.month_index(), entry.nominal_revenue());
        }

        let mut result = ledger.finish(available);
        result.remaining_budget = (available - result.total_revenue).max(0.0);
        result
    }
}

/// Project-Max view of `project` with default settings.
pub fn calculate_project_max_revenue(
    project: &Project,
    available_budget: f64,
) -> MonthlyRevenueResult {
    RevenueEngine::default().project_max(&project.hour_details, available_budget)
}

/// Line-Max view of `project` with default settings.
pub fn calculate_line_max_revenue(
    project: &Project,
    available_budget: f64,
) -> MonthlyRevenueResult {
    RevenueEngine::default().line_max(
        &project.hour_details,
        &project.project_lines,
        available_budget,
    )
}

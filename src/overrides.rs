use crate::schema::{Project, ProjectType};
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Manual corrections applied to synchronized projects before revenue is computed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct ProjectOverrides {
    #[schemars(description = "Ordered list of modifications. Later entries win.")]
    #[serde(default)]
    pub modifications: Vec<ProjectModification>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProjectModification {
    /// Force the project type, e.g. when the tags in the source system are wrong.
    SetProjectType {
        project_id: i64,
        project_type: ProjectType,
    },

    /// Replace the contractual budget of the current period.
    SetTotalBudget { project_id: i64, value: f64 },

    /// Replace the budget consumed in earlier periods.
    SetPreviousYearBudgetUsed { project_id: i64, value: f64 },

    /// Leave the project out of every report.
    Exclude { project_id: i64 },
}

impl ProjectModification {
    pub fn project_id(&self) -> i64 {
        match self {
            ProjectModification::SetProjectType { project_id, .. }
            | ProjectModification::SetTotalBudget { project_id, .. }
            | ProjectModification::SetPreviousYearBudgetUsed { project_id, .. }
            | ProjectModification::Exclude { project_id } => *project_id,
        }
    }
}

impl ProjectOverrides {
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Applies the overrides to a copy of `projects`; the input stays untouched.
    pub fn apply(&self, projects: &[Project]) -> Vec<Project> {
        let mut projects = projects.to_vec();

        for modification in &self.modifications {
            apply_single_modification(&mut projects, modification);
        }

        projects
    }
}

fn apply_single_modification(projects: &mut Vec<Project>, modification: &ProjectModification) {
    let project_id = modification.project_id();

    if let ProjectModification::Exclude { .. } = modification {
        projects.retain(|p| p.id != project_id);
        return;
    }

    let Some(project) = projects.iter_mut().find(|p| p.id == project_id) else {
        warn!("Override targets unknown project {}", project_id);
        return;
    };

    match modification {
        ProjectModification::SetProjectType { project_type, .. } => {
            project.project_type = *project_type;
        }
        ProjectModification::SetTotalBudget { value, .. } => {
            project.total_budget = *value;
        }
        ProjectModification::SetPreviousYearBudgetUsed { value, .. } => {
            project.previous_year_budget_used = *value;
        }
        ProjectModification::Exclude { .. } => {}
    }
}

use crate::classification::{ProjectTag, TagTable};
use crate::error::RevenueError;
use crate::rates::RateResolver;
use crate::schema::{HourEntry, Project, ProjectLine};
use crate::utils::{finite_non_negative, parse_decimal, parse_record_date};
use chrono::Datelike;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A numeric field as it sits in a synchronized row: a JSON number or a string.
/// Any other JSON value is kept as-is and reads as unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawNumber {
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            RawNumber::Number(n) if n.is_finite() => Some(*n),
            RawNumber::Number(_) | RawNumber::Other(_) => None,
            RawNumber::Text(s) => parse_decimal(s),
        }
    }

    pub fn to_id(&self) -> Option<i64> {
        self.to_f64()
            .filter(|v| v.fract() == 0.0 && *v >= 0.0)
            .map(|v| v as i64)
    }
}

impl From<f64> for RawNumber {
    fn from(value: f64) -> Self {
        RawNumber::Number(value)
    }
}

impl From<&str> for RawNumber {
    fn from(value: &str) -> Self {
        RawNumber::Text(value.to_string())
    }
}

/// Reads a field, falling back to its default when the stored value has the
/// wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match T::deserialize(&value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            warn!("Ignoring malformed value {}: {}", value, e);
            Ok(T::default())
        }
    }
}

fn raw_id(value: Option<&RawNumber>) -> Option<i64> {
    value.and_then(RawNumber::to_id)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHourRecord {
    #[serde(default)]
    pub id: Option<RawNumber>,
    #[serde(default)]
    pub project_id: Option<RawNumber>,
    #[serde(default, deserialize_with = "lenient")]
    pub date: Option<String>,
    /// Registered hours.
    #[serde(default)]
    pub amount: Option<RawNumber>,
    #[serde(default)]
    pub invoice_basis_id: Option<RawNumber>,
    #[serde(default)]
    pub project_line_id: Option<RawNumber>,
    #[serde(default)]
    pub employee_id: Option<RawNumber>,
}

impl RawHourRecord {
    fn label(&self) -> String {
        match &self.id {
            Some(raw) => match raw.to_id() {
                Some(id) => id.to_string(),
                None => format!("{:?}", raw),
            },
            None => "without id".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProjectLine {
    #[serde(default)]
    pub id: Option<RawNumber>,
    #[serde(default)]
    pub amount: Option<RawNumber>,
    #[serde(default)]
    pub selling_price: Option<RawNumber>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProject {
    #[serde(default)]
    pub id: Option<RawNumber>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub tags: Vec<ProjectTag>,
    /// Stored manual classification, e.g. "Vaste Prijs".
    #[serde(default, deserialize_with = "lenient")]
    pub type_override: Option<String>,
    #[serde(default)]
    pub total_budget: Option<RawNumber>,
    #[serde(default)]
    pub previous_year_budget_used: Option<RawNumber>,
    #[serde(default, deserialize_with = "lenient")]
    pub lines: Vec<RawProjectLine>,
}

fn number_or_zero(value: Option<&RawNumber>, field: &str, owner: &str) -> f64 {
    match value {
        None => 0.0,
        Some(raw) => match raw.to_f64() {
            Some(v) => v,
            None => {
                warn!("{}: malformed {} {:?}, using 0", owner, field, raw);
                0.0
            }
        },
    }
}

/// Builds the canonical projects of one report year from synchronized rows.
///
/// Hours keep their input order per project and are limited to `year`.
/// Rows that cannot be read degrade instead of failing the batch: malformed
/// numbers become zero; projects without a usable id, hours without a
/// usable project or date, and hours of unknown projects are dropped.
pub fn assemble_projects(
    projects: &[RawProject],
    hours: &[RawHourRecord],
    year: i32,
    tags: &TagTable,
    rates: &RateResolver,
) -> Vec<Project> {
    let identified: Vec<(i64, &RawProject)> = projects
        .iter()
        .filter_map(|raw| match raw_id(raw.id.as_ref()) {
            Some(id) => Some((id, raw)),
            None => {
                warn!(
                    "Skipping project {:?} ({:?}) without a usable id",
                    raw.name, raw.id
                );
                None
            }
        })
        .collect();
    let known: BTreeSet<i64> = identified.iter().map(|(id, _)| *id).collect();

    let mut hours_by_project: BTreeMap<i64, Vec<&RawHourRecord>> = BTreeMap::new();
    let mut orphaned: BTreeSet<i64> = BTreeSet::new();
    for record in hours {
        let Some(project_id) = raw_id(record.project_id.as_ref()) else {
            warn!(
                "Skipping hour record {} without a usable project id {:?}",
                record.label(),
                record.project_id
            );
            continue;
        };

        if known.contains(&project_id) {
            hours_by_project.entry(project_id).or_default().push(record);
        } else if orphaned.insert(project_id) {
            warn!("Dropping hours of unknown project {}", project_id);
        }
    }

    identified
        .into_iter()
        .map(|(id, raw)| {
            let records = hours_by_project
                .get(&id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            assemble_project(id, raw, records, year, tags, rates)
        })
        .collect()
}

fn assemble_project(
    id: i64,
    raw: &RawProject,
    records: &[&RawHourRecord],
    year: i32,
    tags: &TagTable,
    rates: &RateResolver,
) -> Project {
    let owner = format!("project {}", id);
    let name = raw.name.clone().unwrap_or_default();
    let classification = tags.classify(&name, &raw.tags, raw.type_override.as_deref());

    let lines: Vec<ProjectLine> = raw
        .lines
        .iter()
        .filter_map(|line| {
            let Some(line_id) = raw_id(line.id.as_ref()) else {
                warn!("{}: skipping line without a usable id {:?}", owner, line.id);
                return None;
            };
            let line_owner = format!("{} line {}", owner, line_id);
            Some(ProjectLine::new(
                line_id,
                number_or_zero(line.amount.as_ref(), "amount", &line_owner),
                number_or_zero(line.selling_price.as_ref(), "selling price", &line_owner),
            ))
        })
        .collect();

    let mut hour_details = Vec::with_capacity(records.len());
    for record in records {
        let parsed = match record.date.as_deref() {
            Some(raw_date) => parse_record_date(raw_date),
            None => Err(RevenueError::DateError("missing date".to_string())),
        };
        let date = match parsed {
            Ok(date) => date,
            Err(e) => {
                warn!("{}: skipping hour record {}: {}", owner, record.label(), e);
                continue;
            }
        };
        if date.year() != year {
            continue;
        }

        let record_owner = format!("{} hour record {}", owner, record.label());
        let project_line_id = raw_id(record.project_line_id.as_ref());
        let rate = rates.resolve(id, &lines, project_line_id);

        hour_details.push(HourEntry {
            id: raw_id(record.id.as_ref()),
            date,
            hours: finite_non_negative(number_or_zero(
                record.amount.as_ref(),
                "amount",
                &record_owner,
            )),
            hourly_rate: rate.rate,
            invoice_basis_id: raw_id(record.invoice_basis_id.as_ref()).unwrap_or(0),
            project_line_id,
            employee_id: raw_id(record.employee_id.as_ref()),
        });
    }

    debug!(
        "{} '{}' classified as {} ({:?}), {} hour entries in {}",
        owner,
        name,
        classification.project_type,
        classification.source,
        hour_details.len(),
        year
    );

    Project {
        id,
        name,
        project_type: classification.project_type,
        total_budget: number_or_zero(raw.total_budget.as_ref(), "total budget", &owner),
        previous_year_budget_used: number_or_zero(
            raw.previous_year_budget_used.as_ref(),
            "previous year budget used",
            &owner,
        ),
        hour_details,
        project_lines: lines,
    }
}

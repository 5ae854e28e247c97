use crate::schema::ProjectLine;
use crate::utils::finite_non_negative;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    ProjectLine,
    ProjectAverage,
    External,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub rate: f64,
    pub source: RateSource,
}

/// Picks the hourly rate of a time registration.
///
/// First usable value wins: the selling price of the booked line, the
/// amount-weighted average selling price of the project's lines, an
/// externally supplied rate for the project, the configured fallback.
#[derive(Debug, Clone)]
pub struct RateResolver {
    external: BTreeMap<i64, f64>,
    fallback: f64,
}

impl RateResolver {
    pub fn new(fallback: f64) -> Self {
        Self {
            external: BTreeMap::new(),
            fallback: finite_non_negative(fallback),
        }
    }

    pub fn with_external_rates(mut self, rates: BTreeMap<i64, f64>) -> Self {
        self.external = rates;
        self
    }

    pub fn resolve(
        &self,
        project_id: i64,
        lines: &[ProjectLine],
        line_id: Option<i64>,
    ) -> ResolvedRate {
        let line_rate = line_id
            .and_then(|id| lines.iter().find(|l| l.id == id))
            .map(|l| finite_non_negative(l.selling_price))
            .filter(|r| *r > 0.0);
        if let Some(rate) = line_rate {
            return ResolvedRate {
                rate,
                source: RateSource::ProjectLine,
            };
        }

        if let Some(rate) = project_average_rate(lines) {
            return ResolvedRate {
                rate,
                source: RateSource::ProjectAverage,
            };
        }

        let external = self
            .external
            .get(&project_id)
            .map(|r| finite_non_negative(*r))
            .filter(|r| *r > 0.0);
        if let Some(rate) = external {
            return ResolvedRate {
                rate,
                source: RateSource::External,
            };
        }

        ResolvedRate {
            rate: self.fallback,
            source: RateSource::Fallback,
        }
    }
}

/// Average selling price over lines with a price, weighted by amount.
/// Falls back to a plain mean when no line carries an amount.
pub fn project_average_rate(lines: &[ProjectLine]) -> Option<f64> {
    let priced: Vec<&ProjectLine> = lines
        .iter()
        .filter(|l| finite_non_negative(l.selling_price) > 0.0)
        .collect();
    if priced.is_empty() {
        return None;
    }

    let total_amount: f64 = priced.iter().map(|l| finite_non_negative(l.amount)).sum();
    let average = if total_amount > 0.0 {
        priced.iter().map(|l| l.budget()).sum::<f64>() / total_amount
    } else {
        priced.iter().map(|l| l.selling_price).sum::<f64>() / priced.len() as f64
    };

    Some(average).filter(|a| a.is_finite() && *a > 0.0)
}

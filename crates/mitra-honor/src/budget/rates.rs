use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{CeilingRule, HonorRate, JobCode, Rupiah, SubActivityId};

const MONTHS_PER_YEAR: Rupiah = 12;

/// Tariff and quota resolved for one `(sub-activity, job-code)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub tariff: Rupiah,
    pub unit_label: String,
    pub target_volume: u64,
}

/// Look up the honor tariff for a job-code. The first matching row wins.
pub fn resolve_rate(
    sub_activity_id: SubActivityId,
    job_code: &JobCode,
    rates: &[HonorRate],
) -> Option<ResolvedRate> {
    rates
        .iter()
        .find(|rate| rate.sub_activity_id == sub_activity_id && &rate.job_code == job_code)
        .map(|rate| ResolvedRate {
            tariff: rate.tariff,
            unit_label: rate.unit_label.clone(),
            target_volume: rate.basis_volume,
        })
}

/// Monthly ceiling configured for `year`; `0` means no ceiling.
pub fn resolve_ceiling(year: i32, rules: &[CeilingRule]) -> Rupiah {
    rules
        .iter()
        .find(|rule| rule.year == year)
        .map(|rule| rule.monthly_ceiling)
        .unwrap_or(0)
}

/// Yearly ceiling derived from the monthly rule; stays `0` when uncapped.
pub fn annual_ceiling(year: i32, rules: &[CeilingRule]) -> Rupiah {
    resolve_ceiling(year, rules)
        .max(0)
        .saturating_mul(MONTHS_PER_YEAR)
}

/// Ceiling rules validated at the data layer: one positive rule per year.
///
/// A year configured more than once is remembered as ambiguous instead of
/// failing the whole table, so only evaluations in that year are refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CeilingTable {
    rules: Vec<CeilingRule>,
    ambiguous: BTreeSet<i32>,
}

impl CeilingTable {
    pub fn from_rules(rules: Vec<CeilingRule>) -> Self {
        let mut seen = BTreeSet::new();
        let mut ambiguous = BTreeSet::new();
        let mut accepted = Vec::with_capacity(rules.len());

        for rule in rules {
            if rule.monthly_ceiling <= 0 {
                warn!(
                    rule_id = rule.id,
                    year = rule.year,
                    amount = rule.monthly_ceiling,
                    "ignoring non-positive honor ceiling"
                );
                continue;
            }

            if !seen.insert(rule.year) {
                if ambiguous.insert(rule.year) {
                    warn!(year = rule.year, "honor ceiling configured more than once");
                }
                continue;
            }
            accepted.push(rule);
        }

        Self {
            rules: accepted,
            ambiguous,
        }
    }

    pub fn rules(&self) -> &[CeilingRule] {
        &self.rules
    }

    pub fn ambiguous_years(&self) -> impl Iterator<Item = i32> + '_ {
        self.ambiguous.iter().copied()
    }

    /// Fails when `year` has more than one ceiling rule.
    pub fn ensure_unambiguous(&self, year: i32) -> Result<(), CeilingTableError> {
        if self.ambiguous.contains(&year) {
            return Err(CeilingTableError::DuplicatePeriod { year });
        }
        Ok(())
    }

    pub fn monthly(&self, year: i32) -> Rupiah {
        resolve_ceiling(year, &self.rules)
    }

    pub fn annual(&self, year: i32) -> Rupiah {
        annual_ceiling(year, &self.rules)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CeilingTableError {
    #[error("honor ceiling for period {year} is configured more than once")]
    DuplicatePeriod { year: i32 },
}

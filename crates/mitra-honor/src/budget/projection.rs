use serde::{Deserialize, Serialize};

use super::domain::{JobCode, Rupiah};
use super::income::volume_as_amount;
use super::rates::ResolvedRate;

/// Projected monthly income of a mitra once a candidate allocation is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeProjection {
    pub job_code: JobCode,
    pub existing_income: Rupiah,
    pub candidate_income: Rupiah,
    pub total: Rupiah,
    pub ceiling: Rupiah,
    pub is_over: bool,
    /// `false` when the job-code has no tariff row ("Jabatan Tidak Ditemukan").
    pub rate_found: bool,
}

impl IncomeProjection {
    /// Remaining room under the ceiling; `None` when uncapped.
    pub fn headroom(&self) -> Option<Rupiah> {
        (self.ceiling > 0).then(|| self.ceiling.saturating_sub(self.total))
    }

    pub fn excess(&self) -> Rupiah {
        if self.is_over {
            self.total.saturating_sub(self.ceiling)
        } else {
            0
        }
    }
}

/// Combine already-committed income with a candidate allocation.
///
/// A ceiling of zero or below never flags the projection as over.
pub fn project(
    existing_income: Rupiah,
    candidate_job_code: &JobCode,
    candidate_volume: u64,
    rate: Option<&ResolvedRate>,
    ceiling: Rupiah,
) -> IncomeProjection {
    let candidate_income = rate
        .map(|rate| rate.tariff.saturating_mul(volume_as_amount(candidate_volume)))
        .unwrap_or(0);
    let total = existing_income.saturating_add(candidate_income);

    IncomeProjection {
        job_code: candidate_job_code.clone(),
        existing_income,
        candidate_income,
        total,
        ceiling,
        is_over: ceiling > 0 && total > ceiling,
        rate_found: rate.is_some(),
    }
}

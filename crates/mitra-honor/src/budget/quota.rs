use serde::{Deserialize, Serialize};

use super::domain::{Allocation, JobCode};

/// Progress of a job-code against its basis volume within a sub-activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeQuota {
    pub job_code: JobCode,
    pub assigned: u64,
    pub target: u64,
    /// Clamped at zero; see `overflow` for the amount past the target.
    pub remaining: u64,
    /// Unclamped, so values above 100 stay distinguishable.
    pub percent: f64,
    pub is_over: bool,
}

impl VolumeQuota {
    pub fn overflow(&self) -> u64 {
        self.assigned.saturating_sub(self.target)
    }

    /// Percentage clamped for progress-bar rendering.
    pub fn bar_width(&self) -> f64 {
        self.percent.clamp(0.0, 100.0)
    }
}

/// Sum committed and draft volumes for `job_code` and compare them with `target`.
pub fn track_volume<C, D>(job_code: &JobCode, target: u64, committed: &[C], draft: &[D]) -> VolumeQuota
where
    C: Allocation,
    D: Allocation,
{
    let committed_volume = sum_matching(job_code, committed);
    let draft_volume = sum_matching(job_code, draft);
    let assigned = committed_volume.saturating_add(draft_volume);

    let percent = if target > 0 {
        (assigned as f64 / target as f64) * 100.0
    } else {
        0.0
    };

    VolumeQuota {
        job_code: job_code.clone(),
        assigned,
        target,
        remaining: target.saturating_sub(assigned),
        percent,
        is_over: assigned > target,
    }
}

fn sum_matching<A: Allocation>(job_code: &JobCode, allocations: &[A]) -> u64 {
    allocations
        .iter()
        .filter(|allocation| allocation.job_code() == job_code)
        .fold(0, |total: u64, allocation| {
            total.saturating_add(allocation.volume())
        })
}

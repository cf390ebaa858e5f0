use serde::{Deserialize, Serialize};

use super::domain::JobCode;
use super::gate::ProjectionRow;

/// Validation state of a single candidate allocation while it is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationState {
    Draft,
    Incomplete,
    ValidUnderBudget,
    ValidOverBudget,
}

impl AllocationState {
    pub const fn label(self) -> &'static str {
        match self {
            AllocationState::Draft => "draft",
            AllocationState::Incomplete => "incomplete",
            AllocationState::ValidUnderBudget => "valid_under_budget",
            AllocationState::ValidOverBudget => "valid_over_budget",
        }
    }
}

/// Terminal state of a submission after the gate has been consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Committed,
    Rejected,
    CommittedWithOverride,
}

impl SubmitOutcome {
    pub const fn proceeds(self) -> bool {
        !matches!(self, SubmitOutcome::Rejected)
    }
}

pub fn classify_allocation(
    job_code: Option<&JobCode>,
    volume: Option<u64>,
    row: Option<&ProjectionRow>,
) -> AllocationState {
    let has_code = job_code.is_some_and(|code| !code.is_empty());
    let has_volume = volume.is_some_and(|volume| volume > 0);

    match (has_code, has_volume, row) {
        (false, false, _) => AllocationState::Draft,
        (true, true, Some(row)) if row.is_over() => AllocationState::ValidOverBudget,
        (true, true, Some(_)) => AllocationState::ValidUnderBudget,
        _ => AllocationState::Incomplete,
    }
}

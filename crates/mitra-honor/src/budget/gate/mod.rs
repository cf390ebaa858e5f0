mod policy;
mod rules;

pub use policy::GatePolicy;

use serde::{Deserialize, Serialize};

use super::domain::{JobCode, MitraId, Period, Rupiah};
use super::lifecycle::SubmitOutcome;
use super::projection::IncomeProjection;
use super::quota::VolumeQuota;

/// Volume and income results for one candidate allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub row: usize,
    pub mitra_id: MitraId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitra_name: Option<String>,
    pub period: Option<Period>,
    pub volume: VolumeQuota,
    pub income: IncomeProjection,
}

impl ProjectionRow {
    pub fn is_over(&self) -> bool {
        self.volume.is_over || self.income.is_over
    }

    pub fn label(&self) -> String {
        match &self.mitra_name {
            Some(name) => name.clone(),
            None => format!("mitra #{}", self.mitra_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViolationKind {
    VolumeExceeded {
        job_code: JobCode,
        assigned: u64,
        target: u64,
    },
    CeilingExceeded {
        total: Rupiah,
        ceiling: Rupiah,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationDetail {
    pub row: usize,
    pub mitra_id: MitraId,
    pub kind: ViolationKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoticeKind {
    RateNotFound { job_code: JobCode },
    UndatedPeriod,
}

/// Non-blocking data-quality findings surfaced next to violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateNotice {
    pub row: usize,
    pub mitra_id: MitraId,
    pub kind: NoticeKind,
    pub message: String,
}

/// Classification of a batch of projections under one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub policy: GatePolicy,
    pub blocked: bool,
    pub requires_confirmation: bool,
    pub violations: Vec<ViolationDetail>,
    pub notices: Vec<GateNotice>,
}

impl GateDecision {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Single confirm/cancel prompt listing every distinct violation.
    pub fn prompt(&self) -> Option<String> {
        if !self.requires_confirmation {
            return None;
        }

        let lines = self
            .violations
            .iter()
            .map(|violation| format!("- {}", violation.message))
            .collect::<Vec<_>>()
            .join("\n");
        Some(format!("Budget warnings found:\n{lines}\nProceed anyway?"))
    }

    /// Terminal state of the submission given the user's answer to the prompt.
    pub fn resolve(&self, confirmed: bool) -> SubmitOutcome {
        if self.blocked {
            return SubmitOutcome::Rejected;
        }
        if self.is_clean() {
            return SubmitOutcome::Committed;
        }

        match self.policy {
            GatePolicy::Import => SubmitOutcome::Committed,
            GatePolicy::ManualEdit => SubmitOutcome::CommittedWithOverride,
            GatePolicy::Promote if confirmed => SubmitOutcome::CommittedWithOverride,
            GatePolicy::Promote => SubmitOutcome::Rejected,
        }
    }
}

/// Stateless classifier consumed by save, import, and promote flows.
#[derive(Debug, Clone, Copy)]
pub struct BudgetGate {
    policy: GatePolicy,
}

impl BudgetGate {
    pub fn new(policy: GatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    pub fn evaluate(&self, rows: &[ProjectionRow]) -> GateDecision {
        let findings = rules::inspect_rows(rows);
        let classification = policy::classify(self.policy, findings.violations);

        GateDecision {
            policy: self.policy,
            blocked: classification.blocked,
            requires_confirmation: classification.requires_confirmation,
            violations: classification.violations,
            notices: findings.notices,
        }
    }
}

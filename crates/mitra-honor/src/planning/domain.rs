use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::budget::{
    AllocationState, DraftAllocation, GateDecision, GatePolicy, IncomePool, JobCode, Period,
    ProjectionRow, RecordKind, RecordRef, SubActivityId, SubmitOutcome,
};

fn assignment_kind() -> RecordKind {
    RecordKind::Assignment
}

/// Ad-hoc evaluation of drafts without writing anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationCheckRequest {
    pub policy: GatePolicy,
    #[serde(default = "assignment_kind")]
    pub kind: RecordKind,
    pub sub_activity_id: SubActivityId,
    pub allocations: Vec<DraftAllocation>,
    #[serde(default)]
    pub pool: IncomePool,
    /// Fallback period when the sub-activity has no start date.
    #[serde(default)]
    pub period: Option<Period>,
    /// Id of the record (of `kind`) being edited.
    #[serde(default)]
    pub exclude_record: Option<u64>,
    #[serde(default)]
    pub exclude_group: Option<u64>,
}

impl AllocationCheckRequest {
    pub fn excluded_record(&self) -> Option<RecordRef> {
        self.exclude_record.map(|id| RecordRef { kind: self.kind, id })
    }
}

/// Projection plus the lifecycle state it puts the allocation in.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewedRow {
    #[serde(flatten)]
    pub projection: ProjectionRow,
    pub state: AllocationState,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationReview {
    pub rows: Vec<ReviewedRow>,
    pub decision: GateDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// New Assignment (penugasan) or Plan (perencanaan) with its members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordRequest {
    #[serde(default = "assignment_kind")]
    pub kind: RecordKind,
    pub sub_activity_id: SubActivityId,
    #[serde(default)]
    pub supervisor_id: Option<u64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub members: Vec<DraftAllocation>,
}

/// Manual edit of a single plan group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanGroupUpdate {
    pub job_code: JobCode,
    pub volume: u64,
}

/// Outcome of a write that went through the gate.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    pub outcome: SubmitOutcome,
    pub decision: GateDecision,
    pub rows: Vec<ProjectionRow>,
}

/// Spreadsheet rows already parsed by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(default = "assignment_kind")]
    pub kind: RecordKind,
    pub sub_activity_id: SubActivityId,
    pub rows: Vec<DraftAllocation>,
}

/// Field where the local engine and the backend preview disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftField {
    ExistingIncome,
    CandidateIncome,
    Ceiling,
    TargetVolume,
    OverLimit,
    OverVolume,
}

impl DriftField {
    pub const fn label(self) -> &'static str {
        match self {
            DriftField::ExistingIncome => "existing_income",
            DriftField::CandidateIncome => "candidate_income",
            DriftField::Ceiling => "ceiling",
            DriftField::TargetVolume => "target_volume",
            DriftField::OverLimit => "over_limit",
            DriftField::OverVolume => "over_volume",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewDrift {
    pub row: usize,
    pub field: DriftField,
    pub local: i64,
    pub server: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportPreview {
    pub rows: Vec<ProjectionRow>,
    pub server_rows: Vec<ProjectionRow>,
    /// Policy A decision over both local and server projections.
    pub decision: GateDecision,
    pub drift: Vec<PreviewDrift>,
}

impl ImportPreview {
    pub fn can_commit(&self) -> bool {
        !self.decision.blocked
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteRequest {
    pub plan_ids: Vec<u64>,
    /// Answer to the confirmation prompt; omitted on the first attempt.
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotionReport {
    pub outcome: SubmitOutcome,
    pub decision: GateDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub rows: Vec<ProjectionRow>,
    pub promoted: Vec<u64>,
}

/// Query for the income recap; `month` omitted means the whole year.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RecapQuery {
    pub year: i32,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub pool: IncomePool,
}

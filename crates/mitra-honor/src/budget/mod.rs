//! Honorarium budget consistency engine.
//!
//! Pure functions over in-memory snapshots: rate and ceiling resolution, income
//! aggregation and projection, volume quota tracking, and the gate that
//! classifies save, import, and promote flows. Nothing in here performs I/O or
//! returns an error; budget problems are values the caller inspects.

pub mod assessment;
pub mod domain;
pub mod gate;
pub mod income;
pub mod lifecycle;
pub mod projection;
pub mod quota;
pub mod rates;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use assessment::{assess_allocations, AssessmentRequest};
pub use domain::{
    Activity, ActivityId, Allocation, AssignmentGroup, CeilingRule, DraftAllocation, HonorRate,
    JobCode, Mitra, MitraId, ParentRecord, Period, RecordKind, RecordRef, Rupiah, SubActivity,
    SubActivityId,
};
pub use gate::{
    BudgetGate, GateDecision, GateNotice, GatePolicy, NoticeKind, ProjectionRow, ViolationDetail,
    ViolationKind,
};
pub use income::{
    aggregate_income, income_breakdown, AmountSource, IncomeContribution, IncomePool,
    IncomeSources,
};
pub use lifecycle::{classify_allocation, AllocationState, SubmitOutcome};
pub use projection::{project, IncomeProjection};
pub use quota::{track_volume, VolumeQuota};
pub use rates::{
    annual_ceiling, resolve_ceiling, resolve_rate, CeilingTable, CeilingTableError, ResolvedRate,
};
pub use snapshot::BudgetSnapshot;

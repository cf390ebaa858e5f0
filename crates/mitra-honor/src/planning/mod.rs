//! Budget-checked planning and assignment flows.
//!
//! Every flow loads a [`BudgetSnapshot`](crate::budget::BudgetSnapshot) through
//! the backend, runs the engine, consults the gate under the flow's policy,
//! and only then writes back.

pub mod domain;
pub mod preview;
pub mod recap;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    AllocationCheckRequest, AllocationReview, CreateRecordRequest, DriftField, ImportPreview,
    ImportRequest, PlanGroupUpdate, PreviewDrift, PromoteRequest, PromotionReport, RecapQuery,
    ReviewedRow, SubmissionReport,
};
pub use recap::{build_recap, to_csv_string, write_csv, IncomeRecap, RecapEntry};
pub use router::budget_router;
pub use service::{review_allocations, BudgetService, BudgetServiceError};

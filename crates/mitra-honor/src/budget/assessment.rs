use std::collections::HashMap;

use super::domain::{
    AssignmentGroup, DraftAllocation, MitraId, Period, RecordKind, RecordRef, Rupiah,
    SubActivity, SubActivityId,
};
use super::gate::ProjectionRow;
use super::income::{aggregate_income, IncomePool};
use super::projection::project;
use super::quota::track_volume;
use super::rates::resolve_rate;
use super::snapshot::BudgetSnapshot;

/// Candidate allocations for one Assignment or Plan, plus what to leave out.
#[derive(Debug, Clone)]
pub struct AssessmentRequest<'a> {
    pub kind: RecordKind,
    pub sub_activity_id: SubActivityId,
    pub drafts: &'a [DraftAllocation],
    pub pool: IncomePool,
    /// Used when the sub-activity itself has no start date.
    pub period_hint: Option<Period>,
    /// Record being edited; excluded from income and quota.
    pub exclude_record: Option<RecordRef>,
    /// Single group being edited; excluded from quota only.
    pub exclude_group: Option<u64>,
    /// Allocations accepted earlier in the same batch. They consume quota
    /// but add no income, since the pool already holds them.
    pub staged: &'a [DraftAllocation],
}

/// Project every draft against the snapshot.
///
/// Drafts are evaluated in order; a mitra listed more than once carries the
/// candidate income of its earlier rows into later rows.
pub fn assess_allocations(
    snapshot: &BudgetSnapshot,
    request: &AssessmentRequest<'_>,
) -> Vec<ProjectionRow> {
    let period = snapshot
        .sub_activity(request.sub_activity_id)
        .and_then(SubActivity::period)
        .or(request.period_hint);
    let ceiling = period
        .map(|period| snapshot.ceilings.monthly(period.year))
        .unwrap_or(0);
    let sources = snapshot.income_sources(request.pool);
    let committed = committed_in_sub_activity(snapshot, request);
    let batch: Vec<&DraftAllocation> = request.staged.iter().chain(request.drafts).collect();

    let mut batch_income: HashMap<MitraId, Rupiah> = HashMap::new();
    let mut rows = Vec::with_capacity(request.drafts.len());

    for (index, draft) in request.drafts.iter().enumerate() {
        let rate = resolve_rate(request.sub_activity_id, &draft.job_code, &snapshot.rates);
        let target = rate.as_ref().map(|rate| rate.target_volume).unwrap_or(0);
        let volume = track_volume(&draft.job_code, target, &committed, &batch);

        let existing = period
            .map(|period| {
                aggregate_income(draft.mitra_id, period, &sources, request.exclude_record)
            })
            .unwrap_or(0);
        let earlier = batch_income.get(&draft.mitra_id).copied().unwrap_or(0);
        let income = project(
            existing.saturating_add(earlier),
            &draft.job_code,
            draft.volume,
            rate.as_ref(),
            ceiling,
        );

        let entry = batch_income.entry(draft.mitra_id).or_insert(0);
        *entry = entry.saturating_add(income.candidate_income);

        rows.push(ProjectionRow {
            row: index,
            mitra_id: draft.mitra_id,
            mitra_name: snapshot.mitra(draft.mitra_id).map(|mitra| mitra.name.clone()),
            period,
            volume,
            income,
        });
    }

    rows
}

fn committed_in_sub_activity<'s>(
    snapshot: &'s BudgetSnapshot,
    request: &AssessmentRequest<'_>,
) -> Vec<&'s AssignmentGroup> {
    let record_subs: HashMap<RecordRef, SubActivityId> = snapshot
        .records
        .iter()
        .map(|record| (record.reference, record.sub_activity_id))
        .collect();

    snapshot
        .groups
        .iter()
        .filter(|group| group.parent.kind == request.kind)
        .filter(|group| request.exclude_record != Some(group.parent))
        .filter(|group| request.exclude_group != Some(group.id))
        .filter(|group| record_subs.get(&group.parent) == Some(&request.sub_activity_id))
        .collect()
}

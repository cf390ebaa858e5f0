use super::common::*;
use crate::budget::assessment::{assess_allocations, AssessmentRequest};
use crate::budget::domain::{RecordKind, RecordRef, SubActivityId};
use crate::budget::income::IncomePool;
use crate::budget::rates::CeilingTable;

fn request<'a>(
    sub: u64,
    drafts: &'a [crate::budget::domain::DraftAllocation],
) -> AssessmentRequest<'a> {
    AssessmentRequest {
        kind: RecordKind::Assignment,
        sub_activity_id: SubActivityId(sub),
        drafts,
        pool: IncomePool::Assignments,
        period_hint: None,
        exclude_record: None,
        exclude_group: None,
        staged: &[],
    }
}

#[test]
fn candidate_assignment_over_ceiling_is_flagged() {
    let snapshot = snapshot();
    let drafts = vec![draft(BUDI, "PPL", 5)];

    let rows = assess_allocations(&snapshot, &request(1, &drafts));

    let row = &rows[0];
    assert_eq!(row.period, Some(march_2026()));
    assert_eq!(row.income.existing_income, 2_800_000);
    assert_eq!(row.income.candidate_income, 275_000);
    assert_eq!(row.income.total, 3_075_000);
    assert!(row.income.is_over);
    assert_eq!(row.mitra_name.as_deref(), Some("Budi Santoso"));
}

#[test]
fn missing_ceiling_year_never_flags() {
    let mut snapshot = snapshot();
    snapshot.ceilings = CeilingTable::default();
    let drafts = vec![draft(BUDI, "PPL", 500)];

    let rows = assess_allocations(&snapshot, &request(1, &drafts));

    assert_eq!(rows[0].income.ceiling, 0);
    assert!(!rows[0].income.is_over);
}

#[test]
fn quota_counts_committed_groups_and_every_draft_in_the_sub_activity() {
    let snapshot = snapshot();
    let drafts = vec![draft(SITI, "PPL", 100), draft(BUDI, "ppl", 31)];

    let rows = assess_allocations(&snapshot, &request(1, &drafts));

    assert_eq!(rows[0].volume.assigned, 30 + 100 + 31);
    assert!(rows[1].volume.is_over);
    assert_eq!(rows[1].volume.overflow(), 1);
}

#[test]
fn repeated_mitra_accumulates_income_across_rows() {
    let snapshot = snapshot();
    let drafts = vec![draft(SITI, "PPL", 20), draft(SITI, "PML", 10)];

    let rows = assess_allocations(&snapshot, &request(1, &drafts));

    assert_eq!(rows[0].income.total, 750_000 + 1_100_000);
    assert_eq!(rows[1].income.existing_income, 750_000 + 1_100_000);
    assert_eq!(rows[1].income.total, 750_000 + 1_100_000 + 750_000);
}

#[test]
fn edited_record_is_excluded_from_income_and_quota() {
    let snapshot = snapshot();
    let drafts = vec![draft(BUDI, "PPL", 30)];
    let mut edit = request(1, &drafts);
    edit.exclude_record = Some(RecordRef::assignment(10));

    let rows = assess_allocations(&snapshot, &edit);

    assert_eq!(rows[0].income.existing_income, 800_000);
    assert_eq!(rows[0].volume.assigned, 30);
}

#[test]
fn plan_edit_excludes_only_the_edited_group_from_quota() {
    let snapshot = snapshot();
    let drafts = vec![draft(BUDI, "PPL", 45)];
    let mut edit = request(1, &drafts);
    edit.kind = RecordKind::Plan;
    edit.exclude_group = Some(200);

    let rows = assess_allocations(&snapshot, &edit);

    assert_eq!(rows[0].volume.assigned, 45);
    assert_eq!(rows[0].income.existing_income, 2_800_000);
}

#[test]
fn undated_sub_activity_falls_back_to_period_hint() {
    let snapshot = snapshot();
    let drafts = vec![draft(BUDI, "PPL", 1)];

    let undated = assess_allocations(&snapshot, &request(4, &drafts));
    assert_eq!(undated[0].period, None);
    assert_eq!(undated[0].income.ceiling, 0);

    let mut hinted = request(4, &drafts);
    hinted.period_hint = Some(march_2026());
    let rows = assess_allocations(&snapshot, &hinted);
    assert_eq!(rows[0].income.ceiling, 3_000_000);
    assert_eq!(rows[0].income.existing_income, 2_800_000);
}

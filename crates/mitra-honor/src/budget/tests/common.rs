use chrono::NaiveDate;

use crate::budget::domain::{
    Activity, ActivityId, AssignmentGroup, CeilingRule, DraftAllocation, HonorRate, JobCode,
    Mitra, MitraId, ParentRecord, Period, RecordRef, SubActivity, SubActivityId,
};
use crate::budget::gate::ProjectionRow;
use crate::budget::projection::IncomeProjection;
use crate::budget::quota::VolumeQuota;
use crate::budget::rates::CeilingTable;
use crate::budget::snapshot::BudgetSnapshot;

pub(super) const BUDI: MitraId = MitraId(7);
pub(super) const SITI: MitraId = MitraId(8);

pub(super) fn march_2026() -> Period {
    Period::new(2026, 3).expect("valid period")
}

pub(super) fn april_2026() -> Period {
    Period::new(2026, 4).expect("valid period")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn sub_activity(id: u64, name: &str, start: Option<NaiveDate>) -> SubActivity {
    SubActivity {
        id: SubActivityId(id),
        activity_id: ActivityId(1),
        name: name.to_string(),
        description: None,
        start_date: start,
        end_date: start.map(|start| start + chrono::Duration::days(20)),
    }
}

pub(super) fn rate(sub: u64, job_code: &str, tariff: i64, basis_volume: u64) -> HonorRate {
    HonorRate {
        id: sub * 100 + basis_volume,
        sub_activity_id: SubActivityId(sub),
        job_code: JobCode::new(job_code),
        tariff,
        unit_id: Some(1),
        unit_label: "Dokumen".to_string(),
        basis_volume,
        budget_charge_code: None,
    }
}

pub(super) fn ceiling(year: i32, amount: i64) -> CeilingRule {
    CeilingRule {
        id: year as u64,
        year,
        monthly_ceiling: amount,
    }
}

pub(super) fn record(reference: RecordRef, sub: u64) -> ParentRecord {
    ParentRecord {
        reference,
        sub_activity_id: SubActivityId(sub),
        supervisor_id: Some(3),
        start_date: None,
        end_date: None,
    }
}

pub(super) fn group(
    id: u64,
    mitra_id: MitraId,
    parent: RecordRef,
    job_code: &str,
    volume: u64,
) -> AssignmentGroup {
    AssignmentGroup {
        id,
        mitra_id,
        parent,
        job_code: JobCode::new(job_code),
        volume,
        total_honor: None,
    }
}

pub(super) fn draft(mitra_id: MitraId, job_code: &str, volume: u64) -> DraftAllocation {
    DraftAllocation {
        mitra_id,
        job_code: JobCode::new(job_code),
        volume,
    }
}

fn mitra(id: MitraId, name: &str) -> Mitra {
    Mitra {
        id,
        name: name.to_string(),
        nik: format!("33710{:011}", id.0),
        phone: None,
        email: None,
        address: Some("Magelang".to_string()),
        active_years: vec![2025, 2026],
    }
}

/// March 2026 income for Budi from assignments totals 2,800,000:
/// 30 x 55,000 (sub 1) + 20 x 40,000 (sub 2) + 350,000 precomputed (sub 1, KSK).
pub(super) fn snapshot() -> BudgetSnapshot {
    let mut precomputed = group(105, BUDI, RecordRef::assignment(10), "KSK", 3);
    precomputed.total_honor = Some(350_000);

    BudgetSnapshot {
        activities: vec![Activity {
            id: ActivityId(1),
            name: "Sensus Pertanian".to_string(),
            description: None,
        }],
        sub_activities: vec![
            sub_activity(1, "Pencacahan Lapangan", Some(date(2026, 3, 2))),
            sub_activity(2, "Pemeriksaan Dokumen", Some(date(2026, 3, 15))),
            sub_activity(3, "Pengolahan", Some(date(2026, 4, 1))),
            sub_activity(4, "Listing Tanpa Jadwal", None),
        ],
        rates: vec![
            rate(1, "PPL", 55_000, 160),
            rate(1, "PML", 75_000, 40),
            rate(2, "PPL", 40_000, 100),
            rate(3, "PPL", 50_000, 50),
            rate(4, "PPL", 10_000, 10),
        ],
        ceilings: CeilingTable::from_rules(vec![ceiling(2026, 3_000_000)]),
        mitra: vec![mitra(BUDI, "Budi Santoso"), mitra(SITI, "Siti Aminah")],
        records: vec![
            record(RecordRef::assignment(10), 1),
            record(RecordRef::assignment(11), 2),
            record(RecordRef::assignment(12), 3),
            record(RecordRef::assignment(13), 4),
            record(RecordRef::plan(20), 1),
            record(RecordRef::plan(21), 2),
        ],
        groups: vec![
            group(100, BUDI, RecordRef::assignment(10), "PPL", 30),
            group(101, BUDI, RecordRef::assignment(11), "ppl ", 20),
            group(102, BUDI, RecordRef::assignment(12), "PPL", 10),
            group(103, BUDI, RecordRef::assignment(13), "PPL", 5),
            group(104, SITI, RecordRef::assignment(10), "PML", 10),
            precomputed,
            group(200, BUDI, RecordRef::plan(20), "PPL", 40),
            group(201, SITI, RecordRef::plan(21), "PPL", 60),
        ],
    }
}

pub(super) fn quota(job_code: &str, assigned: u64, target: u64) -> VolumeQuota {
    VolumeQuota {
        job_code: JobCode::new(job_code),
        assigned,
        target,
        remaining: target.saturating_sub(assigned),
        percent: if target > 0 {
            assigned as f64 / target as f64 * 100.0
        } else {
            0.0
        },
        is_over: assigned > target,
    }
}

pub(super) fn income(job_code: &str, total: i64, ceiling: i64) -> IncomeProjection {
    IncomeProjection {
        job_code: JobCode::new(job_code),
        existing_income: total,
        candidate_income: 0,
        total,
        ceiling,
        is_over: ceiling > 0 && total > ceiling,
        rate_found: true,
    }
}

pub(super) fn projection_row(
    row: usize,
    mitra_id: MitraId,
    volume: VolumeQuota,
    income: IncomeProjection,
) -> ProjectionRow {
    ProjectionRow {
        row,
        mitra_id,
        mitra_name: None,
        period: Some(march_2026()),
        volume,
        income,
    }
}

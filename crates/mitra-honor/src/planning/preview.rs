//! Reconciliation between local projections and the backend's import preview.

use tracing::warn;

use super::domain::{DriftField, PreviewDrift};
use crate::backend::{PreviewRow, PreviewStats};
use crate::budget::{
    DraftAllocation, GateDecision, IncomeProjection, JobCode, MitraId, Period, ProjectionRow,
    VolumeQuota,
};

/// Turn the backend's per-row stats into projections the gate can consume.
///
/// The backend's over flags are taken as-is rather than recomputed.
pub fn server_projections(rows: &[PreviewRow], period: Option<Period>) -> Vec<ProjectionRow> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let stats = &row.stats;
            let job_code = JobCode::new(&row.kode_jabatan);
            let assigned = stats.existing_vol.saturating_add(row.volume);
            let target = stats.target_vol;

            ProjectionRow {
                row: index,
                mitra_id: MitraId(row.id_mitra),
                mitra_name: row.nama_mitra.clone(),
                period,
                volume: VolumeQuota {
                    job_code: job_code.clone(),
                    assigned,
                    target,
                    remaining: target.saturating_sub(assigned),
                    percent: if target > 0 {
                        assigned as f64 / target as f64 * 100.0
                    } else {
                        0.0
                    },
                    is_over: stats.is_over_volume,
                },
                income: IncomeProjection {
                    job_code,
                    existing_income: stats.existing_income,
                    candidate_income: stats.new_income,
                    total: stats.existing_income.saturating_add(stats.new_income),
                    ceiling: stats.limit_honor,
                    is_over: stats.is_over_limit,
                    rate_found: true,
                },
            }
        })
        .collect()
}

/// Express local projections in the backend's preview shape.
///
/// Used where no remote preview exists, so the reconciliation step sees the
/// engine's own figures.
pub fn preview_rows(projections: &[ProjectionRow], drafts: &[DraftAllocation]) -> Vec<PreviewRow> {
    projections
        .iter()
        .zip(drafts)
        .map(|(projection, draft)| PreviewRow {
            id_mitra: projection.mitra_id.0,
            nama_mitra: projection.mitra_name.clone(),
            kode_jabatan: draft.job_code.to_string(),
            volume: draft.volume,
            stats: PreviewStats {
                existing_vol: projection.volume.assigned.saturating_sub(draft.volume),
                target_vol: projection.volume.target,
                existing_income: projection.income.existing_income,
                new_income: projection.income.candidate_income,
                limit_honor: projection.income.ceiling,
                is_over_limit: projection.income.is_over,
                is_over_volume: projection.volume.is_over,
            },
        })
        .collect()
}

/// Fold the server-side decision into the local one.
///
/// A server violation already reported locally for the same row is not
/// repeated; the merged decision blocks when either side blocks.
pub fn merge_decisions(mut local: GateDecision, server: GateDecision) -> GateDecision {
    for violation in server.violations {
        let known = local
            .violations
            .iter()
            .any(|existing| existing.row == violation.row && existing.kind == violation.kind);
        if !known {
            local.violations.push(violation);
        }
    }
    local.blocked |= server.blocked;
    local.requires_confirmation |= server.requires_confirmation;
    local
}

/// Field-by-field differences between matching local and server rows.
pub fn reconcile(local: &[ProjectionRow], server: &[ProjectionRow]) -> Vec<PreviewDrift> {
    if local.len() != server.len() {
        warn!(
            local = local.len(),
            server = server.len(),
            "import preview row counts differ"
        );
    }

    let mut drift = Vec::new();
    for (ours, theirs) in local.iter().zip(server) {
        let pairs = [
            (
                DriftField::ExistingIncome,
                ours.income.existing_income,
                theirs.income.existing_income,
            ),
            (
                DriftField::CandidateIncome,
                ours.income.candidate_income,
                theirs.income.candidate_income,
            ),
            (
                DriftField::Ceiling,
                ours.income.ceiling,
                theirs.income.ceiling,
            ),
            (
                DriftField::TargetVolume,
                clamp_volume(ours.volume.target),
                clamp_volume(theirs.volume.target),
            ),
            (
                DriftField::OverLimit,
                i64::from(ours.income.is_over),
                i64::from(theirs.income.is_over),
            ),
            (
                DriftField::OverVolume,
                i64::from(ours.volume.is_over),
                i64::from(theirs.volume.is_over),
            ),
        ];

        for (field, mine, reported) in pairs {
            if mine != reported {
                warn!(
                    row = ours.row,
                    field = field.label(),
                    local = mine,
                    server = reported,
                    "import preview drift"
                );
                drift.push(PreviewDrift {
                    row: ours.row,
                    field,
                    local: mine,
                    server: reported,
                });
            }
        }
    }
    drift
}

fn clamp_volume(volume: u64) -> i64 {
    i64::try_from(volume).unwrap_or(i64::MAX)
}

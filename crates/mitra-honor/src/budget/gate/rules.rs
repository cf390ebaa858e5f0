use super::{GateNotice, NoticeKind, ProjectionRow, ViolationDetail, ViolationKind};

pub(crate) struct Findings {
    pub violations: Vec<ViolationDetail>,
    pub notices: Vec<GateNotice>,
}

pub(crate) fn inspect_rows(rows: &[ProjectionRow]) -> Findings {
    let mut violations = Vec::new();
    let mut notices = Vec::new();

    for row in rows {
        let label = row.label();

        if !row.income.rate_found {
            notices.push(GateNotice {
                row: row.row,
                mitra_id: row.mitra_id,
                kind: NoticeKind::RateNotFound {
                    job_code: row.income.job_code.clone(),
                },
                message: format!(
                    "job code {} has no honor rate for this sub-activity (Jabatan Tidak Ditemukan)",
                    row.income.job_code
                ),
            });
        }

        if row.period.is_none() {
            notices.push(GateNotice {
                row: row.row,
                mitra_id: row.mitra_id,
                kind: NoticeKind::UndatedPeriod,
                message: format!(
                    "{label}: sub-activity has no start date, ceiling not checked"
                ),
            });
        }

        if row.volume.is_over {
            violations.push(ViolationDetail {
                row: row.row,
                mitra_id: row.mitra_id,
                kind: ViolationKind::VolumeExceeded {
                    job_code: row.volume.job_code.clone(),
                    assigned: row.volume.assigned,
                    target: row.volume.target,
                },
                message: format!(
                    "volume for {} exceeds target ({} of {}, over by {})",
                    row.volume.job_code,
                    row.volume.assigned,
                    row.volume.target,
                    row.volume.overflow()
                ),
            });
        }

        if row.income.is_over {
            let period = row
                .period
                .map(|period| format!(" in {period}"))
                .unwrap_or_default();
            violations.push(ViolationDetail {
                row: row.row,
                mitra_id: row.mitra_id,
                kind: ViolationKind::CeilingExceeded {
                    total: row.income.total,
                    ceiling: row.income.ceiling,
                },
                message: format!(
                    "{label}: honor{period} exceeds monthly ceiling ({} of {}, over by {})",
                    row.income.total,
                    row.income.ceiling,
                    row.income.excess()
                ),
            });
        }
    }

    Findings {
        violations,
        notices,
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    AssignmentGroup, HonorRate, JobCode, MitraId, ParentRecord, Period, RecordKind, RecordRef,
    Rupiah, SubActivity, SubActivityId,
};
use super::rates::resolve_rate;

/// Which record kinds count as committed income.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomePool {
    /// Realized assignments only.
    #[default]
    Assignments,
    /// Tentative plans only.
    Plans,
    Combined,
}

impl IncomePool {
    pub const fn includes(self, kind: RecordKind) -> bool {
        match self {
            IncomePool::Assignments => matches!(kind, RecordKind::Assignment),
            IncomePool::Plans => matches!(kind, RecordKind::Plan),
            IncomePool::Combined => true,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            IncomePool::Assignments => "assignments",
            IncomePool::Plans => "plans",
            IncomePool::Combined => "combined",
        }
    }
}

/// Read-only view over the records the aggregator walks.
#[derive(Debug, Clone, Copy)]
pub struct IncomeSources<'a> {
    pub groups: &'a [AssignmentGroup],
    pub records: &'a [ParentRecord],
    pub sub_activities: &'a [SubActivity],
    pub rates: &'a [HonorRate],
    pub pool: IncomePool,
}

/// How a contribution's amount was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSource {
    Tariff,
    /// `total_honor` carried on the group because no tariff row matched.
    Precomputed,
}

/// One group's share of a mitra's income within a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeContribution {
    pub group_id: u64,
    pub record: RecordRef,
    pub sub_activity_id: SubActivityId,
    pub period: Period,
    pub job_code: JobCode,
    pub volume: u64,
    pub amount: Rupiah,
    pub source: AmountSource,
}

/// Every dated, priced contribution to `mitra_id`'s income in `period`.
///
/// Groups whose parent matches `exclude` are skipped, as are groups whose
/// parent or sub-activity cannot be dated. Inputs are never mutated.
pub fn income_breakdown(
    mitra_id: MitraId,
    period: Period,
    sources: &IncomeSources<'_>,
    exclude: Option<RecordRef>,
) -> Vec<IncomeContribution> {
    let records: HashMap<RecordRef, &ParentRecord> = sources
        .records
        .iter()
        .map(|record| (record.reference, record))
        .collect();
    let sub_activities: HashMap<SubActivityId, &SubActivity> = sources
        .sub_activities
        .iter()
        .map(|sub| (sub.id, sub))
        .collect();

    let mut contributions = Vec::new();

    for group in sources.groups {
        if group.mitra_id != mitra_id || !sources.pool.includes(group.parent.kind) {
            continue;
        }
        if exclude == Some(group.parent) {
            continue;
        }

        let Some(record) = records.get(&group.parent) else {
            continue;
        };
        let sub_activity = sub_activities.get(&record.sub_activity_id).copied();
        let Some(group_period) = record.period(sub_activity) else {
            continue;
        };
        if group_period != period {
            continue;
        }

        let priced = match resolve_rate(record.sub_activity_id, &group.job_code, sources.rates) {
            Some(rate) => Some((
                rate.tariff.saturating_mul(volume_as_amount(group.volume)),
                AmountSource::Tariff,
            )),
            None => group
                .total_honor
                .map(|amount| (amount, AmountSource::Precomputed)),
        };

        if let Some((amount, source)) = priced {
            contributions.push(IncomeContribution {
                group_id: group.id,
                record: group.parent,
                sub_activity_id: record.sub_activity_id,
                period: group_period,
                job_code: group.job_code.clone(),
                volume: group.volume,
                amount,
                source,
            });
        }
    }

    contributions
}

/// Honor already committed to `mitra_id` in `period` by records other than `exclude`.
pub fn aggregate_income(
    mitra_id: MitraId,
    period: Period,
    sources: &IncomeSources<'_>,
    exclude: Option<RecordRef>,
) -> Rupiah {
    income_breakdown(mitra_id, period, sources, exclude)
        .iter()
        .fold(0, |total: Rupiah, contribution| {
            total.saturating_add(contribution.amount)
        })
}

pub(crate) fn volume_as_amount(volume: u64) -> Rupiah {
    Rupiah::try_from(volume).unwrap_or(Rupiah::MAX)
}

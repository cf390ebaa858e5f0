use super::domain::{
    Activity, ActivityId, AssignmentGroup, HonorRate, Mitra, MitraId, ParentRecord, Period,
    RecordKind, RecordRef, SubActivity, SubActivityId,
};
use super::income::{IncomePool, IncomeSources};
use super::rates::CeilingTable;

/// Consistent, read-only copy of every entity an evaluation session needs.
#[derive(Debug, Clone, Default)]
pub struct BudgetSnapshot {
    pub activities: Vec<Activity>,
    pub sub_activities: Vec<SubActivity>,
    pub rates: Vec<HonorRate>,
    pub ceilings: CeilingTable,
    pub mitra: Vec<Mitra>,
    /// Assignment and Plan headers, told apart by `RecordRef::kind`.
    pub records: Vec<ParentRecord>,
    /// Assignment and Plan groups, told apart by `AssignmentGroup::parent`.
    pub groups: Vec<AssignmentGroup>,
}

impl BudgetSnapshot {
    pub fn income_sources(&self, pool: IncomePool) -> IncomeSources<'_> {
        IncomeSources {
            groups: &self.groups,
            records: &self.records,
            sub_activities: &self.sub_activities,
            rates: &self.rates,
            pool,
        }
    }

    pub fn activity(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.iter().find(|activity| activity.id == id)
    }

    pub fn sub_activity(&self, id: SubActivityId) -> Option<&SubActivity> {
        self.sub_activities.iter().find(|sub| sub.id == id)
    }

    pub fn record(&self, reference: RecordRef) -> Option<&ParentRecord> {
        self.records
            .iter()
            .find(|record| record.reference == reference)
    }

    /// Group ids are only unique within one kind's table.
    pub fn group(&self, kind: RecordKind, id: u64) -> Option<&AssignmentGroup> {
        self.groups
            .iter()
            .find(|group| group.parent.kind == kind && group.id == id)
    }

    pub fn groups_of(&self, reference: RecordRef) -> impl Iterator<Item = &AssignmentGroup> {
        self.groups
            .iter()
            .filter(move |group| group.parent == reference)
    }

    pub fn mitra(&self, id: MitraId) -> Option<&Mitra> {
        self.mitra.iter().find(|mitra| mitra.id == id)
    }

    pub fn period_of(&self, reference: RecordRef) -> Option<Period> {
        let record = self.record(reference)?;
        record.period(self.sub_activity(record.sub_activity_id))
    }
}

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::backend::{
    ApiSession, BackendError, BudgetBackend, GroupUpdatePayload, ImportPayload, PreviewRow,
    PreviewStats, RecordPayload,
};
use crate::budget::{
    Activity, ActivityId, AssignmentGroup, CeilingRule, DraftAllocation, HonorRate, JobCode,
    Mitra, MitraId, ParentRecord, RecordKind, RecordRef, SubActivity, SubActivityId,
};
use crate::planning::{budget_router, BudgetService};

pub(super) const BUDI: MitraId = MitraId(7);
pub(super) const SITI: MitraId = MitraId(8);
pub(super) const ANI: MitraId = MitraId(9);

#[derive(Debug, Clone, PartialEq)]
pub(super) enum RecordedWrite {
    Create(RecordKind, RecordPayload),
    UpdatePlanGroup(u64, GroupUpdatePayload),
    StoreImport(RecordKind, ImportPayload),
}

/// In-memory fieldwork API.
///
/// March 2026 assignment income: Budi 2,800,000, Siti 750,000, Ani 6,600,000.
/// Committed PPL volume on sub-activity 1 is 150 of 160.
pub(super) struct MemoryBackend {
    pub(super) rates: Vec<HonorRate>,
    pub(super) ceilings: Vec<CeilingRule>,
    pub(super) activities: Vec<Activity>,
    pub(super) sub_activities: Vec<SubActivity>,
    pub(super) mitra: Vec<Mitra>,
    pub(super) records: Vec<ParentRecord>,
    pub(super) groups: Vec<AssignmentGroup>,
    pub(super) preview: Vec<PreviewRow>,
    pub(super) reject_writes: Option<(u16, String)>,
    /// Writes past this many fail as if the connection dropped.
    pub(super) accepted_writes: Option<usize>,
    pub(super) writes: Mutex<Vec<RecordedWrite>>,
    pub(super) sessions: Mutex<Vec<ApiSession>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        let mut precomputed = group(105, BUDI, RecordRef::assignment(10), "KSK", 3);
        precomputed.total_honor = Some(350_000);

        Self {
            rates: vec![
                rate(1, "PPL", 55_000, 160),
                rate(1, "PML", 75_000, 40),
                rate(2, "PPL", 40_000, 100),
                rate(3, "PPL", 50_000, 50),
            ],
            ceilings: vec![CeilingRule {
                id: 1,
                year: 2026,
                monthly_ceiling: 3_000_000,
            }],
            activities: vec![Activity {
                id: ActivityId(1),
                name: "Sensus Pertanian 2026".to_string(),
                description: None,
            }],
            sub_activities: vec![
                sub_activity(1, "Pencacahan", date(2026, 3, 2)),
                sub_activity(2, "Pemeriksaan", date(2026, 3, 15)),
                sub_activity(3, "Pengolahan", date(2026, 4, 6)),
            ],
            mitra: vec![
                mitra(BUDI, "Budi Santoso"),
                mitra(SITI, "Siti Aminah"),
                mitra(ANI, "Ani Lestari"),
            ],
            records: vec![
                record(RecordRef::assignment(10), 1, None),
                record(RecordRef::assignment(11), 2, None),
                record(RecordRef::assignment(12), 3, None),
                record(RecordRef::plan(20), 1, Some(date(2026, 3, 2))),
                record(RecordRef::plan(21), 2, None),
            ],
            groups: vec![
                group(100, BUDI, RecordRef::assignment(10), "PPL", 30),
                group(101, BUDI, RecordRef::assignment(11), "PPL", 20),
                group(104, SITI, RecordRef::assignment(10), "PML", 10),
                precomputed,
                group(106, ANI, RecordRef::assignment(10), "PPL", 120),
                group(200, BUDI, RecordRef::plan(20), "PPL", 40),
                group(201, SITI, RecordRef::plan(20), "PML", 5),
                group(202, SITI, RecordRef::plan(21), "PPL", 60),
            ],
            preview: Vec::new(),
            reject_writes: None,
            accepted_writes: None,
            writes: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryBackend {
    pub(super) fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().expect("write log poisoned").clone()
    }

    pub(super) fn sessions(&self) -> Vec<ApiSession> {
        self.sessions.lock().expect("session log poisoned").clone()
    }

    fn seen(&self, session: &ApiSession) {
        self.sessions
            .lock()
            .expect("session log poisoned")
            .push(session.clone());
    }

    fn write(&self, path: &str, entry: RecordedWrite) -> Result<(), BackendError> {
        if let Some((status, message)) = &self.reject_writes {
            return Err(BackendError::Status {
                status: *status,
                path: path.to_string(),
                message: message.clone(),
            });
        }
        let mut writes = self.writes.lock().expect("write log poisoned");
        if self.accepted_writes.is_some_and(|limit| writes.len() >= limit) {
            return Err(BackendError::Unavailable("connection reset".to_string()));
        }
        writes.push(entry);
        Ok(())
    }
}

#[async_trait]
impl BudgetBackend for MemoryBackend {
    async fn honor_rates(&self, session: &ApiSession) -> Result<Vec<HonorRate>, BackendError> {
        self.seen(session);
        Ok(self.rates.clone())
    }

    async fn ceiling_rules(
        &self,
        _session: &ApiSession,
    ) -> Result<Vec<CeilingRule>, BackendError> {
        Ok(self.ceilings.clone())
    }

    async fn activities(&self, _session: &ApiSession) -> Result<Vec<Activity>, BackendError> {
        Ok(self.activities.clone())
    }

    async fn sub_activities(
        &self,
        _session: &ApiSession,
    ) -> Result<Vec<SubActivity>, BackendError> {
        Ok(self.sub_activities.clone())
    }

    async fn mitra(&self, _session: &ApiSession) -> Result<Vec<Mitra>, BackendError> {
        Ok(self.mitra.clone())
    }

    async fn parent_records(
        &self,
        _session: &ApiSession,
        kind: RecordKind,
    ) -> Result<Vec<ParentRecord>, BackendError> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.reference.kind == kind)
            .cloned()
            .collect())
    }

    async fn assignment_groups(
        &self,
        _session: &ApiSession,
        kind: RecordKind,
    ) -> Result<Vec<AssignmentGroup>, BackendError> {
        Ok(self
            .groups
            .iter()
            .filter(|group| group.parent.kind == kind)
            .cloned()
            .collect())
    }

    async fn create_record(
        &self,
        session: &ApiSession,
        kind: RecordKind,
        payload: &RecordPayload,
    ) -> Result<(), BackendError> {
        self.seen(session);
        self.write(
            &format!("/api/{}", kind.resource()),
            RecordedWrite::Create(kind, payload.clone()),
        )
    }

    async fn update_plan_group(
        &self,
        _session: &ApiSession,
        group_id: u64,
        payload: &GroupUpdatePayload,
    ) -> Result<(), BackendError> {
        self.write(
            &format!("/api/kelompok-perencanaan/{group_id}"),
            RecordedWrite::UpdatePlanGroup(group_id, payload.clone()),
        )
    }

    async fn preview_import(
        &self,
        _session: &ApiSession,
        _kind: RecordKind,
        _payload: &ImportPayload,
    ) -> Result<Vec<PreviewRow>, BackendError> {
        Ok(self.preview.clone())
    }

    async fn store_import(
        &self,
        _session: &ApiSession,
        kind: RecordKind,
        payload: &ImportPayload,
    ) -> Result<(), BackendError> {
        self.write(
            &format!("/api/{}/store-import", kind.resource()),
            RecordedWrite::StoreImport(kind, payload.clone()),
        )
    }
}

/// Backend whose every call fails as if the API were down.
pub(super) struct UnavailableBackend;

#[async_trait]
impl BudgetBackend for UnavailableBackend {
    async fn honor_rates(&self, _session: &ApiSession) -> Result<Vec<HonorRate>, BackendError> {
        Err(offline())
    }

    async fn ceiling_rules(
        &self,
        _session: &ApiSession,
    ) -> Result<Vec<CeilingRule>, BackendError> {
        Err(offline())
    }

    async fn activities(&self, _session: &ApiSession) -> Result<Vec<Activity>, BackendError> {
        Err(offline())
    }

    async fn sub_activities(
        &self,
        _session: &ApiSession,
    ) -> Result<Vec<SubActivity>, BackendError> {
        Err(offline())
    }

    async fn mitra(&self, _session: &ApiSession) -> Result<Vec<Mitra>, BackendError> {
        Err(offline())
    }

    async fn parent_records(
        &self,
        _session: &ApiSession,
        _kind: RecordKind,
    ) -> Result<Vec<ParentRecord>, BackendError> {
        Err(offline())
    }

    async fn assignment_groups(
        &self,
        _session: &ApiSession,
        _kind: RecordKind,
    ) -> Result<Vec<AssignmentGroup>, BackendError> {
        Err(offline())
    }

    async fn create_record(
        &self,
        _session: &ApiSession,
        _kind: RecordKind,
        _payload: &RecordPayload,
    ) -> Result<(), BackendError> {
        Err(offline())
    }

    async fn update_plan_group(
        &self,
        _session: &ApiSession,
        _group_id: u64,
        _payload: &GroupUpdatePayload,
    ) -> Result<(), BackendError> {
        Err(offline())
    }

    async fn preview_import(
        &self,
        _session: &ApiSession,
        _kind: RecordKind,
        _payload: &ImportPayload,
    ) -> Result<Vec<PreviewRow>, BackendError> {
        Err(offline())
    }

    async fn store_import(
        &self,
        _session: &ApiSession,
        _kind: RecordKind,
        _payload: &ImportPayload,
    ) -> Result<(), BackendError> {
        Err(offline())
    }
}

fn offline() -> BackendError {
    BackendError::Unavailable("connection refused".to_string())
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn sub_activity(id: u64, name: &str, start: NaiveDate) -> SubActivity {
    SubActivity {
        id: SubActivityId(id),
        activity_id: ActivityId(1),
        name: name.to_string(),
        description: None,
        start_date: Some(start),
        end_date: Some(start + chrono::Duration::days(14)),
    }
}

fn rate(sub: u64, job_code: &str, tariff: i64, basis_volume: u64) -> HonorRate {
    HonorRate {
        id: sub * 10 + basis_volume,
        sub_activity_id: SubActivityId(sub),
        job_code: JobCode::new(job_code),
        tariff,
        unit_id: Some(2),
        unit_label: "Ruta".to_string(),
        basis_volume,
        budget_charge_code: Some("521213".to_string()),
    }
}

fn mitra(id: MitraId, name: &str) -> Mitra {
    Mitra {
        id,
        name: name.to_string(),
        nik: format!("3308{:012}", id.0),
        phone: Some("081234567890".to_string()),
        email: None,
        address: None,
        active_years: vec![2026],
    }
}

pub(super) fn record(reference: RecordRef, sub: u64, start: Option<NaiveDate>) -> ParentRecord {
    ParentRecord {
        reference,
        sub_activity_id: SubActivityId(sub),
        supervisor_id: Some(3),
        start_date: start,
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

/// Backend preview row for a sub-activity 3 import line at 50,000 per unit.
pub(super) fn preview_row(mitra_id: MitraId, volume: u64, over_volume: bool) -> PreviewRow {
    PreviewRow {
        id_mitra: mitra_id.0,
        nama_mitra: None,
        kode_jabatan: "PPL".to_string(),
        volume,
        stats: PreviewStats {
            existing_vol: 0,
            target_vol: 50,
            existing_income: 0,
            new_income: 50_000 * volume as i64,
            limit_honor: 3_000_000,
            is_over_limit: false,
            is_over_volume: over_volume,
        },
    }
}

pub(super) fn build_service(
    backend: MemoryBackend,
) -> (BudgetService<MemoryBackend>, Arc<MemoryBackend>) {
    let backend = Arc::new(backend);
    (BudgetService::new(backend.clone()), backend)
}

pub(super) fn router_for(backend: MemoryBackend) -> (axum::Router, Arc<MemoryBackend>) {
    let (service, backend) = build_service(backend);
    (budget_router(Arc::new(service)), backend)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

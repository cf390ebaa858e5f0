use async_trait::async_trait;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use mitra_honor::backend::{
    ApiSession, BackendDump, BackendError, BudgetBackend, GroupUpdatePayload, HttpBackend,
    ImportPayload, MemberPayload, PreviewRow, RecordPayload,
};
use mitra_honor::budget::{
    assess_allocations, Activity, AssessmentRequest, AssignmentGroup, BudgetSnapshot,
    CeilingRule, CeilingTable, DraftAllocation, HonorRate, IncomePool, JobCode, Mitra, MitraId,
    ParentRecord, RecordKind, RecordRef, SubActivity, SubActivityId,
};
use mitra_honor::config::BackendConfig;
use mitra_honor::error::AppError;
use mitra_honor::planning::preview::preview_rows;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Fieldwork API stand-in backed by a saved dump of its list endpoints.
///
/// Writes are applied to the in-memory copy so later reads observe them.
pub(crate) struct InMemoryBackend {
    state: Mutex<DumpState>,
}

#[derive(Debug, Default)]
struct DumpState {
    rates: Vec<HonorRate>,
    ceilings: Vec<CeilingRule>,
    activities: Vec<Activity>,
    sub_activities: Vec<SubActivity>,
    mitra: Vec<Mitra>,
    records: Vec<ParentRecord>,
    groups: Vec<AssignmentGroup>,
    next_id: u64,
}

impl DumpState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            activities: self.activities.clone(),
            sub_activities: self.sub_activities.clone(),
            rates: self.rates.clone(),
            ceilings: CeilingTable::from_rules(self.ceilings.clone()),
            mitra: self.mitra.clone(),
            records: self.records.clone(),
            groups: self.groups.clone(),
        }
    }

    fn insert_record(
        &mut self,
        kind: RecordKind,
        sub_activity_id: u64,
        supervisor_id: Option<u64>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        members: &[MemberPayload],
    ) -> RecordRef {
        let reference = RecordRef {
            kind,
            id: self.allocate_id(),
        };
        self.records.push(ParentRecord {
            reference,
            sub_activity_id: SubActivityId(sub_activity_id),
            supervisor_id,
            start_date,
            end_date,
        });
        for member in members {
            let id = self.allocate_id();
            self.groups.push(AssignmentGroup {
                id,
                mitra_id: MitraId(member.id_mitra),
                parent: reference,
                job_code: JobCode::new(&member.kode_jabatan),
                volume: member.volume_tugas,
                total_honor: None,
            });
        }
        reference
    }
}

impl InMemoryBackend {
    pub(crate) fn from_dump(dump: BackendDump) -> Self {
        let BackendDump {
            kegiatan,
            subkegiatan,
            honorarium,
            aturan_periode,
            mitra,
            penugasan,
            perencanaan,
            kelompok_penugasan,
            kelompok_perencanaan,
        } = dump;

        let mut records: Vec<ParentRecord> = penugasan
            .into_iter()
            .filter_map(|row| row.into_domain(RecordKind::Assignment))
            .collect();
        records.extend(
            perencanaan
                .into_iter()
                .filter_map(|row| row.into_domain(RecordKind::Plan)),
        );
        let mut groups: Vec<AssignmentGroup> = kelompok_penugasan
            .into_iter()
            .filter_map(|row| row.into_domain(RecordKind::Assignment))
            .collect();
        groups.extend(
            kelompok_perencanaan
                .into_iter()
                .filter_map(|row| row.into_domain(RecordKind::Plan)),
        );

        let next_id = records
            .iter()
            .map(|record| record.reference.id)
            .chain(groups.iter().map(|group| group.id))
            .max()
            .unwrap_or(0);

        Self {
            state: Mutex::new(DumpState {
                rates: honorarium.into_iter().map(HonorRate::from).collect(),
                ceilings: aturan_periode.into_iter().map(CeilingRule::from).collect(),
                activities: kegiatan
                    .into_iter()
                    .filter_map(|row| row.into_domain())
                    .collect(),
                sub_activities: subkegiatan
                    .into_iter()
                    .filter_map(|row| row.into_domain())
                    .collect(),
                mitra: mitra.into_iter().filter_map(|row| row.into_domain()).collect(),
                records,
                groups,
                next_id,
            }),
        }
    }

    pub(crate) fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read(path)?;
        let dump: BackendDump = serde_json::from_slice(&raw)?;
        let backend = Self::from_dump(dump);
        {
            let state = backend.state.lock().expect("dump mutex poisoned");
            info!(
                path = %path.display(),
                rates = state.rates.len(),
                records = state.records.len(),
                groups = state.groups.len(),
                "loaded backend dump"
            );
        }
        Ok(backend)
    }
}

#[async_trait]
impl BudgetBackend for InMemoryBackend {
    async fn honor_rates(&self, _session: &ApiSession) -> Result<Vec<HonorRate>, BackendError> {
        Ok(self.state.lock().expect("dump mutex poisoned").rates.clone())
    }

    async fn ceiling_rules(
        &self,
        _session: &ApiSession,
    ) -> Result<Vec<CeilingRule>, BackendError> {
        Ok(self.state.lock().expect("dump mutex poisoned").ceilings.clone())
    }

    async fn activities(&self, _session: &ApiSession) -> Result<Vec<Activity>, BackendError> {
        Ok(self
            .state
            .lock()
            .expect("dump mutex poisoned")
            .activities
            .clone())
    }

    async fn sub_activities(
        &self,
        _session: &ApiSession,
    ) -> Result<Vec<SubActivity>, BackendError> {
        Ok(self
            .state
            .lock()
            .expect("dump mutex poisoned")
            .sub_activities
            .clone())
    }

    async fn mitra(&self, _session: &ApiSession) -> Result<Vec<Mitra>, BackendError> {
        Ok(self.state.lock().expect("dump mutex poisoned").mitra.clone())
    }

    async fn parent_records(
        &self,
        _session: &ApiSession,
        kind: RecordKind,
    ) -> Result<Vec<ParentRecord>, BackendError> {
        let state = self.state.lock().expect("dump mutex poisoned");
        Ok(state
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
        let state = self.state.lock().expect("dump mutex poisoned");
        Ok(state
            .groups
            .iter()
            .filter(|group| group.parent.kind == kind)
            .cloned()
            .collect())
    }

    async fn create_record(
        &self,
        _session: &ApiSession,
        kind: RecordKind,
        payload: &RecordPayload,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().expect("dump mutex poisoned");
        let reference = state.insert_record(
            kind,
            payload.id_subkegiatan,
            payload.id_pengawas,
            payload.tanggal_mulai,
            payload.tanggal_selesai,
            &payload.anggota,
        );
        info!(record = %reference, members = payload.anggota.len(), "record stored in dump");
        Ok(())
    }

    async fn update_plan_group(
        &self,
        _session: &ApiSession,
        group_id: u64,
        payload: &GroupUpdatePayload,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().expect("dump mutex poisoned");
        let group = state
            .groups
            .iter_mut()
            .find(|group| group.parent.kind == RecordKind::Plan && group.id == group_id)
            .ok_or_else(|| BackendError::Status {
                status: 404,
                path: format!("/api/kelompok-perencanaan/{group_id}"),
                message: format!("kelompok perencanaan {group_id} tidak ditemukan"),
            })?;
        group.job_code = JobCode::new(&payload.kode_jabatan);
        group.volume = payload.volume_tugas;
        group.total_honor = None;
        Ok(())
    }

    async fn preview_import(
        &self,
        _session: &ApiSession,
        kind: RecordKind,
        payload: &ImportPayload,
    ) -> Result<Vec<PreviewRow>, BackendError> {
        let snapshot = self.state.lock().expect("dump mutex poisoned").snapshot();
        let drafts: Vec<DraftAllocation> = payload
            .rows
            .iter()
            .map(|row| DraftAllocation {
                mitra_id: MitraId(row.id_mitra),
                job_code: JobCode::new(&row.kode_jabatan),
                volume: row.volume_tugas,
            })
            .collect();
        let projections = assess_allocations(
            &snapshot,
            &AssessmentRequest {
                kind,
                sub_activity_id: SubActivityId(payload.id_subkegiatan),
                drafts: &drafts,
                pool: IncomePool::Assignments,
                period_hint: None,
                exclude_record: None,
                exclude_group: None,
                staged: &[],
            },
        );
        Ok(preview_rows(&projections, &drafts))
    }

    async fn store_import(
        &self,
        _session: &ApiSession,
        kind: RecordKind,
        payload: &ImportPayload,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().expect("dump mutex poisoned");
        let reference = state.insert_record(
            kind,
            payload.id_subkegiatan,
            None,
            None,
            None,
            &payload.rows,
        );
        info!(record = %reference, rows = payload.rows.len(), "import stored in dump");
        Ok(())
    }
}

/// Backend selection shared by the server and the CLI subcommands.
///
/// A dump file switches to offline mode; otherwise the configured REST API is used.
pub(crate) fn build_backend(
    config: &BackendConfig,
    dump: Option<&Path>,
) -> Result<Arc<dyn BudgetBackend>, AppError> {
    match dump {
        Some(path) => Ok(Arc::new(InMemoryBackend::from_path(path)?)),
        None => {
            info!(base_url = %config.base_url, "using fieldwork api backend");
            Ok(Arc::new(HttpBackend::new(config.clone())?))
        }
    }
}

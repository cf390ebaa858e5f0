use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::domain::{
    AllocationCheckRequest, AllocationReview, CreateRecordRequest, ImportPreview, ImportRequest,
    PlanGroupUpdate, PromoteRequest, PromotionReport, RecapQuery, ReviewedRow, SubmissionReport,
};
use super::preview::{merge_decisions, reconcile, server_projections};
use super::recap::{build_recap, IncomeRecap};
use crate::backend::{
    ApiSession, BackendError, BudgetBackend, GroupUpdatePayload, ImportPayload, MemberPayload,
    RecordPayload,
};
use crate::budget::{
    assess_allocations, classify_allocation, AssessmentRequest, BudgetGate, BudgetSnapshot,
    CeilingTable, CeilingTableError, DraftAllocation, GateDecision, GatePolicy, IncomePool,
    JobCode, Period, ProjectionRow, RecordKind, RecordRef, SubActivity, SubActivityId,
};

/// Service running every budget-checked flow against a backend snapshot.
pub struct BudgetService<B: ?Sized> {
    backend: Arc<B>,
}

impl<B> BudgetService<B>
where
    B: BudgetBackend + ?Sized + 'static,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Fetch every entity the engine needs in one consistent pass.
    pub async fn snapshot(&self, session: &ApiSession) -> Result<BudgetSnapshot, BudgetServiceError> {
        let backend = self.backend.as_ref();
        let (
            rates,
            ceilings,
            activities,
            sub_activities,
            mitra,
            assignments,
            plans,
            assignment_groups,
            plan_groups,
        ) = tokio::try_join!(
            backend.honor_rates(session),
            backend.ceiling_rules(session),
            backend.activities(session),
            backend.sub_activities(session),
            backend.mitra(session),
            backend.parent_records(session, RecordKind::Assignment),
            backend.parent_records(session, RecordKind::Plan),
            backend.assignment_groups(session, RecordKind::Assignment),
            backend.assignment_groups(session, RecordKind::Plan),
        )?;

        let mut records = assignments;
        records.extend(plans);
        let mut groups = assignment_groups;
        groups.extend(plan_groups);

        let snapshot = BudgetSnapshot {
            activities,
            sub_activities,
            rates,
            ceilings: CeilingTable::from_rules(ceilings),
            mitra,
            records,
            groups,
        };

        debug!(
            rates = snapshot.rates.len(),
            records = snapshot.records.len(),
            groups = snapshot.groups.len(),
            "budget snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Evaluate drafts under the requested policy without writing anything.
    pub async fn check_allocations(
        &self,
        session: &ApiSession,
        request: &AllocationCheckRequest,
    ) -> Result<AllocationReview, BudgetServiceError> {
        if request.allocations.is_empty() {
            return Err(BudgetServiceError::InvalidRequest(
                "at least one allocation is required".to_string(),
            ));
        }

        let snapshot = self.snapshot(session).await?;
        let review = review_allocations(&snapshot, request);
        ensure_ceilings(
            &snapshot,
            review.rows.iter().map(|reviewed| &reviewed.projection),
        )?;
        Ok(review)
    }

    /// Create an Assignment or Plan. Budget violations are warnings only.
    pub async fn create_record(
        &self,
        session: &ApiSession,
        request: &CreateRecordRequest,
    ) -> Result<SubmissionReport, BudgetServiceError> {
        validate_members(&request.members)?;

        let snapshot = self.snapshot(session).await?;
        require_sub_activity(&snapshot, request.sub_activity_id)?;

        let rows = assess_allocations(
            &snapshot,
            &AssessmentRequest {
                kind: request.kind,
                sub_activity_id: request.sub_activity_id,
                drafts: &request.members,
                pool: IncomePool::Assignments,
                period_hint: request.start_date.map(Period::of),
                exclude_record: None,
                exclude_group: None,
                staged: &[],
            },
        );
        ensure_ceilings(&snapshot, &rows)?;
        let decision = BudgetGate::new(GatePolicy::ManualEdit).evaluate(&rows);
        let outcome = decision.resolve(false);
        warn_on_override(&decision, request.kind.label());

        let payload = RecordPayload {
            id_subkegiatan: request.sub_activity_id.0,
            id_pengawas: request.supervisor_id,
            tanggal_mulai: request.start_date,
            tanggal_selesai: request.end_date,
            anggota: request.members.iter().map(MemberPayload::from).collect(),
        };
        self.backend
            .create_record(session, request.kind, &payload)
            .await?;

        info!(
            kind = request.kind.label(),
            sub_activity = %request.sub_activity_id.0,
            members = request.members.len(),
            outcome = ?outcome,
            "record created"
        );

        Ok(SubmissionReport {
            outcome,
            decision,
            rows,
        })
    }

    /// Edit one plan group in place. The PUT is sent even when over budget.
    pub async fn update_plan_group(
        &self,
        session: &ApiSession,
        group_id: u64,
        update: &PlanGroupUpdate,
    ) -> Result<SubmissionReport, BudgetServiceError> {
        validate_line(1, &update.job_code, update.volume)?;

        let snapshot = self.snapshot(session).await?;
        let group = snapshot
            .group(RecordKind::Plan, group_id)
            .ok_or_else(|| BudgetServiceError::NotFound(format!("plan group #{group_id}")))?;
        let record = snapshot
            .record(group.parent)
            .ok_or_else(|| BudgetServiceError::NotFound(group.parent.to_string()))?;

        let drafts = [DraftAllocation {
            mitra_id: group.mitra_id,
            job_code: update.job_code.clone(),
            volume: update.volume,
        }];
        let rows = assess_allocations(
            &snapshot,
            &AssessmentRequest {
                kind: RecordKind::Plan,
                sub_activity_id: record.sub_activity_id,
                drafts: &drafts,
                pool: IncomePool::Assignments,
                period_hint: record.start_date.map(Period::of),
                exclude_record: None,
                exclude_group: Some(group_id),
                staged: &[],
            },
        );
        ensure_ceilings(&snapshot, &rows)?;
        let decision = BudgetGate::new(GatePolicy::ManualEdit).evaluate(&rows);
        let outcome = decision.resolve(false);
        warn_on_override(&decision, "plan group");

        let payload = GroupUpdatePayload {
            kode_jabatan: update.job_code.to_string(),
            volume_tugas: update.volume,
        };
        self.backend
            .update_plan_group(session, group_id, &payload)
            .await?;

        info!(group_id, outcome = ?outcome, "plan group updated");
        Ok(SubmissionReport {
            outcome,
            decision,
            rows,
        })
    }

    /// Project an import batch locally and on the backend, then gate it.
    pub async fn preview_import(
        &self,
        session: &ApiSession,
        request: &ImportRequest,
    ) -> Result<ImportPreview, BudgetServiceError> {
        if request.rows.is_empty() {
            return Err(BudgetServiceError::InvalidRequest(
                "import contains no rows".to_string(),
            ));
        }
        validate_members(&request.rows)?;

        let payload = import_payload(request);
        let (snapshot, preview) = tokio::try_join!(self.snapshot(session), async {
            self.backend
                .preview_import(session, request.kind, &payload)
                .await
                .map_err(BudgetServiceError::from)
        })?;
        require_sub_activity(&snapshot, request.sub_activity_id)?;

        let rows = assess_allocations(
            &snapshot,
            &AssessmentRequest {
                kind: request.kind,
                sub_activity_id: request.sub_activity_id,
                drafts: &request.rows,
                pool: IncomePool::Assignments,
                period_hint: None,
                exclude_record: None,
                exclude_group: None,
                staged: &[],
            },
        );
        ensure_ceilings(&snapshot, &rows)?;
        let period = snapshot
            .sub_activity(request.sub_activity_id)
            .and_then(SubActivity::period);
        let server_rows = server_projections(&preview, period);

        let gate = BudgetGate::new(GatePolicy::Import);
        let decision = merge_decisions(gate.evaluate(&rows), gate.evaluate(&server_rows));
        let drift = reconcile(&rows, &server_rows);

        info!(
            kind = request.kind.label(),
            rows = rows.len(),
            blocked = decision.blocked,
            violations = decision.violations.len(),
            drift = drift.len(),
            "import previewed"
        );

        Ok(ImportPreview {
            rows,
            server_rows,
            decision,
            drift,
        })
    }

    /// Store an import batch; refused outright while any violation remains.
    pub async fn commit_import(
        &self,
        session: &ApiSession,
        request: &ImportRequest,
    ) -> Result<SubmissionReport, BudgetServiceError> {
        let preview = self.preview_import(session, request).await?;
        if preview.decision.blocked {
            warn!(
                violations = preview.decision.violations.len(),
                "import blocked by budget gate"
            );
            return Err(BudgetServiceError::ImportBlocked(Box::new(preview.decision)));
        }

        self.backend
            .store_import(session, request.kind, &import_payload(request))
            .await?;

        let outcome = preview.decision.resolve(false);
        info!(kind = request.kind.label(), rows = request.rows.len(), "import stored");
        Ok(SubmissionReport {
            outcome,
            decision: preview.decision,
            rows: preview.rows,
        })
    }

    /// Forward plans to assignments once the user has seen every warning.
    pub async fn promote_plans(
        &self,
        session: &ApiSession,
        request: &PromoteRequest,
    ) -> Result<PromotionReport, BudgetServiceError> {
        let plan_ids: Vec<u64> = {
            let mut seen = BTreeSet::new();
            request
                .plan_ids
                .iter()
                .copied()
                .filter(|id| seen.insert(*id))
                .collect()
        };
        if plan_ids.is_empty() {
            return Err(BudgetServiceError::InvalidRequest(
                "no plans selected for promotion".to_string(),
            ));
        }

        let snapshot = self.snapshot(session).await?;
        let mut batches = Vec::with_capacity(plan_ids.len());
        let mut rows: Vec<ProjectionRow> = Vec::new();
        // Members of plans earlier in the batch, per sub-activity.
        let mut staged: HashMap<SubActivityId, Vec<DraftAllocation>> = HashMap::new();

        for plan_id in &plan_ids {
            let reference = RecordRef::plan(*plan_id);
            let record = snapshot
                .record(reference)
                .ok_or_else(|| BudgetServiceError::NotFound(reference.to_string()))?;
            let members: Vec<DraftAllocation> = snapshot
                .groups_of(reference)
                .map(DraftAllocation::from)
                .collect();
            if members.is_empty() {
                return Err(BudgetServiceError::InvalidRequest(format!(
                    "{reference} has no members to promote"
                )));
            }

            let offset = rows.len();
            let plan_rows = assess_allocations(
                &snapshot,
                &AssessmentRequest {
                    kind: RecordKind::Assignment,
                    sub_activity_id: record.sub_activity_id,
                    drafts: &members,
                    pool: IncomePool::Plans,
                    period_hint: record.start_date.map(Period::of),
                    exclude_record: Some(reference),
                    exclude_group: None,
                    staged: staged
                        .get(&record.sub_activity_id)
                        .map(Vec::as_slice)
                        .unwrap_or_default(),
                },
            );
            rows.extend(plan_rows.into_iter().map(|mut row| {
                row.row += offset;
                row
            }));

            batches.push(RecordPayload {
                id_subkegiatan: record.sub_activity_id.0,
                id_pengawas: record.supervisor_id,
                tanggal_mulai: record.start_date,
                tanggal_selesai: record.end_date,
                anggota: members.iter().map(MemberPayload::from).collect(),
            });
            staged
                .entry(record.sub_activity_id)
                .or_default()
                .extend(members);
        }
        ensure_ceilings(&snapshot, &rows)?;

        let decision = BudgetGate::new(GatePolicy::Promote).evaluate(&rows);
        let outcome = decision.resolve(request.confirmed);
        let prompt = decision.prompt();

        if !outcome.proceeds() {
            info!(
                plans = plan_ids.len(),
                warnings = decision.violations.len(),
                "promotion awaiting confirmation"
            );
            return Ok(PromotionReport {
                outcome,
                decision,
                prompt,
                rows,
                promoted: Vec::new(),
            });
        }

        let mut promoted = Vec::with_capacity(plan_ids.len());
        for (plan_id, payload) in plan_ids.iter().zip(&batches) {
            if let Err(err) = self
                .backend
                .create_record(session, RecordKind::Assignment, payload)
                .await
            {
                warn!(plan_id, promoted = ?promoted, error = %err, "promotion stopped midway");
                return Err(BudgetServiceError::PromotionIncomplete {
                    promoted,
                    failed: *plan_id,
                    source: err,
                });
            }
            promoted.push(*plan_id);
        }

        info!(plans = promoted.len(), outcome = ?outcome, "plans promoted");
        Ok(PromotionReport {
            outcome,
            decision,
            prompt,
            rows,
            promoted,
        })
    }

    pub async fn recap(
        &self,
        session: &ApiSession,
        query: &RecapQuery,
    ) -> Result<IncomeRecap, BudgetServiceError> {
        if let Some(month) = query.month {
            if Period::new(query.year, month).is_none() {
                return Err(BudgetServiceError::InvalidRequest(format!(
                    "month must be between 1 and 12, got {month}"
                )));
            }
        }

        let snapshot = self.snapshot(session).await?;
        snapshot.ceilings.ensure_unambiguous(query.year)?;
        Ok(build_recap(&snapshot, query.year, query.month, query.pool))
    }
}

/// Project, gate, and classify drafts against an already loaded snapshot.
pub fn review_allocations(
    snapshot: &BudgetSnapshot,
    request: &AllocationCheckRequest,
) -> AllocationReview {
    let rows = assess_allocations(
        snapshot,
        &AssessmentRequest {
            kind: request.kind,
            sub_activity_id: request.sub_activity_id,
            drafts: &request.allocations,
            pool: request.pool,
            period_hint: request.period,
            exclude_record: request.excluded_record(),
            exclude_group: request.exclude_group,
            staged: &[],
        },
    );
    let decision = BudgetGate::new(request.policy).evaluate(&rows);
    let prompt = decision.prompt();

    let rows = rows
        .into_iter()
        .zip(&request.allocations)
        .map(|(projection, draft)| ReviewedRow {
            state: classify_allocation(
                Some(&draft.job_code),
                Some(draft.volume),
                Some(&projection),
            ),
            projection,
        })
        .collect();

    AllocationReview {
        rows,
        decision,
        prompt,
    }
}

fn validate_members(members: &[DraftAllocation]) -> Result<(), BudgetServiceError> {
    if members.is_empty() {
        return Err(BudgetServiceError::InvalidRequest(
            "at least one member is required".to_string(),
        ));
    }

    members
        .iter()
        .enumerate()
        .try_for_each(|(index, member)| validate_line(index + 1, &member.job_code, member.volume))
}

fn validate_line(line: usize, job_code: &JobCode, volume: u64) -> Result<(), BudgetServiceError> {
    if job_code.is_empty() {
        return Err(BudgetServiceError::InvalidRequest(format!(
            "row {line}: job code is required"
        )));
    }
    if volume == 0 {
        return Err(BudgetServiceError::InvalidRequest(format!(
            "row {line}: volume must be greater than zero"
        )));
    }
    Ok(())
}

/// Refuse to evaluate rows whose year has conflicting ceiling rules.
fn ensure_ceilings<'r>(
    snapshot: &BudgetSnapshot,
    rows: impl IntoIterator<Item = &'r ProjectionRow>,
) -> Result<(), CeilingTableError> {
    rows.into_iter()
        .filter_map(|row| row.period)
        .try_for_each(|period| snapshot.ceilings.ensure_unambiguous(period.year))
}

fn require_sub_activity(
    snapshot: &BudgetSnapshot,
    id: SubActivityId,
) -> Result<(), BudgetServiceError> {
    match snapshot.sub_activity(id) {
        Some(_) => Ok(()),
        None => Err(BudgetServiceError::NotFound(format!("sub-activity #{}", id.0))),
    }
}

fn import_payload(request: &ImportRequest) -> ImportPayload {
    ImportPayload {
        id_subkegiatan: request.sub_activity_id.0,
        rows: request.rows.iter().map(MemberPayload::from).collect(),
    }
}

fn warn_on_override(decision: &GateDecision, subject: &str) {
    if decision.is_clean() {
        return;
    }
    for violation in &decision.violations {
        warn!(subject, row = violation.row, message = %violation.message, "saving over budget");
    }
}

/// Error raised by the budget service.
#[derive(Debug, thiserror::Error)]
pub enum BudgetServiceError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("invalid ceiling configuration: {0}")]
    Ceilings(#[from] CeilingTableError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("import blocked by {} budget violation(s)", .0.violations.len())]
    ImportBlocked(Box<GateDecision>),
    #[error("promotion stopped at plan #{failed} after promoting {promoted:?}: {source}")]
    PromotionIncomplete {
        promoted: Vec<u64>,
        failed: u64,
        #[source]
        source: BackendError,
    },
}

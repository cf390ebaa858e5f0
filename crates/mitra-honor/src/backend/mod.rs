//! Access to the fieldwork REST API that owns every persisted entity.
//!
//! The engine never talks to the network; [`BudgetBackend`] is the seam the
//! planning service fetches snapshots through and sends committed writes to.

pub mod http;
pub mod wire;

use async_trait::async_trait;

use crate::budget::domain::{
    Activity, AssignmentGroup, CeilingRule, HonorRate, Mitra, ParentRecord, RecordKind,
    SubActivity,
};

pub use http::HttpBackend;
pub use wire::{
    BackendDump, GroupUpdatePayload, ImportPayload, MemberPayload, PreviewRow, PreviewStats,
    RecordPayload,
};

/// Caller identity forwarded to the backend on every request.
///
/// Built from the inbound `Authorization` header rather than read from any
/// process-wide store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiSession {
    pub bearer: Option<String>,
}

impl ApiSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
        }
    }

    /// Parses `Bearer <token>`; anything else yields an anonymous session.
    pub fn from_authorization(header: Option<&str>) -> Self {
        let token = header
            .map(str::trim)
            .and_then(|value| {
                value
                    .strip_prefix("Bearer ")
                    .or_else(|| value.strip_prefix("bearer "))
            })
            .map(str::trim)
            .filter(|token| !token.is_empty());

        Self {
            bearer: token.map(str::to_string),
        }
    }
}

/// Read and write surface of the fieldwork API.
#[async_trait]
pub trait BudgetBackend: Send + Sync {
    async fn honor_rates(&self, session: &ApiSession) -> Result<Vec<HonorRate>, BackendError>;

    async fn ceiling_rules(&self, session: &ApiSession)
        -> Result<Vec<CeilingRule>, BackendError>;

    async fn activities(&self, session: &ApiSession) -> Result<Vec<Activity>, BackendError>;

    async fn sub_activities(&self, session: &ApiSession)
        -> Result<Vec<SubActivity>, BackendError>;

    async fn mitra(&self, session: &ApiSession) -> Result<Vec<Mitra>, BackendError>;

    async fn parent_records(
        &self,
        session: &ApiSession,
        kind: RecordKind,
    ) -> Result<Vec<ParentRecord>, BackendError>;

    async fn assignment_groups(
        &self,
        session: &ApiSession,
        kind: RecordKind,
    ) -> Result<Vec<AssignmentGroup>, BackendError>;

    async fn create_record(
        &self,
        session: &ApiSession,
        kind: RecordKind,
        payload: &RecordPayload,
    ) -> Result<(), BackendError>;

    async fn update_plan_group(
        &self,
        session: &ApiSession,
        group_id: u64,
        payload: &GroupUpdatePayload,
    ) -> Result<(), BackendError>;

    async fn preview_import(
        &self,
        session: &ApiSession,
        kind: RecordKind,
        payload: &ImportPayload,
    ) -> Result<Vec<PreviewRow>, BackendError>;

    async fn store_import(
        &self,
        session: &ApiSession,
        kind: RecordKind,
        payload: &ImportPayload,
    ) -> Result<(), BackendError>;
}

/// Failure talking to, or understanding, the fieldwork API.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend rejected {path} with status {status}: {message}")]
    Status {
        status: u16,
        path: String,
        message: String,
    },
    #[error("unexpected payload from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Status the API answered with, when it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_parses_bearer_headers() {
        assert_eq!(
            ApiSession::from_authorization(Some("Bearer abc123")),
            ApiSession::bearer("abc123")
        );
        assert_eq!(
            ApiSession::from_authorization(Some("  bearer  xyz ")),
            ApiSession::bearer("xyz")
        );
        assert_eq!(
            ApiSession::from_authorization(Some("Basic Zm9v")),
            ApiSession::anonymous()
        );
        assert_eq!(
            ApiSession::from_authorization(Some("Bearer ")),
            ApiSession::anonymous()
        );
        assert_eq!(ApiSession::from_authorization(None), ApiSession::anonymous());
    }

    #[test]
    fn only_rejections_carry_a_status() {
        let rejected = BackendError::Status {
            status: 422,
            path: "/api/penugasan".to_string(),
            message: "volume wajib diisi".to_string(),
        };
        assert_eq!(rejected.status(), Some(422));
        assert!(rejected.to_string().contains("/api/penugasan"));
        assert_eq!(
            BackendError::Unavailable("offline".to_string()).status(),
            None
        );
    }
}

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::wire::{
    decode_rows, ActivityRow, CeilingRuleRow, GroupRow, GroupUpdatePayload, HonorRateRow,
    ImportPayload, MitraRow, ParentRow, PreviewRow, RecordPayload, SubActivityRow,
};
use super::{ApiSession, BackendError, BudgetBackend};
use crate::budget::domain::{
    Activity, AssignmentGroup, CeilingRule, HonorRate, Mitra, ParentRecord, RecordKind,
    SubActivity,
};
use crate::config::BackendConfig;

/// [`BudgetBackend`] over the fieldwork REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str, session: &ApiSession) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.config.endpoint(path))
            .header(reqwest::header::ACCEPT, "application/json");

        match session.bearer.as_deref().or(self.config.api_token.as_deref()) {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        path: &str,
        session: &ApiSession,
    ) -> Result<Vec<T>, BackendError> {
        let response = self.request(Method::GET, path, session).send().await?;
        let body = checked(path, response).await?.bytes().await?;
        let rows = decode_rows(&body).map_err(|source| BackendError::Decode {
            path: path.to_string(),
            source,
        })?;
        debug!(path, rows = rows.len(), "fetched backend rows");
        Ok(rows)
    }

    async fn send_json<P: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        session: &ApiSession,
        payload: &P,
    ) -> Result<Response, BackendError> {
        let response = self
            .request(method, path, session)
            .json(payload)
            .send()
            .await?;
        checked(path, response).await
    }
}

async fn checked(path: &str, response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);

    warn!(path, status = status.as_u16(), %message, "backend rejected request");
    Err(BackendError::Status {
        status: status.as_u16(),
        path: path.to_string(),
        message,
    })
}

fn group_path(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Assignment => "/api/kelompok-penugasan",
        RecordKind::Plan => "/api/kelompok-perencanaan",
    }
}

#[async_trait]
impl BudgetBackend for HttpBackend {
    async fn honor_rates(&self, session: &ApiSession) -> Result<Vec<HonorRate>, BackendError> {
        let rows: Vec<HonorRateRow> = self.get_rows("/api/honorarium", session).await?;
        Ok(rows.into_iter().map(HonorRate::from).collect())
    }

    async fn ceiling_rules(
        &self,
        session: &ApiSession,
    ) -> Result<Vec<CeilingRule>, BackendError> {
        let rows: Vec<CeilingRuleRow> = self.get_rows("/api/aturan-periode", session).await?;
        Ok(rows.into_iter().map(CeilingRule::from).collect())
    }

    async fn activities(&self, session: &ApiSession) -> Result<Vec<Activity>, BackendError> {
        let rows: Vec<ActivityRow> = self.get_rows("/api/kegiatan", session).await?;
        Ok(rows.into_iter().filter_map(ActivityRow::into_domain).collect())
    }

    async fn sub_activities(
        &self,
        session: &ApiSession,
    ) -> Result<Vec<SubActivity>, BackendError> {
        let rows: Vec<SubActivityRow> = self.get_rows("/api/subkegiatan", session).await?;
        Ok(rows
            .into_iter()
            .filter_map(SubActivityRow::into_domain)
            .collect())
    }

    async fn mitra(&self, session: &ApiSession) -> Result<Vec<Mitra>, BackendError> {
        let rows: Vec<MitraRow> = self.get_rows("/api/mitra", session).await?;
        Ok(rows.into_iter().filter_map(MitraRow::into_domain).collect())
    }

    async fn parent_records(
        &self,
        session: &ApiSession,
        kind: RecordKind,
    ) -> Result<Vec<ParentRecord>, BackendError> {
        let path = format!("/api/{}", kind.resource());
        let rows: Vec<ParentRow> = self.get_rows(&path, session).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_domain(kind))
            .collect())
    }

    async fn assignment_groups(
        &self,
        session: &ApiSession,
        kind: RecordKind,
    ) -> Result<Vec<AssignmentGroup>, BackendError> {
        let rows: Vec<GroupRow> = self.get_rows(group_path(kind), session).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_domain(kind))
            .collect())
    }

    async fn create_record(
        &self,
        session: &ApiSession,
        kind: RecordKind,
        payload: &RecordPayload,
    ) -> Result<(), BackendError> {
        let path = format!("/api/{}", kind.resource());
        self.send_json(Method::POST, &path, session, payload)
            .await?;
        Ok(())
    }

    async fn update_plan_group(
        &self,
        session: &ApiSession,
        group_id: u64,
        payload: &GroupUpdatePayload,
    ) -> Result<(), BackendError> {
        let path = format!("{}/{group_id}", group_path(RecordKind::Plan));
        self.send_json(Method::PUT, &path, session, payload).await?;
        Ok(())
    }

    async fn preview_import(
        &self,
        session: &ApiSession,
        kind: RecordKind,
        payload: &ImportPayload,
    ) -> Result<Vec<PreviewRow>, BackendError> {
        let path = format!("/api/{}/preview-import", kind.resource());
        let body = self
            .send_json(Method::POST, &path, session, payload)
            .await?
            .bytes()
            .await?;
        decode_rows(&body).map_err(|source| BackendError::Decode { path, source })
    }

    async fn store_import(
        &self,
        session: &ApiSession,
        kind: RecordKind,
        payload: &ImportPayload,
    ) -> Result<(), BackendError> {
        let path = format!("/api/{}/store-import", kind.resource());
        self.send_json(Method::POST, &path, session, payload)
            .await?;
        Ok(())
    }
}

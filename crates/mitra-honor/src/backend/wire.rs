//! JSON shapes exchanged with the fieldwork REST API.
//!
//! Rows are decoded leniently (numeric strings, `data` envelopes, integer
//! 0/1 flags) and converted into domain types here, so nothing past this
//! module ever sees a raw payload.

use chrono::{DateTime, NaiveDate};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::budget::domain::{
    Activity, ActivityId, AssignmentGroup, CeilingRule, DraftAllocation, HonorRate, JobCode,
    Mitra, MitraId, ParentRecord, RecordKind, RecordRef, Rupiah, SubActivity, SubActivityId,
};

/// List responses arrive either bare or wrapped in `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Envelope<T> {
    pub fn into_rows(self) -> Vec<T> {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(rows) => rows,
        }
    }
}

pub fn decode_rows<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, serde_json::Error> {
    serde_json::from_slice::<Envelope<T>>(body).map(Envelope::into_rows)
}

#[derive(Debug, Clone, Deserialize)]
pub struct HonorRateRow {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_honorarium: Option<u64>,
    #[serde(deserialize_with = "de_id")]
    pub id_subkegiatan: u64,
    pub kode_jabatan: String,
    #[serde(deserialize_with = "de_amount")]
    pub tarif: Rupiah,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_satuan: Option<u64>,
    #[serde(default, deserialize_with = "de_volume")]
    pub basis_volume: u64,
    #[serde(default)]
    pub nama_satuan: Option<String>,
    #[serde(default)]
    pub satuan_alias: Option<String>,
    #[serde(default)]
    pub beban_anggaran: Option<String>,
}

impl From<HonorRateRow> for HonorRate {
    fn from(row: HonorRateRow) -> Self {
        HonorRate {
            id: row.id.or(row.id_honorarium).unwrap_or_default(),
            sub_activity_id: SubActivityId(row.id_subkegiatan),
            job_code: JobCode::new(&row.kode_jabatan),
            tariff: row.tarif,
            unit_id: row.id_satuan,
            unit_label: row.satuan_alias.or(row.nama_satuan).unwrap_or_default(),
            basis_volume: row.basis_volume,
            budget_charge_code: row.beban_anggaran.filter(|code| !code.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CeilingRuleRow {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<u64>,
    #[serde(alias = "tahun", deserialize_with = "de_year")]
    pub periode: i32,
    #[serde(deserialize_with = "de_amount")]
    pub batas_honor: Rupiah,
}

impl From<CeilingRuleRow> for CeilingRule {
    fn from(row: CeilingRuleRow) -> Self {
        CeilingRule {
            id: row.id.unwrap_or_default(),
            year: row.periode,
            monthly_ceiling: row.batas_honor,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityRow {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_kegiatan: Option<u64>,
    #[serde(alias = "nama")]
    pub nama_kegiatan: String,
    #[serde(default)]
    pub deskripsi: Option<String>,
}

impl ActivityRow {
    pub fn into_domain(self) -> Option<Activity> {
        let Some(id) = self.id.or(self.id_kegiatan) else {
            warn!(name = %self.nama_kegiatan, "skipping activity without id");
            return None;
        };
        Some(Activity {
            id: ActivityId(id),
            name: self.nama_kegiatan,
            description: self.deskripsi,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubActivityRow {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_subkegiatan: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_kegiatan: Option<u64>,
    #[serde(alias = "nama")]
    pub nama_subkegiatan: String,
    #[serde(default)]
    pub deskripsi: Option<String>,
    #[serde(default, deserialize_with = "de_opt_date")]
    pub tanggal_mulai: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_opt_date")]
    pub tanggal_selesai: Option<NaiveDate>,
}

impl SubActivityRow {
    pub fn into_domain(self) -> Option<SubActivity> {
        let Some(id) = self.id_subkegiatan.or(self.id) else {
            warn!(name = %self.nama_subkegiatan, "skipping sub-activity without id");
            return None;
        };
        Some(SubActivity {
            id: SubActivityId(id),
            activity_id: ActivityId(self.id_kegiatan.unwrap_or_default()),
            name: self.nama_subkegiatan,
            description: self.deskripsi,
            start_date: self.tanggal_mulai,
            end_date: self.tanggal_selesai,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MitraRow {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_mitra: Option<u64>,
    #[serde(alias = "nama_mitra", alias = "nama")]
    pub nama_lengkap: String,
    #[serde(default)]
    pub nik: Option<String>,
    #[serde(default)]
    pub no_hp: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub alamat: Option<String>,
    #[serde(default, deserialize_with = "de_years")]
    pub tahun_aktif: Vec<i32>,
}

impl MitraRow {
    pub fn into_domain(self) -> Option<Mitra> {
        let Some(id) = self.id_mitra.or(self.id) else {
            warn!(name = %self.nama_lengkap, "skipping mitra without id");
            return None;
        };
        Some(Mitra {
            id: MitraId(id),
            name: self.nama_lengkap,
            nik: self.nik.unwrap_or_default(),
            phone: self.no_hp,
            email: self.email,
            address: self.alamat,
            active_years: self.tahun_aktif,
        })
    }
}

/// Assignment (penugasan) or Plan (perencanaan) header row.
#[derive(Debug, Clone, Deserialize)]
pub struct ParentRow {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_penugasan: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_perencanaan: Option<u64>,
    #[serde(deserialize_with = "de_id")]
    pub id_subkegiatan: u64,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_pengawas: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_date")]
    pub tanggal_mulai: Option<NaiveDate>,
    #[serde(default, deserialize_with = "de_opt_date")]
    pub tanggal_selesai: Option<NaiveDate>,
}

impl ParentRow {
    pub fn into_domain(self, kind: RecordKind) -> Option<ParentRecord> {
        let own_id = match kind {
            RecordKind::Assignment => self.id_penugasan,
            RecordKind::Plan => self.id_perencanaan,
        };
        let Some(id) = own_id.or(self.id) else {
            warn!(kind = kind.label(), "skipping record without id");
            return None;
        };
        Some(ParentRecord {
            reference: RecordRef { kind, id },
            sub_activity_id: SubActivityId(self.id_subkegiatan),
            supervisor_id: self.id_pengawas,
            start_date: self.tanggal_mulai,
            end_date: self.tanggal_selesai,
        })
    }
}

/// Group row (kelompok penugasan / kelompok perencanaan).
#[derive(Debug, Clone, Deserialize)]
pub struct GroupRow {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_kelompok: Option<u64>,
    #[serde(deserialize_with = "de_id")]
    pub id_mitra: u64,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_penugasan: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id_perencanaan: Option<u64>,
    pub kode_jabatan: String,
    #[serde(default, deserialize_with = "de_volume")]
    pub volume_tugas: u64,
    #[serde(default, deserialize_with = "de_opt_amount")]
    pub total_honor: Option<Rupiah>,
}

impl GroupRow {
    pub fn into_domain(self, kind: RecordKind) -> Option<AssignmentGroup> {
        let parent_id = match kind {
            RecordKind::Assignment => self.id_penugasan,
            RecordKind::Plan => self.id_perencanaan,
        };
        let Some(parent_id) = parent_id else {
            warn!(
                kind = kind.label(),
                mitra = self.id_mitra,
                "skipping group without parent record"
            );
            return None;
        };
        Some(AssignmentGroup {
            id: self.id.or(self.id_kelompok).unwrap_or_default(),
            mitra_id: MitraId(self.id_mitra),
            parent: RecordRef {
                kind,
                id: parent_id,
            },
            job_code: JobCode::new(&self.kode_jabatan),
            volume: self.volume_tugas,
            total_honor: self.total_honor,
        })
    }
}

/// Server-side budget figures returned per row by `preview-import`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewStats {
    #[serde(default, deserialize_with = "de_volume")]
    pub existing_vol: u64,
    #[serde(default, deserialize_with = "de_volume")]
    pub target_vol: u64,
    #[serde(default, deserialize_with = "de_amount_or_zero")]
    pub existing_income: Rupiah,
    #[serde(default, deserialize_with = "de_amount_or_zero")]
    pub new_income: Rupiah,
    #[serde(default, deserialize_with = "de_amount_or_zero")]
    pub limit_honor: Rupiah,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_over_limit: bool,
    #[serde(default, deserialize_with = "de_flag")]
    pub is_over_volume: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewRow {
    #[serde(deserialize_with = "de_id")]
    pub id_mitra: u64,
    #[serde(default)]
    pub nama_mitra: Option<String>,
    pub kode_jabatan: String,
    #[serde(alias = "volume_tugas", default, deserialize_with = "de_volume")]
    pub volume: u64,
    pub stats: PreviewStats,
}

/// Member line sent with create and import requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPayload {
    pub id_mitra: u64,
    pub kode_jabatan: String,
    pub volume_tugas: u64,
}

impl From<&DraftAllocation> for MemberPayload {
    fn from(draft: &DraftAllocation) -> Self {
        Self {
            id_mitra: draft.mitra_id.0,
            kode_jabatan: draft.job_code.to_string(),
            volume_tugas: draft.volume,
        }
    }
}

/// Body of `POST /api/penugasan` and `POST /api/perencanaan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub id_subkegiatan: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_pengawas: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tanggal_mulai: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tanggal_selesai: Option<NaiveDate>,
    pub anggota: Vec<MemberPayload>,
}

/// Body of `PUT /api/kelompok-perencanaan/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUpdatePayload {
    pub kode_jabatan: String,
    pub volume_tugas: u64,
}

/// Body of the `preview-import` and `store-import` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPayload {
    pub id_subkegiatan: u64,
    pub rows: Vec<MemberPayload>,
}

/// Raw dump of every list endpoint, used to run against a saved snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendDump {
    pub kegiatan: Vec<ActivityRow>,
    pub subkegiatan: Vec<SubActivityRow>,
    pub honorarium: Vec<HonorRateRow>,
    pub aturan_periode: Vec<CeilingRuleRow>,
    pub mitra: Vec<MitraRow>,
    pub penugasan: Vec<ParentRow>,
    pub perencanaan: Vec<ParentRow>,
    pub kelompok_penugasan: Vec<GroupRow>,
    pub kelompok_perencanaan: Vec<GroupRow>,
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

fn de_amount<'de, D>(deserializer: D) -> Result<Rupiah, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    number_from(&value)
        .map(|amount| amount.round() as Rupiah)
        .ok_or_else(|| D::Error::custom(format!("expected an amount, found {value}")))
}

fn de_amount_or_zero<'de, D>(deserializer: D) -> Result<Rupiah, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_opt_amount(deserializer)?.unwrap_or(0))
}

fn de_opt_amount<'de, D>(deserializer: D) -> Result<Option<Rupiah>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if is_blank(&value) {
        return Ok(None);
    }
    number_from(&value)
        .map(|amount| Some(amount.round() as Rupiah))
        .ok_or_else(|| D::Error::custom(format!("expected an amount, found {value}")))
}

fn de_volume<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if is_blank(&value) {
        return Ok(0);
    }
    number_from(&value)
        .filter(|volume| *volume >= 0.0)
        .map(|volume| volume.round() as u64)
        .ok_or_else(|| D::Error::custom(format!("expected a volume, found {value}")))
}

fn de_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    de_opt_id(deserializer)?.ok_or_else(|| D::Error::custom("missing identifier"))
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_u64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid identifier {value}"))),
        Value::String(raw) if raw.trim().is_empty() => Ok(None),
        Value::String(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid identifier {value}"))),
        _ => Err(D::Error::custom(format!("invalid identifier {value}"))),
    }
}

fn de_year<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    year_from(&value).ok_or_else(|| D::Error::custom(format!("expected a year, found {value}")))
}

fn year_from(value: &Value) -> Option<i32> {
    number_from(value)
        .filter(|year| year.fract() == 0.0 && (1900.0..=9999.0).contains(year))
        .map(|year| year as i32)
}

fn de_years<'de, D>(deserializer: D) -> Result<Vec<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let years = match &value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().filter_map(year_from).collect(),
        Value::String(raw) => raw
            .split([',', ';', ' '])
            .filter_map(|part| part.trim().parse::<i32>().ok())
            .collect(),
        other => year_from(other).into_iter().collect(),
    };
    Ok(years)
}

fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(false),
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => Ok(number.as_f64().unwrap_or(0.0) != 0.0),
        Value::String(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            _ => Err(D::Error::custom(format!("expected a flag, found {value}"))),
        },
        _ => Err(D::Error::custom(format!("expected a flag, found {value}"))),
    }
}

fn de_opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(parse_date))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(datetime.date_naive());
    }

    trimmed
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(raw) => raw.trim().is_empty(),
        _ => false,
    }
}

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// Currency amounts in Rupiah.
///
/// Signed so a misconfigured (zero or negative) ceiling can be carried through
/// the engine and treated as "no cap" instead of being rejected.
pub type Rupiah = i64;

/// Identifier wrapper for registered mitra (partner field workers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MitraId(pub u64);

impl fmt::Display for MitraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubActivityId(pub u64);

impl fmt::Display for SubActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job-code (kode jabatan) normalized on construction.
///
/// Every comparison and map key in the engine goes through this type, so raw
/// codes such as `" ppl "` and `"PPL"` always meet as the same role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct JobCode(String);

impl JobCode {
    pub fn new(raw: &str) -> Self {
        Self(normalize_job_code(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for JobCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for JobCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::new(&raw))
    }
}

/// Trim, uppercase, and drop everything except ASCII alphanumerics and `-`.
pub fn normalize_job_code(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Calendar month used as the period key for income aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn months_of(year: i32) -> impl Iterator<Item = Period> {
        (1..=12).map(move |month| Period { year, month })
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Activity (kegiatan), parent of one or more sub-activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    pub description: Option<String>,
}

/// Sub-activity (subkegiatan). Its start date decides which month the work belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubActivity {
    pub id: SubActivityId,
    pub activity_id: ActivityId,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl SubActivity {
    pub fn period(&self) -> Option<Period> {
        self.start_date.map(Period::of)
    }
}

/// Honorarium tariff for one job-code within a sub-activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HonorRate {
    pub id: u64,
    pub sub_activity_id: SubActivityId,
    pub job_code: JobCode,
    pub tariff: Rupiah,
    pub unit_id: Option<u64>,
    pub unit_label: String,
    /// Target quantity of work units budgeted for the job-code.
    pub basis_volume: u64,
    pub budget_charge_code: Option<String>,
}

/// Monthly honor ceiling (batas honor) configured for a calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeilingRule {
    pub id: u64,
    pub year: i32,
    pub monthly_ceiling: Rupiah,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mitra {
    pub id: MitraId,
    pub name: String,
    pub nik: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub active_years: Vec<i32>,
}

impl Mitra {
    pub fn is_active_in(&self, year: i32) -> bool {
        self.active_years.contains(&year)
    }
}

/// Distinguishes realized assignments (penugasan) from tentative plans (perencanaan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Assignment,
    Plan,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            RecordKind::Assignment => "assignment",
            RecordKind::Plan => "plan",
        }
    }

    /// Resource segment used by the backend REST API.
    pub const fn resource(self) -> &'static str {
        match self {
            RecordKind::Assignment => "penugasan",
            RecordKind::Plan => "perencanaan",
        }
    }
}

/// Typed pointer to an Assignment or Plan record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub kind: RecordKind,
    pub id: u64,
}

impl RecordRef {
    pub const fn assignment(id: u64) -> Self {
        Self {
            kind: RecordKind::Assignment,
            id,
        }
    }

    pub const fn plan(id: u64) -> Self {
        Self {
            kind: RecordKind::Plan,
            id,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind.label(), self.id)
    }
}

/// Assignment or Plan header record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRecord {
    pub reference: RecordRef,
    pub sub_activity_id: SubActivityId,
    pub supervisor_id: Option<u64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ParentRecord {
    /// Period of the record: the sub-activity's start month, or the record's own
    /// start month when the sub-activity carries no start date.
    pub fn period(&self, sub_activity: Option<&SubActivity>) -> Option<Period> {
        sub_activity
            .and_then(SubActivity::period)
            .or_else(|| self.start_date.map(Period::of))
    }
}

/// Mitra membership in an Assignment or Plan (kelompok penugasan / perencanaan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentGroup {
    pub id: u64,
    pub mitra_id: MitraId,
    pub parent: RecordRef,
    pub job_code: JobCode,
    pub volume: u64,
    /// Pre-computed honor attached by denormalized API responses.
    pub total_honor: Option<Rupiah>,
}

/// Allocation still being edited and not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftAllocation {
    pub mitra_id: MitraId,
    pub job_code: JobCode,
    pub volume: u64,
}

impl From<&AssignmentGroup> for DraftAllocation {
    fn from(group: &AssignmentGroup) -> Self {
        Self {
            mitra_id: group.mitra_id,
            job_code: group.job_code.clone(),
            volume: group.volume,
        }
    }
}

/// Anything that consumes part of a job-code's volume quota.
pub trait Allocation {
    fn job_code(&self) -> &JobCode;
    fn volume(&self) -> u64;
}

impl Allocation for AssignmentGroup {
    fn job_code(&self) -> &JobCode {
        &self.job_code
    }

    fn volume(&self) -> u64 {
        self.volume
    }
}

impl Allocation for DraftAllocation {
    fn job_code(&self) -> &JobCode {
        &self.job_code
    }

    fn volume(&self) -> u64 {
        self.volume
    }
}

impl<T: Allocation + ?Sized> Allocation for &T {
    fn job_code(&self) -> &JobCode {
        (**self).job_code()
    }

    fn volume(&self) -> u64 {
        (**self).volume()
    }
}

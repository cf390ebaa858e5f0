//! Per-mitra income recap against the honor ceiling, monthly or yearly.

use std::collections::BTreeSet;
use std::io::Write;

use serde::Serialize;

use crate::budget::{
    income_breakdown, BudgetSnapshot, IncomeContribution, IncomePool, MitraId, Period, Rupiah,
};

#[derive(Debug, Clone, Serialize)]
pub struct IncomeRecap {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    pub pool: IncomePool,
    /// Monthly ceiling for a monthly recap, twelve times that for a yearly one.
    pub ceiling: Rupiah,
    pub entries: Vec<RecapEntry>,
}

impl IncomeRecap {
    pub fn over_ceiling(&self) -> impl Iterator<Item = &RecapEntry> {
        self.entries.iter().filter(|entry| entry.is_over)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecapEntry {
    pub mitra_id: MitraId,
    pub name: Option<String>,
    pub nik: Option<String>,
    /// Whether the mitra is registered as active in the recap year.
    pub active: bool,
    pub income: Rupiah,
    pub is_over: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headroom: Option<Rupiah>,
    pub activities: Vec<String>,
    pub contributions: Vec<IncomeContribution>,
}

/// Build the recap for `year`, restricted to `month` when given.
///
/// Mitra without any contribution in range are left out; entries are sorted
/// by income, highest first.
pub fn build_recap(
    snapshot: &BudgetSnapshot,
    year: i32,
    month: Option<u32>,
    pool: IncomePool,
) -> IncomeRecap {
    let single = month.and_then(|month| Period::new(year, month));
    let periods: Vec<Period> = match single {
        Some(period) => vec![period],
        None => Period::months_of(year).collect(),
    };
    let month = single.map(|period| period.month);
    let ceiling = if month.is_some() {
        snapshot.ceilings.monthly(year)
    } else {
        snapshot.ceilings.annual(year)
    };

    let sources = snapshot.income_sources(pool);
    let mitra_ids: BTreeSet<MitraId> = snapshot
        .mitra
        .iter()
        .map(|mitra| mitra.id)
        .chain(snapshot.groups.iter().map(|group| group.mitra_id))
        .collect();

    let mut entries: Vec<RecapEntry> = mitra_ids
        .into_iter()
        .filter_map(|mitra_id| {
            let contributions: Vec<IncomeContribution> = periods
                .iter()
                .flat_map(|period| income_breakdown(mitra_id, *period, &sources, None))
                .collect();
            if contributions.is_empty() {
                return None;
            }

            let income = contributions
                .iter()
                .fold(0, |total: Rupiah, item| total.saturating_add(item.amount));
            let registered = snapshot.mitra(mitra_id);

            Some(RecapEntry {
                mitra_id,
                name: registered.map(|mitra| mitra.name.clone()),
                nik: registered
                    .map(|mitra| mitra.nik.clone())
                    .filter(|nik| !nik.is_empty()),
                active: registered.is_some_and(|mitra| mitra.is_active_in(year)),
                income,
                is_over: ceiling > 0 && income > ceiling,
                headroom: (ceiling > 0).then(|| ceiling - income),
                activities: activity_names(snapshot, &contributions),
                contributions,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.income.cmp(&a.income).then(a.mitra_id.cmp(&b.mitra_id)));

    IncomeRecap {
        year,
        month,
        pool,
        ceiling,
        entries,
    }
}

fn activity_names(snapshot: &BudgetSnapshot, contributions: &[IncomeContribution]) -> Vec<String> {
    let names: BTreeSet<String> = contributions
        .iter()
        .filter_map(|item| snapshot.sub_activity(item.sub_activity_id))
        .map(|sub| match snapshot.activity(sub.activity_id) {
            Some(activity) => format!("{} / {}", activity.name, sub.name),
            None => sub.name.clone(),
        })
        .collect();
    names.into_iter().collect()
}

#[derive(Debug, Serialize)]
struct RecapCsvRow<'a> {
    mitra_id: u64,
    name: &'a str,
    nik: &'a str,
    period: String,
    income: Rupiah,
    ceiling: Rupiah,
    headroom: Option<Rupiah>,
    is_over: bool,
    active: bool,
    activities: String,
}

/// Write one CSV line per recap entry; the header goes out with the first line.
pub fn write_csv<W: Write>(recap: &IncomeRecap, writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let period = match recap.month {
        Some(month) => format!("{:04}-{:02}", recap.year, month),
        None => recap.year.to_string(),
    };

    for entry in &recap.entries {
        csv_writer.serialize(RecapCsvRow {
            mitra_id: entry.mitra_id.0,
            name: entry.name.as_deref().unwrap_or_default(),
            nik: entry.nik.as_deref().unwrap_or_default(),
            period: period.clone(),
            income: entry.income,
            ceiling: recap.ceiling,
            headroom: entry.headroom,
            is_over: entry.is_over,
            active: entry.active,
            activities: entry.activities.join("; "),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Render the recap as an in-memory CSV document.
pub fn to_csv_string(recap: &IncomeRecap) -> Result<String, csv::Error> {
    let mut buffer = Vec::new();
    write_csv(recap, &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| {
        csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })
}

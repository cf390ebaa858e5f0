use crate::infra::build_backend;
use clap::{Args, ValueEnum};
use mitra_honor::backend::{ApiSession, BudgetBackend};
use mitra_honor::budget::IncomePool;
use mitra_honor::config::AppConfig;
use mitra_honor::error::AppError;
use mitra_honor::planning::{
    write_csv, AllocationCheckRequest, AllocationReview, BudgetService, IncomeRecap, RecapQuery,
};
use mitra_honor::telemetry;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum PoolArg {
    #[default]
    Assignments,
    Plans,
    Combined,
}

impl From<PoolArg> for IncomePool {
    fn from(value: PoolArg) -> Self {
        match value {
            PoolArg::Assignments => IncomePool::Assignments,
            PoolArg::Plans => IncomePool::Plans,
            PoolArg::Combined => IncomePool::Combined,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Where the budget data comes from for a one-shot command.
#[derive(Args, Debug, Default)]
pub(crate) struct SourceArgs {
    /// Read from a saved JSON dump of the fieldwork API instead of the live API
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
    /// Override the fieldwork API base URL
    #[arg(long)]
    pub(crate) backend_url: Option<String>,
    /// Bearer token forwarded to the fieldwork API
    #[arg(long)]
    pub(crate) token: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RecapArgs {
    /// Calendar year of the recap
    #[arg(long)]
    pub(crate) year: i32,
    /// Month (1-12); omit for a yearly recap against the annual ceiling
    #[arg(long)]
    pub(crate) month: Option<u32>,
    /// Which records count as income
    #[arg(long, value_enum, default_value_t = PoolArg::Assignments)]
    pub(crate) pool: PoolArg,
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub(crate) format: OutputFormat,
    #[command(flatten)]
    pub(crate) source: SourceArgs,
}

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// JSON file holding the allocation check request
    #[arg(long)]
    pub(crate) request: PathBuf,
    #[command(flatten)]
    pub(crate) source: SourceArgs,
}

fn service_for(
    source: &mut SourceArgs,
) -> Result<(BudgetService<dyn BudgetBackend>, ApiSession), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(url) = source.backend_url.take() {
        config.backend.base_url = url.trim_end_matches('/').to_string();
    }
    telemetry::init_stderr(&config.telemetry)?;

    let backend = build_backend(&config.backend, source.snapshot.as_deref())?;
    let session = match source.token.take() {
        Some(token) => ApiSession::bearer(token),
        None => ApiSession::anonymous(),
    };
    Ok((BudgetService::new(backend), session))
}

pub(crate) async fn run_recap(mut args: RecapArgs) -> Result<(), AppError> {
    let (service, session) = service_for(&mut args.source)?;
    let recap = service
        .recap(
            &session,
            &RecapQuery {
                year: args.year,
                month: args.month,
                pool: args.pool.into(),
            },
        )
        .await?;

    let over = recap.over_ceiling().count();
    info!(
        entries = recap.entries.len(),
        over_ceiling = over,
        "income recap built"
    );

    let stdout = std::io::stdout();
    render_recap(&recap, args.format, stdout.lock())
}

pub(crate) async fn run_check(mut args: CheckArgs) -> Result<(), AppError> {
    let raw = std::fs::read(&args.request)?;
    let request: AllocationCheckRequest = serde_json::from_slice(&raw)?;
    let (service, session) = service_for(&mut args.source)?;

    let review = service.check_allocations(&session, &request).await?;
    if review.decision.blocked {
        warn!(
            violations = review.decision.violations.len(),
            "allocations would be blocked"
        );
    }

    let stdout = std::io::stdout();
    render_review(&review, stdout.lock())
}

pub(crate) fn render_recap<W: Write>(
    recap: &IncomeRecap,
    format: OutputFormat,
    mut out: W,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Csv => write_csv(recap, out)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, recap)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub(crate) fn render_review<W: Write>(
    review: &AllocationReview,
    mut out: W,
) -> Result<(), AppError> {
    serde_json::to_writer_pretty(&mut out, review)?;
    writeln!(out)?;
    if let Some(prompt) = &review.prompt {
        writeln!(out, "{prompt}")?;
    }
    Ok(())
}

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use clarity_core::analysis::{AnalysisRepositories, AnalysisRequest, InsightAnalyzer};
use clarity_core::domain::record::UserId;
use clarity_db::{
    DbPool, SqlActivityRepository, SqlAnalysisRepository, SqlApplicationUsageRepository,
    SqlBudgetRepository, SqlTransactionRepository,
};

use crate::commands::{
    build_runtime, load_config, open_database, CommandResult, EXIT_ANALYSIS, EXIT_INVALID_INPUT,
};

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    #[arg(long, help = "User whose telemetry is analyzed")]
    pub user: String,
    #[arg(long, help = "Window start (RFC 3339 or YYYY-MM-DD); defaults to the configured window")]
    pub start: Option<String>,
    #[arg(long, help = "Window end (RFC 3339 or YYYY-MM-DD); defaults to now")]
    pub end: Option<String>,
    #[arg(long, help = "Include the anonymized raw-data snapshot in the result")]
    pub raw: bool,
}

/// Accepts a full timestamp or a bare date, which means midnight UTC.
fn parse_bound(flag: &str, value: &str) -> anyhow::Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .with_context(|| format!("--{flag} `{value}` is neither RFC 3339 nor YYYY-MM-DD"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

fn build_request(args: &AnalyzeArgs) -> anyhow::Result<AnalysisRequest> {
    let user = args.user.trim();
    if user.is_empty() {
        anyhow::bail!("--user must not be empty");
    }

    let mut request = AnalysisRequest::new(UserId::from(user)).with_raw_data(args.raw);
    if let Some(start) = &args.start {
        request = request.with_start(parse_bound("start", start)?);
    }
    if let Some(end) = &args.end {
        request = request.with_end(parse_bound("end", end)?);
    }
    Ok(request)
}

fn sql_repositories(pool: &DbPool) -> AnalysisRepositories {
    AnalysisRepositories {
        activities: Arc::new(SqlActivityRepository::new(pool.clone())),
        application_usage: Arc::new(SqlApplicationUsageRepository::new(pool.clone())),
        transactions: Arc::new(SqlTransactionRepository::new(pool.clone())),
        budgets: Arc::new(SqlBudgetRepository::new(pool.clone())),
        analyses: Arc::new(SqlAnalysisRepository::new(pool.clone())),
    }
}

pub fn run(args: &AnalyzeArgs) -> CommandResult {
    let request = match build_request(args) {
        Ok(request) => request,
        Err(error) => {
            return CommandResult::failure(
                "analyze",
                "invalid_input",
                format!("{error:#}"),
                EXIT_INVALID_INPUT,
            );
        }
    };
    let config = match load_config("analyze") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("analyze") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let analyzer = InsightAnalyzer::new(config.analysis.clone(), sql_repositories(&pool));
        let outcome = analyzer.analyze(request).await.map_err(|error| {
            let exit_code =
                if error.is_invalid_input() { EXIT_INVALID_INPUT } else { EXIT_ANALYSIS };
            (error.error_class(), error.to_string(), exit_code)
        });
        pool.close().await;
        outcome
    });

    let analysis = match result {
        Ok(analysis) => analysis,
        Err(failure) => return CommandResult::from_failure("analyze", failure),
    };

    tracing::info!(
        event_name = "cli.analyze.completed",
        analysis_id = %analysis.metadata.analysis_id,
        duration_ms = analysis.metadata.duration_ms,
        "analysis stored"
    );
    let message = format!(
        "analysis {} produced {} insights and {} recommendations",
        analysis.metadata.analysis_id,
        analysis.insights.len(),
        analysis.recommendations.len()
    );
    match serde_json::to_value(&analysis) {
        Ok(value) => CommandResult::success_with_result("analyze", message, value),
        Err(error) => CommandResult::failure(
            "analyze",
            "serialization",
            format!("analysis stored but could not be rendered: {error}"),
            EXIT_ANALYSIS,
        ),
    }
}

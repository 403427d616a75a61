// src/lambda/mod.rs

//! AWS Lambda handler for the roster pipeline.
//!
//! Each invocation:
//! 1. Builds configuration from defaults, environment, and optionally a
//!    TOML object in S3 (`ROSTER_CONFIG_KEY`)
//! 2. Crawls the member listing
//! 3. Diffs against yesterday's snapshot in S3
//! 4. Writes the latest and dated snapshots back to S3

use chrono::{NaiveDate, Utc};
use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::StoreConfigLoader;
use crate::error::Result;
use crate::models::{Backend, Config, DiffSummary};
use crate::pipeline::{RosterPipeline, RunReport, Step};
use crate::services::HtmlPageFetcher;
use crate::storage::S3Storage;

/// S3 key of an optional TOML configuration object.
pub const ENV_CONFIG_KEY: &str = "ROSTER_CONFIG_KEY";

/// Lambda invocation payload.
#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    /// Day to record (defaults to today, UTC)
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// A step that failed without aborting the run.
#[derive(Debug, Serialize)]
pub struct FailedStep {
    pub step: Step,
    pub error: String,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct RunResponse {
    /// Whether every step succeeded
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_key: Option<String>,

    pub prior_found: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DiffSummary>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_steps: Vec<FailedStep>,

    /// Error message if the run aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl From<&RunReport> for RunResponse {
    fn from(report: &RunReport) -> Self {
        Self {
            success: !report.is_degraded(),
            date: Some(report.date),
            snapshot_key: Some(report.current_key.clone()),
            prior_found: report.prior_found,
            summary: Some(report.summary.clone()),
            failed_steps: report
                .step_errors
                .iter()
                .map(|failed| FailedStep {
                    step: failed.step,
                    error: failed.error.to_string(),
                })
                .collect(),
            error: None,
            execution_time_ms: 0,
        }
    }
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<RunRequest>,
) -> std::result::Result<RunResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();
    info!("Starting roster run: date={:?}", request.date);

    match run(&request).await {
        Ok(mut response) => {
            response.execution_time_ms = start.elapsed().as_millis() as u64;
            info!(
                "Run finished: success={}, {} failed steps in {}ms",
                response.success,
                response.failed_steps.len(),
                response.execution_time_ms
            );
            Ok(response)
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Ok(RunResponse {
                success: false,
                date: request.date,
                error: Some(e.to_string()),
                execution_time_ms: start.elapsed().as_millis() as u64,
                ..Default::default()
            })
        }
    }
}

/// Internal run logic.
async fn run(request: &RunRequest) -> Result<RunResponse> {
    let config = load_lambda_config().await?;
    let store = S3Storage::from_config(&config.storage).await;
    let fetcher = HtmlPageFetcher::new(&config)?;

    let today = request.date.unwrap_or_else(|| Utc::now().date_naive());
    let pipeline = RosterPipeline::new(&config, &fetcher, &store)?;
    let report = pipeline.run(today, &mut std::io::stdout()).await?;

    Ok(RunResponse::from(&report))
}

/// Load configuration suitable for the Lambda environment.
async fn load_lambda_config() -> Result<Config> {
    let mut config = Config::default();
    config.apply_env_overrides()?;

    if let Ok(key) = std::env::var(ENV_CONFIG_KEY) {
        let bootstrap = S3Storage::from_config(&config.storage).await;
        config = StoreConfigLoader::new(&bootstrap, key).load().await?;
        config.apply_env_overrides()?;
    }

    config.storage.backend = Backend::S3;
    Ok(config)
}

// src/pipeline/pipeline.rs

use std::fmt;
use std::io::Write;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Config, DiffRecord, DiffSummary, Snapshot};
use crate::services::PageFetcher;
use crate::storage::{SnapshotStore, codec, local};

use super::crawl::PaginationCrawler;
use super::diff::{calculate_diff, summarize};
use super::report;

const TOTAL_STEPS: usize = 6;

/// A pipeline step whose failure does not stop the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    LoadPrior,
    Encode,
    Stage,
    StoreLatest,
    StoreDated,
    Report,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadPrior => "load prior snapshot",
            Self::Encode => "encode snapshot",
            Self::Stage => "write staging file",
            Self::StoreLatest => "store latest snapshot",
            Self::StoreDated => "store dated snapshot",
            Self::Report => "write member summary",
        };
        f.write_str(name)
    }
}

/// A failed step of an otherwise completed run.
#[derive(Debug)]
pub struct StepError {
    pub step: Step,
    pub error: AppError,
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct RunReport {
    pub date: NaiveDate,
    pub current_key: String,
    pub prior_key: String,
    pub latest_key: String,
    /// Whether a prior snapshot was found and decoded
    pub prior_found: bool,
    pub diffs: Vec<DiffRecord>,
    pub summary: DiffSummary,
    pub step_errors: Vec<StepError>,
}

impl RunReport {
    pub fn is_degraded(&self) -> bool {
        !self.step_errors.is_empty()
    }

    /// Exit code of the first failed step, or 0.
    pub fn exit_code(&self) -> u8 {
        self.step_errors
            .first()
            .map(|failed| failed.error.exit_code())
            .unwrap_or(0)
    }
}

/// Crawl, diff against yesterday, and persist today's snapshot.
pub struct RosterPipeline<'a> {
    config: &'a Config,
    fetcher: &'a dyn PageFetcher,
    store: &'a dyn SnapshotStore,
}

impl<'a> RosterPipeline<'a> {
    pub fn new(
        config: &'a Config,
        fetcher: &'a dyn PageFetcher,
        store: &'a dyn SnapshotStore,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            fetcher,
            store,
        })
    }

    /// Run the pipeline for `today`, writing the member summary to `out`.
    ///
    /// Crawl failures and (unless configured otherwise) prior-snapshot store
    /// outages abort the run. Later steps are best effort: their failures are
    /// logged and collected in the report.
    pub async fn run(&self, today: NaiveDate, out: &mut (dyn Write + Send)) -> Result<RunReport> {
        let storage = &self.config.storage;
        let prior_date = today
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| AppError::validation(format!("no day before {today}")))?;

        let current_key = storage.dated_key(today);
        let prior_key = storage.dated_key(prior_date);
        let latest_key = storage.latest_key();
        let mut step_errors = Vec::new();

        log::info!(
            "[STEP 1/{}] Crawl - Fetching members of {}",
            TOTAL_STEPS,
            self.config.crawler.organization
        );
        let current = self.crawl().await?;

        log::info!(
            "[STEP 2/{}] Load - Reading {}",
            TOTAL_STEPS,
            self.store.location(&prior_key)
        );
        let prior = match self.load_prior(&prior_key).await {
            Ok(prior) => prior,
            Err(error @ AppError::Store(_)) if self.config.pipeline.abort_on_store_outage => {
                log::error!("Prior snapshot unavailable, aborting: {}", error);
                return Err(error);
            }
            Err(error) => {
                log::warn!("Continuing without prior snapshot: {}", error);
                step_errors.push(StepError {
                    step: Step::LoadPrior,
                    error,
                });
                None
            }
        };
        let prior_found = prior.is_some();
        let prior = prior.unwrap_or_else(|| {
            log::info!("No usable prior snapshot; every member counts as new");
            Snapshot::default()
        });

        log::info!("[STEP 3/{}] Diff - Comparing with {}", TOTAL_STEPS, prior_key);
        let diffs = calculate_diff(&prior, &current);
        let summary = summarize(&prior, &current, &diffs);
        report::log_summary(&summary);

        log::info!("[STEP 4/{}] Stage - Encoding snapshot", TOTAL_STEPS);
        match codec::encode_diff(&diffs) {
            Ok(bytes) => {
                let staging = &self.config.pipeline.staging_file;
                match local::write_atomic(staging, &bytes).await {
                    Ok(()) => log::info!("Staged snapshot at {}", staging.display()),
                    Err(error) => {
                        log::error!("Failed to stage {}: {}", staging.display(), error);
                        step_errors.push(StepError {
                            step: Step::Stage,
                            error,
                        });
                    }
                }

                log::info!("[STEP 5/{}] Store - Persisting snapshot", TOTAL_STEPS);
                for (step, key) in [
                    (Step::StoreLatest, &latest_key),
                    (Step::StoreDated, &current_key),
                ] {
                    match self.store.store(key, &bytes).await {
                        Ok(()) => log::info!("Saved {}", self.store.location(key)),
                        Err(error) => {
                            log::error!("Failed to {}: {}", step, error);
                            step_errors.push(StepError { step, error });
                        }
                    }
                }
            }
            Err(error) => {
                log::error!("Failed to encode snapshot, nothing persisted: {}", error);
                step_errors.push(StepError {
                    step: Step::Encode,
                    error,
                });
            }
        }

        log::info!("[STEP 6/{}] Report - {} members", TOTAL_STEPS, diffs.len());
        if let Err(error) = report::write_members(out, &diffs) {
            step_errors.push(StepError {
                step: Step::Report,
                error: error.into(),
            });
        }

        if step_errors.is_empty() {
            log::info!("Pipeline complete for {}", today);
        } else {
            log::warn!(
                "Pipeline finished for {} with {} failed step(s)",
                today,
                step_errors.len()
            );
        }

        Ok(RunReport {
            date: today,
            current_key,
            prior_key,
            latest_key,
            prior_found,
            diffs,
            summary,
            step_errors,
        })
    }

    /// Crawl the roster, dropping repeated names.
    async fn crawl(&self) -> Result<Snapshot> {
        let crawler = PaginationCrawler::new(self.fetcher, self.config.crawler.max_pages);
        let mut current = crawler.crawl().await.map_err(|failure| {
            log::error!(
                "Crawl aborted after {} page(s); discarding {} partial members",
                failure.pages_fetched,
                failure.partial.len()
            );
            AppError::from(failure)
        })?;

        let duplicates = current.dedup_by_name();
        if duplicates > 0 {
            log::warn!("Dropped {} repeated member name(s) from the listing", duplicates);
        }
        current.validate()?;
        Ok(current)
    }

    /// Load and decode the prior snapshot; `None` when the key is missing.
    async fn load_prior(&self, key: &str) -> Result<Option<Snapshot>> {
        let Some(bytes) = self.store.load(key).await? else {
            log::info!("No prior snapshot at {}", self.store.location(key));
            return Ok(None);
        };
        match codec::decode_members(&bytes) {
            Ok(prior) => {
                log::info!("Loaded {} prior members", prior.len());
                Ok(Some(prior))
            }
            Err(error) => {
                log::warn!("Prior snapshot {} is malformed: {}", key, error);
                Err(error)
            }
        }
    }
}

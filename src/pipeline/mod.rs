//! Pipeline entry points for roster operations.
//!
//! - `PaginationCrawler`: Fetch the full roster page by page
//! - `calculate_diff`: Join today's roster against yesterday's snapshot
//! - `RosterPipeline`: Crawl, diff, stage, persist, and report in one run

pub mod crawl;
pub mod diff;
#[allow(clippy::module_inception)]
pub mod pipeline;
pub mod report;

pub use crawl::{CrawlFailure, PaginationCrawler};
pub use diff::{calculate_diff, summarize};
pub use pipeline::{RosterPipeline, RunReport, Step, StepError};

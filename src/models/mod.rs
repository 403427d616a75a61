// src/models/mod.rs

//! Domain models for the roster pipeline.

mod config;
mod member;

// Re-export all public types
pub use config::{
    Backend, Config, CrawlerConfig, ENV_BACKEND, ENV_BUCKET, ENV_ORGANIZATION, ENV_REGION,
    LoggingConfig, MemberSelectors, PipelineConfig, StorageConfig,
};
pub use member::{DiffRecord, DiffSummary, MAX_COUNTER, Member, Snapshot};

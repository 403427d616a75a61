// src/lib.rs

//! Organization member roster crawler library
//!
//! Crawls a paginated member listing, diffs it against yesterday's
//! snapshot, and persists the result as latest and dated CSV objects.

pub mod config;
pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;

#[cfg(test)]
mod testing;

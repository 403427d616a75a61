// src/services/mod.rs

//! Services that talk to the member listing site.

pub mod likes;
pub mod members;

pub use likes::{LikeCounter, LikeTotal};
pub use members::{HtmlPageFetcher, Page, PageFetcher};

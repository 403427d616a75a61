// src/pipeline/crawl.rs

//! Paginated roster crawl.
//!
//! Pages are fetched one at a time in increasing order. The size of page 1
//! is taken as the listing's page size; the crawl ends at the first empty
//! page or the first page shorter than that size (whose members are kept).
//! A page that carries an explicit `has_more` signal overrides the size
//! check. Any fetch error ends the crawl with the members gathered so far.

use thiserror::Error;

use crate::error::AppError;
use crate::models::{Member, Snapshot};
use crate::services::{Page, PageFetcher};

/// A crawl that stopped on a fetch error.
#[derive(Debug, Error)]
#[error("{error} ({} members collected before the failure)", .partial.len())]
pub struct CrawlFailure {
    pub error: AppError,
    /// Members from the pages fetched before the failing one
    pub partial: Snapshot,
    pub pages_fetched: u32,
}

impl From<CrawlFailure> for AppError {
    fn from(failure: CrawlFailure) -> Self {
        failure.error
    }
}

/// Sequential crawler over a paginated member listing.
pub struct PaginationCrawler<'a> {
    fetcher: &'a dyn PageFetcher,
    max_pages: u32,
}

impl<'a> PaginationCrawler<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, max_pages: u32) -> Self {
        Self { fetcher, max_pages }
    }

    /// Crawl the whole listing.
    pub async fn crawl(&self) -> Result<Snapshot, CrawlFailure> {
        let mut members: Vec<Member> = Vec::new();

        let first = self.fetch(1, &mut members).await?;
        if first.is_empty() {
            log::info!("Listing is empty");
            return Ok(Snapshot::default());
        }

        let page_size = first.len();
        let mut more = first.has_more.unwrap_or(true);
        members.extend(first.members);
        log::debug!("Page 1: {} members", page_size);

        let mut page = 1;
        while more {
            if page >= self.max_pages {
                return Err(CrawlFailure {
                    error: AppError::fetch(
                        page + 1,
                        format!("listing exceeds {} pages", self.max_pages),
                    ),
                    partial: Snapshot::new(members),
                    pages_fetched: page,
                });
            }
            page += 1;

            let next = self.fetch(page, &mut members).await?;
            if next.is_empty() {
                log::debug!("Page {}: empty, end of listing", page);
                break;
            }

            more = Self::continues(&next, page_size);
            log::debug!("Page {}: {} members", page, next.len());
            members.extend(next.members);
        }

        log::info!("Crawled {} members from {} pages", members.len(), page);
        Ok(Snapshot::new(members))
    }

    /// Fetch one page, turning an error into a failure that keeps `members`.
    async fn fetch(&self, page: u32, members: &mut Vec<Member>) -> Result<Page, CrawlFailure> {
        self.fetcher.fetch_page(page).await.map_err(|e| {
            log::error!("Failed to fetch page {}: {}", page, e);
            CrawlFailure {
                error: AppError::fetch(page, e),
                partial: Snapshot::new(std::mem::take(members)),
                pages_fetched: page,
            }
        })
    }

    /// Whether the listing continues after a non-empty page.
    fn continues(page: &Page, page_size: usize) -> bool {
        match page.has_more {
            Some(has_more) => has_more,
            None => page.len() >= page_size,
        }
    }
}

// src/services/likes.rs

//! Like totals for a single user.
//!
//! Item ids come from the site's v2 JSON API; the like count of each item
//! is scraped from its HTML page.

use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::Config;

use super::members::{normalize_whitespace, parse_counter, parse_selector, site_base};

/// Page size requested from the items API (the API maximum).
pub const ITEMS_PER_PAGE: u32 = 100;

/// One entry of the items API response. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Likes of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemLikes {
    pub id: String,
    pub title: String,
    pub likes: u64,
}

/// Likes summed over all of a user's items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeTotal {
    pub user: String,
    pub items: Vec<ItemLikes>,
    pub total: u64,
}

/// Sums a user's likes, one request at a time.
pub struct LikeCounter {
    client: Client,
    base_url: Url,
    likes: Selector,
    max_pages: u32,
}

impl LikeCounter {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.crawler.user_agent)
            .timeout(Duration::from_secs(config.crawler.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: site_base(&config.crawler.base_url)?,
            likes: parse_selector(&config.selectors.likes)?,
            max_pages: config.crawler.max_pages,
        })
    }

    /// API URL of one page of a user's items.
    pub fn items_url(&self, user: &str, page: u32) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("api/v2/users/{}/items", check_user(user)?))?;
        url.query_pairs_mut()
            .append_pair("per_page", &ITEMS_PER_PAGE.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    /// HTML URL of one item.
    pub fn item_url(&self, user: &str, item_id: &str) -> Result<Url> {
        Ok(self
            .base_url
            .join(&format!("{}/items/{}", check_user(user)?, item_id))?)
    }

    /// Parse an items API response body.
    pub fn parse_items(json: &str) -> Result<Vec<ItemSummary>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Extract the like counter from an item page.
    pub fn parse_like_count(&self, html: &str) -> Result<u64> {
        let document = Html::parse_document(html);
        let text = document
            .select(&self.likes)
            .next()
            .map(|e| normalize_whitespace(&e.text().collect::<String>()))
            .ok_or_else(|| AppError::parse("item page has no like counter"))?;
        parse_counter(&text).map_err(|e| AppError::parse(format!("like counter: {e}")))
    }

    /// List every item of `user`, following API pages until a short one.
    pub async fn list_items(&self, user: &str) -> Result<Vec<ItemSummary>> {
        let mut items = Vec::new();

        for page in 1..=self.max_pages {
            let url = self.items_url(user, page)?;
            log::debug!("Fetching {}", url);

            let body = self
                .client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            let batch = Self::parse_items(&body)?;
            let short = batch.len() < ITEMS_PER_PAGE as usize;
            items.extend(batch);

            if short {
                return Ok(items);
            }
        }

        Err(AppError::fetch(
            self.max_pages + 1,
            format!("item list of '{user}' exceeds {} pages", self.max_pages),
        ))
    }

    /// Like count of one item.
    pub async fn like_count(&self, user: &str, item_id: &str) -> Result<u64> {
        let url = self.item_url(user, item_id)?;
        log::debug!("Fetching {}", url);

        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        self.parse_like_count(&html)
    }

    /// Sum the likes over every item of `user`.
    ///
    /// Stops at the first item that cannot be fetched or parsed.
    pub async fn total_likes(&self, user: &str) -> Result<LikeTotal> {
        let summaries = self.list_items(user).await?;
        log::info!("{} has {} items", user, summaries.len());

        let mut items = Vec::with_capacity(summaries.len());
        let mut total: u64 = 0;
        for summary in summaries {
            let likes = self.like_count(user, &summary.id).await.map_err(|e| {
                log::error!("Failed to count likes of item {}: {}", summary.id, e);
                e
            })?;
            total = total.saturating_add(likes);
            items.push(ItemLikes {
                id: summary.id,
                title: summary.title,
                likes,
            });
        }

        Ok(LikeTotal {
            user: user.to_string(),
            items,
            total,
        })
    }
}

/// A user id is a single path segment.
fn check_user(user: &str) -> Result<&str> {
    let user = user.trim();
    if user.is_empty() || user.contains(['/', '?', '#']) {
        return Err(AppError::validation(format!("invalid user id '{user}'")));
    }
    Ok(user)
}

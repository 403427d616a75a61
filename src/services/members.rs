// src/services/members.rs

//! Member listing fetcher.
//!
//! Fetches one page of an organization's member listing and extracts
//! `Member` records using configured CSS selectors.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Config, Member, MemberSelectors};

/// Leading integer of a counter label such as "1,234 Contributions".
static COUNTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d[\d,]*)").expect("counter pattern is valid"));

/// One fetched listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub members: Vec<Member>,
    /// Explicit continuation signal, when the source provides one
    pub has_more: Option<bool>,
}

impl Page {
    pub fn new(members: Vec<Member>) -> Self {
        Self {
            members,
            has_more: None,
        }
    }

    pub fn with_has_more(mut self, has_more: bool) -> Self {
        self.has_more = Some(has_more);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Source of listing pages.
///
/// Pages are numbered from 1. A page past the end of the listing is an
/// empty `Page`, not an error; errors are reserved for transport and
/// parse failures. For HTML listings an HTTP 404 on any page after the
/// first counts as past the end; on page 1 it means the organization
/// does not exist.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<Page>;
}

struct ParsedSelectors {
    member: Selector,
    name: Selector,
    stats: Selector,
}

impl ParsedSelectors {
    fn parse(selectors: &MemberSelectors) -> Result<Self> {
        Ok(Self {
            member: parse_selector(&selectors.member)?,
            name: parse_selector(&selectors.name)?,
            stats: parse_selector(&selectors.stats)?,
        })
    }
}

/// Fetches member listing pages over HTTP and parses them as HTML.
pub struct HtmlPageFetcher {
    client: Client,
    listing_url: Url,
    selectors: ParsedSelectors,
}

impl HtmlPageFetcher {
    /// Create a fetcher for the configured organization.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.crawler.user_agent)
            .timeout(Duration::from_secs(config.crawler.timeout_secs))
            .build()?;

        let listing_url = listing_url(&config.crawler.base_url, &config.crawler.organization)?;
        let selectors = ParsedSelectors::parse(&config.selectors)?;

        Ok(Self {
            client,
            listing_url,
            selectors,
        })
    }

    /// URL of a listing page.
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.listing_url.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url
    }

    /// Extract members from one page of listing markup.
    pub fn parse_members(&self, html: &str) -> Result<Vec<Member>> {
        let document = Html::parse_document(html);
        document
            .select(&self.selectors.member)
            .enumerate()
            .map(|(index, element)| self.parse_member(index, element))
            .collect()
    }

    fn parse_member(&self, index: usize, element: ElementRef<'_>) -> Result<Member> {
        let name = element
            .select(&self.selectors.name)
            .next()
            .map(|e| normalize_whitespace(&e.text().collect::<String>()))
            .unwrap_or_default();
        if name.is_empty() {
            return Err(AppError::parse(format!("member #{index} has no name")));
        }

        let stats: Vec<String> = element
            .select(&self.selectors.stats)
            .map(|e| e.text().collect())
            .collect();
        let (Some(first), Some(last)) = (stats.first(), stats.last()) else {
            return Err(AppError::parse(format!("member '{name}' has no counters")));
        };

        Ok(Member {
            posts: parse_counter(first)
                .map_err(|e| AppError::parse(format!("posts of '{name}': {e}")))?,
            contributions: parse_counter(last)
                .map_err(|e| AppError::parse(format!("contributions of '{name}': {e}")))?,
            name,
        })
    }
}

#[async_trait]
impl PageFetcher for HtmlPageFetcher {
    async fn fetch_page(&self, page: u32) -> Result<Page> {
        let url = self.page_url(page);
        log::debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;

        // Past the last page the site answers 404 rather than an empty list.
        if response.status() == StatusCode::NOT_FOUND && page > 1 {
            log::debug!("Page {} not found, treating as end of listing", page);
            return Ok(Page::default());
        }

        let html = response.error_for_status()?.text().await?;
        Ok(Page::new(self.parse_members(&html)?))
    }
}

/// Parse the site base URL so that relative joins keep its path.
pub(crate) fn site_base(base_url: &str) -> Result<Url> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Build the members listing URL for an organization.
fn listing_url(base_url: &str, organization: &str) -> Result<Url> {
    let base = site_base(base_url)?;
    Ok(base.join(&format!("organizations/{}/members", organization.trim()))?)
}

/// Parse the leading integer of a counter label, bounded by `i64::MAX`.
pub(crate) fn parse_counter(text: &str) -> std::result::Result<u64, String> {
    let digits = COUNTER
        .captures(text)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| format!("no number in '{}'", text.trim()))?;
    let value: i64 = digits
        .as_str()
        .replace(',', "")
        .parse()
        .map_err(|e| format!("'{}': {e}", digits.as_str()))?;
    u64::try_from(value).map_err(|e| format!("'{}': {e}", digits.as_str()))
}

pub(crate) fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MAX_COUNTER;
    use crate::pipeline::PaginationCrawler;
    use crate::testing::serve;

    const LISTING: &str = r#"
        <html><body>
          <ul>
            <li class="organizationMemberList_memberProfile">
              <a class="organizationMemberList_userName"> alice </a>
              <span class="organizationMemberList_memberStats">12 Posts</span>
              <span class="organizationMemberList_memberStats">1,234 Contributions</span>
            </li>
            <li class="organizationMemberList_memberProfile">
              <a class="organizationMemberList_userName">bob</a>
              <span class="organizationMemberList_memberStats">0 Posts</span>
              <span class="organizationMemberList_memberStats">7 Contributions</span>
            </li>
          </ul>
        </body></html>
    "#;

    fn fetcher() -> HtmlPageFetcher {
        HtmlPageFetcher::new(&Config::default()).unwrap()
    }

    fn fetcher_for(base_url: String) -> HtmlPageFetcher {
        let mut config = Config::default();
        config.crawler.base_url = base_url;
        config.crawler.organization = "acme".to_string();
        HtmlPageFetcher::new(&config).unwrap()
    }

    #[test]
    fn test_parse_members_from_listing() {
        let members = fetcher().parse_members(LISTING).unwrap();
        assert_eq!(
            members,
            vec![Member::new("alice", 1234, 12), Member::new("bob", 7, 0)]
        );
    }

    #[test]
    fn test_parse_members_empty_page() {
        let members = fetcher()
            .parse_members("<html><body><p>No members</p></body></html>")
            .unwrap();
        assert!(members.is_empty());
    }

    #[test]
    fn test_parse_members_rejects_unreadable_counter() {
        let html = r#"
            <div class="organizationMemberList_memberProfile">
              <a class="organizationMemberList_userName">carol</a>
              <span class="organizationMemberList_memberStats">many Posts</span>
            </div>
        "#;
        let err = fetcher().parse_members(html).unwrap_err();
        assert!(matches!(err, AppError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_page_parses_listing() {
        let base = serve(vec![("/organizations/acme/members?page=1", 200, LISTING)]).await;
        let page = fetcher_for(base).fetch_page(1).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.has_more, None);
    }

    #[tokio::test]
    async fn test_fetch_page_not_found_past_first_is_empty() {
        let base = serve(vec![("/organizations/acme/members?page=1", 200, LISTING)]).await;
        let page = fetcher_for(base).fetch_page(2).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_page_not_found_on_first_page_is_error() {
        let base = serve(vec![]).await;
        let err = fetcher_for(base).fetch_page(1).await.unwrap_err();
        assert!(matches!(err, AppError::Http(_)));
    }

    #[tokio::test]
    async fn test_fetch_page_server_error_is_error() {
        let base = serve(vec![("/organizations/acme/members?page=2", 503, "busy")]).await;
        let err = fetcher_for(base).fetch_page(2).await.unwrap_err();
        assert!(matches!(err, AppError::Http(_)));
    }

    #[tokio::test]
    async fn test_crawl_ends_on_not_found_page() {
        let base = serve(vec![("/organizations/acme/members?page=1", 200, LISTING)]).await;
        let fetcher = fetcher_for(base);
        let snapshot = PaginationCrawler::new(&fetcher, 10).crawl().await.unwrap();
        assert_eq!(
            snapshot.into_members(),
            vec![Member::new("alice", 1234, 12), Member::new("bob", 7, 0)]
        );
    }

    #[test]
    fn test_page_url() {
        assert_eq!(
            fetcher().page_url(3).as_str(),
            "https://qiita.com/organizations/gumi/members?page=3"
        );
    }

    #[test]
    fn test_listing_url_keeps_base_path() {
        let url = listing_url("https://mirror.example.com/qiita", "acme").unwrap();
        assert_eq!(
            url.as_str(),
            "https://mirror.example.com/qiita/organizations/acme/members"
        );
    }

    #[test]
    fn test_parse_counter() {
        assert_eq!(parse_counter(" 42 Posts"), Ok(42));
        assert_eq!(parse_counter("1,024"), Ok(1024));
        assert!(parse_counter("Posts").is_err());
        assert_eq!(parse_counter("9223372036854775807"), Ok(MAX_COUNTER));
        assert!(parse_counter("9,223,372,036,854,775,808 Contributions").is_err());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[invalid").is_err());
    }
}

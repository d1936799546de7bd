//! Scraper trait and common types for web novel scrapers.
//!
//! A scraper turns a novel code into a fully populated [`Novel`] with no
//! translations. It performs network calls only; persisting the result is
//! the pipeline's job.

mod syosetu;

pub use syosetu::SyosetuScraper;

use crate::error::ScraperError;
use crate::novel::Novel;
use async_trait::async_trait;
use std::time::Duration;

/// Information about a novel's landing page.
#[derive(Debug, Clone)]
pub struct NovelInfo {
    /// The novel's title in Japanese.
    pub title: String,

    /// Base URL for the novel (the table of contents).
    pub base_url: String,

    /// Unique identifier for the novel on the platform.
    pub novel_id: String,
}

/// Information about a single episode link in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeInfo {
    /// Episode title.
    pub title: String,

    /// URL to download the episode content.
    pub url: String,
}

/// Episodes grouped under one chapter heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterGroup {
    /// Heading text, absent for episodes listed before any heading.
    pub title: Option<String>,

    /// Episodes in reading order.
    pub episodes: Vec<EpisodeInfo>,
}

/// Represents the table of contents for a novel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOfContents {
    /// Multi-episode novel grouped into chapters.
    Chapters(Vec<ChapterGroup>),

    /// Single-episode (one-shot) story with the text on the landing page.
    OneShot(String),
}

impl TableOfContents {
    /// Returns the number of episodes, or 1 for one-shots.
    pub fn episode_count(&self) -> usize {
        match self {
            TableOfContents::Chapters(groups) => groups.iter().map(|g| g.episodes.len()).sum(),
            TableOfContents::OneShot(_) => 1,
        }
    }
}

/// Trait for web novel scrapers.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Returns the human-readable name of this scraper.
    fn name(&self) -> &'static str;

    /// Fetches metadata, table of contents and every episode of a novel.
    async fn scrape_novel(&self, novel_code: &str) -> Result<Novel, ScraperError>;
}

/// Common HTTP client configuration for scrapers.
pub fn create_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
        .cookie_store(true)
        .timeout(Duration::from_secs(30))
        .build()
}

/// Applies rate limiting delay.
pub async fn rate_limit(delay_sec: f64) {
    if delay_sec > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(delay_sec)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_count() {
        let oneshot = TableOfContents::OneShot("本文".to_string());
        assert_eq!(oneshot.episode_count(), 1);

        let toc = TableOfContents::Chapters(vec![
            ChapterGroup {
                title: None,
                episodes: vec![EpisodeInfo {
                    title: "Ep 1".to_string(),
                    url: "http://example.com/1".to_string(),
                }],
            },
            ChapterGroup {
                title: Some("Arc 2".to_string()),
                episodes: vec![
                    EpisodeInfo {
                        title: "Ep 2".to_string(),
                        url: "http://example.com/2".to_string(),
                    },
                    EpisodeInfo {
                        title: "Ep 3".to_string(),
                        url: "http://example.com/3".to_string(),
                    },
                ],
            },
        ]);
        assert_eq!(toc.episode_count(), 3);
    }
}

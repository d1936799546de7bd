//! Syosetu (ncode.syosetu.com / novel18.syosetu.com) scraper implementation.
//!
//! Builds the novel tree from the table of contents: chapter headings become
//! chapters, episodes become sub-chapters, and episode text is split into
//! chunks on line boundaries.

use super::{
    ChapterGroup, EpisodeInfo, NovelInfo, Scraper, TableOfContents, create_http_client,
    rate_limit,
};
use crate::config::ScrapingConfig;
use crate::console::Console;
use crate::error::ScraperError;
use crate::novel::{Chunk, Novel, SubChapter};
use crate::utils::split_text_into_line_chunks;
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Syosetu novel codes: `n` followed by digits and letters.
static NOVEL_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^n[0-9a-z]+$").expect("Invalid NOVEL_CODE_REGEX"));

/// Safety limit on table of contents pagination.
const MAX_INDEX_PAGES: u32 = 100;

/// CSS selectors used for parsing.
struct Selectors {
    /// Primary title selector (new layout).
    title_primary: Selector,
    /// Fallback title selector (old layout).
    title_fallback: Selector,
    /// Chapter headings and episode links of both layouts, in document order.
    toc_entry: Selector,
    /// Primary next page selector.
    next_page_primary: Selector,
    /// Any link, for the text-based next page fallback.
    link: Selector,
    /// Primary content selector (new layout).
    content_primary: Selector,
    /// Fallback content selector (old layout).
    content_fallback: Selector,
    /// Paragraph selector.
    paragraph: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            title_primary: Selector::parse(".p-novel__title").unwrap(),
            title_fallback: Selector::parse("p.novel_title").unwrap(),
            toc_entry: Selector::parse(
                ".p-eplist__chapter-title, .p-eplist__sublist > a, .chapter_title, .novel_sublist2 > dd > a",
            )
            .unwrap(),
            next_page_primary: Selector::parse(".c-pager__item--next").unwrap(),
            link: Selector::parse("a").unwrap(),
            content_primary: Selector::parse(
                ".p-novel__text.js-novel-text:not(.p-novel__text--preface):not(.p-novel__text--afterword)",
            )
            .unwrap(),
            content_fallback: Selector::parse("#novel_honbun").unwrap(),
            paragraph: Selector::parse("p").unwrap(),
        }
    }
}

/// One item of the table of contents, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TocEntry {
    Heading(String),
    Episode(EpisodeInfo),
}

/// Everything needed from one table of contents page.
///
/// Parsed eagerly so no `Html` is held across an await point.
#[derive(Debug, Default)]
struct IndexPage {
    title: Option<String>,
    entries: Vec<TocEntry>,
    next_page: Option<String>,
    oneshot_content: Option<String>,
}

/// Syosetu scraper for ncode.syosetu.com and novel18.syosetu.com.
pub struct SyosetuScraper {
    client: reqwest::Client,
    config: ScrapingConfig,
    selectors: Selectors,
    console: Console,
}

impl SyosetuScraper {
    /// Creates a new Syosetu scraper with the given configuration.
    pub fn new(config: ScrapingConfig, console: Console) -> Result<Self, ScraperError> {
        let client = create_http_client()?;

        Ok(Self {
            client,
            config,
            selectors: Selectors::new(),
            console,
        })
    }

    /// Lowercases and validates a novel code.
    pub fn normalize_novel_code(code: &str) -> Result<String, ScraperError> {
        let code = code.trim().to_ascii_lowercase();
        if NOVEL_CODE_REGEX.is_match(&code) {
            Ok(code)
        } else {
            Err(ScraperError::InvalidNovelCode(code))
        }
    }

    /// Table of contents URL for a novel code.
    fn novel_url(&self, code: &str) -> String {
        format!("{}/{}/", self.config.base_url.trim_end_matches('/'), code)
    }

    /// Fetches a page and returns its HTML text.
    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        rate_limit(self.config.delay_between_requests_sec).await;

        // Build request with over18 cookie for adult content
        let response = self
            .client
            .get(url)
            .header("Cookie", "over18=yes")
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }

    /// Extracts the novel title from the page.
    fn extract_title(&self, doc: &Html) -> Option<String> {
        [&self.selectors.title_primary, &self.selectors.title_fallback]
            .into_iter()
            .filter_map(|selector| doc.select(selector).next())
            .map(|elem| elem.text().collect::<String>().trim().to_string())
            .find(|title| !title.is_empty())
    }

    /// Collects chapter headings and episode links in document order.
    fn extract_toc_entries(&self, doc: &Html, base_url: &str) -> Vec<TocEntry> {
        doc.select(&self.selectors.toc_entry)
            .filter_map(|elem| {
                let text = elem.text().collect::<String>().trim().to_string();
                let is_heading = elem
                    .value()
                    .classes()
                    .any(|c| c == "p-eplist__chapter-title" || c == "chapter_title");

                if is_heading {
                    return Some(TocEntry::Heading(text));
                }

                let href = elem.value().attr("href")?;
                Some(TocEntry::Episode(EpisodeInfo {
                    title: text,
                    url: resolve_url(base_url, href),
                }))
            })
            .collect()
    }

    /// Finds the next page URL if pagination exists.
    fn find_next_page(&self, doc: &Html) -> Option<String> {
        // Try primary selector
        if let Some(elem) = doc.select(&self.selectors.next_page_primary).next()
            && let Some(href) = elem.value().attr("href")
        {
            return Some(href.to_string());
        }

        // Fallback: look for link with text containing "次へ" (next)
        for elem in doc.select(&self.selectors.link) {
            let text = elem.text().collect::<String>();
            if (text.contains("次へ") || text.contains("次ページ"))
                && let Some(href) = elem.value().attr("href")
            {
                return Some(href.to_string());
            }
        }

        None
    }

    /// Extracts and cleans content from the page, if it has any.
    fn extract_content(&self, doc: &Html) -> Option<String> {
        let content_elem = doc
            .select(&self.selectors.content_primary)
            .next()
            .or_else(|| doc.select(&self.selectors.content_fallback).next())?;

        // Extract text from paragraphs, or all text if no paragraphs
        let paragraphs: Vec<String> = content_elem
            .select(&self.selectors.paragraph)
            .map(extract_text_without_ruby)
            .collect();

        let text = if paragraphs.is_empty() {
            extract_text_without_ruby(content_elem)
        } else {
            paragraphs.join("\n")
        };

        Some(text.trim().to_string())
    }

    /// Parses one table of contents page.
    fn parse_index_page(&self, html: &str, base_url: &str) -> IndexPage {
        let doc = Html::parse_document(html);
        let entries = self.extract_toc_entries(&doc, base_url);
        let oneshot_content = if entries.is_empty() {
            self.extract_content(&doc)
        } else {
            None
        };

        IndexPage {
            title: self.extract_title(&doc),
            next_page: self.find_next_page(&doc),
            entries,
            oneshot_content,
        }
    }

    /// Parses an episode page into its body text.
    fn parse_episode_page(&self, html: &str) -> Result<String, ScraperError> {
        let doc = Html::parse_document(html);
        self.extract_content(&doc)
            .ok_or_else(|| ScraperError::ElementNotFound("chapter content".to_string()))
    }

    /// Fetches every table of contents page and groups the episodes.
    ///
    /// The title is read from the first page, so the landing page is only
    /// requested once.
    pub async fn get_novel_index(
        &self,
        novel_code: &str,
    ) -> Result<(NovelInfo, TableOfContents), ScraperError> {
        let novel_id = Self::normalize_novel_code(novel_code)?;
        let base_url = self.novel_url(&novel_id);

        let html = self.fetch_page(&base_url).await?;
        let first = self.parse_index_page(&html, &base_url);
        let title = first
            .title
            .ok_or_else(|| ScraperError::ElementNotFound("novel title".to_string()))?;
        let info = NovelInfo {
            title,
            base_url: base_url.clone(),
            novel_id,
        };

        // No episode list on the first page means a one-shot
        if first.entries.is_empty() {
            return match first.oneshot_content {
                Some(content) => Ok((info, TableOfContents::OneShot(content))),
                None => Err(ScraperError::NotFound(format!(
                    "no episodes listed at {}",
                    base_url
                ))),
            };
        }

        let mut entries = first.entries;
        let mut next_page = first.next_page;
        for _ in 1..MAX_INDEX_PAGES {
            let Some(next_url) = next_page else {
                break;
            };
            let html = self.fetch_page(&resolve_url(&base_url, &next_url)).await?;
            let page = self.parse_index_page(&html, &base_url);
            entries.extend(page.entries);
            next_page = page.next_page;
        }

        Ok((info, TableOfContents::Chapters(group_entries(entries))))
    }

    /// Downloads the content of a single episode.
    pub async fn download_chapter(&self, chapter_url: &str) -> Result<String, ScraperError> {
        let html = self.fetch_page(chapter_url).await?;
        self.parse_episode_page(&html)
    }

    /// Splits episode text into chunks.
    fn into_chunks(&self, content: &str) -> Vec<Chunk> {
        split_text_into_line_chunks(content, self.config.chunk_size_chars)
            .into_iter()
            .map(Chunk::new)
            .collect()
    }
}

/// Groups flat table of contents entries under their headings.
///
/// Episodes listed before the first heading form an untitled chapter, and a
/// heading with no episodes after it is dropped.
fn group_entries(entries: Vec<TocEntry>) -> Vec<ChapterGroup> {
    let mut groups: Vec<ChapterGroup> = Vec::new();
    let mut current = ChapterGroup {
        title: None,
        episodes: Vec::new(),
    };

    for entry in entries {
        match entry {
            TocEntry::Heading(title) => {
                let finished = std::mem::replace(
                    &mut current,
                    ChapterGroup {
                        title: Some(title),
                        episodes: Vec::new(),
                    },
                );
                if !finished.episodes.is_empty() {
                    groups.push(finished);
                }
            }
            TocEntry::Episode(episode) => current.episodes.push(episode),
        }
    }

    if !current.episodes.is_empty() {
        groups.push(current);
    }

    groups
}

/// Extracts text from an element, excluding ruby annotation (<rt>) content.
fn extract_text_without_ruby(elem: ElementRef) -> String {
    let mut text = String::new();

    for node in elem.descendants() {
        if let scraper::node::Node::Text(t) = node.value() {
            // Check if this text is inside an <rt> element
            let is_in_rt = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|elem| elem.name() == "rt")
            });

            if !is_in_rt {
                text.push_str(t);
            }
        }
    }

    text
}

/// Resolves a relative URL against a base URL.
fn resolve_url(base: &str, relative: &str) -> String {
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }

    if relative.starts_with('/')
        && let Ok(base_url) = url::Url::parse(base)
        && let Ok(resolved) = base_url.join(relative)
    {
        return resolved.to_string();
    }

    // Simple join for relative paths
    let base = base.trim_end_matches('/');
    format!("{}/{}", base, relative.trim_start_matches('/'))
}

#[async_trait]
impl Scraper for SyosetuScraper {
    fn name(&self) -> &'static str {
        "Syosetu"
    }

    async fn scrape_novel(&self, novel_code: &str) -> Result<Novel, ScraperError> {
        let (info, toc) = self.get_novel_index(novel_code).await?;
        let total = toc.episode_count();
        self.console.detail(&format!(
            "Found: {} ({} episodes) at {}",
            info.title, total, info.base_url
        ));

        let mut novel = Novel::new(info.novel_id, info.title);

        match toc {
            TableOfContents::OneShot(content) => {
                self.console.detail("One-shot story, using landing page text");
                let chunks = self.into_chunks(&content);
                let name = novel.title.clone();
                novel.push_chapter(None, vec![SubChapter::new(name, chunks)]);
            }
            TableOfContents::Chapters(groups) => {
                let mut downloaded = 0;

                for group in groups {
                    let mut sub_chapters = Vec::with_capacity(group.episodes.len());
                    for episode in group.episodes {
                        downloaded += 1;
                        self.console.detail(&format!(
                            "Downloading episode {}/{}: {}",
                            downloaded, total, episode.title
                        ));
                        let content = self.download_chapter(&episode.url).await?;
                        sub_chapters.push(SubChapter::new(episode.title, self.into_chunks(&content)));
                    }
                    novel.push_chapter(group.title, sub_chapters);
                }
            }
        }

        Ok(novel)
    }
}

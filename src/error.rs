//! Error types for the translation pipeline.
//!
//! Uses `thiserror` for structured error definitions, one enum per
//! component, plus [`PipelineError`] which names the reason a run stopped.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scraping operations.
#[derive(Error, Debug)]
pub enum ScraperError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The required element isn't found in HTML
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The novel code doesn't look like a Syosetu ncode
    #[error("Invalid novel code: {0}")]
    InvalidNovelCode(String),

    /// Novel has no readable episodes
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Missing required configuration value
    #[error("Missing required config value: {0}")]
    MissingValue(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Error type for translation operations.
#[derive(Error, Debug)]
pub enum TranslationError {
    /// HTTP request to API failed
    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error: {0}")]
    ApiError(String),

    /// Translation was refused by the model
    #[error("Translation refused: {0}")]
    Refused(String),
}

/// Error type for the novel snapshot store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Snapshot file doesn't exist
    #[error("Snapshot not found at {0} (run without --skip-scraping first)")]
    NotFound(PathBuf),

    /// Reading or writing the snapshot failed
    #[error("Snapshot I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot JSON is malformed or has the wrong shape
    #[error("Failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    /// Snapshot parsed but its contents are inconsistent
    #[error("Invalid snapshot structure: {0}")]
    Schema(String),
}

/// Error type for chapter selection parsing and resolution.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    /// The selection expression couldn't be parsed
    #[error("Invalid chapter selection '{input}': {message}")]
    Syntax { input: String, message: String },

    /// Requested chapter is outside the novel
    #[error("Chapter {chapter} not found in novel (it has {count} chapters)")]
    ChapterNotFound { chapter: u32, count: usize },

    /// Requested sub-chapter is outside its chapter
    #[error("SubChapter {sub_chapter} not found in chapter {chapter} (it has {count} sub-chapters)")]
    SubChapterNotFound {
        chapter: u32,
        sub_chapter: u32,
        count: usize,
    },
}

/// Error type for the compile stage.
#[derive(Error, Debug)]
pub enum CompileError {
    /// Selection didn't match the novel
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// A chunk hasn't been translated yet
    #[error(
        "Chunk {chunk} of chapter {chapter}, subchapter {sub_chapter} has no translation (run without --skip-translating)"
    )]
    MissingTranslation {
        chapter: u32,
        sub_chapter: u32,
        chunk: usize,
    },
}

/// Error type for writing markdown and EPUB output.
#[derive(Error, Debug)]
pub enum OutputError {
    /// File write failed
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// EPUB generation failed
    #[error("EPUB generation failed: {0}")]
    Epub(#[from] epub_builder::Error),
}

/// Reason a pipeline run stopped early.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Stage flags ask for something that can't be produced
    #[error("{0}")]
    ContradictoryStages(String),

    /// Configuration is missing or invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Snapshot could not be read or written
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Selection didn't parse or doesn't fit the novel
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Scraping failed
    #[error("Scraping failed: {0}")]
    Scrape(#[from] ScraperError),

    /// Translating the novel title failed
    #[error("Translation of the novel title failed: {0}")]
    TitleTranslation(#[source] TranslationError),

    /// Translating a sub-chapter failed
    #[error("Translation of chapter {chapter}, subchapter {sub_chapter} failed: {source}")]
    Translation {
        chapter: u32,
        sub_chapter: u32,
        #[source]
        source: TranslationError,
    },

    /// Compiling the selection failed
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Writing markdown or EPUB failed
    #[error(transparent)]
    Output(#[from] OutputError),
}

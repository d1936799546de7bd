//! wn-translator - Japanese web novel scraper, translator and EPUB compiler.
//!
//! This library provides functionality for:
//! - Scraping novels from Syosetu into a chunked JSON snapshot
//! - Translating chunks through OpenAI-compatible chat APIs with rolling context
//! - Compiling selected chapters into markdown and EPUB

pub mod compiler;
pub mod config;
pub mod console;
pub mod error;
pub mod novel;
pub mod output;
pub mod pipeline;
pub mod scrapers;
pub mod selection;
pub mod store;
pub mod text;
pub mod translator;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use console::Console;
pub use error::{
    CompileError, ConfigError, OutputError, PipelineError, ScraperError, SelectionError,
    StoreError, TranslationError,
};
pub use novel::{Chapter, Chunk, Novel, SubChapter};
pub use pipeline::{Pipeline, RunOutcome, RunSummary, StageFlags};
pub use scrapers::{Scraper, TableOfContents};
pub use selection::Selection;
pub use translator::{ChatBackend, OpenAiChat, ProgressInfo, Translator};

//! Stage orchestration: scrape, translate, compile.
//!
//! Stages run in that fixed order and each one is optional. A stage that
//! completes rewrites the snapshot before the next one starts; the first
//! failure ends the run and leaves earlier files in place.

use crate::compiler::{compile, join_markdown};
use crate::console::Console;
use crate::error::{ConfigError, PipelineError};
use crate::novel::Novel;
use crate::output::{write_epub, write_markdown};
use crate::scrapers::Scraper;
use crate::selection::{ResolvedTarget, Selection};
use crate::store::{self, NovelPaths};
use crate::translator::Translator;
use std::path::PathBuf;

/// Which stages the user asked to skip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageFlags {
    pub skip_scraping: bool,
    pub skip_translating: bool,
    pub skip_epub: bool,
}

impl StageFlags {
    /// Returns true if every stage is skipped.
    pub fn is_noop(&self) -> bool {
        self.skip_scraping && self.skip_translating && self.skip_epub
    }

    /// Rejects flag combinations that can't produce what they ask for.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.skip_scraping && self.skip_translating && !self.skip_epub {
            return Err(PipelineError::ContradictoryStages(
                "Can't create epub without translating the novel after a fresh scraping."
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true if the translate stage will run.
    pub fn translates(&self) -> bool {
        !self.is_noop() && !self.skip_translating
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Whether a fresh scrape replaced the snapshot.
    pub scraped: bool,
    /// Chunks sent to the model.
    pub chunks_translated: usize,
    /// Sub-chapters compiled into the output.
    pub sections_compiled: usize,
    /// Files written, in write order.
    pub files_written: Vec<PathBuf>,
}

/// How a run ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every stage was skipped; nothing was read or written.
    NothingToDo,
    /// All requested stages finished.
    Completed(RunSummary),
}

/// Runs the stages for one novel.
pub struct Pipeline<'a> {
    paths: NovelPaths,
    novel_code: String,
    selection: Option<Selection>,
    scraper: &'a dyn Scraper,
    translator: Option<&'a Translator>,
    console: &'a Console,
    force: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        paths: NovelPaths,
        novel_code: impl Into<String>,
        scraper: &'a dyn Scraper,
        console: &'a Console,
    ) -> Self {
        Self {
            paths,
            novel_code: novel_code.into(),
            selection: None,
            scraper,
            translator: None,
            console,
            force: false,
        }
    }

    /// Restricts translation and compilation to a selection (default: all chapters).
    pub fn with_selection(mut self, selection: Option<Selection>) -> Self {
        self.selection = selection;
        self
    }

    /// Supplies the translator used by the translate stage.
    pub fn with_translator(mut self, translator: &'a Translator) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Retranslate chunks that already carry a translation.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Runs the requested stages in order.
    pub async fn run(&self, flags: StageFlags) -> Result<RunOutcome, PipelineError> {
        if flags.is_noop() {
            return Ok(RunOutcome::NothingToDo);
        }
        flags.validate()?;

        let mut summary = RunSummary::default();
        let json_path = self.paths.json();

        let mut novel = if flags.skip_scraping {
            self.console
                .step(&format!("Loading snapshot {}", json_path.display()));
            store::load(&json_path)?
        } else {
            self.console.step(&format!(
                "Scraping {} from {}...",
                self.novel_code,
                self.scraper.name()
            ));
            let mut novel = self.scraper.scrape_novel(&self.novel_code).await?;
            store::save(&mut novel, &json_path)?;
            summary.scraped = true;
            summary.files_written.push(json_path.clone());
            self.console.success(&format!(
                "Scraped {}: {} chapters, {} chunks",
                novel.title,
                novel.chapters.len(),
                novel.chunk_count()
            ));
            novel
        };

        if flags.skip_translating && flags.skip_epub {
            return Ok(RunOutcome::Completed(summary));
        }

        let targets = match &self.selection {
            Some(selection) => selection.resolve(&novel)?,
            None => Selection::all(&novel).resolve(&novel)?,
        };

        if !flags.skip_translating {
            summary.chunks_translated = self.translate(&mut novel, &targets).await?;
            store::save(&mut novel, &json_path)?;
            summary.files_written.push(json_path.clone());
            self.console.success(&format!(
                "Translated {} chunks ({} of {} in novel)",
                summary.chunks_translated,
                novel.translated_chunk_count(),
                novel.chunk_count()
            ));
        }

        if !flags.skip_epub {
            self.console.step(&format!(
                "Compiling translation into {}...",
                self.paths.root().display()
            ));
            let sections = compile(&mut novel, &targets, self.console)?;
            summary.sections_compiled = sections.len();

            store::save(&mut novel, &json_path)?;
            summary.files_written.push(json_path);

            let epub_path = self.paths.epub();
            write_epub(&epub_path, novel.display_title(), &sections)?;
            summary.files_written.push(epub_path.clone());

            let markdown_path = self.paths.markdown();
            write_markdown(&markdown_path, &join_markdown(&sections))?;
            summary.files_written.push(markdown_path);

            self.console.success(&format!(
                "Compiled {} subchapters into {}",
                sections.len(),
                epub_path.display()
            ));
        }

        Ok(RunOutcome::Completed(summary))
    }

    /// Translates the title and every targeted sub-chapter.
    async fn translate(
        &self,
        novel: &mut Novel,
        targets: &[ResolvedTarget],
    ) -> Result<usize, PipelineError> {
        let translator = self.translator.ok_or_else(|| {
            ConfigError::MissingValue("openai.api_key (needed to translate)".to_string())
        })?;

        self.console.step("Translating...");
        translator
            .translate_novel_title(novel, self.force)
            .await
            .map_err(PipelineError::TitleTranslation)?;

        let mut translated = 0;
        for target in targets {
            for &sub_chapter_number in &target.sub_chapters {
                let sub_chapter = novel.sub_chapter_mut(target.chapter, sub_chapter_number)?;
                self.console.detail(&format!(
                    "Translating chapter {}, subchapter {}.",
                    target.chapter, sub_chapter_number
                ));

                translated += translator
                    .translate_sub_chapter(sub_chapter, target.chapter, sub_chapter_number, self.force)
                    .await
                    .map_err(|source| PipelineError::Translation {
                        chapter: target.chapter,
                        sub_chapter: sub_chapter_number,
                        source,
                    })?;
            }
        }

        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ScraperError, SelectionError, StoreError};
    use crate::novel::tests::sample_novel;
    use crate::translator::tests::{ScriptedBackend, make_translator};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Scraper that hands out a fixed novel and counts calls.
    struct FakeScraper {
        novel: Novel,
        calls: AtomicUsize,
    }

    impl FakeScraper {
        fn new() -> Self {
            Self {
                novel: sample_novel(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Scraper for FakeScraper {
        fn name(&self) -> &'static str {
            "Fake"
        }

        async fn scrape_novel(&self, _novel_code: &str) -> Result<Novel, ScraperError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.novel.clone())
        }
    }

    /// Replies for translating all of `sample_novel` in order.
    fn full_replies() -> ScriptedBackend {
        ScriptedBackend::with_replies(&[
            "Reborn as a Library",
            "Prologue",
            "I woke up. It smelled of books.",
            "Where am I?",
            "Encounter",
            "\"Hello,\" she said.",
            "Departure",
            "Morning came.",
        ])
    }

    fn flags(skip_scraping: bool, skip_translating: bool, skip_epub: bool) -> StageFlags {
        StageFlags {
            skip_scraping,
            skip_translating,
            skip_epub,
        }
    }

    fn dir_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[test]
    fn test_flag_validation() {
        assert!(flags(false, false, false).validate().is_ok());
        assert!(flags(true, true, false).validate().is_ok());
        assert!(flags(false, false, true).validate().is_ok());
        assert!(matches!(
            flags(false, true, false).validate(),
            Err(PipelineError::ContradictoryStages(_))
        ));
        assert!(flags(true, true, true).is_noop());
        assert!(!flags(true, true, true).translates());
        assert!(flags(true, false, true).translates());
    }

    #[tokio::test]
    async fn test_contradiction_rejected_before_any_work() {
        let dir = TempDir::new().unwrap();
        let scraper = FakeScraper::new();
        let console = Console::with_colors(false);
        let pipeline = Pipeline::new(NovelPaths::new(dir.path(), "n1234ab"), "n1234ab", &scraper, &console);

        let result = pipeline.run(flags(false, true, false)).await;

        assert!(matches!(result, Err(PipelineError::ContradictoryStages(_))));
        assert_eq!(scraper.calls(), 0);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_all_skipped_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let scraper = FakeScraper::new();
        let backend = full_replies();
        let translator = make_translator(backend.clone());
        let console = Console::with_colors(false);
        let pipeline = Pipeline::new(NovelPaths::new(dir.path(), "n1234ab"), "n1234ab", &scraper, &console)
            .with_translator(&translator);

        let outcome = pipeline.run(flags(true, true, true)).await.unwrap();

        assert_eq!(outcome, RunOutcome::NothingToDo);
        assert_eq!(scraper.calls(), 0);
        assert_eq!(backend.request_count(), 0);
        assert!(dir_is_empty(&dir));
    }

    #[tokio::test]
    async fn test_full_run_writes_every_file() {
        let dir = TempDir::new().unwrap();
        let paths = NovelPaths::new(dir.path(), "n1234ab");
        let scraper = FakeScraper::new();
        let translator = make_translator(full_replies());
        let console = Console::with_colors(false);
        let pipeline = Pipeline::new(paths.clone(), "n1234ab", &scraper, &console)
            .with_translator(&translator);

        let outcome = pipeline.run(StageFlags::default()).await.unwrap();

        let RunOutcome::Completed(summary) = outcome else {
            panic!("expected a completed run");
        };
        assert!(summary.scraped);
        assert_eq!(summary.chunks_translated, 4);
        assert_eq!(summary.sections_compiled, 3);
        assert_eq!(
            summary.files_written,
            vec![paths.json(), paths.json(), paths.json(), paths.epub(), paths.markdown()]
        );

        let markdown = std::fs::read_to_string(paths.markdown()).unwrap();
        assert!(markdown.starts_with("# Prologue\n\n"));
        assert!(markdown.contains("Where am I?"));
        assert!(markdown.contains("# Departure\n\nMorning came.\n"));
        assert!(paths.epub().exists());

        let saved = store::load(&paths.json()).unwrap();
        assert_eq!(saved.translated_title.as_deref(), Some("Reborn as a Library"));
        assert_eq!(saved.translated_chunk_count(), 4);
        assert!(saved.chapters[1].sub_chapters[0].translation.is_some());
    }

    #[tokio::test]
    async fn test_skip_scraping_without_snapshot() {
        let dir = TempDir::new().unwrap();
        let scraper = FakeScraper::new();
        let console = Console::with_colors(false);
        let pipeline = Pipeline::new(NovelPaths::new(dir.path(), "n1234ab"), "n1234ab", &scraper, &console);

        let result = pipeline.run(flags(true, true, false)).await;

        assert!(matches!(
            result,
            Err(PipelineError::Store(StoreError::NotFound(_)))
        ));
        assert_eq!(scraper.calls(), 0);
    }

    #[tokio::test]
    async fn test_scrape_only_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let paths = NovelPaths::new(dir.path(), "n1234ab");
        let scraper = FakeScraper::new();
        let console = Console::with_colors(false);
        // An out-of-range selection doesn't matter when nothing uses it
        let pipeline = Pipeline::new(paths.clone(), "n1234ab", &scraper, &console)
            .with_selection(Some("9".parse().unwrap()));

        let outcome = pipeline.run(flags(false, true, true)).await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed(RunSummary {
                scraped: true,
                chunks_translated: 0,
                sections_compiled: 0,
                files_written: vec![paths.json()],
            })
        );
        assert_eq!(store::load(&paths.json()).unwrap(), sample_novel());
        assert!(!paths.markdown().exists());
    }

    #[tokio::test]
    async fn test_out_of_range_selection_aborts_before_translation() {
        let dir = TempDir::new().unwrap();
        let paths = NovelPaths::new(dir.path(), "n1234ab");
        let scraper = FakeScraper::new();
        let backend = full_replies();
        let translator = make_translator(backend.clone());
        let console = Console::with_colors(false);

        for expr in ["0", "3", "1,2:2"] {
            let pipeline = Pipeline::new(paths.clone(), "n1234ab", &scraper, &console)
                .with_selection(Some(expr.parse().unwrap()))
                .with_translator(&translator);

            let result = pipeline.run(StageFlags::default()).await;
            assert!(
                matches!(
                    result,
                    Err(PipelineError::Selection(
                        SelectionError::ChapterNotFound { .. }
                            | SelectionError::SubChapterNotFound { .. }
                    ))
                ),
                "selection {:?} should be rejected",
                expr
            );
        }

        assert_eq!(backend.request_count(), 0);
        assert!(!paths.markdown().exists());
    }

    #[tokio::test]
    async fn test_translation_failure_keeps_last_stage_snapshot() {
        let dir = TempDir::new().unwrap();
        let paths = NovelPaths::new(dir.path(), "n1234ab");
        let scraper = FakeScraper::new();
        let backend = ScriptedBackend::with_replies(&["Title", "Prologue", "I woke up."]);
        backend.push_failure("HTTP 429: rate limited");
        let translator = make_translator(backend);
        let console = Console::with_colors(false);
        let pipeline = Pipeline::new(paths.clone(), "n1234ab", &scraper, &console)
            .with_translator(&translator);

        let result = pipeline.run(StageFlags::default()).await;

        assert!(matches!(
            result,
            Err(PipelineError::Translation {
                chapter: 1,
                sub_chapter: 1,
                ..
            })
        ));
        // Snapshot is still the scrape-stage write
        let saved = store::load(&paths.json()).unwrap();
        assert_eq!(saved.translated_chunk_count(), 0);
        assert!(saved.translated_title.is_none());
        assert!(!paths.epub().exists());
    }

    #[tokio::test]
    async fn test_missing_translator_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let scraper = FakeScraper::new();
        let console = Console::with_colors(false);
        let pipeline = Pipeline::new(NovelPaths::new(dir.path(), "n1234ab"), "n1234ab", &scraper, &console);

        let result = pipeline.run(flags(false, false, true)).await;
        assert!(matches!(
            result,
            Err(PipelineError::Config(ConfigError::MissingValue(_)))
        ));
    }

    #[tokio::test]
    async fn test_recompile_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let paths = NovelPaths::new(dir.path(), "n1234ab");
        let scraper = FakeScraper::new();
        let translator = make_translator(full_replies());
        let console = Console::with_colors(false);

        // Scrape and translate only
        Pipeline::new(paths.clone(), "n1234ab", &scraper, &console)
            .with_translator(&translator)
            .run(flags(false, false, true))
            .await
            .unwrap();

        let compile_only = Pipeline::new(paths.clone(), "n1234ab", &scraper, &console)
            .with_selection(Some("2,1:1".parse().unwrap()));

        compile_only.run(flags(true, true, false)).await.unwrap();
        let first = std::fs::read(paths.markdown()).unwrap();
        compile_only.run(flags(true, true, false)).await.unwrap();
        let second = std::fs::read(paths.markdown()).unwrap();

        assert_eq!(first, second);
        assert_eq!(scraper.calls(), 1);
        let markdown = String::from_utf8(first).unwrap();
        assert!(markdown.starts_with("# Departure"));
    }

    #[tokio::test]
    async fn test_compile_without_translation_fails() {
        let dir = TempDir::new().unwrap();
        let paths = NovelPaths::new(dir.path(), "n1234ab");
        let scraper = FakeScraper::new();
        let console = Console::with_colors(false);

        // Scrape only, then try to compile the untranslated snapshot
        Pipeline::new(paths.clone(), "n1234ab", &scraper, &console)
            .run(flags(false, true, true))
            .await
            .unwrap();
        let result = Pipeline::new(paths.clone(), "n1234ab", &scraper, &console)
            .run(flags(true, true, false))
            .await;

        assert!(matches!(result, Err(PipelineError::Compile(_))));
        assert!(!paths.epub().exists());
    }
}

//! wn-translator CLI - scrape, translate and compile Syosetu web novels.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use wn_translator::config::{Config, DEFAULT_CONFIG_PATH};
use wn_translator::console::Console;
use wn_translator::pipeline::{Pipeline, RunOutcome, StageFlags};
use wn_translator::scrapers::SyosetuScraper;
use wn_translator::selection::Selection;
use wn_translator::store::NovelPaths;
use wn_translator::translator::{OpenAiChat, Translator};

/// Scrape a Syosetu novel, translate it with an LLM and compile an EPUB.
#[derive(Parser, Debug)]
#[command(name = "wn-translator")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory novels are stored under.
    directory: PathBuf,

    /// Syosetu novel code (e.g. n1234ab).
    novel_code: String,

    /// Show per-chunk progress.
    #[arg(short, long)]
    verbose: bool,

    /// Reuse the saved snapshot instead of scraping (-ss).
    #[arg(long)]
    skip_scraping: bool,

    /// Don't translate (-st).
    #[arg(long)]
    skip_translating: bool,

    /// Don't compile markdown and EPUB (-se).
    #[arg(long)]
    skip_epub: bool,

    /// Chapters to translate and compile, e.g. "1,3:2,4-6".
    #[arg(short, long, value_name = "EXPR")]
    chapters: Option<Selection>,

    /// Path to the YAML config file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Retranslate chunks that already have a translation.
    #[arg(short, long)]
    force: bool,
}

impl Args {
    fn stage_flags(&self) -> StageFlags {
        StageFlags {
            skip_scraping: self.skip_scraping,
            skip_translating: self.skip_translating,
            skip_epub: self.skip_epub,
        }
    }
}

/// Rewrites the two-letter short flags to their long forms.
fn expand_short_flags<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| match arg.as_str() {
            "-ss" => "--skip-scraping".to_string(),
            "-st" => "--skip-translating".to_string(),
            "-se" => "--skip-epub".to_string(),
            _ => arg,
        })
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse_from(expand_short_flags(std::env::args()));
    let console = Console::new(args.verbose);

    match run(&args, &console).await {
        Ok(RunOutcome::NothingToDo) => {
            console.info("All stages skipped, nothing to do.");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Completed(summary)) => {
            console.success(&format!(
                "Done: {} chunks translated, {} subchapters compiled, {} files written",
                summary.chunks_translated,
                summary.sections_compiled,
                summary.files_written.len()
            ));
            ExitCode::SUCCESS
        }
        Err(e) => {
            console.error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, console: &Console) -> Result<RunOutcome> {
    let flags = args.stage_flags();

    // Flags are checked before touching config, network or disk
    if flags.is_noop() {
        return Ok(RunOutcome::NothingToDo);
    }
    flags.validate()?;

    // One spelling of the code for both the site and the output directory
    let novel_code = SyosetuScraper::normalize_novel_code(&args.novel_code)?;

    console.section("wn-translator");

    console.step("Loading configuration...");
    let config_existed = args.config.exists();
    let config = Config::load_from(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if !config_existed {
        console.warning(&format!(
            "Created default config at {}. Set your API key there before translating.",
            args.config.display()
        ));
    }
    config
        .validate(flags.translates())
        .context("Invalid configuration")?;
    console.success("Configuration loaded");

    let scraper = SyosetuScraper::new(config.scraping.clone(), console.clone())
        .context("Failed to create HTTP client")?;

    let translator = flags.translates().then(|| {
        let backend = OpenAiChat::new(config.openai.clone(), console.clone());
        Translator::new(
            Box::new(backend),
            config.translation.clone(),
            &config.prompts,
            console.clone(),
        )
    });

    let paths = NovelPaths::new(&args.directory, &novel_code);
    let mut pipeline = Pipeline::new(paths, novel_code, &scraper, console)
        .with_selection(args.chapters.clone())
        .with_force(args.force);
    if let Some(translator) = &translator {
        pipeline = pipeline.with_translator(translator);
    }

    Ok(pipeline.run(flags).await?)
}

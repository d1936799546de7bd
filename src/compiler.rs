//! Assembles translated chunks into per-sub-chapter text and markdown.

use crate::console::Console;
use crate::error::CompileError;
use crate::novel::Novel;
use crate::selection::ResolvedTarget;
use crate::text::{fix_linebreaks, section_to_md, text_blocks};

/// One compiled sub-chapter, ready for markdown and EPUB output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSection {
    /// 1-based chapter number.
    pub chapter: u32,
    /// 1-based sub-chapter number.
    pub sub_chapter: u32,
    /// Section heading.
    pub heading: String,
    /// Body paragraphs, each a list of lines.
    pub paragraphs: Vec<Vec<String>>,
    /// The same content as markdown.
    pub markdown: String,
}

/// Compiles every targeted sub-chapter, in target order.
///
/// Each sub-chapter's compiled plain text is stored back on it as its
/// `translation`. Fails if any chunk of a targeted sub-chapter has no
/// translation, before anything is stored for that sub-chapter.
pub fn compile(
    novel: &mut Novel,
    targets: &[ResolvedTarget],
    console: &Console,
) -> Result<Vec<CompiledSection>, CompileError> {
    let mut sections = Vec::new();

    for target in targets {
        for &sub_chapter_number in &target.sub_chapters {
            let sub_chapter = novel.sub_chapter_mut(target.chapter, sub_chapter_number)?;
            console.detail(&format!(
                "Compiling chunks of chapter {}, subchapter {}.",
                target.chapter, sub_chapter_number
            ));

            let heading = sub_chapter.display_name().trim().to_string();
            let mut body = String::new();
            for (i, chunk) in sub_chapter.chunks.iter().enumerate() {
                let translation =
                    chunk
                        .translation
                        .as_deref()
                        .ok_or(CompileError::MissingTranslation {
                            chapter: target.chapter,
                            sub_chapter: sub_chapter_number,
                            chunk: i + 1,
                        })?;
                let fixed = fix_linebreaks(translation, &chunk.context);
                if !fixed.is_empty() {
                    body.push_str(&fixed);
                    body.push_str("\n\n");
                }
            }

            let paragraphs = text_blocks(&body);
            let markdown = section_to_md(&heading, &paragraphs);
            sub_chapter.translation = Some(format!("{}\n\n{}", heading, body));

            sections.push(CompiledSection {
                chapter: target.chapter,
                sub_chapter: sub_chapter_number,
                heading,
                paragraphs,
                markdown,
            });
        }
    }

    Ok(sections)
}

/// Joins section markdown into the `novel.md` document.
pub fn join_markdown(sections: &[CompiledSection]) -> String {
    sections
        .iter()
        .map(|s| s.markdown.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
        + "\n"
}

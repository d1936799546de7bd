//! Novel data model: chapters, sub-chapters and translatable chunks.
//!
//! The whole tree is serialized as the snapshot between pipeline stages,
//! so every type here derives `Serialize`/`Deserialize` and rejects
//! unknown fields.

use crate::error::{SelectionError, StoreError};
use crate::text::make_printable;
use serde::{Deserialize, Serialize};

/// A scraped novel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Novel {
    /// Site-specific identifier (Syosetu ncode).
    pub code: String,

    /// Title in the original language.
    pub title: String,

    /// English title, filled in by the translate stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,

    /// Chapters in reading order.
    pub chapters: Vec<Chapter>,
}

/// A chapter groups consecutive sub-chapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Chapter {
    /// 1-based position in the novel.
    pub index: u32,

    /// Chapter heading, if the novel has one for this group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Sub-chapters in reading order.
    pub sub_chapters: Vec<SubChapter>,
}

/// A named section of a chapter (one episode on the source site).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubChapter {
    /// Title in the original language.
    pub name: String,

    /// English title, filled in by the translate stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_name: Option<String>,

    /// Text split into translatable pieces.
    pub chunks: Vec<Chunk>,

    /// Compiled English text, filled in by the compile stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// The smallest translatable unit of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Chunk {
    /// Original-language text.
    pub context: String,

    /// Translated text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl Chunk {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            translation: None,
        }
    }
}

impl SubChapter {
    pub fn new(name: impl Into<String>, chunks: Vec<Chunk>) -> Self {
        Self {
            name: name.into(),
            translated_name: None,
            chunks,
            translation: None,
        }
    }

    /// Title to show in compiled output; a blank translation falls back to
    /// the original name.
    pub fn display_name(&self) -> &str {
        self.translated_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.name)
    }

    /// Returns true if every chunk carries a translation.
    pub fn is_translated(&self) -> bool {
        self.chunks.iter().all(|chunk| chunk.translation.is_some())
    }
}

impl Chapter {
    /// Returns the sub-chapter at a 1-based index.
    pub fn sub_chapter(&self, index: u32) -> Result<&SubChapter, SelectionError> {
        let count = self.sub_chapters.len();
        index
            .checked_sub(1)
            .and_then(|i| self.sub_chapters.get(i as usize))
            .ok_or(SelectionError::SubChapterNotFound {
                chapter: self.index,
                sub_chapter: index,
                count,
            })
    }

    /// Returns the sub-chapter at a 1-based index, mutably.
    pub fn sub_chapter_mut(&mut self, index: u32) -> Result<&mut SubChapter, SelectionError> {
        let count = self.sub_chapters.len();
        let chapter = self.index;
        index
            .checked_sub(1)
            .and_then(|i| self.sub_chapters.get_mut(i as usize))
            .ok_or(SelectionError::SubChapterNotFound {
                chapter,
                sub_chapter: index,
                count,
            })
    }
}

impl Novel {
    pub fn new(code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            translated_title: None,
            chapters: Vec::new(),
        }
    }

    /// Appends a chapter, numbering it after the existing ones.
    pub fn push_chapter(&mut self, title: Option<String>, sub_chapters: Vec<SubChapter>) {
        let index = self.chapters.len() as u32 + 1;
        self.chapters.push(Chapter {
            index,
            title,
            sub_chapters,
        });
    }

    /// Title to show in compiled output; a blank translation falls back to
    /// the original name.
    pub fn display_title(&self) -> &str {
        self.translated_title.as_deref().unwrap_or(&self.title)
    }

    /// Returns the chapter at a 1-based index.
    pub fn chapter(&self, index: u32) -> Result<&Chapter, SelectionError> {
        let count = self.chapters.len();
        index
            .checked_sub(1)
            .and_then(|i| self.chapters.get(i as usize))
            .ok_or(SelectionError::ChapterNotFound {
                chapter: index,
                count,
            })
    }

    /// Returns the chapter at a 1-based index, mutably.
    pub fn chapter_mut(&mut self, index: u32) -> Result<&mut Chapter, SelectionError> {
        let count = self.chapters.len();
        index
            .checked_sub(1)
            .and_then(|i| self.chapters.get_mut(i as usize))
            .ok_or(SelectionError::ChapterNotFound {
                chapter: index,
                count,
            })
    }

    /// Returns a sub-chapter by 1-based chapter and sub-chapter index, mutably.
    pub fn sub_chapter_mut(
        &mut self,
        chapter: u32,
        sub_chapter: u32,
    ) -> Result<&mut SubChapter, SelectionError> {
        self.chapter_mut(chapter)?.sub_chapter_mut(sub_chapter)
    }

    /// Total number of chunks in the novel.
    pub fn chunk_count(&self) -> usize {
        self.sub_chapters().map(|s| s.chunks.len()).sum()
    }

    /// Number of chunks that carry a translation.
    pub fn translated_chunk_count(&self) -> usize {
        self.sub_chapters()
            .flat_map(|s| s.chunks.iter())
            .filter(|c| c.translation.is_some())
            .count()
    }

    fn sub_chapters(&self) -> impl Iterator<Item = &SubChapter> {
        self.chapters.iter().flat_map(|c| c.sub_chapters.iter())
    }

    /// Checks structural consistency of a loaded snapshot.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.code.trim().is_empty() {
            return Err(StoreError::Schema("novel code is empty".to_string()));
        }

        for (i, chapter) in self.chapters.iter().enumerate() {
            let expected = i as u32 + 1;
            if chapter.index != expected {
                return Err(StoreError::Schema(format!(
                    "chapter at position {} has index {}",
                    expected, chapter.index
                )));
            }
        }

        Ok(())
    }

    /// Applies printable normalization to every text field.
    pub fn make_printable(&mut self) {
        normalize(&mut self.code);
        normalize(&mut self.title);
        normalize_opt(&mut self.translated_title);

        for chapter in &mut self.chapters {
            normalize_opt(&mut chapter.title);
            for sub_chapter in &mut chapter.sub_chapters {
                normalize(&mut sub_chapter.name);
                normalize_opt(&mut sub_chapter.translated_name);
                normalize_opt(&mut sub_chapter.translation);
                for chunk in &mut sub_chapter.chunks {
                    normalize(&mut chunk.context);
                    normalize_opt(&mut chunk.translation);
                }
            }
        }
    }
}

fn normalize(text: &mut String) {
    *text = make_printable(text);
}

fn normalize_opt(text: &mut Option<String>) {
    if let Some(text) = text {
        normalize(text);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two chapters: the first with two sub-chapters, the second with one.
    pub(crate) fn sample_novel() -> Novel {
        let mut novel = Novel::new("n1234ab", "転生したら図書館だった件");
        novel.push_chapter(
            Some("第一章".to_string()),
            vec![
                SubChapter::new(
                    "プロローグ",
                    vec![Chunk::new("目が覚めた。\n本の匂いがする。"), Chunk::new("ここはどこだ？")],
                ),
                SubChapter::new("出会い", vec![Chunk::new("「こんにちは」と彼女は言った。")]),
            ],
        );
        novel.push_chapter(
            Some("第二章".to_string()),
            vec![SubChapter::new("旅立ち", vec![Chunk::new("朝が来た。")])],
        );
        novel
    }

    #[test]
    fn test_push_chapter_numbers_from_one() {
        let novel = sample_novel();
        assert_eq!(novel.chapters[0].index, 1);
        assert_eq!(novel.chapters[1].index, 2);
        assert!(novel.validate().is_ok());
    }

    #[test]
    fn test_chapter_lookup_bounds() {
        let novel = sample_novel();
        assert!(novel.chapter(1).is_ok());
        assert!(novel.chapter(2).is_ok());
        assert_eq!(
            novel.chapter(0).unwrap_err(),
            SelectionError::ChapterNotFound {
                chapter: 0,
                count: 2
            }
        );
        assert_eq!(
            novel.chapter(3).unwrap_err(),
            SelectionError::ChapterNotFound {
                chapter: 3,
                count: 2
            }
        );
    }

    #[test]
    fn test_sub_chapter_lookup_bounds() {
        let mut novel = sample_novel();
        assert_eq!(novel.sub_chapter_mut(1, 2).unwrap().name, "出会い");
        assert_eq!(
            novel.sub_chapter_mut(2, 0).unwrap_err(),
            SelectionError::SubChapterNotFound {
                chapter: 2,
                sub_chapter: 0,
                count: 1
            }
        );
        assert_eq!(
            novel.sub_chapter_mut(2, 2).unwrap_err(),
            SelectionError::SubChapterNotFound {
                chapter: 2,
                sub_chapter: 2,
                count: 1
            }
        );
    }

    #[test]
    fn test_translation_counts() {
        let mut novel = sample_novel();
        assert_eq!(novel.chunk_count(), 4);
        assert_eq!(novel.translated_chunk_count(), 0);

        let sub = novel.sub_chapter_mut(1, 2).unwrap();
        assert!(!sub.is_translated());
        sub.chunks[0].translation = Some("\"Hello,\" she said.".to_string());
        assert!(sub.is_translated());
        assert_eq!(novel.translated_chunk_count(), 1);
    }

    #[test]
    fn test_display_names_prefer_translation() {
        let mut novel = sample_novel();
        assert_eq!(novel.display_title(), "転生したら図書館だった件");
        novel.translated_title = Some("Reborn as a Library".to_string());
        assert_eq!(novel.display_title(), "Reborn as a Library");

        let sub = novel.sub_chapter_mut(1, 1).unwrap();
        assert_eq!(sub.display_name(), "プロローグ");
        sub.translated_name = Some("Prologue".to_string());
        assert_eq!(sub.display_name(), "Prologue");
        sub.translated_name = Some(" ".to_string());
        assert_eq!(sub.display_name(), "プロローグ");
    }

    #[test]
    fn test_validate_rejects_misnumbered_chapters() {
        let mut novel = sample_novel();
        novel.chapters[1].index = 5;
        assert!(matches!(novel.validate(), Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_make_printable_walks_tree() {
        let mut novel = sample_novel();
        novel.chapters[0].sub_chapters[0].chunks[0].context = "a\u{0000}b\r\nc".to_string();
        novel.chapters[1].sub_chapters[0].translated_name = Some("Dep\u{200B}arture".to_string());
        novel.make_printable();
        assert_eq!(novel.chapters[0].sub_chapters[0].chunks[0].context, "ab\nc");
        assert_eq!(
            novel.chapters[1].sub_chapters[0].translated_name.as_deref(),
            Some("Departure")
        );
    }
}

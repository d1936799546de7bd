//! Chapter selection expressions.
//!
//! Grammar: comma-separated items, each one of
//! - `N`      whole chapter N
//! - `N-M`    whole chapters N through M
//! - `N:S`    sub-chapter S of chapter N
//! - `N:S-T`  sub-chapters S through T of chapter N
//!
//! An empty sub-chapter list means "all sub-chapters of that chapter".

use crate::error::SelectionError;
use crate::novel::Novel;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Widest range a single item may span.
pub const MAX_RANGE_SPAN: u32 = 10_000;

/// Sub-chapters requested for one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSelection {
    /// 1-based chapter number.
    pub chapter: u32,

    /// 1-based sub-chapter numbers; empty means all.
    pub sub_chapters: Vec<u32>,
}

/// Ordered mapping from chapter number to requested sub-chapters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    entries: Vec<ChapterSelection>,
}

/// Merges parsed items into a [`Selection`], keeping first-seen order.
#[derive(Default)]
struct SelectionBuilder {
    entries: Vec<ChapterSelection>,
    positions: HashMap<u32, usize>,
}

/// A selection checked against a novel, with "all" expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub chapter: u32,
    pub sub_chapters: Vec<u32>,
}

impl Selection {
    /// Selects every chapter of `novel`.
    pub fn all(novel: &Novel) -> Self {
        Self {
            entries: novel
                .chapters
                .iter()
                .map(|c| ChapterSelection {
                    chapter: c.index,
                    sub_chapters: Vec::new(),
                })
                .collect(),
        }
    }

    /// Checks every index against `novel` and expands empty lists.
    ///
    /// Fails on the first chapter or sub-chapter outside the novel, before
    /// any stage touches it.
    pub fn resolve(&self, novel: &Novel) -> Result<Vec<ResolvedTarget>, SelectionError> {
        self.entries
            .iter()
            .map(|entry| -> Result<ResolvedTarget, SelectionError> {
                let chapter = novel.chapter(entry.chapter)?;
                let sub_chapters = if entry.sub_chapters.is_empty() {
                    (1..=chapter.sub_chapters.len() as u32).collect()
                } else {
                    for &sub_chapter in &entry.sub_chapters {
                        chapter.sub_chapter(sub_chapter)?;
                    }
                    entry.sub_chapters.clone()
                };

                Ok(ResolvedTarget {
                    chapter: entry.chapter,
                    sub_chapters,
                })
            })
            .collect()
    }
}

impl SelectionBuilder {
    fn position(&mut self, chapter: u32) -> usize {
        *self.positions.entry(chapter).or_insert_with(|| {
            self.entries.push(ChapterSelection {
                chapter,
                sub_chapters: Vec::new(),
            });
            self.entries.len() - 1
        })
    }

    fn add_whole_chapter(&mut self, chapter: u32) {
        let index = self.position(chapter);
        self.entries[index].sub_chapters.clear();
    }

    fn add_sub_chapters(&mut self, chapter: u32, sub_chapters: impl Iterator<Item = u32>) {
        let is_new = !self.positions.contains_key(&chapter);
        let index = self.position(chapter);
        let entry = &mut self.entries[index];

        // Whole chapter already requested
        if !is_new && entry.sub_chapters.is_empty() {
            return;
        }

        let mut seen: HashSet<u32> = entry.sub_chapters.iter().copied().collect();
        entry
            .sub_chapters
            .extend(sub_chapters.filter(|sub_chapter| seen.insert(*sub_chapter)));
    }

    fn build(self) -> Selection {
        Selection {
            entries: self.entries,
        }
    }
}

impl FromStr for Selection {
    type Err = SelectionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let syntax = |message: String| SelectionError::Syntax {
            input: input.to_string(),
            message,
        };

        let mut selection = SelectionBuilder::default();

        for item in input.split(',') {
            let item = item.trim();
            if item.is_empty() {
                return Err(syntax("empty item".to_string()));
            }

            match item.split_once(':') {
                Some((chapter, subs)) => {
                    let chapter = parse_number(chapter).map_err(&syntax)?;
                    let (start, end) = parse_range(subs).map_err(&syntax)?;
                    selection.add_sub_chapters(chapter, start..=end);
                }
                None => {
                    let (start, end) = parse_range(item).map_err(&syntax)?;
                    for chapter in start..=end {
                        selection.add_whole_chapter(chapter);
                    }
                }
            }
        }

        Ok(selection.build())
    }
}

fn parse_number(text: &str) -> Result<u32, String> {
    let text = text.trim();
    text.parse::<u32>()
        .map_err(|_| format!("'{}' is not a chapter number", text))
}

fn parse_range(text: &str) -> Result<(u32, u32), String> {
    match text.split_once('-') {
        Some((start, end)) => {
            let start = parse_number(start)?;
            let end = parse_number(end)?;
            if start > end {
                return Err(format!("range {}-{} is reversed", start, end));
            }
            if end - start >= MAX_RANGE_SPAN {
                return Err(format!(
                    "range {}-{} spans more than {} numbers",
                    start, end, MAX_RANGE_SPAN
                ));
            }
            Ok((start, end))
        }
        None => {
            let n = parse_number(text)?;
            Ok((n, n))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::novel::tests::sample_novel;

    fn parse(input: &str) -> Selection {
        input.parse().unwrap()
    }

    fn entry(chapter: u32, sub_chapters: &[u32]) -> ChapterSelection {
        ChapterSelection {
            chapter,
            sub_chapters: sub_chapters.to_vec(),
        }
    }

    #[test]
    fn test_whole_and_single_sub_chapter() {
        let selection = parse("1,3:2");
        assert_eq!(selection.entries, vec![entry(1, &[]), entry(3, &[2])]);
    }

    #[test]
    fn test_ranges() {
        let selection = parse("2-4, 6:1-3");
        assert_eq!(
            selection.entries,
            vec![entry(2, &[]), entry(3, &[]), entry(4, &[]), entry(6, &[1, 2, 3])]
        );
    }

    #[test]
    fn test_repeated_chapter_merges_in_order() {
        let selection = parse("5:3,1,5:1,5:3");
        assert_eq!(selection.entries, vec![entry(5, &[3, 1]), entry(1, &[])]);
    }

    #[test]
    fn test_whole_chapter_wins() {
        assert_eq!(parse("2:1,2").entries, vec![entry(2, &[])]);
        assert_eq!(parse("2,2:1").entries, vec![entry(2, &[])]);
    }

    #[test]
    fn test_zero_parses_but_does_not_resolve() {
        let selection = parse("0");
        assert_eq!(selection.entries, vec![entry(0, &[])]);
        assert_eq!(
            selection.resolve(&sample_novel()).unwrap_err(),
            SelectionError::ChapterNotFound {
                chapter: 0,
                count: 2
            }
        );
    }

    #[test]
    fn test_syntax_errors() {
        for input in ["", "a", "1,,2", "3-1", "1:", ":2", "1:2:3", "1-", "-1"] {
            let result = input.parse::<Selection>();
            assert!(
                matches!(result, Err(SelectionError::Syntax { .. })),
                "should reject {:?}",
                input
            );
        }
    }

    #[test]
    fn test_wide_ranges_are_rejected() {
        for input in ["1-4294967295", "1:1-4294967295", "1-10001"] {
            assert!(
                matches!(
                    input.parse::<Selection>(),
                    Err(SelectionError::Syntax { .. })
                ),
                "should reject {:?}",
                input
            );
        }

        let selection = parse("1-10000,1:5");
        assert_eq!(selection.entries.len(), 10_000);
        assert_eq!(selection.entries[9_999], entry(10_000, &[]));
        assert_eq!(selection.entries[0], entry(1, &[]));

        let selection = parse("7:1-10000,7:1-10000");
        assert_eq!(selection.entries.len(), 1);
        assert_eq!(selection.entries[0].sub_chapters.len(), 10_000);
    }

    #[test]
    fn test_resolve_expands_all() {
        let novel = sample_novel();
        let targets = parse("2,1").resolve(&novel).unwrap();
        assert_eq!(
            targets,
            vec![
                ResolvedTarget {
                    chapter: 2,
                    sub_chapters: vec![1]
                },
                ResolvedTarget {
                    chapter: 1,
                    sub_chapters: vec![1, 2]
                },
            ]
        );
    }

    #[test]
    fn test_resolve_rejects_out_of_range() {
        let novel = sample_novel();
        assert_eq!(
            parse("3").resolve(&novel).unwrap_err(),
            SelectionError::ChapterNotFound {
                chapter: 3,
                count: 2
            }
        );
        assert_eq!(
            parse("1:3").resolve(&novel).unwrap_err(),
            SelectionError::SubChapterNotFound {
                chapter: 1,
                sub_chapter: 3,
                count: 2
            }
        );
        assert_eq!(
            parse("1:0").resolve(&novel).unwrap_err(),
            SelectionError::SubChapterNotFound {
                chapter: 1,
                sub_chapter: 0,
                count: 2
            }
        );
    }

    #[test]
    fn test_all_selects_every_chapter() {
        let novel = sample_novel();
        let selection = Selection::all(&novel);
        assert_eq!(selection.entries, vec![entry(1, &[]), entry(2, &[])]);
    }
}

//! Text normalization and formatting helpers.
//!
//! Covers the printable normalization applied before a snapshot is written,
//! line-break reconciliation between a translation and its source text, and
//! the plain text to markdown conversion used by the compiler.

use regex::Regex;
use std::sync::LazyLock;

/// Sentence terminator, optional closing quotes/brackets, then whitespace.
static SENTENCE_END_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?…]+["'”’)\]」』]*\s+"#).expect("Invalid SENTENCE_END_REGEX")
});

/// Ordered-list marker at the start of a line (`1.` or `1)`).
static ORDERED_LIST_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([.)])").expect("Invalid ORDERED_LIST_REGEX"));

/// Invisible characters that leak out of scraped HTML.
const ZERO_WIDTH_CHARS: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Removes control characters and invisible code points from text.
///
/// Newlines and tabs survive; `\r\n` and lone `\r` become `\n`.
pub fn make_printable(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    normalized
        .chars()
        .filter(|c| !ZERO_WIDTH_CHARS.contains(c))
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Returns the trimmed, non-empty lines of `text`.
fn non_empty_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Splits a paragraph into sentences at terminal punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END_REGEX.find_iter(text) {
        let sentence = text[start..m.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Re-inserts paragraph breaks the model dropped, using the source text as a guide.
///
/// If the translation already has at least as many lines as the original,
/// its own lines are kept. Otherwise its sentences are redistributed into as
/// many paragraphs as the original has, breaking where the share of
/// translated characters reaches the share of original characters up to
/// the next original paragraph boundary. Paragraphs are separated by a
/// blank line.
pub fn fix_linebreaks(translated: &str, original: &str) -> String {
    let original_paragraphs = non_empty_lines(original);
    let translated_paragraphs = non_empty_lines(translated);

    if original_paragraphs.len() < 2 || translated_paragraphs.len() >= original_paragraphs.len() {
        return translated_paragraphs.join("\n\n");
    }

    let sentences: Vec<&str> = translated_paragraphs
        .iter()
        .flat_map(|paragraph| split_sentences(paragraph))
        .collect();

    if sentences.len() <= translated_paragraphs.len() {
        return translated_paragraphs.join("\n\n");
    }

    let original_total: usize = original_paragraphs
        .iter()
        .map(|p| p.chars().count())
        .sum();
    let translated_total: usize = sentences.iter().map(|s| s.chars().count()).sum();

    // Cumulative original length at each internal paragraph boundary
    let boundaries: Vec<usize> = original_paragraphs[..original_paragraphs.len() - 1]
        .iter()
        .scan(0usize, |acc, p| {
            *acc += p.chars().count();
            Some(*acc)
        })
        .collect();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut next_boundary = 0;
    let mut consumed = 0usize;

    for (i, sentence) in sentences.iter().enumerate() {
        current.push(sentence);
        consumed += sentence.chars().count();

        let is_last = i + 1 == sentences.len();
        let reached = |boundary: usize| consumed * original_total >= boundary * translated_total;

        if !is_last && next_boundary < boundaries.len() && reached(boundaries[next_boundary]) {
            paragraphs.push(current.join(" "));
            current.clear();
            while next_boundary < boundaries.len() && reached(boundaries[next_boundary]) {
                next_boundary += 1;
            }
        }
    }

    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs.join("\n\n")
}

/// Splits text into blocks separated by blank lines; each block keeps its lines.
pub fn text_blocks(text: &str) -> Vec<Vec<String>> {
    let mut blocks = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.to_string());
        }
    }

    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

/// Escapes characters that markdown would otherwise interpret.
pub fn escape_markdown(line: &str) -> String {
    let mut escaped = String::with_capacity(line.len());
    for c in line.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']' | '<') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    if let Some(first) = escaped.chars().next()
        && matches!(first, '#' | '>' | '-' | '+' | '=' | '|')
    {
        return format!("\\{}", escaped);
    }

    ORDERED_LIST_REGEX
        .replace(&escaped, "$1\\$2")
        .into_owned()
}

/// Renders a titled section as markdown.
///
/// The heading becomes a level-one heading, each block a paragraph, and line
/// breaks inside a block become markdown hard breaks.
pub fn section_to_md(heading: &str, blocks: &[Vec<String>]) -> String {
    let mut markdown = format!("# {}\n", escape_markdown(heading));
    if !blocks.is_empty() {
        let paragraphs: Vec<String> = blocks
            .iter()
            .map(|block| {
                block
                    .iter()
                    .map(|line| escape_markdown(line))
                    .collect::<Vec<_>>()
                    .join("  \n")
            })
            .collect();
        markdown.push('\n');
        markdown.push_str(&paragraphs.join("\n\n"));
        markdown.push('\n');
    }
    markdown
}

/// Escapes text for inclusion in XHTML.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

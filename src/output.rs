//! Markdown and EPUB output for compiled sections.

use crate::compiler::CompiledSection;
use crate::error::OutputError;
use crate::text::escape_xml;
use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use std::fs::File;
use std::path::Path;

const SECTION_TEMPLATE: &str = include_str!("../templates/section.xhtml");
const STYLESHEET: &str = include_str!("../templates/style.css");

/// Output language of the translated book.
pub const BOOK_LANGUAGE: &str = "en";

fn ensure_parent(path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| OutputError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Writes the joined markdown document.
pub fn write_markdown(path: &Path, markdown: &str) -> Result<(), OutputError> {
    ensure_parent(path)?;
    std::fs::write(path, markdown).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Renders one section as an XHTML document.
pub fn render_section_xhtml(section: &CompiledSection, lang: &str) -> String {
    let body = section
        .paragraphs
        .iter()
        .map(|lines| {
            let escaped: Vec<String> = lines.iter().map(|line| escape_xml(line)).collect();
            format!("    <p>{}</p>", escaped.join("<br/>"))
        })
        .collect::<Vec<_>>()
        .join("\n");

    SECTION_TEMPLATE
        .replace("%lang%", lang)
        .replace("%title%", &escape_xml(&section.heading))
        .replace("%body%", &body)
}

/// Packages compiled sections into an EPUB 3 file.
pub fn write_epub(
    path: &Path,
    title: &str,
    sections: &[CompiledSection],
) -> Result<(), OutputError> {
    let mut epub = EpubBuilder::new(ZipLibrary::new()?)?;
    epub.epub_version(EpubVersion::V30);
    epub.metadata("title", title)?;
    epub.metadata("generator", env!("CARGO_PKG_NAME"))?;
    epub.set_lang(BOOK_LANGUAGE);
    epub.stylesheet(STYLESHEET.as_bytes())?;
    epub.inline_toc();

    for (i, section) in sections.iter().enumerate() {
        let xhtml = render_section_xhtml(section, BOOK_LANGUAGE);
        epub.add_content(
            EpubContent::new(format!("section_{:04}.xhtml", i + 1), xhtml.as_bytes())
                .title(&section.heading)
                .reftype(ReferenceType::Text),
        )?;
    }

    ensure_parent(path)?;
    let file = File::create(path).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    epub.generate(file)?;
    Ok(())
}

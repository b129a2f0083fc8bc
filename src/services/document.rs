use crate::models::BookDraft;
use crate::utils::sanitize_file_stem;
use anyhow::{Result, anyhow};
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};
use html_escape::encode_text;

pub const CONTENT_TYPE: &str = "application/epub+zip";
const EXTENSION: &str = "epub";
/// Accent for "Subtitle" lines, rgb(34, 139, 34).
const SUBTITLE_COLOR: &str = "#228B22";

#[derive(Debug)]
pub struct RenderedDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub fn document_file_name(title: &str) -> String {
    format!("{}.{EXTENSION}", sanitize_file_stem(title))
}

/// Lays out cover, title page and chapters as an EPUB.
///
/// `cover` holds the image bytes when a cover was produced; without it the cover
/// page is left out entirely.
pub fn build_document(draft: &BookDraft, cover: Option<&[u8]>) -> Result<RenderedDocument> {
    let mut builder = EpubBuilder::new(ZipLibrary::new().map_err(epub_error)?).map_err(epub_error)?;
    builder
        .metadata("title", draft.title.as_str())
        .map_err(epub_error)?
        .metadata("author", draft.author.as_str())
        .map_err(epub_error)?
        .metadata("description", "Generated book")
        .map_err(epub_error)?
        .metadata("lang", "en")
        .map_err(epub_error)?;

    if let Some(image) = cover {
        let (file, mime) = cover_file(image);
        builder
            .add_cover_image(file, image, mime)
            .map_err(epub_error)?
            .add_content(
                EpubContent::new("cover.xhtml", cover_page(&draft.title, file).as_bytes())
                    .title("Cover")
                    .reftype(ReferenceType::Cover),
            )
            .map_err(epub_error)?;
    }

    builder
        .add_content(
            EpubContent::new("title.xhtml", title_page(draft).as_bytes())
                .title(draft.title.as_str())
                .reftype(ReferenceType::TitlePage),
        )
        .map_err(epub_error)?;
    builder.inline_toc();

    for (idx, chapter) in draft.chapters.iter().enumerate() {
        let page = chapter_page(&chapter.title, &chapter.content);
        builder
            .add_content(
                EpubContent::new(format!("chapter_{}.xhtml", idx + 1), page.as_bytes())
                    .title(chapter.title.as_str())
                    .reftype(ReferenceType::Text),
            )
            .map_err(epub_error)?;
    }

    let mut bytes = Vec::new();
    builder.generate(&mut bytes).map_err(epub_error)?;

    Ok(RenderedDocument {
        file_name: document_file_name(&draft.title),
        bytes,
    })
}

fn epub_error(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("failed to build EPUB: {e}")
}

fn cover_file(image: &[u8]) -> (&'static str, &'static str) {
    if image.starts_with(&[0xFF, 0xD8, 0xFF]) {
        ("cover.jpg", "image/jpeg")
    } else {
        ("cover.png", "image/png")
    }
}

fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head>
<title>{}</title>
</head>
<body>
{body}
</body>
</html>
"#,
        encode_text(title)
    )
}

fn cover_page(title: &str, image_file: &str) -> String {
    let body = format!(
        r#"<div style="text-align: center;"><img src="{image_file}" alt="{}" style="max-width: 100%;" /></div>"#,
        html_escape::encode_double_quoted_attribute(title)
    );
    xhtml(title, &body)
}

fn title_page(draft: &BookDraft) -> String {
    let body = format!(
        "<h1 style=\"text-align: center;\">{}</h1>\n<p><strong>Author: {}</strong></p>",
        encode_text(&draft.title),
        encode_text(&draft.author)
    );
    xhtml(&draft.title, &body)
}

fn chapter_page(title: &str, content: &str) -> String {
    let mut body = format!("<h1>{}</h1>", encode_text(title));
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        body.push('\n');
        if line.starts_with("Subtitle") {
            body.push_str(&format!(
                "<p><strong style=\"color: {SUBTITLE_COLOR};\">{}</strong></p>",
                encode_text(line)
            ));
        } else {
            body.push_str(&format!("<p>{}</p>", encode_text(line)));
        }
    }
    xhtml(title, &body)
}

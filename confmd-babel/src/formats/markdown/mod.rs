//! Markdown format implementation
//!
//! This module implements bidirectional conversion between the document AST and GitHub-flavored
//! Markdown, plus the comment micro-format (see `crate::common::codec`) for everything Markdown
//! has no syntax for.
//!
//! # Library Choice
//!
//! We use the `comrak` crate for Markdown parsing and serialization:
//! - Single crate for both directions, so what we write is exactly what we read
//! - CommonMark compliant, with the GFM table, strikethrough and task list extensions
//! - Serializes from an AST, which keeps escaping out of our hands
//!
//! Fenced containers (`:::type`) are not CommonMark; [`containers`] rewrites them into panel and
//! expand comments before comrak runs.
//!
//! # Element Mapping Table
//!
//! | Document node      | Markdown                                  | Notes                                 |
//! |--------------------|-------------------------------------------|---------------------------------------|
//! | Heading            | `#` … `######`                            | ATX only on export                    |
//! | Paragraph          | Paragraph                                 | Soft breaks read as spaces            |
//! | CodeBlock          | Fenced code block                         | Info string ↔ language                |
//! | ThematicBreak      | `-----`                                   |                                       |
//! | Image              | `![alt](src "title")` or `image` comment  | Comment when attachment/align/width   |
//! | Table              | GFM table or raw `<table>` block          | Raw block when GFM cannot express it  |
//! | List / ListItem    | `-` / `1.` lists, `[ ]` / `[x]` items     | Nested lists stay as raw Markdown     |
//! | BlockQuote         | `>`                                       |                                       |
//! | InfoPanel          | `:::type title` container                 | Comment form on request               |
//! | ExpandMacro        | `:::expand title` container               |                                       |
//! | TocMacro           | `toc` comment                             |                                       |
//! | TaskList           | `tasklist` comment                        | Bodies as plain text                  |
//! | UnsupportedBlock   | HTML block, `html-block` comment or text  |                                       |
//! | Inline:            |                                           |                                       |
//! |   Strong/Emphasis  | `**` / `*`                                |                                       |
//! |   Strikethrough    | `~~`                                      |                                       |
//! |   LineBreak        | `<br />`                                  |                                       |
//! |   Colored/Highlight| `<span style="…">`                        | Exactly one declaration               |
//! |   Underline/Sub/Sup| `<u>`, `<sub>`, `<sup>`                   |                                       |
//! |   Emoticon, Mention, DateTime, Status | inline comments        |                                       |
//!
//! # Lossy Conversions
//!
//! - Rich inlines nested inside wrappers are kept as Markdown text, not typed nodes
//! - Setext headings, `*` bullets and indented code come back in the canonical style
//! - Multiple blank lines → single blank line

pub mod containers;
pub mod inline;
pub mod parser;
pub mod serializer;

pub use parser::parse_markdown;
pub use serializer::{
    serialize_markdown, serialize_markdown_with_options, MarkdownOptions, PanelSyntax,
};

use crate::ast::Document;
use crate::error::FormatError;
use crate::format::Format;
use comrak::ComrakOptions;
use std::collections::HashMap;

/// The comrak configuration shared by both directions.
pub(crate) fn comrak_options() -> ComrakOptions<'static> {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.tasklist = true;
    options.render.unsafe_ = true;
    options
}

/// Format implementation for Markdown
#[derive(Debug, Default)]
pub struct MarkdownFormat {
    options: MarkdownOptions,
}

impl MarkdownFormat {
    pub fn new(options: MarkdownOptions) -> Self {
        MarkdownFormat { options }
    }
}

impl Format for MarkdownFormat {
    fn name(&self) -> &str {
        "markdown"
    }

    fn description(&self) -> &str {
        "GitHub-flavored Markdown with Confluence comment extensions"
    }

    fn file_extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn supports_parsing(&self) -> bool {
        true
    }

    fn supports_serialization(&self) -> bool {
        true
    }

    fn parse(&self, source: &str) -> Result<Document, FormatError> {
        Ok(parse_markdown(source)?)
    }

    fn serialize(&self, doc: &Document) -> Result<String, FormatError> {
        Ok(serialize_markdown_with_options(doc, &self.options)?)
    }

    fn serialize_with_options(
        &self,
        doc: &Document,
        options: &HashMap<String, String>,
    ) -> Result<String, FormatError> {
        let mut markdown = self.options.clone();
        for (key, value) in options {
            match key.as_str() {
                "panel-syntax" => {
                    markdown.panel_syntax = value.parse().map_err(|_| {
                        FormatError::NotSupported(format!(
                            "Option 'panel-syntax' expects 'fenced' or 'comment', got '{value}'"
                        ))
                    })?
                }
                "embed-roundtrip" => {
                    markdown.embed_roundtrip = crate::format::parse_flag(key, value)?
                }
                other => {
                    return Err(FormatError::NotSupported(format!(
                        "Format 'markdown' has no option '{other}'"
                    )))
                }
            }
        }
        Ok(serialize_markdown_with_options(doc, &markdown)?)
    }
}

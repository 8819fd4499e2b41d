//! Markdown serialization (Document → Markdown)
//!
//! Pipeline: Document → comrak AST → Markdown string (comrak's CommonMark writer).
//!
//! Constructs without Markdown syntax are appended as raw HTML nodes: inline carrier comments,
//! styled `<span>`/`<u>`/`<sub>`/`<sup>` tag pairs, fenced containers and block comments. comrak
//! writes raw nodes verbatim, so the parser sees exactly what we put there.

use super::comrak_options;
use super::containers::{fits_in_container, CONTAINER_FENCE};
use crate::ast::{
    BaseInline, Document, DocumentNode, Image, Inline, List, SimpleBlock, SourceFormat, Table,
    TableRow, TaskList, UnsupportedBlock,
};
use crate::common::codec::{is_single_comment, split_comment, Carrier, TaskFields};
use crate::common::text::plain_text;
use crate::error::SerializeError;
use crate::formats::storage::scanner::html_escape;
use crate::formats::storage::serialize_storage;
use comrak::nodes::{
    Ast, AstNode, ListDelimType, ListType, NodeCode, NodeCodeBlock, NodeHeading, NodeHtmlBlock,
    NodeLink, NodeList, NodeTable, NodeValue, TableAlignment,
};
use comrak::{format_commonmark, Arena};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How panels and expands are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelSyntax {
    /// `:::type title` … `:::` containers, falling back to comments when the content cannot
    /// be fenced safely
    #[default]
    Fenced,
    /// Always the single-line `panel` / `expand` comment
    Comment,
}

impl FromStr for PanelSyntax {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fenced" => Ok(PanelSyntax::Fenced),
            "comment" => Ok(PanelSyntax::Comment),
            other => Err(format!("unknown panel syntax '{other}'")),
        }
    }
}

impl fmt::Display for PanelSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PanelSyntax::Fenced => "fenced",
            PanelSyntax::Comment => "comment",
        })
    }
}

/// Options for Markdown serialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownOptions {
    pub panel_syntax: PanelSyntax,
    /// Append the document's storage markup as a trailing `confluence-roundtrip` comment.
    pub embed_roundtrip: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        MarkdownOptions {
            panel_syntax: PanelSyntax::Fenced,
            embed_roundtrip: true,
        }
    }
}

/// CommonMark type 6 HTML block tags; raw markup starting with one survives as an HTML block.
const BLOCK_TAGS: [&str; 62] = [
    "address", "article", "aside", "base", "basefont", "blockquote", "body", "caption", "center",
    "col", "colgroup", "dd", "details", "dialog", "dir", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5",
    "h6", "head", "header", "hr", "html", "iframe", "legend", "li", "link", "main", "menu",
    "menuitem", "nav", "noframes", "ol", "optgroup", "option", "p", "param", "search", "section",
    "summary", "table", "tbody", "td", "tfoot", "th", "thead", "title", "tr", "track", "ul",
];

/// Serialize a document to Markdown with default options.
pub fn serialize_markdown(doc: &Document) -> Result<String, SerializeError> {
    serialize_markdown_with_options(doc, &MarkdownOptions::default())
}

pub fn serialize_markdown_with_options(
    doc: &Document,
    options: &MarkdownOptions,
) -> Result<String, SerializeError> {
    let mut markdown = render_blocks(&doc.children, options)?;
    if let (Some(storage), true) = (&doc.raw_confluence, options.embed_roundtrip) {
        if !markdown.is_empty() {
            if !markdown.ends_with('\n') {
                markdown.push('\n');
            }
            markdown.push('\n');
        }
        let carrier = Carrier::Roundtrip {
            storage: storage.clone(),
        };
        markdown.push_str(&carrier.encode());
        markdown.push('\n');
    }
    Ok(markdown)
}

/// Markdown of a single inline node, without the paragraph around it.
pub fn render_inline(inline: &Inline) -> Result<String, SerializeError> {
    inline_markdown(std::slice::from_ref(inline), &MarkdownOptions::default())
}

fn error(node_type: &str, message: impl Into<String>) -> SerializeError {
    SerializeError::new(SourceFormat::Markdown, node_type, message)
}

fn render_blocks(
    nodes: &[DocumentNode],
    options: &MarkdownOptions,
) -> Result<String, SerializeError> {
    let arena = Arena::new();
    let builder = Builder {
        arena: &arena,
        options,
    };
    let root = builder.alloc(NodeValue::Document);
    for node in nodes {
        builder.block(root, node)?;
    }
    format(root)
}

fn inline_markdown(
    inlines: &[Inline],
    options: &MarkdownOptions,
) -> Result<String, SerializeError> {
    let arena = Arena::new();
    let builder = Builder {
        arena: &arena,
        options,
    };
    let root = builder.alloc(NodeValue::Document);
    let paragraph = builder.append(root, NodeValue::Paragraph);
    builder.inlines(paragraph, inlines)?;
    Ok(format(root)?.trim_end_matches('\n').to_string())
}

fn format<'a>(root: &'a AstNode<'a>) -> Result<String, SerializeError> {
    let mut output = Vec::new();
    format_commonmark(root, &comrak_options(), &mut output)
        .map_err(|e| error("document", format!("comrak serialization failed: {e}")))?;
    String::from_utf8(output)
        .map_err(|e| error("document", format!("UTF-8 conversion failed: {e}")))
}

struct Builder<'a, 'o> {
    arena: &'a Arena<AstNode<'a>>,
    options: &'o MarkdownOptions,
}

impl<'a, 'o> Builder<'a, 'o> {
    fn alloc(&self, value: NodeValue) -> &'a AstNode<'a> {
        self.arena
            .alloc(AstNode::new(RefCell::new(Ast::new(value, (0, 0).into()))))
    }

    fn append(&self, parent: &'a AstNode<'a>, value: NodeValue) -> &'a AstNode<'a> {
        let node = self.alloc(value);
        parent.append(node);
        node
    }

    fn html_block(&self, parent: &'a AstNode<'a>, literal: String) {
        self.append(
            parent,
            NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal,
            }),
        );
    }

    fn block(&self, parent: &'a AstNode<'a>, node: &DocumentNode) -> Result<(), SerializeError> {
        match node {
            DocumentNode::Heading(heading) => {
                if !(1..=6).contains(&heading.level) {
                    return Err(error(
                        "heading",
                        format!("level {} is outside 1-6", heading.level),
                    ));
                }
                let node = self.append(
                    parent,
                    NodeValue::Heading(NodeHeading {
                        level: heading.level,
                        setext: false,
                    }),
                );
                self.inlines(node, &heading.children)?;
            }
            DocumentNode::Paragraph(paragraph) => {
                if !paragraph.children.is_empty() {
                    let node = self.append(parent, NodeValue::Paragraph);
                    self.inlines(node, &paragraph.children)?;
                }
            }
            DocumentNode::CodeBlock(code) => {
                let literal = if code.code.is_empty() {
                    String::new()
                } else {
                    format!("{}\n", code.code)
                };
                self.append(
                    parent,
                    NodeValue::CodeBlock(NodeCodeBlock {
                        fenced: true,
                        fence_char: b'`',
                        fence_length: 3,
                        fence_offset: 0,
                        info: code.language.clone().unwrap_or_default(),
                        literal,
                    }),
                );
            }
            DocumentNode::ThematicBreak => {
                self.append(parent, NodeValue::ThematicBreak);
            }
            DocumentNode::Image(image) => self.image(parent, image)?,
            DocumentNode::Table(table) => self.table(parent, table)?,
            DocumentNode::List(list) => self.list(parent, list)?,
            DocumentNode::BlockQuote(quote) => {
                let node = self.append(parent, NodeValue::BlockQuote);
                self.simple_blocks(node, &quote.children)?;
            }
            DocumentNode::UnsupportedBlock(block) => self.unsupported(parent, block)?,
            DocumentNode::InfoPanel(panel) => {
                if panel.panel_type.is_empty() {
                    return Err(error("infoPanel", "panel type is empty"));
                }
                let content = self.nested(&panel.children)?;
                let fenced = panel.panel_type != "expand"
                    && self.can_fence(&panel.panel_type, panel.title.as_deref(), &content);
                let literal = if fenced {
                    fence(&panel.panel_type, panel.title.as_deref(), &content)
                } else {
                    Carrier::Panel {
                        panel_type: panel.panel_type.clone(),
                        title: panel.title.clone(),
                        content,
                    }
                    .encode()
                };
                self.html_block(parent, literal);
            }
            DocumentNode::ExpandMacro(expand) => {
                let content = self.nested(&expand.children)?;
                let literal = if self.can_fence("expand", expand.title.as_deref(), &content) {
                    fence("expand", expand.title.as_deref(), &content)
                } else {
                    Carrier::Expand {
                        title: expand.title.clone(),
                        content,
                    }
                    .encode()
                };
                self.html_block(parent, literal);
            }
            DocumentNode::TocMacro(toc) => {
                let carrier = Carrier::Toc {
                    min_level: toc.min_level,
                    max_level: toc.max_level,
                };
                self.html_block(parent, carrier.encode());
            }
            DocumentNode::TaskList(tasks) => self.html_block(parent, task_comment(tasks)),
        }
        Ok(())
    }

    fn simple_blocks(
        &self,
        parent: &'a AstNode<'a>,
        blocks: &[SimpleBlock],
    ) -> Result<(), SerializeError> {
        for block in blocks {
            self.block(parent, &DocumentNode::from(block.clone()))?;
        }
        Ok(())
    }

    /// Markdown of a container body, rendered on its own.
    fn nested(&self, blocks: &[SimpleBlock]) -> Result<String, SerializeError> {
        let nodes: Vec<DocumentNode> = blocks.iter().cloned().map(DocumentNode::from).collect();
        let markdown = render_blocks(&nodes, self.options)?;
        Ok(markdown.trim_end_matches('\n').to_string())
    }

    fn can_fence(&self, kind: &str, title: Option<&str>, content: &str) -> bool {
        self.options.panel_syntax == PanelSyntax::Fenced
            && !kind.is_empty()
            && kind
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && title.map_or(true, |t| !t.contains('\n') && t == t.trim() && !t.is_empty())
            && fits_in_container(content)
    }

    fn image(&self, parent: &'a AstNode<'a>, image: &Image) -> Result<(), SerializeError> {
        if image.src.is_none() && image.attachment.is_none() {
            return Err(error("image", "neither a source nor an attachment"));
        }
        match (&image.src, image.is_plain()) {
            (Some(src), true) => {
                let paragraph = self.append(parent, NodeValue::Paragraph);
                let node = self.append(
                    paragraph,
                    NodeValue::Image(NodeLink {
                        url: src.clone(),
                        title: image.title.clone().unwrap_or_default(),
                    }),
                );
                if let Some(alt) = &image.alt {
                    self.append(node, NodeValue::Text(alt.clone()));
                }
            }
            _ => self.html_block(parent, Carrier::Image(image.clone()).encode()),
        }
        Ok(())
    }

    fn table(&self, parent: &'a AstNode<'a>, table: &Table) -> Result<(), SerializeError> {
        match self.gfm_header(table)? {
            Some(header) => {
                let columns = header.cells.len();
                let node = self.append(
                    parent,
                    NodeValue::Table(NodeTable {
                        alignments: vec![TableAlignment::None; columns],
                        num_columns: columns,
                        num_rows: table.rows.len() + 1,
                        num_nonempty_cells: 0,
                    }),
                );
                self.table_row(node, header, true)?;
                for row in &table.rows {
                    self.table_row(node, row, false)?;
                }
            }
            None => {
                debug!("table is not expressible in GFM, writing storage markup");
                let markup = serialize_storage(&Document::new(vec![DocumentNode::Table(
                    table.clone(),
                )]))
                .map_err(|e| error("table", e.message))?;
                self.html_block(parent, markup);
            }
        }
        Ok(())
    }

    /// The header row when GFM can carry the table unchanged.
    fn gfm_header<'t>(&self, table: &'t Table) -> Result<Option<&'t TableRow>, SerializeError> {
        let Some(header) = &table.header else {
            return Ok(None);
        };
        let columns = header.cells.len();
        if columns == 0 || !header.cells.iter().all(|c| c.is_header) {
            return Ok(None);
        }
        if table
            .rows
            .iter()
            .any(|row| row.cells.len() != columns || row.cells.iter().any(|c| c.is_header))
        {
            return Ok(None);
        }
        for cell in header.cells.iter().chain(table.rows.iter().flat_map(|r| &r.cells)) {
            let markdown = inline_markdown(&cell.children, self.options)?;
            if markdown.contains('|') || markdown.contains('\n') {
                return Ok(None);
            }
        }
        Ok(Some(header))
    }

    fn table_row(
        &self,
        table: &'a AstNode<'a>,
        row: &TableRow,
        header: bool,
    ) -> Result<(), SerializeError> {
        let node = self.append(table, NodeValue::TableRow(header));
        for cell in &row.cells {
            let cell_node = self.append(node, NodeValue::TableCell);
            self.inlines(cell_node, &cell.children)?;
        }
        Ok(())
    }

    fn list(&self, parent: &'a AstNode<'a>, list: &List) -> Result<(), SerializeError> {
        let start = list.start.unwrap_or(1) as usize;
        let shape = |start: usize| NodeList {
            list_type: if list.ordered {
                ListType::Ordered
            } else {
                ListType::Bullet
            },
            marker_offset: 0,
            padding: 0,
            start,
            delimiter: ListDelimType::Period,
            bullet_char: b'-',
            tight: list.children.iter().all(|item| item.children.len() <= 1),
        };
        let node = self.append(parent, NodeValue::List(shape(start)));
        for (index, item) in list.children.iter().enumerate() {
            let value = match item.checked {
                Some(true) => NodeValue::TaskItem(Some('x')),
                Some(false) => NodeValue::TaskItem(None),
                None => NodeValue::Item(shape(start + index)),
            };
            let item_node = self.append(node, value);
            self.simple_blocks(item_node, &item.children)?;
        }
        Ok(())
    }

    fn unsupported(
        &self,
        parent: &'a AstNode<'a>,
        block: &UnsupportedBlock,
    ) -> Result<(), SerializeError> {
        let literal = match (&block.raw_html, &block.raw_markdown) {
            (Some(raw), _) if is_safe_html(raw) => raw.clone(),
            (Some(raw), _) => Carrier::HtmlBlock {
                markup: raw.clone(),
            }
            .encode(),
            (None, Some(raw)) => raw.clone(),
            (None, None) => return Err(error("unsupportedBlock", "no payload to write")),
        };
        self.html_block(parent, literal);
        Ok(())
    }

    fn inlines(&self, parent: &'a AstNode<'a>, inlines: &[Inline]) -> Result<(), SerializeError> {
        for inline in inlines {
            self.inline(parent, inline)?;
        }
        Ok(())
    }

    fn base_inlines(
        &self,
        parent: &'a AstNode<'a>,
        children: &[BaseInline],
    ) -> Result<(), SerializeError> {
        for child in children {
            self.inline(parent, &Inline::from(child.clone()))?;
        }
        Ok(())
    }

    fn wrapper(
        &self,
        parent: &'a AstNode<'a>,
        value: NodeValue,
        children: &[BaseInline],
    ) -> Result<(), SerializeError> {
        if children.is_empty() {
            return Ok(());
        }
        let node = self.append(parent, value);
        self.base_inlines(node, children)
    }

    /// An HTML tag pair around the children, appended as inline HTML siblings.
    fn tag_pair(
        &self,
        parent: &'a AstNode<'a>,
        open: String,
        close: &str,
        children: &[BaseInline],
    ) -> Result<(), SerializeError> {
        self.append(parent, NodeValue::HtmlInline(open));
        self.base_inlines(parent, children)?;
        self.append(parent, NodeValue::HtmlInline(close.to_string()));
        Ok(())
    }

    fn comment(&self, parent: &'a AstNode<'a>, carrier: Carrier) {
        self.append(parent, NodeValue::HtmlInline(carrier.encode()));
    }

    fn inline(&self, parent: &'a AstNode<'a>, inline: &Inline) -> Result<(), SerializeError> {
        match inline {
            Inline::Text { value } => {
                self.append(parent, NodeValue::Text(value.clone()));
            }
            Inline::Strong { children } => self.wrapper(parent, NodeValue::Strong, children)?,
            Inline::Emphasis { children } => self.wrapper(parent, NodeValue::Emph, children)?,
            Inline::Strikethrough { children } => {
                self.wrapper(parent, NodeValue::Strikethrough, children)?
            }
            Inline::InlineCode { value } => {
                self.append(
                    parent,
                    NodeValue::Code(NodeCode {
                        num_backticks: 1,
                        literal: value.clone(),
                    }),
                );
            }
            Inline::Link {
                href,
                title,
                children,
            } => {
                let node = self.append(
                    parent,
                    NodeValue::Link(NodeLink {
                        url: href.clone(),
                        title: title.clone().unwrap_or_default(),
                    }),
                );
                self.base_inlines(node, children)?;
            }
            Inline::LineBreak => {
                self.append(parent, NodeValue::HtmlInline("<br />".to_string()));
            }
            Inline::ColoredText { color, children } => self.tag_pair(
                parent,
                format!(r#"<span style="color: {};">"#, html_escape(color)),
                "</span>",
                children,
            )?,
            Inline::Highlight {
                background_color,
                children,
            } => self.tag_pair(
                parent,
                format!(
                    r#"<span style="background-color: {};">"#,
                    html_escape(background_color)
                ),
                "</span>",
                children,
            )?,
            Inline::Underline { children } => {
                self.tag_pair(parent, "<u>".to_string(), "</u>", children)?
            }
            Inline::Subscript { children } => {
                self.tag_pair(parent, "<sub>".to_string(), "</sub>", children)?
            }
            Inline::Superscript { children } => {
                self.tag_pair(parent, "<sup>".to_string(), "</sup>", children)?
            }
            Inline::DateTime { datetime } => self.comment(
                parent,
                Carrier::Date {
                    datetime: datetime.clone(),
                },
            ),
            Inline::Emoticon {
                shortname,
                emoji_id,
                fallback,
            } => self.comment(
                parent,
                Carrier::Emoticon {
                    shortname: shortname.clone(),
                    emoji_id: emoji_id.clone(),
                    fallback: fallback.clone(),
                },
            ),
            Inline::UserMention { account_id } => self.comment(
                parent,
                Carrier::Mention {
                    account_id: account_id.clone(),
                },
            ),
            Inline::Status { title, color } => {
                if title.is_empty() {
                    return Err(error("status", "status title is empty"));
                }
                self.comment(
                    parent,
                    Carrier::Status {
                        title: title.clone(),
                        color: color.clone(),
                    },
                )
            }
            Inline::UnsupportedInline {
                raw,
                source: SourceFormat::Confluence,
            } => {
                if is_verbatim_comment(raw) {
                    self.append(parent, NodeValue::HtmlInline(raw.clone()));
                } else {
                    self.comment(
                        parent,
                        Carrier::Html {
                            markup: raw.clone(),
                        },
                    );
                }
            }
            Inline::UnsupportedInline {
                raw,
                source: SourceFormat::Markdown,
            } => {
                self.append(parent, NodeValue::HtmlInline(raw.clone()));
            }
        }
        Ok(())
    }
}

fn fence(kind: &str, title: Option<&str>, content: &str) -> String {
    let mut literal = format!("{CONTAINER_FENCE}{kind}");
    if let Some(title) = title {
        literal.push(' ');
        literal.push_str(title);
    }
    literal.push('\n');
    if !content.is_empty() {
        literal.push_str(content);
        literal.push('\n');
    }
    literal.push_str(CONTAINER_FENCE);
    literal
}

fn task_comment(tasks: &TaskList) -> String {
    let fields = tasks
        .children
        .iter()
        .map(|task| TaskFields {
            id: task.id.clone(),
            uuid: task.uuid.clone(),
            status: task.status,
            body: plain_text(&task.body),
        })
        .collect();
    Carrier::TaskList(fields).encode()
}

/// A carrier comment the parsers keep as its own text.
fn is_verbatim_comment(raw: &str) -> bool {
    matches!(Carrier::decode(raw), Some(Ok(carrier)) if carrier.kind().is_verbatim())
}

/// Whether raw storage markup can be written as an HTML block and read back unchanged.
fn is_safe_html(raw: &str) -> bool {
    if raw.is_empty() || raw != raw.trim() {
        return false;
    }
    if raw.lines().any(|line| {
        line.trim().is_empty() || line.trim_start().starts_with(CONTAINER_FENCE)
    }) {
        return false;
    }
    if is_single_comment(raw) {
        if raw.contains('\n') || raw == "<!-- end list -->" {
            return false;
        }
        return match split_comment(raw) {
            None => true,
            Some((kind, _)) => {
                kind.is_verbatim() && !kind.is_inline() && is_verbatim_comment(raw)
            }
        };
    }
    starts_with_block_tag(raw)
}

fn starts_with_block_tag(raw: &str) -> bool {
    let Some(rest) = raw.strip_prefix('<') else {
        return false;
    };
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    let name_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let (name, after) = rest.split_at(name_len);
    let name = name.to_ascii_lowercase();
    BLOCK_TAGS.contains(&name.as_str())
        && (after.is_empty()
            || after.starts_with(|c: char| c.is_ascii_whitespace() || c == '>')
            || after.starts_with("/>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        Attachment, ExpandMacro, Heading, InfoPanel, ListItem, Paragraph, TableCell, TocMacro,
    };

    fn markdown(nodes: Vec<DocumentNode>) -> String {
        serialize_markdown(&Document::new(nodes)).unwrap()
    }

    fn paragraph(inlines: Vec<Inline>) -> DocumentNode {
        DocumentNode::Paragraph(Paragraph { children: inlines })
    }

    #[test]
    fn heading_and_emphasis() {
        let out = markdown(vec![
            DocumentNode::Heading(Heading {
                level: 2,
                children: vec![Inline::text("Title")],
            }),
            paragraph(vec![
                Inline::text("Hello "),
                Inline::Strong {
                    children: vec![BaseInline::text("world")],
                },
            ]),
        ]);
        assert_eq!(out, "## Title\n\nHello **world**\n");
    }

    #[test]
    fn breaks_and_styled_spans_are_inline_html() {
        let out = markdown(vec![paragraph(vec![
            Inline::text("a"),
            Inline::LineBreak,
            Inline::ColoredText {
                color: "#ff0000".into(),
                children: vec![BaseInline::text("red")],
            },
        ])]);
        assert_eq!(
            out.trim_end(),
            r#"a<br /><span style="color: #ff0000;">red</span>"#
        );
    }

    #[test]
    fn panels_are_fenced_by_default() {
        let panel = DocumentNode::InfoPanel(InfoPanel {
            panel_type: "warning".into(),
            title: Some("Careful".into()),
            children: vec![SimpleBlock::Paragraph(Paragraph {
                children: vec![Inline::text("Hot")],
            })],
        });
        assert_eq!(
            markdown(vec![panel.clone()]).trim_end(),
            ":::warning Careful\nHot\n:::"
        );
        let options = MarkdownOptions {
            panel_syntax: PanelSyntax::Comment,
            embed_roundtrip: true,
        };
        let out = serialize_markdown_with_options(&Document::new(vec![panel]), &options).unwrap();
        assert_eq!(out.trim_end(), "<!-- panel:warning;Careful;Hot -->");
    }

    #[test]
    fn expand_with_padded_title_uses_comment() {
        let out = markdown(vec![DocumentNode::ExpandMacro(ExpandMacro {
            title: Some(" spaced ".into()),
            children: vec![],
        })]);
        assert_eq!(out.trim_end(), "<!-- expand: spaced ; -->");
    }

    #[test]
    fn attachment_image_uses_comment() {
        let out = markdown(vec![DocumentNode::Image(Image {
            attachment: Some(Attachment {
                filename: "diagram.png".into(),
                version: None,
            }),
            ..Image::default()
        })]);
        assert_eq!(out.trim_end(), "<!-- image:attachment=diagram.png -->");
    }

    #[test]
    fn table_without_header_falls_back_to_storage() {
        let out = markdown(vec![DocumentNode::Table(Table {
            header: None,
            rows: vec![TableRow {
                cells: vec![TableCell {
                    is_header: false,
                    children: vec![Inline::text("x")],
                }],
            }],
        })]);
        assert_eq!(out.trim_end(), "<table><tbody><tr><td>x</td></tr></tbody></table>");
    }

    #[test]
    fn checkbox_items() {
        let item = |checked, text: &str| ListItem {
            checked: Some(checked),
            children: vec![SimpleBlock::Paragraph(Paragraph {
                children: vec![Inline::text(text)],
            })],
        };
        let out = markdown(vec![DocumentNode::List(List {
            ordered: false,
            start: None,
            children: vec![item(false, "todo"), item(true, "done")],
        })]);
        assert_eq!(out, "- [ ] todo\n- [x] done\n");
    }

    #[test]
    fn toc_and_roundtrip_comment() {
        let doc = Document::new(vec![DocumentNode::TocMacro(TocMacro::default())])
            .with_raw_confluence("<p>hi</p>");
        let out = serialize_markdown(&doc).unwrap();
        assert_eq!(
            out,
            "<!-- toc:; -->\n\n<!-- confluence-roundtrip:PHA+aGk8L3A+ -->\n"
        );
        let options = MarkdownOptions {
            embed_roundtrip: false,
            ..MarkdownOptions::default()
        };
        assert!(!serialize_markdown_with_options(&doc, &options)
            .unwrap()
            .contains("confluence-roundtrip"));
    }

    #[test]
    fn unsupported_payloads() {
        let safe = UnsupportedBlock::html("<div class=\"x\">hi</div>", SourceFormat::Confluence);
        let unsafe_markup =
            UnsupportedBlock::html("<custom>a\n\nb</custom>", SourceFormat::Confluence);
        let out = markdown(vec![
            DocumentNode::UnsupportedBlock(safe),
            DocumentNode::UnsupportedBlock(unsafe_markup),
        ]);
        assert_eq!(
            out.trim_end(),
            "<div class=\"x\">hi</div>\n\n<!-- html-block:<custom>a\\n\\nb</custom> -->"
        );

        let empty = UnsupportedBlock {
            raw_html: None,
            raw_markdown: None,
            source: SourceFormat::Markdown,
        };
        let err = serialize_markdown(&Document::new(vec![DocumentNode::UnsupportedBlock(empty)]))
            .unwrap_err();
        assert_eq!(err.node_type, "unsupportedBlock");
    }

    #[test]
    fn empty_status_is_an_error() {
        let err = serialize_markdown(&Document::new(vec![paragraph(vec![Inline::Status {
            title: String::new(),
            color: "Red".into(),
        }])]))
        .unwrap_err();
        assert_eq!(err.node_type, "status");
        assert_eq!(err.target, SourceFormat::Markdown);
    }

    #[test]
    fn storage_inline_is_wrapped_in_html_comment() {
        let out = markdown(vec![paragraph(vec![
            Inline::text("see "),
            Inline::unsupported("<kbd>K</kbd>", SourceFormat::Confluence),
        ])]);
        assert_eq!(out.trim_end(), "see <!-- html:<kbd>K</kbd> -->");
    }

    #[test]
    fn panel_syntax_parses() {
        assert_eq!("Comment".parse::<PanelSyntax>(), Ok(PanelSyntax::Comment));
        assert!("boxed".parse::<PanelSyntax>().is_err());
    }
}

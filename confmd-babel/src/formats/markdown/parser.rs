//! Markdown parsing (Markdown → Document)
//!
//! Pipeline: trailing `confluence-roundtrip` comment split off → fenced containers rewritten to
//! comments ([`super::containers`]) → comrak AST → Document.
//!
//! HTML blocks are classified rather than passed through: carrier comments decode to their typed
//! nodes, inline carrier comments that start a line are re-read as a paragraph, and raw
//! `<table>` blocks go through the storage parser.

use super::comrak_options;
use super::containers::expand_containers;
use super::inline::{fold_inlines, is_inline_carrier, render_node};
use crate::ast::{
    BlockQuote, CodeBlock, Document, DocumentNode, ExpandMacro, Heading, Image, InfoPanel, Inline,
    List, ListItem, Paragraph, SimpleBlock, SourceFormat, Table, TableCell, TableRow, TaskItem,
    TaskList, TocMacro, UnsupportedBlock,
};
use crate::common::codec::{is_single_comment, split_comment, Carrier, CommentKind, TaskFields};
use crate::common::text::trim_block;
use crate::error::ParseError;
use crate::formats::storage::parse_storage;
use comrak::nodes::{AstNode, ListType, NodeList, NodeValue};
use comrak::{parse_document, Arena};
use tracing::{debug, trace};

/// comrak's separator between two adjacent lists.
const END_LIST: &str = "<!-- end list -->";

/// Prefixed to a comment line so comrak reads it as a paragraph instead of an HTML block.
const SENTINEL: char = '\u{E000}';

/// Parse Markdown into a document.
pub fn parse_markdown(source: &str) -> Result<Document, ParseError> {
    let (body, raw_confluence) = split_roundtrip(source)?;
    let children = parse_blocks(body)?;
    Ok(Document {
        children,
        raw_confluence,
    })
}

/// Separates a final `confluence-roundtrip` comment from the Markdown body.
fn split_roundtrip(source: &str) -> Result<(&str, Option<String>), ParseError> {
    let trimmed = source.trim_end();
    let start = trimmed.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let last = &trimmed[start..];
    if !matches!(split_comment(last), Some((CommentKind::Roundtrip, _))) {
        return Ok((source, None));
    }
    match Carrier::decode(last) {
        Some(Ok(Carrier::Roundtrip { storage })) => Ok((&source[..start], Some(storage))),
        Some(Err(err)) => Err(ParseError::markdown(err.to_string())
            .at(start)
            .with_raw(last)),
        _ => Ok((source, None)),
    }
}

fn parse_blocks(markdown: &str) -> Result<Vec<DocumentNode>, ParseError> {
    let expanded = expand_containers(markdown);
    let arena = Arena::new();
    let root = parse_document(&arena, &expanded, &comrak_options());
    let mut nodes = Vec::new();
    for child in root.children() {
        if let Some(node) = fold_block(child)? {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

/// Container content, restricted to the simple block grammar.
fn parse_simple(markdown: &str) -> Result<Vec<SimpleBlock>, ParseError> {
    let expanded = expand_containers(markdown);
    let arena = Arena::new();
    let root = parse_document(&arena, &expanded, &comrak_options());
    fold_simple(root)
}

fn fold_simple<'a>(parent: &'a AstNode<'a>) -> Result<Vec<SimpleBlock>, ParseError> {
    let mut blocks = Vec::new();
    for child in parent.children() {
        let Some(node) = fold_block(child)? else {
            continue;
        };
        match SimpleBlock::try_from(node) {
            Ok(block) => blocks.push(block),
            Err(rich) => {
                trace!(node = rich.type_name(), "block not allowed in a nested context");
                blocks.push(SimpleBlock::UnsupportedBlock(UnsupportedBlock::markdown(
                    render_node(child)?,
                )));
            }
        }
    }
    Ok(blocks)
}

fn fold_block<'a>(node: &'a AstNode<'a>) -> Result<Option<DocumentNode>, ParseError> {
    let value = node.data.borrow().value.clone();
    let block = match value {
        NodeValue::Paragraph => return fold_paragraph(node),
        NodeValue::Heading(heading) => DocumentNode::Heading(Heading {
            level: heading.level,
            children: trim_block(fold_inlines(node)?),
        }),
        NodeValue::CodeBlock(code) => DocumentNode::CodeBlock(CodeBlock {
            code: code
                .literal
                .strip_suffix('\n')
                .unwrap_or(&code.literal)
                .to_string(),
            language: non_empty(code.info.trim()),
        }),
        NodeValue::ThematicBreak => DocumentNode::ThematicBreak,
        NodeValue::List(list) => DocumentNode::List(fold_list(node, &list)?),
        NodeValue::BlockQuote => DocumentNode::BlockQuote(BlockQuote {
            children: fold_simple(node)?,
        }),
        NodeValue::Table(_) => DocumentNode::Table(fold_table(node)?),
        NodeValue::HtmlBlock(html) => return fold_html_block(&html.literal),
        other => {
            debug!(node = ?other, "no block mapping, keeping markdown");
            DocumentNode::UnsupportedBlock(UnsupportedBlock::markdown(render_node(node)?))
        }
    };
    Ok(Some(block))
}

fn fold_paragraph<'a>(node: &'a AstNode<'a>) -> Result<Option<DocumentNode>, ParseError> {
    if let Some(image) = lone_image(node) {
        return Ok(Some(DocumentNode::Image(image)));
    }
    let children = trim_block(fold_inlines(node)?);
    Ok((!children.is_empty()).then(|| DocumentNode::Paragraph(Paragraph { children })))
}

/// A paragraph holding nothing but `![alt](src "title")`.
fn lone_image<'a>(node: &'a AstNode<'a>) -> Option<Image> {
    let mut children = node.children();
    let only = children.next()?;
    if children.next().is_some() {
        return None;
    }
    let data = only.data.borrow();
    let NodeValue::Image(link) = &data.value else {
        return None;
    };
    let src = non_empty(&link.url)?;
    let mut alt = String::new();
    collect_text(only, &mut alt);
    Some(Image {
        src: Some(src),
        alt: non_empty(&alt),
        title: non_empty(&link.title),
        ..Image::default()
    })
}

fn collect_text<'a>(node: &'a AstNode<'a>, out: &mut String) {
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(text) => out.push_str(text),
            NodeValue::Code(code) => out.push_str(&code.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => out.push(' '),
            _ => collect_text(child, out),
        }
    }
}

fn fold_list<'a>(node: &'a AstNode<'a>, list: &NodeList) -> Result<List, ParseError> {
    let ordered = list.list_type == ListType::Ordered;
    let start = if ordered && list.start != 1 {
        u32::try_from(list.start).ok()
    } else {
        None
    };
    let mut children = Vec::new();
    for item in node.children() {
        let checked = match &item.data.borrow().value {
            NodeValue::TaskItem(symbol) => Some(symbol.is_some_and(|c| !c.is_whitespace())),
            _ => None,
        };
        children.push(ListItem {
            checked,
            children: fold_simple(item)?,
        });
    }
    Ok(List {
        ordered,
        start,
        children,
    })
}

fn fold_table<'a>(node: &'a AstNode<'a>) -> Result<Table, ParseError> {
    let mut table = Table::default();
    for row in node.children() {
        let is_header = matches!(row.data.borrow().value, NodeValue::TableRow(true));
        let mut cells = Vec::new();
        for cell in row.children() {
            cells.push(TableCell {
                is_header,
                children: trim_block(fold_inlines(cell)?),
            });
        }
        if is_header && table.header.is_none() {
            table.header = Some(TableRow { cells });
        } else {
            table.rows.push(TableRow { cells });
        }
    }
    Ok(table)
}

fn fold_html_block(literal: &str) -> Result<Option<DocumentNode>, ParseError> {
    let text = literal.trim();
    if text == END_LIST {
        return Ok(None);
    }
    if is_single_comment(text) {
        if is_inline_carrier(text) {
            return comment_paragraph(text);
        }
        let node = match Carrier::decode(text) {
            Some(Ok(carrier)) => block_carrier(carrier, text)?,
            Some(Err(err)) => {
                debug!(error = %err, "malformed block comment kept as markdown");
                unsupported_markdown(text)
            }
            None => unsupported_html(text),
        };
        return Ok(Some(node));
    }
    if text.starts_with("<!--") {
        return comment_paragraph(text);
    }
    if text.starts_with("<table") {
        if let Some(table) = storage_table(text) {
            return Ok(Some(DocumentNode::Table(table)));
        }
    }
    Ok(Some(unsupported_html(text)))
}

/// A line that starts with a comment but is really paragraph content.
fn comment_paragraph(text: &str) -> Result<Option<DocumentNode>, ParseError> {
    let guarded = format!("{SENTINEL}{text}");
    let arena = Arena::new();
    let root = parse_document(&arena, &guarded, &comrak_options());
    let paragraph = root
        .first_child()
        .filter(|node| matches!(node.data.borrow().value, NodeValue::Paragraph));
    let Some(paragraph) = paragraph else {
        return Ok(Some(unsupported_markdown(text)));
    };
    let mut inlines = fold_inlines(paragraph)?;
    if let Some(Inline::Text { value }) = inlines.first_mut() {
        if let Some(rest) = value.strip_prefix(SENTINEL) {
            *value = rest.to_string();
        }
    }
    let children = trim_block(inlines);
    Ok((!children.is_empty()).then(|| DocumentNode::Paragraph(Paragraph { children })))
}

fn block_carrier(carrier: Carrier, literal: &str) -> Result<DocumentNode, ParseError> {
    let node = match carrier {
        Carrier::Image(image) if image.src.is_some() || image.attachment.is_some() => {
            DocumentNode::Image(image)
        }
        Carrier::Expand { title, content } => DocumentNode::ExpandMacro(ExpandMacro {
            title,
            children: parse_simple(&content)?,
        }),
        Carrier::Toc {
            min_level,
            max_level,
        } => DocumentNode::TocMacro(TocMacro {
            min_level,
            max_level,
        }),
        Carrier::Panel {
            panel_type,
            title,
            content,
        } => DocumentNode::InfoPanel(InfoPanel {
            panel_type,
            title,
            children: parse_simple(&content)?,
        }),
        Carrier::TaskList(tasks) => DocumentNode::TaskList(TaskList {
            children: tasks.into_iter().map(task_item).collect(),
        }),
        Carrier::HtmlBlock { markup } => unsupported_html(&markup),
        Carrier::Roundtrip { .. } => {
            debug!("roundtrip payload before the end of the page, keeping it as markdown");
            unsupported_markdown(literal)
        }
        Carrier::Image(_) => unsupported_markdown(literal),
        other => {
            trace!(kind = other.kind().name(), "keeping carrier comment verbatim");
            unsupported_html(literal)
        }
    };
    Ok(node)
}

fn task_item(task: TaskFields) -> TaskItem {
    TaskItem {
        id: task.id,
        uuid: task.uuid,
        status: task.status,
        body: if task.body.is_empty() {
            Vec::new()
        } else {
            vec![Inline::text(task.body)]
        },
    }
}

/// A raw `<table>` the storage parser can type as a whole.
fn storage_table(markup: &str) -> Option<Table> {
    match parse_storage(markup) {
        Ok(doc) => {
            let mut children = doc.children;
            match (children.pop(), children.is_empty()) {
                (Some(DocumentNode::Table(table)), true) => Some(table),
                _ => None,
            }
        }
        Err(err) => {
            debug!(error = %err, "raw table does not parse as storage markup");
            None
        }
    }
}

fn unsupported_html(markup: &str) -> DocumentNode {
    DocumentNode::UnsupportedBlock(UnsupportedBlock::html(markup, SourceFormat::Confluence))
}

fn unsupported_markdown(markdown: &str) -> DocumentNode {
    DocumentNode::UnsupportedBlock(UnsupportedBlock::markdown(markdown))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BaseInline, TaskStatus};

    fn parse(markdown: &str) -> Vec<DocumentNode> {
        parse_markdown(markdown).unwrap().children
    }

    fn paragraph(text: &str) -> SimpleBlock {
        SimpleBlock::Paragraph(Paragraph {
            children: vec![Inline::text(text)],
        })
    }

    #[test]
    fn basic_blocks() {
        let nodes = parse("# Title\n\nHello *world*\n\n```rust\nfn main() {}\n```\n\n---\n");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::Heading(Heading {
                    level: 1,
                    children: vec![Inline::text("Title")],
                }),
                DocumentNode::Paragraph(Paragraph {
                    children: vec![
                        Inline::text("Hello "),
                        Inline::Emphasis {
                            children: vec![BaseInline::text("world")]
                        },
                    ],
                }),
                DocumentNode::CodeBlock(CodeBlock {
                    code: "fn main() {}".into(),
                    language: Some("rust".into()),
                }),
                DocumentNode::ThematicBreak,
            ]
        );
    }

    #[test]
    fn ordered_list_start_and_checkboxes() {
        let nodes = parse("3. three\n4. four\n");
        let [DocumentNode::List(list)] = nodes.as_slice() else {
            panic!("expected a list, got {nodes:?}");
        };
        assert!(list.ordered);
        assert_eq!(list.start, Some(3));

        let nodes = parse("- [ ] todo\n- [x] done\n");
        let [DocumentNode::List(list)] = nodes.as_slice() else {
            panic!("expected a list, got {nodes:?}");
        };
        assert_eq!(list.children[0].checked, Some(false));
        assert_eq!(list.children[1].checked, Some(true));
        assert_eq!(list.children[1].children, vec![paragraph("done")]);
    }

    #[test]
    fn nested_list_is_kept_as_markdown() {
        let nodes = parse("- top\n  - deep\n");
        let [DocumentNode::List(list)] = nodes.as_slice() else {
            panic!("expected a list, got {nodes:?}");
        };
        assert_eq!(
            list.children[0].children,
            vec![
                paragraph("top"),
                SimpleBlock::UnsupportedBlock(UnsupportedBlock::markdown("- deep")),
            ]
        );
    }

    #[test]
    fn fenced_container_becomes_panel() {
        let nodes = parse(":::warning Careful\nHot **stuff**\n:::\n");
        assert_eq!(
            nodes,
            vec![DocumentNode::InfoPanel(InfoPanel {
                panel_type: "warning".into(),
                title: Some("Careful".into()),
                children: vec![SimpleBlock::Paragraph(Paragraph {
                    children: vec![
                        Inline::text("Hot "),
                        Inline::Strong {
                            children: vec![BaseInline::text("stuff")]
                        },
                    ],
                })],
            })]
        );
    }

    #[test]
    fn expand_and_toc_comments() {
        let nodes = parse("<!-- expand:More;Hidden text -->\n\n<!-- toc:2;3 -->\n");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::ExpandMacro(ExpandMacro {
                    title: Some("More".into()),
                    children: vec![paragraph("Hidden text")],
                }),
                DocumentNode::TocMacro(TocMacro {
                    min_level: Some(2),
                    max_level: Some(3),
                }),
            ]
        );
    }

    #[test]
    fn task_list_comment() {
        let nodes = parse("<!-- tasklist:1;;complete;Ship it|2;u-2;incomplete; -->\n");
        assert_eq!(
            nodes,
            vec![DocumentNode::TaskList(TaskList {
                children: vec![
                    TaskItem {
                        id: "1".into(),
                        uuid: String::new(),
                        status: TaskStatus::Complete,
                        body: vec![Inline::text("Ship it")],
                    },
                    TaskItem {
                        id: "2".into(),
                        uuid: "u-2".into(),
                        status: TaskStatus::Incomplete,
                        body: vec![],
                    },
                ],
            })]
        );
    }

    #[test]
    fn line_of_inline_comments_is_a_paragraph() {
        let nodes = parse("<!-- status:A;Green --> and <!-- status:B;Red -->\n");
        assert_eq!(
            nodes,
            vec![DocumentNode::Paragraph(Paragraph {
                children: vec![
                    Inline::Status {
                        title: "A".into(),
                        color: "Green".into()
                    },
                    Inline::text(" and "),
                    Inline::Status {
                        title: "B".into(),
                        color: "Red".into()
                    },
                ],
            })]
        );
    }

    #[test]
    fn raw_table_goes_through_storage_parser() {
        let nodes = parse("<table><tbody><tr><th>H</th></tr><tr><td>v</td></tr></tbody></table>\n");
        let [DocumentNode::Table(table)] = nodes.as_slice() else {
            panic!("expected a table, got {nodes:?}");
        };
        assert_eq!(table.header.as_ref().map(|h| h.cells.len()), Some(1));
        assert_eq!(table.rows.len(), 1);

        let merged = r#"<table><tbody><tr><td colspan="2">x</td></tr></tbody></table>"#;
        assert_eq!(
            parse(merged),
            vec![DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
                merged,
                SourceFormat::Confluence
            ))]
        );
    }

    #[test]
    fn unknown_comment_and_html_are_kept() {
        assert_eq!(
            parse("<!-- just a note -->\n"),
            vec![DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
                "<!-- just a note -->",
                SourceFormat::Confluence
            ))]
        );
        assert_eq!(
            parse("<div class=\"x\">hi</div>\n"),
            vec![DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
                "<div class=\"x\">hi</div>",
                SourceFormat::Confluence
            ))]
        );
    }

    #[test]
    fn gfm_table() {
        let nodes = parse("| A | B |\n| --- | --- |\n| 1 | 2 |\n");
        let [DocumentNode::Table(table)] = nodes.as_slice() else {
            panic!("expected a table, got {nodes:?}");
        };
        let header = table.header.as_ref().expect("header row");
        assert!(header.cells.iter().all(|c| c.is_header));
        assert_eq!(header.cells[1].children, vec![Inline::text("B")]);
        assert_eq!(table.rows[0].cells[0].children, vec![Inline::text("1")]);
        assert!(!table.rows[0].cells[0].is_header);
    }

    #[test]
    fn lone_image_is_a_block() {
        assert_eq!(
            parse("![Logo](https://x.test/logo.png \"Our logo\")\n"),
            vec![DocumentNode::Image(Image {
                src: Some("https://x.test/logo.png".into()),
                alt: Some("Logo".into()),
                title: Some("Our logo".into()),
                ..Image::default()
            })]
        );
    }

    #[test]
    fn roundtrip_comment_is_split_off() {
        let doc = parse_markdown("Hi\n\n<!-- confluence-roundtrip:PHA+aGk8L3A+ -->\n").unwrap();
        assert_eq!(doc.raw_confluence.as_deref(), Some("<p>hi</p>"));
        assert_eq!(doc.children.len(), 1);
    }

    #[test]
    fn malformed_roundtrip_is_an_error() {
        let err = parse_markdown("Hi\n\n<!-- confluence-roundtrip:%%% -->").unwrap_err();
        assert_eq!(err.format, SourceFormat::Markdown);
        assert_eq!(err.position, Some(4));
    }

    #[test]
    fn adjacent_list_separator_is_skipped() {
        let nodes = parse("- a\n\n<!-- end list -->\n\n- b\n");
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| matches!(n, DocumentNode::List(_))));
    }
}

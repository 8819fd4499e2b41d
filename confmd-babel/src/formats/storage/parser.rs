//! Storage parsing (storage markup → Document)
//!
//! Pipeline: storage markup → carrier markup ([`preprocess`]) → html5ever `RcDom` → Document.
//!
//! The fold walks the `<body>` children once. Block context recognizes headings, paragraphs,
//! tables, lists and the carrier elements; runs of stray inline content become paragraphs.
//! Whatever has no typed counterpart is kept as an unsupported node holding its original storage
//! markup, restored from the `data-cfm-raw` attributes of any carriers inside it.

use super::preprocess::{decode_raw, preprocess, restore_originals, RAW_ATTR};
use super::serializer::render_inline;
use crate::ast::{
    Attachment, BaseInline, BlockQuote, CodeBlock, Document, DocumentNode, ExpandMacro, Heading,
    Image, InfoPanel, Inline, List, ListItem, Paragraph, SimpleBlock, SourceFormat, Table,
    TableCell, TableRow, TaskItem, TaskList, TaskStatus, TocMacro, UnsupportedBlock,
};
use crate::common::codec::Carrier;
use crate::common::text::{
    collapse_whitespace, demote, hoist_edge_whitespace, merge_text, trim_block,
};
use crate::error::ParseError;
use html5ever::serialize::{SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use tracing::{debug, trace};

/// Standards mode, and comments at the start of the page land inside `<body>`.
const DOCUMENT_PREFIX: &str = "<!DOCTYPE html><html><head></head><body>";

const INLINE_ELEMENTS: [&str; 24] = [
    "a", "abbr", "b", "br", "cite", "code", "del", "em", "i", "img", "ins", "kbd", "mark", "q",
    "s", "small", "span", "strike", "strong", "sub", "sup", "time", "u", "var",
];

/// Parse storage markup into a document.
pub fn parse_storage(source: &str) -> Result<Document, ParseError> {
    let markup = preprocess(source)?;
    let input = format!("{DOCUMENT_PREFIX}{markup}");
    let dom = html5ever::parse_document(RcDom::default(), Default::default()).one(input.as_str());
    let body = find_body(&dom.document)
        .ok_or_else(|| ParseError::confluence("markup produced no document body"))?;
    let children = body.children.borrow().clone();
    let nodes = fold_nodes(&children)?
        .into_iter()
        .map(|folded| folded.node)
        .collect();
    Ok(Document::new(nodes))
}

fn find_body(document: &Handle) -> Option<Handle> {
    let html = find_element(document, "html")?;
    find_element(&html, "body")
}

fn find_element(parent: &Handle, name: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| tag_name(child) == Some(name))
        .cloned()
}

/// A folded block and the nodes it was built from.
struct Folded {
    node: DocumentNode,
    origin: Vec<Handle>,
}

fn fold_nodes(nodes: &[Handle]) -> Result<Vec<Folded>, ParseError> {
    let mut folded = Vec::new();
    let mut run: Vec<Handle> = Vec::new();
    for node in nodes {
        if is_inline(node) {
            run.push(node.clone());
            continue;
        }
        flush_run(&mut run, &mut folded)?;
        if let Some(block) = fold_block(node)? {
            folded.push(Folded {
                node: block,
                origin: vec![node.clone()],
            });
        }
    }
    flush_run(&mut run, &mut folded)?;
    Ok(folded)
}

fn flush_run(run: &mut Vec<Handle>, folded: &mut Vec<Folded>) -> Result<(), ParseError> {
    if run.is_empty() {
        return Ok(());
    }
    let origin = std::mem::take(run);
    if let Some(node) = fold_run(&origin, true)? {
        folded.push(Folded { node, origin });
    }
    Ok(())
}

/// Blocks allowed inside list items, quotes, panels and expands.
fn fold_simple_blocks(nodes: &[Handle]) -> Result<Vec<SimpleBlock>, ParseError> {
    let mut blocks = Vec::new();
    for folded in fold_nodes(nodes)? {
        match SimpleBlock::try_from(folded.node) {
            Ok(block) => blocks.push(block),
            Err(rich) => {
                trace!(node = rich.type_name(), "block not allowed in a nested context");
                let mut raw = String::new();
                for origin in &folded.origin {
                    raw.push_str(&raw_markup(origin)?);
                }
                blocks.push(SimpleBlock::UnsupportedBlock(UnsupportedBlock::html(
                    raw,
                    SourceFormat::Confluence,
                )));
            }
        }
    }
    Ok(blocks)
}

/// A paragraph, or a lone image / opaque construct standing on its own.
fn fold_run(nodes: &[Handle], naked: bool) -> Result<Option<DocumentNode>, ParseError> {
    let significant: Vec<&Handle> = nodes.iter().filter(|n| !is_blank_text(n)).collect();
    if let [only] = significant.as_slice() {
        if let Some(image) = image_carrier(only) {
            return Ok(Some(DocumentNode::Image(image)));
        }
        if naked && attr(only, "data-cfm-opaque").is_some() {
            return Ok(Some(unsupported_block(only)?));
        }
    }
    let children = trim_block(fold_inlines(nodes)?);
    if children.is_empty() {
        return Ok(None);
    }
    Ok(Some(DocumentNode::Paragraph(Paragraph { children })))
}

fn fold_block(node: &Handle) -> Result<Option<DocumentNode>, ParseError> {
    let name = match &node.data {
        NodeData::Comment { contents } => {
            return Ok(Some(DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
                format!("<!--{}-->", &**contents),
                SourceFormat::Confluence,
            ))))
        }
        NodeData::Element { name, .. } => name.local.to_string(),
        _ => return Ok(None),
    };
    let children = node.children.borrow().clone();
    let block = match name.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => DocumentNode::Heading(Heading {
            level: name[1..].parse().unwrap_or(1),
            children: trim_block(fold_inlines(&children)?),
        }),
        "p" => return fold_run(&children, false),
        "pre" => DocumentNode::CodeBlock(CodeBlock {
            code: text_of(node),
            language: attr(node, "data-language").filter(|l| !l.is_empty()),
        }),
        "hr" => DocumentNode::ThematicBreak,
        "table" => match fold_table(node)? {
            Some(table) => DocumentNode::Table(table),
            None => unsupported_block(node)?,
        },
        "ul" if attr(node, "data-cfm-tasklist").is_some() => {
            DocumentNode::TaskList(fold_tasks(node))
        }
        "ul" | "ol" => match fold_list(node, name == "ol")? {
            Some(list) => DocumentNode::List(list),
            None => unsupported_block(node)?,
        },
        "blockquote" => DocumentNode::BlockQuote(BlockQuote {
            children: fold_simple_blocks(&children)?,
        }),
        "div" => match (attr(node, "data-cfm-macro").as_deref(), attr(node, "data-cfm-layout")) {
            (Some("panel"), _) => DocumentNode::InfoPanel(InfoPanel {
                panel_type: attr(node, "data-panel-type").unwrap_or_default(),
                title: attr(node, "data-title").filter(|t| !t.is_empty()),
                children: fold_simple_blocks(&children)?,
            }),
            (Some("toc"), _) => match fold_toc(node) {
                Some(toc) => DocumentNode::TocMacro(toc),
                None => unsupported_block(node)?,
            },
            (_, Some(marker)) => {
                let carrier = Carrier::from_layout_marker(&marker)
                    .map_err(|e| ParseError::confluence(e.to_string()).with_raw(marker.clone()))?;
                DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
                    carrier.encode(),
                    SourceFormat::Confluence,
                ))
            }
            _ => unsupported_block(node)?,
        },
        "details" if attr(node, "data-cfm-macro").as_deref() == Some("expand") => {
            let body: Vec<Handle> = children
                .into_iter()
                .filter(|child| tag_name(child) != Some("summary"))
                .collect();
            DocumentNode::ExpandMacro(ExpandMacro {
                title: attr(node, "data-title").filter(|t| !t.is_empty()),
                children: fold_simple_blocks(&body)?,
            })
        }
        other => {
            debug!(element = other, "no block mapping, keeping markup");
            unsupported_block(node)?
        }
    };
    Ok(Some(block))
}

fn unsupported_block(node: &Handle) -> Result<DocumentNode, ParseError> {
    Ok(DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
        raw_markup(node)?,
        SourceFormat::Confluence,
    )))
}

fn fold_toc(node: &Handle) -> Option<TocMacro> {
    let level = |key: &str| match attr(node, key) {
        None => Some(None),
        Some(value) => value.trim().parse::<u8>().ok().map(Some),
    };
    Some(TocMacro {
        min_level: level("data-min-level")?,
        max_level: level("data-max-level")?,
    })
}

fn fold_tasks(node: &Handle) -> TaskList {
    let children = node
        .children
        .borrow()
        .iter()
        .filter(|child| tag_name(child) == Some("li"))
        .map(|item| {
            let text = text_of(item);
            TaskItem {
                id: attr(item, "data-task-id").unwrap_or_default(),
                uuid: attr(item, "data-task-uuid").unwrap_or_default(),
                status: TaskStatus::parse(&attr(item, "data-task-status").unwrap_or_default()),
                body: if text.is_empty() {
                    Vec::new()
                } else {
                    vec![Inline::text(text)]
                },
            }
        })
        .collect();
    TaskList { children }
}

/// `None` when the list holds something other than items.
fn fold_list(node: &Handle, ordered: bool) -> Result<Option<List>, ParseError> {
    let mut items = Vec::new();
    for child in node.children.borrow().iter() {
        if is_blank_text(child) {
            continue;
        }
        if tag_name(child) != Some("li") {
            return Ok(None);
        }
        let grandchildren = child.children.borrow().clone();
        items.push(ListItem {
            checked: None,
            children: fold_simple_blocks(&grandchildren)?,
        });
    }
    let start = if ordered {
        attr(node, "start")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|s| *s != 1)
    } else {
        None
    };
    Ok(Some(List {
        ordered,
        start,
        children: items,
    }))
}

/// `None` when the table uses structure the AST cannot hold (captions, merged cells).
fn fold_table(node: &Handle) -> Result<Option<Table>, ParseError> {
    let mut rows: Vec<Handle> = Vec::new();
    for section in node.children.borrow().iter() {
        if is_blank_text(section) {
            continue;
        }
        match tag_name(section) {
            Some("thead" | "tbody" | "tfoot") => {
                for row in section.children.borrow().iter() {
                    match tag_name(row) {
                        Some("tr") => rows.push(row.clone()),
                        _ if is_blank_text(row) => {}
                        _ => return Ok(None),
                    }
                }
            }
            Some("tr") => rows.push(section.clone()),
            Some("colgroup") => trace!("dropping table column widths"),
            _ => return Ok(None),
        }
    }

    let mut folded = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut cells = Vec::new();
        for cell in row.children.borrow().iter() {
            if is_blank_text(cell) {
                continue;
            }
            let is_header = match tag_name(cell) {
                Some("th") => true,
                Some("td") => false,
                _ => return Ok(None),
            };
            if is_spanning(cell) {
                return Ok(None);
            }
            cells.push(TableCell {
                is_header,
                children: fold_cell(cell)?,
            });
        }
        folded.push(TableRow { cells });
    }

    let mut rows = folded.into_iter();
    let mut header = None;
    let mut body = Vec::new();
    if let Some(first) = rows.next() {
        if !first.cells.is_empty() && first.cells.iter().all(|c| c.is_header) {
            header = Some(first);
        } else {
            body.push(first);
        }
    }
    body.extend(rows);
    Ok(Some(Table { header, rows: body }))
}

fn is_spanning(cell: &Handle) -> bool {
    ["colspan", "rowspan"].iter().any(|key| {
        attr(cell, key)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .is_some_and(|span| span > 1)
    })
}

fn fold_cell(cell: &Handle) -> Result<Vec<Inline>, ParseError> {
    let children = cell.children.borrow().clone();
    let significant: Vec<&Handle> = children.iter().filter(|n| !is_blank_text(n)).collect();
    if let [only] = significant.as_slice() {
        if tag_name(only) == Some("p") {
            let inner = only.children.borrow().clone();
            return Ok(trim_block(fold_inlines(&inner)?));
        }
    }
    let mut inlines = Vec::new();
    for child in &children {
        if is_inline(child) {
            push_inline(child, &mut inlines)?;
        } else {
            inlines.push(Inline::unsupported(raw_markup(child)?, SourceFormat::Confluence));
        }
    }
    Ok(trim_block(normalize(inlines)))
}

fn fold_inlines(nodes: &[Handle]) -> Result<Vec<Inline>, ParseError> {
    let mut inlines = Vec::new();
    for node in nodes {
        push_inline(node, &mut inlines)?;
    }
    Ok(normalize(inlines))
}

/// Merged text with whitespace runs collapsed across node boundaries.
fn normalize(inlines: Vec<Inline>) -> Vec<Inline> {
    merge_text(inlines)
        .into_iter()
        .map(|inline| match inline {
            Inline::Text { value } => Inline::text(collapse_whitespace(&value)),
            other => other,
        })
        .collect()
}

fn push_inline(node: &Handle, out: &mut Vec<Inline>) -> Result<(), ParseError> {
    let name = match &node.data {
        NodeData::Text { contents } => {
            out.push(Inline::text(collapse_whitespace(&contents.borrow())));
            return Ok(());
        }
        NodeData::Comment { contents } => {
            out.push(Inline::unsupported(
                format!("<!--{}-->", &**contents),
                SourceFormat::Confluence,
            ));
            return Ok(());
        }
        NodeData::Element { name, .. } => name.local.to_string(),
        _ => return Ok(()),
    };
    let children = node.children.borrow().clone();
    match name.as_str() {
        "strong" | "b" => push_hoisted(out, base_children(&children)?, |children| {
            Inline::Strong { children }
        }),
        "em" | "i" => push_hoisted(out, base_children(&children)?, |children| {
            Inline::Emphasis { children }
        }),
        "s" | "del" | "strike" => push_hoisted(out, base_children(&children)?, |children| {
            Inline::Strikethrough { children }
        }),
        "code" if has_element_children(node) => out.push(unsupported_inline(node)?),
        "code" => {
            let value = text_of(node).replace('\n', " ");
            if !value.is_empty() {
                out.push(Inline::InlineCode { value });
            }
        }
        "a" => out.push(fold_link(node, &children)?),
        "br" => out.push(Inline::LineBreak),
        "span" => fold_span(node, &children, out)?,
        "u" => out.push(Inline::Underline {
            children: base_children(&children)?,
        }),
        "sub" => out.push(Inline::Subscript {
            children: base_children(&children)?,
        }),
        "sup" => out.push(Inline::Superscript {
            children: base_children(&children)?,
        }),
        "time" => out.push(Inline::DateTime {
            datetime: attr(node, "datetime").unwrap_or_default(),
        }),
        other => {
            trace!(element = other, "no inline mapping, keeping markup");
            out.push(unsupported_inline(node)?);
        }
    }
    Ok(())
}

/// Pushes a wrapper with its edge whitespace moved outside; empty wrappers vanish.
fn push_hoisted<F>(out: &mut Vec<Inline>, children: Vec<BaseInline>, wrap: F)
where
    F: FnOnce(Vec<BaseInline>) -> Inline,
{
    let (leading, children, trailing) = hoist_edge_whitespace(children);
    if leading {
        out.push(Inline::text(" "));
    }
    if !children.is_empty() {
        out.push(wrap(children));
    }
    if trailing {
        out.push(Inline::text(" "));
    }
}

fn fold_link(node: &Handle, children: &[Handle]) -> Result<Inline, ParseError> {
    if let Some(appearance) = attr(node, "data-card-appearance") {
        if has_element_children(node) {
            return unsupported_inline(node);
        }
        let carrier = Carrier::SmartLink {
            href: attr(node, "href").unwrap_or_default(),
            appearance,
            label: text_of(node),
        };
        return Ok(Inline::unsupported(carrier.encode(), SourceFormat::Confluence));
    }
    match attr(node, "href") {
        Some(href) => Ok(Inline::Link {
            href,
            title: attr(node, "title").filter(|t| !t.is_empty()),
            children: base_children(children)?,
        }),
        None => unsupported_inline(node),
    }
}

fn fold_span(node: &Handle, children: &[Handle], out: &mut Vec<Inline>) -> Result<(), ParseError> {
    if attr(node, "data-cfm-emoticon").is_some() {
        out.push(Inline::Emoticon {
            shortname: attr(node, "data-shortname").unwrap_or_default(),
            emoji_id: attr(node, "data-emoji-id").unwrap_or_default(),
            fallback: text_of(node),
        });
    } else if attr(node, "data-cfm-mention").is_some() {
        out.push(Inline::UserMention {
            account_id: attr(node, "data-account-id").unwrap_or_default(),
        });
    } else if attr(node, "data-cfm-macro").as_deref() == Some("status") {
        let title = attr(node, "data-title").unwrap_or_default();
        if title.is_empty() {
            out.push(unsupported_inline(node)?);
        } else {
            out.push(Inline::Status {
                title,
                color: attr(node, "data-color").unwrap_or_default(),
            });
        }
    } else if attr_count(node) == 0 {
        for child in children {
            push_inline(child, out)?;
        }
    } else if attr_count(node) == 1 {
        match attr(node, "style").as_deref().and_then(single_declaration) {
            Some(("color", color)) => out.push(Inline::ColoredText {
                color: color.to_string(),
                children: base_children(children)?,
            }),
            Some(("background-color", color)) => out.push(Inline::Highlight {
                background_color: color.to_string(),
                children: base_children(children)?,
            }),
            _ => out.push(unsupported_inline(node)?),
        }
    } else {
        out.push(unsupported_inline(node)?);
    }
    Ok(())
}

/// `color: red;` → `("color", "red")`; `None` for anything with more than one declaration.
pub(crate) fn single_declaration(style: &str) -> Option<(&str, &str)> {
    let style = style.trim();
    let style = style.strip_suffix(';').unwrap_or(style);
    if style.contains(';') {
        return None;
    }
    let (property, value) = style.split_once(':')?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some((property.trim(), value))
}

fn base_children(children: &[Handle]) -> Result<Vec<BaseInline>, ParseError> {
    demote(fold_inlines(children)?, SourceFormat::Confluence, render_inline)
        .map_err(|e| ParseError::confluence(e.to_string()))
}

fn unsupported_inline(node: &Handle) -> Result<Inline, ParseError> {
    Ok(Inline::unsupported(raw_markup(node)?, SourceFormat::Confluence))
}

fn image_carrier(node: &Handle) -> Option<Image> {
    if tag_name(node) != Some("img") || attr(node, "data-cfm-image").is_none() {
        return None;
    }
    let field = |key: &str| attr(node, key).filter(|v| !v.is_empty());
    let image = Image {
        src: field("src"),
        alt: field("alt"),
        title: field("title"),
        align: field("data-align"),
        width: field("data-width"),
        attachment: field("data-attachment").map(|filename| Attachment {
            filename,
            version: field("data-attachment-version"),
        }),
    };
    if image.src.is_none() && image.attachment.is_none() {
        return None;
    }
    Some(image)
}

/// The storage markup a node came from, with every carrier inside restored.
fn raw_markup(node: &Handle) -> Result<String, ParseError> {
    if let Some(encoded) = attr(node, RAW_ATTR) {
        return decode_raw(&encoded);
    }
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    html5ever::serialize(&mut bytes, &SerializableHandle::from(node.clone()), opts)
        .map_err(|e| ParseError::confluence(format!("cannot re-serialize markup: {e}")))?;
    let markup = String::from_utf8(bytes)
        .map_err(|e| ParseError::confluence(format!("re-serialized markup is not UTF-8: {e}")))?;
    restore_originals(&markup)
}

fn tag_name(node: &Handle) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

fn attr(node: &Handle, key: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| &*a.name.local == key)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

fn attr_count(node: &Handle) -> usize {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs.borrow().len(),
        _ => 0,
    }
}

fn is_inline(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { .. } => true,
        NodeData::Element { name, .. } => INLINE_ELEMENTS.contains(&&*name.local),
        _ => false,
    }
}

fn is_blank_text(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { contents } => contents
            .borrow()
            .chars()
            .all(crate::common::text::is_html_whitespace),
        _ => false,
    }
}

fn has_element_children(node: &Handle) -> bool {
    node.children
        .borrow()
        .iter()
        .any(|child| matches!(child.data, NodeData::Element { .. }))
}

fn text_of(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    match &node.data {
        NodeData::Text { contents } => out.push_str(&contents.borrow()),
        _ => {
            for child in node.children.borrow().iter() {
                collect_text(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Vec<DocumentNode> {
        parse_storage(source).unwrap().children
    }

    #[test]
    fn paragraph_whitespace_is_normalized() {
        let nodes = parse("<p>  Hello <strong> big </strong>\n world<br/> next </p>");
        assert_eq!(
            nodes,
            vec![DocumentNode::Paragraph(Paragraph {
                children: vec![
                    Inline::text("Hello "),
                    Inline::Strong {
                        children: vec![BaseInline::text("big")]
                    },
                    Inline::text(" world"),
                    Inline::LineBreak,
                    Inline::text("next"),
                ]
            })]
        );
    }

    #[test]
    fn empty_paragraphs_are_dropped() {
        assert!(parse("<p> </p><p><br/></p>").is_empty());
    }

    #[test]
    fn code_macro_keeps_text_and_language() {
        let nodes = parse(r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">rust</ac:parameter><ac:plain-text-body><![CDATA[fn main() {
    let a = 1 < 2;
}]]></ac:plain-text-body></ac:structured-macro>"#);
        assert_eq!(
            nodes,
            vec![DocumentNode::CodeBlock(CodeBlock {
                code: "fn main() {\n    let a = 1 < 2;\n}".into(),
                language: Some("rust".into()),
            })]
        );
    }

    #[test]
    fn lone_image_paragraph_is_an_image_block() {
        let nodes = parse(
            r#"<p><ac:image ac:align="center" ac:width="300"><ri:attachment ri:filename="shot.png" ri:version-at-save="2"/></ac:image></p>"#,
        );
        assert_eq!(
            nodes,
            vec![DocumentNode::Image(Image {
                align: Some("center".into()),
                width: Some("300".into()),
                attachment: Some(Attachment {
                    filename: "shot.png".into(),
                    version: Some("2".into()),
                }),
                ..Image::default()
            })]
        );
    }

    #[test]
    fn inline_carriers_map_to_typed_nodes() {
        let nodes = parse(concat!(
            r#"<p><ac:emoticon ac:name="smile" ac:emoji-shortname=":smile:" ac:emoji-id="1f604" ac:emoji-fallback="😄"/> "#,
            r#"<ac:link><ri:user ri:account-id="abc123"/></ac:link> "#,
            r#"<ac:structured-macro ac:name="status"><ac:parameter ac:name="colour">Green</ac:parameter><ac:parameter ac:name="title">DONE</ac:parameter></ac:structured-macro> "#,
            r#"<time datetime="2024-05-01"/></p>"#
        ));
        let DocumentNode::Paragraph(paragraph) = &nodes[0] else {
            panic!("expected a paragraph, got {nodes:?}");
        };
        assert_eq!(
            paragraph.children,
            vec![
                Inline::Emoticon {
                    shortname: ":smile:".into(),
                    emoji_id: "1f604".into(),
                    fallback: "😄".into(),
                },
                Inline::text(" "),
                Inline::UserMention {
                    account_id: "abc123".into()
                },
                Inline::text(" "),
                Inline::Status {
                    title: "DONE".into(),
                    color: "Green".into()
                },
                Inline::text(" "),
                Inline::DateTime {
                    datetime: "2024-05-01".into()
                },
            ]
        );
    }

    #[test]
    fn styled_spans_map_to_wrappers() {
        let nodes = parse(
            r#"<p><span style="color: rgb(255,0,0);">red</span><span style="background-color: #ff0;">lit</span><span class="x">odd</span></p>"#,
        );
        let DocumentNode::Paragraph(paragraph) = &nodes[0] else {
            panic!("expected a paragraph");
        };
        assert_eq!(
            paragraph.children[0],
            Inline::ColoredText {
                color: "rgb(255,0,0)".into(),
                children: vec![BaseInline::text("red")]
            }
        );
        assert_eq!(
            paragraph.children[1],
            Inline::Highlight {
                background_color: "#ff0".into(),
                children: vec![BaseInline::text("lit")]
            }
        );
        assert_eq!(
            paragraph.children[2],
            Inline::unsupported(r#"<span class="x">odd</span>"#, SourceFormat::Confluence)
        );
    }

    #[test]
    fn rich_inline_inside_link_is_demoted_to_markup() {
        let nodes = parse(r#"<p><a href="https://x.test"><strong>bold</strong> link</a></p>"#);
        assert_eq!(
            nodes,
            vec![DocumentNode::Paragraph(Paragraph {
                children: vec![Inline::Link {
                    href: "https://x.test".into(),
                    title: None,
                    children: vec![
                        BaseInline::UnsupportedInline {
                            raw: "<strong>bold</strong>".into(),
                            source: SourceFormat::Confluence,
                        },
                        BaseInline::text(" link"),
                    ],
                }]
            })]
        );
    }

    #[test]
    fn table_with_header_row() {
        let nodes = parse(
            "<table><colgroup><col/></colgroup><tbody><tr><th><p>Name</p></th><th>Age</th></tr><tr><td>Ann</td><td><p>42</p></td></tr></tbody></table>",
        );
        let cell = |is_header, text: &str| TableCell {
            is_header,
            children: vec![Inline::text(text)],
        };
        assert_eq!(
            nodes,
            vec![DocumentNode::Table(Table {
                header: Some(TableRow {
                    cells: vec![cell(true, "Name"), cell(true, "Age")]
                }),
                rows: vec![TableRow {
                    cells: vec![cell(false, "Ann"), cell(false, "42")]
                }],
            })]
        );
    }

    #[test]
    fn merged_cells_keep_the_table_verbatim() {
        let src = r#"<table><tbody><tr><td colspan="2">wide</td></tr></tbody></table>"#;
        assert_eq!(
            parse(src),
            vec![DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
                src,
                SourceFormat::Confluence
            ))]
        );
    }

    #[test]
    fn nested_list_is_kept_as_markup() {
        let nodes = parse("<ol start=\"1\"><li>one<ul><li>deep</li></ul></li></ol>");
        assert_eq!(
            nodes,
            vec![DocumentNode::List(List {
                ordered: true,
                start: None,
                children: vec![ListItem {
                    checked: None,
                    children: vec![
                        SimpleBlock::Paragraph(Paragraph {
                            children: vec![Inline::text("one")]
                        }),
                        SimpleBlock::UnsupportedBlock(UnsupportedBlock::html(
                            "<ul><li>deep</li></ul>",
                            SourceFormat::Confluence
                        )),
                    ],
                }],
            })]
        );
    }

    #[test]
    fn task_list_parses_to_items() {
        let nodes = parse("<ac:task-list><ac:task><ac:task-id>1</ac:task-id><ac:task-status>incomplete</ac:task-status><ac:task-body>Buy milk</ac:task-body></ac:task></ac:task-list>");
        assert_eq!(
            nodes,
            vec![DocumentNode::TaskList(TaskList {
                children: vec![TaskItem {
                    id: "1".into(),
                    uuid: String::new(),
                    status: TaskStatus::Incomplete,
                    body: vec![Inline::text("Buy milk")],
                }]
            })]
        );
    }

    #[test]
    fn panel_and_expand_macros() {
        let nodes = parse(concat!(
            r#"<ac:structured-macro ac:name="warning"><ac:parameter ac:name="title">Careful</ac:parameter><ac:rich-text-body><p>Hot</p></ac:rich-text-body></ac:structured-macro>"#,
            r#"<ac:structured-macro ac:name="expand"><ac:parameter ac:name="title">More</ac:parameter><ac:rich-text-body><p>Hidden</p></ac:rich-text-body></ac:structured-macro>"#,
            r#"<ac:structured-macro ac:name="toc"><ac:parameter ac:name="maxLevel">3</ac:parameter></ac:structured-macro>"#,
        ));
        let para = |text: &str| {
            SimpleBlock::Paragraph(Paragraph {
                children: vec![Inline::text(text)],
            })
        };
        assert_eq!(
            nodes,
            vec![
                DocumentNode::InfoPanel(InfoPanel {
                    panel_type: "warning".into(),
                    title: Some("Careful".into()),
                    children: vec![para("Hot")],
                }),
                DocumentNode::ExpandMacro(ExpandMacro {
                    title: Some("More".into()),
                    children: vec![para("Hidden")],
                }),
                DocumentNode::TocMacro(TocMacro {
                    min_level: None,
                    max_level: Some(3),
                }),
            ]
        );
    }

    #[test]
    fn unknown_macro_keeps_original_markup() {
        let src = r#"<ac:structured-macro ac:name="jira"><ac:parameter ac:name="key">ABC-1</ac:parameter></ac:structured-macro>"#;
        assert_eq!(
            parse(src),
            vec![DocumentNode::UnsupportedBlock(UnsupportedBlock::html(
                src,
                SourceFormat::Confluence
            ))]
        );
    }

    #[test]
    fn layout_and_decisions_become_carrier_comments() {
        let nodes = parse(r#"<ac:layout><ac:layout-section ac:type="single"><ac:layout-cell><p>A</p></ac:layout-cell></ac:layout-section></ac:layout>"#);
        let comments: Vec<_> = nodes
            .iter()
            .filter_map(|n| match n {
                DocumentNode::UnsupportedBlock(block) => block.raw_html.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(
            comments,
            vec![
                "<!-- layout-start -->",
                "<!-- layout-section:0;single;;;1 -->",
                "<!-- layout-cell:0;0 -->",
                "<!-- layout-section-end:0 -->",
                "<!-- layout-end -->",
            ]
        );
        assert_eq!(nodes.len(), 6);
    }

    #[test]
    fn smart_link_is_carried_as_comment() {
        let nodes = parse(
            r#"<p><a href="https://x.test/1" data-card-appearance="inline">https://x.test/1</a></p>"#,
        );
        assert_eq!(
            nodes,
            vec![DocumentNode::Paragraph(Paragraph {
                children: vec![Inline::unsupported(
                    "<!-- smartlink:https://x.test/1;inline -->",
                    SourceFormat::Confluence
                )]
            })]
        );
    }

    #[test]
    fn smart_link_keeps_its_label() {
        let nodes = parse(
            r#"<p><a href="https://x.test/p" data-card-appearance="inline">Custom title</a></p>"#,
        );
        assert_eq!(
            nodes,
            vec![DocumentNode::Paragraph(Paragraph {
                children: vec![Inline::unsupported(
                    "<!-- smartlink:https://x.test/p;inline;Custom title -->",
                    SourceFormat::Confluence
                )]
            })]
        );
    }

    #[test]
    fn marked_up_code_is_kept_as_markup() {
        let nodes = parse("<p><code>a<strong>b</strong></code></p>");
        assert_eq!(
            nodes,
            vec![DocumentNode::Paragraph(Paragraph {
                children: vec![Inline::unsupported(
                    "<code>a<strong>b</strong></code>",
                    SourceFormat::Confluence
                )]
            })]
        );
    }

    #[test]
    fn unclosed_macro_is_a_parse_error() {
        let err = parse_storage(r#"<p>x</p><ac:structured-macro ac:name="info"><p>y</p>"#)
            .unwrap_err();
        assert_eq!(err.format, SourceFormat::Confluence);
        assert!(err.position.is_some());
    }
}

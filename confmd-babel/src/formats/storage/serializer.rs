//! Storage serialization (Document → storage markup)
//!
//! The structural mirror of the parser: every typed node is written back as the vendor markup
//! the preprocessor would turn into the same carrier, so parse → serialize → parse is stable.
//! Unsupported storage payloads are written verbatim; layout and decision carrier comments are
//! re-synthesized into their `ac:` markup.

use super::preprocess::PANEL_MACROS;
use super::scanner::html_escape;
use crate::ast::{
    BaseInline, CodeBlock, Document, DocumentNode, ExpandMacro, Heading, Image, InfoPanel, Inline,
    List, SimpleBlock, SourceFormat, Table, TableRow, TaskItem, TaskList, TaskStatus, TocMacro,
    UnsupportedBlock,
};
use crate::common::codec::{Carrier, Decision, LayoutSection};
use crate::error::SerializeError;
use crate::formats::markdown::parse_markdown;
use tracing::{debug, warn};

/// Options for storage serialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOptions {
    /// Write panel types other than info/note/warning/tip as ADF panels. When off they fall
    /// back to the `info` macro.
    pub adf_panels: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        StorageOptions { adf_panels: true }
    }
}

/// Serialize a document to storage markup with default options.
pub fn serialize_storage(doc: &Document) -> Result<String, SerializeError> {
    serialize_storage_with_options(doc, &StorageOptions::default())
}

pub fn serialize_storage_with_options(
    doc: &Document,
    options: &StorageOptions,
) -> Result<String, SerializeError> {
    if let Some(raw) = &doc.raw_confluence {
        debug!("writing embedded storage markup verbatim");
        return Ok(raw.clone());
    }
    let mut writer = StorageWriter::new(options, false);
    for node in &doc.children {
        writer.block(node)?;
    }
    writer.finish()
}

/// Storage markup of a single inline node.
pub fn render_inline(inline: &Inline) -> Result<String, SerializeError> {
    InlineRenderer { reparsed: false }.render(inline)
}

fn error(node_type: &str, message: impl Into<String>) -> SerializeError {
    SerializeError::new(SourceFormat::Confluence, node_type, message)
}

#[derive(Debug, Default)]
struct LayoutState {
    open: bool,
    section: bool,
    cell: bool,
}

struct StorageWriter<'a> {
    options: &'a StorageOptions,
    inline: InlineRenderer,
    layout: LayoutState,
    out: String,
}

impl<'a> StorageWriter<'a> {
    /// `reparsed` marks a writer working on Markdown that was already re-parsed once.
    fn new(options: &'a StorageOptions, reparsed: bool) -> Self {
        StorageWriter {
            options,
            inline: InlineRenderer { reparsed },
            layout: LayoutState::default(),
            out: String::new(),
        }
    }

    fn finish(mut self) -> Result<String, SerializeError> {
        if self.layout.open {
            warn!("layout was never closed, closing it at the end of the page");
            self.layout_end();
        }
        Ok(self.out)
    }

    fn push(&mut self, markup: &str) {
        self.out.push_str(markup);
    }

    fn inlines(&mut self, inlines: &[Inline]) -> Result<(), SerializeError> {
        let markup = self.inline.render_all(inlines)?;
        self.push(&markup);
        Ok(())
    }

    fn block(&mut self, node: &DocumentNode) -> Result<(), SerializeError> {
        match node {
            DocumentNode::Heading(heading) => self.heading(heading),
            DocumentNode::Paragraph(paragraph) => {
                self.push("<p>");
                self.inlines(&paragraph.children)?;
                self.push("</p>");
                Ok(())
            }
            DocumentNode::CodeBlock(code) => {
                self.code_block(code);
                Ok(())
            }
            DocumentNode::ThematicBreak => {
                self.push("<hr />");
                Ok(())
            }
            DocumentNode::Image(image) => self.image(image),
            DocumentNode::Table(table) => self.table(table),
            DocumentNode::List(list) => self.list(list),
            DocumentNode::BlockQuote(quote) => {
                self.push("<blockquote>");
                self.simple_blocks(&quote.children)?;
                self.push("</blockquote>");
                Ok(())
            }
            DocumentNode::UnsupportedBlock(block) => self.unsupported(block),
            DocumentNode::InfoPanel(panel) => self.panel(panel),
            DocumentNode::ExpandMacro(expand) => self.expand(expand),
            DocumentNode::TocMacro(toc) => {
                self.toc(toc);
                Ok(())
            }
            DocumentNode::TaskList(tasks) => self.task_list(tasks),
        }
    }

    fn simple_blocks(&mut self, blocks: &[SimpleBlock]) -> Result<(), SerializeError> {
        for block in blocks {
            match block {
                SimpleBlock::Heading(heading) => self.heading(heading)?,
                SimpleBlock::Paragraph(paragraph) => {
                    self.push("<p>");
                    self.inlines(&paragraph.children)?;
                    self.push("</p>");
                }
                SimpleBlock::CodeBlock(code) => self.code_block(code),
                SimpleBlock::ThematicBreak => self.push("<hr />"),
                SimpleBlock::Image(image) => self.image(image)?,
                SimpleBlock::Table(table) => self.table(table)?,
                SimpleBlock::UnsupportedBlock(block) => self.unsupported(block)?,
            }
        }
        Ok(())
    }

    fn heading(&mut self, heading: &Heading) -> Result<(), SerializeError> {
        if !(1..=6).contains(&heading.level) {
            return Err(error(
                "heading",
                format!("level {} is outside 1-6", heading.level),
            ));
        }
        self.push(&format!("<h{}>", heading.level));
        self.inlines(&heading.children)?;
        self.push(&format!("</h{}>", heading.level));
        Ok(())
    }

    fn code_block(&mut self, code: &CodeBlock) {
        self.push(r#"<ac:structured-macro ac:name="code">"#);
        if let Some(language) = &code.language {
            self.push(&parameter("language", language));
        }
        self.push("<ac:plain-text-body><![CDATA[");
        self.push(&code.code.replace("]]>", "]]]]><![CDATA[>"));
        self.push("]]></ac:plain-text-body></ac:structured-macro>");
    }

    fn image(&mut self, image: &Image) -> Result<(), SerializeError> {
        let target = match (&image.attachment, &image.src) {
            (Some(attachment), _) => {
                let mut target = format!(
                    r#"<ri:attachment ri:filename="{}""#,
                    html_escape(&attachment.filename)
                );
                if let Some(version) = &attachment.version {
                    target.push_str(&format!(r#" ri:version-at-save="{}""#, html_escape(version)));
                }
                target + " />"
            }
            (None, Some(src)) => format!(r#"<ri:url ri:value="{}" />"#, html_escape(src)),
            (None, None) => return Err(error("image", "neither a source nor an attachment")),
        };
        self.push("<ac:image");
        for (key, value) in [
            ("ac:align", &image.align),
            ("ac:width", &image.width),
            ("ac:alt", &image.alt),
            ("ac:title", &image.title),
        ] {
            if let Some(value) = value {
                self.push(&format!(r#" {key}="{}""#, html_escape(value)));
            }
        }
        self.push(">");
        self.push(&target);
        self.push("</ac:image>");
        Ok(())
    }

    fn table(&mut self, table: &Table) -> Result<(), SerializeError> {
        self.push("<table><tbody>");
        for row in table.header.iter().chain(&table.rows) {
            self.table_row(row)?;
        }
        self.push("</tbody></table>");
        Ok(())
    }

    fn table_row(&mut self, row: &TableRow) -> Result<(), SerializeError> {
        self.push("<tr>");
        for cell in &row.cells {
            let tag = if cell.is_header { "th" } else { "td" };
            self.push(&format!("<{tag}>"));
            self.inlines(&cell.children)?;
            self.push(&format!("</{tag}>"));
        }
        self.push("</tr>");
        Ok(())
    }

    fn list(&mut self, list: &List) -> Result<(), SerializeError> {
        if is_task_list(list) {
            return self.checkbox_list(list);
        }
        let tag = if list.ordered { "ol" } else { "ul" };
        match list.start {
            Some(start) if list.ordered && start != 1 => {
                self.push(&format!(r#"<ol start="{start}">"#))
            }
            _ => self.push(&format!("<{tag}>")),
        }
        for item in &list.children {
            self.push("<li>");
            self.push(checkbox_marker(item.checked));
            match item.children.as_slice() {
                [SimpleBlock::Paragraph(paragraph)] => self.inlines(&paragraph.children)?,
                blocks => self.simple_blocks(blocks)?,
            }
            self.push("</li>");
        }
        self.push(&format!("</{tag}>"));
        Ok(())
    }

    /// Checkbox items become page tasks, numbered in document order.
    fn checkbox_list(&mut self, list: &List) -> Result<(), SerializeError> {
        let tasks = list
            .children
            .iter()
            .enumerate()
            .map(|(index, item)| TaskItem {
                id: (index + 1).to_string(),
                uuid: String::new(),
                status: if item.checked == Some(true) {
                    TaskStatus::Complete
                } else {
                    TaskStatus::Incomplete
                },
                body: match item.children.as_slice() {
                    [SimpleBlock::Paragraph(paragraph)] => paragraph.children.clone(),
                    _ => Vec::new(),
                },
            })
            .collect();
        self.task_list(&TaskList { children: tasks })
    }

    fn task_list(&mut self, tasks: &TaskList) -> Result<(), SerializeError> {
        self.push("<ac:task-list>");
        for task in &tasks.children {
            self.push(&format!(
                "<ac:task><ac:task-id>{}</ac:task-id>",
                html_escape(&task.id)
            ));
            if !task.uuid.is_empty() {
                self.push(&format!(
                    "<ac:task-uuid>{}</ac:task-uuid>",
                    html_escape(&task.uuid)
                ));
            }
            self.push(&format!(
                "<ac:task-status>{}</ac:task-status><ac:task-body>",
                task.status.as_str()
            ));
            self.inlines(&task.body)?;
            self.push("</ac:task-body></ac:task>");
        }
        self.push("</ac:task-list>");
        Ok(())
    }

    fn panel(&mut self, panel: &InfoPanel) -> Result<(), SerializeError> {
        if panel.panel_type.is_empty() {
            return Err(error("infoPanel", "panel type is empty"));
        }
        let classic = PANEL_MACROS.contains(&panel.panel_type.as_str());
        if !classic && self.options.adf_panels {
            self.push(r#"<ac:adf-extension><ac:adf-node type="panel">"#);
            self.push(&format!(
                r#"<ac:adf-attribute key="panel-type">{}</ac:adf-attribute><ac:adf-content>"#,
                html_escape(&panel.panel_type)
            ));
            if let Some(title) = &panel.title {
                self.push(&format!("<p><strong>{}</strong></p>", html_escape(title)));
            }
            self.simple_blocks(&panel.children)?;
            self.push("</ac:adf-content></ac:adf-node></ac:adf-extension>");
            return Ok(());
        }
        let name = if classic {
            panel.panel_type.as_str()
        } else {
            debug!(panel_type = %panel.panel_type, "writing panel as an info macro");
            "info"
        };
        self.push(&format!(r#"<ac:structured-macro ac:name="{name}">"#));
        if let Some(title) = &panel.title {
            self.push(&parameter("title", title));
        }
        self.push("<ac:rich-text-body>");
        self.simple_blocks(&panel.children)?;
        self.push("</ac:rich-text-body></ac:structured-macro>");
        Ok(())
    }

    fn expand(&mut self, expand: &ExpandMacro) -> Result<(), SerializeError> {
        self.push(r#"<ac:structured-macro ac:name="expand">"#);
        if let Some(title) = &expand.title {
            self.push(&parameter("title", title));
        }
        self.push("<ac:rich-text-body>");
        self.simple_blocks(&expand.children)?;
        self.push("</ac:rich-text-body></ac:structured-macro>");
        Ok(())
    }

    fn toc(&mut self, toc: &TocMacro) {
        self.push(r#"<ac:structured-macro ac:name="toc">"#);
        if let Some(min) = toc.min_level {
            self.push(&parameter("minLevel", &min.to_string()));
        }
        if let Some(max) = toc.max_level {
            self.push(&parameter("maxLevel", &max.to_string()));
        }
        self.push("</ac:structured-macro>");
    }

    fn unsupported(&mut self, block: &UnsupportedBlock) -> Result<(), SerializeError> {
        match (&block.raw_html, &block.raw_markdown) {
            (Some(raw), _) => match Carrier::decode(raw) {
                Some(Ok(carrier)) if carrier.kind().is_verbatim() => self.carrier(carrier),
                _ => {
                    self.push(raw);
                    Ok(())
                }
            },
            (None, Some(raw)) => self.markdown_block(raw),
            (None, None) => Err(error("unsupportedBlock", "no payload to write")),
        }
    }

    /// Re-synthesizes storage markup from a verbatim carrier comment.
    fn carrier(&mut self, carrier: Carrier) -> Result<(), SerializeError> {
        match carrier {
            Carrier::LayoutStart => {
                if self.layout.open {
                    return Err(error("unsupportedBlock", "layout started inside a layout"));
                }
                self.layout.open = true;
                self.push("<ac:layout>");
            }
            Carrier::LayoutSection(section) => {
                if !self.layout.open {
                    return Err(error("unsupportedBlock", "layout section outside a layout"));
                }
                self.close_section();
                self.layout_section(&section);
            }
            Carrier::LayoutCell { .. } => {
                if !self.layout.section {
                    return Err(error("unsupportedBlock", "layout cell outside a section"));
                }
                self.close_cell();
                self.layout.cell = true;
                self.push("<ac:layout-cell>");
            }
            Carrier::LayoutSectionEnd { .. } => self.close_section(),
            Carrier::LayoutEnd => self.layout_end(),
            Carrier::Decisions(decisions) => self.decisions(&decisions),
            Carrier::SmartLink {
                href,
                appearance,
                label,
            } => self.push(&format!("<p>{}</p>", smart_link(&href, &appearance, &label))),
            other => self.push(&other.encode()),
        }
        Ok(())
    }

    fn layout_section(&mut self, section: &LayoutSection) {
        self.push("<ac:layout-section");
        for (key, value) in [
            ("ac:type", &section.section_type),
            ("ac:breakout-mode", &section.breakout_mode),
            ("ac:breakout-width", &section.breakout_width),
        ] {
            if !value.is_empty() {
                self.push(&format!(r#" {key}="{}""#, html_escape(value)));
            }
        }
        self.push(">");
        self.layout.section = true;
    }

    fn close_cell(&mut self) {
        if self.layout.cell {
            self.push("</ac:layout-cell>");
            self.layout.cell = false;
        }
    }

    fn close_section(&mut self) {
        self.close_cell();
        if self.layout.section {
            self.push("</ac:layout-section>");
            self.layout.section = false;
        }
    }

    fn layout_end(&mut self) {
        self.close_section();
        if self.layout.open {
            self.push("</ac:layout>");
            self.layout.open = false;
        }
    }

    fn decisions(&mut self, decisions: &[Decision]) {
        self.push(r#"<ac:adf-extension><ac:adf-node type="decision-list">"#);
        for decision in decisions {
            self.push(&format!(
                concat!(
                    r#"<ac:adf-node type="decision-item">"#,
                    r#"<ac:adf-attribute key="local-id">{}</ac:adf-attribute>"#,
                    r#"<ac:adf-attribute key="state">{}</ac:adf-attribute>"#,
                    "<ac:adf-content>{}</ac:adf-content></ac:adf-node>"
                ),
                html_escape(&decision.local_id),
                html_escape(&decision.state),
                html_escape(&decision.text)
            ));
        }
        self.push("</ac:adf-node><ac:adf-fallback><ul>");
        for decision in decisions {
            self.push(&format!("<li>{}</li>", html_escape(&decision.text)));
        }
        self.push("</ul></ac:adf-fallback></ac:adf-extension>");
    }

    /// Markdown the Markdown parser could not type; tried once more as Markdown, else text.
    fn markdown_block(&mut self, raw: &str) -> Result<(), SerializeError> {
        if !self.inline.reparsed {
            match parse_markdown(raw) {
                Ok(doc) if doc.raw_confluence.is_none() => {
                    let mut nested = StorageWriter::new(self.options, true);
                    for node in &doc.children {
                        nested.block(node)?;
                    }
                    let markup = nested.finish()?;
                    self.push(&markup);
                    return Ok(());
                }
                Ok(_) => {}
                Err(err) => debug!(error = %err, "unsupported markdown does not re-parse"),
            }
        }
        self.push(&format!("<p>{}</p>", html_escape(raw)));
        Ok(())
    }
}

/// Only lists whose items are all checkboxes holding at most one paragraph fit page tasks.
fn is_task_list(list: &List) -> bool {
    !list.children.is_empty()
        && list.children.iter().all(|item| {
            item.checked.is_some()
                && matches!(item.children.as_slice(), [] | [SimpleBlock::Paragraph(_)])
        })
}

/// Text kept in front of a checkbox item written as an ordinary list item.
fn checkbox_marker(checked: Option<bool>) -> &'static str {
    match checked {
        Some(true) => "[x] ",
        Some(false) => "[ ] ",
        None => "",
    }
}

fn parameter(name: &str, value: &str) -> String {
    format!(
        r#"<ac:parameter ac:name="{name}">{}</ac:parameter>"#,
        html_escape(value)
    )
}

fn smart_link(href: &str, appearance: &str, label: &str) -> String {
    format!(
        r#"<a href="{}" data-card-appearance="{}">{}</a>"#,
        html_escape(href),
        html_escape(appearance),
        html_escape(label)
    )
}

struct InlineRenderer {
    reparsed: bool,
}

impl InlineRenderer {
    fn render_all(&self, inlines: &[Inline]) -> Result<String, SerializeError> {
        let mut out = String::new();
        for inline in inlines {
            out.push_str(&self.render(inline)?);
        }
        Ok(out)
    }

    fn render_base(&self, children: &[BaseInline]) -> Result<String, SerializeError> {
        let mut out = String::new();
        for child in children {
            out.push_str(&self.render(&Inline::from(child.clone()))?);
        }
        Ok(out)
    }

    fn wrap(&self, tag: &str, children: &[BaseInline]) -> Result<String, SerializeError> {
        Ok(format!("<{tag}>{}</{tag}>", self.render_base(children)?))
    }

    fn render(&self, inline: &Inline) -> Result<String, SerializeError> {
        let markup = match inline {
            Inline::Text { value } => html_escape(value),
            Inline::Strong { children } => self.wrap("strong", children)?,
            Inline::Emphasis { children } => self.wrap("em", children)?,
            Inline::Strikethrough { children } => self.wrap("s", children)?,
            Inline::InlineCode { value } => format!("<code>{}</code>", html_escape(value)),
            Inline::Link {
                href,
                title,
                children,
            } => {
                let title = title
                    .as_ref()
                    .map(|t| format!(r#" title="{}""#, html_escape(t)))
                    .unwrap_or_default();
                format!(
                    r#"<a href="{}"{title}>{}</a>"#,
                    html_escape(href),
                    self.render_base(children)?
                )
            }
            Inline::LineBreak => "<br />".to_string(),
            Inline::ColoredText { color, children } => format!(
                r#"<span style="color: {};">{}</span>"#,
                html_escape(color),
                self.render_base(children)?
            ),
            Inline::Highlight {
                background_color,
                children,
            } => format!(
                r#"<span style="background-color: {};">{}</span>"#,
                html_escape(background_color),
                self.render_base(children)?
            ),
            Inline::Underline { children } => self.wrap("u", children)?,
            Inline::Subscript { children } => self.wrap("sub", children)?,
            Inline::Superscript { children } => self.wrap("sup", children)?,
            Inline::DateTime { datetime } => {
                format!(r#"<time datetime="{}" />"#, html_escape(datetime))
            }
            Inline::Emoticon {
                shortname,
                emoji_id,
                fallback,
            } => emoticon(shortname, emoji_id, fallback),
            Inline::UserMention { account_id } => format!(
                r#"<ac:link><ri:user ri:account-id="{}" /></ac:link>"#,
                html_escape(account_id)
            ),
            Inline::Status { title, color } => {
                if title.is_empty() {
                    return Err(error("status", "status title is empty"));
                }
                let mut markup = r#"<ac:structured-macro ac:name="status">"#.to_string();
                if !color.is_empty() {
                    markup.push_str(&parameter("colour", color));
                }
                markup.push_str(&parameter("title", title));
                markup + "</ac:structured-macro>"
            }
            Inline::UnsupportedInline {
                raw,
                source: SourceFormat::Confluence,
            } => match Carrier::decode(raw) {
                Some(Ok(Carrier::SmartLink {
                    href,
                    appearance,
                    label,
                })) => smart_link(&href, &appearance, &label),
                _ => raw.clone(),
            },
            Inline::UnsupportedInline {
                raw,
                source: SourceFormat::Markdown,
            } => self.markdown_inline(raw)?,
        };
        Ok(markup)
    }

    fn markdown_inline(&self, raw: &str) -> Result<String, SerializeError> {
        if !self.reparsed {
            if let Ok(doc) = parse_markdown(raw) {
                if let [DocumentNode::Paragraph(paragraph)] = doc.children.as_slice() {
                    return InlineRenderer { reparsed: true }.render_all(&paragraph.children);
                }
            }
        }
        Ok(html_escape(raw))
    }
}

fn emoticon(shortname: &str, emoji_id: &str, fallback: &str) -> String {
    if emoji_id.is_empty() {
        return format!(r#"<ac:emoticon ac:name="{}" />"#, html_escape(shortname));
    }
    let mut markup = format!(
        r#"<ac:emoticon ac:name="blue-star" ac:emoji-shortname="{}" ac:emoji-id="{}""#,
        html_escape(shortname),
        html_escape(emoji_id)
    );
    if !fallback.is_empty() {
        markup.push_str(&format!(r#" ac:emoji-fallback="{}""#, html_escape(fallback)));
    }
    markup + " />"
}

//! Core data structures of the document AST.
//!
//! Every enum carries its discriminant as a `"type"` field in serde form, with camelCase names,
//! so stored documents stay readable and stable across releases (see `crate::migrate`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which pipeline an unsupported payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Storage-format markup (or a carrier comment produced on the storage side)
    Confluence,
    /// Markdown text
    Markdown,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Confluence => "confluence",
            SourceFormat::Markdown => "markdown",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root of a converted page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub children: Vec<DocumentNode>,
    /// Full-fidelity storage markup, preferred over the reconstructed tree when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_confluence: Option<String>,
}

impl Document {
    pub fn new(children: Vec<DocumentNode>) -> Self {
        Document {
            children,
            raw_confluence: None,
        }
    }

    pub fn with_raw_confluence(mut self, raw: impl Into<String>) -> Self {
        self.raw_confluence = Some(raw.into());
        self
    }
}

/// A top-level node: either a block or a macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocumentNode {
    Heading(Heading),
    Paragraph(Paragraph),
    CodeBlock(CodeBlock),
    ThematicBreak,
    Image(Image),
    Table(Table),
    List(List),
    BlockQuote(BlockQuote),
    UnsupportedBlock(UnsupportedBlock),
    InfoPanel(InfoPanel),
    ExpandMacro(ExpandMacro),
    TocMacro(TocMacro),
    TaskList(TaskList),
}

impl DocumentNode {
    /// The serde discriminant of this node, used in error reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            DocumentNode::Heading(_) => "heading",
            DocumentNode::Paragraph(_) => "paragraph",
            DocumentNode::CodeBlock(_) => "codeBlock",
            DocumentNode::ThematicBreak => "thematicBreak",
            DocumentNode::Image(_) => "image",
            DocumentNode::Table(_) => "table",
            DocumentNode::List(_) => "list",
            DocumentNode::BlockQuote(_) => "blockQuote",
            DocumentNode::UnsupportedBlock(_) => "unsupportedBlock",
            DocumentNode::InfoPanel(_) => "infoPanel",
            DocumentNode::ExpandMacro(_) => "expandMacro",
            DocumentNode::TocMacro(_) => "tocMacro",
            DocumentNode::TaskList(_) => "taskList",
        }
    }
}

/// The block subset allowed inside list items, block quotes, panels and expands.
///
/// Nested lists are not part of this grammar; they travel as [`UnsupportedBlock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SimpleBlock {
    Heading(Heading),
    Paragraph(Paragraph),
    CodeBlock(CodeBlock),
    ThematicBreak,
    Image(Image),
    Table(Table),
    UnsupportedBlock(UnsupportedBlock),
}

impl From<SimpleBlock> for DocumentNode {
    fn from(block: SimpleBlock) -> Self {
        match block {
            SimpleBlock::Heading(h) => DocumentNode::Heading(h),
            SimpleBlock::Paragraph(p) => DocumentNode::Paragraph(p),
            SimpleBlock::CodeBlock(c) => DocumentNode::CodeBlock(c),
            SimpleBlock::ThematicBreak => DocumentNode::ThematicBreak,
            SimpleBlock::Image(i) => DocumentNode::Image(i),
            SimpleBlock::Table(t) => DocumentNode::Table(t),
            SimpleBlock::UnsupportedBlock(u) => DocumentNode::UnsupportedBlock(u),
        }
    }
}

impl TryFrom<DocumentNode> for SimpleBlock {
    type Error = DocumentNode;

    /// Hands the node back unchanged when it has no place in the simple grammar.
    fn try_from(node: DocumentNode) -> Result<Self, Self::Error> {
        match node {
            DocumentNode::Heading(h) => Ok(SimpleBlock::Heading(h)),
            DocumentNode::Paragraph(p) => Ok(SimpleBlock::Paragraph(p)),
            DocumentNode::CodeBlock(c) => Ok(SimpleBlock::CodeBlock(c)),
            DocumentNode::ThematicBreak => Ok(SimpleBlock::ThematicBreak),
            DocumentNode::Image(i) => Ok(SimpleBlock::Image(i)),
            DocumentNode::Table(t) => Ok(SimpleBlock::Table(t)),
            DocumentNode::UnsupportedBlock(u) => Ok(SimpleBlock::UnsupportedBlock(u)),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub children: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub children: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// An embedded picture, either an attachment of the page or an external URL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl Image {
    /// Whether a plain `![alt](src "title")` carries everything this image holds.
    pub fn is_plain(&self) -> bool {
        self.src.is_some()
            && self.attachment.is_none()
            && self.align.is_none()
            && self.width.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<TableRow>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    pub is_header: bool,
    pub children: Vec<Inline>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    pub ordered: bool,
    /// First number of an ordered list; `None` stands for 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    pub children: Vec<ListItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// `Some` for checkbox items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    pub children: Vec<SimpleBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockQuote {
    pub children: Vec<SimpleBlock>,
}

/// A block the parsers could not map, kept verbatim.
///
/// Exactly one of `raw_html` and `raw_markdown` is set by the parsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsupportedBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_markdown: Option<String>,
    pub source: SourceFormat,
}

impl UnsupportedBlock {
    pub fn html(raw: impl Into<String>, source: SourceFormat) -> Self {
        UnsupportedBlock {
            raw_html: Some(raw.into()),
            raw_markdown: None,
            source,
        }
    }

    pub fn markdown(raw: impl Into<String>) -> Self {
        UnsupportedBlock {
            raw_html: None,
            raw_markdown: Some(raw.into()),
            source: SourceFormat::Markdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoPanel {
    pub panel_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub children: Vec<SimpleBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandMacro {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub children: Vec<SimpleBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocMacro {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_level: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub children: Vec<TaskItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    /// Empty when the page never assigned one.
    #[serde(default)]
    pub uuid: String,
    pub status: TaskStatus,
    pub body: Vec<Inline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Incomplete,
    Complete,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Incomplete => "incomplete",
            TaskStatus::Complete => "complete",
        }
    }

    /// Anything other than `complete` reads as incomplete, matching how pages render it.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("complete") {
            TaskStatus::Complete
        } else {
            TaskStatus::Incomplete
        }
    }
}

/// Inline content of headings, paragraphs, table cells and task bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Inline {
    Text { value: String },
    Strong { children: Vec<BaseInline> },
    Emphasis { children: Vec<BaseInline> },
    Strikethrough { children: Vec<BaseInline> },
    InlineCode { value: String },
    Link {
        href: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        children: Vec<BaseInline>,
    },
    LineBreak,
    ColoredText {
        color: String,
        children: Vec<BaseInline>,
    },
    Highlight {
        background_color: String,
        children: Vec<BaseInline>,
    },
    Underline { children: Vec<BaseInline> },
    Subscript { children: Vec<BaseInline> },
    Superscript { children: Vec<BaseInline> },
    DateTime { datetime: String },
    Emoticon {
        shortname: String,
        emoji_id: String,
        fallback: String,
    },
    UserMention { account_id: String },
    Status { title: String, color: String },
    UnsupportedInline { raw: String, source: SourceFormat },
}

impl Inline {
    pub fn text(value: impl Into<String>) -> Self {
        Inline::Text {
            value: value.into(),
        }
    }

    pub fn unsupported(raw: impl Into<String>, source: SourceFormat) -> Self {
        Inline::UnsupportedInline {
            raw: raw.into(),
            source,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Inline::Text { .. } => "text",
            Inline::Strong { .. } => "strong",
            Inline::Emphasis { .. } => "emphasis",
            Inline::Strikethrough { .. } => "strikethrough",
            Inline::InlineCode { .. } => "inlineCode",
            Inline::Link { .. } => "link",
            Inline::LineBreak => "lineBreak",
            Inline::ColoredText { .. } => "coloredText",
            Inline::Highlight { .. } => "highlight",
            Inline::Underline { .. } => "underline",
            Inline::Subscript { .. } => "subscript",
            Inline::Superscript { .. } => "superscript",
            Inline::DateTime { .. } => "dateTime",
            Inline::Emoticon { .. } => "emoticon",
            Inline::UserMention { .. } => "userMention",
            Inline::Status { .. } => "status",
            Inline::UnsupportedInline { .. } => "unsupportedInline",
        }
    }

    /// Narrows to the wrapper-child subset, handing the node back when it is too rich.
    pub fn into_base(self) -> Result<BaseInline, Inline> {
        match self {
            Inline::Text { value } => Ok(BaseInline::Text { value }),
            Inline::InlineCode { value } => Ok(BaseInline::InlineCode { value }),
            Inline::LineBreak => Ok(BaseInline::LineBreak),
            Inline::UnsupportedInline { raw, source } => {
                Ok(BaseInline::UnsupportedInline { raw, source })
            }
            other => Err(other),
        }
    }
}

/// Children of styled wrappers: text, code, breaks and opaque payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BaseInline {
    Text { value: String },
    InlineCode { value: String },
    LineBreak,
    UnsupportedInline { raw: String, source: SourceFormat },
}

impl BaseInline {
    pub fn text(value: impl Into<String>) -> Self {
        BaseInline::Text {
            value: value.into(),
        }
    }
}

impl From<BaseInline> for Inline {
    fn from(inline: BaseInline) -> Self {
        match inline {
            BaseInline::Text { value } => Inline::Text { value },
            BaseInline::InlineCode { value } => Inline::InlineCode { value },
            BaseInline::LineBreak => Inline::LineBreak,
            BaseInline::UnsupportedInline { raw, source } => {
                Inline::UnsupportedInline { raw, source }
            }
        }
    }
}

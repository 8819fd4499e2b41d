//! The comment micro-format that carries foreign constructs through Markdown.
//!
//!     Every construct without a Markdown equivalent travels as one single-line comment:
//!
//!         <!-- kind:fields -->
//!
//!     Fields within an item are separated by `;`, repeated item groups by `|`. Field text escapes
//!     `\` → `\\`, `;` → `\;`, `|` → `\|`, newline → `\n` and the second of two consecutive dashes
//!     → `\-`, so no payload can close or corrupt the comment. Whole-document payloads
//!     (`confluence-roundtrip`) are standard base64.
//!
//!     The table below is the contract. Changing a row means bumping [`CODEC_VERSION`].
//!
//!     | kind                  | fields                          | decodes to                   |
//!     |-----------------------|---------------------------------|------------------------------|
//!     | `emoticon`            | `shortname|emojiId|fallback`    | `Inline::Emoticon`           |
//!     | `mention`             | `accountId`                     | `Inline::UserMention`        |
//!     | `date`                | `datetime`                      | `Inline::DateTime`           |
//!     | `status`              | `title;color`                   | `Inline::Status`             |
//!     | `html`                | storage markup                  | unsupported inline (storage) |
//!     | `smartlink`           | `href;appearance[;label]`       | kept verbatim                |
//!     | `image`               | `key=value|…`                   | `Image`                      |
//!     | `expand`              | `title;markdown`                | `ExpandMacro`                |
//!     | `toc`                 | `minLevel;maxLevel`             | `TocMacro`                   |
//!     | `panel`               | `type;title;markdown`           | `InfoPanel`                  |
//!     | `tasklist`            | `id;uuid;status;body|…`         | `TaskList`                   |
//!     | `html-block`          | storage markup                  | unsupported block (storage)  |
//!     | `decisions`           | `localId;state;text|…`          | kept verbatim                |
//!     | `layout-*`            | marker fields                   | kept verbatim                |
//!     | `confluence-roundtrip`| base64 storage document         | `Document::raw_confluence`   |

use crate::ast::{Attachment, Image, TaskStatus};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Version of the comment contract written by this crate. Version 2 added the smart link label.
pub const CODEC_VERSION: u32 = 2;

/// A comment body that names a known kind but does not match its field layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {kind} comment: {message}")]
pub struct CodecError {
    pub kind: &'static str,
    pub message: String,
}

impl CodecError {
    fn new(kind: CommentKind, message: impl Into<String>) -> Self {
        CodecError {
            kind: kind.name(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentKind {
    Emoticon,
    Mention,
    Date,
    Status,
    Html,
    SmartLink,
    Image,
    Expand,
    Toc,
    Panel,
    TaskList,
    HtmlBlock,
    Decisions,
    LayoutStart,
    LayoutSection,
    LayoutCell,
    LayoutSectionEnd,
    LayoutEnd,
    Roundtrip,
}

impl CommentKind {
    pub const ALL: [CommentKind; 19] = [
        CommentKind::Emoticon,
        CommentKind::Mention,
        CommentKind::Date,
        CommentKind::Status,
        CommentKind::Html,
        CommentKind::SmartLink,
        CommentKind::Image,
        CommentKind::Expand,
        CommentKind::Toc,
        CommentKind::Panel,
        CommentKind::TaskList,
        CommentKind::HtmlBlock,
        CommentKind::Decisions,
        CommentKind::LayoutStart,
        CommentKind::LayoutSection,
        CommentKind::LayoutCell,
        CommentKind::LayoutSectionEnd,
        CommentKind::LayoutEnd,
        CommentKind::Roundtrip,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CommentKind::Emoticon => "emoticon",
            CommentKind::Mention => "mention",
            CommentKind::Date => "date",
            CommentKind::Status => "status",
            CommentKind::Html => "html",
            CommentKind::SmartLink => "smartlink",
            CommentKind::Image => "image",
            CommentKind::Expand => "expand",
            CommentKind::Toc => "toc",
            CommentKind::Panel => "panel",
            CommentKind::TaskList => "tasklist",
            CommentKind::HtmlBlock => "html-block",
            CommentKind::Decisions => "decisions",
            CommentKind::LayoutStart => "layout-start",
            CommentKind::LayoutSection => "layout-section",
            CommentKind::LayoutCell => "layout-cell",
            CommentKind::LayoutSectionEnd => "layout-section-end",
            CommentKind::LayoutEnd => "layout-end",
            CommentKind::Roundtrip => "confluence-roundtrip",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    /// Kinds that sit inside a paragraph rather than standing alone as a block.
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            CommentKind::Emoticon
                | CommentKind::Mention
                | CommentKind::Date
                | CommentKind::Status
                | CommentKind::Html
                | CommentKind::SmartLink
        )
    }

    /// Kinds the parsers keep as the comment text itself, pending re-synthesis into storage markup.
    pub fn is_verbatim(self) -> bool {
        matches!(
            self,
            CommentKind::SmartLink
                | CommentKind::Decisions
                | CommentKind::LayoutStart
                | CommentKind::LayoutSection
                | CommentKind::LayoutCell
                | CommentKind::LayoutSectionEnd
                | CommentKind::LayoutEnd
        )
    }
}

/// One task of a `tasklist` comment; the body is plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub id: String,
    pub uuid: String,
    pub status: TaskStatus,
    pub body: String,
}

/// One entry of a decision list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub local_id: String,
    pub state: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSection {
    pub index: usize,
    pub section_type: String,
    pub breakout_mode: String,
    pub breakout_width: String,
    pub cell_count: usize,
}

/// The typed payload of one codec comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Carrier {
    Emoticon {
        shortname: String,
        emoji_id: String,
        fallback: String,
    },
    Mention {
        account_id: String,
    },
    Date {
        datetime: String,
    },
    Status {
        title: String,
        color: String,
    },
    Html {
        markup: String,
    },
    /// `label` is the anchor text; it is left out of the comment when it equals `href`.
    SmartLink {
        href: String,
        appearance: String,
        label: String,
    },
    Image(Image),
    Expand {
        title: Option<String>,
        content: String,
    },
    Toc {
        min_level: Option<u8>,
        max_level: Option<u8>,
    },
    Panel {
        panel_type: String,
        title: Option<String>,
        content: String,
    },
    TaskList(Vec<TaskFields>),
    HtmlBlock {
        markup: String,
    },
    Decisions(Vec<Decision>),
    LayoutStart,
    LayoutSection(LayoutSection),
    LayoutCell {
        section: usize,
        cell: usize,
    },
    LayoutSectionEnd {
        index: usize,
    },
    LayoutEnd,
    Roundtrip {
        storage: String,
    },
}

impl Carrier {
    pub fn kind(&self) -> CommentKind {
        match self {
            Carrier::Emoticon { .. } => CommentKind::Emoticon,
            Carrier::Mention { .. } => CommentKind::Mention,
            Carrier::Date { .. } => CommentKind::Date,
            Carrier::Status { .. } => CommentKind::Status,
            Carrier::Html { .. } => CommentKind::Html,
            Carrier::SmartLink { .. } => CommentKind::SmartLink,
            Carrier::Image(_) => CommentKind::Image,
            Carrier::Expand { .. } => CommentKind::Expand,
            Carrier::Toc { .. } => CommentKind::Toc,
            Carrier::Panel { .. } => CommentKind::Panel,
            Carrier::TaskList(_) => CommentKind::TaskList,
            Carrier::HtmlBlock { .. } => CommentKind::HtmlBlock,
            Carrier::Decisions(_) => CommentKind::Decisions,
            Carrier::LayoutStart => CommentKind::LayoutStart,
            Carrier::LayoutSection(_) => CommentKind::LayoutSection,
            Carrier::LayoutCell { .. } => CommentKind::LayoutCell,
            Carrier::LayoutSectionEnd { .. } => CommentKind::LayoutSectionEnd,
            Carrier::LayoutEnd => CommentKind::LayoutEnd,
            Carrier::Roundtrip { .. } => CommentKind::Roundtrip,
        }
    }

    /// Renders the full `<!-- kind:fields -->` comment.
    pub fn encode(&self) -> String {
        match self {
            Carrier::LayoutStart | Carrier::LayoutEnd => format!("<!-- {} -->", self.kind().name()),
            _ => format!("<!-- {}:{} -->", self.kind().name(), self.body()),
        }
    }

    /// Decodes a complete comment.
    ///
    /// `None` when the text is not a single comment of a known kind; `Some(Err(_))` when the
    /// kind is known but its fields are malformed.
    pub fn decode(text: &str) -> Option<Result<Carrier, CodecError>> {
        let (kind, body) = split_comment(text)?;
        Some(decode_body(kind, body))
    }

    fn body(&self) -> String {
        match self {
            Carrier::Emoticon {
                shortname,
                emoji_id,
                fallback,
            } => join(&[shortname.as_str(), emoji_id.as_str(), fallback.as_str()], "|"),
            Carrier::Mention { account_id } => escape_field(account_id),
            Carrier::Date { datetime } => escape_field(datetime),
            Carrier::Status { title, color } => join(&[title.as_str(), color.as_str()], ";"),
            Carrier::Html { markup } | Carrier::HtmlBlock { markup } => escape_text(markup),
            Carrier::SmartLink {
                href,
                appearance,
                label,
            } if label == href => join(&[href.as_str(), appearance.as_str()], ";"),
            Carrier::SmartLink {
                href,
                appearance,
                label,
            } => join(&[href.as_str(), appearance.as_str(), label.as_str()], ";"),
            Carrier::Image(image) => encode_image(image),
            Carrier::Expand { title, content } => join(
                &[title.as_deref().unwrap_or_default(), content.as_str()],
                ";",
            ),
            Carrier::Toc {
                min_level,
                max_level,
            } => format!(
                "{};{}",
                min_level.map(|l| l.to_string()).unwrap_or_default(),
                max_level.map(|l| l.to_string()).unwrap_or_default()
            ),
            Carrier::Panel {
                panel_type,
                title,
                content,
            } => join(
                &[
                    panel_type.as_str(),
                    title.as_deref().unwrap_or_default(),
                    content.as_str(),
                ],
                ";",
            ),
            Carrier::TaskList(tasks) => tasks
                .iter()
                .map(|t| {
                    join(
                        &[t.id.as_str(), t.uuid.as_str(), t.status.as_str(), t.body.as_str()],
                        ";",
                    )
                })
                .collect::<Vec<_>>()
                .join("|"),
            Carrier::Decisions(decisions) => decisions
                .iter()
                .map(|d| join(&[d.local_id.as_str(), d.state.as_str(), d.text.as_str()], ";"))
                .collect::<Vec<_>>()
                .join("|"),
            Carrier::LayoutStart | Carrier::LayoutEnd => String::new(),
            Carrier::LayoutSection(section) => format!(
                "{};{};{}",
                section.index,
                join(
                    &[
                        section.section_type.as_str(),
                        section.breakout_mode.as_str(),
                        section.breakout_width.as_str(),
                    ],
                    ";"
                ),
                section.cell_count
            ),
            Carrier::LayoutCell { section, cell } => format!("{section};{cell}"),
            Carrier::LayoutSectionEnd { index } => index.to_string(),
            Carrier::Roundtrip { storage } => STANDARD.encode(storage),
        }
    }

    /// The marker string used on `data-cfm-layout` elements during storage preprocessing.
    pub fn layout_marker(&self) -> Option<String> {
        match self {
            Carrier::LayoutStart => Some("layout-start".to_string()),
            Carrier::LayoutSection(_) => Some(format!("section:{}", self.body())),
            Carrier::LayoutCell { .. } => Some(format!("cell:{}", self.body())),
            Carrier::LayoutSectionEnd { .. } => Some(format!("section-end:{}", self.body())),
            Carrier::LayoutEnd => Some("layout-end".to_string()),
            _ => None,
        }
    }

    pub fn from_layout_marker(marker: &str) -> Result<Carrier, CodecError> {
        let (prefix, body) = marker.split_once(':').unwrap_or((marker, ""));
        let kind = match prefix {
            "layout-start" => CommentKind::LayoutStart,
            "section" => CommentKind::LayoutSection,
            "cell" => CommentKind::LayoutCell,
            "section-end" => CommentKind::LayoutSectionEnd,
            "layout-end" => CommentKind::LayoutEnd,
            _ => {
                return Err(CodecError {
                    kind: "layout",
                    message: format!("unknown layout marker '{marker}'"),
                })
            }
        };
        decode_body(kind, body)
    }
}

/// Splits `<!-- kind:body -->` into its kind and the still-escaped body.
pub fn split_comment(text: &str) -> Option<(CommentKind, &str)> {
    let inner = text.trim().strip_prefix("<!--")?.strip_suffix("-->")?;
    if inner.contains("-->") {
        return None;
    }
    let inner = inner.trim_start();
    let inner = inner.strip_suffix(' ').unwrap_or(inner);
    let (name, body) = match inner.find(':') {
        Some(idx) => (&inner[..idx], &inner[idx + 1..]),
        None => (inner.trim_end(), ""),
    };
    let kind = CommentKind::from_name(name)?;
    Some((kind, body))
}

/// Whether `text` is exactly one HTML comment.
pub fn is_single_comment(text: &str) -> bool {
    let trimmed = text.trim();
    match trimmed.strip_prefix("<!--") {
        Some(rest) => rest.find("-->").map(|idx| idx + 3 == rest.len()) == Some(true),
        None => false,
    }
}

fn decode_body(kind: CommentKind, body: &str) -> Result<Carrier, CodecError> {
    let carrier = match kind {
        CommentKind::Emoticon => {
            let [shortname, emoji_id, fallback] = fields::<3>(kind, body, '|')?;
            Carrier::Emoticon {
                shortname,
                emoji_id,
                fallback,
            }
        }
        CommentKind::Mention => {
            let [account_id] = fields::<1>(kind, body, ';')?;
            Carrier::Mention { account_id }
        }
        CommentKind::Date => {
            let [datetime] = fields::<1>(kind, body, ';')?;
            Carrier::Date { datetime }
        }
        CommentKind::Status => {
            let [title, color] = fields::<2>(kind, body, ';')?;
            Carrier::Status { title, color }
        }
        CommentKind::Html => Carrier::Html {
            markup: unescape(body),
        },
        CommentKind::HtmlBlock => Carrier::HtmlBlock {
            markup: unescape(body),
        },
        CommentKind::SmartLink => match fields::<3>(kind, body, ';') {
            Ok([href, appearance, label]) => Carrier::SmartLink {
                href,
                appearance,
                label,
            },
            Err(_) => {
                let [href, appearance] = fields::<2>(kind, body, ';')
                    .map_err(|_| CodecError::new(kind, "expected 2 or 3 fields"))?;
                Carrier::SmartLink {
                    label: href.clone(),
                    href,
                    appearance,
                }
            }
        },
        CommentKind::Image => Carrier::Image(decode_image(body)?),
        CommentKind::Expand => {
            let [title, content] = fields::<2>(kind, body, ';')?;
            Carrier::Expand {
                title: non_empty(title),
                content,
            }
        }
        CommentKind::Toc => {
            let [min, max] = fields::<2>(kind, body, ';')?;
            Carrier::Toc {
                min_level: parse_level(kind, &min)?,
                max_level: parse_level(kind, &max)?,
            }
        }
        CommentKind::Panel => {
            let [panel_type, title, content] = fields::<3>(kind, body, ';')?;
            if panel_type.is_empty() {
                return Err(CodecError::new(kind, "panel type is empty"));
            }
            Carrier::Panel {
                panel_type,
                title: non_empty(title),
                content,
            }
        }
        CommentKind::TaskList => {
            let mut tasks = Vec::new();
            for group in groups(body) {
                let [id, uuid, status, body] = fields::<4>(kind, group, ';')?;
                let status = match status.as_str() {
                    "complete" => TaskStatus::Complete,
                    "incomplete" => TaskStatus::Incomplete,
                    other => {
                        return Err(CodecError::new(kind, format!("unknown task status '{other}'")))
                    }
                };
                tasks.push(TaskFields {
                    id,
                    uuid,
                    status,
                    body,
                });
            }
            Carrier::TaskList(tasks)
        }
        CommentKind::Decisions => {
            let mut decisions = Vec::new();
            for group in groups(body) {
                let [local_id, state, text] = fields::<3>(kind, group, ';')?;
                decisions.push(Decision {
                    local_id,
                    state,
                    text,
                });
            }
            Carrier::Decisions(decisions)
        }
        CommentKind::LayoutStart => Carrier::LayoutStart,
        CommentKind::LayoutEnd => Carrier::LayoutEnd,
        CommentKind::LayoutSection => {
            let [index, section_type, breakout_mode, breakout_width, cell_count] =
                fields::<5>(kind, body, ';')?;
            Carrier::LayoutSection(LayoutSection {
                index: parse_index(kind, &index)?,
                section_type,
                breakout_mode,
                breakout_width,
                cell_count: parse_index(kind, &cell_count)?,
            })
        }
        CommentKind::LayoutCell => {
            let [section, cell] = fields::<2>(kind, body, ';')?;
            Carrier::LayoutCell {
                section: parse_index(kind, &section)?,
                cell: parse_index(kind, &cell)?,
            }
        }
        CommentKind::LayoutSectionEnd => {
            let [index] = fields::<1>(kind, body, ';')?;
            Carrier::LayoutSectionEnd {
                index: parse_index(kind, &index)?,
            }
        }
        CommentKind::Roundtrip => Carrier::Roundtrip {
            storage: decode_base64(body.trim())
                .map_err(|message| CodecError::new(kind, message))?,
        },
    };
    Ok(carrier)
}

const IMAGE_KEYS: [&str; 7] = [
    "src",
    "alt",
    "title",
    "align",
    "width",
    "attachment",
    "version",
];

fn encode_image(image: &Image) -> String {
    let attachment = image.attachment.as_ref();
    let values = [
        image.src.as_deref(),
        image.alt.as_deref(),
        image.title.as_deref(),
        image.align.as_deref(),
        image.width.as_deref(),
        attachment.map(|a| a.filename.as_str()),
        attachment.and_then(|a| a.version.as_deref()),
    ];
    IMAGE_KEYS
        .iter()
        .zip(values)
        .filter_map(|(key, value)| value.map(|v| format!("{key}={}", escape_field(v))))
        .collect::<Vec<_>>()
        .join("|")
}

fn decode_image(body: &str) -> Result<Image, CodecError> {
    let kind = CommentKind::Image;
    let mut image = Image::default();
    let mut filename = None;
    let mut version = None;
    for group in groups(body) {
        let (key, value) = group
            .split_once('=')
            .ok_or_else(|| CodecError::new(kind, format!("expected key=value, found '{group}'")))?;
        let value = non_empty(unescape(value));
        match key {
            "src" => image.src = value,
            "alt" => image.alt = value,
            "title" => image.title = value,
            "align" => image.align = value,
            "width" => image.width = value,
            "attachment" => filename = value,
            "version" => version = value,
            other => return Err(CodecError::new(kind, format!("unknown image key '{other}'"))),
        }
    }
    image.attachment = match (filename, version) {
        (Some(filename), version) => Some(Attachment { filename, version }),
        (None, Some(_)) => {
            return Err(CodecError::new(kind, "attachment version without a filename"))
        }
        (None, None) => None,
    };
    Ok(image)
}

fn join(fields: &[&str], separator: &str) -> String {
    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Repeated item groups; an empty body has none.
fn groups(body: &str) -> Vec<&str> {
    if body.is_empty() {
        Vec::new()
    } else {
        split_escaped(body, '|')
    }
}

fn fields<const N: usize>(
    kind: CommentKind,
    body: &str,
    separator: char,
) -> Result<[String; N], CodecError> {
    let parts: Vec<String> = split_escaped(body, separator)
        .into_iter()
        .map(unescape)
        .collect();
    let found = parts.len();
    parts
        .try_into()
        .map_err(|_| CodecError::new(kind, format!("expected {N} fields, found {found}")))
}

fn parse_level(kind: CommentKind, value: &str) -> Result<Option<u8>, CodecError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<u8>()
        .map(Some)
        .map_err(|_| CodecError::new(kind, format!("'{value}' is not a heading level")))
}

fn parse_index(kind: CommentKind, value: &str) -> Result<usize, CodecError> {
    value
        .parse::<usize>()
        .map_err(|_| CodecError::new(kind, format!("'{value}' is not an index")))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Splits on `separator`, skipping escaped occurrences. Pieces stay escaped.
fn split_escaped(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == separator {
            parts.push(&text[start..idx]);
            start = idx + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Escapes one field of a multi-field body.
pub fn escape_field(text: &str) -> String {
    escape(text, true)
}

/// Escapes a single-field payload; separators stay readable.
pub fn escape_text(text: &str) -> String {
    escape(text, false)
}

fn escape(text: &str, separators: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_dash = false;
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' if separators => out.push_str("\\;"),
            '|' if separators => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '-' if after_dash => out.push_str("\\-"),
            other => out.push(other),
        }
        after_dash = c == '-';
    }
    out
}

pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

pub fn encode_base64(text: &str) -> String {
    STANDARD.encode(text)
}

pub fn decode_base64(payload: &str) -> Result<String, String> {
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| format!("invalid base64 payload: {e}"))?;
    String::from_utf8(bytes).map_err(|e| format!("payload is not UTF-8: {e}"))
}

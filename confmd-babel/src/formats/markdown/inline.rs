//! Inline walker for comrak trees.
//!
//! comrak hands inline HTML over as isolated `HtmlInline` tags, so the styled wrappers that
//! Markdown lacks (`<span style>`, `<u>`, `<sub>`, `<sup>`) are paired here: an opening tag is
//! matched with the closing tag of the same name among its siblings, counting nested tags of that
//! name. An opener without a closer stays as literal unsupported text.

use super::serializer::render_inline;
use crate::ast::{BaseInline, Inline, SourceFormat};
use crate::common::codec::{Carrier, CommentKind};
use crate::common::text::{demote, merge_text};
use crate::error::ParseError;
use crate::formats::storage::parser::single_declaration;
use crate::formats::storage::scanner::{tokenize, TokenKind};
use comrak::nodes::{AstNode, NodeValue};
use tracing::trace;

/// HTML wrappers that have a typed inline counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Wrapper {
    Color(String),
    Highlight(String),
    Underline,
    Subscript,
    Superscript,
}

impl Wrapper {
    fn wrap(self, children: Vec<BaseInline>) -> Inline {
        match self {
            Wrapper::Color(color) => Inline::ColoredText { color, children },
            Wrapper::Highlight(background_color) => Inline::Highlight {
                background_color,
                children,
            },
            Wrapper::Underline => Inline::Underline { children },
            Wrapper::Subscript => Inline::Subscript { children },
            Wrapper::Superscript => Inline::Superscript { children },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Marker {
    /// Opening tag of a pairable element; `wrapper` is `None` when its attributes rule out a
    /// typed node, but it still counts for nesting.
    Open {
        name: String,
        wrapper: Option<Wrapper>,
    },
    Close(String),
    Break,
}

const PAIRED: [&str; 4] = ["span", "u", "sub", "sup"];

/// Inlines of a paragraph, heading, table cell or link, in normal form but untrimmed.
pub(crate) fn fold_inlines<'a>(node: &'a AstNode<'a>) -> Result<Vec<Inline>, ParseError> {
    let children: Vec<&'a AstNode<'a>> = node.children().collect();
    walk(&children)
}

fn walk<'a>(nodes: &[&'a AstNode<'a>]) -> Result<Vec<Inline>, ParseError> {
    let mut out = Vec::new();
    let mut idx = 0;
    while idx < nodes.len() {
        let node = nodes[idx];
        let html = match &node.data.borrow().value {
            NodeValue::HtmlInline(literal) => Some(literal.clone()),
            _ => None,
        };
        let Some(literal) = html else {
            push_inline(node, &mut out)?;
            idx += 1;
            continue;
        };
        match marker(&literal) {
            Some(Marker::Break) => out.push(Inline::LineBreak),
            Some(Marker::Open { name, wrapper }) => {
                match (wrapper, closing_index(nodes, idx, &name)) {
                    (Some(wrapper), Some(close)) => {
                        let children = walk(&nodes[idx + 1..close])?;
                        out.push(wrapper.wrap(demote_markdown(children)?));
                        idx = close + 1;
                        continue;
                    }
                    _ => {
                        trace!(tag = %literal, "unpaired or untyped inline tag kept as text");
                        out.push(Inline::unsupported(literal, SourceFormat::Markdown));
                    }
                }
            }
            Some(Marker::Close(_)) => {
                out.push(Inline::unsupported(literal, SourceFormat::Markdown))
            }
            None => out.push(html_inline(literal)),
        }
        idx += 1;
    }
    Ok(merge_text(out))
}

fn push_inline<'a>(node: &'a AstNode<'a>, out: &mut Vec<Inline>) -> Result<(), ParseError> {
    let value = node.data.borrow().value.clone();
    match value {
        NodeValue::Text(text) => out.push(Inline::text(text)),
        NodeValue::SoftBreak => out.push(Inline::text(" ")),
        NodeValue::LineBreak => out.push(Inline::LineBreak),
        NodeValue::Code(code) => out.push(Inline::InlineCode {
            value: code.literal,
        }),
        NodeValue::Strong => out.push(Inline::Strong {
            children: base_children(node)?,
        }),
        NodeValue::Emph => out.push(Inline::Emphasis {
            children: base_children(node)?,
        }),
        NodeValue::Strikethrough => out.push(Inline::Strikethrough {
            children: base_children(node)?,
        }),
        NodeValue::Link(link) => out.push(Inline::Link {
            href: link.url,
            title: (!link.title.is_empty()).then_some(link.title),
            children: base_children(node)?,
        }),
        NodeValue::HtmlInline(literal) => out.push(html_inline(literal)),
        other => {
            trace!(node = ?other, "no inline mapping, keeping markdown");
            out.push(Inline::unsupported(
                render_node(node)?,
                SourceFormat::Markdown,
            ));
        }
    }
    Ok(())
}

/// Inline HTML that is not a pairable tag: carrier comments and foreign markup.
fn html_inline(literal: String) -> Inline {
    match Carrier::decode(&literal) {
        Some(Ok(carrier)) => match carrier {
            Carrier::Emoticon {
                shortname,
                emoji_id,
                fallback,
            } => Inline::Emoticon {
                shortname,
                emoji_id,
                fallback,
            },
            Carrier::Mention { account_id } => Inline::UserMention { account_id },
            Carrier::Date { datetime } => Inline::DateTime { datetime },
            Carrier::Status { title, color } if !title.is_empty() => {
                Inline::Status { title, color }
            }
            Carrier::Html { markup } => Inline::unsupported(markup, SourceFormat::Confluence),
            Carrier::SmartLink { .. } => {
                Inline::unsupported(literal.trim(), SourceFormat::Confluence)
            }
            other => {
                trace!(kind = other.kind().name(), "block comment inside a paragraph");
                Inline::unsupported(literal, SourceFormat::Markdown)
            }
        },
        Some(Err(err)) => {
            trace!(error = %err, "malformed inline comment kept as text");
            Inline::unsupported(literal, SourceFormat::Markdown)
        }
        None => Inline::unsupported(literal, SourceFormat::Markdown),
    }
}

fn marker(literal: &str) -> Option<Marker> {
    let tokens = tokenize(literal).ok()?;
    let [token] = tokens.as_slice() else {
        return None;
    };
    match &token.kind {
        TokenKind::Start(tag) => {
            let name = tag.name.to_ascii_lowercase();
            if name == "br" {
                return Some(Marker::Break);
            }
            if tag.self_closing || !PAIRED.contains(&name.as_str()) {
                return None;
            }
            let wrapper = match name.as_str() {
                "span" => match tag.attrs.as_slice() {
                    [(key, _)] if key.eq_ignore_ascii_case("style") => tag
                        .attr(key)
                        .and_then(|style| match single_declaration(&style) {
                            Some(("color", value)) => Some(Wrapper::Color(value.to_string())),
                            Some(("background-color", value)) => {
                                Some(Wrapper::Highlight(value.to_string()))
                            }
                            _ => None,
                        }),
                    _ => None,
                },
                _ if !tag.attrs.is_empty() => None,
                "u" => Some(Wrapper::Underline),
                "sub" => Some(Wrapper::Subscript),
                _ => Some(Wrapper::Superscript),
            };
            Some(Marker::Open { name, wrapper })
        }
        TokenKind::End(name) => {
            let name = name.to_ascii_lowercase();
            PAIRED
                .contains(&name.as_str())
                .then_some(Marker::Close(name))
        }
        _ => None,
    }
}

/// Sibling index of the tag closing the one opened at `open`.
fn closing_index<'a>(nodes: &[&'a AstNode<'a>], open: usize, name: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (idx, node) in nodes.iter().enumerate().skip(open + 1) {
        let literal = match &node.data.borrow().value {
            NodeValue::HtmlInline(literal) => literal.clone(),
            _ => continue,
        };
        match marker(&literal) {
            Some(Marker::Open { name: other, .. }) if other == name => depth += 1,
            Some(Marker::Close(other)) if other == name => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn base_children<'a>(node: &'a AstNode<'a>) -> Result<Vec<BaseInline>, ParseError> {
    demote_markdown(fold_inlines(node)?)
}

fn demote_markdown(inlines: Vec<Inline>) -> Result<Vec<BaseInline>, ParseError> {
    demote(inlines, SourceFormat::Markdown, render_inline)
        .map_err(|e| ParseError::markdown(e.to_string()))
}

/// Markdown text of a single node, as comrak would write it.
pub(crate) fn render_node<'a>(node: &'a AstNode<'a>) -> Result<String, ParseError> {
    let mut output = Vec::new();
    comrak::format_commonmark(node, &super::comrak_options(), &mut output)
        .map_err(|e| ParseError::markdown(format!("cannot re-render node: {e}")))?;
    let text = String::from_utf8(output)
        .map_err(|e| ParseError::markdown(format!("re-rendered node is not UTF-8: {e}")))?;
    Ok(text.trim_end_matches('\n').to_string())
}

/// Whether the literal is a single inline-kind carrier comment.
pub(crate) fn is_inline_carrier(literal: &str) -> bool {
    crate::common::codec::split_comment(literal)
        .map(|(kind, _)| CommentKind::is_inline(kind))
        .unwrap_or(false)
}

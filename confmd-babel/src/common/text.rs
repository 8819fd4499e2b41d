//! Inline normal form shared by both parsers.
//!
//! Documents from the two pipelines are only comparable if they agree on whitespace and text
//! boundaries, so every inline sequence a parser emits goes through these helpers.

use crate::ast::{BaseInline, Inline, SourceFormat};

/// The HTML notion of inter-element whitespace. NBSP is content, not whitespace.
pub fn is_html_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0c')
}

/// Collapses every run of HTML whitespace into a single space.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if is_html_whitespace(c) {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Merges adjacent text nodes and drops empty ones.
pub fn merge_text(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        match inline {
            Inline::Text { value } if value.is_empty() => {}
            Inline::Text { value } => match out.last_mut() {
                Some(Inline::Text { value: prev }) => prev.push_str(&value),
                _ => out.push(Inline::Text { value }),
            },
            other => out.push(other),
        }
    }
    out
}

pub fn merge_base_text(inlines: Vec<BaseInline>) -> Vec<BaseInline> {
    let mut out: Vec<BaseInline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        match inline {
            BaseInline::Text { value } if value.is_empty() => {}
            BaseInline::Text { value } => match out.last_mut() {
                Some(BaseInline::Text { value: prev }) => prev.push_str(&value),
                _ => out.push(BaseInline::Text { value }),
            },
            other => out.push(other),
        }
    }
    out
}

/// Block-level normal form: no line breaks at the edges of the block, no whitespace at the
/// edges or next to a line break.
pub fn trim_block(inlines: Vec<Inline>) -> Vec<Inline> {
    let merged = merge_text(inlines);
    let count = merged.len();
    let breaks: Vec<bool> = merged
        .iter()
        .map(|i| matches!(i, Inline::LineBreak))
        .collect();
    let mut trimmed: Vec<Inline> = merged
        .into_iter()
        .enumerate()
        .filter_map(|(idx, inline)| match inline {
            Inline::Text { value } => {
                let mut value = value.as_str();
                if idx == 0 || breaks[idx - 1] {
                    value = value.trim_start_matches(is_html_whitespace);
                }
                if idx + 1 == count || breaks[idx + 1] {
                    value = value.trim_end_matches(is_html_whitespace);
                }
                if value.is_empty() {
                    None
                } else {
                    Some(Inline::text(value))
                }
            }
            other => Some(other),
        })
        .collect();
    while matches!(trimmed.last(), Some(Inline::LineBreak)) {
        trimmed.pop();
    }
    let leading_breaks = trimmed
        .iter()
        .take_while(|i| matches!(i, Inline::LineBreak))
        .count();
    trimmed.drain(..leading_breaks);
    trimmed
}

/// Strips whitespace from the edges of a wrapper's children.
///
/// Returns whether leading and trailing whitespace was found so the caller can re-emit it
/// outside the wrapper.
pub fn hoist_edge_whitespace(children: Vec<BaseInline>) -> (bool, Vec<BaseInline>, bool) {
    let mut children = merge_base_text(children);
    let mut leading = false;
    let mut trailing = false;
    if let Some(BaseInline::Text { value }) = children.first_mut() {
        let trimmed = value.trim_start_matches(is_html_whitespace);
        if trimmed.len() != value.len() {
            leading = true;
            *value = trimmed.to_string();
        }
    }
    if let Some(BaseInline::Text { value }) = children.last_mut() {
        let trimmed = value.trim_end_matches(is_html_whitespace);
        if trimmed.len() != value.len() {
            trailing = true;
            *value = trimmed.to_string();
        }
    }
    (leading, merge_base_text(children), trailing)
}

/// Narrows inlines to the wrapper subset. Anything richer is kept as an opaque payload rendered
/// in the format it came from.
pub fn demote<F, E>(
    inlines: Vec<Inline>,
    source: SourceFormat,
    mut render: F,
) -> Result<Vec<BaseInline>, E>
where
    F: FnMut(&Inline) -> Result<String, E>,
{
    let mut demoted = Vec::with_capacity(inlines.len());
    for inline in inlines {
        match inline.into_base() {
            Ok(base) => demoted.push(base),
            Err(rich) => {
                tracing::trace!(node = rich.type_name(), %source, "demoting nested inline");
                demoted.push(BaseInline::UnsupportedInline {
                    raw: render(&rich)?,
                    source,
                });
            }
        }
    }
    Ok(merge_base_text(demoted))
}

/// Readable text of an inline sequence, used where only plain text fits.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        push_plain(inline, &mut out);
    }
    out
}

fn push_plain(inline: &Inline, out: &mut String) {
    match inline {
        Inline::Text { value } | Inline::InlineCode { value } => out.push_str(value),
        Inline::LineBreak => out.push(' '),
        Inline::Strong { children }
        | Inline::Emphasis { children }
        | Inline::Strikethrough { children }
        | Inline::Link { children, .. }
        | Inline::ColoredText { children, .. }
        | Inline::Highlight { children, .. }
        | Inline::Underline { children }
        | Inline::Subscript { children }
        | Inline::Superscript { children } => {
            for child in children {
                push_plain(&Inline::from(child.clone()), out);
            }
        }
        Inline::DateTime { datetime } => out.push_str(datetime),
        Inline::Emoticon {
            shortname,
            fallback,
            ..
        } => out.push_str(if fallback.is_empty() { shortname } else { fallback }),
        Inline::UserMention { account_id } => {
            out.push('@');
            out.push_str(account_id);
        }
        Inline::Status { title, .. } => out.push_str(title),
        Inline::UnsupportedInline { raw, .. } => out.push_str(raw),
    }
}

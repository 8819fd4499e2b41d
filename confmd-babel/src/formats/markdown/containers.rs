//! Fenced containers: `:::type [title]` … `:::`
//!
//! Before comrak sees the text, every complete container is replaced by the single-line panel
//! (or expand) comment the storage side produces, so both parsers share one macro encoding.
//! Lines inside fenced code blocks are never treated as container fences. A container with no
//! closing fence is left as ordinary text.

use crate::common::codec::Carrier;
use tracing::trace;

/// Fence opening and closing a container.
pub const CONTAINER_FENCE: &str = ":::";

/// Opening line of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opener {
    pub kind: String,
    pub title: Option<String>,
}

impl Opener {
    fn carrier(self, content: String) -> Carrier {
        if self.kind == "expand" {
            Carrier::Expand {
                title: self.title,
                content,
            }
        } else {
            Carrier::Panel {
                panel_type: self.kind,
                title: self.title,
                content,
            }
        }
    }
}

/// Rewrites every complete container into its comment encoding.
pub fn expand_containers(source: &str) -> String {
    let lines: Vec<&str> = source.split('\n').collect();
    let fenced = code_fence_mask(&lines);
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut idx = 0;
    while idx < lines.len() {
        if !fenced[idx] {
            if let Some(opener) = parse_opener(lines[idx]) {
                if let Some(close) = find_closer(&lines, &fenced, idx) {
                    let content = lines[idx + 1..close].join("\n");
                    out.push(opener.carrier(content).encode());
                    idx = close + 1;
                    continue;
                }
                trace!(line = idx + 1, "container is never closed, keeping it as text");
            }
        }
        out.push(lines[idx].to_string());
        idx += 1;
    }
    out.join("\n")
}

/// Parses `:::kind optional title`. The kind is a word of letters, digits, `-` or `_`.
pub fn parse_opener(line: &str) -> Option<Opener> {
    let rest = line.strip_prefix(CONTAINER_FENCE)?;
    let rest = rest.trim_start_matches([' ', '\t']);
    let kind_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    if kind_len == 0 {
        return None;
    }
    let (kind, title) = rest.split_at(kind_len);
    if !title.is_empty() && !title.starts_with([' ', '\t']) {
        return None;
    }
    let title = title.trim();
    Some(Opener {
        kind: kind.to_string(),
        title: (!title.is_empty()).then(|| title.to_string()),
    })
}

fn is_closer(line: &str) -> bool {
    line.trim() == CONTAINER_FENCE
}

/// Index of the fence closing the container opened at `open`, counting nested containers.
fn find_closer(lines: &[&str], fenced: &[bool], open: usize) -> Option<usize> {
    let mut depth = 1usize;
    for idx in open + 1..lines.len() {
        if fenced[idx] {
            continue;
        }
        if parse_opener(lines[idx]).is_some() {
            depth += 1;
        } else if is_closer(lines[idx]) {
            depth -= 1;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// Whether `content` can sit inside a fenced container and come back unchanged.
pub fn fits_in_container(content: &str) -> bool {
    let lines: Vec<&str> = content.split('\n').collect();
    let fenced = code_fence_mask(&lines);
    lines
        .iter()
        .zip(&fenced)
        .all(|(line, in_code)| *in_code || !line.trim_start().starts_with(CONTAINER_FENCE))
}

/// Marks the lines that open, close or sit inside a fenced code block.
pub fn code_fence_mask(lines: &[&str]) -> Vec<bool> {
    let mut mask = Vec::with_capacity(lines.len());
    let mut open: Option<(char, usize)> = None;
    for line in lines {
        let fence = code_fence(line);
        match (open, fence) {
            (None, Some((ch, len, _))) => {
                open = Some((ch, len));
                mask.push(true);
            }
            (None, None) => mask.push(false),
            (Some((ch, len)), Some((close_ch, close_len, bare)))
                if close_ch == ch && close_len >= len && bare =>
            {
                open = None;
                mask.push(true);
            }
            (Some(_), _) => mask.push(true),
        }
    }
    mask
}

/// `(fence char, fence length, nothing after the fence)` for a code fence line.
fn code_fence(line: &str) -> Option<(char, usize, bool)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let ch = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = rest.chars().take_while(|c| *c == ch).count();
    if len < 3 {
        return None;
    }
    let after = &rest[len..];
    if ch == '`' && after.contains('`') {
        return None;
    }
    Some((ch, len, after.trim().is_empty()))
}

//! Tokenizer and element matcher for storage markup.
//!
//! Storage markup is XML-ish with vendor namespaces (`ac:`, `ri:`, `at:`). The preprocessor
//! rewrites those elements before the HTML tree builder sees them, and it needs exact byte
//! spans to do so. This module produces a flat token stream (start tags with parsed attributes,
//! end tags, text, comments, CDATA) and matches elements over it by tracking depth per tag name.
//! A self-closing element never opens a level.

use crate::error::ParseError;
use std::ops::Range;

/// A start tag with its raw (still entity-encoded) attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag<'a> {
    pub name: &'a str,
    pub attrs: Vec<(&'a str, &'a str)>,
    pub self_closing: bool,
}

impl<'a> Tag<'a> {
    /// Entity-decoded value of an attribute.
    pub fn attr(&self, name: &str) -> Option<String> {
        self.attrs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| decode_entities(value))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(key, _)| *key == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind<'a> {
    Start(Tag<'a>),
    End(&'a str),
    Text,
    Comment,
    /// Content between `<![CDATA[` and `]]>`
    CData(&'a str),
    /// Declarations and processing instructions
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Range<usize>,
}

/// A matched element: its start tag, full markup and inner markup.
#[derive(Debug, Clone)]
pub struct Element<'a> {
    pub tag: Tag<'a>,
    pub outer: &'a str,
    pub inner: &'a str,
    /// Byte offset of the start tag in the scanned text
    pub offset: usize,
}

impl<'a> Element<'a> {
    pub fn attr(&self, name: &str) -> Option<String> {
        self.tag.attr(name)
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < source.len() {
        let rest = &source[pos..];
        let (kind, len) = if let Some(body) = rest.strip_prefix("<!--") {
            let end = body
                .find("-->")
                .ok_or_else(|| unterminated("comment", pos, rest))?;
            (TokenKind::Comment, 4 + end + 3)
        } else if let Some(body) = rest.strip_prefix("<![CDATA[") {
            let end = body
                .find("]]>")
                .ok_or_else(|| unterminated("CDATA section", pos, rest))?;
            (TokenKind::CData(&body[..end]), 9 + end + 3)
        } else if let Some(body) = rest.strip_prefix("</") {
            let end = body
                .find('>')
                .ok_or_else(|| unterminated("end tag", pos, rest))?;
            (TokenKind::End(body[..end].trim()), 2 + end + 1)
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest
                .find('>')
                .ok_or_else(|| unterminated("declaration", pos, rest))?;
            (TokenKind::Other, end + 1)
        } else if rest.len() > 1
            && rest.starts_with('<')
            && rest.as_bytes()[1].is_ascii_alphabetic()
        {
            let (tag, len) = parse_start_tag(rest).map_err(|message| {
                ParseError::confluence(message)
                    .at(pos)
                    .with_raw(snippet(rest))
            })?;
            (TokenKind::Start(tag), len)
        } else {
            // A '<' that opens nothing is text.
            let first = rest.chars().next().map(char::len_utf8).unwrap_or(1);
            let end = rest[first..]
                .find('<')
                .map(|i| i + first)
                .unwrap_or(rest.len());
            (TokenKind::Text, end)
        };
        tokens.push(Token {
            kind,
            span: pos..pos + len,
        });
        pos += len;
    }
    Ok(tokens)
}

fn parse_start_tag(rest: &str) -> Result<(Tag<'_>, usize), String> {
    let bytes = rest.as_bytes();
    let len = bytes.len();
    let mut i = 1;
    while i < len && is_name_byte(bytes[i]) {
        i += 1;
    }
    let name = &rest[1..i];
    let mut attrs = Vec::new();
    loop {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len {
            return Err(format!("unterminated <{name}> tag"));
        }
        match bytes[i] {
            b'>' => {
                let tag = Tag {
                    name,
                    attrs,
                    self_closing: false,
                };
                return Ok((tag, i + 1));
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                let tag = Tag {
                    name,
                    attrs,
                    self_closing: true,
                };
                return Ok((tag, i + 2));
            }
            _ => {}
        }
        let start = i;
        while i < len
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        if start == i {
            // stray '=' or '/'
            i += 1;
            continue;
        }
        let key = &rest[start..i];
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = "";
        if i < len && bytes[i] == b'=' {
            i += 1;
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= len {
                return Err(format!("unterminated <{name}> tag"));
            }
            let quote = bytes[i];
            if quote == b'"' || quote == b'\'' {
                let value_start = i + 1;
                let value_end = rest[value_start..]
                    .find(quote as char)
                    .map(|k| value_start + k)
                    .ok_or_else(|| format!("unterminated value of '{key}' in <{name}>"))?;
                value = &rest[value_start..value_end];
                i = value_end + 1;
            } else {
                let value_start = i;
                while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                    i += 1;
                }
                value = &rest[value_start..i];
            }
        }
        attrs.push((key, value));
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b':' | b'-' | b'_' | b'.')
}

/// HTML elements that never have a closing tag.
pub fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn unterminated(what: &str, pos: usize, rest: &str) -> ParseError {
    ParseError::confluence(format!("unterminated {what}"))
        .at(pos)
        .with_raw(snippet(rest))
}

fn snippet(rest: &str) -> String {
    rest.chars().take(80).collect()
}

/// Index of the token closing the start tag at `open`. Bounded by the remaining tokens.
fn find_close(tokens: &[Token<'_>], open: usize, source: &str) -> Result<usize, ParseError> {
    let (name, self_closing) = match &tokens[open].kind {
        TokenKind::Start(tag) => (tag.name, tag.self_closing),
        _ => return Ok(open),
    };
    if self_closing || is_void(name) {
        return Ok(open);
    }
    let mut depth = 1usize;
    for (idx, token) in tokens.iter().enumerate().skip(open + 1) {
        match &token.kind {
            TokenKind::Start(tag) if tag.name == name && !tag.self_closing => depth += 1,
            TokenKind::End(end) if *end == name => {
                depth -= 1;
                if depth == 0 {
                    return Ok(idx);
                }
            }
            _ => {}
        }
    }
    let span = &tokens[open].span;
    Err(ParseError::confluence(format!("<{name}> is never closed"))
        .at(span.start)
        .with_raw(&source[span.clone()]))
}

fn element_at<'a>(source: &'a str, tokens: &[Token<'a>], open: usize, close: usize) -> Element<'a> {
    let start = tokens[open].span.start;
    let end = tokens[close].span.end;
    let inner = if open == close {
        ""
    } else {
        &source[tokens[open].span.end..tokens[close].span.start]
    };
    let tag = match &tokens[open].kind {
        TokenKind::Start(tag) => tag.clone(),
        _ => Tag {
            name: "",
            attrs: Vec::new(),
            self_closing: true,
        },
    };
    Element {
        tag,
        outer: &source[start..end],
        inner,
        offset: start,
    }
}

/// Replaces every outermost element accepted by `matches` with the output of `replace`.
///
/// Returns the rewritten text and the number of replaced elements. Elements nested inside a
/// replaced one are left to `replace`.
pub fn rewrite<M, R>(
    source: &str,
    mut matches: M,
    mut replace: R,
) -> Result<(String, usize), ParseError>
where
    M: FnMut(&Tag<'_>) -> bool,
    R: FnMut(Element<'_>) -> Result<String, ParseError>,
{
    let tokens = tokenize(source)?;
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    let mut idx = 0;
    let mut count = 0;
    while idx < tokens.len() {
        if let TokenKind::Start(tag) = &tokens[idx].kind {
            if matches(tag) {
                let close = find_close(&tokens, idx, source)?;
                let element = element_at(source, &tokens, idx, close);
                out.push_str(&source[cursor..tokens[idx].span.start]);
                out.push_str(&replace(element)?);
                cursor = tokens[close].span.end;
                idx = close + 1;
                count += 1;
                continue;
            }
        }
        idx += 1;
    }
    out.push_str(&source[cursor..]);
    Ok((out, count))
}

/// Elements named in `names` that are not nested inside one another.
pub fn children<'a>(fragment: &'a str, names: &[&str]) -> Result<Vec<Element<'a>>, ParseError> {
    let tokens = tokenize(fragment)?;
    let mut found = Vec::new();
    let mut idx = 0;
    while idx < tokens.len() {
        if let TokenKind::Start(tag) = &tokens[idx].kind {
            if names.contains(&tag.name) {
                let close = find_close(&tokens, idx, fragment)?;
                found.push(element_at(fragment, &tokens, idx, close));
                idx = close + 1;
                continue;
            }
        }
        idx += 1;
    }
    Ok(found)
}

pub fn first_child<'a>(fragment: &'a str, name: &str) -> Result<Option<Element<'a>>, ParseError> {
    Ok(children(fragment, &[name])?.into_iter().next())
}

/// Text of a fragment with all tags removed: entity-decoded text plus raw CDATA content.
pub fn text_content(fragment: &str) -> Result<String, ParseError> {
    let mut out = String::new();
    for token in tokenize(fragment)? {
        match token.kind {
            TokenKind::Text => out.push_str(&decode_entities(&fragment[token.span])),
            TokenKind::CData(content) => out.push_str(content),
            _ => {}
        }
    }
    Ok(out)
}

/// Decodes the XML entities, the common named HTML entities and numeric references.
/// Unknown references are kept as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        let decoded = tail
            .find(';')
            .filter(|&end| end > 1 && end <= 10)
            .and_then(|end| entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "middot" => '\u{b7}',
        "bull" => '\u{2022}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "trade" => '\u{2122}',
        "times" => '\u{d7}',
        "rarr" => '\u{2192}',
        "larr" => '\u{2190}',
        _ => return None,
    };
    Some(c)
}

/// Escape HTML special characters in text and attribute values
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

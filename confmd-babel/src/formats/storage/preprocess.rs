//! Storage preprocessing: vendor markup → generic carrier markup.
//!
//!     The HTML tree builder does not know the `ac:`/`ri:` vocabulary, so before parsing, every
//!     vendor construct is rewritten into a plain HTML element tagged with `data-cfm-*`
//!     attributes. The passes run in a fixed order, each over the output of the previous one:
//!
//!         1. layouts          ac:layout            → flat data-cfm-layout marker divs
//!         2. macros           ac:structured-macro  → pre / panel div / details / toc div / status span
//!         3. task lists       ac:task-list         → ul[data-cfm-tasklist]
//!         4. images           ac:image             → img[data-cfm-image]
//!         5. emoticons        ac:emoticon          → span[data-cfm-emoticon]
//!         6. links            ac:link              → span[data-cfm-mention] or opaque span
//!         7. ADF extensions   ac:adf-extension     → decisions comment / panel div / fallback
//!         8. cleanup          strip leftover vendor tags, expand self-closing non-void tags
//!
//!     Every carrier keeps the markup it replaced in a base64 `data-cfm-raw` attribute, so the
//!     parser can always hand back the original storage markup for content it cannot map
//!     (see [`restore_originals`]).

use super::scanner::{self, html_escape, Element, TokenKind};
use crate::common::codec::{decode_base64, encode_base64, Carrier, Decision, LayoutSection};
use crate::common::text::collapse_whitespace;
use crate::error::ParseError;
use tracing::debug;

/// Attribute holding the base64 original of a carrier element.
pub const RAW_ATTR: &str = "data-cfm-raw";

/// Macro names rendered as classic panels.
pub const PANEL_MACROS: [&str; 4] = ["info", "note", "warning", "tip"];

pub fn preprocess(source: &str) -> Result<String, ParseError> {
    let text = layouts(source)?;
    let text = pass("macros", &text, "ac:structured-macro", rewrite_macro)?;
    let text = pass("task lists", &text, "ac:task-list", rewrite_task_list)?;
    let text = pass("images", &text, "ac:image", rewrite_image)?;
    let text = pass("emoticons", &text, "ac:emoticon", rewrite_emoticon)?;
    let text = pass("links", &text, "ac:link", rewrite_link)?;
    let text = pass("adf extensions", &text, "ac:adf-extension", rewrite_adf_extension)?;
    cleanup(&text)
}

fn pass<R>(label: &str, source: &str, element: &str, replace: R) -> Result<String, ParseError>
where
    R: FnMut(Element<'_>) -> Result<String, ParseError>,
{
    let (out, count) = scanner::rewrite(source, |tag| tag.name == element, replace)?;
    if count > 0 {
        debug!(pass = label, rewritten = count, "storage preprocessing pass");
    }
    Ok(out)
}

/// Replaces every carrier element with the original storage markup it stands for.
pub fn restore_originals(markup: &str) -> Result<String, ParseError> {
    let (out, _) = scanner::rewrite(
        markup,
        |tag| tag.has_attr(RAW_ATTR),
        |carrier| {
            let original = decode_raw(&carrier.attr(RAW_ATTR).unwrap_or_default())
                .map_err(|e| e.at(carrier.offset))?;
            restore_originals(&original)
        },
    )?;
    Ok(out)
}

/// Decodes one `data-cfm-raw` value.
pub fn decode_raw(value: &str) -> Result<String, ParseError> {
    decode_base64(value).map_err(|message| {
        ParseError::confluence(format!("corrupt {RAW_ATTR} attribute: {message}"))
    })
}

fn open_tag(name: &str, attrs: &[(&str, String)]) -> String {
    let mut out = format!("<{name}");
    for (key, value) in attrs {
        out.push_str(&format!(" {key}=\"{}\"", html_escape(value)));
    }
    out.push('>');
    out
}

fn raw(original: &str) -> (&'static str, String) {
    (RAW_ATTR, encode_base64(original))
}

/// Carrier for a construct with no typed counterpart.
fn opaque(name: &str, original: &str) -> String {
    debug!(construct = name, "keeping storage construct verbatim");
    open_tag("span", &[("data-cfm-opaque", name.to_string()), raw(original)]) + "</span>"
}

fn layout_marker(carrier: Carrier) -> String {
    let marker = carrier.layout_marker().unwrap_or_default();
    open_tag("div", &[("data-cfm-layout", marker)]) + "</div>"
}

fn layouts(source: &str) -> Result<String, ParseError> {
    pass("layouts", source, "ac:layout", |layout| {
        let mut out = layout_marker(Carrier::LayoutStart);
        let sections = scanner::children(layout.inner, &["ac:layout-section"])?;
        for (index, section) in sections.iter().enumerate() {
            let cells = scanner::children(section.inner, &["ac:layout-cell"])?;
            out.push_str(&layout_marker(Carrier::LayoutSection(LayoutSection {
                index,
                section_type: section.attr("ac:type").unwrap_or_default(),
                breakout_mode: section.attr("ac:breakout-mode").unwrap_or_default(),
                breakout_width: section.attr("ac:breakout-width").unwrap_or_default(),
                cell_count: cells.len(),
            })));
            for (cell, element) in cells.iter().enumerate() {
                out.push_str(&layout_marker(Carrier::LayoutCell {
                    section: index,
                    cell,
                }));
                out.push_str(element.inner);
            }
            out.push_str(&layout_marker(Carrier::LayoutSectionEnd { index }));
        }
        out.push_str(&layout_marker(Carrier::LayoutEnd));
        Ok(out)
    })
}

struct MacroParts<'a> {
    params: Vec<(String, String)>,
    rich_body: Option<&'a str>,
    plain_body: Option<&'a str>,
}

impl MacroParts<'_> {
    fn param(&self, key: &str) -> Option<String> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty())
    }
}

fn macro_parts<'a>(element: &Element<'a>) -> Result<MacroParts<'a>, ParseError> {
    let mut parts = MacroParts {
        params: Vec::new(),
        rich_body: None,
        plain_body: None,
    };
    let found = scanner::children(
        element.inner,
        &["ac:parameter", "ac:rich-text-body", "ac:plain-text-body"],
    )?;
    for child in found {
        match child.tag.name {
            "ac:parameter" => {
                let key = child.attr("ac:name").unwrap_or_default();
                parts.params.push((key, scanner::text_content(child.inner)?));
            }
            "ac:rich-text-body" => parts.rich_body = Some(child.inner),
            _ => parts.plain_body = Some(child.inner),
        }
    }
    Ok(parts)
}

fn rewrite_macro(element: Element<'_>) -> Result<String, ParseError> {
    let name = element.attr("ac:name").unwrap_or_default();
    let parts = macro_parts(&element)?;
    let original = raw(element.outer);
    let out = match name.as_str() {
        "code" | "noformat" => {
            let code = match parts.plain_body {
                Some(body) => scanner::text_content(body)?,
                None => String::new(),
            };
            let mut attrs = vec![("data-cfm-macro", "code".to_string())];
            if let Some(language) = parts.param("language") {
                attrs.push(("data-language", language));
            }
            attrs.push(original);
            // the tree builder drops one newline after <pre>
            format!("{}\n{}</pre>", open_tag("pre", &attrs), html_escape(&code))
        }
        panel if PANEL_MACROS.contains(&panel) => {
            let mut attrs = vec![
                ("data-cfm-macro", "panel".to_string()),
                ("data-panel-type", panel.to_string()),
            ];
            if let Some(title) = parts.param("title") {
                attrs.push(("data-title", title));
            }
            attrs.push(original);
            format!("{}{}</div>", open_tag("div", &attrs), nested_body(&parts)?)
        }
        "expand" => {
            let mut attrs = vec![("data-cfm-macro", "expand".to_string())];
            let title = parts.param("title");
            if let Some(title) = &title {
                attrs.push(("data-title", title.clone()));
            }
            attrs.push(original);
            format!(
                "{}<summary>{}</summary>{}</details>",
                open_tag("details", &attrs),
                html_escape(title.as_deref().unwrap_or_default()),
                nested_body(&parts)?
            )
        }
        "toc" => {
            let mut attrs = vec![("data-cfm-macro", "toc".to_string())];
            if let Some(min) = parts.param("minLevel") {
                attrs.push(("data-min-level", min));
            }
            if let Some(max) = parts.param("maxLevel") {
                attrs.push(("data-max-level", max));
            }
            attrs.push(original);
            open_tag("div", &attrs) + "</div>"
        }
        "status" => {
            let color = parts
                .param("colour")
                .or_else(|| parts.param("color"))
                .unwrap_or_default();
            let attrs = vec![
                ("data-cfm-macro", "status".to_string()),
                ("data-color", color),
                ("data-title", parts.param("title").unwrap_or_default()),
                original,
            ];
            open_tag("span", &attrs) + "</span>"
        }
        _ => opaque(&name, element.outer),
    };
    Ok(out)
}

/// The rich-text body with its own macros rewritten.
fn nested_body(parts: &MacroParts<'_>) -> Result<String, ParseError> {
    match parts.rich_body {
        Some(body) => {
            let (out, _) =
                scanner::rewrite(body, |tag| tag.name == "ac:structured-macro", rewrite_macro)?;
            Ok(out)
        }
        None => Ok(String::new()),
    }
}

fn rewrite_task_list(list: Element<'_>) -> Result<String, ParseError> {
    let mut out = open_tag(
        "ul",
        &[("data-cfm-tasklist", "true".to_string()), raw(list.outer)],
    );
    for task in scanner::children(list.inner, &["ac:task"])? {
        let mut id = String::new();
        let mut uuid = String::new();
        let mut status = String::new();
        let mut body = String::new();
        let fields = scanner::children(
            task.inner,
            &["ac:task-id", "ac:task-uuid", "ac:task-status", "ac:task-body"],
        )?;
        for field in fields {
            let text = scanner::text_content(field.inner)?;
            match field.tag.name {
                "ac:task-id" => id = text.trim().to_string(),
                "ac:task-uuid" => uuid = text.trim().to_string(),
                "ac:task-status" => status = text.trim().to_string(),
                _ => body = collapse_whitespace(&text).trim().to_string(),
            }
        }
        out.push_str(&open_tag(
            "li",
            &[
                ("data-task-id", id),
                ("data-task-uuid", uuid),
                ("data-task-status", status),
            ],
        ));
        out.push_str(&html_escape(&body));
        out.push_str("</li>");
    }
    out.push_str("</ul>");
    Ok(out)
}

fn rewrite_image(image: Element<'_>) -> Result<String, ParseError> {
    let targets = scanner::children(image.inner, &["ri:attachment", "ri:url", "ac:caption"])?;
    let mut attrs = vec![("data-cfm-image", "true".to_string())];
    match targets.as_slice() {
        [target] if target.tag.name == "ri:attachment" => {
            attrs.push((
                "data-attachment",
                target.attr("ri:filename").unwrap_or_default(),
            ));
            if let Some(version) = target.attr("ri:version-at-save") {
                attrs.push(("data-attachment-version", version));
            }
        }
        [target] if target.tag.name == "ri:url" => {
            attrs.push(("src", target.attr("ri:value").unwrap_or_default()));
        }
        _ => return Ok(opaque("ac:image", image.outer)),
    }
    for (from, to) in [
        ("ac:alt", "alt"),
        ("ac:title", "title"),
        ("ac:align", "data-align"),
        ("ac:width", "data-width"),
    ] {
        if let Some(value) = image.attr(from).filter(|v| !v.is_empty()) {
            attrs.push((to, value));
        }
    }
    attrs.push(raw(image.outer));
    Ok(open_tag("img", &attrs))
}

fn rewrite_emoticon(emoticon: Element<'_>) -> Result<String, ParseError> {
    let name = emoticon.attr("ac:name").unwrap_or_default();
    let shortname = emoticon
        .attr("ac:emoji-shortname")
        .filter(|s| !s.is_empty())
        .unwrap_or(name);
    let fallback = emoticon.attr("ac:emoji-fallback").unwrap_or_default();
    let attrs = [
        ("data-cfm-emoticon", "true".to_string()),
        ("data-shortname", shortname),
        (
            "data-emoji-id",
            emoticon.attr("ac:emoji-id").unwrap_or_default(),
        ),
        raw(emoticon.outer),
    ];
    Ok(format!("{}{}</span>", open_tag("span", &attrs), html_escape(&fallback)))
}

fn rewrite_link(link: Element<'_>) -> Result<String, ParseError> {
    match scanner::first_child(link.inner, "ri:user")? {
        Some(user) => {
            let account_id = user
                .attr("ri:account-id")
                .or_else(|| user.attr("ri:userkey"))
                .unwrap_or_default();
            let attrs = [
                ("data-cfm-mention", "true".to_string()),
                ("data-account-id", account_id),
                raw(link.outer),
            ];
            Ok(open_tag("span", &attrs) + "</span>")
        }
        None => Ok(opaque("ac:link", link.outer)),
    }
}

fn rewrite_adf_extension(extension: Element<'_>) -> Result<String, ParseError> {
    let parts = scanner::children(extension.inner, &["ac:adf-node", "ac:adf-fallback"])?;
    let node = parts.iter().find(|p| p.tag.name == "ac:adf-node");
    let fallback = parts.iter().find(|p| p.tag.name == "ac:adf-fallback");
    let node_type = node.and_then(|n| n.attr("type")).unwrap_or_default();
    match (node_type.as_str(), node) {
        ("decision-list", Some(node)) => {
            let mut decisions = Vec::new();
            for item in scanner::children(node.inner, &["ac:adf-node"])? {
                if item.attr("type").as_deref() != Some("decision-item") {
                    continue;
                }
                let (attributes, content) = adf_node_parts(&item)?;
                let text = match content {
                    Some(content) => collapse_whitespace(&scanner::text_content(content)?)
                        .trim()
                        .to_string(),
                    None => String::new(),
                };
                decisions.push(Decision {
                    local_id: attribute(&attributes, "local-id"),
                    state: attribute(&attributes, "state"),
                    text,
                });
            }
            Ok(Carrier::Decisions(decisions).encode())
        }
        ("panel", Some(node)) => {
            let (attributes, content) = adf_node_parts(node)?;
            let attrs = [
                ("data-cfm-macro", "panel".to_string()),
                ("data-panel-type", attribute(&attributes, "panel-type")),
                raw(extension.outer),
            ];
            Ok(format!(
                "{}{}</div>",
                open_tag("div", &attrs),
                content.unwrap_or_default()
            ))
        }
        (other, _) => {
            debug!(node_type = other, "unrecognized ADF extension, using its fallback");
            Ok(fallback.map(|f| f.inner.to_string()).unwrap_or_default())
        }
    }
}

type AdfAttributes = Vec<(String, String)>;

fn adf_node_parts<'a>(node: &Element<'a>) -> Result<(AdfAttributes, Option<&'a str>), ParseError> {
    let mut attributes = Vec::new();
    let mut content = None;
    for part in scanner::children(node.inner, &["ac:adf-attribute", "ac:adf-content"])? {
        if part.tag.name == "ac:adf-attribute" {
            let key = part.attr("key").unwrap_or_default();
            attributes.push((key, scanner::text_content(part.inner)?.trim().to_string()));
        } else {
            content = Some(part.inner);
        }
    }
    Ok((attributes, content))
}

fn attribute(attributes: &AdfAttributes, key: &str) -> String {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}

const VENDOR_PREFIXES: [&str; 3] = ["ac:", "ri:", "at:"];

fn is_vendor(name: &str) -> bool {
    VENDOR_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

fn cleanup(source: &str) -> Result<String, ParseError> {
    let tokens = scanner::tokenize(source)?;
    let mut out = String::with_capacity(source.len());
    let mut stripped = 0usize;
    for token in &tokens {
        let text = &source[token.span.clone()];
        match &token.kind {
            TokenKind::Start(tag) if is_vendor(tag.name) => stripped += 1,
            TokenKind::End(name) if is_vendor(name) => {}
            TokenKind::Start(tag) if tag.self_closing && !scanner::is_void(tag.name) => {
                out.push_str(text[..text.len() - 2].trim_end());
                out.push_str(&format!("></{}>", tag.name));
            }
            TokenKind::CData(content) => out.push_str(&html_escape(content)),
            TokenKind::Other => {}
            _ => out.push_str(text),
        }
    }
    if stripped > 0 {
        debug!(stripped, "removed leftover vendor tags");
    }
    Ok(out)
}

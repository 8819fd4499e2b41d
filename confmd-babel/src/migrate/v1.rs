//! Schema v1: single-string unsupported payloads and flat attachment filenames.

use super::{check_heading, v2};
use crate::ast::{
    self, Attachment, CodeBlock, Heading, Paragraph, SourceFormat, Table, TocMacro,
};
use crate::error::MigrationError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub children: Vec<DocumentNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_confluence: Option<String>,
}

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
    TaskList(v2::TaskList),
}

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

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
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
    pub attachment_filename: Option<String>,
}

/// `format` is `"html"` or `"markdown"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupportedBlock {
    pub raw: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct List {
    pub ordered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    pub children: Vec<ListItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    pub children: Vec<SimpleBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockQuote {
    pub children: Vec<SimpleBlock>,
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

/// v1 → v2
pub fn upgrade(doc: Document) -> Result<v2::Document, MigrationError> {
    let children = doc
        .children
        .into_iter()
        .map(upgrade_node)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(v2::Document {
        children,
        raw_confluence: doc.raw_confluence,
    })
}

fn upgrade_node(node: DocumentNode) -> Result<v2::DocumentNode, MigrationError> {
    Ok(match node {
        DocumentNode::Heading(heading) => {
            check_heading(&heading, 1)?;
            v2::DocumentNode::Heading(heading)
        }
        DocumentNode::Paragraph(p) => v2::DocumentNode::Paragraph(p),
        DocumentNode::CodeBlock(c) => v2::DocumentNode::CodeBlock(c),
        DocumentNode::ThematicBreak => v2::DocumentNode::ThematicBreak,
        DocumentNode::Image(image) => v2::DocumentNode::Image(upgrade_image(image)),
        DocumentNode::Table(t) => v2::DocumentNode::Table(t),
        DocumentNode::List(list) => v2::DocumentNode::List(ast::List {
            ordered: list.ordered,
            start: list.start,
            children: list
                .children
                .into_iter()
                .map(|item| {
                    Ok(ast::ListItem {
                        checked: item.checked,
                        children: upgrade_simple(item.children)?,
                    })
                })
                .collect::<Result<Vec<_>, MigrationError>>()?,
        }),
        DocumentNode::BlockQuote(quote) => v2::DocumentNode::BlockQuote(ast::BlockQuote {
            children: upgrade_simple(quote.children)?,
        }),
        DocumentNode::UnsupportedBlock(block) => {
            v2::DocumentNode::UnsupportedBlock(upgrade_unsupported(block)?)
        }
        DocumentNode::InfoPanel(panel) => v2::DocumentNode::InfoPanel(ast::InfoPanel {
            panel_type: panel.panel_type,
            title: panel.title,
            children: upgrade_simple(panel.children)?,
        }),
        DocumentNode::ExpandMacro(expand) => v2::DocumentNode::ExpandMacro(ast::ExpandMacro {
            title: expand.title,
            children: upgrade_simple(expand.children)?,
        }),
        DocumentNode::TocMacro(t) => v2::DocumentNode::TocMacro(t),
        DocumentNode::TaskList(t) => v2::DocumentNode::TaskList(t),
    })
}

fn upgrade_simple(blocks: Vec<SimpleBlock>) -> Result<Vec<ast::SimpleBlock>, MigrationError> {
    blocks
        .into_iter()
        .map(|block| {
            Ok(match block {
                SimpleBlock::Heading(heading) => {
                    check_heading(&heading, 1)?;
                    ast::SimpleBlock::Heading(heading)
                }
                SimpleBlock::Paragraph(p) => ast::SimpleBlock::Paragraph(p),
                SimpleBlock::CodeBlock(c) => ast::SimpleBlock::CodeBlock(c),
                SimpleBlock::ThematicBreak => ast::SimpleBlock::ThematicBreak,
                SimpleBlock::Image(image) => ast::SimpleBlock::Image(upgrade_image(image)),
                SimpleBlock::Table(t) => ast::SimpleBlock::Table(t),
                SimpleBlock::UnsupportedBlock(block) => {
                    ast::SimpleBlock::UnsupportedBlock(upgrade_unsupported(block)?)
                }
            })
        })
        .collect()
}

fn upgrade_image(image: Image) -> ast::Image {
    ast::Image {
        src: image.src,
        alt: image.alt,
        title: image.title,
        align: image.align,
        width: image.width,
        attachment: image.attachment_filename.map(|filename| Attachment {
            filename,
            version: None,
        }),
    }
}

fn upgrade_unsupported(block: UnsupportedBlock) -> Result<ast::UnsupportedBlock, MigrationError> {
    match block.format.as_str() {
        "html" => Ok(ast::UnsupportedBlock::html(block.raw, SourceFormat::Confluence)),
        "markdown" => Ok(ast::UnsupportedBlock::markdown(block.raw)),
        other => Err(MigrationError {
            node_type: "unsupportedBlock".to_string(),
            from_version: 1,
            to_version: 2,
            message: format!("unknown format tag '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Inline, TaskStatus};
    use crate::migrate::{migrate, migrate_json, StoredDocument};

    #[test]
    fn v1_document_reaches_current_shape() {
        let json = r#"{"version":1,"document":{"children":[
            {"type":"image","src":"https://x.test/a.png","attachmentFilename":"a.png"},
            {"type":"blockQuote","children":[{"type":"unsupportedBlock","raw":"<x/>","format":"html"}]},
            {"type":"unsupportedBlock","raw":"- deep","format":"markdown"},
            {"type":"taskList","children":[{"id":"7","checked":true,"body":[{"type":"text","value":"done"}]}]}
        ]}}"#;
        let doc = migrate_json(json).unwrap();
        assert_eq!(
            doc.children,
            vec![
                ast::DocumentNode::Image(ast::Image {
                    src: Some("https://x.test/a.png".into()),
                    attachment: Some(Attachment {
                        filename: "a.png".into(),
                        version: None
                    }),
                    ..ast::Image::default()
                }),
                ast::DocumentNode::BlockQuote(ast::BlockQuote {
                    children: vec![ast::SimpleBlock::UnsupportedBlock(ast::UnsupportedBlock::html(
                        "<x/>",
                        SourceFormat::Confluence
                    ))]
                }),
                ast::DocumentNode::UnsupportedBlock(ast::UnsupportedBlock::markdown("- deep")),
                ast::DocumentNode::TaskList(ast::TaskList {
                    children: vec![ast::TaskItem {
                        id: "7".into(),
                        uuid: String::new(),
                        status: TaskStatus::Complete,
                        body: vec![Inline::text("done")],
                    }]
                }),
            ]
        );
    }

    #[test]
    fn unknown_format_tag_fails() {
        let doc = Document {
            children: vec![DocumentNode::UnsupportedBlock(UnsupportedBlock {
                raw: "x".into(),
                format: "rtf".into(),
            })],
            raw_confluence: None,
        };
        let err = migrate(StoredDocument::V1(doc)).unwrap_err();
        assert_eq!(err.node_type, "unsupportedBlock");
        assert_eq!((err.from_version, err.to_version), (1, 2));
        assert!(err.message.contains("rtf"));
    }

    #[test]
    fn nested_heading_is_checked() {
        let json = r#"{"version":1,"document":{"children":[
            {"type":"infoPanel","panelType":"info","children":[{"type":"heading","level":0,"children":[]}]}
        ]}}"#;
        let err = migrate_json(json).unwrap_err();
        assert_eq!(err.node_type, "heading");
        assert_eq!(err.from_version, 1);
    }
}

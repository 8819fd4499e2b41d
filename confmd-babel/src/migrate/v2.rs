//! Schema v2: tasks are still a `checked` flag without uuid.

use super::check_heading;
use crate::ast::{
    self, BlockQuote, CodeBlock, ExpandMacro, Heading, Image, InfoPanel, Inline, List, Paragraph,
    Table, TaskStatus, TocMacro, UnsupportedBlock,
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
    TaskList(TaskList),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub children: Vec<TaskItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub checked: bool,
    pub body: Vec<Inline>,
}

/// v2 → v3
pub fn upgrade(doc: Document) -> Result<ast::Document, MigrationError> {
    let children = doc
        .children
        .into_iter()
        .map(upgrade_node)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ast::Document {
        children,
        raw_confluence: doc.raw_confluence,
    })
}

fn upgrade_node(node: DocumentNode) -> Result<ast::DocumentNode, MigrationError> {
    Ok(match node {
        DocumentNode::Heading(heading) => {
            check_heading(&heading, 2)?;
            ast::DocumentNode::Heading(heading)
        }
        DocumentNode::Paragraph(p) => ast::DocumentNode::Paragraph(p),
        DocumentNode::CodeBlock(c) => ast::DocumentNode::CodeBlock(c),
        DocumentNode::ThematicBreak => ast::DocumentNode::ThematicBreak,
        DocumentNode::Image(i) => ast::DocumentNode::Image(i),
        DocumentNode::Table(t) => ast::DocumentNode::Table(t),
        DocumentNode::List(l) => ast::DocumentNode::List(l),
        DocumentNode::BlockQuote(q) => ast::DocumentNode::BlockQuote(q),
        DocumentNode::UnsupportedBlock(u) => ast::DocumentNode::UnsupportedBlock(u),
        DocumentNode::InfoPanel(p) => ast::DocumentNode::InfoPanel(p),
        DocumentNode::ExpandMacro(e) => ast::DocumentNode::ExpandMacro(e),
        DocumentNode::TocMacro(t) => ast::DocumentNode::TocMacro(t),
        DocumentNode::TaskList(tasks) => ast::DocumentNode::TaskList(ast::TaskList {
            children: tasks
                .children
                .into_iter()
                .map(|task| ast::TaskItem {
                    id: task.id,
                    uuid: String::new(),
                    status: if task.checked {
                        TaskStatus::Complete
                    } else {
                        TaskStatus::Incomplete
                    },
                    body: task.body,
                })
                .collect(),
        }),
    })
}

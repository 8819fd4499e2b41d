//! Error types for conversion operations
//!
//! Parsing, serialization and migration each have their own error value; [`FormatError`] is the
//! registry-level wrapper that adds lookup failures.

use crate::ast::SourceFormat;
use thiserror::Error;

/// Malformed input in either pipeline.
///
/// Well-formed but unrecognized content is never an error; it becomes an unsupported node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{format} parse error{}: {message}", at_position(.position))]
pub struct ParseError {
    /// The pipeline that failed
    pub format: SourceFormat,
    pub message: String,
    /// Approximate byte offset into the input
    pub position: Option<usize>,
    /// The offending fragment, when it helps to show it
    pub raw_content: Option<String>,
}

impl ParseError {
    pub fn confluence(message: impl Into<String>) -> Self {
        ParseError {
            format: SourceFormat::Confluence,
            message: message.into(),
            position: None,
            raw_content: None,
        }
    }

    pub fn markdown(message: impl Into<String>) -> Self {
        ParseError {
            format: SourceFormat::Markdown,
            message: message.into(),
            position: None,
            raw_content: None,
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw_content = Some(raw.into());
        self
    }
}

fn at_position(position: &Option<usize>) -> String {
    position.map(|p| format!(" at byte {p}")).unwrap_or_default()
}

/// A node the target format cannot render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot serialize {node_type} to {target}: {message}")]
pub struct SerializeError {
    pub target: SourceFormat,
    pub node_type: String,
    pub message: String,
}

impl SerializeError {
    pub fn new(target: SourceFormat, node_type: &str, message: impl Into<String>) -> Self {
        SerializeError {
            target,
            node_type: node_type.to_string(),
            message: message.into(),
        }
    }
}

/// A stored document that cannot be brought up to the current schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot migrate {node_type} from v{from_version} to v{to_version}: {message}")]
pub struct MigrationError {
    pub node_type: String,
    pub from_version: u32,
    pub to_version: u32,
    pub message: String,
}

/// Errors that can occur during format operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Format not found in registry
    #[error("Format '{0}' not found")]
    FormatNotFound(String),
    /// Format does not support the operation or option
    #[error("Operation not supported: {0}")]
    NotSupported(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mentions_position() {
        let err = ParseError::confluence("unclosed <ac:structured-macro>").at(42);
        assert_eq!(
            err.to_string(),
            "confluence parse error at byte 42: unclosed <ac:structured-macro>"
        );
    }

    #[test]
    fn wrapped_errors_keep_their_message() {
        let err: FormatError =
            SerializeError::new(SourceFormat::Markdown, "heading", "level 9 is outside 1-6").into();
        assert_eq!(
            err.to_string(),
            "cannot serialize heading to markdown: level 9 is outside 1-6"
        );
    }
}

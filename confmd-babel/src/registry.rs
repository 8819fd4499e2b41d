//! Name-based lookup of the two page formats
//!
//! The sync engine knows pages by file name (`page.md`, `page.storage`) and formats by name
//! (`markdown`, `confluence`). The registry maps both to a [`Format`] and checks that the
//! format can do what is asked before handing it the text.

use crate::ast::Document;
use crate::error::FormatError;
use crate::format::Format;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, trace};

/// Registry of document formats, keyed and listed by name
///
/// # Examples
///
/// ```ignore
/// let registry = FormatRegistry::default();
/// let markdown = registry.convert("<p>Hello</p>", "confluence", "markdown")?;
/// ```
pub struct FormatRegistry {
    formats: BTreeMap<String, Box<dyn Format>>,
}

impl FormatRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        FormatRegistry {
            formats: BTreeMap::new(),
        }
    }

    /// Register a format, replacing any format of the same name
    pub fn register<F: Format + 'static>(&mut self, format: F) {
        trace!(format = format.name(), "registering format");
        self.formats
            .insert(format.name().to_string(), Box::new(format));
    }

    pub fn get(&self, name: &str) -> Result<&dyn Format, FormatError> {
        self.formats
            .get(name)
            .map(|f| f.as_ref())
            .ok_or_else(|| FormatError::FormatNotFound(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    /// Format names in sorted order
    pub fn list_formats(&self) -> Vec<String> {
        self.formats.keys().cloned().collect()
    }

    /// Name of the format claiming the file's extension, compared case-insensitively
    pub fn detect_format_from_filename(&self, filename: &str) -> Option<String> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())?
            .to_ascii_lowercase();
        self.formats
            .values()
            .find(|format| format.file_extensions().contains(&extension.as_str()))
            .map(|format| format.name().to_string())
    }

    pub fn parse(&self, source: &str, format: &str) -> Result<Document, FormatError> {
        self.reader(format)?.parse(source)
    }

    pub fn serialize(&self, doc: &Document, format: &str) -> Result<String, FormatError> {
        self.writer(format)?.serialize(doc)
    }

    /// Serialize with format options such as `panel-syntax` or `adf-panels`
    pub fn serialize_with_options(
        &self,
        doc: &Document,
        format: &str,
        options: &HashMap<String, String>,
    ) -> Result<String, FormatError> {
        self.writer(format)?.serialize_with_options(doc, options)
    }

    /// Parse with one format and serialize with another
    pub fn convert(&self, source: &str, from: &str, to: &str) -> Result<String, FormatError> {
        self.convert_with_options(source, from, to, &HashMap::new())
    }

    /// Like [`convert`](Self::convert), passing `options` to the target format.
    ///
    /// Both formats are resolved before any parsing starts.
    pub fn convert_with_options(
        &self,
        source: &str,
        from: &str,
        to: &str,
        options: &HashMap<String, String>,
    ) -> Result<String, FormatError> {
        let reader = self.reader(from)?;
        let writer = self.writer(to)?;
        debug!(from, to, bytes = source.len(), "converting");
        let doc = reader.parse(source)?;
        writer.serialize_with_options(&doc, options)
    }

    /// Create a registry holding `confluence` and `markdown` with default options
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(crate::formats::storage::ConfluenceFormat::default());
        registry.register(crate::formats::markdown::MarkdownFormat::default());
        registry
    }

    fn reader(&self, name: &str) -> Result<&dyn Format, FormatError> {
        let format = self.get(name)?;
        if !format.supports_parsing() {
            return Err(FormatError::NotSupported(format!(
                "Format '{name}' does not support parsing"
            )));
        }
        Ok(format)
    }

    fn writer(&self, name: &str) -> Result<&dyn Format, FormatError> {
        let format = self.get(name)?;
        if !format.supports_serialization() {
            return Err(FormatError::NotSupported(format!(
                "Format '{name}' does not support serialization"
            )));
        }
        Ok(format)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

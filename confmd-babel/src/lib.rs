//! Conversion core between Confluence storage format and Markdown
//!
//!     This crate turns a wiki page's storage-format markup into editable Markdown and back,
//!     preserving every construct that has no counterpart on the other side. It is a pure
//!     library: no network, no file system, no printing. The sync engine around it hands in
//!     strings and gets back strings, `Document` values or typed errors.
//!
//! Architecture
//!
//!     Both formats convert through one AST (./ast). Each format has a parser and a serializer;
//!     code shared by both directions lives in ./common:
//!
//!     .
//!     ├── ast                     # Document, blocks, macros, inlines
//!     ├── common
//!     │   ├── codec.rs            # Comment micro-format (one table, both directions)
//!     │   └── text.rs             # Inline normal form
//!     ├── formats
//!     │   ├── storage             # scanner → preprocess → html5ever → Document, and back
//!     │   └── markdown            # containers → comrak → Document, and back via comrak's AST
//!     ├── migrate                 # Stored JSON schema versions
//!     ├── error.rs
//!     ├── format.rs               # Format trait
//!     └── registry.rs             # FormatRegistry
//!
//! Carrying foreign constructs
//!
//!     Markdown has no syntax for macros, layouts, mentions, emoticons or status lozenges. They
//!     travel as single-line HTML comments (`<!-- kind:fields -->`) defined in ./common/codec.rs.
//!     Storage markup with no typed node is kept verbatim in `Unsupported*` nodes and re-emitted
//!     as-is into storage, or inside an `html`/`html-block` comment into Markdown. A Markdown
//!     document can also carry the complete page markup in a trailing `confluence-roundtrip`
//!     comment; when present it wins over the reconstructed tree.
//!
//! Round-trip guarantee
//!
//!     For documents read from well-formed storage markup, Markdown serialization followed by
//!     parsing yields an equal `Document`, and serialize → parse → serialize is a fixed point in
//!     both formats.
//!
//! Testing
//!
//!     tests
//!     ├── lib.rs
//!     ├── markdown/               # Markdown parser and serializer behaviour
//!     ├── storage/                # storage parser and serializer behaviour
//!     └── roundtrip.rs            # cross-format properties

pub mod ast;
pub mod common;
pub mod error;
pub mod format;
pub mod formats;
pub mod migrate;
pub mod registry;

pub use ast::{Document, DocumentNode, Inline, SourceFormat};
pub use error::{FormatError, MigrationError, ParseError, SerializeError};
pub use format::Format;
pub use formats::markdown::{
    parse_markdown, serialize_markdown, serialize_markdown_with_options, MarkdownOptions,
    PanelSyntax,
};
pub use formats::storage::{
    parse_storage, serialize_storage, serialize_storage_with_options, StorageOptions,
};
pub use migrate::{migrate, migrate_json, StoredDocument, CURRENT_VERSION};
pub use registry::FormatRegistry;

/// Converts storage-format markup to Markdown with default options.
pub fn storage_to_markdown(storage: &str) -> Result<String, FormatError> {
    let doc = parse_storage(storage)?;
    Ok(serialize_markdown(&doc)?)
}

/// Converts Markdown to storage-format markup with default options.
///
/// A trailing `confluence-roundtrip` comment makes the embedded markup the result.
pub fn markdown_to_storage(markdown: &str) -> Result<String, FormatError> {
    let doc = parse_markdown(markdown)?;
    Ok(serialize_storage(&doc)?)
}

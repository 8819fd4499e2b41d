//! The unified document AST shared by both pipelines.
//!
//!     Both parsers produce a [`Document`] and both serializers consume one. The tree is a plain
//!     value type: nodes are built fresh per parse call, own their children and carry no parent
//!     links, so a document can be cloned, compared and stored as JSON freely.
//!
//!     Anything a parser cannot map lands in [`UnsupportedBlock`] or [`Inline::UnsupportedInline`]
//!     together with the verbatim source text and the [`SourceFormat`] it came from. Nothing is
//!     dropped.
//!
//! Normal form
//!
//!     Both parsers emit the same normal form, which is what makes documents comparable across
//!     pipelines: adjacent text is merged, empty text removed, an ordered list starting at 1 has
//!     `start: None`, and empty optional image fields are `None`.

mod nodes;

pub use nodes::*;

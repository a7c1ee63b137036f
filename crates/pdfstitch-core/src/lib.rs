//! Byte-level merger for Chrome-produced PDFs
//!
//! Splices the per-page PDFs emitted by a headless Chrome into a single
//! navigable document with a unified outline, structure tree and named
//! destinations. The merger does no general PDF parsing: it relies on
//! the producer's one-object-per-block layout to rewrite the byte stream
//! linearly, then synthesizes a new catalog, page tree and trailer at
//! reserved high-numbered object ids.
//!
//! The pipeline per merged document:
//! ```text
//! toc.json ─► OutlineNode ─► url_ids (pre-order)
//! rendered PDFs ─► ObjectScanner ─► rewrite ─► CountingWriter
//! then: outline objects, fixed-id objects, xref, trailer
//! ```

pub mod error;
pub mod merger;
pub mod outline;
pub mod rewriter;
pub mod scanner;
pub mod trailer;
pub mod writer;

pub use error::PdfStitchError;
pub use merger::{merge, MergeSummary, Merger, MergerState, RESERVED_ID_BASE};
pub use outline::{OutlineNode, ParsedUrl, UrlResolver};
pub use scanner::{ObjectBody, ObjectScanner};
pub use writer::CountingWriter;

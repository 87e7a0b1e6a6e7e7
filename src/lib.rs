//! Article Export Markdown - XML article exports to Markdown files
//!
//! This library turns an XML export of articles (RSS 2.0, including WordPress
//! WXR exports) into one standalone Markdown file per article, each starting
//! with a YAML front matter block.
//!
//! # Architecture
//!
//! The library is structured into several modules:
//! - `charset`: Input encoding detection and decoding
//! - `xml_tree`: Namespace-aware XML parsing using quick-xml
//! - `record`: Article metadata record and front matter field order
//! - `extractor`: Record extraction from the parsed export
//! - `parser`: HTML body parsing using html5ever
//! - `converter`: Markdown generation from the body tree
//! - `sanitizer`: Filesystem-safe, collision-free file names
//! - `front_matter`: YAML front matter rendering
//! - `exporter`: Run orchestration and reporting
//! - `security`: Input size and nesting depth limits
//! - `error`: Run-level and per-article error types
//!
//! # Failure Model
//!
//! A malformed XML document aborts the whole run before anything is written.
//! Anything that goes wrong for a single article (bad metadata, body markup
//! nested too deeply, a failed write) skips that article only and is reported
//! in the [`RunReport`].
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//! use article_export_markdown::{ExportOptions, Exporter};
//!
//! let exporter = Exporter::new(ExportOptions::default());
//! let report = exporter.run(Path::new("export.xml")).unwrap();
//! println!("{} written, {} skipped", report.written_count(), report.skipped_count());
//! ```

// Module declarations
pub mod charset;
pub mod converter;
pub mod error;
pub mod exporter;
pub mod extractor;
pub mod front_matter;
pub mod parser;
pub mod record;
pub mod sanitizer;
pub mod security;
pub mod xml_tree;

// Re-export main types for convenience
pub use converter::{ConversionResult, MarkdownConverter};
pub use error::{ConversionError, RecordError, RecordFailure};
pub use exporter::{ExportOptions, Exporter, OutputFile, RunReport};
pub use parser::{MarkupNode, parse_fragment};
pub use record::ArticleRecord;

//! Export orchestration
//!
//! An export run goes through these stages:
//!
//! 1. Read the input file and check its size
//! 2. Decode it to UTF-8 ([`crate::charset`])
//! 3. Parse the XML ([`crate::xml_tree`]); failure here aborts the run
//! 4. Extract one record per article element ([`crate::extractor`])
//! 5. Plan each article: convert the body, render front matter, claim a
//!    unique file name
//! 6. Write `<name>.md` files into the output directory
//!
//! Stages 4 to 6 are per article. A failing article is recorded in the
//! [`RunReport`] and the run moves on to the next one.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::charset::decode_with_charset;
use crate::converter::{ConversionOptions, MarkdownConverter};
use crate::error::{ConversionError, RecordError, RecordFailure};
use crate::extractor::extract_records;
use crate::front_matter::render_front_matter;
use crate::record::ArticleRecord;
use crate::sanitizer::{FilenameRegistry, base_name};
use crate::security::{MAX_INPUT_BYTES, MAX_NESTING_DEPTH, MAX_XML_DEPTH, SecurityValidator};
use crate::xml_tree::XmlDocument;

/// Default article element name
pub const DEFAULT_ARTICLE_TAG: &str = "item";

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "assets";

/// Body written for articles whose Markdown is empty
pub const EMPTY_BODY_PLACEHOLDER: &str = "(No content)";

/// Extension of written files
pub const FILE_EXTENSION: &str = "md";

/// Export configuration
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Local name of the elements treated as articles
    pub article_tag: String,

    /// Directory receiving the Markdown files (must exist)
    pub output_dir: PathBuf,

    /// Largest input file accepted, in bytes
    pub max_input_bytes: usize,

    /// Deepest body markup nesting accepted
    pub max_nesting_depth: usize,

    /// Deepest export element nesting accepted
    pub max_xml_depth: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            article_tag: DEFAULT_ARTICLE_TAG.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_input_bytes: MAX_INPUT_BYTES,
            max_nesting_depth: MAX_NESTING_DEPTH,
            max_xml_depth: MAX_XML_DEPTH,
        }
    }
}

/// One file about to be written
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    /// 0-based article position in the document
    pub index: usize,
    /// Diagnostic label of the article
    pub label: String,
    /// Unique base name, without extension
    pub file_name: String,
    /// Rendered front matter, delimiters included
    pub front_matter: String,
    /// Converted body
    pub markdown: String,
    /// Unsupported elements met while converting the body
    pub unsupported_tags: usize,
}

impl OutputFile {
    /// File name with extension
    pub fn file_name_with_extension(&self) -> String {
        format!("{}.{}", self.file_name, FILE_EXTENSION)
    }

    /// Full file contents: front matter, blank line, body, final newline
    pub fn contents(&self) -> String {
        let body = if self.markdown.trim().is_empty() {
            EMPTY_BODY_PLACEHOLDER
        } else {
            self.markdown.as_str()
        };

        let mut contents =
            String::with_capacity(self.front_matter.len() + body.len() + 2);
        contents.push_str(&self.front_matter);
        contents.push('\n');
        contents.push_str(body);
        contents.push('\n');
        contents
    }
}

/// Diagnostic for a document without any article element
#[derive(Debug, Clone, PartialEq)]
pub struct NoMatch {
    /// Tag that was searched for
    pub article_tag: String,
    /// Every distinct element local name present, sorted
    pub seen_tags: Vec<String>,
}

/// Outcome of an export run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Paths written, in document order
    pub written: Vec<PathBuf>,
    /// Articles skipped, in document order
    pub failures: Vec<RecordFailure>,
    /// Set when the document holds no article element
    pub no_match: Option<NoMatch>,
    /// Unsupported elements across all written articles
    pub unsupported_tags: usize,
}

impl RunReport {
    pub fn written_count(&self) -> usize {
        self.written.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.failures.len()
    }
}

/// Runs exports with one set of options
pub struct Exporter {
    options: ExportOptions,
    converter: MarkdownConverter,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        let converter = MarkdownConverter::with_options(ConversionOptions {
            max_nesting_depth: options.max_nesting_depth,
        });
        Self { options, converter }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Export the XML file at `input`
    ///
    /// # Errors
    ///
    /// Only run-level problems are errors: unreadable or oversized input,
    /// undecodable bytes, malformed XML. Nothing is written in those cases.
    /// Per-article problems end up in [`RunReport::failures`].
    pub fn run(&self, input: &Path) -> Result<RunReport, ConversionError> {
        info!(
            input = %input.display(),
            article_tag = %self.options.article_tag,
            output_dir = %self.options.output_dir.display(),
            "starting export"
        );

        let bytes = fs::read(input).map_err(|source| ConversionError::Io {
            path: input.to_path_buf(),
            source,
        })?;

        self.export_bytes(&bytes)
    }

    /// Export raw XML bytes
    pub fn export_bytes(&self, bytes: &[u8]) -> Result<RunReport, ConversionError> {
        SecurityValidator::new()
            .max_input_bytes(self.options.max_input_bytes)
            .validate_input_size(bytes.len())?;

        let (text, charset) = decode_with_charset(bytes)?;
        debug!(charset = %charset, bytes = bytes.len(), "decoded export");

        self.export_str(&text)
    }

    /// Export an already decoded XML document
    pub fn export_str(&self, xml: &str) -> Result<RunReport, ConversionError> {
        let validator = SecurityValidator::new().max_xml_depth(self.options.max_xml_depth);
        let doc = XmlDocument::parse_with_validator(xml, &validator)?;
        let entries = extract_records(&doc, &self.options.article_tag);

        let mut report = RunReport::default();

        if entries.is_empty() {
            let seen_tags: Vec<String> = doc.tag_names().into_iter().collect();
            warn!(
                article_tag = %self.options.article_tag,
                seen_tags = ?seen_tags,
                "no article elements found"
            );
            report.no_match = Some(NoMatch {
                article_tag: self.options.article_tag.clone(),
                seen_tags,
            });
            return Ok(report);
        }

        info!(articles = entries.len(), "extracted articles");

        let mut registry = FilenameRegistry::new();
        for planned in self.plan(entries, &mut registry) {
            match planned.and_then(|file| self.write(&file).map(|path| (file, path))) {
                Ok((file, path)) => {
                    report.unsupported_tags += file.unsupported_tags;
                    report.written.push(path);
                }
                Err(failure) => {
                    warn!(%failure, "skipping article");
                    report.failures.push(failure);
                }
            }
        }

        info!(
            written = report.written_count(),
            skipped = report.skipped_count(),
            unsupported_tags = report.unsupported_tags,
            "export finished"
        );

        Ok(report)
    }

    /// Turn extracted entries into output files without touching the filesystem
    ///
    /// Order is preserved; extraction failures pass through unchanged.
    pub fn plan(
        &self,
        entries: Vec<Result<ArticleRecord, RecordFailure>>,
        registry: &mut FilenameRegistry,
    ) -> Vec<Result<OutputFile, RecordFailure>> {
        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.and_then(|record| self.plan_record(index, &record, registry)))
            .collect()
    }

    /// Plan a single article
    ///
    /// The file name is claimed only once the body converted, so a failed
    /// article never takes a name from a later one.
    pub fn plan_record(
        &self,
        index: usize,
        record: &ArticleRecord,
        registry: &mut FilenameRegistry,
    ) -> Result<OutputFile, RecordFailure> {
        let label = record.label(index);

        let converted = self
            .converter
            .convert_html(&record.body)
            .map_err(|error| RecordFailure {
                index,
                label: label.clone(),
                error,
            })?;

        if converted.unsupported_tags > 0 {
            warn!(
                index,
                label = %label,
                count = converted.unsupported_tags,
                tags = ?converted.unsupported_names,
                "unsupported tags converted as plain text"
            );
        }

        let file_name = registry.claim(&base_name(record, index));
        debug!(index, file_name = %file_name, "planned article");

        Ok(OutputFile {
            index,
            label,
            file_name,
            front_matter: render_front_matter(record),
            markdown: converted.markdown,
            unsupported_tags: converted.unsupported_tags,
        })
    }

    /// Write one planned file, removing it again if the write fails midway
    fn write(&self, file: &OutputFile) -> Result<PathBuf, RecordFailure> {
        let path = self.options.output_dir.join(file.file_name_with_extension());

        if let Err(source) = fs::write(&path, file.contents()) {
            if path.exists() {
                let _ = fs::remove_file(&path);
            }
            return Err(RecordFailure {
                index: file.index,
                label: file.label.clone(),
                error: RecordError::Write { path, source },
            });
        }

        info!(path = %path.display(), "wrote article");
        Ok(path)
    }
}

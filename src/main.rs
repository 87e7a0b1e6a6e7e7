use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use article_export_markdown::ConversionError;
use article_export_markdown::exporter::{
    DEFAULT_ARTICLE_TAG, DEFAULT_OUTPUT_DIR, ExportOptions, Exporter, RunReport,
};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "article2md")]
#[command(
    about = "Convert an XML article export (RSS / WordPress WXR) into Markdown files with YAML front matter",
    version
)]
struct Cli {
    /// XML export to convert
    xml_path: PathBuf,

    /// Directory receiving one .md file per article (created if missing)
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    /// Local name of the article elements
    #[arg(short, long, default_value = DEFAULT_ARTICLE_TAG)]
    tag: String,

    /// Log per-article details
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(source) = fs::create_dir_all(&cli.output) {
        return fail(ConversionError::Io {
            path: cli.output,
            source,
        });
    }

    let exporter = Exporter::new(ExportOptions {
        article_tag: cli.tag,
        output_dir: cli.output,
        ..Default::default()
    });

    match exporter.run(&cli.xml_path) {
        Ok(report) => {
            print_summary(&report, exporter.options());
            ExitCode::SUCCESS
        }
        Err(err) => fail(err),
    }
}

fn fail(err: ConversionError) -> ExitCode {
    error!("{err}");
    ExitCode::from(u8::try_from(err.code()).unwrap_or(1))
}

fn print_summary(report: &RunReport, options: &ExportOptions) {
    if let Some(no_match) = &report.no_match {
        println!(
            "No <{}> elements found. Tags present: {}",
            no_match.article_tag,
            no_match.seen_tags.join(", ")
        );
        return;
    }

    for failure in &report.failures {
        println!("skipped {failure}");
    }
    println!(
        "{} written to {}, {} skipped",
        report.written_count(),
        options.output_dir.display(),
        report.skipped_count()
    );
    if report.unsupported_tags > 0 {
        println!(
            "{} unsupported tags converted as plain text",
            report.unsupported_tags
        );
    }
}

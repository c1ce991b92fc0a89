//! redocx CLI - rebuild DOCX documents from positioned fragments

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use redocx::{
    render, verify_package, ConversionReport, JsonFormat, JsonProvider, LayoutOptions,
    PageSelection, ProgressEvent, Redocx, RedocxResult,
};

#[derive(Parser)]
#[command(name = "redocx")]
#[command(version)]
#[command(about = "Rebuild editable DOCX documents from positioned text and images", long_about = None)]
struct Cli {
    /// Input fragment dump (JSON)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output DOCX file
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a fragment dump to DOCX
    Convert {
        /// Input fragment dump (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (defaults to the input name with a .docx extension)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Do not insert page breaks between source pages
        #[arg(long)]
        no_page_breaks: bool,

        /// Leave images out of the package
        #[arg(long)]
        no_images: bool,

        /// Render tables without borders
        #[arg(long)]
        no_table_borders: bool,
    },

    /// Print the reconstructed text
    Text {
        /// Input fragment dump (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Print the reconstructed document model as JSON
    Json {
        /// Input fragment dump (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// JSON style
        #[arg(long, value_enum, default_value = "pretty")]
        format: JsonStyle,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Show structure statistics and the conversion report
    Inspect {
        /// Input fragment dump (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Check that a DOCX package is internally consistent
    Verify {
        /// DOCX file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

/// Options shared by every command that runs the pipeline.
#[derive(clap::Args)]
struct LayoutArgs {
    /// Layout configuration file (JSON)
    #[arg(short, long, value_name = "FILE", env = "REDOCX_CONFIG")]
    config: Option<PathBuf>,

    /// Page selection (e.g., "1-5", "1,3,5", "all")
    #[arg(short, long)]
    pages: Option<String>,

    /// Fail on the first unusable page instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Analyse pages on a single thread
    #[arg(long)]
    sequential: bool,
}

impl LayoutArgs {
    fn options(&self) -> Result<LayoutOptions, Box<dyn std::error::Error>> {
        let mut options = match &self.config {
            Some(path) => LayoutOptions::from_json_file(path)?,
            None => LayoutOptions::default(),
        };
        if let Some(pages) = &self.pages {
            let selection =
                PageSelection::parse(pages).map_err(|e| format!("Invalid page range: {}", e))?;
            options = options.with_pages(selection);
        }
        if self.strict {
            options = options.strict();
        }
        if self.sequential {
            options = options.sequential();
        }
        Ok(options)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum JsonStyle {
    /// Indented output
    Pretty,
    /// Single line
    Compact,
}

impl From<JsonStyle> for JsonFormat {
    fn from(style: JsonStyle) -> Self {
        match style {
            JsonStyle::Pretty => JsonFormat::Pretty,
            JsonStyle::Compact => JsonFormat::Compact,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Convert {
            input,
            output,
            layout,
            no_page_breaks,
            no_images,
            no_table_borders,
        }) => layout.options().and_then(|options| {
            let builder = Redocx::new()
                .with_layout_options(options)
                .with_page_breaks(!no_page_breaks)
                .with_images(!no_images)
                .with_table_borders(!no_table_borders);
            cmd_convert(&input, output.as_deref(), builder)
        }),
        Some(Commands::Text {
            input,
            output,
            layout,
        }) => layout
            .options()
            .and_then(|options| cmd_text(&input, output.as_deref(), options)),
        Some(Commands::Json {
            input,
            output,
            format,
            layout,
        }) => layout
            .options()
            .and_then(|options| cmd_json(&input, output.as_deref(), format.into(), options)),
        Some(Commands::Inspect {
            input,
            json,
            layout,
        }) => layout
            .options()
            .and_then(|options| cmd_inspect(&input, json, options)),
        Some(Commands::Verify { input }) => cmd_verify(&input),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
        None => {
            // Default behavior: convert if input is provided
            if let Some(input) = cli.input {
                cmd_convert(&input, cli.output.as_deref(), Redocx::new())
            } else {
                println!("{}", "Usage: redocx <FILE> [OUTPUT]".yellow());
                println!("       redocx --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// Run the pipeline while a progress bar follows its events.
fn reconstruct_with_progress(
    input: &Path,
    builder: Redocx,
) -> Result<RedocxResult, Box<dyn std::error::Error>> {
    log::debug!("reading fragments from {}", input.display());
    let provider = JsonProvider::from_file(input)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    let bar = pb.clone();
    let listener = thread::spawn(move || {
        for event in rx {
            match event {
                ProgressEvent::Started { total } => bar.set_length(total as u64),
                ProgressEvent::PageStarted { page } => {
                    bar.set_message(format!("page {}", page + 1));
                }
                ProgressEvent::PageFinished { .. } | ProgressEvent::PageCancelled { .. } => {
                    bar.inc(1);
                }
                ProgressEvent::PageSkipped { page, reason } => {
                    bar.println(format!(
                        "{} page {}: {}",
                        "Skipped".yellow(),
                        page + 1,
                        reason
                    ));
                    bar.inc(1);
                }
                ProgressEvent::Finished => bar.set_message("assembling"),
            }
        }
    });

    // The sender lives in the pipeline, so the listener ends when it does.
    let result = builder.with_progress(tx).reconstruct(&provider);
    let _ = listener.join();

    match result {
        Ok(result) => {
            pb.finish_with_message("Done!");
            Ok(result)
        }
        Err(e) => {
            pb.abandon_with_message("Failed");
            Err(e.into())
        }
    }
}

fn print_report(report: &ConversionReport) {
    if report.is_complete() && report.ambiguities.is_empty() {
        return;
    }

    println!();
    for skipped in &report.skipped {
        println!(
            "  {} page {}: {}",
            "skipped".yellow().bold(),
            skipped.index + 1,
            skipped.reason
        );
    }
    for page in &report.cancelled {
        println!("  {} page {}", "cancelled".red().bold(), page + 1);
    }
    for (category, count) in &report.ambiguities {
        println!("  {} {} x{}", "fallback".dimmed(), category, count);
    }
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    builder: Redocx,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension("docx"));

    let result = reconstruct_with_progress(input, builder)?;
    result.write_docx(&output)?;

    let report = &result.report;
    println!(
        "{} {} ({} of {} pages)",
        "Saved to".green(),
        output.display(),
        report.pages_processed,
        report.pages_total
    );
    print_report(report);

    Ok(())
}

fn cmd_text(
    input: &Path,
    output: Option<&Path>,
    options: LayoutOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = Redocx::new()
        .with_layout_options(options)
        .reconstruct_file(input)?;
    let text = result.to_text();

    if let Some(path) = output {
        fs::write(path, &text)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", text);
    }

    Ok(())
}

fn cmd_json(
    input: &Path,
    output: Option<&Path>,
    format: JsonFormat,
    options: LayoutOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = Redocx::new()
        .with_layout_options(options)
        .reconstruct_file(input)?;
    let json = render::to_json(&result.document, format)?;

    if let Some(path) = output {
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

fn cmd_inspect(
    input: &Path,
    json: bool,
    options: LayoutOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = Redocx::new()
        .with_layout_options(options)
        .reconstruct_file(input)?;
    let stats = result.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let metadata = &result.document.metadata;
    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Pages".bold(), metadata.page_count);
    if let Some(ref title) = metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref creator) = metadata.creator {
        println!("{}: {}", "Creator".bold(), creator);
    }

    println!();
    println!("{}", "Structure".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Sections".bold(), stats.section_count);
    println!("{}: {}", "Headings".bold(), stats.heading_count);
    println!("{}: {}", "Paragraphs".bold(), stats.paragraph_count);
    println!("{}: {}", "List items".bold(), stats.list_item_count);
    println!("{}: {}", "Tables".bold(), stats.table_count);
    println!("{}: {}", "Images".bold(), stats.image_count);
    println!("{}: {}", "Words".bold(), stats.word_count);
    println!("{}: {}", "Characters".bold(), stats.char_count);

    let palette = &result.document.palette;
    println!(
        "{}: {:.1}pt, {} heading level(s)",
        "Body size".bold(),
        palette.body_size(),
        palette.heading_style_count()
    );

    print_report(&result.report);

    Ok(())
}

fn cmd_verify(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let report = verify_package(&bytes)?;

    println!("{} {}", "Valid package".green().bold(), input.display());
    println!("  {} {} parts", "├─".dimmed(), report.parts);
    println!("  {} {} relationships", "├─".dimmed(), report.relationships);
    println!("  {} {} media", "├─".dimmed(), report.media);
    println!("  {} {} references", "└─".dimmed(), report.references);

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "redocx".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Layout-driven document reconstruction tool");
}

#[cfg(test)]
mod tests {
    use super::*;
    use redocx::ErrorMode;

    fn args(config: Option<PathBuf>, pages: Option<&str>) -> LayoutArgs {
        LayoutArgs {
            config,
            pages: pages.map(String::from),
            strict: true,
            sequential: false,
        }
    }

    #[test]
    fn test_layout_args_merge_config_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("layout.json");
        fs::write(&config, r#"{"parallel": false, "cluster_iteration_cap": 12}"#).unwrap();

        let options = args(Some(config), Some("2-3")).options().unwrap();
        assert!(!options.parallel);
        assert_eq!(options.cluster_iteration_cap, 12);
        assert_eq!(options.error_mode, ErrorMode::Strict);
        assert_eq!(options.pages, PageSelection::Range(2..=3));
    }

    #[test]
    fn test_layout_args_reject_bad_pages() {
        assert!(args(None, Some("5-2")).options().is_err());
    }

    #[test]
    fn test_cli_parses_convert() {
        let cli = Cli::try_parse_from([
            "redocx",
            "convert",
            "in.json",
            "-o",
            "out.docx",
            "--no-page-breaks",
            "--pages",
            "1,3",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Convert {
                output,
                no_page_breaks,
                layout,
                ..
            }) => {
                assert_eq!(output, Some(PathBuf::from("out.docx")));
                assert!(no_page_breaks);
                assert_eq!(layout.pages.as_deref(), Some("1,3"));
            }
            _ => panic!("expected convert"),
        }
    }
}

//! rapport CLI - business report export tool

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use rapport::layout::{MarginProfile, Orientation, PageSize};
use rapport::model::{DesignSettings, Document};
use rapport::{export_as, ContentStats, ExportFormat, ExportOptions, ExportResult};

#[derive(Parser)]
#[command(name = "rapport")]
#[command(version)]
#[command(
    about = "Export report documents to PDF, DOCX, XLSX, HTML, Markdown and PPTX",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a document in one format
    Export {
        /// Input document (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Format,

        /// Output directory
        #[arg(short, long, value_name = "DIR", env = "RAPPORT_OUTPUT_DIR")]
        output: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Export a document in every format
    All {
        /// Input document (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, value_name = "DIR", env = "RAPPORT_OUTPUT_DIR")]
        output: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Show document information
    Info {
        /// Input document (JSON)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported output formats
    Formats,
}

#[derive(clap::Args, Clone)]
struct LayoutArgs {
    /// Paper size
    #[arg(long, value_enum, default_value = "a4")]
    page_size: PaperArg,

    /// Page orientation
    #[arg(long, value_enum, default_value = "portrait")]
    orientation: OrientationArg,

    /// Margin profile
    #[arg(long, value_enum, default_value = "normal")]
    margins: MarginArg,

    /// Skip the cover page
    #[arg(long)]
    no_cover: bool,

    /// Skip the table of contents
    #[arg(long)]
    no_toc: bool,

    /// Generation timestamp (RFC 3339) for reproducible output
    #[arg(long, value_name = "DATE", env = "RAPPORT_GENERATED_AT")]
    generated_at: Option<String>,

    /// Primary brand colour (hex)
    #[arg(long, value_name = "HEX")]
    primary_color: Option<String>,

    /// Footer branding text
    #[arg(long, value_name = "TEXT")]
    footer: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    Pdf,
    Docx,
    Xlsx,
    Html,
    #[value(alias = "md")]
    Markdown,
    Pptx,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Pdf => ExportFormat::Pdf,
            Format::Docx => ExportFormat::Docx,
            Format::Xlsx => ExportFormat::Xlsx,
            Format::Html => ExportFormat::Html,
            Format::Markdown => ExportFormat::Markdown,
            Format::Pptx => ExportFormat::Pptx,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PaperArg {
    A4,
    A3,
    Letter,
}

impl From<PaperArg> for PageSize {
    fn from(size: PaperArg) -> Self {
        match size {
            PaperArg::A4 => PageSize::A4,
            PaperArg::A3 => PageSize::A3,
            PaperArg::Letter => PageSize::Letter,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OrientationArg {
    Portrait,
    Landscape,
}

impl From<OrientationArg> for Orientation {
    fn from(orientation: OrientationArg) -> Self {
        match orientation {
            OrientationArg::Portrait => Orientation::Portrait,
            OrientationArg::Landscape => Orientation::Landscape,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum MarginArg {
    Normal,
    Narrow,
    Wide,
}

impl From<MarginArg> for MarginProfile {
    fn from(margins: MarginArg) -> Self {
        match margins {
            MarginArg::Normal => MarginProfile::Normal,
            MarginArg::Narrow => MarginProfile::Narrow,
            MarginArg::Wide => MarginProfile::Wide,
        }
    }
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Export {
            input,
            format,
            output,
            layout,
        } => cmd_export(&input, format.into(), output.as_deref(), &layout),
        Commands::All {
            input,
            output,
            layout,
        } => cmd_all(&input, output.as_deref(), &layout),
        Commands::Info { input, json } => cmd_info(&input, json),
        Commands::Formats => {
            cmd_formats();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn load(input: &Path, layout: &LayoutArgs) -> CliResult<Document> {
    let json = fs::read_to_string(input)?;
    let mut document = Document::from_json(&json)?;

    if layout.primary_color.is_some() || layout.footer.is_some() {
        let mut design = document.design.take().unwrap_or_else(DesignSettings::new);
        if let Some(ref hex) = layout.primary_color {
            design.primary_color = Some(hex.clone());
        }
        if let Some(ref footer) = layout.footer {
            design.footer_text = Some(footer.clone());
        }
        document.design = Some(design);
    }

    Ok(document)
}

fn build_options(document: &Document, layout: &LayoutArgs) -> CliResult<ExportOptions> {
    let mut options = ExportOptions::new()
        .with_page_size(layout.page_size.into())
        .with_orientation(layout.orientation.into())
        .with_margins(layout.margins.into())
        .with_cover_page(!layout.no_cover)
        .with_table_of_contents(!layout.no_toc);

    if let Some(ref date) = layout.generated_at {
        options = options.with_generated_at(parse_timestamp(date)?);
    }
    if let Some(ref design) = document.design {
        options = options.with_design(design.clone());
    }

    Ok(options)
}

fn parse_timestamp(value: &str) -> CliResult<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|e| format!("Invalid timestamp \"{}\": {}", value, e))?;
    Ok(parsed.with_timezone(&Utc))
}

fn output_dir(input: &Path, output: Option<&Path>) -> PathBuf {
    output.map(Path::to_path_buf).unwrap_or_else(|| {
        input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

fn write_result(dir: &Path, format: ExportFormat, result: ExportResult) -> CliResult<PathBuf> {
    let units = result.unit_count;
    let (filename, bytes) = result.into_result()?;
    let path = dir.join(filename);
    fs::write(&path, &bytes)?;

    println!(
        "{} {} {}",
        "Saved".green(),
        path.display(),
        format!("({} bytes, {} {})", bytes.len(), units, format.unit_label()).dimmed()
    );

    Ok(path)
}

fn cmd_export(
    input: &Path,
    format: ExportFormat,
    output: Option<&Path>,
    layout: &LayoutArgs,
) -> CliResult<()> {
    let document = load(input, layout)?;
    let options = build_options(&document, layout)?;

    let dir = output_dir(input, output);
    fs::create_dir_all(&dir)?;

    let result = export_as(&document.report, &document.content, format, &options);
    write_result(&dir, format, result)?;

    Ok(())
}

fn cmd_all(input: &Path, output: Option<&Path>, layout: &LayoutArgs) -> CliResult<()> {
    let document = load(input, layout)?;
    let options = build_options(&document, layout)?;

    let dir = output_dir(input, output);
    fs::create_dir_all(&dir)?;

    let mut failures = 0;
    for format in ExportFormat::ALL {
        let result = export_as(&document.report, &document.content, format, &options);
        if let Err(e) = write_result(&dir, format, result) {
            eprintln!("{} {}: {}", "Failed".red(), format, e);
            failures += 1;
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} exports failed", failures, ExportFormat::ALL.len()).into());
    }

    println!("\n{} {} files written", "Done!".green().bold(), ExportFormat::ALL.len());
    Ok(())
}

fn cmd_info(input: &Path, json: bool) -> CliResult<()> {
    let document = Document::from_json(&fs::read_to_string(input)?)?;
    let stats = ContentStats::collect(&document.content);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let report = &document.report;
    println!("{}", "Report Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Title".bold(), report.title);
    for (label, value) in report.summary_rows() {
        if label != "Titre" && !value.is_empty() {
            println!("{}: {}", label.bold(), value);
        }
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "Sections".bold(), stats.section_count);
    println!("{}: {}", "Max depth".bold(), stats.max_depth);
    println!("{}: {}", "Blocks".bold(), stats.block_count());
    println!("{}: {}", "Tables".bold(), stats.table_count);
    println!("{}: {}", "Charts".bold(), stats.chart_count);
    println!("{}: {}", "KPIs".bold(), stats.kpi_count);
    println!("{}: {}", "Images".bold(), stats.image_count);
    println!("{}: {}", "Words".bold(), stats.word_count);

    let violations = document.content.validate();
    if !violations.is_empty() {
        println!();
        println!("{}", "Warnings".yellow().bold());
        for violation in violations {
            println!("  {} {}", "!".yellow(), violation);
        }
    }

    Ok(())
}

fn cmd_formats() {
    println!("{}", "Supported formats".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for format in ExportFormat::ALL {
        println!(
            "  {:<10} .{:<5} {}",
            format.as_str().bold(),
            format.extension(),
            format.mime_type().dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "report": {
            "id": "r1", "title": "Bilan T1", "createdAt": "2024-04-02T09:30:00Z",
            "updatedAt": "2024-04-02T09:30:00Z"
        },
        "content": { "sections": [ { "id": "s1", "title": "Synthèse", "level": 1,
            "blocks": [ { "type": "paragraph", "content": "Bonjour" } ] } ] }
    }"#;

    fn layout() -> LayoutArgs {
        LayoutArgs {
            page_size: PaperArg::A4,
            orientation: OrientationArg::Portrait,
            margins: MarginArg::Normal,
            no_cover: false,
            no_toc: true,
            generated_at: Some("2024-04-05T08:00:00Z".to_string()),
            primary_color: None,
            footer: Some("Interne".to_string()),
        }
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_args() {
        let cli = Cli::try_parse_from([
            "rapport", "export", "doc.json", "--format", "md", "--orientation", "landscape",
        ])
        .unwrap();
        match cli.command {
            Commands::Export { format, layout, .. } => {
                assert!(format == Format::Markdown);
                assert!(layout.orientation == OrientationArg::Landscape);
                assert!(!layout.no_cover);
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.json");
        fs::write(&input, DOCUMENT).unwrap();

        let out = dir.path().join("out");
        cmd_export(&input, ExportFormat::Markdown, Some(&out), &layout()).unwrap();

        let text = fs::read_to_string(out.join("Bilan_T1.md")).unwrap();
        assert!(text.contains("Interne"));
        assert!(!text.contains("Sommaire"));
    }

    #[test]
    fn test_all_writes_every_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.json");
        fs::write(&input, DOCUMENT).unwrap();

        cmd_all(&input, None, &layout()).unwrap();
        for ext in ["pdf", "docx", "xlsx", "html", "md", "pptx"] {
            assert!(dir.path().join(format!("Bilan_T1.{}", ext)).exists(), "{}", ext);
        }
    }

    #[test]
    fn test_invalid_timestamp() {
        assert!(parse_timestamp("hier").is_err());
        let at = parse_timestamp("2024-04-05T10:00:00+02:00").unwrap();
        assert_eq!(at.to_rfc3339(), "2024-04-05T08:00:00+00:00");
    }
}

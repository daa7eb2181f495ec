use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wfexport_core::export::{ExportReport, run_export};
use wfexport_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, inspect_source, normalize_for_display,
    resolve_paths,
};
use wfexport_core::source::{Category, load_row_set};

#[derive(Debug, Parser)]
#[command(
    name = "wfexport",
    version,
    about = "Export a WriteFreely database to Markdown files for a static site"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Directory containing writefreely.db, config.ini and static/img"
    )]
    source_root: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Destination content directory (default: ./content)"
    )]
    output_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    source_root: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            source_root: cli.source_root.clone(),
            output_dir: cli.output_dir.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Write pages, posts, drafts, config.json and images (default)")]
    Export,
    #[command(about = "Show resolved paths and row counts without writing anything")]
    Inspect,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Export) | None => run_export_command(&runtime).await,
        Some(Commands::Inspect) => run_inspect(&runtime),
    }
}

async fn run_export_command(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    println!("Database path: {}", normalize_for_display(&paths.db_path));
    println!("Writing to {}/", normalize_for_display(&paths.content_dir));

    let report = run_export(&paths).await?;
    print_report(&report);
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }

    if !report.is_success() {
        bail!(
            "export finished with {} failed output(s); {} file(s) were written",
            report.failures.len(),
            report.written.len()
        );
    }
    Ok(())
}

fn run_inspect(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_source(&paths)?;

    println!("source inspect");
    println!("source_root: {}", normalize_for_display(&paths.source_root));
    println!("db_path: {}", normalize_for_display(&paths.db_path));
    println!("db_exists: {}", format_flag(status.db_exists));
    println!(
        "db_size_bytes: {}",
        status
            .db_size_bytes
            .map(|size| size.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!("config_exists: {}", format_flag(status.config_exists));
    println!(
        "image_source_exists: {}",
        format_flag(status.image_source_exists)
    );
    println!("content_dir: {}", normalize_for_display(&paths.content_dir));
    println!(
        "content_dir_exists: {}",
        format_flag(status.content_dir_exists)
    );
    if status.db_exists {
        let rows = load_row_set(&paths.db_path)?;
        for category in Category::ALL {
            println!(
                "rows.{}: {}",
                category.folder(),
                rows.rows(category).len()
            );
        }
    }
    if !status.warnings.is_empty() {
        println!("warnings:");
        for warning in &status.warnings {
            println!("  - {warning}");
        }
    }
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
    Ok(())
}

fn print_report(report: &ExportReport) {
    println!("export summary");
    println!("rows_read: {}", report.rows_read);
    println!("created_dirs: {}", report.created_dirs.len());
    for category in Category::ALL {
        println!(
            "written.{}: {}",
            category.folder(),
            report.written_for(category)
        );
    }
    println!(
        "images_copied: {}",
        report
            .assets_copied()
            .map(|count| count.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!("completed: {}", report.written.len());
    println!("failed: {}", report.failures.len());
    for failure in &report.failures {
        let target = failure
            .target
            .map(|target| target.label())
            .unwrap_or_else(|| "<task>".to_string());
        match &failure.path {
            Some(path) => println!(
                "  - {target} [{}] {}: {}",
                failure.kind,
                normalize_for_display(path),
                failure.message
            ),
            None => println!("  - {target} [{}] {}", failure.kind, failure.message),
        }
    }
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        source_root: runtime.source_root.clone(),
        output_dir: runtime.output_dir.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let source_env = initial.source_root.join(".env");
    if source_env.exists() {
        let _ = dotenvy::from_path_override(&source_env);
    }

    resolve_paths(&context, &overrides)
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

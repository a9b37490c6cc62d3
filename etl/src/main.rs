//! APL ETL CLI - Normalize APL exports into processed datasets
//!
//! # Main Commands
//!
//! ```bash
//! apl-etl run                          # Process the five datasets + yearly summary
//! apl-etl run --concurrent             # Same, datasets in parallel
//! apl-etl run --config registry.json   # Custom dataset registry
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! apl-etl parse export.csv             # Show detected encoding, headers, row count
//! apl-etl normalize "Año Adhesión"     # Canonicalize header names
//! apl-etl steps                        # Show available transformation steps
//! apl-etl config                       # Print the default registry as JSON
//! ```
//!
//! `APL_PROJECT_ROOT` and `APL_OUTPUT_DIR` (also read from `.env`) supply
//! defaults for `--project-root` and `--output-dir`.

use apl_etl::logs::{log_info, LOG_BROADCASTER};
use apl_etl::{
    decode_content, detect_encoding, normalize_column_name, parse_bytes_auto, parse_str,
    steps_description, EtlConfig, EtlPipeline, RunManifest,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT_ROOT_VAR: &str = "APL_PROJECT_ROOT";
const OUTPUT_DIR_VAR: &str = "APL_OUTPUT_DIR";

#[derive(Parser)]
#[command(name = "apl-etl")]
#[command(about = "Normalize APL spreadsheet exports into processed CSV datasets")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every dataset, then build the yearly summary
    Run {
        /// Directory holding the raw exports (default: $APL_PROJECT_ROOT or .)
        #[arg(short, long)]
        project_root: Option<PathBuf>,

        /// Output directory (default: $APL_OUTPUT_DIR or <project-root>/data/processed)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// JSON dataset registry instead of the built-in one
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run datasets in parallel
        #[arg(long)]
        concurrent: bool,

        /// Do not echo pipeline logs
        #[arg(short, long)]
        quiet: bool,
    },

    /// Parse a CSV file and show what the pipeline would see
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Canonicalize header names
    Normalize {
        /// Raw header names
        #[arg(required = true)]
        headers: Vec<String>,
    },

    /// Show available transformation steps
    Steps,

    /// Print the default dataset registry as JSON
    Config {
        /// Directory holding the raw exports (default: $APL_PROJECT_ROOT or .)
        #[arg(short, long)]
        project_root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            project_root,
            output_dir,
            config,
            concurrent,
            quiet,
        } => {
            cmd_run(
                project_root,
                output_dir,
                config.as_deref(),
                concurrent,
                quiet,
            )
            .await
        }

        Commands::Parse { input, delimiter } => cmd_parse(&input, delimiter),

        Commands::Normalize { headers } => cmd_normalize(&headers),

        Commands::Steps => cmd_steps(),

        Commands::Config { project_root } => cmd_config(project_root),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn project_root(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(PROJECT_ROOT_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn cmd_run(
    project_root_flag: Option<PathBuf>,
    output_dir_flag: Option<PathBuf>,
    config_path: Option<&Path>,
    concurrent: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    LOG_BROADCASTER.set_echo(!quiet);
    let started_at = Utc::now();

    let root = project_root(project_root_flag);
    let mut config = match config_path {
        Some(path) => EtlConfig::from_json_file(path, &root)?,
        None => EtlConfig::build_default(&root),
    };
    let output_dir =
        output_dir_flag.or_else(|| std::env::var_os(OUTPUT_DIR_VAR).map(PathBuf::from));
    if let Some(dir) = output_dir {
        config = config.with_output_dir(dir);
    }

    eprintln!("📂 Project root: {}", root.display());
    eprintln!("   Output: {}", config.output_dir.display());
    eprintln!("   Datasets: {}", config.dataset_names().join(", "));

    let pipeline = EtlPipeline::new(config);
    let outcome = if concurrent {
        pipeline.run_concurrent_with_summary().await
    } else {
        pipeline.run_with_summary()
    };

    let manifest = RunManifest::from_report(
        &outcome.report,
        outcome.summary.as_ref().ok(),
        pipeline.output_dir(),
        started_at,
    );
    let manifest_path = manifest.write()?;
    log_info(format!("manifest {} → {}", manifest.run_id, manifest_path.display()));

    eprintln!("\n📊 Results:");
    for (name, result) in &outcome.report.results {
        eprintln!(
            "   ✅ {}: {} rows → {}",
            name,
            result.table.height(),
            result.destination.display()
        );
    }
    for (name, err) in &outcome.report.failures {
        eprintln!("   ❌ {}: {}", name, err);
    }
    match &outcome.summary {
        Ok(summary) => eprintln!(
            "   ✅ yearly summary: {} years → {}",
            summary.table.height(),
            summary.destination.display()
        ),
        Err(err) => eprintln!("   ❌ yearly summary: {}", err),
    }

    let failed = outcome.report.failures.len() + usize::from(outcome.summary.is_err());
    if failed > 0 {
        let total = pipeline.config().datasets.len() + 1;
        return Err(format!("{} of {} outputs failed", failed, total).into());
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_parse(input: &Path, delimiter: Option<char>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let bytes = fs::read(input)?;
    let (table, encoding, used_delimiter) = match delimiter {
        Some(d) => {
            let encoding = detect_encoding(&bytes);
            let content = decode_content(&bytes, &encoding)?;
            (parse_str(&content, d)?, encoding, d)
        }
        None => {
            let parsed = parse_bytes_auto(&bytes)?;
            (parsed.table, parsed.encoding, parsed.delimiter)
        }
    };

    eprintln!("   Encoding: {}", encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(used_delimiter),
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns:");
    for name in table.column_names() {
        println!("   {} → {}", name, normalize_column_name(name));
    }
    eprintln!("✅ Parsed {} rows", table.height());

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn cmd_normalize(headers: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    for header in headers {
        println!("{}", normalize_column_name(header));
    }
    Ok(())
}

fn cmd_steps() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", steps_description());
    Ok(())
}

fn cmd_config(project_root_flag: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = EtlConfig::build_default(&project_root(project_root_flag));
    let json = serde_json::to_string_pretty(&config)?;
    println!("{}", json);
    Ok(())
}

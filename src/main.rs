//! dbfiles CLI - Command-line tool for inspecting client database tables.
//!
//! This is the main entry point for the dbfiles command-line application.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use dbfiles::prelude::*;

/// dbfiles - client database table inspection tool
#[derive(Parser)]
#[command(name = "dbfiles")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log decoder activity (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read the whole file into memory instead of mapping it
    #[arg(long, global = true)]
    no_mmap: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header and segment layout of a table
    Info {
        /// Path to the table file
        #[arg(short, long, env = "DBFILES_INPUT")]
        input: PathBuf,

        /// Print the layout as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the string block with offsets
    Strings {
        /// Path to the table file
        #[arg(short, long, env = "DBFILES_INPUT")]
        input: PathBuf,
    },

    /// Summarize the common table columns of a WDB6 file
    Common {
        /// Path to the table file
        #[arg(short, long, env = "DBFILES_INPUT")]
        input: PathBuf,
    },

    /// Dump every record's raw column values as JSON lines
    Dump {
        /// Path to the table file
        #[arg(short, long, env = "DBFILES_INPUT")]
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also emit rows from the copy table
        #[arg(long)]
        copies: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = LoadOptions {
        memory_map: !cli.no_mmap,
        ..Default::default()
    };

    match cli.command {
        Commands::Info { input, json } => {
            cmd_info(&input, options, json)?;
        }
        Commands::Strings { input } => {
            cmd_strings(&input, options)?;
        }
        Commands::Common { input } => {
            cmd_common(&input, options)?;
        }
        Commands::Dump { input, output, copies } => {
            let options = LoadOptions {
                include_copies: copies,
                ..options
            };
            cmd_dump(&input, output.as_deref(), options)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "dbfiles_wdb=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open(input: &Path, options: LoadOptions) -> Result<ClientFile> {
    let start = Instant::now();
    let file = ClientFile::open_with(input, options)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    tracing::info!(
        path = %input.display(),
        version = %file.version(),
        records = file.record_count(),
        elapsed = ?start.elapsed(),
        "loaded table"
    );
    Ok(file)
}

fn cmd_info(input: &Path, options: LoadOptions, json: bool) -> Result<()> {
    let file = open(input, options)?;
    let layout = file.layout();

    if json {
        let text = serde_json::to_string_pretty(layout).context("Failed to serialize layout")?;
        println!("{text}");
        return Ok(());
    }

    println!("Format:       {}", layout.version);
    println!("Records:      {}", file.record_count());
    println!("Fields:       {}", layout.field_count);
    println!("Record size:  {}", layout.record_size);
    println!("Id range:     {}..={}", layout.min_id, layout.max_id);
    println!("Table hash:   {:#010x}", layout.table_hash);
    if !layout.version.is_legacy() {
        println!("Layout hash:  {:#010x}", layout.layout_hash);
        println!("Flags:        {:#06x}", layout.flags);
    }
    println!("Plan style:   {:?}", layout.plan_style());

    println!("\nSegments:");
    for (name, segment) in layout.segments() {
        println!("  {:<18} {:>10} {:>10}", name, segment.start, segment.len);
    }

    if !layout.descriptors.is_empty() {
        println!("\nColumns:");
        for (i, d) in layout.descriptors.iter().enumerate() {
            println!(
                "  {:>3} {:<20} bit {:>6} width {:>4} x{}",
                i,
                d.compression.as_str(),
                d.bit_offset,
                d.bit_width,
                d.cardinality
            );
        }
    }

    Ok(())
}

fn cmd_strings(input: &Path, options: LoadOptions) -> Result<()> {
    let file = open(input, options)?;
    let Some(strings) = file.strings() else {
        anyhow::bail!("{} stores its strings inline", input.display());
    };

    for (offset, value) in strings.entries() {
        println!("{offset:>8} {value}");
    }
    println!("\nTotal: {} strings", strings.len());

    Ok(())
}

fn cmd_common(input: &Path, options: LoadOptions) -> Result<()> {
    let file = open(input, options)?;
    let Some(common) = file.common() else {
        anyhow::bail!("{} has no common table", input.display());
    };

    println!("Encoding: {:?}", common.encoding());
    let base = file.common_column_base();
    for (i, column) in common.columns().iter().enumerate() {
        let mapped = if i >= base { "mapped" } else { "" };
        println!(
            "  {:>3} {:<8} {:>8} entries {}",
            i,
            format!("{:?}", column.value_type()),
            column.len(),
            mapped
        );
    }

    Ok(())
}

fn cmd_dump(input: &Path, output: Option<&Path>, options: LoadOptions) -> Result<()> {
    let file = open(input, options)?;
    let count = file.record_count();

    let (mut writer, pb): (Box<dyn Write>, _) = match output {
        Some(path) => {
            let out = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let pb = ProgressBar::new(count as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                    .progress_chars("#>-"),
            );
            (Box::new(BufWriter::new(out)), pb)
        }
        None => (Box::new(BufWriter::new(io::stdout().lock())), ProgressBar::hidden()),
    };

    let start = Instant::now();
    let mut errors = 0;

    for index in 0..count {
        let row = file
            .record_key(index)
            .and_then(|key| file.raw_row(index).map(|columns| (key, columns)));

        match row {
            Ok((key, columns)) => {
                let line = serde_json::json!({ "index": index, "key": key, "columns": columns });
                writeln!(writer, "{line}")?;

                let copies = match key {
                    Some(key) if file.options().include_copies => file.segments().copies_of(key),
                    _ => &[],
                };
                for copy in copies {
                    let line = serde_json::json!({ "index": index, "key": copy, "columns": columns });
                    writeln!(writer, "{line}")?;
                }
            }
            Err(e) if e.kind() == ErrorKind::UnsupportedLayout => {
                pb.abandon();
                return Err(e).context("Raw dumps need fixed-stride records");
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping record");
                errors += 1;
            }
        }

        pb.inc(1);
    }

    writer.flush()?;
    pb.finish_with_message("Done");
    tracing::info!(records = count, errors, elapsed = ?start.elapsed(), "dump complete");

    Ok(())
}

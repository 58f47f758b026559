//! Veles CLI - schema reconstruction for legacy client database dumps.
//!
//! The expected layout on disk is a dump root with one directory per client
//! build (`1.12.1.5875/Spell.dbc`, ...) and an output directory holding one
//! schema store document per logical table. The subcommands are the stages
//! of a reconstruction run: `export` scans every file, `row-match` merges
//! entries on raw-row evidence, `compare` propagates names statistically.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use veles::prelude::*;

/// Veles - client database schema reconstruction tool
#[derive(Parser)]
#[command(name = "veles")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan every build directory and export per-table schema entries
    Export {
        /// Dump root containing one directory per build
        #[arg(short, long, env = "VELES_BASE")]
        base: PathBuf,

        /// Output directory for the schema store
        #[arg(short, long, env = "VELES_OUTPUT")]
        output: PathBuf,

        /// Known-schema definition files
        #[arg(short, long, env = "VELES_DEFINITIONS")]
        definitions: Vec<PathBuf>,
    },

    /// Merge store entries whose raw files share identical rows
    RowMatch {
        /// Dump root containing one directory per build
        #[arg(short, long, env = "VELES_BASE")]
        base: PathBuf,

        /// Directory holding the schema store
        #[arg(short, long, env = "VELES_OUTPUT")]
        output: PathBuf,

        /// Only match within groups sharing a field type sequence
        #[arg(long)]
        grouped: bool,
    },

    /// Propagate field names across adjacent builds statistically
    Compare {
        /// Dump root containing one directory per build
        #[arg(short, long, env = "VELES_BASE")]
        base: PathBuf,

        /// Directory holding the schema store
        #[arg(short, long, env = "VELES_OUTPUT")]
        output: PathBuf,

        /// Known-schema definition files
        #[arg(short, long, env = "VELES_DEFINITIONS")]
        definitions: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            base,
            output,
            definitions,
        } => cmd_export(&base, &output, &definitions),
        Commands::RowMatch {
            base,
            output,
            grouped,
        } => cmd_row_match(&base, &output, grouped),
        Commands::Compare {
            base,
            output,
            definitions,
        } => cmd_compare(&base, &output, &definitions),
    }
}

fn cmd_export(base: &Path, output: &Path, definitions: &[PathBuf]) -> Result<()> {
    let catalog = Catalog::load(definitions).context("Failed to load definition files")?;
    println!("Loaded {} known table definitions", catalog.len());

    let dirs = BuildDirs::discover(base).context("Failed to scan dump root")?;
    println!("Found {} build directories", dirs.builds().len());

    fs::create_dir_all(output)?;

    let pb = ProgressBar::new(dirs.builds().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut stats = ScanStats::default();
    let mut tables: BTreeMap<String, Vec<SchemaEntry>> = BTreeMap::new();
    let mut errors = String::new();
    let mut scanned = 0usize;

    for &build in dirs.builds() {
        for (name, path) in dirs.files(build) {
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(err) => {
                    errors.push_str(&format!("{name} {build} - {err}\n"));
                    continue;
                }
            };

            match scan(&data, build, &name, &catalog, &mut stats) {
                Ok(outcome) => {
                    if let Some(warning) = outcome.warning {
                        errors.push_str(&format!("{name} {build} - {warning}\n"));
                    }
                    tables
                        .entry(table_key(&name).to_lowercase())
                        .or_default()
                        .push(outcome.entry);
                    scanned += 1;
                }
                Err(err) => {
                    errors.push_str(&format!("{name} {build} - {err}\n"));
                }
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Done");

    let table_count = tables.len();
    for (table, mut entries) in tables {
        store::write_entries(output.join(format!("{table}.xml")), &mut entries)
            .with_context(|| format!("Failed to write store for {table}"))?;
    }
    fs::write(output.join("error.txt"), errors).context("Failed to write error log")?;

    if let Some(build) = stats.wide_locale_min_build {
        println!("Earliest build using the wide locale layout: {build}");
    }
    println!(
        "Exported {} entries across {} tables in {:?}",
        scanned,
        table_count,
        start.elapsed()
    );

    Ok(())
}

fn cmd_row_match(base: &Path, output: &Path, grouped: bool) -> Result<()> {
    let dirs = BuildDirs::discover(base).context("Failed to scan dump root")?;

    let files = store_files(output)?;
    let mut total_merges = 0;

    for path in &files {
        let mut entries = store::read_entries(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        // Stores written by older runs may carry mixed-case names.
        for entry in entries.iter_mut() {
            entry.name = entry.name.to_uppercase();
            for field in entry.fields.iter_mut() {
                field.name = field.name.to_uppercase();
            }
        }

        let merges = if grouped {
            match_grouped(&mut entries, &dirs)
        } else {
            propagate_id_column(&mut entries);
            match_adjacent(&mut entries, &dirs)
        };
        total_merges += merges;

        entries.retain(|entry| !entry.builds.is_empty());
        store::write_entries(path, &mut entries)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    println!(
        "Row-matched {} store files, merged {} entries",
        files.len(),
        total_merges
    );

    Ok(())
}

fn cmd_compare(base: &Path, output: &Path, definitions: &[PathBuf]) -> Result<()> {
    let catalog = Catalog::load(definitions).context("Failed to load definition files")?;
    let dirs = BuildDirs::discover(base).context("Failed to scan dump root")?;
    let reconciler = Reconciler::new(&catalog, &dirs);

    let files = store_files(output)?;
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut report = CompletionReport::default();
    let mut total = SweepStats::default();

    for path in &files {
        let mut entries = store::read_entries(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let Some(first) = entries.first() else {
            pb.inc(1);
            continue;
        };
        pb.set_message(first.name.clone());

        if is_excluded(&first.name) {
            pb.inc(1);
            continue;
        }

        if entries.len() > 1 {
            let stats = reconciler.reconcile(&mut entries);
            store::write_entries(path, &mut entries)
                .with_context(|| format!("Failed to write {}", path.display()))?;

            total.pairs_compared += stats.pairs_compared;
            total.pairs_skipped += stats.pairs_skipped;
            total.fields_named += stats.fields_named;
            total.merges += stats.merges;
            total.ambiguous_reverts += stats.ambiguous_reverts;
        }

        report.record(&entries);
        pb.inc(1);
    }
    pb.finish_with_message("Done");

    report
        .write_csv(output.join("_log.csv"))
        .context("Failed to write completion report")?;

    println!(
        "Compared {} pairs ({} skipped): named {} fields, merged {} entries, reverted {} ambiguous matches",
        total.pairs_compared,
        total.pairs_skipped,
        total.fields_named,
        total.merges,
        total.ambiguous_reverts
    );
    println!(
        "Average completion {:.2}% across {} tables in {:?}",
        report.average(),
        files.len(),
        start.elapsed()
    );

    Ok(())
}

/// Store documents in the output directory, name-sorted.
fn store_files(output: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = WalkDir::new(output)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        })
        .collect();
    files.sort();
    Ok(files)
}

//! Entry point for the miniwr command-line archiver.
//!
//! `a` builds an archive from files and folders, `x` extracts one and `l`
//! lists its contents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use miniwr::cli::{Cli, Command};
use miniwr::zip::walk_directory;
use miniwr::{ArchiveReader, ArchiveWriter, CompressionLevel, ConsolePrompt, Error};

const EXIT_INVALID_ARGS: u8 = 1;
const EXIT_ADD_FAILED: u8 = 3;
const EXIT_EXTRACT_FAILED: u8 = 4;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help and version also land here
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_INVALID_ARGS)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let level = cli.command.compression_level().unwrap_or_default();
    let (result, failure) = match cli.command {
        Command::Add {
            archive,
            paths,
            threads,
            ..
        } => {
            debug!(threads, ?level, "compression settings");
            (add(&archive, &paths, level), ("Compression error", EXIT_ADD_FAILED))
        }
        Command::Extract {
            archive,
            output_dir,
            force,
        } => (
            extract(&archive, output_dir, force),
            ("Decompression error", EXIT_EXTRACT_FAILED),
        ),
        Command::List { archive, verbose } => (list(&archive, verbose), ("Error", EXIT_EXTRACT_FAILED)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let (label, code) = failure;
            eprintln!("{label}: {e:#}");
            ExitCode::from(code)
        }
    }
}

/// Number of files `a` will add, checked before the archive is created so a
/// bad path leaves nothing behind.
fn count_sources(paths: &[PathBuf]) -> Result<usize> {
    let mut total = 0;
    for path in paths {
        if path.is_dir() {
            total += walk_directory(path)?.len();
        } else if path.is_file() {
            total += 1;
        } else {
            return Err(Error::FileNotFound(path.clone()).into());
        }
    }
    Ok(total)
}

fn add(archive: &Path, paths: &[PathBuf], level: CompressionLevel) -> Result<()> {
    let total = count_sources(paths)?;

    println!("Adding {} files to {}", total, archive.display());

    let mut writer = ArchiveWriter::create(archive)?;

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut added = 0;
    for path in paths {
        if path.is_dir() {
            added += writer
                .add_directory_with(path, level, |_| pb.inc(1))
                .with_context(|| format!("failed to add {}", path.display()))?;
        } else {
            writer
                .add_file(path, level)
                .with_context(|| format!("failed to add {}", path.display()))?;
            pb.inc(1);
            added += 1;
        }
    }
    pb.finish_and_clear();

    writer.close().context("failed to finalize archive")?;
    println!("Done. {added} files compressed.");
    Ok(())
}

fn extract(archive: &Path, output_dir: Option<PathBuf>, force: bool) -> Result<()> {
    let output_dir = output_dir.unwrap_or_else(|| PathBuf::from("."));
    let mut reader = ArchiveReader::open(archive)?;

    println!("Extracting {} files to {}", reader.len(), output_dir.display());

    let summary = reader
        .extract_all(&output_dir, force, &mut ConsolePrompt::stdio())
        .with_context(|| format!("failed to extract {}", archive.display()))?;

    println!(
        "Done. {} files extracted, {} skipped.",
        summary.extracted,
        summary.skipped.len()
    );
    Ok(())
}

fn list(archive: &Path, verbose: bool) -> Result<()> {
    let reader = ArchiveReader::open(archive)?;

    if !verbose {
        for name in reader.list_files() {
            println!("{name}");
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in reader.entries() {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size as u64, entry.uncompressed_size as u64),
            year,
            month,
            day,
            hour,
            minute,
            entry.name
        );

        if !entry.is_dir() {
            total_uncompressed += entry.uncompressed_size as u64;
            total_compressed += entry.compressed_size as u64;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );
    Ok(())
}

/// Space saved as a right-aligned percentage. Negative when deflate expanded
/// the data.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 {
        return "  0%".to_string();
    }
    let saved = 100 - (compressed as i64 * 100 / uncompressed as i64);
    format!("{saved:>4}%")
}

//! Main entry point for the streamzip CLI application.
//!
//! Lists, tests and extracts ZIP archives from the local filesystem or from
//! HTTP URLs served with Range support.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use streamzip::{Cli, HttpRangeReader, OpenOptions, ReadAt, ZipEntry, ZipIndex};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = OpenOptions::new()
        .lazy_entries(cli.lazy)
        .encoding(cli.encoding.clone());

    if cli.is_http_url() {
        let reader = HttpRangeReader::new(cli.file.clone())
            .with_context(|| format!("cannot reach {}", cli.file))?;
        let mut index = ZipIndex::open(reader, &options)
            .with_context(|| format!("cannot open archive {}", cli.file))?;

        process_zip(&mut index, &cli)?;

        let reader = index.close();
        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(reader.transferred_bytes())
            );
        }
    } else {
        let mut index = ZipIndex::open_path(&cli.file, &options)
            .with_context(|| format!("cannot open archive {}", cli.file))?;
        process_zip(&mut index, &cli)?;
    }

    Ok(())
}

/// Dispatch to comment display, listing, testing or extraction.
fn process_zip<R: ReadAt>(index: &mut ZipIndex<R>, cli: &Cli) -> Result<()> {
    if cli.comment {
        if let Some(comment) = index.comment() {
            println!("{comment}");
        }
    }

    if cli.list || cli.verbose {
        return list_files(index, cli.verbose);
    }

    if cli.test {
        return test_archive(index, cli);
    }

    if cli.comment && cli.files.is_empty() {
        return Ok(());
    }

    let selected: Vec<String> = index
        .entries()?
        .values()
        .filter(|e| !e.is_directory && is_selected(&e.name, cli))
        .map(|e| e.name.clone())
        .collect();

    let show_filename = cli.pipe && selected.len() > 1;
    for name in &selected {
        extract_file(index, name, cli, show_filename)?;
    }

    Ok(())
}

/// Positional names select (exact, basename or glob), `-x` patterns exclude.
fn is_selected(name: &str, cli: &Cli) -> bool {
    if !cli.files.is_empty() {
        let basename = Path::new(name)
            .file_name()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        let wanted = cli.files.iter().any(|f| {
            if f.contains(['*', '?']) {
                glob_match(f, name)
            } else {
                name == f.as_str() || basename == f.as_str()
            }
        });
        if !wanted {
            return false;
        }
    }

    !cli
        .exclude
        .iter()
        .any(|x| name.contains(x.as_str()) || glob_match(x, name))
}

fn list_files<R: ReadAt>(index: &mut ZipIndex<R>, verbose: bool) -> Result<()> {
    if verbose {
        index.parse_all()?;
        println!(
            "{:>10}  {:<6}  {:>10}  {:>4}  {:>10}  {:>5}  {:>8}  Name",
            "Length", "Method", "Size", "Cmpr", "Date", "Time", "CRC-32"
        );
        println!("{}", "-".repeat(78));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in index.entries()?.values() {
        if !verbose {
            println!("{}", entry.name);
            continue;
        }

        let method = match entry.compression_method() {
            streamzip::CompressionMethod::Stored => "Stored".to_string(),
            streamzip::CompressionMethod::Deflate => "Defl".to_string(),
            streamzip::CompressionMethod::Unknown(code) => format!("M{code}"),
        };
        let ts = entry.modified;
        println!(
            "{:>10}  {:<6}  {:>10}  {:>4}  {:04}-{:02}-{:02}  {:02}:{:02}  {:08x}  {}",
            entry.size,
            method,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.size),
            ts.year(),
            u8::from(ts.month()),
            ts.day(),
            ts.hour(),
            ts.minute(),
            entry.crc32,
            entry.name
        );
        if let Some(comment) = &entry.comment {
            println!("{:>12}{comment}", "");
        }

        if !entry.is_directory {
            total_uncompressed += entry.size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(78));
        println!(
            "{:>10}  {:<6}  {:>10}  {:>4}  {:>36}  {} files",
            total_uncompressed,
            "",
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

/// Percentage saved by compression.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 || compressed >= uncompressed {
        return "0%".to_string();
    }
    format!("{}%", 100 - compressed * 100 / uncompressed)
}

/// Decompress every entry and check sizes and CRC-32 values.
fn test_archive<R: ReadAt>(index: &mut ZipIndex<R>, cli: &Cli) -> Result<()> {
    let names: Vec<String> = index
        .entries()?
        .values()
        .filter(|e| !e.is_directory)
        .map(|e| e.name.clone())
        .collect();

    let mut failures = 0usize;
    for name in &names {
        match index.read_payload(name) {
            Ok(_) => {
                if !cli.is_quiet() {
                    println!("    testing: {name:<40}  OK");
                }
            }
            Err(err) => {
                failures += 1;
                println!("    testing: {name:<40}  {err}");
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} entries failed", names.len());
    }
    if !cli.is_very_quiet() {
        println!("No errors detected in {}", cli.file);
    }
    Ok(())
}

/// Path an entry is written to, honoring `-d` and `-j`.
fn output_path(entry: &ZipEntry, cli: &Cli) -> PathBuf {
    let file_name = if cli.junk_paths {
        Path::new(&entry.name)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.name.clone())
    } else {
        entry.name.clone()
    };

    match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Extract a single file from the archive.
///
/// Names that could escape the output directory are skipped with a warning.
fn extract_file<R: ReadAt>(
    index: &mut ZipIndex<R>,
    name: &str,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    if cli.pipe {
        let mut stdout = std::io::stdout().lock();
        if show_filename {
            writeln!(stdout, "--- {name} ---")?;
        }
        index
            .extract_to_writer(name, &mut stdout)
            .with_context(|| format!("cannot extract {name}"))?;
        return Ok(());
    }

    let entry = index
        .lookup(name)?
        .with_context(|| format!("entry vanished: {name}"))?;
    if let Err(err) = entry.validate_name() {
        warn!(%err, "skipping entry");
        return Ok(());
    }
    let path = output_path(entry, cli);

    if path.exists() {
        if cli.never_overwrite || !cli.overwrite {
            if !cli.is_quiet() {
                let hint = if cli.never_overwrite { "file exists" } else { "use -o to overwrite" };
                eprintln!("Skipping: {name} ({hint})");
            }
            return Ok(());
        }
        debug!(path = %path.display(), "overwriting");
    }

    if !cli.is_quiet() {
        println!("  extracting: {name}");
    }

    index
        .extract_to_file(name, &path)
        .with_context(|| format!("cannot extract {name}"))?;

    Ok(())
}

/// Wildcard match supporting `*` (any run) and `?` (one character).
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            // Let the last star absorb one more character
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

fn format_size(size: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if size < 1024 {
        return format!("{size} bytes");
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

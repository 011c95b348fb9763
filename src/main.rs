use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam::channel::{unbounded, Sender};
use memchr::memchr_iter;
use memmap2::Mmap;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde_json::Value;
use std::fs::File;
use std::time::Instant;
use telenorm::config::DeviceReport;
use telenorm::{extract_report, output, MODULES};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Modules to extract: identity, system, management, network (default: all)
    #[arg(short, long = "module", value_delimiter = ',')]
    modules: Vec<String>,

    #[arg(short, long, default_value = "stdout")]
    output: String,

    #[arg(value_name = "FILE")]
    file: String,

    #[arg(long, default_value = "1000")]
    batch_size: usize,

    #[arg(long)]
    benchmark: bool,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let modules: Vec<String> = if args.modules.is_empty() {
        MODULES.iter().map(|m| m.to_string()).collect()
    } else {
        args.modules.clone()
    };
    // reject unknown module names before touching the input
    extract_report(&Value::Null, &modules)?;

    let start_time = Instant::now();
    let file = File::open(&args.file).with_context(|| format!("cannot open {}", args.file))?;
    let file_size = file.metadata()?.len();

    // mmap the file
    let mmap = unsafe { Mmap::map(&file)? };

    // channel for sending extracted batches to writer
    let (tx, rx) = unbounded::<Vec<DeviceReport>>();

    // spawn writer thread
    let output_arg = args.output.clone();
    let writer_handle = std::thread::spawn(move || -> Result<()> {
        let mut writer = output::create_writer(&output_arg)?;
        for batch in rx {
            writer.write_batch(&batch)?;
        }
        writer.finish()
    });

    let (total_records, total_reports) = if is_json_array(&mmap) {
        let records: Vec<Value> =
            serde_json::from_slice(&mmap).context("input looks like a JSON array but does not parse")?;
        let extracted = run_batches(&records, args.batch_size, &modules, &tx, |record| {
            Some(record.clone())
        });
        (records.len(), extracted)
    } else {
        let lines = split_lines(&mmap);
        let extracted = run_batches(&lines, args.batch_size, &modules, &tx, |line| parse_line(line));
        (lines.len(), extracted)
    };

    // close channel so writer thread can finish
    drop(tx);
    writer_handle
        .join()
        .map_err(|_| anyhow!("writer thread panicked"))??;

    info!(records = total_records, reports = total_reports, "normalization finished");
    if args.benchmark {
        print_benchmark_results(file_size, total_records, total_reports, start_time.elapsed());
    }

    Ok(())
}

fn is_json_array(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'[')
}

fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for nl in memchr_iter(b'\n', bytes) {
        lines.push(&bytes[start..nl]);
        start = nl + 1;
    }
    if start < bytes.len() {
        lines.push(&bytes[start..]);
    }
    lines.retain(|line| !line.trim_ascii().is_empty());
    lines
}

fn parse_line(line: &[u8]) -> Option<Value> {
    match serde_json::from_slice(line) {
        Ok(record) => Some(record),
        Err(e) => {
            let preview = String::from_utf8_lossy(&line[..line.len().min(80)]);
            warn!("skipping unparseable record ({}): {}", e, preview);
            None
        }
    }
}

// returns how many reports were produced
fn run_batches<T, F>(
    items: &[T],
    batch_size: usize,
    modules: &[String],
    tx: &Sender<Vec<DeviceReport>>,
    to_record: F,
) -> usize
where
    T: Sync,
    F: Fn(&T) -> Option<Value> + Sync,
{
    let extract_batch = |batch: &[T]| -> usize {
        let reports: Vec<DeviceReport> = batch
            .iter()
            .filter_map(&to_record)
            .filter_map(|record| match extract_report(&record, modules) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("extraction failed: {}", e);
                    None
                }
            })
            .collect();
        let len = reports.len();
        if tx.send(reports).is_err() {
            warn!("writer stopped early, dropping batch");
        }
        len
    };

    #[cfg(feature = "parallel")]
    {
        items.par_chunks(batch_size.max(1)).map(extract_batch).sum()
    }
    #[cfg(not(feature = "parallel"))]
    {
        items.chunks(batch_size.max(1)).map(extract_batch).sum()
    }
}

fn print_benchmark_results(
    file_size: u64,
    total_records: usize,
    total_reports: usize,
    duration: std::time::Duration,
) {
    let duration_secs = duration.as_secs_f64();
    let file_size_mb = file_size as f64 / (1024.0 * 1024.0);
    let throughput_mbs = file_size_mb / duration_secs;
    let throughput_records = total_records as f64 / duration_secs;

    eprintln!("\n=== BENCHMARK RESULTS ===");
    eprintln!("File size: {:.2} MB", file_size_mb);
    eprintln!("Input records: {}", total_records);
    eprintln!("Reports written: {}", total_reports);
    eprintln!("Processing time: {:.3}s", duration_secs);
    eprintln!("Throughput: {:.2} MB/s", throughput_mbs);
    eprintln!("Throughput: {:.0} records/s", throughput_records);
    if total_records > 0 {
        eprintln!(
            "Extraction success rate: {:.1}%",
            (total_reports as f64 / total_records as f64) * 100.0
        );
    }
}

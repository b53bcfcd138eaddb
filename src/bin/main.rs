use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use itertools::Itertools;
use log::info;

use rust_vcfmerge::config::{ProgramInfo, SortConfig};
use rust_vcfmerge::reader::LineRecord;
use rust_vcfmerge::sort::merge_runs;
use rust_vcfmerge::{CompressionMode, Header, MergeStrategy, Record, RecordMerger, VcfRecords};

/// Sorts one or more VCF files into a single stream on standard output.
///
/// The headers of all inputs are merged, and every input keeps its own sample columns.
#[derive(Parser, Debug)]
#[command(name = "vcf-sort", version)]
struct Args {
    /// Input VCF files, plain, gzip or bzip2 compressed.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Records held in memory per run before it is spilled to disk.
    #[arg(short = 'n', long = "max-records", default_value_t = 100_000)]
    max_records_in_memory: usize,

    /// Codec for spill files: none, gzip or bzip2.
    #[arg(short = 'c', long = "temp-compression", default_value = "none")]
    compression: CompressionMode,

    /// Directory for spill files.
    #[arg(short = 'T', long = "tmp-dir")]
    tmp_dir: Option<PathBuf>,

    /// Drop records that repeat the previous record exactly.
    #[arg(short = 'u', long = "unique")]
    unique: bool,

    /// Allow records at the same position to leave in any order.
    #[arg(long = "unstable")]
    unstable: bool,

    /// Clear the data of samples whose DP is below this depth.
    #[arg(short = 'd', long = "min-genotype-depth")]
    min_depth: Option<i64>,

    /// File of `field=policy` lines deciding how INFO fields of different inputs combine.
    #[arg(short = 's', long = "merge-strategy")]
    strategy: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let info = ProgramInfo::from_env("vcf-sort");
    info!("{}", info);

    let strategy = match &args.strategy {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .parse::<MergeStrategy>()?,
        None => MergeStrategy::default(),
    };

    let mut config = SortConfig::default()
        .with_max_records_in_memory(args.max_records_in_memory)
        .with_stable(!args.unstable)
        .with_compression(args.compression);
    if let Some(dir) = &args.tmp_dir {
        config = config.with_tmp_dir(dir);
    }

    let sources = args
        .inputs
        .iter()
        .map(|path| {
            VcfRecords::from_path(path).with_context(|| format!("failed to open {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let headers = sources.iter().map(|s| s.header().clone()).collect_vec();
    let merger = RecordMerger::from_inputs(strategy, &headers)?;
    let header = merger.header().clone();

    let mut runs = Vec::new();
    let mut run = config.buffer::<Record>(header.clone());
    let mut total = 0usize;
    for (source, (path, records)) in args.inputs.iter().zip(sources).enumerate() {
        for record in records {
            let record = record.with_context(|| format!("failed to read {}", path.display()))?;
            // moves the record's samples into this input's columns of the merged header
            let mut record = merger.merge(&[(source, &record)])?;
            if let Some(depth) = args.min_depth {
                record.drop_low_depth_genotypes(depth);
            }
            run.push(record);
            total += 1;
            if run.buffered() >= config.max_records_in_memory() {
                run.sort(config.stable());
                run.spill_to_disk(config.compression())?;
                runs.push(std::mem::replace(&mut run, config.buffer(header.clone())));
            }
        }
    }
    run.sort(config.stable());
    runs.push(run);
    info!(
        "read {} records from {} inputs into {} runs",
        total,
        args.inputs.len(),
        runs.len()
    );

    let mut out_header = Header::clone(&header);
    out_header.add(&info.source_line())?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write!(out, "{}", out_header)?;
    let written = merge_runs(&mut runs, args.unique, |record| {
        record.write_line(&mut out)?;
        out.write_all(b"\n")?;
        Ok(())
    })?;
    out.flush()?;
    info!("wrote {} records", written);

    Ok(())
}

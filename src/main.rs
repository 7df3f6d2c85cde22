//! cooler-tools CLI entry point
//!
//! Dump, load, merge and validate Cooler files.

use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use cooler::core::attributes::read_str_attr;
use cooler::core::attributes::{MCOOL_MAGIC, SCOOL_MAGIC};
use cooler::core::io::{open_input, open_output, LineIterator};
use cooler::core::{is_hdf5, DEFAULT_MERGE_CHUNK_SIZE, PIXEL_WRITE_BATCH};
use cooler::formats::bg2::{parse_bedpe_query, parse_pixel_line, write_pixel, PixelFormat};
use cooler::formats::chrom_sizes::read_chrom_sizes_file;
use cooler::{
    is_cooler, is_multires, is_scool, merge, Balancer, BinTable, ChromosomeSet, Count, CountType,
    CoolerUri, CreateOptions, File, GenomicInterval, MergeStrategy, Pixel, PixelSelector, Weights,
};
use rayon::prelude::*;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "cooler-tools")]
#[command(about = "Read, write and validate Cooler Hi-C contact matrices")]
#[command(version)]
#[command(author = "cooler-rs Contributors")]
struct Cli {
    /// Increase log verbosity (-v: info, -vv: debug). RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump a table of a Cooler as TSV
    Dump(DumpArgs),
    /// Build a Cooler from bg2 or COO pixels
    Load(LoadArgs),
    /// Merge Coolers sharing the same bin table
    Merge(MergeArgs),
    /// Check the structure of a .cool, .mcool or .scool file
    Validate(ValidateArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum TableArg {
    #[value(name = "chroms")]
    Chroms,
    #[value(name = "bins")]
    Bins,
    #[default]
    #[value(name = "pixels")]
    Pixels,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum FormatArg {
    /// chrom1 start1 end1 chrom2 start2 end2 count
    #[default]
    #[value(name = "bg2")]
    Bg2,
    /// bin1_id bin2_id count
    #[value(name = "coo")]
    Coo,
}

impl From<FormatArg> for PixelFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Bg2 => PixelFormat::Bg2,
            FormatArg::Coo => PixelFormat::Coo,
        }
    }
}

#[derive(Args)]
struct DumpArgs {
    /// Cooler URI (path or path::/group)
    uri: String,
    /// Table to dump
    #[arg(short, long, default_value = "pixels")]
    table: TableArg,
    /// Query in UCSC format, e.g. chr1:0-1000000 (defaults to the whole matrix)
    #[arg(short, long)]
    range: Option<String>,
    /// Second query for asymmetric pixel queries (defaults to --range)
    #[arg(long, requires = "range")]
    range2: Option<String>,
    /// Print pixels as bg2 instead of COO
    #[arg(long)]
    join: bool,
    /// Name of the weights used to balance pixels
    #[arg(short, long)]
    balanced: Option<String>,
    /// BEDPE file with one query pair per line ("-" for stdin)
    #[arg(long)]
    query_file: Option<PathBuf>,
    /// Output file; ".gz" and ".bz2" are compressed
    #[arg(short, long, default_value = "-")]
    output: PathBuf,
}

#[derive(Args)]
struct LoadArgs {
    /// Chromosome sizes file (chrom<TAB>length)
    chrom_sizes: PathBuf,
    /// Bin size in bp
    bin_size: u32,
    /// Output Cooler URI
    output_uri: String,
    /// Pixel file, plain or compressed ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    input: PathBuf,
    /// Input line format
    #[arg(short, long, default_value = "bg2")]
    format: FormatArg,
    /// Store counts as float64
    #[arg(long)]
    count_as_float: bool,
    /// Input is sorted by (bin1_id, bin2_id) without duplicates
    #[arg(long)]
    assume_sorted: bool,
    /// Overwrite existing files
    #[arg(long)]
    force: bool,
    /// Genome assembly name
    #[arg(long, default_value = "unknown")]
    assembly: String,
    /// Pixels per sorted batch when the input is not sorted
    #[arg(long, default_value = "5000000")]
    batch_size: usize,
    /// Directory for temporary batch files
    #[arg(long)]
    tmpdir: Option<PathBuf>,
}

#[derive(Args)]
struct MergeArgs {
    /// Input Cooler URIs
    #[arg(required = true, num_args = 2..)]
    inputs: Vec<String>,
    /// Output Cooler URI
    #[arg(short, long)]
    output: String,
    /// Overwrite existing files
    #[arg(long)]
    force: bool,
    /// Pixels buffered before each write
    #[arg(long, default_value_t = DEFAULT_MERGE_CHUNK_SIZE)]
    chunk_size: usize,
    /// Accumulate every pixel in memory before writing
    #[arg(long)]
    in_memory: bool,
}

#[derive(Args)]
struct ValidateArgs {
    /// File or Cooler URI
    uri: String,
    /// Skip validating each resolution or cell of .mcool/.scool files
    #[arg(long)]
    shallow: bool,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    hdf5::silence_errors(true);
    let start = Instant::now();

    match cli.command {
        Commands::Dump(args) => {
            let nrecords = run_dump(&args)?;
            eprintln!("\n=== Dump Statistics ===");
            eprintln!("Records written: {}", nrecords);
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Load(args) => {
            let clr = run_load(&args)?;
            eprintln!("\n=== Load Statistics ===");
            eprintln!("Output:          {}", args.output_uri);
            eprintln!("Pixels:          {}", clr.nnz());
            eprintln!("Sum:             {}", clr.sum());
            eprintln!("Cis sum:         {}", clr.cis_sum());
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Merge(args) => {
            let strategy = if args.in_memory {
                MergeStrategy::InMemory
            } else {
                MergeStrategy::PriorityQueue
            };
            merge(&args.inputs, &args.output, args.force, args.chunk_size, strategy)
                .with_context(|| format!("failed to merge into \"{}\"", args.output))?;
            let clr = File::open_read_only(&args.output)?;
            eprintln!("\n=== Merge Statistics ===");
            eprintln!("Inputs:          {}", args.inputs.len());
            eprintln!("Pixels:          {}", clr.nnz());
            eprintln!("Sum:             {}", clr.sum());
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Validate(args) => {
            let valid = run_validate(&args)?;
            if !valid {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn run_dump(args: &DumpArgs) -> anyhow::Result<u64> {
    let clr = File::open_read_only(&args.uri)
        .with_context(|| format!("failed to open \"{}\"", args.uri))?;
    let mut out = open_output(&args.output)
        .with_context(|| format!("failed to open \"{}\" for writing", args.output.display()))?;

    let weights = match &args.balanced {
        Some(name) => Some(
            clr.read_weights(name)
                .with_context(|| format!("failed to read weights \"{}\"", name))?,
        ),
        None => None,
    };

    let mut nrecords = 0;
    match &args.query_file {
        None => {
            let (range1, range2) = query_ranges(args.range.as_deref(), args.range2.as_deref())?;
            nrecords += dump_query(&mut out, &clr, args, range1, range2, weights.as_ref())?;
        }
        Some(path) => {
            let reader = open_input(path)
                .with_context(|| format!("failed to open query file \"{}\"", path.display()))?;
            let mut lines = LineIterator::new(reader);
            while let Some(line) = lines.next_line() {
                let line = line?;
                if line.trim().is_empty() || line.starts_with('#') {
                    continue;
                }
                let (range1, range2) = parse_bedpe_query(line)
                    .with_context(|| format!("invalid query at line {}", lines.line_number()))?;
                nrecords += dump_query(&mut out, &clr, args, &range1, &range2, weights.as_ref())?;
            }
        }
    }
    out.flush()?;
    Ok(nrecords)
}

/// Resolve `--range`/`--range2`; a lone `--range2` is rejected
fn query_ranges<'a>(
    range1: Option<&'a str>,
    range2: Option<&'a str>,
) -> anyhow::Result<(&'a str, &'a str)> {
    match (range1, range2) {
        (None, None) => Ok(("all", "all")),
        (Some(r1), None) => Ok((r1, r1)),
        (Some(r1), Some(r2)) => Ok((r1, r2)),
        (None, Some(r2)) => bail!("--range2 \"{}\" requires --range", r2),
    }
}

fn dump_query<W: Write>(
    out: &mut W,
    clr: &File,
    args: &DumpArgs,
    range1: &str,
    range2: &str,
    weights: Option<&Arc<Weights>>,
) -> anyhow::Result<u64> {
    match args.table {
        TableArg::Chroms => dump_chroms(out, clr.chromosomes(), range1),
        TableArg::Bins => dump_bins(out, clr.bins(), range1),
        TableArg::Pixels => {
            let sel = if range1 == "all" && range2 == "all" {
                clr.pixels()?
            } else {
                clr.fetch2(range1, range2)
                    .with_context(|| format!("invalid query \"{}\" x \"{}\"", range1, range2))?
            };
            if clr.count_type().is_float() {
                dump_pixels::<f64, W>(out, clr.bins(), sel, weights, args.join)
            } else {
                dump_pixels::<i64, W>(out, clr.bins(), sel, weights, args.join)
            }
        }
    }
}

fn dump_chroms<W: Write>(out: &mut W, chroms: &ChromosomeSet, range: &str) -> anyhow::Result<u64> {
    if range == "all" {
        for chrom in chroms.iter() {
            writeln!(out, "{}\t{}", chrom.name(), chrom.length())?;
        }
        return Ok(chroms.len() as u64);
    }
    let interval = GenomicInterval::parse_ucsc(chroms, range)?;
    writeln!(out, "{}\t{}", interval.chrom.name(), interval.chrom.length())?;
    Ok(1)
}

fn dump_bins<W: Write>(out: &mut W, bins: &BinTable, range: &str) -> anyhow::Result<u64> {
    let ids = if range == "all" {
        0..bins.len()
    } else {
        let interval = GenomicInterval::parse_ucsc(bins.chromosomes(), range)?;
        let r = interval.bin_range(bins)?;
        r.lo..r.hi
    };
    let n = ids.end - ids.start;
    for id in ids {
        let bin = bins.at_id(id)?;
        writeln!(out, "{}\t{}\t{}", bin.chrom().name(), bin.start(), bin.end())?;
    }
    Ok(n)
}

fn dump_pixels<N: Count, W: Write>(
    out: &mut W,
    bins: &BinTable,
    sel: PixelSelector,
    weights: Option<&Arc<Weights>>,
    join: bool,
) -> anyhow::Result<u64> {
    let mut n = 0;
    match weights {
        Some(weights) => {
            for pixel in Balancer::<N>::new(sel, Arc::clone(weights)).iter()? {
                write_pixel(out, &pixel?, join, bins)?;
                n += 1;
            }
        }
        None => {
            for pixel in sel.iter::<N>()? {
                write_pixel(out, &pixel?, join, bins)?;
                n += 1;
            }
        }
    }
    Ok(n)
}

fn run_load(args: &LoadArgs) -> anyhow::Result<File> {
    let chroms = read_chrom_sizes_file(&args.chrom_sizes).with_context(|| {
        format!(
            "failed to import chromosomes from \"{}\"",
            args.chrom_sizes.display()
        )
    })?;
    // integer counts are stored as i64 whether or not the input needs merging
    let count_type = if args.count_as_float {
        CountType::F64
    } else {
        CountType::I64
    };
    let opts = CreateOptions::default()
        .with_count_type(count_type)
        .with_assembly(args.assembly.clone());

    let reader = open_input(&args.input)
        .with_context(|| format!("failed to open \"{}\"", args.input.display()))?;
    if args.count_as_float {
        load_pixels::<f64>(args, chroms, opts, reader)?;
    } else {
        load_pixels::<i64>(args, chroms, opts, reader)?;
    }
    Ok(File::open_read_only(&args.output_uri)?)
}

fn load_pixels<N: Count>(
    args: &LoadArgs,
    chroms: ChromosomeSet,
    opts: CreateOptions,
    reader: Box<dyn BufRead>,
) -> anyhow::Result<()> {
    let format = PixelFormat::from(args.format);
    let bins = BinTable::new(chroms.clone(), args.bin_size)?;
    let mut lines = LineIterator::new(reader);

    if args.assume_sorted {
        let mut clr = File::create(&args.output_uri, chroms, args.bin_size, args.force, opts)?;
        let batch_size = PIXEL_WRITE_BATCH.min(args.batch_size.max(1));
        while let Some(batch) = read_batch::<N>(&mut lines, format, &bins, batch_size)? {
            clr.append_pixels(batch)?;
            log::info!("read {} lines...", lines.line_number());
        }
        clr.close()?;
        return Ok(());
    }

    let tmpdir = match &args.tmpdir {
        Some(dir) => tempfile::Builder::new().prefix("cooler-load-").tempdir_in(dir)?,
        None => tempfile::Builder::new().prefix("cooler-load-").tempdir()?,
    };
    let mut chunks: Vec<String> = Vec::new();
    while let Some(mut batch) = read_batch::<N>(&mut lines, format, &bins, args.batch_size.max(1))?
    {
        sort_and_coalesce(&mut batch)?;
        let uri = tmpdir
            .path()
            .join(format!("chunk_{:04}.cool", chunks.len()))
            .display()
            .to_string();
        let mut clr = File::create(&uri, chroms.clone(), args.bin_size, true, opts.clone())?;
        clr.append_pixels(batch)?;
        clr.close()?;
        log::info!("done writing to temporary file \"{}\"", uri);
        chunks.push(uri);
    }

    match chunks.len() {
        0 => {
            File::create(&args.output_uri, chroms, args.bin_size, args.force, opts)?.close()?;
        }
        1 => copy_cooler(Path::new(&chunks[0]), &args.output_uri, args.force)?,
        _ => merge(
            &chunks,
            &args.output_uri,
            args.force,
            DEFAULT_MERGE_CHUNK_SIZE,
            MergeStrategy::PriorityQueue,
        )?,
    }
    Ok(())
}

/// Parse up to `batch_size` pixels; `None` once the input is exhausted
fn read_batch<N: Count>(
    lines: &mut LineIterator<Box<dyn BufRead>>,
    format: PixelFormat,
    bins: &BinTable,
    batch_size: usize,
) -> anyhow::Result<Option<Vec<Pixel<N>>>> {
    let mut batch = Vec::with_capacity(batch_size.min(1 << 20));
    while batch.len() < batch_size {
        let Some(line) = lines.next_line() else {
            break;
        };
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_pixel_line::<N>(line.as_bytes(), format, bins) {
            Ok(pixel) => batch.push(pixel),
            Err(e) => {
                let content = line.to_string();
                return Err(anyhow::Error::new(e).context(format!(
                    "encountered error while processing line {}: \"{}\"",
                    lines.line_number(),
                    content
                )));
            }
        }
    }
    Ok((!batch.is_empty()).then_some(batch))
}

/// Sort by coordinates and sum counts sharing the same pixel
fn sort_and_coalesce<N: Count>(batch: &mut Vec<Pixel<N>>) -> anyhow::Result<()> {
    batch.par_sort_unstable_by_key(|p| p.coords);
    let mut overflow = None;
    batch.dedup_by(|next, kept| {
        if next.coords != kept.coords {
            return false;
        }
        match kept.count.checked_add(next.count) {
            Some(sum) => kept.count = sum,
            None => {
                overflow.get_or_insert(kept.coords);
            }
        }
        true
    });
    if let Some(coords) = overflow {
        bail!(
            "count overflow while summing duplicate entries of pixel {}",
            coords
        );
    }
    Ok(())
}

/// Write a single temporary Cooler to its final location
fn copy_cooler(src: &Path, dest_uri: &str, force: bool) -> anyhow::Result<()> {
    let dest = CoolerUri::parse(dest_uri)?;
    if dest.is_root() {
        if dest.path().exists() && !force {
            bail!("unable to create \"{}\": path already exists", dest_uri);
        }
        std::fs::copy(src, dest.path())
            .with_context(|| format!("failed to copy \"{}\" to \"{}\"", src.display(), dest_uri))?;
        return Ok(());
    }

    let clr = File::open_read_only(&src.display().to_string())?;
    let opts = CreateOptions::default().with_count_type(clr.count_type());
    let mut out = File::create(dest_uri, clr.chromosomes().clone(), clr.bin_size(), force, opts)?;
    if clr.count_type().is_float() {
        out.append_pixels(clr.pixels()?.read_all::<f64>()?)?;
    } else {
        out.append_pixels(clr.pixels()?.read_all::<i64>()?)?;
    }
    out.close()?;
    Ok(())
}

fn run_validate(args: &ValidateArgs) -> anyhow::Result<bool> {
    let uri = CoolerUri::parse(&args.uri)?;
    let format = if uri.is_root() && is_hdf5(uri.path()) {
        let file = hdf5::File::open(uri.path())
            .with_context(|| format!("failed to open \"{}\"", uri))?;
        read_str_attr(&file, "format")?
    } else {
        None
    };

    let (report, valid) = match format.as_deref() {
        Some(MCOOL_MAGIC) => {
            let status = is_multires(&args.uri, !args.shallow)?;
            (status.to_string(), status.is_valid())
        }
        Some(SCOOL_MAGIC) => {
            let status = is_scool(&args.uri, !args.shallow)?;
            (status.to_string(), status.is_valid())
        }
        _ => {
            let status = is_cooler(&args.uri)?;
            (status.to_string(), status.is_valid())
        }
    };
    println!("{}", report);
    Ok(valid)
}

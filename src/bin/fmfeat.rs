use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use fmfeature::config::{ConvertBuilder, ConvertConfig};
use fmfeature::serialization::{self, RowReader, RowWriter};
use fmfeature::{parse_row, total_bytes, ConvertSummary, Feature, FeatureArena, FeatureMode};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use rustc_hash::FxHashSet;
use serde_json::json;

const ROW_FILE_EXTENSION: &str = "fmf";

#[derive(Parser, Debug)]
#[command(author, version, about = "Sparse feature token toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse feature tokens given on the command line
    Parse(ParseArgs),
    /// Encode text rows into binary row files
    Encode(EncodeArgs),
    /// Decode a binary row file back into text rows
    Decode(DecodeArgs),
    /// Summarise a binary row file
    Info(InfoArgs),
    /// Rewrite a binary row file in random row order
    Shuffle(ShuffleArgs),
}

/// Feature variant selected on the command line.
#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    /// Integer feature indices.
    Indexed,
    /// String feature names with optional fields.
    Named,
}

impl From<ModeArg> for FeatureMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Indexed => FeatureMode::Indexed,
            ModeArg::Named => FeatureMode::Named,
        }
    }
}

impl fmt::Display for ModeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(FeatureMode::from(*self).as_str())
    }
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// Feature mode used to interpret tokens
    #[arg(short, long, value_enum, default_value_t = ModeArg::Named)]
    mode: ModeArg,

    /// Token treated as an absent element
    #[arg(long, value_name = "TOKEN")]
    null_token: Option<String>,

    /// Emit a JSON document instead of one feature per line
    #[arg(long)]
    json: bool,

    /// Tokens forming one row
    #[arg(required = true, allow_hyphen_values = true, value_name = "TOKEN")]
    tokens: Vec<String>,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Text files with one row per line
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output path (single input only)
    #[arg(short, long, value_name = "PATH", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Directory receiving `<input>.fmf` files (defaults to each input's directory)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// JSON conversion config; flags below override its values
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Feature mode used to interpret tokens
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Token treated as an absent element
    #[arg(long, value_name = "TOKEN", conflicts_with = "no_null_token")]
    null_token: Option<String>,

    /// Treat every token as present
    #[arg(long)]
    no_null_token: bool,

    /// Drop rows that fail to parse instead of aborting
    #[arg(long)]
    skip_invalid_rows: bool,

    /// Drop rows without any feature
    #[arg(long)]
    skip_empty_rows: bool,

    /// Limit Rayon worker threads
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Disable the progress spinner
    #[arg(long)]
    no_progress: bool,

    /// Print the conversion summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Binary row file to decode
    input: PathBuf,

    /// Output file for text rows (defaults to stdout)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Emit one JSON array of features per row
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Binary row file to inspect
    input: PathBuf,

    /// Emit machine-readable JSON summary
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ShuffleArgs {
    /// Binary row file to shuffle
    input: PathBuf,

    /// Destination row file
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    /// Seed for a reproducible order
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Parse(args) => run_parse(args),
        Commands::Encode(args) => run_encode(args),
        Commands::Decode(args) => run_decode(args),
        Commands::Info(args) => run_info(args),
        Commands::Shuffle(args) => run_shuffle(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = match (quiet, verbose) {
        (0, 0) => None,
        (1, _) => Some(LevelFilter::Warn),
        (q, _) if q > 1 => Some(LevelFilter::Error),
        (_, 1) => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    // Explicit -v/-q wins over RUST_LOG.
    if let Some(level) = level {
        builder.filter_level(level);
    }
    let _ = builder.try_init();
}

fn run_parse(args: ParseArgs) -> Result<()> {
    let mode = FeatureMode::from(args.mode);
    let row = args
        .tokens
        .iter()
        .map(|token| match &args.null_token {
            Some(marker) if marker == token => None,
            _ => Some(token.as_str()),
        })
        .collect::<Vec<_>>();
    let features = parse_row(Some(&row), mode)
        .context("failed to parse row")?
        .unwrap_or_default();
    let bytes = total_bytes(&features);

    if args.json {
        let summary = json!({
            "mode": mode,
            "features": features,
            "total_bytes": bytes,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for feature in &features {
            println!("{feature}\t{} bytes", feature.byte_size());
        }
        println!("{} features, {} bytes", features.len(), bytes);
    }
    Ok(())
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    if args.output.is_some() && args.inputs.len() > 1 {
        return Err(anyhow!(
            "--output accepts a single input; use --output-dir for several"
        ));
    }
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("unable to configure Rayon thread pool")?;
    }

    let cfg = encode_config(&args)?;
    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }
    let jobs = args
        .inputs
        .iter()
        .map(|input| {
            let output = match (&args.output, &args.output_dir) {
                (Some(path), _) => path.clone(),
                (None, dir) => row_file_path(input, dir.as_deref()),
            };
            (input.clone(), output)
        })
        .collect::<Vec<_>>();

    let spinner = if args.no_progress {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} encoding rows... {elapsed}")
            .context("invalid progress template")?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let start = Instant::now();
    let results = jobs
        .par_iter()
        .map(|(input, output)| encode_file(input, output, &cfg))
        .collect::<Vec<_>>();
    if let Some(pb) = spinner {
        pb.finish_with_message("encoding complete");
    }

    let mut total = ConvertSummary::new();
    for ((input, output), result) in jobs.iter().zip(results) {
        let summary = result?;
        info!(
            "{} => {} rows={} skipped={} features={} bytes={}",
            input.display(),
            output.display(),
            summary.rows_written,
            summary.rows_skipped,
            summary.features,
            summary.bytes_written
        );
        if !args.json {
            println!("{} => {}", input.display(), output.display());
        }
        total.merge(&summary);
    }
    total.elapsed = start.elapsed();
    if total.rows_skipped > 0 {
        warn!("{} rows skipped", total.rows_skipped);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&total)?);
    } else {
        println!(
            "   rows {} | features {} | bytes {} | duration {:.2?}",
            total.rows_written, total.features, total.bytes_written, total.elapsed
        );
    }
    Ok(())
}

fn encode_config(args: &EncodeArgs) -> Result<ConvertConfig> {
    let base = match &args.config {
        Some(path) => ConvertConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConvertConfig::default(),
    };
    let mut builder = ConvertBuilder::from_config(base.clone());
    if let Some(mode) = args.mode {
        builder = builder.mode(mode.into());
    }
    if args.no_null_token {
        builder = builder.null_token(None::<String>);
    } else if let Some(marker) = &args.null_token {
        builder = builder.null_token(Some(marker.clone()));
    }
    builder = builder
        .skip_invalid_rows(args.skip_invalid_rows || base.skip_invalid_rows)
        .skip_empty_rows(args.skip_empty_rows || base.skip_empty_rows);
    Ok(builder.build()?)
}

fn row_file_path(input: &Path, dir: Option<&Path>) -> PathBuf {
    let filename = input
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "rows".to_string());
    let parent = dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    parent.join(format!("{filename}.{ROW_FILE_EXTENSION}"))
}

fn encode_file(input: &Path, output: &Path, cfg: &ConvertConfig) -> Result<ConvertSummary> {
    let reader = BufReader::new(
        File::open(input).with_context(|| format!("failed to open input {}", input.display()))?,
    );
    let writer = BufWriter::new(
        File::create(output).with_context(|| format!("failed to create {}", output.display()))?,
    );
    serialization::encode_text(reader, writer, cfg)
        .with_context(|| format!("failed to encode {}", input.display()))
}

fn open_rows(path: &Path) -> Result<RowReader<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    RowReader::new(BufReader::new(file))
        .with_context(|| format!("{} is not a readable row file", path.display()))
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let summary = if args.json {
        let mut reader = open_rows(&args.input)?;
        let mut arena = FeatureArena::new();
        let mut summary = ConvertSummary::new();
        while let Some(features) = reader
            .next_row(&mut arena)
            .with_context(|| format!("failed to decode {}", args.input.display()))?
        {
            let line = serde_json::to_string(features)?;
            writeln!(out, "{line}")?;
            summary.rows_read += 1;
            summary.rows_written += 1;
            summary.features += features.len() as u64;
            summary.bytes_written += line.len() as u64 + 1;
        }
        out.flush()?;
        summary
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open {}", args.input.display()))?;
        serialization::decode_to_text(BufReader::new(file), &mut out)
            .with_context(|| format!("failed to decode {}", args.input.display()))?
    };

    if let Some(path) = &args.output {
        println!("wrote {} rows to {}", summary.rows_written, path.display());
    }
    info!(
        "decoded {} rows ({} features)",
        summary.rows_read, summary.features
    );
    Ok(())
}

/// Identity of a feature independent of its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FeatureKey {
    Index(i32),
    Named(Option<String>, String),
}

impl FeatureKey {
    fn of(feature: &Feature) -> Self {
        match feature {
            Feature::Index(f) => FeatureKey::Index(f.index()),
            Feature::Named(f) => {
                FeatureKey::Named(f.field().map(str::to_owned), f.name().to_owned())
            }
        }
    }
}

fn run_info(args: InfoArgs) -> Result<()> {
    let file_bytes = fs::metadata(&args.input)
        .with_context(|| format!("failed to stat {}", args.input.display()))?
        .len();
    let mut reader = open_rows(&args.input)?;
    let mode = reader.mode();
    let mut arena = FeatureArena::new();
    let mut keys = FxHashSet::default();
    let mut features = 0usize;
    let mut payload = 0usize;
    let mut min_width = usize::MAX;
    let mut max_width = 0usize;
    while let Some(row) = reader
        .next_row(&mut arena)
        .with_context(|| format!("failed to decode {}", args.input.display()))?
    {
        features += row.len();
        payload += total_bytes(row);
        min_width = min_width.min(row.len());
        max_width = max_width.max(row.len());
        keys.extend(row.iter().map(FeatureKey::of));
    }
    let rows = reader.rows();
    if rows == 0 {
        min_width = 0;
    }
    let mean_width = if rows > 0 {
        features as f64 / rows as f64
    } else {
        0.0
    };

    let summary = json!({
        "path": args.input.display().to_string(),
        "mode": mode,
        "rows": rows,
        "features": features,
        "distinct_features": keys.len(),
        "payload_bytes": payload,
        "file_bytes": file_bytes,
        "min_row_width": min_width,
        "max_row_width": max_width,
        "mean_row_width": mean_width,
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Mode            : {mode}");
        println!("Rows            : {rows}");
        println!("Features        : {features}");
        println!("Distinct        : {}", keys.len());
        println!("Payload bytes   : {payload}");
        println!("File bytes      : {file_bytes}");
        println!("Row width       : min {min_width} / max {max_width} / mean {mean_width:.2}");
    }
    Ok(())
}

fn run_shuffle(args: ShuffleArgs) -> Result<()> {
    let mut reader = open_rows(&args.input)?;
    let mode = reader.mode();
    let mut rows = reader
        .read_all()
        .with_context(|| format!("failed to decode {}", args.input.display()))?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    rows.shuffle(&mut rng);

    let file = File::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    let mut writer = RowWriter::new(BufWriter::new(file), mode)?;
    for row in &rows {
        writer.write_row(row)?;
    }
    let written = writer.rows();
    let bytes = writer.bytes_written();
    writer
        .finish()
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    info!("shuffled {written} rows ({bytes} bytes)");
    println!("wrote {written} shuffled rows to {}", args.output.display());
    Ok(())
}

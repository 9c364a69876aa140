use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use affiliation_analytics::model::UnitType;
use affiliation_analytics::params::parse_year;
use affiliation_analytics::{
    Engine, EngineConfig, MemoryStore, MetricKey, PlotRequest, PlotResponse, RawProductsQuery,
};

#[derive(Parser, Debug)]
#[command(name = "affiliation-analytics", about = "Affiliation-scoped research analytics over corpus dumps")]
struct Cli {
    #[arg(short = 'c', long = "corpus-dir", required = true)]
    corpus_dir: PathBuf,
    #[arg(long = "config")]
    config: Option<PathBuf>,
    #[arg(short = 't', long = "threads", default_value_t = 0)]
    threads: usize,
    #[arg(short = 'b', long = "batch-size")]
    batch_size: Option<usize>,
    #[arg(long = "log-level", default_value = "INFO", value_parser = clap::value_parser!(LevelFilter))]
    log_level: LevelFilter,
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one metric from the dispatch table
    Plot(PlotArgs),
    /// Page through a unit's research products
    Products(ProductsArgs),
    /// Unit details and the units and members under it
    Info(UnitArgs),
}

#[derive(Args, Debug)]
struct UnitArgs {
    #[arg(short = 'u', long = "unit", required = true)]
    unit: String,
    #[arg(long = "unit-type")]
    unit_type: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Args, Debug)]
struct PlotArgs {
    #[command(flatten)]
    unit: UnitArgs,
    #[arg(short = 'm', long = "metric", required = true)]
    metric: String,
    #[arg(long = "start-year")]
    start_year: Option<String>,
    #[arg(long = "end-year")]
    end_year: Option<String>,
    #[arg(long = "aff-type")]
    aff_type: Option<String>,
    #[arg(long = "level")]
    level: Option<i64>,
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct ProductsArgs {
    #[command(flatten)]
    unit: UnitArgs,
    #[arg(long = "page")]
    page: Option<String>,
    #[arg(long = "max")]
    max: Option<String>,
    #[arg(long = "sort")]
    sort: Option<String>,
    #[arg(long = "direction")]
    direction: Option<String>,
    #[arg(long = "start-year")]
    start_year: Option<String>,
    #[arg(long = "end-year")]
    end_year: Option<String>,
}

#[derive(Serialize)]
struct InfoOutput<T: Serialize, R: Serialize> {
    data: T,
    related: R,
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}.{:03}s", secs, elapsed.subsec_millis())
    }
}

fn parse_unit_type(raw: Option<&str>) -> Result<Option<UnitType>> {
    raw.map(str::parse::<UnitType>)
        .transpose()
        .context("Invalid unit type")
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if !parent.exists() {
                    info!("Creating output directory: {}", parent.display());
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("Failed to serialize output")?;
    writeln!(out)?;
    Ok(())
}

fn write_csv(out: &mut dyn Write, response: &PlotResponse) -> Result<()> {
    let records = response
        .plot
        .as_ref()
        .and_then(|plot| plot.records())
        .unwrap_or_default();
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["dimension", "series", "value"])?;
    for record in records {
        writer.write_record([
            record.dimension.to_string(),
            record.series.clone().unwrap_or_default(),
            record.value.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if cli.threads > 0 {
        config.member_concurrency = cli.threads;
    }
    if let Some(batch_size) = cli.batch_size {
        config.member_batch_size = batch_size;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let main_start_time = Instant::now();
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level)
        .format_timestamp_secs()
        .init();

    let config = load_config(&cli)?;

    info!("Configuration:");
    info!("  Corpus Directory: {}", cli.corpus_dir.display());
    info!(
        "  Output: {}",
        cli.output
            .as_ref()
            .map_or("stdout".to_string(), |p| p.display().to_string())
    );
    info!(
        "  Threads: {}",
        if config.member_concurrency == 0 { "Auto".to_string() } else { config.member_concurrency.to_string() }
    );
    info!("  Batch Size: {}", config.member_batch_size);
    info!("  Log Level: {}", cli.log_level);

    let load_start = Instant::now();
    let store = MemoryStore::load_dir(&cli.corpus_dir)
        .with_context(|| format!("Failed to load corpus from {}", cli.corpus_dir.display()))?;
    info!("Loaded corpus in {}", format_elapsed(load_start.elapsed()));

    let engine = Engine::with_config(store, config).context("Failed to build engine")?;
    let mut out = open_output(cli.output.as_deref())?;

    let run_start = Instant::now();
    match &cli.command {
        Command::Plot(args) => {
            let key = MetricKey::parse(&args.metric).context("Unknown metric")?;
            let request = PlotRequest {
                unit_id: args.unit.unit.clone(),
                unit_type: parse_unit_type(args.unit.unit_type.as_deref())?,
                start_year: parse_year("start_year", args.start_year.as_deref())?,
                end_year: parse_year("end_year", args.end_year.as_deref())?,
                aff_type: parse_unit_type(args.aff_type.as_deref())?,
                level: args.level,
            };
            let response = engine
                .plot(key, &request)
                .with_context(|| format!("Failed to compute {} for {}", key, request.unit_id))?;
            match args.format {
                OutputFormat::Json => write_json(&mut *out, &response)?,
                OutputFormat::Csv => write_csv(&mut *out, &response)?,
            }
        }
        Command::Products(args) => {
            let raw = RawProductsQuery {
                start_year: args.start_year.clone(),
                end_year: args.end_year.clone(),
                page: args.page.clone(),
                max: args.max.clone(),
                sort: args.sort.clone(),
                direction: args.direction.clone(),
            };
            let unit_type = parse_unit_type(args.unit.unit_type.as_deref())?;
            let page = engine
                .get_research_products(&args.unit.unit, unit_type, &raw)
                .with_context(|| format!("Failed to list products of {}", args.unit.unit))?;
            info!(
                "Listed {} of {} products (page {})",
                page.count, page.total_results, page.page
            );
            write_json(&mut *out, &page)?;
        }
        Command::Info(args) => {
            let unit_type = parse_unit_type(args.unit_type.as_deref())?;
            let data = engine
                .unit_info(&args.unit, unit_type)
                .with_context(|| format!("Failed to describe {}", args.unit))?;
            let related = engine.related_info(&args.unit, unit_type)?;
            write_json(&mut *out, &InfoOutput { data, related })?;
        }
    }
    out.flush()?;

    info!("Request finished in {}", format_elapsed(run_start.elapsed()));
    info!("Total execution time: {}", format_elapsed(main_start_time.elapsed()));
    Ok(())
}

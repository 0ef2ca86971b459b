use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use specbook::archive::read_spectra_archive;
use specbook::domain::SpectrumType;
use specbook::error::SpecbookError;
use specbook::fetch::{FetchKind, FetchOptions, FetchReport, run_fetch};
use specbook::index::CompoundIndex;
use specbook::output::{ConsoleOutput, JsonOutput, OutputMode, ProgressSink};
use specbook::sdf::write_sdf;
use specbook::store::{ensure_dir, scan_loaded};
use specbook::tabulate::{ProcessSummary, sparse_records, write_dense_csv, write_json};
use specbook::webbook::WebbookHttpClient;

#[derive(Parser)]
#[command(name = "specbook")]
#[command(about = "Downloads and tabulates chemistry webbook spectra and 3D MOL-files")]
#[command(version, author)]
struct Cli {
    /// Emit a JSON summary instead of per-item console output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Bulk-download compound artifacts, resuming where a previous run stopped")]
    Fetch(FetchArgs),
    #[command(about = "Assemble downloaded MOL-files into one SDF file")]
    Sdf(SdfArgs),
    #[command(about = "Transform an archive of raw spectra into JSON or a dense CSV table")]
    Process(ProcessArgs),
}

#[derive(Args)]
struct FetchArgs {
    #[command(subcommand)]
    target: FetchTarget,
}

#[derive(Subcommand)]
enum FetchTarget {
    #[command(about = "Fetch 3D MOL-files")]
    Mol3d(FetchCommon),
    #[command(about = "Fetch spectra of one type")]
    Spectra {
        spec_type: SpectrumType,

        #[command(flatten)]
        common: FetchCommon,
    },
}

#[derive(Args, Clone)]
struct FetchCommon {
    /// Directory the downloaded files land in (created if missing).
    destination: Utf8PathBuf,

    /// Compound metadata index (compounds.csv).
    #[arg(long)]
    index: Utf8PathBuf,

    /// Pause between HTTP requests, seconds.
    #[arg(long, default_value_t = 5.0)]
    crawl_delay: f64,

    /// Upper bound on the scaled inter-request pause, seconds.
    #[arg(long, default_value_t = 30.0)]
    delay_cap: f64,
}

#[derive(Args)]
struct SdfArgs {
    /// Directory containing downloaded MOL-files.
    dir_mol: Utf8PathBuf,

    /// Output SDF file.
    path_sdf: Utf8PathBuf,
}

#[derive(Args)]
struct ProcessArgs {
    /// Zip archive of raw spectrum files.
    path_zip: Utf8PathBuf,

    /// Compound metadata index (compounds.csv).
    #[arg(long)]
    index: Utf8PathBuf,

    /// Output file.
    #[arg(long)]
    out: Utf8PathBuf,

    #[arg(long, value_enum, default_value_t = ProcessFormat::Json)]
    format: ProcessFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProcessFormat {
    Json,
    Csv,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SpecbookError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SpecbookError) -> u8 {
    match error {
        SpecbookError::IndexNotFound(_)
        | SpecbookError::IndexRead(_)
        | SpecbookError::IndexColumn(_)
        | SpecbookError::ArchiveNotFound(_)
        | SpecbookError::MissingOutputDir(_)
        | SpecbookError::NotADirectory(_)
        | SpecbookError::InvalidDelay(_) => 2,
        SpecbookError::WebbookHttp(_) | SpecbookError::WebbookStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    match cli.command {
        Commands::Fetch(args) => run_fetch_command(args, output_mode),
        Commands::Sdf(args) => run_sdf(args, output_mode),
        Commands::Process(args) => run_process(args, output_mode),
    }
}

fn run_fetch_command(args: FetchArgs, output_mode: OutputMode) -> miette::Result<()> {
    let (kind, common) = match args.target {
        FetchTarget::Mol3d(common) => (FetchKind::Mol3d, common),
        FetchTarget::Spectra { spec_type, common } => (FetchKind::Spectra(spec_type), common),
    };

    // Boundary validation before any remote work: delays, destination, index.
    let options = FetchOptions::from_secs(common.crawl_delay, common.delay_cap).into_diagnostic()?;
    ensure_dir(&common.destination).into_diagnostic()?;
    let index = CompoundIndex::load(&common.index).into_diagnostic()?;
    let ids = index.ids_with_attribute(kind.attribute()).into_diagnostic()?;
    let loaded =
        scan_loaded(&common.destination, kind.attribute().extension()).into_diagnostic()?;

    let client = WebbookHttpClient::new().into_diagnostic()?;
    let report = match output_mode {
        OutputMode::Console => {
            eprintln!(
                "fetching {} of {} ids into {} ({} already loaded)",
                ids.len().saturating_sub(loaded.len()),
                ids.len(),
                common.destination,
                loaded.len(),
            );
            run_fetch(
                &client,
                kind,
                &ids,
                &loaded,
                &index,
                &common.destination,
                &options,
                &ConsoleOutput,
            )
        }
        OutputMode::Json => run_fetch(
            &client,
            kind,
            &ids,
            &loaded,
            &index,
            &common.destination,
            &options,
            &JsonOutput,
        ),
    };

    match output_mode {
        OutputMode::Console => print_fetch_summary(&report),
        OutputMode::Json => JsonOutput::print_fetch(&report).into_diagnostic()?,
    }
    Ok(())
}

fn print_fetch_summary(report: &FetchReport) {
    println!(
        "fetched {} item(s), {} empty, {} skipped, {} failed",
        report.fetched,
        report.empty,
        report.skipped,
        report.failed.len()
    );
    for item in &report.failed {
        println!("  failed {}: {}", item.id, item.reason);
    }
}

fn run_sdf(args: SdfArgs, output_mode: OutputMode) -> miette::Result<()> {
    ensure_output_parent(&args.path_sdf).into_diagnostic()?;
    let sink = make_sink(output_mode);
    let report = write_sdf(&args.dir_mol, &args.path_sdf, sink.as_ref()).into_diagnostic()?;
    match output_mode {
        OutputMode::Console => println!(
            "wrote {} records to {} ({} bad files excluded)",
            report.written, report.output, report.bad
        ),
        OutputMode::Json => {
            JsonOutput::print_process(&ProcessSummary {
                parsed: report.written,
                unparseable: report.bad,
                written: report.written,
                output: report.output.clone(),
            })
            .into_diagnostic()?;
        }
    }
    Ok(())
}

fn run_process(args: ProcessArgs, output_mode: OutputMode) -> miette::Result<()> {
    let index = CompoundIndex::load(&args.index).into_diagnostic()?;
    ensure_output_parent(&args.out).into_diagnostic()?;

    let sink = make_sink(output_mode);
    let parsed = read_spectra_archive(&args.path_zip, sink.as_ref()).into_diagnostic()?;
    if matches!(output_mode, OutputMode::Console) {
        eprintln!("{} unparseable files", parsed.unparseable);
    }

    let written = match args.format {
        ProcessFormat::Json => {
            let records = sparse_records(&parsed.spectra, &index);
            write_json(&records, &args.out).into_diagnostic()?;
            records.len()
        }
        ProcessFormat::Csv => {
            write_dense_csv(&parsed.spectra, &index, &args.out).into_diagnostic()?
        }
    };

    let summary = ProcessSummary {
        parsed: parsed.spectra.len(),
        unparseable: parsed.unparseable,
        written,
        output: args.out.to_string(),
    };
    match output_mode {
        OutputMode::Console => println!(
            "wrote {} record(s) to {}",
            summary.written, summary.output
        ),
        OutputMode::Json => JsonOutput::print_process(&summary).into_diagnostic()?,
    }
    Ok(())
}

fn ensure_output_parent(path: &Utf8PathBuf) -> Result<(), SpecbookError> {
    match path.parent() {
        Some(parent) if parent.as_str().is_empty() => Ok(()),
        Some(parent) if parent.as_std_path().is_dir() => Ok(()),
        Some(parent) => Err(SpecbookError::MissingOutputDir(parent.to_path_buf())),
        None => Err(SpecbookError::MissingOutputDir(path.clone())),
    }
}

fn make_sink(output_mode: OutputMode) -> Box<dyn ProgressSink> {
    match output_mode {
        OutputMode::Console => Box::new(ConsoleOutput),
        OutputMode::Json => Box::new(JsonOutput),
    }
}

//! A CLI tool for indexing DICOM files
//! and browsing or rendering what was indexed.
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dicomview_core::dataset::DataSet;
use dicomview_ingest::{CancelToken, IngestConfig, Library};
use dicomview_pixeldata::{DisplayBuffer, WindowLevel};
use dicomview_store::{IndexRecord, QueryFilter};
use snafu::{whatever, OptionExt, Report, ResultExt, Whatever};
use tracing::{error, info, metadata::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

/// Index, browse and render DICOM files
#[derive(Debug, Parser)]
#[command(name = "dicomview", version)]
struct App {
    /// Print more information while working
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Path to the configuration file
    /// (default is `<config dir>/dicomview/config.toml`)
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Path to the index database (overrides the configuration)
    #[arg(long = "db", global = true)]
    database: Option<PathBuf>,

    /// Number of worker threads for importing (0 for one per core)
    #[arg(short = 'j', long = "jobs", global = true)]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Index DICOM files, searching directories recursively
    Import {
        /// Files or directories to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List the indexed instances
    List {
        /// Patient name, with `*` and `?` wildcards (case sensitive)
        #[arg(long = "patient-name")]
        patient_name: Option<String>,
        /// Earliest study date (YYYYMMDD or YYYY-MM-DD)
        #[arg(long = "from", value_parser = parse_date)]
        from: Option<NaiveDate>,
        /// Latest study date (YYYYMMDD or YYYY-MM-DD)
        #[arg(long = "to", value_parser = parse_date)]
        to: Option<NaiveDate>,
        /// Modality, such as CT or MR
        #[arg(short = 'm', long = "modality")]
        modality: Option<String>,
    },
    /// Render a frame of an indexed instance into a PNG file
    Render {
        /// SOP Instance UID of the instance
        uid: String,
        /// Frame number (0-indexed)
        #[arg(short = 'F', long = "frame", default_value = "0")]
        frame: u32,
        /// Window center (requires --width)
        #[arg(long = "center", requires = "width", allow_hyphen_values = true)]
        center: Option<f64>,
        /// Window width (requires --center)
        #[arg(long = "width", requires = "center")]
        width: Option<f64>,
        /// Path to the output image (default is `<uid>.png`)
        #[arg(short = 'o', long = "out")]
        output: Option<PathBuf>,
    },
    /// Remove a study from the index, keeping its files
    DeleteStudy {
        /// Study Instance UID
        uid: String,
    },
    /// Print the data elements of a DICOM file
    Dump {
        /// Path to the DICOM file
        file: PathBuf,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|e| format!("invalid date `{}`: {}", value, e))
}

fn main() {
    let App {
        verbose,
        config,
        database,
        jobs,
        command,
    } = App::parse();

    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::builder()
                    .with_default_directive(default_level.into())
                    .from_env_lossy(),
            )
            .with_writer(std::io::stderr)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    if let Command::Dump { file } = &command {
        dump(file).unwrap_or_else(|e| {
            error!("{}", Report::from_error(e));
            std::process::exit(-2);
        });
        return;
    }

    let config = load_config(config.as_deref(), database, jobs).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });
    let library = Library::open(config).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });

    let outcome = match command {
        Command::Import { paths } => import(&library, &paths, verbose),
        Command::List {
            patient_name,
            from,
            to,
            modality,
        } => {
            let mut filter = QueryFilter::new().study_date_between(from, to);
            if let Some(name) = patient_name {
                filter = filter.patient_name_matching(name);
            }
            if let Some(modality) = modality {
                filter = filter.modality(modality);
            }
            list(&library, &filter)
        }
        Command::Render {
            uid,
            frame,
            center,
            width,
            output,
        } => render(&library, &uid, frame, center.zip(width), output),
        Command::DeleteStudy { uid } => library
            .delete_study(&uid)
            .whatever_context("Could not delete study")
            .map(|count| info!("Removed study {} ({} instance(s))", uid, count)),
        Command::Dump { .. } => Ok(()),
    };

    outcome.unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-3);
    });
}

fn load_config(
    path: Option<&Path>,
    database: Option<PathBuf>,
    jobs: Option<usize>,
) -> Result<IngestConfig, Whatever> {
    let mut config = match path {
        Some(path) => IngestConfig::load(path),
        None => IngestConfig::load_default(),
    }
    .whatever_context("Could not load configuration")?;
    if let Some(database) = database {
        config.database_path = database;
    }
    if let Some(jobs) = jobs {
        config.worker_threads = jobs;
    }
    Ok(config)
}

fn import(library: &Library, paths: &[PathBuf], verbose: bool) -> Result<(), Whatever> {
    let summary = library
        .import(paths, |progress| {
            if verbose {
                info!(
                    "[{}/{}] {}",
                    progress.processed,
                    progress.total,
                    progress.path.display()
                );
            }
        })
        .whatever_context("Import failed")?;

    for failed in &summary.failed {
        warn!("{}: {} ({})", failed.path.display(), failed.kind, failed.reason);
    }
    println!(
        "{} file(s) indexed, {} failed",
        summary.succeeded.len(),
        summary.failed.len()
    );
    Ok(())
}

fn list(library: &Library, filter: &QueryFilter) -> Result<(), Whatever> {
    let records = library
        .query(filter)
        .whatever_context("Could not query the index")?;
    for record in &records {
        println!("{}", describe(record));
    }
    info!("{} instance(s)", records.len());
    Ok(())
}

fn describe(record: &IndexRecord) -> String {
    let IndexRecord {
        patient,
        study,
        series,
        instance,
    } = record;
    format!(
        "{:<24} {:<10} {:<4} {:>4} {:>5}  {}  {}",
        patient.patient_name.as_deref().unwrap_or("(no name)"),
        study
            .study_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string()),
        series.modality.as_deref().unwrap_or("-"),
        series
            .series_number
            .map(|n| n.to_string())
            .unwrap_or_default(),
        instance
            .instance_number
            .map(|n| n.to_string())
            .unwrap_or_default(),
        instance.sop_instance_uid,
        instance.file_path.display(),
    )
}

fn render(
    library: &Library,
    uid: &str,
    frame: u32,
    window: Option<(f64, f64)>,
    output: Option<PathBuf>,
) -> Result<(), Whatever> {
    let window = window
        .map(|(center, width)| WindowLevel::new(center, width))
        .transpose()
        .whatever_context("Invalid window")?;
    let buffer = library
        .render_frame(uid, frame, window, &CancelToken::new())
        .whatever_context("Could not render frame")?;

    let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.png", uid)));
    save_png(buffer, &output)?;
    info!("Image saved to {}", output.display());
    Ok(())
}

fn save_png(buffer: DisplayBuffer, output: &Path) -> Result<(), Whatever> {
    let DisplayBuffer {
        width,
        height,
        samples_per_pixel,
        data,
    } = buffer;
    let image = match samples_per_pixel {
        1 => image::GrayImage::from_raw(width, height, data).map(image::DynamicImage::ImageLuma8),
        3 => image::RgbImage::from_raw(width, height, data).map(image::DynamicImage::ImageRgb8),
        spp => whatever!("Unsupported number of samples per pixel: {}", spp),
    }
    .whatever_context("Display buffer does not match its dimensions")?;
    image
        .save(output)
        .with_whatever_context(|_| format!("Could not save image to {}", output.display()))
}

fn dump(path: &Path) -> Result<(), Whatever> {
    let bytes = std::fs::read(path)
        .with_whatever_context(|_| format!("Could not read {}", path.display()))?;
    let set = dicomview_parser::parse(&bytes)
        .with_whatever_context(|_| format!("Could not parse {}", path.display()))?;
    if let Some(meta) = set.meta() {
        println!("# Transfer Syntax: {}", meta.transfer_syntax);
    }
    print_elements(&set, 0);
    Ok(())
}

fn print_elements(set: &DataSet, depth: usize) {
    for element in set {
        println!("{:indent$}{}", "", element, indent = depth * 2);
        if let Some(items) = element.items() {
            for (i, item) in items.iter().enumerate() {
                println!("{:indent$}(Item #{})", "", i, indent = depth * 2 + 2);
                print_elements(item, depth + 2);
            }
        }
    }
}

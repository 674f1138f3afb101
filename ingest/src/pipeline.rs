//! The batch ingestion pipeline.
//!
//! ```text
//! [worker pool]  --(index, outcome)-->  [writer thread]  -->  index store
//!  read + parse        bounded            one upsert
//!  + extract           channel            per record
//! ```
//!
//! Per-file failures are recorded and never stop the batch.
//! A store failure stops the writer and fails the whole batch.

use crate::config::IngestConfig;
use crate::error::{
    BuildThreadPoolSnafu, FailureKind, FileError, Result, StoreSnafu, WriterPanickedSnafu,
};
use crate::extract::read_record;
use crossbeam_channel::bounded;
use dicomview_store::{IndexRecord, IndexStore};
use rayon::prelude::*;
use snafu::{Report, ResultExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A file which could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub kind: FailureKind,
    /// a human readable description of the failure
    pub reason: String,
}

/// The outcome of a batch, in the order of the input paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// the files now in the index
    pub succeeded: Vec<PathBuf>,
    /// the files left out of the index
    pub failed: Vec<FailedFile>,
}

impl IngestSummary {
    /// The number of files processed.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Progress of a batch, reported once per processed file.
#[derive(Debug, Clone, Copy)]
pub struct IngestProgress<'a> {
    /// the number of files processed so far, this one included
    pub processed: usize,
    /// the number of files in the batch
    pub total: usize,
    pub path: &'a Path,
    /// why the file was not indexed, if it was not
    pub failure: Option<FailureKind>,
}

enum Outcome {
    Indexed,
    Failed(FailedFile),
}

/// Index the given files.
///
/// Files are read and parsed on a pool of
/// [`worker_threads`](IngestConfig::worker_threads) threads,
/// while a single writer stores the records.
/// Ingesting a file already in the index replaces its record.
///
/// The progress callback is called from the writer thread.
pub fn ingest<P>(
    store: &IndexStore,
    paths: &[P],
    config: &IngestConfig,
    mut progress: impl FnMut(IngestProgress<'_>) + Send,
) -> Result<IngestSummary>
where
    P: AsRef<Path> + Sync,
{
    let total = paths.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build()
        .context(BuildThreadPoolSnafu)?;
    let (tx, rx) = bounded::<(usize, Result<IndexRecord, FileError>)>(
        config.channel_capacity.max(1),
    );
    let halted = AtomicBool::new(false);

    let outcomes = std::thread::scope(|scope| {
        let writer = scope.spawn(|| {
            let mut outcomes: Vec<(usize, Outcome)> = Vec::with_capacity(total);
            for (index, extracted) in rx {
                let path = paths[index].as_ref();
                let outcome = match extracted {
                    Ok(record) => {
                        if let Err(e) = store.upsert(&record) {
                            halted.store(true, Ordering::Relaxed);
                            return Err(e).context(StoreSnafu);
                        }
                        debug!("Indexed {}", path.display());
                        Outcome::Indexed
                    }
                    Err(e) => {
                        warn!("{}", Report::from_error(&e));
                        Outcome::Failed(FailedFile {
                            path: path.to_owned(),
                            kind: e.kind(),
                            reason: Report::from_error(&e).to_string(),
                        })
                    }
                };
                progress(IngestProgress {
                    processed: outcomes.len() + 1,
                    total,
                    path,
                    failure: match &outcome {
                        Outcome::Indexed => None,
                        Outcome::Failed(f) => Some(f.kind),
                    },
                });
                outcomes.push((index, outcome));
            }
            Ok(outcomes)
        });

        pool.install(|| {
            paths
                .par_iter()
                .enumerate()
                .for_each_with(tx, |tx, (index, path)| {
                    if halted.load(Ordering::Relaxed) {
                        return;
                    }
                    let extracted = read_record(path.as_ref());
                    // the writer only hangs up after a store failure
                    let _ = tx.send((index, extracted));
                });
        });

        writer.join()
    });

    let mut outcomes = match outcomes {
        Ok(outcomes) => outcomes?,
        Err(_) => return WriterPanickedSnafu.fail(),
    };
    outcomes.sort_by_key(|(index, _)| *index);

    let mut summary = IngestSummary::default();
    for (index, outcome) in outcomes {
        match outcome {
            Outcome::Indexed => summary.succeeded.push(paths[index].as_ref().to_owned()),
            Outcome::Failed(failed) => summary.failed.push(failed),
        }
    }
    info!(
        "Ingested {} file(s): {} indexed, {} failed",
        summary.total(),
        summary.succeeded.len(),
        summary.failed.len()
    );
    Ok(summary)
}

/// Find the DICOM files under a directory, in a stable order.
///
/// Files are recognized by [`IngestConfig::is_candidate`].
/// Symbolic links are skipped unless
/// [`follow_symlinks`](IngestConfig::follow_symlinks) is set.
/// Entries which cannot be read are skipped with a warning.
pub fn discover(root: impl AsRef<Path>, config: &IngestConfig) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && config.is_candidate(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Expand directories among the given paths into the files they contain.
/// Other paths are kept as given.
pub fn expand_paths<P: AsRef<Path>>(paths: &[P], config: &IngestConfig) -> Vec<PathBuf> {
    paths
        .iter()
        .flat_map(|path| {
            let path = path.as_ref();
            if path.is_dir() {
                discover(path, config)
            } else {
                vec![path.to_owned()]
            }
        })
        .collect()
}

/// Index all DICOM files under a directory.
pub fn ingest_directory(
    store: &IndexStore,
    root: impl AsRef<Path>,
    config: &IngestConfig,
    progress: impl FnMut(IngestProgress<'_>) + Send,
) -> Result<IngestSummary> {
    let paths = discover(root, config);
    ingest(store, &paths, config, progress)
}

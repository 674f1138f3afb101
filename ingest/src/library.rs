//! The library: an index store with the operations
//! a viewer needs to browse it and display its images.

use crate::config::IngestConfig;
use crate::error::{
    CancelledSnafu, DecodeFrameSnafu, LookupInstanceSnafu, NotIndexedSnafu, ParseInstanceSnafu,
    ReadInstanceSnafu, RenderError, Result, StoreSnafu, TransformFrameSnafu,
};
use crate::pipeline::{self, IngestProgress, IngestSummary};
use dicomview_pixeldata::{CodecRegistry, DisplayBuffer, WindowLevel};
use dicomview_store::{
    IndexRecord, IndexStore, PatientRecord, QueryFilter, SeriesEntry, StudyRecord,
};
use snafu::{ensure, OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A flag for abandoning a render request.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token which is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// An index of DICOM files, with ingestion and rendering.
#[derive(Debug)]
pub struct Library {
    store: IndexStore,
    config: IngestConfig,
    registry: CodecRegistry,
}

impl Library {
    /// Open the index database named in the configuration.
    pub fn open(config: IngestConfig) -> Result<Self> {
        let store = IndexStore::open(&config.database_path, config.store_options())
            .context(StoreSnafu)?;
        Ok(Self::with_store(store, config))
    }

    /// Build a library over an open store.
    pub fn with_store(store: IndexStore, config: IngestConfig) -> Self {
        Library {
            store,
            config,
            registry: CodecRegistry::standard(),
        }
    }

    /// Replace the frame decoders,
    /// such as to plug in an external JPEG 2000 codec.
    pub fn with_registry(mut self, registry: CodecRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The underlying index store.
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// The configuration in use.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Index the given files and directories.
    pub fn import<P: AsRef<Path>>(
        &self,
        paths: &[P],
        progress: impl FnMut(IngestProgress<'_>) + Send,
    ) -> Result<IngestSummary> {
        let files = pipeline::expand_paths(paths, &self.config);
        pipeline::ingest(&self.store, &files, &self.config, progress)
    }

    /// Fetch the records matching the filter.
    pub fn query(&self, filter: &QueryFilter) -> Result<Vec<IndexRecord>> {
        self.store.query(filter).context(StoreSnafu)
    }

    /// List all patients.
    pub fn patients(&self) -> Result<Vec<PatientRecord>> {
        self.store.patients().context(StoreSnafu)
    }

    /// List the studies of a patient.
    pub fn studies_for_patient(&self, patient_id: &str) -> Result<Vec<StudyRecord>> {
        self.store.studies_for_patient(patient_id).context(StoreSnafu)
    }

    /// List the series of a study.
    pub fn series_for_study(&self, study_instance_uid: &str) -> Result<Vec<SeriesEntry>> {
        self.store.series_for_study(study_instance_uid).context(StoreSnafu)
    }

    /// List the instances of a series.
    pub fn instances_for_series(&self, series_instance_uid: &str) -> Result<Vec<IndexRecord>> {
        self.store
            .instances_for_series(series_instance_uid)
            .context(StoreSnafu)
    }

    /// Remove a study from the index, leaving its files in place.
    pub fn delete_study(&self, study_instance_uid: &str) -> Result<usize> {
        self.store.delete_study(study_instance_uid).context(StoreSnafu)
    }

    /// The files of a study, for maintenance outside of the library.
    pub fn file_paths_for_study(&self, study_instance_uid: &str) -> Result<Vec<PathBuf>> {
        self.store
            .file_paths_for_study(study_instance_uid)
            .context(StoreSnafu)
    }

    /// Render one frame of an indexed instance into a display buffer.
    ///
    /// The file is read and parsed again, then the frame is decoded
    /// and transformed with the given window,
    /// or the window found in the file.
    /// The token is checked between stages;
    /// a cancelled request yields [`RenderError::Cancelled`].
    pub fn render_frame(
        &self,
        sop_instance_uid: &str,
        frame: u32,
        window: Option<WindowLevel>,
        cancel: &CancelToken,
    ) -> Result<DisplayBuffer, RenderError> {
        let record = self
            .store
            .instance(sop_instance_uid)
            .context(LookupInstanceSnafu)?
            .context(NotIndexedSnafu {
                uid: sop_instance_uid,
            })?;
        let path = &record.instance.file_path;
        ensure!(!cancel.is_cancelled(), CancelledSnafu);

        let bytes = std::fs::read(path).context(ReadInstanceSnafu { path })?;
        let set = dicomview_parser::parse(&bytes).context(ParseInstanceSnafu { path })?;
        ensure!(!cancel.is_cancelled(), CancelledSnafu);

        let decoded = dicomview_pixeldata::decode_frame_with(&self.registry, &set, &bytes, frame)
            .context(DecodeFrameSnafu)?;
        ensure!(!cancel.is_cancelled(), CancelledSnafu);

        let buffer = dicomview_pixeldata::to_display_buffer(&decoded, &set, window)
            .context(TransformFrameSnafu)?;
        debug!(
            "Rendered frame #{} of {} ({}x{})",
            frame, sop_instance_uid, buffer.width, buffer.height
        );
        Ok(buffer)
    }
}

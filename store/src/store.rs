//! The index store: a single writer connection guarded by a mutex,
//! and read-only connections opened per query.

use crate::error::{
    CreateDirectorySnafu, OpenDatabaseSnafu, Result, SqlResultExt, WriterPoisonedSnafu,
};
use crate::record::{
    ImageAttributes, IndexRecord, InstanceRecord, PatientRecord, QueryFilter, SeriesEntry,
    SeriesRecord, StudyRecord,
};
use crate::schema;
use chrono::NaiveDate;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use snafu::{OptionExt, ResultExt};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Date format of the date columns, which sorts chronologically.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// The columns of a denormalized record,
/// in the order read by `record_from_row`.
const RECORD_COLUMNS: &str = "
    p.patient_id, p.patient_name, p.birth_date, p.sex,
    st.study_instance_uid, st.study_date, st.study_time, st.description,
    st.accession_number, st.referring_physician_name,
    se.series_instance_uid, se.modality, se.series_number, se.description,
    se.body_part_examined,
    i.sop_instance_uid, i.sop_class_uid, i.instance_number, i.file_path, i.file_size,
    i.transfer_syntax_uid, i.rows, i.columns, i.bits_allocated, i.bits_stored,
    i.samples_per_pixel, i.photometric_interpretation, i.window_center, i.window_width,
    i.rescale_slope, i.rescale_intercept, i.number_of_frames";

const RECORD_JOINS: &str = "
    FROM instances i
    JOIN series se ON se.series_instance_uid = i.series_instance_uid
    JOIN studies st ON st.study_instance_uid = se.study_instance_uid
    JOIN patients p ON p.patient_id = st.patient_id";

const RECORD_ORDER: &str = "
    ORDER BY p.patient_name, st.study_date DESC, se.series_number, i.instance_number,
        i.sop_instance_uid";

/// Options for opening an index store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    /// How long an operation waits for a lock held by another connection
    /// before failing with a retryable error.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// A persistent index of the patient, study, series and instance hierarchy.
///
/// All writes go through one connection behind a mutex.
/// Reads on file-backed stores use their own read-only connections,
/// so they proceed concurrently with writes under write-ahead logging.
#[derive(Debug)]
pub struct IndexStore {
    writer: Mutex<Connection>,
    /// the database file, `None` for in-memory stores
    path: Option<PathBuf>,
    options: StoreOptions,
}

/// A connection for reading,
/// either borrowed from the writer or opened for the occasion.
enum Reader<'a> {
    Shared(MutexGuard<'a, Connection>),
    Owned(Connection),
}

impl Deref for Reader<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Reader::Shared(guard) => &**guard,
            Reader::Owned(conn) => conn,
        }
    }
}

impl IndexStore {
    /// Open or create the index database at the given path.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(CreateDirectorySnafu { path: parent })?;
        }
        let conn = Connection::open(path).context(OpenDatabaseSnafu { path })?;
        conn.busy_timeout(options.busy_timeout).store_context()?;
        schema::init_writer(&conn, true).store_context()?;
        info!("Opened index database {}", path.display());
        Ok(IndexStore {
            writer: Mutex::new(conn),
            path: Some(path.to_owned()),
            options,
        })
    }

    /// Open a new store kept in memory.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().store_context()?;
        schema::init_writer(&conn, false).store_context()?;
        Ok(IndexStore {
            writer: Mutex::new(conn),
            path: None,
            options: StoreOptions::default(),
        })
    }

    /// The path to the database file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer.lock().ok().context(WriterPoisonedSnafu)
    }

    fn reader(&self) -> Result<Reader<'_>> {
        match &self.path {
            Some(path) => {
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )
                .context(OpenDatabaseSnafu { path })?;
                conn.busy_timeout(self.options.busy_timeout).store_context()?;
                Ok(Reader::Owned(conn))
            }
            None => self.lock().map(Reader::Shared),
        }
    }

    /// Insert the record, or replace the one with the same SOP Instance UID.
    ///
    /// The upper levels of the hierarchy are created or updated
    /// with the attributes of the record.
    /// The whole record is committed in one transaction.
    pub fn upsert(&self, record: &IndexRecord) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().store_context()?;

        let IndexRecord {
            patient,
            study,
            series,
            instance,
        } = record;

        tx.execute(
            "INSERT INTO patients (patient_id, patient_name, birth_date, sex)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(patient_id) DO UPDATE SET
                patient_name = excluded.patient_name,
                birth_date = excluded.birth_date,
                sex = excluded.sex",
            params![
                patient.patient_id,
                patient.patient_name,
                patient.birth_date.map(format_date),
                patient.sex,
            ],
        )
        .store_context()?;

        let previous_patient = parent_key(
            &tx,
            "SELECT patient_id FROM studies WHERE study_instance_uid = ?1",
            &study.study_instance_uid,
        )
        .store_context()?;
        tx.execute(
            "INSERT INTO studies (study_instance_uid, patient_id, study_date, study_time,
                description, accession_number, referring_physician_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(study_instance_uid) DO UPDATE SET
                patient_id = excluded.patient_id,
                study_date = excluded.study_date,
                study_time = excluded.study_time,
                description = excluded.description,
                accession_number = excluded.accession_number,
                referring_physician_name = excluded.referring_physician_name",
            params![
                study.study_instance_uid,
                patient.patient_id,
                study.study_date.map(format_date),
                study.study_time,
                study.description,
                study.accession_number,
                study.referring_physician_name,
            ],
        )
        .store_context()?;

        let previous_study = parent_key(
            &tx,
            "SELECT study_instance_uid FROM series WHERE series_instance_uid = ?1",
            &series.series_instance_uid,
        )
        .store_context()?;
        tx.execute(
            "INSERT INTO series (series_instance_uid, study_instance_uid, modality,
                series_number, description, body_part_examined)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(series_instance_uid) DO UPDATE SET
                study_instance_uid = excluded.study_instance_uid,
                modality = excluded.modality,
                series_number = excluded.series_number,
                description = excluded.description,
                body_part_examined = excluded.body_part_examined",
            params![
                series.series_instance_uid,
                study.study_instance_uid,
                series.modality,
                series.series_number,
                series.description,
                series.body_part_examined,
            ],
        )
        .store_context()?;

        let previous_series = parent_key(
            &tx,
            "SELECT series_instance_uid FROM instances WHERE sop_instance_uid = ?1",
            &instance.sop_instance_uid,
        )
        .store_context()?;

        let image = &instance.image;
        tx.execute(
            "INSERT INTO instances (sop_instance_uid, series_instance_uid, sop_class_uid,
                instance_number, file_path, file_size, transfer_syntax_uid,
                rows, columns, bits_allocated, bits_stored, samples_per_pixel,
                photometric_interpretation, window_center, window_width,
                rescale_slope, rescale_intercept, number_of_frames)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
             ON CONFLICT(sop_instance_uid) DO UPDATE SET
                series_instance_uid = excluded.series_instance_uid,
                sop_class_uid = excluded.sop_class_uid,
                instance_number = excluded.instance_number,
                file_path = excluded.file_path,
                file_size = excluded.file_size,
                transfer_syntax_uid = excluded.transfer_syntax_uid,
                rows = excluded.rows,
                columns = excluded.columns,
                bits_allocated = excluded.bits_allocated,
                bits_stored = excluded.bits_stored,
                samples_per_pixel = excluded.samples_per_pixel,
                photometric_interpretation = excluded.photometric_interpretation,
                window_center = excluded.window_center,
                window_width = excluded.window_width,
                rescale_slope = excluded.rescale_slope,
                rescale_intercept = excluded.rescale_intercept,
                number_of_frames = excluded.number_of_frames,
                indexed_at = strftime('%s', 'now')",
            params![
                instance.sop_instance_uid,
                series.series_instance_uid,
                instance.sop_class_uid,
                instance.instance_number,
                instance.file_path.to_string_lossy().into_owned(),
                instance.file_size.and_then(|s| i64::try_from(s).ok()),
                instance.transfer_syntax_uid,
                image.rows,
                image.columns,
                image.bits_allocated,
                image.bits_stored,
                image.samples_per_pixel,
                image.photometric_interpretation,
                image.window_center,
                image.window_width,
                image.rescale_slope,
                image.rescale_intercept,
                image.number_of_frames,
            ],
        )
        .store_context()?;

        update_instance_count(&tx, &series.series_instance_uid).store_context()?;
        let mut moved = false;
        if let Some(previous) = previous_series.filter(|p| *p != series.series_instance_uid) {
            debug!(
                "Instance {} moved from series {} to {}",
                instance.sop_instance_uid, previous, series.series_instance_uid
            );
            update_instance_count(&tx, &previous).store_context()?;
            moved = true;
        }
        if let Some(previous) = previous_study.filter(|p| *p != study.study_instance_uid) {
            debug!(
                "Series {} moved from study {} to {}",
                series.series_instance_uid, previous, study.study_instance_uid
            );
            moved = true;
        }
        if let Some(previous) = previous_patient.filter(|p| *p != patient.patient_id) {
            debug!(
                "Study {} moved from patient {:?} to {:?}",
                study.study_instance_uid, previous, patient.patient_id
            );
            moved = true;
        }
        if moved {
            schema::remove_orphans(&tx).store_context()?;
        }

        tx.commit().store_context()
    }

    /// Fetch the records matching the filter,
    /// ordered by patient name, study date (most recent first),
    /// series number and instance number.
    pub fn query(&self, filter: &QueryFilter) -> Result<Vec<IndexRecord>> {
        let date_from = filter.study_date_from.map(format_date);
        let date_to = filter.study_date_to.map(format_date);

        let name_glob = filter.patient_name_pattern.as_deref().map(glob_pattern);

        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<&dyn ToSql> = Vec::new();
        let criteria = [
            ("p.patient_id = ?", &filter.patient_id),
            ("p.patient_name = ?", &filter.patient_name),
            ("p.patient_name GLOB ?", &name_glob),
            ("st.study_instance_uid = ?", &filter.study_instance_uid),
            ("se.series_instance_uid = ?", &filter.series_instance_uid),
            ("i.sop_instance_uid = ?", &filter.sop_instance_uid),
            ("se.modality = ?", &filter.modality),
            ("st.study_date >= ?", &date_from),
            ("st.study_date <= ?", &date_to),
        ];
        for (clause, value) in &criteria {
            if let Some(value) = value {
                clauses.push(*clause);
                args.push(value);
            }
        }
        let mut sql = format!("SELECT {} {}", RECORD_COLUMNS, RECORD_JOINS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(RECORD_ORDER);

        let conn = self.reader()?;
        let mut stmt = conn.prepare(&sql).store_context()?;
        let rows = stmt
            .query_map(params_from_iter(args), record_from_row)
            .store_context()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().store_context()
    }

    /// Fetch the record of a single instance.
    pub fn instance(&self, sop_instance_uid: &str) -> Result<Option<IndexRecord>> {
        let conn = self.reader()?;
        conn.query_row(
            &format!(
                "SELECT {} {} WHERE i.sop_instance_uid = ?1",
                RECORD_COLUMNS, RECORD_JOINS
            ),
            params![sop_instance_uid],
            record_from_row,
        )
        .optional()
        .store_context()
    }

    /// Delete a study with all of its series and instances.
    /// The patient is deleted too if it has no other studies.
    /// Files are not touched.
    ///
    /// Returns the number of instances removed from the index.
    pub fn delete_study(&self, study_instance_uid: &str) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().store_context()?;
        let instances: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM instances i
                 JOIN series se ON se.series_instance_uid = i.series_instance_uid
                 WHERE se.study_instance_uid = ?1",
                params![study_instance_uid],
                |row| row.get(0),
            )
            .store_context()?;
        let deleted = tx
            .execute(
                "DELETE FROM studies WHERE study_instance_uid = ?1",
                params![study_instance_uid],
            )
            .store_context()?;
        schema::remove_orphans(&tx).store_context()?;
        tx.commit().store_context()?;
        if deleted > 0 {
            info!(
                "Deleted study {} ({} instances)",
                study_instance_uid, instances
            );
        }
        Ok(instances as usize)
    }

    /// List all patients, ordered by name.
    pub fn patients(&self) -> Result<Vec<PatientRecord>> {
        let conn = self.reader()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT patient_id, patient_name, birth_date, sex FROM patients
                 ORDER BY patient_name, patient_id",
            )
            .store_context()?;
        let rows = stmt
            .query_map([], |row| patient_from_row(row, 0))
            .store_context()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().store_context()
    }

    /// List the studies of a patient, most recent first.
    pub fn studies_for_patient(&self, patient_id: &str) -> Result<Vec<StudyRecord>> {
        let conn = self.reader()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT study_instance_uid, study_date, study_time, description,
                    accession_number, referring_physician_name
                 FROM studies WHERE patient_id = ?1
                 ORDER BY study_date DESC, study_time DESC, study_instance_uid",
            )
            .store_context()?;
        let rows = stmt
            .query_map(params![patient_id], |row| study_from_row(row, 0))
            .store_context()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().store_context()
    }

    /// List the series of a study with their instance counts,
    /// ordered by series number.
    pub fn series_for_study(&self, study_instance_uid: &str) -> Result<Vec<SeriesEntry>> {
        let conn = self.reader()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT series_instance_uid, modality, series_number, description,
                    body_part_examined, instance_count
                 FROM series WHERE study_instance_uid = ?1
                 ORDER BY series_number, series_instance_uid",
            )
            .store_context()?;
        let rows = stmt
            .query_map(params![study_instance_uid], |row| {
                Ok(SeriesEntry {
                    series: series_from_row(row, 0)?,
                    instance_count: row.get(5)?,
                })
            })
            .store_context()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().store_context()
    }

    /// List the instances of a series, ordered by instance number.
    pub fn instances_for_series(&self, series_instance_uid: &str) -> Result<Vec<IndexRecord>> {
        self.query(&QueryFilter {
            series_instance_uid: Some(series_instance_uid.to_string()),
            ..QueryFilter::default()
        })
    }

    /// The paths of all files indexed under a study.
    pub fn file_paths_for_study(&self, study_instance_uid: &str) -> Result<Vec<PathBuf>> {
        let conn = self.reader()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT i.file_path FROM instances i
                 JOIN series se ON se.series_instance_uid = i.series_instance_uid
                 WHERE se.study_instance_uid = ?1
                 ORDER BY i.file_path",
            )
            .store_context()?;
        let rows = stmt
            .query_map(params![study_instance_uid], |row| {
                row.get::<_, String>(0).map(PathBuf::from)
            })
            .store_context()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().store_context()
    }

    /// The total number of indexed instances.
    pub fn instance_count(&self) -> Result<usize> {
        let conn = self.reader()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM instances", [], |row| row.get(0))
            .store_context()?;
        Ok(count as usize)
    }
}

fn update_instance_count(conn: &Connection, series_instance_uid: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE series SET instance_count =
            (SELECT COUNT(*) FROM instances i WHERE i.series_instance_uid = ?1)
         WHERE series_instance_uid = ?1",
        params![series_instance_uid],
    )
}

/// Turn a `*` and `?` wildcard pattern into a GLOB pattern.
/// Bracket expressions are not supported, so `[` is taken literally.
fn glob_pattern(pattern: &str) -> String {
    pattern.replace('[', "[[]")
}

/// The parent key currently stored for a row, if the row exists.
fn parent_key(conn: &Connection, sql: &str, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(sql, params![key], |row| row.get(0)).optional()
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn date_at(row: &Row, index: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(index)?;
    Ok(text.and_then(|t| NaiveDate::parse_from_str(&t, DATE_FORMAT).ok()))
}

fn patient_from_row(row: &Row, at: usize) -> rusqlite::Result<PatientRecord> {
    Ok(PatientRecord {
        patient_id: row.get(at)?,
        patient_name: row.get(at + 1)?,
        birth_date: date_at(row, at + 2)?,
        sex: row.get(at + 3)?,
    })
}

fn study_from_row(row: &Row, at: usize) -> rusqlite::Result<StudyRecord> {
    Ok(StudyRecord {
        study_instance_uid: row.get(at)?,
        study_date: date_at(row, at + 1)?,
        study_time: row.get(at + 2)?,
        description: row.get(at + 3)?,
        accession_number: row.get(at + 4)?,
        referring_physician_name: row.get(at + 5)?,
    })
}

fn series_from_row(row: &Row, at: usize) -> rusqlite::Result<SeriesRecord> {
    Ok(SeriesRecord {
        series_instance_uid: row.get(at)?,
        modality: row.get(at + 1)?,
        series_number: row.get(at + 2)?,
        description: row.get(at + 3)?,
        body_part_examined: row.get(at + 4)?,
    })
}

fn record_from_row(row: &Row) -> rusqlite::Result<IndexRecord> {
    let file_size: Option<i64> = row.get(19)?;
    Ok(IndexRecord {
        patient: patient_from_row(row, 0)?,
        study: study_from_row(row, 4)?,
        series: series_from_row(row, 10)?,
        instance: InstanceRecord {
            sop_instance_uid: row.get(15)?,
            sop_class_uid: row.get(16)?,
            instance_number: row.get(17)?,
            file_path: row.get::<_, String>(18).map(PathBuf::from)?,
            file_size: file_size.and_then(|s| u64::try_from(s).ok()),
            transfer_syntax_uid: row.get(20)?,
            image: ImageAttributes {
                rows: row.get(21)?,
                columns: row.get(22)?,
                bits_allocated: row.get(23)?,
                bits_stored: row.get(24)?,
                samples_per_pixel: row.get(25)?,
                photometric_interpretation: row.get(26)?,
                window_center: row.get(27)?,
                window_width: row.get(28)?,
                rescale_slope: row.get(29)?,
                rescale_intercept: row.get(30)?,
                number_of_frames: row.get(31)?,
            },
        },
    })
}

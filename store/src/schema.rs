//! Table definitions of the index database.
//!
//! - patients: patient_id -> demographics
//! - studies: study_instance_uid -> patient_id, study attributes
//! - series: series_instance_uid -> study_instance_uid, series attributes, instance count
//! - instances: sop_instance_uid -> series_instance_uid, file location, image attributes
//!
//! Deleting a row cascades to the levels below it.

use rusqlite::Connection;

pub(crate) const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    patient_name TEXT,
    birth_date TEXT,
    sex TEXT
);

CREATE TABLE IF NOT EXISTS studies (
    study_instance_uid TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,
    study_date TEXT,
    study_time TEXT,
    description TEXT,
    accession_number TEXT,
    referring_physician_name TEXT,
    FOREIGN KEY (patient_id) REFERENCES patients(patient_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS series (
    series_instance_uid TEXT PRIMARY KEY,
    study_instance_uid TEXT NOT NULL,
    modality TEXT,
    series_number INTEGER,
    description TEXT,
    body_part_examined TEXT,
    instance_count INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (study_instance_uid) REFERENCES studies(study_instance_uid) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS instances (
    sop_instance_uid TEXT PRIMARY KEY,
    series_instance_uid TEXT NOT NULL,
    sop_class_uid TEXT,
    instance_number INTEGER,
    file_path TEXT NOT NULL,
    file_size INTEGER,
    transfer_syntax_uid TEXT NOT NULL,
    rows INTEGER,
    columns INTEGER,
    bits_allocated INTEGER,
    bits_stored INTEGER,
    samples_per_pixel INTEGER,
    photometric_interpretation TEXT,
    window_center REAL,
    window_width REAL,
    rescale_slope REAL,
    rescale_intercept REAL,
    number_of_frames INTEGER,
    indexed_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (series_instance_uid) REFERENCES series(series_instance_uid) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_studies_patient_id ON studies(patient_id);
CREATE INDEX IF NOT EXISTS idx_studies_study_date ON studies(study_date);
CREATE INDEX IF NOT EXISTS idx_series_study_uid ON series(study_instance_uid);
CREATE INDEX IF NOT EXISTS idx_series_modality ON series(modality);
CREATE INDEX IF NOT EXISTS idx_instances_series_uid ON instances(series_instance_uid);
CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(patient_name);
";

/// Apply the per-connection settings of writer connections
/// and create the tables if absent.
pub(crate) fn init_writer(conn: &Connection, wal: bool) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    if wal {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Index database journal mode: {}", mode);
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    }
    conn.execute_batch(SCHEMA)
}

/// Remove the rows left without children:
/// series without instances, studies without series,
/// and patients without studies.
pub(crate) fn remove_orphans(conn: &Connection) -> rusqlite::Result<usize> {
    let series = conn.execute(
        "DELETE FROM series WHERE NOT EXISTS
            (SELECT 1 FROM instances i WHERE i.series_instance_uid = series.series_instance_uid)",
        [],
    )?;
    let studies = conn.execute(
        "DELETE FROM studies WHERE NOT EXISTS
            (SELECT 1 FROM series s WHERE s.study_instance_uid = studies.study_instance_uid)",
        [],
    )?;
    let patients = conn.execute(
        "DELETE FROM patients WHERE NOT EXISTS
            (SELECT 1 FROM studies s WHERE s.patient_id = patients.patient_id)",
        [],
    )?;
    Ok(series + studies + patients)
}

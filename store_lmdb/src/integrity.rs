//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the node begins
//! processing blocks.

use std::path::Path;

use heed::types::Bytes;

use crate::environment::{ACCOUNTS_DB, BLOCKS_DB, PENDING_DB};
use crate::{LmdbEnvironment, LmdbError};

/// Summary of an integrity check run.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

const EXPECTED_DATABASES: &[&str] = &[BLOCKS_DB, ACCOUNTS_DB, PENDING_DB];

/// Open each ledger database and count its entries.
///
/// Read failures are recorded in the report rather than causing a hard error.
pub fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = env.env().read_txn()?;

    for &db_name in EXPECTED_DATABASES {
        match env.env().open_database::<Bytes, Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{db_name}': {e}")),
                }
            }
            Ok(None) => report.errors.push(format!("database '{db_name}' is missing")),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{db_name}': {e}")),
        }
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// A nonexistent or empty directory is a fresh start. A non-empty directory
/// without `data.mdb` suggests misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), LmdbError> {
    if !path.exists() || path.read_dir()?.next().is_none() {
        return Ok(());
    }
    if !path.join("data.mdb").exists() {
        return Err(LmdbError::MissingDataFile(path.display().to_string()));
    }
    Ok(())
}

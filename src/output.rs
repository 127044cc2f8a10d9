//! CSV persistence for the pipeline's tables.
//!
//! Every file is written to a sibling temporary path and renamed into place,
//! so a reader sees either the previous complete file or the new one.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Runs `write` against a temporary file next to `path`, then renames it over
/// `path`. On failure the temporary file is removed and `path` is untouched.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let outcome = File::create(&tmp)
        .map_err(Into::into)
        .and_then(write)
        .and_then(|()| fs::rename(&tmp, path).map_err(Into::into));

    if outcome.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    outcome
}

/// Writes `records` as CSV rows with a header line.
pub fn write_records<'a, T, I>(path: &Path, records: I) -> Result<()>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    write_atomic(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        let mut rows = 0usize;
        for record in records {
            writer.serialize(record)?;
            rows += 1;
        }
        writer.flush()?;
        debug!(path = %path.display(), rows, "CSV written");
        Ok(())
    })
}

/// Reads every row of a CSV file written by [`write_records`].
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        airport: String,
        movements: u32,
    }

    #[test]
    fn test_write_then_read_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rows.csv");
        let rows = vec![
            Row {
                airport: "EGLL".to_string(),
                movements: 3,
            },
            Row {
                airport: "EHAM".to_string(),
                movements: 0,
            },
        ];

        write_records(&path, &rows).unwrap();
        let read: Vec<Row> = read_records(&path).unwrap();
        assert_eq!(read, rows);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_failed_write_leaves_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(&path, "airport,movements\nEGLL,1\n").unwrap();

        let result = write_atomic(&path, |_file| {
            Err(crate::error::PipelineError::DataIntegrity("boom".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "airport,movements\nEGLL,1\n"
        );
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&vec![1.0, 0.5]).unwrap();
    }
}

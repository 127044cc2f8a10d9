//! Column-named numeric table keyed by slot timestamp.

use chrono::NaiveDateTime;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::flight::timestamp_codec;
use crate::output::write_atomic;

pub const TIMESLOT_COLUMN: &str = "timeslot";

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    timeslots: Vec<NaiveDateTime>,
    rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            timeslots: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, timeslot: NaiveDateTime, values: Vec<f64>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(PipelineError::DataIntegrity(format!(
                "row for {timeslot} has {} values, expected {}",
                values.len(),
                self.columns.len()
            )));
        }
        self.timeslots.push(timeslot);
        self.rows.push(values);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn timeslots(&self) -> &[NaiveDateTime] {
        &self.timeslots
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Copy of the table without the named columns. Unknown names are ignored.
    pub fn drop_columns(&self, names: &[&str]) -> Self {
        let keep: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !names.contains(&c.as_str()))
            .cloned()
            .collect();
        self.project(keep)
    }

    /// Copy of the table with exactly the named columns, in that order.
    pub fn select_columns(&self, names: &[&str]) -> Result<Self> {
        if let Some(missing) = names.iter().find(|n| !self.has_column(n)) {
            return Err(PipelineError::DataIntegrity(format!(
                "missing expected column '{missing}'"
            )));
        }
        Ok(self.project(names.iter().map(|n| n.to_string()).collect()))
    }

    fn project(&self, columns: Vec<String>) -> Self {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i]).collect())
            .collect();
        Self {
            columns,
            timeslots: self.timeslots.clone(),
            rows,
        }
    }

    /// Rows with `start <= timeslot < end`.
    pub fn filter_window(self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let (timeslots, rows) = self
            .timeslots
            .into_iter()
            .zip(self.rows)
            .filter(|(t, _)| *t >= start && *t < end)
            .unzip();
        Self {
            columns: self.columns,
            timeslots,
            rows,
        }
    }

    /// Writes the table as CSV with a leading `timeslot` column.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        write_atomic(path, |file| {
            let mut writer = csv::Writer::from_writer(file);
            let header = std::iter::once(TIMESLOT_COLUMN).chain(self.columns.iter().map(String::as_str));
            writer.write_record(header)?;
            for (t, row) in self.timeslots.iter().zip(&self.rows) {
                let record = std::iter::once(timestamp_codec::format(t))
                    .chain(row.iter().map(|v| v.to_string()));
                writer.write_record(record)?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    /// Reads a table written by [`FeatureTable::write_csv`].
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        if headers.get(0) != Some(TIMESLOT_COLUMN) {
            return Err(PipelineError::DataIntegrity(format!(
                "{}: first column must be '{TIMESLOT_COLUMN}'",
                path.display()
            )));
        }

        let mut table = Self::new(headers.iter().skip(1).map(str::to_string).collect());
        for record in reader.records() {
            let record = record?;
            let raw_time = record.get(0).unwrap_or_default();
            let timeslot = timestamp_codec::parse(raw_time).map_err(|e| {
                PipelineError::DataIntegrity(format!(
                    "{}: unparseable timeslot '{raw_time}': {e}",
                    path.display()
                ))
            })?;
            let values = record
                .iter()
                .skip(1)
                .map(|v| {
                    v.parse::<f64>().map_err(|e| {
                        PipelineError::DataIntegrity(format!(
                            "{}: bad value '{v}' at {raw_time}: {e}",
                            path.display()
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            table.push(timeslot, values)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::midnight;
    use chrono::Duration;

    fn sample() -> FeatureTable {
        let mut table = FeatureTable::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let t = midnight(2019, 3, 1);
        table.push(t, vec![1.0, 0.5, -2.0]).unwrap();
        table.push(t + Duration::minutes(15), vec![0.0, 0.25, 3.0]).unwrap();
        table.push(t + Duration::minutes(30), vec![2.0, 0.0, 1.0 / 3.0]).unwrap();
        table
    }

    #[test]
    fn test_push_rejects_wrong_width() {
        let mut table = sample();
        assert!(table.push(midnight(2019, 3, 2), vec![1.0]).is_err());
    }

    #[test]
    fn test_drop_and_select_columns() {
        let table = sample();
        let dropped = table.drop_columns(&["b", "zz"]);
        assert_eq!(dropped.columns(), &["a".to_string(), "c".to_string()]);
        assert_eq!(dropped.rows()[0], vec![1.0, -2.0]);

        let selected = table.select_columns(&["c", "a"]).unwrap();
        assert_eq!(selected.rows()[1], vec![3.0, 0.0]);
        assert!(table.select_columns(&["missing"]).is_err());
    }

    #[test]
    fn test_filter_window_is_half_open() {
        let t = midnight(2019, 3, 1);
        let filtered = sample().filter_window(t + Duration::minutes(15), t + Duration::minutes(30));
        assert_eq!(filtered.timeslots(), &[t + Duration::minutes(15)]);
    }

    #[test]
    fn test_csv_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EGLL_15m.csv");
        let table = sample();

        table.write_csv(&path).unwrap();
        assert_eq!(FeatureTable::read_csv(&path).unwrap(), table);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("timeslot,a,b,c\n2019-03-01 00:00:00,1,0.5,-2\n"));
    }

    #[test]
    fn test_read_rejects_missing_timeslot_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        assert!(matches!(
            FeatureTable::read_csv(&path),
            Err(PipelineError::DataIntegrity(_))
        ));
    }
}

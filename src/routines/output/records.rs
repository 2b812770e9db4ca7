//! Append-only storage of result records
//!
//! A [ResultRecord] is one point of the sampled likelihood surface. Stores only ever append records and read
//! them all back, so searches can be extended run after run.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::{PompError, PompResult};
use crate::structs::parameters::ParameterVector;

/// Column holding the log-likelihood estimate
pub const LOGLIK_COLUMN: &str = "loglik";
/// Column holding its standard error
pub const LOGLIK_SE_COLUMN: &str = "loglik.se";

/// A parameter vector with its replicated log-likelihood estimate
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub params: ParameterVector,
    pub loglik: f64,
    pub loglik_se: f64,
}

impl ResultRecord {
    pub fn new(params: ParameterVector, loglik: f64, loglik_se: f64) -> Self {
        Self {
            params,
            loglik,
            loglik_se,
        }
    }

    fn header(&self) -> Vec<String> {
        let mut header = self.params.names().to_vec();
        header.push(LOGLIK_COLUMN.to_string());
        header.push(LOGLIK_SE_COLUMN.to_string());
        header
    }

    fn row(&self) -> Vec<String> {
        let mut row: Vec<String> = self.params.values().iter().map(|v| v.to_string()).collect();
        row.push(self.loglik.to_string());
        row.push(self.loglik_se.to_string());
        row
    }
}

/// Highest log-likelihood first; NaN sorts last
pub fn sort_by_loglik(records: &mut [ResultRecord]) {
    records.sort_by(|a, b| match (a.loglik.is_nan(), b.loglik.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.loglik.total_cmp(&a.loglik),
    });
}

/// A persistent collection of result records
pub trait ResultStore {
    /// Adds `records` after the existing ones
    fn append(&mut self, records: &[ResultRecord]) -> PompResult<()>;

    /// Every stored record, in insertion order
    fn read_all(&self) -> PompResult<Vec<ResultRecord>>;
}

fn check_layout(records: &[ResultRecord]) -> PompResult<()> {
    if let Some(first) = records.first() {
        if let Some(other) = records.iter().find(|r| !r.params.same_layout(&first.params)) {
            return Err(PompError::Store(format!(
                "records with different parameter layouts: {:?} and {:?}",
                first.params.names(),
                other.params.names()
            )));
        }
    }
    Ok(())
}

/// Records kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Vec<ResultRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ResultStore for MemoryStore {
    fn append(&mut self, records: &[ResultRecord]) -> PompResult<()> {
        check_layout(records)?;
        if let (Some(existing), Some(new)) = (self.records.first(), records.first()) {
            if !existing.params.same_layout(&new.params) {
                return Err(PompError::Store(format!(
                    "cannot append records with parameters {:?} to a store holding {:?}",
                    new.params.names(),
                    existing.params.names()
                )));
            }
        }
        self.records.extend_from_slice(records);
        Ok(())
    }

    fn read_all(&self) -> PompResult<Vec<ResultRecord>> {
        Ok(self.records.clone())
    }
}

/// Records in a CSV file with one column per parameter, followed by `loglik` and `loglik.se`
///
/// A missing file reads as an empty store. Appending to an existing file requires an identical header.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn existing_header(&self) -> PompResult<Option<Vec<String>>> {
        if !self.path.exists() || std::fs::metadata(&self.path)?.len() == 0 {
            return Ok(None);
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let header = reader
            .headers()?
            .iter()
            .map(|s| s.trim().to_owned())
            .collect();
        Ok(Some(header))
    }
}

impl ResultStore for CsvStore {
    fn append(&mut self, records: &[ResultRecord]) -> PompResult<()> {
        check_layout(records)?;
        let Some(first) = records.first() else {
            return Ok(());
        };
        let header = first.header();

        let (file, write_header) = match self.existing_header()? {
            Some(existing) => {
                if existing != header {
                    return Err(PompError::Store(format!(
                        "header of {:?} is {:?}, records have {:?}",
                        self.path, existing, header
                    )));
                }
                (OpenOptions::new().append(true).open(&self.path)?, false)
            }
            None => {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                (File::create(&self.path)?, true)
            }
        };

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if write_header {
            writer.write_record(&header)?;
        }
        for record in records {
            writer.write_record(record.row())?;
        }
        writer.flush()?;
        Ok(())
    }

    fn read_all(&self) -> PompResult<Vec<ResultRecord>> {
        let Some(header) = self.existing_header()? else {
            return Ok(Vec::new());
        };
        let n = header.len();
        if n < 2 || header[n - 2] != LOGLIK_COLUMN || header[n - 1] != LOGLIK_SE_COLUMN {
            return Err(PompError::Store(format!(
                "{:?} does not end with the '{}' and '{}' columns",
                self.path, LOGLIK_COLUMN, LOGLIK_SE_COLUMN
            )));
        }
        let names = header[..n - 2].to_vec();
        let layout = ParameterVector::new(names, vec![0.0; n - 2])?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let values = row
                .iter()
                .map(|field| {
                    field.trim().parse::<f64>().map_err(|_| {
                        PompError::Store(format!(
                            "row {} of {:?}: '{}' is not a number",
                            line + 1,
                            self.path,
                            field
                        ))
                    })
                })
                .collect::<PompResult<Vec<f64>>>()?;
            if values.len() != n {
                return Err(PompError::DimensionMismatch {
                    what: "result record fields",
                    expected: n,
                    found: values.len(),
                });
            }
            records.push(ResultRecord::new(
                layout.with_values(values[..n - 2].to_vec())?,
                values[n - 2],
                values[n - 1],
            ));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(a: f64, loglik: f64) -> ResultRecord {
        let params = ParameterVector::from_pairs(&[("Beta", a), ("rho", 0.5)]).unwrap();
        ResultRecord::new(params, loglik, 0.1)
    }

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("pompcore-{}-{}.csv", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let store = CsvStore::new(temp_path("missing"));
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_csv_append_and_read_back() {
        let path = temp_path("append");
        let mut store = CsvStore::new(&path);
        store.append(&[record(1.0, -100.0), record(2.0, f64::NEG_INFINITY)]).unwrap();
        store.append(&[record(3.0, -90.5)]).unwrap();

        let records = store.read_all().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], record(1.0, -100.0));
        assert_eq!(records[1].loglik, f64::NEG_INFINITY);
        assert_eq!(records[2].params.get("Beta"), Some(3.0));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_csv_rejects_different_header() {
        let path = temp_path("header");
        let mut store = CsvStore::new(&path);
        store.append(&[record(1.0, -1.0)]).unwrap();
        let other = ResultRecord::new(ParameterVector::from_pairs(&[("gamma", 1.0)]).unwrap(), -2.0, 0.0);
        assert!(store.append(&[other]).is_err());
        assert_eq!(store.read_all().unwrap().len(), 1);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        store.append(&[record(1.0, -3.0)]).unwrap();
        store.append(&[record(2.0, -2.0)]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.read_all().unwrap()[1].loglik, -2.0);
    }

    #[test]
    fn test_sort_by_loglik() {
        let mut records = vec![record(1.0, -5.0), record(2.0, f64::NAN), record(3.0, -1.0)];
        sort_by_loglik(&mut records);
        assert_eq!(records[0].loglik, -1.0);
        assert_eq!(records[1].loglik, -5.0);
        assert!(records[2].loglik.is_nan());
    }
}

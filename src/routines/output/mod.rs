use eyre::{Result, WrapErr};
use std::fs::{create_dir_all, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::algorithms::search::SearchResult;
use crate::routines::settings::Settings;

pub mod records;
pub mod traces;

pub use records::{CsvStore, MemoryStore, ResultRecord, ResultStore};

/// File name of the result records in the output folder
pub const RESULTS_FILE: &str = "results.csv";

/// Writes every output of a global search to the folder named in the settings
///
/// The result records are appended to `results.csv`, so repeated searches into the same folder extend the sampled
/// likelihood surface.
pub fn write_search_outputs(settings: &Settings, result: &SearchResult) -> Result<()> {
    if !settings.output.write {
        return Ok(());
    }
    let folder = &settings.output.path;
    tracing::debug!("Writing outputs to {:?}", folder);

    settings.write()?;
    traces::write_traces(folder, result).wrap_err("Failed to write IF2 traces")?;

    let mut store = CsvStore::new(Path::new(folder).join(RESULTS_FILE));
    store
        .append(&result.records())
        .wrap_err("Failed to append result records")?;
    tracing::info!(
        "{} result records appended to {:?}",
        result.records().len(),
        store.path()
    );
    Ok(())
}

/// Contains all the necessary information of an output file
#[derive(Debug)]
pub struct OutputFile {
    file: File,
    relative_path: PathBuf,
}

impl OutputFile {
    pub fn new(folder: &str, file_name: &str) -> Result<Self> {
        let relative_path = Path::new(&folder).join(file_name);

        if let Some(parent) = relative_path.parent() {
            create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directories for {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&relative_path)
            .wrap_err_with(|| format!("Failed to open file: {:?}", relative_path))?;

        Ok(OutputFile {
            file,
            relative_path,
        })
    }

    /// Opens `folder/file_name` for appending, creating it if needed
    pub fn append(folder: &str, file_name: &str) -> Result<Self> {
        let relative_path = Path::new(&folder).join(file_name);

        if let Some(parent) = relative_path.parent() {
            create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directories for {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&relative_path)
            .wrap_err_with(|| format!("Failed to open file: {:?}", relative_path))?;

        Ok(OutputFile {
            file,
            relative_path,
        })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_owned(self) -> File {
        self.file
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }
}

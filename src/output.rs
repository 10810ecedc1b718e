//! CSV persistence of pipeline tables.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::table::Table;

pub const INPUT_DATA_FILE: &str = "input_data.csv";
pub const OUTPUT_DATA_FILE: &str = "output_data.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub input_data: PathBuf,
    pub output_data: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            input_data: dir.join(INPUT_DATA_FILE),
            output_data: dir.join(OUTPUT_DATA_FILE),
        }
    }
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid output path: {0}")]
    InvalidPath(PathBuf),
}

pub fn write_csv<W: Write>(writer: W, table: &Table) -> Result<(), OutputError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(table.columns())?;
    for row in table.rows() {
        csv_writer.write_record(row.iter().map(|value| value.to_string()))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn table_to_csv_bytes(table: &Table) -> Result<Vec<u8>, OutputError> {
    let mut buf = Vec::new();
    write_csv(&mut buf, table)?;
    Ok(buf)
}

pub fn persist_tables(files: &[(&Path, &Table)]) -> Result<(), OutputError> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());
    for (path, table) in files {
        let result = tmp_path_for(path).and_then(|tmp| {
            write_file(&tmp, &table_to_csv_bytes(table)?)?;
            Ok(tmp)
        });
        match result {
            Ok(tmp) => staged.push((tmp, *path)),
            Err(err) => {
                discard(&staged);
                return Err(err);
            }
        }
    }

    // A failed rename undoes the renames already made in this call.
    for (done, (tmp, path)) in staged.iter().enumerate() {
        if let Err(err) = fs::rename(tmp, path) {
            for (_, renamed) in &staged[..done] {
                let _ = fs::remove_file(renamed);
            }
            discard(&staged[done..]);
            return Err(err.into());
        }
        info!(
            component = "output",
            event = "output.file.written",
            path = %path.display()
        );
    }
    Ok(())
}

fn tmp_path_for(path: &Path) -> Result<PathBuf, OutputError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| OutputError::InvalidPath(path.to_path_buf()))?;
    Ok(path.with_file_name(format!("{file_name}.tmp")))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn discard(staged: &[(PathBuf, &Path)]) {
    for (tmp, _) in staged {
        let _ = fs::remove_file(tmp);
    }
}

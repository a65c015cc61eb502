use crate::store::error::StoreError;
use crate::types::frames::feature_frame::FeatureFrame;
use crate::types::schema::{normalize_frame, COL_TIMESTAMP};
use log::{debug, info};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Default location of the persisted feature table.
pub const DEFAULT_FEATURE_PATH: &str = "data/features.csv";

/// Persistence for the feature table.
///
/// Every pipeline run replaces the whole table.
pub trait FeatureStore {
    /// Replaces the stored table with `features`.
    fn insert(&self, features: &FeatureFrame) -> Result<(), StoreError>;

    /// Reads the stored table back, normalized and sorted by `timestamp`.
    fn read(&self) -> Result<FeatureFrame, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("parquet") | Some("pq") => TableFormat::Parquet,
            _ => TableFormat::Csv,
        }
    }
}

/// A feature table kept in a single local file.
///
/// The format follows the extension: `.parquet`/`.pq` is Parquet, anything
/// else CSV. Missing parent directories are created on insert.
///
/// ```no_run
/// use aqi_forecast::{FeatureStore, LocalFeatureStore};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalFeatureStore::new("data/features.csv");
/// let features = store.read()?;
/// println!("{} rows", features.height());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalFeatureStore {
    path: PathBuf,
}

impl LocalFeatureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_table(&self, df: &mut DataFrame) -> Result<(), StoreError> {
        let file = File::create(&self.path).map_err(|e| StoreError::Io(self.path.clone(), e))?;
        match TableFormat::from_path(&self.path) {
            TableFormat::Csv => CsvWriter::new(file)
                .include_header(true)
                .finish(df)
                .map_err(|e| StoreError::TableWrite(self.path.clone(), e)),
            TableFormat::Parquet => ParquetWriter::new(file)
                .with_compression(ParquetCompression::Snappy)
                .finish(df)
                .map(|_| ())
                .map_err(|e| StoreError::TableWrite(self.path.clone(), e)),
        }
    }

    fn read_table(&self) -> Result<DataFrame, StoreError> {
        match TableFormat::from_path(&self.path) {
            TableFormat::Csv => CsvReadOptions::default()
                .with_has_header(true)
                .try_into_reader_with_file_path(Some(self.path.clone()))
                .and_then(|reader| reader.finish())
                .map_err(|e| StoreError::TableRead(self.path.clone(), e)),
            TableFormat::Parquet => {
                let file =
                    File::open(&self.path).map_err(|e| StoreError::Io(self.path.clone(), e))?;
                ParquetReader::new(file)
                    .finish()
                    .map_err(|e| StoreError::TableRead(self.path.clone(), e))
            }
        }
    }
}

impl FeatureStore for LocalFeatureStore {
    fn insert(&self, features: &FeatureFrame) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::DirCreation(parent.to_path_buf(), e))?;
        }
        let mut df = features.frame.clone();
        self.write_table(&mut df)?;
        info!(
            "Saved {} feature rows to {}",
            features.height(),
            self.path.display()
        );
        Ok(())
    }

    fn read(&self) -> Result<FeatureFrame, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::FileNotFound(self.path.clone()));
        }
        let df = restore_null_columns(self.read_table()?)
            .map_err(|e| StoreError::TableRead(self.path.clone(), e))?;
        let df = normalize_frame(df)?
            .sort([COL_TIMESTAMP], SortMultipleOptions::default())
            .map_err(|e| StoreError::TableRead(self.path.clone(), e))?;
        debug!("Read {} feature rows from {}", df.height(), self.path.display());
        Ok(FeatureFrame::new(df))
    }
}

/// CSV has no type for a column that is entirely empty; such columns come back
/// as strings and are restored to `Float64`.
fn restore_null_columns(mut df: DataFrame) -> PolarsResult<DataFrame> {
    let all_null: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::String && c.null_count() == c.len() && c.len() > 0)
        .map(|c| c.name().to_string())
        .collect();
    for name in all_null {
        let restored = df.column(&name)?.cast(&DataType::Float64)?;
        df.with_column(restored)?;
    }
    Ok(df)
}

// src/store.rs

use crate::error::{Result, SeriesError};
use crate::series::TIME_COLUMN;
use crate::timeframe::{Interval, Period};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DATA_FILE: &str = "data.json";
const METADATA_FILE: &str = "metadata.json";

/// Collection holding one source's bars at one interval.
pub fn collection_name(source: &str, interval: &Interval) -> String {
    format!("timeseries-{}-{}", source, interval)
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.ends_with(".tmp");
    if invalid {
        return Err(SeriesError::Store(format!("invalid {} name '{}'", kind, name)));
    }
    Ok(())
}

/// Stored column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Int64,
    Float64,
}

impl ColumnKind {
    fn of(dtype: &DataType) -> Option<Self> {
        match dtype {
            dtype if dtype.is_integer() => Some(ColumnKind::Int64),
            dtype if dtype.is_float() => Some(ColumnKind::Float64),
            _ => None,
        }
    }

    fn dtype(&self) -> DataType {
        match self {
            ColumnKind::Int64 => DataType::Int64,
            ColumnKind::Float64 => DataType::Float64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Metadata written next to every item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub symbol: String,
    pub interval: String,
    pub source: String,
    /// Filled in on write from the stored frame.
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl ItemMetadata {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>, source: impl Into<String>) -> Self {
        ItemMetadata {
            symbol: symbol.into(),
            interval: interval.into(),
            source: source.into(),
            columns: Vec::new(),
            updated_at: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    fn schema(&self) -> Schema {
        Schema::from_iter(
            self.columns
                .iter()
                .map(|column| Field::new(&column.name, column.kind.dtype())),
        )
    }
}

/// Local time-series cache rooted at a directory.
///
/// Open once at startup and pass by reference; there is nothing to close.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    root: PathBuf,
}

impl TimeSeriesStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened time series store");
        Ok(TimeSeriesStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Opens a collection, creating it when absent.
    pub fn collection(&self, name: &str) -> Result<Collection> {
        validate_name("collection", name)?;
        let path = self.root.join(name);
        fs::create_dir_all(&path)?;
        Ok(Collection {
            name: name.to_string(),
            path,
        })
    }

    pub fn list_collections(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}

/// A named group of items inside the store.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    path: PathBuf,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Items with complete data and metadata.
    pub fn list_items(&self) -> Result<BTreeSet<String>> {
        let mut items = BTreeSet::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() && entry.path().join(METADATA_FILE).is_file() {
                items.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(items)
    }

    pub fn contains(&self, item: &str) -> bool {
        self.path.join(item).join(METADATA_FILE).is_file()
    }

    /// Writes `data` under `item`. The frame needs an integer `time` column
    /// and numeric columns only. NaN is stored as null.
    pub fn write(&self, item: &str, data: &DataFrame, metadata: ItemMetadata, overwrite: bool) -> Result<()> {
        validate_name("item", item)?;
        if !overwrite && self.contains(item) {
            return Err(SeriesError::Store(format!(
                "item '{}' already exists in collection '{}'",
                item, self.name
            )));
        }
        if !data.get_column_names().contains(&TIME_COLUMN) {
            return Err(SeriesError::Store(format!("item '{}' has no '{}' column", item, TIME_COLUMN)));
        }

        let mut columns = Vec::with_capacity(data.width());
        let mut specs = Vec::with_capacity(data.width());
        for column in data.get_columns() {
            let kind = ColumnKind::of(column.dtype()).ok_or_else(|| {
                SeriesError::Store(format!(
                    "column '{}' of item '{}' has unsupported type {}",
                    column.name(),
                    item,
                    column.dtype()
                ))
            })?;
            let column = column.cast(&kind.dtype())?;
            let column = match kind {
                ColumnKind::Float64 => {
                    let values: Vec<Option<f64>> = column
                        .f64()?
                        .into_iter()
                        .map(|value| value.filter(|v| !v.is_nan()))
                        .collect();
                    Series::new(column.name(), values)
                }
                ColumnKind::Int64 => column,
            };
            specs.push(ColumnSpec {
                name: column.name().to_string(),
                kind,
            });
            columns.push(column);
        }

        let mut df = DataFrame::new(columns)?;
        let mut buffer = Vec::new();
        JsonWriter::new(&mut buffer)
            .with_json_format(JsonFormat::Json)
            .finish(&mut df)?;

        let metadata = ItemMetadata {
            columns: specs,
            updated_at: Some(Utc::now()),
            ..metadata
        };

        let dir = self.path.join(item);
        fs::create_dir_all(&dir)?;
        write_atomic(&dir.join(DATA_FILE), &buffer)?;
        write_atomic(&dir.join(METADATA_FILE), &serde_json::to_vec_pretty(&metadata)?)?;

        info!(collection = %self.name, item, rows = df.height(), "stored item");
        Ok(())
    }

    pub fn item(&self, item: &str) -> Result<Item> {
        validate_name("item", item)?;
        if !self.contains(item) {
            return Err(SeriesError::Store(format!(
                "item '{}' not found in collection '{}'",
                item, self.name
            )));
        }

        let dir = self.path.join(item);
        let metadata: ItemMetadata = serde_json::from_slice(&fs::read(dir.join(METADATA_FILE))?)?;
        let schema = metadata.schema();
        let bytes = fs::read(dir.join(DATA_FILE))?;

        let data = if bytes.iter().all(|b| b.is_ascii_whitespace() || *b == b'[' || *b == b']') {
            let empty = metadata
                .columns
                .iter()
                .map(|column| Series::new_empty(&column.name, &column.kind.dtype()))
                .collect();
            DataFrame::new(empty)?
        } else {
            let df = JsonReader::new(Cursor::new(bytes))
                .with_schema(Arc::new(schema))
                .finish()?;
            df.select(metadata.columns.iter().map(|column| column.name.as_str()))?
        };

        Ok(Item {
            name: item.to_string(),
            data,
            metadata,
        })
    }

    pub fn delete(&self, item: &str) -> Result<bool> {
        validate_name("item", item)?;
        let dir = self.path.join(item);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(dir)?;
        info!(collection = %self.name, item, "deleted item");
        Ok(true)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// A stored frame with its metadata.
#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub data: DataFrame,
    pub metadata: ItemMetadata,
}

impl Item {
    /// Rows within `period` of the last stored timestamp.
    pub fn last(&self, period: Period) -> Result<DataFrame> {
        let times = self.data.column(TIME_COLUMN)?.i64()?;
        let last = match times.into_iter().flatten().last() {
            Some(last) => last,
            None => return Ok(self.data.clone()),
        };
        let cutoff = match period.cutoff_millis(last) {
            Some(cutoff) => cutoff,
            None => return Ok(self.data.clone()),
        };
        let mask = times
            .into_iter()
            .map(|ts| ts.map_or(false, |ts| ts > cutoff))
            .collect::<BooleanChunked>();
        Ok(self.data.filter(&mask)?)
    }
}

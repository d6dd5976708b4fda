use crate::error::{EtlError, Result};
use crate::models::Cell;
use crate::transform::{Column, NormalizedTable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// How rows reach the persisted table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Add rows to the existing table
    Append,
    /// Clear the table first
    Truncate,
}

impl std::str::FromStr for LoadMode {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(LoadMode::Append),
            "truncate" => Ok(LoadMode::Truncate),
            other => Err(EtlError::Configuration(format!(
                "how_add must be 'append' or 'truncate', got '{}'",
                other
            ))),
        }
    }
}

/// Destination of normalized tables
#[async_trait]
pub trait Sink: Send {
    /// Persist `table`, returning the number of rows written
    async fn load(&mut self, table: &NormalizedTable, mode: LoadMode) -> Result<usize>;

    /// Release the handle once loading is done
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Newline-delimited JSON table on disk, one object per row.
///
/// The column list is written next to the data as `<file>.schema.json` and
/// checked on append so rows of different shapes never share a file.
pub struct JsonLinesSink {
    path: PathBuf,
    rows_written: usize,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".schema.json");
        PathBuf::from(name)
    }

    async fn stored_schema(&self) -> Result<Option<Vec<Column>>> {
        match tokio::fs::read_to_string(self.schema_path()).await {
            Ok(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| EtlError::Sink(format!("unreadable schema file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn row_to_json(columns: &[Column], row: &[Cell]) -> Result<Value> {
    let mut object = Map::new();
    for (column, cell) in columns.iter().zip(row) {
        let value = serde_json::to_value(cell).map_err(|e| EtlError::Sink(e.to_string()))?;
        object.insert(column.name.clone(), value);
    }
    Ok(Value::Object(object))
}

#[async_trait]
impl Sink for JsonLinesSink {
    async fn load(&mut self, table: &NormalizedTable, mode: LoadMode) -> Result<usize> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        if mode == LoadMode::Append {
            if let Some(existing) = self.stored_schema().await? {
                if existing != table.columns {
                    return Err(EtlError::Sink(format!(
                        "schema of {} does not match the table being appended",
                        self.path.display()
                    )));
                }
            }
        }

        let mut buffer = String::new();
        for row in &table.rows {
            let line = row_to_json(&table.columns, row)?;
            buffer.push_str(&line.to_string());
            buffer.push('\n');
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true);
        match mode {
            LoadMode::Append => options.append(true),
            LoadMode::Truncate => options.write(true).truncate(true),
        };
        let mut file = options.open(&self.path).await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;

        let schema = serde_json::to_string_pretty(&table.columns)
            .map_err(|e| EtlError::Sink(e.to_string()))?;
        tokio::fs::write(self.schema_path(), schema).await?;

        self.rows_written += table.len();
        info!(
            "Loaded {} rows into {} ({:?})",
            table.len(),
            self.path.display(),
            mode
        );
        Ok(table.len())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if self.rows_written == 0 {
            warn!("Closing {} without writing any rows", self.path.display());
        }
        Ok(())
    }
}

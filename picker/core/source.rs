use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csv::ReaderBuilder;
use thiserror::Error;

/// Raw tabular data: rows of cells.
pub type Rows = Vec<Vec<String>>;

/// Errors raised while reading names from an external source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The file could not be read.
    #[error("reading names from {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The text is not valid delimited data.
    #[error("parsing names from {origin}: {source}")]
    Malformed {
        /// File path, or `inline text`.
        origin: String,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },
    /// The file extension is not one this importer handles.
    #[error("unsupported name file {0}; expected .txt or .csv")]
    Unsupported(PathBuf),
}

/// Provider of raw name rows (uploaded files, pasted text, fixtures).
#[async_trait]
pub trait NameSource: Send + Sync {
    /// Reads every row.
    async fn rows(&self) -> Result<Rows, SourceError>;
}

/// Flattens rows into trimmed, non-empty cells in reading order.
///
/// Duplicates are kept; the registry removes them on import.
#[must_use]
pub fn flatten_rows<R, C>(rows: R) -> Vec<String>
where
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    rows.into_iter()
        .flatten()
        .map(|cell| cell.as_ref().trim().to_owned())
        .filter(|cell| !cell.is_empty())
        .collect()
}

/// Rows already in memory.
#[derive(Debug, Clone, Default)]
pub struct RowsSource {
    rows: Rows,
}

impl RowsSource {
    /// Wraps the given rows.
    #[must_use]
    pub fn new(rows: Rows) -> Self {
        Self { rows }
    }

    /// Parses `text` as comma-separated rows.
    pub fn from_text(text: &str) -> Result<Self, SourceError> {
        let rows = parse_rows(text).map_err(|source| SourceError::Malformed {
            origin: "inline text".to_owned(),
            source,
        })?;
        Ok(Self::new(rows))
    }
}

#[async_trait]
impl NameSource for RowsSource {
    async fn rows(&self) -> Result<Rows, SourceError> {
        Ok(self.rows.clone())
    }
}

/// Plain `.txt`/`.csv` file read as comma-separated rows.
///
/// Quoted cells may contain commas; rows may have any number of cells.
#[derive(Debug, Clone)]
pub struct TextFileSource {
    path: PathBuf,
}

impl TextFileSource {
    /// Creates a source for `path`, checking the extension.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("csv"));
        if supported {
            Ok(Self { path })
        } else {
            Err(SourceError::Unsupported(path))
        }
    }

    /// File being read.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl NameSource for TextFileSource {
    async fn rows(&self) -> Result<Rows, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Read {
                path: self.path.clone(),
                source,
            })?;
        parse_rows(&raw).map_err(|source| SourceError::Malformed {
            origin: self.path.display().to_string(),
            source,
        })
    }
}

fn parse_rows(text: &str) -> Result<Rows, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    reader
        .records()
        .map(|record| Ok(record?.iter().map(str::to_owned).collect()))
        .collect()
}

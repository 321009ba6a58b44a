use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Top-level key holding the list of records.
pub const RECORDS_KEY: &str = "records";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Failures that abort a run before any record is submitted.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("records file not found: {}", .path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("reading records file {} failed: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("records file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("records file has no `records` list")]
    Schema,
}

impl LoadError {
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::FileNotFound { .. } => "FileNotFoundError",
            LoadError::Read { .. } => "ReadError",
            LoadError::Parse(_) => "ParseError",
            LoadError::Schema => "SchemaError",
        }
    }
}

/// The parsed input file, kept as raw JSON until the schema check.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RecordsDocument(Value);

impl RecordsDocument {
    /// Takes the `records` list out of the document.
    ///
    /// Anything other than an object with a list-typed `records` field is a
    /// [`LoadError::Schema`].
    pub fn into_records(self) -> Result<Vec<Value>, LoadError> {
        match self.0 {
            Value::Object(mut root) => match root.remove(RECORDS_KEY) {
                Some(Value::Array(records)) => Ok(records),
                _ => Err(LoadError::Schema),
            },
            _ => Err(LoadError::Schema),
        }
    }
}

/// Parses an in-memory document. A leading UTF-8 byte order mark is ignored.
pub fn parse_document(bytes: &[u8]) -> Result<RecordsDocument, LoadError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    Ok(serde_json::from_slice(bytes)?)
}

#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_document(path: impl AsRef<Path>) -> Result<RecordsDocument, LoadError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => LoadError::FileNotFound {
            path: path.to_path_buf(),
            source,
        },
        _ => LoadError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;
    debug!("Read {} bytes", bytes.len());
    parse_document(&bytes)
}

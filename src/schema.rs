//! Schema inference from sample data artifacts
//!
//! The inferencer walks a directory of sample data, picks the FIRST `.csv`
//! file in deterministic lexicographic order (directories are recursed into
//! at their sort position), and derives the column schema from that file's
//! header row alone. Selection order is a behavior, not an implementation
//! detail: downstream resources embed the chosen table's name and columns,
//! so "which file wins" must be stable across runs and platforms.
//!
//! All columns are typed [`ColumnType::String`]. The inferencer never looks
//! past the header row, so no richer type probing is possible - a documented
//! limitation, not a defect to fix silently.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Inferred type of a schema column
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum ColumnType {
    /// Plain string; the only type header-row inference can produce
    #[default]
    String,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "STRING"),
        }
    }
}

/// A single column of an inferred schema
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaColumn {
    /// Column name as it appears in the header row
    pub name: String,
    /// Inferred type
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Ordered schema derived from one sample artifact
///
/// Column order is the source artifact's column order; the table name is the
/// artifact's file stem. Immutable once inferred.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    /// Table name (the artifact's file name without extension)
    pub table: String,
    /// Columns in source order
    pub columns: Vec<SchemaColumn>,
}

/// Derives a table schema from the first sample artifact under a directory
#[derive(Clone, Debug)]
pub struct SchemaInferencer {
    root: PathBuf,
}

impl SchemaInferencer {
    /// Inferencer rooted at the given sample-data directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Infer the schema of the first `.csv` artifact found
    ///
    /// Reads only the header row. Fails with [`Error::NoArtifactFound`] when
    /// no `.csv` exists under the root and [`Error::EmptyArtifact`] when the
    /// chosen file has no rows.
    pub fn infer(&self) -> Result<TableSchema> {
        let path = first_artifact(&self.root)?.ok_or_else(|| Error::NoArtifactFound {
            root: self.root.clone(),
        })?;

        let content = fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        let header = content
            .lines()
            .next()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::EmptyArtifact { path: path.clone() })?;

        let columns: Vec<SchemaColumn> = split_header(header)
            .into_iter()
            .map(|name| SchemaColumn {
                name,
                column_type: ColumnType::String,
            })
            .collect();

        let table = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(path = %path.display(), table = %table, columns = columns.len(), "inferred schema");

        Ok(TableSchema { table, columns })
    }
}

/// Find the first `.csv` file under `dir` in lexicographic order
///
/// Entries at each level are visited sorted by file name; a subdirectory is
/// recursed into at its sort position. First match wins.
fn first_artifact(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            if let Some(found) = first_artifact(&path)? {
                return Ok(Some(found));
            }
        } else if path.extension().is_some_and(|ext| ext == "csv") {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Split a CSV header row into column names
///
/// Handles quoted fields and doubled-quote escapes; the header row of a
/// sample artifact never needs more than that.
fn split_header(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

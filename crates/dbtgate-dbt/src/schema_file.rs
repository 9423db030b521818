//! dbt property files (`schema.yml`, `sources.yml`) read straight from disk
//!
//! The manifest only knows what the last `dbt parse` saw. A changed yml can
//! declare source tables that are not compiled yet, so the source hook reads
//! the file itself as well.

use serde::Deserialize;
use std::path::Path;

/// The parts of a property file the hooks look at
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SchemaFile {
    #[serde(default)]
    pub sources: Vec<SourceDecl>,
}

/// One `sources:` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceDecl {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableDecl {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnDecl {
    pub name: String,
}

/// A declared source table with the name of its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclaredTable<'a> {
    pub source_name: &'a str,
    pub table: &'a TableDecl,
}

impl SchemaFile {
    /// Read and parse a property file
    pub fn from_file(path: &Path) -> Result<Self, SchemaFileError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SchemaFileError::NotFound {
                    path: path.display().to_string(),
                }
            } else {
                SchemaFileError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        Self::from_str(&contents).map_err(|e| match e {
            SchemaFileError::Parse { message, .. } => SchemaFileError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Parse YAML text; an empty document declares nothing
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(yaml: &str) -> Result<Self, SchemaFileError> {
        let parsed: Option<SchemaFile> =
            serde_yaml::from_str(yaml).map_err(|e| SchemaFileError::Parse {
                path: "<string>".to_string(),
                message: e.to_string(),
            })?;
        Ok(parsed.unwrap_or_default())
    }

    /// Every declared table, in file order
    pub fn tables(&self) -> impl Iterator<Item = DeclaredTable<'_>> {
        self.sources.iter().flat_map(|source| {
            source.tables.iter().map(move |table| DeclaredTable {
                source_name: &source.name,
                table,
            })
        })
    }
}

/// Property file errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaFileError {
    #[error("schema file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read schema file {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse schema file {path}: {message}")]
    Parse { path: String, message: String },
}

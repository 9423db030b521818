//! dbt manifest.json loading
//!
//! Parses dbt-generated manifest.json into ordered, otherwise unvalidated
//! records. The producing build tool is trusted for schema correctness.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    #[serde(default)]
    pub metadata: Option<ManifestMetadata>,

    /// Model, seed, snapshot and test nodes
    #[serde(default)]
    pub nodes: BTreeMap<String, ManifestNode>,

    /// Source tables
    #[serde(default)]
    pub sources: BTreeMap<String, ManifestSource>,

    /// Macro definitions
    #[serde(default)]
    pub macros: BTreeMap<String, ManifestMacro>,

    /// Parent map (node -> list of parent nodes)
    #[serde(default)]
    pub parent_map: BTreeMap<String, Vec<String>>,

    /// Child map (node -> list of child nodes)
    #[serde(default)]
    pub child_map: BTreeMap<String, Vec<String>>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestError::NotFound {
                    path: path.display().to_string(),
                }
            } else {
                ManifestError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        Self::from_str(&contents)
    }

    /// Load manifest from any reader (stdin for `-`)
    pub fn from_reader(mut reader: impl Read) -> Result<Self, ManifestError> {
        let mut contents = String::new();
        reader
            .read_to_string(&mut contents)
            .map_err(|e| ManifestError::Io {
                path: "<stdin>".to_string(),
                message: e.to_string(),
            })?;

        Self::from_str(&contents)
    }

    /// Load from a path, treating `-` as stdin
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        if path == Path::new("-") {
            Self::from_reader(std::io::stdin().lock())
        } else {
            Self::from_file(path)
        }
    }

    /// Parse manifest from JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json)
            .map_err(|e| ManifestError::Parse { message: e.to_string() })
    }

    /// Get all model nodes (filters out tests, seeds, etc.)
    pub fn models(&self) -> impl Iterator<Item = (&String, &ManifestNode)> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.resource_type == "model")
    }

    /// Get a specific node by unique_id
    pub fn get_node(&self, unique_id: &str) -> Option<&ManifestNode> {
        self.nodes.get(unique_id)
    }

    /// Get a specific source by unique_id
    pub fn get_source(&self, unique_id: &str) -> Option<&ManifestSource> {
        self.sources.get(unique_id)
    }
}

/// Manifest metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_schema_version: Option<String>,
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
}

/// A node in the manifest (model, test, snapshot, etc.)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Unique identifier (e.g., "model.my_project.users")
    pub unique_id: String,

    /// Node name (e.g., "users")
    pub name: String,

    /// Resource type (model, test, snapshot, etc.)
    pub resource_type: String,

    /// Package name
    #[serde(default)]
    pub package_name: String,

    /// Original file path, relative to the project
    #[serde(default)]
    pub original_file_path: String,

    /// YAML file that documents this node (e.g., "my_project://models/schema.yml")
    #[serde(default)]
    pub patch_path: Option<String>,

    /// Column definitions
    #[serde(default, deserialize_with = "deserialize_columns")]
    pub columns: BTreeMap<String, ColumnDefinition>,

    /// Dependencies
    #[serde(default)]
    pub depends_on: DependsOn,

    /// Test metadata (generic tests only)
    #[serde(default)]
    pub test_metadata: Option<TestMetadata>,

    /// Column a test is bound to
    #[serde(default)]
    pub column_name: Option<String>,

    /// Node a test is attached to
    #[serde(default)]
    pub attached_node: Option<String>,
}

/// Generic test metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestMetadata {
    /// Test kind (e.g., "unique", "not_null")
    pub name: String,

    /// Namespace of a package test (e.g., "dbt_utils")
    #[serde(default)]
    pub namespace: Option<String>,

    /// Arguments passed to the test
    #[serde(default)]
    pub kwargs: BTreeMap<String, serde_json::Value>,
}

/// Column definition from manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: String,

    /// Data type (if declared)
    #[serde(default)]
    pub data_type: Option<String>,

    /// Tests declared inline on the column (`tests:` or `data_tests:`)
    #[serde(default, alias = "data_tests", deserialize_with = "deserialize_bindings")]
    pub tests: Vec<TestBinding>,
}

/// A test declared inline on a column, reduced to its kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TestBinding(pub String);

impl TestBinding {
    pub fn kind(&self) -> &str {
        &self.0
    }
}

/// Bindings come either as a bare name or as a single-key mapping of the
/// test name to its arguments.
fn deserialize_bindings<'de, D>(deserializer: D) -> Result<Vec<TestBinding>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawBinding {
        Name(String),
        Configured(BTreeMap<String, serde_json::Value>),
    }

    let raw: Option<Vec<RawBinding>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|binding| match binding {
            RawBinding::Name(name) => Some(TestBinding(name)),
            RawBinding::Configured(map) => map.into_keys().next().map(TestBinding),
        })
        .collect())
}

/// Column maps where a name appears more than once keep every binding:
/// the first record's fields win and the later records' tests are appended.
fn deserialize_columns<'de, D>(deserializer: D) -> Result<BTreeMap<String, ColumnDefinition>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ColumnsVisitor;

    impl<'de> Visitor<'de> for ColumnsVisitor {
        type Value = BTreeMap<String, ColumnDefinition>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a map of column name to column definition")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(BTreeMap::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut columns: BTreeMap<String, ColumnDefinition> = BTreeMap::new();

            while let Some((name, definition)) = access.next_entry::<String, ColumnDefinition>()? {
                match columns.get_mut(&name) {
                    Some(existing) => {
                        tracing::debug!(column = %name, "merging repeated column entry");
                        existing.merge(definition);
                    }
                    None => {
                        columns.insert(name, definition);
                    }
                }
            }

            Ok(columns)
        }
    }

    deserializer.deserialize_any(ColumnsVisitor)
}

impl ColumnDefinition {
    fn merge(&mut self, other: ColumnDefinition) {
        if self.description.is_empty() {
            self.description = other.description;
        }
        if self.data_type.is_none() {
            self.data_type = other.data_type;
        }
        for binding in other.tests {
            if !self.tests.contains(&binding) {
                self.tests.push(binding);
            }
        }
    }
}

/// Dependencies structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    /// List of node unique_ids this node depends on
    #[serde(default)]
    pub nodes: Vec<String>,

    /// List of macro unique_ids this node calls
    #[serde(default)]
    pub macros: Vec<String>,
}

/// A source table in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSource {
    /// Unique identifier (e.g., "source.my_project.raw.users")
    pub unique_id: String,

    /// Source name (e.g., "raw")
    pub source_name: String,

    /// Table name (e.g., "users")
    pub name: String,

    /// YAML file that declares the source
    #[serde(default)]
    pub original_file_path: String,

    /// Package name
    #[serde(default)]
    pub package_name: String,

    /// Column definitions
    #[serde(default, deserialize_with = "deserialize_columns")]
    pub columns: BTreeMap<String, ColumnDefinition>,
}

/// A macro in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMacro {
    /// Unique identifier (e.g., "macro.my_project.cents_to_dollars")
    pub unique_id: String,

    /// Macro name
    pub name: String,

    /// Package name
    #[serde(default)]
    pub package_name: String,

    /// Original file path
    #[serde(default)]
    pub original_file_path: String,
}

/// Manifest loading errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest file not found: {path}")]
    NotFound { path: String },

    #[error("failed to read manifest file {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse manifest JSON: {message}")]
    Parse { message: String },
}

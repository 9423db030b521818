//! Typed views over raw manifest records
//!
//! Every record the graph knows about gets a dense [`EntityId`]. Columns are
//! not records: they are synthesized from their owner's `columns` mapping (or
//! from a test bound to a column) and identified by `(owner, column_name)`.

use crate::manifest::{ColumnDefinition, ManifestMacro, ManifestNode, ManifestSource};
use std::collections::BTreeMap;

/// Dense arena index of a node, source, test or macro record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub(crate) u32);

impl EntityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// dbt resource type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Model,
    Seed,
    Snapshot,
    Test,
    Analysis,
    Operation,
    Other(String),
}

impl ResourceType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "model" => Self::Model,
            "seed" => Self::Seed,
            "snapshot" => Self::Snapshot,
            "test" => Self::Test,
            "analysis" => Self::Analysis,
            "operation" => Self::Operation,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Model => "model",
            Self::Seed => "seed",
            Self::Snapshot => "snapshot",
            Self::Test => "test",
            Self::Analysis => "analysis",
            Self::Operation => "operation",
            Self::Other(other) => other,
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of an [`Entity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Node,
    Source,
    Column,
    Test,
    Macro,
    Unresolved,
}

impl EntityKind {
    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Small set of [`EntityKind`]s used as a traversal filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindSet(u8);

impl KindSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn of(kinds: &[EntityKind]) -> Self {
        kinds.iter().fold(Self::empty(), |set, kind| set.with(*kind))
    }

    pub fn with(self, kind: EntityKind) -> Self {
        Self(self.0 | kind.bit())
    }

    pub fn contains(self, kind: EntityKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl FromIterator<EntityKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = EntityKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |set, kind| set.with(kind))
    }
}

/// A compiled model, seed or snapshot
#[derive(Debug, Clone, Copy)]
pub struct Node<'m> {
    pub id: EntityId,
    pub raw: &'m ManifestNode,
}

impl<'m> Node<'m> {
    pub fn unique_id(&self) -> &'m str {
        &self.raw.unique_id
    }

    pub fn model_name(&self) -> &'m str {
        &self.raw.name
    }

    pub fn original_file_path(&self) -> &'m str {
        &self.raw.original_file_path
    }

    pub fn resource_type(&self) -> ResourceType {
        ResourceType::parse(&self.raw.resource_type)
    }

    pub fn columns(&self) -> &'m BTreeMap<String, ColumnDefinition> {
        &self.raw.columns
    }

    /// Project-relative path of the documenting YAML file, without the
    /// `package://` prefix dbt puts in front of it
    pub fn patch_path(&self) -> Option<&'m str> {
        self.raw.patch_path.as_deref().map(strip_package_prefix)
    }
}

/// A declared source table
#[derive(Debug, Clone, Copy)]
pub struct Source<'m> {
    pub id: EntityId,
    pub raw: &'m ManifestSource,
}

impl<'m> Source<'m> {
    pub fn unique_id(&self) -> &'m str {
        &self.raw.unique_id
    }

    pub fn source_name(&self) -> &'m str {
        &self.raw.source_name
    }

    pub fn table_name(&self) -> &'m str {
        &self.raw.name
    }

    pub fn original_file_path(&self) -> &'m str {
        &self.raw.original_file_path
    }

    pub fn columns(&self) -> &'m BTreeMap<String, ColumnDefinition> {
        &self.raw.columns
    }
}

/// A data test
#[derive(Debug, Clone, Copy)]
pub struct Test<'m> {
    pub id: EntityId,
    pub raw: &'m ManifestNode,
}

impl<'m> Test<'m> {
    pub fn unique_id(&self) -> &'m str {
        &self.raw.unique_id
    }

    /// Test kind: `test_metadata.name` for generic tests, the node name for
    /// singular tests
    pub fn kind(&self) -> &'m str {
        self.raw
            .test_metadata
            .as_ref()
            .map(|meta| meta.name.as_str())
            .unwrap_or(self.raw.name.as_str())
    }

    /// Column the test is bound to, if any
    pub fn column_name(&self) -> Option<&'m str> {
        self.raw.column_name.as_deref().or_else(|| {
            self.raw
                .test_metadata
                .as_ref()?
                .kwargs
                .get("column_name")?
                .as_str()
        })
    }

    /// unique_id of the node or source under test
    pub fn tested_id(&self) -> Option<&'m str> {
        self.raw
            .attached_node
            .as_deref()
            .or_else(|| self.raw.depends_on.nodes.first().map(String::as_str))
    }
}

/// A macro definition
#[derive(Debug, Clone, Copy)]
pub struct Macro<'m> {
    pub id: EntityId,
    pub raw: &'m ManifestMacro,
}

impl<'m> Macro<'m> {
    pub fn unique_id(&self) -> &'m str {
        &self.raw.unique_id
    }

    pub fn name(&self) -> &'m str {
        &self.raw.name
    }

    pub fn package_name(&self) -> &'m str {
        &self.raw.package_name
    }

    pub fn original_file_path(&self) -> &'m str {
        &self.raw.original_file_path
    }
}

/// A test bound to a column
///
/// `test_id` is the unique_id of the compiled test node. Bindings declared
/// inline in the owner's `columns` record that have no compiled node yet
/// carry `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnTest<'m> {
    pub kind: &'m str,
    pub test_id: Option<&'m str>,
}

/// A column declared on (or tested on) a node or source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column<'m> {
    pub owner: EntityId,
    pub owner_unique_id: &'m str,
    pub column_name: &'m str,
    /// Tests bound to the column, sorted by kind then id
    pub tests: Vec<ColumnTest<'m>>,
}

impl<'m> Column<'m> {
    pub fn has_test(&self, kind: &str) -> bool {
        self.tests.iter().any(|t| t.kind == kind)
    }

    /// Distinct test kinds, sorted
    pub fn test_kinds(&self) -> Vec<&'m str> {
        let mut kinds: Vec<&'m str> = self.tests.iter().map(|t| t.kind).collect();
        kinds.dedup();
        kinds
    }
}

/// Anything the walker can produce
#[derive(Debug, Clone)]
pub enum Entity<'m> {
    Node(Node<'m>),
    Source(Source<'m>),
    Column(Column<'m>),
    Test(Test<'m>),
    Macro(Macro<'m>),
    /// An id present in the parent/child maps with no matching record
    Unresolved(&'m str),
}

/// Identity used to deduplicate traversal results
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey<'m> {
    Record(EntityId),
    Column(EntityId, &'m str),
    Unresolved(&'m str),
}

impl<'m> Entity<'m> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Node(_) => EntityKind::Node,
            Self::Source(_) => EntityKind::Source,
            Self::Column(_) => EntityKind::Column,
            Self::Test(_) => EntityKind::Test,
            Self::Macro(_) => EntityKind::Macro,
            Self::Unresolved(_) => EntityKind::Unresolved,
        }
    }

    pub fn key(&self) -> EntityKey<'m> {
        match self {
            Self::Node(n) => EntityKey::Record(n.id),
            Self::Source(s) => EntityKey::Record(s.id),
            Self::Test(t) => EntityKey::Record(t.id),
            Self::Macro(m) => EntityKey::Record(m.id),
            Self::Column(c) => EntityKey::Column(c.owner, c.column_name),
            Self::Unresolved(raw) => EntityKey::Unresolved(*raw),
        }
    }

    pub fn as_column(&self) -> Option<&Column<'m>> {
        match self {
            Self::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn into_column(self) -> Option<Column<'m>> {
        match self {
            Self::Column(column) => Some(column),
            _ => None,
        }
    }

    pub fn as_test(&self) -> Option<&Test<'m>> {
        match self {
            Self::Test(test) => Some(test),
            _ => None,
        }
    }

    pub fn into_test(self) -> Option<Test<'m>> {
        match self {
            Self::Test(test) => Some(test),
            _ => None,
        }
    }
}

/// Strip the `package://` prefix of dbt patch paths
pub(crate) fn strip_package_prefix(path: &str) -> &str {
    path.split_once("://").map_or(path, |(_, rest)| rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_set_membership() {
        let set = KindSet::of(&[EntityKind::Column, EntityKind::Test]);
        assert!(set.contains(EntityKind::Column));
        assert!(set.contains(EntityKind::Test));
        assert!(!set.contains(EntityKind::Node));
        assert!(!set.contains(EntityKind::Unresolved));
        assert!(!KindSet::empty().contains(EntityKind::Column));
    }

    #[test]
    fn resource_type_parse() {
        assert_eq!(ResourceType::parse("model"), ResourceType::Model);
        assert_eq!(ResourceType::parse("test"), ResourceType::Test);
        assert_eq!(ResourceType::parse("unit_test"), ResourceType::Other("unit_test".into()));
        assert_eq!(ResourceType::parse("snapshot").to_string(), "snapshot");
    }

    #[test]
    fn package_prefix_is_stripped() {
        assert_eq!(strip_package_prefix("shop://models/schema.yml"), "models/schema.yml");
        assert_eq!(strip_package_prefix("models/schema.yml"), "models/schema.yml");
    }
}

//! Manifest arena and dependency edges
//!
//! Builds an arena of typed records indexed by [`EntityId`], with forward and
//! reverse adjacency lists taken from the manifest's `parent_map` and
//! `child_map`.

use std::collections::HashMap;
use crate::entity::{Column, ColumnTest, Entity, EntityId, Macro, Node, Source, Test};
use crate::manifest::{Manifest, ManifestMacro, ManifestNode, ManifestSource};
use crate::resolver::normalize_path;

/// Which adjacency map to follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Entities this one depends on (`parent_map`)
    Parents,

    /// Entities depending on this one (`child_map`)
    Children,
}

/// A raw record the arena owns an id for
#[derive(Debug, Clone, Copy)]
enum Record<'m> {
    Node(&'m ManifestNode),
    Test(&'m ManifestNode),
    Source(&'m ManifestSource),
    Macro(&'m ManifestMacro),
}

/// An adjacency entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge<'m> {
    Resolved(EntityId),
    /// The id appears in a parent/child map but not in nodes or sources
    Unresolved(&'m str),
}

/// Immutable, read-only view of a loaded manifest
#[derive(Debug)]
pub struct ManifestGraph<'m> {
    manifest: &'m Manifest,

    records: Vec<Record<'m>>,

    /// unique_id -> arena id
    index: HashMap<&'m str, EntityId>,

    /// Forward edges: entity -> entities it depends on
    parents: Vec<Vec<Edge<'m>>>,

    /// Reverse edges: entity -> entities that depend on it
    children: Vec<Vec<Edge<'m>>>,

    /// (owner, column) -> bound tests, sorted
    column_tests: HashMap<(EntityId, &'m str), Vec<ColumnTest<'m>>>,

    /// normalized original_file_path -> nodes, sources and macros declared in that file
    by_path: HashMap<String, Vec<EntityId>>,

    /// normalized patch_path -> nodes documented by that file
    by_patch_path: HashMap<String, Vec<EntityId>>,
}

impl<'m> ManifestGraph<'m> {
    /// Build the arena from a manifest
    pub fn from_manifest(manifest: &'m Manifest) -> Self {
        let mut records = Vec::with_capacity(
            manifest.nodes.len() + manifest.sources.len() + manifest.macros.len(),
        );
        let mut index = HashMap::new();

        for (unique_id, node) in &manifest.nodes {
            let record = if node.resource_type == "test" {
                Record::Test(node)
            } else {
                Record::Node(node)
            };
            index.insert(unique_id.as_str(), EntityId(records.len() as u32));
            records.push(record);
        }
        for (unique_id, source) in &manifest.sources {
            index.insert(unique_id.as_str(), EntityId(records.len() as u32));
            records.push(Record::Source(source));
        }
        for (unique_id, macro_) in &manifest.macros {
            index.insert(unique_id.as_str(), EntityId(records.len() as u32));
            records.push(Record::Macro(macro_));
        }

        let mut graph = Self {
            manifest,
            parents: vec![Vec::new(); records.len()],
            children: vec![Vec::new(); records.len()],
            records,
            index,
            column_tests: HashMap::new(),
            by_path: HashMap::new(),
            by_patch_path: HashMap::new(),
        };

        graph.build_edges();
        graph.build_column_tests();
        graph.build_path_index();

        tracing::debug!(
            records = graph.records.len(),
            columns_with_tests = graph.column_tests.len(),
            "built manifest graph"
        );

        graph
    }

    fn build_edges(&mut self) {
        let manifest = self.manifest;

        // Use parent_map and child_map from manifest if available
        if !manifest.parent_map.is_empty() || !manifest.child_map.is_empty() {
            for (node_id, parent_ids) in &manifest.parent_map {
                if let Some(id) = self.lookup(node_id) {
                    let edges = parent_ids.iter().map(|p| self.edge(p)).collect();
                    self.parents[id.index()] = edges;
                }
            }

            for (node_id, child_ids) in &manifest.child_map {
                if let Some(id) = self.lookup(node_id) {
                    let edges = child_ids.iter().map(|c| self.edge(c)).collect();
                    self.children[id.index()] = edges;
                }
            }
        } else {
            // Build from depends_on if parent/child maps not available
            for (node_id, node) in &manifest.nodes {
                let Some(id) = self.lookup(node_id) else { continue };

                for dep_id in &node.depends_on.nodes {
                    let edge = self.edge(dep_id);
                    self.parents[id.index()].push(edge);

                    // Build reverse edges
                    if let Edge::Resolved(dep) = edge {
                        self.children[dep.index()].push(Edge::Resolved(id));
                    }
                }
            }
        }
    }

    /// Compiled test nodes win over the inline binding they were compiled
    /// from: an inline kind is kept only when no test node of that kind is
    /// bound to the same column.
    fn build_column_tests(&mut self) {
        let mut column_tests: HashMap<(EntityId, &'m str), Vec<ColumnTest<'m>>> = HashMap::new();

        for test in self.tests() {
            let (Some(column), Some(tested)) = (test.column_name(), test.tested_id()) else {
                continue;
            };
            if let Some(owner) = self.lookup(tested) {
                column_tests.entry((owner, column)).or_default().push(ColumnTest {
                    kind: test.kind(),
                    test_id: Some(test.unique_id()),
                });
            }
        }

        for (position, record) in self.records.iter().enumerate() {
            let id = EntityId(position as u32);
            let columns = match *record {
                Record::Node(node) => &node.columns,
                Record::Source(source) => &source.columns,
                Record::Test(_) | Record::Macro(_) => continue,
            };

            for (name, definition) in columns {
                let bound = column_tests.entry((id, name.as_str())).or_default();
                for binding in &definition.tests {
                    let kind = binding.kind();
                    if !bound.iter().any(|t| t.kind == kind) {
                        bound.push(ColumnTest { kind, test_id: None });
                    }
                }
            }
        }

        for tests in column_tests.values_mut() {
            tests.sort_unstable();
            tests.dedup();
        }

        self.column_tests = column_tests;
    }

    fn build_path_index(&mut self) {
        let mut by_path: HashMap<String, Vec<EntityId>> = HashMap::new();
        let mut by_patch_path: HashMap<String, Vec<EntityId>> = HashMap::new();

        for (position, record) in self.records.iter().enumerate() {
            let id = EntityId(position as u32);
            let path = match *record {
                Record::Node(node) => &node.original_file_path,
                Record::Source(source) => &source.original_file_path,
                Record::Macro(macro_) => &macro_.original_file_path,
                // tests live in the YAML of the model they test
                Record::Test(_) => continue,
            };
            if !path.is_empty() {
                by_path.entry(normalize_path(path)).or_default().push(id);
            }

            if let Record::Node(raw) = *record {
                if let Some(patch) = (Node { id, raw }).patch_path() {
                    by_patch_path.entry(normalize_path(patch)).or_default().push(id);
                }
            }
        }

        self.by_path = by_path;
        self.by_patch_path = by_patch_path;
    }

    fn edge(&self, raw: &'m str) -> Edge<'m> {
        match self.lookup(raw) {
            Some(id) => Edge::Resolved(id),
            None => Edge::Unresolved(raw),
        }
    }

    /// The manifest this graph was built from
    pub fn manifest(&self) -> &'m Manifest {
        self.manifest
    }

    /// Number of records in the arena
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up an arena id by manifest unique_id
    pub fn lookup(&self, unique_id: &str) -> Option<EntityId> {
        self.index.get(unique_id).copied()
    }

    /// Typed view of a record
    pub fn entity(&self, id: EntityId) -> Entity<'m> {
        match self.records[id.index()] {
            Record::Node(raw) => Entity::Node(Node { id, raw }),
            Record::Test(raw) => Entity::Test(Test { id, raw }),
            Record::Source(raw) => Entity::Source(Source { id, raw }),
            Record::Macro(raw) => Entity::Macro(Macro { id, raw }),
        }
    }

    /// unique_id of a record
    pub fn unique_id(&self, id: EntityId) -> &'m str {
        match self.records[id.index()] {
            Record::Node(raw) | Record::Test(raw) => &raw.unique_id,
            Record::Source(raw) => &raw.unique_id,
            Record::Macro(raw) => &raw.unique_id,
        }
    }

    pub fn node(&self, id: EntityId) -> Option<Node<'m>> {
        match self.records[id.index()] {
            Record::Node(raw) => Some(Node { id, raw }),
            _ => None,
        }
    }

    pub fn source(&self, id: EntityId) -> Option<Source<'m>> {
        match self.records[id.index()] {
            Record::Source(raw) => Some(Source { id, raw }),
            _ => None,
        }
    }

    /// Models, seeds and snapshots (everything in `nodes` except tests)
    pub fn nodes(&self) -> impl Iterator<Item = Node<'m>> + '_ {
        self.records.iter().enumerate().filter_map(|(i, record)| match *record {
            Record::Node(raw) => Some(Node { id: EntityId(i as u32), raw }),
            _ => None,
        })
    }

    pub fn sources(&self) -> impl Iterator<Item = Source<'m>> + '_ {
        self.records.iter().enumerate().filter_map(|(i, record)| match *record {
            Record::Source(raw) => Some(Source { id: EntityId(i as u32), raw }),
            _ => None,
        })
    }

    /// Source table declared as `source_name.table_name`
    pub fn find_source(&self, source_name: &str, table_name: &str) -> Option<Source<'m>> {
        self.sources()
            .find(|source| source.source_name() == source_name && source.table_name() == table_name)
    }

    pub fn tests(&self) -> impl Iterator<Item = Test<'m>> + '_ {
        self.records.iter().enumerate().filter_map(|(i, record)| match *record {
            Record::Test(raw) => Some(Test { id: EntityId(i as u32), raw }),
            _ => None,
        })
    }

    pub fn macros(&self) -> impl Iterator<Item = Macro<'m>> + '_ {
        self.records.iter().enumerate().filter_map(|(i, record)| match *record {
            Record::Macro(raw) => Some(Macro { id: EntityId(i as u32), raw }),
            _ => None,
        })
    }

    /// Get immediate parents (dependencies) of an entity
    pub fn parents(&self, id: EntityId) -> &[Edge<'m>] {
        &self.parents[id.index()]
    }

    /// Get immediate children (dependents) of an entity
    pub fn children(&self, id: EntityId) -> &[Edge<'m>] {
        &self.children[id.index()]
    }

    pub fn adjacent(&self, id: EntityId, direction: Direction) -> &[Edge<'m>] {
        match direction {
            Direction::Parents => self.parents(id),
            Direction::Children => self.children(id),
        }
    }

    /// Columns embedded in a node or source record, in name order
    pub fn embedded_columns(&self, id: EntityId) -> Vec<Column<'m>> {
        let (owner_unique_id, columns) = match self.records[id.index()] {
            Record::Node(raw) => (raw.unique_id.as_str(), &raw.columns),
            Record::Source(raw) => (raw.unique_id.as_str(), &raw.columns),
            Record::Test(_) | Record::Macro(_) => return Vec::new(),
        };

        columns
            .keys()
            .map(|name| Column {
                owner: id,
                owner_unique_id,
                column_name: name.as_str(),
                tests: self.column_tests_of(id, name),
            })
            .collect()
    }

    /// The column a test is bound to, owned by the entity under test
    pub fn tested_column(&self, test: &Test<'m>) -> Option<Column<'m>> {
        let column_name = test.column_name()?;
        let owner = self.lookup(test.tested_id()?)?;

        Some(Column {
            owner,
            owner_unique_id: self.unique_id(owner),
            column_name,
            tests: self.column_tests_of(owner, column_name),
        })
    }

    fn column_tests_of(&self, owner: EntityId, column: &str) -> Vec<ColumnTest<'m>> {
        self.column_tests
            .get(&(owner, column))
            .cloned()
            .unwrap_or_default()
    }

    /// Records whose original_file_path is `path` (already normalized)
    pub fn entities_at_path(&self, path: &str) -> &[EntityId] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    /// Nodes documented by the YAML file at `path` (already normalized)
    pub fn nodes_patched_by(&self, path: &str) -> &[EntityId] {
        self.by_patch_path.get(path).map(Vec::as_slice).unwrap_or_default()
    }
}

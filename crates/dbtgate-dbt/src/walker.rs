//! Single-level relationship traversal
//!
//! Expands a root node or source into the entities declared on it: its direct
//! parents or children from the manifest maps, plus the columns those
//! entities (and the root itself) carry.

use std::collections::{HashSet, VecDeque};
use dbtgate_core::{Event, EventSink, NoopSink};
use crate::entity::{Column, Entity, EntityId, EntityKey, EntityKind, KindSet, Test};
use crate::graph::{Direction, Edge, ManifestGraph};

/// Walks parent/child edges of a [`ManifestGraph`]
#[derive(Clone, Copy)]
pub struct RelationshipWalker<'g, 'm> {
    graph: &'g ManifestGraph<'m>,
    sink: &'g dyn EventSink,
}

impl<'g, 'm> RelationshipWalker<'g, 'm> {
    pub fn new(graph: &'g ManifestGraph<'m>) -> Self {
        Self { graph, sink: &NoopSink }
    }

    /// Report unresolvable references to `sink`
    pub fn with_sink(mut self, sink: &'g dyn EventSink) -> Self {
        self.sink = sink;
        self
    }

    /// Entities of the `targets` kinds directly related to `root`
    ///
    /// The sequence is deduplicated by entity identity and, for an unchanged
    /// manifest, always comes out in the same order.
    pub fn related(&self, root: EntityId, targets: KindSet, direction: Direction) -> Related<'g, 'm> {
        let mut related = Related {
            graph: self.graph,
            sink: self.sink,
            root,
            targets,
            edges: self.graph.adjacent(root, direction).iter(),
            pending: VecDeque::new(),
            seen: HashSet::new(),
            reported: HashSet::new(),
        };

        if targets.contains(EntityKind::Column) {
            related.offer_columns(self.graph.embedded_columns(root));
        }

        related
    }

    /// Columns declared on `root` or reachable through its children
    pub fn columns(&self, root: EntityId) -> Vec<Column<'m>> {
        self.related(root, KindSet::of(&[EntityKind::Column]), Direction::Children)
            .filter_map(Entity::into_column)
            .collect()
    }

    /// Tests among the children of `root`
    pub fn tests(&self, root: EntityId) -> Vec<Test<'m>> {
        self.related(root, KindSet::of(&[EntityKind::Test]), Direction::Children)
            .filter_map(Entity::into_test)
            .collect()
    }
}

/// Lazy result of [`RelationshipWalker::related`]
pub struct Related<'g, 'm> {
    graph: &'g ManifestGraph<'m>,
    sink: &'g dyn EventSink,
    root: EntityId,
    targets: KindSet,
    edges: std::slice::Iter<'g, Edge<'m>>,
    pending: VecDeque<Entity<'m>>,
    seen: HashSet<EntityKey<'m>>,
    reported: HashSet<&'m str>,
}

impl<'g, 'm> Related<'g, 'm> {
    fn offer(&mut self, entity: Entity<'m>) {
        if self.targets.contains(entity.kind()) && self.seen.insert(entity.key()) {
            self.pending.push_back(entity);
        }
    }

    fn offer_columns(&mut self, columns: Vec<Column<'m>>) {
        for column in columns {
            self.offer(Entity::Column(column));
        }
    }

    fn expand(&mut self, edge: Edge<'m>) {
        let wants_columns = self.targets.contains(EntityKind::Column);

        match edge {
            Edge::Unresolved(reference) => {
                if self.reported.insert(reference) {
                    self.sink.record(&Event::UnresolvedReference {
                        root: self.graph.unique_id(self.root).to_string(),
                        reference: reference.to_string(),
                    });
                }
                self.offer(Entity::Unresolved(reference));
            }
            Edge::Resolved(id) => {
                let entity = self.graph.entity(id);
                let columns = match &entity {
                    Entity::Node(_) | Entity::Source(_) if wants_columns => {
                        self.graph.embedded_columns(id)
                    }
                    Entity::Test(test) if wants_columns => {
                        self.graph.tested_column(test).into_iter().collect()
                    }
                    _ => Vec::new(),
                };

                self.offer(entity);
                self.offer_columns(columns);
            }
        }
    }
}

impl<'g, 'm> Iterator for Related<'g, 'm> {
    type Item = Entity<'m>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entity) = self.pending.pop_front() {
                return Some(entity);
            }

            let edge = *self.edges.next()?;
            self.expand(edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use dbtgate_core::CollectingSink;
    use pretty_assertions::assert_eq;

    fn manifest() -> Manifest {
        Manifest::from_str(
            r#"{
            "nodes": {
                "model.shop.orders": {
                    "unique_id": "model.shop.orders",
                    "name": "orders",
                    "resource_type": "model",
                    "original_file_path": "models/orders.sql",
                    "columns": {
                        "id": {"name": "id"},
                        "amount": {"name": "amount"}
                    }
                },
                "model.shop.order_facts": {
                    "unique_id": "model.shop.order_facts",
                    "name": "order_facts",
                    "resource_type": "model",
                    "original_file_path": "models/order_facts.sql",
                    "columns": {"order_id": {"name": "order_id"}}
                },
                "test.shop.unique_orders_id.aa": {
                    "unique_id": "test.shop.unique_orders_id.aa",
                    "name": "unique_orders_id",
                    "resource_type": "test",
                    "column_name": "id",
                    "attached_node": "model.shop.orders",
                    "test_metadata": {"name": "unique"}
                },
                "test.shop.not_null_orders_id.bb": {
                    "unique_id": "test.shop.not_null_orders_id.bb",
                    "name": "not_null_orders_id",
                    "resource_type": "test",
                    "column_name": "id",
                    "attached_node": "model.shop.orders",
                    "test_metadata": {"name": "not_null"}
                },
                "test.shop.orders_positive.cc": {
                    "unique_id": "test.shop.orders_positive.cc",
                    "name": "orders_positive",
                    "resource_type": "test",
                    "depends_on": {"nodes": ["model.shop.orders"]}
                }
            },
            "sources": {},
            "parent_map": {
                "model.shop.order_facts": ["model.shop.orders"]
            },
            "child_map": {
                "model.shop.orders": [
                    "test.shop.unique_orders_id.aa",
                    "test.shop.not_null_orders_id.bb",
                    "test.shop.orders_positive.cc",
                    "model.shop.order_facts",
                    "model.shop.pruned",
                    "model.shop.order_facts"
                ]
            }
        }"#,
        )
        .unwrap()
    }

    fn column_keys(columns: &[Column<'_>]) -> Vec<(String, String)> {
        columns
            .iter()
            .map(|c| (c.owner_unique_id.to_string(), c.column_name.to_string()))
            .collect()
    }

    #[test]
    fn children_filtered_by_kind() {
        let manifest = manifest();
        let graph = ManifestGraph::from_manifest(&manifest);
        let walker = RelationshipWalker::new(&graph);
        let orders = graph.lookup("model.shop.orders").unwrap();

        let nodes: Vec<EntityKind> = walker
            .related(orders, KindSet::of(&[EntityKind::Node]), Direction::Children)
            .map(|e| e.kind())
            .collect();
        // order_facts listed twice in child_map, yielded once
        assert_eq!(nodes, vec![EntityKind::Node]);

        let kinds: Vec<&str> = walker.tests(orders).iter().map(|t| t.kind()).collect();
        assert_eq!(kinds, vec!["unique", "not_null", "orders_positive"]);
    }

    #[test]
    fn columns_are_deduplicated_per_owner() {
        let manifest = manifest();
        let graph = ManifestGraph::from_manifest(&manifest);
        let walker = RelationshipWalker::new(&graph);
        let orders = graph.lookup("model.shop.orders").unwrap();

        let columns = walker.columns(orders);

        assert_eq!(
            column_keys(&columns),
            vec![
                ("model.shop.orders".to_string(), "amount".to_string()),
                ("model.shop.orders".to_string(), "id".to_string()),
                ("model.shop.order_facts".to_string(), "order_id".to_string()),
            ]
        );
        let id = columns.iter().find(|c| c.column_name == "id").unwrap();
        assert_eq!(id.test_kinds(), vec!["not_null", "unique"]);
        assert!(id.has_test("unique"));
    }

    #[test]
    fn unresolved_references_are_skipped_and_reported() {
        let manifest = manifest();
        let graph = ManifestGraph::from_manifest(&manifest);
        let sink = CollectingSink::new();
        let walker = RelationshipWalker::new(&graph).with_sink(&sink);
        let orders = graph.lookup("model.shop.orders").unwrap();

        let all = KindSet::of(&[EntityKind::Node, EntityKind::Test]);
        assert_eq!(walker.related(orders, all, Direction::Children).count(), 4);
        assert_eq!(
            sink.events(),
            vec![Event::UnresolvedReference {
                root: "model.shop.orders".into(),
                reference: "model.shop.pruned".into(),
            }]
        );

        let unresolved: Vec<Entity<'_>> = walker
            .related(orders, KindSet::of(&[EntityKind::Unresolved]), Direction::Children)
            .collect();
        assert!(matches!(unresolved.as_slice(), [Entity::Unresolved("model.shop.pruned")]));
    }

    #[test]
    fn children_come_from_child_map() {
        let manifest = manifest();
        let graph = ManifestGraph::from_manifest(&manifest);
        let walker = RelationshipWalker::new(&graph);
        let orders = graph.lookup("model.shop.orders").unwrap();
        let listed = &manifest.child_map["model.shop.orders"];

        let every_kind = KindSet::of(&[EntityKind::Node, EntityKind::Source, EntityKind::Test]);
        for entity in walker.related(orders, every_kind, Direction::Children) {
            let unique_id = match &entity {
                Entity::Node(n) => n.unique_id(),
                Entity::Source(s) => s.unique_id(),
                Entity::Test(t) => t.unique_id(),
                other => panic!("unexpected entity {other:?}"),
            };
            assert!(listed.iter().any(|id| id == unique_id));
        }
    }

    #[test]
    fn parents_are_single_level() {
        let manifest = manifest();
        let graph = ManifestGraph::from_manifest(&manifest);
        let walker = RelationshipWalker::new(&graph);
        let facts = graph.lookup("model.shop.order_facts").unwrap();

        let parents: Vec<String> = walker
            .related(facts, KindSet::of(&[EntityKind::Node, EntityKind::Test]), Direction::Parents)
            .filter_map(|e| match e {
                Entity::Node(n) => Some(n.unique_id().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(parents, vec!["model.shop.orders".to_string()]);
    }

    #[test]
    fn repeated_walks_are_identical() {
        let manifest = manifest();
        let graph = ManifestGraph::from_manifest(&manifest);
        let walker = RelationshipWalker::new(&graph);
        let orders = graph.lookup("model.shop.orders").unwrap();

        let first = column_keys(&walker.columns(orders));
        let second = column_keys(&walker.columns(orders));
        assert_eq!(first, second);
    }
}

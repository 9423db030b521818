//! dbt manifest graph resolution
//!
//! This crate handles:
//! - Loading manifest.json (dbt-generated artifacts)
//! - Typed views over nodes, sources, tests, macros and synthesized columns
//! - Mapping changed file paths back to manifest entities
//! - Reading source declarations from changed property files
//! - Walking direct parent/child relationships of a model or source
//! - Grouping traversal results for threshold rules

pub mod manifest;
pub mod entity;
pub mod graph;
pub mod resolver;
pub mod schema_file;
pub mod walker;
pub mod aggregate;

pub use manifest::{Manifest, ManifestError, ManifestNode, ManifestSource, ManifestMacro, ColumnDefinition, TestBinding, TestMetadata, DependsOn, ManifestMetadata};
pub use entity::{Column, ColumnTest, Entity, EntityId, EntityKey, EntityKind, KindSet, Macro, Node, ResourceType, Source, Test};
pub use graph::{Direction, Edge, ManifestGraph};
pub use resolver::{normalize_path, InputPath, PathResolver, Resolution, ResolvedPath};
pub use schema_file::{ColumnDecl, DeclaredTable, SchemaFile, SchemaFileError, SourceDecl, TableDecl};
pub use walker::{Related, RelationshipWalker};
pub use aggregate::{group_by, CountPolicy, Groups};

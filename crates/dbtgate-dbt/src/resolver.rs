//! Changed-file path resolution
//!
//! Maps the paths a pre-commit run hands over to the manifest entities
//! declared in those files.

use std::collections::HashSet;
use regex::Regex;
use dbtgate_core::{Event, EventSink, NoopSink};
use crate::entity::{EntityId, EntityKind};
use crate::graph::ManifestGraph;

/// Normalize a path to the representation dbt uses in `original_file_path`
///
/// Separators become `/`, `.` segments and repeated separators disappear and
/// `..` pops the previous segment.
pub fn normalize_path(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            segment => parts.push(segment),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// A path matched to one manifest entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Normalized, project-relative path
    pub path: String,
    pub id: EntityId,
    pub kind: EntityKind,
}

/// A changed file the caller passed that survived the filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPath {
    /// As given, for reading the file from disk
    pub raw: String,
    /// Normalized, project-relative path
    pub path: String,
}

/// Result of resolving a batch of paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// One entry per distinct entity, in input order
    pub resolved: Vec<ResolvedPath>,

    /// Normalized paths that passed the filters but match nothing
    pub missing: Vec<String>,

    /// Accepted input paths, companions excluded, in input order
    pub inputs: Vec<InputPath>,
}

impl Resolution {
    /// Resolved entities of a given kind
    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &ResolvedPath> {
        self.resolved.iter().filter(move |r| r.kind == kind)
    }
}

/// Resolves changed paths against a [`ManifestGraph`]
pub struct PathResolver<'g, 'm> {
    graph: &'g ManifestGraph<'m>,
    extensions: Vec<String>,
    exclude: Option<Regex>,
    project_dir: Option<String>,
    include_companions: bool,
    sink: &'g dyn EventSink,
}

impl<'g, 'm> PathResolver<'g, 'm> {
    pub fn new(graph: &'g ManifestGraph<'m>) -> Self {
        Self {
            graph,
            extensions: Vec::new(),
            exclude: None,
            project_dir: None,
            include_companions: true,
            sink: &NoopSink,
        }
    }

    /// Accepted suffixes (`.sql`, `yml`, ...); an empty list accepts everything
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Drop paths matching this regex (applied to the normalized path)
    pub fn exclude(mut self, pattern: Option<Regex>) -> Self {
        self.exclude = pattern;
        self
    }

    /// dbt project directory relative to where paths are given from
    pub fn project_dir(mut self, dir: Option<&str>) -> Self {
        self.project_dir = dir
            .map(normalize_path)
            .filter(|dir| !dir.is_empty());
        self
    }

    /// Pull in schema.yml <-> model.sql companions of each changed file
    pub fn include_companions(mut self, include: bool) -> Self {
        self.include_companions = include;
        self
    }

    pub fn with_sink(mut self, sink: &'g dyn EventSink) -> Self {
        self.sink = sink;
        self
    }

    /// Resolve `paths`, preserving input order
    pub fn resolve<S: AsRef<str>>(&self, paths: &[S]) -> Resolution {
        let mut resolution = Resolution::default();
        let mut seen_entities = HashSet::new();
        let mut seen_missing = HashSet::new();

        for candidate in self.candidates(paths) {
            if !self.accepts(&candidate.path) {
                continue;
            }

            if let Some(raw) = &candidate.raw {
                resolution.inputs.push(InputPath {
                    raw: raw.clone(),
                    path: candidate.path.clone(),
                });
            }

            let ids = self.graph.entities_at_path(&candidate.path);
            if ids.is_empty() {
                // a yml that only patches models is known to the manifest
                let patches = !self.graph.nodes_patched_by(&candidate.path).is_empty();
                // companions come from the manifest itself; only report what the caller passed
                if candidate.raw.is_some() && !patches && seen_missing.insert(candidate.path.clone()) {
                    self.sink.record(&Event::PathNotInManifest {
                        path: candidate.path.clone(),
                    });
                    resolution.missing.push(candidate.path);
                }
                continue;
            }

            for &id in ids {
                if seen_entities.insert(id) {
                    resolution.resolved.push(ResolvedPath {
                        path: candidate.path.clone(),
                        id,
                        kind: self.graph.entity(id).kind(),
                    });
                }
            }
        }

        tracing::debug!(
            input = paths.len(),
            resolved = resolution.resolved.len(),
            missing = resolution.missing.len(),
            "resolved paths against manifest"
        );

        resolution
    }

    /// Normalized input paths, each followed by its companions, first occurrence wins
    fn candidates<S: AsRef<str>>(&self, paths: &[S]) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for raw in paths {
            let path = self.project_relative(normalize_path(raw.as_ref()));
            if !seen.insert(path.clone()) {
                continue;
            }

            let companions = if self.include_companions {
                self.companions(&path)
            } else {
                Vec::new()
            };
            candidates.push(Candidate {
                path,
                raw: Some(raw.as_ref().to_string()),
            });

            for companion in companions {
                if seen.insert(companion.clone()) {
                    candidates.push(Candidate { path: companion, raw: None });
                }
            }
        }

        candidates
    }

    fn companions(&self, path: &str) -> Vec<String> {
        match extension_of(path).as_deref() {
            Some("sql") => self
                .graph
                .entities_at_path(path)
                .iter()
                .filter_map(|&id| self.graph.node(id)?.patch_path())
                .map(normalize_path)
                .collect(),
            Some("yml") | Some("yaml") => self
                .graph
                .nodes_patched_by(path)
                .iter()
                .filter_map(|&id| self.graph.node(id))
                .map(|node| normalize_path(node.original_file_path()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn project_relative(&self, path: String) -> String {
        if let Some(dir) = &self.project_dir {
            if let Some(rest) = path.strip_prefix(dir.as_str()).and_then(|rest| rest.strip_prefix('/')) {
                return rest.to_string();
            }
        }
        path
    }

    fn accepts(&self, path: &str) -> bool {
        if !self.extensions.is_empty() {
            let matches = extension_of(path)
                .map(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
                .unwrap_or(false);
            if !matches {
                tracing::debug!(path, "skipping path with unaccepted extension");
                return false;
            }
        }

        if let Some(exclude) = &self.exclude {
            if exclude.is_match(path) {
                tracing::debug!(path, pattern = %exclude, "skipping excluded path");
                return false;
            }
        }

        true
    }
}

struct Candidate {
    path: String,
    /// `None` for companions
    raw: Option<String>,
}

/// Lowercased extension of the last path segment
fn extension_of(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

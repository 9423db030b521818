use std::collections::HashSet;
use dbtgate_core::{Diagnostic, DiagnosticCode};
use dbtgate_dbt::{group_by, EntityId, EntityKind, ResolvedPath};
use crate::requirement::Requirements;
use crate::rule::{Rule, RuleContext};

/// Every changed model must have at least N tests of each required kind
///
/// A test counts once whether it shows up as a compiled test node, as an
/// inline binding in the model's `columns`, or both.
#[derive(Debug, Clone)]
pub struct ModelHasTestsByName {
    pub required: Requirements,
}

impl ModelHasTestsByName {
    pub fn new(required: Requirements) -> Self {
        Self { required }
    }
}

impl Rule for ModelHasTestsByName {
    fn name(&self) -> &'static str {
        "check-model-has-tests-by-name"
    }

    fn description(&self) -> &'static str {
        "Check model has tests by name"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".sql"]
    }

    fn root_kind(&self) -> EntityKind {
        EntityKind::Node
    }

    fn accepts(&self, ctx: &RuleContext<'_, '_>, root: &ResolvedPath) -> bool {
        super::is_model(ctx, root)
    }

    fn evaluate(&self, ctx: &RuleContext<'_, '_>, root: &ResolvedPath) -> Vec<Diagnostic> {
        let Some(model) = ctx.graph.node(root.id) else {
            return Vec::new();
        };

        let tests = group_by(test_kinds(ctx, root.id), |kind| *kind);

        let mut diagnostics = Vec::new();
        for (kind, minimum) in self.required.iter() {
            let found = tests.count(kind);
            if found < minimum {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::ModelTestsBelowMinimum,
                        format!(
                            "{}: has only {} {} tests, but {} are required.",
                            model.model_name(),
                            found,
                            kind,
                            minimum
                        ),
                    )
                    .with_entity(model.unique_id())
                    .with_file(root.path.clone())
                    .with_comparison(minimum.to_string(), found.to_string()),
                );
            }
        }

        diagnostics
    }
}

/// Kind of every test bound to `model`, one entry per test
fn test_kinds<'m>(ctx: &RuleContext<'_, 'm>, model: EntityId) -> Vec<&'m str> {
    let mut seen = HashSet::new();
    let mut kinds = Vec::new();

    for test in ctx.walker.tests(model) {
        seen.insert(test.unique_id());
        kinds.push(test.kind());
    }

    for column in ctx.graph.embedded_columns(model) {
        for bound in &column.tests {
            match bound.test_id {
                Some(id) if !seen.insert(id) => {}
                _ => kinds.push(bound.kind),
            }
        }
    }

    kinds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requirement::Requirements;
    use crate::rule::{run_rule, RunOptions};
    use dbtgate_dbt::{Manifest, ManifestGraph};
    use pretty_assertions::assert_eq;

    fn requirements(pairs: &[(&str, usize)]) -> Requirements {
        pairs.iter().map(|(name, min)| (name.to_string(), *min)).collect()
    }

    fn messages(manifest: &Manifest, pairs: &[(&str, usize)]) -> (i32, Vec<String>) {
        let graph = ManifestGraph::from_manifest(manifest);
        let rule = ModelHasTestsByName::new(requirements(pairs));
        let report = run_rule(&rule, &graph, &["models/model_x.sql"], &RunOptions::default());
        (report.status_code(), report.errors().map(|d| d.message.clone()).collect())
    }

    #[test]
    fn inline_bindings_count_without_test_nodes() {
        let manifest = Manifest::from_str(
            r#"{
            "nodes": {
                "model.shop.model_x": {
                    "unique_id": "model.shop.model_x",
                    "name": "model_x",
                    "resource_type": "model",
                    "original_file_path": "models/model_x.sql",
                    "columns": {"id": {"name": "id", "tests": ["unique", "not_null"]}}
                }
            },
            "parent_map": {"model.shop.model_x": []},
            "child_map": {"model.shop.model_x": []}
        }"#,
        )
        .unwrap();

        assert_eq!(messages(&manifest, &[("unique", 1)]), (0, vec![]));
        assert_eq!(
            messages(&manifest, &[("unique", 2)]),
            (1, vec!["model_x: has only 1 unique tests, but 2 are required.".to_string()])
        );
    }

    #[test]
    fn compiled_and_inline_forms_of_one_test_count_once() {
        let manifest = Manifest::from_str(
            r#"{
            "nodes": {
                "model.shop.model_x": {
                    "unique_id": "model.shop.model_x",
                    "name": "model_x",
                    "resource_type": "model",
                    "original_file_path": "models/model_x.sql",
                    "columns": {
                        "id": {"name": "id", "tests": ["unique"]},
                        "code": {"name": "code", "tests": ["unique"]}
                    }
                },
                "test.shop.unique_model_x_id.aa": {
                    "unique_id": "test.shop.unique_model_x_id.aa",
                    "name": "unique_model_x_id",
                    "resource_type": "test",
                    "column_name": "id",
                    "attached_node": "model.shop.model_x",
                    "test_metadata": {"name": "unique"}
                },
                "test.shop.not_null_model_x_id.bb": {
                    "unique_id": "test.shop.not_null_model_x_id.bb",
                    "name": "not_null_model_x_id",
                    "resource_type": "test",
                    "column_name": "id",
                    "attached_node": "model.shop.model_x",
                    "test_metadata": {"name": "not_null"}
                }
            },
            "child_map": {
                "model.shop.model_x": ["test.shop.unique_model_x_id.aa"]
            }
        }"#,
        )
        .unwrap();

        // unique on id (node + inline) and unique on code (inline only)
        assert_eq!(
            messages(&manifest, &[("unique", 3), ("not_null", 1)]),
            (1, vec!["model_x: has only 2 unique tests, but 3 are required.".to_string()])
        );
    }
}

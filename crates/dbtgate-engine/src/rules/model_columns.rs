use dbtgate_core::{Diagnostic, DiagnosticCode};
use dbtgate_dbt::{group_by, EntityKind, ResolvedPath};
use crate::requirement::Requirements;
use crate::rule::{Rule, RuleContext};

/// Every changed model must carry at least N columns with each required name
///
/// Columns are counted per declaring entity among the model itself and its
/// direct children, so `id=2` asks for `id` on the model and on one model
/// built from it.
#[derive(Debug, Clone)]
pub struct ModelHasColumnsByName {
    pub required: Requirements,
}

impl ModelHasColumnsByName {
    pub fn new(required: Requirements) -> Self {
        Self { required }
    }
}

impl Rule for ModelHasColumnsByName {
    fn name(&self) -> &'static str {
        "check-model-has-columns-by-name"
    }

    fn description(&self) -> &'static str {
        "Check model has columns by name"
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

        let columns = group_by(ctx.walker.columns(root.id), |column| column.column_name);

        self.required
            .iter()
            .filter_map(|(name, minimum)| {
                let found = columns.count(name);
                (found < minimum).then(|| {
                    Diagnostic::new(
                        DiagnosticCode::ModelColumnsBelowMinimum,
                        format!(
                            "{}: has only {} {} columns, but {} are required.",
                            model.model_name(),
                            found,
                            name,
                            minimum
                        ),
                    )
                    .with_entity(model.unique_id())
                    .with_file(root.path.clone())
                    .with_comparison(minimum.to_string(), found.to_string())
                })
            })
            .collect()
    }
}

use std::path::Path;
use dbtgate_core::{Diagnostic, DiagnosticCode};
use dbtgate_dbt::{group_by, CountPolicy, EntityKind, InputPath, ResolvedPath, SchemaFile, SchemaFileError};
use crate::rule::{Rule, RuleContext};

/// Every changed source table must expose at least K columns from an
/// approved group
///
/// Tables declared in a changed yml but missing from the manifest are
/// checked against the columns the file declares.
#[derive(Debug, Clone)]
pub struct SourceHasColumnsByGroup {
    pub group: Vec<String>,
    pub minimum: usize,
    pub policy: CountPolicy,
}

impl SourceHasColumnsByGroup {
    pub fn new(group: Vec<String>, minimum: usize) -> Self {
        Self {
            group,
            minimum,
            policy: CountPolicy::Distinct,
        }
    }

    pub fn with_policy(mut self, policy: CountPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn below_minimum(&self, table: &str, found: usize, file: &str) -> Diagnostic {
        Diagnostic::new(
            DiagnosticCode::SourceColumnGroupBelowMinimum,
            format!(
                "{}: has only {} column(s) from [{}], but {} are required.",
                table,
                found,
                self.group.join(", "),
                self.minimum
            ),
        )
        .with_file(file.to_string())
        .with_comparison(self.minimum.to_string(), found.to_string())
    }
}

impl Rule for SourceHasColumnsByGroup {
    fn name(&self) -> &'static str {
        "check-source-has-columns-by-group"
    }

    fn description(&self) -> &'static str {
        "Check the source has a number of columns by group."
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".yml", ".yaml"]
    }

    fn root_kind(&self) -> EntityKind {
        EntityKind::Source
    }

    fn evaluate(&self, ctx: &RuleContext<'_, '_>, root: &ResolvedPath) -> Vec<Diagnostic> {
        let Some(source) = ctx.graph.source(root.id) else {
            return Vec::new();
        };

        // only what the table itself exposes, not the columns of models built on it
        let own_columns = ctx
            .walker
            .columns(root.id)
            .into_iter()
            .filter(|column| column.owner == root.id);
        let columns = group_by(own_columns, |column| column.column_name);

        let found = columns.count_required(&self.group, self.policy);
        if found >= self.minimum {
            return Vec::new();
        }

        let table = format!("{}.{}", source.source_name(), source.table_name());
        vec![self
            .below_minimum(&table, found, &root.path)
            .with_entity(source.unique_id())]
    }

    fn evaluate_file(&self, ctx: &RuleContext<'_, '_>, input: &InputPath) -> Vec<Diagnostic> {
        let schema = match SchemaFile::from_file(Path::new(&input.raw)) {
            Ok(schema) => schema,
            Err(SchemaFileError::NotFound { path }) => {
                tracing::debug!(path, "changed file is gone, nothing to read");
                return Vec::new();
            }
            Err(e) => {
                return vec![Diagnostic::new(DiagnosticCode::SchemaFileUnreadable, e.to_string())
                    .with_file(input.path.clone())];
            }
        };

        let mut diagnostics = Vec::new();
        for declared in schema.tables() {
            if ctx.graph.find_source(declared.source_name, &declared.table.name).is_some() {
                continue;
            }

            let table = format!("{}.{}", declared.source_name, declared.table.name);
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::SourceNotInManifest,
                    format!("{table}: declared in {} but not in manifest, rerun dbt parse.", input.path),
                )
                .with_file(input.path.clone()),
            );

            let columns = group_by(&declared.table.columns, |column| column.name.clone());
            let found = columns.count_required(&self.group, self.policy);
            if found < self.minimum {
                diagnostics.push(self.below_minimum(&table, found, &input.path));
            }
        }

        diagnostics
    }
}

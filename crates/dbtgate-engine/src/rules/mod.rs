//! Concrete hooks

mod model_columns;
mod model_tests;
mod source_columns;

pub use model_columns::ModelHasColumnsByName;
pub use model_tests::ModelHasTestsByName;
pub use source_columns::SourceHasColumnsByGroup;

use dbtgate_dbt::{ResolvedPath, ResourceType};
use crate::rule::RuleContext;

/// Model-scoped hooks skip seeds, snapshots and analyses
fn is_model(ctx: &RuleContext<'_, '_>, root: &ResolvedPath) -> bool {
    ctx.graph
        .node(root.id)
        .is_some_and(|node| node.resource_type() == ResourceType::Model)
}

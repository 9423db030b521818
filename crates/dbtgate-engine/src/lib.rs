//! dbtgate engine - hook rules
//!
//! Each hook resolves changed paths to models or sources, walks to the
//! columns and tests declared on them, groups and counts, and compares the
//! counts against a caller-supplied requirement.

pub mod requirement;
pub mod rule;
pub mod rules;

pub use requirement::{parse_requirement, RequirementParseError, Requirements};
pub use rule::{run_rule, run_rule_with_sink, Rule, RuleContext, RunOptions};
pub use rules::{ModelHasColumnsByName, ModelHasTestsByName, SourceHasColumnsByGroup};

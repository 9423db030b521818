//! Rule trait and the resolve -> walk -> evaluate pipeline every hook shares

use std::cell::RefCell;
use regex::Regex;
use dbtgate_core::{Diagnostic, DiagnosticCode, Event, EventSink, NoopSink, Report, SeverityThreshold};
use dbtgate_dbt::{EntityKind, InputPath, ManifestGraph, PathResolver, RelationshipWalker, ResolvedPath};

/// Read-only state handed to a rule for each root
pub struct RuleContext<'g, 'm> {
    pub graph: &'g ManifestGraph<'m>,
    pub walker: RelationshipWalker<'g, 'm>,
}

/// One pass/fail policy over resolved roots
pub trait Rule {
    /// Hook name (e.g. "check-model-has-columns-by-name")
    fn name(&self) -> &'static str;

    /// One-line description
    fn description(&self) -> &'static str;

    /// File suffixes the hook looks at
    fn extensions(&self) -> &'static [&'static str];

    /// Kind of resolved entity the rule evaluates
    fn root_kind(&self) -> EntityKind;

    /// Whether a resolved root of `root_kind` is in scope (e.g. models, not seeds)
    fn accepts(&self, _ctx: &RuleContext<'_, '_>, _root: &ResolvedPath) -> bool {
        true
    }

    /// Evaluate one root, returning one diagnostic per violation
    fn evaluate(&self, ctx: &RuleContext<'_, '_>, root: &ResolvedPath) -> Vec<Diagnostic>;

    /// Look at a changed file itself, for what the manifest cannot know yet
    fn evaluate_file(&self, _ctx: &RuleContext<'_, '_>, _input: &InputPath) -> Vec<Diagnostic> {
        Vec::new()
    }
}

/// Settings shared by every hook
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub exclude: Option<Regex>,
    pub project_dir: Option<String>,
    pub include_companions: bool,
    pub severity: SeverityThreshold,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            exclude: None,
            project_dir: None,
            include_companions: true,
            severity: SeverityThreshold::default(),
        }
    }
}

/// Run `rule` over the entities behind `paths`
pub fn run_rule<S: AsRef<str>>(
    rule: &dyn Rule,
    graph: &ManifestGraph<'_>,
    paths: &[S],
    options: &RunOptions,
) -> Report {
    run_rule_with_sink(rule, graph, paths, options, &NoopSink)
}

/// [`run_rule`], reporting soft failures to `sink`
pub fn run_rule_with_sink<S: AsRef<str>>(
    rule: &dyn Rule,
    graph: &ManifestGraph<'_>,
    paths: &[S],
    options: &RunOptions,
    sink: &dyn EventSink,
) -> Report {
    let sink = ReportingSink::new(sink);

    let resolution = PathResolver::new(graph)
        .extensions(rule.extensions())
        .exclude(options.exclude.clone())
        .project_dir(options.project_dir.as_deref())
        .include_companions(options.include_companions)
        .with_sink(&sink)
        .resolve(paths);

    let ctx = RuleContext {
        graph,
        walker: RelationshipWalker::new(graph).with_sink(&sink),
    };

    let mut report = Report::new(rule.name());

    for path in &resolution.missing {
        report.add_diagnostic(
            Diagnostic::new(
                DiagnosticCode::PathNotInManifest,
                format!("{path}: not found in manifest, skipping."),
            )
            .with_file(path.clone()),
        );
    }
    report.summary.paths_missing = resolution.missing.len();

    for root in resolution.of_kind(rule.root_kind()) {
        if !rule.accepts(&ctx, root) {
            sink.take_unresolved();
            continue;
        }
        tracing::debug!(hook = rule.name(), root = graph.unique_id(root.id), "evaluating");

        let mut diagnostics = rule.evaluate(&ctx, root);
        diagnostics.extend(sink.take_unresolved());
        report.extend(apply_severity(diagnostics, &options.severity));
        report.summary.entities_checked += 1;
    }

    for input in &resolution.inputs {
        let diagnostics = rule.evaluate_file(&ctx, input);
        report.extend(apply_severity(diagnostics, &options.severity));
    }

    report
}

fn apply_severity(
    diagnostics: Vec<Diagnostic>,
    thresholds: &SeverityThreshold,
) -> impl Iterator<Item = Diagnostic> + '_ {
    diagnostics.into_iter().map(move |diag| {
        let severity = thresholds.get_severity(diag.code, diag.severity);
        diag.with_severity(severity)
    })
}

/// Forwards every event and keeps unresolved references for the report
struct ReportingSink<'a> {
    inner: &'a dyn EventSink,
    unresolved: RefCell<Vec<Diagnostic>>,
}

impl<'a> ReportingSink<'a> {
    fn new(inner: &'a dyn EventSink) -> Self {
        Self {
            inner,
            unresolved: RefCell::new(Vec::new()),
        }
    }

    fn take_unresolved(&self) -> Vec<Diagnostic> {
        self.unresolved.take()
    }
}

impl EventSink for ReportingSink<'_> {
    fn record(&self, event: &Event) {
        if let Event::UnresolvedReference { root, reference } = event {
            let message = format!("{root}: references {reference}, which is not in the manifest.");
            let mut pending = self.unresolved.borrow_mut();
            // a rule may walk the same root more than once
            if !pending.iter().any(|diag| diag.message == message) {
                pending.push(
                    Diagnostic::new(DiagnosticCode::UnresolvedReference, message)
                        .with_entity(root.clone()),
                );
            }
        }
        self.inner.record(event);
    }
}

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dbtgate_core::{Config, Diagnostic, DiagnosticCode, Event, EventSink, Report, Severity, TracingSink};
use dbtgate_dbt::{CountPolicy, Manifest, ManifestGraph};
use dbtgate_engine::{
    parse_requirement, run_rule_with_sink, ModelHasColumnsByName, ModelHasTestsByName, Rule,
    RunOptions, SourceHasColumnsByGroup,
};

/// dbtgate - pre-commit checks over a compiled dbt manifest
#[derive(Parser)]
#[command(name = "dbtgate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: dbtgate.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments every hook takes
#[derive(Args, Debug)]
struct HookArgs {
    /// Changed files, as passed by pre-commit
    filenames: Vec<String>,

    /// Path to dbt manifest.json (`-` reads stdin)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Regex of paths to skip
    #[arg(long)]
    exclude: Option<String>,

    /// dbt project directory, stripped from the front of each path
    #[arg(long)]
    project_dir: Option<String>,

    /// Write report.json here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Do not follow schema.yml <-> model.sql companions
    #[arg(long)]
    no_companions: bool,

    /// Print a colored summary on stderr
    #[arg(long)]
    summary: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that changed models carry enough columns with given names
    CheckModelHasColumnsByName {
        /// NAME=MIN pairs
        #[arg(long, num_args = 1.., required = true, value_parser = parse_requirement)]
        cols: Vec<(String, usize)>,

        #[command(flatten)]
        hook: HookArgs,
    },

    /// Check that changed models have enough tests of given kinds
    CheckModelHasTestsByName {
        /// KIND=MIN pairs
        #[arg(long, num_args = 1.., required = true, value_parser = parse_requirement)]
        tests: Vec<(String, usize)>,

        #[command(flatten)]
        hook: HookArgs,
    },

    /// Check that changed sources expose enough columns from a group
    CheckSourceHasColumnsByGroup {
        /// Approved column names
        #[arg(long, num_args = 1.., required = true)]
        columns: Vec<String>,

        /// How many of them are required
        #[arg(long)]
        column_cnt: usize,

        /// distinct: names present, sum: matching columns
        #[arg(long, default_value = "distinct")]
        count: CountPolicy,

        #[command(flatten)]
        hook: HookArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// stderr only, stdout carries the violation lines
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<u8> {
    let config = Config::discover(cli.config.as_deref()).context("failed to load config")?;

    let (rule, hook): (Box<dyn Rule>, HookArgs) = match cli.command {
        Commands::CheckModelHasColumnsByName { cols, hook } => {
            (Box::new(ModelHasColumnsByName::new(cols.into_iter().collect())), hook)
        }
        Commands::CheckModelHasTestsByName { tests, hook } => {
            (Box::new(ModelHasTestsByName::new(tests.into_iter().collect())), hook)
        }
        Commands::CheckSourceHasColumnsByGroup { columns, column_cnt, count, hook } => (
            Box::new(SourceHasColumnsByGroup::new(columns, column_cnt).with_policy(count)),
            hook,
        ),
    };

    let manifest_path = hook.manifest.clone().unwrap_or_else(|| config.manifest.clone());
    tracing::debug!(manifest = %manifest_path.display(), hook = rule.name(), "loading manifest");

    let manifest = match Manifest::load(&manifest_path) {
        Ok(manifest) => manifest,
        Err(e) => {
            println!("Unable to load manifest file ({e})");

            if let Some(path) = hook.report.as_ref().or(config.report.as_ref()) {
                let mut report = Report::new(rule.name());
                report.add_diagnostic(
                    Diagnostic::new(DiagnosticCode::ManifestLoadFailed, e.to_string())
                        .with_file(manifest_path.display().to_string()),
                );
                report
                    .save_to_file(path)
                    .with_context(|| format!("failed to write report to {}", path.display()))?;
            }
            return Ok(1);
        }
    };
    let graph = ManifestGraph::from_manifest(&manifest);

    let options = run_options(&hook, &config)?;
    let sink = TracingSink;
    let started = Instant::now();

    let report = run_rule_with_sink(rule.as_ref(), &graph, &hook.filenames, &options, &sink);

    for diag in report.errors() {
        println!("{}", diag.message);
    }

    if hook.summary {
        print_report_summary(&report);
    }

    let status = report.status_code();
    sink.record(&Event::HookExecuted {
        hook: rule.name().to_string(),
        status,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    });

    if let Some(path) = hook.report.as_ref().or(config.report.as_ref()) {
        report
            .save_to_file(path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::debug!(report = %path.display(), "report written");
    }

    Ok(u8::try_from(status).unwrap_or(1))
}

/// Flags win over dbtgate.toml
fn run_options(hook: &HookArgs, config: &Config) -> Result<RunOptions> {
    let exclude = hook
        .exclude
        .as_deref()
        .or(config.exclude.as_deref())
        .filter(|pattern| !pattern.is_empty())
        .map(Regex::new)
        .transpose()
        .context("invalid exclude pattern")?;

    Ok(RunOptions {
        exclude,
        project_dir: hook.project_dir.clone().or_else(|| config.project_dir.clone()),
        include_companions: config.include_companions && !hook.no_companions,
        severity: config.severity.clone(),
    })
}

fn print_report_summary(report: &Report) {
    eprintln!("\n{}", "=".repeat(60).bright_blue());
    eprintln!("{}", report.hook.bold().bright_blue());
    eprintln!("{}", "=".repeat(60).bright_blue());

    eprintln!("  Checked:  {}", report.summary.entities_checked);
    eprintln!("  Skipped:  {} path(s) not in manifest", report.summary.paths_missing);

    if report.summary.errors > 0 {
        eprintln!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        eprintln!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        eprintln!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        eprintln!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    for diag in &report.diagnostics {
        let severity_str = match diag.severity {
            Severity::Error => "ERROR".red().bold(),
            Severity::Warn => "WARN".yellow().bold(),
            Severity::Info => "INFO".cyan(),
        };
        eprintln!("  [{}] {}: {}", severity_str, diag.code, diag.message);
    }

    if !report.has_errors() {
        eprintln!("{}", "✓ All checks passed".green().bold());
    }
    eprintln!("{}", "=".repeat(60).bright_blue());
}

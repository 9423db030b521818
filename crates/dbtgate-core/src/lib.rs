//! dbtgate Core
//!
//! Core domain model with stable, versioned types.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod report;
pub mod config;
pub mod events;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use report::{Report, ReportSummary, ReportVersion};
pub use config::{Config, ConfigError, SeverityThreshold, DEFAULT_MANIFEST_PATH};
pub use events::{CollectingSink, Event, EventSink, NoopSink, TracingSink};

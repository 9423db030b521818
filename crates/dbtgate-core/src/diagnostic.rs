//! Diagnostic codes and violation reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Model rules (1xxx)
    /// A model has fewer columns with a required name than demanded
    ModelColumnsBelowMinimum,

    /// A model has fewer tests of a required kind than demanded
    ModelTestsBelowMinimum,

    // Source rules (2xxx)
    /// A source table exposes too few columns from an approved group
    SourceColumnGroupBelowMinimum,

    // Resolution (3xxx)
    /// A changed path has no matching node, source or macro
    PathNotInManifest,

    /// A parent/child map entry points at an id that is not in the manifest
    UnresolvedReference,

    /// The manifest could not be read or parsed
    ManifestLoadFailed,

    // Schema files (4xxx)
    /// A changed YAML file declares a source table the manifest does not know yet
    SourceNotInManifest,

    /// A changed YAML file could not be read or parsed
    SchemaFileUnreadable,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelColumnsBelowMinimum => "MODEL_COLUMNS_BELOW_MINIMUM",
            Self::ModelTestsBelowMinimum => "MODEL_TESTS_BELOW_MINIMUM",
            Self::SourceColumnGroupBelowMinimum => "SOURCE_COLUMN_GROUP_BELOW_MINIMUM",
            Self::PathNotInManifest => "PATH_NOT_IN_MANIFEST",
            Self::UnresolvedReference => "UNRESOLVED_REFERENCE",
            Self::ManifestLoadFailed => "MANIFEST_LOAD_FAILED",
            Self::SourceNotInManifest => "SOURCE_NOT_IN_MANIFEST",
            Self::SchemaFileUnreadable => "SCHEMA_FILE_UNREADABLE",
        }
    }

    /// Default severity for violations carrying this code
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::ModelColumnsBelowMinimum
            | Self::ModelTestsBelowMinimum
            | Self::SourceColumnGroupBelowMinimum
            | Self::ManifestLoadFailed => Severity::Error,
            Self::UnresolvedReference
            | Self::SourceNotInManifest
            | Self::SchemaFileUnreadable => Severity::Warn,
            Self::PathNotInManifest => Severity::Info,
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - blocking issue that fails the hook
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message, printed verbatim by the hooks
    pub message: String,

    /// Manifest unique_id of the entity the diagnostic is about
    pub entity: Option<String>,

    /// File path the entity was resolved from
    pub file: Option<String>,

    /// Required value (for threshold diagnostics)
    pub expected: Option<String>,

    /// Found value (for threshold diagnostics)
    pub actual: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic using the code's default severity
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            entity: None,
            file: None,
            expected: None,
            actual: None,
        }
    }

    /// Override the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attach the entity unique_id
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Attach the originating file path
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Set expected/actual values
    pub fn with_comparison(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    /// Whether this diagnostic fails the hook
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        // Ensure codes are stable strings
        assert_eq!(DiagnosticCode::ModelColumnsBelowMinimum.as_str(), "MODEL_COLUMNS_BELOW_MINIMUM");
        assert_eq!(DiagnosticCode::PathNotInManifest.as_str(), "PATH_NOT_IN_MANIFEST");
        assert_eq!(DiagnosticCode::SourceNotInManifest.as_str(), "SOURCE_NOT_IN_MANIFEST");
    }

    #[test]
    fn severity_can_be_replaced() {
        let diag = Diagnostic::new(DiagnosticCode::ModelColumnsBelowMinimum, "x")
            .with_severity(Severity::Warn);
        assert!(!diag.is_error());
        assert_eq!(diag.code.default_severity(), Severity::Error);
    }

    #[test]
    fn default_severities() {
        assert!(Diagnostic::new(DiagnosticCode::ModelTestsBelowMinimum, "x").is_error());
        assert!(!Diagnostic::new(DiagnosticCode::PathNotInManifest, "x").is_error());
        assert_eq!(
            Diagnostic::new(DiagnosticCode::UnresolvedReference, "x").severity,
            Severity::Warn
        );
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::ModelColumnsBelowMinimum,
            "orders: has only 0 id columns, but 1 are required.",
        )
        .with_entity("model.jaffle_shop.orders")
        .with_comparison("1", "0");

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("MODEL_COLUMNS_BELOW_MINIMUM"));
        assert!(json.contains("error"));
    }
}

//! Structured validation report.

use std::fmt::{self, Display, Formatter};

use hub_primitives::ErrorKind;
use serde::Serialize;

use crate::validation::ValidationMode;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported but does not fail validation.
    Warning,
    /// Fails validation in strict mode.
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Which check produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Method and tool reachability.
    Coverage,
    /// Parameter disagreement.
    Drift,
    /// Classification disagreement.
    Classification,
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coverage => f.write_str("coverage"),
            Self::Drift => f.write_str("drift"),
            Self::Classification => f.write_str("classification"),
        }
    }
}

/// Whether a finding is about a tool or a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    /// Tool registry entry.
    Tool,
    /// Method registry entry or declaration.
    Method,
}

/// Entry a finding is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    /// Entry kind.
    pub kind: SubjectKind,
    /// Entry name.
    pub name: String,
}

impl Subject {
    /// Tool subject.
    #[must_use]
    pub fn tool(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Tool,
            name: name.into(),
        }
    }

    /// Method subject.
    #[must_use]
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Method,
            name: name.into(),
        }
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind {
            SubjectKind::Tool => write!(f, "tool `{}`", self.name),
            SubjectKind::Method => write!(f, "method `{}`", self.name),
        }
    }
}

/// Single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Producing check.
    pub category: Category,
    /// Severity under the active mode.
    pub severity: Severity,
    /// Machine-readable kind.
    pub kind: ErrorKind,
    /// Entry the finding is about.
    pub subject: Subject,
    /// Parameter involved, for drift findings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    /// Human-readable explanation.
    pub message: String,
}

impl Finding {
    pub(crate) fn new(
        category: Category,
        severity: Severity,
        kind: ErrorKind,
        subject: Subject,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            kind,
            subject,
            parameter: None,
            message: message.into(),
        }
    }

    pub(crate) fn on_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }
}

impl Display for Finding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} {}: {}",
            self.severity, self.category, self.kind, self.subject, self.message
        )
    }
}

/// Outcome of one validation run. Always produced, even when findings exist.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    mode: ValidationMode,
    drift_detection: bool,
    methods_checked: usize,
    tools_checked: usize,
    findings: Vec<Finding>,
}

impl ValidationReport {
    pub(crate) fn new(mode: ValidationMode, drift_detection: bool) -> Self {
        Self {
            mode,
            drift_detection,
            methods_checked: 0,
            tools_checked: 0,
            findings: Vec::new(),
        }
    }

    pub(crate) fn set_counts(&mut self, methods: usize, tools: usize) {
        self.methods_checked = methods;
        self.tools_checked = tools;
    }

    pub(crate) fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Returns the mode the report was produced under.
    #[must_use]
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Returns `true` when drift checks ran.
    #[must_use]
    pub fn drift_detection(&self) -> bool {
        self.drift_detection
    }

    /// Number of registered methods examined.
    #[must_use]
    pub fn methods_checked(&self) -> usize {
        self.methods_checked
    }

    /// Number of tools examined.
    #[must_use]
    pub fn tools_checked(&self) -> usize {
        self.tools_checked
    }

    /// Returns every finding in discovery order.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Iterates error findings.
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|finding| finding.severity == Severity::Error)
    }

    /// Iterates warning findings.
    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|finding| finding.severity == Severity::Warning)
    }

    /// Returns `true` when at least one error was found.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Counts findings of one kind.
    #[must_use]
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.findings.iter().filter(|finding| finding.kind == kind).count()
    }

    /// Process exit code for the run: `1` only for errors in strict mode.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.mode == ValidationMode::Strict && self.has_errors())
    }

    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which does not happen for well-formed
    /// reports.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

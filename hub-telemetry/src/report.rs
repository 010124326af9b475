//! Emits validation findings as tracing events.

use hub_registry::{Severity, ValidationReport};
use tracing::{error, info, warn};

/// Logs every finding at a level matching its severity, then a summary line.
pub fn log_report(report: &ValidationReport) {
    for finding in report.findings() {
        match finding.severity {
            Severity::Error => error!(
                category = %finding.category,
                kind = %finding.kind,
                subject = %finding.subject,
                parameter = finding.parameter.as_deref().unwrap_or_default(),
                "{}",
                finding.message
            ),
            Severity::Warning => warn!(
                category = %finding.category,
                kind = %finding.kind,
                subject = %finding.subject,
                "{}",
                finding.message
            ),
        }
    }

    info!(
        mode = ?report.mode(),
        methods = report.methods_checked(),
        tools = report.tools_checked(),
        errors = report.errors().count(),
        warnings = report.warnings().count(),
        "validation summary"
    );
}

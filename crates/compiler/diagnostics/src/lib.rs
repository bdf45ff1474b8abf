mod diagnostics;
mod reporting;

pub use diagnostics::{
    Diagnostic, DiagnosticCode, DiagnosticCollection, DiagnosticPhase, DiagnosticSeverity,
};
pub use reporting::build_diagnostic_message;

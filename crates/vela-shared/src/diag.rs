use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::site::Site;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A rendered diagnostic anchored at a source site.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub site: Site,
    pub notes: Vec<(String, Site)>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, site: Site) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            site,
            notes: vec![],
        }
    }

    pub fn warning(message: impl Into<String>, site: Site) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            site,
            notes: vec![],
        }
    }

    pub fn with_note(mut self, message: impl Into<String>, site: Site) -> Diagnostic {
        self.notes.push((message.into(), site));
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.site, self.severity, self.message)?;
        for (message, site) in &self.notes {
            write!(f, "\n{}: note: {}", site, message)?;
        }
        Ok(())
    }
}

/// An accumulating set of diagnostics.
///
/// The sink deduplicates, which makes reporting idempotent: the diagnose
/// closures attached to solver outcomes may be re-invoked when a superior
/// solution replaces an earlier one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSink {
    diags: BTreeSet<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> DiagnosticSink {
        DiagnosticSink::default()
    }

    /// Record a diagnostic, returning whether it was newly inserted.
    pub fn report(&mut self, diag: Diagnostic) -> bool {
        self.diags.insert(diag)
    }

    pub fn extend(&mut self, other: DiagnosticSink) {
        self.diags.extend(other.diags);
    }

    pub fn error_count(&self) -> usize {
        self.diags
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.diags.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.diags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diags.iter()
    }
}

impl IntoIterator for DiagnosticSink {
    type Item = Diagnostic;
    type IntoIter = std::collections::btree_set::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diags.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::site::Site;

    use super::{Diagnostic, DiagnosticSink};

    #[test]
    fn reporting_is_idempotent() {
        let mut sink = DiagnosticSink::new();
        let diag = Diagnostic::error("two overlapping mutable accesses", Site::default());
        sink.report(diag.clone());
        sink.report(diag);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.error_count(), 1);
    }
}

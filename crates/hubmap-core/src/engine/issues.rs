//! Recoverable conversion problems
//!
//! The engine never aborts a conversion for a data or schema disagreement.
//! It skips the affected subtree, logs the problem and records it here so the
//! caller can inspect what was left out.
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

use crate::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of recoverable problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    /// A value node has no datatype
    DatatypeMissing,
    /// Clone requested between datatypes with different names
    DatatypeMismatch,
    /// An occurrence does not have the shape its datatype declares
    ShapeMismatch,
    /// A named interpreter function reported failure
    FunctionFailed,
    /// A rule expression the engine cannot run
    UnrecognizedRule,
}

impl IssueKind {
    fn severity(self) -> Severity {
        match self {
            IssueKind::UnrecognizedRule => Severity::Info,
            IssueKind::ShapeMismatch => Severity::Warning,
            IssueKind::DatatypeMissing | IssueKind::DatatypeMismatch | IssueKind::FunctionFailed => {
                Severity::Error
            }
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueKind::DatatypeMissing => "DatatypeMissing",
            IssueKind::DatatypeMismatch => "DatatypeMismatch",
            IssueKind::ShapeMismatch => "ShapeMismatch",
            IssueKind::FunctionFailed => "FunctionFailed",
            IssueKind::UnrecognizedRule => "UnrecognizedRule",
        };
        f.write_str(name)
    }
}

/// One recorded problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// Structural path inside the value tree, e.g. `Patient/name/family`
    pub path: String,
    /// Semantic element owning the rule in force, `UNKNOWN` when none applies
    pub semantic_element: String,
    /// Syntax path of that semantic element
    pub syntax_path: String,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

impl fmt::Display for ConversionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} at {} (semantic {} located {})",
            self.kind, self.message, self.path, self.semantic_element, self.syntax_path
        )
    }
}

/// Where an issue happened
#[derive(Debug, Clone, Copy)]
pub struct IssueSite<'a> {
    pub path: &'a str,
    pub semantic_element: &'a str,
    pub syntax_path: &'a str,
}

/// Collector for the issues of one conversion session
#[derive(Debug, Default)]
pub struct IssueTracker {
    issues: Vec<ConversionIssue>,
    /// kind -> indices into `issues`
    kind_index: HashMap<IssueKind, Vec<usize>>,
}

impl IssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log an issue
    pub fn record(&mut self, kind: IssueKind, site: IssueSite<'_>, message: impl Into<String>) {
        let issue = ConversionIssue {
            kind,
            severity: kind.severity(),
            path: site.path.to_string(),
            semantic_element: site.semantic_element.to_string(),
            syntax_path: site.syntax_path.to_string(),
            message: message.into(),
            recorded_at: Utc::now(),
        };

        match issue.severity {
            Severity::Error => log::error!("{}", issue),
            Severity::Warning => log::warn!("{}", issue),
            Severity::Info => log::trace!("{}", issue),
        }

        self.kind_index
            .entry(kind)
            .or_default()
            .push(self.issues.len());
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[ConversionIssue] {
        &self.issues
    }

    /// Issues of one kind, in recording order
    pub fn of_kind(&self, kind: IssueKind) -> Vec<&ConversionIssue> {
        self.kind_index
            .get(&kind)
            .map(|indices| indices.iter().map(|&i| &self.issues[i]).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.kind_index.get(&kind).map_or(0, Vec::len)
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity >= Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Remove and return everything recorded so far
    pub fn take(&mut self) -> Vec<ConversionIssue> {
        self.kind_index.clear();
        std::mem::take(&mut self.issues)
    }

    pub fn summary(&self) -> String {
        let errors = self.issues.iter().filter(|i| i.severity == Severity::Error).count();
        let warnings = self.issues.iter().filter(|i| i.severity == Severity::Warning).count();
        format!(
            "{} issues: {} errors, {} warnings",
            self.issues.len(),
            errors,
            warnings
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> IssueSite<'static> {
        IssueSite {
            path: "Patient/name",
            semantic_element: "PatientName",
            syntax_path: "ClinicalDocument/recordTarget",
        }
    }

    #[test]
    fn test_record_and_query() {
        let mut tracker = IssueTracker::new();
        tracker.record(IssueKind::DatatypeMismatch, site(), "HumanName to String");
        tracker.record(IssueKind::ShapeMismatch, site(), "expected struct, found scalar");
        tracker.record(IssueKind::DatatypeMismatch, site(), "Address to String");

        assert_eq!(tracker.issues().len(), 3);
        assert_eq!(tracker.count(IssueKind::DatatypeMismatch), 2);
        assert_eq!(tracker.count(IssueKind::FunctionFailed), 0);
        assert_eq!(tracker.of_kind(IssueKind::DatatypeMismatch)[1].message, "Address to String");
        assert!(tracker.has_errors());
        assert_eq!(tracker.summary(), "3 issues: 2 errors, 1 warnings");
    }

    #[test]
    fn test_take_resets() {
        let mut tracker = IssueTracker::new();
        tracker.record(IssueKind::UnrecognizedRule, site(), "value = 'x'");
        assert!(!tracker.has_errors());

        let taken = tracker.take();
        assert_eq!(taken.len(), 1);
        assert!(tracker.is_empty());
        assert_eq!(tracker.count(IssueKind::UnrecognizedRule), 0);
    }

    #[test]
    fn test_issue_display() {
        let mut tracker = IssueTracker::new();
        tracker.record(IssueKind::FunctionFailed, site(), "Unable to execute toDate");
        let text = tracker.issues()[0].to_string();
        assert!(text.contains("FunctionFailed"));
        assert!(text.contains("Patient/name"));
        assert!(text.contains("ClinicalDocument/recordTarget"));
    }
}

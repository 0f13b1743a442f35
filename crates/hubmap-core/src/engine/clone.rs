//! Structural cloning between value trees of identically named datatypes
//!
//! The cloner walks source and target in lock-step. It only ever writes to the
//! target, and a problem in one subtree never stops its siblings from being
//! copied.
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

use super::issues::{IssueKind, IssueSite, IssueTracker};
use crate::model::{ConversionRule, DatatypeKind};
use crate::value::{ChoiceInstance, Occurrence, StructInstance, ValueNode};
use std::sync::Arc;

const UNKNOWN_ELEMENT: &str = "UNKNOWN";

/// Recursive structural copy of one value tree into another
pub struct StructuralCloner<'a> {
    /// Rule in force, used only to attribute recorded issues
    rule: Option<&'a ConversionRule>,
    tracker: &'a mut IssueTracker,
    path: Vec<String>,
}

impl<'a> StructuralCloner<'a> {
    pub fn new(rule: Option<&'a ConversionRule>, tracker: &'a mut IssueTracker) -> Self {
        Self {
            rule,
            tracker,
            path: Vec::new(),
        }
    }

    /// Copy `source` into `target`, mutating only `target`
    pub fn clone_value(&mut self, source: &ValueNode, target: &mut ValueNode) {
        self.path.push(source.name().to_string());
        self.clone_node(source, target);
        self.path.pop();
    }

    fn clone_node(&mut self, source: &ValueNode, target: &mut ValueNode) {
        let (source_dt, target_dt) = match (source.datatype(), target.datatype()) {
            (Some(s), Some(t)) => (Arc::clone(s), Arc::clone(t)),
            (None, _) => {
                self.record(
                    IssueKind::DatatypeMissing,
                    format!("{} datatype is not set", source.name()),
                );
                return;
            }
            (_, None) => {
                self.record(
                    IssueKind::DatatypeMissing,
                    format!("{} datatype is not set", target.name()),
                );
                return;
            }
        };

        if source_dt.name() != target_dt.name() {
            self.record(
                IssueKind::DatatypeMismatch,
                format!(
                    "No conversion rule found and the datatypes need to be the same to clone, \"{} to {}\"",
                    source_dt.name(),
                    target_dt.name()
                ),
            );
            return;
        }

        if source.occurrences().is_empty() {
            return;
        }

        match source_dt.kind() {
            DatatypeKind::Structured { .. } => {
                for (index, occurrence) in source.occurrences().iter().enumerate() {
                    let Occurrence::Struct(source_struct) = occurrence else {
                        self.record_shape(index, "struct", occurrence);
                        continue;
                    };
                    let mut instance = StructInstance::for_datatype(&target_dt);
                    self.clone_struct(source_struct, &mut instance);
                    target.push(Occurrence::Struct(instance));
                }
            }
            DatatypeKind::Choice { .. } => {
                for (index, occurrence) in source.occurrences().iter().enumerate() {
                    let Occurrence::Choice(source_choice) = occurrence else {
                        self.record_shape(index, "choice", occurrence);
                        continue;
                    };
                    let mut instance = ChoiceInstance::for_datatype(Arc::clone(&target_dt));
                    self.clone_choice(source_choice, &mut instance);
                    target.push(Occurrence::Choice(instance));
                }
            }
            DatatypeKind::Simple(_) => {
                let mut copied = Vec::with_capacity(source.occurrences().len());
                for (index, occurrence) in source.occurrences().iter().enumerate() {
                    match occurrence {
                        Occurrence::Scalar(_) => copied.push(occurrence.clone()),
                        other => self.record_shape(index, "scalar", other),
                    }
                }
                target.set_occurrences(copied);
            }
            DatatypeKind::Enumerated { .. } => {
                target.clear();
                for (index, occurrence) in source.occurrences().iter().enumerate() {
                    let Occurrence::Literal(literal) = occurrence else {
                        self.record_shape(index, "literal", occurrence);
                        continue;
                    };
                    match target_dt.literal_by_code(&literal.code) {
                        Some(resolved) => target.push(Occurrence::Literal(resolved.clone())),
                        None => log::debug!(
                            "Dropping literal code '{}' not present in {} at {}",
                            literal.code,
                            target_dt.name(),
                            self.path.join("/")
                        ),
                    }
                }
            }
        }
    }

    /// Fields present only in the target stay untouched
    fn clone_struct(&mut self, source: &StructInstance, target: &mut StructInstance) {
        for target_field in target.fields_mut() {
            if let Some(source_field) = source.field(target_field.name()) {
                self.clone_value(source_field, target_field);
            }
        }
    }

    fn clone_choice(&mut self, source: &ChoiceInstance, target: &mut ChoiceInstance) {
        let Some(active) = source.active() else {
            return;
        };
        match target.select(active.name()) {
            Some(selected) => self.clone_value(active, selected),
            None => self.record(
                IssueKind::ShapeMismatch,
                format!("Choice has no alternative named '{}'", active.name()),
            ),
        }
    }

    fn record_shape(&mut self, index: usize, expected: &str, found: &Occurrence) {
        self.record(
            IssueKind::ShapeMismatch,
            format!(
                "Occurrence {} should be a {} but is a {}; skipped",
                index,
                expected,
                found.shape()
            ),
        );
    }

    fn record(&mut self, kind: IssueKind, message: String) {
        let path = self.path.join("/");
        let (element, syntax_path) = match self.rule {
            Some(rule) => (rule.owner.name.clone(), rule.owner_path()),
            None => (UNKNOWN_ELEMENT.to_string(), "null".to_string()),
        };
        self.tracker.record(
            kind,
            IssueSite {
                path: &path,
                semantic_element: &element,
                syntax_path: &syntax_path,
            },
            message,
        );
    }
}

/// Clone `source` into `target`, attributing issues to `rule`
pub fn clone_value(
    source: &ValueNode,
    target: &mut ValueNode,
    rule: Option<&ConversionRule>,
    tracker: &mut IssueTracker,
) {
    StructuralCloner::new(rule, tracker).clone_value(source, target);
}

//! Shared test support utilities for integration tests

#![allow(dead_code)]

use hubmap_core::terminology::CacheKey;
use hubmap_core::{
    BusinessElementRef, ConversionRule, Datatype, Field, Interpreter, InterpreterRegistry,
    ModelKey, ModelProperties, Occurrence, Result, RulePair, Scalar, SemanticElement, SourceArg,
    SyntaxNode, TargetArg, TransformCode, TranslationClient, ValueNode,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn string_type() -> Arc<Datatype> {
    Datatype::primitive("String")
}

/// Coded value with the fields terminology substitution touches
pub fn cd_type() -> Arc<Datatype> {
    let string = string_type();
    Datatype::structured(
        "CD",
        vec![
            Field::new("code", string.clone()),
            Field::new("codeSystem", string.clone()),
            Field::new("displayName", string.clone()),
            Field::new("originalText", string),
        ],
    )
}

pub fn human_name_type() -> Arc<Datatype> {
    let string = string_type();
    Datatype::structured(
        "HumanName",
        vec![Field::new("given", string.clone()), Field::new("family", string)],
    )
}

pub fn patient_type() -> Arc<Datatype> {
    Datatype::structured(
        "Patient",
        vec![
            Field::new("id", string_type()),
            Field::new("name", human_name_type()),
        ],
    )
}

pub fn observation_type() -> Arc<Datatype> {
    Datatype::structured(
        "Observation",
        vec![
            Field::new("id", string_type()),
            Field::new("code", cd_type()),
        ],
    )
}

pub fn text(name: &str, value: &str) -> ValueNode {
    ValueNode::new(name, string_type()).with_occurrence(Scalar::from(value))
}

pub fn coded(name: &str, code: &str, display: &str) -> ValueNode {
    let mut node = ValueNode::new(name, cd_type());
    if let Some(instance) = node.push_struct() {
        instance.replace_text("code", code);
        if !display.is_empty() {
            instance.replace_text("displayName", display);
        }
    }
    node
}

pub fn patient(id: &str, given: &str, family: &str) -> ValueNode {
    let mut node = ValueNode::new("Patient", patient_type());
    if let Some(instance) = node.push_struct() {
        instance.replace_text("id", id);
        if let Some(name) = instance.field_mut("name").and_then(ValueNode::push_struct) {
            name.replace_text("given", given);
            name.replace_text("family", family);
        }
    }
    node
}

pub fn first_text(node: &ValueNode, field: &str) -> Option<String> {
    node.first()
        .and_then(Occurrence::as_struct)
        .and_then(|s| s.text(field))
}

/// Rule pair through business element `be`, with optional rule expressions
pub struct RuleFixture<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub datatype: Arc<Datatype>,
    pub business_element: BusinessElementRef,
    pub to_expression: Option<&'a str>,
    pub from_expression: Option<&'a str>,
    pub source_resolver: Option<&'a str>,
    pub target_resolver: Option<&'a str>,
}

impl<'a> RuleFixture<'a> {
    pub fn new(source: &'a str, target: &'a str, datatype: Arc<Datatype>, be: &str) -> Self {
        Self {
            source,
            target,
            business_element: BusinessElementRef::new(be, datatype.clone()),
            datatype,
            to_expression: None,
            from_expression: None,
            source_resolver: None,
            target_resolver: None,
        }
    }

    pub fn build(self) -> RulePair {
        let be = Arc::new(self.business_element);
        let source_node = SyntaxNode::child(&SyntaxNode::root("SourceDocument"), self.source);
        let target_node = SyntaxNode::child(&SyntaxNode::root("TargetDocument"), self.target);

        let mut to = ConversionRule::new(
            Arc::new(SemanticElement::new(self.source, self.datatype.clone()).with_syntax_node(source_node)),
            be.clone(),
        );
        let mut from = ConversionRule::new(
            Arc::new(SemanticElement::new(self.target, self.datatype).with_syntax_node(target_node)),
            be,
        );
        if let Some(expr) = self.to_expression {
            to = to.with_expression(expr);
        }
        if let Some(expr) = self.from_expression {
            from = from.with_expression(expr);
        }
        if let Some(resolver) = self.source_resolver {
            to = to.with_resolver(resolver);
        }
        if let Some(resolver) = self.target_resolver {
            from = from.with_resolver(resolver);
        }
        RulePair::new(Arc::new(to), Arc::new(from))
    }
}

/// Translation client answering from a fixed table and counting calls
#[derive(Default)]
pub struct CountingClient {
    pub calls: AtomicUsize,
    answers: HashMap<CacheKey, TransformCode>,
    fail: bool,
}

impl CountingClient {
    pub fn with_answer(mut self, source: &str, code: &str, target: &str, answer: TransformCode) -> Self {
        self.answers.insert(CacheKey::new(source, code, target), answer);
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TranslationClient for CountingClient {
    fn translate(&self, source: &str, code: &str, target: &str) -> Result<TransformCode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow::anyhow!("connection refused").into());
        }
        Ok(self
            .answers
            .get(&CacheKey::new(source, code, target))
            .cloned()
            .unwrap_or_default())
    }
}

/// Interpreter recording every invocation
///
/// Known functions: `upper` copies a simple source upper-cased, `codeOnly`
/// copies the source code into a structured target, `fail` always fails.
#[derive(Default)]
pub struct RecordingInterpreter {
    pub invocations: Mutex<Vec<String>>,
}

impl Interpreter for RecordingInterpreter {
    fn execute(
        &self,
        function: &str,
        source: SourceArg<'_>,
        mut target: TargetArg<'_>,
        properties: &ModelProperties,
        _rule: &ConversionRule,
    ) -> bool {
        if let Ok(mut log) = self.invocations.lock() {
            log.push(function.to_string());
        }
        match function {
            "upper" => {
                let SourceArg::Node(node) = source else {
                    return false;
                };
                let Some(value) = node.first().and_then(Occurrence::as_scalar) else {
                    return false;
                };
                let mut text = value.to_string().to_uppercase();
                if let Some(suffix) = properties.get("suffix") {
                    text.push_str(suffix);
                }
                target.node().push(Scalar::from(text));
                true
            }
            "codeOnly" => {
                let SourceArg::Value(Occurrence::Struct(instance)) = source else {
                    return false;
                };
                let Some(code) = instance.text("code") else {
                    return false;
                };
                match target.instance() {
                    Some(out) => out.replace_text("code", &code),
                    None => false,
                }
            }
            _ => false,
        }
    }
}

/// Registry building [`RecordingInterpreter`]s, counting constructions
pub fn counting_registry() -> (Arc<InterpreterRegistry>, Arc<AtomicUsize>) {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let factory = move |_: &ModelKey| -> Result<Arc<dyn Interpreter>> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingInterpreter::default()))
    };
    (Arc::new(InterpreterRegistry::new(Arc::new(factory))), builds)
}

pub fn cda() -> ModelKey {
    ModelKey::new("HL7", "CDA")
}

pub fn fhir() -> ModelKey {
    ModelKey::new("HL7", "FHIR")
}

//! Two-phase conversion through a business element
//!
//! Phase 1 moves a source semantic element into a fresh business-element
//! value; phase 2 moves that value into the target semantic element, and
//! only runs when phase 1 produced data. Each phase is driven by the rule's
//! expression: a structural clone, a named interpreter function, or nothing
//! for expressions the engine does not recognize. Coded values are remapped
//! between code systems when both the rule and its business element declare
//! one.
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

use super::clone::clone_value;
use super::interpreter::{Interpreter, InterpreterRegistry, SourceArg, TargetArg};
use super::issues::{ConversionIssue, IssueKind, IssueSite, IssueTracker};
use crate::audit::{AuditRecord, AuditSink};
use crate::config::TerminologyConfig;
use crate::model::{ConversionRule, ModelKey, ModelProperties, RuleExpression, RulePair};
use crate::terminology::{TerminologyCache, TerminologyService};
use crate::value::ValueNode;
use crate::{Error, Result};
use std::sync::Arc;

const CODE_FIELD: &str = "code";
const CODE_SYSTEM_FIELD: &str = "codeSystem";
const DISPLAY_NAME_FIELD: &str = "displayName";
const ORIGINAL_TEXT_FIELD: &str = "originalText";

/// Shared resources used by every converter
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub registry: Arc<InterpreterRegistry>,
    pub terminology: Arc<TerminologyService>,
}

impl EngineContext {
    pub fn new(registry: Arc<InterpreterRegistry>, terminology: Arc<TerminologyService>) -> Self {
        Self {
            registry,
            terminology,
        }
    }

    /// Process-wide registry and cache, terminology settings from the environment
    ///
    /// The first call sizes the process-wide cache from `cache_capacity`.
    pub fn from_env() -> Result<Self> {
        let config = TerminologyConfig::from_env()?;
        let cache = TerminologyCache::global_with_capacity(config.cache_capacity);
        let terminology = TerminologyService::with_cache(&config, cache)?;
        Ok(Self::new(InterpreterRegistry::global(), Arc::new(terminology)))
    }
}

/// A non-empty business-element value produced during the session
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedValue {
    pub business_element: String,
    pub value: ValueNode,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    ToBusiness,
    FromBusiness,
}

/// Conversion session between one source and one target model
pub struct Converter {
    context: EngineContext,
    source_model: Option<ModelKey>,
    target_model: Option<ModelKey>,
    source_properties: ModelProperties,
    target_properties: ModelProperties,
    captured: Vec<CapturedValue>,
    issues: IssueTracker,
    audit: Option<AuditSink>,
}

impl Converter {
    pub fn new(context: EngineContext) -> Self {
        Self {
            context,
            source_model: None,
            target_model: None,
            source_properties: ModelProperties::new(),
            target_properties: ModelProperties::new(),
            captured: Vec::new(),
            issues: IssueTracker::new(),
            audit: None,
        }
    }

    /// Stream captured business values to `sink`
    pub fn with_audit(mut self, sink: AuditSink) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Start a session between `source_model` and `target_model`
    ///
    /// Interpreters for both models are built now when possible. A model
    /// whose interpreter cannot be built only fails later, on the first
    /// function rule that needs it. Captured values and issues are cleared.
    pub fn initialize(
        &mut self,
        source_model: ModelKey,
        target_model: ModelKey,
        source_properties: ModelProperties,
        target_properties: ModelProperties,
    ) {
        for model in [&source_model, &target_model] {
            if let Err(e) = self.context.registry.get_or_create(model) {
                log::warn!("Interpreter for {} unavailable: {}", model, e);
            }
        }

        log::debug!("Initialized conversion {} -> {}", source_model, target_model);
        self.source_model = Some(source_model);
        self.target_model = Some(target_model);
        self.source_properties = source_properties;
        self.target_properties = target_properties;
        self.captured.clear();
        self.issues.take();

        if let Some(sink) = self.audit.as_mut() {
            if let Err(e) = sink.start() {
                log::warn!("Unable to start audit stream: {}", e);
            }
        }
    }

    /// Convert `source` into `target` through the rules' business element
    ///
    /// Returns whether the business value carried data. Only a function rule
    /// without a usable interpreter fails the call; every other problem is
    /// recorded in [`Converter::issues`].
    pub fn convert(&mut self, source: &ValueNode, rules: &RulePair, target: &mut ValueNode) -> Result<bool> {
        let to_business = rules.to_business.as_ref();
        let from_business = rules.from_business.as_ref();
        log::trace!("Convert business element {}", to_business.business_element.name);

        let mut business = ValueNode::new(
            to_business.business_element.name.clone(),
            Arc::clone(&to_business.business_element.datatype),
        );

        self.map_to_business(source, to_business, &mut business)?;

        if business.is_empty() {
            return Ok(false);
        }

        self.capture(to_business, &business);
        self.map_from_business(&mut business, from_business, target)?;
        Ok(true)
    }

    /// Non-empty business values of this session, in production order
    pub fn business_values(&self) -> &[CapturedValue] {
        &self.captured
    }

    pub fn issues(&self) -> &IssueTracker {
        &self.issues
    }

    pub fn take_issues(&mut self) -> Vec<ConversionIssue> {
        self.issues.take()
    }

    /// Close the audit stream, if any
    pub fn finish(&mut self) -> Result<()> {
        match self.audit.as_mut() {
            Some(sink) => sink.end(),
            None => Ok(()),
        }
    }

    fn map_to_business(&mut self, source: &ValueNode, rule: &ConversionRule, business: &mut ValueNode) -> Result<()> {
        match &rule.expression {
            RuleExpression::Clone => {
                log::trace!("Clone {} into {}", source.name(), business.name());
                clone_value(source, business, Some(rule), &mut self.issues);
            }
            RuleExpression::Function { name } => {
                let interpreter = self.interpreter(Direction::ToBusiness, rule)?;
                let executed = interpreter.execute(
                    name,
                    SourceArg::from_node(source),
                    TargetArg::new(business),
                    &self.source_properties,
                    rule,
                );
                if !executed {
                    self.function_failed(name, rule);
                }
            }
            RuleExpression::Unrecognized { expression } => {
                self.unrecognized(expression, rule, source.name());
            }
        }

        if rule.has_terminology_transformation() {
            let from = rule.resolver.as_deref().unwrap_or_default();
            let to = rule.business_element.vocabulary.as_deref().unwrap_or_default();
            self.substitute_codes(business, from, to);
        }
        Ok(())
    }

    fn map_from_business(
        &mut self,
        business: &mut ValueNode,
        rule: &ConversionRule,
        target: &mut ValueNode,
    ) -> Result<()> {
        if rule.has_terminology_transformation() {
            let from = rule.business_element.vocabulary.as_deref().unwrap_or_default();
            let to = rule.resolver.as_deref().unwrap_or_default();
            self.substitute_codes(business, from, to);
        }

        match &rule.expression {
            RuleExpression::Clone => {
                log::trace!("Clone {} into {}", business.name(), target.name());
                clone_value(business, target, Some(rule), &mut self.issues);
            }
            RuleExpression::Function { name } => {
                let interpreter = self.interpreter(Direction::FromBusiness, rule)?;
                target.seed_struct();
                let executed = interpreter.execute(
                    name,
                    SourceArg::from_node(business),
                    TargetArg::new(target),
                    &self.target_properties,
                    rule,
                );
                if !executed {
                    self.function_failed(name, rule);
                }
            }
            RuleExpression::Unrecognized { expression } => {
                target.seed_struct();
                self.unrecognized(expression, rule, business.name());
            }
        }
        Ok(())
    }

    fn interpreter(&self, direction: Direction, rule: &ConversionRule) -> Result<Arc<dyn Interpreter>> {
        let (model, side) = match direction {
            Direction::ToBusiness => (self.source_model.as_ref(), "source"),
            Direction::FromBusiness => (self.target_model.as_ref(), "target"),
        };
        let model = model.ok_or_else(|| {
            Error::configuration(format!(
                "No {} model initialized for function rule '{}' at {}",
                side,
                rule.expression,
                rule.owner_path()
            ))
        })?;
        self.context.registry.get_or_create(model)
    }

    /// Remap the code of every structured occurrence from `from` into `to`
    fn substitute_codes(&self, value: &mut ValueNode, from: &str, to: &str) {
        for occurrence in value.occurrences_mut() {
            let Some(instance) = occurrence.as_struct_mut() else {
                continue;
            };
            let Some(code) = instance.text(CODE_FIELD).filter(|c| !c.is_empty()) else {
                continue;
            };

            let result = self.context.terminology.transform(from, &code, to);
            if result.is_blank() {
                continue;
            }
            log::trace!("Substituting {}::{} with {}::{}", from, code, to, result.code);

            instance.replace_text(CODE_FIELD, &result.code);
            if instance.has_field(CODE_SYSTEM_FIELD) {
                instance.replace_text(CODE_SYSTEM_FIELD, &result.system);
            }
            if instance.has_field(DISPLAY_NAME_FIELD) {
                if let Some(previous) = instance.text(DISPLAY_NAME_FIELD).filter(|d| !d.is_empty()) {
                    instance.replace_text(ORIGINAL_TEXT_FIELD, &previous);
                }
                instance.replace_text(DISPLAY_NAME_FIELD, &result.display_name);
            }
        }
    }

    fn capture(&mut self, rule: &ConversionRule, business: &ValueNode) {
        if let Some(sink) = self.audit.as_mut() {
            let record = AuditRecord::new(&rule.business_element.name, &rule.owner.name, business);
            if let Err(e) = sink.record(&record) {
                log::warn!("Unable to write audit record: {}", e);
            }
        }
        self.captured.push(CapturedValue {
            business_element: rule.business_element.name.clone(),
            value: business.clone(),
        });
    }

    fn function_failed(&mut self, name: &str, rule: &ConversionRule) {
        let syntax_path = rule.owner_path();
        self.issues.record(
            IssueKind::FunctionFailed,
            IssueSite {
                path: &rule.owner.name,
                semantic_element: &rule.owner.name,
                syntax_path: &syntax_path,
            },
            format!(
                "Unable to execute {} at {} for {}",
                name, syntax_path, rule.business_element.name
            ),
        );
    }

    fn unrecognized(&mut self, expression: &str, rule: &ConversionRule, path: &str) {
        let syntax_path = rule.owner_path();
        self.issues.record(
            IssueKind::UnrecognizedRule,
            IssueSite {
                path,
                semantic_element: &rule.owner.name,
                syntax_path: &syntax_path,
            },
            format!("Missing transformation for rule '{}'", expression),
        );
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("source_model", &self.source_model)
            .field("target_model", &self.target_model)
            .field("captured", &self.captured.len())
            .field("issues", &self.issues.issues().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BusinessElementRef, Datatype, Field, SemanticElement};
    use crate::terminology::{CacheKey, TransformCode};
    use crate::value::{Occurrence, Scalar};

    struct Upper;

    impl Interpreter for Upper {
        fn execute(
            &self,
            function: &str,
            source: SourceArg<'_>,
            mut target: TargetArg<'_>,
            _properties: &ModelProperties,
            _rule: &ConversionRule,
        ) -> bool {
            if function != "upper" {
                return false;
            }
            let SourceArg::Node(node) = source else {
                return false;
            };
            let Some(text) = node.first().and_then(Occurrence::as_scalar) else {
                return false;
            };
            target.node().push(Scalar::from(text.to_string().to_uppercase()));
            true
        }
    }

    fn context(terminology: TerminologyService) -> EngineContext {
        let factory = |_: &ModelKey| -> Result<Arc<dyn Interpreter>> { Ok(Arc::new(Upper)) };
        EngineContext::new(
            Arc::new(InterpreterRegistry::new(Arc::new(factory))),
            Arc::new(terminology),
        )
    }

    fn offline() -> TerminologyService {
        TerminologyService::offline(Arc::new(TerminologyCache::new(8)))
    }

    fn string_rules(to_expr: Option<&str>, from_expr: Option<&str>) -> RulePair {
        let string = Datatype::primitive("String");
        let be = Arc::new(BusinessElementRef::new("FamilyName", string.clone()));
        let mut to = ConversionRule::new(Arc::new(SemanticElement::new("SrcFamily", string.clone())), be.clone());
        let mut from = ConversionRule::new(Arc::new(SemanticElement::new("TrgFamily", string)), be);
        if let Some(expr) = to_expr {
            to = to.with_expression(expr);
        }
        if let Some(expr) = from_expr {
            from = from.with_expression(expr);
        }
        RulePair::new(Arc::new(to), Arc::new(from))
    }

    fn text(name: &str, value: &str) -> ValueNode {
        ValueNode::new(name, Datatype::primitive("String")).with_occurrence(Scalar::from(value))
    }

    fn initialized(terminology: TerminologyService) -> Converter {
        let mut converter = Converter::new(context(terminology));
        converter.initialize(
            ModelKey::new("HL7", "CDA"),
            ModelKey::new("HL7", "FHIR"),
            ModelProperties::new(),
            ModelProperties::new(),
        );
        converter
    }

    #[test]
    fn test_clone_both_phases() {
        let mut converter = initialized(offline());
        let mut target = ValueNode::new("TrgFamily", Datatype::primitive("String"));

        let converted = converter
            .convert(&text("SrcFamily", "Lovelace"), &string_rules(None, None), &mut target)
            .unwrap();

        assert!(converted);
        assert_eq!(target.first(), Some(&Occurrence::Scalar(Scalar::from("Lovelace"))));
        assert_eq!(converter.business_values().len(), 1);
        assert_eq!(converter.business_values()[0].business_element, "FamilyName");
    }

    #[test]
    fn test_function_rule() {
        let mut converter = initialized(offline());
        let mut target = ValueNode::new("TrgFamily", Datatype::primitive("String"));

        converter
            .convert(
                &text("SrcFamily", "hopper"),
                &string_rules(Some("function:upper"), None),
                &mut target,
            )
            .unwrap();

        assert_eq!(target.first(), Some(&Occurrence::Scalar(Scalar::from("HOPPER"))));
    }

    #[test]
    fn test_failed_function_is_recorded() {
        let mut converter = initialized(offline());
        let mut target = ValueNode::new("TrgFamily", Datatype::primitive("String"));

        let converted = converter
            .convert(
                &text("SrcFamily", "hopper"),
                &string_rules(Some("function:missing"), None),
                &mut target,
            )
            .unwrap();

        assert!(!converted);
        assert_eq!(converter.issues().count(IssueKind::FunctionFailed), 1);
        assert!(converter.issues().issues()[0].message.contains("FamilyName"));
    }

    #[test]
    fn test_uninitialized_function_rule_is_configuration_error() {
        let mut converter = Converter::new(context(offline()));
        let mut target = ValueNode::new("TrgFamily", Datatype::primitive("String"));

        let err = converter
            .convert(
                &text("SrcFamily", "x"),
                &string_rules(Some("function:upper"), None),
                &mut target,
            )
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unrecognized_rule_stops_flow() {
        let mut converter = initialized(offline());
        let mut target = ValueNode::new("TrgFamily", Datatype::primitive("String"));

        let converted = converter
            .convert(&text("SrcFamily", "x"), &string_rules(Some("value = 'x'"), None), &mut target)
            .unwrap();

        assert!(!converted);
        assert!(target.occurrences().is_empty());
        assert_eq!(converter.issues().count(IssueKind::UnrecognizedRule), 1);
        assert!(!converter.issues().has_errors());
    }

    #[test]
    fn test_substitution_keeps_original_display() {
        let string = Datatype::primitive("String");
        let cd = Datatype::structured(
            "CD",
            vec![
                Field::new("code", string.clone()),
                Field::new("codeSystem", string.clone()),
                Field::new("displayName", string.clone()),
                Field::new("originalText", string),
            ],
        );
        let cache = Arc::new(TerminologyCache::new(8));
        cache.insert(
            CacheKey::new("ICD10", "A00", "SNOMED"),
            TransformCode::new("409709003", "SNOMED", "Cholera"),
        );
        let mut converter = initialized(TerminologyService::offline(cache));

        let be = Arc::new(BusinessElementRef::new("ProblemCode", cd.clone()).with_vocabulary("SNOMED"));
        let to = ConversionRule::new(Arc::new(SemanticElement::new("Problem", cd.clone())), be.clone())
            .with_resolver("ICD10");
        let from = ConversionRule::new(Arc::new(SemanticElement::new("Condition", cd.clone())), be);
        let rules = RulePair::new(Arc::new(to), Arc::new(from));

        let mut source = ValueNode::new("Problem", cd.clone());
        let instance = source.push_struct().unwrap();
        instance.replace_text("code", "A00");
        instance.replace_text("displayName", "Cholera due to Vibrio");

        let mut target = ValueNode::new("Condition", cd);
        assert!(converter.convert(&source, &rules, &mut target).unwrap());

        let converted = target.first().and_then(Occurrence::as_struct).unwrap();
        assert_eq!(converted.text("code").as_deref(), Some("409709003"));
        assert_eq!(converted.text("codeSystem").as_deref(), Some("SNOMED"));
        assert_eq!(converted.text("displayName").as_deref(), Some("Cholera"));
        assert_eq!(converted.text("originalText").as_deref(), Some("Cholera due to Vibrio"));
    }
}

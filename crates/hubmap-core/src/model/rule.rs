//! Semantic elements, business element references and conversion rules
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

use super::Datatype;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name handed to interpreters when a function rule carries no usable name
pub const INVALID_FUNCTION_NAME: &str = "invalidfunctionmapping";

const FUNCTION_PREFIXES: [&str; 2] = ["function", "datatypemap"];

/// A node in a message model's syntax tree, used for path reporting
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub location: String,
    pub parent: Option<Arc<SyntaxNode>>,
}

impl SyntaxNode {
    pub fn root(location: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            location: location.into(),
            parent: None,
        })
    }

    pub fn child(parent: &Arc<SyntaxNode>, location: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            location: location.into(),
            parent: Some(Arc::clone(parent)),
        })
    }

    /// Locations from the root down to this node, joined with `/`
    pub fn full_path(&self) -> String {
        let mut segments = vec![self.location.as_str()];
        let mut next = self.parent.as_deref();
        while let Some(node) = next {
            segments.push(node.location.as_str());
            next = node.parent.as_deref();
        }
        segments.reverse();
        segments.join("/")
    }
}

/// A named value slot within a specific message model
#[derive(Debug, Clone)]
pub struct SemanticElement {
    pub name: String,
    pub datatype: Arc<Datatype>,
    pub syntax_node: Option<Arc<SyntaxNode>>,
}

impl SemanticElement {
    pub fn new(name: impl Into<String>, datatype: Arc<Datatype>) -> Self {
        Self {
            name: name.into(),
            datatype,
            syntax_node: None,
        }
    }

    pub fn with_syntax_node(mut self, node: Arc<SyntaxNode>) -> Self {
        self.syntax_node = Some(node);
        self
    }

    /// Syntax path of this element, `"null"` when the element is not bound
    pub fn syntax_path(&self) -> String {
        self.syntax_node
            .as_ref()
            .map(|n| n.full_path())
            .unwrap_or_else(|| "null".to_string())
    }
}

/// The canonical, model-neutral concept a semantic element maps to
#[derive(Debug, Clone)]
pub struct BusinessElementRef {
    pub name: String,
    pub datatype: Arc<Datatype>,
    /// Identifier of the coded vocabulary values of this element belong to
    pub vocabulary: Option<String>,
}

impl BusinessElementRef {
    pub fn new(name: impl Into<String>, datatype: Arc<Datatype>) -> Self {
        Self {
            name: name.into(),
            datatype,
            vocabulary: None,
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: impl Into<String>) -> Self {
        self.vocabulary = Some(vocabulary.into());
        self
    }
}

/// How a conversion rule moves data, decided once when the rule is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpression {
    /// No expression: structural clone
    Clone,
    /// `function:<name>`: invoke a named interpreter function
    Function { name: String },
    /// An expression this engine does not know how to run
    Unrecognized { expression: String },
}

impl RuleExpression {
    /// Classify a raw rule expression
    pub fn parse(expression: Option<&str>) -> Self {
        let raw = match expression.map(str::trim) {
            None | Some("") => return RuleExpression::Clone,
            Some(raw) => raw,
        };

        let parts: Vec<&str> = raw.split(':').collect();
        let is_function = FUNCTION_PREFIXES
            .iter()
            .any(|p| parts[0].trim().eq_ignore_ascii_case(p));

        if !is_function || parts.len() == 1 {
            return RuleExpression::Unrecognized {
                expression: raw.to_string(),
            };
        }

        let name = match parts.as_slice() {
            [_, name] if !name.trim().is_empty() => name.trim().to_string(),
            _ => INVALID_FUNCTION_NAME.to_string(),
        };
        RuleExpression::Function { name }
    }

    pub fn is_clone(&self) -> bool {
        matches!(self, RuleExpression::Clone)
    }
}

impl fmt::Display for RuleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleExpression::Clone => write!(f, "<clone>"),
            RuleExpression::Function { name } => write!(f, "function:{}", name),
            RuleExpression::Unrecognized { expression } => f.write_str(expression),
        }
    }
}

/// Directed mapping between a semantic element and a business element reference
#[derive(Debug, Clone)]
pub struct ConversionRule {
    pub owner: Arc<SemanticElement>,
    pub business_element: Arc<BusinessElementRef>,
    pub expression: RuleExpression,
    /// External terminology-resolver identifier, i.e. the code system the
    /// semantic element's codes are expressed in
    pub resolver: Option<String>,
}

impl ConversionRule {
    pub fn new(owner: Arc<SemanticElement>, business_element: Arc<BusinessElementRef>) -> Self {
        Self {
            owner,
            business_element,
            expression: RuleExpression::Clone,
            resolver: None,
        }
    }

    pub fn with_expression(mut self, expression: &str) -> Self {
        self.expression = RuleExpression::parse(Some(expression));
        self
    }

    pub fn with_resolver(mut self, resolver: impl Into<String>) -> Self {
        self.resolver = Some(resolver.into());
        self
    }

    /// Both the rule and its business element name a code system
    pub fn has_terminology_transformation(&self) -> bool {
        let resolver = self.resolver.as_deref().unwrap_or_default();
        let vocabulary = self.business_element.vocabulary.as_deref().unwrap_or_default();
        !resolver.is_empty() && !vocabulary.is_empty()
    }

    /// Syntax path of the owning semantic element
    pub fn owner_path(&self) -> String {
        self.owner.syntax_path()
    }
}

/// The inbound and outbound rules of one conversion request
#[derive(Debug, Clone)]
pub struct RulePair {
    /// Source semantic element → business element
    pub to_business: Arc<ConversionRule>,
    /// Business element → target semantic element
    pub from_business: Arc<ConversionRule>,
}

impl RulePair {
    pub fn new(to_business: Arc<ConversionRule>, from_business: Arc<ConversionRule>) -> Self {
        Self {
            to_business,
            from_business,
        }
    }
}

/// Identity of a message model: its group plus the model name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub group: String,
    pub model: String,
}

impl ModelKey {
    pub fn new(group: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.model)
    }
}

/// Per-model key/value configuration passed to interpreter functions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelProperties(BTreeMap<String, String>);

impl ModelProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

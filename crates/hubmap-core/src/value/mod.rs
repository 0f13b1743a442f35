//! In-memory value trees
//!
//! A [`ValueNode`] is a named, typed slot holding an ordered list of
//! occurrences. Each occurrence is a discriminated union over the datatype
//! kinds, so a structure can never be confused with a scalar at compile time;
//! only a genuine disagreement between the data and its declared datatype is
//! left for the engine to detect at runtime.
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

use crate::model::{Datatype, EnumLiteral};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

/// Scalar payload of a simple datatype occurrence
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Binary(Vec<u8>),
}

impl Scalar {
    /// Empty strings count as no data
    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::String(s) if s.is_empty())
    }

    fn to_json(&self) -> Value {
        match self {
            Scalar::String(s) => json!(s),
            Scalar::Integer(i) => json!(i),
            Scalar::Decimal(d) => json!(d),
            Scalar::Boolean(b) => json!(b),
            Scalar::Binary(_) => json!(self.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Decimal(d) => write!(f, "{}", d),
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Binary(bytes) => bytes.iter().try_for_each(|b| write!(f, "{:02x}", b)),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Decimal(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

/// One occurrence of a value node
#[derive(Debug, Clone, PartialEq)]
pub enum Occurrence {
    Scalar(Scalar),
    Literal(EnumLiteral),
    Struct(StructInstance),
    Choice(ChoiceInstance),
}

impl Occurrence {
    pub fn is_empty(&self) -> bool {
        match self {
            Occurrence::Scalar(s) => s.is_empty(),
            Occurrence::Literal(_) => false,
            Occurrence::Struct(s) => s.is_empty(),
            Occurrence::Choice(c) => c.is_empty(),
        }
    }

    /// Short name of the runtime shape, used in diagnostics
    pub fn shape(&self) -> &'static str {
        match self {
            Occurrence::Scalar(_) => "scalar",
            Occurrence::Literal(_) => "literal",
            Occurrence::Struct(_) => "struct",
            Occurrence::Choice(_) => "choice",
        }
    }

    pub fn as_struct(&self) -> Option<&StructInstance> {
        match self {
            Occurrence::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut StructInstance> {
        match self {
            Occurrence::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Occurrence::Scalar(s) => Some(s),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Occurrence::Scalar(s) => s.to_json(),
            Occurrence::Literal(l) => json!({ "code": l.code, "name": l.name }),
            Occurrence::Struct(s) => s.to_json(),
            Occurrence::Choice(c) => match c.active() {
                Some(node) => {
                    let mut map = Map::new();
                    map.insert(node.name().to_string(), node.to_json());
                    Value::Object(map)
                }
                None => Value::Null,
            },
        }
    }
}

impl From<Scalar> for Occurrence {
    fn from(value: Scalar) -> Self {
        Occurrence::Scalar(value)
    }
}

/// An instance of a structured datatype, owning one node per field
#[derive(Debug, Clone, PartialEq)]
pub struct StructInstance {
    fields: Vec<ValueNode>,
}

impl StructInstance {
    /// Fresh instance with an empty node for every field of `datatype`
    pub fn for_datatype(datatype: &Datatype) -> Self {
        let fields = datatype
            .fields()
            .iter()
            .map(|f| ValueNode::new(f.name.clone(), Arc::clone(&f.datatype)))
            .collect();
        Self { fields }
    }

    pub fn fields(&self) -> &[ValueNode] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [ValueNode] {
        &mut self.fields
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&ValueNode> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut ValueNode> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    /// Text of the first occurrence of a simple field
    pub fn text(&self, name: &str) -> Option<String> {
        self.field(name)?
            .first()
            .and_then(Occurrence::as_scalar)
            .map(Scalar::to_string)
    }

    /// Replace the occurrences of a field with a single string
    ///
    /// Returns false when the structure has no such field.
    pub fn replace_text(&mut self, name: &str, value: &str) -> bool {
        match self.field_mut(name) {
            Some(node) => {
                node.set_occurrences(vec![Occurrence::Scalar(Scalar::from(value))]);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.iter().all(ValueNode::is_empty)
    }

    fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| (f.name.clone(), f.to_json()))
            .collect();
        Value::Object(map)
    }
}

/// An instance of a choice datatype, owning at most one active field
#[derive(Debug, Clone)]
pub struct ChoiceInstance {
    datatype: Arc<Datatype>,
    active: Option<Box<ValueNode>>,
}

impl ChoiceInstance {
    pub fn for_datatype(datatype: Arc<Datatype>) -> Self {
        Self {
            datatype,
            active: None,
        }
    }

    /// Activate the alternative called `name`, discarding any previous one
    ///
    /// Returns `None` when the choice has no such alternative.
    pub fn select(&mut self, name: &str) -> Option<&mut ValueNode> {
        let field = self.datatype.field(name)?;
        let node = ValueNode::new(field.name.clone(), Arc::clone(&field.datatype));
        self.active = Some(Box::new(node));
        self.active.as_deref_mut()
    }

    pub fn active(&self) -> Option<&ValueNode> {
        self.active.as_deref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ValueNode> {
        self.active.as_deref_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.active.as_ref().map_or(true, |n| n.is_empty())
    }
}

impl PartialEq for ChoiceInstance {
    fn eq(&self, other: &Self) -> bool {
        self.datatype.name() == other.datatype.name() && self.active == other.active
    }
}

/// A named, typed slot holding zero or more occurrences
#[derive(Debug, Clone)]
pub struct ValueNode {
    name: String,
    datatype: Option<Arc<Datatype>>,
    occurrences: Vec<Occurrence>,
}

impl ValueNode {
    pub fn new(name: impl Into<String>, datatype: Arc<Datatype>) -> Self {
        Self {
            name: name.into(),
            datatype: Some(datatype),
            occurrences: Vec::new(),
        }
    }

    /// A node whose datatype has not been resolved
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datatype: None,
            occurrences: Vec::new(),
        }
    }

    pub fn with_occurrence(mut self, occurrence: impl Into<Occurrence>) -> Self {
        self.occurrences.push(occurrence.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datatype(&self) -> Option<&Arc<Datatype>> {
        self.datatype.as_ref()
    }

    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    pub fn occurrences_mut(&mut self) -> &mut Vec<Occurrence> {
        &mut self.occurrences
    }

    pub fn push(&mut self, occurrence: impl Into<Occurrence>) {
        self.occurrences.push(occurrence.into());
    }

    pub fn set_occurrences(&mut self, occurrences: Vec<Occurrence>) {
        self.occurrences = occurrences;
    }

    pub fn clear(&mut self) {
        self.occurrences.clear();
    }

    pub fn first(&self) -> Option<&Occurrence> {
        self.occurrences.first()
    }

    pub fn first_mut(&mut self) -> Option<&mut Occurrence> {
        self.occurrences.first_mut()
    }

    /// Append a fresh instance of this node's structured datatype
    ///
    /// Returns `None` when the node is not structured.
    pub fn push_struct(&mut self) -> Option<&mut StructInstance> {
        let datatype = self.datatype.as_ref().filter(|dt| dt.is_struct())?;
        let instance = StructInstance::for_datatype(datatype);
        self.occurrences.push(Occurrence::Struct(instance));
        self.occurrences.last_mut().and_then(Occurrence::as_struct_mut)
    }

    /// Give an empty structured node one empty instance to populate
    pub fn seed_struct(&mut self) {
        if self.occurrences.is_empty() {
            self.push_struct();
        }
    }

    /// True when no occurrence carries any data
    pub fn is_empty(&self) -> bool {
        self.occurrences.iter().all(Occurrence::is_empty)
    }

    /// JSON rendering used by the audit stream
    pub fn to_json(&self) -> Value {
        match self.occurrences.as_slice() {
            [] => Value::Null,
            [single] => single.to_json(),
            many => Value::Array(many.iter().map(Occurrence::to_json).collect()),
        }
    }
}

impl PartialEq for ValueNode {
    fn eq(&self, other: &Self) -> bool {
        let same_type = match (&self.datatype, &other.datatype) {
            (Some(a), Some(b)) => a.name() == b.name(),
            (None, None) => true,
            _ => false,
        };
        same_type && self.name == other.name && self.occurrences == other.occurrences
    }
}

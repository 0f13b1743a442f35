//! Datatype metadata supplied by the message-model loader
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

use std::fmt;
use std::sync::Arc;

/// Flavour of a simple (scalar) datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleKind {
    /// Built-in primitive such as `String` or `Integer`
    Primitive,
    /// Restriction or alias of another simple type
    Derived,
    /// Opaque type owned by the surrounding platform
    External,
}

/// Closed classification every datatype falls into
#[derive(Debug, Clone)]
pub enum DatatypeKind {
    /// One scalar payload per occurrence
    Simple(SimpleKind),
    /// Payload is one literal of a fixed literal set
    Enumerated { literals: Vec<EnumLiteral> },
    /// Payload owns one instance of every field
    Structured { fields: Vec<Field> },
    /// Payload owns exactly one of the alternative fields
    Choice { fields: Vec<Field> },
}

/// A named datatype as declared by a message model or the business-element catalog
#[derive(Debug, Clone)]
pub struct Datatype {
    name: String,
    kind: DatatypeKind,
}

impl Datatype {
    /// Create a datatype from its parts
    pub fn new(name: impl Into<String>, kind: DatatypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn primitive(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name, DatatypeKind::Simple(SimpleKind::Primitive)))
    }

    pub fn derived(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name, DatatypeKind::Simple(SimpleKind::Derived)))
    }

    pub fn external(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name, DatatypeKind::Simple(SimpleKind::External)))
    }

    pub fn enumerated(name: impl Into<String>, literals: Vec<EnumLiteral>) -> Arc<Self> {
        Arc::new(Self::new(name, DatatypeKind::Enumerated { literals }))
    }

    pub fn structured(name: impl Into<String>, fields: Vec<Field>) -> Arc<Self> {
        Arc::new(Self::new(name, DatatypeKind::Structured { fields }))
    }

    pub fn choice(name: impl Into<String>, fields: Vec<Field>) -> Arc<Self> {
        Arc::new(Self::new(name, DatatypeKind::Choice { fields }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &DatatypeKind {
        &self.kind
    }

    pub fn is_simple(&self) -> bool {
        matches!(self.kind, DatatypeKind::Simple(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, DatatypeKind::Structured { .. })
    }

    pub fn is_choice(&self) -> bool {
        matches!(self.kind, DatatypeKind::Choice { .. })
    }

    pub fn is_enumerated(&self) -> bool {
        matches!(self.kind, DatatypeKind::Enumerated { .. })
    }

    /// Fields of a structured or choice datatype, empty for the other kinds
    pub fn fields(&self) -> &[Field] {
        match &self.kind {
            DatatypeKind::Structured { fields } | DatatypeKind::Choice { fields } => fields,
            _ => &[],
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// Literals of an enumerated datatype, empty for the other kinds
    pub fn literals(&self) -> &[EnumLiteral] {
        match &self.kind {
            DatatypeKind::Enumerated { literals } => literals,
            _ => &[],
        }
    }

    /// Resolve the literal carrying `code`
    pub fn literal_by_code(&self, code: &str) -> Option<&EnumLiteral> {
        self.literals().iter().find(|l| l.code == code)
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A named member of a structured or choice datatype
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub datatype: Arc<Datatype>,
}

impl Field {
    pub fn new(name: impl Into<String>, datatype: Arc<Datatype>) -> Self {
        Self {
            name: name.into(),
            datatype,
        }
    }
}

/// One literal of an enumerated datatype
///
/// Literals are matched across datatypes by `code`, never by name or position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumLiteral {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

impl EnumLiteral {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

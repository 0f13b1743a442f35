//! Read-only schema metadata consumed by the conversion engine
//!
//! The message-model loader builds these types; the engine never mutates them.

pub mod datatype;
pub mod rule;

pub use datatype::{Datatype, DatatypeKind, EnumLiteral, Field, SimpleKind};
pub use rule::{
    BusinessElementRef, ConversionRule, ModelKey, ModelProperties, RuleExpression, RulePair,
    SemanticElement, SyntaxNode, INVALID_FUNCTION_NAME,
};

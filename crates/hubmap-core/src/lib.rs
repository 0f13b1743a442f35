//! Hubmap Core - Conversion engine for hub-and-spoke semantic message mapping
//!
//! Values move from a source message model into a canonical business element
//! and from there into a target message model, so N models need 2N mappings
//! instead of N².
//!
//! # Main Components
//!
//! - **Model**: Read-only datatypes, semantic elements and conversion rules
//! - **Values**: Typed value trees with one occurrence shape per datatype kind
//! - **Engine**: Structural cloning, rule dispatch and the interpreter registry
//! - **Terminology**: Cached code-system translation with a FHIR client
//! - **Audit**: Optional JSON stream of business-element values
//!
//! # Example
//!
//! ```no_run
//! use hubmap_core::{Converter, EngineContext, ModelKey, ModelProperties, Result};
//!
//! fn example() -> Result<()> {
//!     let mut converter = Converter::new(EngineContext::from_env()?);
//!     converter.initialize(
//!         ModelKey::new("HL7", "CDA"),
//!         ModelKey::new("HL7", "FHIR"),
//!         ModelProperties::new(),
//!         ModelProperties::new(),
//!     );
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod terminology;
pub mod value;

// Re-export main types for convenience
pub use audit::{AuditRecord, AuditSink};
pub use config::TerminologyConfig;
pub use engine::{
    clone_value, CapturedValue, ConversionIssue, Converter, EngineContext, Interpreter,
    InterpreterFactory, InterpreterRegistry, IssueKind, IssueTracker, SourceArg, TargetArg,
};
pub use error::{Error, Result, Severity};
pub use model::{
    BusinessElementRef, ConversionRule, Datatype, DatatypeKind, EnumLiteral, Field, ModelKey,
    ModelProperties, RuleExpression, RulePair, SemanticElement, SimpleKind, SyntaxNode,
};
pub use terminology::{
    CacheKey, TerminologyCache, TerminologyService, TransformCode, TranslationClient,
};
pub use value::{ChoiceInstance, Occurrence, Scalar, StructInstance, ValueNode};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

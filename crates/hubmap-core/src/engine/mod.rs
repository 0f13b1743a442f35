//! Conversion engine
//!
//! This module contains the conversion logic for moving values between
//! message models through business elements.
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

pub mod clone;
pub mod dispatcher;
pub mod interpreter;
pub mod issues;

pub use clone::{clone_value, StructuralCloner};
pub use dispatcher::{CapturedValue, Converter, EngineContext};
pub use interpreter::{Interpreter, InterpreterFactory, InterpreterRegistry, SourceArg, TargetArg};
pub use issues::{ConversionIssue, IssueKind, IssueSite, IssueTracker};

//! Model-specific function interpreters and their process-wide registry
//!
//! Function rules (`function:<name>`) are executed by an [`Interpreter`]
//! bound to a message model. Interpreters are expensive to build and safe to
//! share, so the registry builds each one exactly once per [`ModelKey`] and
//! hands out shared references afterwards.
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

use crate::model::{ConversionRule, ModelKey, ModelProperties};
use crate::value::{Occurrence, StructInstance, ValueNode};
use crate::{Error, Result};
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Source argument handed to an interpreter function
#[derive(Debug, Clone, Copy)]
pub enum SourceArg<'a> {
    /// The whole node, used for simple datatypes
    Node(&'a ValueNode),
    /// The first occurrence of a structured or choice node
    Value(&'a Occurrence),
}

impl<'a> SourceArg<'a> {
    /// Pass the first occurrence for structured and choice nodes, else the node
    pub fn from_node(node: &'a ValueNode) -> Self {
        let structured = node
            .datatype()
            .is_some_and(|dt| dt.is_struct() || dt.is_choice());
        match node.first() {
            Some(first) if structured => SourceArg::Value(first),
            _ => SourceArg::Node(node),
        }
    }
}

/// Target argument handed to an interpreter function
///
/// Structured targets are written through [`TargetArg::instance`], which
/// exposes the first struct occurrence; everything else goes through the node.
#[derive(Debug)]
pub struct TargetArg<'a> {
    node: &'a mut ValueNode,
}

impl<'a> TargetArg<'a> {
    pub fn new(node: &'a mut ValueNode) -> Self {
        Self { node }
    }

    pub fn node(&mut self) -> &mut ValueNode {
        self.node
    }

    /// First struct occurrence of a structured target
    pub fn instance(&mut self) -> Option<&mut StructInstance> {
        if self.node.datatype().is_some_and(|dt| dt.is_struct()) {
            self.node.first_mut().and_then(Occurrence::as_struct_mut)
        } else {
            None
        }
    }
}

/// Executes named conversion functions for one message model
pub trait Interpreter: Send + Sync {
    /// Run `function` from `source` into `target`
    ///
    /// Returns false when the function does not exist or cannot convert the
    /// value. Implementations must not panic on bad data.
    fn execute(
        &self,
        function: &str,
        source: SourceArg<'_>,
        target: TargetArg<'_>,
        properties: &ModelProperties,
        rule: &ConversionRule,
    ) -> bool;
}

/// Builds the interpreter for a message model
pub trait InterpreterFactory: Send + Sync {
    fn create(&self, model: &ModelKey) -> Result<Arc<dyn Interpreter>>;
}

impl<F> InterpreterFactory for F
where
    F: Fn(&ModelKey) -> Result<Arc<dyn Interpreter>> + Send + Sync,
{
    fn create(&self, model: &ModelKey) -> Result<Arc<dyn Interpreter>> {
        self(model)
    }
}

/// Factory used until one is installed; knows no models
struct NoInterpreters;

impl InterpreterFactory for NoInterpreters {
    fn create(&self, model: &ModelKey) -> Result<Arc<dyn Interpreter>> {
        Err(Error::configuration(format!(
            "No interpreter factory installed for {}",
            model
        )))
    }
}

type Slot = Arc<OnceCell<Arc<dyn Interpreter>>>;

/// Thread-safe map from model identity to its interpreter
pub struct InterpreterRegistry {
    factory: Arc<dyn InterpreterFactory>,
    slots: RwLock<HashMap<ModelKey, Slot>>,
}

static GLOBAL_REGISTRY: Lazy<RwLock<Option<Arc<InterpreterRegistry>>>> =
    Lazy::new(|| RwLock::new(None));

impl InterpreterRegistry {
    pub fn new(factory: Arc<dyn InterpreterFactory>) -> Self {
        Self {
            factory,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Install the process-wide registry used by [`InterpreterRegistry::global`]
    pub fn install_global(registry: Arc<InterpreterRegistry>) {
        match GLOBAL_REGISTRY.write() {
            Ok(mut slot) => *slot = Some(registry),
            Err(poisoned) => *poisoned.into_inner() = Some(registry),
        }
    }

    /// The installed process-wide registry, or one that knows no models
    pub fn global() -> Arc<InterpreterRegistry> {
        let installed = match GLOBAL_REGISTRY.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        installed.unwrap_or_else(|| Arc::new(InterpreterRegistry::new(Arc::new(NoInterpreters))))
    }

    /// Return the interpreter for `model`, building it on first use
    ///
    /// Concurrent first requests for the same model run the factory once. A
    /// failed build is not remembered, so a later request retries.
    pub fn get_or_create(&self, model: &ModelKey) -> Result<Arc<dyn Interpreter>> {
        let slot = self.slot(model)?;
        let interpreter = slot.get_or_try_init(|| {
            log::debug!("Building interpreter for {}", model);
            self.factory.create(model).map_err(|e| match e {
                Error::Configuration { .. } => e,
                other => Error::Configuration {
                    message: format!("Unable to create interpreter for {}", model),
                    source: Some(anyhow::Error::new(other)),
                },
            })
        })?;
        Ok(Arc::clone(interpreter))
    }

    /// Number of models with a built interpreter
    pub fn len(&self) -> usize {
        match self.slots.read() {
            Ok(slots) => slots.values().filter(|s| s.get().is_some()).count(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, model: &ModelKey) -> Result<Slot> {
        if let Some(slot) = self
            .slots
            .read()
            .map_err(|_| Error::configuration("Interpreter registry lock poisoned"))?
            .get(model)
        {
            return Ok(Arc::clone(slot));
        }

        let mut slots = self
            .slots
            .write()
            .map_err(|_| Error::configuration("Interpreter registry lock poisoned"))?;
        Ok(Arc::clone(slots.entry(model.clone()).or_default()))
    }
}

impl std::fmt::Debug for InterpreterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterRegistry")
            .field("built", &self.len())
            .finish()
    }
}

//! Named, versioned units of work.

use std::fmt;

use anyhow::Result;

use crate::bundle::Bundle;
use crate::core::definition::Definition;

/// Handler shape shared by operations and sequences.
pub type Handler<IN, OUT, DEP> = Box<dyn Fn(&Bundle, &DEP, &IN) -> Result<OUT> + Send + Sync>;

/// Leaf unit of work, executed with [`crate::execute::execute_operation`].
pub struct Operation<IN, OUT, DEP> {
    def: Definition,
    handler: Handler<IN, OUT, DEP>,
}

impl<IN, OUT, DEP> Operation<IN, OUT, DEP> {
    pub fn new<F>(def: Definition, handler: F) -> Self
    where
        F: Fn(&Bundle, &DEP, &IN) -> Result<OUT> + Send + Sync + 'static,
    {
        Self {
            def,
            handler: Box::new(handler),
        }
    }

    pub fn def(&self) -> &Definition {
        &self.def
    }

    pub(crate) fn call(&self, bundle: &Bundle, deps: &DEP, input: &IN) -> Result<OUT> {
        (self.handler)(bundle, deps, input)
    }
}

impl<IN, OUT, DEP> fmt::Debug for Operation<IN, OUT, DEP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation").field("def", &self.def).finish()
    }
}

/// Composite unit of work whose handler executes further operations and
/// sequences, run with [`crate::execute::execute_sequence`].
pub struct Sequence<IN, OUT, DEP> {
    def: Definition,
    handler: Handler<IN, OUT, DEP>,
}

impl<IN, OUT, DEP> Sequence<IN, OUT, DEP> {
    pub fn new<F>(def: Definition, handler: F) -> Self
    where
        F: Fn(&Bundle, &DEP, &IN) -> Result<OUT> + Send + Sync + 'static,
    {
        Self {
            def,
            handler: Box::new(handler),
        }
    }

    pub fn def(&self) -> &Definition {
        &self.def
    }

    pub(crate) fn call(&self, bundle: &Bundle, deps: &DEP, input: &IN) -> Result<OUT> {
        (self.handler)(bundle, deps, input)
    }
}

impl<IN, OUT, DEP> fmt::Debug for Sequence<IN, OUT, DEP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence").field("def", &self.def).finish()
    }
}

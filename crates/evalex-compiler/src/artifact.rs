//! The executable artifact produced by compilation.

use std::fmt;
use std::sync::Arc;

use evalex_core::{MethodDef, TypeCatalog, TypeDescriptor};
use regex::Regex;

use crate::bytecode::{BytecodeChunk, ConstantPool};
use crate::emit::EmittedCode;

/// A compiled expression, ready to be evaluated any number of times.
///
/// Holds everything the code refers to: constants, the methods selected for
/// each call site, the patterns of `matches` operators, and the catalog used
/// for runtime type checks. It carries no mutable state and is
/// `Send + Sync`.
#[derive(Clone)]
pub struct CompiledExpression {
    chunk: BytecodeChunk,
    constants: ConstantPool,
    functions: Vec<Arc<MethodDef>>,
    regexes: Vec<Regex>,
    result_type: TypeDescriptor,
    catalog: Arc<dyn TypeCatalog>,
}

impl CompiledExpression {
    pub(crate) fn new(
        code: EmittedCode,
        result_type: TypeDescriptor,
        catalog: Arc<dyn TypeCatalog>,
    ) -> Self {
        Self {
            chunk: code.chunk,
            constants: code.constants,
            functions: code.functions,
            regexes: code.regexes,
            result_type,
            catalog,
        }
    }

    pub fn chunk(&self) -> &BytecodeChunk {
        &self.chunk
    }

    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    /// The call target at a `CallMethod` / `CallStatic` operand.
    pub fn function(&self, index: usize) -> Option<&Arc<MethodDef>> {
        self.functions.get(index)
    }

    pub fn functions(&self) -> &[Arc<MethodDef>] {
        &self.functions
    }

    /// The pattern at a `Matches` operand.
    pub fn regex(&self, index: usize) -> Option<&Regex> {
        self.regexes.get(index)
    }

    /// Static type of the value the expression produces.
    pub fn result_type(&self) -> &TypeDescriptor {
        &self.result_type
    }

    pub fn catalog(&self) -> &dyn TypeCatalog {
        self.catalog.as_ref()
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("result_type", &self.result_type)
            .field("code_len", &self.chunk.len())
            .field("constants", &self.constants.len())
            .field("functions", &self.functions.len())
            .field("regexes", &self.regexes.len())
            .finish_non_exhaustive()
    }
}

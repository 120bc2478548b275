//! Module-level declarations.

use super::expr::{BranchTarget, BranchTargetId, UntypedExpression};
use super::types::TypeId;
use std::collections::HashMap;
use std::fmt;

/// Largest memory a module may declare.
pub const MAX_MEMORY_BYTES: u64 = 1 << 32;

/// Module name used for the imports that back `memory_size`, `page_size` and
/// `resize_memory`.
pub const INTRINSICS_MODULE: &str = "wasm_intrinsics";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FunctionType {
    pub parameters: Vec<TypeId>,
    pub return_type: TypeId,
}

impl FunctionType {
    pub fn new(parameters: Vec<TypeId>, return_type: TypeId) -> Self {
        Self {
            parameters,
            return_type,
        }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}

/// A parameter or local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub ty: TypeId,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<String>,
    pub ty: FunctionType,
    /// Parameters first, then declared locals.
    pub locals: Vec<Variable>,
    pub parameter_local_indices: Vec<u32>,
    /// Filled in by the definitions pass.
    pub body: Option<UntypedExpression>,
    pub branch_targets: Vec<BranchTarget>,
}

impl Function {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            ty: FunctionType::new(Vec::new(), TypeId::Void),
            locals: Vec::new(),
            parameter_local_indices: Vec::new(),
            body: None,
            branch_targets: Vec::new(),
        }
    }

    pub fn branch_target(&self, id: BranchTargetId) -> Option<&BranchTarget> {
        self.branch_targets.get(id.0 as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionImport {
    pub ty: FunctionType,
    pub module: String,
    pub name: String,
}

/// Functions callable through `call_indirect`; all share `ty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionTable {
    pub ty: FunctionType,
    pub functions: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub base_address: u64,
    pub data: Vec<u8>,
}

impl DataSegment {
    pub fn end_address(&self) -> Option<u64> {
        self.base_address.checked_add(self.data.len() as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub functions: Vec<Function>,
    pub function_imports: Vec<FunctionImport>,
    pub function_tables: Vec<FunctionTable>,
    pub data_segments: Vec<DataSegment>,
    pub exports: HashMap<String, u32>,
    pub initial_memory_bytes: u64,
    pub max_memory_bytes: u64,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn export(&self, name: &str) -> Option<&Function> {
        self.exports.get(name).and_then(|&index| self.functions.get(index as usize))
    }

    /// Returns the index of the import `module.name`, adding it with `ty` if it
    /// isn't present yet.
    pub fn intern_import(&mut self, module: &str, name: &str, ty: FunctionType) -> u32 {
        if let Some(index) = self
            .function_imports
            .iter()
            .position(|import| import.module == module && import.name == name)
        {
            return index as u32;
        }
        self.function_imports.push(FunctionImport {
            ty,
            module: module.to_string(),
            name: name.to_string(),
        });
        (self.function_imports.len() - 1) as u32
    }
}

//! Module declarations.
//!
//! A module is parsed in two passes over its top-level forms. The first
//! records every function signature, import and the memory layout, so that a
//! body can call any function regardless of where it's declared; tables are
//! resolved once all functions are known. The second parses function bodies
//! and exports.

use super::error::{ErrorKind, ParseError};
use super::function::FunctionParser;
use super::sexpr::{read_all_with_limits, Node, NodeIt, NodeKind};
use super::symbols::{Keyword, SymbolKind};
use super::token::Locus;
use crate::ast::module::MAX_MEMORY_BYTES;
use crate::ast::{DataSegment, Function, FunctionImport, FunctionTable, FunctionType, Module, TypeId, Variable};
use crate::config::ParseLimits;
use log::{debug, trace};
use std::collections::HashMap;

/// Parses a source containing exactly one `(module ...)` form.
///
/// Parsing doesn't stop at the first problem; on failure every error found
/// is returned in source order of discovery.
///
/// ```
/// use kast::wat::parse_module;
///
/// let module = parse_module(r#"(module (func $id (param i32) (result i32) (get_local 0)) (export "id" $id))"#)
///     .unwrap();
/// assert_eq!(module.export("id").map(|f| f.ty.to_string()), Some("(i32) -> i32".to_string()));
/// ```
pub fn parse_module(source: &str) -> Result<Module, Vec<ParseError>> {
    parse_module_with_limits(source, &ParseLimits::default())
}

pub fn parse_module_with_limits(source: &str, limits: &ParseLimits) -> Result<Module, Vec<ParseError>> {
    let nodes = read_all_with_limits(source, limits).map_err(|e| vec![e])?;
    let mut it = NodeIt::new(&nodes, Locus::default());

    let node = match it.next() {
        Some(node) if node.head_keyword() == Some(Keyword::Module) => node,
        Some(node) => {
            let error = ParseError::at_node(ErrorKind::Malformed, "expected module declaration", node);
            return Err(vec![error]);
        }
        None => {
            let error = ParseError::new(ErrorKind::Malformed, "expected module declaration", it.locus());
            return Err(vec![error]);
        }
    };
    if !it.is_end() {
        let error = ParseError::at(ErrorKind::ExcessInput, "unexpected input following module declaration", &it);
        return Err(vec![error]);
    }

    let (module, errors) = parse_module_node(node, limits);
    if errors.is_empty() {
        Ok(module)
    } else {
        Err(errors)
    }
}

/// Parses an already-read `(module ...)` tree, returning whatever could be
/// built alongside the errors found.
pub fn parse_module_node(node: &Node, limits: &ParseLimits) -> (Module, Vec<ParseError>) {
    let mut cx = ModuleContext::new(*limits);

    let mut declarations = NodeIt::children_of(node).unwrap_or_else(|| NodeIt::new(&[], node.locus));
    if !declarations.next_if_keyword(Keyword::Module) {
        cx.record(ParseError::at_node(ErrorKind::Malformed, "expected module declaration", node));
        return (cx.module, cx.errors);
    }

    for declaration in declarations {
        cx.declare(declaration);
    }
    for declaration in declarations {
        if declaration.head_keyword() == Some(Keyword::Table) {
            cx.declare_table(declaration);
        }
    }

    let mut function_index = 0;
    for declaration in declarations {
        match declaration.head_keyword() {
            Some(Keyword::Func) => {
                cx.define_function(function_index, declaration);
                function_index += 1;
            }
            Some(Keyword::Export) => cx.define_export(declaration),
            _ => {}
        }
    }

    debug!(
        "parsed module: {} functions, {} imports, {} tables, {} segments, {} errors",
        cx.module.functions.len(),
        cx.module.function_imports.len(),
        cx.module.function_tables.len(),
        cx.module.data_segments.len(),
        cx.errors.len()
    );
    (cx.module, cx.errors)
}

/// The module under construction, its name bindings and the errors found so
/// far.
pub(crate) struct ModuleContext {
    pub(crate) module: Module,
    pub(crate) function_names: HashMap<String, u32>,
    pub(crate) import_names: HashMap<String, u32>,
    pub(crate) limits: ParseLimits,
    pub(crate) errors: Vec<ParseError>,
    has_memory: bool,
}

impl ModuleContext {
    fn new(limits: ParseLimits) -> Self {
        Self {
            module: Module::new(),
            function_names: HashMap::new(),
            import_names: HashMap::new(),
            limits,
            errors: Vec::new(),
            has_memory: false,
        }
    }

    fn record(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    fn expect_end(&mut self, it: &NodeIt<'_>, context: &str) {
        if !it.is_end() {
            let message = format!("unexpected input following {}", context);
            self.record(ParseError::at(ErrorKind::ExcessInput, message, it));
        }
    }

    // ------------------------------------------------------------------------
    // Declarations pass
    // ------------------------------------------------------------------------

    fn declare(&mut self, node: &Node) {
        let Some(mut it) = NodeIt::children_of(node) else {
            self.record(ParseError::at_node(ErrorKind::Malformed, "unrecognized declaration", node));
            return;
        };
        match it.next().and_then(Node::keyword) {
            Some(Keyword::Func) => self.declare_function(it),
            Some(Keyword::Import) => self.declare_import(it, node),
            Some(Keyword::Memory) => self.declare_memory(it, node),
            Some(Keyword::Export) | Some(Keyword::Table) => {}
            _ => self.record(ParseError::at_node(ErrorKind::Malformed, "unrecognized declaration", node)),
        }
    }

    fn declare_function(&mut self, mut it: NodeIt<'_>) {
        let index = self.module.functions.len() as u32;
        let name = it.peek().and_then(Node::name);
        if let Some(name) = name {
            if self.function_names.contains_key(name) {
                self.record(ParseError::at(ErrorKind::DuplicateDeclaration, "duplicate function name", &it));
            } else {
                self.function_names.insert(name.to_string(), index);
            }
            it.next();
        }

        let mut function = Function::new(name.map(str::to_string));
        self.parse_signature(&mut it, &mut function, true);
        self.module.functions.push(function);
    }

    fn declare_import(&mut self, mut it: NodeIt<'_>, node: &Node) {
        let name = it.peek().and_then(Node::name);
        if name.is_some() {
            it.next();
        }

        let Some(module) = parse_string(&mut it) else {
            let message = "expected import module name string";
            self.record(ParseError::at(ErrorKind::Malformed, message, &it));
            return;
        };
        let Some(field) = parse_string(&mut it) else {
            let message = "expected import function name string";
            self.record(ParseError::at(ErrorKind::Malformed, message, &it));
            return;
        };

        let mut signature = Function::new(None);
        self.parse_signature(&mut it, &mut signature, false);
        if !it.is_end() {
            let message = "expected param or result declaration";
            self.record(ParseError::at(ErrorKind::Malformed, message, &it));
        }

        let index = self.module.function_imports.len() as u32;
        self.module.function_imports.push(FunctionImport {
            ty: signature.ty,
            module,
            name: field,
        });
        if let Some(name) = name {
            if self.import_names.contains_key(name) {
                self.record(ParseError::at_node(ErrorKind::DuplicateDeclaration, "duplicate import name", node));
            } else {
                self.import_names.insert(name.to_string(), index);
            }
        }
    }

    /// Reads the `param`, `result` and (for functions) `local` declarations
    /// at the head of `it`, leaving it on the first node that isn't one.
    fn parse_signature(&mut self, it: &mut NodeIt<'_>, function: &mut Function, with_locals: bool) {
        let mut has_result = false;
        loop {
            if let Some(mut decl) = it.next_if_tree(Keyword::Param) {
                self.parse_variables(&mut decl, function, true);
            } else if let Some(mut decl) = it.next_if_tree(Keyword::Result) {
                if has_result {
                    let message = "duplicate result declaration";
                    self.record(ParseError::at(ErrorKind::DuplicateDeclaration, message, &decl));
                }
                has_result = true;
                match parse_type(&mut decl) {
                    Some(ty) => function.ty.return_type = ty,
                    None => self.record(ParseError::at(ErrorKind::Malformed, "expected type", &decl)),
                }
                self.expect_end(&decl, "result declaration");
            } else if !with_locals {
                break;
            } else if let Some(mut decl) = it.next_if_tree(Keyword::Local) {
                self.parse_variables(&mut decl, function, false);
            } else {
                break;
            }
        }
    }

    /// `(param $x i32)` declares one named variable; `(param i32 f64)` any
    /// number of anonymous ones.
    fn parse_variables(&mut self, decl: &mut NodeIt<'_>, function: &mut Function, parameters: bool) {
        if let Some(name) = decl.peek().and_then(Node::name) {
            decl.next();
            match parse_type(decl) {
                Some(ty) => self.add_variable(decl, function, Variable { ty, name: Some(name.to_string()) }, parameters),
                None => self.record(ParseError::at(ErrorKind::Malformed, "expected type", decl)),
            }
            self.expect_end(decl, "variable declaration");
            return;
        }

        while !decl.is_end() {
            match parse_type(decl) {
                Some(ty) => self.add_variable(decl, function, Variable { ty, name: None }, parameters),
                None => {
                    self.record(ParseError::at(ErrorKind::Malformed, "expected type", decl));
                    decl.next();
                }
            }
        }
    }

    fn add_variable(&mut self, decl: &NodeIt<'_>, function: &mut Function, variable: Variable, parameter: bool) {
        if variable.ty == TypeId::Void {
            let message = "variables can't have type void";
            self.record(ParseError::at(ErrorKind::Malformed, message, decl));
            return;
        }
        let index = function.locals.len() as u32;
        if parameter {
            function.parameter_local_indices.push(index);
            function.ty.parameters.push(variable.ty);
        }
        function.locals.push(variable);
    }

    fn declare_memory(&mut self, mut it: NodeIt<'_>, node: &Node) {
        if self.has_memory {
            self.record(ParseError::at_node(ErrorKind::DuplicateDeclaration, "duplicate memory declaration", node));
            return;
        }
        self.has_memory = true;

        let Some(initial) = parse_u64(&mut it) else {
            let message = "expected initial memory size integer";
            self.record(ParseError::at(ErrorKind::Malformed, message, &it));
            return;
        };
        let max = parse_u64(&mut it).unwrap_or(initial);

        if max > MAX_MEMORY_BYTES {
            let message = "maximum memory size must be <=2^32 bytes";
            self.record(ParseError::at_node(ErrorKind::StructuralConstraintViolation, message, node));
        }
        if initial > max {
            let message = "initial memory size must be <= maximum memory size";
            self.record(ParseError::at_node(ErrorKind::StructuralConstraintViolation, message, node));
        }
        self.module.initial_memory_bytes = initial;
        self.module.max_memory_bytes = max;

        while let Some(segment) = it.peek() {
            match it.next_if_tree(Keyword::Segment) {
                Some(segment_it) => self.declare_segment(segment_it, segment, initial),
                None => {
                    self.record(ParseError::at_node(ErrorKind::Malformed, "expected segment declaration", segment));
                    it.next();
                }
            }
        }
    }

    fn declare_segment(&mut self, mut it: NodeIt<'_>, node: &Node, initial_memory_bytes: u64) {
        let Some(base_address) = parse_u64(&mut it) else {
            let message = "expected segment base address integer";
            self.record(ParseError::at(ErrorKind::Malformed, message, &it));
            return;
        };
        let Some(data) = it.peek().and_then(Node::string).map(<[u8]>::to_vec) else {
            self.record(ParseError::at(ErrorKind::Malformed, "expected segment data string", &it));
            return;
        };
        it.next();
        self.expect_end(&it, "segment declaration");

        let segment = DataSegment { base_address, data };
        if segment.end_address().map_or(true, |end| end > initial_memory_bytes) {
            let message = "data segment bounds aren't contained by initial memory size";
            self.record(ParseError::at_node(ErrorKind::StructuralConstraintViolation, message, node));
            return;
        }
        self.module.data_segments.push(segment);
    }

    fn declare_table(&mut self, node: &Node) {
        let Some(mut it) = NodeIt::children_of(node) else { return };
        it.next();

        if it.is_end() {
            let message = "function table must contain at least 1 function";
            self.record(ParseError::at_node(ErrorKind::StructuralConstraintViolation, message, node));
        }

        let mut functions = Vec::new();
        let mut table_type: Option<FunctionType> = None;
        while let Some(member) = it.peek() {
            let count = self.module.functions.len();
            let Some(index) = parse_name_or_index(&mut it, &self.function_names, count) else {
                let message = "expected function name or index";
                self.record(ParseError::at_node(ErrorKind::UnresolvedSymbol, message, member));
                it.next();
                functions.push(0);
                continue;
            };
            functions.push(index);

            let Some(function_type) = self.module.functions.get(index as usize).map(|f| f.ty.clone()) else {
                continue;
            };
            if table_type.is_none() {
                table_type = Some(function_type);
            } else if table_type.as_ref() != Some(&function_type) {
                let message = "function table must only contain functions of a single type";
                self.record(ParseError::at_node(ErrorKind::StructuralConstraintViolation, message, member));
            }
        }

        self.module.function_tables.push(FunctionTable {
            ty: table_type.unwrap_or_else(|| FunctionType::new(Vec::new(), TypeId::Void)),
            functions,
        });
    }

    // ------------------------------------------------------------------------
    // Definitions pass
    // ------------------------------------------------------------------------

    fn define_function(&mut self, index: u32, node: &Node) {
        let Some(mut it) = NodeIt::children_of(node) else { return };
        it.next();
        if it.peek().and_then(Node::name).is_some() {
            it.next();
        }
        while [Keyword::Param, Keyword::Result, Keyword::Local]
            .into_iter()
            .any(|keyword| it.next_if_tree(keyword).is_some())
        {}

        let (body, branch_targets) = FunctionParser::new(self, index, node).parse_body(it);
        trace!("parsed body of function {}: {} branch targets", index, branch_targets.len());
        if let Some(function) = self.module.functions.get_mut(index as usize) {
            function.body = Some(body);
            function.branch_targets = branch_targets;
        }
    }

    fn define_export(&mut self, node: &Node) {
        let Some(mut it) = NodeIt::children_of(node) else { return };
        it.next();

        let Some(name) = parse_string(&mut it) else {
            self.record(ParseError::at(ErrorKind::Malformed, "expected export name string", &it));
            return;
        };
        let count = self.module.functions.len();
        let Some(index) = parse_name_or_index(&mut it, &self.function_names, count) else {
            let message = "expected function name or index";
            self.record(ParseError::at(ErrorKind::UnresolvedSymbol, message, &it));
            return;
        };
        self.expect_end(&it, "export declaration");
        self.module.exports.insert(name, index);
    }
}

// ============================================================================
// Atoms
// ============================================================================

fn parse_type(it: &mut NodeIt<'_>) -> Option<TypeId> {
    match it.peek()?.symbol_kind()? {
        SymbolKind::Type(ty) => {
            it.next();
            Some(ty)
        }
        _ => None,
    }
}

fn parse_u64(it: &mut NodeIt<'_>) -> Option<u64> {
    match it.peek()?.kind {
        NodeKind::UnsignedInt(value) => {
            it.next();
            Some(value)
        }
        _ => None,
    }
}

fn parse_string(it: &mut NodeIt<'_>) -> Option<String> {
    let bytes = it.peek()?.string()?;
    it.next();
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// An index below `count`; consumed only if valid.
pub(crate) fn parse_index(it: &mut NodeIt<'_>, count: usize) -> Option<u32> {
    let index = match it.peek()?.kind {
        NodeKind::UnsignedInt(index) if index < count as u64 => index as u32,
        _ => return None,
    };
    it.next();
    Some(index)
}

/// A `$name` bound in `names`, or an index below `count`; consumed only if
/// it resolves.
pub(crate) fn parse_name_or_index(it: &mut NodeIt<'_>, names: &HashMap<String, u32>, count: usize) -> Option<u32> {
    match it.peek()?.name() {
        Some(name) => {
            let index = names.get(name).copied()?;
            it.next();
            Some(index)
        }
        None => parse_index(it, count),
    }
}

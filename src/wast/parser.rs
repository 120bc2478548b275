//! Parser for test scripts.
//!
//! Every `(module ...)` in the file is parsed first, so a directive may
//! target a module defined after it. Directives are then resolved against the
//! completed module list: an export name is looked up in each module in
//! order and the first one defining it wins.

use super::command::{File, Invoke, TestDirective};
use super::values::{Exception, ExceptionCause, Value};
use crate::ast::{TypeClassId, TypeId};
use crate::config::ParseLimits;
use crate::wat::coerce::mismatch_message;
use crate::wat::{
    parse_module_node, read_all_with_limits, ErrorKind, Keyword, Locus, Node, NodeIt, NodeKind, Opcode, ParseError,
    SymbolKind,
};
use log::{debug, warn};

/// Parses a test script with the default limits.
pub fn parse_file(source: &str) -> File {
    parse_file_with_limits(source, &ParseLimits::default())
}

pub fn parse_file_with_limits(source: &str, limits: &ParseLimits) -> File {
    let mut file = File::default();
    let nodes = match read_all_with_limits(source, limits) {
        Ok(nodes) => nodes,
        Err(error) => {
            file.errors.push(error);
            return file;
        }
    };
    let top_level = NodeIt::new(&nodes, Locus::default());

    for node in top_level {
        if node.head_keyword() == Some(Keyword::Module) {
            let (module, errors) = parse_module_node(node, limits);
            file.modules.push(module);
            file.errors.extend(errors);
        }
    }
    file.module_tests.resize_with(file.modules.len(), Vec::new);

    for node in top_level {
        let Some(mut it) = NodeIt::children_of(node) else {
            debug!("{}: ignoring top-level {}", node.locus, node.describe());
            continue;
        };
        let directive = match it.next().and_then(Node::keyword) {
            Some(Keyword::Module) => continue,
            Some(Keyword::Invoke) => {
                parse_invoke(&mut file, node).map(|(module, invoke)| (module, TestDirective::Invoke(invoke)))
            }
            Some(Keyword::AssertReturn) => parse_assert_return(&mut file, it, node.locus),
            Some(Keyword::AssertReturnNan) => parse_assert_return_nan(&mut file, it, node.locus),
            Some(Keyword::AssertTrap) => parse_assert_trap(&mut file, it, node.locus),
            _ => {
                debug!("{}: ignoring top-level {}", node.locus, node.describe());
                continue;
            }
        };
        if let Some((module, directive)) = directive {
            file.module_tests[module].push(directive);
        }
    }

    debug!(
        "parsed script: {} modules, {} directives, {} errors",
        file.modules.len(),
        file.module_tests.iter().map(Vec::len).sum::<usize>(),
        file.errors.len()
    );
    file
}

// ============================================================================
// Directives
// ============================================================================

/// `(invoke "name" args...)`. Returns the target module's index with the
/// invoke.
fn parse_invoke(file: &mut File, node: &Node) -> Option<(usize, Invoke)> {
    let mut it = match NodeIt::children_of(node) {
        Some(it) if node.head_keyword() == Some(Keyword::Invoke) => it,
        _ => {
            file.errors
                .push(ParseError::at_node(ErrorKind::Malformed, "expected invoke expression", node));
            return None;
        }
    };
    it.next();

    let name_it = it;
    let Some(name) = it.next().and_then(Node::string) else {
        file.errors
            .push(ParseError::at(ErrorKind::Malformed, "expected export name string", &name_it));
        return None;
    };
    let name = String::from_utf8_lossy(name);

    let mut exporters = file
        .modules
        .iter()
        .enumerate()
        .filter_map(|(index, module)| Some((index, *module.exports.get(name.as_ref())?)));
    let Some((module, function)) = exporters.next() else {
        let message = "couldn't find export with this name";
        file.errors.push(ParseError::at(ErrorKind::UnresolvedSymbol, message, &name_it));
        return None;
    };
    if exporters.next().is_some() {
        warn!(
            "{}: more than one module exports \"{}\"; invoking the one in module {}",
            node.locus, name, module
        );
    }

    let parameters = file.modules[module]
        .functions
        .get(function as usize)
        .map(|f| f.ty.parameters.clone())
        .unwrap_or_default();
    let arguments = parameters
        .into_iter()
        .map(|ty| parse_value(&mut file.errors, &mut it, ty, "invoke parameter"))
        .collect::<Option<Vec<_>>>()?;

    if !it.is_end() {
        let message = "unexpected input following invoke parameters";
        file.errors.push(ParseError::at(ErrorKind::ExcessInput, message, &it));
        return None;
    }

    Some((
        module,
        Invoke {
            function,
            arguments,
            locus: node.locus,
        },
    ))
}

/// The invoke heading an assertion.
fn next_invoke(file: &mut File, it: &mut NodeIt<'_>) -> Option<(usize, Invoke)> {
    match it.next() {
        Some(node) => parse_invoke(file, node),
        None => {
            file.errors
                .push(ParseError::at(ErrorKind::Malformed, "expected invoke expression", it));
            None
        }
    }
}

fn expect_end(file: &mut File, it: &NodeIt<'_>, context: &str) -> Option<()> {
    if it.is_end() {
        return Some(());
    }
    let message = format!("unexpected input following {}", context);
    file.errors.push(ParseError::at(ErrorKind::ExcessInput, message, it));
    None
}

/// `(assert_return (invoke ...) value)`. For a void function the value may be
/// omitted; if given it is checked but the expected result is still `none`.
fn parse_assert_return(file: &mut File, mut it: NodeIt<'_>, locus: Locus) -> Option<(usize, TestDirective)> {
    let (module, invoke) = next_invoke(file, &mut it)?;

    let return_type = file.modules[module]
        .functions
        .get(invoke.function as usize)
        .map_or(TypeId::Void, |f| f.ty.return_type);
    let value = if return_type == TypeId::Void {
        if let Some(ty) = it.peek().and_then(const_type) {
            parse_value(&mut file.errors, &mut it, ty, "assert_return expected value")?;
            debug!("{}: ignoring expected value of a void function", locus);
        }
        Value::None
    } else {
        parse_value(&mut file.errors, &mut it, return_type, "assert_return expected value")?
    };
    expect_end(file, &it, "assert_return expected value")?;

    Some((module, TestDirective::Assert { invoke, value, locus }))
}

fn parse_assert_return_nan(file: &mut File, mut it: NodeIt<'_>, locus: Locus) -> Option<(usize, TestDirective)> {
    let (module, invoke) = next_invoke(file, &mut it)?;
    expect_end(file, &it, "assert_return_nan invoke")?;
    Some((module, TestDirective::AssertNaN { invoke, locus }))
}

/// `(assert_trap (invoke ...) "reason")`, expecting an exception whose cause
/// is derived from the reason.
fn parse_assert_trap(file: &mut File, mut it: NodeIt<'_>, locus: Locus) -> Option<(usize, TestDirective)> {
    let (module, invoke) = next_invoke(file, &mut it)?;

    let message_it = it;
    let Some(message) = it.next().and_then(Node::string) else {
        file.errors
            .push(ParseError::at(ErrorKind::Malformed, "expected trap message", &message_it));
        return None;
    };
    expect_end(file, &it, "assert_trap message")?;

    let cause = ExceptionCause::from_trap_message(&String::from_utf8_lossy(message));
    let value = Value::Exception(Exception { cause });
    Some((module, TestDirective::Assert { invoke, value, locus }))
}

// ============================================================================
// Values
// ============================================================================

/// Parses `(const.<ty> literal)` as a value of `expected`. An integer
/// constant stands for a `bool` by comparison with zero.
fn parse_value(errors: &mut Vec<ParseError>, it: &mut NodeIt<'_>, expected: TypeId, context: &str) -> Option<Value> {
    let Some(node) = it.next() else {
        errors.push(ParseError::at(ErrorKind::Malformed, "expected const expression", it));
        return None;
    };
    let ty = match const_type(node) {
        Some(ty) => ty,
        _ => {
            errors.push(ParseError::at_node(ErrorKind::Malformed, "expected const expression", node));
            return None;
        }
    };

    let bool_from_int = expected == TypeId::Bool && ty.is_class(TypeClassId::Int);
    if ty != expected && !bool_from_int {
        let message = mismatch_message(expected, ty, context);
        errors.push(ParseError::at_node(ErrorKind::TypeMismatch, message, node));
        return None;
    }

    let mut literal = NodeIt::children_of(node)?;
    literal.next();
    let value = match literal.peek().map(|node| &node.kind) {
        Some(NodeKind::UnsignedInt(bits)) if ty.is_class(TypeClassId::Int) => Value::from_bits(ty, *bits),
        Some(NodeKind::SignedInt(value)) if ty.is_class(TypeClassId::Int) => Value::from_bits(ty, *value as u64),
        Some(NodeKind::Float(lit)) if ty == TypeId::F32 => Some(Value::F32(lit.to_f32())),
        Some(NodeKind::Float(lit)) if ty == TypeId::F64 => Some(Value::F64(lit.to_f64())),
        Some(NodeKind::UnsignedInt(value)) if ty == TypeId::F32 => Some(Value::F32(*value as f32)),
        Some(NodeKind::UnsignedInt(value)) if ty == TypeId::F64 => Some(Value::F64(*value as f64)),
        Some(NodeKind::SignedInt(value)) if ty == TypeId::F32 => Some(Value::F32(*value as f32)),
        Some(NodeKind::SignedInt(value)) if ty == TypeId::F64 => Some(Value::F64(*value as f64)),
        _ => None,
    };
    let Some(value) = value else {
        let message = if ty.is_class(TypeClassId::Int) {
            "const: expected integer"
        } else {
            "const: expected floating point number"
        };
        errors.push(ParseError::at(ErrorKind::Malformed, message, &literal));
        return None;
    };
    literal.next();
    if !literal.is_end() {
        errors.push(ParseError::at(ErrorKind::ExcessInput, "unexpected input following const", &literal));
    }

    Some(match value {
        Value::I8(bits) if bool_from_int => Value::Bool(bits != 0),
        Value::I16(bits) if bool_from_int => Value::Bool(bits != 0),
        Value::I32(bits) if bool_from_int => Value::Bool(bits != 0),
        Value::I64(bits) if bool_from_int => Value::Bool(bits != 0),
        value => value,
    })
}

/// The type of a `(const.<ty> ...)` node.
fn const_type(node: &Node) -> Option<TypeId> {
    let head = NodeIt::children_of(node)?.next()?;
    match head.symbol_kind()? {
        SymbolKind::Op(Opcode::Const(ty)) => Some(ty),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDER: &str = r#"
        (module
            (func $add (param i32 i32) (result i32) (add.i32 (get_local 0) (get_local 1)))
            (func $half (param f64) (result f64) (div.f64 (get_local 0) (const.f64 2)))
            (func $tick)
            (export "add" $add)
            (export "half" $half)
            (export "tick" $tick))
    "#;

    fn script(directives: &str) -> File {
        parse_file(&format!("{}\n{}", ADDER, directives))
    }

    fn only_directive(file: &File) -> &TestDirective {
        assert!(file.is_valid(), "{:#?}", file.errors);
        let directives: Vec<_> = file.directives().collect();
        assert_eq!(directives.len(), 1);
        directives[0].1
    }

    #[test]
    fn invoke_with_arguments() {
        let file = script("(invoke \"add\" (const.i32 1) (const.i32 -2))");
        let TestDirective::Invoke(invoke) = only_directive(&file) else { panic!("expected invoke") };
        assert_eq!(invoke.function, 0);
        assert_eq!(invoke.arguments, [Value::I32(1), Value::I32(u32::MAX - 1)]);
    }

    #[test]
    fn assert_return_value() {
        let file = script("(assert_return (invoke \"half\" (const.f64 3)) (const.f64 1.5))");
        let TestDirective::Assert { invoke, value, .. } = only_directive(&file) else { panic!("expected assert") };
        assert_eq!(invoke.arguments, [Value::F64(3.0)]);
        assert_eq!(*value, Value::F64(1.5));
    }

    #[test]
    fn assert_return_void() {
        let file = script("(assert_return (invoke \"tick\"))");
        assert!(matches!(only_directive(&file), TestDirective::Assert { value: Value::None, .. }));

        let file = script("(assert_return (invoke \"tick\") (const.i32 0))");
        assert!(matches!(only_directive(&file), TestDirective::Assert { value: Value::None, .. }));
    }

    #[test]
    fn assert_return_nan() {
        let file = script("(assert_return_nan (invoke \"half\" (const.f64 nan)))");
        assert!(matches!(only_directive(&file), TestDirective::AssertNaN { .. }));
    }

    #[test]
    fn assert_trap_maps_reason() {
        let file = script("(assert_trap (invoke \"add\" (const.i32 0) (const.i32 0)) \"runtime: integer divide by zero\")");
        let TestDirective::Assert { value, .. } = only_directive(&file) else { panic!("expected assert") };
        assert_eq!(
            *value,
            Value::Exception(Exception {
                cause: ExceptionCause::IntegerDivideByZeroOrIntegerOverflow
            })
        );
    }

    #[test]
    fn directive_errors() {
        let cases = [
            ("(invoke \"nope\")", ErrorKind::UnresolvedSymbol),
            ("(invoke $add)", ErrorKind::Malformed),
            ("(invoke \"add\" (const.i32 1))", ErrorKind::Malformed),
            ("(invoke \"add\" (const.i32 1) (const.i32 2) (const.i32 3))", ErrorKind::ExcessInput),
            ("(invoke \"add\" (const.i32 1) (const.i64 2))", ErrorKind::TypeMismatch),
            ("(invoke \"add\" (const.i32 1) (add.i32 1 2))", ErrorKind::Malformed),
            ("(invoke \"half\" (const.f64 $x))", ErrorKind::Malformed),
            ("(assert_return)", ErrorKind::Malformed),
            ("(assert_return (invoke \"tick\") (const.i32 0) (const.i32 1))", ErrorKind::ExcessInput),
            ("(assert_return (invoke \"tick\") (const.i32 $x))", ErrorKind::Malformed),
            ("(assert_trap (invoke \"tick\"))", ErrorKind::Malformed),
            ("(assert_return_nan (invoke \"half\" (const.f64 0)) (const.f64 0))", ErrorKind::ExcessInput),
        ];
        for (source, kind) in cases {
            let file = script(source);
            assert_eq!(file.errors.len(), 1, "{}: {:#?}", source, file.errors);
            assert_eq!(file.errors[0].kind, kind, "{}", source);
            assert_eq!(file.directives().count(), 0, "{}", source);
        }
    }

    #[test]
    fn first_module_exporting_a_name_wins() {
        let file = parse_file(
            r#"
            (assert_return (invoke "f") (const.i32 1))
            (module (func (result i32) (const.i32 1)) (export "f" 0))
            (module (func (result i64) (const.i64 2)) (export "f" 0) (export "g" 0))
            (assert_return (invoke "g") (const.i64 2))
            "#,
        );
        assert!(file.is_valid(), "{:#?}", file.errors);
        assert_eq!(file.module_tests[0].len(), 1);
        assert_eq!(file.module_tests[1].len(), 1);
    }

    #[test]
    fn integer_constants_stand_for_bools() {
        let file = parse_file(
            r#"(module (func (param i32) (result bool) (get_local 0)) (export "f" 0))
               (assert_return (invoke "f" (const.i32 5)) (const.i32 1))"#,
        );
        let TestDirective::Assert { value, .. } = only_directive(&file) else { panic!("expected assert") };
        assert_eq!(*value, Value::Bool(true));
    }

    #[test]
    fn module_errors_are_collected() {
        let file = parse_file("(module (func (call 3))) (module (func (result i32)))");
        assert_eq!(file.modules.len(), 2);
        assert_eq!(file.errors.len(), 2);
        assert!(!file.is_valid());
    }

    #[test]
    fn unbalanced_input_is_a_single_error() {
        let file = parse_file("(module (func)");
        assert_eq!(file.errors.len(), 1);
        assert!(file.modules.is_empty());
    }

    #[test]
    fn other_top_level_forms_are_ignored() {
        let file = script("(register \"m\") 42");
        assert!(file.is_valid());
        assert_eq!(file.directives().count(), 0);
    }
}

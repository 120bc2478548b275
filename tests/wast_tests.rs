#[cfg(test)]
mod tests {
    use kast::ast::TypeId;
    use kast::wast::{parse_file, Exception, ExceptionCause, File, TestDirective, Value};
    use kast::wat::ErrorKind;
    use rstest::rstest;
    use std::path::PathBuf;

    fn load(path: &PathBuf) -> File {
        let source = std::fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
        parse_file(&source)
    }

    #[rstest]
    fn fixtures_are_valid(#[files("tests/fixtures/*.wast")] path: PathBuf) {
        let file = load(&path);
        assert!(file.is_valid(), "{}: {:#?}", path.display(), file.errors);
        assert!(!file.modules.is_empty(), "{}", path.display());
        assert_eq!(file.module_tests.len(), file.modules.len());

        for (module, directive) in file.directives() {
            let invoke = directive.invoke();
            let function = file.modules[module]
                .functions
                .get(invoke.function as usize)
                .unwrap_or_else(|| panic!("{}: invoke of missing function", invoke.locus));
            let argument_types: Vec<_> = invoke.arguments.iter().map(Value::ty).collect();
            assert_eq!(argument_types, function.ty.parameters, "{}", invoke.locus);

            if let TestDirective::Assert { value, .. } = directive {
                match value {
                    Value::Exception(_) => {}
                    value => assert_eq!(value.ty(), function.ty.return_type, "{}", invoke.locus),
                }
            }
        }
    }

    #[test]
    fn directive_counts() {
        let file = load(&PathBuf::from("tests/fixtures/memory.wast"));
        assert_eq!(file.modules.len(), 2);
        assert_eq!(file.module_tests[0].len(), 6);
        assert_eq!(file.module_tests[1].len(), 1);
    }

    #[test]
    fn traps_carry_their_cause() {
        let file = load(&PathBuf::from("tests/fixtures/arithmetic.wast"));
        let causes: Vec<_> = file
            .directives()
            .filter_map(|(_, directive)| match directive {
                TestDirective::Assert {
                    value: Value::Exception(Exception { cause }),
                    ..
                } => Some(*cause),
                _ => None,
            })
            .collect();
        assert_eq!(
            causes,
            [
                ExceptionCause::IntegerDivideByZeroOrIntegerOverflow,
                ExceptionCause::IntegerDivideByZeroOrIntegerOverflow
            ]
        );
    }

    #[test]
    fn assert_trap_on_divide() {
        let file = parse_file(
            r#"(module (func $f (result i32) (div_s.i32 (const.i32 1) (const.i32 0))) (export "f" $f))
               (assert_trap (invoke "f") "runtime: integer divide by zero")"#,
        );
        assert!(file.is_valid(), "{:#?}", file.errors);
        let directives: Vec<_> = file.directives().collect();
        assert_eq!(directives.len(), 1);
        let (module, TestDirective::Assert { invoke, value, .. }) = directives[0] else {
            panic!("expected assert")
        };
        assert_eq!(module, 0);
        assert_eq!(invoke.function, 0);
        assert!(invoke.arguments.is_empty());
        assert_eq!(
            *value,
            Value::Exception(Exception {
                cause: ExceptionCause::IntegerDivideByZeroOrIntegerOverflow
            })
        );
    }

    #[rstest]
    #[case(r#"(invoke "missing")"#, ErrorKind::UnresolvedSymbol)]
    #[case(r#"(invoke "id" (const.f32 1))"#, ErrorKind::TypeMismatch)]
    #[case(r#"(assert_return (invoke "id" (const.i64 1)) (const.i64 1) (const.i64 2))"#, ErrorKind::ExcessInput)]
    #[case(r#"(assert_trap (invoke "id" (const.i64 1)) 42)"#, ErrorKind::Malformed)]
    fn bad_directives(#[case] directive: &str, #[case] kind: ErrorKind) {
        let source = format!(
            r#"(module (func $id (param i64) (result i64) (get_local 0)) (export "id" $id)) {}"#,
            directive
        );
        let file = parse_file(&source);
        assert_eq!(file.errors.len(), 1, "{:#?}", file.errors);
        assert_eq!(file.errors[0].kind, kind);
        assert_eq!(file.directives().count(), 0);
        assert_eq!(file.modules[0].functions[0].ty.return_type, TypeId::I64);
    }
}

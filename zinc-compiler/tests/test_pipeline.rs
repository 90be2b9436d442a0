// End-to-end pipeline: parse, analyze, emit, write the artifacts a
// driver would write.

use zinc_compiler::CompileError;

#[test]
fn test_compile_writes_buildable_artifact_set() {
    let src = r#"class Greeter { var name: string }
func greet(g: Greeter) { "hello " + g.name }
func main() {
    var g = Greeter(name: "zinc")
    print(greet(g))
    0
}"#;
    let compiled = zinc_compiler::compile_source(src, "demo.zn", "demo").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let c_path = dir.path().join("demo.c");
    let h_path = dir.path().join("demo.h");
    std::fs::write(&c_path, &compiled.code.unit).unwrap();
    std::fs::write(&h_path, &compiled.code.header).unwrap();
    let runtime = zinc_runtime::write_runtime_header(dir.path()).unwrap();

    assert!(c_path.exists());
    assert!(h_path.exists());
    assert!(runtime.exists());

    // The generated pieces reference each other by the names on disk.
    assert!(compiled.code.unit.contains("#include \"demo.h\""));
    assert!(compiled
        .code
        .header
        .contains(&format!("#include \"{}\"", zinc_runtime::RUNTIME_HEADER_NAME)));
}

#[test]
fn test_semantic_failure_reports_count() {
    let src = "func main() { missing_a; missing_b }";
    let err = zinc_compiler::compile_source(src, "bad.zn", "bad").unwrap_err();
    match &err {
        CompileError::Semantic(diags) => assert_eq!(diags.len(), 2),
        other => panic!("expected semantic failure, got {:?}", other),
    }
    assert_eq!(err.to_string(), "2 semantic error(s) encountered.");
}

#[test]
fn test_parse_failure_reports_count() {
    let src = "func main( { }";
    let err = zinc_compiler::compile_source(src, "bad.zn", "bad").unwrap_err();
    assert!(matches!(err, CompileError::Parse(_)));
    assert!(err.to_string().ends_with("parse error(s)"));
}

#[test]
fn test_diagnostics_carry_lines() {
    let src = "func main() {\n  let x = 1\n  x = 2\n  x\n}";
    let err = zinc_compiler::compile_source(src, "bad.zn", "bad").unwrap_err();
    match err {
        CompileError::Semantic(diags) => {
            assert_eq!(diags.len(), 1);
            assert_eq!(diags[0].span.line, 3);
            assert_eq!(
                diags[0].to_line(),
                "Semantic error at line 3: cannot assign to constant 'x'"
            );
        }
        other => panic!("expected semantic failure, got {:?}", other),
    }
}

// Semantic analyzer behavior: inference, expression-valued control
// flow, narrowing, lvalue rules, and error reporting.

use zinc_ast::TypeKind;
use zinc_compiler::SemanticAnalyzer;
use zinc_parser::Parser;

fn analyze(src: &str) -> SemanticAnalyzer {
    let mut program = Parser::new(src).unwrap().parse().unwrap();
    zinc_compiler::analyze(&mut program, "test.zn")
}

fn error_messages(src: &str) -> Vec<String> {
    analyze(src)
        .sink
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

fn assert_clean(analyzer: &SemanticAnalyzer) {
    let messages: Vec<String> = analyzer.sink.iter().map(|d| d.message.clone()).collect();
    assert_eq!(analyzer.error_count(), 0, "unexpected errors: {:?}", messages);
}

#[test]
fn test_arithmetic_inference() {
    let analyzer = analyze("func main() { let x = 1 + 2 * 3; x }");
    assert_clean(&analyzer);
    let sig = analyzer.fn_sig("main").unwrap();
    assert_eq!(sig.ret.kind, TypeKind::Int);

    let analyzer = analyze("func main() { let x = 1 + 2.5; x }");
    assert_eq!(analyzer.fn_sig("main").unwrap().ret.kind, TypeKind::Float);
}

#[test]
fn test_string_concat_types_as_string() {
    let analyzer = analyze(r#"func main() { let s = "hi " + 42; s }"#);
    assert_clean(&analyzer);
    assert_eq!(analyzer.fn_sig("main").unwrap().ret.kind, TypeKind::String);
}

#[test]
fn test_if_else_with_matching_branches() {
    let analyzer = analyze("func main() { let x = if true { 1 } else { 2 }; x }");
    assert_clean(&analyzer);
    let ret = &analyzer.fn_sig("main").unwrap().ret;
    assert_eq!(ret.kind, TypeKind::Int);
    assert!(!ret.is_optional);
}

#[test]
fn test_if_without_else_is_optional() {
    let analyzer = analyze("func f() { let y = if false { 7 }; y }");
    assert_clean(&analyzer);
    let ret = &analyzer.fn_sig("f").unwrap().ret;
    assert_eq!(ret.kind, TypeKind::Int);
    assert!(ret.is_optional);
}

#[test]
fn test_while_true_yields_non_optional() {
    let analyzer = analyze("func main() { var v = while true { break 42 }; v }");
    assert_clean(&analyzer);
    let ret = &analyzer.fn_sig("main").unwrap().ret;
    assert_eq!(ret.kind, TypeKind::Int);
    assert!(!ret.is_optional);
}

#[test]
fn test_until_false_also_non_optional() {
    // `until false` desugars to `while !false`, the other always-true
    // shape.
    let analyzer = analyze("func main() { var v = until false { break 1 }; v }");
    assert_clean(&analyzer);
    assert!(!analyzer.fn_sig("main").unwrap().ret.is_optional);
}

#[test]
fn test_conditional_while_is_optional() {
    let analyzer = analyze("func main() { var c = true\n var v = while c { break 1 }; v }");
    assert_clean(&analyzer);
    assert!(analyzer.fn_sig("main").unwrap().ret.is_optional);
}

#[test]
fn test_for_is_always_optional() {
    let analyzer =
        analyze("func main() { let r = for var i = 0; i < 3; i++ { break 9 }; r }");
    assert_clean(&analyzer);
    let ret = &analyzer.fn_sig("main").unwrap().ret;
    assert_eq!(ret.kind, TypeKind::Int);
    assert!(ret.is_optional);
}

#[test]
fn test_narrowing_makes_identifier_non_optional() {
    // Inside `if y?` the narrowed `y` is plain int, so both branches
    // agree and the function returns non-optional int.
    let analyzer = analyze("func f() { let y = if false { 7 }; if y? { y } else { 0 } }");
    assert_clean(&analyzer);
    let ret = &analyzer.fn_sig("f").unwrap().ret;
    assert_eq!(ret.kind, TypeKind::Int);
    assert!(!ret.is_optional);
}

#[test]
fn test_compound_condition_does_not_narrow() {
    // `y? && true` is not the bare `y?` shape, so `y` stays optional in
    // the then-branch and the whole if yields optional int (the plain
    // else value wraps).
    let analyzer =
        analyze("func f() { let y = if false { 7 }; if y? && true { y } else { 0 } }");
    let ret = &analyzer.fn_sig("f").unwrap().ret;
    assert_eq!(ret.kind, TypeKind::Int);
    assert!(ret.is_optional);
}

#[test]
fn test_loop_break_value_mismatch() {
    let messages =
        error_messages(r#"func main() { while true { break 1; break "x" } }"#);
    assert!(
        messages.iter().any(|m| m.contains("loop yields both")),
        "{:?}",
        messages
    );
}

#[test]
fn test_break_outside_loop() {
    let messages = error_messages("func main() { break }");
    assert!(messages.iter().any(|m| m.contains("break outside loop")));
}

#[test]
fn test_undefined_variable_with_suggestion() {
    let messages = error_messages("func main() { let counter = 1; countre }");
    assert!(
        messages
            .iter()
            .any(|m| m.contains("undefined variable 'countre'")
                && m.contains("did you mean 'counter'")),
        "{:?}",
        messages
    );
}

#[test]
fn test_const_assignment_rejected() {
    let messages = error_messages("func main() { let x = 1; x = 2; x }");
    assert!(messages.iter().any(|m| m.contains("cannot assign to constant 'x'")));
}

#[test]
fn test_parameters_are_immutable() {
    let messages = error_messages("func f(a: int) { a = 2; a }");
    assert!(messages.iter().any(|m| m.contains("cannot assign to constant 'a'")));
}

#[test]
fn test_void_initializer_rejected() {
    let messages = error_messages(r#"func main() { let a = print("x"); 0 }"#);
    assert!(messages
        .iter()
        .any(|m| m.contains("void expression to initialize 'a'")));
}

#[test]
fn test_string_index_assignment_rejected() {
    let messages = error_messages(r#"func main() { var s = "ab"; s[0] = 'x'; 0 }"#);
    assert!(messages.iter().any(|m| m == "strings are immutable"));
}

#[test]
fn test_let_struct_field_mutation_rejected() {
    let messages = error_messages(
        "struct Pt { var x: int\n var y: int }\nfunc main() { let p = Pt(x: 1, y: 2); p.x = 5; 0 }",
    );
    assert!(
        messages
            .iter()
            .any(|m| m.contains("cannot modify field of immutable variable 'p'")),
        "{:?}",
        messages
    );
}

#[test]
fn test_var_struct_field_mutation_allowed() {
    let analyzer = analyze(
        "struct Pt { var x: int\n var y: int }\nfunc main() { var p = Pt(x: 1, y: 2); p.x = 5; 0 }",
    );
    assert_clean(&analyzer);
}

#[test]
fn test_class_field_mutation_through_let_binding_allowed() {
    // Classes are references: a `let` binding pins the reference, not
    // the object.
    let analyzer =
        analyze("class P { var n: int }\nfunc main() { let p = P(n: 1); p.n = 5; 0 }");
    assert_clean(&analyzer);
}

#[test]
fn test_struct_init_argument_rules() {
    let src = "struct Pt { var x: int\n var y: int }\nfunc main() { let p = Pt(1, 2); 0 }";
    assert!(error_messages(src)
        .iter()
        .any(|m| m.contains("requires named arguments")));

    let src = "struct Pt { var x: int\n var y: int }\nfunc main() { let p = Pt(x: 1); 0 }";
    assert!(error_messages(src)
        .iter()
        .any(|m| m.contains("missing field 'y'")));

    let src = "struct Pt { var x: int\n var y: int }\nfunc main() { let p = Pt(x: 1, z: 2); 0 }";
    assert!(error_messages(src)
        .iter()
        .any(|m| m.contains("no field 'z' on 'Pt'")));
}

#[test]
fn test_defaulted_field_may_be_omitted() {
    let analyzer =
        analyze("struct Pt { var x: int\n var y: int = 0 }\nfunc main() { let p = Pt(x: 1); 0 }");
    assert_clean(&analyzer);
}

#[test]
fn test_weak_rules() {
    let src = "struct S { weak var other: S? }";
    assert!(error_messages(src)
        .iter()
        .any(|m| m.contains("only allowed in classes")));

    let src = "class C { weak var n: int }";
    assert!(error_messages(src)
        .iter()
        .any(|m| m.contains("must have class type")));

    let analyzer = analyze("class Node { var n: int\n weak var parent: Node? }");
    assert_clean(&analyzer);
}

#[test]
fn test_array_heterogeneity_rejected() {
    let messages = error_messages(r#"func main() { let a = [1, "x"]; 0 }"#);
    assert!(messages
        .iter()
        .any(|m| m.contains("array elements must share a type")));
}

#[test]
fn test_optional_check_requires_optional_or_reference() {
    let messages = error_messages("func main() { let x = 1; if x? { 0 }; 0 }");
    assert!(messages.iter().any(|m| m.contains("'?' requires")));

    // Strings and classes use null-as-none, so a plain string passes.
    let analyzer = analyze(r#"func main() { let s = "x"; if s? { 0 }; 0 }"#);
    assert_clean(&analyzer);
}

#[test]
fn test_print_type_checking() {
    let messages = error_messages("func main() { print(42) }");
    assert!(messages
        .iter()
        .any(|m| m.contains("print requires a string argument")));
}

#[test]
fn test_call_arity_and_types() {
    let src = "func f(a: int) { a }\nfunc main() { f(1, 2); 0 }";
    assert!(error_messages(src)
        .iter()
        .any(|m| m.contains("expects 1 argument(s), got 2")));

    let src = "func f(a: int) { a }\nfunc main() { f(\"x\"); 0 }";
    assert!(error_messages(src)
        .iter()
        .any(|m| m.contains("expected int, got string")));
}

#[test]
fn test_return_fixes_function_type() {
    let analyzer = analyze("func f(n: int) { if n < 1 { return 10 }\n return n }");
    assert_clean(&analyzer);
    assert_eq!(analyzer.fn_sig("f").unwrap().ret.kind, TypeKind::Int);

    let src = r#"func f(n: int) { if n < 1 { return 10 }
 return "x" }"#;
    assert!(error_messages(src)
        .iter()
        .any(|m| m.contains("mismatched return types")));
}

#[test]
fn test_recursion_with_annotation() {
    let analyzer =
        analyze("func fact(n: int): int { if n < 2 { 1 } else { n * fact(n - 1) } }");
    assert_clean(&analyzer);
    assert_eq!(analyzer.fn_sig("fact").unwrap().ret.kind, TypeKind::Int);
}

#[test]
fn test_tuple_identity_is_structural() {
    let analyzer = analyze(
        r#"func main() { let a = (1, "x"); let b = (2, "y"); a.0 + b.0 }"#,
    );
    assert_clean(&analyzer);
    assert!(analyzer.registry.contains("__ZnTuple_int_str"));
    // Exactly one tuple definition was registered for both literals.
    let tuples: Vec<_> = analyzer
        .registry
        .iter()
        .filter(|d| d.name.starts_with("__ZnTuple"))
        .collect();
    assert_eq!(tuples.len(), 1);
}

#[test]
fn test_named_tuple_canonical() {
    let analyzer = analyze("func main() { let p = (x: 1, y: 2); p.x }");
    assert_clean(&analyzer);
    assert!(analyzer.registry.contains("__ZnTuple_x_int_y_int"));
}

#[test]
fn test_object_literal_identity() {
    let analyzer = analyze(
        r#"func main() { let a = {name: "a"}; let b = {name: "b"}; 0 }"#,
    );
    assert_clean(&analyzer);
    let objects: Vec<_> = analyzer
        .registry
        .iter()
        .filter(|d| d.name.starts_with("__obj"))
        .collect();
    assert_eq!(objects.len(), 1);
    assert!(objects[0].is_class);
    assert_eq!(objects[0].name, "__obj_name_str");
}

#[test]
fn test_tuple_positional_access_forms() {
    // `.0` (rewritten to `_0` by the parser) is fine; a literal `._0`
    // in source is reserved.
    let analyzer = analyze("func main() { let t = (1, 2); t.0 }");
    assert_clean(&analyzer);

    let messages = error_messages("func main() { let t = (1, 2); t._0 }");
    assert!(messages.iter().any(|m| m.contains("tuple components")));
}

#[test]
fn test_reanalysis_is_a_no_op() {
    let src = "struct Pt { var x: int\n var y: int }\nfunc main() { let p = Pt(x: 1, y: 2); p.x }";
    let mut program = Parser::new(src).unwrap().parse().unwrap();
    let first = zinc_compiler::analyze(&mut program, "test.zn");
    assert_eq!(first.error_count(), 0);
    let snapshot = program.clone();

    let second = zinc_compiler::analyze(&mut program, "test.zn");
    assert_eq!(second.error_count(), 0);
    assert_eq!(program, snapshot);
}

#[test]
fn test_extern_declarations() {
    let analyzer = analyze(
        "extern { func getpid(): int\n var errno: int }\nfunc main() { let p = getpid(); p }",
    );
    assert_clean(&analyzer);
    let sig = analyzer.fn_sig("getpid").unwrap();
    assert!(sig.is_extern);
    assert_eq!(sig.ret.kind, TypeKind::Int);

    // Externs are not assignable.
    let messages = error_messages(
        "extern { var errno: int }\nfunc main() { errno = 1; 0 }",
    );
    assert!(messages.iter().any(|m| m.contains("cannot assign to extern 'errno'")));
}

#[test]
fn test_fresh_alloc_markers() {
    use zinc_ast::{Node, NodeKind};

    let src = r#"func main() { let s = "a" + "b"; let t = s; 0 }"#;
    let mut program = Parser::new(src).unwrap().parse().unwrap();
    let analyzer = zinc_compiler::analyze(&mut program, "test.zn");
    assert_eq!(analyzer.error_count(), 0);

    let body: &Vec<Node> = match &program.items[0].kind {
        NodeKind::FuncDef { body, .. } => match &body.kind {
            NodeKind::Block { body } => body,
            _ => panic!("expected block"),
        },
        _ => panic!("expected func"),
    };
    // Concat result is fresh; a plain identifier read is not.
    match &body[0].kind {
        NodeKind::Decl { init, .. } => assert!(init.is_fresh_alloc),
        _ => panic!("expected decl"),
    }
    match &body[1].kind {
        NodeKind::Decl { init, .. } => assert!(!init.is_fresh_alloc),
        _ => panic!("expected decl"),
    }
}

#[test]
fn test_error_count_accumulates() {
    let analyzer = analyze("func main() { undefined_a; undefined_b; undefined_c }");
    assert_eq!(analyzer.error_count(), 3);
}

use zinc_ast::*;
use zinc_parser::Parser;

fn parse(src: &str) -> Program {
    Parser::new(src).unwrap().parse().unwrap()
}

fn main_body(program: &Program) -> &Vec<Node> {
    match &program.items[0].kind {
        NodeKind::FuncDef { body, .. } => match &body.kind {
            NodeKind::Block { body } => body,
            other => panic!("expected block body, got {:?}", other),
        },
        other => panic!("expected func, got {:?}", other),
    }
}

#[test]
fn test_parse_simple_function() {
    let program = parse("func main() { let x = 1 + 2 * 3; x }");
    assert_eq!(program.items.len(), 1);
    let body = main_body(&program);
    assert_eq!(body.len(), 2);
    match &body[0].kind {
        NodeKind::Decl { mutable, name, init, .. } => {
            assert!(!mutable);
            assert_eq!(name, "x");
            // precedence: 1 + (2 * 3)
            match &init.kind {
                NodeKind::Binary { op: BinaryOp::Add, rhs, .. } => {
                    assert!(matches!(
                        rhs.kind,
                        NodeKind::Binary { op: BinaryOp::Mul, .. }
                    ));
                }
                other => panic!("expected +, got {:?}", other),
            }
        }
        other => panic!("expected decl, got {:?}", other),
    }
}

#[test]
fn test_statements_allow_newline_or_semicolon_separation() {
    let program = parse("func main() {\n  var a = 1\n  a = 2;\n  a\n}");
    assert_eq!(main_body(&program).len(), 3);
}

#[test]
fn test_struct_def_with_defaults_and_weak() {
    let program = parse(
        "class Node {\n  var value: int = 0\n  let tag: string\n  weak var parent: Node?\n}",
    );
    match &program.items[0].kind {
        NodeKind::TypeDef { name, is_class, fields } => {
            assert_eq!(name, "Node");
            assert!(is_class);
            assert_eq!(fields.len(), 3);
            assert!(fields[0].default.is_some());
            assert!(fields[1].is_const);
            assert!(fields[2].is_weak);
            assert!(fields[2].annotation.is_optional);
        }
        other => panic!("expected type def, got {:?}", other),
    }
}

#[test]
fn test_instantiation_named_args() {
    let program = parse("func main() { let p = Pt(x: 1, y: 2) }");
    let body = main_body(&program);
    match &body[0].kind {
        NodeKind::Decl { init, .. } => match &init.kind {
            NodeKind::Call { callee, args, .. } => {
                assert_eq!(callee, "Pt");
                assert!(args
                    .iter()
                    .all(|a| matches!(a.kind, NodeKind::NamedArg { .. })));
            }
            other => panic!("expected call, got {:?}", other),
        },
        other => panic!("expected decl, got {:?}", other),
    }
}

#[test]
fn test_tuple_access_rewrite() {
    let program = parse("func main() { let t = (1, \"x\"); t.0 }");
    let body = main_body(&program);
    match &body[1].kind {
        NodeKind::FieldAccess { field, is_dot_int, .. } => {
            assert_eq!(field, "_0");
            assert!(is_dot_int);
        }
        other => panic!("expected field access, got {:?}", other),
    }
}

#[test]
fn test_chained_tuple_access_resplit() {
    // `.0.1` lexes as a float-shaped token; the parser re-splits it.
    let program = parse("func main() { let t = ((1, 2), 3); t.0.1 }");
    let body = main_body(&program);
    match &body[1].kind {
        NodeKind::FieldAccess { base, field, is_dot_int } => {
            assert_eq!(field, "_1");
            assert!(is_dot_int);
            assert!(matches!(
                &base.kind,
                NodeKind::FieldAccess { field, .. } if field == "_0"
            ));
        }
        other => panic!("expected field access, got {:?}", other),
    }
}

#[test]
fn test_typed_empty_collections() {
    let program = parse("func main() { let a = [int]; let h = {string: int}; a }");
    let body = main_body(&program);
    match &body[0].kind {
        NodeKind::Decl { init, .. } => {
            assert!(matches!(&init.kind, NodeKind::TypedEmptyArray { elem } if elem.kind == TypeKind::Int));
        }
        other => panic!("expected decl, got {:?}", other),
    }
    match &body[1].kind {
        NodeKind::Decl { init, .. } => match &init.kind {
            NodeKind::TypedEmptyHash { key, value } => {
                assert_eq!(key.kind, TypeKind::String);
                assert_eq!(value.kind, TypeKind::Int);
            }
            other => panic!("expected typed empty hash, got {:?}", other),
        },
        other => panic!("expected decl, got {:?}", other),
    }
}

#[test]
fn test_object_literal_vs_hash_literal() {
    let program = parse("func main() { let o = {name: \"joe\"}; let h = {\"a\": 1}; o }");
    let body = main_body(&program);
    match &body[0].kind {
        NodeKind::Decl { init, .. } => {
            assert!(matches!(&init.kind, NodeKind::ObjectLit { .. }));
        }
        other => panic!("expected decl, got {:?}", other),
    }
    match &body[1].kind {
        NodeKind::Decl { init, .. } => {
            assert!(matches!(&init.kind, NodeKind::HashLit { .. }));
        }
        other => panic!("expected decl, got {:?}", other),
    }
}

#[test]
fn test_extern_block() {
    let program = parse("extern { func getenv(name: string): string\n var errno: int }");
    match &program.items[0].kind {
        NodeKind::ExternBlock { items } => {
            assert_eq!(items.len(), 2);
            assert!(matches!(items[0].kind, NodeKind::ExternFunc { .. }));
            assert!(matches!(items[1].kind, NodeKind::ExternVar { .. }));
        }
        other => panic!("expected extern block, got {:?}", other),
    }
}

#[test]
fn test_for_loop_clauses() {
    let program = parse("func main() { for var i = 0; i < 10; i++ { i } }");
    let body = main_body(&program);
    match &body[0].kind {
        NodeKind::For { init, cond, step, .. } => {
            assert!(init.is_some());
            assert!(cond.is_some());
            assert!(matches!(
                step.as_ref().unwrap().kind,
                NodeKind::Postfix { op: PostfixOp::Increment, .. }
            ));
        }
        other => panic!("expected for, got {:?}", other),
    }
}

#[test]
fn test_break_value_same_line_only() {
    let program = parse("func main() { var v = while true { break 42 }\n v }");
    let body = main_body(&program);
    match &body[0].kind {
        NodeKind::Decl { init, .. } => match &init.kind {
            NodeKind::While { body, .. } => match &body.kind {
                NodeKind::Block { body } => {
                    assert!(matches!(
                        &body[0].kind,
                        NodeKind::Break { value: Some(_) }
                    ));
                }
                other => panic!("expected block, got {:?}", other),
            },
            other => panic!("expected while, got {:?}", other),
        },
        other => panic!("expected decl, got {:?}", other),
    }

    // Value on the next line belongs to the next statement.
    let program = parse("func main() { while true { break\n 1 } }");
    let body = main_body(&program);
    match &body[0].kind {
        NodeKind::While { body, .. } => match &body.kind {
            NodeKind::Block { body } => {
                assert!(matches!(&body[0].kind, NodeKind::Break { value: None }));
                assert_eq!(body.len(), 2);
            }
            other => panic!("expected block, got {:?}", other),
        },
        other => panic!("expected while, got {:?}", other),
    }
}

#[test]
fn test_multiple_errors_reported() {
    let errors = Parser::new("func main() { let = 1; var x 2 }")
        .unwrap()
        .parse()
        .unwrap_err();
    assert!(errors.len() >= 2, "expected 2+ errors, got {:?}", errors);
}

#[test]
fn test_line_numbers() {
    let program = parse("func main() {\n\n  let x = 1\n  x\n}");
    let body = main_body(&program);
    assert_eq!(body[0].line, 3);
    assert_eq!(body[1].line, 4);
}

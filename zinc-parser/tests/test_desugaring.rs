// Parse-time desugaring: unless/until negation and string interpolation.

use zinc_ast::*;
use zinc_parser::Parser;

fn first_stmt(src: &str) -> Node {
    let program = Parser::new(src).unwrap().parse().unwrap();
    match program.items.into_iter().next().map(|i| i.kind) {
        Some(NodeKind::FuncDef { body, .. }) => match body.kind {
            NodeKind::Block { mut body } => body.remove(0),
            other => panic!("expected block, got {:?}", other),
        },
        other => panic!("expected func, got {:?}", other),
    }
}

#[test]
fn test_unless_desugars_to_negated_if() {
    let stmt = first_stmt("func main() { unless done { 1 } }");
    match stmt.kind {
        NodeKind::If { cond, else_block, .. } => {
            assert!(matches!(
                cond.kind,
                NodeKind::Unary { op: UnaryOp::Not, .. }
            ));
            assert!(else_block.is_none());
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn test_until_false_becomes_while_not_false() {
    // The analyzer's always-true check depends on this exact shape.
    let stmt = first_stmt("func main() { until false { break } }");
    match stmt.kind {
        NodeKind::While { cond, .. } => match cond.kind {
            NodeKind::Unary { op: UnaryOp::Not, expr } => {
                assert!(matches!(expr.kind, NodeKind::BoolLit(false)));
            }
            other => panic!("expected !false, got {:?}", other),
        },
        other => panic!("expected while, got {:?}", other),
    }
}

#[test]
fn test_interpolation_desugars_to_concat_tree() {
    let stmt = first_stmt(r#"func main() { let s = "sum {a + b}!"; s }"#);
    let init = match stmt.kind {
        NodeKind::Decl { init, .. } => *init,
        other => panic!("expected decl, got {:?}", other),
    };
    // ("sum " + (a + b)) + "!"
    match init.kind {
        NodeKind::Binary { op: BinaryOp::Add, lhs, rhs } => {
            assert!(matches!(
                rhs.kind,
                NodeKind::StrLit { ref value, .. } if value == "!"
            ));
            match lhs.kind {
                NodeKind::Binary { op: BinaryOp::Add, lhs, rhs } => {
                    assert!(matches!(
                        lhs.kind,
                        NodeKind::StrLit { ref value, .. } if value == "sum "
                    ));
                    assert!(matches!(rhs.kind, NodeKind::Binary { op: BinaryOp::Add, .. }));
                }
                other => panic!("expected inner concat, got {:?}", other),
            }
        }
        other => panic!("expected concat tree, got {:?}", other),
    }
}

#[test]
fn test_escaped_brace_is_literal() {
    let stmt = first_stmt(r#"func main() { let s = "a\{b"; s }"#);
    match stmt.kind {
        NodeKind::Decl { init, .. } => {
            assert!(matches!(
                init.kind,
                NodeKind::StrLit { ref value, .. } if value == "a{b"
            ));
        }
        other => panic!("expected decl, got {:?}", other),
    }
}

#[test]
fn test_interpolation_keeps_line_numbers() {
    let stmt = first_stmt("func main() {\n  let s = \"v={x}\"\n  s\n}");
    match stmt.kind {
        NodeKind::Decl { init, .. } => match init.kind {
            NodeKind::Binary { rhs, .. } => assert_eq!(rhs.line, 2),
            other => panic!("expected concat, got {:?}", other),
        },
        other => panic!("expected decl, got {:?}", other),
    }
}

#[test]
fn test_leading_interpolation_gets_empty_string_anchor() {
    let stmt = first_stmt(r#"func main() { let s = "{n} items"; s }"#);
    let init = match stmt.kind {
        NodeKind::Decl { init, .. } => *init,
        other => panic!("expected decl, got {:?}", other),
    };
    // ("" + n) + " items"
    match init.kind {
        NodeKind::Binary { lhs, .. } => match lhs.kind {
            NodeKind::Binary { lhs, .. } => {
                assert!(matches!(
                    lhs.kind,
                    NodeKind::StrLit { ref value, .. } if value.is_empty()
                ));
            }
            other => panic!("expected anchor concat, got {:?}", other),
        },
        other => panic!("expected concat, got {:?}", other),
    }
}

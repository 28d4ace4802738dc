mod common;

use common::check_ok;
use common::check_program;
use common::kinds;
use common::simple;

use joosc::data::ast::*;
use joosc::data::ids::StringId;

/// Walks every expression in a checked program, asserting the
/// decorated type id is valid.
fn assert_all_typed(program: &Program) {
    fn expr(e: &Expr) {
        assert!(e.tid.is_valid(), "untyped expression: {:?}", e);
        match &e.kind {
            ExprKind::Lit(_)
            | ExprKind::This
            | ExprKind::Local(_, _)
            | ExprKind::StaticRef(_) => {}
            ExprKind::Name(name) => panic!("unresolved name survived: {:?}", name),
            ExprKind::Field { base, .. } => expr(base),
            ExprKind::Call { base, args, .. } => {
                if let Some(base) = base {
                    expr(base);
                }
                args.iter().for_each(expr);
            }
            ExprKind::Index { base, index } => {
                expr(base);
                expr(index);
            }
            ExprKind::New { args, .. } => args.iter().for_each(expr),
            ExprKind::NewArray { len, .. } => expr(len),
            ExprKind::Cast { expr: inner, .. } => expr(inner),
            ExprKind::InstanceOf { expr: inner, .. } => expr(inner),
            ExprKind::Unary { expr: inner, .. } => expr(inner),
            ExprKind::Binary { lhs, rhs, .. } => {
                expr(lhs);
                expr(rhs);
            }
            ExprKind::Assign { lhs, rhs } => {
                expr(lhs);
                expr(rhs);
            }
        }
    }

    fn stmt(s: &Stmt) {
        match s {
            Stmt::Empty(_) => {}
            Stmt::Expr(e) => expr(e),
            Stmt::Block(block) => block.stmts.iter().for_each(stmt),
            Stmt::If {
                cond, then, els, ..
            } => {
                expr(cond);
                stmt(then);
                if let Some(els) = els {
                    stmt(els);
                }
            }
            Stmt::While { cond, body, .. } => {
                expr(cond);
                stmt(body);
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
                ..
            } => {
                if let Some(init) = init {
                    stmt(init);
                }
                if let Some(cond) = cond {
                    expr(cond);
                }
                if let Some(update) = update {
                    expr(update);
                }
                stmt(body);
            }
            Stmt::Return(value, _) => {
                if let Some(value) = value {
                    expr(value);
                }
            }
            Stmt::LocalDecl { init, tid, .. } => {
                assert!(tid.is_valid());
                if let Some(init) = init {
                    expr(init);
                }
            }
        }
    }

    for unit in &program.units {
        for decl in &unit.decls {
            for member in &decl.members {
                match member {
                    Member::Field(field) => {
                        if let Some(init) = &field.init {
                            expr(init);
                        }
                    }
                    Member::Method(method) => {
                        if let Some(body) = &method.body {
                            body.stmts.iter().for_each(stmt);
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn every_expression_is_typed() {
    let (program, _, _, _) = check_ok(&[
        "public class Point {
             public int x = 0;
             public int y = 0;
             public static Point origin = null;
             public Point(int px, int py) {
                 x = px;
                 y = py;
             }
             public int manhattan() { return x + y; }
             public boolean isOrigin() { return x == 0 && y == 0; }
             public static int test() {
                 Point p = new Point(3, 4);
                 int[] coords = new int[2];
                 coords[0] = p.x;
                 coords[1] = p.y;
                 int sum = 0;
                 for (int i = 0; i < coords.length; i = i + 1) {
                     sum = sum + coords[i];
                 }
                 while (sum > 10) { sum = sum - 1; }
                 if (p instanceof Point) { sum = -sum; }
                 Object o = (Object) p;
                 Point q = (Point) o;
                 String s = \"sum: \" + sum;
                 return sum + s.length();
             }
         }",
    ]);
    assert_all_typed(&program);
}

#[test]
fn arithmetic_promotes_to_int() {
    let (program, _, _, _) = check_ok(&[
        "public class A {
             public A() {}
             public int f(byte b, short s, char c) {
                 return b + s + c;
             }
         }",
    ]);
    assert_all_typed(&program);
}

#[test]
fn type_mismatch_in_condition() {
    let (_, world, errors) = check_program(&[
        "public class A { public A() {} public void f() { if (1) {} } }",
    ]);
    assert!(world.is_none());
    assert!(
        kinds(&errors).contains(&"TypeMismatch".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn narrowing_assignment_rejected() {
    let (_, _, errors) = check_program(&[
        "public class A { public A() {} public void f() { byte b = 300; } }",
    ]);
    assert!(
        kinds(&errors).contains(&"TypeMismatch".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn string_concat_folds_and_shares_ids() {
    let (program, _, _, strings) = check_ok(&[
        "public class A {
             public A() {}
             public String first = \"a\" + \"b\";
             public String second = \"ab\";
         }",
    ]);

    let mut sids: Vec<StringId> = Vec::new();
    for unit in &program.units {
        for decl in &unit.decls {
            for member in &decl.members {
                if let Member::Field(field) = member {
                    if let Some(init) = &field.init {
                        match init.constant() {
                            Some(Lit::String(symbol, sid)) => {
                                assert_eq!(symbol.as_str(), "ab");
                                sids.push(*sid);
                            }
                            other => panic!("expected folded string, found {:?}", other),
                        }
                    }
                }
            }
        }
    }
    assert_eq!(sids.len(), 2);
    assert_eq!(sids[0], sids[1]);
    assert!(strings.get(joosc::data::symbol::intern("ab")).is_some());
}

#[test]
fn integer_folding() {
    let (program, _, _, _) = check_ok(&[
        "public class A {
             public A() {}
             public int x = 2 + 3 * 4;
         }",
    ]);
    for unit in &program.units {
        for decl in &unit.decls {
            for member in &decl.members {
                if let Member::Field(field) = member {
                    if field.name.symbol.as_str() == "x" {
                        assert_eq!(
                            field.init.as_ref().unwrap().constant(),
                            Some(&Lit::Int(14))
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn unreachable_while_false() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public void f() { while (false) { int x = 1; } }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"Unreachable".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn code_after_return_unreachable() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public int f() {
                 return 1;
                 return 2;
             }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"Unreachable".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn missing_return() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public int f(boolean b) {
                 if (b) { return 1; }
             }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"MissingReturn".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn while_true_needs_no_return() {
    let (_, world, errors) = check_program(&[
        "public class A {
             public A() {}
             public int f() { while (true) {} }
         }",
    ]);
    assert!(world.is_some(), "{:?}", simple(&errors));
}

#[test]
fn definite_assignment() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public int f(boolean b) {
                 int x;
                 if (b) { x = 1; }
                 return x;
             }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"NotDefinitelyAssigned".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn definite_assignment_through_both_branches() {
    let (_, world, errors) = check_program(&[
        "public class A {
             public A() {}
             public int f(boolean b) {
                 int x;
                 if (b) { x = 1; } else { x = 2; }
                 return x;
             }
         }",
    ]);
    assert!(world.is_some(), "{:?}", simple(&errors));
}

#[test]
fn variable_initializer_self_reference() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public void f() { int x = x + 1; }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"VariableInitializerSelfReference".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn duplicate_local() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public void f() {
                 int x = 1;
                 { int x = 2; }
             }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"DuplicateVarDecl".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn call_resolution() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public int f(int x) { return x; }
             public void g() { f(true); }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"NoMatchingMethod".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn illegal_cast() {
    let (_, _, errors) = check_program(&[
        "public class A { public A() {} }",
        "public class B {
             public B() {}
             public A f() { return (A) \"text\"; }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"IllegalCast".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn instanceof_on_primitive_value() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public boolean f(int x) { return x instanceof Object; }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"InvalidInstanceOf".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn instance_member_from_static() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public int x = 1;
             public A() {}
             public static int f() { return x; }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"InstanceMemberFromStatic".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn array_length_not_assignable() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public void f(int[] a) { a.length = 3; }
         }",
    ]);
    assert!(
        kinds(&errors).contains(&"InvalidLHS".to_string()),
        "{:?}",
        simple(&errors)
    );
}

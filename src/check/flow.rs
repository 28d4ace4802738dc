use crate::check::Error;
use crate::check::ErrorKind;
use crate::data::ast::*;
use crate::data::ids::LocalVarId;
use crate::ErrorList;
use crate::Set;

/// Reachability and definite-assignment analysis, run over the
/// typed AST after checking. Constant boolean conditions have already
/// been folded, so `while (false)` style dead code is visible
/// syntactically.
pub fn analyze(unit: &CompUnit, errors: &mut ErrorList) {
    for decl in &unit.decls {
        for member in &decl.members {
            match member {
                Member::Field(field) => {
                    if let Some(init) = &field.init {
                        let mut assigned = Assigned::default();
                        check_assigned_expr(init, &mut assigned, errors);
                    }
                }
                Member::Method(method) => {
                    let body = match &method.body {
                        Some(body) => body,
                        None => continue,
                    };

                    let completes = check_block(body, errors);
                    if completes && !method.ret_tid.is_void() {
                        errors.append(Error::new(method.name.span, ErrorKind::MissingReturn));
                    }

                    let mut assigned = Assigned::default();
                    for param in &method.params {
                        assigned.insert(param.lid);
                    }
                    check_assigned_block(body, &mut assigned, errors);
                }
            }
        }
    }
}

/// Returns whether the block can complete normally; statements after
/// one that cannot are reported unreachable.
fn check_block(block: &Block, errors: &mut ErrorList) -> bool {
    let mut alive = true;
    for stmt in &block.stmts {
        if !alive {
            errors.append(Error::new(stmt.span(), ErrorKind::Unreachable));
            // Analyze the dead tail as if live, but report only once.
            alive = true;
        }
        alive = check_stmt(stmt, errors);
    }
    alive
}

fn constant_bool(cond: &Expr) -> Option<bool> {
    match cond.constant() {
        Some(Lit::Bool(value)) => Some(*value),
        _ => None,
    }
}

fn check_stmt(stmt: &Stmt, errors: &mut ErrorList) -> bool {
    match stmt {
        Stmt::Empty(_) | Stmt::Expr(_) | Stmt::LocalDecl { .. } => true,
        Stmt::Block(block) => check_block(block, errors),
        Stmt::Return(_, _) => false,
        Stmt::If { then, els, .. } => {
            // Per Java, an `if` condition is never treated as
            // constant for reachability.
            let then_completes = check_stmt(then, errors);
            match els {
                None => true,
                Some(els) => {
                    let els_completes = check_stmt(els, errors);
                    then_completes || els_completes
                }
            }
        }
        Stmt::While { cond, body, .. } => match constant_bool(cond) {
            Some(true) => {
                check_stmt(body, errors);
                false
            }
            Some(false) => {
                errors.append(Error::new(body.span(), ErrorKind::Unreachable));
                true
            }
            None => {
                check_stmt(body, errors);
                true
            }
        },
        Stmt::For {
            cond, body, ..
        } => match cond.as_ref().map(constant_bool) {
            // No condition, or a constant-true condition: the loop
            // never completes normally.
            None | Some(Some(true)) => {
                check_stmt(body, errors);
                false
            }
            Some(Some(false)) => {
                errors.append(Error::new(body.span(), ErrorKind::Unreachable));
                true
            }
            Some(None) => {
                check_stmt(body, errors);
                true
            }
        },
    }
}

type Assigned = Set<LocalVarId>;

/// Forward definite-assignment analysis. Locals declared without an
/// initializer must be assigned on every path before they are read.
fn check_assigned_block(block: &Block, assigned: &mut Assigned, errors: &mut ErrorList) {
    for stmt in &block.stmts {
        check_assigned_stmt(stmt, assigned, errors);
    }
}

fn check_assigned_stmt(stmt: &Stmt, assigned: &mut Assigned, errors: &mut ErrorList) {
    match stmt {
        Stmt::Empty(_) => {}
        Stmt::Expr(expr) => check_assigned_expr(expr, assigned, errors),
        Stmt::Block(block) => check_assigned_block(block, assigned, errors),
        Stmt::If {
            cond, then, els, ..
        } => {
            check_assigned_expr(cond, assigned, errors);
            let mut then_assigned = assigned.clone();
            check_assigned_stmt(then, &mut then_assigned, errors);
            match els {
                None => {}
                Some(els) => {
                    let mut els_assigned = assigned.clone();
                    check_assigned_stmt(els, &mut els_assigned, errors);
                    // Both branches assigning makes it definite.
                    for lid in then_assigned.intersection(&els_assigned) {
                        assigned.insert(*lid);
                    }
                }
            }
        }
        Stmt::While { cond, body, .. } => {
            check_assigned_expr(cond, assigned, errors);
            let mut body_assigned = assigned.clone();
            check_assigned_stmt(body, &mut body_assigned, errors);
        }
        Stmt::For {
            init,
            cond,
            update,
            body,
            ..
        } => {
            if let Some(init) = init {
                check_assigned_stmt(init, assigned, errors);
            }
            if let Some(cond) = cond {
                check_assigned_expr(cond, assigned, errors);
            }
            let mut body_assigned = assigned.clone();
            check_assigned_stmt(body, &mut body_assigned, errors);
            if let Some(update) = update {
                check_assigned_expr(update, &mut body_assigned, errors);
            }
        }
        Stmt::Return(value, _) => {
            if let Some(value) = value {
                check_assigned_expr(value, assigned, errors);
            }
        }
        Stmt::LocalDecl { init, lid, .. } => {
            if let Some(init) = init {
                check_assigned_expr(init, assigned, errors);
                assigned.insert(*lid);
            }
        }
    }
}

fn check_assigned_expr(expr: &Expr, assigned: &mut Assigned, errors: &mut ErrorList) {
    match &expr.kind {
        ExprKind::Lit(_) | ExprKind::This | ExprKind::Name(_) | ExprKind::StaticRef(_) => {}
        ExprKind::Local(lid, _) => {
            if !assigned.contains(lid) {
                errors.append(Error::new(expr.span, ErrorKind::NotDefinitelyAssigned));
            }
        }
        ExprKind::Field { base, .. } => check_assigned_expr(base, assigned, errors),
        ExprKind::Call { base, args, .. } => {
            if let Some(base) = base {
                check_assigned_expr(base, assigned, errors);
            }
            for arg in args {
                check_assigned_expr(arg, assigned, errors);
            }
        }
        ExprKind::Index { base, index } => {
            check_assigned_expr(base, assigned, errors);
            check_assigned_expr(index, assigned, errors);
        }
        ExprKind::New { args, .. } => {
            for arg in args {
                check_assigned_expr(arg, assigned, errors);
            }
        }
        ExprKind::NewArray { len, .. } => check_assigned_expr(len, assigned, errors),
        ExprKind::Cast { expr, .. } => check_assigned_expr(expr, assigned, errors),
        ExprKind::InstanceOf { expr, .. } => check_assigned_expr(expr, assigned, errors),
        ExprKind::Unary { expr, .. } => check_assigned_expr(expr, assigned, errors),
        ExprKind::Binary { lhs, rhs, .. } => {
            check_assigned_expr(lhs, assigned, errors);
            check_assigned_expr(rhs, assigned, errors);
        }
        ExprKind::Assign { lhs, rhs } => {
            check_assigned_expr(rhs, assigned, errors);
            // A write to a bare local is a definition, not a use.
            match &lhs.kind {
                ExprKind::Local(lid, _) => {
                    assigned.insert(*lid);
                }
                _ => check_assigned_expr(lhs, assigned, errors),
            }
        }
    }
}

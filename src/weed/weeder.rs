use crate::data::ast::*;
use crate::data::ids::TypeKind;
use crate::weed::Error;
use crate::weed::ErrorKind;
use crate::ErrorList;

/// Post-parse syntactic checks for one compilation unit: modifier
/// combinations, class/interface body restrictions, `void` placement,
/// assignment targets, and `instanceof` operands.
pub fn weed_unit(unit: &CompUnit, errors: &mut ErrorList) {
    for decl in &unit.decls {
        weed_type(decl, errors);
    }
}

fn report(errors: &mut ErrorList, span: crate::data::span::Span, kind: ErrorKind) {
    errors.append(Error { span, kind });
}

fn weed_type(decl: &TypeDecl, errors: &mut ErrorList) {
    if decl.mods.is_abstract() && decl.mods.is_final() {
        report(errors, decl.name.span, ErrorKind::AbstractFinalClass);
    }
    if decl.mods.is_public() && decl.mods.is_protected() {
        report(errors, decl.name.span, ErrorKind::ConflictingAccessMod);
    }

    for member in &decl.members {
        match member {
            Member::Field(field) => weed_field(decl.kind, field, errors),
            Member::Method(method) => weed_method(decl.kind, method, errors),
        }
    }
}

fn weed_field(kind: TypeKind, field: &FieldDecl, errors: &mut ErrorList) {
    if kind == TypeKind::Interface {
        report(errors, field.name.span, ErrorKind::InterfaceFieldDecl);
    }
    weed_mods(&field.mods, field.name.span, errors);
    if field.mods.is_final() {
        report(errors, field.name.span, ErrorKind::FieldFinal);
    }
    weed_ty(&field.ty, errors);
    if let Some(init) = &field.init {
        weed_expr(init, errors);
    }
}

fn weed_method(kind: TypeKind, method: &MethodDecl, errors: &mut ErrorList) {
    weed_mods(&method.mods, method.name.span, errors);

    match kind {
        TypeKind::Interface => {
            if method.is_constructor() {
                report(errors, method.name.span, ErrorKind::InterfaceConstructor);
            }
            if method.body.is_some() {
                report(errors, method.name.span, ErrorKind::InterfaceMethodImpl);
            }
            if method.mods.is_static() || method.mods.is_final() || method.mods.is_native() {
                report(errors, method.name.span, ErrorKind::InterfaceMethodModifier);
            }
        }
        TypeKind::Class => {
            let is_abstract = method.mods.is_abstract();
            let is_native = method.mods.is_native();

            if method.body.is_none() && !is_abstract && !is_native {
                report(errors, method.name.span, ErrorKind::ClassMethodEmpty);
            }
            if method.body.is_some() && (is_abstract || is_native) {
                report(errors, method.name.span, ErrorKind::ClassMethodNotEmpty);
            }
            if method.mods.is_static() && method.mods.is_final() {
                report(errors, method.name.span, ErrorKind::ClassMethodStaticFinal);
            }
            if is_native && !method.mods.is_static() {
                report(
                    errors,
                    method.name.span,
                    ErrorKind::ClassMethodNativeNotStatic,
                );
            }
            if is_abstract && method.mods.is_static() {
                report(errors, method.name.span, ErrorKind::ClassMethodAbstractStatic);
            }
            if is_abstract && method.mods.is_final() {
                report(errors, method.name.span, ErrorKind::ClassMethodAbstractFinal);
            }
        }
    }

    for param in &method.params {
        weed_ty(&param.ty, errors);
    }
    if let Some(body) = &method.body {
        weed_block(body, errors);
    }
}

fn weed_mods(mods: &Modifiers, span: crate::data::span::Span, errors: &mut ErrorList) {
    if mods.is_public() && mods.is_protected() {
        report(errors, span, ErrorKind::ConflictingAccessMod);
    }
    if !mods.is_public() && !mods.is_protected() {
        report(errors, span, ErrorKind::MissingAccessMod);
    }
}

/// `void` is only legal as a method return type; the parser already
/// confines it there, but ASTs can also be built programmatically.
fn weed_ty(ty: &Type, errors: &mut ErrorList) {
    match ty {
        Type::Void(span) => report(errors, *span, ErrorKind::InvalidVoidType),
        Type::Array(inner, _) => weed_ty(inner, errors),
        Type::Primitive(_, _) | Type::Reference(_) => {}
    }
}

fn weed_block(block: &Block, errors: &mut ErrorList) {
    for stmt in &block.stmts {
        weed_stmt(stmt, errors);
    }
}

fn weed_stmt(stmt: &Stmt, errors: &mut ErrorList) {
    match stmt {
        Stmt::Empty(_) => {}
        Stmt::Expr(expr) => weed_expr(expr, errors),
        Stmt::Block(block) => weed_block(block, errors),
        Stmt::If {
            cond, then, els, ..
        } => {
            weed_expr(cond, errors);
            weed_stmt(then, errors);
            if let Some(els) = els {
                weed_stmt(els, errors);
            }
        }
        Stmt::While { cond, body, .. } => {
            weed_expr(cond, errors);
            weed_stmt(body, errors);
        }
        Stmt::For {
            init,
            cond,
            update,
            body,
            ..
        } => {
            if let Some(init) = init {
                weed_stmt(init, errors);
            }
            if let Some(cond) = cond {
                weed_expr(cond, errors);
            }
            if let Some(update) = update {
                weed_expr(update, errors);
            }
            weed_stmt(body, errors);
        }
        Stmt::Return(value, _) => {
            if let Some(value) = value {
                weed_expr(value, errors);
            }
        }
        Stmt::LocalDecl { ty, init, .. } => {
            weed_ty(ty, errors);
            if let Some(init) = init {
                weed_expr(init, errors);
            }
        }
    }
}

fn weed_expr(expr: &Expr, errors: &mut ErrorList) {
    match &expr.kind {
        ExprKind::Lit(_) | ExprKind::This | ExprKind::Name(_) => {}
        ExprKind::Local(_, _) | ExprKind::StaticRef(_) => {}
        ExprKind::Field { base, .. } => weed_expr(base, errors),
        ExprKind::Call { base, args, .. } => {
            if let Some(base) = base {
                weed_expr(base, errors);
            }
            for arg in args {
                weed_expr(arg, errors);
            }
        }
        ExprKind::Index { base, index } => {
            weed_expr(base, errors);
            weed_expr(index, errors);
        }
        ExprKind::New { args, .. } => {
            for arg in args {
                weed_expr(arg, errors);
            }
        }
        ExprKind::NewArray { elem, len } => {
            weed_ty(elem, errors);
            weed_expr(len, errors);
        }
        ExprKind::Cast { ty, expr } => {
            weed_ty(ty, errors);
            weed_expr(expr, errors);
        }
        ExprKind::InstanceOf { expr, ty, .. } => {
            weed_expr(expr, errors);
            if let Type::Primitive(_, span) = ty {
                report(errors, *span, ErrorKind::InvalidInstanceOfType);
            }
            weed_ty(ty, errors);
        }
        ExprKind::Unary { expr, .. } => weed_expr(expr, errors),
        ExprKind::Binary { lhs, rhs, .. } => {
            weed_expr(lhs, errors);
            weed_expr(rhs, errors);
        }
        ExprKind::Assign { lhs, rhs } => {
            match &lhs.kind {
                ExprKind::Name(_) | ExprKind::Field { .. } | ExprKind::Index { .. } => {}
                _ => report(errors, lhs.span, ErrorKind::InvalidLHS),
            }
            weed_expr(lhs, errors);
            weed_expr(rhs, errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weed::ErrorKind;
    use crate::Error;
    use crate::ErrorList;

    fn weed_source(source: &str) -> Vec<ErrorKind> {
        let mut errors = ErrorList::new();
        let tokens = crate::lex::lex(0, source, &mut errors);
        let unit = crate::parse::parse(0, &tokens, &mut errors).expect("syntax error");
        weed_unit(&unit, &mut errors);
        errors
            .errors()
            .iter()
            .map(|error| match error {
                Error::Weed(error) => error.kind,
                error => panic!("expected weed error, found {}", error),
            })
            .collect()
    }

    #[test]
    fn abstract_final_class() {
        assert_eq!(
            weed_source("public abstract final class A { public A() {} }"),
            vec![ErrorKind::AbstractFinalClass],
        );
    }

    #[test]
    fn instanceof_primitive() {
        assert_eq!(
            weed_source(
                "public class A { public boolean f(Object x) { return x instanceof int; } }"
            ),
            vec![ErrorKind::InvalidInstanceOfType],
        );
    }

    #[test]
    fn instanceof_array_is_fine() {
        assert_eq!(
            weed_source(
                "public class A { public boolean f(Object x) { return x instanceof int[]; } }"
            ),
            vec![],
        );
    }

    #[test]
    fn invalid_assignment_target() {
        assert_eq!(
            weed_source("public class A { public void f() { 1 = 2; } }"),
            vec![ErrorKind::InvalidLHS],
        );
    }

    #[test]
    fn native_must_be_static() {
        assert_eq!(
            weed_source("public class A { public native int f(int x); }"),
            vec![ErrorKind::ClassMethodNativeNotStatic],
        );
    }

    #[test]
    fn interface_restrictions() {
        assert_eq!(
            weed_source("public interface I { public int f() { return 1; } public int x = 3; }"),
            vec![ErrorKind::InterfaceMethodImpl, ErrorKind::InterfaceFieldDecl],
        );
    }

    #[test]
    fn method_body_rules() {
        assert_eq!(
            weed_source("public class A { public int f(); public abstract int g() { return 1; } }"),
            vec![ErrorKind::ClassMethodEmpty, ErrorKind::ClassMethodNotEmpty],
        );
    }
}

use crate::check::decl::resolve_type;
use crate::check::fold;
use crate::check::fold::ConstStringMap;
use crate::check::info::MethodInfo;
use crate::check::info::TypeInfoMap;
use crate::check::symbol_table::SymbolTable;
use crate::check::type_set::ScopedTypeSet;
use crate::check::type_set::TypeSet;
use crate::check::Error;
use crate::check::ErrorKind;
use crate::data::ast::*;
use crate::data::ids::FieldId;
use crate::data::ids::TypeId;
use crate::data::ids::TypeKind;
use crate::data::span::Span;
use crate::data::symbol::Symbol;
use crate::ErrorList;

/// Type-checks one compilation unit: every expression is
/// rewritten bottom-up with a resolved type id, names become resolved
/// locals, fields, or static references, calls and field accesses are
/// bound to their table entries, and constant expressions are folded.
pub fn check_unit(
    unit: &mut CompUnit,
    set: &TypeSet,
    tinfo: &TypeInfoMap,
    strings: &mut ConstStringMap,
    errors: &mut ErrorList,
) {
    // Import diagnostics were already reported while resolving
    // declarations; the view here must not repeat them.
    let mut throwaway = ErrorList::new();
    let scoped = set.view(unit, &mut throwaway);

    let string_tid = set.get("java.lang.String").unwrap_or(TypeId::ERROR);
    let object_tid = set.get("java.lang.Object").unwrap_or(TypeId::ERROR);
    let package = unit.package_name();

    for decl in &mut unit.decls {
        let qualified = if package.is_empty() {
            decl.name.symbol.as_str().to_string()
        } else {
            format!("{}.{}", package, decl.name.symbol)
        };
        let tid = match set.get(&qualified) {
            Some(tid) if tinfo.get(tid).is_some() => tid,
            _ => continue,
        };

        let mut checker = Checker {
            scoped: &scoped,
            tinfo,
            strings: &mut *strings,
            string_tid,
            object_tid,
            cur_type: tid,
            cur_static: false,
            cur_ctor: false,
            cur_ret: TypeId::VOID,
            locals: SymbolTable::new(),
        };

        for member in &mut decl.members {
            match member {
                Member::Field(field) => {
                    checker.cur_static = field.mods.is_static();
                    checker.cur_ctor = false;
                    checker.locals = SymbolTable::new();
                    if let Some(init) = field.init.take() {
                        let init = checker.check_expr(init, errors);
                        checker.expect_assignable(field.tid, &init, errors);
                        field.init = Some(init);
                    }
                }
                Member::Method(method) => {
                    checker.cur_static = method.mods.is_static();
                    checker.cur_ctor = method.is_constructor();
                    checker.cur_ret = method.ret_tid;
                    checker.locals = SymbolTable::new();

                    for param in &mut method.params {
                        param.lid = checker.locals.declare(
                            param.name.symbol,
                            param.tid,
                            param.name.span,
                            errors,
                        );
                    }

                    if let Some(body) = method.body.take() {
                        method.body = Some(checker.check_block(body, errors));
                    }
                }
            }
        }
    }
}

struct Checker<'a> {
    scoped: &'a ScopedTypeSet<'a>,
    tinfo: &'a TypeInfoMap,
    strings: &'a mut ConstStringMap,
    string_tid: TypeId,
    object_tid: TypeId,
    cur_type: TypeId,
    cur_static: bool,
    cur_ctor: bool,
    cur_ret: TypeId,
    locals: SymbolTable,
}

impl<'a> Checker<'a> {
    fn error(&self, errors: &mut ErrorList, span: Span, kind: ErrorKind) {
        errors.append(Error::new(span, kind));
    }

    /// `target <- source` per the Joos assignability rules: identity,
    /// reference widening, numeric widening, or null into a reference.
    fn assignable(&self, target: TypeId, source: TypeId) -> bool {
        if target == source {
            return true;
        }
        if !target.is_valid() || !source.is_valid() {
            return true;
        }
        if source.is_null() {
            return target.is_reference();
        }
        if target.ndims == 0 && source.ndims == 0 {
            match (source.base, target.base) {
                (TypeId::BYTE_BASE, TypeId::SHORT_BASE | TypeId::INT_BASE)
                | (TypeId::SHORT_BASE, TypeId::INT_BASE)
                | (TypeId::CHAR_BASE, TypeId::INT_BASE) => return true,
                _ => {}
            }
        }
        if source.is_array() {
            // Arrays widen to Object and covariantly on reference
            // element types.
            if target == self.object_tid {
                return true;
            }
            if target.is_array()
                && target.ndims == source.ndims
                && TypeId::base(source.base).is_reference()
                && TypeId::base(target.base).is_reference()
            {
                return self
                    .tinfo
                    .is_ancestor(TypeId::base(source.base), TypeId::base(target.base));
            }
            return false;
        }
        if source.is_reference() && target.is_reference() {
            return self.tinfo.is_ancestor(source, target);
        }
        false
    }

    fn expect_assignable(&self, target: TypeId, source: &Expr, errors: &mut ErrorList) {
        if !self.assignable(target, source.tid) {
            self.error(errors, source.span, ErrorKind::TypeMismatch);
        }
    }

    /// Reference casts are legal within a chain, through interfaces on
    /// non-final classes, and between compatible array types.
    fn castable(&self, from: TypeId, to: TypeId) -> bool {
        if from == to || !from.is_valid() || !to.is_valid() {
            return true;
        }
        if from.is_null() {
            return to.is_reference();
        }
        if from.is_numeric() && to.is_numeric() {
            return true;
        }
        if from.is_primitive() || to.is_primitive() {
            return false;
        }
        // Object casts to and from every array type.
        if from.is_array() != to.is_array() {
            let scalar = if from.is_array() { to } else { from };
            return scalar == self.object_tid;
        }
        if from.is_array() {
            let from_elem = TypeId::base(from.base);
            let to_elem = TypeId::base(to.base);
            if from.ndims != to.ndims {
                return false;
            }
            if from_elem.is_primitive() || to_elem.is_primitive() {
                return from_elem == to_elem;
            }
            return self.castable(from_elem, to_elem);
        }

        let from_info = self.tinfo.get(from);
        let to_info = self.tinfo.get(to);
        let (from_info, to_info) = match (from_info, to_info) {
            (Some(from), Some(to)) => (from, to),
            _ => return false,
        };

        if self.tinfo.is_ancestor(from, to) || self.tinfo.is_ancestor(to, from) {
            return true;
        }

        // An interface cast can succeed for any non-final class.
        match (from_info.kind, to_info.kind) {
            (TypeKind::Interface, TypeKind::Interface) => true,
            (TypeKind::Interface, TypeKind::Class) => !to_info.mods.is_final(),
            (TypeKind::Class, TypeKind::Interface) => !from_info.mods.is_final(),
            (TypeKind::Class, TypeKind::Class) => false,
        }
    }

    /// Protected members are accessible in the owner's package, and
    /// otherwise only through the subtype relation.
    fn accessible(&self, member_mods: &Modifiers, owner: TypeId, receiver: TypeId) -> bool {
        if !member_mods.is_protected() || owner == self.cur_type {
            return true;
        }
        let owner_info = match self.tinfo.get(TypeId::base(owner.base)) {
            Some(info) => info,
            None => return true,
        };
        let caller_info = match self.tinfo.get(self.cur_type) {
            Some(info) => info,
            None => return true,
        };
        if owner_info.package == caller_info.package {
            return true;
        }
        if !self.tinfo.is_ancestor(self.cur_type, TypeId::base(owner.base)) {
            return false;
        }
        // Instance access additionally requires the receiver to be in
        // the caller's own subtree.
        receiver == self.cur_type
            || self.tinfo.is_ancestor(receiver, self.cur_type)
            || receiver.is_array()
    }

    fn check_block(&mut self, block: Block, errors: &mut ErrorList) -> Block {
        self.locals.enter_scope();
        let stmts = block
            .stmts
            .into_iter()
            .map(|stmt| self.check_stmt(stmt, errors))
            .collect();
        self.locals.exit_scope();
        Block {
            stmts,
            span: block.span,
        }
    }

    fn check_stmt(&mut self, stmt: Stmt, errors: &mut ErrorList) -> Stmt {
        match stmt {
            Stmt::Empty(span) => Stmt::Empty(span),
            Stmt::Expr(expr) => Stmt::Expr(self.check_value(expr, errors)),
            Stmt::Block(block) => Stmt::Block(self.check_block(block, errors)),
            Stmt::If {
                cond,
                then,
                els,
                span,
            } => {
                let cond = self.check_condition(cond, errors);
                let then = Box::new(self.check_stmt(*then, errors));
                let els = els.map(|els| Box::new(self.check_stmt(*els, errors)));
                Stmt::If {
                    cond,
                    then,
                    els,
                    span,
                }
            }
            Stmt::While { cond, body, span } => {
                let cond = self.check_condition(cond, errors);
                let body = Box::new(self.check_stmt(*body, errors));
                Stmt::While { cond, body, span }
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
                span,
            } => {
                self.locals.enter_scope();
                let init = init.map(|init| Box::new(self.check_stmt(*init, errors)));
                let cond = cond.map(|cond| self.check_condition(cond, errors));
                let update = update.map(|update| self.check_value(update, errors));
                let body = Box::new(self.check_stmt(*body, errors));
                self.locals.exit_scope();
                Stmt::For {
                    init,
                    cond,
                    update,
                    body,
                    span,
                }
            }
            Stmt::Return(value, span) => {
                let value = value.map(|value| self.check_value(value, errors));
                match &value {
                    Some(value) => {
                        if self.cur_ret.is_void() {
                            self.error(errors, value.span, ErrorKind::TypeMismatch);
                        } else {
                            self.expect_assignable(self.cur_ret, value, errors);
                        }
                    }
                    None => {
                        if !self.cur_ret.is_void() && !self.cur_ctor {
                            self.error(errors, span, ErrorKind::TypeMismatch);
                        }
                    }
                }
                Stmt::Return(value, span)
            }
            Stmt::LocalDecl {
                ty,
                name,
                init,
                span,
                lid: _,
                tid: _,
            } => {
                let tid = resolve_type(self.scoped, &ty, errors);
                let lid = self.locals.declare(name.symbol, tid, name.span, errors);
                let init = init.map(|init| {
                    self.locals.begin_initializer(name.symbol);
                    let init = self.check_value(init, errors);
                    self.locals.end_initializer();
                    self.expect_assignable(tid, &init, errors);
                    init
                });
                Stmt::LocalDecl {
                    ty,
                    name,
                    init,
                    span,
                    tid,
                    lid,
                }
            }
        }
    }

    fn check_condition(&mut self, cond: Expr, errors: &mut ErrorList) -> Expr {
        let cond = self.check_value(cond, errors);
        if cond.tid.is_valid() && !cond.tid.is_bool() {
            self.error(errors, cond.span, ErrorKind::TypeMismatch);
        }
        cond
    }

    /// Checks an expression in a value position: a bare type reference
    /// is not a value.
    fn check_value(&mut self, expr: Expr, errors: &mut ErrorList) -> Expr {
        let expr = self.check_expr(expr, errors);
        if let ExprKind::StaticRef(_) = expr.kind {
            self.error(errors, expr.span, ErrorKind::UndefinedReference);
            return Expr::typed(expr.kind, expr.span, TypeId::ERROR);
        }
        expr
    }

    fn check_expr(&mut self, expr: Expr, errors: &mut ErrorList) -> Expr {
        let span = expr.span;
        match expr.kind {
            ExprKind::Lit(lit) => self.check_lit(lit, span),
            ExprKind::This => {
                if self.cur_static {
                    self.error(errors, span, ErrorKind::ThisInStaticContext);
                    Expr::typed(ExprKind::This, span, TypeId::ERROR)
                } else {
                    Expr::typed(ExprKind::This, span, self.cur_type)
                }
            }
            ExprKind::Name(name) => self.check_name(name, span, errors),
            ExprKind::Local(lid, symbol) => {
                let tid = self
                    .locals
                    .lookup(symbol)
                    .map(|(_, tid)| tid)
                    .unwrap_or(TypeId::ERROR);
                Expr::typed(ExprKind::Local(lid, symbol), span, tid)
            }
            ExprKind::StaticRef(tid) => Expr::typed(ExprKind::StaticRef(tid), span, tid),
            ExprKind::Field { base, name, .. } => {
                let base = self.check_expr(*base, errors);
                self.check_field(base, name, span, errors)
            }
            ExprKind::Call {
                base, name, args, ..
            } => self.check_call(base, name, args, span, errors),
            ExprKind::Index { base, index } => {
                let base = self.check_value(*base, errors);
                let index = self.check_value(*index, errors);
                let tid = if base.tid.is_array() {
                    base.tid.element()
                } else {
                    if base.tid.is_valid() {
                        self.error(errors, base.span, ErrorKind::IndexNonArray);
                    }
                    TypeId::ERROR
                };
                self.expect_numeric(&index, errors);
                Expr::typed(
                    ExprKind::Index {
                        base: Box::new(base),
                        index: Box::new(index),
                    },
                    span,
                    tid,
                )
            }
            ExprKind::New { ty, args, .. } => self.check_new(ty, args, span, errors),
            ExprKind::NewArray { elem, len } => {
                let elem_tid = resolve_type(self.scoped, &elem, errors);
                let len = self.check_value(*len, errors);
                self.expect_numeric(&len, errors);
                Expr::typed(
                    ExprKind::NewArray {
                        elem,
                        len: Box::new(len),
                    },
                    span,
                    elem_tid.array(),
                )
            }
            ExprKind::Cast { ty, expr } => {
                let target = resolve_type(self.scoped, &ty, errors);
                let expr = self.check_value(*expr, errors);
                if expr.tid.is_valid() && target.is_valid() && !self.castable(expr.tid, target) {
                    self.error(errors, span, ErrorKind::IllegalCast);
                }
                Expr::typed(
                    ExprKind::Cast {
                        ty,
                        expr: Box::new(expr),
                    },
                    span,
                    target,
                )
            }
            ExprKind::InstanceOf { expr, ty, .. } => {
                let target = resolve_type(self.scoped, &ty, errors);
                let expr = self.check_value(*expr, errors);
                if expr.tid.is_valid() && !expr.tid.is_reference() {
                    self.error(errors, expr.span, ErrorKind::InvalidInstanceOf);
                }
                if target.is_valid() && !target.is_reference() {
                    self.error(errors, ty.span(), ErrorKind::InvalidInstanceOf);
                }
                Expr::typed(
                    ExprKind::InstanceOf {
                        expr: Box::new(expr),
                        ty,
                        target,
                    },
                    span,
                    TypeId::BOOL,
                )
            }
            ExprKind::Unary { op, expr } => {
                let expr = self.check_value(*expr, errors);
                let tid = match op {
                    UnOp::Neg => {
                        self.expect_numeric(&expr, errors);
                        TypeId::INT
                    }
                    UnOp::Not => {
                        if expr.tid.is_valid() && !expr.tid.is_bool() {
                            self.error(errors, expr.span, ErrorKind::TypeMismatch);
                        }
                        TypeId::BOOL
                    }
                };
                if let Some(folded) = expr.constant().and_then(|lit| fold::fold_unary(op, lit)) {
                    return self.check_lit(folded, span);
                }
                Expr::typed(
                    ExprKind::Unary {
                        op,
                        expr: Box::new(expr),
                    },
                    span,
                    tid,
                )
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.check_value(*lhs, errors);
                let rhs = self.check_value(*rhs, errors);
                self.check_binary(op, lhs, rhs, span, errors)
            }
            ExprKind::Assign { lhs, rhs } => {
                let lhs = self.check_expr(*lhs, errors);
                let rhs = self.check_value(*rhs, errors);

                if let ExprKind::Field { fid, .. } = &lhs.kind {
                    // The implicit array length field is read-only.
                    if *fid == FieldId::ARRAY_LENGTH {
                        errors.append(crate::weed::Error {
                            span: lhs.span,
                            kind: crate::weed::ErrorKind::InvalidLHS,
                        });
                    }
                }

                if lhs.tid.is_valid() {
                    self.expect_assignable(lhs.tid, &rhs, errors);
                }
                let tid = lhs.tid;
                Expr::typed(
                    ExprKind::Assign {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    span,
                    tid,
                )
            }
        }
    }

    fn check_lit(&mut self, lit: Lit, span: Span) -> Expr {
        let (lit, tid) = match lit {
            Lit::Int(value) => (Lit::Int(value), TypeId::INT),
            Lit::Char(value) => (Lit::Char(value), TypeId::CHAR),
            Lit::Bool(value) => (Lit::Bool(value), TypeId::BOOL),
            Lit::Null => (Lit::Null, TypeId::NULL),
            Lit::String(symbol, _) => {
                let sid = self.strings.intern(symbol);
                (Lit::String(symbol, sid), self.string_tid)
            }
        };
        Expr::typed(ExprKind::Lit(lit), span, tid)
    }

    fn expect_numeric(&self, expr: &Expr, errors: &mut ErrorList) {
        if expr.tid.is_valid() && !expr.tid.is_numeric() {
            self.error(errors, expr.span, ErrorKind::TypeMismatch);
        }
    }

    /// Resolves an unqualified or qualified name into a local, a field
    /// chain, or a static type reference.
    fn check_name(&mut self, name: QualifiedName, span: Span, errors: &mut ErrorList) -> Expr {
        let head = name.parts[0];

        // Innermost first: locals, then the current type's fields,
        // then a type prefix.
        let base = if let Some((lid, tid)) = self.locals.lookup(head) {
            if self.locals.is_initializing(head) {
                self.error(
                    errors,
                    span,
                    ErrorKind::VariableInitializerSelfReference,
                );
            }
            Some(Expr::typed(ExprKind::Local(lid, head), span, tid))
        } else if self
            .tinfo
            .get(self.cur_type)
            .and_then(|info| info.fields.resolve(head))
            .is_some()
        {
            let receiver = if self
                .tinfo
                .lookup(self.cur_type)
                .fields
                .resolve(head)
                .map(|finfo| finfo.mods.is_static())
                .unwrap_or(false)
            {
                Expr::typed(ExprKind::StaticRef(self.cur_type), span, self.cur_type)
            } else {
                if self.cur_static {
                    self.error(errors, span, ErrorKind::InstanceMemberFromStatic);
                }
                Expr::typed(ExprKind::This, span, self.cur_type)
            };
            let ident = Ident {
                symbol: head,
                span,
            };
            Some(self.check_field(receiver, ident, span, errors))
        } else {
            None
        };

        match base {
            Some(mut expr) => {
                for part in &name.parts[1..] {
                    let ident = Ident {
                        symbol: *part,
                        span,
                    };
                    expr = self.check_field(expr, ident, span, errors);
                }
                expr
            }
            None => {
                // A leading type name turns the chain into a static
                // member access.
                match self.scoped.get_prefix(&name.parts) {
                    Some((tid, consumed)) => {
                        let mut expr = Expr::typed(ExprKind::StaticRef(tid), span, tid);
                        for part in &name.parts[consumed..] {
                            let ident = Ident {
                                symbol: *part,
                                span,
                            };
                            expr = self.check_field(expr, ident, span, errors);
                        }
                        expr
                    }
                    None => {
                        self.error(errors, span, ErrorKind::UndefinedReference);
                        Expr::typed(ExprKind::Name(name), span, TypeId::ERROR)
                    }
                }
            }
        }
    }

    fn check_field(&mut self, base: Expr, name: Ident, span: Span, errors: &mut ErrorList) -> Expr {
        let is_static_ref = matches!(base.kind, ExprKind::StaticRef(_));
        let base_tid = base.tid;

        if !base_tid.is_valid() {
            return Expr::typed(
                ExprKind::Field {
                    base: Box::new(base),
                    name,
                    fid: FieldId::ERROR,
                    owner: TypeId::ERROR,
                },
                span,
                TypeId::ERROR,
            );
        }

        // The only member of an array type is `length`.
        if base_tid.is_array() {
            if name.symbol.as_str() == "length" {
                return Expr::typed(
                    ExprKind::Field {
                        base: Box::new(base),
                        name,
                        fid: FieldId::ARRAY_LENGTH,
                        owner: base_tid,
                    },
                    span,
                    TypeId::INT,
                );
            }
            self.error(errors, name.span, ErrorKind::UndefinedReference);
            return Expr::typed(
                ExprKind::Field {
                    base: Box::new(base),
                    name,
                    fid: FieldId::ERROR,
                    owner: TypeId::ERROR,
                },
                span,
                TypeId::ERROR,
            );
        }

        if !base_tid.is_reference() {
            self.error(errors, base.span, ErrorKind::FieldOnNonReference);
            return Expr::typed(
                ExprKind::Field {
                    base: Box::new(base),
                    name,
                    fid: FieldId::ERROR,
                    owner: TypeId::ERROR,
                },
                span,
                TypeId::ERROR,
            );
        }

        let finfo = self
            .tinfo
            .get(base_tid)
            .and_then(|info| info.fields.resolve(name.symbol))
            .cloned();

        match finfo {
            None => {
                self.error(errors, name.span, ErrorKind::UndefinedReference);
                Expr::typed(
                    ExprKind::Field {
                        base: Box::new(base),
                        name,
                        fid: FieldId::ERROR,
                        owner: TypeId::ERROR,
                    },
                    span,
                    TypeId::ERROR,
                )
            }
            Some(finfo) => {
                if is_static_ref && !finfo.mods.is_static() {
                    self.error(errors, name.span, ErrorKind::InstanceMemberFromStatic);
                }
                if !is_static_ref && finfo.mods.is_static() {
                    self.error(errors, name.span, ErrorKind::StaticMemberFromInstance);
                }
                if !self.accessible(&finfo.mods, finfo.owner, base_tid) {
                    self.error(errors, name.span, ErrorKind::ProtectedAccess);
                }
                Expr::typed(
                    ExprKind::Field {
                        base: Box::new(base),
                        name,
                        fid: finfo.fid,
                        owner: finfo.owner,
                    },
                    span,
                    finfo.tid,
                )
            }
        }
    }

    /// Picks the unique applicable method for the argument types:
    /// exact parameter-type matches win, then a single widening match.
    fn resolve_call(
        &self,
        receiver: TypeId,
        name: Symbol,
        is_constructor: bool,
        args: &[Expr],
        span: Span,
        errors: &mut ErrorList,
    ) -> Option<MethodInfo> {
        let table_tid = if receiver.is_array() {
            self.object_tid
        } else {
            receiver
        };
        let info = self.tinfo.get(table_tid)?;

        let candidates: Vec<&MethodInfo> = info
            .methods
            .with_name(name, is_constructor)
            .filter(|minfo| minfo.signature.params.len() == args.len())
            .collect();

        let exact: Vec<&&MethodInfo> = candidates
            .iter()
            .filter(|minfo| {
                minfo
                    .signature
                    .params
                    .iter()
                    .zip(args)
                    .all(|(param, arg)| *param == arg.tid)
            })
            .collect();

        if let [minfo] = exact.as_slice() {
            return Some((**minfo).clone());
        }

        let applicable: Vec<&&MethodInfo> = candidates
            .iter()
            .filter(|minfo| {
                minfo
                    .signature
                    .params
                    .iter()
                    .zip(args)
                    .all(|(param, arg)| self.assignable(*param, arg.tid))
            })
            .collect();

        match applicable.as_slice() {
            [] => {
                let kind = if is_constructor {
                    ErrorKind::NoMatchingConstructor
                } else {
                    ErrorKind::NoMatchingMethod
                };
                self.error(errors, span, kind);
                None
            }
            [minfo] => Some((***minfo).clone()),
            _ => {
                self.error(errors, span, ErrorKind::AmbiguousMethod);
                None
            }
        }
    }

    fn check_call(
        &mut self,
        base: Option<Box<Expr>>,
        name: Ident,
        args: Vec<Expr>,
        span: Span,
        errors: &mut ErrorList,
    ) -> Expr {
        let args: Vec<Expr> = args
            .into_iter()
            .map(|arg| self.check_value(arg, errors))
            .collect();

        // Bail out quietly when any argument already failed.
        if args.iter().any(|arg| !arg.tid.is_valid()) {
            return Expr::typed(
                ExprKind::Call {
                    base: base.map(|base| Box::new(self.check_expr(*base, errors))),
                    name,
                    args,
                    mid: crate::data::ids::MethodId::ERROR,
                    owner: TypeId::ERROR,
                    is_static: false,
                },
                span,
                TypeId::ERROR,
            );
        }

        let (base, receiver_tid, is_static_ref) = match base {
            None => {
                // Implicit receiver: the current type.
                (None, self.cur_type, false)
            }
            Some(base) => {
                let base = self.check_expr(*base, errors);
                if !base.tid.is_valid() {
                    return Expr::typed(
                        ExprKind::Call {
                            base: Some(Box::new(base)),
                            name,
                            args,
                            mid: crate::data::ids::MethodId::ERROR,
                            owner: TypeId::ERROR,
                            is_static: false,
                        },
                        span,
                        TypeId::ERROR,
                    );
                }
                if !base.tid.is_reference() && !matches!(base.kind, ExprKind::StaticRef(_)) {
                    self.error(errors, base.span, ErrorKind::CallOnNonReference);
                }
                let is_static_ref = matches!(base.kind, ExprKind::StaticRef(_));
                let tid = base.tid;
                (Some(Box::new(base)), tid, is_static_ref)
            }
        };

        let minfo = self.resolve_call(receiver_tid, name.symbol, false, &args, span, errors);

        match minfo {
            None => Expr::typed(
                ExprKind::Call {
                    base,
                    name,
                    args,
                    mid: crate::data::ids::MethodId::ERROR,
                    owner: TypeId::ERROR,
                    is_static: false,
                },
                span,
                TypeId::ERROR,
            ),
            Some(minfo) => {
                let is_static = minfo.mods.is_static();

                if is_static_ref && !is_static {
                    self.error(errors, name.span, ErrorKind::InstanceMemberFromStatic);
                }
                if !is_static_ref && base.is_some() && is_static {
                    self.error(errors, name.span, ErrorKind::StaticMemberFromInstance);
                }
                if base.is_none() && !is_static && self.cur_static {
                    self.error(errors, name.span, ErrorKind::InstanceMemberFromStatic);
                }
                if !self.accessible(&minfo.mods, minfo.owner, receiver_tid) {
                    self.error(errors, name.span, ErrorKind::ProtectedAccess);
                }

                Expr::typed(
                    ExprKind::Call {
                        base,
                        name,
                        args,
                        mid: minfo.mid,
                        owner: minfo.owner,
                        is_static,
                    },
                    span,
                    minfo.ret,
                )
            }
        }
    }

    fn check_new(
        &mut self,
        ty: QualifiedName,
        args: Vec<Expr>,
        span: Span,
        errors: &mut ErrorList,
    ) -> Expr {
        let tid = self.scoped.get(&ty.qualified(), ty.span, errors);
        let args: Vec<Expr> = args
            .into_iter()
            .map(|arg| self.check_value(arg, errors))
            .collect();

        let info = match self.tinfo.get(tid) {
            Some(info) => info,
            None => {
                return Expr::typed(
                    ExprKind::New {
                        ty,
                        args,
                        mid: crate::data::ids::MethodId::ERROR,
                    },
                    span,
                    TypeId::ERROR,
                )
            }
        };

        match info.kind {
            TypeKind::Interface => {
                self.error(errors, ty.span, ErrorKind::NewInterface);
            }
            TypeKind::Class if info.mods.is_abstract() => {
                self.error(errors, ty.span, ErrorKind::NewAbstractClass);
            }
            TypeKind::Class => {}
        }

        let class_name = info.name;
        if args.iter().any(|arg| !arg.tid.is_valid()) {
            return Expr::typed(
                ExprKind::New {
                    ty,
                    args,
                    mid: crate::data::ids::MethodId::ERROR,
                },
                span,
                tid,
            );
        }

        let minfo = self.resolve_call(tid, class_name, true, &args, span, errors);
        let mid = match minfo {
            Some(minfo) => {
                // Protected constructors are package-scoped.
                if minfo.mods.is_protected() {
                    let same_package = self
                        .tinfo
                        .get(self.cur_type)
                        .map(|caller| caller.package == info.package)
                        .unwrap_or(false);
                    if !same_package {
                        self.error(errors, ty.span, ErrorKind::ProtectedAccess);
                    }
                }
                minfo.mid
            }
            None => crate::data::ids::MethodId::ERROR,
        };

        Expr::typed(ExprKind::New { ty, args, mid }, span, tid)
    }

    fn check_binary(
        &mut self,
        op: BinOp,
        lhs: Expr,
        rhs: Expr,
        span: Span,
        errors: &mut ErrorList,
    ) -> Expr {
        let both_valid = lhs.tid.is_valid() && rhs.tid.is_valid();

        let tid = if !both_valid {
            TypeId::ERROR
        } else if op.is_boolean() {
            if !lhs.tid.is_bool() || !rhs.tid.is_bool() {
                self.error(errors, span, ErrorKind::TypeMismatch);
                TypeId::ERROR
            } else {
                TypeId::BOOL
            }
        } else if op == BinOp::Add
            && (lhs.tid == self.string_tid || rhs.tid == self.string_tid)
        {
            // String concatenation accepts any non-void operand.
            if lhs.tid.is_void() || rhs.tid.is_void() {
                self.error(errors, span, ErrorKind::TypeMismatch);
                TypeId::ERROR
            } else {
                self.string_tid
            }
        } else if op.is_arithmetic() {
            if !lhs.tid.is_numeric() || !rhs.tid.is_numeric() {
                self.error(errors, span, ErrorKind::TypeMismatch);
                TypeId::ERROR
            } else {
                TypeId::INT
            }
        } else if op.is_relational() {
            if !lhs.tid.is_numeric() || !rhs.tid.is_numeric() {
                self.error(errors, span, ErrorKind::TypeMismatch);
                TypeId::ERROR
            } else {
                TypeId::BOOL
            }
        } else {
            // Equality: two numerics, two booleans, or two compatible
            // references.
            let numeric = lhs.tid.is_numeric() && rhs.tid.is_numeric();
            let boolean = lhs.tid.is_bool() && rhs.tid.is_bool();
            let reference = (lhs.tid.is_reference() || lhs.tid.is_null())
                && (rhs.tid.is_reference() || rhs.tid.is_null())
                && (self.castable(lhs.tid, rhs.tid) || self.castable(rhs.tid, lhs.tid));
            if numeric || boolean || reference {
                TypeId::BOOL
            } else {
                self.error(errors, span, ErrorKind::TypeMismatch);
                TypeId::ERROR
            }
        };

        if tid.is_valid() {
            if let (Some(left), Some(right)) = (lhs.constant(), rhs.constant()) {
                if let Some(folded) = fold::fold_binary(op, left, right, self.strings) {
                    return self.check_lit(folded, span);
                }
            }
        }

        Expr::typed(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
            tid,
        )
    }
}

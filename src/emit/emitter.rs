use crate::abi::RuntimeLinkIds;
use crate::check::TypeInfoMap;
use crate::data::ast;
use crate::data::ast::BinOp;
use crate::data::ast::ExprKind;
use crate::data::ast::Lit;
use crate::data::ast::UnOp;
use crate::data::ids::MethodId;
use crate::data::ids::TypeId;
use crate::data::ids::TypeKind;
use crate::data::ir;
use crate::data::ir::SizeClass;
use crate::data::span::Span;
use crate::emit::stream::Mem;
use crate::emit::stream::StreamBuilder;
use crate::Map;

/// Lowers the typed program to per-method IR streams. The entry
/// point is the first `static int test()` found in unit order.
pub fn emit_program(
    program: &ast::Program,
    tinfo: &TypeInfoMap,
    links: &RuntimeLinkIds,
    filenames: &[String],
) -> ir::Program {
    let entry = find_entry_point(program, tinfo);
    log::info!(
        "lowering {} units, entry point {:?}",
        program.units.len(),
        entry
    );
    let units = program
        .units
        .iter()
        .map(|unit| emit_unit(unit, tinfo, links, entry, filenames))
        .collect();
    ir::Program { units }
}

fn find_entry_point(program: &ast::Program, tinfo: &TypeInfoMap) -> Option<(TypeId, MethodId)> {
    for unit in &program.units {
        for decl in &unit.decls {
            for member in &decl.members {
                if let ast::Member::Method(method) = member {
                    if method.mods.is_static()
                        && method.params.is_empty()
                        && method.name.symbol.as_str() == "test"
                        && method.mid != MethodId::ERROR
                    {
                        let owner = tinfo.iter().find(|info| {
                            info.methods
                                .get(method.mid)
                                .map(|minfo| minfo.owner == info.tid)
                                .unwrap_or(false)
                        });
                        if let Some(info) = owner {
                            return Some((info.tid, method.mid));
                        }
                    }
                }
            }
        }
    }
    None
}

/// Lowers one compilation unit. `entry` marks the program entry point
/// so its stream carries the `_entry` label.
pub fn emit_unit(
    unit: &ast::CompUnit,
    tinfo: &TypeInfoMap,
    links: &RuntimeLinkIds,
    entry: Option<(TypeId, MethodId)>,
    filenames: &[String],
) -> ir::CompUnit {
    let mut types = Vec::new();

    for decl in &unit.decls {
        let info = match tinfo
            .iter()
            .find(|info| info.file == unit.file && info.name == decl.name.symbol)
        {
            Some(info) => info,
            None => continue,
        };
        let tid = info.tid;
        let mut streams = Vec::new();

        // Every type gets a runtime type-info initializer; classes
        // additionally get instance and static initializers.
        streams.push(emit_type_init(decl, tid, tinfo, links, unit.file));

        if decl.kind == TypeKind::Class {
            streams.push(emit_instance_init(decl, tid, tinfo, links, unit.file));
            streams.push(emit_static_init(decl, tid, tinfo, links, unit.file));

            for member in &decl.members {
                let method = match member {
                    ast::Member::Method(method) => method,
                    ast::Member::Field(_) => continue,
                };
                if method.body.is_none() || method.mid == MethodId::ERROR {
                    continue;
                }
                let is_entry = entry == Some((tid, method.mid));
                streams.push(emit_method(method, tid, tinfo, links, unit.file, is_entry));
            }
        }

        types.push(ir::Type { tid, streams });
    }

    ir::CompUnit {
        file: unit.file,
        filename: filenames
            .get(unit.file)
            .cloned()
            .unwrap_or_else(|| format!("f{}", unit.file)),
        types,
    }
}

fn size_of(tid: TypeId) -> SizeClass {
    if tid.is_void() {
        SizeClass::Int
    } else {
        SizeClass::from_tid(tid)
    }
}

fn emit_method(
    method: &ast::MethodDecl,
    tid: TypeId,
    tinfo: &TypeInfoMap,
    links: &RuntimeLinkIds,
    file: usize,
    is_entry: bool,
) -> ir::Stream {
    let mut sizes = Vec::new();
    if !method.mods.is_static() {
        sizes.push(SizeClass::Ptr);
    }
    sizes.extend(method.params.iter().map(|param| size_of(param.tid)));

    let mut builder = StreamBuilder::new();
    let params = builder.alloc_params(&sizes);

    let mut emitter = MethodEmitter {
        b: builder,
        tinfo,
        links,
        file,
        cur_type: tid,
        this_mem: None,
        locals: Map::default(),
    };

    let mut params = params.into_iter();
    if !method.mods.is_static() {
        emitter.this_mem = params.next();
    }
    for (param, mem) in method.params.iter().zip(params) {
        emitter.locals.insert(param.lid.0, mem);
    }

    // Constructors run the zero-argument superclass constructor
    // before their own body.
    if method.is_constructor() {
        if let Some(parent) = class_parent(tinfo, tid) {
            let parent_ctor = zero_arg_constructor(tinfo, parent);
            if let Some(parent_ctor) = parent_ctor {
                let this = emitter.this_mem.expect("constructor without receiver");
                let dummy = emitter.b.alloc_temp(SizeClass::Int);
                emitter.b.static_call(dummy, parent, parent_ctor, &[this], 0);
                emitter.b.dealloc(dummy);
            }
        }
    }

    if let Some(body) = &method.body {
        emitter.block(body);
    }
    emitter.b.ret();

    emitter.b.build(is_entry, tid, method.mid)
}

fn class_parent(tinfo: &TypeInfoMap, tid: TypeId) -> Option<TypeId> {
    tinfo
        .get(tid)?
        .extends
        .iter()
        .copied()
        .find(|parent| {
            tinfo
                .get(*parent)
                .map(|info| info.kind == TypeKind::Class)
                .unwrap_or(false)
        })
}

fn zero_arg_constructor(tinfo: &TypeInfoMap, tid: TypeId) -> Option<MethodId> {
    tinfo.get(tid)?.methods.iter().find_map(|minfo| {
        (minfo.signature.is_constructor && minfo.signature.params.is_empty()).then(|| minfo.mid)
    })
}

/// The synthesized instance initializer: the superclass initializer,
/// then each non-static field initializer in declaration order.
fn emit_instance_init(
    decl: &ast::TypeDecl,
    tid: TypeId,
    tinfo: &TypeInfoMap,
    links: &RuntimeLinkIds,
    file: usize,
) -> ir::Stream {
    let mut builder = StreamBuilder::new();
    let params = builder.alloc_params(&[SizeClass::Ptr]);

    let mut emitter = MethodEmitter {
        b: builder,
        tinfo,
        links,
        file,
        cur_type: tid,
        this_mem: Some(params[0]),
        locals: Map::default(),
    };

    if let Some(parent) = class_parent(tinfo, tid) {
        let this = params[0];
        let dummy = emitter.b.alloc_temp(SizeClass::Int);
        emitter
            .b
            .static_call(dummy, parent, MethodId::INSTANCE_INIT, &[this], 0);
        emitter.b.dealloc(dummy);
    }

    for member in &decl.members {
        let field = match member {
            ast::Member::Field(field) if !field.mods.is_static() => field,
            _ => continue,
        };
        let init = match &field.init {
            Some(init) => init,
            None => continue,
        };

        let this = params[0];
        let val = emitter.b.alloc_temp(size_of(field.tid));
        emitter.expr_widened(init, val);
        let addr = emitter.b.alloc_temp(SizeClass::Ptr);
        emitter
            .b
            .field_addr(addr, Some(this), field.fid, line(field.span));
        emitter.b.mov_to_addr(addr, val);
        emitter.b.dealloc(addr);
        emitter.b.dealloc(val);
    }

    emitter.b.ret();
    emitter.b.build(false, tid, MethodId::INSTANCE_INIT)
}

/// The synthesized static initializer: each static field initializer
/// in declaration order.
fn emit_static_init(
    decl: &ast::TypeDecl,
    tid: TypeId,
    tinfo: &TypeInfoMap,
    links: &RuntimeLinkIds,
    file: usize,
) -> ir::Stream {
    let mut emitter = MethodEmitter {
        b: StreamBuilder::new(),
        tinfo,
        links,
        file,
        cur_type: tid,
        this_mem: None,
        locals: Map::default(),
    };

    for member in &decl.members {
        let field = match member {
            ast::Member::Field(field) if field.mods.is_static() => field,
            _ => continue,
        };
        let init = match &field.init {
            Some(init) => init,
            None => continue,
        };

        let val = emitter.b.alloc_temp(size_of(field.tid));
        emitter.expr_widened(init, val);
        let addr = emitter.b.alloc_temp(SizeClass::Ptr);
        emitter.b.field_addr(addr, None, field.fid, line(field.span));
        emitter.b.mov_to_addr(addr, val);
        emitter.b.dealloc(addr);
        emitter.b.dealloc(val);
    }

    emitter.b.ret();
    emitter.b.build(false, tid, MethodId::STATIC_INIT)
}

/// The synthesized type initializer: builds the runtime `TypeInfo`
/// whose parents array concatenates extends and implements, and
/// stores it in the type's static slot. Topological order of
/// `_static_init` guarantees parents are built first.
fn emit_type_init(
    _decl: &ast::TypeDecl,
    tid: TypeId,
    tinfo: &TypeInfoMap,
    links: &RuntimeLinkIds,
    file: usize,
) -> ir::Stream {
    let mut emitter = MethodEmitter {
        b: StreamBuilder::new(),
        tinfo,
        links,
        file,
        cur_type: tid,
        this_mem: None,
        locals: Map::default(),
    };

    // Without the internal library there is no runtime type info.
    if !emitter.links.type_info.is_valid() {
        emitter.b.ret();
        return emitter.b.build(false, tid, MethodId::TYPE_INIT);
    }

    let type_info = emitter.links.type_info;
    let parents: Vec<TypeId> = emitter
        .tinfo
        .get(tid)
        .map(|info| info.parents().collect())
        .unwrap_or_default();

    let parents_arr = emitter.b.alloc_temp(SizeClass::Ptr);
    let len = emitter.b.alloc_temp(SizeClass::Int);
    emitter.b.const_i32(len, parents.len() as i32);
    emitter.b.alloc_array(parents_arr, len, type_info, 0);
    emitter.b.dealloc(len);

    for (index, parent) in parents.iter().enumerate() {
        let slot = emitter.links.typeinfo_slot(*parent);
        let pinfo = emitter.b.alloc_temp(SizeClass::Ptr);
        emitter.b.field_deref(pinfo, None, slot, 0);
        let idx = emitter.b.alloc_temp(SizeClass::Int);
        emitter.b.const_i32(idx, index as i32);
        let addr = emitter.b.alloc_temp(SizeClass::Ptr);
        emitter
            .b
            .array_addr(addr, parents_arr, idx, SizeClass::Ptr, 0);
        emitter.b.mov_to_addr(addr, pinfo);
        emitter.b.dealloc(addr);
        emitter.b.dealloc(idx);
        emitter.b.dealloc(pinfo);
    }

    let obj = emitter.b.alloc_temp(SizeClass::Ptr);
    emitter.b.alloc_heap(obj, type_info);
    let dummy = emitter.b.alloc_temp(SizeClass::Int);
    emitter
        .b
        .static_call(dummy, type_info, MethodId::INSTANCE_INIT, &[obj], 0);
    let tid_const = emitter.b.alloc_temp(SizeClass::Int);
    emitter.b.const_i32(tid_const, tid.base as i32);
    emitter.b.static_call(
        dummy,
        type_info,
        emitter.links.type_info_ctor,
        &[obj, tid_const, parents_arr],
        0,
    );
    emitter.b.dealloc(tid_const);
    emitter.b.dealloc(dummy);

    let addr = emitter.b.alloc_temp(SizeClass::Ptr);
    emitter
        .b
        .field_addr(addr, None, emitter.links.typeinfo_slot(tid), 0);
    emitter.b.mov_to_addr(addr, obj);
    emitter.b.dealloc(addr);
    emitter.b.dealloc(obj);
    emitter.b.dealloc(parents_arr);

    emitter.b.ret();
    emitter.b.build(false, tid, MethodId::TYPE_INIT)
}

fn line(span: Span) -> u64 {
    span.lo.row as u64
}

struct MethodEmitter<'a> {
    b: StreamBuilder,
    tinfo: &'a TypeInfoMap,
    links: &'a RuntimeLinkIds,
    file: usize,
    cur_type: TypeId,
    this_mem: Option<Mem>,
    locals: Map<u64, Mem>,
}

impl<'a> MethodEmitter<'a> {
    fn block(&mut self, block: &ast::Block) {
        let mut scoped = Vec::new();
        for stmt in &block.stmts {
            self.stmt(stmt, &mut scoped);
        }
        for mem in scoped.into_iter().rev() {
            self.b.dealloc(mem);
        }
    }

    fn stmt(&mut self, stmt: &ast::Stmt, scoped: &mut Vec<Mem>) {
        match stmt {
            ast::Stmt::Empty(_) => {}
            ast::Stmt::Expr(expr) => {
                let dst = self.b.alloc_temp(size_of(expr.tid));
                self.expr(expr, dst);
                self.b.dealloc(dst);
            }
            ast::Stmt::Block(block) => self.block(block),
            ast::Stmt::If {
                cond, then, els, ..
            } => {
                let cond_mem = self.b.alloc_temp(SizeClass::Bool);
                self.expr(cond, cond_mem);
                self.b.not(cond_mem, cond_mem);
                let l_false = self.b.alloc_label();
                self.b.jmp_if(l_false, cond_mem);
                self.b.dealloc(cond_mem);

                let mut inner = Vec::new();
                self.stmt(then, &mut inner);
                for mem in inner.into_iter().rev() {
                    self.b.dealloc(mem);
                }

                match els {
                    None => self.b.emit_label(l_false),
                    Some(els) => {
                        let l_end = self.b.alloc_label();
                        self.b.jmp(l_end);
                        self.b.emit_label(l_false);
                        let mut inner = Vec::new();
                        self.stmt(els, &mut inner);
                        for mem in inner.into_iter().rev() {
                            self.b.dealloc(mem);
                        }
                        self.b.emit_label(l_end);
                    }
                }
            }
            ast::Stmt::While { cond, body, .. } => {
                let cond_mem = self.b.alloc_temp(SizeClass::Bool);
                let l_begin = self.b.alloc_label();
                let l_end = self.b.alloc_label();
                self.b.emit_label(l_begin);
                self.expr(cond, cond_mem);
                self.b.not(cond_mem, cond_mem);
                self.b.jmp_if(l_end, cond_mem);

                let mut inner = Vec::new();
                self.stmt(body, &mut inner);
                for mem in inner.into_iter().rev() {
                    self.b.dealloc(mem);
                }

                self.b.jmp(l_begin);
                self.b.emit_label(l_end);
                self.b.dealloc(cond_mem);
            }
            ast::Stmt::For {
                init,
                cond,
                update,
                body,
                ..
            } => {
                let mut for_scope = Vec::new();
                if let Some(init) = init {
                    self.stmt(init, &mut for_scope);
                }

                let cond_mem = self.b.alloc_temp(SizeClass::Bool);
                let l_begin = self.b.alloc_label();
                let l_end = self.b.alloc_label();
                self.b.emit_label(l_begin);
                match cond {
                    Some(cond) => {
                        self.expr(cond, cond_mem);
                        self.b.not(cond_mem, cond_mem);
                        self.b.jmp_if(l_end, cond_mem);
                    }
                    None => {}
                }

                let mut inner = Vec::new();
                self.stmt(body, &mut inner);
                for mem in inner.into_iter().rev() {
                    self.b.dealloc(mem);
                }

                if let Some(update) = update {
                    let dst = self.b.alloc_temp(size_of(update.tid));
                    self.expr(update, dst);
                    self.b.dealloc(dst);
                }
                self.b.jmp(l_begin);
                self.b.emit_label(l_end);
                self.b.dealloc(cond_mem);

                for mem in for_scope.into_iter().rev() {
                    self.b.dealloc(mem);
                }
            }
            ast::Stmt::Return(value, _) => match value {
                None => self.b.ret(),
                Some(value) => {
                    let dst = self.b.alloc_temp(size_of(value.tid));
                    self.expr(value, dst);
                    self.b.ret_value(dst);
                    self.b.dealloc(dst);
                }
            },
            ast::Stmt::LocalDecl {
                init, tid, lid, ..
            } => {
                let slot = self.b.alloc_local(lid.0, size_of(*tid));
                scoped.push(slot);
                self.locals.insert(lid.0, slot);
                if let Some(init) = init {
                    self.expr_widened(init, slot);
                }
            }
        }
    }

    /// Evaluates `expr` into `dst`, widening or truncating when the
    /// expression's natural width differs from the slot's.
    fn expr_widened(&mut self, expr: &ast::Expr, dst: Mem) {
        let natural = size_of(expr.tid);
        if natural == dst.size() {
            self.expr(expr, dst);
            return;
        }
        let raw = self.b.alloc_temp(natural);
        self.expr(expr, raw);
        if natural.width() < dst.size().width() {
            self.b.extend(dst, raw);
        } else {
            self.b.truncate(dst, raw);
        }
        self.b.dealloc(raw);
    }

    fn expr(&mut self, expr: &ast::Expr, dst: Mem) {
        match &expr.kind {
            ExprKind::Lit(Lit::Int(value)) => self.b.const_i32(dst, *value),
            ExprKind::Lit(Lit::Char(value)) => self.b.const_char(dst, *value),
            ExprKind::Lit(Lit::Bool(value)) => self.b.const_bool(dst, *value),
            ExprKind::Lit(Lit::Null) => self.b.const_null(dst),
            ExprKind::Lit(Lit::String(_, sid)) => self.b.const_str(dst, *sid),
            ExprKind::This => {
                let this = self.this_mem.expect("'this' outside instance context");
                self.b.mov(dst, this);
            }
            ExprKind::Local(lid, _) => {
                let slot = self.locals[&lid.0];
                self.b.mov(dst, slot);
            }
            ExprKind::Name(_) | ExprKind::StaticRef(_) => {
                unreachable!("unresolved name survived type checking")
            }
            ExprKind::Field { base, fid, .. } => {
                if matches!(base.kind, ExprKind::StaticRef(_)) {
                    self.b.field_deref(dst, None, *fid, line(expr.span));
                } else {
                    let obj = self.b.alloc_temp(SizeClass::Ptr);
                    self.expr(base, obj);
                    self.b.field_deref(dst, Some(obj), *fid, line(expr.span));
                    self.b.dealloc(obj);
                }
            }
            ExprKind::Call {
                base,
                args,
                mid,
                owner,
                is_static,
                ..
            } => {
                self.call(dst, base.as_deref(), args, *mid, *owner, *is_static, expr.span);
            }
            ExprKind::Index { base, index } => {
                let arr = self.b.alloc_temp(SizeClass::Ptr);
                self.expr(base, arr);
                let idx = self.b.alloc_temp(SizeClass::Int);
                self.expr_widened(index, idx);
                self.b
                    .array_deref(dst, arr, idx, size_of(expr.tid), line(expr.span));
                self.b.dealloc(idx);
                self.b.dealloc(arr);
            }
            ExprKind::New { args, mid, .. } => {
                let tid = expr.tid;
                self.b.alloc_heap(dst, tid);
                let dummy = self.b.alloc_temp(SizeClass::Int);
                self.b
                    .static_call(dummy, tid, MethodId::INSTANCE_INIT, &[dst], line(expr.span));
                self.b.dealloc(dummy);

                let params = self.param_types(tid, *mid);
                let mut arg_mems = vec![dst];
                let mut allocated = Vec::new();
                for (arg, param) in args.iter().zip(params) {
                    let mem = self.b.alloc_temp(size_of(param));
                    self.expr_widened(arg, mem);
                    arg_mems.push(mem);
                    allocated.push(mem);
                }
                let dummy = self.b.alloc_temp(SizeClass::Int);
                self.b.static_call(dummy, tid, *mid, &arg_mems, line(expr.span));
                self.b.dealloc(dummy);
                for mem in allocated.into_iter().rev() {
                    self.b.dealloc(mem);
                }
            }
            ExprKind::NewArray { len, .. } => {
                let elem = expr.tid.element();
                let len_mem = self.b.alloc_temp(SizeClass::Int);
                self.expr_widened(len, len_mem);
                self.b.alloc_array(dst, len_mem, elem, line(expr.span));
                self.b.dealloc(len_mem);
            }
            ExprKind::Cast { expr: inner, .. } => {
                let target = expr.tid;
                if target.is_primitive() {
                    let natural = size_of(inner.tid);
                    if natural == dst.size() {
                        self.expr(inner, dst);
                    } else {
                        let raw = self.b.alloc_temp(natural);
                        self.expr(inner, raw);
                        if natural.width() < dst.size().width() {
                            self.b.extend(dst, raw);
                        } else {
                            self.b.truncate(dst, raw);
                        }
                        self.b.dealloc(raw);
                    }
                } else {
                    self.expr(inner, dst);
                    // Upcasts need no runtime test.
                    if !self.is_static_upcast(inner.tid, target) {
                        self.emit_cast_check(dst, target, expr.span);
                    }
                }
            }
            ExprKind::InstanceOf { expr: inner, target, .. } => {
                let src = self.b.alloc_temp(SizeClass::Ptr);
                self.expr(inner, src);
                self.b.instance_of(dst, src, *target);
                self.b.dealloc(src);
            }
            ExprKind::Unary { op, expr: inner } => match op {
                UnOp::Neg => {
                    self.expr_widened(inner, dst);
                    self.b.neg(dst, dst);
                }
                UnOp::Not => {
                    self.expr(inner, dst);
                    self.b.not(dst, dst);
                }
            },
            ExprKind::Binary { op, lhs, rhs } => self.binary(dst, *op, lhs, rhs, expr),
            ExprKind::Assign { lhs, rhs } => self.assign(dst, lhs, rhs, expr.span),
        }
    }

    fn is_static_upcast(&self, from: TypeId, to: TypeId) -> bool {
        if from.is_null() || from == to {
            return true;
        }
        if to == self.links.object && from.is_reference() {
            return true;
        }
        from.ndims == to.ndims
            && from.ndims == 0
            && self.tinfo.is_ancestor(from, to)
    }

    /// `cond = value == null || value instanceof target`, then raise
    /// a class-cast exception when false.
    fn emit_cast_check(&mut self, value: Mem, target: TypeId, span: Span) {
        let ok = self.b.alloc_temp(SizeClass::Bool);
        self.b.instance_of(ok, value, target);
        let null_mem = self.b.alloc_temp(SizeClass::Ptr);
        self.b.const_null(null_mem);
        let is_null = self.b.alloc_temp(SizeClass::Bool);
        self.b.eq(is_null, value, null_mem);
        self.b.or(ok, ok, is_null);
        self.b.dealloc(is_null);
        self.b.dealloc(null_mem);
        self.b.cast_exception_if_false(ok, line(span));
        self.b.dealloc(ok);
    }

    fn param_types(&self, owner: TypeId, mid: MethodId) -> Vec<TypeId> {
        let table = if owner.is_array() {
            self.links.object
        } else {
            owner
        };
        self.tinfo
            .get(TypeId::base(table.base))
            .and_then(|info| info.methods.get(mid))
            .map(|minfo| minfo.signature.params.clone())
            .unwrap_or_default()
    }

    fn call(
        &mut self,
        dst: Mem,
        base: Option<&ast::Expr>,
        args: &[ast::Expr],
        mid: MethodId,
        owner: TypeId,
        is_static: bool,
        span: Span,
    ) {
        let params = self.param_types(owner, mid);
        let owner_base = TypeId::base(if owner.is_array() {
            self.links.object.base
        } else {
            owner.base
        });

        if is_static {
            let mut arg_mems = Vec::new();
            for (arg, param) in args.iter().zip(params) {
                let mem = self.b.alloc_temp(size_of(param));
                self.expr_widened(arg, mem);
                arg_mems.push(mem);
            }
            self.b.static_call(dst, owner_base, mid, &arg_mems, line(span));
            for mem in arg_mems.into_iter().rev() {
                self.b.dealloc(mem);
            }
            return;
        }

        // Receiver first, then arguments left to right.
        let this = self.b.alloc_temp(SizeClass::Ptr);
        match base {
            None => {
                let this_mem = self.this_mem.expect("instance call without receiver");
                self.b.mov(this, this_mem);
            }
            Some(base) => self.expr(base, this),
        }

        let mut arg_mems = Vec::new();
        for (arg, param) in args.iter().zip(params) {
            let mem = self.b.alloc_temp(size_of(param));
            self.expr_widened(arg, mem);
            arg_mems.push(mem);
        }

        self.b.dynamic_call(dst, this, mid, &arg_mems, line(span));

        for mem in arg_mems.into_iter().rev() {
            self.b.dealloc(mem);
        }
        self.b.dealloc(this);
    }

    fn binary(
        &mut self,
        dst: Mem,
        op: BinOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
        expr: &ast::Expr,
    ) {
        // String concatenation lowers through the runtime library.
        if op == BinOp::Add && expr.tid == self.links.string && self.links.string.is_valid() {
            return self.concat(dst, lhs, rhs, expr.span);
        }

        match op {
            BinOp::LAnd => {
                self.expr(lhs, dst);
                let not = self.b.alloc_temp(SizeClass::Bool);
                self.b.not(not, dst);
                let l_end = self.b.alloc_label();
                self.b.jmp_if(l_end, not);
                self.b.dealloc(not);
                self.expr(rhs, dst);
                self.b.emit_label(l_end);
            }
            BinOp::LOr => {
                self.expr(lhs, dst);
                let l_end = self.b.alloc_label();
                self.b.jmp_if(l_end, dst);
                self.expr(rhs, dst);
                self.b.emit_label(l_end);
            }
            BinOp::And | BinOp::Or | BinOp::Xor => {
                self.expr(lhs, dst);
                let r = self.b.alloc_temp(SizeClass::Bool);
                self.expr(rhs, r);
                match op {
                    BinOp::And => self.b.and(dst, dst, r),
                    BinOp::Or => self.b.or(dst, dst, r),
                    BinOp::Xor => self.b.xor(dst, dst, r),
                    _ => unreachable!(),
                }
                self.b.dealloc(r);
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let l = self.b.alloc_temp(SizeClass::Int);
                self.expr_widened(lhs, l);
                let r = self.b.alloc_temp(SizeClass::Int);
                self.expr_widened(rhs, r);
                match op {
                    BinOp::Add => self.b.add(dst, l, r),
                    BinOp::Sub => self.b.sub(dst, l, r),
                    BinOp::Mul => self.b.mul(dst, l, r),
                    BinOp::Div => self.b.div(dst, l, r, line(expr.span)),
                    BinOp::Mod => self.b.r#mod(dst, l, r, line(expr.span)),
                    _ => unreachable!(),
                }
                self.b.dealloc(r);
                self.b.dealloc(l);
            }
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let l = self.b.alloc_temp(SizeClass::Int);
                self.expr_widened(lhs, l);
                let r = self.b.alloc_temp(SizeClass::Int);
                self.expr_widened(rhs, r);
                match op {
                    BinOp::Lt => self.b.lt(dst, l, r),
                    BinOp::Gt => self.b.gt(dst, l, r),
                    BinOp::Le => self.b.leq(dst, l, r),
                    BinOp::Ge => self.b.geq(dst, l, r),
                    _ => unreachable!(),
                }
                self.b.dealloc(r);
                self.b.dealloc(l);
            }
            BinOp::Eq | BinOp::Ne => {
                let size = if lhs.tid.is_numeric() && rhs.tid.is_numeric() {
                    SizeClass::Int
                } else if lhs.tid.is_bool() {
                    SizeClass::Bool
                } else {
                    SizeClass::Ptr
                };
                let l = self.b.alloc_temp(size);
                self.expr_widened(lhs, l);
                let r = self.b.alloc_temp(size);
                self.expr_widened(rhs, r);
                match op {
                    BinOp::Eq => self.b.eq(dst, l, r),
                    BinOp::Ne => self.b.neq(dst, l, r),
                    _ => unreachable!(),
                }
                self.b.dealloc(r);
                self.b.dealloc(l);
            }
        }
    }

    /// `a + b` with a string result: `String.valueOf(a)` and
    /// `String.valueOf(b)` (which render null and primitives), then
    /// `concat`.
    fn concat(&mut self, dst: Mem, lhs: &ast::Expr, rhs: &ast::Expr, span: Span) {
        let string = self.links.string;

        let l_raw = self.b.alloc_temp(size_of(lhs.tid));
        self.expr(lhs, l_raw);
        let l_str = self.b.alloc_temp(SizeClass::Ptr);
        self.b
            .static_call(l_str, string, self.links.value_of(lhs.tid), &[l_raw], line(span));

        let r_raw = self.b.alloc_temp(size_of(rhs.tid));
        self.expr(rhs, r_raw);
        let r_str = self.b.alloc_temp(SizeClass::Ptr);
        self.b
            .static_call(r_str, string, self.links.value_of(rhs.tid), &[r_raw], line(span));

        self.b
            .dynamic_call(dst, l_str, self.links.string_concat, &[r_str], line(span));

        self.b.dealloc(r_str);
        self.b.dealloc(r_raw);
        self.b.dealloc(l_str);
        self.b.dealloc(l_raw);
    }

    /// Assignment: the left side is evaluated to storage, the right
    /// side to a value, and the store happens last, so a null array on
    /// the left only raises after the right side has run.
    fn assign(&mut self, dst: Mem, lhs: &ast::Expr, rhs: &ast::Expr, span: Span) {
        match &lhs.kind {
            ExprKind::Local(lid, _) => {
                let slot = self.locals[&lid.0];
                let val = self.b.alloc_temp(slot.size());
                self.expr_widened(rhs, val);
                self.b.mov(slot, val);
                self.b.mov(dst, val);
                self.b.dealloc(val);
            }
            ExprKind::Field { base, fid, .. } => {
                if matches!(base.kind, ExprKind::StaticRef(_)) {
                    let val = self.b.alloc_temp(size_of(lhs.tid));
                    self.expr_widened(rhs, val);
                    let addr = self.b.alloc_temp(SizeClass::Ptr);
                    self.b.field_addr(addr, None, *fid, line(span));
                    self.b.mov_to_addr(addr, val);
                    self.b.mov(dst, val);
                    self.b.dealloc(addr);
                    self.b.dealloc(val);
                } else {
                    let obj = self.b.alloc_temp(SizeClass::Ptr);
                    self.expr(base, obj);
                    let val = self.b.alloc_temp(size_of(lhs.tid));
                    self.expr_widened(rhs, val);
                    let addr = self.b.alloc_temp(SizeClass::Ptr);
                    self.b.field_addr(addr, Some(obj), *fid, line(span));
                    self.b.mov_to_addr(addr, val);
                    self.b.mov(dst, val);
                    self.b.dealloc(addr);
                    self.b.dealloc(val);
                    self.b.dealloc(obj);
                }
            }
            ExprKind::Index { base, index } => {
                let arr = self.b.alloc_temp(SizeClass::Ptr);
                self.expr(base, arr);
                let idx = self.b.alloc_temp(SizeClass::Int);
                self.expr_widened(index, idx);
                let val = self.b.alloc_temp(size_of(lhs.tid));
                self.expr_widened(rhs, val);
                let addr = self.b.alloc_temp(SizeClass::Ptr);
                self.b
                    .array_addr(addr, arr, idx, size_of(lhs.tid), line(span));
                // Covariant arrays make reference stores checked.
                if lhs.tid.is_reference() && !rhs.tid.is_null() {
                    self.b.check_array_store(arr, val, line(span));
                }
                self.b.mov_to_addr(addr, val);
                self.b.mov(dst, val);
                self.b.dealloc(addr);
                self.b.dealloc(val);
                self.b.dealloc(idx);
                self.b.dealloc(arr);
            }
            _ => unreachable!("invalid assignment target survived checking"),
        }
    }
}

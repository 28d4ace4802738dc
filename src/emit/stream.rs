use crate::data::ids::LabelId;
use crate::data::ids::MemId;
use crate::data::ids::MethodId;
use crate::data::ids::StringId;
use crate::data::ids::TypeId;
use crate::data::ir::Op;
use crate::data::ir::OpType;
use crate::data::ir::SizeClass;
use crate::data::ir::Stream;

/// A typed stack slot handle within one stream under construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mem {
    id: MemId,
    size: SizeClass,
}

impl Mem {
    pub fn id(&self) -> MemId {
        self.id
    }

    pub fn size(&self) -> SizeClass {
        self.size
    }
}

/// Builds the linear IR for one method. Allocation methods hand
/// out slots; emission methods append ops to the stream. Label ids are
/// unique within the stream; every label must be emitted exactly once.
///
/// Slot lifetimes are strictly LIFO: `dealloc` must release the most
/// recently allocated live slot, mirroring the writer's stack
/// discipline.
#[derive(Debug, Default)]
pub struct StreamBuilder {
    args: Vec<u64>,
    ops: Vec<Op>,
    params: Vec<SizeClass>,
    next_mem: u64,
    next_label: u64,
    live: Vec<MemId>,
    locals: Vec<(u64, u64)>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        StreamBuilder {
            next_mem: MemId::FIRST.0,
            ..Self::default()
        }
    }

    fn append(&mut self, ty: OpType, args: &[u64]) {
        let begin = self.args.len();
        self.args.extend_from_slice(args);
        let end = self.args.len();
        self.ops.push(Op { ty, begin, end });
    }

    /// Binds the parameter slots. Must run before any other
    /// allocation; parameters are never explicitly deallocated.
    pub fn alloc_params(&mut self, sizes: &[SizeClass]) -> Vec<Mem> {
        assert!(self.params.is_empty() && self.next_mem == MemId::FIRST.0);
        self.params = sizes.to_vec();
        sizes
            .iter()
            .map(|size| {
                let id = MemId(self.next_mem);
                self.next_mem += 1;
                Mem { id, size: *size }
            })
            .collect()
    }

    fn alloc(&mut self, size: SizeClass, immutable: bool) -> Mem {
        let id = MemId(self.next_mem);
        self.next_mem += 1;
        self.live.push(id);
        self.append(OpType::AllocMem, &[id.0, size as u64, immutable as u64]);
        Mem { id, size }
    }

    /// A short-lived slot for an intermediate value.
    pub fn alloc_temp(&mut self, size: SizeClass) -> Mem {
        self.alloc(size, false)
    }

    /// A slot backing a source-level local variable; recorded in the
    /// stream's local-slot map.
    pub fn alloc_local(&mut self, lid: u64, size: SizeClass) -> Mem {
        let mem = self.alloc(size, false);
        self.locals.push((lid, mem.id.0));
        mem
    }

    pub fn dealloc(&mut self, mem: Mem) {
        let top = self.live.pop().expect("dealloc with no live slots");
        assert_eq!(top, mem.id, "slot deallocation is LIFO");
        self.append(OpType::DeallocMem, &[mem.id.0]);
    }

    pub fn alloc_label(&mut self) -> LabelId {
        let label = LabelId(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn emit_label(&mut self, label: LabelId) {
        self.append(OpType::Label, &[label.0]);
    }

    pub fn const_i32(&mut self, dst: Mem, value: i32) {
        self.append(
            OpType::Const,
            &[dst.id.0, dst.size as u64, value as u32 as u64],
        );
    }

    pub fn const_bool(&mut self, dst: Mem, value: bool) {
        debug_assert_eq!(dst.size, SizeClass::Bool);
        self.append(OpType::Const, &[dst.id.0, dst.size as u64, value as u64]);
    }

    pub fn const_char(&mut self, dst: Mem, value: u16) {
        self.append(OpType::Const, &[dst.id.0, dst.size as u64, value as u64]);
    }

    pub fn const_null(&mut self, dst: Mem) {
        debug_assert_eq!(dst.size, SizeClass::Ptr);
        self.append(OpType::Const, &[dst.id.0, dst.size as u64, 0]);
    }

    /// Loads a pointer to the interned string object `sid`.
    pub fn const_str(&mut self, dst: Mem, sid: StringId) {
        debug_assert_eq!(dst.size, SizeClass::Ptr);
        self.append(OpType::ConstStr, &[dst.id.0, sid.0]);
    }

    /// Allocates a heap object of type `tid` and stores its vtable
    /// pointer; the result slot must be PTR-sized.
    pub fn alloc_heap(&mut self, dst: Mem, tid: TypeId) {
        debug_assert_eq!(dst.size, SizeClass::Ptr);
        debug_assert_eq!(tid.ndims, 0);
        self.append(OpType::AllocHeap, &[dst.id.0, tid.base]);
    }

    /// Allocates an array of `len` elements. Raises a negative-size
    /// exception at runtime when `len < 0`.
    pub fn alloc_array(&mut self, dst: Mem, len: Mem, elem: TypeId, line: u64) {
        debug_assert_eq!(dst.size, SizeClass::Ptr);
        self.append(
            OpType::AllocArray,
            &[
                dst.id.0,
                len.id.0,
                SizeClass::from_tid(elem) as u64,
                elem.base,
                elem.ndims,
                line,
            ],
        );
    }

    /// `*dst = *src`.
    pub fn mov(&mut self, dst: Mem, src: Mem) {
        debug_assert_eq!(dst.size, src.size);
        self.append(OpType::Mov, &[dst.id.0, src.id.0]);
    }

    /// `*dst = &src`.
    pub fn mov_addr(&mut self, dst: Mem, src: Mem) {
        debug_assert_eq!(dst.size, SizeClass::Ptr);
        self.append(OpType::MovAddr, &[dst.id.0, src.id.0]);
    }

    /// `**dst = *src`, storing through the pointer in `dst`.
    pub fn mov_to_addr(&mut self, dst: Mem, src: Mem) {
        debug_assert_eq!(dst.size, SizeClass::Ptr);
        self.append(OpType::MovToAddr, &[dst.id.0, src.id.0]);
    }

    /// Reads field `fid`. A `None` source is a static field; a null
    /// instance raises at runtime.
    pub fn field_deref(&mut self, dst: Mem, src: Option<Mem>, fid: crate::data::ids::FieldId, line: u64) {
        let src = src.map(|mem| mem.id).unwrap_or(MemId::INVALID);
        self.append(OpType::FieldDeref, &[dst.id.0, src.0, fid.0, line]);
    }

    /// Loads the address of field `fid` for a later `mov_to_addr`.
    pub fn field_addr(&mut self, dst: Mem, src: Option<Mem>, fid: crate::data::ids::FieldId, line: u64) {
        debug_assert_eq!(dst.size, SizeClass::Ptr);
        let src = src.map(|mem| mem.id).unwrap_or(MemId::INVALID);
        self.append(OpType::FieldAddr, &[dst.id.0, src.0, fid.0, line]);
    }

    /// Reads `array[index]`; null array and out-of-range index raise
    /// at runtime.
    pub fn array_deref(&mut self, dst: Mem, array: Mem, index: Mem, elem: SizeClass, line: u64) {
        self.append(
            OpType::ArrayDeref,
            &[dst.id.0, array.id.0, index.id.0, elem as u64, line],
        );
    }

    /// Loads `&array[index]` for a later `mov_to_addr`.
    pub fn array_addr(&mut self, dst: Mem, array: Mem, index: Mem, elem: SizeClass, line: u64) {
        debug_assert_eq!(dst.size, SizeClass::Ptr);
        self.append(
            OpType::ArrayAddr,
            &[dst.id.0, array.id.0, index.id.0, elem as u64, line],
        );
    }

    fn bin(&mut self, ty: OpType, dst: Mem, lhs: Mem, rhs: Mem) {
        self.append(ty, &[dst.id.0, lhs.id.0, rhs.id.0]);
    }

    pub fn add(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.bin(OpType::Add, dst, lhs, rhs);
    }

    pub fn sub(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.bin(OpType::Sub, dst, lhs, rhs);
    }

    pub fn mul(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.bin(OpType::Mul, dst, lhs, rhs);
    }

    /// Division by zero raises at runtime.
    pub fn div(&mut self, dst: Mem, lhs: Mem, rhs: Mem, line: u64) {
        self.append(OpType::Div, &[dst.id.0, lhs.id.0, rhs.id.0, line]);
    }

    pub fn r#mod(&mut self, dst: Mem, lhs: Mem, rhs: Mem, line: u64) {
        self.append(OpType::Mod, &[dst.id.0, lhs.id.0, rhs.id.0, line]);
    }

    pub fn jmp(&mut self, label: LabelId) {
        self.append(OpType::Jmp, &[label.0]);
    }

    /// Jumps when the BOOL slot `cond` is true.
    pub fn jmp_if(&mut self, label: LabelId, cond: Mem) {
        debug_assert_eq!(cond.size, SizeClass::Bool);
        self.append(OpType::JmpIf, &[label.0, cond.id.0]);
    }

    pub fn lt(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.bin(OpType::Lt, dst, lhs, rhs);
    }

    pub fn leq(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.bin(OpType::Leq, dst, lhs, rhs);
    }

    pub fn gt(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.lt(dst, rhs, lhs);
    }

    pub fn geq(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.leq(dst, rhs, lhs);
    }

    pub fn eq(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.bin(OpType::Eq, dst, lhs, rhs);
    }

    pub fn neq(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.eq(dst, lhs, rhs);
        self.not(dst, dst);
    }

    pub fn not(&mut self, dst: Mem, src: Mem) {
        self.append(OpType::Not, &[dst.id.0, src.id.0]);
    }

    pub fn neg(&mut self, dst: Mem, src: Mem) {
        self.append(OpType::Neg, &[dst.id.0, src.id.0]);
    }

    pub fn and(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.bin(OpType::And, dst, lhs, rhs);
    }

    pub fn or(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.bin(OpType::Or, dst, lhs, rhs);
    }

    pub fn xor(&mut self, dst: Mem, lhs: Mem, rhs: Mem) {
        self.bin(OpType::Xor, dst, lhs, rhs);
    }

    /// Widens `src` into `dst`; the extension is zero- or sign-filled
    /// based on the source size class.
    pub fn extend(&mut self, dst: Mem, src: Mem) {
        self.append(OpType::Extend, &[dst.id.0, src.id.0]);
    }

    pub fn truncate(&mut self, dst: Mem, src: Mem) {
        self.append(OpType::Truncate, &[dst.id.0, src.id.0]);
    }

    /// `*dst = src instanceof tid`; `dst` must be BOOL.
    pub fn instance_of(&mut self, dst: Mem, src: Mem, tid: TypeId) {
        debug_assert_eq!(dst.size, SizeClass::Bool);
        self.append(OpType::InstanceOf, &[dst.id.0, src.id.0, tid.base, tid.ndims]);
    }

    /// Raises a class-cast exception when the BOOL slot is false.
    pub fn cast_exception_if_false(&mut self, cond: Mem, line: u64) {
        debug_assert_eq!(cond.size, SizeClass::Bool);
        self.append(OpType::CastExceptionIfFalse, &[cond.id.0, line]);
    }

    /// Raises an array-store exception when `value` is not assignable
    /// to the runtime element type of `array`.
    pub fn check_array_store(&mut self, array: Mem, value: Mem, line: u64) {
        self.append(OpType::CheckArrayStore, &[array.id.0, value.id.0, line]);
    }

    pub fn static_call(&mut self, dst: Mem, tid: TypeId, mid: MethodId, args: &[Mem], line: u64) {
        let mut encoded = vec![dst.id.0, tid.base, mid.0, args.len() as u64];
        encoded.extend(args.iter().map(|arg| arg.id.0));
        encoded.push(line);
        self.append(OpType::StaticCall, &encoded);
    }

    /// Dynamic dispatch through the receiver's vtable or itable; a
    /// null receiver raises at runtime.
    pub fn dynamic_call(&mut self, dst: Mem, this: Mem, mid: MethodId, args: &[Mem], line: u64) {
        let mut encoded = vec![dst.id.0, this.id.0, mid.0, args.len() as u64];
        encoded.extend(args.iter().map(|arg| arg.id.0));
        encoded.push(line);
        self.append(OpType::DynamicCall, &encoded);
    }

    pub fn ret(&mut self) {
        self.append(OpType::Ret, &[]);
    }

    pub fn ret_value(&mut self, value: Mem) {
        self.append(OpType::Ret, &[value.id.0]);
    }

    pub fn build(self, is_entry_point: bool, tid: TypeId, mid: MethodId) -> Stream {
        debug_assert!(
            self.live.is_empty(),
            "live slots at end of stream: {:?}",
            self.live
        );
        Stream {
            is_entry_point,
            tid,
            mid,
            params: self.params,
            args: self.args,
            ops: self.ops,
            locals: self.locals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifo_dealloc() {
        let mut builder = StreamBuilder::new();
        let a = builder.alloc_temp(SizeClass::Int);
        let b = builder.alloc_temp(SizeClass::Int);
        builder.dealloc(b);
        builder.dealloc(a);
        let stream = builder.build(false, TypeId::base(16), MethodId(16));
        let kinds: Vec<OpType> = stream.ops.iter().map(|op| op.ty).collect();
        assert_eq!(
            kinds,
            vec![
                OpType::AllocMem,
                OpType::AllocMem,
                OpType::DeallocMem,
                OpType::DeallocMem,
            ],
        );
    }

    #[test]
    #[should_panic(expected = "LIFO")]
    fn non_lifo_dealloc_panics() {
        let mut builder = StreamBuilder::new();
        let a = builder.alloc_temp(SizeClass::Int);
        let _b = builder.alloc_temp(SizeClass::Int);
        builder.dealloc(a);
    }

    #[test]
    fn params_precede_slots() {
        let mut builder = StreamBuilder::new();
        let params = builder.alloc_params(&[SizeClass::Ptr, SizeClass::Int]);
        assert_eq!(params[0].id(), MemId::FIRST);
        assert_eq!(params[1].id(), MemId(MemId::FIRST.0 + 1));
        let temp = builder.alloc_temp(SizeClass::Int);
        assert_eq!(temp.id(), MemId(MemId::FIRST.0 + 2));
    }

    #[test]
    fn neq_lowers_to_eq_not() {
        let mut builder = StreamBuilder::new();
        let dst = builder.alloc_temp(SizeClass::Bool);
        let lhs = builder.alloc_temp(SizeClass::Int);
        let rhs = builder.alloc_temp(SizeClass::Int);
        builder.neq(dst, lhs, rhs);
        builder.dealloc(rhs);
        builder.dealloc(lhs);
        builder.dealloc(dst);
        let stream = builder.build(false, TypeId::base(16), MethodId(16));
        let kinds: Vec<OpType> = stream.ops.iter().map(|op| op.ty).collect();
        assert!(kinds.contains(&OpType::Eq) && kinds.contains(&OpType::Not));
    }
}

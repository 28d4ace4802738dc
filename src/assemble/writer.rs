use std::fmt::Write as _;
use std::io::Write;

use crate::abi::mangle;
use crate::abi::OffsetTable;
use crate::abi::RuntimeLinkIds;
use crate::check::TypeInfoMap;
use crate::constants;
use crate::constants::Exception;
use crate::data::ids::FieldId;
use crate::data::ids::MemId;
use crate::data::ids::MethodId;
use crate::data::ids::TypeId;
use crate::data::ir;
use crate::data::ir::Op;
use crate::data::ir::OpType;
use crate::data::ir::SizeClass;
use crate::data::ir::StackFrame;
use crate::data::ir::Stream;
use crate::Map;
use crate::Set;

/// Program-wide registry of stack-frame metadata records. Units
/// register the call and check sites they emit; the boot file renders
/// one read-only record per distinct site.
#[derive(Debug, Default)]
pub struct FrameTable {
    frames: Map<StackFrame, usize>,
}

impl FrameTable {
    pub fn intern(&mut self, frame: StackFrame) -> usize {
        let next = self.frames.len();
        *self.frames.entry(frame).or_insert(next)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StackFrame, usize)> + '_ {
        self.frames.iter().map(|(frame, index)| (*frame, *index))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Writes one compilation unit's NASM file: extern and global
/// declarations, `.text` with one label per method, `.rodata` with
/// vtables and itables, and `.data` with static-field backing storage.
pub fn write_unit<W: Write>(
    unit: &ir::CompUnit,
    tinfo: &TypeInfoMap,
    offsets: &OffsetTable,
    links: &RuntimeLinkIds,
    frames: &mut FrameTable,
    out: &mut W,
) -> std::io::Result<()> {
    let statics = static_symbols(tinfo, links);

    let mut body = String::new();
    let mut defined: Set<String> = Set::default();
    let mut referenced: Set<String> = Set::default();

    writeln!(body, "section .text").unwrap();
    for ty in &unit.types {
        for stream in &ty.streams {
            let mut writer = FuncWriter::new(
                unit.file,
                stream,
                offsets,
                links,
                &statics,
                frames,
                &mut referenced,
            );
            writer.write();
            defined.insert(mangle::method(stream.tid, stream.mid));
            if stream.is_entry_point {
                defined.insert(constants::JOOS_ENTRY.to_string());
            }
            body.push_str(&writer.out);
        }
    }

    writeln!(body, "\nsection .rodata").unwrap();
    for ty in &unit.types {
        let info = match tinfo.get(ty.tid) {
            Some(info) => info,
            None => continue,
        };
        if info.kind != crate::data::ids::TypeKind::Class {
            continue;
        }

        // Vtable: the reserved slots, then one pointer per method
        // slot; abstract entries stay null.
        let vtable_label = mangle::vtable(ty.tid);
        defined.insert(vtable_label.clone());
        writeln!(body, "{}:", vtable_label).unwrap();
        let typeinfo_slot = mangle::static_field(ty.tid, links.typeinfo_slot(ty.tid));
        referenced.insert(typeinfo_slot.clone());
        writeln!(body, "    dd {}", typeinfo_slot).unwrap();
        let itable_label = mangle::itable(ty.tid);
        referenced.insert(itable_label.clone());
        writeln!(body, "    dd {}", itable_label).unwrap();
        for (owner, mid) in offsets.vtable_of(ty.tid) {
            let is_abstract = tinfo
                .get(TypeId::base(owner.base))
                .and_then(|info| info.methods.get(*mid))
                .map(|minfo| minfo.mods.is_abstract())
                .unwrap_or(true);
            if is_abstract {
                writeln!(body, "    dd 0").unwrap();
            } else {
                let label = mangle::method(*owner, *mid);
                referenced.insert(label.clone());
                writeln!(body, "    dd {}", label).unwrap();
            }
        }

        // Itable: sparse over the global interface-method index.
        let itable_len = offsets.itable_len();
        defined.insert(itable_label.clone());
        writeln!(body, "{}:", itable_label).unwrap();
        let mut slots = vec![None; itable_len as usize];
        for (offset, owner, mid) in offsets.itable_of(ty.tid) {
            slots[(offset / constants::WORD) as usize] = Some((*owner, *mid));
        }
        for slot in slots {
            match slot {
                Some((owner, mid)) => {
                    let label = mangle::method(owner, mid);
                    referenced.insert(label.clone());
                    writeln!(body, "    dd {}", label).unwrap();
                }
                None => writeln!(body, "    dd 0").unwrap(),
            }
        }
    }

    writeln!(body, "\nsection .data").unwrap();
    for ty in &unit.types {
        for (fid, _) in offsets.statics_of(ty.tid) {
            let label = mangle::static_field(ty.tid, *fid);
            defined.insert(label.clone());
            writeln!(body, "{}:", label).unwrap();
            writeln!(body, "    dd 0").unwrap();
        }
        // The synthesized slot holding the runtime type info.
        let label = mangle::static_field(ty.tid, links.typeinfo_slot(ty.tid));
        defined.insert(label.clone());
        writeln!(body, "{}:", label).unwrap();
        writeln!(body, "    dd 0").unwrap();
    }

    writeln!(out, "; {}", unit.filename)?;
    for symbol in referenced.difference(&defined) {
        writeln!(out, "extern {}", symbol)?;
    }
    for symbol in &defined {
        writeln!(out, "global {}", symbol)?;
    }
    writeln!(out)?;
    out.write_all(body.as_bytes())?;
    Ok(())
}

/// Backing symbol for every static field in the program, including
/// the synthesized type-info slots.
fn static_symbols(tinfo: &TypeInfoMap, links: &RuntimeLinkIds) -> Map<FieldId, String> {
    let mut symbols = Map::default();
    for info in tinfo.iter() {
        for finfo in info.fields.iter() {
            if finfo.mods.is_static() && finfo.owner == info.tid {
                symbols.insert(finfo.fid, mangle::static_field(info.tid, finfo.fid));
            }
        }
        let slot = links.typeinfo_slot(info.tid);
        symbols.insert(slot, mangle::static_field(info.tid, slot));
    }
    symbols
}

fn sized(size: SizeClass, b1: &'static str, b2: &'static str, b4: &'static str) -> &'static str {
    match size.width() {
        1 => b1,
        2 => b2,
        _ => b4,
    }
}

fn store_keyword(size: SizeClass) -> &'static str {
    match size.width() {
        1 => "byte",
        2 => "word",
        _ => "dword",
    }
}

#[derive(Copy, Clone, Debug)]
struct StackEntry {
    size: SizeClass,
    /// Displacement below the frame pointer: the slot lives at
    /// `[ebp - disp]`. Parameters have negative displacements.
    disp: i64,
}

#[derive(Clone, Debug)]
struct Reg {
    mem: Option<MemId>,
    size: SizeClass,
    b1: &'static str,
    b2: &'static str,
    b4: &'static str,
}

impl Reg {
    fn of_size(&self, size: SizeClass) -> &'static str {
        sized(size, self.b1, self.b2, self.b4)
    }
}

/// Writes the body of one method, op by op, in the style of a
/// one-pass template expander: values live in a four-register window
/// and spill to their stack slots at control-flow boundaries.
struct FuncWriter<'a> {
    out: String,
    file: usize,
    stream: &'a Stream,
    offsets: &'a OffsetTable,
    links: &'a RuntimeLinkIds,
    statics: &'a Map<FieldId, String>,
    frames: &'a mut FrameTable,
    referenced: &'a mut Set<String>,

    stack_map: Map<MemId, StackEntry>,
    stack: Vec<MemId>,
    cur_offset: i64,
    regs: [Reg; 4],

    /// `(exception, frame index) -> stub index`; each pair gets one
    /// `.e<N>` stub in the epilogue section.
    stubs: Map<(Exception, usize), usize>,
    /// Fresh suffix for inline local labels.
    scratch: usize,
}

const FRAME_METADATA_DISP: i64 = 8;
const FRAME_RESERVED: i64 = 12;

impl<'a> FuncWriter<'a> {
    fn new(
        file: usize,
        stream: &'a Stream,
        offsets: &'a OffsetTable,
        links: &'a RuntimeLinkIds,
        statics: &'a Map<FieldId, String>,
        frames: &'a mut FrameTable,
        referenced: &'a mut Set<String>,
    ) -> Self {
        let mut writer = FuncWriter {
            out: String::new(),
            file,
            stream,
            offsets,
            links,
            statics,
            frames,
            referenced,
            stack_map: Map::default(),
            stack: Vec::new(),
            cur_offset: FRAME_RESERVED,
            regs: [
                Reg { mem: None, size: SizeClass::Int, b1: "al", b2: "ax", b4: "eax" },
                Reg { mem: None, size: SizeClass::Int, b1: "bl", b2: "bx", b4: "ebx" },
                Reg { mem: None, size: SizeClass::Int, b1: "cl", b2: "cx", b4: "ecx" },
                Reg { mem: None, size: SizeClass::Int, b1: "dl", b2: "dx", b4: "edx" },
            ],
            stubs: Map::default(),
            scratch: 0,
        };

        // Parameters sit above the saved frame pointer and return
        // address, in push order.
        for (index, size) in stream.params.iter().enumerate() {
            let id = MemId(MemId::FIRST.0 + index as u64);
            writer.stack_map.insert(
                id,
                StackEntry {
                    size: *size,
                    disp: -(8 + 4 * index as i64),
                },
            );
        }

        writer
    }

    fn col0(&mut self, line: impl AsRef<str>) {
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    fn col1(&mut self, line: impl AsRef<str>) {
        self.out.push_str("    ");
        self.col0(line);
    }

    fn entry(&self, mem: MemId) -> StackEntry {
        *self
            .stack_map
            .get(&mem)
            .unwrap_or_else(|| panic!("unallocated slot t{}", mem))
    }

    fn slot_addr(&self, entry: StackEntry) -> String {
        if entry.disp >= 0 {
            format!("[ebp - {}]", entry.disp)
        } else {
            format!("[ebp + {}]", -entry.disp)
        }
    }

    /// The register currently holding `mem`, or its stack slot.
    fn value_of(&self, mem: MemId) -> String {
        for reg in &self.regs {
            if reg.mem == Some(mem) {
                return reg.of_size(reg.size).to_string();
            }
        }
        self.slot_addr(self.entry(mem))
    }

    fn spill(&mut self, index: usize) {
        let reg = self.regs[index].clone();
        if let Some(mem) = reg.mem {
            let entry = self.entry(mem);
            let addr = self.slot_addr(entry);
            self.col1(format!(
                "mov {} {}, {}",
                store_keyword(entry.size),
                addr,
                reg.of_size(entry.size)
            ));
        }
    }

    fn spill_all(&mut self) {
        for index in 0..self.regs.len() {
            self.spill(index);
        }
        for reg in &mut self.regs {
            reg.mem = None;
        }
    }

    /// Picks a destination register for `mem`, spilling `ebx` when the
    /// window is full.
    fn dst_reg(&mut self, mem: MemId, size: SizeClass) -> usize {
        if let Some(index) = self.regs.iter().position(|reg| reg.mem == Some(mem)) {
            self.regs[index].size = size;
            return index;
        }
        if let Some(index) = self.regs.iter().position(|reg| reg.mem.is_none()) {
            self.regs[index].mem = Some(mem);
            self.regs[index].size = size;
            return index;
        }
        self.spill(1);
        self.regs[1].mem = Some(mem);
        self.regs[1].size = size;
        1
    }

    /// Loads `mem` into the named scratch register, respecting the
    /// slot's width.
    fn load_into(&mut self, reg: usize, mem: MemId) {
        let entry = self.entry(mem);
        let value = self.value_of(mem);
        let target = self.regs[reg].of_size(entry.size).to_string();
        if value != target {
            self.col1(format!("mov {}, {}", target, value));
        }
    }

    /// Loads `mem` widened to 32 bits into the named register.
    fn load_wide(&mut self, reg: usize, mem: MemId) {
        let entry = self.entry(mem);
        let target = self.regs[reg].b4.to_string();
        if let Some(index) = self.regs.iter().position(|r| r.mem == Some(mem)) {
            // Spill first so the memory operand is authoritative for
            // the widening load.
            self.spill(index);
            self.regs[index].mem = None;
        }
        let addr = self.slot_addr(entry);
        match entry.size.width() {
            4 => self.col1(format!("mov {}, {}", target, addr)),
            2 if entry.size.is_signed() => {
                self.col1(format!("movsx {}, word {}", target, addr))
            }
            2 => self.col1(format!("movzx {}, word {}", target, addr)),
            _ if entry.size.is_signed() => {
                self.col1(format!("movsx {}, byte {}", target, addr))
            }
            _ => self.col1(format!("movzx {}, byte {}", target, addr)),
        }
    }

    fn frame(&mut self, line: u64) -> usize {
        self.frames.intern(StackFrame {
            file: self.file,
            tid: self.stream.tid,
            mid: self.stream.mid,
            line,
        })
    }

    fn stub(&mut self, exception: Exception, line: u64) -> String {
        let frame = self.frame(line);
        let next = self.stubs.len();
        let index = *self.stubs.entry((exception, frame)).or_insert(next);
        format!(".e{}", index)
    }

    fn fresh(&mut self, prefix: &str) -> String {
        let index = self.scratch;
        self.scratch += 1;
        format!(".{}{}", prefix, index)
    }

    fn extern_ref(&mut self, symbol: impl Into<String>) -> String {
        let symbol = symbol.into();
        self.referenced.insert(symbol.clone());
        symbol
    }

    fn static_symbol(&mut self, fid: FieldId) -> String {
        let symbol = self
            .statics
            .get(&fid)
            .cloned()
            .unwrap_or_else(|| panic!("no backing symbol for static field {}", fid));
        self.extern_ref(symbol)
    }

    fn write(&mut self) {
        // The frame is sized up front: a one-pass `sub esp` per slot
        // would leave the stack pointer path-dependent across jumps
        // that skip deallocations.
        let mut depth = FRAME_RESERVED;
        let mut max_depth = FRAME_RESERVED;
        for op in &self.stream.ops {
            match op.ty {
                OpType::AllocMem => {
                    depth += constants::WORD as i64;
                    max_depth = max_depth.max(depth);
                }
                OpType::DeallocMem => depth -= constants::WORD as i64,
                _ => {}
            }
        }

        self.write_prologue(max_depth - FRAME_RESERVED);

        let ops: Vec<(Op, Vec<u64>)> = self
            .stream
            .ops
            .iter()
            .map(|op| (*op, self.stream.args_of(op).to_vec()))
            .collect();
        for (op, args) in ops {
            self.write_op(&op, &args);
        }

        self.write_epilogue();
        self.write_stubs();
        self.out.push('\n');
    }

    fn write_prologue(&mut self, slot_bytes: i64) {
        let label = mangle::method(self.stream.tid, self.stream.mid);

        self.col0(format!("; t{} m{}", self.stream.tid.base, self.stream.mid));
        if self.stream.is_entry_point {
            self.col0(format!("{}:", constants::JOOS_ENTRY));
        }
        self.col0(format!("{}:", label));
        self.col1("push ebp");
        self.col1("mov ebp, esp");
        // Reserved slots: caller stack pointer, frame metadata.
        self.col1("lea eax, [ebp + 8]");
        self.col1("push eax");
        self.col1("push dword 0");
        if slot_bytes > 0 {
            self.col1(format!("sub esp, {}", slot_bytes));
        }
    }

    fn write_epilogue(&mut self) {
        self.col0(".epilogue:");
        self.col1("mov esp, ebp");
        self.col1("pop ebp");
        self.col1("ret");
    }

    fn write_stubs(&mut self) {
        let stubs: Vec<((Exception, usize), usize)> = self
            .stubs
            .iter()
            .map(|(key, index)| (*key, *index))
            .collect();
        let throw = self.extern_ref(constants::JOOS_THROW);
        for ((exception, frame), index) in stubs {
            let record = self.extern_ref(mangle::stack_frame(frame));
            self.col0(format!(".e{}:", index));
            self.col1(format!("mov eax, {}", exception as u64));
            self.col1(format!("mov ebx, {}", record));
            self.col1(format!("jmp {}", throw));
        }
    }

    fn write_op(&mut self, op: &Op, args: &[u64]) {
        match op.ty {
            OpType::AllocMem => self.op_alloc_mem(args),
            OpType::DeallocMem => self.op_dealloc_mem(args),
            OpType::AllocHeap => self.op_alloc_heap(args),
            OpType::AllocArray => self.op_alloc_array(args),
            OpType::Label => {
                self.spill_all();
                self.col0(format!(".L{}:", args[0]));
            }
            OpType::Const => self.op_const(args),
            OpType::ConstStr => self.op_const_str(args),
            OpType::Mov => self.op_mov(args),
            OpType::MovAddr => self.op_mov_addr(args),
            OpType::MovToAddr => self.op_mov_to_addr(args),
            OpType::FieldDeref => self.op_field(args, false),
            OpType::FieldAddr => self.op_field(args, true),
            OpType::ArrayDeref => self.op_array(args, false),
            OpType::ArrayAddr => self.op_array(args, true),
            OpType::Add => self.op_arith("add", args),
            OpType::Sub => self.op_arith("sub", args),
            OpType::Mul => self.op_mul(args),
            OpType::Div => self.op_div_mod(args, true),
            OpType::Mod => self.op_div_mod(args, false),
            OpType::Eq => self.op_rel("sete", args),
            OpType::Lt => self.op_rel("setl", args),
            OpType::Leq => self.op_rel("setle", args),
            OpType::Not => self.op_not(args),
            OpType::Neg => self.op_neg(args),
            OpType::And => self.op_bool("and", args),
            OpType::Or => self.op_bool("or", args),
            OpType::Xor => self.op_bool("xor", args),
            OpType::Extend => self.op_extend(args),
            OpType::Truncate => self.op_truncate(args),
            OpType::InstanceOf => self.op_instance_of(args),
            OpType::CastExceptionIfFalse => self.op_cast_exception(args),
            OpType::CheckArrayStore => self.op_check_array_store(args),
            OpType::StaticCall => self.op_static_call(args),
            OpType::DynamicCall => self.op_dynamic_call(args),
            OpType::Jmp => {
                self.spill_all();
                self.col1(format!("jmp .L{}", args[0]));
            }
            OpType::JmpIf => self.op_jmp_if(args),
            OpType::Ret => self.op_ret(args),
        }
    }

    fn op_alloc_mem(&mut self, args: &[u64]) {
        let mem = MemId(args[0]);
        let size = size_class(args[1]);

        let disp = self.cur_offset;
        self.cur_offset += constants::WORD as i64;
        self.col1(format!("; [ebp - {}] is t{}", disp, mem));

        self.stack_map.insert(mem, StackEntry { size, disp });
        self.stack.push(mem);
    }

    fn op_dealloc_mem(&mut self, args: &[u64]) {
        let mem = MemId(args[0]);
        let top = self.stack.pop().expect("deallocation with empty stack");
        assert_eq!(top, mem, "slot deallocation is LIFO");

        let entry = self.stack_map.remove(&mem).unwrap();
        self.cur_offset -= constants::WORD as i64;
        assert!(self.cur_offset >= FRAME_RESERVED);
        self.col1(format!("; t{} left [ebp - {}]", mem, entry.disp));

        for reg in &mut self.regs {
            if reg.mem == Some(mem) {
                reg.mem = None;
            }
        }
    }

    fn op_const(&mut self, args: &[u64]) {
        let mem = MemId(args[0]);
        let size = size_class(args[1]);
        let value = args[2] as u32;

        let reg = self.dst_reg(mem, size);
        // A full-width move clears the upper bits either way.
        let target = self.regs[reg].b4;
        self.col1(format!("mov {}, {}", target, value));
    }

    fn op_const_str(&mut self, args: &[u64]) {
        let mem = MemId(args[0]);
        let label = self.extern_ref(mangle::string(crate::data::ids::StringId(args[1])));
        let reg = self.dst_reg(mem, SizeClass::Ptr);
        let target = self.regs[reg].b4;
        self.col1(format!("mov {}, {}", target, label));
    }

    fn op_mov(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let src = MemId(args[1]);
        let size = self.entry(dst).size;

        let value = self.value_of(src);
        let reg = self.dst_reg(dst, size);
        let target = self.regs[reg].of_size(size).to_string();
        if value != target {
            self.col1(format!("mov {}, {}", target, value));
        }
    }

    fn op_mov_addr(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let src = MemId(args[1]);
        let entry = self.entry(src);

        // The source must live in memory for its address to be taken.
        if let Some(index) = self.regs.iter().position(|reg| reg.mem == Some(src)) {
            self.spill(index);
            self.regs[index].mem = None;
        }

        let addr = self.slot_addr(entry);
        let reg = self.dst_reg(dst, SizeClass::Ptr);
        let target = self.regs[reg].b4;
        self.col1(format!("lea {}, {}", target, addr));
    }

    fn op_mov_to_addr(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let src = MemId(args[1]);
        let size = self.entry(src).size;

        self.spill_all();
        self.col1(format!("mov eax, {}", self.value_of(dst)));
        let value = self.value_of(src);
        let part = sized(size, "bl", "bx", "ebx");
        self.col1(format!("mov {}, {}", part, value));
        self.col1(format!("mov [eax], {}", part));
    }

    fn op_field(&mut self, args: &[u64], addr_only: bool) {
        let dst = MemId(args[0]);
        let src = MemId(args[1]);
        let fid = FieldId(args[2]);
        let line = args[3];

        self.spill_all();

        if src == MemId::INVALID {
            let symbol = self.static_symbol(fid);
            if addr_only {
                self.col1(format!("mov eax, {}", symbol));
            } else {
                let size = self.entry(dst).size;
                self.load_global(size, &symbol);
            }
        } else {
            let stub = self.stub(Exception::NullPointer, line);
            self.col1(format!("mov ebx, {}", self.value_of(src)));
            self.col1("test ebx, ebx");
            self.col1(format!("jz {}", stub));
            let offset = if fid == FieldId::ARRAY_LENGTH {
                constants::ARRAY_LENGTH_OFFSET
            } else {
                self.offsets.offset_of_field(fid)
            };
            if addr_only {
                self.col1(format!("lea eax, [ebx + {}]", offset));
            } else {
                let size = self.entry(dst).size;
                self.load_sized(size, &format!("[ebx + {}]", offset));
            }
        }

        let size = self.entry(dst).size;
        self.regs[0].mem = Some(dst);
        self.regs[0].size = if addr_only { SizeClass::Ptr } else { size };
    }

    /// Loads a value of the given width from `addr` into eax.
    fn load_sized(&mut self, size: SizeClass, addr: &str) {
        match size.width() {
            4 => self.col1(format!("mov eax, dword {}", addr)),
            2 if size.is_signed() => self.col1(format!("movsx eax, word {}", addr)),
            2 => self.col1(format!("movzx eax, word {}", addr)),
            _ if size.is_signed() => self.col1(format!("movsx eax, byte {}", addr)),
            _ => self.col1(format!("movzx eax, byte {}", addr)),
        }
    }

    fn load_global(&mut self, size: SizeClass, symbol: &str) {
        self.load_sized(size, &format!("[{}]", symbol));
    }

    fn op_array(&mut self, args: &[u64], addr_only: bool) {
        let dst = MemId(args[0]);
        let array = MemId(args[1]);
        let index = MemId(args[2]);
        let elem = size_class(args[3]);
        let line = args[4];

        self.spill_all();
        let npe = self.stub(Exception::NullPointer, line);
        let oob = self.stub(Exception::OutOfBounds, line);

        self.col1(format!("mov ebx, {}", self.value_of(array)));
        self.col1("test ebx, ebx");
        self.col1(format!("jz {}", npe));
        self.col1(format!("mov ecx, {}", self.value_of(index)));
        self.col1(format!(
            "cmp ecx, [ebx + {}]",
            constants::ARRAY_LENGTH_OFFSET
        ));
        self.col1(format!("jae {}", oob));

        let scale = elem.width();
        let base = format!(
            "[ebx + ecx * {} + {}]",
            scale,
            constants::ARRAY_OVERHEAD
        );
        if addr_only {
            self.col1(format!("lea eax, {}", base));
        } else {
            self.load_sized(elem, &base);
        }

        self.regs[0].mem = Some(dst);
        self.regs[0].size = if addr_only { SizeClass::Ptr } else { elem };
    }

    fn op_arith(&mut self, instr: &str, args: &[u64]) {
        let dst = MemId(args[0]);
        let lhs = MemId(args[1]);
        let rhs = MemId(args[2]);

        let value_lhs = self.value_of(lhs);
        let reg = self.dst_reg(dst, SizeClass::Int);
        let target = self.regs[reg].b4.to_string();
        if value_lhs != target {
            self.col1(format!("mov {}, {}", target, value_lhs));
        }
        let value_rhs = self.value_of(rhs);
        self.col1(format!("{} {}, {}", instr, target, value_rhs));
    }

    fn op_mul(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let lhs = MemId(args[1]);
        let rhs = MemId(args[2]);

        self.spill_all();
        self.col1(format!("mov eax, {}", self.value_of(lhs)));
        self.col1(format!("mov edx, {}", self.value_of(rhs)));
        self.col1("imul edx");

        self.regs[0].mem = Some(dst);
        self.regs[0].size = SizeClass::Int;
    }

    fn op_div_mod(&mut self, args: &[u64], div: bool) {
        let dst = MemId(args[0]);
        let lhs = MemId(args[1]);
        let rhs = MemId(args[2]);
        let line = args[3];

        self.spill_all();
        let stub = self.stub(Exception::Arithmetic, line);

        self.col1(format!("mov eax, {}", self.value_of(lhs)));
        self.col1("cdq");
        self.col1(format!("mov ebx, {}", self.value_of(rhs)));
        self.col1("test ebx, ebx");
        self.col1(format!("jz {}", stub));
        self.col1("idiv ebx");

        let result = if div { 0 } else { 3 };
        self.regs[result].mem = Some(dst);
        self.regs[result].size = SizeClass::Int;
    }

    fn op_rel(&mut self, instr: &str, args: &[u64]) {
        let dst = MemId(args[0]);
        let lhs = MemId(args[1]);
        let rhs = MemId(args[2]);
        let size = self.entry(lhs).size;

        self.spill_all();
        self.load_into(1, lhs);
        let value = self.value_of(rhs);
        let part = self.regs[1].of_size(size);
        self.col1(format!("cmp {}, {}", part, value));
        self.col1(format!("{} al", instr));

        self.regs[0].mem = Some(dst);
        self.regs[0].size = SizeClass::Bool;
    }

    fn op_not(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let src = MemId(args[1]);

        let value = self.value_of(src);
        let reg = self.dst_reg(dst, SizeClass::Bool);
        let target = self.regs[reg].b1.to_string();
        if value != target {
            self.col1(format!("mov {}, {}", target, value));
        }
        self.col1(format!("xor {}, 1", target));
    }

    fn op_neg(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let src = MemId(args[1]);

        let value = self.value_of(src);
        let reg = self.dst_reg(dst, SizeClass::Int);
        let target = self.regs[reg].b4.to_string();
        if value != target {
            self.col1(format!("mov {}, {}", target, value));
        }
        self.col1(format!("neg {}", target));
    }

    fn op_bool(&mut self, instr: &str, args: &[u64]) {
        let dst = MemId(args[0]);
        let lhs = MemId(args[1]);
        let rhs = MemId(args[2]);

        let value_lhs = self.value_of(lhs);
        let reg = self.dst_reg(dst, SizeClass::Bool);
        let target = self.regs[reg].b1.to_string();
        if value_lhs != target {
            self.col1(format!("mov {}, {}", target, value_lhs));
        }
        let value_rhs = self.value_of(rhs);
        self.col1(format!("{} {}, {}", instr, target, value_rhs));
    }

    fn op_extend(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let src = MemId(args[1]);
        let size = self.entry(dst).size;

        self.spill_all();
        self.load_wide(0, src);
        self.regs[0].mem = Some(dst);
        self.regs[0].size = size;
    }

    fn op_truncate(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let src = MemId(args[1]);
        let size = self.entry(dst).size;

        // Slots are a full word; reading the low bits is the
        // truncation.
        self.spill_all();
        let addr = self.slot_addr(self.entry(src));
        self.col1(format!("mov eax, dword {}", addr));
        self.regs[0].mem = Some(dst);
        self.regs[0].size = size;
    }

    fn op_jmp_if(&mut self, args: &[u64]) {
        let label = args[0];
        let cond = MemId(args[1]);

        self.spill_all();
        self.col1(format!("mov al, {}", self.value_of(cond)));
        self.col1("test al, al");
        self.col1(format!("jnz .L{}", label));
    }

    fn op_ret(&mut self, args: &[u64]) {
        if let [value] = args {
            self.spill_all();
            // Return values travel widened in eax regardless of the
            // slot's width.
            self.load_wide(0, MemId(*value));
        }
        self.col1("jmp .epilogue");
        for reg in &mut self.regs {
            reg.mem = None;
        }
    }

    fn op_alloc_heap(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let tid = TypeId::base(args[1]);

        self.spill_all();
        let malloc = self.extern_ref(constants::JOOS_MALLOC);
        let vtable = self.extern_ref(mangle::vtable(tid));
        self.col1(format!("push dword {}", self.offsets.size_of(tid)));
        self.col1(format!("call {}", malloc));
        self.col1("add esp, 4");
        self.col1(format!("mov dword [eax], {}", vtable));

        self.regs[0].mem = Some(dst);
        self.regs[0].size = SizeClass::Ptr;
    }

    fn op_alloc_array(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let len = MemId(args[1]);
        let elem = size_class(args[2]);
        let elem_base = args[3];
        let elem_ndims = args[4];
        let line = args[5];

        self.spill_all();
        let stub = self.stub(Exception::NegativeArraySize, line);
        let malloc = self.extern_ref(constants::JOOS_MALLOC);
        let vtable = self.extern_ref(mangle::array_vtable());

        self.col1(format!("mov eax, {}", self.value_of(len)));
        self.col1("test eax, eax");
        self.col1(format!("jl {}", stub));
        match elem.width() {
            1 => {}
            2 => self.col1("shl eax, 1"),
            _ => self.col1("shl eax, 2"),
        }
        self.col1(format!("add eax, {}", constants::ARRAY_OVERHEAD));
        self.col1("push eax");
        self.col1(format!("call {}", malloc));
        self.col1("add esp, 4");
        self.col1(format!("mov dword [eax], {}", vtable));
        self.col1(format!("mov ebx, {}", self.value_of(len)));
        self.col1(format!(
            "mov [eax + {}], ebx",
            constants::ARRAY_LENGTH_OFFSET
        ));

        // Element descriptor: a type-info pointer for scalar reference
        // elements, the encoded primitive id otherwise.
        let elem_tid = TypeId {
            base: elem_base,
            ndims: elem_ndims,
        };
        if elem_tid.ndims == 0 && elem_tid.base >= TypeId::FIRST_REF_BASE {
            let slot =
                self.static_symbol(self.links.typeinfo_slot(TypeId::base(elem_tid.base)));
            self.col1(format!("mov ebx, [{}]", slot));
        } else if elem_tid.ndims == 0 {
            self.col1(format!("mov ebx, {}", elem_tid.base));
        } else {
            self.col1("mov ebx, 0");
        }
        self.col1(format!(
            "mov [eax + {}], ebx",
            constants::ARRAY_ELEM_INFO_OFFSET
        ));

        self.regs[0].mem = Some(dst);
        self.regs[0].size = SizeClass::Ptr;
        self.regs[1].mem = None;
    }

    fn op_instance_of(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let src = MemId(args[1]);
        let target = TypeId {
            base: args[2],
            ndims: args[3],
        };

        self.spill_all();
        let done = self.fresh("iofend");
        let no = self.fresh("iofno");

        self.col1(format!("mov ebx, {}", self.value_of(src)));
        self.col1("test ebx, ebx");
        self.col1(format!("jz {}", no));

        if target.ndims == 0 && target.base == self.links.object.base {
            // Everything non-null is an Object, arrays included.
            self.col1("mov eax, 1");
            self.col1(format!("jmp {}", done));
        } else if target.ndims == 0 {
            let instance_of = self.extern_ref(mangle::method(
                self.links.type_info,
                self.links.type_info_instance_of,
            ));
            let slot = self.static_symbol(self.links.typeinfo_slot(target));
            // The receiver's TypeInfo hangs off vtable slot zero.
            self.col1("mov ecx, [ebx]");
            self.col1("mov ecx, [ecx]");
            self.col1("mov ecx, [ecx]");
            self.col1("push ecx");
            self.col1(format!("mov edx, [{}]", slot));
            self.col1("push edx");
            self.col1(format!("call {}", instance_of));
            self.col1("add esp, 8");
            self.col1(format!("jmp {}", done));
        } else {
            // An array instance: same shape, compatible element.
            let vtable = self.extern_ref(mangle::array_vtable());
            self.col1(format!("cmp dword [ebx], {}", vtable));
            self.col1(format!("jne {}", no));
            self.col1(format!(
                "mov ecx, [ebx + {}]",
                constants::ARRAY_ELEM_INFO_OFFSET
            ));
            let elem = TypeId {
                base: target.base,
                ndims: target.ndims - 1,
            };
            if elem.ndims == 0 && elem.base >= TypeId::FIRST_REF_BASE {
                let instance_of = self.extern_ref(mangle::method(
                    self.links.type_info,
                    self.links.type_info_instance_of,
                ));
                let slot = self.static_symbol(self.links.typeinfo_slot(TypeId::base(elem.base)));
                self.col1(format!("cmp ecx, {}", TypeId::FIRST_REF_BASE));
                self.col1(format!("jb {}", no));
                self.col1("push ecx");
                self.col1(format!("mov edx, [{}]", slot));
                self.col1("push edx");
                self.col1(format!("call {}", instance_of));
                self.col1("add esp, 8");
                self.col1(format!("jmp {}", done));
            } else if elem.ndims == 0 {
                self.col1(format!("cmp ecx, {}", elem.base));
                self.col1(format!("jne {}", no));
                self.col1("mov eax, 1");
                self.col1(format!("jmp {}", done));
            } else {
                // Nested array element types carry no descriptor.
                self.col1(format!("jmp {}", no));
            }
        }

        self.col0(format!("{}:", no));
        self.col1("mov eax, 0");
        self.col0(format!("{}:", done));

        self.regs[0].mem = Some(dst);
        self.regs[0].size = SizeClass::Bool;
    }

    fn op_cast_exception(&mut self, args: &[u64]) {
        let cond = MemId(args[0]);
        let line = args[1];

        self.spill_all();
        let stub = self.stub(Exception::ClassCast, line);
        self.col1(format!("mov al, {}", self.value_of(cond)));
        self.col1("test al, al");
        self.col1(format!("jz {}", stub));
    }

    fn op_check_array_store(&mut self, args: &[u64]) {
        let array = MemId(args[0]);
        let value = MemId(args[1]);
        let line = args[2];

        self.spill_all();
        let stub = self.stub(Exception::ArrayStore, line);
        let ok = self.fresh("asok");
        let instance_of = self.extern_ref(mangle::method(
            self.links.type_info,
            self.links.type_info_instance_of,
        ));

        self.col1(format!("mov ebx, {}", self.value_of(value)));
        self.col1("test ebx, ebx");
        self.col1(format!("jz {}", ok));
        self.col1(format!("mov ecx, {}", self.value_of(array)));
        self.col1(format!(
            "mov ecx, [ecx + {}]",
            constants::ARRAY_ELEM_INFO_OFFSET
        ));
        self.col1(format!("cmp ecx, {}", TypeId::FIRST_REF_BASE));
        self.col1(format!("jb {}", ok));
        self.col1("mov edx, [ebx]");
        self.col1("mov edx, [edx]");
        self.col1("mov edx, [edx]");
        self.col1("push edx");
        self.col1("push ecx");
        self.col1(format!("call {}", instance_of));
        self.col1("add esp, 8");
        self.col1("test al, al");
        self.col1(format!("jz {}", stub));
        self.col0(format!("{}:", ok));
    }

    fn set_frame_metadata(&mut self, line: u64) {
        let frame = self.frame(line);
        let record = self.extern_ref(mangle::stack_frame(frame));
        self.col1(format!(
            "mov dword [ebp - {}], {}",
            FRAME_METADATA_DISP, record
        ));
    }

    fn op_static_call(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let tid = TypeId::base(args[1]);
        let mid = MethodId(args[2]);
        let nargs = args[3] as usize;
        let call_args = &args[4..4 + nargs];
        let line = args[4 + nargs];

        self.spill_all();
        self.set_frame_metadata(line);

        for arg in call_args.iter().rev() {
            let value = self.value_of(MemId(*arg));
            self.col1(format!("push dword {}", value));
        }

        let target = match self.offsets.native_symbol(mid) {
            Some(symbol) => symbol.to_string(),
            None => mangle::method(tid, mid),
        };
        let target = self.extern_ref(target);
        self.col1(format!("call {}", target));
        if nargs > 0 {
            self.col1(format!("add esp, {}", 4 * nargs));
        }

        self.regs[0].mem = Some(dst);
        self.regs[0].size = self.entry(dst).size;
    }

    fn op_dynamic_call(&mut self, args: &[u64]) {
        let dst = MemId(args[0]);
        let this = MemId(args[1]);
        let mid = MethodId(args[2]);
        let nargs = args[3] as usize;
        let call_args = &args[4..4 + nargs];
        let line = args[4 + nargs];

        self.spill_all();
        let stub = self.stub(Exception::NullPointer, line);
        self.set_frame_metadata(line);

        for arg in call_args.iter().rev() {
            let value = self.value_of(MemId(*arg));
            self.col1(format!("push dword {}", value));
        }

        self.col1(format!("mov ebx, {}", self.value_of(this)));
        self.col1("test ebx, ebx");
        self.col1(format!("jz {}", stub));
        self.col1("push ebx");

        let (offset, kind) = self.offsets.offset_of_method(mid);
        self.col1("mov ecx, [ebx]");
        match kind {
            crate::data::ids::TypeKind::Class => {
                self.col1(format!("call [ecx + {}]", offset));
            }
            crate::data::ids::TypeKind::Interface => {
                self.col1("mov ecx, [ecx + 4]");
                self.col1(format!("call [ecx + {}]", offset));
            }
        }
        self.col1(format!("add esp, {}", 4 * (nargs + 1)));

        self.regs[0].mem = Some(dst);
        self.regs[0].size = self.entry(dst).size;
    }
}

fn size_class(encoded: u64) -> SizeClass {
    match encoded {
        0 => SizeClass::Bool,
        1 => SizeClass::Byte,
        2 => SizeClass::Char,
        3 => SizeClass::Short,
        4 => SizeClass::Int,
        5 => SizeClass::Ptr,
        value => panic!("invalid size class encoding {}", value),
    }
}


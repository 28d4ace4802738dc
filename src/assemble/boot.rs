use std::fmt::Write as _;
use std::io::Write;

use crate::abi::mangle;
use crate::abi::OffsetTable;
use crate::abi::RuntimeLinkIds;
use crate::assemble::writer::FrameTable;
use crate::check::ConstStringMap;
use crate::check::TypeInfoMap;
use crate::constants;
use crate::data::ids::MethodId;
use crate::data::ids::TypeId;
use crate::data::ids::TypeKind;
use crate::Set;

/// Writes the program-wide boot file: `_start`, `_static_init`
/// in topological order, the runtime allocator and thrower, the
/// shared array vtable, stack-frame metadata records, and the
/// interned string, filename, and name pools.
pub fn write_boot<W: Write>(
    tinfo: &TypeInfoMap,
    offsets: &OffsetTable,
    links: &RuntimeLinkIds,
    strings: &ConstStringMap,
    frames: &FrameTable,
    filenames: &[String],
    out: &mut W,
) -> std::io::Result<()> {
    let mut body = String::new();
    let mut defined: Set<String> = Set::default();
    let mut referenced: Set<String> = Set::default();

    let mut define = |set: &mut Set<String>, label: String| {
        set.insert(label.clone());
        label
    };

    writeln!(body, "section .text").unwrap();

    // Process entry: run the static initializers, call the program
    // entry point, and exit with its return value.
    let start = define(&mut defined, constants::JOOS_START.to_string());
    referenced.insert(constants::JOOS_ENTRY.to_string());
    writeln!(body, "{}:", start).unwrap();
    writeln!(body, "    xor ebp, ebp").unwrap();
    writeln!(body, "    call {}", constants::JOOS_STATIC_INIT).unwrap();
    writeln!(body, "    call {}", constants::JOOS_ENTRY).unwrap();
    writeln!(body, "    mov ebx, eax").unwrap();
    writeln!(body, "    mov eax, 1").unwrap();
    writeln!(body, "    int 0x80").unwrap();
    writeln!(body).unwrap();

    // Static initialization strictly follows the topological order of
    // the inheritance graph: type infos first, then static fields.
    let static_init = define(&mut defined, constants::JOOS_STATIC_INIT.to_string());
    writeln!(body, "{}:", static_init).unwrap();
    for info in tinfo.iter() {
        let label = mangle::method(info.tid, MethodId::TYPE_INIT);
        referenced.insert(label.clone());
        writeln!(body, "    call {}", label).unwrap();
    }
    for info in tinfo.iter() {
        if info.kind != TypeKind::Class {
            continue;
        }
        let label = mangle::method(info.tid, MethodId::STATIC_INIT);
        referenced.insert(label.clone());
        writeln!(body, "    call {}", label).unwrap();
    }
    writeln!(body, "    ret").unwrap();
    writeln!(body).unwrap();

    // Bump allocator over the program break. Fresh pages arrive
    // zeroed, and nothing is ever freed.
    let malloc = define(&mut defined, constants::JOOS_MALLOC.to_string());
    writeln!(body, "{}:", malloc).unwrap();
    writeln!(body, "    push ebp").unwrap();
    writeln!(body, "    mov ebp, esp").unwrap();
    writeln!(body, "    mov ecx, [heap_next]").unwrap();
    writeln!(body, "    test ecx, ecx").unwrap();
    writeln!(body, "    jnz .have_heap").unwrap();
    writeln!(body, "    mov eax, 45").unwrap();
    writeln!(body, "    xor ebx, ebx").unwrap();
    writeln!(body, "    int 0x80").unwrap();
    writeln!(body, "    mov [heap_next], eax").unwrap();
    writeln!(body, "    mov [heap_end], eax").unwrap();
    writeln!(body, "    mov ecx, eax").unwrap();
    writeln!(body, ".have_heap:").unwrap();
    writeln!(body, "    mov eax, [ebp + 8]").unwrap();
    writeln!(body, "    add eax, 3").unwrap();
    writeln!(body, "    and eax, 0xFFFFFFFC").unwrap();
    writeln!(body, "    mov edx, ecx").unwrap();
    writeln!(body, "    add edx, eax").unwrap();
    writeln!(body, "    cmp edx, [heap_end]").unwrap();
    writeln!(body, "    jbe .fits").unwrap();
    writeln!(body, "    mov eax, 45").unwrap();
    writeln!(body, "    mov ebx, edx").unwrap();
    writeln!(body, "    add ebx, 0x100000").unwrap();
    writeln!(body, "    int 0x80").unwrap();
    writeln!(body, "    mov [heap_end], eax").unwrap();
    writeln!(body, ".fits:").unwrap();
    writeln!(body, "    mov eax, ecx").unwrap();
    writeln!(body, "    mov [heap_next], edx").unwrap();
    writeln!(body, "    pop ebp").unwrap();
    writeln!(body, "    ret").unwrap();
    writeln!(body).unwrap();

    // Uncaught-exception path: eax holds the discriminant, ebx the
    // failing site's metadata record. Prints the exception header and
    // the failing site, then unwinds the saved frame-pointer chain,
    // printing the record stored just below each saved frame pointer.
    let throw = define(&mut defined, constants::JOOS_THROW.to_string());
    writeln!(body, "{}:", throw).unwrap();
    if links.stack_frame.is_valid() {
        let print_exception = mangle::method(links.stack_frame, links.stack_frame_print_exception);
        let print = mangle::method(links.stack_frame, links.stack_frame_print);
        referenced.insert(print_exception.clone());
        referenced.insert(print.clone());
        writeln!(body, "    push ebx").unwrap();
        writeln!(body, "    push eax").unwrap();
        writeln!(body, "    call {}", print_exception).unwrap();
        writeln!(body, "    add esp, 4").unwrap();
        writeln!(body, "    call {}", print).unwrap();
        writeln!(body, "    add esp, 4").unwrap();
        writeln!(body, "    mov esi, ebp").unwrap();
        writeln!(body, ".walk:").unwrap();
        writeln!(body, "    mov esi, [esi]").unwrap();
        writeln!(body, "    test esi, esi").unwrap();
        writeln!(body, "    jz .halt").unwrap();
        writeln!(body, "    mov ecx, [esi - 8]").unwrap();
        writeln!(body, "    test ecx, ecx").unwrap();
        writeln!(body, "    jz .walk").unwrap();
        writeln!(body, "    push esi").unwrap();
        writeln!(body, "    push ecx").unwrap();
        writeln!(body, "    call {}", print).unwrap();
        writeln!(body, "    add esp, 4").unwrap();
        writeln!(body, "    pop esi").unwrap();
        writeln!(body, "    jmp .walk").unwrap();
        writeln!(body, ".halt:").unwrap();
    }
    writeln!(body, "    mov eax, 1").unwrap();
    writeln!(body, "    mov ebx, 1").unwrap();
    writeln!(body, "    int 0x80").unwrap();
    writeln!(body).unwrap();

    writeln!(body, "section .rodata").unwrap();

    // Arrays share one vtable, shaped like Object's so inherited
    // methods dispatch normally. Its distinct address is what marks
    // an object as an array.
    let array_vtable = define(&mut defined, mangle::array_vtable());
    writeln!(body, "{}:", array_vtable).unwrap();
    if links.object.is_valid() {
        let slot = mangle::static_field(links.object, links.typeinfo_slot(links.object));
        referenced.insert(slot.clone());
        writeln!(body, "    dd {}", slot).unwrap();
        writeln!(body, "    dd 0").unwrap();
        for (owner, mid) in offsets.vtable_of(links.object) {
            let label = mangle::method(*owner, *mid);
            referenced.insert(label.clone());
            writeln!(body, "    dd {}", label).unwrap();
        }
    } else {
        writeln!(body, "    dd 0").unwrap();
        writeln!(body, "    dd 0").unwrap();
    }
    writeln!(body).unwrap();

    // One metadata record per distinct call or check site:
    // [vptr][file][type name][method name][line].
    for (frame, index) in frames.iter() {
        let label = define(&mut defined, mangle::stack_frame(index));
        writeln!(body, "{}:", label).unwrap();
        if links.stack_frame.is_valid() {
            let vtable = mangle::vtable(links.stack_frame);
            referenced.insert(vtable.clone());
            writeln!(body, "    dd {}", vtable).unwrap();
        } else {
            writeln!(body, "    dd 0").unwrap();
        }
        let file_label = mangle::src_file(frame.file);
        let type_label = mangle::type_name(frame.tid);
        let method_label = mangle::method_name(frame.mid);
        referenced.insert(file_label.clone());
        referenced.insert(type_label.clone());
        referenced.insert(method_label.clone());
        writeln!(body, "    dd {}", file_label).unwrap();
        writeln!(body, "    dd {}", type_label).unwrap();
        writeln!(body, "    dd {}", method_label).unwrap();
        writeln!(body, "    dd {}", frame.line).unwrap();
    }
    writeln!(body).unwrap();

    // Interned constant strings, then the filename and type/method
    // name pools used by stack traces; all share the string-object
    // mechanism.
    for (symbol, sid) in strings.iter() {
        write_string_object(
            &mut body,
            &mut defined,
            &mut referenced,
            offsets,
            links,
            &mangle::string(sid),
            &mangle::string_chars(sid),
            symbol.as_str(),
        );
    }

    let mut files: Vec<usize> = frames.iter().map(|(frame, _)| frame.file).collect();
    files.sort_unstable();
    files.dedup();
    for file in files {
        let name = filenames
            .get(file)
            .cloned()
            .unwrap_or_else(|| format!("f{}", file));
        let label = mangle::src_file(file);
        let chars = format!("{}_chars", label);
        write_string_object(
            &mut body,
            &mut defined,
            &mut referenced,
            offsets,
            links,
            &label,
            &chars,
            &name,
        );
    }

    let mut tids: Vec<TypeId> = frames.iter().map(|(frame, _)| frame.tid).collect();
    tids.sort_unstable();
    tids.dedup();
    for tid in tids {
        let name = tinfo.qualified_name(tid);
        let label = mangle::type_name(tid);
        let chars = format!("{}_chars", label);
        write_string_object(
            &mut body,
            &mut defined,
            &mut referenced,
            offsets,
            links,
            &label,
            &chars,
            &name,
        );
    }

    let mut mids: Vec<(TypeId, MethodId)> = frames
        .iter()
        .map(|(frame, _)| (frame.tid, frame.mid))
        .collect();
    mids.sort_unstable();
    mids.dedup_by_key(|(_, mid)| *mid);
    for (tid, mid) in mids {
        let name = method_display_name(tinfo, tid, mid);
        let label = mangle::method_name(mid);
        let chars = format!("{}_chars", label);
        write_string_object(
            &mut body,
            &mut defined,
            &mut referenced,
            offsets,
            links,
            &label,
            &chars,
            &name,
        );
    }

    writeln!(body, "section .data").unwrap();
    writeln!(body, "heap_next:").unwrap();
    writeln!(body, "    dd 0").unwrap();
    writeln!(body, "heap_end:").unwrap();
    writeln!(body, "    dd 0").unwrap();

    writeln!(out, "; start.s")?;
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

fn method_display_name(tinfo: &TypeInfoMap, tid: TypeId, mid: MethodId) -> String {
    match mid {
        MethodId::INSTANCE_INIT => "<init>".to_string(),
        MethodId::STATIC_INIT => "<static_init>".to_string(),
        MethodId::TYPE_INIT => "<type_init>".to_string(),
        mid => tinfo
            .get(tid)
            .and_then(|info| info.methods.get(mid))
            .map(|minfo| minfo.signature.name.as_str().to_string())
            .unwrap_or_else(|| format!("m{}", mid)),
    }
}

/// A constant string is a `char[]` object plus a `java.lang.String`
/// object referencing it, both sharing vtables with compiled classes.
#[allow(clippy::too_many_arguments)]
fn write_string_object(
    body: &mut String,
    defined: &mut Set<String>,
    referenced: &mut Set<String>,
    offsets: &OffsetTable,
    links: &RuntimeLinkIds,
    label: &str,
    chars_label: &str,
    value: &str,
) {
    let units: Vec<u16> = value.encode_utf16().collect();

    defined.insert(chars_label.to_string());
    let array_vtable = mangle::array_vtable();
    referenced.insert(array_vtable.clone());
    writeln!(body, "{}:", chars_label).unwrap();
    writeln!(body, "    dd {}", array_vtable).unwrap();
    writeln!(body, "    dd {}", units.len()).unwrap();
    writeln!(body, "    dd {}", TypeId::CHAR_BASE).unwrap();
    if units.is_empty() {
        writeln!(body, "    dw 0").unwrap();
    } else {
        let words: Vec<String> = units.iter().map(|unit| unit.to_string()).collect();
        writeln!(body, "    dw {}", words.join(", ")).unwrap();
    }

    defined.insert(label.to_string());
    writeln!(body, "{}:", label).unwrap();
    if !links.string.is_valid() {
        writeln!(body, "    dd 0").unwrap();
        writeln!(body, "    dd {}", chars_label).unwrap();
        writeln!(body).unwrap();
        return;
    }

    let vtable = mangle::vtable(links.string);
    referenced.insert(vtable.clone());
    writeln!(body, "    dd {}", vtable).unwrap();

    // The char[] field gets the backing array; any other String
    // fields are zeroed.
    let size = offsets.size_of(links.string);
    let chars_offset = offsets.offset_of_field(links.string_chars);
    let mut offset = constants::OBJECT_OVERHEAD;
    while offset < size {
        if offset == chars_offset {
            writeln!(body, "    dd {}", chars_label).unwrap();
        } else {
            writeln!(body, "    dd 0").unwrap();
        }
        offset += constants::WORD;
    }
    writeln!(body).unwrap();
}

mod common;

use common::check_ok;

use joosc::api;
use joosc::data::ids::MethodId;

struct Compiled {
    set: api::TypeSet,
    tinfo: api::TypeInfoMap,
    units: Vec<String>,
    boot: String,
}

fn compile(sources: &[&str]) -> Compiled {
    let (program, set, tinfo, strings) = check_ok(sources);
    let links = api::RuntimeLinkIds::resolve(&set, &tinfo);
    let filenames: Vec<String> = (0..program.units.len())
        .map(|file| format!("f{}.java", file))
        .collect();
    let ir = api::emit_program(&program, &tinfo, &links, &filenames);

    let offsets = api::OffsetTable::build(&tinfo);
    let mut frames = api::FrameTable::default();

    let mut units = Vec::new();
    for unit in &ir.units {
        let mut out = Vec::new();
        api::write_unit(unit, &tinfo, &offsets, &links, &mut frames, &mut out).unwrap();
        units.push(String::from_utf8(out).unwrap());
    }

    let mut out = Vec::new();
    api::write_boot(&tinfo, &offsets, &links, &strings, &frames, &filenames, &mut out).unwrap();
    let boot = String::from_utf8(out).unwrap();

    Compiled {
        set,
        tinfo,
        units,
        boot,
    }
}

const PROGRAM: &[&str] = &[
    "public class Main {
         public Main() {}
         public static int test() {
             int[] a = null;
             a[0] = 1;
             return 1 / 0;
         }
     }",
];

#[test]
fn unit_files_have_method_labels_and_sections() {
    let compiled = compile(PROGRAM);
    let main = &compiled.units[0];

    let tid = compiled.set.get("Main").unwrap();
    assert!(main.contains(&format!("_t{}_m", tid.base)));
    assert!(main.contains("section .text"));
    assert!(main.contains("section .rodata"));
    assert!(main.contains("section .data"));
    assert!(main.contains(&format!("vtable_t{}:", tid.base)));
    assert!(main.contains(&format!("itable_t{}:", tid.base)));
    assert!(main.contains("_entry:"));
    assert!(main.contains(".epilogue:"));
}

#[test]
fn exception_stubs_are_deduplicated() {
    let compiled = compile(PROGRAM);
    let main = &compiled.units[0];

    // Stub labels are method-local; examine the entry method alone.
    let start = main.find("_entry:").expect("missing entry point");
    let end = main[start..]
        .find("\n; t")
        .map(|offset| start + offset)
        .unwrap_or(main.len());
    let method = &main[start..end];

    let is_stub = |line: &str| {
        let line = line.trim();
        line.strip_prefix(".e")
            .and_then(|rest| rest.strip_suffix(':'))
            .map(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    };

    // The array store raises NPE and OOBE; the division raises the
    // arithmetic exception. Each (site, exception) pair gets exactly
    // one stub.
    let stubs: Vec<&str> = method.lines().filter(|line| is_stub(line)).collect();
    assert_eq!(stubs.len(), 3, "stubs: {:?}", stubs);

    let mut unique = stubs.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(stubs.len(), unique.len(), "duplicate stubs: {:?}", stubs);

    assert!(main.contains("jmp _joos_throw") || main.contains("extern _joos_throw"));
}

#[test]
fn boot_file_runs_static_init_in_topological_order() {
    let compiled = compile(&[
        "public class Child extends Base { public Child() {} public static int test() { return 0; } }",
        "public class Base { public Base() {} }",
    ]);

    let base = compiled.set.get("Base").unwrap();
    let child = compiled.set.get("Child").unwrap();
    assert!(
        compiled.tinfo.lookup(base).top_sort_index < compiled.tinfo.lookup(child).top_sort_index
    );

    let call = |tid: joosc::data::ids::TypeId, mid: MethodId| {
        format!("    call _t{}_m{}", tid.base, mid)
    };
    let boot = &compiled.boot;
    let base_init = boot
        .find(&call(base, MethodId::STATIC_INIT))
        .expect("missing Base static init");
    let child_init = boot
        .find(&call(child, MethodId::STATIC_INIT))
        .expect("missing Child static init");
    assert!(base_init < child_init);

    let base_type_init = boot
        .find(&call(base, MethodId::TYPE_INIT))
        .expect("missing Base type init");
    let child_type_init = boot
        .find(&call(child, MethodId::TYPE_INIT))
        .expect("missing Child type init");
    assert!(base_type_init < child_type_init);
}

#[test]
fn boot_file_has_runtime_entry_points() {
    let compiled = compile(PROGRAM);
    let boot = &compiled.boot;
    assert!(boot.contains("_start:"));
    assert!(boot.contains("_static_init:"));
    assert!(boot.contains("_joos_malloc:"));
    assert!(boot.contains("_joos_throw:"));
    assert!(boot.contains("vtable_array:"));
    assert!(boot.contains("call _entry"));
}

#[test]
fn stack_frames_reference_name_pools() {
    let compiled = compile(PROGRAM);
    let boot = &compiled.boot;

    assert!(boot.contains("sf0:"), "no stack frame records emitted");
    assert!(boot.contains("src_file0"));
    let tid = compiled.set.get("Main").unwrap();
    assert!(boot.contains(&format!("types{}", tid.base)));
}

#[test]
fn interned_strings_become_objects() {
    let compiled = compile(&[
        "public class Main {
             public Main() {}
             public static String greeting = \"hello\";
             public static int test() { return 0; }
         }",
    ]);
    let boot = &compiled.boot;
    assert!(boot.contains("string0:"));
    assert!(boot.contains("string0_chars:"));
    // 'h' 'e' 'l' 'l' 'o' as UTF-16 words.
    assert!(boot.contains("dw 104, 101, 108, 108, 111"));
}

#[test]
fn statics_are_backed_per_field() {
    let compiled = compile(&[
        "public class Main {
             public Main() {}
             public static int counter = 0;
             public static int test() { return counter; }
         }",
    ]);
    let main = &compiled.units[0];
    let tid = compiled.set.get("Main").unwrap();
    assert!(main.contains(&format!("static_t{}_f", tid.base)));
}

#[test]
fn native_methods_resolve_to_external_symbols() {
    let compiled = compile(&[
        "public class Main {
             public Main() {}
             public static native int nativeWrite(int b);
             public static int test() { return Main.nativeWrite(65); }
         }",
    ]);
    let main = &compiled.units[0];
    assert!(
        main.contains("NATIVEMain.nativeWrite"),
        "native call symbol missing"
    );
}

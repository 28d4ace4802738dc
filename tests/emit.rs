mod common;

use common::check_ok;

use joosc::api;
use joosc::data::ir::OpType;
use joosc::data::ir::Stream;

const PROGRAM: &[&str] = &[
    "public class Cell {
         public int value = 0;
         public Cell next = null;
         public Cell(int v) { value = v; }
         public int get() { return value; }
         public void put(int v) { value = v; }
         public static int test() {
             Cell head = new Cell(1);
             head.next = new Cell(2);
             int[] values = new int[4];
             int sum = 0;
             for (int i = 0; i < values.length; i = i + 1) {
                 values[i] = i * 2;
                 sum = sum + values[i];
             }
             if (head.get() < sum && sum % 2 == 0) {
                 head.put(sum / head.get());
             }
             return sum;
         }
     }",
];

fn emit(sources: &[&str]) -> joosc::data::ir::Program {
    let (program, set, tinfo, _) = check_ok(sources);
    let links = api::RuntimeLinkIds::resolve(&set, &tinfo);
    let filenames: Vec<String> = (0..program.units.len())
        .map(|file| format!("f{}.java", file))
        .collect();
    api::emit_program(&program, &tinfo, &links, &filenames)
}

/// Balanced, properly nested alloc/dealloc pairs, LIFO throughout.
fn assert_stack_discipline(stream: &Stream) {
    let mut live: Vec<u64> = Vec::new();
    for op in &stream.ops {
        let args = stream.args_of(op);
        match op.ty {
            OpType::AllocMem => live.push(args[0]),
            OpType::DeallocMem => {
                let top = live.pop().expect("dealloc with empty stack");
                assert_eq!(top, args[0], "dealloc out of LIFO order");
            }
            _ => {}
        }
    }
    assert!(
        live.is_empty(),
        "slots left allocated at end of t{} m{}: {:?}",
        stream.tid.base,
        stream.mid,
        live
    );
}

#[test]
fn generator_is_idempotent() {
    let first = emit(PROGRAM);
    let second = emit(PROGRAM);
    pretty_assertions::assert_eq!(first, second);
}

#[test]
fn streams_keep_stack_discipline() {
    let program = emit(PROGRAM);
    for unit in &program.units {
        for ty in &unit.types {
            for stream in &ty.streams {
                assert_stack_discipline(stream);
            }
        }
    }
}

#[test]
fn entry_point_is_marked_once() {
    let program = emit(PROGRAM);
    let entries: usize = program
        .units
        .iter()
        .flat_map(|unit| &unit.types)
        .flat_map(|ty| &ty.streams)
        .filter(|stream| stream.is_entry_point)
        .count();
    assert_eq!(entries, 1);
}

#[test]
fn every_label_is_emitted_once() {
    let program = emit(PROGRAM);
    for unit in &program.units {
        for ty in &unit.types {
            for stream in &ty.streams {
                let mut emitted = std::collections::HashSet::new();
                let mut referenced = Vec::new();
                for op in &stream.ops {
                    let args = stream.args_of(op);
                    match op.ty {
                        OpType::Label => {
                            assert!(emitted.insert(args[0]), "label emitted twice");
                        }
                        OpType::Jmp => referenced.push(args[0]),
                        OpType::JmpIf => referenced.push(args[0]),
                        _ => {}
                    }
                }
                for label in referenced {
                    assert!(emitted.contains(&label), "jump to missing label");
                }
            }
        }
    }
}

#[test]
fn division_carries_runtime_check() {
    let program = emit(PROGRAM);
    let has_div = program
        .units
        .iter()
        .flat_map(|unit| &unit.types)
        .flat_map(|ty| &ty.streams)
        .flat_map(|stream| stream.ops.iter().map(move |op| (stream, op)))
        .any(|(stream, op)| {
            op.ty == OpType::Div && {
                // The trailing argument is the source line for the
                // arithmetic-exception stack frame.
                let args = stream.args_of(op);
                args.len() == 4 && args[3] > 0
            }
        });
    assert!(has_div);
}

#[test]
fn field_access_lowers_to_field_ops() {
    let program = emit(PROGRAM);
    let ops: Vec<OpType> = program
        .units
        .iter()
        .flat_map(|unit| &unit.types)
        .flat_map(|ty| &ty.streams)
        .flat_map(|stream| stream.ops.iter().map(|op| op.ty))
        .collect();
    assert!(ops.contains(&OpType::FieldDeref));
    assert!(ops.contains(&OpType::FieldAddr));
    assert!(ops.contains(&OpType::ArrayDeref));
    assert!(ops.contains(&OpType::ArrayAddr));
    assert!(ops.contains(&OpType::AllocHeap));
    assert!(ops.contains(&OpType::AllocArray));
    assert!(ops.contains(&OpType::DynamicCall));
    assert!(ops.contains(&OpType::StaticCall));
}

#[test]
fn initializers_are_synthesized_per_type() {
    use joosc::data::ids::MethodId;

    let program = emit(PROGRAM);
    let cell = &program.units[0].types[0];
    let mids: Vec<MethodId> = cell.streams.iter().map(|stream| stream.mid).collect();
    assert!(mids.contains(&MethodId::TYPE_INIT));
    assert!(mids.contains(&MethodId::INSTANCE_INIT));
    assert!(mids.contains(&MethodId::STATIC_INIT));
}

#[test]
fn instance_initializer_calls_superclass_first() {
    use joosc::data::ids::MethodId;

    let program = emit(&[
        "public class Base { public int a = 1; public Base() {} }",
        "public class Child extends Base { public int b = 2; public Child() {} }",
    ]);

    // Child's instance initializer: first call targets Base's.
    let child_init = program
        .units
        .iter()
        .flat_map(|unit| &unit.types)
        .flat_map(|ty| &ty.streams)
        .find(|stream| {
            stream.mid == MethodId::INSTANCE_INIT
                && stream
                    .ops
                    .iter()
                    .any(|op| op.ty == OpType::StaticCall)
        })
        .expect("missing instance initializer with a super call");

    let call = child_init
        .ops
        .iter()
        .find(|op| op.ty == OpType::StaticCall)
        .unwrap();
    let args = child_init.args_of(call);
    assert_eq!(MethodId(args[2]), MethodId::INSTANCE_INIT);
}

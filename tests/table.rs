mod common;

use common::check_ok;
use common::check_program;
use common::kinds;
use common::simple;

use joosc::api::OffsetTable;

#[test]
fn override_return_type() {
    let (_, world, errors) = check_program(&[
        "public class A { public A() {} public int f() { return 1; } }",
        "public class B extends A { public B() {} public boolean f() { return true; } }",
    ]);
    assert!(world.is_none());
    assert!(
        kinds(&errors).contains(&"OverrideReturnType".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn override_final_and_static() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public final int f() { return 1; }
             public static int g() { return 1; }
         }",
        "public class B extends A {
             public B() {}
             public int f() { return 2; }
             public int g() { return 2; }
         }",
    ]);
    let found = kinds(&errors);
    assert!(found.contains(&"OverrideFinal".to_string()), "{:?}", found);
    assert!(found.contains(&"OverrideStatic".to_string()), "{:?}", found);
}

#[test]
fn lower_visibility() {
    let (_, _, errors) = check_program(&[
        "public class A { public A() {} public int f() { return 1; } }",
        "public class B extends A { public B() {} protected int f() { return 2; } }",
    ]);
    assert!(
        kinds(&errors).contains(&"OverrideAccess".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn inheritance_cycle() {
    let (_, world, errors) = check_program(&[
        "public class A extends B { public A() {} }",
        "public class B extends A { public B() {} }",
    ]);
    assert!(world.is_none());
    assert!(
        kinds(&errors).contains(&"InheritanceCycle".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn extend_rules() {
    let (_, _, errors) = check_program(&[
        "public interface I {}",
        "public final class F { public F() {} }",
        "public class A extends I { public A() {} }",
        "public class B extends F { public B() {} }",
        "public class C implements F { public C() {} }",
    ]);
    let found = kinds(&errors);
    assert!(found.contains(&"ExtendInterface".to_string()), "{:?}", found);
    assert!(found.contains(&"ExtendFinal".to_string()), "{:?}", found);
    assert!(found.contains(&"ImplementClass".to_string()), "{:?}", found);
}

#[test]
fn abstract_coverage() {
    let (_, _, errors) = check_program(&[
        "public abstract class A { public A() {} public abstract int f(); }",
        "public class B extends A { public B() {} }",
    ]);
    assert!(
        kinds(&errors).contains(&"AbstractMethodNotImplemented".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn interface_satisfied_by_inherited_method() {
    let (_, world, errors) = check_program(&[
        "public interface Runs { public void run(); }",
        "public class Base { public Base() {} public void run() {} }",
        "public class Impl extends Base implements Runs { public Impl() {} }",
    ]);
    assert!(world.is_some(), "{:?}", simple(&errors));
}

#[test]
fn synthesized_default_constructor() {
    let (_, set, tinfo, _) = check_ok(&["public class A {}"]);
    let tid = set.get("A").unwrap();
    let info = tinfo.lookup(tid);
    let ctor = info
        .methods
        .iter()
        .find(|minfo| minfo.signature.is_constructor);
    assert!(ctor.is_some());
    assert!(ctor.unwrap().signature.params.is_empty());
}

#[test]
fn topological_order_parents_first() {
    let (_, set, tinfo, _) = check_ok(&[
        "public class C extends B { public C() {} }",
        "public class B extends A { public B() {} }",
        "public class A { public A() {} }",
    ]);
    let index = |name: &str| tinfo.lookup(set.get(name).unwrap()).top_sort_index;
    assert!(index("A") < index("B"));
    assert!(index("B") < index("C"));
}

#[test]
fn vtable_is_prefix_extension_of_parent() {
    let (_, set, tinfo, _) = check_ok(&[
        "public class A { public A() {} public int f() { return 1; } }",
        "public class B extends A {
             public B() {}
             public int f() { return 2; }
             public int g() { return 3; }
         }",
    ]);
    let offsets = OffsetTable::build(&tinfo);
    let a = set.get("A").unwrap();
    let b = set.get("B").unwrap();

    let vtable_a = offsets.vtable_of(a);
    let vtable_b = offsets.vtable_of(b);
    assert!(vtable_b.len() > vtable_a.len());

    // Same slots, with overridden entries replaced in place.
    for (slot, (owner, _)) in vtable_a.iter().enumerate() {
        let (b_owner, _) = vtable_b[slot];
        assert!(b_owner == *owner || b_owner == b);
    }
}

#[test]
fn overridden_method_keeps_parent_slot() {
    let (_, set, tinfo, _) = check_ok(&[
        "public class A { public A() {} public int f() { return 1; } }",
        "public class B extends A { public B() {} public int f() { return 2; } }",
    ]);
    let offsets = OffsetTable::build(&tinfo);
    let a = set.get("A").unwrap();
    let b = set.get("B").unwrap();

    let f = |tid| {
        tinfo
            .lookup(tid)
            .methods
            .iter()
            .find(|minfo| {
                !minfo.signature.is_constructor && minfo.signature.name.as_str() == "f"
            })
            .unwrap()
            .mid
    };

    let (offset_a, _) = offsets.offset_of_method(f(a));
    let (offset_b, _) = offsets.offset_of_method(f(b));
    assert_eq!(offset_a, offset_b);
}

#[test]
fn interface_method_slots_are_shared() {
    let (_, set, tinfo, _) = check_ok(&[
        "public interface I { public int f(); }",
        "public class A implements I { public A() {} public int f() { return 1; } }",
        "public class B implements I { public B() {} public int f() { return 2; } }",
    ]);
    let offsets = OffsetTable::build(&tinfo);
    let i = set.get("I").unwrap();
    let a = set.get("A").unwrap();
    let b = set.get("B").unwrap();

    let imid = tinfo
        .lookup(i)
        .methods
        .iter()
        .find(|minfo| minfo.signature.name.as_str() == "f")
        .unwrap()
        .mid;
    let (islot, kind) = offsets.offset_of_method(imid);
    assert_eq!(kind, joosc::data::ids::TypeKind::Interface);

    // Both classes fill the same itable slot.
    for tid in [a, b] {
        assert!(
            offsets
                .itable_of(tid)
                .iter()
                .any(|(offset, _, _)| *offset == islot),
            "itable of {:?} misses slot {}",
            tid,
            islot
        );
    }
}

#[test]
fn parent_needs_default_constructor() {
    let (_, _, errors) = check_program(&[
        "public class A { public A(int x) {} }",
        "public class B extends A { public B() {} }",
    ]);
    assert!(
        kinds(&errors).contains(&"ParentNoDefaultConstructor".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn duplicate_members() {
    let (_, _, errors) = check_program(&[
        "public class A {
             public A() {}
             public int x = 1;
             public boolean x = true;
             public int f(int a) { return 1; }
             public int f(int b) { return 2; }
         }",
    ]);
    let found = kinds(&errors);
    assert_eq!(
        found
            .iter()
            .filter(|kind| *kind == "DuplicateDefinition")
            .count(),
        2,
        "{:?}",
        found
    );
}

mod common;

use common::check_program;
use common::kinds;
use common::simple;

#[test]
fn duplicate_type_definition() {
    let (_, world, errors) = check_program(&[
        "package foo; public class Foo { public Foo() {} }",
        "package foo; public class Foo { public Foo() {} }",
    ]);
    assert!(world.is_none());
    assert_eq!(kinds(&errors), vec!["TypeDuplicateDefinition"]);

    // Both declaration sites in one diagnostic, in file order.
    let line = &simple(&errors)[0];
    pretty_assertions::assert_eq!(
        line.split('[').next().unwrap(),
        "TypeDuplicateDefinition: "
    );
    assert!(line.starts_with("TypeDuplicateDefinition: [0:"), "{}", line);
    assert!(line.contains(",1:"), "{}", line);
}

#[test]
fn ambiguous_wildcard_import() {
    let (_, world, errors) = check_program(&[
        "package a; public class bar { public bar() {} }",
        "package b; public class bar { public bar() {} }",
        "package c; public class bar { public bar() {} }",
        "package d;
         import a.*;
         import b.*;
         import c.*;
         public class D {
             public D() {}
             public void f() { bar x = null; }
         }",
    ]);
    assert!(world.is_none());
    assert!(
        kinds(&errors).contains(&"AmbiguousType".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn wildcard_overridden_by_single_import() {
    let (_, world, errors) = check_program(&[
        "package a; public class bar { public bar() {} }",
        "package b; public class bar { public bar() {} }",
        "package d;
         import a.*;
         import b.*;
         import a.bar;
         public class D {
             public D() {}
             public void f() { bar x = null; }
         }",
    ]);
    assert!(world.is_some(), "{:?}", simple(&errors));
}

#[test]
fn own_package_beats_wildcard() {
    let (_, world, errors) = check_program(&[
        "package a; public class Thing { public Thing() {} }",
        "package b; public class Thing { public Thing() {} }",
        "package a;
         import b.*;
         public class User {
             public User() {}
             public Thing f() { return new Thing(); }
         }",
    ]);
    assert!(world.is_some(), "{:?}", simple(&errors));
}

#[test]
fn unknown_single_import() {
    let (_, world, errors) = check_program(&[
        "package d;
         import no.such.Thing;
         public class D { public D() {} }",
    ]);
    assert!(world.is_none());
    assert!(
        kinds(&errors).contains(&"UnknownImport".to_string()),
        "{:?}",
        simple(&errors)
    );
}

#[test]
fn wildcard_of_missing_package_is_silent() {
    let (_, world, errors) = check_program(&[
        "package d;
         import no.such.pkg.*;
         public class D { public D() {} }",
    ]);
    assert!(world.is_some(), "{:?}", simple(&errors));
}

#[test]
fn unknown_type_reference() {
    let (_, world, errors) = check_program(&[
        "public class A {
             public A() {}
             public Missing f() { return null; }
         }",
    ]);
    assert!(world.is_none());
    assert!(
        kinds(&errors).contains(&"UnknownType".to_string()),
        "{:?}",
        simple(&errors)
    );
}

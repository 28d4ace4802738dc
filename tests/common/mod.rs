#![allow(dead_code)]

use joosc::api;
use joosc::data::ast;
use joosc::ErrorList;

/// A minimal standard library: enough of `java.lang` and
/// `__joos_internal__` for programs that allocate, concatenate, and
/// throw.
pub const STDLIB: &[&str] = &[
    r#"
package java.lang;
public class Object {
    public Object() {}
    public boolean equals(Object other) { return this == other; }
    public int hashCode() { return 0; }
    public String toString() { return "object"; }
}
"#,
    r#"
package java.lang;
public class String {
    protected char[] chars;
    public String() { chars = new char[0]; }
    public String(char[] source) { chars = source; }
    public int length() { return chars.length; }
    public String concat(String other) { return other; }
    public String toString() { return this; }
    public static String valueOf(Object value) {
        if (value == null) { return "null"; }
        return value.toString();
    }
    public static String valueOf(int value) { return new String(); }
    public static String valueOf(char value) { return new String(); }
    public static String valueOf(boolean value) { return new String(); }
}
"#,
    r#"
package __joos_internal__;
public class TypeInfo {
    protected int tid;
    protected TypeInfo[] parents;
    public static int num_types = 0;
    public TypeInfo(int id, TypeInfo[] supers) {
        tid = id;
        parents = supers;
    }
    public static boolean InstanceOf(TypeInfo target, TypeInfo of) {
        if (of == target) { return true; }
        for (int i = 0; i < of.parents.length; i = i + 1) {
            if (TypeInfo.InstanceOf(target, of.parents[i])) { return true; }
        }
        return false;
    }
}
"#,
    r#"
package __joos_internal__;
public class Array {
    public Array() {}
}
"#,
    r#"
package __joos_internal__;
public class StackFrame {
    protected String fileName;
    protected String typeName;
    protected String methodName;
    protected int line;
    public StackFrame() {}
    public void Print() {}
    public static void PrintException(int code) {}
}
"#,
];

/// Lexes, parses, and weeds the given sources; panics on any
/// front-end error so semantic tests start clean.
pub fn parse_program(sources: &[&str]) -> ast::Program {
    let mut errors = ErrorList::new();
    let mut units = Vec::new();
    for (file, source) in sources.iter().enumerate() {
        let tokens = api::lex(file, source, &mut errors);
        if let Some(unit) = api::parse(file, &tokens, &mut errors) {
            units.push(unit);
        }
    }
    let program = ast::Program { units };
    api::weed(&program, &mut errors);
    assert!(
        !errors.is_fatal(),
        "front-end errors in test input: {:?}",
        simple(&errors)
    );
    program
}

/// Full front-to-middle pipeline over `sources` with the mini
/// standard library appended.
pub fn check_program(
    sources: &[&str],
) -> (
    ast::Program,
    Option<(api::TypeSet, api::TypeInfoMap, api::ConstStringMap)>,
    ErrorList,
) {
    let all: Vec<&str> = sources.iter().chain(STDLIB.iter()).copied().collect();
    let mut program = parse_program(&all);
    let mut errors = ErrorList::new();
    let world = api::check(&mut program, &mut errors);
    (program, world, errors)
}

/// The same pipeline, asserting success.
pub fn check_ok(
    sources: &[&str],
) -> (
    ast::Program,
    api::TypeSet,
    api::TypeInfoMap,
    api::ConstStringMap,
) {
    let (program, world, errors) = check_program(sources);
    let (set, tinfo, strings) = world.unwrap_or_else(|| {
        panic!("expected a valid program, found: {:?}", simple(&errors))
    });
    assert!(!errors.is_fatal());
    (program, set, tinfo, strings)
}

/// Canonical one-line renderings of every diagnostic.
pub fn simple(errors: &ErrorList) -> Vec<String> {
    errors
        .errors()
        .iter()
        .map(|error| error.to_string())
        .collect()
}

/// The diagnostic kinds alone, with positions stripped.
pub fn kinds(errors: &ErrorList) -> Vec<String> {
    simple(errors)
        .into_iter()
        .map(|line| {
            line.split(|c| c == '(' || c == ':')
                .next()
                .unwrap()
                .to_string()
        })
        .collect()
}

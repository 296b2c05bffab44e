// Scenario tests for typedef and using-alias inlining

use cnorm::config::Settings;
use cnorm::normalize::normalize;
use cnorm::report::{CollectedReports, Severity};
use cnorm::tokens::{Lexer, TokenList};

fn run(source: &str) -> (TokenList, CollectedReports) {
    let settings = Settings::cpp();
    let mut list = Lexer::new(source, settings.dialect)
        .tokenize("test.cpp")
        .expect("lexing failed");
    let mut reports = CollectedReports::new();
    normalize(&mut list, &settings, &mut reports).expect("normalization failed");
    (list, reports)
}

#[test]
fn test_alias_in_function_signature() {
    let (list, _) = run("typedef unsigned long Size; Size total(Size a, Size b);");
    assert_eq!(
        list.stringify(),
        "unsigned long total ( unsigned long a , unsigned long b ) ;"
    );
}

#[test]
fn test_alias_in_cast_and_sizeof() {
    let (list, _) = run(
        "typedef int* IntPtr; void f(void* raw) { IntPtr p = (IntPtr)raw; int n = sizeof(IntPtr); }",
    );
    assert_eq!(
        list.stringify(),
        "void f ( void * raw ) { int * p = ( int * ) raw ; int n = sizeof ( int * ) ; }"
    );
}

#[test]
fn test_alias_of_alias_chain() {
    let (list, _) = run("typedef int Base; typedef Base* BasePtr; BasePtr p;");
    assert_eq!(list.stringify(), "int * p ;");
}

#[test]
fn test_namespace_qualified_use_restores_base() {
    let (list, _) = run(
        "namespace N { struct R { }; typedef R Handle; } N::Handle h;",
    );
    assert_eq!(
        list.stringify(),
        "namespace N { struct R { } ; } N :: R h ;"
    );
}

#[test]
fn test_namespace_builtin_alias_qualified_use() {
    let (list, _) = run("namespace N { typedef unsigned Idx; } N::Idx i;");
    assert_eq!(list.stringify(), "namespace N { } unsigned i ;");
}

#[test]
fn test_using_and_typedef_mix() {
    let (list, _) = run(
        "typedef char Byte; using Word = unsigned short; Byte b; Word w;",
    );
    assert_eq!(list.stringify(), "char b ; unsigned short w ;");
}

#[test]
fn test_unparseable_alias_reported_at_debug() {
    let (list, reports) = run("typedef int; int x;");
    // Malformed declarator is skipped, not fatal
    assert!(list.stringify().contains("typedef"));
    assert!(reports
        .diags
        .iter()
        .any(|d| d.severity == Severity::Debug && d.id == "simplifyTypedef"));
}

#[test]
fn test_member_pointer_alias() {
    let (list, _) = run("typedef int (C::*Getter)(float); Getter g;");
    assert_eq!(list.stringify(), "int ( C :: * g ) ( float ) ;");
}

#[test]
fn test_pointer_to_array_alias() {
    let (list, _) = run("typedef int (*Row)[4]; Row r;");
    assert_eq!(list.stringify(), "int ( * r ) [ 4 ] ;");
}

#[test]
fn test_function_returning_function_pointer_alias() {
    let (list, _) = run("typedef void (*Factory(int))(char); Factory make;");
    assert_eq!(list.stringify(), "void ( * make ( int ) ) ( char ) ;");
}

#[test]
fn test_alias_used_in_template_argument() {
    let (list, _) = run("typedef int Id; std::set<Id> ids;");
    assert_eq!(list.stringify(), "std :: set < int > ids ;");
}

#[test]
fn test_record_typedef_with_two_declarators() {
    let (list, _) = run("typedef struct { int v; } Node, *NodePtr; Node n; NodePtr p;");
    assert_eq!(
        list.stringify(),
        "struct Unnamed0 { int v ; } ; struct Unnamed0 n ; struct Unnamed0 * p ;"
    );
}

#[test]
fn test_time_budget_leaves_aliases_untouched() {
    use std::time::Duration;

    let settings = Settings::cpp().with_time_budget(Duration::from_secs(0));
    let mut list = Lexer::new("typedef int* P; P p;", settings.dialect)
        .tokenize("test.cpp")
        .unwrap();
    let mut reports = CollectedReports::new();
    normalize(&mut list, &settings, &mut reports).expect("budget must not be fatal");

    assert!(list.stringify().contains("typedef"));
    assert!(reports
        .diags
        .iter()
        .any(|d| d.severity == Severity::Debug && d.message.contains("budget")));
}

#[test]
fn test_alias_expansion_flags_set() {
    use cnorm::tokens::TokenFlags;

    let (list, _) = run("typedef int* IntPtr; IntPtr p;");
    let star = list.iter().find(|&id| list.text(id) == "*").unwrap();
    assert!(list[star].flags.contains(TokenFlags::ALIAS_EXPANDED));
}

//! Legacy `typedef` inlining
//!
//! Locates every typedef declaration, parses its declarator shape, replaces
//! every valid use-site with the full underlying type, and deletes the
//! declaration.
//!
//! # Fast path
//!
//! The overwhelmingly common case is a handful of file-scope typedefs with
//! unambiguous names that are never re-typedef'd.  When every declaration
//! in the stream meets those preconditions, one pass over the stream
//! inlines all of them with no scope tracking at all.  Otherwise the
//! general path walks the stream with a scope tree, processing declarations
//! in order and confining each substitution to the declaring scope.
//!
//! An alias whose declarator does not parse is left in the stream with a
//! debug-severity report: inlining is an enrichment for later analyses,
//! never a correctness requirement.  A substitution that fails after it
//! started editing is fatal, because the stream is no longer consistent.

use super::declarator::{self, AliasShape};
use super::scopes::{ScopeKind, ScopeTree};
use super::{NormalizeError, SimplifyContext};
use crate::config::Settings;
use crate::report::{Diagnostic, Reporter};
use crate::tokens::{Token, TokenFlags, TokenId, TokenKind, TokenList};
use rustc_hash::{FxHashMap, FxHashSet};

/// One collected typedef declaration.
struct TypedefDecl {
    typedef_tok: TokenId,
    semicolon: TokenId,
    shapes: Vec<AliasShape>,
    depth: usize,
}

pub fn simplify_typedefs(
    list: &mut TokenList,
    _settings: &Settings,
    ctx: &mut SimplifyContext,
    reporter: &mut dyn Reporter,
) -> Result<(), NormalizeError> {
    split_record_typedefs(list, ctx);

    let Some(decls) = collect_typedefs(list) else {
        // At least one declaration did not parse: the general path walks
        // the stream itself and reports the misses in place.
        return general_inline(list, ctx, reporter);
    };
    if decls.is_empty() {
        return Ok(());
    }

    if fast_path_eligible(list, &decls) {
        fast_inline(list, decls, ctx, reporter)
    } else {
        general_inline(list, ctx, reporter)
    }
}

/// `typedef struct [Name] { ... } Alias;` must first become a standalone
/// record declaration followed by a plain typedef, because the record needs
/// to be independently referencable once the alias is gone.  Anonymous
/// records get a generated name.
fn split_record_typedefs(list: &mut TokenList, ctx: &mut SimplifyContext) {
    let typedef_ids: Vec<TokenId> = list
        .iter()
        .filter(|&id| list.text(id) == "typedef")
        .collect();

    for td in typedef_ids {
        let Some(mut cur) = list.next(td) else { continue };
        while matches!(list.text(cur), "const" | "volatile") {
            match list.next(cur) {
                Some(n) => cur = n,
                None => break,
            }
        }

        let kw = cur;
        let kw_text = list.text(kw).to_string();
        if !matches!(kw_text.as_str(), "struct" | "union" | "enum" | "class") {
            continue;
        }

        let mut name = None;
        let Some(mut cur) = list.next(kw) else { continue };
        if list[cur].kind == TokenKind::Name {
            name = Some(list.text(cur).to_string());
            match list.next(cur) {
                Some(n) => cur = n,
                None => continue,
            }
        }

        // Skip a base clause (`: int`, `: public B<T>`) up to the body
        let mut found_body = None;
        for _ in 0..64 {
            match list.text(cur) {
                "{" => {
                    found_body = Some(cur);
                    break;
                }
                ";" | "}" => break,
                "<" => match list[cur].link.and_then(|gt| list.next(gt)) {
                    Some(n) => cur = n,
                    None => break,
                },
                _ => match list.next(cur) {
                    Some(n) => cur = n,
                    None => break,
                },
            }
        }
        let Some(body) = found_body else { continue };
        let Some(close) = list[body].link else { continue };

        let name = match name {
            Some(n) => n,
            None => {
                let generated = ctx.next_unnamed();
                let mut tok = Token::name(generated.clone(), list[kw].loc);
                tok.flags |= TokenFlags::GENERATED;
                list.insert_after(kw, tok);
                generated
            }
        };

        // `} ; typedef struct Name <declarators…>`
        let loc = list[close].loc;
        let mut at = close;
        for (text, kind) in [
            (";", TokenKind::Op),
            ("typedef", TokenKind::Keyword),
            (kw_text.as_str(), TokenKind::Keyword),
            (name.as_str(), TokenKind::Name),
        ] {
            let mut tok = Token::new(text, kind, loc);
            tok.flags |= TokenFlags::GENERATED;
            at = list.insert_after(at, tok);
        }
        list.erase(td);
    }
}

/// Parse every typedef in the stream.  Returns `None` when any declaration
/// fails to parse, which forces the general path.
fn collect_typedefs(list: &TokenList) -> Option<Vec<TypedefDecl>> {
    let mut decls = Vec::new();
    let mut depth = 0usize;

    let mut cur = list.front();
    while let Some(id) = cur {
        match list.text(id) {
            "{" => depth += 1,
            "}" => depth = depth.saturating_sub(1),
            "typedef" => {
                let (shapes, semicolon) = declarator::parse_typedef(list, id)?;
                let after = list.next(semicolon);
                decls.push(TypedefDecl {
                    typedef_tok: id,
                    semicolon,
                    shapes,
                    depth,
                });
                cur = after;
                continue;
            }
            _ => {}
        }
        cur = list.next(id);
    }
    Some(decls)
}

/// Fast-path preconditions: every declaration at file scope, every alias
/// name unique, and no alias name referenced inside another declaration
/// (no re-typedef chains).
fn fast_path_eligible(list: &TokenList, decls: &[TypedefDecl]) -> bool {
    if decls.iter().any(|d| d.depth != 0) {
        return false;
    }

    let mut names = FxHashSet::default();
    for decl in decls {
        for shape in &decl.shapes {
            if !names.insert(shape.name_text(list).to_string()) {
                return false;
            }
        }
    }

    for decl in decls {
        let own: FxHashSet<TokenId> = decl.shapes.iter().map(|s| s.name).collect();
        let mut cur = Some(decl.typedef_tok);
        while let Some(id) = cur {
            if list[id].kind == TokenKind::Name
                && !own.contains(&id)
                && names.contains(list.text(id))
            {
                return false;
            }
            if id == decl.semicolon {
                break;
            }
            cur = list.next(id);
        }
    }

    // A declaration that re-binds an alias name as a variable needs real
    // shadow tracking.  The declarators' own name tokens match the same
    // pattern and don't count.
    let own_names: FxHashSet<TokenId> = decls
        .iter()
        .flat_map(|d| d.shapes.iter().map(|s| s.name))
        .collect();
    for id in list.iter() {
        if list[id].kind == TokenKind::Name
            && !own_names.contains(&id)
            && names.contains(list.text(id))
            && declarator::is_shadowing_decl(list, id)
        {
            return false;
        }
    }
    true
}

/// One pass, no scope tracking: substitute every eligible use-site of every
/// collected alias, then erase the declarations.
fn fast_inline(
    list: &mut TokenList,
    decls: Vec<TypedefDecl>,
    ctx: &mut SimplifyContext,
    reporter: &mut dyn Reporter,
) -> Result<(), NormalizeError> {
    if ctx.expired() {
        report_budget(list, reporter, &decls);
        return Ok(());
    }

    let mut shapes: FxHashMap<String, AliasShape> = FxHashMap::default();
    let mut skip: FxHashMap<TokenId, TokenId> = FxHashMap::default();
    for decl in &decls {
        skip.insert(decl.typedef_tok, decl.semicolon);
        for shape in &decl.shapes {
            shapes.insert(shape.name_text(list).to_string(), shape.clone());
        }
    }

    let mut cur = list.front();
    while let Some(id) = cur {
        if let Some(&semi) = skip.get(&id) {
            cur = list.next(semi);
            continue;
        }
        let next_default = list.next(id);

        if list[id].kind == TokenKind::Name {
            if let Some(shape) = shapes.get(list.text(id)) {
                let qualified = list.prev(id).map(|p| list.text(p)) == Some("::");
                if !qualified
                    && declarator::is_type_use_position(list, id)
                    && !declarator::is_shadowing_decl(list, id)
                {
                    let last = declarator::substitute_at(list, id, shape, None)
                        .map_err(|e| NormalizeError::AliasSubstitution {
                            name: e.name,
                            location: e.location,
                        })?;
                    declarator::fix_chained_declarators(list, last, shape);
                    cur = list.next(last);
                    continue;
                }
            }
        }

        cur = next_default;
    }

    for decl in &decls {
        list.erase_range(decl.typedef_tok, decl.semicolon);
    }
    Ok(())
}

/// Walk the stream with a scope tree, inlining each declaration within its
/// declaring scope as it is encountered.
fn general_inline(
    list: &mut TokenList,
    ctx: &mut SimplifyContext,
    reporter: &mut dyn Reporter,
) -> Result<(), NormalizeError> {
    let mut tree = ScopeTree::new();

    let mut cur = list.front();
    while let Some(id) = cur {
        let next_default = list.next(id);

        if list.text(id) == "typedef" {
            if ctx.expired() {
                reporter.report(Diagnostic::debug(
                    "simplifyTypedef",
                    "time budget exhausted, remaining typedefs are not inlined".to_string(),
                    Some(list[id].loc),
                ));
                return Ok(());
            }

            match declarator::parse_typedef(list, id) {
                None => {
                    reporter.report(Diagnostic::debug(
                        "simplifyTypedef",
                        "unsupported typedef declarator, alias not inlined".to_string(),
                        Some(list[id].loc),
                    ));
                }
                Some((shapes, semicolon)) => {
                    let scope = tree.scope(tree.current());
                    let (scan_end, unqualified_end) = match scope.kind {
                        ScopeKind::Global => (None, None),
                        ScopeKind::Namespace | ScopeKind::Record => (None, scope.body_end),
                        ScopeKind::MemberFunction | ScopeKind::Other => (scope.body_end, None),
                    };
                    let decl_scope = scope.full_name.clone();

                    let after_decl = list.next(semicolon);
                    for shape in &shapes {
                        declarator::inline_alias(
                            list,
                            shape,
                            after_decl,
                            scan_end,
                            unqualified_end,
                            &decl_scope,
                        )
                        .map_err(|e| NormalizeError::AliasSubstitution {
                            name: e.name,
                            location: e.location,
                        })?;
                    }
                    list.erase_range(id, semicolon);
                    cur = after_decl;
                    continue;
                }
            }
        }

        if let Err(e) = tree.advance(list, id) {
            reporter.report(Diagnostic::warning(
                "typedefScope",
                e.message,
                Some(e.location),
            ));
            return Ok(());
        }
        cur = next_default;
    }
    Ok(())
}

fn report_budget(list: &TokenList, reporter: &mut dyn Reporter, decls: &[TypedefDecl]) {
    if let Some(first) = decls.first() {
        reporter.report(Diagnostic::debug(
            "simplifyTypedef",
            "time budget exhausted, remaining typedefs are not inlined".to_string(),
            list.get(first.typedef_tok).map(|t| t.loc),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Dialect, Settings};
    use crate::normalize::links;
    use crate::report::CollectedReports;
    use crate::tokens::Lexer;

    fn simplify(source: &str) -> (TokenList, CollectedReports) {
        let mut list = Lexer::new(source, Dialect::Cpp)
            .tokenize("test.cpp")
            .unwrap();
        links::link_brackets(&mut list).unwrap();
        links::link_angle_brackets(&mut list);
        let settings = Settings::cpp();
        let mut ctx = SimplifyContext::new(&settings);
        let mut reports = CollectedReports::new();
        simplify_typedefs(&mut list, &settings, &mut ctx, &mut reports).unwrap();
        (list, reports)
    }

    #[test]
    fn test_pointer_round_trip() {
        let (list, _) = simplify("typedef int* IntPtr; IntPtr a, b;");
        assert_eq!(list.stringify(), "int * a , * b ;");
    }

    #[test]
    fn test_array_alias() {
        let (list, _) = simplify("typedef int Buffer[16]; Buffer buf;");
        assert_eq!(list.stringify(), "int buf [ 16 ] ;");
    }

    #[test]
    fn test_function_pointer_alias() {
        let (list, _) = simplify("typedef void (*Fn)(int); Fn f;");
        assert_eq!(list.stringify(), "void ( * f ) ( int ) ;");

        // Inserted parens must be mutually linked
        for id in list.iter() {
            if list.text(id) == "(" {
                let close = list[id].link.expect("unlinked inserted paren");
                assert_eq!(list[close].link, Some(id));
            }
        }
    }

    #[test]
    fn test_function_pointer_in_cast_position() {
        let (list, _) = simplify("typedef void (*Fn)(int); void g(void* p) { Fn q = (Fn)p; }");
        assert_eq!(
            list.stringify(),
            "void g ( void * p ) { void ( * q ) ( int ) = ( void ( * ) ( int ) ) p ; }"
        );
    }

    #[test]
    fn test_struct_typedef_split_and_inline() {
        let (list, _) = simplify("typedef struct S { int v; } Alias; Alias a;");
        assert_eq!(list.stringify(), "struct S { int v ; } ; struct S a ;");
    }

    #[test]
    fn test_anonymous_struct_gets_name() {
        let (list, _) = simplify("typedef struct { int v; } Anon; Anon a;");
        assert_eq!(
            list.stringify(),
            "struct Unnamed0 { int v ; } ; struct Unnamed0 a ;"
        );
    }

    #[test]
    fn test_unsupported_shape_reported_not_fatal() {
        let (list, reports) = simplify("typedef int; int x;");
        assert_eq!(list.stringify(), "typedef int ; int x ;");
        assert!(reports
            .diags
            .iter()
            .any(|d| d.id == "simplifyTypedef"));
    }

    #[test]
    fn test_shadowed_name_not_substituted() {
        let (list, _) = simplify(
            "typedef int* IntPtr; void f() { float IntPtr; IntPtr = 0; } IntPtr p;",
        );
        assert_eq!(
            list.stringify(),
            "void f ( ) { float IntPtr ; IntPtr = 0 ; } int * p ;"
        );
    }

    #[test]
    fn test_retypedef_goes_through_general_path() {
        let (list, _) = simplify("typedef int Base; typedef Base Derived; Derived d;");
        assert_eq!(list.stringify(), "int d ;");
    }

    #[test]
    fn test_block_local_typedef_confined() {
        let (list, _) = simplify(
            "void f() { typedef int T; T x; } void g() { T y; }",
        );
        assert_eq!(
            list.stringify(),
            "void f ( ) { int x ; } void g ( ) { T y ; }"
        );
    }

    #[test]
    fn test_idempotent_after_full_inline() {
        let (mut list, _) = simplify("typedef int* IntPtr; IntPtr a;");
        let before = list.stringify();

        let settings = Settings::cpp();
        let mut ctx = SimplifyContext::new(&settings);
        let mut reports = CollectedReports::new();
        simplify_typedefs(&mut list, &settings, &mut ctx, &mut reports).unwrap();
        assert_eq!(list.stringify(), before);
        assert!(reports.is_empty());
    }

    #[test]
    fn test_member_access_name_untouched() {
        let (list, _) = simplify("typedef int T; void f(S s) { s.T = 1; }");
        assert_eq!(list.stringify(), "void f ( S s ) { s . T = 1 ; }");
    }
}

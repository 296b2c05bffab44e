//! C++ `using` alias inlining
//!
//! The second alias sub-engine: `using X = ...;` declarations share the
//! declarator shapes and the substitution machinery of the typedef engine,
//! with two extra normalizations of its own:
//!
//! - `using N::x;` single-symbol imports are rewritten to `using x = N::x;`
//!   first, so one engine handles both forms.
//! - `template <...> using X = ...;` alias templates are never inlined
//!   (that would require instantiation); they are reported at debug
//!   severity and left in the stream.
//!
//! `using namespace N;` is not an alias at all — the scope tracker records
//! it for name visibility and the declaration stays.

use super::declarator;
use super::scopes::{ScopeKind, ScopeTree};
use super::{NormalizeError, SimplifyContext};
use crate::config::Settings;
use crate::report::{Diagnostic, Reporter};
use crate::tokens::{Token, TokenFlags, TokenId, TokenKind, TokenList};

pub fn simplify_usings(
    list: &mut TokenList,
    _settings: &Settings,
    ctx: &mut SimplifyContext,
    reporter: &mut dyn Reporter,
) -> Result<(), NormalizeError> {
    let mut tree = ScopeTree::new();

    let mut cur = list.front();
    while let Some(id) = cur {
        let next_default = list.next(id);

        if list.text(id) == "using" && list[id].kind == TokenKind::Keyword {
            if is_template_alias(list, id) {
                reporter.report(Diagnostic::debug(
                    "simplifyUsing",
                    "alias template is not inlined".to_string(),
                    Some(list[id].loc),
                ));
            } else if let Some(name_tok) = list.next(id) {
                let is_name = list[name_tok].kind == TokenKind::Name;
                let after = list.next(name_tok).map(|a| list.text(a).to_string());

                if is_name && after.as_deref() == Some("=") {
                    if ctx.expired() {
                        reporter.report(Diagnostic::debug(
                            "simplifyUsing",
                            "time budget exhausted, remaining aliases are not inlined"
                                .to_string(),
                            Some(list[id].loc),
                        ));
                        return Ok(());
                    }
                    match inline_using(list, &tree, id, name_tok, reporter)? {
                        Some(resume) => {
                            cur = resume;
                            continue;
                        }
                        None => {}
                    }
                } else if is_name && after.as_deref() == Some("::") {
                    if normalize_import(list, id, name_tok) {
                        // Re-visit the same `using`, now in `X = ...` form
                        cur = Some(id);
                        continue;
                    }
                }
            }
        }

        if let Err(e) = tree.advance(list, id) {
            reporter.report(Diagnostic::warning(
                "usingScope",
                e.message,
                Some(e.location),
            ));
            return Ok(());
        }
        cur = next_default;
    }
    Ok(())
}

/// Parse and inline one `using X = ...;`.  Returns the resume position
/// after an inlined (and erased) declaration, or `None` when the shape was
/// not recognized and the declaration stays.
fn inline_using(
    list: &mut TokenList,
    tree: &ScopeTree,
    using_tok: TokenId,
    name_tok: TokenId,
    reporter: &mut dyn Reporter,
) -> Result<Option<Option<TokenId>>, NormalizeError> {
    let Some(first) = list.nth_next(name_tok, 2) else {
        return Ok(None);
    };

    let Some((shape, semicolon)) = declarator::parse_using(list, name_tok, first) else {
        reporter.report(Diagnostic::debug(
            "simplifyUsing",
            format!(
                "unsupported declarator for alias '{}', not inlined",
                list.text(name_tok)
            ),
            Some(list[using_tok].loc),
        ));
        return Ok(None);
    };

    let scope = tree.scope(tree.current());
    let (scan_end, unqualified_end) = match scope.kind {
        ScopeKind::Global => (None, None),
        ScopeKind::Namespace | ScopeKind::Record => (None, scope.body_end),
        ScopeKind::MemberFunction | ScopeKind::Other => (scope.body_end, None),
    };
    let decl_scope = scope.full_name.clone();

    let after_decl = list.next(semicolon);
    declarator::inline_alias(list, &shape, after_decl, scan_end, unqualified_end, &decl_scope)
        .map_err(|e| NormalizeError::AliasSubstitution {
            name: e.name,
            location: e.location,
        })?;

    list.erase_range(using_tok, semicolon);
    Ok(Some(after_decl))
}

/// Rewrite `using N :: x ;` into `using x = N :: x ;` so the alias engine
/// can process it.  Returns false when the import shape is unexpected.
fn normalize_import(list: &mut TokenList, using_tok: TokenId, first_component: TokenId) -> bool {
    // Find the last component before `;`
    let mut last_name = None;
    let mut cur = Some(first_component);
    while let Some(id) = cur {
        match list.text(id) {
            ";" => break,
            "::" => {}
            _ if list[id].kind == TokenKind::Name => last_name = Some(id),
            _ => return false,
        }
        cur = list.next(id);
    }
    let Some(last_name) = last_name else {
        return false;
    };
    if last_name == first_component {
        return false;
    }

    let loc = list[using_tok].loc;
    let mut name = Token::name(list.text(last_name).to_string(), loc);
    name.flags |= TokenFlags::GENERATED;
    let inserted = list.insert_after(using_tok, name);
    let mut eq = Token::op("=", loc);
    eq.flags |= TokenFlags::GENERATED;
    list.insert_after(inserted, eq);
    true
}

/// `template < ... > using` alias templates cannot be inlined without
/// instantiation.
fn is_template_alias(list: &TokenList, using_tok: TokenId) -> bool {
    let Some(prev) = list.prev(using_tok) else {
        return false;
    };
    if list.text(prev) != ">" {
        return false;
    }
    list[prev]
        .link
        .and_then(|open| list.prev(open))
        .map(|t| list.text(t) == "template")
        .unwrap_or(false)
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
        simplify_usings(&mut list, &settings, &mut ctx, &mut reports).unwrap();
        (list, reports)
    }

    #[test]
    fn test_plain_using_alias() {
        let (list, _) = simplify("using IntPtr = int*; IntPtr p;");
        assert_eq!(list.stringify(), "int * p ;");
    }

    #[test]
    fn test_using_function_pointer() {
        let (list, _) = simplify("using Fn = void (*)(int); Fn f;");
        assert_eq!(list.stringify(), "void ( * f ) ( int ) ;");
    }

    #[test]
    fn test_using_template_base() {
        let (list, _) = simplify("using IntVec = std::vector<int>; IntVec v;");
        assert_eq!(list.stringify(), "std :: vector < int > v ;");

        // The copied angle brackets must be mutually linked
        let lt = list.iter().find(|&id| list.text(id) == "<").unwrap();
        let gt = list.iter().find(|&id| list.text(id) == ">").unwrap();
        assert_eq!(list[lt].link, Some(gt));
        assert_eq!(list[gt].link, Some(lt));
    }

    #[test]
    fn test_import_normalized_and_inlined() {
        let (list, _) = simplify("namespace N { struct S { }; } using N::S; S s;");
        assert_eq!(
            list.stringify(),
            "namespace N { struct S { } ; } N :: S s ;"
        );
    }

    #[test]
    fn test_alias_template_reported_and_kept() {
        let (list, reports) =
            simplify("template <class T> using Vec = std::vector<T>; Vec<int> v;");
        assert!(list.stringify().contains("using Vec ="));
        assert!(reports.diags.iter().any(|d| d.id == "simplifyUsing"));
    }

    #[test]
    fn test_using_namespace_untouched() {
        let (list, _) = simplify("using namespace std; int x;");
        assert_eq!(list.stringify(), "using namespace std ; int x ;");
    }

    #[test]
    fn test_block_local_using_confined() {
        let (list, _) = simplify("void f() { using T = int; T x; } void g() { T y; }");
        assert_eq!(
            list.stringify(),
            "void f ( ) { int x ; } void g ( ) { T y ; }"
        );
    }

    #[test]
    fn test_array_using_alias() {
        let (list, _) = simplify("using Buf = char[8]; Buf b;");
        assert_eq!(list.stringify(), "char b [ 8 ] ;");
    }
}

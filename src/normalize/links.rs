//! Bracket linking
//!
//! Two passes over the stream:
//!
//! 1. [`link_brackets`] pairs `{}`, `()`, and `[]` with one forward scan.
//!    Any mismatch here is fatal: the stream cannot be trusted further.
//! 2. [`link_angle_brackets`] overlays heuristic `<`/`>` template links for
//!    C++.  The heuristic is deliberately conservative: an ambiguous `<`
//!    stays unlinked, and downstream passes treat "no link" as "not a
//!    template" and skip their template-aware logic.

use super::NormalizeError;
use crate::tokens::{BracketKind, TokenFlags, TokenId, TokenKind, TokenList};
use rustc_hash::FxHashSet;

/// Pair every `{}`, `()`, and `[]` in the stream.
///
/// A closing token with an empty stack, a kind mismatch between opener and
/// closer, or leftover unclosed openers at end of stream are all fatal.
pub fn link_brackets(list: &mut TokenList) -> Result<(), NormalizeError> {
    let mut stack: Vec<(TokenId, BracketKind)> = Vec::new();

    let ids: Vec<TokenId> = list.iter().collect();
    for id in ids {
        if let Some(kind) = list[id].open_bracket() {
            stack.push((id, kind));
        } else if let Some(kind) = list[id].close_bracket() {
            match stack.pop() {
                None => {
                    return Err(NormalizeError::UnmatchedClosing {
                        text: list.text(id).to_string(),
                        location: list[id].loc,
                    });
                }
                Some((open, open_kind)) if open_kind != kind => {
                    return Err(NormalizeError::MismatchedBracket {
                        open: list.text(open).to_string(),
                        close: list.text(id).to_string(),
                        location: list[id].loc,
                    });
                }
                Some((open, _)) => {
                    list.link_pair(open, id);
                }
            }
        }
    }

    if let Some(&(open, _)) = stack.last() {
        return Err(NormalizeError::UnclosedBracket {
            text: list.text(open).to_string(),
            location: list[open].loc,
        });
    }

    Ok(())
}

/// Overlay template angle-bracket links (C++ only).
///
/// Walks the stream tracking a stack of tentative `<` candidates.  A `>`
/// links the innermost candidate; a `>>` that closes two candidate levels
/// is split into two `>` tokens first.  Tokens that cannot appear at the
/// top level of a template argument list discard all open candidates, which
/// is what keeps relational uses (`a < b`) unlinked.
pub fn link_angle_brackets(list: &mut TokenList) {
    let known_vars = collect_variable_names(list);
    let mut candidates: Vec<TokenId> = Vec::new();
    // Candidate counts at each enclosing `(`/`[`: a `>` inside a paren pair
    // must never close a candidate opened outside it.
    let mut barriers: Vec<usize> = Vec::new();

    let mut cur = list.front();
    while let Some(id) = cur {
        let next = list.next(id);
        let kind = list[id].kind;
        let text = list[id].text.clone();
        let floor = barriers.last().copied().unwrap_or(0);

        if kind == TokenKind::Op {
            match text.as_str() {
                "<" => {
                    if is_template_open_candidate(list, id, &known_vars) {
                        candidates.push(id);
                    }
                }
                ">" => {
                    if candidates.len() > floor {
                        if let Some(open) = candidates.pop() {
                            list.link_pair(open, id);
                        }
                    }
                }
                ">>" => {
                    if candidates.len() >= floor + 2 {
                        // Two nested levels close at once: structural edit
                        let second = list.split_op(id);
                        list[id].flags |= TokenFlags::SPLIT_SHIFT;
                        list[second].flags |= TokenFlags::SPLIT_SHIFT;
                        if let Some(inner) = candidates.pop() {
                            list.link_pair(inner, id);
                        }
                        if let Some(outer) = candidates.pop() {
                            list.link_pair(outer, second);
                        }
                        cur = list.next(second);
                        continue;
                    }
                    // A lone candidate followed by a shift is not a template
                    candidates.truncate(floor);
                }
                "(" | "[" => {
                    barriers.push(candidates.len());
                }
                ")" | "]" => {
                    if let Some(mark) = barriers.pop() {
                        // Candidates opened inside the pair die with it
                        candidates.truncate(mark);
                    }
                }
                // Statement boundaries and operators that cannot sit at the
                // top level of a template argument list
                ";" | "{" | "}" | "&&" | "||" | "<<" | "<<=" | ">>=" | "+" | "-" | "/" | "%"
                | "!" | "?" | "^" | "~" | "." | "->" => {
                    candidates.truncate(floor);
                }
                _ => {}
            }
        }

        cur = next;
    }
}

/// A `<` is a candidate template opener only in shapes where a template
/// name can actually appear.
fn is_template_open_candidate(
    list: &TokenList,
    lt: TokenId,
    known_vars: &FxHashSet<String>,
) -> bool {
    let Some(prev) = list.prev(lt) else {
        return false;
    };
    let prev_tok = &list[prev];

    match prev_tok.kind {
        // A name that is not a known variable: `vector <`, `A <`
        TokenKind::Name => !known_vars.contains(&prev_tok.text),
        TokenKind::Keyword => prev_tok.text == "template",
        TokenKind::Op => match prev_tok.text.as_str() {
            // `operator ( ) <` / `operator [ ] <` explicit instantiations
            ")" | "]" => prev_tok
                .link
                .and_then(|open| list.prev(open))
                .map(|before| list.text(before) == "operator")
                .unwrap_or(false),
            _ => false,
        },
        _ => false,
    }
}

/// Cheap pre-scan for names that are clearly variables, so `a < b` after
/// `int a;` never opens a candidate.  Misses are fine: they only make the
/// angle heuristic more willing, and the discard rules still apply.
fn collect_variable_names(list: &TokenList) -> FxHashSet<String> {
    let mut vars = FxHashSet::default();

    for id in list.iter() {
        let tok = &list[id];
        if tok.kind != TokenKind::Name {
            continue;
        }
        let Some(prev) = list.prev(id) else { continue };
        let Some(next) = list.next(id) else { continue };

        let prev_tok = &list[prev];
        let type_ish_prev = match prev_tok.kind {
            TokenKind::Name => true,
            TokenKind::Keyword => {
                crate::tokens::keywords::TYPE_KEYWORDS.contains(prev_tok.text.as_str())
            }
            TokenKind::Op => matches!(prev_tok.text.as_str(), "*" | "&" | ">"),
            _ => false,
        };
        if !type_ish_prev {
            continue;
        }

        if matches!(list.text(next), ";" | "=" | "," | ")" | "[") {
            vars.insert(tok.text.clone());
        }
    }

    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dialect;
    use crate::tokens::Lexer;

    fn lex(source: &str) -> TokenList {
        Lexer::new(source, Dialect::Cpp).tokenize("test.cpp").unwrap()
    }

    fn linked(source: &str) -> TokenList {
        let mut list = lex(source);
        link_brackets(&mut list).unwrap();
        link_angle_brackets(&mut list);
        list
    }

    fn find(list: &TokenList, text: &str, nth: usize) -> TokenId {
        list.iter()
            .filter(|&id| list.text(id) == text)
            .nth(nth)
            .unwrap()
    }

    #[test]
    fn test_links_are_mutual() {
        let list = linked("int f(int a[3]) { return a[0]; }");
        for id in list.iter() {
            if let Some(partner) = list[id].link {
                assert_eq!(list[partner].link, Some(id), "link not mutual at {id}");
            }
        }
    }

    #[test]
    fn test_nested_pairs() {
        let list = linked("{ ( [ ] ) }");
        let brace = find(&list, "{", 0);
        let paren = find(&list, "(", 0);
        let square = find(&list, "[", 0);
        assert_eq!(list[brace].link, Some(find(&list, "}", 0)));
        assert_eq!(list[paren].link, Some(find(&list, ")", 0)));
        assert_eq!(list[square].link, Some(find(&list, "]", 0)));
    }

    #[test]
    fn test_unmatched_close_is_fatal() {
        let mut list = lex("int f() { } }");
        match link_brackets(&mut list) {
            Err(NormalizeError::UnmatchedClosing { text, .. }) => assert_eq!(text, "}"),
            other => panic!("expected UnmatchedClosing, got {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_open_is_fatal() {
        let mut list = lex("int f() {");
        assert!(matches!(
            link_brackets(&mut list),
            Err(NormalizeError::UnclosedBracket { .. })
        ));
    }

    #[test]
    fn test_kind_mismatch_is_fatal() {
        let mut list = lex("( ]");
        assert!(matches!(
            link_brackets(&mut list),
            Err(NormalizeError::MismatchedBracket { .. })
        ));
    }

    #[test]
    fn test_simple_template_links() {
        let list = linked("std::vector<int> v;");
        let lt = find(&list, "<", 0);
        let gt = find(&list, ">", 0);
        assert_eq!(list[lt].link, Some(gt));
        assert_eq!(list[gt].link, Some(lt));
    }

    #[test]
    fn test_nested_shift_split() {
        let list = linked("vector<vector<int>> v;");
        assert_eq!(list.stringify(), "vector < vector < int > > v ;");

        let outer_lt = find(&list, "<", 0);
        let inner_lt = find(&list, "<", 1);
        let inner_gt = find(&list, ">", 0);
        let outer_gt = find(&list, ">", 1);
        assert_eq!(list[inner_lt].link, Some(inner_gt));
        assert_eq!(list[outer_lt].link, Some(outer_gt));
        assert!(list[inner_gt].flags.contains(TokenFlags::SPLIT_SHIFT));
        assert!(list[outer_gt].flags.contains(TokenFlags::SPLIT_SHIFT));
    }

    #[test]
    fn test_comparison_not_linked() {
        let list = linked("void f() { int a; int b; if (a < b) {} }");
        let lt = find(&list, "<", 0);
        assert_eq!(list[lt].link, None);
    }

    #[test]
    fn test_comparison_with_call_not_linked() {
        // `a < b` followed by `;` before any `>` discards the candidate
        let list = linked("void f(int a, int b) { bool c = a < b; }");
        let lt = find(&list, "<", 0);
        assert_eq!(list[lt].link, None);
    }

    #[test]
    fn test_shift_expression_untouched() {
        let list = linked("void f() { int a; int b; b = a >> 2; }");
        assert_eq!(
            list.stringify(),
            "void f ( ) { int a ; int b ; b = a >> 2 ; }"
        );
    }

    #[test]
    fn test_template_declaration_links() {
        let list = linked("template<class T> struct S { T t; };");
        let lt = find(&list, "<", 0);
        let gt = find(&list, ">", 0);
        assert_eq!(list[lt].link, Some(gt));
    }

    #[test]
    fn test_qualified_template_member() {
        let list = linked("A<B>::C<D> x;");
        let lt0 = find(&list, "<", 0);
        let gt0 = find(&list, ">", 0);
        let lt1 = find(&list, "<", 1);
        let gt1 = find(&list, ">", 1);
        assert_eq!(list[lt0].link, Some(gt0));
        assert_eq!(list[lt1].link, Some(gt1));
    }
}

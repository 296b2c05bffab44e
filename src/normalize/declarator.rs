//! Alias declarator shapes and the substitution engine
//!
//! An alias declaration (`typedef` or `using`) is decomposed into an
//! [`AliasShape`]: the base-type token range, declarator-level pointer and
//! reference qualifiers, the array/parameter ranges, and a
//! [`DeclaratorKind`] tag describing the overall structure.  Each
//! recognizer returns `None` instead of guessing: an alias whose shape is
//! not recognized is simply left in the stream.
//!
//! [`substitute_at`] rewrites one use-site with the full aliased type.
//! Pointer-to-function and pointer-to-array shapes wrap the declared name
//! (`Fn f;` → `void ( * f ) ( int ) ;`); every bracket token spliced in is
//! linked to its partner before the call returns, so the stream never holds
//! an unlinked pair, even transiently.

use crate::tokens::keywords::TYPE_KEYWORDS;
use crate::tokens::{SourceLocation, Token, TokenFlags, TokenId, TokenKind, TokenList};

/// Structural classification of an aliased type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaratorKind {
    /// Named type with optional pointers/references and array dimensions.
    Plain,
    /// Function type: `typedef int F(int);`
    Function,
    /// Pointer to function: `typedef void (*Fn)(int);`
    FunctionPointer,
    /// Function returning a pointer to function:
    /// `typedef void (*F(int))(char);`
    FunctionReturningFunctionPointer,
    /// Pointer to array: `typedef int (*PA)[4];`
    PointerToArray,
    /// Pointer to member (data or function): `typedef int (C::*PM)(float);`
    PointerToMember,
    /// `decltype(...)`/`__typeof__(...)` base carried opaquely.
    Opaque,
}

/// Parsed decomposition of one alias declarator.
#[derive(Debug, Clone)]
pub struct AliasShape {
    pub kind: DeclaratorKind,
    /// The alias name token inside the declaration.
    pub name: TokenId,
    /// Inclusive range of base-type tokens.
    pub base: (TokenId, TokenId),
    /// Declarator-level `*`/`&`/`&&`/cv tokens, in order.
    pub pointers: Vec<String>,
    /// Class path for pointer-to-member shapes.
    pub member_path: Vec<String>,
    /// Inclusive `[ ... ]` range covering every dimension.
    pub array: Option<(TokenId, TokenId)>,
    /// Inclusive `( ... )` parameter range.
    pub args: Option<(TokenId, TokenId)>,
    /// Second parameter range for function-returning-function-pointer.
    pub ret_args: Option<(TokenId, TokenId)>,
}

impl AliasShape {
    pub fn name_text<'a>(&self, list: &'a TokenList) -> &'a str {
        list.text(self.name)
    }
}

/// A committed substitution that could not complete; the stream is
/// inconsistent and the caller must abort.
#[derive(Debug, Clone)]
pub struct SubstitutionFailed {
    pub name: String,
    pub location: SourceLocation,
}

/// Parse every declarator of a `typedef` declaration.  Returns the shapes
/// (one per declared alias name, sharing the base range) and the
/// terminating `;`, or `None` when the declaration is not recognized.
pub fn parse_typedef(list: &TokenList, typedef_tok: TokenId) -> Option<(Vec<AliasShape>, TokenId)> {
    let first = list.next(typedef_tok)?;
    let (base_first, base_last, mut cur) = parse_base(list, first)?;

    let mut shapes = Vec::new();
    loop {
        let (shape, after) = parse_one_declarator(list, cur, (base_first, base_last))?;
        let chainable = matches!(shape.kind, DeclaratorKind::Plain | DeclaratorKind::Opaque);
        shapes.push(shape);

        match list.text(after) {
            ";" => return Some((shapes, after)),
            "," if chainable => cur = list.next(after)?,
            _ => return None,
        }
    }
}

/// Parse the aliased type of `using Name = ... ;`.  `name_tok` is the alias
/// name, `first` the token after `=`.  Returns the shape and the `;`.
pub fn parse_using(
    list: &TokenList,
    name_tok: TokenId,
    first: TokenId,
) -> Option<(AliasShape, TokenId)> {
    let (base_first, base_last, mut cur) = parse_base(list, first)?;
    let pointers = parse_pointers(list, &mut cur);

    let mut shape = AliasShape {
        kind: if is_opaque_base(list, base_first) {
            DeclaratorKind::Opaque
        } else {
            DeclaratorKind::Plain
        },
        name: name_tok,
        base: (base_first, base_last),
        pointers: Vec::new(),
        member_path: Vec::new(),
        array: None,
        args: None,
        ret_args: None,
    };

    match list.text(cur) {
        ";" => {
            shape.pointers = pointers;
            Some((shape, cur))
        }
        "[" => {
            let (array_first, array_last) = collect_array_dims(list, cur)?;
            let semi = list.next(array_last)?;
            if list.text(semi) != ";" {
                return None;
            }
            shape.pointers = pointers;
            shape.array = Some((array_first, array_last));
            Some((shape, semi))
        }
        "(" => {
            let close = list[cur].link?;
            let inner = list.next(cur)?;

            if starts_declarator_parens(list, inner) {
                // `( * )` or `( C :: * )` with no name inside
                let (member_path, inner_pointers, at) = parse_inner_prefix(list, inner)?;
                if at != close {
                    return None;
                }
                let args_open = list.next(close)?;
                if list.text(args_open) != "(" {
                    return None;
                }
                let args_close = list[args_open].link?;
                let semi = list.next(args_close)?;
                if list.text(semi) != ";" {
                    return None;
                }
                shape.kind = if member_path.is_empty() {
                    DeclaratorKind::FunctionPointer
                } else {
                    DeclaratorKind::PointerToMember
                };
                shape.member_path = member_path;
                shape.pointers = inner_pointers;
                shape.args = Some((args_open, args_close));
                Some((shape, semi))
            } else {
                // `using F = int (int);` — plain function type
                let semi = list.next(close)?;
                if list.text(semi) != ";" {
                    return None;
                }
                if !pointers.is_empty() {
                    return None;
                }
                shape.kind = DeclaratorKind::Function;
                shape.args = Some((cur, close));
                Some((shape, semi))
            }
        }
        _ => None,
    }
}

/// One typedef declarator starting at `cur`.  Returns the shape and the
/// token after it (`;` or `,`).
fn parse_one_declarator(
    list: &TokenList,
    mut cur: TokenId,
    base: (TokenId, TokenId),
) -> Option<(AliasShape, TokenId)> {
    let pointers = parse_pointers(list, &mut cur);

    let mut shape = AliasShape {
        kind: if is_opaque_base(list, base.0) {
            DeclaratorKind::Opaque
        } else {
            DeclaratorKind::Plain
        },
        name: cur,
        base,
        pointers,
        member_path: Vec::new(),
        array: None,
        args: None,
        ret_args: None,
    };

    // Pointer-to-data-member prefix: `C :: * name`
    if list[cur].kind == TokenKind::Name && list.next(cur).map(|n| list.text(n)) == Some("::") {
        let (path, inner_pointers, at) = parse_inner_prefix(list, cur)?;
        if path.is_empty() || inner_pointers.is_empty() {
            return None;
        }
        shape.kind = DeclaratorKind::PointerToMember;
        shape.member_path = path;
        shape.pointers = inner_pointers;
        cur = at;
        shape.name = cur;
        if list[cur].kind != TokenKind::Name {
            return None;
        }
        let after = list.next(cur)?;
        if !matches!(list.text(after), ";" | ",") {
            return None;
        }
        return Some((shape, after));
    }

    match list[cur].kind {
        TokenKind::Name => {
            shape.name = cur;
            let after = list.next(cur)?;
            match list.text(after) {
                ";" | "," => Some((shape, after)),
                "[" => {
                    let (array_first, array_last) = collect_array_dims(list, after)?;
                    shape.array = Some((array_first, array_last));
                    let next = list.next(array_last)?;
                    if !matches!(list.text(next), ";" | ",") {
                        return None;
                    }
                    Some((shape, next))
                }
                "(" => {
                    let close = list[after].link?;
                    shape.kind = DeclaratorKind::Function;
                    shape.args = Some((after, close));
                    let next = list.next(close)?;
                    if list.text(next) != ";" {
                        return None;
                    }
                    Some((shape, next))
                }
                _ => None,
            }
        }
        TokenKind::Op if list.text(cur) == "(" => {
            parse_paren_declarator(list, cur, shape)
        }
        _ => None,
    }
}

/// Parenthesized typedef declarators: function pointer, pointer to array,
/// pointer to member function, function returning function pointer.
fn parse_paren_declarator(
    list: &TokenList,
    lparen: TokenId,
    mut shape: AliasShape,
) -> Option<(AliasShape, TokenId)> {
    let close = list[lparen].link?;
    let inner = list.next(lparen)?;
    let (member_path, inner_pointers, at) = parse_inner_prefix(list, inner)?;
    if inner_pointers.iter().all(|p| p != "*") {
        return None;
    }
    shape.member_path = member_path;
    shape.pointers = inner_pointers;

    if list[at].kind != TokenKind::Name {
        return None;
    }
    shape.name = at;
    let after_name = list.next(at)?;

    if after_name == close {
        // `( * name )` — postfix decides pointer-to-function vs array
        let postfix = list.next(close)?;
        match list.text(postfix) {
            "(" => {
                let args_close = list[postfix].link?;
                shape.kind = if shape.member_path.is_empty() {
                    DeclaratorKind::FunctionPointer
                } else {
                    DeclaratorKind::PointerToMember
                };
                shape.args = Some((postfix, args_close));
                let next = list.next(args_close)?;
                if !matches!(list.text(next), ";") {
                    return None;
                }
                Some((shape, next))
            }
            "[" => {
                if !shape.member_path.is_empty() {
                    return None;
                }
                let (array_first, array_last) = collect_array_dims(list, postfix)?;
                shape.kind = DeclaratorKind::PointerToArray;
                shape.array = Some((array_first, array_last));
                let next = list.next(array_last)?;
                if list.text(next) != ";" {
                    return None;
                }
                Some((shape, next))
            }
            _ => None,
        }
    } else if list.text(after_name) == "(" {
        // `( * name ( args1 ) ) ( args2 )` — function returning a pointer
        // to function
        if !shape.member_path.is_empty() {
            return None;
        }
        let args1_close = list[after_name].link?;
        if list.next(args1_close)? != close {
            return None;
        }
        let args2_open = list.next(close)?;
        if list.text(args2_open) != "(" {
            return None;
        }
        let args2_close = list[args2_open].link?;
        shape.kind = DeclaratorKind::FunctionReturningFunctionPointer;
        shape.args = Some((after_name, args1_close));
        shape.ret_args = Some((args2_open, args2_close));
        let next = list.next(args2_close)?;
        if list.text(next) != ";" {
            return None;
        }
        Some((shape, next))
    } else {
        None
    }
}

/// Base-type token range: cv qualifiers, builtin keyword runs, elaborated
/// record names, qualified names with linked template arguments, or an
/// opaque `decltype(...)`.  Returns `(first, last, next)`.
fn parse_base(list: &TokenList, first: TokenId) -> Option<(TokenId, TokenId, TokenId)> {
    let mut cur = first;
    let mut last = None;

    // Leading qualifiers
    while matches!(list.text(cur), "const" | "volatile") {
        last = Some(cur);
        cur = list.next(cur)?;
    }

    match list.text(cur) {
        "struct" | "class" | "union" | "enum" => {
            last = Some(cur);
            cur = list.next(cur)?;
            if list[cur].kind != TokenKind::Name {
                return None;
            }
            let (chain_last, next) = parse_qualified_name(list, cur)?;
            last = Some(chain_last);
            cur = next;
        }
        "decltype" | "__typeof__" => {
            let open = list.next(cur)?;
            if list.text(open) != "(" {
                return None;
            }
            let close = list[open].link?;
            last = Some(close);
            cur = list.next(close)?;
        }
        text if TYPE_KEYWORDS.contains(text) => {
            while TYPE_KEYWORDS.contains(list.text(cur)) {
                last = Some(cur);
                cur = list.next(cur)?;
            }
        }
        _ if list[cur].kind == TokenKind::Name => {
            let (chain_last, next) = parse_qualified_name(list, cur)?;
            last = Some(chain_last);
            cur = next;
        }
        _ => return None,
    }

    // Trailing qualifiers
    while matches!(list.text(cur), "const" | "volatile") {
        last = Some(cur);
        cur = list.next(cur)?;
    }

    Some((first, last?, cur))
}

/// `A :: B < ... > :: C` with linked angle brackets skipped.  Returns the
/// last token of the chain and the token after it.  An unlinked `<` makes
/// the chain unparseable.
fn parse_qualified_name(list: &TokenList, first: TokenId) -> Option<(TokenId, TokenId)> {
    let mut last = first;
    let mut cur = list.next(first)?;

    loop {
        match list.text(cur) {
            "<" => match list[cur].link {
                Some(gt) => {
                    last = gt;
                    cur = list.next(gt)?;
                }
                None => return None,
            },
            "::" => {
                let part = list.next(cur)?;
                if list[part].kind != TokenKind::Name {
                    return None;
                }
                last = part;
                cur = list.next(part)?;
            }
            _ => return Some((last, cur)),
        }
    }
}

/// Declarator-level pointer/reference/cv run starting at `*cur`.
fn parse_pointers(list: &TokenList, cur: &mut TokenId) -> Vec<String> {
    let mut pointers = Vec::new();
    while matches!(list.text(*cur), "*" | "&" | "&&" | "const" | "volatile") {
        pointers.push(list.text(*cur).to_string());
        match list.next(*cur) {
            Some(n) => *cur = n,
            None => break,
        }
    }
    pointers
}

/// Inside parenthesized declarators: optional `C ::` path, then pointers.
/// Returns the path components, the pointer run, and the next token.
fn parse_inner_prefix(
    list: &TokenList,
    mut cur: TokenId,
) -> Option<(Vec<String>, Vec<String>, TokenId)> {
    let mut path = Vec::new();
    while list[cur].kind == TokenKind::Name
        && list.next(cur).map(|n| list.text(n)) == Some("::")
    {
        path.push(list.text(cur).to_string());
        cur = list.nth_next(cur, 2)?;
    }
    let pointers = parse_pointers(list, &mut cur);
    if !path.is_empty() && pointers.is_empty() {
        return None;
    }
    Some((path, pointers, cur))
}

/// Consecutive `[ ... ]` groups; returns the first `[` and last `]`.
fn collect_array_dims(list: &TokenList, first_bracket: TokenId) -> Option<(TokenId, TokenId)> {
    let mut last_close = list.get(first_bracket)?.link?;
    loop {
        match list.next(last_close) {
            Some(next) if list.text(next) == "[" => {
                last_close = list[next].link?;
            }
            _ => return Some((first_bracket, last_close)),
        }
    }
}

fn is_opaque_base(list: &TokenList, base_first: TokenId) -> bool {
    matches!(list.text(base_first), "decltype" | "__typeof__")
}

/// True when the tokens after a `(` look like a parenthesized declarator
/// (`* ...` or `C :: * ...`) rather than a parameter list.
fn starts_declarator_parens(list: &TokenList, mut cur: TokenId) -> bool {
    loop {
        let tok = &list[cur];
        match tok.text.as_str() {
            "*" => return true,
            "::" => match list.next(cur) {
                Some(n) => cur = n,
                None => return false,
            },
            _ if tok.kind == TokenKind::Name => match list.next(cur) {
                Some(n) if list.text(n) == "::" => cur = n,
                _ => return false,
            },
            _ => return false,
        }
    }
}

/// Is `site` in a syntactic position where a type reference can stand?
///
/// Conservative by construction: qualified accesses, expression positions,
/// and name-position occurrences (a variable that happens to share the
/// alias name) all answer `false`, and the engines skip them.
pub fn is_type_use_position(list: &TokenList, site: TokenId) -> bool {
    if let Some(prev) = list.prev(site) {
        let prev_tok = &list[prev];
        match prev_tok.text.as_str() {
            "." | "->" | "::" => return false,
            "struct" | "class" | "union" | "enum" => return false,
            _ => {}
        }
        // A bare name right before the site means the site itself is in
        // declared-name position
        if prev_tok.kind == TokenKind::Name {
            return false;
        }
    }

    let Some(next) = list.next(site) else {
        return false;
    };
    let next_tok = &list[next];
    if next_tok.kind == TokenKind::Name {
        return true;
    }
    matches!(
        next_tok.text.as_str(),
        "*" | "&" | "&&" | "::" | ")" | "," | ">" | "("
    )
}

/// Substitute one use-site: the alias-name token at `site` is replaced by
/// the full aliased type.  `qualify` optionally prepends a `Ns ::` prefix
/// when the site's scope cannot see the base type unqualified.
///
/// Returns the id of the last token written, so callers can continue
/// scanning after the splice.
pub fn substitute_at(
    list: &mut TokenList,
    site: TokenId,
    shape: &AliasShape,
    qualify: Option<&str>,
) -> Result<TokenId, SubstitutionFailed> {
    let fail = |list: &TokenList, site: TokenId| SubstitutionFailed {
        name: list.text(site).to_string(),
        location: list.get(site).map(|t| t.loc).unwrap_or(SourceLocation::new(0, 0, 0)),
    };

    // The declaration ranges must still be alive
    if list.get(shape.base.0).is_none() || list.get(shape.base.1).is_none() {
        return Err(fail(list, site));
    }

    let next_is_name = list
        .next(site)
        .map(|n| list[n].kind == TokenKind::Name)
        .unwrap_or(false);

    let mut em = Emitter::new(list, site);

    if let Some(path) = qualify {
        for component in path.split("::").filter(|c| !c.is_empty()) {
            em.lit(component, TokenKind::Name);
            em.lit("::", TokenKind::Op);
        }
    }

    em.range(shape.base.0, shape.base.1)?;

    match shape.kind {
        DeclaratorKind::Plain | DeclaratorKind::Opaque => {
            for p in &shape.pointers {
                em.lit(p, TokenKind::Op);
            }
            if let Some((afirst, alast)) = shape.array {
                if next_is_name {
                    em.skip_over_name()?;
                }
                em.range(afirst, alast)?;
            }
        }
        DeclaratorKind::Function => {
            let (afirst, alast) = shape.args.ok_or_else(|| fail(em.list, site))?;
            if next_is_name {
                em.skip_over_name()?;
            }
            em.range(afirst, alast)?;
        }
        DeclaratorKind::FunctionPointer | DeclaratorKind::PointerToMember => {
            if shape.kind == DeclaratorKind::PointerToMember && shape.args.is_none() {
                // Pointer to data member needs no parentheses
                for component in &shape.member_path {
                    em.lit(component, TokenKind::Name);
                    em.lit("::", TokenKind::Op);
                }
                for p in &shape.pointers {
                    em.lit(p, TokenKind::Op);
                }
            } else {
                em.open();
                for component in &shape.member_path {
                    em.lit(component, TokenKind::Name);
                    em.lit("::", TokenKind::Op);
                }
                for p in &shape.pointers {
                    em.lit(p, TokenKind::Op);
                }
                if next_is_name {
                    em.skip_over_name()?;
                }
                em.close();
                let (afirst, alast) = shape.args.ok_or_else(|| fail(em.list, site))?;
                em.range(afirst, alast)?;
            }
        }
        DeclaratorKind::PointerToArray => {
            em.open();
            for p in &shape.pointers {
                em.lit(p, TokenKind::Op);
            }
            if next_is_name {
                em.skip_over_name()?;
            }
            em.close();
            let (afirst, alast) = shape.array.ok_or_else(|| fail(em.list, site))?;
            em.range(afirst, alast)?;
        }
        DeclaratorKind::FunctionReturningFunctionPointer => {
            em.open();
            for p in &shape.pointers {
                em.lit(p, TokenKind::Op);
            }
            if next_is_name {
                em.skip_over_name()?;
            }
            let (afirst, alast) = shape.args.ok_or_else(|| fail(em.list, site))?;
            em.range(afirst, alast)?;
            em.close();
            let (rfirst, rlast) = shape.ret_args.ok_or_else(|| fail(em.list, site))?;
            em.range(rfirst, rlast)?;
        }
    }

    em.finish()
}

/// After substituting a pointer/array alias at the head of a declaration,
/// re-apply the declarator-level qualifiers to the remaining comma-chained
/// names: `IntPtr a, b;` must end up as `int * a , * b ;`.
pub fn fix_chained_declarators(list: &mut TokenList, after_name: TokenId, shape: &AliasShape) {
    if !matches!(shape.kind, DeclaratorKind::Plain | DeclaratorKind::Opaque) {
        return;
    }
    if shape.pointers.is_empty() && shape.array.is_none() {
        return;
    }

    let mut cur = Some(after_name);
    while let Some(id) = cur {
        match list.text(id) {
            ";" | "=" | "(" | ")" | "{" | "}" => return,
            "," => {
                let Some(name) = list.next(id) else { return };
                if list[name].kind != TokenKind::Name {
                    return;
                }
                let loc = list[name].loc;
                let mut at = id;
                for p in &shape.pointers {
                    let mut tok = Token::op(p.clone(), loc);
                    tok.flags |= TokenFlags::ALIAS_EXPANDED;
                    at = list.insert_after(at, tok);
                }
                if let Some((afirst, alast)) = shape.array {
                    if let Some((cfirst, clast)) = list.copy_range(afirst, alast, name) {
                        mark_range(list, cfirst, clast);
                    }
                }
                cur = list.next(name);
            }
            _ => cur = list.next(id),
        }
    }
}

fn mark_range(list: &mut TokenList, first: TokenId, last: TokenId) {
    let mut cur = Some(first);
    while let Some(id) = cur {
        list[id].flags |= TokenFlags::ALIAS_EXPANDED;
        if id == last {
            break;
        }
        cur = list.next(id);
    }
}

/// Scan `[scan_start, scan_end)` for use-sites of `shape`'s alias name and
/// substitute each one.  Shared by the typedef and `using` engines.
///
/// `decl_scope` is the qualified name of the scope holding the declaration;
/// a use-site written with that qualification (`N :: T`) has the qualifier
/// spliced out and re-established around the substituted base type.  Past
/// `unqualified_end` (the declaring namespace/record body close), only such
/// qualified sites are still eligible.  A local declaration that re-binds
/// the alias name shadows it until its block closes; a later alias
/// re-declaration of the same name ends the scan (the re-declaration is
/// processed on its own).
pub(crate) fn inline_alias(
    list: &mut TokenList,
    shape: &AliasShape,
    scan_start: Option<TokenId>,
    scan_end: Option<TokenId>,
    unqualified_end: Option<TokenId>,
    decl_scope: &str,
) -> Result<(), SubstitutionFailed> {
    let name = shape.name_text(list).to_string();
    let mut depth: usize = 0;
    let mut shadow_depth: Option<usize> = None;
    let mut qualified_only = false;

    let mut cur = scan_start;
    while let Some(id) = cur {
        if Some(id) == scan_end {
            break;
        }
        if Some(id) == unqualified_end {
            qualified_only = true;
        }
        let next_default = list.next(id);
        let text = list.text(id).to_string();

        match text.as_str() {
            "{" => depth += 1,
            "}" => {
                depth = depth.saturating_sub(1);
                if shadow_depth.is_some_and(|d| depth < d) {
                    shadow_depth = None;
                }
            }
            "typedef" | "using" if redeclares_name(list, id, &name) => break,
            t if t == name && list[id].kind == TokenKind::Name => {
                if shadow_depth.is_some() {
                    // Shadowed by a local binding
                } else if is_shadowing_decl(list, id) {
                    shadow_depth = Some(depth);
                } else if list.prev(id).map(|p| list.text(p)) == Some("::") {
                    if let Some(last) =
                        substitute_qualified(list, id, shape, decl_scope)?
                    {
                        cur = list.next(last);
                        continue;
                    }
                } else if !qualified_only && is_type_use_position(list, id) {
                    let last = substitute_at(list, id, shape, None)?;
                    fix_chained_declarators(list, last, shape);
                    cur = list.next(last);
                    continue;
                }
            }
            _ => {}
        }
        cur = next_default;
    }
    Ok(())
}

/// A use-site written as `N :: T` (or a trailing part of the declaring
/// path): splice the qualifier out and substitute with the declaring path
/// restored around the base type.  Returns the last written token, or
/// `None` when the qualifier names something else and the site is skipped.
fn substitute_qualified(
    list: &mut TokenList,
    site: TokenId,
    shape: &AliasShape,
    decl_scope: &str,
) -> Result<Option<TokenId>, SubstitutionFailed> {
    if decl_scope.is_empty() {
        return Ok(None);
    }

    // Collect the `A :: B ::` chain immediately before the site
    let mut components = Vec::new();
    let mut first_prefix_tok = site;
    let mut cur = list.prev(site);
    while let Some(sep) = cur {
        if list.text(sep) != "::" {
            break;
        }
        let Some(part) = list.prev(sep) else { break };
        if list[part].kind != TokenKind::Name {
            break;
        }
        components.push(list.text(part).to_string());
        first_prefix_tok = part;
        cur = list.prev(part);
    }
    if components.is_empty() {
        return Ok(None);
    }
    components.reverse();

    let decl_components: Vec<&str> = decl_scope.split("::").collect();
    if components.len() > decl_components.len()
        || decl_components[decl_components.len() - components.len()..]
            != components.iter().map(|s| s.as_str()).collect::<Vec<_>>()[..]
    {
        return Ok(None);
    }

    // The qualifier belongs to the alias, not to whatever comes out of the
    // substitution: remove it, and re-qualify the base type only when that
    // base is itself a scoped name.
    let before_site = list.prev(site);
    if let Some(stop) = before_site {
        list.erase_range(first_prefix_tok, stop);
    }
    let qualify = if list[shape.base.0].kind == TokenKind::Name {
        Some(decl_scope)
    } else {
        None
    };
    let last = substitute_at(list, site, shape, qualify)?;
    fix_chained_declarators(list, last, shape);
    Ok(Some(last))
}

/// `int T;`-style re-binding of an alias name in variable position.
pub(crate) fn is_shadowing_decl(list: &TokenList, site: TokenId) -> bool {
    let Some(prev) = list.prev(site) else {
        return false;
    };
    let prev_tok = &list[prev];
    let type_ish = (prev_tok.kind == TokenKind::Keyword
        && TYPE_KEYWORDS.contains(prev_tok.text.as_str()))
        || matches!(prev_tok.text.as_str(), "*" | "&");
    if !type_ish {
        return false;
    }
    matches!(
        list.next(site).map(|n| list.text(n)),
        Some(";") | Some("=") | Some(",") | Some(")") | Some("[")
    )
}

/// Does the alias declaration starting at `decl_tok` re-declare `name`?
fn redeclares_name(list: &TokenList, decl_tok: TokenId, name: &str) -> bool {
    match list.text(decl_tok) {
        "typedef" => parse_typedef(list, decl_tok)
            .map(|(shapes, _)| shapes.iter().any(|s| s.name_text(list) == name))
            .unwrap_or(false),
        "using" => {
            let Some(n) = list.next(decl_tok) else {
                return false;
            };
            list.text(n) == name && list.nth_next(decl_tok, 2).map(|e| list.text(e)) == Some("=")
        }
        _ => false,
    }
}

/// Sequencing helper for [`substitute_at`]: the first emission overwrites
/// the site token in place, later emissions insert after the cursor.
/// Literal parens are linked as they close.
struct Emitter<'a> {
    list: &'a mut TokenList,
    site: TokenId,
    cursor: TokenId,
    loc: SourceLocation,
    pending_overwrite: bool,
    paren_stack: Vec<TokenId>,
}

impl<'a> Emitter<'a> {
    fn new(list: &'a mut TokenList, site: TokenId) -> Self {
        let loc = list[site].loc;
        Emitter {
            list,
            site,
            cursor: site,
            loc,
            pending_overwrite: true,
            paren_stack: Vec::new(),
        }
    }

    fn lit(&mut self, text: &str, kind: TokenKind) {
        if self.pending_overwrite {
            let tok = &mut self.list[self.site];
            tok.text = text.to_string();
            tok.kind = kind;
            tok.flags |= TokenFlags::ALIAS_EXPANDED;
            tok.link = None;
            self.pending_overwrite = false;
        } else {
            let mut tok = Token::new(text, kind, self.loc);
            tok.flags |= TokenFlags::ALIAS_EXPANDED;
            self.cursor = self.list.insert_after(self.cursor, tok);
        }
    }

    fn open(&mut self) {
        self.lit("(", TokenKind::Op);
        self.paren_stack.push(self.cursor);
    }

    fn close(&mut self) {
        self.lit(")", TokenKind::Op);
        if let Some(open) = self.paren_stack.pop() {
            let close = self.cursor;
            self.list.link_pair(open, close);
        }
    }

    fn range(&mut self, first: TokenId, last: TokenId) -> Result<(), SubstitutionFailed> {
        if self.pending_overwrite {
            let src = self
                .list
                .get(first)
                .cloned()
                .ok_or_else(|| self.failure())?;
            let tok = &mut self.list[self.site];
            tok.text = src.text;
            tok.kind = src.kind;
            tok.flags |= TokenFlags::ALIAS_EXPANDED;
            tok.link = None;
            self.pending_overwrite = false;
            if first != last {
                let second = self.list.next(first).ok_or_else(|| self.failure())?;
                let (cfirst, clast) = self
                    .list
                    .copy_range(second, last, self.cursor)
                    .ok_or_else(|| self.failure())?;
                mark_range(self.list, cfirst, clast);
                self.cursor = clast;
            }
        } else {
            let (cfirst, clast) = self
                .list
                .copy_range(first, last, self.cursor)
                .ok_or_else(|| self.failure())?;
            mark_range(self.list, cfirst, clast);
            self.cursor = clast;
        }
        Ok(())
    }

    /// Advance the cursor over the declared name that follows the splice.
    fn skip_over_name(&mut self) -> Result<(), SubstitutionFailed> {
        if self.pending_overwrite {
            return Err(self.failure());
        }
        self.cursor = self.list.next(self.cursor).ok_or_else(|| self.failure())?;
        Ok(())
    }

    fn finish(self) -> Result<TokenId, SubstitutionFailed> {
        if self.pending_overwrite || !self.paren_stack.is_empty() {
            return Err(SubstitutionFailed {
                name: String::new(),
                location: self.loc,
            });
        }
        Ok(self.cursor)
    }

    fn failure(&self) -> SubstitutionFailed {
        SubstitutionFailed {
            name: self.list.text(self.site).to_string(),
            location: self.loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dialect;
    use crate::normalize::links;
    use crate::tokens::Lexer;

    fn prepare(source: &str) -> TokenList {
        let mut list = Lexer::new(source, Dialect::Cpp)
            .tokenize("test.cpp")
            .unwrap();
        links::link_brackets(&mut list).unwrap();
        links::link_angle_brackets(&mut list);
        list
    }

    fn typedef_shapes(list: &TokenList) -> Vec<AliasShape> {
        let td = list.iter().find(|&id| list.text(id) == "typedef").unwrap();
        parse_typedef(list, td).expect("typedef should parse").0
    }

    #[test]
    fn test_plain_pointer_shape() {
        let list = prepare("typedef int* IntPtr;");
        let shapes = typedef_shapes(&list);
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].kind, DeclaratorKind::Plain);
        assert_eq!(shapes[0].pointers, vec!["*"]);
        assert_eq!(shapes[0].name_text(&list), "IntPtr");
        assert_eq!(
            list.stringify_range(shapes[0].base.0, shapes[0].base.1),
            "int"
        );
    }

    #[test]
    fn test_function_pointer_shape() {
        let list = prepare("typedef void (*Fn)(int, char);");
        let shapes = typedef_shapes(&list);
        assert_eq!(shapes[0].kind, DeclaratorKind::FunctionPointer);
        assert_eq!(shapes[0].name_text(&list), "Fn");
        let (afirst, alast) = shapes[0].args.unwrap();
        assert_eq!(list.stringify_range(afirst, alast), "( int , char )");
    }

    #[test]
    fn test_array_shape() {
        let list = prepare("typedef int Buffer[16];");
        let shapes = typedef_shapes(&list);
        assert_eq!(shapes[0].kind, DeclaratorKind::Plain);
        let (afirst, alast) = shapes[0].array.unwrap();
        assert_eq!(list.stringify_range(afirst, alast), "[ 16 ]");
    }

    #[test]
    fn test_pointer_to_array_shape() {
        let list = prepare("typedef int (*Row)[4];");
        let shapes = typedef_shapes(&list);
        assert_eq!(shapes[0].kind, DeclaratorKind::PointerToArray);
    }

    #[test]
    fn test_pointer_to_member_shape() {
        let list = prepare("typedef int (C::*Getter)(float);");
        let shapes = typedef_shapes(&list);
        assert_eq!(shapes[0].kind, DeclaratorKind::PointerToMember);
        assert_eq!(shapes[0].member_path, vec!["C"]);
    }

    #[test]
    fn test_function_returning_function_pointer_shape() {
        let list = prepare("typedef void (*Factory(int))(char);");
        let shapes = typedef_shapes(&list);
        assert_eq!(
            shapes[0].kind,
            DeclaratorKind::FunctionReturningFunctionPointer
        );
        assert!(shapes[0].args.is_some());
        assert!(shapes[0].ret_args.is_some());
    }

    #[test]
    fn test_chained_declarators_parse() {
        let list = prepare("typedef int A, *B;");
        let shapes = typedef_shapes(&list);
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[0].name_text(&list), "A");
        assert!(shapes[0].pointers.is_empty());
        assert_eq!(shapes[1].name_text(&list), "B");
        assert_eq!(shapes[1].pointers, vec!["*"]);
    }

    #[test]
    fn test_template_base_shape() {
        let list = prepare("typedef std::vector<int> IntVec;");
        let shapes = typedef_shapes(&list);
        assert_eq!(shapes[0].kind, DeclaratorKind::Plain);
        assert_eq!(
            list.stringify_range(shapes[0].base.0, shapes[0].base.1),
            "std :: vector < int >"
        );
    }

    #[test]
    fn test_decltype_is_opaque() {
        let list = prepare("typedef decltype(0) IntLike;");
        let shapes = typedef_shapes(&list);
        assert_eq!(shapes[0].kind, DeclaratorKind::Opaque);
    }

    #[test]
    fn test_unrecognized_shape_is_none() {
        let list = prepare("typedef int;");
        let td = list.iter().find(|&id| list.text(id) == "typedef").unwrap();
        assert!(parse_typedef(&list, td).is_none());
    }

    #[test]
    fn test_using_function_pointer_shape() {
        let list = prepare("using Fn = void (*)(int);");
        let name = list.iter().find(|&id| list.text(id) == "Fn").unwrap();
        let eq = list.next(name).unwrap();
        let first = list.next(eq).unwrap();
        let (shape, _) = parse_using(&list, name, first).unwrap();
        assert_eq!(shape.kind, DeclaratorKind::FunctionPointer);
    }

    #[test]
    fn test_use_position_rules() {
        let list = prepare("void f() { T x; a.T; b::T; T * p; obj = T; }");
        let sites: Vec<TokenId> = list.iter().filter(|&id| list.text(id) == "T").collect();
        assert!(is_type_use_position(&list, sites[0])); // T x
        assert!(!is_type_use_position(&list, sites[1])); // a.T
        assert!(!is_type_use_position(&list, sites[2])); // b::T
        assert!(is_type_use_position(&list, sites[3])); // T * p
        assert!(!is_type_use_position(&list, sites[4])); // obj = T;
    }
}

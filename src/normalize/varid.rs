//! Variable-identity assignment
//!
//! Gives every resolved variable reference a small positive integer that is
//! unique within the variable's live scope and shared by exactly the tokens
//! denoting that variable.  Two forward passes:
//!
//! 1. The structural pass walks the stream with a scope stack mirroring
//!    block/function nesting and a name→identity map with checkpointed
//!    shadow restoration.  Declaration sites are recognized by a local
//!    pattern heuristic (type-ish tokens, then a name, then a closing
//!    delimiter), bare names are stamped from the visible map, and
//!    `.`/`->` member accesses get their own identity space keyed by the
//!    base variable's identity.
//! 2. The class-member pass builds per-record member tables (inherited
//!    members included, resolved through the scope tree's base-type sets)
//!    and stamps unqualified member references inside member-function
//!    bodies that the first pass could not see — most importantly method
//!    bodies defined outside their class.  Locals always shadow members:
//!    a token that already carries an identity is never restamped.
//!
//! An unrecognized declaration shape is not an error: those tokens simply
//!  keep identity 0 and downstream consumers tolerate that.  A scope-stack
//! underflow, in contrast, is fatal.

use super::scopes::{ScopeId, ScopeKind, ScopeTree};
use super::NormalizeError;
use crate::config::Settings;
use crate::report::{Diagnostic, Reporter};
use crate::tokens::keywords::{DECL_EXCLUSIONS, DECL_QUALIFIERS, TYPE_KEYWORDS};
use crate::tokens::{TokenId, TokenKind, TokenList};
use rustc_hash::FxHashMap;

/// Name→identity map with an explicit stack of shadowed entries.  Entering
/// a scope records prior bindings; leaving restores them, so a shadowed
/// outer variable becomes visible again when the inner scope closes.
struct VariableMap {
    ids: FxHashMap<String, u32>,
    checkpoints: Vec<Vec<(String, Option<u32>)>>,
    next_id: u32,
}

impl VariableMap {
    fn new() -> Self {
        VariableMap {
            ids: FxHashMap::default(),
            checkpoints: Vec::new(),
            next_id: 1,
        }
    }

    fn enter_scope(&mut self) {
        self.checkpoints.push(Vec::new());
    }

    fn leave_scope(&mut self) {
        let Some(entries) = self.checkpoints.pop() else {
            return;
        };
        for (name, prior) in entries.into_iter().rev() {
            match prior {
                Some(id) => {
                    self.ids.insert(name, id);
                }
                None => {
                    self.ids.remove(&name);
                }
            }
        }
    }

    fn declare(&mut self, name: &str) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        let prior = self.ids.insert(name.to_string(), id);
        if let Some(checkpoint) = self.checkpoints.last_mut() {
            checkpoint.push((name.to_string(), prior));
        }
        id
    }

    fn fresh(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn lookup(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy)]
struct BlockState {
    executable: bool,
    initializer: bool,
}

#[derive(Debug, Clone, Copy)]
struct ControlScope {
    /// The `)` closing the control parentheses.
    close: TokenId,
    /// Body brace once seen, so the scope pops with it.
    body: Option<TokenId>,
    /// Set after `close` when no body brace followed: pop at the next `;`.
    await_semi: bool,
}

/// Assign identities over the whole stream.  Returns the highest identity
/// handed out.
pub fn assign_varids(
    list: &mut TokenList,
    settings: &Settings,
    reporter: &mut dyn Reporter,
) -> Result<u32, NormalizeError> {
    let mut map = VariableMap::new();
    let mut member_ids: FxHashMap<(u32, String), u32> = FxHashMap::default();

    structural_pass(list, &mut map, &mut member_ids)?;

    let mut next_id = map.next_id;
    if settings.is_cpp() {
        class_member_pass(list, &mut next_id, reporter)?;
    }
    Ok(next_id - 1)
}

fn structural_pass(
    list: &mut TokenList,
    map: &mut VariableMap,
    member_ids: &mut FxHashMap<(u32, String), u32>,
) -> Result<(), NormalizeError> {
    // Sentinel for the global scope; a `}` that would pop it is fatal.
    let mut blocks: Vec<BlockState> = vec![BlockState {
        executable: false,
        initializer: false,
    }];
    let mut controls: Vec<ControlScope> = Vec::new();

    let mut cur = list.front();
    while let Some(id) = cur {
        let next_default = list.next(id);
        let text = list.text(id).to_string();
        let kind = list[id].kind;

        match text.as_str() {
            "{" => {
                let outer = *blocks.last().unwrap_or(&BlockState {
                    executable: false,
                    initializer: false,
                });
                let initializer = is_initializer_brace(list, id, outer.initializer);
                let mut executable = outer.executable && !initializer;

                if !initializer {
                    if let Some(params_open) = starts_function_body(list, id) {
                        executable = true;
                        map.enter_scope();
                        declare_parameters(list, params_open, map);
                    } else {
                        map.enter_scope();
                    }
                } else {
                    map.enter_scope();
                }

                if let Some(ctl) = controls.last_mut() {
                    if ctl.body.is_none() && !ctl.await_semi {
                        // First brace after the control parens is its body
                        if list.prev(id).map(|p| list.text(p) == ")").unwrap_or(false) {
                            ctl.body = Some(id);
                        }
                    }
                }

                blocks.push(BlockState {
                    executable,
                    initializer,
                });
            }
            "}" => {
                if blocks.len() <= 1 {
                    return Err(NormalizeError::InternalError {
                        message: "no open scope at '}'".to_string(),
                        location: list[id].loc,
                    });
                }
                blocks.pop();
                map.leave_scope();

                if let Some(ctl) = controls.last() {
                    if ctl.body.is_some() && list[id].link == ctl.body {
                        controls.pop();
                        map.leave_scope();
                    }
                }
            }
            "for" if kind == TokenKind::Keyword => {
                if let Some(open) = list.next(id) {
                    if list.text(open) == "(" {
                        if let Some(close) = list[open].link {
                            map.enter_scope();
                            controls.push(ControlScope {
                                close,
                                body: None,
                                await_semi: false,
                            });
                        }
                    }
                }
            }
            ")" => {
                if let Some(ctl) = controls.last_mut() {
                    if ctl.close == id {
                        let brace_follows =
                            list.next(id).map(|n| list.text(n) == "{").unwrap_or(false);
                        if !brace_follows {
                            ctl.await_semi = true;
                        }
                    }
                }
            }
            ";" => {
                if let Some(ctl) = controls.last() {
                    if ctl.await_semi {
                        controls.pop();
                        map.leave_scope();
                    }
                }
            }
            "." | "->" => {
                stamp_member_access(list, id, map, member_ids);
            }
            _ => {}
        }

        let state = *blocks.last().unwrap_or(&BlockState {
            executable: false,
            initializer: false,
        });

        if !state.initializer && at_declaration_start(list, id) {
            if let Some(decl) = parse_declaration(list, id) {
                for name_tok in decl.names {
                    let varid = map.declare(list.text(name_tok));
                    list[name_tok].varid = varid;
                }
                cur = next_default;
                continue;
            }
        }

        if kind == TokenKind::Name && list[id].varid == 0 {
            stamp_bare_name(list, id, map);
        }

        cur = next_default;
    }
    Ok(())
}

/// Stamp a bare-name occurrence from the visible map, excluding qualified
/// accesses, goto targets, and label definitions.
fn stamp_bare_name(list: &mut TokenList, id: TokenId, map: &VariableMap) {
    if let Some(prev) = list.prev(id) {
        match list.text(prev) {
            "::" | "." | "->" | "goto" => return,
            _ => {}
        }
        // `; label :` definitions are not variable uses
        if matches!(list.text(prev), ";" | "{" | "}")
            && list.next(id).map(|n| list.text(n)) == Some(":")
        {
            return;
        }
    }
    if list.next(id).map(|n| list.text(n)) == Some("::") {
        return;
    }
    if let Some(varid) = map.lookup(list.text(id)) {
        list[id].varid = varid;
    }
}

/// `base . member` / `base -> member`: the member gets an identity keyed by
/// the base variable's identity, so `a.x` and `b.x` differ while repeated
/// `a.x` occurrences share one.
fn stamp_member_access(
    list: &mut TokenList,
    access: TokenId,
    map: &mut VariableMap,
    member_ids: &mut FxHashMap<(u32, String), u32>,
) {
    let Some(base) = list.prev(access) else { return };
    let Some(member) = list.next(access) else { return };

    if list[base].kind != TokenKind::Name || list[member].kind != TokenKind::Name {
        return;
    }
    let base_id = list[base].varid;
    if base_id == 0 || list[member].varid != 0 {
        return;
    }

    let key = (base_id, list.text(member).to_string());
    let member_id = *member_ids.entry(key).or_insert_with(|| map.fresh());
    list[member].varid = member_id;
}

/// Candidate declarations are only attempted at statement-start positions
/// (and inside `for (` heads), which keeps the heuristic from firing in the
/// middle of expressions.
fn at_declaration_start(list: &TokenList, id: TokenId) -> bool {
    let tok = &list[id];
    let plausible_first = match tok.kind {
        TokenKind::Name => true,
        TokenKind::Keyword => {
            TYPE_KEYWORDS.contains(tok.text.as_str())
                || DECL_QUALIFIERS.contains(tok.text.as_str())
                || matches!(tok.text.as_str(), "struct" | "union" | "class" | "enum")
        }
        _ => false,
    };
    if !plausible_first || DECL_EXCLUSIONS.contains(tok.text.as_str()) {
        return false;
    }

    match list.prev(id) {
        None => true,
        Some(prev) => match list.text(prev) {
            ";" | "{" | "}" | ":" => true,
            "(" => list
                .prev(prev)
                .map(|p| list.text(p) == "for")
                .unwrap_or(false),
            _ => false,
        },
    }
}

struct Declaration {
    names: Vec<TokenId>,
}

/// The declaration-site heuristic: a type-ish token sequence, then a name,
/// then one of `; , ) = [ {`.  Returns `None` for everything else —
/// including function declarations, whose name is followed by `(`.
fn parse_declaration(list: &TokenList, start: TokenId) -> Option<Declaration> {
    let mut cur = start;

    // Storage/cv qualifiers
    while DECL_QUALIFIERS.contains(list.text(cur)) {
        cur = list.next(cur)?;
    }

    // The type itself
    let mut saw_type = false;
    if matches!(list.text(cur), "struct" | "union" | "class" | "enum") {
        cur = list.next(cur)?;
        if list[cur].kind != TokenKind::Name {
            return None;
        }
        cur = skip_qualified_name(list, cur)?;
        saw_type = true;
    } else if TYPE_KEYWORDS.contains(list.text(cur)) {
        while TYPE_KEYWORDS.contains(list.text(cur)) {
            cur = list.next(cur)?;
        }
        saw_type = true;
    } else if list[cur].kind == TokenKind::Name {
        cur = skip_qualified_name(list, cur)?;
        saw_type = true;
    }
    if !saw_type {
        return None;
    }

    let mut names = Vec::new();
    loop {
        // Declarator-level pointers/references
        while matches!(list.text(cur), "*" | "&" | "&&" | "const" | "volatile") {
            cur = list.next(cur)?;
        }

        let name_tok = cur;
        if list[name_tok].kind != TokenKind::Name
            || DECL_EXCLUSIONS.contains(list.text(name_tok))
        {
            return None;
        }
        let mut after = list.next(name_tok)?;

        // Array dimensions
        while list.text(after) == "[" {
            after = list.next(list[after].link?)?;
        }

        match list.text(after) {
            ";" | ")" => {
                names.push(name_tok);
                return Some(Declaration { names });
            }
            "=" | "{" => {
                names.push(name_tok);
                let stop = skip_initializer(list, after)?;
                match list.text(stop) {
                    ";" | ")" => return Some(Declaration { names }),
                    "," => cur = list.next(stop)?,
                    _ => return None,
                }
            }
            "," => {
                names.push(name_tok);
                cur = list.next(after)?;
            }
            _ => return None,
        }
    }
}

/// `A :: B < ... > :: C` — returns the token after the chain; an unlinked
/// `<` right after a name ends the chain before it.
fn skip_qualified_name(list: &TokenList, first: TokenId) -> Option<TokenId> {
    let mut cur = list.next(first)?;
    loop {
        match list.text(cur) {
            "<" => match list[cur].link {
                Some(gt) => cur = list.next(gt)?,
                None => return Some(cur),
            },
            "::" => {
                let part = list.next(cur)?;
                if list[part].kind != TokenKind::Name {
                    return None;
                }
                cur = list.next(part)?;
            }
            _ => return Some(cur),
        }
    }
}

/// Skip from `=` (or a brace initializer) to the `,`, `;`, or `)` that ends
/// this declarator, jumping linked pairs.
fn skip_initializer(list: &TokenList, from: TokenId) -> Option<TokenId> {
    let mut cur = from;
    loop {
        match list.text(cur) {
            ";" | "," | ")" => return Some(cur),
            "(" | "[" | "{" => cur = list.next(list.get(cur)?.link?)?,
            "" => return None,
            _ => cur = list.next(cur)?,
        }
    }
}

/// Initializer braces never hold declarations and never shift the
/// executable flag.
fn is_initializer_brace(list: &TokenList, brace: TokenId, outer_is_initializer: bool) -> bool {
    match list.prev(brace) {
        Some(prev) => match list.text(prev) {
            "=" | "," | "(" | "[" | "return" => true,
            "{" => outer_is_initializer,
            _ => false,
        },
        None => false,
    }
}

/// A `{` opens a function body when (skipping trailing qualifiers) it
/// follows a linked `)` whose matching `(` is preceded by a function name
/// or a lambda introducer.  Returns that `(`.
fn starts_function_body(list: &TokenList, brace: TokenId) -> Option<TokenId> {
    let mut t = list.prev(brace)?;
    loop {
        match list.text(t) {
            "const" | "volatile" | "noexcept" | "override" | "final" | "&" | "&&" => {
                t = list.prev(t)?;
            }
            ")" => {
                let open = list[t].link?;
                if let Some(before) = list.prev(open) {
                    let before_tok = &list[before];
                    if before_tok.text == "noexcept" || before_tok.text == "throw" {
                        t = list.prev(before)?;
                        continue;
                    }
                    let is_head = before_tok.kind == TokenKind::Name
                        || before_tok.text == "]"
                        || before_tok.text == "operator"
                        || (before_tok.kind == TokenKind::Op
                            && list
                                .prev(before)
                                .map(|p| list.text(p) == "operator")
                                .unwrap_or(false));
                    return if is_head { Some(open) } else { None };
                }
                return None;
            }
            _ => return None,
        }
    }
}

/// Give each parameter of a function body a fresh identity.  Only names at
/// the parameter list's own nesting level are considered; a name buried in
/// a function-pointer declarator is left without identity.
fn declare_parameters(list: &mut TokenList, open: TokenId, map: &mut VariableMap) {
    let Some(close) = list[open].link else { return };

    let mut depth = 0usize;
    let mut segment_done = false;
    let mut cur = list.next(open);
    while let Some(id) = cur {
        if id == close {
            break;
        }
        match list.text(id) {
            "(" | "[" => depth += 1,
            ")" | "]" => depth = depth.saturating_sub(1),
            "," if depth == 0 => segment_done = false,
            _ => {
                if depth == 0 && !segment_done && list[id].kind == TokenKind::Name {
                    let next_text = list.next(id).map(|n| list.text(n));
                    if matches!(next_text, Some(",") | Some(")") | Some("=") | Some("[")) {
                        let varid = map.declare(list.text(id));
                        list[id].varid = varid;
                        segment_done = true;
                    }
                }
            }
        }
        cur = list.next(id);
    }
}

/// Second pass: member references in class context.
fn class_member_pass(
    list: &mut TokenList,
    next_id: &mut u32,
    reporter: &mut dyn Reporter,
) -> Result<(), NormalizeError> {
    let mut tree = ScopeTree::new();
    for id in list.iter().collect::<Vec<_>>() {
        if let Err(e) = tree.advance(list, id) {
            return Err(NormalizeError::InternalError {
                message: e.message,
                location: e.location,
            });
        }
    }

    // Member tables from the record bodies, member functions included
    let mut tables: FxHashMap<ScopeId, FxHashMap<String, u32>> = FxHashMap::default();
    for scope_id in tree.all() {
        if tree.scope(scope_id).kind == ScopeKind::Record {
            let table = collect_member_table(list, &tree, scope_id, next_id);
            tables.insert(scope_id, table);
        }
    }

    // Inherited members through the base-type sets
    let record_ids: Vec<ScopeId> = tree
        .all()
        .filter(|&id| tree.scope(id).kind == ScopeKind::Record)
        .collect();
    let mut effective: FxHashMap<ScopeId, FxHashMap<String, u32>> = FxHashMap::default();
    for &record in &record_ids {
        let mut table = FxHashMap::default();
        merge_with_bases(&tree, &tables, record, &mut table, 0);
        effective.insert(record, table);
    }

    // Stamp record bodies (inline methods, default initializers)
    for &record in &record_ids {
        let scope = tree.scope(record);
        if let (Some(first), Some(last)) = (scope.body_start, scope.body_end) {
            if let Some(table) = effective.get(&record) {
                stamp_member_range(list, first, last, table);
            }
        }
    }

    // Stamp out-of-line member function bodies
    for scope_id in tree.all() {
        let scope = tree.scope(scope_id);
        if scope.kind != ScopeKind::MemberFunction {
            continue;
        }
        let parent = scope.parent.unwrap_or(0);
        let Some(record) = tree
            .resolve_path(&scope.name, parent)
            .filter(|&r| tree.scope(r).kind == ScopeKind::Record)
        else {
            reporter.report(Diagnostic::debug(
                "varid",
                format!("class '{}' not found, member identities skipped", scope.name),
                scope.body_start.and_then(|t| list.get(t)).map(|t| t.loc),
            ));
            continue;
        };
        if let (Some(first), Some(last)) = (scope.body_start, scope.body_end) {
            if let Some(table) = effective.get(&record) {
                stamp_member_range(list, first, last, table);
            }
        }
    }
    Ok(())
}

/// Member names declared directly inside a record body: variables already
/// carry their pass-1 identity; member functions are assigned one here.
fn collect_member_table(
    list: &mut TokenList,
    tree: &ScopeTree,
    record: ScopeId,
    next_id: &mut u32,
) -> FxHashMap<String, u32> {
    let mut table = FxHashMap::default();
    let scope = tree.scope(record);
    let (Some(first), Some(last)) = (scope.body_start, scope.body_end) else {
        return table;
    };

    let mut depth = 0usize;
    let mut cur = Some(first);
    while let Some(id) = cur {
        if id == last {
            break;
        }
        match list.text(id) {
            "{" => depth += 1,
            "}" => depth = depth.saturating_sub(1),
            _ if depth == 1 && list[id].kind == TokenKind::Name => {
                if list[id].varid != 0 {
                    // Pass 1 stamped this member variable declaration
                    table.insert(list.text(id).to_string(), list[id].varid);
                } else if is_member_function_name(list, id) {
                    let varid = *next_id;
                    *next_id += 1;
                    list[id].varid = varid;
                    table.insert(list.text(id).to_string(), varid);
                }
            }
            _ => {}
        }
        cur = list.next(id);
    }
    table
}

/// `type name (` at member level, not a call: the previous token must be
/// type-ish, not an operator or `.`/`->`.
fn is_member_function_name(list: &TokenList, id: TokenId) -> bool {
    if list.next(id).map(|n| list.text(n)) != Some("(") {
        return false;
    }
    let Some(prev) = list.prev(id) else {
        return false;
    };
    let prev_tok = &list[prev];
    prev_tok.kind == TokenKind::Name
        || (prev_tok.kind == TokenKind::Keyword
            && (TYPE_KEYWORDS.contains(prev_tok.text.as_str())
                || DECL_QUALIFIERS.contains(prev_tok.text.as_str())))
        || matches!(prev_tok.text.as_str(), "*" | "&" | ">")
}

fn merge_with_bases(
    tree: &ScopeTree,
    tables: &FxHashMap<ScopeId, FxHashMap<String, u32>>,
    record: ScopeId,
    out: &mut FxHashMap<String, u32>,
    depth: usize,
) {
    if depth > 8 {
        return;
    }
    // Derived members win over base members of the same name
    if let Some(own) = tables.get(&record) {
        for (name, id) in own {
            out.entry(name.clone()).or_insert(*id);
        }
    }
    let scope = tree.scope(record);
    let parent = scope.parent.unwrap_or(0);
    for base in &scope.base_types {
        if let Some(base_scope) = tree.resolve_record(base, parent) {
            if tree.scope(base_scope).kind == ScopeKind::Record && base_scope != record {
                merge_with_bases(tree, tables, base_scope, out, depth + 1);
            }
        }
    }
}

/// Stamp unqualified member references in `[first, last]`.  Tokens that
/// already carry an identity (locals, parameters) are never touched.
fn stamp_member_range(
    list: &mut TokenList,
    first: TokenId,
    last: TokenId,
    table: &FxHashMap<String, u32>,
) {
    let mut cur = Some(first);
    while let Some(id) = cur {
        if list[id].kind == TokenKind::Name && list[id].varid == 0 {
            if let Some(&member_id) = table.get(list.text(id)) {
                let prev_text = list.prev(id).map(|p| list.text(p).to_string());
                let qualified_access = match prev_text.as_deref() {
                    Some("::") | Some(".") => true,
                    Some("->") => {
                        // `this -> member` is an unqualified member use
                        list.nth_prev(id, 2)
                            .map(|t| list.text(t) != "this")
                            .unwrap_or(true)
                    }
                    _ => false,
                };
                let scope_qualifier = list.next(id).map(|n| list.text(n)) == Some("::");
                if !qualified_access && !scope_qualifier {
                    list[id].varid = member_id;
                }
            }
        }
        if id == last {
            break;
        }
        cur = list.next(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dialect;
    use crate::normalize::links;
    use crate::report::CollectedReports;
    use crate::tokens::Lexer;

    fn assign(source: &str) -> TokenList {
        let mut list = Lexer::new(source, Dialect::Cpp)
            .tokenize("test.cpp")
            .unwrap();
        links::link_brackets(&mut list).unwrap();
        links::link_angle_brackets(&mut list);
        let mut reports = CollectedReports::new();
        assign_varids(&mut list, &Settings::cpp(), &mut reports).unwrap();
        list
    }

    fn varids_of(list: &TokenList, text: &str) -> Vec<u32> {
        list.iter()
            .filter(|&id| list.text(id) == text)
            .map(|id| list[id].varid)
            .collect()
    }

    #[test]
    fn test_simple_declaration_and_use() {
        let list = assign("void f() { int x; x = 1; }");
        let ids = varids_of(&list, "x");
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], 0);
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn test_shadowing_gets_distinct_ids_and_restores() {
        let list = assign("void f() { int x; { int x; x = 1; } x = 2; }");
        let ids = varids_of(&list, "x");
        assert_eq!(ids.len(), 4);
        let outer = ids[0];
        let inner = ids[1];
        assert_ne!(outer, 0);
        assert_ne!(inner, 0);
        assert_ne!(outer, inner);
        assert_eq!(ids[2], inner, "use inside the block binds to the inner x");
        assert_eq!(ids[3], outer, "after the block the outer x resumes");
    }

    #[test]
    fn test_parameters_get_ids() {
        let list = assign("int add(int a, int b) { return a + b; }");
        let a = varids_of(&list, "a");
        let b = varids_of(&list, "b");
        assert_eq!(a.len(), 2);
        assert_eq!(a[0], a[1]);
        assert_ne!(a[0], 0);
        assert_ne!(a[0], b[0]);
    }

    #[test]
    fn test_member_access_identity_space() {
        let list = assign("void f() { S a; S b; a.x = 1; b.x = 2; a.x = 3; }");
        let xs = varids_of(&list, "x");
        assert_eq!(xs.len(), 3);
        assert_ne!(xs[0], 0);
        assert_ne!(xs[1], 0);
        assert_ne!(xs[0], xs[1], "a.x and b.x are different members");
        assert_eq!(xs[0], xs[2], "repeated a.x shares one identity");
    }

    #[test]
    fn test_chained_member_access() {
        let list = assign("void f() { S a; a.b.c = 1; a.b.c = 2; }");
        let bs = varids_of(&list, "b");
        let cs = varids_of(&list, "c");
        assert!(bs.iter().all(|&v| v != 0));
        assert_eq!(bs[0], bs[1]);
        assert!(cs.iter().all(|&v| v != 0));
        assert_eq!(cs[0], cs[1]);
    }

    #[test]
    fn test_for_loop_scope() {
        let list = assign("void f() { for (int i = 0; i < 3; i = i + 1) { int y = i; } }");
        let is = varids_of(&list, "i");
        assert_eq!(is.len(), 5);
        assert!(is.iter().all(|&v| v == is[0] && v != 0));
    }

    #[test]
    fn test_for_loop_variable_dies_with_loop() {
        let list = assign("void f() { for (int i = 0; i < 3; i = i + 1) {} i = 9; }");
        let is = varids_of(&list, "i");
        // The trailing `i = 9` refers to nothing visible
        assert_eq!(*is.last().unwrap(), 0);
    }

    #[test]
    fn test_unrecognized_declaration_skipped() {
        let list = assign("void f() { auto [a, b] = g(); a = 1; }");
        // Structured bindings are not recognized; nothing is stamped and
        // nothing crashes
        let as_ = varids_of(&list, "a");
        assert!(as_.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_members_in_class_body() {
        let list = assign("struct S { int m; int get() { return m; } };");
        let ms = varids_of(&list, "m");
        assert_eq!(ms.len(), 2);
        assert_ne!(ms[0], 0);
        assert_eq!(ms[0], ms[1]);
    }

    #[test]
    fn test_out_of_line_member_function() {
        let list = assign("struct S { int m; int get(); }; int S::get() { return m; }");
        let ms = varids_of(&list, "m");
        assert_eq!(ms.len(), 2);
        assert_ne!(ms[0], 0);
        assert_eq!(ms[0], ms[1]);
    }

    #[test]
    fn test_local_shadows_member() {
        let list = assign("struct S { int m; void f(); }; void S::f() { int m; m = 1; }");
        let ms = varids_of(&list, "m");
        assert_eq!(ms.len(), 3);
        let member = ms[0];
        let local = ms[1];
        assert_ne!(member, 0);
        assert_ne!(local, 0);
        assert_ne!(member, local);
        assert_eq!(ms[2], local, "the use binds to the local, not the member");
    }

    #[test]
    fn test_inherited_member_resolved() {
        let list = assign(
            "struct B { int m; }; struct D : B { void f(); }; void D::f() { m = 1; }",
        );
        let ms = varids_of(&list, "m");
        assert_eq!(ms.len(), 2);
        assert_ne!(ms[0], 0);
        assert_eq!(ms[0], ms[1]);
    }

    #[test]
    fn test_this_member_access() {
        let list = assign("struct S { int m; void f(); }; void S::f() { this->m = 1; }");
        let ms = varids_of(&list, "m");
        assert_eq!(ms.len(), 2);
        assert_eq!(ms[0], ms[1]);
        assert_ne!(ms[0], 0);
    }

    #[test]
    fn test_member_function_references_share_id() {
        let list = assign(
            "struct S { int g(); int f(); }; int S::f() { return g(); }",
        );
        let gs = varids_of(&list, "g");
        assert_eq!(gs.len(), 2);
        assert_ne!(gs[0], 0);
        assert_eq!(gs[0], gs[1]);
    }

    #[test]
    fn test_globals_visible_in_functions() {
        let list = assign("int g; void f() { g = 1; }");
        let gs = varids_of(&list, "g");
        assert_eq!(gs.len(), 2);
        assert_ne!(gs[0], 0);
        assert_eq!(gs[0], gs[1]);
    }

    #[test]
    fn test_keywords_and_qualified_names_untouched() {
        let list = assign("void f() { int x; N::x = 1; s.x = 2; }");
        let xs = varids_of(&list, "x");
        assert_eq!(xs.len(), 3);
        assert_ne!(xs[0], 0);
        assert_eq!(xs[1], 0, "qualified x is a different entity");
        assert_eq!(xs[2], 0, "member of unknown base stays unassigned");
    }
}

//! Lexical scope tracking
//!
//! [`ScopeTree`] classifies tokens into a tree of lexical scopes while a
//! caller walks forward through the stream, one [`ScopeTree::advance`] call
//! per token.  The cursor follows scope-opening and scope-closing braces;
//! the tree records qualified names, directly declared record types, base
//! types, and `using namespace` visibility.
//!
//! Both resolvers build their own tree from scratch: alias inlining edits
//! the stream, which invalidates any tree built before it, so sharing one
//! tree across phases is never attempted.
//!
//! A closing brace that cannot be matched against any open ancestor is a
//! recoverable, diagnostic-grade condition — the caller decides whether to
//! abandon its current pass — unlike the fatal mismatches of the bracket
//! linker, which run first and guarantee structural pairing.

use crate::tokens::keywords::FUNCTION_QUALIFIERS;
use crate::tokens::{SourceLocation, TokenId, TokenKind, TokenList};
use rustc_hash::FxHashSet;
use std::fmt;

/// Stable index of a scope inside its [`ScopeTree`].
pub type ScopeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Record,
    /// Body of a member function defined with a qualified name
    /// (`void A::f() { ... }`); its qualified name is the class path so
    /// member lookup works without re-qualification.
    MemberFunction,
    Other,
}

/// One node of the scope tree.
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: String,
    /// Ancestor names joined with `::`; empty for the global scope.
    pub full_name: String,
    pub body_start: Option<TokenId>,
    pub body_end: Option<TokenId>,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Record-type names declared directly inside this scope.
    pub record_types: FxHashSet<String>,
    /// Base-type simple names, for inheritance-aware member lookup.
    pub base_types: Vec<String>,
    /// Namespaces made visible here by `using namespace`.
    pub using_namespaces: FxHashSet<String>,
}

/// Recoverable scope-tracking error.
#[derive(Debug, Clone)]
pub struct ScopeError {
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scope error at line {}, column {}: {}",
            self.location.line, self.location.column, self.message
        )
    }
}

impl std::error::Error for ScopeError {}

/// Incrementally built scope tree with a "current scope" cursor.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl ScopeTree {
    pub fn new() -> Self {
        ScopeTree {
            scopes: vec![Scope {
                kind: ScopeKind::Global,
                name: String::new(),
                full_name: String::new(),
                body_start: None,
                body_end: None,
                parent: None,
                children: Vec::new(),
                record_types: FxHashSet::default(),
                base_types: Vec::new(),
                using_namespaces: FxHashSet::default(),
            }],
            current: 0,
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn full_name(&self) -> &str {
        &self.scopes[self.current].full_name
    }

    /// All scopes, for whole-tree consumers (identity pass 2).
    pub fn all(&self) -> impl Iterator<Item = ScopeId> + '_ {
        0..self.scopes.len()
    }

    /// Walk `tok` and update the cursor.  Call once per token, in stream
    /// order, after bracket linking.
    pub fn advance(&mut self, list: &TokenList, tok: TokenId) -> Result<(), ScopeError> {
        let text = list.text(tok);
        match text {
            "{" => {
                self.enter_brace(list, tok);
                Ok(())
            }
            "}" => self.leave_brace(list, tok),
            "using" => {
                if list.next(tok).map(|n| list.text(n)) == Some("namespace") {
                    self.record_using_namespace(list, tok);
                }
                Ok(())
            }
            "class" | "struct" | "union" => {
                // Forward declaration registers the record name
                if let Some(name_tok) = list.next(tok) {
                    if list[name_tok].kind == TokenKind::Name
                        && list.next(name_tok).map(|n| list.text(n)) == Some(";")
                    {
                        let name = list.text(name_tok).to_string();
                        self.scopes[self.current].record_types.insert(name);
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn push_scope(&mut self, kind: ScopeKind, name: String, start: TokenId, end: Option<TokenId>) {
        let parent = self.current;
        let full_name = join_path(&self.scopes[parent].full_name, &name);
        let id = self.scopes.len();
        self.scopes.push(Scope {
            kind,
            name,
            full_name,
            body_start: Some(start),
            body_end: end,
            parent: Some(parent),
            children: Vec::new(),
            record_types: FxHashSet::default(),
            base_types: Vec::new(),
            using_namespaces: FxHashSet::default(),
        });
        self.scopes[parent].children.push(id);
        self.current = id;
    }

    fn enter_brace(&mut self, list: &TokenList, brace: TokenId) {
        let end = list[brace].link;

        match classify_brace(list, brace) {
            BraceHead::Initializer => {
                // Not a scope; the matching `}` will not be tracked either
            }
            BraceHead::Namespace(name) => {
                self.push_scope(ScopeKind::Namespace, name, brace, end);
            }
            BraceHead::Record { name, bases } => {
                if !name.is_empty() {
                    self.scopes[self.current].record_types.insert(name.clone());
                }
                self.push_scope(ScopeKind::Record, name, brace, end);
                self.scopes[self.current].base_types = bases;
            }
            BraceHead::MemberFunction { class_path } => {
                self.push_scope(ScopeKind::MemberFunction, class_path, brace, end);
            }
            BraceHead::Other => {
                self.push_scope(ScopeKind::Other, String::new(), brace, end);
            }
        }
    }

    fn leave_brace(&mut self, list: &TokenList, brace: TokenId) -> Result<(), ScopeError> {
        let open = list[brace].link;

        if self.scopes[self.current].body_start == open && open.is_some() {
            self.current = self.scopes[self.current].parent.unwrap_or(0);
            return Ok(());
        }

        // A `}` with no link cannot be matched against anything: broken
        // nesting from an earlier bad edit.
        if open.is_none() {
            return Err(ScopeError {
                message: "unexpected '}'".to_string(),
                location: list[brace].loc,
            });
        }

        // Untracked brace (initializer)?  Then nothing to pop.
        let tracked = self
            .ancestors(self.current)
            .any(|id| self.scopes[id].body_start == open);
        if !tracked {
            return Ok(());
        }

        // The brace closes an ancestor, not the current scope: the nesting
        // was damaged by an earlier edit.  Re-synchronize and report.
        while self.scopes[self.current].body_start != open {
            match self.scopes[self.current].parent {
                Some(parent) => self.current = parent,
                None => break,
            }
        }
        self.current = self.scopes[self.current].parent.unwrap_or(0);
        Err(ScopeError {
            message: "scope nesting out of sync at '}'".to_string(),
            location: list[brace].loc,
        })
    }

    fn record_using_namespace(&mut self, list: &TokenList, using_tok: TokenId) {
        // using namespace A :: B ;
        let mut path = String::new();
        let mut cur = list.nth_next(using_tok, 2);
        while let Some(id) = cur {
            match list.text(id) {
                ";" => break,
                "::" => path.push_str("::"),
                t if list[id].kind == TokenKind::Name => path.push_str(t),
                _ => return,
            }
            cur = list.next(id);
        }
        if !path.is_empty() {
            self.scopes[self.current].using_namespaces.insert(path);
        }
    }

    fn ancestors(&self, from: ScopeId) -> AncestorIter<'_> {
        AncestorIter {
            tree: self,
            cur: Some(from),
        }
    }

    /// Unqualified record lookup, mirroring C++ name lookup closely enough
    /// for alias resolution: own records, then `using namespace` targets
    /// (transitively through ancestors), then sibling scopes sharing the
    /// same qualified name (a namespace reopened elsewhere), then ancestor
    /// scopes.
    pub fn resolve_record(&self, name: &str, from: ScopeId) -> Option<ScopeId> {
        for scope_id in self.ancestors(from) {
            if self.scopes[scope_id].record_types.contains(name) {
                if let Some(child) = self.record_child(scope_id, name) {
                    return Some(child);
                }
                return Some(scope_id);
            }

            for ns in &self.scopes[scope_id].using_namespaces {
                if let Some(ns_scope) = self.find_by_full_name(ns) {
                    if self.scopes[ns_scope].record_types.contains(name) {
                        return self
                            .record_child(ns_scope, name)
                            .or(Some(ns_scope));
                    }
                }
            }

            let full = &self.scopes[scope_id].full_name;
            for other in 0..self.scopes.len() {
                if other != scope_id
                    && self.scopes[other].full_name == *full
                    && self.scopes[other].record_types.contains(name)
                {
                    return self.record_child(other, name).or(Some(other));
                }
            }
        }
        None
    }

    /// The scope whose qualified name is exactly `path`, preferring the
    /// first declaration in stream order.
    pub fn find_by_full_name(&self, path: &str) -> Option<ScopeId> {
        (0..self.scopes.len()).find(|&id| self.scopes[id].full_name == path)
    }

    /// Resolve a possibly-relative qualified `path` (e.g. a member
    /// function's class path) against `from` and its ancestors.
    pub fn resolve_path(&self, path: &str, from: ScopeId) -> Option<ScopeId> {
        for scope_id in self.ancestors(from) {
            let candidate = join_path(&self.scopes[scope_id].full_name, path);
            if let Some(found) = self.find_by_full_name(&candidate) {
                return Some(found);
            }
        }
        None
    }

    fn record_child(&self, parent: ScopeId, name: &str) -> Option<ScopeId> {
        self.scopes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.scopes[c].kind == ScopeKind::Record && self.scopes[c].name == name)
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        ScopeTree::new()
    }
}

struct AncestorIter<'a> {
    tree: &'a ScopeTree,
    cur: Option<ScopeId>,
}

impl Iterator for AncestorIter<'_> {
    type Item = ScopeId;

    fn next(&mut self) -> Option<ScopeId> {
        let id = self.cur?;
        self.cur = self.tree.scopes[id].parent;
        Some(id)
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}::{name}")
    }
}

enum BraceHead {
    Namespace(String),
    Record { name: String, bases: Vec<String> },
    MemberFunction { class_path: String },
    Other,
    Initializer,
}

/// Inspect the tokens before `brace` and decide what kind of scope (if any)
/// the brace opens.
fn classify_brace(list: &TokenList, brace: TokenId) -> BraceHead {
    let Some(mut t) = list.prev(brace) else {
        return BraceHead::Other;
    };

    match list.text(t) {
        "=" | "," | "(" | "[" | "return" => return BraceHead::Initializer,
        "{" => {
            // Nested directly under another `{`: an initializer element if
            // the outer brace is one, otherwise an ordinary block.  The
            // outer brace was classified first; a plain block is fine here.
            return BraceHead::Other;
        }
        _ => {}
    }

    // Skip trailing function qualifiers between `)` and `{`
    loop {
        let text = list.text(t);
        if FUNCTION_QUALIFIERS.contains(text) && text != "->" && text != "throw" {
            match list.prev(t) {
                Some(p) => t = p,
                None => return BraceHead::Other,
            }
            continue;
        }
        if text == ")" {
            if let Some(open) = list[t].link {
                if let Some(before) = list.prev(open) {
                    let before_text = list.text(before);
                    if before_text == "noexcept" || before_text == "throw" {
                        match list.prev(before) {
                            Some(p) => {
                                t = p;
                                continue;
                            }
                            None => return BraceHead::Other,
                        }
                    }
                }
                return classify_function(list, open);
            }
            return BraceHead::Other;
        }
        break;
    }

    // Trailing return type: `) -> Type {`
    if let Some(arrow_paren) = skip_back_over_type(list, t) {
        if list.text(arrow_paren) == ")" {
            if let Some(open) = list[arrow_paren].link {
                return classify_function(list, open);
            }
        }
    }

    // namespace / record heads: bounded backward scan to the head keyword
    let mut head = t;
    for _ in 0..64 {
        match list.text(head) {
            ";" | "}" | ")" => break,
            "namespace" => {
                let name = match list.next(head) {
                    Some(n) if list[n].kind == TokenKind::Name => {
                        collect_qualified_forward(list, n)
                    }
                    _ => String::new(), // anonymous namespace
                };
                return BraceHead::Namespace(name);
            }
            "class" | "struct" | "union" => {
                return classify_record(list, head, brace);
            }
            "{" => break,
            _ => {}
        }
        match prev_skip_pairs(list, head) {
            Some(p) => head = p,
            None => break,
        }
    }

    BraceHead::Other
}

/// `A :: B` starting at `first`, stopping before anything else.
fn collect_qualified_forward(list: &TokenList, first: TokenId) -> String {
    let mut path = list.text(first).to_string();
    let mut cur = list.next(first);
    while let Some(sep) = cur {
        if list.text(sep) != "::" {
            break;
        }
        let Some(part) = list.next(sep) else { break };
        if list[part].kind != TokenKind::Name {
            break;
        }
        path.push_str("::");
        path.push_str(list.text(part));
        cur = list.next(part);
    }
    path
}

fn classify_record(list: &TokenList, keyword: TokenId, brace: TokenId) -> BraceHead {
    let mut name = String::new();
    let mut bases = Vec::new();

    let mut cur = list.next(keyword);
    if let Some(n) = cur {
        if list[n].kind == TokenKind::Name {
            name = list.text(n).to_string();
            cur = list.next(n);
        }
    }

    // Optional `final`, then optional base-clause up to the brace
    let mut in_bases = false;
    while let Some(id) = cur {
        if id == brace {
            break;
        }
        match list.text(id) {
            ":" => in_bases = true,
            "final" => {}
            "," => {}
            "public" | "protected" | "private" | "virtual" => {}
            "::" => {}
            "<" => {
                // Skip linked template arguments entirely
                if let Some(close) = list[id].link {
                    cur = list.next(close);
                    continue;
                }
            }
            _ if in_bases && list[id].kind == TokenKind::Name => {
                // Keep the last component of a qualified base
                let is_component = list.next(id).map(|n| list.text(n)) == Some("::");
                if !is_component {
                    bases.push(list.text(id).to_string());
                }
            }
            _ => {}
        }
        cur = list.next(id);
    }

    BraceHead::Record { name, bases }
}

/// Classify the head before a parameter list's `(`: qualified member
/// function, or some other parenthesized construct.
fn classify_function(list: &TokenList, open_paren: TokenId) -> BraceHead {
    let Some(mut t) = list.prev(open_paren) else {
        return BraceHead::Other;
    };

    // Control-flow parentheses are ordinary blocks
    if matches!(
        list.text(t),
        "if" | "while" | "for" | "switch" | "catch" | "do"
    ) {
        return BraceHead::Other;
    }

    // `operator <op> (`
    if list[t].kind == TokenKind::Op {
        let mut hops = 0;
        let mut back = t;
        while hops < 2 {
            match list.prev(back) {
                Some(p) if list.text(p) == "operator" => {
                    t = p;
                    break;
                }
                Some(p) if list[p].kind == TokenKind::Op => {
                    back = p;
                    hops += 1;
                }
                _ => return BraceHead::Other,
            }
        }
        if list.text(t) != "operator" {
            return BraceHead::Other;
        }
    } else if list[t].kind != TokenKind::Name && list.text(t) != "operator" {
        return BraceHead::Other;
    }

    // `~ Name (` destructor
    if let Some(p) = list.prev(t) {
        if list.text(p) == "~" {
            t = p;
        }
    }

    // Walk the `A :: B ::` prefix backward
    let mut components = Vec::new();
    let mut cur = list.prev(t);
    while let Some(sep) = cur {
        if list.text(sep) != "::" {
            break;
        }
        let Some(part) = list.prev(sep) else { break };
        if list[part].kind != TokenKind::Name {
            break;
        }
        components.push(list.text(part).to_string());
        cur = list.prev(part);
    }

    if components.is_empty() {
        return BraceHead::Other;
    }

    components.reverse();
    BraceHead::MemberFunction {
        class_path: components.join("::"),
    }
}

/// Step backward one token, jumping over linked `)`/`]`/`>` pairs.
fn prev_skip_pairs(list: &TokenList, id: TokenId) -> Option<TokenId> {
    let prev = list.prev(id)?;
    match list.text(prev) {
        ")" | "]" | ">" => match list[prev].link {
            Some(open) => list.prev(open),
            None => Some(prev),
        },
        _ => Some(prev),
    }
}

/// Walk backward over the tokens of a trailing return type, returning the
/// token before it (expected to be `->`'s predecessor `)`), or `None` when
/// the shape doesn't match.
fn skip_back_over_type(list: &TokenList, mut t: TokenId) -> Option<TokenId> {
    let mut steps = 0;
    loop {
        steps += 1;
        if steps > 32 {
            return None;
        }
        let tok = list.get(t)?;
        let type_ish = tok.kind == TokenKind::Name
            || (tok.kind == TokenKind::Keyword
                && crate::tokens::keywords::TYPE_KEYWORDS.contains(tok.text.as_str()))
            || matches!(tok.text.as_str(), "::" | "*" | "&" | "const");
        if type_ish {
            t = list.prev(t)?;
            continue;
        }
        if tok.text == ">" {
            if let Some(open) = tok.link {
                t = list.prev(open)?;
                continue;
            }
            return None;
        }
        if tok.text == "->" {
            return list.prev(t);
        }
        return None;
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

    /// Drive the tree over the whole stream, collecting the scope at each
    /// token for inspection.
    fn walk(list: &TokenList) -> (ScopeTree, Vec<(TokenId, ScopeId)>) {
        let mut tree = ScopeTree::new();
        let mut at = Vec::new();
        for id in list.iter() {
            tree.advance(list, id).unwrap();
            at.push((id, tree.current()));
        }
        (tree, at)
    }

    #[test]
    fn test_namespace_and_record_names() {
        let list = prepare("namespace A { struct B { int x; }; }");
        let (tree, _) = walk(&list);

        let b = tree.find_by_full_name("A::B").unwrap();
        assert_eq!(tree.scope(b).kind, ScopeKind::Record);
        let a = tree.find_by_full_name("A").unwrap();
        assert!(tree.scope(a).record_types.contains("B"));
    }

    #[test]
    fn test_base_types_recorded() {
        let list = prepare("struct Base {}; struct D : public Base, Other {};");
        let (tree, _) = walk(&list);

        let d = tree.find_by_full_name("D").unwrap();
        assert_eq!(tree.scope(d).base_types, vec!["Base", "Other"]);
    }

    #[test]
    fn test_member_function_scope() {
        let list = prepare("struct A { void f(); }; void A::f() { int x; }");
        let (tree, _) = walk(&list);

        let mf = tree
            .all()
            .find(|&id| tree.scope(id).kind == ScopeKind::MemberFunction)
            .unwrap();
        assert_eq!(tree.scope(mf).name, "A");
        assert!(tree.resolve_path("A", mf).is_some());
    }

    #[test]
    fn test_member_function_with_qualifiers() {
        let list = prepare("struct A { int f() const; }; int A::f() const noexcept { return 0; }");
        let (tree, _) = walk(&list);

        assert!(tree
            .all()
            .any(|id| tree.scope(id).kind == ScopeKind::MemberFunction));
    }

    #[test]
    fn test_initializer_braces_not_scopes() {
        let list = prepare("int a[2] = { 1, 2 };");
        let (tree, at) = walk(&list);

        // Cursor stays at global throughout
        assert!(at.iter().all(|&(_, scope)| scope == 0));
        assert_eq!(tree.all().count(), 1);
    }

    #[test]
    fn test_using_namespace_recorded() {
        let list = prepare("namespace N { struct T {}; } using namespace N; T t;");
        let (tree, _) = walk(&list);

        assert!(tree.scope(0).using_namespaces.contains("N"));
        assert!(tree.resolve_record("T", 0).is_some());
    }

    #[test]
    fn test_reopened_namespace_lookup() {
        let list = prepare(
            "namespace N { struct A {}; } namespace N { struct B {}; }",
        );
        let (tree, _) = walk(&list);

        // Both record names resolve from either incarnation of N
        let first = tree.find_by_full_name("N").unwrap();
        assert!(tree.resolve_record("A", first).is_some());
        assert!(tree.resolve_record("B", first).is_some());
    }

    #[test]
    fn test_mismatched_close_is_recoverable() {
        // Build a broken stream by hand: `{` linked to the wrong place
        let mut list = prepare("void f() { }");
        // Erase the `{` so its `}` shows up with no open scope tracked
        let brace = list.iter().find(|&id| list.text(id) == "{").unwrap();
        let close = list.iter().find(|&id| list.text(id) == "}").unwrap();
        list.erase(brace);

        let mut tree = ScopeTree::new();
        let mut saw_error = false;
        for id in list.iter() {
            if tree.advance(&list, id).is_err() {
                saw_error = true;
            }
        }
        let _ = close;
        assert!(saw_error);
    }

    #[test]
    fn test_global_function_is_plain_scope() {
        let list = prepare("void f() { int x; }");
        let (tree, _) = walk(&list);

        assert!(tree
            .all()
            .all(|id| tree.scope(id).kind != ScopeKind::MemberFunction));
        assert_eq!(tree.all().count(), 2);
    }
}

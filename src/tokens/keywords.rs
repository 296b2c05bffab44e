//! Keyword and classification tables
//!
//! Compile-time perfect-hash sets for token classification.  The lexer uses
//! the keyword tables to split names from reserved words; the normalization
//! passes use the exclusion and type tables for their declaration heuristics.

use phf::phf_set;

/// Keywords shared by C and C++.
pub static C_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "auto", "break", "case", "char", "const", "continue", "default", "do",
    "double", "else", "enum", "extern", "float", "for", "goto", "if",
    "inline", "int", "long", "register", "restrict", "return", "short",
    "signed", "sizeof", "static", "struct", "switch", "typedef", "union",
    "unsigned", "void", "volatile", "while",
    "_Alignas", "_Alignof", "_Atomic", "_Bool", "_Noreturn",
    "_Static_assert", "_Thread_local",
};

/// Keywords that C++ adds on top of [`C_KEYWORDS`].
pub static CPP_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "alignas", "alignof", "bool", "catch", "class", "constexpr",
    "consteval", "constinit", "const_cast", "decltype", "delete",
    "dynamic_cast", "explicit", "export", "false", "friend", "mutable",
    "namespace", "new", "noexcept", "nullptr", "operator", "private",
    "protected", "public", "reinterpret_cast", "static_assert",
    "static_cast", "template", "this", "thread_local", "throw", "true",
    "try", "typeid", "typename", "using", "virtual", "wchar_t",
    "char8_t", "char16_t", "char32_t", "co_await", "co_return", "co_yield",
    "requires", "concept",
};

/// Keywords that can begin a type inside a declaration.
pub static TYPE_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "bool", "char", "char8_t", "char16_t", "char32_t", "double", "float",
    "int", "long", "short", "signed", "unsigned", "void", "wchar_t",
    "_Bool", "auto",
};

/// Qualifier/storage keywords that may precede a type in a declaration
/// without changing what is declared.
pub static DECL_QUALIFIERS: phf::Set<&'static str> = phf_set! {
    "const", "constexpr", "extern", "inline", "mutable", "register",
    "static", "thread_local", "volatile", "_Atomic", "_Thread_local",
};

/// Words that can never start a variable declaration.  The declaration
/// heuristic bails out immediately when a candidate begins with one of
/// these.
pub static DECL_EXCLUSIONS: phf::Set<&'static str> = phf_set! {
    "break", "case", "catch", "continue", "default", "delete", "do",
    "else", "for", "friend", "goto", "if", "new", "operator", "return",
    "sizeof", "switch", "template", "this", "throw", "try", "typedef",
    "typeid", "typename", "using", "while", "public", "private",
    "protected", "namespace", "co_await", "co_return", "co_yield",
    "static_assert", "_Static_assert", "decltype", "alignof", "alignas",
};

/// Trailing qualifiers that may sit between a function's closing `)` and
/// its opening body `{`.
pub static FUNCTION_QUALIFIERS: phf::Set<&'static str> = phf_set! {
    "const", "final", "noexcept", "override", "volatile", "&", "&&",
    "throw", "->",
};

/// Returns true if `text` is reserved in the given dialect.
pub fn is_keyword(text: &str, cpp: bool) -> bool {
    C_KEYWORDS.contains(text) || (cpp && CPP_KEYWORDS.contains(text))
}

/// Multi-character operators, longest first so the lexer can munch
/// maximally by scanning in table order.
pub static MULTI_CHAR_OPS: &[&str] = &[
    "<<=", ">>=", "->*", "...", "::", "->", "++", "--", "<<", ">>", "<=",
    ">=", "==", "!=", "&&", "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=",
    "^=", ".*",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_dialects() {
        assert!(is_keyword("typedef", false));
        assert!(is_keyword("typedef", true));
        assert!(!is_keyword("namespace", false));
        assert!(is_keyword("namespace", true));
        assert!(!is_keyword("vector", true));
    }

    #[test]
    fn test_multi_char_ops_longest_first() {
        // Table order is the munch order: no entry may be a prefix of a
        // longer entry that appears after it.
        for (i, a) in MULTI_CHAR_OPS.iter().enumerate() {
            for b in &MULTI_CHAR_OPS[i + 1..] {
                assert!(!b.starts_with(a), "{a} shadows {b}");
            }
        }
    }
}

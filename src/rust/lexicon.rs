// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! PVS reserved words and identifier rules

/// PVS reserved words (case-insensitive in PVS source)
pub const KEYWORDS: &[&str] = &[
    "and", "andthen", "array", "assuming", "assumption", "auto_rewrite", "auto_rewrite+",
    "auto_rewrite-", "axiom", "begin", "but", "by", "cases", "challenge", "claim", "closure",
    "cond", "conjecture", "containing", "conversion", "conversion+", "conversion-", "corollary",
    "datatype", "else", "elsif", "end", "endassuming", "endcases", "endcond", "endif",
    "endtable", "exists", "exporting", "fact", "false", "forall", "formula", "from", "function",
    "has_type", "if", "iff", "implies", "importing", "in", "inductive", "judgement", "lambda",
    "law", "lemma", "let", "library", "macro", "measure", "nonempty_type", "not", "o",
    "obligation", "of", "or", "orelse", "postulate", "proposition", "recursive", "sublemma",
    "subtype_of", "subtypes", "table", "then", "theorem", "theory", "true", "type", "type+",
    "var", "when", "where", "with", "xor",
];

pub fn is_keyword(word: &str) -> bool {
    let lower = word.to_lowercase();
    KEYWORDS.iter().any(|k| *k == lower)
}

/// PVS identifiers: a letter followed by letters, digits, `_` or `?`
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '?')
        }
        _ => false,
    }
}

/// Identifier that may name a theory or formula
pub fn is_valid_name(word: &str) -> bool {
    is_identifier(word) && !is_keyword(word)
}

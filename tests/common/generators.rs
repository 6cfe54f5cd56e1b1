// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Property-based testing generators for prover output

use proptest::prelude::*;
use pvs_editor::mode::Trigger;
use pvs_editor::{NodeDescription, SymbolKind};

/// Strategy for PVS identifiers
pub fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_map(|s| s.to_string())
}

/// Strategy for locations such as `nat.pvs:4:3`
pub fn place() -> impl Strategy<Value = Option<String>> {
    prop::option::of(
        (identifier(), 1..500u32, 1..80u32)
            .prop_map(|(f, l, c)| format!("{}.pvs:{}:{}", f, l, c)),
    )
}

/// Strategy for node descriptions of any non-root kind
pub fn node_description() -> impl Strategy<Value = NodeDescription> {
    let kind = prop_oneof![
        Just(SymbolKind::File),
        Just(SymbolKind::Theory),
        Just(SymbolKind::Theory),
        Just(SymbolKind::Declaration),
        Just(SymbolKind::Formula),
        Just(SymbolKind::Formula),
        Just(SymbolKind::Error),
        Just(SymbolKind::Warning),
        Just(SymbolKind::Message),
    ];
    (kind, identifier(), place()).prop_map(|(kind, name, place)| NodeDescription {
        kind,
        name,
        location: place,
    })
}

/// Strategy for free text that never looks like a record or prompt
pub fn plain_text() -> impl Strategy<Value = String> {
    "[a-z ,.0-9]{0,40}".prop_filter("must not look structured", |s| {
        !s.contains("theories") && !s.contains("declarations")
    })
}

/// Strategy for one line of prover output
pub fn protocol_line() -> impl Strategy<Value = String> {
    prop_oneof![
        plain_text(),
        Just("theories".to_string()),
        Just("declarations".to_string()),
        Just("PROMPT>".to_string()),
        Just("Rule?".to_string()),
        identifier().prop_map(|n| format!("THEORY: {}", n)),
        (identifier(), identifier()).prop_map(|(k, n)| format!("kind: {} NAME: {}", k, n)),
        identifier().prop_map(|n| format!("kind: formulaDecl NAME: {}", n)),
        identifier().prop_map(|n| format!("FILE: {}.pvs", n)),
        plain_text().prop_map(|t| format!("ERROR: {}", t)),
        Just("kind: formulaDecl".to_string()),
    ]
}

/// Strategy for state machine inputs
pub fn trigger() -> impl Strategy<Value = Trigger> {
    prop_oneof![
        Just(Trigger::Started),
        Just(Trigger::Stopped),
        Just(Trigger::Quit),
        Just(Trigger::ProcessFailed),
        Just(Trigger::EditOnly),
        Just(Trigger::ResumeProving),
    ]
}

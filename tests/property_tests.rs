// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Property-based tests for parser, tree and mode invariants

mod common;

use common::assertions::assert_well_nested;
use common::generators::{identifier, node_description, plain_text, protocol_line, trigger};
use proptest::prelude::*;
use pvs_editor::mode::{transition, Trigger};
use pvs_editor::protocol::{parse_line, parse_transcript};
use pvs_editor::{
    Command, FormulaRef, Mode, ParseState, ProtocolMessage, StatusUpdate, TreeBuilder,
};

proptest! {
    // Every input line yields exactly one message
    #[test]
    fn parser_never_drops_lines(lines in prop::collection::vec(protocol_line(), 0..60)) {
        let (_, messages) = parse_transcript(ParseState::default(), lines.iter().map(String::as_str));
        prop_assert_eq!(messages.len(), lines.len());
    }

    #[test]
    fn plain_text_passes_through_verbatim(text in plain_text()) {
        let (state, message) = parse_line(ParseState::default(), &text);
        prop_assert_eq!(message, ProtocolMessage::PlainLine(text));
        prop_assert_eq!(state.ambiguous_lines(), 0);
    }

    // A prompt always ends the current section
    #[test]
    fn prompt_resets_section(lines in prop::collection::vec(protocol_line(), 0..30)) {
        let (state, _) = parse_transcript(ParseState::default(), lines.iter().map(String::as_str));
        let (state, message) = parse_line(state, "PROMPT>");
        prop_assert!(matches!(message, ProtocolMessage::Prompt(_)));
        prop_assert_eq!(state.section(), None);
    }

    // Whatever arrives, no node ends up below a node of equal or higher rank
    #[test]
    fn tree_is_always_well_nested(nodes in prop::collection::vec(node_description(), 0..80)) {
        let mut builder = TreeBuilder::new();
        builder.begin_file("nat.pvs");
        for node in nodes {
            builder.insert(node);
        }
        assert_well_nested(builder.root());
    }

    // Typechecking the same file twice yields the same tree as once
    #[test]
    fn typecheck_is_idempotent(lines in prop::collection::vec(protocol_line(), 0..40)) {
        let (_, messages) = parse_transcript(ParseState::default(), lines.iter().map(String::as_str));
        let replay = |builder: &mut TreeBuilder| {
            builder.begin_file("nat.pvs");
            for message in &messages {
                if let ProtocolMessage::StatusUpdate(StatusUpdate::Node(desc)) = message {
                    builder.insert(desc.clone());
                }
            }
        };

        let mut once = TreeBuilder::new();
        replay(&mut once);
        let mut twice = TreeBuilder::new();
        replay(&mut twice);
        replay(&mut twice);

        let once = once.root().child("nat.pvs").cloned();
        let twice = twice.root().child("nat.pvs").cloned();
        prop_assert_eq!(once, twice);
    }

    // Stop always lands in Off; Unknown is only entered through a failure
    #[test]
    fn mode_machine_invariants(triggers in prop::collection::vec(trigger(), 0..40)) {
        let mut mode = Mode::Off;
        for trigger in triggers {
            match transition(mode, trigger) {
                Ok(step) => {
                    prop_assert_eq!(step.from, mode);
                    if trigger == Trigger::Stopped {
                        prop_assert_eq!(step.to, Mode::Off);
                    }
                    if step.to == Mode::Unknown && mode != Mode::Unknown {
                        prop_assert_eq!(trigger, Trigger::ProcessFailed);
                    }
                    prop_assert_eq!(step.changed(), !step.events.is_empty());
                    mode = step.to;
                }
                Err(_) => {
                    prop_assert!(trigger != Trigger::Stopped);
                }
            }
        }
    }

    // Valid names always produce a request with exactly four quotes
    #[test]
    fn prove_request_is_well_formed(theory in identifier(), formula in identifier()) {
        if let Ok(reference) = FormulaRef::new(theory.clone(), formula.clone()) {
            let request = Command::ProveFormula(reference).request().unwrap();
            prop_assert_eq!(request.matches('"').count(), 4);
            prop_assert_eq!(
                request,
                format!("(prove-formula \"{}\" \"{}\" nil)", theory, formula)
            );
        }
    }
}

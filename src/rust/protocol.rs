// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! PVS console protocol parser
//!
//! The prover answers on stdout with free text, structured records and an
//! interactive prompt that ends each response:
//!
//! ```text
//! theories
//! THEORY: Nat PLACE: nat.pvs:1:1
//! declarations
//! kind: formulaDecl NAME: comm PLACE: nat.pvs:4:3
//! ERROR: Expecting an expression PLACE: nat.pvs:9:12
//! PROMPT>
//! ```
//!
//! `parse_line` is a pure function over an explicit [`ParseState`], so a
//! transcript can be parsed one line at a time.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{space0, space1},
    combinator::{all_consuming, map, opt, rest, verify},
    sequence::{preceded, tuple},
    IResult,
};
use serde::Serialize;
use tracing::debug;

use crate::tree::{NodeDescription, SymbolKind};

pub const THEORIES: &str = "theories";
pub const DECLARATIONS: &str = "declarations";
pub const KIND: &str = "kind";
pub const FORMULA_DECLARATION: &str = "formulaDecl";

/// Line endings that mark the prover waiting for input
pub const PROMPT_MARKERS: [&str; 3] = ["PROMPT>", "pvs>", "Rule?"];

/// Substrings that make a line look like a structured record
const RECORD_MARKERS: [&str; 9] = [
    THEORIES,
    DECLARATIONS,
    "kind:",
    FORMULA_DECLARATION,
    "THEORY:",
    "FILE:",
    "ERROR:",
    "WARNING:",
    "MESSAGE:",
];

/// Block of records announced by a section header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Theories,
    Declarations,
}

/// Structured status reported by the prover or the supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StatusUpdate {
    Section(Section),
    Node(NodeDescription),
    ProcessExited { code: Option<i32> },
}

impl StatusUpdate {
    pub fn kind(&self) -> &'static str {
        match self {
            StatusUpdate::Section(_) => "section",
            StatusUpdate::Node(_) => "node",
            StatusUpdate::ProcessExited { .. } => "process_exited",
        }
    }
}

/// One parsed unit of prover output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProtocolMessage {
    PlainLine(String),
    Prompt(String),
    StatusUpdate(StatusUpdate),
    ConsoleInit,
}

/// Parser accumulator threaded through every `parse_line` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseState {
    section: Option<Section>,
    ambiguous: u64,
}

impl ParseState {
    /// Section opened by the last header, closed again by a prompt
    pub fn section(&self) -> Option<Section> {
        self.section
    }

    /// Lines that looked structured but were downgraded to plain text
    pub fn ambiguous_lines(&self) -> u64 {
        self.ambiguous
    }

    fn accept(&self, record: Record<'_>) -> Option<NodeDescription> {
        let desc = match record {
            Record::Theory { name, place } => {
                if self.section != Some(Section::Theories) {
                    return None;
                }
                with_place(NodeDescription::new(SymbolKind::Theory, name), place)
            }
            Record::Declaration { kind, name, place } => {
                if self.section != Some(Section::Declarations) {
                    return None;
                }
                let symbol = if kind == FORMULA_DECLARATION {
                    SymbolKind::Formula
                } else {
                    SymbolKind::Declaration
                };
                with_place(NodeDescription::new(symbol, name), place)
            }
            Record::File { name } => NodeDescription::new(SymbolKind::File, name),
            Record::Diagnostic { kind, text, place } => {
                with_place(NodeDescription::new(kind, text), place)
            }
        };
        Some(desc)
    }
}

fn with_place(desc: NodeDescription, place: Option<&str>) -> NodeDescription {
    match place {
        Some(place) => desc.at(place),
        None => desc,
    }
}

/// Classify one line of prover output
pub fn parse_line(mut state: ParseState, line: &str) -> (ParseState, ProtocolMessage) {
    let text = line.trim_end_matches(['\r', '\n']);
    let trimmed = text.trim();

    if is_prompt(trimmed) {
        state.section = None;
        return (state, ProtocolMessage::Prompt(trimmed.to_string()));
    }

    let section = match trimmed {
        THEORIES => Some(Section::Theories),
        DECLARATIONS => Some(Section::Declarations),
        _ => None,
    };
    if let Some(section) = section {
        state.section = Some(section);
        return (
            state,
            ProtocolMessage::StatusUpdate(StatusUpdate::Section(section)),
        );
    }

    if let Ok((_, record)) = all_consuming(record)(trimmed) {
        if let Some(desc) = state.accept(record) {
            return (
                state,
                ProtocolMessage::StatusUpdate(StatusUpdate::Node(desc)),
            );
        }
    }

    if looks_structured(trimmed) {
        state.ambiguous += 1;
        debug!(section = ?state.section, "incomplete record treated as text: {}", trimmed);
    }
    (state, ProtocolMessage::PlainLine(text.to_string()))
}

/// Parse a whole transcript starting from `state`
pub fn parse_transcript<'a, I>(state: ParseState, lines: I) -> (ParseState, Vec<ProtocolMessage>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut state = state;
    let mut messages = Vec::new();
    for line in lines {
        let (next, message) = parse_line(state, line);
        state = next;
        messages.push(message);
    }
    (state, messages)
}

pub fn is_prompt(line: &str) -> bool {
    PROMPT_MARKERS.iter().any(|marker| line.ends_with(marker))
}

fn looks_structured(line: &str) -> bool {
    RECORD_MARKERS.iter().any(|marker| line.contains(marker))
}

// ============================================================================
// Record grammar
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Record<'a> {
    Theory {
        name: &'a str,
        place: Option<&'a str>,
    },
    Declaration {
        kind: &'a str,
        name: &'a str,
        place: Option<&'a str>,
    },
    File {
        name: &'a str,
    },
    Diagnostic {
        kind: SymbolKind,
        text: &'a str,
        place: Option<&'a str>,
    },
}

fn record(input: &str) -> IResult<&str, Record<'_>> {
    alt((theory_record, declaration_record, file_record, diagnostic_record))(input)
}

/// A field value: one word that is not itself a field label
fn value(input: &str) -> IResult<&str, &str> {
    verify(take_while1(|c: char| !c.is_whitespace()), |v: &str| {
        !v.ends_with(':')
    })(input)
}

fn place(input: &str) -> IResult<&str, &str> {
    preceded(tuple((space1, tag("PLACE:"), space0)), value)(input)
}

fn theory_record(input: &str) -> IResult<&str, Record<'_>> {
    let (input, _) = tag("THEORY:")(input)?;
    let (input, _) = space0(input)?;
    let (input, name) = value(input)?;
    let (input, place) = opt(place)(input)?;
    Ok((input, Record::Theory { name, place }))
}

fn declaration_record(input: &str) -> IResult<&str, Record<'_>> {
    let (input, _) = tag(KIND)(input)?;
    let (input, _) = tag(":")(input)?;
    let (input, _) = space0(input)?;
    let (input, kind) = value(input)?;
    let (input, _) = space1(input)?;
    let (input, _) = tag("NAME:")(input)?;
    let (input, _) = space0(input)?;
    let (input, name) = value(input)?;
    let (input, place) = opt(place)(input)?;
    Ok((input, Record::Declaration { kind, name, place }))
}

fn file_record(input: &str) -> IResult<&str, Record<'_>> {
    let (input, _) = tag("FILE:")(input)?;
    let (input, _) = space0(input)?;
    let (input, name) = value(input)?;
    Ok((input, Record::File { name }))
}

fn diagnostic_record(input: &str) -> IResult<&str, Record<'_>> {
    let (input, kind) = alt((
        map(tag("ERROR:"), |_| SymbolKind::Error),
        map(tag("WARNING:"), |_| SymbolKind::Warning),
        map(tag("MESSAGE:"), |_| SymbolKind::Message),
    ))(input)?;
    let (input, _) = space0(input)?;
    let (input, text) = verify(alt((take_until(" PLACE:"), rest)), |t: &str| {
        !t.trim().is_empty()
    })(input)?;
    let (input, place) = opt(place)(input)?;
    Ok((
        input,
        Record::Diagnostic {
            kind,
            text: text.trim_end(),
            place,
        },
    ))
}

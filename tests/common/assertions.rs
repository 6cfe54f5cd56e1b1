// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Assertion helpers for bus events and symbol trees

use pvs_editor::{BusEvent, SymbolKind, SymbolNode};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(5);

/// Receive events until one matches `pred`; returns everything received
pub async fn events_until<F>(events: &mut broadcast::Receiver<BusEvent>, pred: F) -> Vec<BusEvent>
where
    F: Fn(&BusEvent) -> bool,
{
    let mut seen = Vec::new();
    let collect = async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let done = pred(&event);
                    seen.push(event);
                    if done {
                        return;
                    }
                }
                Err(RecvError::Lagged(n)) => panic!("test subscriber lagged by {}", n),
                Err(RecvError::Closed) => panic!("bus closed"),
            }
        }
    };
    if tokio::time::timeout(WAIT, collect).await.is_err() {
        panic!("no matching event within {:?}; got {:?}", WAIT, seen);
    }
    seen
}

/// Events up to and including the next prompt
pub async fn until_prompt(events: &mut broadcast::Receiver<BusEvent>) -> Vec<BusEvent> {
    events_until(events, |e| matches!(e, BusEvent::ConsoleWritePrompt(_))).await
}

/// Everything already queued for this subscriber
pub fn drain(events: &mut broadcast::Receiver<BusEvent>) -> Vec<BusEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

pub fn count_prompts(events: &[BusEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, BusEvent::ConsoleWritePrompt(_)))
        .count()
}

/// Assert the node at `path` exists and has `kind`
pub fn assert_node(root: &SymbolNode, path: &[&str], kind: SymbolKind) {
    let node = root
        .find_path(path)
        .unwrap_or_else(|| panic!("no node at {:?} in {:#?}", path, root));
    assert_eq!(node.kind, kind, "wrong kind at {:?}", path);
}

/// Every parent/child edge respects the nesting rules
pub fn assert_well_nested(node: &SymbolNode) {
    for child in &node.children {
        assert!(
            node.kind.accepts(child.kind),
            "{} `{}` below {} `{}`",
            child.kind,
            child.name,
            node.kind,
            node.name
        );
        assert!(child.kind.rank() > node.kind.rank());
        assert_well_nested(child);
    }
}

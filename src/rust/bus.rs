// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Message bus between the session core and the presentation layer
//!
//! A `tokio::sync::broadcast` channel: every subscriber receives every
//! event, one at a time, in publish order.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::mode::Mode;
use crate::protocol::StatusUpdate;

/// Stable topic identifiers consumed by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    InitializeConsole,
    UpdateFrame,
    ConsoleWriteLine,
    ConsoleWritePrompt,
    PvsStatus,
}

impl EventTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTopic::InitializeConsole => "initialize-console",
            EventTopic::UpdateFrame => "update-frame",
            EventTopic::ConsoleWriteLine => "console-write-line",
            EventTopic::ConsoleWritePrompt => "console-write-prompt",
            EventTopic::PvsStatus => "pvs-status",
        }
    }
}

impl std::fmt::Display for EventTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `pvs-status` event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StatusEvent {
    ModeChanged { from: Mode, to: Mode },
    Update(StatusUpdate),
    Error { message: String },
}

/// An event on the bus
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "topic", content = "payload", rename_all = "kebab-case")]
pub enum BusEvent {
    InitializeConsole,
    UpdateFrame,
    ConsoleWriteLine(String),
    ConsoleWritePrompt(String),
    PvsStatus(StatusEvent),
}

impl BusEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            BusEvent::InitializeConsole => EventTopic::InitializeConsole,
            BusEvent::UpdateFrame => EventTopic::UpdateFrame,
            BusEvent::ConsoleWriteLine(_) => EventTopic::ConsoleWriteLine,
            BusEvent::ConsoleWritePrompt(_) => EventTopic::ConsoleWritePrompt,
            BusEvent::PvsStatus(_) => EventTopic::PvsStatus,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        BusEvent::PvsStatus(StatusEvent::Error {
            message: message.into(),
        })
    }
}

/// Cloneable publishing handle
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<BusEvent>,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        MessageBus { tx }
    }

    /// Publish an event; events published with no subscriber are dropped
    pub fn publish(&self, event: BusEvent) {
        trace!(topic = %event.topic(), "publish");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

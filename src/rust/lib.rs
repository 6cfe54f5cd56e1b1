// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! PVS Editor: session controller for the PVS theorem prover
//!
//! Runs PVS as a child process, parses its console protocol into plain
//! text, prompts and structured status records, builds a symbol tree of
//! files, theories and declarations, and tracks the session mode. Every
//! observable change is published on an in-process message bus.

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lexicon;
pub mod mode;
pub mod protocol;
pub mod session;
pub mod supervisor;
pub mod tree;

pub use bus::{BusEvent, EventTopic, MessageBus, StatusEvent};
pub use config::{LogLevel, SessionConfig};
pub use dispatcher::{Command, FileRef, FormulaRef};
pub use error::{ConfigError, DispatchError, ModeError, SupervisorError};
pub use mode::{Mode, Trigger};
pub use protocol::{ParseState, ProtocolMessage, StatusUpdate};
pub use session::Session;
pub use tree::{NodeDescription, SymbolKind, SymbolNode, TreeBuilder};

// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Session mode state machine
//!
//! `transition` is a pure function of (mode, trigger); `ModeController`
//! applies it atomically and publishes the events it returns.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::bus::{BusEvent, MessageBus, StatusEvent};
use crate::error::ModeError;

/// Label prefix used when the mode is shown in a status bar
pub const MODE_LABEL: &str = "PVS Mode: ";

/// High-level operating state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Off,
    Editor,
    Prover,
    Unknown,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Off => write!(f, "Off"),
            Mode::Editor => write!(f, "Editor"),
            Mode::Prover => write!(f, "Prover"),
            Mode::Unknown => write!(f, "Unknown"),
        }
    }
}

impl Mode {
    /// A process handle exists in every mode except Off
    pub fn has_process(&self) -> bool {
        *self != Mode::Off
    }

    /// Typecheck and prove requests are only legal while proving
    pub fn accepts_prover_commands(&self) -> bool {
        *self == Mode::Prover
    }

    /// Status bar text, e.g. `PVS Mode: Prover`
    pub fn label(&self) -> String {
        format!("{}{}", MODE_LABEL, self)
    }
}

/// Inputs of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Prover process started successfully
    Started,
    /// Explicit stop; always lands in Off
    Stopped,
    /// User quit the application
    Quit,
    /// Write/read failure or unexpected exit
    ProcessFailed,
    /// User is only editing text
    EditOnly,
    /// User returns to proving
    ResumeProving,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Trigger::Started => "start",
            Trigger::Stopped => "stop",
            Trigger::Quit => "quit",
            Trigger::ProcessFailed => "process failure",
            Trigger::EditOnly => "edit",
            Trigger::ResumeProving => "resume proving",
        };
        f.write_str(name)
    }
}

/// Result of a legal transition
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: Mode,
    pub to: Mode,
    pub events: Vec<BusEvent>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Compute the next mode and the events to emit
pub fn transition(mode: Mode, trigger: Trigger) -> Result<Transition, ModeError> {
    use Mode::*;

    let to = match (mode, trigger) {
        (Off, Trigger::Started) => Prover,
        (_, Trigger::Stopped) => Off,
        (Off, Trigger::Quit) => Off,
        (Prover | Editor, Trigger::Quit) => Off,
        (Off, Trigger::ProcessFailed) => Off,
        (Prover | Editor | Unknown, Trigger::ProcessFailed) => Unknown,
        (Prover | Editor, Trigger::EditOnly) => Editor,
        (Prover | Editor, Trigger::ResumeProving) => Prover,
        _ => return Err(ModeError::IllegalTransition { mode, trigger }),
    };

    let events = if to != mode {
        vec![
            BusEvent::PvsStatus(StatusEvent::ModeChanged { from: mode, to }),
            BusEvent::UpdateFrame,
        ]
    } else {
        vec![]
    };

    Ok(Transition {
        from: mode,
        to,
        events,
    })
}

/// Shared owner of the current mode
#[derive(Debug)]
pub struct ModeController {
    state: watch::Sender<Mode>,
    bus: MessageBus,
}

impl ModeController {
    pub fn new(bus: MessageBus) -> Self {
        let (state, _) = watch::channel(Mode::Off);
        ModeController { state, bus }
    }

    pub fn current(&self) -> Mode {
        *self.state.borrow()
    }

    /// Observe mode changes
    pub fn watch(&self) -> watch::Receiver<Mode> {
        self.state.subscribe()
    }

    /// Apply a trigger; on success the new mode is stored and its events published
    pub fn apply(&self, trigger: Trigger) -> Result<Mode, ModeError> {
        let mut outcome = None;
        self.state.send_if_modified(|mode| {
            let result = transition(*mode, trigger);
            let changed = match &result {
                Ok(t) => {
                    *mode = t.to;
                    t.changed()
                }
                Err(_) => false,
            };
            outcome = Some(result);
            changed
        });

        let t = outcome.unwrap_or_else(|| transition(self.current(), trigger))?;

        if t.changed() {
            info!("PVS mode {} -> {} ({})", t.from, t.to, trigger);
        } else {
            debug!("PVS mode stays {} on {}", t.to, trigger);
        }
        for event in t.events {
            self.bus.publish(event);
        }
        Ok(t.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: [Mode; 4] = [Mode::Off, Mode::Editor, Mode::Prover, Mode::Unknown];

    #[test]
    fn test_only_start_leaves_off_for_prover() {
        assert_eq!(transition(Mode::Off, Trigger::Started).unwrap().to, Mode::Prover);
        for trigger in [Trigger::EditOnly, Trigger::ResumeProving] {
            assert!(transition(Mode::Off, trigger).is_err());
        }
        assert_eq!(transition(Mode::Off, Trigger::ProcessFailed).unwrap().to, Mode::Off);
    }

    #[test]
    fn test_stop_always_lands_in_off() {
        for mode in ALL_MODES {
            assert_eq!(transition(mode, Trigger::Stopped).unwrap().to, Mode::Off);
        }
    }

    #[test]
    fn test_failure_moves_to_unknown() {
        for mode in [Mode::Editor, Mode::Prover, Mode::Unknown] {
            assert_eq!(transition(mode, Trigger::ProcessFailed).unwrap().to, Mode::Unknown);
        }
    }

    #[test]
    fn test_unknown_has_no_automatic_recovery() {
        for trigger in [
            Trigger::Started,
            Trigger::Quit,
            Trigger::EditOnly,
            Trigger::ResumeProving,
        ] {
            assert!(
                transition(Mode::Unknown, trigger).is_err(),
                "{} should not leave Unknown",
                trigger
            );
        }
    }

    #[test]
    fn test_editor_round_trip() {
        assert_eq!(transition(Mode::Prover, Trigger::EditOnly).unwrap().to, Mode::Editor);
        assert_eq!(
            transition(Mode::Editor, Trigger::ResumeProving).unwrap().to,
            Mode::Prover
        );
        assert_eq!(transition(Mode::Editor, Trigger::Quit).unwrap().to, Mode::Off);
    }

    #[test]
    fn test_events_only_on_change() {
        let t = transition(Mode::Off, Trigger::Stopped).unwrap();
        assert!(t.events.is_empty());

        let t = transition(Mode::Prover, Trigger::ProcessFailed).unwrap();
        assert_eq!(
            t.events[0],
            BusEvent::PvsStatus(StatusEvent::ModeChanged {
                from: Mode::Prover,
                to: Mode::Unknown
            })
        );
        assert_eq!(t.events[1], BusEvent::UpdateFrame);
    }

    #[test]
    fn test_label() {
        assert_eq!(Mode::Prover.label(), "PVS Mode: Prover");
    }

    #[tokio::test]
    async fn test_controller_publishes_and_stores() {
        let bus = MessageBus::new(8);
        let mut rx = bus.subscribe();
        let controller = ModeController::new(bus);
        let mut watcher = controller.watch();

        assert_eq!(controller.apply(Trigger::Started).unwrap(), Mode::Prover);
        assert_eq!(controller.current(), Mode::Prover);
        assert!(watcher.has_changed().unwrap());
        assert_eq!(*watcher.borrow_and_update(), Mode::Prover);

        assert!(matches!(
            rx.recv().await.unwrap(),
            BusEvent::PvsStatus(StatusEvent::ModeChanged { to: Mode::Prover, .. })
        ));
        assert_eq!(rx.recv().await.unwrap(), BusEvent::UpdateFrame);
    }

    #[test]
    fn test_controller_rejects_illegal() {
        let controller = ModeController::new(MessageBus::new(4));
        let err = controller.apply(Trigger::ResumeProving).unwrap_err();
        assert_eq!(
            err,
            ModeError::IllegalTransition {
                mode: Mode::Off,
                trigger: Trigger::ResumeProving
            }
        );
        assert_eq!(controller.current(), Mode::Off);
    }
}

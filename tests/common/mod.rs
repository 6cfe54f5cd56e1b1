// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Common test utilities for the PVS Editor test suite

#![allow(dead_code)]

use pvs_editor::{Session, SessionConfig};
use std::path::PathBuf;

pub mod assertions;
pub mod generators;
pub mod mock_prover;

pub use mock_prover::MockProver;

/// Session configured for an executable that does not exist
pub fn missing_prover_config() -> SessionConfig {
    SessionConfig {
        install_dir: PathBuf::from("/nonexistent"),
        executable: PathBuf::from("bin/pvs"),
        ..Default::default()
    }
}

/// Session already running the given fake prover
pub async fn started_session(prover: &MockProver) -> Session {
    let session = Session::new(prover.config());
    session.start().await.expect("fake prover should start");
    session
}

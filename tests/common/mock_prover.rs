// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scripted stand-in for the PVS executable
//!
//! Runs under `/bin/sh -c` and speaks just enough of the console protocol
//! for session tests:
//!
//! - `(typecheck-file ...)` prints the configured transcript, then `PROMPT>`
//! - `(prove-formula ...)` prints a line and never answers with a prompt
//! - `crash` exits with status 3
//! - `(exit-pvs)` exits cleanly
//! - anything else is echoed as `GOT: <line>` followed by `PROMPT>`

use pvs_editor::SessionConfig;
use std::path::PathBuf;

/// Typecheck response of the default fake
pub const NAT_TRANSCRIPT: &[&str] = &[
    "theories",
    "THEORY: Nat PLACE: nat.pvs:1:1",
    "declarations",
    "kind: formulaDecl NAME: comm PLACE: nat.pvs:4:3",
    "PROMPT>",
];

/// A fake prover described by the shell script it runs
#[derive(Debug, Clone)]
pub struct MockProver {
    pub script: String,
    pub stop_timeout_ms: u64,
}

impl MockProver {
    /// Fake answering typecheck requests with [`NAT_TRANSCRIPT`]
    pub fn new() -> Self {
        Self::with_typecheck_output(NAT_TRANSCRIPT)
    }

    /// Fake answering typecheck requests with `lines`
    pub fn with_typecheck_output(lines: &[&str]) -> Self {
        let echoes: Vec<String> = lines
            .iter()
            .map(|line| format!("      printf '%s\\n' {}", shell_quote(line)))
            .collect();
        let script = format!(
            r#"while IFS= read -r line; do
  case "$line" in
    *typecheck-file*)
{}
      ;;
    *prove-formula*) echo "Proving..." ;;
    crash) exit 3 ;;
    "(exit-pvs)") exit 0 ;;
    *) printf 'GOT: %s\n' "$line"; echo "PROMPT>" ;;
  esac
done"#,
            echoes.join("\n")
        );
        MockProver {
            script,
            stop_timeout_ms: 2000,
        }
    }

    /// Fake that answers one typecheck with [`NAT_TRANSCRIPT`] and then
    /// stops reading; the transcript is printed after stdin is closed
    pub fn closing_input_after_typecheck() -> Self {
        let echoes: Vec<String> = NAT_TRANSCRIPT
            .iter()
            .map(|line| format!("printf '%s\\n' {}", shell_quote(line)))
            .collect();
        Self::with_script(&format!(
            "IFS= read -r line; exec 0<&-; {}; exec sleep 30",
            echoes.join("; ")
        ))
        .stop_timeout_ms(200)
    }

    /// Fake running an arbitrary script
    pub fn with_script(script: &str) -> Self {
        MockProver {
            script: script.to_string(),
            stop_timeout_ms: 2000,
        }
    }

    pub fn stop_timeout_ms(mut self, ms: u64) -> Self {
        self.stop_timeout_ms = ms;
        self
    }

    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            executable: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), self.script.clone()],
            stop_timeout_ms: self.stop_timeout_ms,
            ..Default::default()
        }
    }
}

impl Default for MockProver {
    fn default() -> Self {
        Self::new()
    }
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_closing_fake_prints_after_close() {
        let fake = MockProver::closing_input_after_typecheck();
        let closed = fake.script.find("exec 0<&-").unwrap();
        let printed = fake.script.find("PROMPT>").unwrap();
        assert!(closed < printed);
    }

    #[test]
    fn test_transcript_embedded() {
        let fake = MockProver::new();
        assert!(fake.script.contains("'THEORY: Nat PLACE: nat.pvs:1:1'"));
        assert_eq!(fake.config().args[0], "-c");
    }
}

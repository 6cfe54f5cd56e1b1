// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Command dispatch: user intents, mode guard, request text, busy flag

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::DispatchError;
use crate::lexicon;
use crate::mode::Mode;

/// Extension of PVS specification files
pub const PVS_EXTENSION: &str = "pvs";

/// Request asking the prover to terminate
pub const QUIT_REQUEST: &str = "(exit-pvs)";

/// Reference to a `.pvs` file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    path: PathBuf,
    name: String,
    stem: String,
    context: Option<String>,
}

impl FileRef {
    /// Accepts `nat`, `nat.pvs` or `specs/nat.pvs`
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, DispatchError> {
        let mut path = path.into();
        match path.extension().and_then(|e| e.to_str()) {
            None => {
                path.set_extension(PVS_EXTENSION);
            }
            Some(PVS_EXTENSION) => {}
            Some(other) => {
                return Err(DispatchError::InvalidReference(format!(
                    "{} is not a .{} file (extension .{})",
                    path.display(),
                    PVS_EXTENSION,
                    other
                )))
            }
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| lexicon::is_identifier(s))
            .ok_or_else(|| {
                DispatchError::InvalidReference(format!("bad PVS file name: {}", path.display()))
            })?
            .to_string();
        let name = format!("{}.{}", stem, PVS_EXTENSION);

        let context = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => Some(
                dir.to_str()
                    .ok_or_else(|| {
                        DispatchError::InvalidReference(format!(
                            "directory of {} is not valid UTF-8",
                            path.display()
                        ))
                    })?
                    .to_string(),
            ),
            None => None,
        };

        Ok(FileRef {
            path,
            name,
            stem,
            context,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name as shown in the symbol tree, e.g. `nat.pvs`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Directory the prover must switch to before typechecking, if any
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

/// Reference to a formula inside a theory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormulaRef {
    theory: String,
    formula: String,
}

impl FormulaRef {
    pub fn new(theory: impl Into<String>, formula: impl Into<String>) -> Result<Self, DispatchError> {
        let theory = theory.into();
        let formula = formula.into();
        for name in [&theory, &formula] {
            if !lexicon::is_valid_name(name) {
                return Err(DispatchError::InvalidReference(format!(
                    "`{}` is not a valid PVS name",
                    name
                )));
            }
        }
        Ok(FormulaRef { theory, formula })
    }

    pub fn theory(&self) -> &str {
        &self.theory
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }
}

/// User intents accepted by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartSession,
    StopSession,
    Typecheck(FileRef),
    ProveFormula(FormulaRef),
    CloseFile(FileRef),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::StartSession => "start",
            Command::StopSession => "stop",
            Command::Typecheck(_) => "typecheck",
            Command::ProveFormula(_) => "prove",
            Command::CloseFile(_) => "close",
        }
    }

    /// Menu label of the intent
    pub fn label(&self) -> &'static str {
        match self {
            Command::StartSession => "Start PVS",
            Command::StopSession => "Stop PVS",
            Command::Typecheck(_) => "Typecheck",
            Command::ProveFormula(_) => "Prove This",
            Command::CloseFile(_) => "Close File",
        }
    }

    /// Structured requests: guarded by mode, one in flight at a time
    pub fn requires_prover(&self) -> bool {
        matches!(self, Command::Typecheck(_) | Command::ProveFormula(_))
    }

    /// Request line written to the prover, if the command has one
    pub fn request(&self) -> Option<String> {
        match self {
            Command::Typecheck(file) => {
                let typecheck = format!("(typecheck-file \"{}\" nil nil nil)", file.stem());
                Some(match file.context() {
                    Some(dir) => format!(
                        "(progn (change-context {}) {})",
                        lisp_string(dir),
                        typecheck
                    ),
                    None => typecheck,
                })
            }
            Command::ProveFormula(formula) => Some(format!(
                "(prove-formula \"{}\" \"{}\" nil)",
                formula.theory(),
                formula.formula()
            )),
            Command::StartSession | Command::StopSession | Command::CloseFile(_) => None,
        }
    }
}

/// Quote `text` as a Lisp string literal
fn lisp_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Reject prover commands outside Prover mode
pub fn check_mode(command: &Command, mode: Mode) -> Result<(), DispatchError> {
    if command.requires_prover() && !mode.accepts_prover_commands() {
        return Err(DispatchError::IllegalMode {
            command: command.name(),
            mode,
        });
    }
    Ok(())
}

/// Single in-flight request guard
#[derive(Debug, Default)]
pub struct BusyFlag(AtomicBool);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag; false if it was already set
    pub fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Clear the flag; returns whether it was set
    pub fn release(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_ref_normalises_extension() {
        let file = FileRef::new("nat").unwrap();
        assert_eq!(file.name(), "nat.pvs");
        assert_eq!(file.stem(), "nat");

        let nested = FileRef::new("specs/sets.pvs").unwrap();
        assert_eq!(nested.name(), "sets.pvs");
        assert_eq!(nested.path(), Path::new("specs/sets.pvs"));
        assert_eq!(nested.context(), Some("specs"));
        assert_eq!(file.context(), None);
    }

    #[test]
    fn test_context_is_quoted() {
        let file = FileRef::new(r#"/home/me/my "proofs"\v2/nat.pvs"#).unwrap();
        assert_eq!(
            Command::Typecheck(file).request().unwrap(),
            r#"(progn (change-context "/home/me/my \"proofs\"\\v2") (typecheck-file "nat" nil nil nil))"#
        );
    }

    #[test]
    fn test_file_ref_rejects_other_files() {
        assert!(FileRef::new("notes.txt").is_err());
        assert!(FileRef::new("bad name\".pvs").is_err());
    }

    #[test]
    fn test_formula_ref_validation() {
        assert!(FormulaRef::new("Nat", "comm").is_ok());
        assert!(FormulaRef::new("Nat", "lemma").is_err());
        assert!(FormulaRef::new("Nat\" t)", "comm").is_err());
    }

    #[test]
    fn test_requests() {
        let typecheck = Command::Typecheck(FileRef::new("nat.pvs").unwrap());
        assert_eq!(
            typecheck.request().unwrap(),
            "(typecheck-file \"nat\" nil nil nil)"
        );

        let prove = Command::ProveFormula(FormulaRef::new("Nat", "comm").unwrap());
        assert_eq!(prove.request().unwrap(), "(prove-formula \"Nat\" \"comm\" nil)");

        let nested = Command::Typecheck(FileRef::new("specs/nat.pvs").unwrap());
        assert_eq!(
            nested.request().unwrap(),
            "(progn (change-context \"specs\") (typecheck-file \"nat\" nil nil nil))"
        );

        assert!(Command::StartSession.request().is_none());
        assert!(Command::CloseFile(FileRef::new("nat").unwrap()).request().is_none());
    }

    #[test]
    fn test_mode_guard() {
        let typecheck = Command::Typecheck(FileRef::new("nat").unwrap());
        for mode in [Mode::Off, Mode::Editor, Mode::Unknown] {
            assert!(matches!(
                check_mode(&typecheck, mode),
                Err(DispatchError::IllegalMode { command: "typecheck", .. })
            ));
        }
        assert!(check_mode(&typecheck, Mode::Prover).is_ok());
        assert!(check_mode(&Command::StartSession, Mode::Off).is_ok());
        assert!(check_mode(&Command::CloseFile(FileRef::new("nat").unwrap()), Mode::Off).is_ok());
    }

    #[test]
    fn test_busy_flag() {
        let busy = BusyFlag::new();
        assert!(busy.try_acquire());
        assert!(!busy.try_acquire());
        assert!(busy.is_busy());
        assert!(busy.release());
        assert!(!busy.release());
        assert!(busy.try_acquire());
    }
}

// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prover session controller
//!
//! Ties the supervisor, protocol parser, symbol tree and mode state machine
//! together. Prover output is drained by a background task; the symbol
//! tree lives in its own task and is exposed as read-only snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{BusEvent, MessageBus, StatusEvent};
use crate::config::SessionConfig;
use crate::dispatcher::{self, BusyFlag, Command};
use crate::error::{DispatchError, SupervisorError};
use crate::mode::{self, Mode, ModeController, Trigger};
use crate::protocol::{self, ParseState, ProtocolMessage, StatusUpdate};
use crate::supervisor::{ProverErrors, ProverLines, ProverSupervisor};
use crate::tree::{NodeDescription, Placement, SymbolNode, TreeBuilder};

/// Work items for the tree builder task
#[derive(Debug)]
enum TreeUpdate {
    BeginFile(String),
    /// The typecheck announced by the last `BeginFile` was never sent
    AbandonFile(String),
    CloseFile(String),
    Insert(NodeDescription),
    EndResponse,
}

/// Background tasks attached to one prover process
struct ReaderHandle {
    shutdown: watch::Sender<bool>,
    output: JoinHandle<()>,
    errors: JoinHandle<()>,
}

/// Routes parsed prover output to the bus, the tree and the busy flag
#[derive(Clone)]
struct OutputRouter {
    bus: MessageBus,
    mode: Arc<ModeController>,
    busy: Arc<BusyFlag>,
    tree: mpsc::UnboundedSender<TreeUpdate>,
    supervisor: Arc<Mutex<ProverSupervisor>>,
    ambiguous: Arc<AtomicU64>,
}

impl OutputRouter {
    fn route(&self, message: ProtocolMessage) {
        match message {
            ProtocolMessage::PlainLine(line) => {
                self.bus.publish(BusEvent::ConsoleWriteLine(line));
            }
            ProtocolMessage::Prompt(prompt) => {
                if self.busy.release() {
                    debug!("response complete");
                }
                let _ = self.tree.send(TreeUpdate::EndResponse);
                self.bus.publish(BusEvent::ConsoleWritePrompt(prompt));
            }
            ProtocolMessage::StatusUpdate(update) => {
                if let StatusUpdate::Node(desc) = &update {
                    let _ = self.tree.send(TreeUpdate::Insert(desc.clone()));
                }
                self.bus.publish(BusEvent::PvsStatus(StatusEvent::Update(update)));
            }
            ProtocolMessage::ConsoleInit => {
                self.bus.publish(BusEvent::InitializeConsole);
            }
        }
    }

    async fn process_lost(&self, cause: Option<SupervisorError>) {
        let code = self.supervisor.lock().await.exit_code();
        match &cause {
            Some(e) => warn!("lost prover output: {}", e),
            None => warn!(?code, "prover closed its output"),
        }
        self.route(ProtocolMessage::StatusUpdate(StatusUpdate::ProcessExited {
            code,
        }));
        if let Some(e) = cause {
            self.bus.publish(BusEvent::error(e.to_string()));
        }
        self.busy.release();
        if let Err(e) = self.mode.apply(Trigger::ProcessFailed) {
            debug!("{}", e);
        }
    }
}

/// The top-level session object
pub struct Session {
    config: Arc<SessionConfig>,
    bus: MessageBus,
    mode: Arc<ModeController>,
    busy: Arc<BusyFlag>,
    supervisor: Arc<Mutex<ProverSupervisor>>,
    tree_tx: mpsc::UnboundedSender<TreeUpdate>,
    tree_rx: watch::Receiver<Arc<SymbolNode>>,
    reader: Mutex<Option<ReaderHandle>>,
    /// Serialises start, stop and quit
    lifecycle: Mutex<()>,
    ambiguous: Arc<AtomicU64>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode.current())
            .field("busy", &self.busy.is_busy())
            .field("executable", &self.config.executable_path())
            .finish()
    }
}

impl Session {
    /// Create an idle session (Mode = Off)
    ///
    /// Must be called from within a tokio runtime: the symbol tree task is
    /// spawned here.
    pub fn new(config: SessionConfig) -> Self {
        let config = Arc::new(config);
        let bus = MessageBus::new(config.bus_capacity);
        let mode = Arc::new(ModeController::new(bus.clone()));

        let (tree_tx, updates) = mpsc::unbounded_channel();
        let (snapshots, tree_rx) = watch::channel(Arc::new(SymbolNode::root()));
        tokio::spawn(build_tree(updates, snapshots, bus.clone()));

        Session {
            supervisor: Arc::new(Mutex::new(ProverSupervisor::new(config.clone()))),
            config,
            bus,
            mode,
            busy: Arc::new(BusyFlag::new()),
            tree_tx,
            tree_rx,
            reader: Mutex::new(None),
            lifecycle: Mutex::new(()),
            ambiguous: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.bus.subscribe()
    }

    pub fn mode(&self) -> Mode {
        self.mode.current()
    }

    pub fn watch_mode(&self) -> watch::Receiver<Mode> {
        self.mode.watch()
    }

    /// Latest published tree
    pub fn tree_snapshot(&self) -> Arc<SymbolNode> {
        self.tree_rx.borrow().clone()
    }

    pub fn watch_tree(&self) -> watch::Receiver<Arc<SymbolNode>> {
        self.tree_rx.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// Structured-looking lines downgraded to plain text so far
    pub fn ambiguous_lines(&self) -> u64 {
        self.ambiguous.load(Ordering::Relaxed)
    }

    /// Start the prover; legal only in Off mode
    pub async fn start(&self) -> Result<(), DispatchError> {
        let _lifecycle = self.lifecycle.lock().await;
        let result = self.launch().await;
        self.report(result)
    }

    /// Stop the prover; always ends in Off mode, idempotent
    pub async fn stop(&self) -> Result<(), DispatchError> {
        let _lifecycle = self.lifecycle.lock().await;
        let result = self.shutdown(Trigger::Stopped).await;
        self.report(result)
    }

    /// User quit: like `stop`, but refused while the prover state is Unknown
    pub async fn quit(&self) -> Result<(), DispatchError> {
        let _lifecycle = self.lifecycle.lock().await;
        let result = match mode::transition(self.mode.current(), Trigger::Quit) {
            Ok(_) => self.shutdown(Trigger::Quit).await,
            Err(e) => Err(e.into()),
        };
        self.report(result)
    }

    async fn launch(&self) -> Result<(), DispatchError> {
        let mode = self.mode.current();
        if mode != Mode::Off {
            return Err(DispatchError::IllegalMode {
                command: Command::StartSession.name(),
                mode,
            });
        }

        let mut supervisor = self.supervisor.lock().await;
        supervisor.start()?;
        let lines = supervisor.lines();
        let errors = supervisor.stderr_lines();
        drop(supervisor);

        self.mode.apply(Trigger::Started)?;

        let router = OutputRouter {
            bus: self.bus.clone(),
            mode: self.mode.clone(),
            busy: self.busy.clone(),
            tree: self.tree_tx.clone(),
            supervisor: self.supervisor.clone(),
            ambiguous: self.ambiguous.clone(),
        };
        let (shutdown, shutdown_rx) = watch::channel(false);
        let output = tokio::spawn(pump_output(lines, router, shutdown_rx.clone()));
        let errors = tokio::spawn(forward_errors(errors, self.bus.clone(), shutdown_rx));

        *self.reader.lock().await = Some(ReaderHandle {
            shutdown,
            output,
            errors,
        });
        Ok(())
    }

    async fn shutdown(&self, trigger: Trigger) -> Result<(), DispatchError> {
        let reader = self.reader.lock().await.take();
        if let Some(reader) = reader {
            let _ = reader.shutdown.send(true);
            for task in [reader.output, reader.errors] {
                if let Err(e) = task.await {
                    warn!("output task ended abnormally: {}", e);
                }
            }
        }

        let result = self.supervisor.lock().await.stop().await;
        self.busy.release();

        if let Ok(Some(status)) = &result {
            self.bus.publish(BusEvent::PvsStatus(StatusEvent::Update(
                StatusUpdate::ProcessExited {
                    code: status.code(),
                },
            )));
        }
        // The process is gone now. If it died after a quit was accepted, the
        // mode already moved to Unknown and only Stopped can bring it to Off.
        match self.mode.apply(trigger) {
            Ok(_) => {}
            Err(e) if trigger == Trigger::Quit => {
                debug!("{}; prover exited first", e);
                self.mode.apply(Trigger::Stopped)?;
            }
            Err(e) => return Err(e.into()),
        }

        result.map(|_| ()).map_err(DispatchError::from)
    }

    /// Publish a failed operation on the bus before handing it back
    fn report<T>(&self, result: Result<T, DispatchError>) -> Result<T, DispatchError> {
        if let Err(e) = &result {
            if e.is_rejection() {
                debug!("rejected: {}", e);
            } else {
                error!("{}", e);
            }
            self.bus.publish(BusEvent::error(e.to_string()));
        }
        result
    }

    /// User is only editing; prover commands are refused until `resume_prover`
    pub fn enter_editor(&self) -> Result<Mode, DispatchError> {
        let result = self.mode.apply(Trigger::EditOnly);
        self.report(result.map_err(DispatchError::from))
    }

    pub fn resume_prover(&self) -> Result<Mode, DispatchError> {
        let result = self.mode.apply(Trigger::ResumeProving);
        self.report(result.map_err(DispatchError::from))
    }

    /// Execute a user intent
    ///
    /// Requests are fire-and-forget: the response arrives on the bus and
    /// the prompt that ends it clears the busy flag.
    pub async fn dispatch(&self, command: Command) -> Result<(), DispatchError> {
        match command {
            Command::StartSession => self.start().await,
            Command::StopSession => self.stop().await,
            Command::CloseFile(file) => {
                self.update_tree(TreeUpdate::CloseFile(file.name().to_string()));
                Ok(())
            }
            Command::Typecheck(_) | Command::ProveFormula(_) => {
                let result = self.dispatch_request(&command).await;
                self.report(result)
            }
        }
    }

    async fn dispatch_request(&self, command: &Command) -> Result<(), DispatchError> {
        dispatcher::check_mode(command, self.mode.current())?;
        let Some(request) = command.request() else {
            return Ok(());
        };

        if !self.busy.try_acquire() {
            return Err(DispatchError::Busy {
                command: command.name(),
            });
        }

        if let Command::Typecheck(file) = command {
            self.update_tree(TreeUpdate::BeginFile(file.name().to_string()));
        }

        info!("{} requested", command.label());
        let result = self.write(&request).await;
        if result.is_err() {
            self.busy.release();
            if let Command::Typecheck(file) = command {
                self.update_tree(TreeUpdate::AbandonFile(file.name().to_string()));
            }
        }
        result
    }

    /// Pass console input straight through to a running prover
    pub async fn send_raw(&self, line: &str) -> Result<(), DispatchError> {
        let mode = self.mode.current();
        let result = if matches!(mode, Mode::Prover | Mode::Editor) {
            self.write(line).await
        } else {
            Err(DispatchError::IllegalMode {
                command: "send",
                mode,
            })
        };
        self.report(result)
    }

    async fn write(&self, line: &str) -> Result<(), DispatchError> {
        let mut supervisor = self.supervisor.lock().await;
        match supervisor.send(line).await {
            Ok(()) => Ok(()),
            Err(e @ SupervisorError::Write(_)) => {
                let code = supervisor.exit_code();
                drop(supervisor);
                warn!("prover unreachable: {}", e);
                self.bus.publish(BusEvent::PvsStatus(StatusEvent::Update(
                    StatusUpdate::ProcessExited { code },
                )));
                self.busy.release();
                if let Err(mode_err) = self.mode.apply(Trigger::ProcessFailed) {
                    debug!("{}", mode_err);
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update_tree(&self, update: TreeUpdate) {
        if self.tree_tx.send(update).is_err() {
            error!("symbol tree task is gone; update dropped");
        }
    }
}

/// Drain prover stdout until it closes or the session shuts the reader down
async fn pump_output(
    lines: Option<ProverLines>,
    router: OutputRouter,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some(mut lines) = lines else {
        router.process_lost(None).await;
        return;
    };
    let generation = lines.generation();
    let mut state = ParseState::default();
    router.route(ProtocolMessage::ConsoleInit);

    loop {
        let next = tokio::select! {
            _ = shutdown.changed() => {
                debug!(generation, "output reader stopped");
                return;
            }
            next = lines.next_line() => next,
        };

        match next {
            Ok(Some(line)) => {
                debug!("<- {}", line);
                let before = state.ambiguous_lines();
                let (next_state, message) = protocol::parse_line(state, &line);
                if next_state.ambiguous_lines() > before {
                    router.ambiguous.fetch_add(1, Ordering::Relaxed);
                }
                state = next_state;
                router.route(message);
            }
            Ok(None) => {
                router.process_lost(None).await;
                return;
            }
            Err(e) => {
                router.process_lost(Some(e)).await;
                return;
            }
        }
    }
}

/// Copy prover stderr to the console unparsed
async fn forward_errors(
    errors: Option<ProverErrors>,
    bus: MessageBus,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some(mut errors) = errors else {
        return;
    };
    loop {
        let next = tokio::select! {
            _ = shutdown.changed() => return,
            next = errors.next_line() => next,
        };
        match next {
            Ok(Some(line)) => bus.publish(BusEvent::ConsoleWriteLine(line)),
            Ok(None) => return,
            Err(e) => {
                debug!("prover stderr closed: {}", e);
                return;
            }
        }
    }
}

/// Owner of the symbol tree; publishes a snapshot after each batch
async fn build_tree(
    mut updates: mpsc::UnboundedReceiver<TreeUpdate>,
    snapshots: watch::Sender<Arc<SymbolNode>>,
    bus: MessageBus,
) {
    let mut tree = SymbolTree::default();
    while let Some(update) = updates.recv().await {
        tree.apply(update);
        while let Ok(update) = updates.try_recv() {
            tree.apply(update);
        }
        snapshots.send_replace(tree.builder.snapshot());
        bus.publish(BusEvent::UpdateFrame);
    }
    debug!("symbol tree task finished");
}

/// State owned by the tree task
#[derive(Debug, Default)]
struct SymbolTree {
    builder: TreeBuilder,
    /// Contents replaced by the latest `BeginFile`
    replaced: Option<(String, Option<Vec<SymbolNode>>)>,
}

impl SymbolTree {
    fn apply(&mut self, update: TreeUpdate) {
        match update {
            TreeUpdate::BeginFile(name) => {
                let previous = self.builder.begin_file(&name);
                self.replaced = Some((name, previous));
            }
            TreeUpdate::AbandonFile(name) => match self.replaced.take() {
                Some((replaced, previous)) if replaced == name => {
                    self.builder.restore_file(&name, previous);
                }
                other => {
                    debug!("nothing to restore for {}", name);
                    self.replaced = other;
                }
            },
            TreeUpdate::CloseFile(name) => {
                if !self.builder.close_file(&name) {
                    debug!("close requested for unknown file {}", name);
                }
            }
            TreeUpdate::Insert(desc) => {
                let name = desc.name.clone();
                if let Placement::Attached { depth } = self.builder.insert(desc) {
                    debug!(depth, "placed {}", name);
                }
            }
            TreeUpdate::EndResponse => self.builder.end_response(),
        }
    }
}

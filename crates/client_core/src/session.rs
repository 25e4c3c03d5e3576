//! Session orchestration: activation schedule, source selection and event
//! routing. Everything runs on one task; timers and link tasks only post
//! inputs back to it.

use std::{ops::ControlFlow, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use shared::{
    domain::{ConnectionStatus, SessionPhase, VisualPhase},
    error::PipelineError,
    protocol::{NormalizedEvent, Telemetry},
};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    watch,
};
use tracing::{debug, info, trace};
use url::Url;
use uuid::Uuid;

use crate::{
    connection::{ConnectionInput, ConnectionManager, ConnectionOutput},
    event_mapper::EventMapper,
    presentation::{DiagnosticSink, Presentation},
    scheduler::{schedule, ScheduledTask},
    settings::PipelineSettings,
    simulation::{SimulationConfig, SimulationInput, SimulationSource},
    transport::LinkConnector,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Begin,
    End,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub connected: bool,
    pub events_observed: u64,
    pub telemetry: Option<Telemetry>,
}

impl Session {
    fn idle() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: SessionPhase::Idle,
            connected: false,
            events_observed: 0,
            telemetry: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub connected: bool,
    pub events_observed: u64,
    pub telemetry: Option<Telemetry>,
    pub connection: ConnectionStatus,
    pub retry_count: u32,
    pub reconnect_scheduled: bool,
    pub simulating: bool,
}

/// Steps of the activation and teardown schedules, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    CloseEye,
    Awaken,
    SpawnUnits,
    BeginTracking,
    ResetDecorations,
    Finish,
}

impl Step {
    fn phase(self) -> SessionPhase {
        match self {
            Step::CloseEye | Step::Awaken => SessionPhase::Starting,
            Step::SpawnUnits | Step::BeginTracking => SessionPhase::Active,
            Step::ResetDecorations | Step::Finish => SessionPhase::Closing,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StepDue {
    epoch: u64,
    step: Step,
}

enum Input {
    Command(SessionCommand),
    Connection(ConnectionInput),
    Simulation(SimulationInput),
    Step(StepDue),
}

/// Cloneable front door to a running [`SessionController`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: UnboundedSender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn begin(&self) -> bool {
        self.commands.send(SessionCommand::Begin).is_ok()
    }

    pub fn end(&self) -> bool {
        self.commands.send(SessionCommand::End).is_ok()
    }

    pub fn shutdown(&self) -> bool {
        self.commands.send(SessionCommand::Shutdown).is_ok()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Resolves with the first published snapshot matching `predicate`, or
    /// `None` once the controller has stopped.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx.wait_for(predicate).await.ok()?;
        Some(snapshot.clone())
    }
}

pub struct SessionController {
    session: Session,
    settings: PipelineSettings,
    media_url: Url,
    mapper: EventMapper,
    connection: ConnectionManager,
    simulation: SimulationSource,
    presentation: Arc<dyn Presentation>,
    diagnostics: Arc<dyn DiagnosticSink>,
    epoch: u64,
    pending_step: Option<ScheduledTask>,
    commands: UnboundedReceiver<SessionCommand>,
    connection_rx: UnboundedReceiver<ConnectionInput>,
    simulation_rx: UnboundedReceiver<SimulationInput>,
    step_tx: UnboundedSender<StepDue>,
    step_rx: UnboundedReceiver<StepDue>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub fn new(
        settings: PipelineSettings,
        connector: Arc<dyn LinkConnector>,
        presentation: Arc<dyn Presentation>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<(Self, SessionHandle)> {
        settings.validate().context("invalid pipeline settings")?;
        let backend_url = settings.backend_url()?;
        let media_url = settings.media_url()?;
        let mapper = EventMapper::standard();

        let (connection, connection_rx) =
            ConnectionManager::new(connector, backend_url, settings.reconnect_delay());
        let (simulation, simulation_rx) =
            SimulationSource::new(SimulationConfig::from(&settings), mapper.clone());
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (step_tx, step_rx) = mpsc::unbounded_channel();

        let session = Session::idle();
        let (snapshots, snapshot_rx) = watch::channel(SessionSnapshot {
            session_id: session.id,
            phase: session.phase,
            connected: false,
            events_observed: 0,
            telemetry: None,
            connection: connection.status(),
            retry_count: 0,
            reconnect_scheduled: false,
            simulating: false,
        });

        let controller = Self {
            session,
            settings,
            media_url,
            mapper,
            connection,
            simulation,
            presentation,
            diagnostics,
            epoch: 0,
            pending_step: None,
            commands,
            connection_rx,
            simulation_rx,
            step_tx,
            step_rx,
            snapshots,
        };
        let handle = SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        Ok((controller, handle))
    }

    /// Drains inputs one at a time until shutdown or until every handle is
    /// dropped.
    pub async fn run(mut self) {
        info!(session_id = %self.session.id, "session: controller running");
        loop {
            let input = tokio::select! {
                command = self.commands.recv() => Input::Command(command.unwrap_or(SessionCommand::Shutdown)),
                Some(input) = self.connection_rx.recv() => Input::Connection(input),
                Some(input) = self.simulation_rx.recv() => Input::Simulation(input),
                Some(due) = self.step_rx.recv() => Input::Step(due),
            };
            let flow = self.dispatch(input);
            self.publish();
            if flow.is_break() {
                break;
            }
        }
        info!("session: controller stopped");
    }

    fn dispatch(&mut self, input: Input) -> ControlFlow<()> {
        match input {
            Input::Command(SessionCommand::Begin) => self.begin(),
            Input::Command(SessionCommand::End) => self.end(),
            Input::Command(SessionCommand::Shutdown) => {
                self.shutdown();
                return ControlFlow::Break(());
            }
            Input::Connection(input) => {
                let active = self.session.phase == SessionPhase::Active;
                for output in self.connection.handle(input, active) {
                    self.on_connection_output(output);
                }
                self.select_source();
            }
            Input::Simulation(input) => {
                for event in self.simulation.handle(input) {
                    self.route_event(event);
                }
            }
            Input::Step(due) => self.on_step(due),
        }
        ControlFlow::Continue(())
    }

    fn begin(&mut self) {
        if self.session.phase != SessionPhase::Idle {
            debug!(phase = ?self.session.phase, error = %PipelineError::DuplicateStart, "session: begin ignored");
            return;
        }
        self.session = Session::idle();
        self.session.phase = SessionPhase::Starting;
        self.epoch += 1;
        info!(session_id = %self.session.id, "session: starting");

        self.presentation.set_trigger_enabled(false);
        self.schedule_step(Step::CloseEye, self.settings.trigger_pause_ms);
    }

    fn end(&mut self) {
        if !matches!(
            self.session.phase,
            SessionPhase::Starting | SessionPhase::Active
        ) {
            debug!(phase = ?self.session.phase, "session: end ignored");
            return;
        }
        info!(session_id = %self.session.id, events_observed = self.session.events_observed, "session: closing");

        self.cancel_pending_step();
        self.epoch += 1;
        self.session.phase = SessionPhase::Closing;
        self.session.connected = false;
        self.connection.stop();
        self.simulation.stop();

        self.presentation.set_phase_visual(VisualPhase::Closing);
        self.schedule_step(Step::ResetDecorations, self.settings.closing_pause_ms);
    }

    fn shutdown(&mut self) {
        self.cancel_pending_step();
        self.epoch += 1;
        self.connection.stop();
        self.simulation.stop();
        self.session.connected = false;
    }

    fn on_step(&mut self, due: StepDue) {
        if due.epoch != self.epoch || due.step.phase() != self.session.phase {
            trace!(step = ?due.step, "session: stale step dropped");
            return;
        }
        self.pending_step = None;
        debug!(step = ?due.step, "session: step");

        match due.step {
            Step::CloseEye => {
                self.presentation.set_phase_visual(VisualPhase::Closed);
                self.schedule_step(Step::Awaken, self.settings.awaken_pause_ms);
            }
            Step::Awaken => {
                self.presentation.set_phase_visual(VisualPhase::Awakened);
                self.session.phase = SessionPhase::Active;
                info!(session_id = %self.session.id, "session: awakened");
                self.connection.start();
                self.select_source();
                self.schedule_step(Step::SpawnUnits, self.settings.spawn_pause_ms);
            }
            Step::SpawnUnits => {
                self.presentation
                    .spawn_tracking_units(self.settings.tracking_unit_count);
                self.schedule_step(Step::BeginTracking, self.settings.tracking_pause_ms);
            }
            Step::BeginTracking => {
                self.presentation.track_pointer();
                self.presentation.track_units_periodically();
            }
            Step::ResetDecorations => {
                self.presentation.reset_decorations();
                self.schedule_step(Step::Finish, self.settings.settle_pause_ms);
            }
            Step::Finish => {
                self.connection.reset();
                self.simulation.reset();
                self.session = Session::idle();
                self.presentation.set_trigger_enabled(true);
                self.presentation.set_phase_visual(VisualPhase::Dormant);
                info!(session_id = %self.session.id, "session: idle");
            }
        }
    }

    fn on_connection_output(&mut self, output: ConnectionOutput) {
        match output {
            ConnectionOutput::Connected => {
                self.session.connected = true;
                self.simulation.stop();
                self.presentation.show_media_feed(&self.media_url);
            }
            ConnectionOutput::Disconnected => {
                self.session.connected = false;
            }
            ConnectionOutput::Event(event) => self.route_event(event),
            ConnectionOutput::Diagnostic(message) => self.diagnostics.report(&message),
        }
    }

    /// While active, exactly one source drives events: the link once it is
    /// open, the simulation otherwise.
    fn select_source(&mut self) {
        let live = self.connection.status() == ConnectionStatus::Open;
        if self.session.phase == SessionPhase::Active && !live {
            if !self.simulation.is_running() {
                info!("session: no live link, simulating");
                self.simulation.start();
            }
        } else {
            self.simulation.stop();
        }
    }

    fn route_event(&mut self, event: NormalizedEvent) {
        if self.session.phase != SessionPhase::Active {
            trace!(kind = event.kind(), "session: event outside active phase dropped");
            return;
        }
        match event {
            NormalizedEvent::Telemetry(telemetry) => {
                trace!(
                    fps = telemetry.fps,
                    gesture_total = telemetry.gesture_total,
                    "session: telemetry"
                );
                self.session.telemetry = Some(telemetry);
                self.presentation.render_telemetry(
                    telemetry.rounded_fps(),
                    telemetry.confidence_percent(),
                    telemetry.gesture_total,
                );
            }
            NormalizedEvent::GestureCommand { command, .. } => match self.mapper.map(&command) {
                Some(slot) => {
                    debug!(%command, slot = slot.0, "session: gesture");
                    self.session.events_observed += 1;
                    self.presentation
                        .pulse_gesture_slot(slot, self.settings.pulse_duration());
                }
                None => debug!(%command, "session: gesture has no slot"),
            },
        }
    }

    fn schedule_step(&mut self, step: Step, delay_ms: u64) {
        self.cancel_pending_step();
        self.pending_step = Some(schedule(
            Duration::from_millis(delay_ms),
            self.step_tx.clone(),
            StepDue {
                epoch: self.epoch,
                step,
            },
        ));
    }

    fn cancel_pending_step(&mut self) {
        if let Some(pending) = self.pending_step.take() {
            pending.cancel();
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session.id,
            phase: self.session.phase,
            connected: self.session.connected,
            events_observed: self.session.events_observed,
            telemetry: self.session.telemetry,
            connection: self.connection.status(),
            retry_count: self.connection.retry_count(),
            reconnect_scheduled: self.connection.is_reconnect_scheduled(),
            simulating: self.simulation.is_running(),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;

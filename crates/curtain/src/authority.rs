//! The authority node: accept loop, membership, and the barrier's home.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use curtain_barrier::{BarrierCommand, BarrierPhase, LoadError, SceneLoader};
use curtain_effect::{CoverSurface, EffectRegistry, PlayerPhase};
use curtain_protocol::{
    EffectIndex, Envelope, PROTOCOL_VERSION, ParticipantId, Recipient,
    ResourceId, Signal,
};
use curtain_session::{
    ControllerOutput, ParticipantRoster, RosterEvent, RosterGuard,
    SessionController, SessionError,
};
use curtain_tick::TickScheduler;
use curtain_transport::{SignalChannel, SignalListener};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::{CurtainError, NodeConfig};

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

pub(crate) enum NodeCommand {
    RequestTransition {
        resource: ResourceId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    RequestEffectChange(EffectIndex),
    Shutdown,
}

/// Control handle for a running [`AuthorityNode`]. Cheap to clone.
#[derive(Clone)]
pub struct AuthorityHandle {
    commands: mpsc::UnboundedSender<NodeCommand>,
    player_phase: watch::Receiver<PlayerPhase>,
    barrier_phase: watch::Receiver<BarrierPhase>,
}

impl AuthorityHandle {
    /// Starts a transition to `resource`.
    ///
    /// Returns the coordinator's decision: `Err(SessionInFlight)` means
    /// another transition is open and this one was dropped. Retrying is
    /// the caller's responsibility — the protocol never retries.
    pub async fn request_transition(
        &self,
        resource: impl Into<String>,
    ) -> Result<(), CurtainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(NodeCommand::RequestTransition {
                resource: ResourceId::new(resource),
                reply: reply_tx,
            })
            .map_err(|_| CurtainError::NodeGone)?;
        reply_rx
            .await
            .map_err(|_| CurtainError::NodeGone)?
            .map_err(CurtainError::Session)
    }

    /// Asks every participant to use `index` for the next transition.
    /// Invalid indexes are dropped by the validation path; this only
    /// reports whether the node is still running.
    pub fn request_effect_change(
        &self,
        index: EffectIndex,
    ) -> Result<(), CurtainError> {
        self.commands
            .send(NodeCommand::RequestEffectChange(index))
            .map_err(|_| CurtainError::NodeGone)
    }

    /// Stops the node's event loop.
    pub fn shutdown(&self) -> Result<(), CurtainError> {
        self.commands
            .send(NodeCommand::Shutdown)
            .map_err(|_| CurtainError::NodeGone)
    }

    /// Watches the authority's own player phase.
    pub fn player_phase(&self) -> watch::Receiver<PlayerPhase> {
        self.player_phase.clone()
    }

    /// Watches the coordinator's barrier phase.
    pub fn barrier_phase(&self) -> watch::Receiver<BarrierPhase> {
        self.barrier_phase.clone()
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// The authority node.
///
/// Owns the accept loop, the participant roster, the authority's own
/// [`SessionController`] (coordinator included), and the scene loader.
/// Everything protocol-visible is mutated from the single event loop in
/// [`run`](Self::run) — the node is "single-threaded cooperative" even
/// though connection readers run as separate tasks, because readers only
/// forward signals into the loop.
pub struct AuthorityNode<L: SignalListener, D: SceneLoader> {
    listener: L,
    loader: Arc<D>,
    controller: SessionController,
    roster: ParticipantRoster,
    roster_events: mpsc::UnboundedReceiver<RosterEvent>,
    config: NodeConfig,
    surface: Option<Box<dyn CoverSurface + Send>>,
    commands: mpsc::UnboundedReceiver<NodeCommand>,
    player_phase: watch::Sender<PlayerPhase>,
    barrier_phase: watch::Sender<BarrierPhase>,
    /// Guard for the authority's own participation; held for the node's
    /// lifetime so the authority counts in every barrier.
    _self_guard: RosterGuard,
}

impl<L: SignalListener, D: SceneLoader> AuthorityNode<L, D> {
    /// Creates an authority node and its control handle.
    ///
    /// The authority registers itself as the first participant — it
    /// plays the transition and acknowledges like everyone else.
    pub fn new(
        listener: L,
        loader: D,
        registry: Arc<EffectRegistry>,
        config: NodeConfig,
    ) -> (Self, AuthorityHandle) {
        let (mut roster, roster_events) = ParticipantRoster::new();
        let (me, self_guard) = roster.register();
        let mut controller = SessionController::authority(me, registry);
        // Count the authority in immediately — a transition requested
        // before the first loop iteration must still include it. The
        // queued Joined event is an idempotent repeat.
        controller.participant_joined(me);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (player_phase_tx, player_phase_rx) =
            watch::channel(PlayerPhase::Idle);
        let (barrier_phase_tx, barrier_phase_rx) =
            watch::channel(BarrierPhase::Idle);

        let node = Self {
            listener,
            loader: Arc::new(loader),
            controller,
            roster,
            roster_events,
            config,
            surface: None,
            commands: commands_rx,
            player_phase: player_phase_tx,
            barrier_phase: barrier_phase_tx,
            _self_guard: self_guard,
        };
        let handle = AuthorityHandle {
            commands: commands_tx,
            player_phase: player_phase_rx,
            barrier_phase: barrier_phase_rx,
        };
        (node, handle)
    }

    /// Attaches the cover surface the authority's own effect draws on.
    /// Without one, playback degenerates to timing-free completion.
    pub fn with_surface(
        mut self,
        surface: Box<dyn CoverSurface + Send>,
    ) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Runs the node until [`AuthorityHandle::shutdown`].
    pub async fn run(self) -> Result<(), CurtainError> {
        let Self {
            listener,
            loader,
            controller,
            roster,
            mut roster_events,
            config,
            surface,
            mut commands,
            player_phase,
            barrier_phase,
            _self_guard,
        } = self;

        let mut scheduler = TickScheduler::new(config.tick.clone());
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        let (joined_tx, mut joined_rx) = mpsc::unbounded_channel();

        spawn_accept_loop(
            listener,
            joined_tx,
            Duration::from_secs(config.handshake_timeout_secs),
        );

        let mut state = LoopState {
            controller,
            roster,
            loader,
            channels: HashMap::new(),
            in_flight_load: None,
            inbound_tx,
            surface,
            seq: 0,
            started: Instant::now(),
        };

        tracing::info!("authority node running");

        loop {
            tokio::select! {
                Some(channel) = joined_rx.recv() => {
                    state.admit(channel).await;
                }

                Some(event) = roster_events.recv() => {
                    match event {
                        RosterEvent::Joined(p) => {
                            state.controller.participant_joined(p);
                        }
                        RosterEvent::Left(p) => {
                            state.channels.remove(&p);
                            tracing::info!(participant = %p, "participant left");
                            let output = state.controller.participant_left(p);
                            state.process(output).await;
                        }
                    }
                }

                Some((participant, signal)) = inbound_rx.recv() => {
                    let output =
                        state.controller.handle_signal(Some(participant), signal);
                    state.process(output).await;
                }

                Some(command) = commands.recv() => {
                    match command {
                        NodeCommand::RequestTransition { resource, reply } => {
                            match state.controller.request_transition(resource) {
                                Ok(output) => {
                                    let _ = reply.send(Ok(()));
                                    state.process(output).await;
                                }
                                Err(e) => {
                                    let _ = reply.send(Err(e));
                                }
                            }
                        }
                        NodeCommand::RequestEffectChange(index) => {
                            let output =
                                state.controller.request_effect_change(index);
                            state.process(output).await;
                        }
                        NodeCommand::Shutdown => {
                            tracing::info!("authority shutting down");
                            break;
                        }
                    }
                }

                tick = scheduler.wait_for_tick() => {
                    let output = state.tick(tick.dt);
                    state.process(output).await;
                }

                result = async {
                    state.in_flight_load.as_mut().unwrap().await
                }, if state.in_flight_load.is_some() => {
                    state.in_flight_load = None;
                    let output = match result {
                        Ok(Ok(())) => state.controller.load_complete(),
                        Ok(Err(e)) => state.controller.load_failed(&e),
                        Err(join_error) => {
                            state.controller.load_failed(&LoadError::StageFailed(
                                join_error.to_string(),
                            ))
                        }
                    };
                    state.process(output).await;
                }
            }

            publish_phase(&player_phase, state.controller.player().phase());
            publish_phase(
                &barrier_phase,
                state
                    .controller
                    .coordinator()
                    .expect("authority controller hosts a coordinator")
                    .phase(),
            );
        }

        Ok(())
    }
}

fn publish_phase<T: PartialEq + Copy>(tx: &watch::Sender<T>, current: T) {
    tx.send_if_modified(|seen| {
        if *seen != current {
            *seen = current;
            true
        } else {
            false
        }
    });
}

// ---------------------------------------------------------------------------
// Accept + handshake
// ---------------------------------------------------------------------------

/// Accepts channels and hands the validated ones to the event loop.
///
/// Each handshake runs in its own task so a silent dialer can't hold up
/// the accept loop. A listener error ends the accept loop — already
/// admitted participants keep running.
fn spawn_accept_loop<L: SignalListener>(
    mut listener: L,
    joined_tx: mpsc::UnboundedSender<Arc<L::Channel>>,
    handshake_timeout: Duration,
) {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok(channel) => {
                    let channel = Arc::new(channel);
                    let joined_tx = joined_tx.clone();
                    tokio::spawn(async move {
                        match await_join(&*channel, handshake_timeout).await {
                            Ok(()) => {
                                let _ = joined_tx.send(channel);
                            }
                            Err(e) => {
                                tracing::debug!(
                                    channel = %channel.id(),
                                    error = %e,
                                    "handshake failed"
                                );
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed — no further joins");
                    break;
                }
            }
        }
    });
}

/// Waits for the channel's `Join` and validates its version.
async fn await_join<C: SignalChannel>(
    channel: &C,
    timeout: Duration,
) -> Result<(), CurtainError> {
    let envelope = tokio::time::timeout(timeout, channel.recv())
        .await
        .map_err(|_| {
            curtain_protocol::ProtocolError::InvalidSignal(
                "handshake timed out".into(),
            )
        })??
        .ok_or_else(|| {
            curtain_transport::ChannelError::Closed(
                "closed before handshake".into(),
            )
        })?;

    match envelope.signal {
        Signal::Join { version } if version == PROTOCOL_VERSION => Ok(()),
        Signal::Join { version } => {
            let reason = format!(
                "version mismatch: expected {PROTOCOL_VERSION}, got {version}"
            );
            let _ = channel
                .send(&Envelope {
                    seq: 0,
                    timestamp: 0,
                    signal: Signal::Disconnect {
                        reason: reason.clone(),
                    },
                })
                .await;
            Err(curtain_protocol::ProtocolError::InvalidSignal(reason).into())
        }
        _ => Err(curtain_protocol::ProtocolError::InvalidSignal(
            "first signal must be Join".into(),
        )
        .into()),
    }
}

// ---------------------------------------------------------------------------
// Event-loop state
// ---------------------------------------------------------------------------

/// Everything the event-loop handlers mutate. Kept separate from the
/// select!'d futures (scheduler, receivers) so the branches borrow
/// disjoint state.
struct LoopState<C: SignalChannel, D: SceneLoader> {
    controller: SessionController,
    roster: ParticipantRoster,
    loader: Arc<D>,
    channels: HashMap<ParticipantId, Arc<C>>,
    in_flight_load: Option<JoinHandle<Result<(), LoadError>>>,
    inbound_tx: mpsc::UnboundedSender<(ParticipantId, Signal)>,
    surface: Option<Box<dyn CoverSurface + Send>>,
    seq: u64,
    started: Instant,
}

impl<C: SignalChannel, D: SceneLoader> LoopState<C, D> {
    /// Registers a handshook channel: assign an id, welcome it, spawn
    /// its reader.
    async fn admit(&mut self, channel: Arc<C>) {
        let (participant, guard) = self.roster.register();
        // Count the participant before its Welcome goes out, so a
        // transition requested in the next iteration already includes
        // it. The queued Joined event is an idempotent repeat.
        self.controller.participant_joined(participant);

        let welcome = self.wrap(Signal::Welcome { participant });
        if let Err(e) = channel.send(&welcome).await {
            tracing::debug!(%participant, error = %e, "welcome failed");
            // Dropping the guard emits the matching Left event.
            return;
        }

        spawn_reader(
            Arc::clone(&channel),
            participant,
            guard,
            self.inbound_tx.clone(),
        );
        self.channels.insert(participant, channel);
        tracing::info!(%participant, "participant joined");
    }

    fn tick(&mut self, dt: Duration) -> ControllerOutput {
        let surface = self
            .surface
            .as_deref_mut()
            .map(|s| s as &mut dyn CoverSurface);
        self.controller.tick(dt, surface)
    }

    /// Carries out a controller output: local feedback, remote fan-out,
    /// and load commands. Locally fed-back broadcasts may produce more
    /// output (the authority's own ack can close the barrier), so this
    /// drains a queue.
    async fn process(&mut self, output: ControllerOutput) {
        let mut queue = VecDeque::from([output]);

        while let Some(output) = queue.pop_front() {
            debug_assert!(
                output.upstream.is_empty(),
                "the authority has no upstream"
            );

            if let Some(BarrierCommand::BeginLoad(resource)) = output.command
            {
                self.begin_load(resource);
            }

            for (recipient, signal) in output.fanout {
                // The authority is a participant too: feed broadcasts
                // back into its own controller.
                let me = self.controller.participant();
                if includes(&recipient, me) {
                    let fed =
                        self.controller.handle_signal(None, signal.clone());
                    queue.push_back(fed);
                }

                let envelope = self.wrap(signal);
                for (participant, channel) in &self.channels {
                    if includes(&recipient, *participant) {
                        if let Err(e) = channel.send(&envelope).await {
                            // The reader task sees the same failure and
                            // reaps the participant.
                            tracing::debug!(
                                %participant,
                                error = %e,
                                "send failed"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Stages and activates `resource` off the event loop.
    fn begin_load(&mut self, resource: ResourceId) {
        debug_assert!(
            self.in_flight_load.is_none(),
            "coordinator never overlaps loads"
        );
        tracing::info!(%resource, "load starting");

        let loader = Arc::clone(&self.loader);
        self.in_flight_load = Some(tokio::spawn(async move {
            let staged = loader.stage(&resource).await?;
            loader.activate(staged).await
        }));
    }

    fn wrap(&mut self, signal: Signal) -> Envelope {
        self.seq += 1;
        Envelope {
            seq: self.seq,
            timestamp: self.started.elapsed().as_millis() as u64,
            signal,
        }
    }
}

fn includes(recipient: &Recipient, participant: ParticipantId) -> bool {
    match recipient {
        Recipient::All => true,
        Recipient::Only(p) => *p == participant,
        Recipient::AllExcept(p) => *p != participant,
    }
}

/// Forwards a channel's inbound signals into the event loop. Holds the
/// participant's roster guard: any exit — clean close, transport error,
/// or node shutdown — deregisters the participant.
fn spawn_reader<C: SignalChannel>(
    channel: Arc<C>,
    participant: ParticipantId,
    guard: RosterGuard,
    inbound_tx: mpsc::UnboundedSender<(ParticipantId, Signal)>,
) {
    tokio::spawn(async move {
        let _guard = guard;
        loop {
            match channel.recv().await {
                Ok(Some(envelope)) => {
                    if inbound_tx
                        .send((participant, envelope.signal))
                        .is_err()
                    {
                        break; // node loop is gone
                    }
                }
                Ok(None) => {
                    tracing::debug!(%participant, "channel closed");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%participant, error = %e, "channel failed");
                    break;
                }
            }
        }
    });
}

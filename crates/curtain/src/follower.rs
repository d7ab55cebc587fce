//! The follower node: one channel to the authority, one local player.

use std::sync::Arc;
use std::time::Instant;

use curtain_effect::{CoverSurface, EffectRegistry, PlayerPhase};
use curtain_protocol::{
    EffectIndex, Envelope, PROTOCOL_VERSION, ParticipantId, ResourceId,
    Signal,
};
use curtain_session::{ControllerOutput, SessionController};
use curtain_tick::TickScheduler;
use curtain_transport::{ChannelError, SignalChannel};
use tokio::sync::{mpsc, oneshot, watch};

use crate::{CurtainError, NodeConfig};

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum FollowerCommand {
    RequestTransition {
        resource: ResourceId,
        reply: oneshot::Sender<Result<(), CurtainError>>,
    },
    RequestEffectChange(EffectIndex),
    Shutdown,
}

/// Control handle for a running [`FollowerNode`]. Cheap to clone.
#[derive(Clone)]
pub struct FollowerHandle {
    participant: ParticipantId,
    commands: mpsc::UnboundedSender<FollowerCommand>,
    player_phase: watch::Receiver<PlayerPhase>,
}

impl FollowerHandle {
    /// This node's authority-assigned id.
    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// Asks the authority to start a transition to `resource`.
    ///
    /// `Ok` means the request was *sent*. Whether it is accepted is the
    /// authority's call — a request arriving while a transition is open
    /// is dropped there, per protocol, with no answer.
    pub async fn request_transition(
        &self,
        resource: impl Into<String>,
    ) -> Result<(), CurtainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(FollowerCommand::RequestTransition {
                resource: ResourceId::new(resource),
                reply: reply_tx,
            })
            .map_err(|_| CurtainError::NodeGone)?;
        reply_rx.await.map_err(|_| CurtainError::NodeGone)?
    }

    /// Asks the authority to make `index` everyone's active effect.
    pub fn request_effect_change(
        &self,
        index: EffectIndex,
    ) -> Result<(), CurtainError> {
        self.commands
            .send(FollowerCommand::RequestEffectChange(index))
            .map_err(|_| CurtainError::NodeGone)
    }

    /// Stops the node's event loop.
    pub fn shutdown(&self) -> Result<(), CurtainError> {
        self.commands
            .send(FollowerCommand::Shutdown)
            .map_err(|_| CurtainError::NodeGone)
    }

    /// Watches this node's player phase.
    pub fn player_phase(&self) -> watch::Receiver<PlayerPhase> {
        self.player_phase.clone()
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A follower node: joins an authority over any [`SignalChannel`],
/// plays its local transition on that authority's broadcasts, and
/// acknowledges when covered.
pub struct FollowerNode<C: SignalChannel> {
    channel: Arc<C>,
    controller: SessionController,
    config: NodeConfig,
    surface: Option<Box<dyn CoverSurface + Send>>,
    commands: mpsc::UnboundedReceiver<FollowerCommand>,
    player_phase: watch::Sender<PlayerPhase>,
    seq: u64,
    started: Instant,
}

impl<C: SignalChannel> FollowerNode<C> {
    /// Performs the membership handshake and builds the node.
    ///
    /// Sends `Join`, waits for the authority's `Welcome`, and adopts the
    /// assigned participant id. The `registry` must match the
    /// authority's — same effects, same order — or effect indexes mean
    /// different things on different screens.
    pub async fn join(
        channel: C,
        registry: Arc<EffectRegistry>,
        config: NodeConfig,
    ) -> Result<(Self, FollowerHandle), CurtainError> {
        let started = Instant::now();
        let mut seq = 0u64;

        seq += 1;
        channel
            .send(&Envelope {
                seq,
                timestamp: 0,
                signal: Signal::Join {
                    version: PROTOCOL_VERSION,
                },
            })
            .await?;

        let participant = match channel.recv().await? {
            Some(Envelope {
                signal: Signal::Welcome { participant },
                ..
            }) => participant,
            Some(Envelope {
                signal: Signal::Disconnect { reason },
                ..
            }) => {
                return Err(curtain_protocol::ProtocolError::InvalidSignal(
                    format!("join rejected: {reason}"),
                )
                .into());
            }
            Some(_) => {
                return Err(curtain_protocol::ProtocolError::InvalidSignal(
                    "expected Welcome".into(),
                )
                .into());
            }
            None => {
                return Err(ChannelError::Closed(
                    "closed during handshake".into(),
                )
                .into());
            }
        };

        tracing::info!(%participant, "joined authority");

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (player_phase_tx, player_phase_rx) =
            watch::channel(PlayerPhase::Idle);

        let node = Self {
            channel: Arc::new(channel),
            controller: SessionController::follower(participant, registry),
            config,
            surface: None,
            commands: commands_rx,
            player_phase: player_phase_tx,
            seq,
            started,
        };
        let handle = FollowerHandle {
            participant,
            commands: commands_tx,
            player_phase: player_phase_rx,
        };
        Ok((node, handle))
    }

    /// Attaches the cover surface this node's effects draw on.
    pub fn with_surface(
        mut self,
        surface: Box<dyn CoverSurface + Send>,
    ) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Runs the node until the authority disconnects or
    /// [`FollowerHandle::shutdown`].
    pub async fn run(self) -> Result<(), CurtainError> {
        let Self {
            channel,
            mut controller,
            config,
            mut surface,
            mut commands,
            player_phase,
            mut seq,
            started,
        } = self;

        let mut scheduler = TickScheduler::new(config.tick.clone());

        tracing::info!(participant = %controller.participant(), "follower node running");

        let result = loop {
            tokio::select! {
                received = channel.recv() => {
                    match received {
                        Ok(Some(envelope)) => {
                            if let Signal::Disconnect { reason } = &envelope.signal {
                                tracing::info!(%reason, "authority disconnected us");
                                break Ok(());
                            }
                            let output =
                                controller.handle_signal(None, envelope.signal);
                            send_upstream(
                                &*channel, output, &mut seq, &started,
                            )
                            .await;
                        }
                        Ok(None) => {
                            tracing::info!("authority channel closed");
                            break Ok(());
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "authority channel failed");
                            break Err(CurtainError::Channel(e));
                        }
                    }
                }

                Some(command) = commands.recv() => {
                    match command {
                        FollowerCommand::RequestTransition { resource, reply } => {
                            let envelope = wrap(
                                &mut seq,
                                &started,
                                Signal::RequestTransition { resource },
                            );
                            let sent = channel
                                .send(&envelope)
                                .await
                                .map_err(CurtainError::Channel);
                            let _ = reply.send(sent);
                        }
                        FollowerCommand::RequestEffectChange(index) => {
                            let output = controller.request_effect_change(index);
                            send_upstream(
                                &*channel, output, &mut seq, &started,
                            )
                            .await;
                        }
                        FollowerCommand::Shutdown => {
                            tracing::info!("follower shutting down");
                            let _ = channel.close().await;
                            break Ok(());
                        }
                    }
                }

                tick = scheduler.wait_for_tick() => {
                    let output = controller.tick(
                        tick.dt,
                        surface.as_deref_mut().map(|s| s as &mut dyn CoverSurface),
                    );
                    send_upstream(&*channel, output, &mut seq, &started).await;
                }
            }

            player_phase.send_if_modified(|seen| {
                let current = controller.player().phase();
                if *seen != current {
                    *seen = current;
                    true
                } else {
                    false
                }
            });
        };

        result
    }
}

fn wrap(seq: &mut u64, started: &Instant, signal: Signal) -> Envelope {
    *seq += 1;
    Envelope {
        seq: *seq,
        timestamp: started.elapsed().as_millis() as u64,
        signal,
    }
}

/// Delivers a follower controller's output: everything goes up the one
/// channel. Send failures are logged; the recv branch sees the broken
/// channel and ends the node.
async fn send_upstream<C: SignalChannel>(
    channel: &C,
    output: ControllerOutput,
    seq: &mut u64,
    started: &Instant,
) {
    debug_assert!(output.fanout.is_empty(), "followers never fan out");
    debug_assert!(output.command.is_none(), "followers never load");

    for signal in output.upstream {
        let envelope = wrap(seq, started, signal);
        if let Err(e) = channel.send(&envelope).await {
            tracing::debug!(error = %e, "upstream send failed");
        }
    }
}

//! Area actor: an isolated Tokio task that owns one area.
//!
//! The area's operations need exclusive access, so concurrent callers go
//! through a command channel instead of a lock. Each command carries a
//! oneshot reply channel; the actor runs commands one at a time, in
//! arrival order. With a `sync_interval` configured, the actor also
//! reconciles with the ledger in the gaps between commands.

use std::future::pending;
use std::ops::ControlFlow;
use std::time::Duration;

use realm_group::BroadcastGroup;
use realm_ledger::OwnershipLedger;
use realm_protocol::{AreaDocument, AreaId, ConnectionId, Message, NotifyTarget, PlayerId, Route};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use crate::{Area, AreaError, AreaInfo, AreaLogic, QuitOptions, SaveReport, SyncReport};

type Reply<T> = oneshot::Sender<Result<T, AreaError>>;

/// Commands sent to an area actor through its channel.
pub(crate) enum AreaCommand {
    Start { reply: Reply<()> },
    Stop { reply: Reply<()> },
    Serialize { reply: Reply<(AreaDocument, SaveReport)> },
    Deserialize { document: AreaDocument, reply: Reply<usize> },
    Destroy { reply: Reply<()> },
    Join { player_id: PlayerId, reply: Reply<()> },
    Quit { player_id: PlayerId, options: QuitOptions, reply: Reply<()> },
    Sync { reply: Reply<SyncReport> },
    SavePlayers { reply: Reply<SaveReport> },
    Connect { player_id: PlayerId, connection: ConnectionId, reply: Reply<usize> },
    Disconnect { player_id: PlayerId, reply: Reply<usize> },
    Notify { target: NotifyTarget, route: Route, message: Message, reply: Reply<()> },
    HasPlayer { player_id: PlayerId, reply: oneshot::Sender<bool> },
    PlayerIds { reply: oneshot::Sender<Vec<PlayerId>> },
    Info { reply: oneshot::Sender<AreaInfo> },
    Shutdown,
}

/// Handle to a running area actor.
///
/// Cheap to clone: it's an `mpsc::Sender` and the area's id. Every
/// method fails with [`AreaError::Unavailable`] once the actor has shut
/// down.
#[derive(Debug, Clone)]
pub struct AreaHandle {
    area_id: AreaId,
    sender: mpsc::Sender<AreaCommand>,
}

impl AreaHandle {
    pub fn area_id(&self) -> &AreaId {
        &self.area_id
    }

    /// See [`Area::start`].
    pub async fn start(&self) -> Result<(), AreaError> {
        self.request(|reply| AreaCommand::Start { reply }).await?
    }

    /// See [`Area::stop`].
    pub async fn stop(&self) -> Result<(), AreaError> {
        self.request(|reply| AreaCommand::Stop { reply }).await?
    }

    /// See [`Area::serialize`]. Returns the document the area wrote.
    pub async fn serialize(&self) -> Result<(AreaDocument, SaveReport), AreaError> {
        self.request(|reply| AreaCommand::Serialize { reply }).await?
    }

    /// See [`Area::deserialize`].
    pub async fn deserialize(&self, document: AreaDocument) -> Result<usize, AreaError> {
        self.request(|reply| AreaCommand::Deserialize { document, reply }).await?
    }

    /// See [`Area::destroy`].
    pub async fn destroy(&self) -> Result<(), AreaError> {
        self.request(|reply| AreaCommand::Destroy { reply }).await?
    }

    /// See [`Area::join`].
    pub async fn join(&self, player_id: PlayerId) -> Result<(), AreaError> {
        self.request(|reply| AreaCommand::Join { player_id, reply }).await?
    }

    /// See [`Area::quit`].
    pub async fn quit(&self, player_id: PlayerId, options: QuitOptions) -> Result<(), AreaError> {
        self.request(|reply| AreaCommand::Quit {
            player_id,
            options,
            reply,
        })
        .await?
    }

    /// See [`Area::sync_acquired_players`].
    pub async fn sync_acquired_players(&self) -> Result<SyncReport, AreaError> {
        self.request(|reply| AreaCommand::Sync { reply }).await?
    }

    /// See [`Area::save_players`].
    pub async fn save_players(&self) -> Result<SaveReport, AreaError> {
        self.request(|reply| AreaCommand::SavePlayers { reply }).await?
    }

    /// See [`Area::connect_player`].
    pub async fn connect_player(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) -> Result<usize, AreaError> {
        self.request(|reply| AreaCommand::Connect {
            player_id,
            connection,
            reply,
        })
        .await?
    }

    /// See [`Area::disconnect_player`].
    pub async fn disconnect_player(&self, player_id: PlayerId) -> Result<usize, AreaError> {
        self.request(|reply| AreaCommand::Disconnect { player_id, reply }).await?
    }

    /// See [`Area::notify`].
    pub async fn notify(
        &self,
        target: impl Into<NotifyTarget>,
        route: impl Into<Route>,
        message: Message,
    ) -> Result<(), AreaError> {
        let (target, route) = (target.into(), route.into());
        self.request(|reply| AreaCommand::Notify {
            target,
            route,
            message,
            reply,
        })
        .await?
    }

    pub async fn has_player(&self, player_id: PlayerId) -> Result<bool, AreaError> {
        self.request(|reply| AreaCommand::HasPlayer { player_id, reply }).await
    }

    /// Held player ids, sorted.
    pub async fn player_ids(&self) -> Result<Vec<PlayerId>, AreaError> {
        self.request(|reply| AreaCommand::PlayerIds { reply }).await
    }

    pub async fn info(&self) -> Result<AreaInfo, AreaError> {
        self.request(|reply| AreaCommand::Info { reply }).await
    }

    /// Stops the actor after the commands already queued. The area is
    /// dropped as it is; stop and evict first to keep the ledger clean.
    pub async fn shutdown(&self) -> Result<(), AreaError> {
        self.sender
            .send(AreaCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }

    /// Returns `true` once the actor has exited.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> AreaCommand,
    ) -> Result<T, AreaError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> AreaError {
        AreaError::Unavailable(format!("area {} is not running an actor", self.area_id))
    }
}

/// The actor state. Runs inside a Tokio task.
struct AreaActor<A: AreaLogic, L, B> {
    area: Area<A, L, B>,
    area_id: AreaId,
    receiver: mpsc::Receiver<AreaCommand>,
    sync_interval: Option<Duration>,
}

impl<A, L, B> AreaActor<A, L, B>
where
    A: AreaLogic,
    L: OwnershipLedger,
    B: BroadcastGroup,
{
    async fn run(mut self) {
        tracing::info!(area_id = %self.area_id, "area actor started");

        let mut ticker = self.sync_interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        loop {
            tokio::select! {
                command = self.receiver.recv() => {
                    let Some(command) = command else { break };
                    if self.handle(command).await.is_break() {
                        break;
                    }
                }
                _ = next_tick(&mut ticker) => self.periodic_sync().await,
            }
        }

        tracing::info!(area_id = %self.area_id, state = %self.area.state(), "area actor stopped");
    }

    async fn handle(&mut self, command: AreaCommand) -> ControlFlow<()> {
        let area = &mut self.area;
        match command {
            AreaCommand::Start { reply } => {
                let _ = reply.send(area.start().await);
            }
            AreaCommand::Stop { reply } => {
                let _ = reply.send(area.stop().await);
            }
            AreaCommand::Serialize { reply } => {
                let mut document = AreaDocument::new();
                let result = area.serialize(&mut document).await;
                let _ = reply.send(result.map(|report| (document, report)));
            }
            AreaCommand::Deserialize { document, reply } => {
                let _ = reply.send(area.deserialize(&document).await);
            }
            AreaCommand::Destroy { reply } => {
                let _ = reply.send(area.destroy().await);
            }
            AreaCommand::Join { player_id, reply } => {
                let _ = reply.send(area.join(player_id).await);
            }
            AreaCommand::Quit {
                player_id,
                options,
                reply,
            } => {
                let _ = reply.send(area.quit(&player_id, options).await);
            }
            AreaCommand::Sync { reply } => {
                let _ = reply.send(area.sync_acquired_players().await);
            }
            AreaCommand::SavePlayers { reply } => {
                let _ = reply.send(area.save_players().await);
            }
            AreaCommand::Connect {
                player_id,
                connection,
                reply,
            } => {
                let _ = reply.send(area.connect_player(&player_id, connection).await);
            }
            AreaCommand::Disconnect { player_id, reply } => {
                let _ = reply.send(area.disconnect_player(&player_id).await);
            }
            AreaCommand::Notify {
                target,
                route,
                message,
                reply,
            } => {
                let _ = reply.send(area.notify(target, route, message).await);
            }
            AreaCommand::HasPlayer { player_id, reply } => {
                let _ = reply.send(area.has_player(&player_id));
            }
            AreaCommand::PlayerIds { reply } => {
                let _ = reply.send(area.player_ids());
            }
            AreaCommand::Info { reply } => {
                let _ = reply.send(area.info());
            }
            AreaCommand::Shutdown => {
                tracing::info!(area_id = %self.area_id, "area actor shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn periodic_sync(&mut self) {
        if !self.area.state().is_running() {
            return;
        }
        if let Err(e) = self.area.sync_acquired_players().await {
            tracing::warn!(area_id = %self.area_id, error = %e, "periodic reconciliation failed");
        }
    }
}

// Without a ticker this never completes, leaving the select to commands.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

/// Moves an initialized area into its own task and returns a handle to
/// it.
///
/// The command channel is bounded by the area's `channel_size`; senders
/// wait when it fills up. Fails with
/// [`InvalidState`](AreaError::InvalidState) if the area has no identity
/// yet.
pub fn spawn_area<A, L, B>(area: Area<A, L, B>) -> Result<AreaHandle, AreaError>
where
    A: AreaLogic,
    L: OwnershipLedger,
    B: BroadcastGroup,
{
    let Some(area_id) = area.area_id().cloned() else {
        return Err(AreaError::InvalidState {
            operation: "spawn",
            state: area.state(),
        });
    };
    let config = area.config();
    let (tx, rx) = mpsc::channel(config.channel_size);
    let sync_interval = config.sync_interval;

    let actor = AreaActor {
        area,
        area_id: area_id.clone(),
        receiver: rx,
        sync_interval,
    };
    tokio::spawn(actor.run());

    Ok(AreaHandle {
        area_id,
        sender: tx,
    })
}

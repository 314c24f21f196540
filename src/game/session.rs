//! Session actor: the single serialized owner of all live-match state

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::store::LeaderboardStore;
use crate::ws::protocol::{ClientMsg, HitClaim, ScoreMap, ServerMsg};

use super::broadcast::{EventBroadcaster, OUTBOUND_BUFFER};
use super::combat::HitArbiter;
use super::lifecycle::{MatchLifecycle, MatchPhase};
use super::registry::ConnectionRegistry;
use super::{ConnectionId, Scheduler, SessionCommand};

/// Inbound queue capacity
const COMMAND_BUFFER: usize = 1024;

/// Point-in-time view of the session, for health checks
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: MatchPhase,
    pub population: usize,
    pub connections: usize,
    pub seconds_remaining: Option<u64>,
}

/// Handle used by connections to talk to the session actor
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Open a connection. Events addressed to it arrive on the returned
    /// receiver.
    pub async fn connect(&self, connection_id: ConnectionId) -> Option<mpsc::Receiver<ServerMsg>> {
        let (outbound, rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.tx
            .send(SessionCommand::Connect {
                connection_id,
                outbound,
            })
            .await
            .ok()?;
        Some(rx)
    }

    /// Forward a client message. Returns false if the session is gone.
    pub async fn client_message(&self, connection_id: ConnectionId, msg: ClientMsg) -> bool {
        self.tx
            .send(SessionCommand::Client {
                connection_id,
                msg,
            })
            .await
            .is_ok()
    }

    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let _ = self
            .tx
            .send(SessionCommand::Disconnect { connection_id })
            .await;
    }

    pub async fn status(&self) -> Option<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(SessionCommand::Status { reply }).await.ok()?;
        rx.await.ok()
    }
}

/// The session actor. Every handler runs to completion before the next
/// command is taken, so the tables need no locking.
pub struct SessionActor {
    rx: mpsc::Receiver<SessionCommand>,
    registry: ConnectionRegistry,
    broadcaster: EventBroadcaster,
    arbiter: HitArbiter,
    lifecycle: MatchLifecycle,
    store: Arc<dyn LeaderboardStore>,
}

impl SessionActor {
    /// Create the actor and its handle. `seed` drives spawn positions.
    pub fn new(
        rules: &SessionConfig,
        store: Arc<dyn LeaderboardStore>,
        seed: u64,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let scheduler = Scheduler::new(&tx);

        let actor = Self {
            rx,
            registry: ConnectionRegistry::new(seed),
            broadcaster: EventBroadcaster::new(),
            arbiter: HitArbiter::new(rules.respawn_delay, scheduler.clone()),
            lifecycle: MatchLifecycle::new(rules.min_players, rules.match_duration, scheduler),
            store,
        };

        (actor, SessionHandle { tx })
    }

    /// Process commands until every handle is dropped
    pub async fn run(mut self) {
        info!(
            min_players = self.lifecycle.min_players(),
            "Session actor started"
        );

        while let Some(command) = self.rx.recv().await {
            self.handle(command);
        }

        info!("Session actor stopped");
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect {
                connection_id,
                outbound,
            } => {
                self.broadcaster.add(connection_id, outbound);
                debug!(
                    connection_id = %connection_id,
                    connections = self.broadcaster.connection_count(),
                    "Connection opened"
                );
            }
            SessionCommand::Client { connection_id, msg } => {
                self.handle_client(connection_id, msg)
            }
            SessionCommand::Disconnect { connection_id } => self.handle_disconnect(connection_id),
            SessionCommand::RespawnDue { name, ticket } => {
                self.arbiter
                    .complete_respawn(&mut self.registry, &self.broadcaster, &name, ticket);
            }
            SessionCommand::DeadlineDue { generation } => {
                if self.lifecycle.on_deadline(generation) {
                    self.conclude_match();
                }
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(SessionStatus {
                    phase: self.lifecycle.phase(),
                    population: self.registry.population_count(),
                    connections: self.broadcaster.connection_count(),
                    seconds_remaining: self.lifecycle.remaining().map(|d| d.as_secs()),
                });
            }
        }
    }

    fn handle_client(&mut self, connection_id: ConnectionId, msg: ClientMsg) {
        match msg {
            ClientMsg::CheckName(name) => {
                let taken = self.registry.is_name_taken(&name);
                self.broadcaster
                    .unicast(connection_id, ServerMsg::CheckName { name, taken });
            }
            ClientMsg::Register(name) => self.handle_register(connection_id, &name),
            ClientMsg::UpdatePosition(pos) => {
                self.registry
                    .update_position(connection_id, pos.x, pos.y, &self.broadcaster);
            }
            ClientMsg::Shoot(bullet) => {
                let Some(name) = self.registry.name_of(connection_id) else {
                    return;
                };
                if !self.registry.is_alive(name) {
                    return;
                }
                self.broadcaster.broadcast_all(&ServerMsg::Shoot {
                    bullet,
                    name: name.to_string(),
                });
            }
            ClientMsg::Hit(HitClaim { shooter, target }) => {
                debug!(
                    connection_id = %connection_id,
                    shooter = %shooter,
                    target = %target,
                    "Hit claim"
                );
                self.arbiter
                    .resolve_hit(&mut self.registry, &self.broadcaster, &shooter, &target);
            }
        }
    }

    fn handle_register(&mut self, connection_id: ConnectionId, name: &str) {
        match self.registry.register(connection_id, name, &self.broadcaster) {
            Ok(_) => {
                self.lifecycle
                    .on_registered(self.registry.population_count());
            }
            Err(rejection) => {
                warn!(
                    connection_id = %connection_id,
                    name = %name,
                    reason = %rejection,
                    "Registration rejected"
                );
                self.broadcaster.unicast(
                    connection_id,
                    ServerMsg::error(rejection.code(), rejection.to_string()),
                );
            }
        }
    }

    fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        self.broadcaster.remove(connection_id);

        let Some(name) = self.registry.unbind(connection_id) else {
            debug!(connection_id = %connection_id, "Unregistered connection closed");
            return;
        };

        self.registry.remove(&name);
        self.broadcaster
            .broadcast_all(&ServerMsg::PlayerLeft(name.clone()));

        let population = self.registry.population_count();
        info!(name = %name, population, "Player left");

        self.lifecycle.on_departed(population);
    }

    /// Deadline path: persist, announce, reset
    fn conclude_match(&mut self) {
        let scores = self.registry.scores().clone();
        let players = self.registry.players().clone();

        self.persist_scores(scores.clone());
        self.broadcaster
            .broadcast_all(&ServerMsg::GameOver { scores, players });
        self.registry.clear();
    }

    /// Max-merge every final score. Rows are independent, so the writes
    /// run concurrently and off the actor.
    fn persist_scores(&self, scores: ScoreMap) {
        if scores.is_empty() {
            return;
        }

        let writes: Vec<_> = scores
            .into_iter()
            .map(|(name, score)| {
                let write = self.store.upsert_max(name.clone(), score);
                async move {
                    if let Err(e) = write.await {
                        error!(name = %name, score, error = %e, "Failed to persist score");
                    }
                }
            })
            .collect();

        let count = writes.len();
        tokio::spawn(async move {
            join_all(writes).await;
            info!(count, "Final scores persisted");
        });
    }
}

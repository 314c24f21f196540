//! Authoritative session: registry, fan-out, hit arbitration and match lifecycle

pub mod arena;
pub mod broadcast;
pub mod combat;
pub mod lifecycle;
pub mod registry;
pub mod session;

pub use lifecycle::MatchPhase;
pub use session::{SessionActor, SessionHandle, SessionStatus};

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Identifies one WebSocket connection for its lifetime
pub type ConnectionId = Uuid;

/// Everything the session actor processes, one at a time
#[derive(Debug)]
pub enum SessionCommand {
    /// A socket opened; events for it go to `outbound`
    Connect {
        connection_id: ConnectionId,
        outbound: mpsc::Sender<ServerMsg>,
    },

    /// A parsed client message
    Client {
        connection_id: ConnectionId,
        msg: ClientMsg,
    },

    /// A socket closed
    Disconnect { connection_id: ConnectionId },

    /// Respawn delay for the hit that issued `ticket` elapsed
    RespawnDue { name: String, ticket: u64 },

    /// Match deadline elapsed for the match started as `generation`
    DeadlineDue { generation: u64 },

    /// Read-only status query
    Status { reply: oneshot::Sender<SessionStatus> },
}

/// Schedules commands to re-enter the session queue after a delay.
///
/// Holds a weak sender so pending timers never keep the actor alive on
/// their own.
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::WeakSender<SessionCommand>,
}

impl Scheduler {
    pub fn new(tx: &mpsc::Sender<SessionCommand>) -> Self {
        Self { tx: tx.downgrade() }
    }

    pub fn schedule(&self, delay: Duration, command: SessionCommand) -> JoinHandle<()> {
        let tx = self.tx.clone();
        let due = tokio::time::Instant::now() + delay;
        tokio::spawn(async move {
            tokio::time::sleep_until(due).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(command).await;
            }
        })
    }
}

//! Connection registry: name bindings, the live player table and scores

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::ws::protocol::{PlayerInfo, PlayerMap, Position, ScoreMap, ServerMsg};

use super::arena::{clamp_to_world, random_spawn};
use super::broadcast::EventBroadcaster;
use super::ConnectionId;

/// Longest accepted player name, in characters
pub const MAX_NAME_CHARS: usize = 32;

/// Why a registration was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterRejection {
    #[error("name '{0}' is already taken")]
    NameTaken(String),

    #[error("connection is already registered as '{0}'")]
    AlreadyRegistered(String),

    #[error("names must be 1 to {} characters", MAX_NAME_CHARS)]
    InvalidName,
}

impl RegisterRejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NameTaken(_) => "name_taken",
            Self::AlreadyRegistered(_) => "already_registered",
            Self::InvalidName => "invalid_name",
        }
    }
}

/// Full roster as handed to a newly registered client
#[derive(Debug, Clone, PartialEq)]
pub struct RosterSnapshot {
    pub players: PlayerMap,
    pub scores: ScoreMap,
}

/// Owns who is playing. The score table holds every registered name;
/// the player table holds only those currently alive, so a name can sit
/// in `scores` without a `players` entry while it waits to respawn.
pub struct ConnectionRegistry {
    players: PlayerMap,
    scores: ScoreMap,
    bindings: HashMap<ConnectionId, String>,
    /// Ticket of the hit each dead player is waiting out
    pending_respawns: HashMap<String, u64>,
    next_ticket: u64,
    rng: ChaCha8Rng,
}

impl ConnectionRegistry {
    pub fn new(seed: u64) -> Self {
        Self {
            players: PlayerMap::new(),
            scores: ScoreMap::new(),
            bindings: HashMap::new(),
            pending_respawns: HashMap::new(),
            next_ticket: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// True iff a registered player holds exactly this name
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.scores.contains_key(name)
    }

    /// Bind `name` to `connection_id` and spawn the player.
    ///
    /// On success the new client receives `init` with the full roster and
    /// every other connection receives `playerJoined`. A rejection leaves
    /// all tables untouched.
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        name: &str,
        broadcaster: &EventBroadcaster,
    ) -> Result<RosterSnapshot, RegisterRejection> {
        if let Some(existing) = self.bindings.get(&connection_id) {
            return Err(RegisterRejection::AlreadyRegistered(existing.clone()));
        }
        if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
            return Err(RegisterRejection::InvalidName);
        }
        if self.is_name_taken(name) {
            return Err(RegisterRejection::NameTaken(name.to_string()));
        }

        let spawn = random_spawn(&mut self.rng);
        let player = PlayerInfo {
            x: spawn.x,
            y: spawn.y,
            name: name.to_string(),
        };
        self.players.insert(name.to_string(), player.clone());
        self.scores.insert(name.to_string(), 0);
        self.bindings.insert(connection_id, name.to_string());

        let snapshot = RosterSnapshot {
            players: self.players.clone(),
            scores: self.scores.clone(),
        };

        broadcaster.unicast(
            connection_id,
            ServerMsg::Init {
                players: snapshot.players.clone(),
                scores: snapshot.scores.clone(),
            },
        );
        broadcaster.broadcast_except(connection_id, &ServerMsg::PlayerJoined(player));

        info!(
            name = %name,
            connection_id = %connection_id,
            population = self.population_count(),
            "Player registered"
        );

        Ok(snapshot)
    }

    /// Store a reported position, clamped into the world, and relay it to
    /// everyone but the sender. Ignored for unbound connections and for
    /// players that are currently dead.
    pub fn update_position(
        &mut self,
        connection_id: ConnectionId,
        x: f64,
        y: f64,
        broadcaster: &EventBroadcaster,
    ) -> Option<Position> {
        let name = self.bindings.get(&connection_id)?;
        let player = self.players.get_mut(name)?;
        let pos = clamp_to_world(x, y)?;

        player.x = pos.x;
        player.y = pos.y;

        broadcaster.broadcast_except(
            connection_id,
            &ServerMsg::UpdatePosition {
                name: name.clone(),
                pos,
            },
        );
        Some(pos)
    }

    /// Delete a player's position and score
    pub fn remove(&mut self, name: &str) -> bool {
        self.pending_respawns.remove(name);
        let had_player = self.players.remove(name).is_some();
        let had_score = self.scores.remove(name).is_some();
        had_player || had_score
    }

    /// Drop the connection's binding, returning the name it held
    pub fn unbind(&mut self, connection_id: ConnectionId) -> Option<String> {
        self.bindings.remove(&connection_id)
    }

    /// Number of players currently on the field. Players waiting to
    /// respawn are not counted.
    pub fn population_count(&self) -> usize {
        self.players.len()
    }

    pub fn name_of(&self, connection_id: ConnectionId) -> Option<&str> {
        self.bindings.get(&connection_id).map(String::as_str)
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.players.contains_key(name)
    }

    pub fn players(&self) -> &PlayerMap {
        &self.players
    }

    pub fn scores(&self) -> &ScoreMap {
        &self.scores
    }

    /// Add one point, returning the new score
    pub fn increment_score(&mut self, name: &str) -> Option<u32> {
        let score = self.scores.get_mut(name)?;
        *score = score.saturating_add(1);
        Some(*score)
    }

    /// Take a player off the field while keeping their score. Returns the
    /// ticket the matching respawn must present.
    pub fn take_player(&mut self, name: &str) -> Option<u64> {
        self.players.remove(name)?;
        self.next_ticket += 1;
        self.pending_respawns
            .insert(name.to_string(), self.next_ticket);
        Some(self.next_ticket)
    }

    /// Put a dead player back at a fresh spawn point. Only the respawn
    /// holding the ticket of the player's latest hit applies.
    pub fn respawn(&mut self, name: &str, ticket: u64) -> Option<PlayerInfo> {
        if self.pending_respawns.get(name) != Some(&ticket)
            || !self.scores.contains_key(name)
            || self.players.contains_key(name)
        {
            debug!(name = %name, ticket, "Skipping respawn");
            return None;
        }
        self.pending_respawns.remove(name);

        let spawn = random_spawn(&mut self.rng);
        let player = PlayerInfo {
            x: spawn.x,
            y: spawn.y,
            name: name.to_string(),
        };
        self.players.insert(name.to_string(), player.clone());
        Some(player)
    }

    /// Forget every player, score and binding
    pub fn clear(&mut self) {
        self.players.clear();
        self.scores.clear();
        self.bindings.clear();
        self.pending_respawns.clear();
    }
}

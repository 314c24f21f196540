//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Live player table keyed by name
pub type PlayerMap = BTreeMap<String, PlayerInfo>;

/// Score table keyed by name
pub type ScoreMap = BTreeMap<String, u32>;

/// A point in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A player as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub x: f64,
    pub y: f64,
    pub name: String,
}

impl PlayerInfo {
    #[cfg(test)]
    pub fn position(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
        }
    }
}

/// Bullet spawn as reported by the shooter. Clients simulate the
/// trajectory themselves; the server only relays it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bullet {
    pub x: f64,
    pub y: f64,
    /// Unit direction X
    pub dx: f64,
    /// Unit direction Y
    pub dy: f64,
}

/// Client-side belief that `shooter`'s bullet struck `target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitClaim {
    pub shooter: String,
    pub target: String,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Ask whether a name is in use; answered with `ServerMsg::CheckName`
    CheckName(String),

    /// Join the arena under the given name
    Register(String),

    /// Periodic position report
    UpdatePosition(Position),

    /// Fire a bullet
    Shoot(Bullet),

    /// Report a hit computed client-side
    Hit(HitClaim),
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Reply to `ClientMsg::CheckName`
    CheckName { name: String, taken: bool },

    /// Full roster for a freshly registered client
    Init { players: PlayerMap, scores: ScoreMap },

    /// Another player joined
    PlayerJoined(PlayerInfo),

    /// Another player moved
    UpdatePosition { name: String, pos: Position },

    /// A bullet was fired (echoed to everyone, shooter included)
    Shoot { bullet: Bullet, name: String },

    /// Full score table after a hit
    ScoreUpdate(ScoreMap),

    /// Player removed after being hit
    PlayerHit(String),

    /// Player back in the arena after the respawn delay
    Respawn(PlayerInfo),

    /// Full player table, sent after each respawn
    NameUpdate(PlayerMap),

    /// Player disconnected
    PlayerLeft(String),

    /// Match concluded; all players are unregistered afterwards
    GameOver { scores: ScoreMap, players: PlayerMap },

    /// Request refused
    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_client_events() {
        let msg: ClientMsg =
            serde_json::from_value(json!({"event": "register", "data": "Ada"})).unwrap();
        assert!(matches!(msg, ClientMsg::Register(name) if name == "Ada"));

        let msg: ClientMsg = serde_json::from_value(
            json!({"event": "hit", "data": {"shooter": "A", "target": "B"}}),
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMsg::Hit(HitClaim { ref shooter, ref target }) if shooter == "A" && target == "B"
        ));

        let msg: ClientMsg = serde_json::from_value(
            json!({"event": "shoot", "data": {"x": 1.0, "y": 2.0, "dx": 0.6, "dy": 0.8}}),
        )
        .unwrap();
        assert!(matches!(msg, ClientMsg::Shoot(b) if b.dx == 0.6));
    }

    #[test]
    fn unknown_event_is_rejected() {
        let result = serde_json::from_value::<ClientMsg>(json!({"event": "teleport", "data": {}}));
        assert!(result.is_err());
    }

    #[test]
    fn server_events_use_wire_names() {
        let relay = ServerMsg::UpdatePosition {
            name: "A".into(),
            pos: Position { x: 15.0, y: 20.0 },
        };
        assert_eq!(
            serde_json::to_value(&relay).unwrap(),
            json!({"event": "updatePosition", "data": {"name": "A", "pos": {"x": 15.0, "y": 20.0}}})
        );

        let mut scores = ScoreMap::new();
        scores.insert("A".into(), 1);
        scores.insert("B".into(), 0);
        let over = ServerMsg::GameOver {
            scores,
            players: PlayerMap::new(),
        };
        assert_eq!(
            serde_json::to_value(&over).unwrap(),
            json!({"event": "gameOver", "data": {"scores": {"A": 1, "B": 0}, "players": {}}})
        );

        assert_eq!(
            serde_json::to_value(ServerMsg::PlayerHit("B".into())).unwrap(),
            json!({"event": "playerHit", "data": "B"})
        );
    }
}

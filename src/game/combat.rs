//! Hit arbitration - scoring and respawn scheduling

use std::time::Duration;

use tracing::{debug, info};

use crate::ws::protocol::ServerMsg;

use super::broadcast::EventBroadcaster;
use super::registry::ConnectionRegistry;
use super::{Scheduler, SessionCommand};

/// Outcome of a hit claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitResult {
    /// Shooter scored and the target was removed pending respawn
    Resolved { shooter_score: u32 },
    /// Shooter or target was not on the field; nothing changed
    Stale,
}

/// Resolves client-reported hits.
///
/// Hit detection happens on the clients. A claim is authorized by
/// existence only: both names must be on the field when it is processed.
/// No geometry is checked here.
pub struct HitArbiter {
    respawn_delay: Duration,
    scheduler: Scheduler,
}

impl HitArbiter {
    pub fn new(respawn_delay: Duration, scheduler: Scheduler) -> Self {
        Self {
            respawn_delay,
            scheduler,
        }
    }

    /// Apply a hit claim: +1 for the shooter, `scoreUpdate` and `playerHit`
    /// to everyone, target off the field, respawn scheduled.
    pub fn resolve_hit(
        &self,
        registry: &mut ConnectionRegistry,
        broadcaster: &EventBroadcaster,
        shooter: &str,
        target: &str,
    ) -> HitResult {
        if !registry.is_alive(shooter) || !registry.is_alive(target) {
            debug!(shooter = %shooter, target = %target, "Ignoring stale hit claim");
            return HitResult::Stale;
        }

        let Some(shooter_score) = registry.increment_score(shooter) else {
            return HitResult::Stale;
        };

        broadcaster.broadcast_all(&ServerMsg::ScoreUpdate(registry.scores().clone()));
        broadcaster.broadcast_all(&ServerMsg::PlayerHit(target.to_string()));

        // Respawns are never cancelled; the registry checks the ticket on arrival
        if let Some(ticket) = registry.take_player(target) {
            self.scheduler.schedule(
                self.respawn_delay,
                SessionCommand::RespawnDue {
                    name: target.to_string(),
                    ticket,
                },
            );
        }

        info!(
            shooter = %shooter,
            target = %target,
            shooter_score,
            "Hit resolved"
        );

        HitResult::Resolved { shooter_score }
    }

    /// Bring a hit player back and resend the full roster.
    /// Returns false when the respawn no longer applies: the player left,
    /// the match ended, or a later hit superseded `ticket`.
    pub fn complete_respawn(
        &self,
        registry: &mut ConnectionRegistry,
        broadcaster: &EventBroadcaster,
        name: &str,
        ticket: u64,
    ) -> bool {
        let Some(player) = registry.respawn(name, ticket) else {
            return false;
        };

        broadcaster.broadcast_all(&ServerMsg::Respawn(player));
        broadcaster.broadcast_all(&ServerMsg::NameUpdate(registry.players().clone()));

        debug!(name = %name, "Player respawned");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arena::SPAWN_AREA;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    struct Fixture {
        registry: ConnectionRegistry,
        broadcaster: EventBroadcaster,
        arbiter: HitArbiter,
        observer: mpsc::Receiver<ServerMsg>,
        commands: mpsc::Receiver<SessionCommand>,
        _commands_tx: mpsc::Sender<SessionCommand>,
    }

    fn fixture(names: &[&str]) -> Fixture {
        let (commands_tx, commands) = mpsc::channel(8);
        let mut broadcaster = EventBroadcaster::new();
        let mut registry = ConnectionRegistry::new(11);
        for name in names {
            registry.register(Uuid::new_v4(), name, &broadcaster).unwrap();
        }
        let (tx, observer) = mpsc::channel(32);
        broadcaster.add(Uuid::new_v4(), tx);

        Fixture {
            registry,
            broadcaster,
            arbiter: HitArbiter::new(Duration::from_millis(3_000), Scheduler::new(&commands_tx)),
            observer,
            commands,
            _commands_tx: commands_tx,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hit_scores_removes_and_schedules_respawn() {
        let mut f = fixture(&["A", "B"]);

        let result = f.arbiter.resolve_hit(&mut f.registry, &f.broadcaster, "A", "B");
        assert_eq!(result, HitResult::Resolved { shooter_score: 1 });
        assert_eq!(f.registry.scores()["A"], 1);
        assert_eq!(f.registry.scores()["B"], 0);
        assert!(!f.registry.is_alive("B"));

        match f.observer.try_recv().unwrap() {
            ServerMsg::ScoreUpdate(scores) => assert_eq!(scores["A"], 1),
            other => panic!("expected scoreUpdate, got {other:?}"),
        }
        assert_eq!(f.observer.try_recv().unwrap(), ServerMsg::PlayerHit("B".into()));

        let started = tokio::time::Instant::now();
        match f.commands.recv().await.unwrap() {
            SessionCommand::RespawnDue { name, .. } => assert_eq!(name, "B"),
            other => panic!("expected respawn, got {other:?}"),
        }
        assert_eq!(started.elapsed(), Duration::from_millis(3_000));
    }

    async fn next_respawn(f: &mut Fixture) -> (String, u64) {
        match f.commands.recv().await.unwrap() {
            SessionCommand::RespawnDue { name, ticket } => (name, ticket),
            other => panic!("expected respawn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn claims_about_absent_players_are_ignored() {
        let mut f = fixture(&["A", "B"]);

        assert_eq!(
            f.arbiter.resolve_hit(&mut f.registry, &f.broadcaster, "A", "ghost"),
            HitResult::Stale
        );
        assert_eq!(
            f.arbiter.resolve_hit(&mut f.registry, &f.broadcaster, "ghost", "B"),
            HitResult::Stale
        );

        f.arbiter.resolve_hit(&mut f.registry, &f.broadcaster, "A", "B");
        // B is already down; a duplicate report must not score again
        assert_eq!(
            f.arbiter.resolve_hit(&mut f.registry, &f.broadcaster, "A", "B"),
            HitResult::Stale
        );
        assert_eq!(f.registry.scores()["A"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn respawn_rebroadcasts_roster() {
        let mut f = fixture(&["A", "B"]);
        f.arbiter.resolve_hit(&mut f.registry, &f.broadcaster, "A", "B");
        while f.observer.try_recv().is_ok() {}

        let (name, ticket) = next_respawn(&mut f).await;
        assert!(f.arbiter.complete_respawn(&mut f.registry, &f.broadcaster, &name, ticket));
        match f.observer.try_recv().unwrap() {
            ServerMsg::Respawn(player) => {
                assert_eq!(player.name, "B");
                assert!(SPAWN_AREA.contains(player.position()));
            }
            other => panic!("expected respawn, got {other:?}"),
        }
        match f.observer.try_recv().unwrap() {
            ServerMsg::NameUpdate(players) => {
                assert!(players.contains_key("A") && players.contains_key("B"))
            }
            other => panic!("expected nameUpdate, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn respawn_after_leaving_is_skipped() {
        let mut f = fixture(&["A", "B"]);
        f.arbiter.resolve_hit(&mut f.registry, &f.broadcaster, "A", "B");
        f.registry.remove("B");
        while f.observer.try_recv().is_ok() {}

        let (name, ticket) = next_respawn(&mut f).await;
        assert!(!f.arbiter.complete_respawn(&mut f.registry, &f.broadcaster, &name, ticket));
        assert!(f.observer.try_recv().is_err());
        assert!(!f.registry.is_alive("B"));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_respawn_is_skipped() {
        let mut f = fixture(&["A", "B"]);
        f.arbiter.resolve_hit(&mut f.registry, &f.broadcaster, "A", "B");

        tokio::time::advance(Duration::from_secs(1)).await;

        // B rejoins under the same name and is hit again before the first timer fires
        f.registry.remove("B");
        f.registry
            .register(Uuid::new_v4(), "B", &f.broadcaster)
            .unwrap();
        f.arbiter.resolve_hit(&mut f.registry, &f.broadcaster, "A", "B");
        while f.observer.try_recv().is_ok() {}

        let (name, stale) = next_respawn(&mut f).await;
        assert!(!f.arbiter.complete_respawn(&mut f.registry, &f.broadcaster, &name, stale));
        assert!(f.observer.try_recv().is_err());

        let (name, current) = next_respawn(&mut f).await;
        assert!(f.arbiter.complete_respawn(&mut f.registry, &f.broadcaster, &name, current));
        assert!(f.registry.is_alive("B"));
    }
}

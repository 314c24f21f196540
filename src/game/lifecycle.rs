//! Match lifecycle state machine

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

use super::{Scheduler, SessionCommand};

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// No match running, no deadline scheduled
    Idle,
    /// Match running until its deadline
    Active,
}

/// Tracks the single process-wide match.
///
/// Becomes Active once enough players are registered and stays Active
/// until either the deadline fires or the population drops below the
/// threshold. Late joins never move the deadline.
pub struct MatchLifecycle {
    phase: MatchPhase,
    deadline: Option<Instant>,
    deadline_task: Option<JoinHandle<()>>,
    /// Bumped on every start so a deadline from an earlier match is ignored
    generation: u64,
    min_players: usize,
    match_duration: Duration,
    scheduler: Scheduler,
}

impl MatchLifecycle {
    pub fn new(min_players: usize, match_duration: Duration, scheduler: Scheduler) -> Self {
        Self {
            phase: MatchPhase::Idle,
            deadline: None,
            deadline_task: None,
            generation: 0,
            min_players,
            match_duration,
            scheduler,
        }
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    #[cfg(test)]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn min_players(&self) -> usize {
        self.min_players
    }

    /// Time left in the running match
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Call after a successful registration. Returns true if this started
    /// a match.
    pub fn on_registered(&mut self, population: usize) -> bool {
        if self.phase == MatchPhase::Active || population < self.min_players {
            return false;
        }

        self.generation += 1;
        self.phase = MatchPhase::Active;
        self.deadline = Some(Instant::now() + self.match_duration);
        self.deadline_task = Some(self.scheduler.schedule(
            self.match_duration,
            SessionCommand::DeadlineDue {
                generation: self.generation,
            },
        ));

        info!(
            generation = self.generation,
            population,
            duration_secs = self.match_duration.as_secs(),
            "Match started"
        );
        true
    }

    /// Call after a player left. Returns true if the match was aborted.
    pub fn on_departed(&mut self, population: usize) -> bool {
        if self.phase != MatchPhase::Active || population >= self.min_players {
            return false;
        }

        if let Some(task) = self.deadline_task.take() {
            task.abort();
        }
        self.phase = MatchPhase::Idle;
        self.deadline = None;

        info!(
            generation = self.generation,
            population,
            "Match aborted, waiting for more players"
        );
        true
    }

    /// Call when a deadline command arrives. Returns true if the current
    /// match has concluded and the caller must persist and reset.
    pub fn on_deadline(&mut self, generation: u64) -> bool {
        if self.phase != MatchPhase::Active || generation != self.generation {
            return false;
        }

        self.deadline_task = None;
        self.phase = MatchPhase::Idle;
        self.deadline = None;

        info!(generation, "Match concluded");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn lifecycle() -> (MatchLifecycle, mpsc::Receiver<SessionCommand>, mpsc::Sender<SessionCommand>) {
        let (tx, rx) = mpsc::channel(8);
        let lifecycle = MatchLifecycle::new(2, Duration::from_secs(120), Scheduler::new(&tx));
        (lifecycle, rx, tx)
    }

    #[tokio::test(start_paused = true)]
    async fn starts_at_threshold_and_fires_deadline() {
        let (mut lc, mut rx, _tx) = lifecycle();

        assert!(!lc.on_registered(1));
        assert_eq!(lc.phase(), MatchPhase::Idle);

        let started = Instant::now();
        assert!(lc.on_registered(2));
        assert_eq!(lc.phase(), MatchPhase::Active);
        assert_eq!(lc.deadline(), Some(started + Duration::from_secs(120)));

        let generation = match rx.recv().await.unwrap() {
            SessionCommand::DeadlineDue { generation } => generation,
            other => panic!("expected deadline, got {other:?}"),
        };
        assert_eq!(started.elapsed(), Duration::from_secs(120));
        assert!(lc.on_deadline(generation));
        assert_eq!(lc.phase(), MatchPhase::Idle);
        assert_eq!(lc.remaining(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn late_join_keeps_deadline() {
        let (mut lc, _rx, _tx) = lifecycle();
        lc.on_registered(2);
        let deadline = lc.deadline();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!lc.on_registered(3));
        assert_eq!(lc.deadline(), deadline);
        assert_eq!(lc.remaining(), Some(Duration::from_secs(90)));
    }

    #[tokio::test(start_paused = true)]
    async fn early_abort_cancels_deadline() {
        let (mut lc, mut rx, _tx) = lifecycle();
        lc.on_registered(2);

        assert!(!lc.on_departed(2));
        assert!(lc.on_departed(1));
        assert_eq!(lc.phase(), MatchPhase::Idle);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn deadline_from_previous_match_is_ignored() {
        let (mut lc, _rx, _tx) = lifecycle();
        lc.on_registered(2);
        lc.on_departed(1);
        lc.on_registered(2);

        assert!(!lc.on_deadline(1));
        assert_eq!(lc.phase(), MatchPhase::Active);
        assert!(lc.on_deadline(2));
    }
}

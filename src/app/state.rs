//! Application state shared across routes

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::game::{SessionActor, SessionHandle};
use crate::store::{LeaderboardStore, MemoryLeaderboard, SupabaseClient, SupabaseLeaderboard};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: SessionHandle,
    pub leaderboard: Arc<dyn LeaderboardStore>,
}

impl AppState {
    /// Build state and spawn the session actor.
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config) -> Self {
        let leaderboard: Arc<dyn LeaderboardStore> = match &config.supabase {
            Some(supabase) => {
                info!(url = %supabase.url, "Using Supabase leaderboard");
                Arc::new(SupabaseLeaderboard::new(SupabaseClient::new(supabase)))
            }
            None => {
                warn!("SUPABASE_URL not set, leaderboard is kept in memory and lost on restart");
                Arc::new(MemoryLeaderboard::new())
            }
        };

        Self::with_store(config, leaderboard)
    }

    pub fn with_store(config: Config, leaderboard: Arc<dyn LeaderboardStore>) -> Self {
        let config = Arc::new(config);

        let (actor, session) =
            SessionActor::new(&config.session, leaderboard.clone(), rand::random());
        tokio::spawn(actor.run());

        Self {
            config,
            session,
            leaderboard,
        }
    }
}

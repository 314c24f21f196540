//! Leaderboard persistence

pub mod leaderboard;
pub mod supabase;

pub use leaderboard::{LeaderboardEntry, LeaderboardStore, MemoryLeaderboard, StoreError};
pub use supabase::{SupabaseClient, SupabaseLeaderboard};

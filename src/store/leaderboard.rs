//! Leaderboard store contract and the in-memory backend

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};

use super::supabase::SupabaseError;

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Supabase request failed: {0}")]
    Supabase(#[from] SupabaseError),
}

/// Best score ever achieved under a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Durable name → best score mapping.
///
/// Writes are max-merges: a stored score is only ever raised. Each row is
/// updated atomically; nothing spans rows.
pub trait LeaderboardStore: Send + Sync {
    /// Insert `name` with `score`, or raise the stored score to
    /// `max(stored, score)`
    fn upsert_max(&self, name: String, score: u32) -> BoxFuture<'static, StoreResult<()>>;

    /// All entries, highest score first. Order among ties is unspecified.
    fn list_all_descending(&self) -> BoxFuture<'static, StoreResult<Vec<LeaderboardEntry>>>;
}

/// Process-local leaderboard, used when no database is configured
#[derive(Clone, Default)]
pub struct MemoryLeaderboard {
    rows: Arc<DashMap<String, LeaderboardEntry>>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<u32> {
        self.rows.get(name).map(|row| row.score)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn merge(&self, name: String, score: u32) {
        let now = Utc::now();
        self.rows
            .entry(name.clone())
            .and_modify(|row| {
                if score > row.score {
                    row.score = score;
                    row.updated_at = Some(now);
                }
            })
            .or_insert_with(|| LeaderboardEntry {
                name,
                score,
                updated_at: Some(now),
            });
    }

    fn sorted(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> =
            self.rows.iter().map(|row| row.value().clone()).collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        entries
    }
}

impl LeaderboardStore for MemoryLeaderboard {
    fn upsert_max(&self, name: String, score: u32) -> BoxFuture<'static, StoreResult<()>> {
        self.merge(name, score);
        Box::pin(future::ready(Ok(())))
    }

    fn list_all_descending(&self) -> BoxFuture<'static, StoreResult<Vec<LeaderboardEntry>>> {
        Box::pin(future::ready(Ok(self.sorted())))
    }
}

use std::{fmt, str::FromStr};

use serde::Serialize;

use super::quotes::Quote;

/// A record both sides have, with different content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub id: String,
    pub local: Quote,
    pub server: Quote,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Remote content overwrites local content on mismatch.
    #[default]
    ServerWins,
    /// Conflicts are held until the user picks a side.
    Manual,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server-wins" | "server" => Ok(ConflictPolicy::ServerWins),
            "manual" | "ask" => Ok(ConflictPolicy::Manual),
            other => Err(format!("unknown conflict policy \"{other}\"")),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::ServerWins => write!(f, "server-wins"),
            ConflictPolicy::Manual => write!(f, "manual"),
        }
    }
}

/// The user's answer to a set of pending conflicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    AcceptRemote,
    KeepLocal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    Fetching,
    Comparing,
    Applying,
    AwaitingUserChoice,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Fetching => "fetching",
            SyncPhase::Comparing => "comparing",
            SyncPhase::Applying => "applying",
            SyncPhase::AwaitingUserChoice => "awaiting user choice",
        };

        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Ok,
    Conflicts,
    Error,
    /// Another cycle was already in flight; this one did not run.
    Busy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub status: SyncStatus,
    pub added_count: usize,
    pub conflict_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncReport {
    pub fn ok(added_count: usize, conflict_count: usize) -> Self {
        SyncReport {
            status: SyncStatus::Ok,
            added_count,
            conflict_count,
            message: None,
        }
    }

    pub fn conflicts(conflict_count: usize) -> Self {
        SyncReport {
            status: SyncStatus::Conflicts,
            added_count: 0,
            conflict_count,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SyncReport {
            status: SyncStatus::Error,
            added_count: 0,
            conflict_count: 0,
            message: Some(message.into()),
        }
    }

    pub fn busy() -> Self {
        SyncReport {
            status: SyncStatus::Busy,
            added_count: 0,
            conflict_count: 0,
            message: None,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            SyncStatus::Ok => write!(
                f,
                "synced: {} added, {} replaced by server",
                self.added_count, self.conflict_count
            ),
            SyncStatus::Conflicts => write!(f, "conflicts: {}", self.conflict_count),
            SyncStatus::Error => write!(
                f,
                "sync failed: {}",
                self.message.as_deref().unwrap_or("unknown error")
            ),
            SyncStatus::Busy => write!(f, "a sync is already in progress"),
        }
    }
}

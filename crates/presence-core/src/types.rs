//! Status model shared by the presence service and its ports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rich user status carried on the presence bus and shown in live UI.
///
/// All seven values exist only while a session is connected; the durable
/// store keeps the reduced [`PersistedStatus`] form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserStatus {
    Online,
    Busy,
    Dnd,
    InCall,
    Away,
    Invisible,
    Offline,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Busy => "busy",
            Self::Dnd => "dnd",
            Self::InCall => "in-call",
            Self::Away => "away",
            Self::Invisible => "invisible",
            Self::Offline => "offline",
        }
    }

    /// Collapse to the durable-store representation.
    ///
    /// `Busy`, `Dnd`, and `InCall` all persist as `Away`: the durable
    /// schema cannot carry them, so the distinction is lost across reloads.
    pub fn collapse(self) -> PersistedStatus {
        match self {
            Self::Online => PersistedStatus::Online,
            Self::Busy | Self::Dnd | Self::InCall | Self::Away => PersistedStatus::Away,
            Self::Invisible => PersistedStatus::Invisible,
            Self::Offline => PersistedStatus::Offline,
        }
    }

    pub fn is_offline(self) -> bool {
        matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable-store status column: the reduced four-value form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersistedStatus {
    Online,
    Offline,
    Away,
    Invisible,
}

impl PersistedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Away => "away",
            Self::Invisible => "invisible",
        }
    }

    /// Expand back into rich space on rehydration.
    ///
    /// Persisted `Away` is ambiguous (it may have been `busy`, `dnd`, or
    /// `in-call`), so it rehydrates as `Online` rather than guessing.
    pub fn expand(self) -> UserStatus {
        match self {
            Self::Online | Self::Away => UserStatus::Online,
            Self::Offline => UserStatus::Offline,
            Self::Invisible => UserStatus::Invisible,
        }
    }
}

impl std::fmt::Display for PersistedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One session's presence as published on the bus.
///
/// Created implicitly when a session subscribes, refreshed on every
/// heartbeat and status change, never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: String,
    pub status: UserStatus,
    pub last_seen: DateTime<Utc>,
}

impl PresenceRecord {
    pub fn now(user_id: impl Into<String>, status: UserStatus) -> Self {
        PresenceRecord {
            user_id: user_id.into(),
            status,
            last_seen: Utc::now(),
        }
    }
}

/// A durable status row as carried on the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub user_id: String,
    pub status: PersistedStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rich_values_collapse_lossily() {
        assert_eq!(UserStatus::Online.collapse(), PersistedStatus::Online);
        assert_eq!(UserStatus::Busy.collapse(), PersistedStatus::Away);
        assert_eq!(UserStatus::Dnd.collapse(), PersistedStatus::Away);
        assert_eq!(UserStatus::InCall.collapse(), PersistedStatus::Away);
        assert_eq!(UserStatus::Away.collapse(), PersistedStatus::Away);
        assert_eq!(UserStatus::Invisible.collapse(), PersistedStatus::Invisible);
        assert_eq!(UserStatus::Offline.collapse(), PersistedStatus::Offline);
    }

    #[test]
    fn persisted_away_expands_to_online() {
        assert_eq!(PersistedStatus::Away.expand(), UserStatus::Online);
        assert_eq!(PersistedStatus::Online.expand(), UserStatus::Online);
        assert_eq!(PersistedStatus::Offline.expand(), UserStatus::Offline);
        assert_eq!(PersistedStatus::Invisible.expand(), UserStatus::Invisible);
    }

    #[test]
    fn wire_names_match_the_store_schema() {
        assert_eq!(
            serde_json::to_string(&UserStatus::InCall).unwrap(),
            "\"in-call\""
        );
        assert_eq!(
            serde_json::from_str::<PersistedStatus>("\"away\"").unwrap(),
            PersistedStatus::Away
        );
    }
}

//! Schedule and routing errors.

use thiserror::Error;

use crate::shared::TilePos;

/// How the runtime reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTier {
    /// Bad script or world data. Logged, schedule disabled for the day.
    Content,
    /// Might succeed on a later tick. Hold and retry.
    Transient,
    /// Corrupted runtime state. Propagated to the caller.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("no connection from {from} to {to}")]
    NoConnection { from: String, to: String },
    #[error("no warp from {from} to {to}")]
    MissingWarp { from: String, to: String },
    #[error("no walkable path on {map} from {from} to {to}")]
    PathBlocked { map: String, from: TilePos, to: TilePos },
    #[error("{tile} on {map} can never be stood on")]
    UnwalkableGoal { map: String, tile: TilePos },
    #[error("unknown map '{0}'")]
    UnknownMap(String),
}

impl RouteError {
    pub fn tier(&self) -> ErrorTier {
        match self {
            RouteError::PathBlocked { .. } => ErrorTier::Transient,
            _ => ErrorTier::Content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("{npc} has no schedule '{key}'")]
    MissingKey { npc: String, key: String },
    #[error("{npc} schedule GOTO cycle: {}", chain.join(" -> "))]
    GotoCycle { npc: String, chain: Vec<String> },
    #[error("{npc} schedule '{key}' command '{command}': {reason}")]
    Malformed {
        npc: String,
        key: String,
        command: String,
        reason: String,
    },
    #[error("{npc} schedule '{key}': time {time} comes before {previous}")]
    TimeOutOfOrder {
        npc: String,
        key: String,
        time: u16,
        previous: u16,
    },
    #[error("{npc} has no end-of-route behavior named '{name}'")]
    UnknownBehavior { npc: String, name: String },
    #[error("{npc} schedule '{key}' hop {hop}: {source}")]
    Route {
        npc: String,
        key: String,
        hop: String,
        #[source]
        source: RouteError,
    },
    #[error("{npc} schedule '{key}': leg starts from an unset tile")]
    UnsetStartTile { npc: String, key: String },
}

impl ScheduleError {
    pub fn tier(&self) -> ErrorTier {
        match self {
            ScheduleError::Route { source, .. } => source.tier(),
            ScheduleError::UnsetStartTile { .. } => ErrorTier::Fatal,
            _ => ErrorTier::Content,
        }
    }

    pub fn schedule_key(&self) -> Option<&str> {
        match self {
            ScheduleError::MissingKey { key, .. }
            | ScheduleError::Malformed { key, .. }
            | ScheduleError::TimeOutOfOrder { key, .. }
            | ScheduleError::Route { key, .. }
            | ScheduleError::UnsetStartTile { key, .. } => Some(key),
            ScheduleError::GotoCycle { chain, .. } => chain.first().map(String::as_str),
            ScheduleError::UnknownBehavior { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_errors_carry_their_tier() {
        let blocked = ScheduleError::Route {
            npc: "lily".into(),
            key: "spring".into(),
            hop: "Town -> Saloon".into(),
            source: RouteError::PathBlocked {
                map: "Town".into(),
                from: TilePos::new(1, 1),
                to: TilePos::new(2, 2),
            },
        };
        assert_eq!(blocked.tier(), ErrorTier::Transient);
        assert!(blocked.to_string().contains("Town -> Saloon"));

        let missing = ScheduleError::Route {
            npc: "lily".into(),
            key: "spring".into(),
            hop: "Town -> Moon".into(),
            source: RouteError::NoConnection {
                from: "Town".into(),
                to: "Moon".into(),
            },
        };
        assert_eq!(missing.tier(), ErrorTier::Content);

        let water = RouteError::UnwalkableGoal {
            map: "Town".into(),
            tile: TilePos::new(21, 21),
        };
        assert_eq!(water.tier(), ErrorTier::Content);
    }

    #[test]
    fn test_cycle_message_lists_chain() {
        let err = ScheduleError::GotoCycle {
            npc: "old_tom".into(),
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "old_tom schedule GOTO cycle: a -> b -> a");
        assert_eq!(err.schedule_key(), Some("a"));
    }

    #[test]
    fn test_unset_start_is_fatal() {
        let err = ScheduleError::UnsetStartTile {
            npc: "margaret".into(),
            key: "Mon".into(),
        };
        assert_eq!(err.tier(), ErrorTier::Fatal);
    }
}

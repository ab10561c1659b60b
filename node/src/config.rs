use std::{fmt, str::FromStr};

use comms::{Config, ConfigErr, config::keys};

/// What a run does with the workers' shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Test,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Self::Train),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown mode `{other}`")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => f.write_str("train"),
            Self::Test => f.write_str("test"),
        }
    }
}

/// The role a peer ends up playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Coordinator,
    TrainWorker,
    PredictWorker,
}

/// The configuration entries every peer reads to pick its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleConfig {
    pub coordinator: usize,
    pub mode: Mode,
}

impl RoleConfig {
    /// Reads the coordinator index and the run mode.
    ///
    /// # Returns
    /// The role configuration or a `ConfigErr` if either key is missing or invalid.
    pub fn from_config(config: &Config) -> Result<Self, ConfigErr> {
        Ok(Self {
            coordinator: config.get_usize(keys::COORDINATOR_INDEX)?,
            mode: config.get_parsed(keys::MODE)?,
        })
    }

    /// The role of the peer with `peer_index`.
    pub fn kind(&self, peer_index: usize) -> RoleKind {
        match self.mode {
            _ if peer_index == self.coordinator => RoleKind::Coordinator,
            Mode::Train => RoleKind::TrainWorker,
            Mode::Test => RoleKind::PredictWorker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_one_role_per_peer() {
        let config = Config::from_iter([(keys::COORDINATOR_INDEX, "1"), (keys::MODE, "test")]);
        let roles = RoleConfig::from_config(&config).unwrap();

        assert_eq!(roles.kind(0), RoleKind::PredictWorker);
        assert_eq!(roles.kind(1), RoleKind::Coordinator);
        assert_eq!(roles.kind(2), RoleKind::PredictWorker);

        let config = Config::from_iter([(keys::COORDINATOR_INDEX, "0"), (keys::MODE, "train")]);
        let roles = RoleConfig::from_config(&config).unwrap();
        assert_eq!(roles.kind(3), RoleKind::TrainWorker);
    }

    #[test]
    fn unknown_modes_are_invalid_values() {
        let config = Config::from_iter([(keys::COORDINATOR_INDEX, "0"), (keys::MODE, "eval")]);
        let err = RoleConfig::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigErr::InvalidValue { .. }));

        let config = Config::from_iter([(keys::MODE, "train")]);
        let err = RoleConfig::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigErr::MissingKey(_)));
    }
}

//! Host configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.

use jukebox_session::{
    AccountId, Amount, DEFAULT_MANAGER_FEE_BPS, DEFAULT_MAX_MOVES_PER_PLAYER,
    DEFAULT_SESSION_DURATION, MIN_STAKE, ParamsError, SessionParams, Timestamp,
};
use serde::Deserialize;
use thiserror::Error;

/// Default manager identity when none is configured.
pub const DEFAULT_MANAGER: AccountId = 0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid session parameters: {0}")]
    Params(#[from] ParamsError),
}

/// Settings for one hosted session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    pub manager: AccountId,
    pub session_duration: Timestamp,
    pub max_moves_per_player: u32,
    pub min_stake: Amount,
    pub manager_fee_bps: u16,
    /// Keep an operation log for replay verification.
    pub record_replay: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            manager: DEFAULT_MANAGER,
            session_duration: DEFAULT_SESSION_DURATION,
            max_moves_per_player: DEFAULT_MAX_MOVES_PER_PLAYER,
            min_stake: MIN_STAKE,
            manager_fee_bps: DEFAULT_MANAGER_FEE_BPS,
            record_replay: false,
        }
    }
}

impl HostConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.session_params().validate()?;
        Ok(config)
    }

    pub fn session_params(&self) -> SessionParams {
        SessionParams {
            session_duration: self.session_duration,
            max_moves_per_player: self.max_moves_per_player,
            min_stake: self.min_stake,
            manager_fee_bps: self.manager_fee_bps,
        }
    }
}

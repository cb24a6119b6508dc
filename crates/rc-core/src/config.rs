//! Chain-wide RC parameters and the per-step chain context.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RcError;
use crate::types::Timestamp;

/// Seconds for an empty mana bar to regenerate fully (5 days).
pub const DEFAULT_REGEN_TIME_SECS: u64 = 60 * 60 * 24 * 5;

/// 100% expressed in basis points.
pub const DEFAULT_PERCENT_SCALE: u64 = 10_000;

/// Maximum delegatees in one batch delegation.
pub const DEFAULT_MAX_DELEGATEES_PER_OP: usize = 100;

/// Chain-wide constants governing RC regeneration and delegation.
///
/// Passed explicitly to every ledger operation through [`ChainContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcParams {
    /// Full regeneration window in seconds
    #[serde(default = "default_regen_time_secs")]
    pub regen_time_secs: u64,

    /// Fixed-point scale for fullness reporting (basis points)
    #[serde(default = "default_percent_scale")]
    pub percent_scale: u64,

    /// Creation adjustment applied when account creation does not carry one
    #[serde(default)]
    pub default_creation_adjustment: i64,

    /// Upper bound on delegatees in a single batch delegation
    #[serde(default = "default_max_delegatees_per_op")]
    pub max_delegatees_per_op: usize,
}

fn default_regen_time_secs() -> u64 {
    DEFAULT_REGEN_TIME_SECS
}

fn default_percent_scale() -> u64 {
    DEFAULT_PERCENT_SCALE
}

fn default_max_delegatees_per_op() -> usize {
    DEFAULT_MAX_DELEGATEES_PER_OP
}

impl Default for RcParams {
    fn default() -> Self {
        Self {
            regen_time_secs: DEFAULT_REGEN_TIME_SECS,
            percent_scale: DEFAULT_PERCENT_SCALE,
            default_creation_adjustment: 0,
            max_delegatees_per_op: DEFAULT_MAX_DELEGATEES_PER_OP,
        }
    }
}

impl RcParams {
    /// Reject parameter sets the engine cannot divide by.
    pub fn validate(&self) -> Result<(), RcError> {
        if self.regen_time_secs == 0 {
            return Err(RcError::InvalidParams(
                "regen_time_secs must be positive".to_string(),
            ));
        }
        if self.percent_scale == 0 {
            return Err(RcError::InvalidParams(
                "percent_scale must be positive".to_string(),
            ));
        }
        if self.max_delegatees_per_op == 0 {
            return Err(RcError::InvalidParams(
                "max_delegatees_per_op must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse from TOML and validate.
    pub fn from_toml(content: &str) -> Result<Self, RcError> {
        let params: RcParams =
            toml::from_str(content).map_err(|e| RcError::InvalidParams(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Load params from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RcError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RcError::InvalidParams(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml(&content)
    }
}

/// Consistent view of the global parameter source for one state transition.
#[derive(Debug, Clone, Copy)]
pub struct ChainContext<'a> {
    /// Head block time
    pub now: Timestamp,
    pub params: &'a RcParams,
}

impl<'a> ChainContext<'a> {
    pub fn new(now: Timestamp, params: &'a RcParams) -> Self {
        Self { now, params }
    }
}

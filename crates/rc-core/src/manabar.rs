//! Mana bar arithmetic.
//!
//! A mana bar regenerates linearly from empty to its ceiling over
//! `regen_time_secs`. All arithmetic is integer with `u128` intermediates and
//! truncating division so every node derives identical values.

use serde::{Deserialize, Serialize};

use crate::config::RcParams;
use crate::error::RcError;
use crate::types::{AccountName, Timestamp};

/// Regenerating quota: mana available as of `last_update_time`.
///
/// The ceiling is not stored here; it lives on the account record and is
/// passed in, so the same bar can be rescaled when the ceiling changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManaBar {
    pub current_mana: u64,
    pub last_update_time: Timestamp,
}

/// `now` was earlier than the bar's last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockWentBackwards {
    pub last_update: Timestamp,
    pub now: Timestamp,
}

impl ClockWentBackwards {
    pub fn for_account(self, account: &AccountName) -> RcError {
        RcError::NonMonotonicTime {
            account: account.clone(),
            last_update: self.last_update,
            now: self.now,
        }
    }
}

/// `value * numerator / denominator` with a `u128` intermediate, saturated
/// into `u64`. `denominator` must be non-zero.
pub(crate) fn mul_div(value: u64, numerator: u64, denominator: u64) -> u64 {
    let wide = value as u128 * numerator as u128 / denominator as u128;
    u64::try_from(wide).unwrap_or(u64::MAX)
}

impl ManaBar {
    pub fn new(current_mana: u64, last_update_time: Timestamp) -> Self {
        Self {
            current_mana,
            last_update_time,
        }
    }

    /// Mana the bar would hold at `now` under `max_mana`, without mutating.
    pub fn available_at(
        &self,
        max_mana: u64,
        now: Timestamp,
        params: &RcParams,
    ) -> Result<u64, ClockWentBackwards> {
        let mut bar = *self;
        bar.regenerate(max_mana, now, params)?;
        Ok(bar.current_mana)
    }

    /// Bring the bar up to `now` under ceiling `max_mana`.
    ///
    /// `last_update_time` always advances to `now`, even when nothing
    /// regenerated. The result never exceeds `max_mana`.
    pub fn regenerate(
        &mut self,
        max_mana: u64,
        now: Timestamp,
        params: &RcParams,
    ) -> Result<(), ClockWentBackwards> {
        if now < self.last_update_time {
            return Err(ClockWentBackwards {
                last_update: self.last_update_time,
                now,
            });
        }
        let elapsed = now - self.last_update_time;
        let regenerated = if elapsed >= params.regen_time_secs {
            max_mana
        } else {
            mul_div(max_mana, elapsed, params.regen_time_secs)
        };
        self.current_mana = self
            .current_mana
            .saturating_add(regenerated)
            .min(max_mana);
        self.last_update_time = now;
        Ok(())
    }

    /// Rescale for a ceiling change, preserving how full the bar is.
    ///
    /// A zero old ceiling means the bar is being bootstrapped and starts full.
    pub fn rescale(&mut self, old_max: u64, new_max: u64) {
        self.current_mana = if old_max == 0 {
            new_max
        } else {
            mul_div(self.current_mana, new_max, old_max).min(new_max)
        };
    }

    /// Regenerate under `old_max` up to `now`, then rescale to `new_max`.
    pub fn update_ceiling(
        &mut self,
        old_max: u64,
        new_max: u64,
        now: Timestamp,
        params: &RcParams,
    ) -> Result<(), ClockWentBackwards> {
        self.regenerate(old_max, now, params)?;
        if old_max != new_max {
            self.rescale(old_max, new_max);
        }
        Ok(())
    }

    /// Fullness in units of `params.percent_scale`; an empty ceiling is full.
    pub fn percent_full(&self, max_mana: u64, params: &RcParams) -> u64 {
        if max_mana == 0 {
            return params.percent_scale;
        }
        mul_div(self.current_mana.min(max_mana), params.percent_scale, max_mana)
    }
}

//! Capacity account records.

use serde::{Deserialize, Serialize};

use crate::config::RcParams;
use crate::error::RcError;
use crate::manabar::ManaBar;
use crate::types::{AccountName, Timestamp};

/// Per-account RC state.
///
/// Holds no references to delegation edges; outgoing edges are found through
/// the delegation ledger's `from` index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RcAccount {
    pub account: AccountName,
    pub rc_manabar: ManaBar,
    /// Ceiling as of the last recompute (`last_max_rc`)
    pub max_mana: u64,
    /// Stake-derived capacity base, as last reported by the stake source
    pub own_capacity: u64,
    pub max_rc_creation_adjustment: i64,
    /// Sum of outgoing delegation amounts
    pub delegated_rc: u64,
    /// Sum of incoming delegation amounts
    pub received_delegated_rc: u64,
}

impl RcAccount {
    /// A fresh record; the bar starts full at its ceiling.
    pub fn new(
        account: AccountName,
        own_capacity: u64,
        max_rc_creation_adjustment: i64,
        now: Timestamp,
    ) -> Self {
        let mut record = Self {
            account,
            rc_manabar: ManaBar::new(0, now),
            max_mana: 0,
            own_capacity,
            max_rc_creation_adjustment,
            delegated_rc: 0,
            received_delegated_rc: 0,
        };
        let ceiling = record.computed_max_mana();
        record.rc_manabar.rescale(0, ceiling);
        record.max_mana = ceiling;
        record
    }

    /// `own + adjustment - delegated + received`, clamped at zero.
    pub fn computed_max_mana(&self) -> u64 {
        let max = self.own_capacity as i128 + self.max_rc_creation_adjustment as i128
            - self.delegated_rc as i128
            + self.received_delegated_rc as i128;
        if max <= 0 {
            0
        } else {
            u64::try_from(max).unwrap_or(u64::MAX)
        }
    }

    /// Capacity the account may lend out. Received and creation capacity are
    /// not re-delegatable.
    pub fn owned_capacity(&self) -> u64 {
        self.own_capacity
    }

    /// Delegated capacity beyond what the account owns.
    pub fn delegation_overflow(&self) -> u64 {
        self.delegated_rc.saturating_sub(self.owned_capacity())
    }

    pub fn current_mana(&self) -> u64 {
        self.rc_manabar.current_mana
    }

    /// Regenerate under the stored ceiling up to `now`.
    pub fn regenerate(&mut self, now: Timestamp, params: &RcParams) -> Result<(), RcError> {
        self.rc_manabar
            .regenerate(self.max_mana, now, params)
            .map_err(|e| e.for_account(&self.account))
    }

    /// Recompute the ceiling from the structural fields and rescale the bar.
    ///
    /// Callers must have regenerated to `now` under the previous ceiling
    /// before changing any structural field.
    pub fn refresh_ceiling(&mut self) {
        let old_max = self.max_mana;
        let new_max = self.computed_max_mana();
        if old_max != new_max {
            self.rc_manabar.rescale(old_max, new_max);
        }
        self.max_mana = new_max;
    }

    pub fn view(&self) -> CapacityView {
        CapacityView {
            account: self.account.clone(),
            current_mana: self.rc_manabar.current_mana,
            max_mana: self.max_mana,
            delegated_rc: self.delegated_rc,
            received_delegated_rc: self.received_delegated_rc,
            last_update_time: self.rc_manabar.last_update_time,
        }
    }
}

/// Read model returned by capacity queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityView {
    pub account: AccountName,
    pub current_mana: u64,
    pub max_mana: u64,
    pub delegated_rc: u64,
    pub received_delegated_rc: u64,
    pub last_update_time: Timestamp,
}

//! Consumable, replenishable, learning supplies.
//!
//! A [`Supply`] is a capability held exclusively by one agent: a stock of
//! `amount` units of some [`SupplyKind`] at some [`SupplyQuality`]. Working a
//! demand drains units; a replenishing supply refills to capacity (at a
//! virtual-time cost charged to the consumer), a non-replenishing one runs
//! out and becomes `Exhausted`. Supplies with a lifespan expire outright at
//! a wall-cycle deadline regardless of remaining units.
//!
//! Sustained consumption also *teaches*: every unit drained feeds a learning
//! counter, and each time the counter crosses [`LEARNING_THRESHOLD`] the
//! supply's quality is promoted one tier.

use serde::{Deserialize, Serialize};
use tandem_types::{SupplyId, SupplyKind, SupplyQuality, SupplyState};

/// Effort cost charged to the consumer each time a supply refills.
pub const DEFAULT_REPLENISH_TIME: u32 = 8;

/// Units of consumption required to promote a supply one quality tier.
pub const LEARNING_THRESHOLD: u32 = 300;

/// A stock of capability units owned by exactly one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supply {
    pub(crate) id: SupplyId,
    pub(crate) name: String,
    pub(crate) kind: SupplyKind,
    pub(crate) quality: SupplyQuality,
    pub(crate) capacity: u32,
    pub(crate) amount: u32,
    pub(crate) state: SupplyState,
    pub(crate) replenishing: bool,
    /// Cycles between automatic refills; `None` disables periodic refill.
    pub(crate) replenish_period: Option<u64>,
    pub(crate) replenish_time: u32,
    /// Wall cycle at which this supply expires outright.
    pub(crate) expires_at: Option<u64>,
    pub(crate) last_replenish: Option<u64>,
    pub(crate) learning_counter: u32,
}

impl Supply {
    /// Create a replenishable supply at full capacity.
    pub fn new(
        name: impl Into<String>,
        kind: SupplyKind,
        quality: SupplyQuality,
        capacity: u32,
    ) -> Self {
        Self {
            id: SupplyId::new(),
            name: name.into(),
            kind,
            quality,
            capacity,
            amount: capacity,
            state: SupplyState::Available,
            replenishing: true,
            replenish_period: None,
            replenish_time: DEFAULT_REPLENISH_TIME,
            expires_at: None,
            last_replenish: None,
            learning_counter: 0,
        }
    }

    /// Disable replenishment: once drained, the supply is exhausted for good.
    #[must_use]
    pub fn non_replenishing(mut self) -> Self {
        self.replenishing = false;
        self
    }

    /// Enable periodic refill every `period` wall cycles.
    #[must_use]
    pub fn with_replenish_period(mut self, period: u64) -> Self {
        self.replenish_period = Some(period);
        self
    }

    /// Set a hard expiry at the given wall cycle.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Unique id of this supply.
    pub const fn id(&self) -> SupplyId {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The capability category this supply provides.
    pub const fn kind(&self) -> SupplyKind {
        self.kind
    }

    /// Current quality tier.
    pub const fn quality(&self) -> SupplyQuality {
        self.quality
    }

    /// Maximum units this supply holds when full.
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Units currently available.
    pub const fn amount(&self) -> u32 {
        self.amount
    }

    /// Current availability state.
    pub const fn state(&self) -> SupplyState {
        self.state
    }

    /// Effort cost charged per refill.
    pub const fn replenish_time(&self) -> u32 {
        self.replenish_time
    }

    /// Whether this supply refills after being drained.
    pub const fn is_replenishing(&self) -> bool {
        self.replenishing
    }

    /// Check usability at the given wall cycle.
    ///
    /// Expired supplies are never usable. Otherwise a periodic refill is
    /// attempted first (if the supply is due one), then usability is simply
    /// `Available`.
    pub fn is_usable(&mut self, now: u64) -> bool {
        if self.check_expiry(now) {
            return false;
        }
        if let Some(period) = self.replenish_period {
            let due = self
                .last_replenish
                .is_none_or(|last| now.saturating_sub(last) >= period);
            if due && self.amount < self.capacity {
                self.replenish(now);
            }
        }
        self.state == SupplyState::Available
    }

    /// Mark the supply `Expired` if its deadline has passed. Returns whether
    /// the supply is expired.
    pub fn check_expiry(&mut self, now: u64) -> bool {
        if self.state == SupplyState::Expired {
            return true;
        }
        if self.expires_at.is_some_and(|deadline| now >= deadline) {
            self.state = SupplyState::Expired;
            return true;
        }
        false
    }

    /// Refill to capacity if this supply replenishes.
    ///
    /// A drained non-replenishing supply stays empty and is marked
    /// `Exhausted`. Returns whether units are available afterwards.
    pub fn replenish(&mut self, now: u64) -> bool {
        if self.state == SupplyState::Expired {
            return false;
        }
        if self.replenishing {
            self.amount = self.capacity;
            self.last_replenish = Some(now);
            if self.amount > 0 {
                self.state = SupplyState::Available;
            }
        }
        if self.amount == 0 {
            self.state = SupplyState::Exhausted;
        }
        self.amount > 0
    }

    /// Drain up to `units` from the supply, feeding the learning counter.
    ///
    /// Returns the units actually removed. Callers wanting an exact drain
    /// must check [`Self::amount`] (and replenish) first; this never takes
    /// the amount negative.
    pub fn reduce_amount(&mut self, units: u32) -> u32 {
        let taken = units.min(self.amount);
        self.amount = self.amount.saturating_sub(taken);
        if self.amount == 0 && !self.replenishing {
            self.state = SupplyState::Exhausted;
        }
        self.learn(taken);
        taken
    }

    /// Feed consumed units into the learning counter, promoting the quality
    /// one tier each time the counter crosses [`LEARNING_THRESHOLD`].
    fn learn(&mut self, consumed: u32) {
        self.learning_counter = self.learning_counter.saturating_add(consumed);
        while self.learning_counter >= LEARNING_THRESHOLD {
            match self.quality.promoted() {
                Some(next) => {
                    self.quality = next;
                    self.learning_counter =
                        self.learning_counter.saturating_sub(LEARNING_THRESHOLD);
                }
                // Top tier: counter stops mattering.
                None => {
                    self.learning_counter = 0;
                    break;
                }
            }
        }
    }
}

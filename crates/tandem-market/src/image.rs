//! Point-in-time supply snapshots for rollback.
//!
//! Before any speculative mutation of a supply, the owning agent captures a
//! [`SupplyImage`]. If the work later has to be undone (a rollback or a
//! failed expenditure), restoring the image returns the supply to exactly
//! the captured state. Images copy every mutable field, including quality:
//! a rollback undoes learning promotions along with consumption.

use serde::{Deserialize, Serialize};
use tandem_types::{SupplyId, SupplyQuality, SupplyState};

use crate::error::MarketError;
use crate::supply::Supply;

/// A snapshot of one supply's mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyImage {
    supply: SupplyId,
    state: SupplyState,
    quality: SupplyQuality,
    amount: u32,
    replenishing: bool,
    replenish_period: Option<u64>,
    expires_at: Option<u64>,
    last_replenish: Option<u64>,
    learning_counter: u32,
}

impl SupplyImage {
    /// Capture the current state of a supply.
    #[must_use]
    pub fn capture(supply: &Supply) -> Self {
        Self {
            supply: supply.id,
            state: supply.state,
            quality: supply.quality,
            amount: supply.amount,
            replenishing: supply.replenishing,
            replenish_period: supply.replenish_period,
            expires_at: supply.expires_at,
            last_replenish: supply.last_replenish,
            learning_counter: supply.learning_counter,
        }
    }

    /// The supply this image was captured from.
    pub const fn supply(&self) -> SupplyId {
        self.supply
    }

    /// The captured amount.
    pub const fn amount(&self) -> u32 {
        self.amount
    }

    /// Write the captured state back onto the supply.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::SnapshotMismatch`] if `supply` is not the one
    /// this image was captured from.
    pub fn restore(&self, supply: &mut Supply) -> Result<(), MarketError> {
        if supply.id != self.supply {
            return Err(MarketError::SnapshotMismatch {
                image_of: self.supply,
                applied_to: supply.id,
            });
        }
        supply.state = self.state;
        supply.quality = self.quality;
        supply.amount = self.amount;
        supply.replenishing = self.replenishing;
        supply.replenish_period = self.replenish_period;
        supply.expires_at = self.expires_at;
        supply.last_replenish = self.last_replenish;
        supply.learning_counter = self.learning_counter;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tandem_types::{SupplyKind, SupplyQuality};

    use super::*;
    use crate::supply::LEARNING_THRESHOLD;

    #[test]
    fn restore_undoes_consumption_and_learning() {
        let mut supply =
            Supply::new("analysis", SupplyKind::Analysis, SupplyQuality::Low, 1000);
        let image = SupplyImage::capture(&supply);

        supply.reduce_amount(LEARNING_THRESHOLD);
        assert_eq!(supply.quality(), SupplyQuality::MediumLow);

        assert!(image.restore(&mut supply).is_ok());
        assert_eq!(supply.amount(), 1000);
        assert_eq!(supply.quality(), SupplyQuality::Low);
    }

    #[test]
    fn restore_rejects_foreign_supply() {
        let supply_a =
            Supply::new("a", SupplyKind::Analysis, SupplyQuality::Low, 10);
        let mut supply_b =
            Supply::new("b", SupplyKind::Analysis, SupplyQuality::Low, 10);
        let image = SupplyImage::capture(&supply_a);
        assert!(matches!(
            image.restore(&mut supply_b),
            Err(MarketError::SnapshotMismatch { .. })
        ));
    }
}

//! Reward Math for UrbanCycle
//!
//! Checked arithmetic and the per-material, per-grade reward table.
//!
//! ```text
//! reward = weight_grams * rate_per_kg(material) / 1000 * multiplier_bps(grade) / 10000
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{precision, rewards};
use crate::errors::{AmountErrorReason, UrbanError, UrbanResult};
use crate::types::{Grade, Material};

/// Reward rates, fixed when the manager is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSchedule {
    /// URB base units per kilogram of plastic
    pub plastic_per_kg: u64,
    pub glass_per_kg: u64,
    pub paper_per_kg: u64,
    pub metal_per_kg: u64,
    /// Grade multipliers in basis points
    pub grade_a_bps: u64,
    pub grade_b_bps: u64,
    pub grade_c_bps: u64,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self {
            plastic_per_kg: rewards::PLASTIC_PER_KG,
            glass_per_kg: rewards::GLASS_PER_KG,
            paper_per_kg: rewards::PAPER_PER_KG,
            metal_per_kg: rewards::METAL_PER_KG,
            grade_a_bps: rewards::GRADE_A_BPS,
            grade_b_bps: rewards::GRADE_B_BPS,
            grade_c_bps: rewards::GRADE_C_BPS,
        }
    }
}

impl RewardSchedule {
    /// Per-kilogram rate for a material
    pub fn rate_per_kg(&self, material: Material) -> u64 {
        match material {
            Material::Plastic => self.plastic_per_kg,
            Material::Glass => self.glass_per_kg,
            Material::Paper => self.paper_per_kg,
            Material::Metal => self.metal_per_kg,
        }
    }

    /// Quality multiplier for a grade, in basis points
    pub fn multiplier_bps(&self, grade: Grade) -> u64 {
        match grade {
            Grade::A => self.grade_a_bps,
            Grade::B => self.grade_b_bps,
            Grade::C => self.grade_c_bps,
        }
    }

    /// Rates must be positive and multipliers may not exceed 100%
    pub fn validate(&self) -> UrbanResult<()> {
        for material in Material::ALL {
            let rate = self.rate_per_kg(material);
            if rate == 0 {
                return Err(UrbanError::InvalidAmount {
                    amount: rate,
                    reason: AmountErrorReason::Zero,
                });
            }
        }
        for grade in Grade::ALL {
            let bps = self.multiplier_bps(grade);
            if bps == 0 {
                return Err(UrbanError::InvalidAmount {
                    amount: bps,
                    reason: AmountErrorReason::Zero,
                });
            }
            if bps > precision::BPS_DENOMINATOR {
                return Err(UrbanError::InvalidAmount {
                    amount: bps,
                    reason: AmountErrorReason::TooLarge,
                });
            }
        }
        Ok(())
    }

    /// Compute the reward for a graded event
    pub fn reward_for(&self, material: Material, grade: Grade, weight_grams: u64) -> UrbanResult<u64> {
        calculate_reward(weight_grams, self.rate_per_kg(material), self.multiplier_bps(grade))
    }
}

/// Calculate a reward amount.
///
/// Computed in u128 and truncated toward zero. Returns `Overflow` if the
/// result does not fit a u64.
pub fn calculate_reward(weight_grams: u64, rate_per_kg: u64, multiplier_bps: u64) -> UrbanResult<u64> {
    let numerator = (weight_grams as u128)
        .checked_mul(rate_per_kg as u128)
        .and_then(|v| v.checked_mul(multiplier_bps as u128))
        .ok_or(UrbanError::Overflow)?;
    let denominator = (precision::GRAMS_PER_KG as u128) * (precision::BPS_DENOMINATOR as u128);
    u64::try_from(numerator / denominator).map_err(|_| UrbanError::Overflow)
}

/// Amount proportional to weight (`amount_per_kg * weight_grams / 1000`)
pub fn per_kilogram(weight_grams: u64, amount_per_kg: u64) -> UrbanResult<u64> {
    let value = (weight_grams as u128)
        .checked_mul(amount_per_kg as u128)
        .ok_or(UrbanError::Overflow)?
        / precision::GRAMS_PER_KG as u128;
    u64::try_from(value).map_err(|_| UrbanError::Overflow)
}

/// Safe addition with overflow check
pub fn safe_add(a: u64, b: u64) -> UrbanResult<u64> {
    a.checked_add(b).ok_or(UrbanError::Overflow)
}

/// Safe subtraction, reported as an insufficient balance
pub fn safe_sub(available: u64, requested: u64) -> UrbanResult<u64> {
    available
        .checked_sub(requested)
        .ok_or(UrbanError::InsufficientBalance { available, requested })
}

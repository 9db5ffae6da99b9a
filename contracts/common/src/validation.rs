//! Validation Helpers
//!
//! The `check!` macro and the small guards shared by the three contracts.
//!
//! ```rust,ignore
//! use urbancycle_common::check;
//!
//! check!(amount > 0, UrbanError::InvalidAmount { amount, reason: AmountErrorReason::Zero });
//! ```

use crate::errors::{AmountErrorReason, UrbanError, UrbanResult};
use crate::types::Address;

/// Check a condition and return an error if it fails.
#[macro_export]
macro_rules! check {
    ($condition:expr, $error:expr) => {
        if !($condition) {
            return Err($error);
        }
    };
}

pub use check;

/// Amount must be non-zero
pub fn require_positive(amount: u64) -> UrbanResult<()> {
    check!(
        amount > 0,
        UrbanError::InvalidAmount {
            amount,
            reason: AmountErrorReason::Zero,
        }
    );
    Ok(())
}

/// Caller must be the expected address
pub fn require_caller(expected: &Address, actual: &Address) -> UrbanResult<()> {
    check!(
        expected == actual,
        UrbanError::Unauthorized {
            expected: *expected,
            actual: *actual,
        }
    );
    Ok(())
}

/// Sum of balances must equal supply
pub fn supply_matches<'a, I>(balances: I, total_supply: u64) -> bool
where
    I: IntoIterator<Item = &'a u64>,
{
    let sum: u128 = balances.into_iter().map(|b| *b as u128).sum();
    sum == total_supply as u128
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guarded(value: u64) -> UrbanResult<u64> {
        check!(value < 10, UrbanError::Overflow);
        Ok(value * 2)
    }

    #[test]
    fn test_check_macro() {
        assert_eq!(guarded(4).unwrap(), 8);
        assert!(matches!(guarded(11), Err(UrbanError::Overflow)));
    }

    #[test]
    fn test_require_positive() {
        assert!(require_positive(1).is_ok());
        assert!(matches!(
            require_positive(0),
            Err(UrbanError::InvalidAmount { reason: AmountErrorReason::Zero, .. })
        ));
    }

    #[test]
    fn test_require_caller() {
        assert!(require_caller(&[1u8; 32], &[1u8; 32]).is_ok());
        assert!(matches!(
            require_caller(&[1u8; 32], &[2u8; 32]),
            Err(UrbanError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_supply_matches() {
        assert!(supply_matches(&[5, 7], 12));
        assert!(!supply_matches(&[5, 7], 13));
        assert!(supply_matches(&[], 0));
    }
}

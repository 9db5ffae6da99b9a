//! Protocol Constants
//!
//! Token metadata, fixed-point scales and the default reward schedule for
//! the UrbanCycle contracts. The default rates reproduce the figures shown on
//! the citizen dashboard (2.5 kg of plastic earns 25 URB, 0.5 kg of metal
//! earns 15 URB). Deployments override them through configuration.

/// UrbanCoin (reward token) metadata
pub mod token {
    /// Token name
    pub const NAME: &str = "UrbanCoin";
    /// Token symbol
    pub const SYMBOL: &str = "URB";
    /// Decimal places
    pub const DECIMALS: u8 = 8;
    /// One URB with decimals (1 URB = 100_000_000 base units)
    pub const ONE: u64 = 100_000_000;
}

/// WasteNFT (provenance registry) metadata
pub mod provenance {
    /// Collection name
    pub const NAME: &str = "WasteNFT";
    /// Collection symbol
    pub const SYMBOL: &str = "WNFT";
    /// First record id handed out by a fresh registry
    pub const FIRST_RECORD_ID: u64 = 1;
}

/// Stablecoin used for informal recycler payments
pub mod stablecoin {
    /// Currency label passed to the payment processor
    pub const CURRENCY: &str = "USDC";
    /// Decimal places
    pub const DECIMALS: u8 = 6;
    /// One USDC with decimals
    pub const ONE: u64 = 1_000_000;
}

/// Fixed-point scales
pub mod precision {
    /// Grams per kilogram (weights are carried in grams)
    pub const GRAMS_PER_KG: u64 = 1_000;
    /// Maximum fractional digits accepted in a `weight_kg` string
    pub const WEIGHT_FRACTION_DIGITS: usize = 3;
    /// Basis points denominator
    pub const BPS_DENOMINATOR: u64 = 10_000;
}

/// Default reward schedule (URB base units per kilogram, multipliers in bps)
pub mod rewards {
    use super::token::ONE;

    /// Plastic: 10 URB per kg
    pub const PLASTIC_PER_KG: u64 = 10 * ONE;
    /// Glass: 10 URB per kg
    pub const GLASS_PER_KG: u64 = 10 * ONE;
    /// Paper: 10 URB per kg
    pub const PAPER_PER_KG: u64 = 10 * ONE;
    /// Metal: 30 URB per kg
    pub const METAL_PER_KG: u64 = 30 * ONE;

    /// Grade A keeps the full rate
    pub const GRADE_A_BPS: u64 = 10_000;
    /// Grade B earns 75%
    pub const GRADE_B_BPS: u64 = 7_500;
    /// Grade C earns 50%
    pub const GRADE_C_BPS: u64 = 5_000;
}

/// Default payment policy for informal recyclers
pub mod payments {
    use super::stablecoin::ONE;

    /// 20 USDC per kilogram delivered
    pub const DEFAULT_PER_KG: u64 = 20 * ONE;
}

/// Estimated CO2 avoided per kilogram recycled, in grams of CO2
pub mod impact {
    pub const PLASTIC_CO2_G_PER_KG: u64 = 1_500;
    pub const GLASS_CO2_G_PER_KG: u64 = 300;
    pub const PAPER_CO2_G_PER_KG: u64 = 900;
    pub const METAL_CO2_G_PER_KG: u64 = 4_000;
}

/// Input limits
pub mod limits {
    /// Maximum length of a submission identifier in bytes
    pub const MAX_SUBMISSION_ID_LEN: usize = 128;

    /// Maximum length of a collection point label in bytes
    pub const MAX_COLLECTION_POINT_LEN: usize = 64;

    /// Default number of external calls the host grants one pipeline run
    /// (mint, record, payment, plus one spare)
    pub const DEFAULT_MAX_CALLS_PER_RUN: u32 = 4;

    /// Calls a run needs to both mint and record. Smaller budgets leave runs
    /// in `NeedsReconciliation`.
    pub const MIN_CALLS_FOR_SETTLEMENT: u32 = 2;
}

//! Core Types for the UrbanCycle contracts
//!
//! Addresses, identifiers, the closed material/grade enumerations and the
//! collection event that enters the reward pipeline.

use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{impact, limits, precision};
use crate::errors::{UrbanError, UrbanResult};

/// Type alias for addresses (32-byte hash)
pub type Address = [u8; 32];

/// Type alias for provenance record identifiers
pub type RecordId = u64;

/// Token amount in base units
pub type Amount = u64;

/// The zero address, never a valid account or component
pub const ZERO_ADDRESS: Address = [0u8; 32];

// ============ Address Helpers ============

/// Render an address as `0x`-prefixed lowercase hex
pub fn address_to_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

/// Parse a `0x`-prefixed (or bare) 64-digit hex address
pub fn address_from_hex(s: &str) -> UrbanResult<Address> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|_| UrbanError::InvalidAddress {
        reason: "address is not valid hex",
    })?;
    let address: Address = bytes.try_into().map_err(|_| UrbanError::InvalidAddress {
        reason: "address must be 32 bytes",
    })?;
    Ok(address)
}

/// First four bytes of an address, for log fields (`0x01020304`)
pub fn address_short(address: &Address) -> String {
    format!("0x{}", hex::encode(&address[..4]))
}

/// Reject the zero address
pub fn require_nonzero(address: &Address, reason: &'static str) -> UrbanResult<()> {
    if *address == ZERO_ADDRESS {
        return Err(UrbanError::InvalidAddress { reason });
    }
    Ok(())
}

/// Derive a deterministic component address from its deployer.
///
/// `sha256(deployer || nonce_le || label)`, the same shape as a contract
/// creation address on an account-based ledger.
pub fn derive_address(deployer: &Address, nonce: u64, label: &str) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(deployer);
    hasher.update(nonce.to_le_bytes());
    hasher.update(label.as_bytes());
    let result = hasher.finalize();
    let mut address = [0u8; 32];
    address.copy_from_slice(&result);
    address
}

// ============ Call Context ============

/// Who is calling and at which block, supplied by the host for every call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Address the host authenticated as the caller
    pub caller: Address,
    /// Current block height
    pub block_height: u64,
}

impl CallContext {
    pub fn new(caller: Address, block_height: u64) -> Self {
        Self { caller, block_height }
    }

    /// Same block, different caller (cross-contract call made by `caller`)
    pub fn as_caller(&self, caller: Address) -> Self {
        Self { caller, block_height: self.block_height }
    }
}

// ============ Material / Grade ============

/// Recyclable material category
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    Plastic,
    Glass,
    Paper,
    Metal,
}

impl Material {
    /// All materials in reporting order
    pub const ALL: [Material; 4] = [Material::Plastic, Material::Glass, Material::Paper, Material::Metal];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Material::Plastic => "plastic",
            Material::Glass => "glass",
            Material::Paper => "paper",
            Material::Metal => "metal",
        }
    }

    /// Estimated grams of CO2 avoided per kilogram recycled
    pub fn co2_grams_per_kg(&self) -> u64 {
        match self {
            Material::Plastic => impact::PLASTIC_CO2_G_PER_KG,
            Material::Glass => impact::GLASS_CO2_G_PER_KG,
            Material::Paper => impact::PAPER_CO2_G_PER_KG,
            Material::Metal => impact::METAL_CO2_G_PER_KG,
        }
    }
}

impl FromStr for Material {
    type Err = UrbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Material::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(UrbanError::InvalidEvent {
                field: "material",
                reason: "unknown material category",
            })
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality grade assigned at the collection point
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum Grade {
    A,
    B,
    C,
}

impl Grade {
    pub const ALL: [Grade; 3] = [Grade::A, Grade::B, Grade::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
        }
    }
}

impl FromStr for Grade {
    type Err = UrbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grade::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(UrbanError::InvalidEvent {
                field: "grade",
                reason: "unknown quality grade",
            })
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who delivered the material
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CollectorKind {
    #[default]
    Citizen,
    /// Informal recycler collection point; triggers a stablecoin payment
    InformalRecycler,
}

impl FromStr for CollectorKind {
    type Err = UrbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "citizen" => Ok(CollectorKind::Citizen),
            "informal_recycler" => Ok(CollectorKind::InformalRecycler),
            _ => Err(UrbanError::InvalidEvent {
                field: "collector_kind",
                reason: "unknown collector kind",
            }),
        }
    }
}

/// At most `MAX_SUBMISSION_ID_LEN` bytes of `id`, cut at a char boundary
pub fn bounded_submission_id(id: &str) -> &str {
    if id.len() <= limits::MAX_SUBMISSION_ID_LEN {
        return id;
    }
    let mut end = limits::MAX_SUBMISSION_ID_LEN;
    while !id.is_char_boundary(end) {
        end -= 1;
    }
    &id[..end]
}

// ============ Weight ============

/// Parse a positive decimal kilogram string into grams.
///
/// Accepts at most three fractional digits. Zero, negative and malformed
/// weights are rejected.
pub fn parse_weight_kg(s: &str) -> UrbanResult<u64> {
    const FIELD: &str = "weight_kg";
    let s = s.trim();
    let invalid = |reason| UrbanError::InvalidEvent { field: FIELD, reason };

    if s.is_empty() {
        return Err(invalid("weight is empty"));
    }
    if s.starts_with('-') {
        return Err(invalid("weight must be positive"));
    }

    let (whole, fraction) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("weight is not a decimal number"));
    }
    if !digits_only(whole) || !digits_only(fraction) {
        return Err(invalid("weight is not a decimal number"));
    }
    if fraction.len() > precision::WEIGHT_FRACTION_DIGITS {
        return Err(invalid("weight has more than gram precision"));
    }

    let whole_kg: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("weight is too large"))?
    };
    let mut fraction_grams: u64 = if fraction.is_empty() {
        0
    } else {
        fraction.parse().map_err(|_| invalid("weight is not a decimal number"))?
    };
    for _ in fraction.len()..precision::WEIGHT_FRACTION_DIGITS {
        fraction_grams *= 10;
    }

    let grams = whole_kg
        .checked_mul(precision::GRAMS_PER_KG)
        .and_then(|g| g.checked_add(fraction_grams))
        .ok_or(invalid("weight is too large"))?;

    if grams == 0 {
        return Err(invalid("weight must be positive"));
    }
    Ok(grams)
}

/// Format grams as a kilogram decimal string (`2500` -> `"2.5"`)
pub fn format_weight_kg(grams: u64) -> String {
    let whole = grams / precision::GRAMS_PER_KG;
    let fraction = grams % precision::GRAMS_PER_KG;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:03}", fraction);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// A weight as received on the wire: either a JSON number or a decimal string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightInput {
    Text(String),
    Number(f64),
}

impl WeightInput {
    /// Convert to grams
    pub fn to_grams(&self) -> UrbanResult<u64> {
        match self {
            WeightInput::Text(s) => parse_weight_kg(s),
            WeightInput::Number(n) => {
                if !n.is_finite() {
                    return Err(UrbanError::InvalidEvent {
                        field: "weight_kg",
                        reason: "weight is not a decimal number",
                    });
                }
                parse_weight_kg(&n.to_string())
            }
        }
    }
}

impl From<&str> for WeightInput {
    fn from(s: &str) -> Self {
        WeightInput::Text(s.to_string())
    }
}

// ============ Collection Events ============

/// Collection event as submitted by the verification source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEventInput {
    /// Unique submission identifier (replay protection key)
    pub submission_id: String,
    /// Submitting account, hex encoded
    pub account: String,
    /// Material category name
    pub material: String,
    /// Positive decimal weight in kilograms
    pub weight_kg: WeightInput,
    /// Quality grade name
    pub grade: String,
    /// `citizen` or `informal_recycler`
    pub collector_kind: String,
    /// Unix timestamp of the collection (seconds)
    #[serde(default)]
    pub collected_at: Option<u64>,
    /// Collection point / district label
    #[serde(default)]
    pub collection_point: Option<String>,
}

/// A validated, graded collection event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CollectionEvent {
    pub submission_id: String,
    pub account: Address,
    pub material: Material,
    /// Weight in grams (always > 0)
    pub weight_grams: u64,
    pub grade: Grade,
    pub collector_kind: CollectorKind,
    pub collected_at: u64,
    pub collection_point: Option<String>,
}

impl CollectionEvent {
    /// Validate the raw wire form.
    ///
    /// This is the grading step: every field is checked against the closed
    /// enumerations and limits before anything touches a registry.
    pub fn try_from_input(input: &CollectionEventInput) -> UrbanResult<Self> {
        let account = address_from_hex(&input.account).map_err(|_| UrbanError::InvalidEvent {
            field: "account",
            reason: "account is not a valid address",
        })?;

        let event = Self {
            submission_id: input.submission_id.clone(),
            account,
            material: input.material.parse()?,
            weight_grams: input.weight_kg.to_grams()?,
            grade: input.grade.parse()?,
            collector_kind: input.collector_kind.parse()?,
            collected_at: input.collected_at.unwrap_or(0),
            collection_point: input.collection_point.clone(),
        };
        event.validate()?;
        Ok(event)
    }

    /// Check the invariants of an already typed event
    pub fn validate(&self) -> UrbanResult<()> {
        let invalid = |field, reason| UrbanError::InvalidEvent { field, reason };

        if self.submission_id.trim().is_empty() {
            return Err(invalid("submission_id", "submission id is empty"));
        }
        if self.submission_id.len() > limits::MAX_SUBMISSION_ID_LEN {
            return Err(invalid("submission_id", "submission id is too long"));
        }
        if self.account == ZERO_ADDRESS {
            return Err(invalid("account", "account is the zero address"));
        }
        if self.weight_grams == 0 {
            return Err(invalid("weight_kg", "weight must be positive"));
        }
        if let Some(point) = &self.collection_point {
            if point.len() > limits::MAX_COLLECTION_POINT_LEN {
                return Err(invalid("collection_point", "collection point label is too long"));
            }
        }
        Ok(())
    }
}

//! Stablecoin distribution to informal recyclers
//!
//! The manager only decides *what* to pay; a `PaymentProcessor` performs the
//! transfer. A processor failure never touches the reward or the record.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use urbancycle_common::{
    constants::{payments, stablecoin},
    errors::{AmountErrorReason, UrbanError, UrbanResult},
    math::per_kilogram,
    types::{Address, Amount},
};

/// How much an informal recycler receives for a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentPolicy {
    /// Flat amount per delivery (stablecoin base units)
    Fixed { amount: Amount },
    /// Proportional to weight (stablecoin base units per kg)
    PerKilogram { amount_per_kg: Amount },
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        PaymentPolicy::PerKilogram {
            amount_per_kg: payments::DEFAULT_PER_KG,
        }
    }
}

impl PaymentPolicy {
    /// Amount owed for a delivery of `weight_grams`
    pub fn amount_for(&self, weight_grams: u64) -> UrbanResult<Amount> {
        match self {
            PaymentPolicy::Fixed { amount } => Ok(*amount),
            PaymentPolicy::PerKilogram { amount_per_kg } => per_kilogram(weight_grams, *amount_per_kg),
        }
    }

    pub fn validate(&self) -> UrbanResult<()> {
        let value = match self {
            PaymentPolicy::Fixed { amount } => *amount,
            PaymentPolicy::PerKilogram { amount_per_kg } => *amount_per_kg,
        };
        if value == 0 {
            return Err(UrbanError::InvalidAmount {
                amount: value,
                reason: AmountErrorReason::Zero,
            });
        }
        Ok(())
    }
}

/// A single distribution order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub submission_id: String,
    pub recipient: Address,
    pub amount: Amount,
    pub currency: String,
}

impl PaymentRequest {
    pub fn new(submission_id: impl Into<String>, recipient: Address, amount: Amount) -> Self {
        Self {
            submission_id: submission_id.into(),
            recipient,
            amount,
            currency: stablecoin::CURRENCY.to_string(),
        }
    }

    /// Deterministic reference for this request
    pub fn reference(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.submission_id.as_bytes());
        hasher.update(self.recipient);
        hasher.update(self.amount.to_le_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }
}

/// Proof that the processor accepted a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub reference: String,
    pub amount: Amount,
}

/// Downstream payment rail
pub trait PaymentProcessor {
    fn pay(&mut self, request: &PaymentRequest) -> UrbanResult<PaymentReceipt>;
}

/// In-memory processor that records every accepted payment.
///
/// Can be switched offline or told to fail the next N calls.
#[derive(Debug, Clone, Default)]
pub struct RecordingProcessor {
    paid: Vec<PaymentRequest>,
    offline: bool,
    fail_next: u32,
    attempts: u64,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A processor that rejects everything until brought back online
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn set_online(&mut self, online: bool) {
        self.offline = !online;
    }

    /// Fail the next `count` calls, then behave normally
    pub fn fail_next(&mut self, count: u32) {
        self.fail_next = count;
    }

    pub fn payments(&self) -> &[PaymentRequest] {
        &self.paid
    }

    pub fn total_paid(&self) -> Amount {
        self.paid.iter().map(|p| p.amount).sum()
    }

    /// Calls received, successful or not
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl PaymentProcessor for RecordingProcessor {
    fn pay(&mut self, request: &PaymentRequest) -> UrbanResult<PaymentReceipt> {
        self.attempts += 1;
        if self.offline {
            return Err(UrbanError::PaymentFailed {
                reason: "processor offline".to_string(),
            });
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(UrbanError::PaymentFailed {
                reason: "processor rejected the transfer".to_string(),
            });
        }
        self.paid.push(request.clone());
        Ok(PaymentReceipt {
            reference: request.reference(),
            amount: request.amount,
        })
    }
}

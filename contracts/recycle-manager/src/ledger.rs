//! Audit trail
//!
//! One `LedgerEntry` is appended per pipeline run, whatever the outcome.
//! Entries keep their `sequence`, `reward` and `record_id` forever; only the
//! resolved `status` and `payment` of a run may move forward later, through
//! reconciliation or a payment retry.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use urbancycle_common::types::{Address, Amount, CollectionEvent, RecordId};

/// Pipeline stage a run reached
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    Graded,
    Rewarded,
    Recorded,
    Paid,
    Skipped,
    Settled,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Graded => "graded",
            PipelineStage::Rewarded => "rewarded",
            PipelineStage::Recorded => "recorded",
            PipelineStage::Paid => "paid",
            PipelineStage::Skipped => "skipped",
            PipelineStage::Settled => "settled",
        }
    }
}

/// Resolved outcome of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SettlementStatus {
    /// Reward minted and record created
    Settled,
    /// Reward minted, record missing
    NeedsReconciliation,
    /// Run aborted with the given error code; nothing was minted
    Rejected { code: String },
    /// Reward burned by reconciliation; the submission may be sent again
    Reversed,
}

impl SettlementStatus {
    /// Whether this entry holds the submission id against replay
    pub fn blocks_replay(&self) -> bool {
        matches!(self, SettlementStatus::Settled | SettlementStatus::NeedsReconciliation)
    }
}

/// Stablecoin distribution result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// Not an informal recycler delivery, or nothing to pay
    NotApplicable,
    Paid { amount: Amount, receipt: String },
    /// Awaiting retry
    Skipped { amount: Amount, reason: String, attempts: u32 },
}

impl PaymentOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, PaymentOutcome::Skipped { .. })
    }

    pub fn paid_amount(&self) -> Amount {
        match self {
            PaymentOutcome::Paid { amount, .. } => *amount,
            _ => 0,
        }
    }
}

/// A single audit trail entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LedgerEntry {
    /// Position in the trail, starting at 1
    pub sequence: u64,
    pub submission_id: String,
    /// Submitting account (zero if the input carried no valid address)
    pub account: Address,
    /// Last stage the run reached
    pub stage: PipelineStage,
    pub status: SettlementStatus,
    /// URB minted by this run (0 unless the mint happened)
    pub reward: Amount,
    pub record_id: Option<RecordId>,
    pub payment: PaymentOutcome,
    /// The graded event, absent when the run failed before grading
    pub event: Option<CollectionEvent>,
    pub block_height: u64,
}

impl LedgerEntry {
    pub fn is_settled(&self) -> bool {
        self.status == SettlementStatus::Settled
    }

    pub fn weight_grams(&self) -> u64 {
        self.event.as_ref().map(|e| e.weight_grams).unwrap_or(0)
    }
}

/// What `submit` hands back for a run that got past the mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub sequence: u64,
    pub submission_id: String,
    pub status: SettlementStatus,
    pub reward: Amount,
    pub record_id: Option<RecordId>,
    pub payment: PaymentOutcome,
}

impl From<&LedgerEntry> for Settlement {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            sequence: entry.sequence,
            submission_id: entry.submission_id.clone(),
            status: entry.status.clone(),
            reward: entry.reward,
            record_id: entry.record_id,
            payment: entry.payment.clone(),
        }
    }
}

//! Contract Events for UrbanCycle
//!
//! Events are emitted during contract execution and indexed off-chain by the
//! blockchain explorer and the dashboards.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::types::{Address, Material, RecordId};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Token Events (0x01 - 0x1F)
    TokenMint = 0x01,
    TokenBurn = 0x02,
    TokenTransfer = 0x03,
    MinterAuthorized = 0x04,
    AdminAdded = 0x05,

    // Provenance Events (0x20 - 0x3F)
    ManagerBound = 0x20,
    RecordCreated = 0x21,
    RecordTransferred = 0x22,

    // Pipeline Events (0x40 - 0x5F)
    SubmissionSettled = 0x40,
    SubmissionRejected = 0x41,
    ReconciliationRequired = 0x42,
    ReconciliationCompleted = 0x43,
    MintReversed = 0x44,

    // Payment Events (0x60 - 0x7F)
    PaymentDistributed = 0x60,
    PaymentSkipped = 0x61,
}

/// Main event enum containing all contract events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum UrbanEvent {
    // ============ Token Events ============

    /// Emitted when URB is minted
    TokenMint {
        to: Address,
        amount: u64,
        new_total_supply: u64,
        block_height: u64,
    },

    /// Emitted when URB is burned (mint reversal)
    TokenBurn {
        from: Address,
        amount: u64,
        new_total_supply: u64,
        block_height: u64,
    },

    /// Emitted on holder transfer
    TokenTransfer {
        from: Address,
        to: Address,
        amount: u64,
        block_height: u64,
    },

    /// Emitted the first time an address joins the minter set
    MinterAuthorized {
        minter: Address,
        by: Address,
        block_height: u64,
    },

    /// Emitted when an administrator is added
    AdminAdded {
        admin: Address,
        by: Address,
        block_height: u64,
    },

    // ============ Provenance Events ============

    /// Emitted once, when the registry latches its manager
    ManagerBound {
        manager: Address,
        block_height: u64,
    },

    /// Emitted when a provenance record is created
    RecordCreated {
        record_id: RecordId,
        owner: Address,
        material: Material,
        weight_grams: u64,
        block_height: u64,
    },

    /// Emitted when record ownership moves
    RecordTransferred {
        record_id: RecordId,
        from: Address,
        to: Address,
        block_height: u64,
    },

    // ============ Pipeline Events ============

    /// Emitted when a submission reaches `Settled`
    SubmissionSettled {
        sequence: u64,
        submission_id: String,
        account: Address,
        reward: u64,
        record_id: RecordId,
        block_height: u64,
    },

    /// Emitted when a submission is rejected
    SubmissionRejected {
        sequence: u64,
        submission_id: String,
        code: String,
        block_height: u64,
    },

    /// Emitted when a run minted but could not record
    ReconciliationRequired {
        sequence: u64,
        submission_id: String,
        reward: u64,
        block_height: u64,
    },

    /// Emitted when reconciliation completes a missing record
    ReconciliationCompleted {
        sequence: u64,
        submission_id: String,
        record_id: RecordId,
        block_height: u64,
    },

    /// Emitted when reconciliation reverses a mint
    MintReversed {
        sequence: u64,
        submission_id: String,
        amount: u64,
        block_height: u64,
    },

    // ============ Payment Events ============

    /// Emitted when a stablecoin payment is accepted by the processor
    PaymentDistributed {
        submission_id: String,
        recipient: Address,
        amount: u64,
        receipt: String,
        block_height: u64,
    },

    /// Emitted when a payment could not be made and awaits retry
    PaymentSkipped {
        submission_id: String,
        recipient: Address,
        amount: u64,
        reason: String,
        block_height: u64,
    },
}

impl UrbanEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::TokenMint { .. } => EventType::TokenMint,
            Self::TokenBurn { .. } => EventType::TokenBurn,
            Self::TokenTransfer { .. } => EventType::TokenTransfer,
            Self::MinterAuthorized { .. } => EventType::MinterAuthorized,
            Self::AdminAdded { .. } => EventType::AdminAdded,
            Self::ManagerBound { .. } => EventType::ManagerBound,
            Self::RecordCreated { .. } => EventType::RecordCreated,
            Self::RecordTransferred { .. } => EventType::RecordTransferred,
            Self::SubmissionSettled { .. } => EventType::SubmissionSettled,
            Self::SubmissionRejected { .. } => EventType::SubmissionRejected,
            Self::ReconciliationRequired { .. } => EventType::ReconciliationRequired,
            Self::ReconciliationCompleted { .. } => EventType::ReconciliationCompleted,
            Self::MintReversed { .. } => EventType::MintReversed,
            Self::PaymentDistributed { .. } => EventType::PaymentDistributed,
            Self::PaymentSkipped { .. } => EventType::PaymentSkipped,
        }
    }

    /// Get the block height when event occurred
    pub fn block_height(&self) -> u64 {
        match self {
            Self::TokenMint { block_height, .. }
            | Self::TokenBurn { block_height, .. }
            | Self::TokenTransfer { block_height, .. }
            | Self::MinterAuthorized { block_height, .. }
            | Self::AdminAdded { block_height, .. }
            | Self::ManagerBound { block_height, .. }
            | Self::RecordCreated { block_height, .. }
            | Self::RecordTransferred { block_height, .. }
            | Self::SubmissionSettled { block_height, .. }
            | Self::SubmissionRejected { block_height, .. }
            | Self::ReconciliationRequired { block_height, .. }
            | Self::ReconciliationCompleted { block_height, .. }
            | Self::MintReversed { block_height, .. }
            | Self::PaymentDistributed { block_height, .. }
            | Self::PaymentSkipped { block_height, .. } => *block_height,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting events during execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<UrbanEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: UrbanEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[UrbanEvent] {
        &self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&UrbanEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Number of events of one type
    pub fn count(&self, event_type: EventType) -> usize {
        self.events.iter().filter(|e| e.event_type() == event_type).count()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        let event = UrbanEvent::RecordCreated {
            record_id: 104,
            owner: [2u8; 32],
            material: Material::Plastic,
            weight_grams: 2_500,
            block_height: 100,
        };

        assert_eq!(event.event_type(), EventType::RecordCreated);
        assert_eq!(event.block_height(), 100);
    }

    #[test]
    fn test_event_serialization() {
        let event = UrbanEvent::SubmissionRejected {
            sequence: 3,
            submission_id: "e1".into(),
            code: "E030_DUPLICATE_SUBMISSION".into(),
            block_height: 200,
        };

        let bytes = event.to_bytes();
        let restored = UrbanEvent::from_bytes(&bytes).unwrap();

        assert_eq!(event, restored);
    }

    #[test]
    fn test_event_log() {
        let mut log = EventLog::new();

        log.emit(UrbanEvent::MinterAuthorized {
            minter: [3u8; 32],
            by: [1u8; 32],
            block_height: 5,
        });
        log.emit(UrbanEvent::TokenMint {
            to: [2u8; 32],
            amount: 25_00000000,
            new_total_supply: 25_00000000,
            block_height: 6,
        });

        assert_eq!(log.len(), 2);
        assert!(log.has_events());
        assert_eq!(log.filter_by_type(EventType::TokenMint).len(), 1);
        assert_eq!(log.count(EventType::TokenBurn), 0);
    }
}
